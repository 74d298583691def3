//! Cache-key canonicalization and the credential-leak heuristic
//! (`spec.md` §4.2).

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

static CREDENTIAL_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)api[_-]?key|token|password").unwrap());
static CREDENTIAL_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{24,}$").unwrap());

/// Builds the canonical cache-key fingerprint: lowercase, diacritics
/// stripped, whitespace collapsed, params sorted by key, joined with a
/// separator (`\u{1f}`, ASCII unit separator) that cannot appear in any of
/// the inputs. Idempotent: `canonicalize(canonicalize(x)) == canonicalize(x)`
/// holds for the fields it is applied to, since every step is itself
/// idempotent.
pub fn canonicalize(
    category: &str,
    media_kind: &str,
    query: &str,
    params: &[(String, String)],
) -> String {
    let mut sorted_params = params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut fields = vec![
        normalize_field(category),
        normalize_field(media_kind),
        normalize_field(query),
    ];
    for (k, v) in &sorted_params {
        fields.push(format!("{}={}", normalize_field(k), normalize_field(v)));
    }

    fields.join("\u{1f}")
}

fn normalize_field(input: &str) -> String {
    let collapsed: String = strip_diacritics(input)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
}

/// Strips common Latin-1/Latin-Extended diacritics to their base ASCII
/// letter. Characters outside this table pass through unchanged — this is
/// a pragmatic fingerprint normalizer, not a full Unicode NFD table.
fn strip_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'a',
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            'ç' | 'Ç' => 'c',
            'ý' | 'ÿ' | 'Ý' => 'y',
            other => other,
        })
        .collect()
}

/// Hex-encoded SHA-256 of the canonical fingerprint (`spec.md` §4.2).
pub fn key_hash(canonical: &str) -> String {
    let digest = Sha256::digest(canonical.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Walks a JSON payload looking for a key matching the credential-name
/// pattern whose value matches the credential-shape pattern. Returns `true`
/// when a likely leaked credential is found and the payload should be
/// rejected.
pub fn looks_like_credential_leak(payload: &serde_json::Value) -> bool {
    match payload {
        serde_json::Value::Object(map) => map.iter().any(|(key, value)| {
            let key_suspicious = CREDENTIAL_KEY_RE.is_match(key);
            let value_suspicious = value
                .as_str()
                .is_some_and(|s| CREDENTIAL_VALUE_RE.is_match(s));
            (key_suspicious && value_suspicious) || looks_like_credential_leak(value)
        }),
        serde_json::Value::Array(items) => items.iter().any(looks_like_credential_leak),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_normalization_is_idempotent() {
        let once = normalize_field("  Café   TITLE  ");
        let twice = normalize_field(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_sorts_params_and_folds_case() {
        let a = canonicalize(
            "search",
            "tv",
            "Cafe",
            &[("b".into(), "2".into()), ("a".into(), "1".into())],
        );
        let b = canonicalize(
            "SEARCH",
            "TV",
            "cafe",
            &[("a".into(), "1".into()), ("b".into(), "2".into())],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn detects_api_key_leak() {
        let payload = json!({ "api_key": "abcdefghijklmnopqrstuvwx" });
        assert!(looks_like_credential_leak(&payload));
    }

    #[test]
    fn ignores_short_values() {
        let payload = json!({ "api_key": "short" });
        assert!(!looks_like_credential_leak(&payload));
    }

    #[test]
    fn ignores_unrelated_keys() {
        let payload = json!({ "title": "abcdefghijklmnopqrstuvwx" });
        assert!(!looks_like_credential_leak(&payload));
    }

    #[test]
    fn detects_nested_leak() {
        let payload = json!({ "meta": { "auth_token": "abcdefghijklmnopqrstuvwx" } });
        assert!(looks_like_credential_leak(&payload));
    }
}
