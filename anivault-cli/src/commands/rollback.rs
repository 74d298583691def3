use anivault_core::prelude::{EngineConfig, Journal, RealFs};
use anivault_model::error::{EngineError, EngineResult, ErrorContext};
use anivault_model::ids::PlanId;

pub async fn run(config: &EngineConfig, plan_id: String) -> EngineResult<i32> {
    let plan_id: PlanId = plan_id.parse().map_err(|_| {
        EngineError::validation(
            ErrorContext::new("cli.rollback").with_subject(plan_id.clone()),
            "plan id is not a valid UUID",
        )
    })?;

    let fs = RealFs::new();
    let journal = Journal::new(config.journal_dir());

    match journal.reverse(&fs, plan_id).await {
        Ok(count) => {
            println!("reversed {count} item(s) from plan {plan_id}");
            Ok(0)
        }
        Err(EngineError::NotFound { .. }) => {
            eprintln!("no journal found for plan {plan_id}");
            Ok(66)
        }
        Err(err) => Err(err),
    }
}
