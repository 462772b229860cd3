pub mod deliveries;
pub mod users;

use delivery_db::Pipeline;

use crate::bootstrap::BootstrapPlan;
use deliveries::seed::SeedError;

/// Register every bootstrap step in execution order.
pub fn register_all(
    pipeline: &mut Pipeline,
    plan: &BootstrapPlan,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), SeedError> {
    deliveries::register(pipeline, plan, now)?;
    users::register(pipeline, plan);
    Ok(())
}
