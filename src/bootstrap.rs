use anyhow::Context;
use chrono::{DateTime, Utc};
use delivery_db::{NewUser, Pipeline, StepOutcome, StepOutput, StepReport, Store};
use delivery_kernel::settings::{IndexSpec, RerunPolicy, Settings};

use crate::modules::deliveries::seed::{self, SeedError, SeedRecord};
use crate::modules::{self, users};
use crate::verify::verify;

/// Printed on stdout once every step succeeded.
pub const COMPLETION_MESSAGE: &str = "Инициализация MongoDB завершена успешно";

/// Everything the bootstrap writes, resolved from settings up front so that
/// configuration errors surface before the first write.
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    pub database: String,
    pub collection: String,
    pub seed: Vec<SeedRecord>,
    pub indexes: Vec<IndexSpec>,
    pub app_user: NewUser,
    pub on_existing: RerunPolicy,
}

impl BootstrapPlan {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let seed = seed::resolve_seed(settings.seed.path.as_deref()).context("failed to load seed records")?;
        let app_user = users::resolve_app_user(settings).context("failed to resolve application user")?;

        Ok(Self {
            database: settings.database.name.clone(),
            collection: settings.database.collection.clone(),
            seed,
            indexes: settings.indexes.clone(),
            app_user,
            on_existing: settings.bootstrap.on_existing,
        })
    }

    /// Build the ordered step list for a run at `now`.
    pub fn pipeline(&self, now: DateTime<Utc>) -> Result<Pipeline, SeedError> {
        let mut pipeline = Pipeline::new();
        modules::register_all(&mut pipeline, self, now)?;
        Ok(pipeline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub database: String,
    pub collection: String,
    /// Set when an initialized target was left untouched.
    pub skipped: bool,
    /// Documents inserted by this run.
    pub inserted: usize,
    /// Names of the indexes this run created.
    pub indexes: Vec<String>,
    /// Application user this run created.
    pub user: Option<String>,
    pub steps: Vec<StepReport>,
}

impl BootstrapReport {
    fn new(plan: &BootstrapPlan, skipped: bool) -> Self {
        Self {
            database: plan.database.clone(),
            collection: plan.collection.clone(),
            skipped,
            inserted: 0,
            indexes: Vec::new(),
            user: None,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, step: StepReport) {
        if let StepOutcome::Completed { output, .. } = &step.outcome {
            match output {
                StepOutput::Inserted(count) => self.inserted += count,
                StepOutput::Indexes(names) => self.indexes.extend(names.iter().cloned()),
                StepOutput::User(username) => self.user = Some(username.clone()),
                StepOutput::Nothing => {}
            }
        }
        self.steps.push(step);
    }
}

/// Initialize the database behind `store`.
///
/// Steps run strictly in order and the first failure aborts the run; work
/// already done by earlier steps stays in place.
///
/// With [`RerunPolicy::Skip`] an existing collection is only left alone when
/// the target holds a finished bootstrap; a partially initialized target is
/// an error.
pub async fn run(store: &dyn Store, plan: &BootstrapPlan, now: DateTime<Utc>) -> anyhow::Result<BootstrapReport> {
    if store.database_name() != plan.database {
        anyhow::bail!(
            "store is bound to database '{}' but the plan targets '{}'",
            store.database_name(),
            plan.database
        );
    }

    tracing::info!(
        database = %plan.database,
        collection = %plan.collection,
        records = plan.seed.len(),
        on_existing = ?plan.on_existing,
        "starting database bootstrap"
    );

    let pipeline = plan.pipeline(now).context("failed to prepare seed deliveries")?;

    if plan.on_existing == RerunPolicy::Skip
        && store
            .collection_exists(&plan.collection)
            .await
            .context("failed to check for an existing collection")?
    {
        let existing = verify(store, plan).await?;
        let problems = existing.incomplete();
        if !problems.is_empty() {
            anyhow::bail!(
                "collection '{}.{}' exists but is not fully initialized: {}",
                plan.database,
                plan.collection,
                problems.join("; ")
            );
        }

        tracing::warn!(
            collection = %plan.collection,
            "collection already initialized, leaving the database untouched"
        );
        return Ok(BootstrapReport::new(plan, true));
    }

    let mut report = BootstrapReport::new(plan, false);
    for step in pipeline.run(store).await? {
        report.record(step);
    }

    tracing::info!(
        database = %plan.database,
        inserted = report.inserted,
        indexes = ?report.indexes,
        user = ?report.user,
        "database bootstrap finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use delivery_db::{DbError, MemoryStore, StepOutcome};

    use super::*;

    fn plan() -> BootstrapPlan {
        BootstrapPlan::from_settings(&Settings::default()).unwrap()
    }

    #[test]
    fn default_plan_targets_delivery_db() {
        let plan = plan();
        assert_eq!(plan.database, "delivery_db");
        assert_eq!(plan.collection, "deliveries");
        assert_eq!(plan.seed.len(), 5);
        assert_eq!(plan.indexes.len(), 2);
        assert_eq!(plan.app_user.username, "stud");
        assert_eq!(plan.on_existing, RerunPolicy::Fail);
    }

    #[test]
    fn steps_are_registered_in_fixed_order() {
        let names = plan().pipeline(Utc::now()).unwrap().step_names();
        assert_eq!(
            names,
            vec!["create_collection", "seed_deliveries", "create_indexes", "create_app_user"]
        );
    }

    #[tokio::test]
    async fn fresh_target_is_fully_initialized() {
        let store = MemoryStore::new("delivery_db");
        let report = run(&store, &plan(), Utc::now()).await.unwrap();

        assert!(!report.skipped);
        assert_eq!(report.steps.len(), 4);
        assert!(report
            .steps
            .iter()
            .all(|step| matches!(step.outcome, StepOutcome::Completed { .. })));

        assert_eq!(report.inserted, 5);
        assert_eq!(report.indexes, vec!["user_id_1", "status_1"]);
        assert_eq!(report.user.as_deref(), Some("stud"));

        assert_eq!(store.count_documents("deliveries", doc! {}).await.unwrap(), 5);
        let keys = store.index_keys("deliveries").await.unwrap();
        assert!(keys.contains(&doc! { "user_id": 1 }));
        assert!(keys.contains(&doc! { "status": 1 }));
        assert!(store.user_exists("stud").await.unwrap());
    }

    #[tokio::test]
    async fn rerun_with_fail_policy_stops_at_collection_creation() {
        let store = MemoryStore::new("delivery_db");
        run(&store, &plan(), Utc::now()).await.unwrap();

        let err = run(&store, &plan(), Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to run bootstrap step 'create_collection'");
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::CollectionExists(name)) if name == "deliveries"
        ));
        assert_eq!(store.count_documents("deliveries", doc! {}).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn rerun_with_skip_policy_leaves_target_untouched() {
        let store = MemoryStore::new("delivery_db");
        run(&store, &plan(), Utc::now()).await.unwrap();

        let plan = BootstrapPlan {
            on_existing: RerunPolicy::Skip,
            ..plan()
        };
        let report = run(&store, &plan, Utc::now()).await.unwrap();

        assert!(report.skipped);
        assert!(report.steps.is_empty());
        assert_eq!(report.inserted, 0);
        assert_eq!(report.user, None);
        assert_eq!(store.count_documents("deliveries", doc! {}).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn skip_policy_rejects_an_empty_existing_collection() {
        let store = MemoryStore::new("delivery_db");
        store.create_collection("deliveries").await.unwrap();

        let plan = BootstrapPlan {
            on_existing: RerunPolicy::Skip,
            ..plan()
        };
        let err = run(&store, &plan, Utc::now()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("is not fully initialized"), "{}", message);
        assert!(message.contains("found 0 of 5 seeded deliveries"), "{}", message);
        assert_eq!(store.count_documents("deliveries", doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn skip_policy_rejects_a_target_missing_the_app_user() {
        let plan = plan();
        let store = MemoryStore::new("delivery_db");
        let mut pipeline = Pipeline::new();
        crate::modules::deliveries::register(&mut pipeline, &plan, Utc::now()).unwrap();
        pipeline.run(&store).await.unwrap();

        let plan = BootstrapPlan {
            on_existing: RerunPolicy::Skip,
            ..plan
        };
        let err = run(&store, &plan, Utc::now()).await.unwrap_err();

        assert!(err.to_string().contains("application user 'stud' is missing"));
        assert!(!store.user_exists("stud").await.unwrap());
    }

    #[tokio::test]
    async fn unrepresentable_seed_offset_fails_before_any_write() {
        let mut plan = plan();
        plan.seed[0].created_offset_days = i64::MAX;
        let store = MemoryStore::new("delivery_db");

        let err = run(&store, &plan, Utc::now()).await.unwrap_err();

        assert_eq!(err.to_string(), "failed to prepare seed deliveries");
        assert!(!store.collection_exists("deliveries").await.unwrap());
    }

    #[tokio::test]
    async fn user_failure_keeps_seeded_data() {
        let plan = plan();
        let store = MemoryStore::new("delivery_db").with_user(plan.app_user.clone());

        let err = run(&store, &plan, Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to run bootstrap step 'create_app_user'");

        assert_eq!(store.count_documents("deliveries", doc! {}).await.unwrap(), 5);
        assert_eq!(store.index_keys("deliveries").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn mismatched_database_is_rejected_before_any_write() {
        let store = MemoryStore::new("another_db");
        let err = run(&store, &plan(), Utc::now()).await.unwrap_err();

        assert!(err.to_string().contains("'another_db'"));
        assert!(!store.collection_exists("deliveries").await.unwrap());
    }
}
