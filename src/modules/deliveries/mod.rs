pub mod models;
pub mod seed;

use anyhow::Context;
use async_trait::async_trait;
use delivery_db::{Pipeline, Step, StepOutcome, StepOutput, Store};
use delivery_kernel::settings::IndexSpec;

use crate::bootstrap::BootstrapPlan;
use models::Delivery;
use seed::SeedError;

/// Creates the empty deliveries collection. Fails if it already exists.
pub struct CreateCollection {
    collection: String,
}

#[async_trait]
impl Step for CreateCollection {
    fn name(&self) -> &'static str {
        "create_collection"
    }

    async fn run(&self, store: &dyn Store) -> anyhow::Result<StepOutcome> {
        store.create_collection(&self.collection).await?;
        Ok(StepOutcome::completed(format!("created collection '{}'", self.collection)))
    }
}

/// Inserts the seed deliveries as a single batch.
pub struct SeedDeliveries {
    collection: String,
    deliveries: Vec<Delivery>,
}

#[async_trait]
impl Step for SeedDeliveries {
    fn name(&self) -> &'static str {
        "seed_deliveries"
    }

    async fn run(&self, store: &dyn Store) -> anyhow::Result<StepOutcome> {
        let documents = self
            .deliveries
            .iter()
            .map(Delivery::to_document)
            .collect::<Result<Vec<_>, _>>()
            .context("failed to encode seed deliveries")?;

        let inserted = store.insert_many(&self.collection, documents).await?;
        if inserted != self.deliveries.len() {
            tracing::warn!(
                expected = self.deliveries.len(),
                inserted,
                "store acknowledged fewer seed deliveries than sent"
            );
        }

        Ok(StepOutcome::completed(format!(
            "inserted {} deliveries into '{}'",
            inserted, self.collection
        ))
        .with_output(StepOutput::Inserted(inserted)))
    }
}

/// Creates one single-field index per configured spec.
pub struct CreateIndexes {
    collection: String,
    indexes: Vec<IndexSpec>,
}

#[async_trait]
impl Step for CreateIndexes {
    fn name(&self) -> &'static str {
        "create_indexes"
    }

    async fn run(&self, store: &dyn Store) -> anyhow::Result<StepOutcome> {
        if self.indexes.is_empty() {
            return Ok(StepOutcome::skipped("no indexes configured"));
        }

        let mut names = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let name = store
                .create_index(&self.collection, index)
                .await
                .with_context(|| format!("failed to create index on '{}'", index.field))?;
            tracing::debug!(index = %name, field = %index.field, "index ready");
            names.push(name);
        }

        let detail = format!("created indexes {}", names.join(", "));
        Ok(StepOutcome::completed(detail).with_output(StepOutput::Indexes(names)))
    }
}

/// Register the collection, seed and index steps, in that order.
///
/// Seed records are resolved against `now` here, so an offset that cannot be
/// represented fails before any step runs.
pub fn register(
    pipeline: &mut Pipeline,
    plan: &BootstrapPlan,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), SeedError> {
    let deliveries = plan
        .seed
        .iter()
        .map(|record| record.materialize(now))
        .collect::<Result<Vec<_>, _>>()?;

    pipeline
        .register(CreateCollection {
            collection: plan.collection.clone(),
        })
        .register(SeedDeliveries {
            collection: plan.collection.clone(),
            deliveries,
        })
        .register(CreateIndexes {
            collection: plan.collection.clone(),
            indexes: plan.indexes.clone(),
        });

    Ok(())
}
