use anyhow::Context;
use async_trait::async_trait;

use crate::store::Store;

/// Values a completed step produced, for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepOutput {
    #[default]
    Nothing,
    Inserted(usize),
    Indexes(Vec<String>),
    User(String),
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { detail: String, output: StepOutput },
    Skipped { reason: String },
}

impl StepOutcome {
    pub fn completed(detail: impl Into<String>) -> Self {
        Self::Completed {
            detail: detail.into(),
            output: StepOutput::Nothing,
        }
    }

    /// Attach `output` to a completed outcome. Skipped outcomes are unchanged.
    pub fn with_output(self, output: StepOutput) -> Self {
        match self {
            Self::Completed { detail, .. } => Self::Completed { detail, output },
            skipped => skipped,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: &'static str,
    pub outcome: StepOutcome,
}

/// One unit of bootstrap work against a [`Store`].
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique name for this step, used in logs and error context.
    fn name(&self) -> &'static str;

    async fn run(&self, store: &dyn Store) -> anyhow::Result<StepOutcome>;
}

/// Ordered list of steps. Runs strictly in registration order and stops at the
/// first failure; earlier steps are not rolled back.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append `step`; returns `self` so registrations chain.
    pub fn register(&mut self, step: impl Step + 'static) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step against `store`, returning one report per step.
    pub async fn run(&self, store: &dyn Store) -> anyhow::Result<Vec<StepReport>> {
        tracing::info!(
            database = store.database_name(),
            "running bootstrap steps in order: {:?}",
            self.step_names()
        );

        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            tracing::info!(step = step.name(), "running bootstrap step");

            let outcome = step
                .run(store)
                .await
                .with_context(|| format!("failed to run bootstrap step '{}'", step.name()))?;

            match &outcome {
                StepOutcome::Completed { detail, .. } => {
                    tracing::info!(step = step.name(), %detail, "bootstrap step completed")
                }
                StepOutcome::Skipped { reason } => {
                    tracing::warn!(step = step.name(), %reason, "bootstrap step skipped")
                }
            }

            reports.push(StepReport {
                name: step.name(),
                outcome,
            });
        }

        Ok(reports)
    }
}
