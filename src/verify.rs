//! Post-bootstrap checks against a live target.

use anyhow::Context;
use bson::doc;
use delivery_db::store::index_keys;
use delivery_db::Store;

use crate::bootstrap::BootstrapPlan;
use crate::modules::deliveries::models::DeliveryStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: DeliveryStatus,
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub expected_total: u64,
    pub actual_total: u64,
    pub statuses: Vec<StatusCount>,
    /// Fields of configured indexes that were not found on the collection.
    pub missing_indexes: Vec<String>,
    pub username: String,
    pub user_present: bool,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.expected_total == self.actual_total
            && self.statuses.iter().all(|count| count.expected == count.actual)
            && self.missing_indexes.is_empty()
            && self.user_present
    }

    /// Reasons the target is not a finished bootstrap, empty when it is.
    ///
    /// Unlike [`is_ok`](Self::is_ok) this tolerates documents written after
    /// the seed, so it holds for a target the application has been using.
    pub fn incomplete(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.actual_total < self.expected_total {
            problems.push(format!(
                "found {} of {} seeded deliveries",
                self.actual_total, self.expected_total
            ));
        }
        if !self.missing_indexes.is_empty() {
            problems.push(format!("indexes missing on {}", self.missing_indexes.join(", ")));
        }
        if !self.user_present {
            problems.push(format!("application user '{}' is missing", self.username));
        }

        problems
    }

    /// `Ok` when every check passed, otherwise an error naming `database`.
    pub fn ensure_ok(&self, database: &str) -> anyhow::Result<()> {
        if !self.is_ok() {
            anyhow::bail!("database '{}' does not match the bootstrap plan", database);
        }
        Ok(())
    }

    /// One line per check, `ok` or `FAIL` first.
    pub fn lines(&self) -> Vec<String> {
        let mark = |ok: bool| if ok { "ok  " } else { "FAIL" };

        let mut lines = vec![format!(
            "{} documents: expected {}, found {}",
            mark(self.expected_total == self.actual_total),
            self.expected_total,
            self.actual_total
        )];

        for count in &self.statuses {
            lines.push(format!(
                "{} status {}: expected {}, found {}",
                mark(count.expected == count.actual),
                count.status,
                count.expected,
                count.actual
            ));
        }

        lines.push(if self.missing_indexes.is_empty() {
            format!("{} indexes present", mark(true))
        } else {
            format!(
                "{} indexes missing: {}",
                mark(false),
                self.missing_indexes.join(", ")
            )
        });

        lines.push(format!(
            "{} application user '{}' present",
            mark(self.user_present),
            self.username
        ));
        lines
    }
}

/// Compare the target with what `plan` would have created.
pub async fn verify(store: &dyn Store, plan: &BootstrapPlan) -> anyhow::Result<VerifyReport> {
    let collection = plan.collection.as_str();

    let actual_total = store
        .count_documents(collection, doc! {})
        .await
        .context("failed to count deliveries")?;

    let mut statuses = Vec::with_capacity(DeliveryStatus::ALL.len());
    for status in DeliveryStatus::ALL {
        let expected = plan.seed.iter().filter(|record| record.status == status).count() as u64;
        let actual = store
            .count_documents(collection, doc! { "status": status.as_str() })
            .await
            .with_context(|| format!("failed to count '{}' deliveries", status))?;
        statuses.push(StatusCount {
            status,
            expected,
            actual,
        });
    }

    let existing = store
        .index_keys(collection)
        .await
        .context("failed to list indexes")?;
    let missing_indexes = plan
        .indexes
        .iter()
        .filter(|spec| !existing.contains(&index_keys(spec)))
        .map(|spec| spec.field.clone())
        .collect();

    let user_present = store
        .user_exists(&plan.app_user.username)
        .await
        .context("failed to look up application user")?;

    Ok(VerifyReport {
        expected_total: plan.seed.len() as u64,
        actual_total,
        statuses,
        missing_indexes,
        username: plan.app_user.username.clone(),
        user_present,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use delivery_db::MemoryStore;
    use delivery_kernel::settings::Settings;

    use super::*;

    fn plan() -> BootstrapPlan {
        BootstrapPlan::from_settings(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn initialized_target_passes() {
        let store = MemoryStore::new("delivery_db");
        crate::run(&store, &plan(), Utc::now()).await.unwrap();

        let report = verify(&store, &plan()).await.unwrap();
        assert!(report.is_ok(), "{:?}", report.lines());
        assert!(report.ensure_ok("delivery_db").is_ok());
        assert_eq!(report.actual_total, 5);

        let pending = report
            .statuses
            .iter()
            .find(|count| count.status == DeliveryStatus::Pending)
            .unwrap();
        assert_eq!(pending.actual, 2);
    }

    #[tokio::test]
    async fn empty_target_fails_every_check() {
        let store = MemoryStore::new("delivery_db");
        let report = verify(&store, &plan()).await.unwrap();

        assert!(!report.is_ok());
        assert_eq!(report.actual_total, 0);
        assert_eq!(report.missing_indexes, vec!["user_id", "status"]);
        assert!(!report.user_present);
        assert!(report.lines().iter().all(|line| line.starts_with("FAIL")));
        assert_eq!(report.incomplete().len(), 3);

        let err = report.ensure_ok("delivery_db").unwrap_err();
        assert_eq!(
            err.to_string(),
            "database 'delivery_db' does not match the bootstrap plan"
        );
    }

    #[tokio::test]
    async fn extra_documents_fail_verification_but_count_as_initialized() {
        let store = MemoryStore::new("delivery_db");
        crate::run(&store, &plan(), Utc::now()).await.unwrap();
        store
            .insert_many("deliveries", vec![doc! { "status": "pending", "user_id": 9_i64 }])
            .await
            .unwrap();

        let report = verify(&store, &plan()).await.unwrap();
        assert!(!report.is_ok());
        assert!(report.incomplete().is_empty());
    }
}
