//! Sample deliveries inserted into an empty database.
//!
//! Timestamps are stored as day offsets from the moment of the run, so the
//! records always look like a few days of recent history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{Delivery, DeliveryStatus};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("seed file '{0}' contains no records")]
    Empty(PathBuf),

    #[error("{field} of {days} days is out of range (at most {MAX_OFFSET_DAYS} days either way)")]
    OffsetOutOfRange { field: &'static str, days: i64 },
}

/// Largest offset, in days, accepted for any seed timestamp.
pub const MAX_OFFSET_DAYS: i64 = 36_500;

/// Template for one seed delivery. Offsets are in days relative to the run;
/// negative values are in the past, `None` becomes `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub status: DeliveryStatus,
    #[serde(default)]
    pub created_offset_days: i64,
    #[serde(default)]
    pub updated_offset_days: Option<i64>,
    pub user_id: i64,
    pub description: String,
    pub address: String,
    pub contact_phone: String,
    #[serde(default)]
    pub delivery_offset_days: Option<i64>,
}

impl SeedRecord {
    /// Reject offsets beyond [`MAX_OFFSET_DAYS`].
    pub fn validate(&self) -> Result<(), SeedError> {
        let offsets = [
            ("created_offset_days", Some(self.created_offset_days)),
            ("updated_offset_days", self.updated_offset_days),
            ("delivery_offset_days", self.delivery_offset_days),
        ];

        for (field, days) in offsets {
            if let Some(days) = days {
                if !(-MAX_OFFSET_DAYS..=MAX_OFFSET_DAYS).contains(&days) {
                    return Err(SeedError::OffsetOutOfRange { field, days });
                }
            }
        }

        Ok(())
    }

    /// Resolve the offsets against `now` into a concrete delivery.
    pub fn materialize(&self, now: DateTime<Utc>) -> Result<Delivery, SeedError> {
        let at = |field: &'static str, days: i64| {
            Duration::try_days(days)
                .and_then(|offset| now.checked_add_signed(offset))
                .map(bson::DateTime::from_chrono)
                .ok_or(SeedError::OffsetOutOfRange { field, days })
        };

        Ok(Delivery {
            status: self.status,
            created_at: at("created_offset_days", self.created_offset_days)?,
            updated_at: self
                .updated_offset_days
                .map(|days| at("updated_offset_days", days))
                .transpose()?,
            user_id: self.user_id,
            description: self.description.clone(),
            address: self.address.clone(),
            contact_phone: self.contact_phone.clone(),
            delivery_time: self
                .delivery_offset_days
                .map(|days| at("delivery_offset_days", days))
                .transpose()?,
        })
    }
}

fn record(
    status: DeliveryStatus,
    created: i64,
    updated: Option<i64>,
    description: &str,
    address: &str,
    contact_phone: &str,
    delivery: Option<i64>,
) -> SeedRecord {
    SeedRecord {
        status,
        created_offset_days: created,
        updated_offset_days: updated,
        user_id: 1,
        description: description.to_string(),
        address: address.to_string(),
        contact_phone: contact_phone.to_string(),
        delivery_offset_days: delivery,
    }
}

/// The five built-in sample deliveries, all owned by user 1.
pub fn default_seed() -> Vec<SeedRecord> {
    vec![
        record(
            DeliveryStatus::Pending,
            0,
            None,
            "Доставка смартфона с аксессуарами",
            "ул. Ленина, 10, кв. 5",
            "+7 (999) 123-45-67",
            None,
        ),
        record(
            DeliveryStatus::InProgress,
            -2,
            Some(-1),
            "Доставка ноутбука и периферии",
            "ул. Гагарина, 22, кв. 15",
            "+7 (999) 987-65-43",
            Some(1),
        ),
        record(
            DeliveryStatus::Delivered,
            -5,
            Some(-2),
            "Доставка телевизора и кронштейна",
            "пр. Мира, 156, кв. 78",
            "+7 (999) 456-78-90",
            Some(-2),
        ),
        record(
            DeliveryStatus::Canceled,
            -3,
            Some(-2),
            "Доставка книг",
            "ул. Советская, 42, кв. 15",
            "+7 (999) 111-22-33",
            None,
        ),
        record(
            DeliveryStatus::Pending,
            0,
            None,
            "Доставка мебели",
            "ул. Пушкина, 15, кв. 10",
            "+7 (999) 444-55-66",
            Some(5),
        ),
    ]
}

/// Read seed records from a JSON array of [`SeedRecord`].
pub fn load_seed_file(path: &Path) -> Result<Vec<SeedRecord>, SeedError> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let records: Vec<SeedRecord> = serde_json::from_str(&content).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if records.is_empty() {
        return Err(SeedError::Empty(path.to_path_buf()));
    }

    for record in &records {
        record.validate()?;
    }

    Ok(records)
}

/// Seed records from `path` when given, otherwise the built-in set.
pub fn resolve_seed(path: Option<&Path>) -> Result<Vec<SeedRecord>, SeedError> {
    match path {
        Some(path) => {
            let records = load_seed_file(path)?;
            tracing::info!(path = %path.display(), records = records.len(), "loaded seed file");
            Ok(records)
        }
        None => Ok(default_seed()),
    }
}
