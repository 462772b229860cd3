use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a delivery. Stored as a plain string; the database does
/// not enforce the set of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Delivered,
    Canceled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 4] = [
        DeliveryStatus::Pending,
        DeliveryStatus::InProgress,
        DeliveryStatus::Delivered,
        DeliveryStatus::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document in the `deliveries` collection.
///
/// Optional timestamps are written as explicit `null`, so every document
/// carries all eight fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub status: DeliveryStatus,
    pub created_at: DateTime,
    /// `None` until the delivery is first updated.
    pub updated_at: Option<DateTime>,
    /// Owning user; not checked against any user table.
    pub user_id: i64,
    pub description: String,
    pub address: String,
    /// Human-formatted, not normalized.
    pub contact_phone: String,
    /// `None` while unscheduled.
    pub delivery_time: Option<DateTime>,
}

/// Field names of a delivery document, in insertion order.
pub const DELIVERY_FIELDS: [&str; 8] = [
    "status",
    "created_at",
    "updated_at",
    "user_id",
    "description",
    "address",
    "contact_phone",
    "delivery_time",
];

impl Delivery {
    /// Encode as the BSON document stored in the deliveries collection.
    pub fn to_document(&self) -> Result<bson::Document, bson::ser::Error> {
        bson::to_document(self)
    }
}
