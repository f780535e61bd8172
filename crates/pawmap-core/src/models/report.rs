use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Pending,
    Processed,
}

/// A moderation flag raised against a marker. Filing one bumps the
/// marker's `report_count` but never changes its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Report {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "markerId")]
    pub marker_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub reason: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ReportStatus,
}
