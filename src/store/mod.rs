use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;
pub mod memory;

pub use http::HttpReportStore;
pub use memory::MemoryReportStore;

/// One stored report. `content` is raw delimited text with a header row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Date portion of the timestamp, as shown in list labels and titles.
    pub fn created_date(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }
}

/// Result of pushing a report into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Created(i64),
    /// A record with identical `(name, content)` already exists.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read/write access to the report store. Queries that filter by month or
/// take no filter return newest first; date queries keep store order.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn by_date(&self, date: NaiveDate) -> Result<Vec<Report>, StoreError>;
    async fn by_month(&self, year: i32, month: u32) -> Result<Vec<Report>, StoreError>;
    async fn all(&self) -> Result<Vec<Report>, StoreError>;
    async fn get(&self, id: i64) -> Result<Report, StoreError>;
    async fn upload(&self, name: &str, content: &str) -> Result<UploadOutcome, StoreError>;
}
