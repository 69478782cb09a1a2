use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Mutex;

use super::{Report, ReportStore, StoreError, UploadOutcome};

/// In-process report store. Backs the navigator tests and can seed demo data;
/// the duplicate-detection contract matches the REST backend exactly.
#[derive(Default)]
pub struct MemoryReportStore {
    inner: Mutex<Vec<Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a report with an explicit timestamp, bypassing duplicate
    /// detection. Intended for tests and seeding.
    pub fn insert_at(&self, name: &str, content: &str, created_at: DateTime<Utc>) -> i64 {
        let mut reports = self.inner.lock().unwrap();
        let id = reports.len() as i64 + 1;
        reports.push(Report {
            id,
            name: name.to_string(),
            content: content.to_string(),
            created_at,
        });
        id
    }

    fn newest_first(mut reports: Vec<Report>) -> Vec<Report> {
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn by_date(&self, date: NaiveDate) -> Result<Vec<Report>, StoreError> {
        let reports = self.inner.lock().unwrap();
        Ok(reports
            .iter()
            .filter(|r| r.created_at.date_naive() == date)
            .cloned()
            .collect())
    }

    async fn by_month(&self, year: i32, month: u32) -> Result<Vec<Report>, StoreError> {
        let reports = self.inner.lock().unwrap();
        let matched = reports
            .iter()
            .filter(|r| r.created_at.year() == year && r.created_at.month() == month)
            .cloned()
            .collect();
        Ok(Self::newest_first(matched))
    }

    async fn all(&self) -> Result<Vec<Report>, StoreError> {
        let reports = self.inner.lock().unwrap();
        Ok(Self::newest_first(reports.clone()))
    }

    async fn get(&self, id: i64) -> Result<Report, StoreError> {
        let reports = self.inner.lock().unwrap();
        reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn upload(&self, name: &str, content: &str) -> Result<UploadOutcome, StoreError> {
        let mut reports = self.inner.lock().unwrap();
        if reports
            .iter()
            .any(|r| r.name == name && r.content == content)
        {
            return Ok(UploadOutcome::Duplicate);
        }
        let id = reports.len() as i64 + 1;
        reports.push(Report {
            id,
            name: name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(UploadOutcome::Created(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn upload_detects_exact_duplicates_only() -> anyhow::Result<()> {
        let store = MemoryReportStore::new();
        let first = store.upload("daily", "a,b\n1,2\n").await?;
        assert!(matches!(first, UploadOutcome::Created(_)));

        let again = store.upload("daily", "a,b\n1,2\n").await?;
        assert_eq!(again, UploadOutcome::Duplicate);

        // Same name, different content: a fresh record, not a duplicate.
        let changed = store.upload("daily", "a,b\n3,4\n").await?;
        assert!(matches!(changed, UploadOutcome::Created(_)));
        Ok(())
    }

    #[tokio::test]
    async fn month_and_all_queries_are_newest_first() -> anyhow::Result<()> {
        let store = MemoryReportStore::new();
        let old = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2025, 9, 20, 8, 0, 0).unwrap();
        store.insert_at("older", "h\n", old);
        store.insert_at("newer", "h\n", new);

        let by_month = store.by_month(2025, 9).await?;
        assert_eq!(by_month[0].name, "newer");
        assert_eq!(by_month[1].name, "older");

        let all = store.all().await?;
        assert_eq!(all[0].name, "newer");
        Ok(())
    }

    #[tokio::test]
    async fn date_query_keeps_store_order() -> anyhow::Result<()> {
        let store = MemoryReportStore::new();
        let morning = Utc.with_ymd_and_hms(2025, 9, 25, 6, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 9, 25, 18, 0, 0).unwrap();
        store.insert_at("first", "h\n", morning);
        store.insert_at("second", "h\n", evening);

        let day = NaiveDate::from_ymd_opt(2025, 9, 25).unwrap();
        let reports = store.by_date(day).await?;
        assert_eq!(reports[0].name, "first");
        assert_eq!(reports[1].name, "second");

        let none = store
            .by_date(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap())
            .await?;
        assert!(none.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_id_is_not_found() {
        let store = MemoryReportStore::new();
        let err = store.get(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }
}
