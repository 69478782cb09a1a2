use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{Report, ReportStore, StoreError, UploadOutcome};

/// Client for the report store REST API (see `src/bin/report_server.rs`).
#[derive(Clone)]
pub struct HttpReportStore {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct ReportDto {
    id: i64,
    name: String,
    content: String,
    created_at: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    report_id: i64,
}

impl HttpReportStore {
    pub fn new(client: Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }

    async fn fetch_reports(&self, query: &[(&str, String)]) -> Result<Vec<Report>, StoreError> {
        let url = format!("{}/api/reports", self.base);
        let dtos: Vec<ReportDto> = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .context("querying report store")?
            .error_for_status()
            .context("report store returned an error status")?
            .json()
            .await
            .context("decoding report list")?;
        debug!("store returned {} reports for {:?}", dtos.len(), query);
        dtos.into_iter().map(into_report).collect()
    }
}

fn into_report(dto: ReportDto) -> Result<Report, StoreError> {
    let created_at = DateTime::parse_from_rfc3339(&dto.created_at)
        .with_context(|| format!("bad created_at {:?} for report {}", dto.created_at, dto.id))?
        .with_timezone(&Utc);
    Ok(Report {
        id: dto.id,
        name: dto.name,
        content: dto.content,
        created_at,
    })
}

#[async_trait]
impl ReportStore for HttpReportStore {
    async fn by_date(&self, date: NaiveDate) -> Result<Vec<Report>, StoreError> {
        self.fetch_reports(&[("date", date.format("%Y-%m-%d").to_string())])
            .await
    }

    async fn by_month(&self, year: i32, month: u32) -> Result<Vec<Report>, StoreError> {
        self.fetch_reports(&[("month", format!("{:04}-{:02}", year, month))])
            .await
    }

    async fn all(&self) -> Result<Vec<Report>, StoreError> {
        self.fetch_reports(&[("full", "1".to_string())]).await
    }

    async fn get(&self, id: i64) -> Result<Report, StoreError> {
        let url = format!("{}/api/reports/{}", self.base, id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("querying report store")?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id));
        }
        let dto: ReportDto = resp
            .error_for_status()
            .context("report store returned an error status")?
            .json()
            .await
            .context("decoding report")?;
        into_report(dto)
    }

    async fn upload(&self, name: &str, content: &str) -> Result<UploadOutcome, StoreError> {
        let url = format!("{}/api/reports/upload", self.base);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": name, "content": content }))
            .send()
            .await
            .context("uploading report")?;
        if resp.status() == StatusCode::CONFLICT {
            return Ok(UploadOutcome::Duplicate);
        }
        if !resp.status().is_success() {
            return Err(StoreError::Other(anyhow!(
                "upload rejected with status {}",
                resp.status()
            )));
        }
        let body: UploadResponse = resp.json().await.context("decoding upload response")?;
        Ok(UploadOutcome::Created(body.report_id))
    }
}
