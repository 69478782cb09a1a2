//! REST backend holding the reports the bot browses.
//!
//! Endpoints:
//!   POST /api/reports/upload   {name, content} -> 200 created | 409 duplicate
//!   GET  /api/reports          summaries, newest first
//!   GET  /api/reports?date=YYYY-MM-DD   full records, store order
//!   GET  /api/reports?month=YYYY-MM     full records, newest first
//!   GET  /api/reports?full=1            full records, newest first
//!   GET  /api/reports/{id}     full record | 404

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reportbot::navigator::input::{parse_date, parse_month};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

#[derive(Deserialize, Default)]
struct ListParams {
    date: Option<String>,
    month: Option<String>,
    full: Option<String>,
}

type ApiResponse = (StatusCode, Json<Value>);

fn internal_error(e: anyhow::Error) -> ApiResponse {
    tracing::error!("request failed: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal error" })),
    )
}

async fn upload_report(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResponse {
    let (Some(name), Some(content)) = (
        body.get("name").and_then(Value::as_str),
        body.get("content").and_then(Value::as_str),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid payload" })),
        );
    };

    let db = state.db.lock().unwrap();
    let existing: rusqlite::Result<Option<i64>> = db
        .query_row(
            "SELECT id FROM report WHERE name = ?1 AND content = ?2",
            params![name, content],
            |row| row.get(0),
        )
        .optional();
    match existing {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "message": "Duplicate report" })),
            );
        }
        Ok(None) => {}
        Err(e) => return internal_error(e.into()),
    }

    let created_at = Utc::now().to_rfc3339();
    if let Err(e) = db.execute(
        "INSERT INTO report (name, content, created_at) VALUES (?1, ?2, ?3)",
        params![name, content, created_at],
    ) {
        return internal_error(e.into());
    }
    let id = db.last_insert_rowid();
    info!(id, name, "report saved");
    (
        StatusCode::OK,
        Json(json!({ "message": "Report saved", "report_id": id })),
    )
}

fn full_rows(db: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Value> {
    let mut stmt = db.prepare(sql).context("preparing query")?;
    let rows = stmt
        .query_map(args, |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "name": row.get::<_, String>(1)?,
                "content": row.get::<_, String>(2)?,
                "created_at": row.get::<_, String>(3)?,
            }))
        })
        .context("running query")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("reading rows")?;
    Ok(Value::Array(rows))
}

async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResponse {
    let db = state.db.lock().unwrap();

    if let Some(raw) = params.date.as_deref() {
        let Some(date) = parse_date(raw) else {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid date, expected YYYY-MM-DD" })),
            );
        };
        let iso = date.format("%Y-%m-%d").to_string();
        return match full_rows(
            &db,
            "SELECT id, name, content, created_at FROM report WHERE DATE(created_at) = ?1",
            &[&iso],
        ) {
            Ok(rows) => (StatusCode::OK, Json(rows)),
            Err(e) => internal_error(e),
        };
    }

    if let Some(raw) = params.month.as_deref() {
        let Some((year, month)) = parse_month(raw) else {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid month, expected YYYY-MM" })),
            );
        };
        let year = format!("{:04}", year);
        let month = format!("{:02}", month);
        return match full_rows(
            &db,
            "SELECT id, name, content, created_at FROM report \
             WHERE strftime('%Y', created_at) = ?1 AND strftime('%m', created_at) = ?2 \
             ORDER BY created_at DESC",
            &[&year, &month],
        ) {
            Ok(rows) => (StatusCode::OK, Json(rows)),
            Err(e) => internal_error(e),
        };
    }

    if params.full.is_some() {
        return match full_rows(
            &db,
            "SELECT id, name, content, created_at FROM report ORDER BY created_at DESC",
            &[],
        ) {
            Ok(rows) => (StatusCode::OK, Json(rows)),
            Err(e) => internal_error(e),
        };
    }

    let summaries = (|| -> Result<Value> {
        let mut stmt = db
            .prepare("SELECT id, name, created_at FROM report ORDER BY created_at DESC")
            .context("preparing summary query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(json!({
                    "id": row.get::<_, i64>(0)?,
                    "name": row.get::<_, String>(1)?,
                    "created_at": row.get::<_, String>(2)?,
                }))
            })
            .context("running summary query")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("reading summary rows")?;
        Ok(Value::Array(rows))
    })();
    match summaries {
        Ok(rows) => (StatusCode::OK, Json(rows)),
        Err(e) => internal_error(e),
    }
}

async fn get_report(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResponse {
    let db = state.db.lock().unwrap();
    let row = db
        .query_row(
            "SELECT id, name, content, created_at FROM report WHERE id = ?1",
            params![id],
            |row| {
                Ok(json!({
                    "id": row.get::<_, i64>(0)?,
                    "name": row.get::<_, String>(1)?,
                    "content": row.get::<_, String>(2)?,
                    "created_at": row.get::<_, String>(3)?,
                }))
            },
        )
        .optional();
    match row {
        Ok(Some(report)) => (StatusCode::OK, Json(report)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Not found" })),
        ),
        Err(e) => internal_error(e.into()),
    }
}

fn open_db(path: &str) -> Result<Connection> {
    let db = Connection::open(path).with_context(|| format!("opening database {}", path))?;
    db.execute(
        "CREATE TABLE IF NOT EXISTS report (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("creating report table")?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let db_path = env::var("REPORTS_DB_PATH").unwrap_or_else(|_| "reports.db".to_string());
    let addr = env::var("REPORT_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:5001".to_string());

    let state = AppState {
        db: Arc::new(Mutex::new(open_db(&db_path)?)),
    };
    let app = Router::new()
        .route("/api/reports/upload", post(upload_report))
        .route("/api/reports", get(list_reports))
        .route("/api/reports/{id}", get(get_report))
        .with_state(state);

    info!(%addr, db = %db_path, "report server listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded_db() -> Connection {
        let db = open_db(":memory:").unwrap();
        db.execute(
            "INSERT INTO report (name, content, created_at) VALUES \
             ('a', 'h\n1\n', '2025-09-25T08:00:00+00:00'), \
             ('b', 'h\n2\n', '2025-09-26T08:00:00+00:00'), \
             ('c', 'h\n3\n', '2025-10-01T08:00:00+00:00')",
            [],
        )
        .unwrap();
        db
    }

    fn state_with(db: Connection) -> AppState {
        AppState {
            db: Arc::new(Mutex::new(db)),
        }
    }

    #[tokio::test]
    async fn upload_conflicts_on_exact_duplicate_only() {
        let state = state_with(open_db(":memory:").unwrap());
        let payload = json!({ "name": "daily", "content": "h\n1\n" });

        let (status, body) = upload_report(State(state.clone()), Json(payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.0["report_id"].is_i64());

        let (status, _) = upload_report(State(state.clone()), Json(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Same name with changed content is a fresh record.
        let changed = json!({ "name": "daily", "content": "h\n2\n" });
        let (status, _) = upload_report(State(state), Json(changed)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_without_required_fields_is_rejected() {
        let state = state_with(open_db(":memory:").unwrap());
        let (status, _) = upload_report(State(state), Json(json!({ "name": "daily" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_returns_the_record_or_not_found() {
        let state = state_with(seeded_db());

        let (status, body) = get_report(State(state.clone()), Path(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.0["name"], "a");

        let (status, body) = get_report(State(state), Path(99)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["error"], "Not found");
    }

    #[test]
    fn date_filter_matches_created_day() {
        let db = seeded_db();
        let rows = full_rows(
            &db,
            "SELECT id, name, content, created_at FROM report WHERE DATE(created_at) = ?1",
            &[&"2025-09-25"],
        )
        .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "a");
    }

    #[test]
    fn month_filter_is_newest_first() {
        let db = seeded_db();
        let rows = full_rows(
            &db,
            "SELECT id, name, content, created_at FROM report \
             WHERE strftime('%Y', created_at) = ?1 AND strftime('%m', created_at) = ?2 \
             ORDER BY created_at DESC",
            &[&"2025", &"09"],
        )
        .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "b");
        assert_eq!(rows[1]["name"], "a");
    }

    #[test]
    fn database_file_is_created_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports.db");
        let _db = open_db(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
    }
}
