// src/server.rs

//! Reference backend: the two log endpoints plus a health check, backed by
//! the append-only SQLite store.

use crate::db;
use crate::error::{Result, SinkError};
use crate::models::{Action, GetLogsResponse, LogEntry, LogUsageRequest, LogUsageResponse, Tableware};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }
}

/// 所有字段都是可选的，缺失时返回 400 而不是反序列化错误
#[derive(Debug, Deserialize)]
struct RawLogUsage {
    name: Option<String>,
    tableware: Option<String>,
    image: Option<String>,
    action: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/log_usage", post(log_usage))
        .route("/get_logs", get(get_logs))
        .route("/health", get(health));
    // 浏览器前端可能不在同一个源
    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 启动服务并一直运行
pub async fn run(bind: &str, db_path: &Path) -> Result<()> {
    let conn = db::open_connection(db_path)?;
    let app = build_router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving on http://{}/api (db: {})", listener.local_addr()?, db_path.display());
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn validate(raw: RawLogUsage) -> std::result::Result<LogUsageRequest, String> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(name), Some(tableware), Some(image), Some(action)) = (
        present(raw.name),
        present(raw.tableware),
        present(raw.image),
        present(raw.action),
    ) else {
        return Err("Missing required fields".to_string());
    };

    let action = match action.as_str() {
        "enter" => Action::Enter,
        "exit" => Action::Exit,
        _ => return Err("Action must be 'enter' or 'exit'".to_string()),
    };
    let tableware: Tableware = tableware
        .parse()
        .map_err(|_| format!("Unknown tableware: {}", tableware))?;

    Ok(LogUsageRequest {
        name,
        tableware,
        image,
        action,
    })
}

fn lock_db(state: &AppState) -> Result<MutexGuard<'_, Connection>> {
    state
        .db
        .lock()
        .map_err(|_| SinkError::Storage("database lock poisoned".to_string()))
}

fn append(state: &AppState, req: &LogUsageRequest) -> Result<LogEntry> {
    let conn = lock_db(state)?;
    db::add_log(&conn, req)
}

fn read_all(state: &AppState) -> Result<Vec<LogEntry>> {
    let conn = lock_db(state)?;
    db::fetch_logs(&conn)
}

async fn log_usage(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RawLogUsage>, JsonRejection>,
) -> Response {
    let Ok(Json(raw)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let req = match validate(raw) {
        Ok(req) => req,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match append(&state, &req) {
        Ok(entry) => {
            info!("Logged {} {} for {}", entry.tableware, entry.action, entry.name);
            let body = LogUsageResponse {
                status: "logged".to_string(),
                entry,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => {
            error!("log_usage error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn get_logs(State(state): State<AppState>) -> Response {
    match read_all(&state) {
        Ok(records) => Json(GetLogsResponse {
            count: records.len(),
            records,
        })
        .into_response(),
        Err(e) => {
            error!("get_logs error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Backend is running" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, tableware: &str, action: &str) -> RawLogUsage {
        RawLogUsage {
            name: Some(name.to_string()),
            tableware: Some(tableware.to_string()),
            image: Some("data:image/jpeg;base64,AAAA".to_string()),
            action: Some(action.to_string()),
        }
    }

    #[test]
    fn poisoned_lock_is_a_storage_error() {
        let conn = Connection::open_in_memory().unwrap();
        db::initialize_db(&conn).unwrap();
        let state = AppState::new(conn);

        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.db.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let err = read_all(&state).unwrap_err();
        assert!(matches!(err, SinkError::Storage(_)));
        assert_eq!(err.to_string(), "Storage Error: database lock poisoned");
        let err = append(&state, &validate(raw("Alex", "Mug", "enter")).unwrap()).unwrap_err();
        assert!(matches!(err, SinkError::Storage(_)));
    }

    #[test]
    fn validate_accepts_complete_body() {
        let req = validate(raw("Alex", "Mug", "exit")).unwrap();
        assert_eq!(req.tableware, Tableware::Mug);
        assert_eq!(req.action, Action::Exit);
    }

    #[test]
    fn validate_rejects_missing_or_blank_fields() {
        let mut body = raw("Alex", "Mug", "enter");
        body.image = None;
        assert_eq!(validate(body).unwrap_err(), "Missing required fields");
        assert_eq!(
            validate(raw("  ", "Mug", "enter")).unwrap_err(),
            "Missing required fields"
        );
    }

    #[test]
    fn validate_rejects_bad_action_and_tableware() {
        assert_eq!(
            validate(raw("Alex", "Mug", "ENTER")).unwrap_err(),
            "Action must be 'enter' or 'exit'"
        );
        assert_eq!(
            validate(raw("Alex", "Teapot", "enter")).unwrap_err(),
            "Unknown tableware: Teapot"
        );
    }
}
