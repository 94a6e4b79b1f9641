// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database Error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 摄像头无法打开 (权限或设备问题)，可以重新 start
    #[error("{0}")]
    Camera(String),

    /// 表单校验失败，不会发出网络请求
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Could not load logs")]
    LogsUnavailable,
}

pub type Result<T> = std::result::Result<T, SinkError>;
