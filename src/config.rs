// src/config.rs

use std::env;

pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5000";
pub const DEFAULT_API_PATH: &str = "/api";
pub const API_BASE_ENV: &str = "SINKLOG_API_BASE_URL";

/// 解析 API 基础地址：命令行参数 > 环境变量 > 默认 `/api`
pub fn resolve_api_base(cli_value: Option<&str>) -> String {
    resolve_from(cli_value, env::var(API_BASE_ENV).ok())
}

fn resolve_from(cli_value: Option<&str>, env_value: Option<String>) -> String {
    let raw = cli_value
        .map(str::to_string)
        .filter(|v| !v.trim().is_empty())
        .or(env_value.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_API_PATH.to_string());
    normalize_base(&raw)
}

/// A bare path such as `/api` is joined onto the default origin.
pub fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.is_empty() {
        return DEFAULT_ORIGIN.to_string();
    }
    let path = trimmed.trim_start_matches('/');
    format!("{}/{}", DEFAULT_ORIGIN, path)
}
