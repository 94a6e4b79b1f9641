// src/viewer.rs

use crate::api::LogApi;
use crate::error::Result;
use crate::models::LogEntry;
use base64::Engine;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

pub const EMPTY_MESSAGE: &str = "No logs found.";
pub const LOADING_MESSAGE: &str = "Loading logs...";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADERS: [&str; 5] = ["Timestamp", "Name", "Tableware", "Action", "Image"];

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Error(String),
    Loaded(Vec<LogEntry>),
}

pub struct LogViewer<A: LogApi> {
    api: A,
    state: ViewState,
}

impl<A: LogApi> LogViewer<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: ViewState::Loading,
        }
    }

    /// 打开视图时立即拉取一次
    pub async fn open(api: A) -> Self {
        let mut viewer = Self::new(api);
        viewer.refresh().await;
        viewer
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// 拉取全部日志。刷新和出错后的重试都走这里。
    /// `Loading` is only seen before the first fetch; a refresh holds
    /// `&mut self` until the new state is in place.
    pub async fn refresh(&mut self) {
        self.state = match self.api.fetch_logs().await {
            Ok(response) => ViewState::Loaded(response.records),
            Err(e) => {
                error!("Error fetching logs: {}", e);
                ViewState::Error(e.to_string())
            }
        };
    }

    pub async fn retry(&mut self) {
        self.refresh().await;
    }

    pub fn render(&self) -> String {
        match &self.state {
            ViewState::Loading => LOADING_MESSAGE.to_string(),
            ViewState::Error(message) => {
                format!("Error: {}\nRetry with `sinklog logs`.", message)
            }
            ViewState::Loaded(records) if records.is_empty() => EMPTY_MESSAGE.to_string(),
            ViewState::Loaded(records) => render_table(records),
        }
    }
}

fn render_table(records: &[LogEntry]) -> String {
    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|log| {
            [
                format_timestamp(&log.timestamp),
                log.name.clone(),
                log.tableware.clone(),
                log.action.to_string(),
                describe_image(&log.image),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![format!("Usage Logs ({})", records.len())];
    out.push(line(&HEADERS.map(String::from)));
    out.push(line(&widths.map(|w| "─".repeat(w))));
    for row in &rows {
        out.push(line(row));
    }
    out.join("\n")
}

/// 格式化为本地时间；解析失败时原样返回
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string();
    }
    // Python 风格的 isoformat()，没有时区，按 UTC 处理
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Utc
            .from_utc_datetime(&naive)
            .with_timezone(&Local)
            .format(DISPLAY_FORMAT)
            .to_string();
    }
    raw.to_string()
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(&str, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    Some((mime, bytes))
}

fn describe_image(uri: &str) -> String {
    match decode_data_uri(uri) {
        Some((mime, bytes)) => format!("{} {:.1} KiB", mime, bytes.len() as f64 / 1024.0),
        None => "(invalid image)".to_string(),
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// 把每条记录的图片解码写入 dir，文件名为 `<序号>-<name>.<ext>`
pub fn export_images(records: &[LogEntry], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (index, log) in records.iter().enumerate() {
        let Some((mime, bytes)) = decode_data_uri(&log.image) else {
            warn!("Skipping record {}: image is not a base64 data URI", index + 1);
            continue;
        };
        let name: String = log
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let path = dir.join(format!("{:03}-{}.{}", index + 1, name, extension_for(mime)));
        std::fs::write(&path, bytes)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::models::{Action, GetLogsResponse, LogUsageRequest, LogUsageResponse};
    use std::cell::Cell;

    struct FakeApi {
        records: Vec<LogEntry>,
        failures_left: Cell<u32>,
        calls: Cell<u32>,
    }

    impl FakeApi {
        fn with(records: Vec<LogEntry>, failures: u32) -> Self {
            Self {
                records,
                failures_left: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl LogApi for FakeApi {
        async fn submit_log(&self, _request: &LogUsageRequest) -> Result<LogUsageResponse> {
            unreachable!("viewer never writes")
        }

        async fn fetch_logs(&self) -> Result<GetLogsResponse> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(SinkError::Api {
                    status: 503,
                    message: "HTTP error! status: 503".to_string(),
                });
            }
            Ok(GetLogsResponse {
                count: self.records.len(),
                records: self.records.clone(),
            })
        }
    }

    fn entry(name: &str, timestamp: &str) -> LogEntry {
        LogEntry {
            timestamp: timestamp.to_string(),
            name: name.to_string(),
            tableware: "Mug".to_string(),
            // "hello" in base64
            image: "data:image/jpeg;base64,aGVsbG8=".to_string(),
            action: Action::Enter,
        }
    }

    #[test]
    fn invalid_timestamp_is_returned_verbatim() {
        for raw in ["", "yesterday", "2024-13-45T99:00:00", "not-a-date"] {
            assert_eq!(format_timestamp(raw), raw);
        }
    }

    #[test]
    fn rfc3339_and_naive_timestamps_are_formatted() {
        let expected = Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 30, 0)
            .unwrap()
            .with_timezone(&Local)
            .format(DISPLAY_FORMAT)
            .to_string();
        assert_eq!(format_timestamp("2024-05-01T10:30:00+00:00"), expected);
        assert_eq!(format_timestamp("2024-05-01T10:30:00.123456"), expected);
    }

    #[test]
    fn starts_in_loading_state() {
        let viewer = LogViewer::new(FakeApi::with(Vec::new(), 0));
        assert_eq!(viewer.state(), &ViewState::Loading);
        assert_eq!(viewer.render(), LOADING_MESSAGE);
    }

    #[tokio::test]
    async fn empty_collection_renders_empty_state() {
        let viewer = LogViewer::open(FakeApi::with(Vec::new(), 0)).await;
        assert_eq!(viewer.state(), &ViewState::Loaded(Vec::new()));
        assert_eq!(viewer.render(), EMPTY_MESSAGE);
        assert!(!viewer.render().contains("Timestamp"));
    }

    #[tokio::test]
    async fn error_then_retry_reruns_fetch() {
        let records = vec![entry("Alex", "2024-05-01T10:30:00+00:00")];
        let mut viewer = LogViewer::open(FakeApi::with(records.clone(), 1)).await;
        assert_eq!(
            viewer.state(),
            &ViewState::Error("HTTP error! status: 503".to_string())
        );
        assert!(viewer.render().starts_with("Error: HTTP error! status: 503"));

        viewer.retry().await;
        assert_eq!(viewer.api.calls.get(), 2);
        assert_eq!(viewer.state(), &ViewState::Loaded(records));
    }

    #[tokio::test]
    async fn failed_refresh_replaces_loaded_table() {
        let records = vec![entry("Alex", "2024-05-01T10:30:00+00:00")];
        let mut viewer = LogViewer::open(FakeApi::with(records.clone(), 0)).await;
        assert_eq!(viewer.state(), &ViewState::Loaded(records));

        viewer.api.failures_left.set(1);
        viewer.refresh().await;
        assert_eq!(
            viewer.state(),
            &ViewState::Error("HTTP error! status: 503".to_string())
        );
        assert!(!viewer.render().contains(LOADING_MESSAGE));
    }

    #[tokio::test]
    async fn table_keeps_backend_order_and_raw_bad_timestamps() {
        let records = vec![entry("Zoe", "garbage"), entry("Alex", "2024-05-01T10:30:00")];
        let viewer = LogViewer::open(FakeApi::with(records, 0)).await;
        let text = viewer.render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Usage Logs (2)");
        assert!(lines[1].starts_with("Timestamp"));
        assert!(lines[1].ends_with("Image"));
        assert!(lines[3].starts_with("garbage"));
        assert!(lines[3].contains("Zoe"));
        assert!(lines[4].contains("Alex"));
        assert!(lines[4].contains("image/jpeg 0.0 KiB"));
    }

    #[test]
    fn data_uri_decoding() {
        let (mime, bytes) = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
        assert!(decode_data_uri("http://example.test/a.jpg").is_none());
        assert!(decode_data_uri("data:image/png,raw").is_none());
        assert_eq!(describe_image("nope"), "(invalid image)");
    }

    #[test]
    fn export_writes_one_file_per_valid_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut broken = entry("Sam", "garbage");
        broken.image = "not a data uri".to_string();
        let records = vec![entry("Alex K", "garbage"), broken];

        let written = export_images(&records, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("001-Alex_K.jpg")]);
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"hello");
    }
}
