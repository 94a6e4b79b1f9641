// src/db.rs

use crate::error::{Result, SinkError};
use crate::models::{Action, LogEntry, LogUsageRequest};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// 获取数据库文件的标准路径 (~/.config/sinklog/sinklog.db)
pub fn get_db_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or(SinkError::HomeDirNotFound)?;
    Ok(home_dir.join(".config/sinklog/sinklog.db"))
}

/// 打开数据库连接，如果表不存在则创建
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    initialize_db(&conn)?;
    Ok(conn)
}

pub fn initialize_db(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY,
            timestamp TEXT NOT NULL,
            name TEXT NOT NULL,
            tableware TEXT NOT NULL,
            image TEXT NOT NULL,
            action TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// 追加一条日志，时间戳由这里分配
pub fn add_log(conn: &Connection, req: &LogUsageRequest) -> Result<LogEntry> {
    // 生成 RFC3339 格式的时间戳字符串
    let timestamp = chrono::Utc::now().to_rfc3339();
    let entry = LogEntry {
        timestamp,
        name: req.name.clone(),
        tableware: req.tableware.label().to_string(),
        image: req.image.clone(),
        action: req.action,
    };
    conn.execute(
        "INSERT INTO logs (timestamp, name, tableware, image, action) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.timestamp,
            entry.name,
            entry.tableware,
            entry.image,
            entry.action.as_str()
        ],
    )?;
    Ok(entry)
}

/// 按插入顺序读取全部日志
pub fn fetch_logs(conn: &Connection) -> Result<Vec<LogEntry>> {
    let mut stmt =
        conn.prepare("SELECT timestamp, name, tableware, image, action FROM logs ORDER BY id")?;
    let logs = stmt
        .query_map([], |row| {
            let action: String = row.get(4)?;
            Ok(LogEntry {
                timestamp: row.get(0)?,
                name: row.get(1)?,
                tableware: row.get(2)?,
                image: row.get(3)?,
                action: if action == "exit" {
                    Action::Exit
                } else {
                    Action::Enter
                },
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(logs)
}
