// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 一条日志：某件餐具进入或离开水槽
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String, // 由后端分配
    pub name: String,
    // 读取时不强制词表，旧后端可能没有校验
    pub tableware: String,
    pub image: String, // data:<mime>;base64,<payload>
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Dish put in the sink
    #[default]
    Enter,
    /// Dish removed from the sink
    Exit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Enter => "enter",
            Action::Exit => "exit",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tableware {
    Bowl,
    #[serde(rename = "Coffee cup")]
    CoffeeCup,
    Mug,
    Plate,
    Spoon,
    Fork,
    Knife,
    #[serde(rename = "Frying pan")]
    FryingPan,
    #[serde(rename = "Kitchen knife")]
    KitchenKnife,
    #[serde(rename = "Cutting board")]
    CuttingBoard,
    Ladle,
    Wok,
}

impl Tableware {
    pub const ALL: [Tableware; 12] = [
        Tableware::Bowl,
        Tableware::CoffeeCup,
        Tableware::Mug,
        Tableware::Plate,
        Tableware::Spoon,
        Tableware::Fork,
        Tableware::Knife,
        Tableware::FryingPan,
        Tableware::KitchenKnife,
        Tableware::CuttingBoard,
        Tableware::Ladle,
        Tableware::Wok,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tableware::Bowl => "Bowl",
            Tableware::CoffeeCup => "Coffee cup",
            Tableware::Mug => "Mug",
            Tableware::Plate => "Plate",
            Tableware::Spoon => "Spoon",
            Tableware::Fork => "Fork",
            Tableware::Knife => "Knife",
            Tableware::FryingPan => "Frying pan",
            Tableware::KitchenKnife => "Kitchen knife",
            Tableware::CuttingBoard => "Cutting board",
            Tableware::Ladle => "Ladle",
            Tableware::Wok => "Wok",
        }
    }
}

impl fmt::Display for Tableware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tableware {
    type Err = String;

    /// 大小写不敏感，`coffee-cup` / `coffee_cup` 也可以
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], " ").to_lowercase();
        Tableware::ALL
            .into_iter()
            .find(|t| t.label().to_lowercase() == wanted)
            .ok_or_else(|| {
                let options: Vec<&str> = Tableware::ALL.iter().map(|t| t.label()).collect();
                format!("unknown tableware '{}' (expected one of: {})", s, options.join(", "))
            })
    }
}

/// POST /log_usage 请求体，时间戳不由客户端设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogUsageRequest {
    pub name: String,
    pub tableware: Tableware,
    pub image: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogUsageResponse {
    pub status: String,
    pub entry: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetLogsResponse {
    pub count: usize,
    pub records: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tableware_parses_loosely() {
        assert_eq!("mug".parse::<Tableware>(), Ok(Tableware::Mug));
        assert_eq!("Coffee cup".parse::<Tableware>(), Ok(Tableware::CoffeeCup));
        assert_eq!("cutting-board".parse::<Tableware>(), Ok(Tableware::CuttingBoard));
        assert_eq!(" KITCHEN_KNIFE ".parse::<Tableware>(), Ok(Tableware::KitchenKnife));
        assert!("teapot".parse::<Tableware>().is_err());
    }

    #[test]
    fn request_serializes_with_display_labels() {
        let req = LogUsageRequest {
            name: "Alex".to_string(),
            tableware: Tableware::FryingPan,
            image: "data:image/jpeg;base64,AAAA".to_string(),
            action: Action::Exit,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "name": "Alex",
                "tableware": "Frying pan",
                "image": "data:image/jpeg;base64,AAAA",
                "action": "exit",
            })
        );
    }

    #[test]
    fn entry_rejects_unknown_action() {
        let body = json!({
            "timestamp": "2024-05-01T10:00:00",
            "name": "Sam",
            "tableware": "Plate",
            "image": "data:image/jpeg;base64,AAAA",
            "action": "sideways",
        });
        assert!(serde_json::from_value::<LogEntry>(body).is_err());
    }
}
