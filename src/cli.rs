// src/cli.rs

use clap::{Parser, Subcommand};
use sinklog::models::{Action, Tableware};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "sinklog - log dishes going into and out of the sink",
    long_about = "sinklog takes a snapshot of a dish with your camera, tags it with who moved it, what it is and whether it went into or out of the sink, and sends it to the sink log backend. It can also list everything logged so far, or run the backend itself."
)]
pub struct Cli {
    /// Base URL of the log API. Falls back to SINKLOG_API_BASE_URL, then /api.
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Captures a snapshot and submits it as a log entry.
    /// Missing name or tableware are prompted for when running in a terminal.
    Capture {
        #[arg(short, long, help = "Who is moving the dish")]
        name: Option<String>,

        #[arg(short, long, help = "Bowl, Coffee cup, Mug, Plate, Spoon, Fork, Knife, Frying pan, Kitchen knife, Cutting board, Ladle or Wok")]
        tableware: Option<Tableware>,

        #[arg(short, long, value_enum, default_value_t = Action::Enter)]
        action: Action,

        #[arg(long, default_value = "/dev/video0", help = "V4L2 camera device")]
        device: String,

        #[arg(long, default_value_t = 1280, value_parser = clap::value_parser!(u32).range(1..=8192))]
        width: u32,

        #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..=8192))]
        height: u32,

        #[arg(long, help = "Use a synthetic test pattern instead of a camera")]
        test_source: bool,
    },

    /// Lists every log entry recorded so far.
    Logs {
        #[arg(long, value_name = "DIR", help = "Also write each entry's image into DIR")]
        export_images: Option<PathBuf>,
    },

    /// Runs the log backend (POST /api/log_usage, GET /api/get_logs).
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: String,

        #[arg(long, help = "SQLite file (default: ~/.config/sinklog/sinklog.db)")]
        db: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_defaults() {
        let cli = Cli::try_parse_from(["sinklog", "capture", "-n", "Alex", "-t", "mug"]).unwrap();
        match cli.command {
            Commands::Capture {
                name,
                tableware,
                action,
                width,
                height,
                ..
            } => {
                assert_eq!(name.as_deref(), Some("Alex"));
                assert_eq!(tableware, Some(Tableware::Mug));
                assert_eq!(action, Action::Enter);
                assert_eq!((width, height), (1280, 720));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn frame_size_is_bounded() {
        for args in [
            ["sinklog", "capture", "--width", "0"],
            ["sinklog", "capture", "--width", "20000000"],
            ["sinklog", "capture", "--height", "8193"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{:?} should be rejected", args);
        }
        assert!(Cli::try_parse_from(["sinklog", "capture", "--width", "8192"]).is_ok());
    }

    #[test]
    fn unknown_tableware_is_rejected() {
        assert!(Cli::try_parse_from(["sinklog", "capture", "-t", "teapot"]).is_err());
    }
}
