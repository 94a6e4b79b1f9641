// src/commands.rs

use sinklog::api::ApiClient;
use sinklog::camera::{CameraDevice, CameraSession, FfmpegCamera, TestPatternCamera};
use sinklog::db;
use sinklog::error::{Result, SinkError};
use sinklog::models::{Action, Tableware};
use sinklog::server;
use sinklog::viewer::{self, LogViewer, ViewState};
use sinklog::workflow::{CaptureWorkflow, SubmitStatus};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

pub struct CaptureOptions {
    pub name: Option<String>,
    pub tableware: Option<Tableware>,
    pub action: Action,
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub test_source: bool,
}

fn prompt(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    Ok(prompt(question)?.eq_ignore_ascii_case("y"))
}

/// 处理 'capture' 命令
pub async fn handle_capture(api: ApiClient, opts: CaptureOptions) -> Result<()> {
    if opts.test_source {
        let device = TestPatternCamera {
            width: opts.width,
            height: opts.height,
        };
        run_capture(device, api, opts).await
    } else {
        let device = FfmpegCamera {
            device: opts.device.clone(),
            width: opts.width,
            height: opts.height,
        };
        run_capture(device, api, opts).await
    }
}

async fn run_capture<D: CameraDevice>(device: D, api: ApiClient, opts: CaptureOptions) -> Result<()> {
    let interactive = io::stdin().is_terminal();

    let mut camera = CameraSession::new(device);
    while let Err(e) = camera.start() {
        eprintln!("✗ {}", e);
        if !interactive || !confirm("Retry camera? (y/N): ")? {
            return Err(e);
        }
    }
    let image = camera.capture()?;
    // 拍完立即释放摄像头
    camera.stop();

    let mut workflow = CaptureWorkflow::new(api);
    if let Some(image) = image {
        workflow.capture_image(image);
        println!("✓ Snapshot captured.");
    }

    let mut name = opts.name.unwrap_or_default();
    if name.trim().is_empty() && interactive {
        name = prompt("Name: ")?;
    }
    workflow.set_name(name);

    let mut tableware = opts.tableware;
    if tableware.is_none() && interactive {
        let options: Vec<&str> = Tableware::ALL.iter().map(|t| t.label()).collect();
        println!("Tableware: {}", options.join(", "));
        let answer = prompt("Select tableware: ")?;
        if !answer.is_empty() {
            tableware = Some(answer.parse().map_err(SinkError::InvalidInput)?);
        }
    }
    workflow.set_tableware(tableware);
    workflow.set_action(opts.action);

    loop {
        match workflow.submit().await {
            Ok(response) => {
                if let SubmitStatus::Success(message) = workflow.status() {
                    println!("✓ {}", message);
                }
                println!(
                    "  {} | {} | {} | {}",
                    viewer::format_timestamp(&response.entry.timestamp),
                    response.entry.name,
                    response.entry.tableware,
                    response.entry.action
                );
                return Ok(());
            }
            // 校验错误重试也没用
            Err(e @ SinkError::Validation(_)) => return Err(e),
            Err(e) => {
                eprintln!("✗ {}", e);
                if !interactive || !confirm("Retry submission? (y/N): ")? {
                    return Err(e);
                }
            }
        }
    }
}

/// 处理 'logs' 命令
pub async fn handle_logs(api: ApiClient, export_images: Option<PathBuf>) -> Result<()> {
    let interactive = io::stdin().is_terminal();
    let mut viewer = LogViewer::new(api);
    eprintln!("{}", viewer.render());
    viewer.refresh().await;

    while matches!(viewer.state(), ViewState::Error(_)) {
        eprintln!("{}", viewer.render());
        if !interactive || !confirm("Retry? (y/N): ")? {
            return Err(SinkError::LogsUnavailable);
        }
        viewer.retry().await;
    }

    println!("{}", viewer.render());

    if let (Some(dir), ViewState::Loaded(records)) = (export_images, viewer.state()) {
        let written = viewer::export_images(records, &dir)?;
        println!("✓ Exported {} image(s) to {}", written.len(), dir.display());
    }
    Ok(())
}

/// 处理 'serve' 命令
pub async fn handle_serve(bind: String, db_path: Option<PathBuf>) -> Result<()> {
    let db_path = match db_path {
        Some(p) => p,
        None => db::get_db_path()?,
    };
    server::run(&bind, &db_path).await
}
