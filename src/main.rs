// src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use sinklog::api::ApiClient;
use sinklog::config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 服务端默认 info，客户端只输出警告
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let api = ApiClient::new(config::resolve_api_base(cli.api_base.as_deref()));

    let result = match cli.command {
        Commands::Capture {
            name,
            tableware,
            action,
            device,
            width,
            height,
            test_source,
        } => {
            let opts = commands::CaptureOptions {
                name,
                tableware,
                action,
                device,
                width,
                height,
                test_source,
            };
            commands::handle_capture(api, opts).await
        }
        Commands::Logs { export_images } => commands::handle_logs(api, export_images).await,
        Commands::Serve { bind, db } => commands::handle_serve(bind, db).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
