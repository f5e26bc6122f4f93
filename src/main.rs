use clap::Parser;
use oltsync::app::App;
use oltsync::cli::{Args, Command, ServiceName, TracingFormat};
use oltsync::config::Config;
use oltsync::data::models::{Category, PonPort};
use oltsync::logging::{setup_logging, setup_logging_with_level};
use oltsync::parsers::parse_transcript;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(args.tracing).await,
        Command::Parse {
            category,
            file,
            slot,
            port,
        } => parse(args.tracing, category, &file, slot, port),
    }
}

async fn serve(tracing_format: TracingFormat) -> ExitCode {
    let enabled_services = ServiceName::all();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let early_config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config for logging setup: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&early_config, tracing_format);

    let mut app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    info!(
        enabled_services = ?enabled_services.iter().map(ServiceName::as_str).collect::<Vec<_>>(),
        "services configuration loaded"
    );

    // Log application startup context
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting oltsync"
    );

    if let Err(e) = app.setup_services(&enabled_services) {
        error!(error = ?e, "Failed to setup services");
        return ExitCode::FAILURE;
    }

    // Start all services and run the application
    app.start_services();
    app.run().await
}

fn parse(tracing_format: TracingFormat, category: Category, file: &Path, slot: u8, port: u8) -> ExitCode {
    setup_logging_with_level("warn", tracing_format);

    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(e) => {
            error!(file = %file.display(), error = %e, "Failed to read transcript");
            return ExitCode::FAILURE;
        }
    };

    let parsed = match parse_transcript(category, &raw, PonPort::new(1, 1, slot, port)) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(%category, error = %e, "Failed to parse transcript");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&parsed) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to serialize parse result");
            ExitCode::FAILURE
        }
    }
}
