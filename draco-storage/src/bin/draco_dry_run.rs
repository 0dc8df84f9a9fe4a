/// Dry Run - Shows the statements a notification turns into
///
/// Usage: cargo run --bin draco-dry-run <config.toml> <notification.json> [service] [service-path]

use chrono::Utc;
use draco_core::{NotificationEvent, NotificationHeaders, SinkConfig};
use draco_storage::{NotificationPersister, SchemaTableCache, StatementSink};
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: cargo run --bin draco-dry-run <config.toml> <notification.json> [service] [service-path]");
        eprintln!();
        eprintln!("Example:");
        eprintln!("  cargo run --bin draco-dry-run sink.toml notification.json openiot /4wheels");
        std::process::exit(1);
    }

    let env_filter = EnvFilter::try_from_env("DRACO_LOG")
        .unwrap_or_else(|_| EnvFilter::new("draco_storage=info,draco_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match SinkConfig::from_file(&args[1]) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let body = match fs::read_to_string(&args[2]) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read {}: {}", args[2], e);
            std::process::exit(1);
        }
    };

    let mut headers = NotificationHeaders::new();
    if let Some(service) = args.get(3) {
        headers = headers.with_service(service.as_str());
    }
    if let Some(service_path) = args.get(4) {
        headers = headers.with_service_path(service_path.as_str());
    }
    let headers = headers.or_defaults(&config.default_service, &config.default_service_path);

    let event = match NotificationEvent::parse(&body, &headers, Utc::now()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Rejected notification: {}", e);
            std::process::exit(1);
        }
    };

    let sink = match StatementSink::for_backend(config.backend) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let persister =
        match NotificationPersister::from_config(&config, Arc::new(SchemaTableCache::new()), sink.clone()) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Invalid configuration {}: {}", args[1], e);
                std::process::exit(1);
            }
        };

    match persister.persist(&event) {
        Ok(summary) => {
            for statement in sink.statements() {
                println!("{};", statement);
            }
            eprintln!(
                "{} row(s) into {} table(s), {} schema(s) and {} table(s) provisioned",
                summary.rows, summary.tables, summary.schemas_created, summary.tables_created
            );
        }
        Err(e) => {
            eprintln!("Persistence failed: {}", e);
            std::process::exit(1);
        }
    }
}
