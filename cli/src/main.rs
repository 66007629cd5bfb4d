//! CLI entrypoint for cud-chat
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use cud_application::{
    AdapterSessionManager, ConversationLogger, ConversationOrchestrator, DeferredPersistence,
    GenerateImageUseCase, HandleBackend, InMemoryHandleBackend, ResourceManager, SessionParams,
};
use cud_domain::ModelId;
use cud_infrastructure::{
    ComfyUiImageGenerator, ConfigLoader, FileConfig, FileHandleBackend, FileStateStore,
    JsonlConversationLogger, OllamaChatGateway, Severity,
};
use cud_presentation::{ChatRepl, Cli, ReplConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initialize tracing. Returns the guard of the file writer, if any, which
/// must live until the process exits.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else {
        match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        }
    };

    let Some(path) = &cli.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .context("--log-file must name a file")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        &dir, file_name,
    ));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn load_config(cli: &Cli) -> FileConfig {
    if cli.no_config {
        return ConfigLoader::load_defaults();
    }
    match ConfigLoader::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{} Failed to load config: {}. Using defaults.",
                "warning:".yellow().bold(),
                e
            );
            ConfigLoader::load_defaults()
        }
    }
}

fn report_config_issues(config: &FileConfig) {
    for issue in config.validate() {
        match issue.severity {
            Severity::Warning => eprintln!("{} {}", "warning:".yellow().bold(), issue),
            Severity::Error => eprintln!("{} {}", "error:".red().bold(), issue),
        }
    }
}

fn handle_backend(config: &FileConfig) -> Arc<dyn HandleBackend> {
    let dir = config.storage.image_dir();
    match FileHandleBackend::new(&dir) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            warn!(
                "Cannot write images to {} ({}); keeping them in memory",
                dir.display(),
                e
            );
            Arc::new(InMemoryHandleBackend::new())
        }
    }
}

fn session_params(config: &FileConfig) -> SessionParams {
    let (default_model, _) = config.chat.parse_default_model();
    SessionParams::default()
        .with_default_model(default_model)
        .with_max_persisted_entries(config.storage.max_entries)
        .with_persist_debounce(Duration::from_millis(config.storage.debounce_ms))
}

fn repl_config(config: &FileConfig) -> ReplConfig {
    ReplConfig {
        show_progress: config.repl.show_progress,
        history_file: config.repl.history_file.as_ref().map(PathBuf::from),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let config = load_config(&cli);
    report_config_issues(&config);
    info!("Starting cud-chat");

    // === Dependency Injection ===
    let gateway = Arc::new(
        OllamaChatGateway::from_config(&config.chat).context("Failed to build chat client")?,
    );
    let generator = Arc::new(
        ComfyUiImageGenerator::from_config(&config.image)
            .context("Failed to build image backend client")?,
    );

    let state_dir = config.storage.state_dir();
    let store = Arc::new(FileStateStore::new(&state_dir, config.storage.max_entries));
    if !store.is_available() {
        eprintln!(
            "{} {} is not writable; this session will not be saved",
            "warning:".yellow().bold(),
            state_dir.display()
        );
    }

    let params = session_params(&config);
    let resources = Arc::new(ResourceManager::new(handle_backend(&config)));
    let adapters = Arc::new(AdapterSessionManager::new());
    let persistence = DeferredPersistence::spawn(store, params.persist_debounce);

    let conversation_logger: Option<Arc<dyn ConversationLogger>> = config
        .logging
        .conversation_log
        .as_ref()
        .and_then(JsonlConversationLogger::new)
        .map(|logger| Arc::new(logger) as Arc<dyn ConversationLogger>);

    let mut images = GenerateImageUseCase::new(generator, adapters, resources);
    if let Some(logger) = &conversation_logger {
        images = images.with_conversation_logger(logger.clone());
    }
    let mut orchestrator = ConversationOrchestrator::new(gateway, images, persistence, params);
    if let Some(logger) = conversation_logger {
        orchestrator = orchestrator.with_conversation_logger(logger);
    }
    let orchestrator = Arc::new(orchestrator);

    // === Session ===
    let restored = if cli.fresh {
        0
    } else {
        orchestrator.restore().await
    };
    if let Some(name) = &cli.model {
        let Ok(model) = name.parse::<ModelId>();
        orchestrator.set_model(model);
    }

    let repl = ChatRepl::new(orchestrator.clone())
        .with_config(repl_config(&config))
        .with_restored(restored);
    let result = repl.run().await;

    orchestrator.teardown().await;
    result.context("Interactive session failed")?;
    Ok(())
}
