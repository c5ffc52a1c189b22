//! # lectern
//!
//! Server binary: loads settings, wires the runtime with in-memory
//! collaborators and serves the HTTP/WebSocket surface.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lectern_core::logging::init_subscriber;
use lectern_runtime::{
    Collaborators, LecternRuntime, MemoryEngagementRepository, RotatingQuestionPool,
    StaticRosterSource,
};
use lectern_settings::{LecternSettings, load_settings, load_settings_from_path};
use lectern_server::{AppState, build_router, serve};
use tokio::net::TcpListener;

/// Lectern engagement monitor server.
#[derive(Parser, Debug)]
#[command(name = "lectern", about = "Live classroom engagement monitor")]
struct Cli {
    /// Settings file (defaults to `~/.lectern/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// JSON question file; the built-in demo set is used when absent.
    #[arg(long)]
    questions: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<LecternSettings> {
        let mut settings = match &self.config {
            Some(path) => load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }

    fn question_pool(&self) -> Result<RotatingQuestionPool> {
        match &self.questions {
            Some(path) => RotatingQuestionPool::from_json_file(path)
                .with_context(|| format!("Failed to load questions from {}", path.display())),
            None => Ok(RotatingQuestionPool::demo()),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    init_subscriber(&settings.logging.level, settings.logging.json);

    let prometheus =
        lectern_server::metrics::install_recorder().context("Failed to install metrics recorder")?;
    let question_pool = cli.question_pool()?;
    tracing::info!(questions = question_pool.len(), "question pool ready");

    let runtime = LecternRuntime::build(
        &settings,
        Collaborators {
            repository: Arc::new(MemoryEngagementRepository::new()),
            roster_source: Arc::new(StaticRosterSource::new()),
            question_pool: Arc::new(question_pool),
        },
    )
    .context("Failed to wire runtime")?;
    runtime.start().context("Failed to start runtime")?;

    let router = build_router(AppState {
        runtime: Arc::clone(&runtime),
        metrics: Some(prometheus),
        channel_capacity: settings.connections.channel_capacity,
    });
    let addr = (settings.server.host.as_str(), settings.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}:{}", settings.server.host, settings.server.port))?;

    let shutdown_runtime = Arc::clone(&runtime);
    serve(listener, router, async move {
        shutdown_signal().await;
        tracing::info!("Shutting down...");
        shutdown_runtime.shutdown().await;
    })
    .await
    .context("Server error")?;

    runtime.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_defaults_to_settings() {
        let cli = Cli::parse_from(["lectern"]);
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
        assert!(cli.questions.is_none());
    }

    #[test]
    fn cli_port_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}}"#).unwrap();
        let cli = Cli::parse_from([
            "lectern",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "8080",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn question_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": 1, "text": "1 + 1?", "correctAnswer": "2"}}]"#).unwrap();
        let cli = Cli::parse_from(["lectern", "--questions", file.path().to_str().unwrap()]);
        assert_eq!(cli.question_pool().unwrap().len(), 1);
    }

    #[test]
    fn missing_question_file_is_an_error() {
        let cli = Cli::parse_from(["lectern", "--questions", "/nonexistent/questions.json"]);
        assert!(cli.question_pool().is_err());
    }
}
