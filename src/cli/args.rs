//! Command-line argument structures for the demo agent.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionBuilder;
use crate::transport::{DEFAULT_MASTER_SOCKET, Reconnect};

/// Output format for value dumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with type information.
    #[default]
    Human,
    /// JSON output for scripting.
    Json,
    /// Raw tab-separated output for scripting.
    Raw,
}

/// Connection arguments shared by agent binaries.
#[derive(Debug, Parser)]
pub struct AgentArgs {
    /// Master agent socket.
    #[arg(short = 'x', long = "master-socket", default_value = DEFAULT_MASTER_SOCKET)]
    pub master_socket: PathBuf,

    /// Description sent in the Open PDU (default: program name).
    #[arg(long = "description")]
    pub description: Option<String>,

    /// Session timeout in seconds, 0 for the master's default.
    #[arg(short = 't', long = "timeout", default_value = "5", value_parser = parse_secs)]
    pub timeout: Duration,

    /// Connect retries before giving up, with exponential backoff.
    #[arg(long = "connect-retries", default_value = "5")]
    pub connect_retries: u32,
}

impl AgentArgs {
    /// Session settings for these arguments.
    pub fn session_builder(&self) -> SessionBuilder {
        let mut builder = SessionBuilder::new()
            .socket_path(self.master_socket.clone())
            .timeout(self.timeout)
            .reconnect(
                Reconnect::exponential(self.connect_retries)
                    .initial_delay(Duration::from_millis(250))
                    .max_delay(Duration::from_secs(10))
                    .jitter(0.25),
            );
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        builder
    }
}

/// Output control arguments.
#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output format for value dumps: human, json, or raw.
    #[arg(short = 'O', long = "output", default_value = "human")]
    pub format: OutputFormat,

    /// Enable debug logging (async_agentx=debug).
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Enable trace logging (async_agentx=trace).
    #[arg(short = 'D', long = "trace")]
    pub trace: bool,
}

impl OutputArgs {
    /// Initialize tracing on stderr.
    ///
    /// Without -d or -D, `RUST_LOG` is honoured and the default is info.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            EnvFilter::new("async_agentx=trace,agentx_example=trace")
        } else if self.debug {
            EnvFilter::new("async_agentx=debug,agentx_example=debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    s.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("invalid number of seconds '{}': {}", s, e))
}
