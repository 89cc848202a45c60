//! Certificate Ledger Command Line Interface
//!
//! Usage:
//!   certctl create -f key=value ...   - Issue a certificate
//!   certctl get <id>                  - Show a certificate
//!   certctl list [--student <id>]     - List certificates
//!   certctl update <id> -f key=value  - Change a certificate
//!   certctl delete <id>               - Delete a certificate
//!   certctl verify <id> -f key=value  - Verify presented fields
//!   certctl history <id>              - Show the audit trail
//!   certctl init                      - Seed sample certificates
//!   certctl health                    - Show backend health
//!   certctl shell                     - Interactive session
//!
//! Settings not given as flags come from `CERT_*` environment variables.

use cert_core::logging::{init_logging, LogConfig};
use cert_core::{BackendKind, LedgerError};
use cert_db::{CertificateService, HealthMonitor, ServiceConfig};
use clap::Parser;
use tracing::debug;

mod commands;
mod interactive;

use commands::{CmdResult, Command, Identity};

#[derive(Parser)]
#[command(name = "certctl")]
#[command(about = "Certificate ledger CLI")]
#[command(version)]
struct Cli {
    /// Record store backend (local, ledger)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Ledger gateway URL
    #[arg(long, global = true)]
    ledger_url: Option<String>,

    /// Per-call ledger timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Caller role (admin, university, verifier, student)
    #[arg(long, global = true)]
    role: Option<String>,

    /// Caller identity
    #[arg(long, global = true)]
    caller_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Environment configuration overridden by flags
    fn service_config(&self) -> Result<ServiceConfig, LedgerError> {
        let mut config = ServiceConfig::from_env();

        if let Some(raw) = &self.backend {
            config.backend = BackendKind::parse(raw)
                .ok_or_else(|| LedgerError::validation(format!("unknown backend '{}'", raw)))?;
        }
        if let Some(url) = &self.ledger_url {
            config.ledger.url = url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            if ms == 0 {
                return Err(LedgerError::validation("--timeout-ms must be positive"));
            }
            config.ledger.timeout_ms = ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Logging disabled: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run_command(cli).await {
        print_error(e.as_ref());
        std::process::exit(1);
    }
}

/// Print an error, with its stable code when it is a ledger error
pub(crate) fn print_error(err: &(dyn std::error::Error + Send + Sync + 'static)) {
    match err.downcast_ref::<LedgerError>() {
        Some(ledger_err) => eprintln!("Error [{}]: {}", ledger_err.code(), ledger_err),
        None => eprintln!("Error: {}", err),
    }
}

async fn run_command(cli: Cli) -> CmdResult<()> {
    let config = cli.service_config()?;
    debug!(backend = %config.backend, ledger_url = %config.ledger.url, "Resolved configuration");

    let service = CertificateService::from_config(&config).await?;
    let identity = Identity::new(cli.role, cli.caller_id);

    match cli.command {
        Command::Shell => {
            let monitor = config
                .health_monitor_interval()
                .map(|every| HealthMonitor::start(service.store(), every));
            let mut session = interactive::InteractiveSession::new(identity, monitor);
            interactive::run(&service, &mut session).await
        }
        command => {
            let output = commands::execute(&service, &identity, command).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
