//! teamsrelay binary.
//!
//! Relays Teams outgoing-webhook messages to an LLM and posts the answer back as an
//! adaptive card.

mod config;
mod handler;
mod init;
mod routes;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Debug, Parser)]
#[command(name = "teamsrelay", version, about = "Teams webhook to LLM relay")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, env = "TEAMSRELAY_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the webhook server (default).
    Serve,
    /// Handle a single platform event (`{"headers":{..},"body":".."}`) and print the response.
    Invoke {
        /// Read the event from this file instead of stdin.
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Print the authorization header Teams would send for a request body.
    Sign {
        /// Read the body from this file instead of stdin.
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Validate config and report the resolved settings.
    Doctor,
    /// Write a config template to the config path (never overwrites).
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(anyhow::anyhow!("load .env: {e}"));
        }
    }
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    match command {
        Command::Serve => server::serve(cli.config).await,
        Command::Invoke { event } => server::invoke(cli.config, event).await,
        Command::Sign { body_file } => server::sign(cli.config, body_file).await,
        Command::Doctor => server::doctor(cli.config).await,
        Command::Init => {
            let report = init::initialize(cli.config).await?;
            if report.created {
                println!("teamsrelay init: wrote {}", report.path.display());
            } else {
                println!(
                    "teamsrelay init: kept existing {} unchanged",
                    report.path.display()
                );
            }
            println!(
                "next: set auth.hmac_secret and teams.webhook_url in {}",
                report.path.display()
            );
            Ok(())
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new(
            "info,teamsrelay=debug,relay_app=debug,relay_channels=debug,relay_llm=debug,tower_http=info",
        ),
    };
    let log_format = std::env::var("TEAMSRELAY_LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_ascii_lowercase();

    // stdout carries `invoke` and `sign` output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported TEAMSRELAY_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::info!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_payload_to_string(panic_info.payload());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(panic_info);
    }));
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, panic_payload_to_string};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["teamsrelay"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn invoke_accepts_event_file_and_global_config() {
        let cli = Cli::try_parse_from([
            "teamsrelay",
            "invoke",
            "--event",
            "event.json",
            "--config",
            "relay.toml",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("relay.toml")));
        match cli.command {
            Some(Command::Invoke { event }) => {
                assert_eq!(event, Some(PathBuf::from("event.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn panic_payload_handles_str_and_string() {
        let s: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_payload_to_string(s.as_ref()), "boom");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_payload_to_string(owned.as_ref()), "bang");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_payload_to_string(other.as_ref()), "non-string panic payload");
    }
}
