#![warn(missing_docs)]
//! # urban-guard-app binary
//!
//! Restores the stored session and reports client status.

use std::process::ExitCode;

use tracing::warn;
use urban_guard_app::{ClientConfig, UrbanGuardClient, app_version, init_tracing};

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid urban-guard configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = init_tracing(&config) {
        eprintln!("logging disabled: {error}");
    }

    if config.sends_plaintext_credentials() {
        warn!(
            stage = "startup",
            action = "config",
            api = %config.api_base,
            "credentials will be sent without TLS"
        );
    }

    let client = match UrbanGuardClient::from_config(&config) {
        Ok(client) => client,
        Err(error) => {
            eprintln!("failed to start urban-guard client: {error}");
            return ExitCode::FAILURE;
        }
    };

    let session = client.auth().initialize().await;
    let view = client.dashboard();

    println!("urban-guard-app {}", app_version());
    println!("api={}", config.api_base);
    match session.identity {
        Some(identity) => println!("signed in as {} <{}>", identity.username, identity.email),
        None => println!("signed out"),
    }
    println!("status={}", view.status_text);

    ExitCode::SUCCESS
}
