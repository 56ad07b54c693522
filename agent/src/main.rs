//! Gantry Deployment Agent - Entry Point
//!
//! Pushes a packaged application archive to the Gantry platform via the
//! installed SDK toolchain and waits for the rollout outcome.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use gantry_agent::app::options::{AppOptions, CredentialOptions, DeployOptions, SdkOptions};
use gantry_agent::app::run::run;
use gantry_agent::logs::{init_logging, LogOptions};
use gantry_agent::storage::settings::Settings;
use gantry_agent::utils::version_info;

use secrecy::SecretString;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // The archive to deploy is the one required argument
    let Some(archive) = cli_args.get("archive") else {
        eprintln!("Usage: gantry-agent --archive=<path> [--config=<path>]");
        std::process::exit(2);
    };

    // Retrieve the settings file
    let config_path = cli_args
        .get("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/gantry/agent.json"));
    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            std::process::exit(2);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    // Build the runtime options
    let password = env::var("GANTRY_PASSWORD")
        .ok()
        .or_else(|| settings.password.clone())
        .unwrap_or_default();
    let options = AppOptions {
        sdk: SdkOptions {
            root: settings.sdk_root.clone(),
            server: settings.server.clone(),
        },
        credentials: CredentialOptions {
            user_id: settings.user_id.clone(),
            password: SecretString::from(password),
        },
        deploy: DeployOptions {
            startup_timeout: Duration::from_secs(settings.startup_timeout_secs),
            port: settings.port,
            update_check: settings.update_check,
        },
    };

    info!(version = %version.version, "Running Gantry deployment agent");
    let result = run(options, PathBuf::from(archive), await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Deployment failed: {e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, abandoning the deployment wait...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, abandoning the deployment wait...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, abandoning the deployment wait...");
    }
}
