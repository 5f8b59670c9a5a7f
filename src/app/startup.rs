//! Host startup: arguments, configuration, logging, then the command loop

use crate::app::cli::Args;
use crate::app::commands::Command;
use crate::app::config::AppConfig;
use crate::app::host::Host;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::styles::{palette_to_clap, StyleRole};
use crate::core::version::long_version;
use clap::{CommandFactory, FromArgMatches};
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run the host to completion and return the process exit code
pub async fn startup() -> i32 {
    let detected_color = std::io::stdout().is_terminal();
    let matches = Args::command()
        .styles(palette_to_clap(detected_color))
        .long_version(long_version())
        .get_matches();
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    // Logging is not up yet, so configuration problems go straight to stderr
    let config = match AppConfig::load(args.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let options = match config.logging_options(&args, detected_color) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = init_logging(&options) {
        eprintln!("Error initialising logging: {}", e);
        return 1;
    }

    log::info!("eventqueue {} starting", long_version());

    let queue_configs = match config.queue_configs() {
        Ok(configs) => configs,
        Err(e) => {
            log_error_with_context(&e, "Validating queue configuration");
            return 1;
        }
    };
    let state_dir = match config.state_dir(&args) {
        Ok(dir) => dir,
        Err(e) => {
            log_error_with_context(&e, "Resolving state directory");
            return 1;
        }
    };

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let color = options.color;
    let started = tokio::task::spawn_blocking(move || Host::start(queue_configs, &state_dir, color)).await;
    let host = match started {
        Ok(Ok(host)) => Arc::new(host),
        Ok(Err(e)) => {
            log_error_with_context(&e, "Starting queues");
            return 1;
        }
        Err(e) => {
            log::error!("Queue startup task failed: {}", e);
            return 1;
        }
    };

    serve(&host, &coordinator, color).await;

    let stopping = Arc::clone(&host);
    match tokio::task::spawn_blocking(move || stopping.shutdown()).await {
        Ok(Ok(())) => {
            log::info!("eventqueue stopped");
            0
        }
        Ok(Err(e)) => {
            log_error_with_context(&e, "Shutting down queues");
            1
        }
        Err(e) => {
            log::error!("Queue shutdown task failed: {}", e);
            1
        }
    }
}

/// Feed stdin commands to the host until EOF or a shutdown signal
async fn serve(host: &Host, coordinator: &ShutdownCoordinator, color: bool) {
    let mut shutdown_rx = coordinator.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !coordinator.is_shutdown_requested() {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(host, &line, color),
                Ok(None) => {
                    log::info!("Input closed; shutting down");
                    break;
                }
                Err(e) => {
                    log::error!("Reading commands failed: {}", e);
                    break;
                }
            },
        }
    }
}

fn handle_line(host: &Host, line: &str, color: bool) {
    match Command::parse_line(line) {
        Ok(Some(command)) => {
            log::debug!("Command: {:?}", command);
            println!("{}", host.execute(command).0);
        }
        Ok(None) => {}
        Err(e) => eprintln!("{}", StyleRole::Error.paint(&e.to_string(), color)),
    }
}
