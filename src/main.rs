/*
 *  main.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Host entry point
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info, warn};

use cona::companion::Companion;
use cona::config::{self, Cli, Config};
use cona::frontend::TerminalFrontend;
use cona::lifecycle::PhaseController;
use cona::pacer::Pacer;
use cona::plugin::DynamicSource;
use cona::runner::{self, ExitReason};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match config::load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("cona: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump_config {
        return match cfg.to_yaml() {
            Ok(yaml) => {
                println!("{yaml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("cona: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = init_logging(&cfg, cli.log_stderr) {
        eprintln!("cona: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {}", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    match run(cfg).await {
        Ok(reason) => {
            info!("Session ended: {:?}", reason);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("cona: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// The terminal belongs to the plugins, so logs go to a file unless asked otherwise.
fn init_logging(cfg: &Config, to_stderr: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level().as_str()));
    builder.format_timestamp_secs();

    if !to_stderr {
        let path = cfg.log_file();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("installing logger")?;
    Ok(())
}

async fn run(cfg: Config) -> Result<ExitReason> {
    let mut companion = match cfg.companion.as_ref() {
        Some(companion) => Some(Companion::spawn(companion).context("starting companion")?),
        None => None,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut session = tokio::task::spawn_blocking({
        let shutdown = Arc::clone(&shutdown);
        move || render_session(&cfg, &shutdown)
    });

    let joined = tokio::select! {
        joined = &mut session => joined,
        _ = signal_handler() => {
            shutdown.store(true, Ordering::Release);
            // the render loop sees the flag within one frame
            (&mut session).await
        }
    };

    if let Some(companion) = companion.as_mut() {
        companion.stop();
    }

    joined.context("render thread panicked")?
}

/// Everything that touches plugins or the terminal runs on this one thread.
fn render_session(cfg: &Config, shutdown: &AtomicBool) -> Result<ExitReason> {
    info!("Plugin directory: {}", cfg.plugin_dir().display());
    let modules = cfg.phase_modules();

    // declared first so it is dropped last, after the plugins are unloaded
    let mut frontend = TerminalFrontend::enter(cfg.reload_key()).context("setting up terminal")?;

    let source = DynamicSource::new(cfg.load_mode());
    let mut controller = PhaseController::start(source, modules, cfg.initial_phase())
        .with_context(|| format!("starting {} phase", cfg.initial_phase()))?;

    let mut pacer = Pacer::new(cfg.target_fps());
    info!("Render loop at {} fps, reload key '{}'", cfg.target_fps(), cfg.reload_key());

    let reason = runner::run_loop(&mut controller, &mut frontend, &mut pacer, shutdown)?;
    Ok(reason)
}

/// Resolves once a termination signal arrives; never resolves if the
/// handlers cannot be installed.
async fn signal_handler() {
    if let Err(e) = wait_for_signal().await {
        warn!("Signal handlers unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}
