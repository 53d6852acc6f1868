/*
 *  config.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Layered configuration - defaults, YAML file, environment, command line
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

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::{config_dir, home_dir};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::lifecycle::{Phase, PhaseModules};
use crate::plugin::{LoadMode, PluginLocator};

/// Environment variable naming the plugin directory.
pub const PLUGIN_PATH_ENV: &str = "CONA_PLUGIN_PATH";

pub const DEFAULT_LOG_FILE: &str = "cona.log";
pub const DEFAULT_TARGET_FPS: u32 = 60;
pub const DEFAULT_RELOAD_KEY: char = 'r';

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Unset fields fall back to the defaults
/// the accessors below apply.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,     // "error" .. "trace"
    pub log_file: Option<PathBuf>,
    pub plugin_dir: Option<PathBuf>,
    pub phases: Option<PhaseNames>,
    pub target_fps: Option<u32>,
    pub reload_key: Option<char>,
    pub skip_splash: Option<bool>,
    pub shadow_copy: Option<bool>,
    pub companion: Option<CompanionConfig>,
}

/// Module base names per phase, e.g. `cona_main` for `libcona_main.so`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PhaseNames {
    pub splash: Option<String>,
    pub boot: Option<String>,
    pub main: Option<String>,
}

/// Helper process started before the render loop, e.g. a web UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanionConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "cona", version, about = "CONA plugin host")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// error | warn | info | debug | trace
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,
    /// log to stderr instead of the log file
    #[arg(long, action = ArgAction::SetTrue)]
    pub log_stderr: bool,
    /// directory holding the phase modules
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub plugin_dir: Option<PathBuf>,
    #[arg(long)]
    pub target_fps: Option<u32>,
    #[arg(long)]
    pub reload_key: Option<char>,
    /// start with the boot phase
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_splash: bool,
    /// map module files directly instead of private copies
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_shadow: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, overlay environment and CLI, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    load_from(cli, std::env::var(PLUGIN_PATH_ENV).ok())
}

/// [`load`] with the plugin path variable passed in.
pub fn load_from(cli: &Cli, plugin_path_env: Option<String>) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) environment
    apply_env(&mut cfg, plugin_path_env);

    // 4) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 5) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    let p = PathBuf::from("cona.yaml");
    if p.exists() { return Some(p) }
    // XDG-style: ~/.config/cona/cona.yaml
    if let Some(dir) = config_dir() {
        let p = dir.join("cona").join("cona.yaml");
        if p.exists() { return Some(p) }
    }
    if let Some(home) = home_dir() {
        let p = home.join(".cona.yaml");
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()      { dst.log_level = src.log_level; }
    if src.log_file.is_some()       { dst.log_file = src.log_file; }
    if src.plugin_dir.is_some()     { dst.plugin_dir = src.plugin_dir; }
    if src.target_fps.is_some()     { dst.target_fps = src.target_fps; }
    if src.reload_key.is_some()     { dst.reload_key = src.reload_key; }
    if src.skip_splash.is_some()    { dst.skip_splash = src.skip_splash; }
    if src.shadow_copy.is_some()    { dst.shadow_copy = src.shadow_copy; }
    if src.companion.is_some()      { dst.companion = src.companion; }
    match (&mut dst.phases, src.phases) {
        (None, Some(p)) => dst.phases = Some(p),
        (Some(d), Some(s)) => merge_phases(d, s),
        _ => {}
    }
}

fn merge_phases(dst: &mut PhaseNames, src: PhaseNames) {
    if src.splash.is_some()  { dst.splash = src.splash; }
    if src.boot.is_some()    { dst.boot = src.boot; }
    if src.main.is_some()    { dst.main = src.main; }
}

fn apply_env(cfg: &mut Config, plugin_path: Option<String>) {
    if let Some(dir) = plugin_path.filter(|d| !d.is_empty()) {
        cfg.plugin_dir = Some(PathBuf::from(dir));
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()   { cfg.log_level = cli.log_level.clone(); }
    if cli.log_file.is_some()    { cfg.log_file = cli.log_file.clone(); }
    if cli.plugin_dir.is_some()  { cfg.plugin_dir = cli.plugin_dir.clone(); }
    if cli.target_fps.is_some()  { cfg.target_fps = cli.target_fps; }
    if cli.reload_key.is_some()  { cfg.reload_key = cli.reload_key; }
    if cli.no_splash             { cfg.skip_splash = Some(true); }
    if cli.no_shadow             { cfg.shadow_copy = Some(false); }
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(level) = cfg.log_level.as_deref() {
        if level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!("unknown log_level '{}'", level)));
        }
    }
    if let Some(phases) = cfg.phases.as_ref() {
        for (phase, name) in [
            (Phase::Splash, &phases.splash),
            (Phase::Boot, &phases.boot),
            (Phase::Main, &phases.main),
        ] {
            if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(ConfigError::Validation(format!("phases.{} must not be empty", phase)));
            }
        }
    }
    if let Some(key) = cfg.reload_key {
        if key.eq_ignore_ascii_case(&'q') || key.is_control() || key.is_whitespace() {
            return Err(ConfigError::Validation(format!("reload_key '{}' is not usable", key.escape_default())));
        }
    }
    if let Some(companion) = cfg.companion.as_ref() {
        if companion.program.trim().is_empty() {
            return Err(ConfigError::Validation("companion.program must not be empty".into()));
        }
    }
    Ok(())
}

impl Config {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
            .as_deref()
            .and_then(|l| l.parse().ok())
            .unwrap_or(LevelFilter::Info)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    /// Plugin directory, defaulting to the directory of the executable.
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin_dir.clone().unwrap_or_else(PluginLocator::default_dir)
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps.unwrap_or(DEFAULT_TARGET_FPS).max(1)
    }

    pub fn reload_key(&self) -> char {
        self.reload_key.unwrap_or(DEFAULT_RELOAD_KEY)
    }

    pub fn load_mode(&self) -> LoadMode {
        match self.shadow_copy {
            Some(false) => LoadMode::InPlace,
            _ => LoadMode::Shadow,
        }
    }

    /// First phase shown; `skip_splash` starts with Boot.
    pub fn initial_phase(&self) -> Phase {
        if self.skip_splash.unwrap_or(false) {
            Phase::Boot
        } else {
            Phase::Splash
        }
    }

    pub fn phase_name(&self, phase: Phase) -> &str {
        let names = self.phases.as_ref();
        let configured = match phase {
            Phase::Splash => names.and_then(|n| n.splash.as_deref()),
            Phase::Boot => names.and_then(|n| n.boot.as_deref()),
            Phase::Main => names.and_then(|n| n.main.as_deref()),
        };
        configured.unwrap_or(match phase {
            Phase::Splash => "cona_splash",
            Phase::Boot => "cona_boot",
            Phase::Main => "cona_main",
        })
    }

    /// Module files for every phase in the plugin directory.
    pub fn phase_modules(&self) -> PhaseModules {
        let locator = PluginLocator::new(self.plugin_dir());
        PhaseModules::from_locator(
            &locator,
            self.phase_name(Phase::Splash),
            self.phase_name(Phase::Boot),
            self.phase_name(Phase::Main),
        )
    }

    /// Pretty YAML of the effective config.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
