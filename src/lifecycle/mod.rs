/*
 *  lifecycle/mod.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Lifecycle phases and the modules bound to them
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

//! Lifecycle of a CONA session: which phase is showing, which module is
//! driving it, and how the active module gets replaced.
//!
//! - [`PhaseController`] owns the single [`PluginSlot`] and advances
//!   Splash → Boot → Main as modules report they are finished.
//! - [`reload::hot_swap`] replaces the Main module in place while carrying
//!   its state across.

use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;

use crate::plugin::PluginLocator;

pub mod controller;
pub mod reload;
pub mod slot;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{PhaseController, ReloadError, StepOutcome, TransitionError};
pub use reload::ReloadReport;
pub use slot::PluginSlot;

/// One stage of the application's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Splash,
    Boot,
    Main,
}

impl Phase {
    /// Phases in the order they are shown.
    pub const ORDER: [Phase; 3] = [Phase::Splash, Phase::Boot, Phase::Main];

    /// The phase that follows this one; `None` for Main.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Splash => Some(Phase::Boot),
            Phase::Boot => Some(Phase::Main),
            Phase::Main => None,
        }
    }

    /// Only the main content can be swapped while running.
    pub fn is_reloadable(self) -> bool {
        self == Phase::Main
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Splash => "splash",
            Phase::Boot => "boot",
            Phase::Main => "main",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Module file bound to each phase, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseModules {
    splash: PathBuf,
    boot: PathBuf,
    main: PathBuf,
}

impl PhaseModules {
    pub fn new(splash: impl Into<PathBuf>, boot: impl Into<PathBuf>, main: impl Into<PathBuf>) -> Self {
        Self {
            splash: splash.into(),
            boot: boot.into(),
            main: main.into(),
        }
    }

    /// Bind module base names to platform file names in the locator's directory.
    ///
    /// Files that do not exist yet only produce a warning here: the main
    /// module, for one, may still be building when the host starts.
    pub fn from_locator(locator: &PluginLocator, splash: &str, boot: &str, main: &str) -> Self {
        for name in [splash, boot, main] {
            if let Err(e) = locator.locate(name) {
                warn!("{}", e);
            }
        }
        Self::new(locator.path_for(splash), locator.path_for(boot), locator.path_for(main))
    }

    pub fn path(&self, phase: Phase) -> &Path {
        match phase {
            Phase::Splash => &self.splash,
            Phase::Boot => &self.boot,
            Phase::Main => &self.main,
        }
    }
}
