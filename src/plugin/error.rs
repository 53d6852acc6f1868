/*
 *  plugin/error.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Error types for module loading and symbol resolution
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

use std::path::PathBuf;
use thiserror::Error;

/// Why a module could not be turned into a usable plugin.
///
/// Whether any of these is fatal depends on the caller: at startup and during
/// an automatic phase transition they end the session, during a hot reload
/// the previous module simply stays active.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No module file at the expected location
    #[error("plugin module not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The OS loader rejected the file (not a module, bad architecture,
    /// unresolved dependencies)
    #[error("could not load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// A mandatory contract entry point is missing
    #[error("could not find symbol {symbol} in {}: {reason}", path.display())]
    SymbolNotFound {
        path: PathBuf,
        symbol: String,
        reason: String,
    },

    /// The module was built against an incompatible plugin SDK
    #[error(
        "ABI version mismatch in {}: plugin {}.{}, host {}.{}",
        path.display(),
        cona_plugin::abi_major(*found),
        cona_plugin::abi_minor(*found),
        cona_plugin::abi_major(*expected),
        cona_plugin::abi_minor(*expected)
    )]
    AbiMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// Preparing the shadow copy of the module failed
    #[error("I/O error preparing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    /// Path of the module this error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            PluginError::NotFound(path) => path,
            PluginError::Load { path, .. }
            | PluginError::SymbolNotFound { path, .. }
            | PluginError::AbiMismatch { path, .. }
            | PluginError::Io { path, .. } => path,
        }
    }
}
