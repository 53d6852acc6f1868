/*
 *  plugin/mod.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Dynamic plugin system for lifecycle phase modules
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

//! Dynamic plugin system for CONA phase modules
//!
//! Each lifecycle phase is a separately compiled `cdylib` exporting the
//! contract defined in the `cona-plugin` SDK. This module turns such files
//! into [`LoadedPlugin`] trait objects the lifecycle code can drive.
//!
//! ## Architecture
//!
//! 1. **Loader** (`loader.rs`) - maps module files, resolves symbols, unloads
//! 2. **Adapter** (`adapter.rs`) - validates the contract, wraps a module as a trait object
//! 3. **Contract** (`contract.rs`) - the `LoadedPlugin` / `ModuleSource` seam and the state token
//!
//! ## Module Naming Convention
//!
//! - Linux: `libcona_main.so`
//! - macOS: `libcona_main.dylib`
//! - Windows: `cona_main.dll`

pub mod adapter;
pub mod contract;
pub mod error;
pub mod loader;

pub use adapter::{DynamicPlugin, DynamicSource, EntryPoints};
pub use contract::{LoadedPlugin, ModuleIdentity, ModuleSource, StateToken};
pub use error::PluginError;
pub use loader::{module_file_name, LoadMode, ModuleHandle, PluginLocator};
