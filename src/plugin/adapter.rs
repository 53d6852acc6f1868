/*
 *  plugin/adapter.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Plugin adapter - wraps a resolved C ABI module as a LoadedPlugin
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

use std::path::Path;

use cona_plugin::{
    AbiVersionFn, ExtractStateFn, InitFn, InjectStateFn, IsFinishedFn, UpdateFn,
    CONA_PLUGIN_ABI_VERSION, SYMBOL_ABI_VERSION, SYMBOL_EXTRACT_STATE, SYMBOL_INIT,
    SYMBOL_INJECT_STATE, SYMBOL_IS_FINISHED, SYMBOL_UPDATE,
};
use log::{debug, info, warn};

use super::contract::{LoadedPlugin, ModuleIdentity, ModuleSource, StateToken};
use super::error::PluginError;
use super::loader::{LoadMode, ModuleHandle};

/// Contract entry points resolved from one module.
///
/// Built all at once by [`EntryPoints::resolve`]; a module missing any
/// mandatory symbol never produces a value of this type.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    init: InitFn,
    extract_state: ExtractStateFn,
    inject_state: InjectStateFn,
    update: UpdateFn,
    is_finished: Option<IsFinishedFn>,
}

impl EntryPoints {
    /// Resolve every mandatory symbol, plus the optional finished query.
    ///
    /// # Safety
    ///
    /// The module must follow the CONA contract signatures, and the entry
    /// points must not outlive `handle`'s mapping.
    pub unsafe fn resolve(handle: &ModuleHandle) -> Result<Self, PluginError> {
        unsafe {
            Ok(Self {
                init: handle.resolve(SYMBOL_INIT)?,
                extract_state: handle.resolve(SYMBOL_EXTRACT_STATE)?,
                inject_state: handle.resolve(SYMBOL_INJECT_STATE)?,
                update: handle.resolve(SYMBOL_UPDATE)?,
                is_finished: handle.resolve_optional(SYMBOL_IS_FINISHED),
            })
        }
    }

    /// Resolved addresses in contract order; 0 for an absent optional entry.
    pub fn addresses(&self) -> [usize; 5] {
        [
            self.init as usize,
            self.extract_state as usize,
            self.inject_state as usize,
            self.update as usize,
            self.is_finished.map_or(0, |f| f as usize),
        ]
    }
}

impl std::fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [init, extract, inject, update, finished] = self.addresses();
        f.debug_struct("EntryPoints")
            .field("init", &format_args!("{:#x}", init))
            .field("extract_state", &format_args!("{:#x}", extract))
            .field("inject_state", &format_args!("{:#x}", inject))
            .field("update", &format_args!("{:#x}", update))
            .field("is_finished", &format_args!("{:#x}", finished))
            .finish()
    }
}

/// A dynamically loaded module driving one phase.
pub struct DynamicPlugin {
    entry: EntryPoints,
    identity: ModuleIdentity,
    handle: ModuleHandle,
}

impl DynamicPlugin {
    /// Map a module and validate it against the contract.
    ///
    /// On any failure the partially loaded module is unloaded before the
    /// error is returned.
    pub fn open(path: &Path, mode: LoadMode, generation: u64) -> Result<Self, PluginError> {
        let handle = ModuleHandle::open(path, mode)?;

        // SAFETY: CONA modules export the contract signatures; `entry` is
        // stored next to `handle` and never called after `Drop` unloads it.
        let entry = unsafe { EntryPoints::resolve(&handle)? };

        if let Some(abi_version) = unsafe { handle.resolve_optional::<AbiVersionFn>(SYMBOL_ABI_VERSION) } {
            check_abi(path, abi_version())?;
        }

        debug!("Plugin entry points for {}: {:?}", path.display(), entry);

        Ok(Self {
            entry,
            identity: ModuleIdentity::new(path, generation),
            handle,
        })
    }

    pub fn entry_points(&self) -> &EntryPoints {
        &self.entry
    }

    pub fn handle(&self) -> &ModuleHandle {
        &self.handle
    }
}

fn check_abi(path: &Path, found: u32) -> Result<(), PluginError> {
    let expected = CONA_PLUGIN_ABI_VERSION;
    if cona_plugin::abi_major(found) != cona_plugin::abi_major(expected) {
        return Err(PluginError::AbiMismatch {
            path: path.to_path_buf(),
            found,
            expected,
        });
    }
    if cona_plugin::abi_minor(found) > cona_plugin::abi_minor(expected) {
        warn!(
            "Plugin {} was built against a newer SDK minor version ({:#x} > {:#x})",
            path.display(),
            found,
            expected
        );
    }
    Ok(())
}

impl LoadedPlugin for DynamicPlugin {
    fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    fn init(&mut self) {
        (self.entry.init)();
    }

    fn extract_state(&mut self) -> StateToken {
        let raw = (self.entry.extract_state)();
        // SAFETY: raw was just returned by this module's extract entry point.
        unsafe { StateToken::from_raw(raw) }
    }

    fn inject_state(&mut self, state: StateToken) {
        (self.entry.inject_state)(state.into_raw());
    }

    fn update(&mut self) {
        (self.entry.update)();
    }

    fn reports_finish(&self) -> bool {
        self.entry.is_finished.is_some()
    }

    fn is_finished(&mut self) -> bool {
        self.entry.is_finished.is_some_and(|finished| finished())
    }
}

impl Drop for DynamicPlugin {
    fn drop(&mut self) {
        debug!("Releasing plugin {}", self.identity);
        self.handle.unload();
    }
}

/// [`ModuleSource`] backed by the OS dynamic loader.
#[derive(Debug)]
pub struct DynamicSource {
    mode: LoadMode,
    loads: u64,
}

impl DynamicSource {
    pub fn new(mode: LoadMode) -> Self {
        Self { mode, loads: 0 }
    }
}

impl Default for DynamicSource {
    fn default() -> Self {
        Self::new(LoadMode::Shadow)
    }
}

impl ModuleSource for DynamicSource {
    fn load(&mut self, path: &Path) -> Result<Box<dyn LoadedPlugin>, PluginError> {
        self.loads += 1;
        let plugin = DynamicPlugin::open(path, self.mode, self.loads)?;
        info!(
            "Loaded plugin {} ({})",
            plugin.identity(),
            if plugin.reports_finish() { "finite" } else { "persistent" }
        );
        Ok(Box::new(plugin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_abi() {
        let path = Path::new("libcona_main.so");
        assert!(check_abi(path, CONA_PLUGIN_ABI_VERSION).is_ok());
        assert!(check_abi(path, CONA_PLUGIN_ABI_VERSION + 1).is_ok());

        let next_major = (cona_plugin::CONA_PLUGIN_ABI_VERSION_MAJOR + 1) << 16;
        assert!(matches!(
            check_abi(path, next_major),
            Err(PluginError::AbiMismatch { .. })
        ));
    }

    #[test]
    fn test_source_rejects_missing_module() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DynamicSource::default();
        let result = source.load(&dir.path().join("libnothing.so"));
        assert!(matches!(result, Err(PluginError::NotFound(_))));
    }

    // A real library that lacks the contract: resolution has to fail as a
    // whole and the mapping must be released again.
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_partial_contract_is_a_load_failure() {
        let mut source = DynamicSource::new(LoadMode::InPlace);
        match source.load(Path::new("libc.so.6")) {
            Err(PluginError::SymbolNotFound { symbol, .. }) => assert_eq!(symbol, SYMBOL_INIT),
            Err(other) => panic!("expected SymbolNotFound, got {}", other),
            Ok(plugin) => panic!("libc accepted as plugin: {}", plugin.identity()),
        }
    }
}
