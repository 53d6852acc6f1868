/*
 *  plugin/loader.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Module loader - locates, maps and releases plugin modules
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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, info, warn};
use tempfile::TempPath;

use super::error::PluginError;

/// Platform file name for a module base name.
///
/// For "cona_main" this is:
/// - Linux: `libcona_main.so`
/// - macOS: `libcona_main.dylib`
/// - Windows: `cona_main.dll`
pub fn module_file_name(name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        format!("{}.dll", name)
    }

    #[cfg(target_os = "macos")]
    {
        format!("lib{}.dylib", name)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        format!("lib{}.so", name)
    }
}

/// Resolves phase module names to files in one plugin directory.
#[derive(Debug, Clone)]
pub struct PluginLocator {
    dir: PathBuf,
}

impl PluginLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory of the running executable; cargo puts the plugin cdylibs
    /// next to the host binary, so this works straight out of `target/`.
    pub fn default_dir() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Expected path of a module, whether or not it exists.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(module_file_name(name))
    }

    /// Path of an existing module file.
    pub fn locate(&self, name: &str) -> Result<PathBuf, PluginError> {
        let path = self.path_for(name);
        if path.is_file() {
            debug!("Found plugin at: {}", path.display());
            Ok(path)
        } else {
            debug!("Plugin not found for phase module: {}", name);
            Err(PluginError::NotFound(path))
        }
    }
}

/// How a module file is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Map a private copy of the file. The OS loader caches modules by path,
    /// so reloading a rebuilt file in place would hand back the old code.
    Shadow,
    /// Map the file itself.
    InPlace,
}

/// Ownership token for one mapped module.
///
/// Created by [`ModuleHandle::open`], released by [`ModuleHandle::unload`]
/// (or on drop). Release is idempotent, so shutdown code can call it
/// unconditionally.
pub struct ModuleHandle {
    library: Option<Library>,
    /// Private copy the library was mapped from, removed after unload
    shadow: Option<TempPath>,
    path: PathBuf,
}

impl ModuleHandle {
    /// Map a module into the process.
    ///
    /// Module-level initialisers in the target run as part of this call.
    pub fn open(path: &Path, mode: LoadMode) -> Result<Self, PluginError> {
        info!("Loading plugin from: {}", path.display());

        let shadow = match mode {
            LoadMode::Shadow => Some(shadow_copy(path)?),
            LoadMode::InPlace => None,
        };
        let target: &Path = shadow.as_deref().unwrap_or(path);

        // SAFETY: loading runs the module's initialisers; CONA plugins are
        // trusted code built against the same SDK.
        let library = unsafe { Library::new(target) }.map_err(|e| PluginError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if shadow.is_some() {
            debug!("Mapped {} via shadow copy {}", path.display(), target.display());
        }

        Ok(Self {
            library: Some(library),
            shadow,
            path: path.to_path_buf(),
        })
    }

    /// Original path of the module file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    /// Look up an exported function and copy out its address.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's real signature, and the returned value
    /// must not be called after this handle is unloaded.
    pub unsafe fn resolve<T: Copy>(&self, symbol: &str) -> Result<T, PluginError> {
        let not_found = |reason: String| PluginError::SymbolNotFound {
            path: self.path.clone(),
            symbol: symbol.to_string(),
            reason,
        };

        let library = self
            .library
            .as_ref()
            .ok_or_else(|| not_found("module already unloaded".to_string()))?;

        let entry: Symbol<T> =
            unsafe { library.get(symbol.as_bytes()) }.map_err(|e| not_found(e.to_string()))?;
        Ok(*entry)
    }

    /// Like [`ModuleHandle::resolve`], for symbols a module may leave out.
    ///
    /// # Safety
    ///
    /// Same contract as [`ModuleHandle::resolve`].
    pub unsafe fn resolve_optional<T: Copy>(&self, symbol: &str) -> Option<T> {
        match unsafe { self.resolve(symbol) } {
            Ok(entry) => Some(entry),
            Err(_) => {
                debug!("Optional symbol {} absent from {}", symbol, self.path.display());
                None
            }
        }
    }

    /// Release the mapping. A no-op once already released.
    pub fn unload(&mut self) {
        if let Some(library) = self.library.take() {
            match library.close() {
                Ok(()) => debug!("Unloaded plugin {}", self.path.display()),
                Err(e) => warn!("Unloading {} reported: {}", self.path.display(), e),
            }
        }

        if let Some(shadow) = self.shadow.take() {
            if let Err(e) = shadow.close() {
                debug!("Could not remove shadow copy of {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        self.unload();
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .field("shadow", &self.shadow.as_deref())
            .finish()
    }
}

/// Copy `path` to a uniquely named file in the temp directory.
fn shadow_copy(path: &Path) -> Result<TempPath, PluginError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            PluginError::NotFound(path.to_path_buf())
        } else {
            PluginError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    if !path.is_file() {
        return Err(PluginError::NotFound(path.to_path_buf()));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string());
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let shadow = tempfile::Builder::new()
        .prefix(&format!("{}-", stem))
        .suffix(&suffix)
        .tempfile()
        .map_err(io_error)?
        .into_temp_path();

    fs::copy(path, &shadow).map_err(io_error)?;
    Ok(shadow)
}
