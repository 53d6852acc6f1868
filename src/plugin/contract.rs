/*
 *  plugin/contract.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Host-side view of the plugin contract
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

//! The contract every phase module fulfils, seen from the host.
//!
//! The lifecycle code only ever talks to [`LoadedPlugin`] trait objects
//! produced by a [`ModuleSource`]. How the entry points were found (dynamic
//! symbol lookup, or an in-process fake in tests) stays behind that seam.

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};

use log::error;

use super::error::PluginError;

/// Which file a loaded module came from, and which load of it this is.
///
/// Two loads of the same file get different generations, so identity
/// comparison tells a reloaded module apart from the one it replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    pub path: PathBuf,
    pub generation: u64,
}

impl ModuleIdentity {
    pub fn new(path: impl Into<PathBuf>, generation: u64) -> Self {
        Self {
            path: path.into(),
            generation,
        }
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.generation)
    }
}

/// Temporary custody of a plugin's opaque state block.
///
/// Produced by [`LoadedPlugin::extract_state`] and consumed by
/// [`LoadedPlugin::inject_state`]. The host never reads, writes or frees the
/// block behind it; it only carries the pointer from one module to the next.
/// The token is neither `Clone` nor `Send`, so exactly one holder exists and
/// it stays on the render thread.
///
/// Dropping a token without injecting it leaks the block (its layout and
/// allocator belong to the plugin) and is logged as an error.
#[must_use = "extracted plugin state must be injected back into a plugin"]
pub struct StateToken {
    ptr: *mut c_void,
}

impl StateToken {
    /// Take custody of a state block returned by a plugin.
    ///
    /// # Safety
    ///
    /// `ptr` must be the value a plugin's extract-state entry point just
    /// returned, and nothing else may use it until the token is redeemed.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Self {
        Self { ptr }
    }

    /// Release custody, handing the raw block to an inject-state entry point.
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// A plugin that never allocated state hands back null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateToken({:p})", self.ptr)
    }
}

impl Drop for StateToken {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            error!("Plugin state {:p} dropped without being injected; leaking it", self.ptr);
        }
    }
}

/// A module whose mandatory entry points are all resolved.
///
/// Implementations exist only for fully validated modules: a value of this
/// type is never missing `init`, `extract_state`, `inject_state` or `update`.
/// Dropping the value unloads the module.
pub trait LoadedPlugin {
    /// Where this module came from.
    fn identity(&self) -> &ModuleIdentity;

    /// Allocate and initialise the plugin state. Called once per load.
    ///
    /// There is no error channel: a plugin that cannot initialise aborts
    /// the process.
    fn init(&mut self);

    /// Take the live state block out of the module ahead of a swap.
    fn extract_state(&mut self) -> StateToken;

    /// Hand a previously extracted state block to this module.
    fn inject_state(&mut self, state: StateToken);

    /// One simulation step and one complete draw pass.
    fn update(&mut self);

    /// Whether the module exports the optional finished query at all.
    fn reports_finish(&self) -> bool;

    /// True once the phase content is done. Always false when the module
    /// does not export the query.
    fn is_finished(&mut self) -> bool;
}

/// Something that turns a module file into a validated [`LoadedPlugin`].
///
/// `load` must either return a plugin with every mandatory entry point
/// resolved, or release whatever it mapped and return the error.
pub trait ModuleSource {
    fn load(&mut self, path: &Path) -> Result<Box<dyn LoadedPlugin>, PluginError>;
}

impl<S: ModuleSource + ?Sized> ModuleSource for &mut S {
    fn load(&mut self, path: &Path) -> Result<Box<dyn LoadedPlugin>, PluginError> {
        (**self).load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trips_the_pointer() {
        let mut block = 7u32;
        let raw = (&mut block as *mut u32).cast::<c_void>();
        let token = unsafe { StateToken::from_raw(raw) };
        assert!(!token.is_null());
        assert_eq!(token.into_raw(), raw);
    }

    #[test]
    fn test_null_token_drops_quietly() {
        let token = unsafe { StateToken::from_raw(std::ptr::null_mut()) };
        assert!(token.is_null());
        drop(token);
    }

    #[test]
    fn test_identity_display() {
        let id = ModuleIdentity::new("/opt/cona/libcona_main.so", 3);
        assert_eq!(id.to_string(), "/opt/cona/libcona_main.so#3");
        assert_ne!(id, ModuleIdentity::new("/opt/cona/libcona_main.so", 4));
    }
}
