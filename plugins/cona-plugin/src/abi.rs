/*
 *  cona-plugin/src/abi.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  C ABI shared by the host and every phase plugin
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

//! Symbol names and function signatures of the plugin contract.
//!
//! Every phase plugin exports these as unmangled `extern "C"` functions.
//! The host resolves them by name after mapping the module, so both sides
//! must agree on the exact spelling and signature below.

use std::ffi::c_void;

/// Plugin ABI version, encoded as `major << 16 | minor`.
///
/// The host refuses a module whose major component differs from its own.
pub const CONA_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const CONA_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const CONA_PLUGIN_ABI_VERSION: u32 =
    (CONA_PLUGIN_ABI_VERSION_MAJOR << 16) | CONA_PLUGIN_ABI_VERSION_MINOR;

/// Allocate and initialise the plugin state. Called once per load.
pub const SYMBOL_INIT: &str = "plug_init";

/// Hand the live state block to the host ahead of a module swap.
pub const SYMBOL_EXTRACT_STATE: &str = "plug_pre_reload";

/// Take back a state block previously returned by `plug_pre_reload`.
pub const SYMBOL_INJECT_STATE: &str = "plug_post_reload";

/// One simulation step and one complete draw pass.
pub const SYMBOL_UPDATE: &str = "plug_update";

/// Optional: true once this phase's content is done.
pub const SYMBOL_IS_FINISHED: &str = "plug_finished";

/// Optional: reports [`CONA_PLUGIN_ABI_VERSION`] of the SDK the plugin was built against.
pub const SYMBOL_ABI_VERSION: &str = "plug_abi_version";

/// Symbols a module must export to be accepted by the host.
pub const MANDATORY_SYMBOLS: [&str; 4] = [
    SYMBOL_INIT,
    SYMBOL_EXTRACT_STATE,
    SYMBOL_INJECT_STATE,
    SYMBOL_UPDATE,
];

pub type InitFn = extern "C" fn();
pub type ExtractStateFn = extern "C" fn() -> *mut c_void;
pub type InjectStateFn = extern "C" fn(*mut c_void);
pub type UpdateFn = extern "C" fn();
pub type IsFinishedFn = extern "C" fn() -> bool;
pub type AbiVersionFn = extern "C" fn() -> u32;

/// Major component of an encoded ABI version.
pub const fn abi_major(version: u32) -> u32 {
    version >> 16
}

/// Minor component of an encoded ABI version.
pub const fn abi_minor(version: u32) -> u32 {
    version & 0xFFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_version_encoding() {
        assert_eq!(abi_major(CONA_PLUGIN_ABI_VERSION), CONA_PLUGIN_ABI_VERSION_MAJOR);
        assert_eq!(abi_minor(CONA_PLUGIN_ABI_VERSION), CONA_PLUGIN_ABI_VERSION_MINOR);
        assert_eq!(abi_major(0x0002_0007), 2);
        assert_eq!(abi_minor(0x0002_0007), 7);
    }

    #[test]
    fn test_mandatory_symbols_exclude_optional_ones() {
        assert!(!MANDATORY_SYMBOLS.contains(&SYMBOL_IS_FINISHED));
        assert!(!MANDATORY_SYMBOLS.contains(&SYMBOL_ABI_VERSION));
        assert_eq!(MANDATORY_SYMBOLS.len(), 4);
    }
}
