/*
 *  cona-plugin/src/lib.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Plugin SDK - contract types and the entry point export macro
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

//! # CONA plugin SDK
//!
//! A phase plugin is a `cdylib` that exports the CONA contract:
//!
//! | symbol              | role                                        |
//! |---------------------|---------------------------------------------|
//! | `plug_init`         | allocate the private state                  |
//! | `plug_pre_reload`   | hand the state block to the host            |
//! | `plug_post_reload`  | take a state block back after a module swap |
//! | `plug_update`       | one step + one draw pass                    |
//! | `plug_finished`     | optional, phase content is done             |
//!
//! Write the plugin as an ordinary Rust type implementing [`Plugin`] and let
//! [`export_plugin!`] generate the symbols:
//!
//! ```ignore
//! struct Splash { frames: u32 }
//!
//! impl cona_plugin::Plugin for Splash {
//!     fn init() -> Self { Splash { frames: 0 } }
//!     fn update(&mut self) { self.frames += 1; }
//!     fn is_finished(&self) -> bool { self.frames > 120 }
//! }
//!
//! cona_plugin::export_plugin!(Splash);
//! ```
//!
//! Use `export_plugin!(persistent Type)` for content that never finishes;
//! the `plug_finished` symbol is then left out entirely.
//!
//! The state lives in one heap block owned by the loaded module. Across a
//! hot reload the block is passed to the host as a raw pointer and injected
//! into the freshly loaded module, so the type's layout must not change
//! between the two builds.

pub mod abi;

pub use abi::*;

/// Behaviour of one lifecycle phase.
pub trait Plugin: Sized + 'static {
    /// Build the initial state. Runs once, right after the host loads the module.
    fn init() -> Self;

    /// Advance one step and draw one complete frame. Must return promptly.
    fn update(&mut self);

    /// True once this phase has nothing more to show.
    fn is_finished(&self) -> bool {
        false
    }

    /// Release everything tied to this module's code before it is unmapped:
    /// audio callbacks, shader or sound handles.
    fn suspend(&mut self) {}

    /// Re-acquire what [`Plugin::suspend`] released, now running in the new module.
    fn resume(&mut self) {}
}

/// Account for one draw pass. The contract has no error channel, so a frame
/// that could not be drawn is dropped; with `debug-logging` it is also logged.
///
/// Returns whether the frame was drawn.
pub fn report_draw(plugin: &str, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(_e) => {
            #[cfg(feature = "debug-logging")]
            log::debug!("{}: frame not drawn: {}", plugin, _e);

            let _ = plugin;
            false
        }
    }
}

#[doc(hidden)]
pub mod __private {
    use std::any::Any;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicPtr, Ordering};

    /// Run an entry point body without letting a panic unwind into the host.
    ///
    /// The contract has no error channel, so a panic is fatal.
    pub fn guard<R>(entry: &'static str, body: impl FnOnce() -> R) -> R {
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());

                #[cfg(feature = "debug-logging")]
                log::error!("plugin panic in {}: {}", entry, message);

                eprintln!("plugin panic in {}: {}", entry, message);
                std::process::abort();
            }
        }
    }

    fn panic_message(payload: &(dyn Any + Send)) -> String {
        if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown error".to_string()
        }
    }

    /// Borrow the state block, if the module currently owns one.
    ///
    /// # Safety
    ///
    /// The host drives every entry point from a single thread, so no other
    /// borrow of the block can be live while `f` runs.
    pub unsafe fn with_state<P, R>(cell: &AtomicPtr<P>, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        let ptr = cell.load(Ordering::Acquire);
        unsafe { ptr.as_mut() }.map(f)
    }
}

/// Export the CONA entry points for a [`Plugin`] implementation.
///
/// `export_plugin!(Type)` exports all five symbols; `export_plugin!(persistent Type)`
/// omits `plug_finished`, which the host reads as "never finishes".
#[macro_export]
macro_rules! export_plugin {
    (@entry_points $plugin:ty) => {
        static __CONA_PLUGIN_STATE: ::std::sync::atomic::AtomicPtr<$plugin> =
            ::std::sync::atomic::AtomicPtr::new(::std::ptr::null_mut());

        #[no_mangle]
        pub extern "C" fn plug_init() {
            $crate::__private::guard($crate::SYMBOL_INIT, || {
                let state = ::std::boxed::Box::new(<$plugin as $crate::Plugin>::init());
                let previous = __CONA_PLUGIN_STATE.swap(
                    ::std::boxed::Box::into_raw(state),
                    ::std::sync::atomic::Ordering::AcqRel,
                );
                debug_assert!(previous.is_null(), "plug_init called twice on one load");
            })
        }

        #[no_mangle]
        pub extern "C" fn plug_pre_reload() -> *mut ::std::ffi::c_void {
            $crate::__private::guard($crate::SYMBOL_EXTRACT_STATE, || {
                let state = __CONA_PLUGIN_STATE.swap(
                    ::std::ptr::null_mut(),
                    ::std::sync::atomic::Ordering::AcqRel,
                );
                if let Some(state) = unsafe { state.as_mut() } {
                    <$plugin as $crate::Plugin>::suspend(state);
                }
                state.cast()
            })
        }

        #[no_mangle]
        pub extern "C" fn plug_post_reload(state: *mut ::std::ffi::c_void) {
            $crate::__private::guard($crate::SYMBOL_INJECT_STATE, || {
                let state = state.cast::<$plugin>();
                if let Some(state) = unsafe { state.as_mut() } {
                    <$plugin as $crate::Plugin>::resume(state);
                }
                __CONA_PLUGIN_STATE.store(state, ::std::sync::atomic::Ordering::Release);
            })
        }

        #[no_mangle]
        pub extern "C" fn plug_update() {
            $crate::__private::guard($crate::SYMBOL_UPDATE, || unsafe {
                $crate::__private::with_state(&__CONA_PLUGIN_STATE, |state: &mut $plugin| {
                    <$plugin as $crate::Plugin>::update(state)
                });
            })
        }

        #[no_mangle]
        pub extern "C" fn plug_abi_version() -> u32 {
            $crate::CONA_PLUGIN_ABI_VERSION
        }
    };

    (persistent $plugin:ty) => {
        $crate::export_plugin!(@entry_points $plugin);
    };

    ($plugin:ty) => {
        $crate::export_plugin!(@entry_points $plugin);

        #[no_mangle]
        pub extern "C" fn plug_finished() -> bool {
            $crate::__private::guard($crate::SYMBOL_IS_FINISHED, || unsafe {
                $crate::__private::with_state(&__CONA_PLUGIN_STATE, |state: &mut $plugin| {
                    <$plugin as $crate::Plugin>::is_finished(state)
                })
                .unwrap_or(false)
            })
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;

    struct Counter {
        ticks: u32,
        suspended: u32,
        resumed: u32,
    }

    impl Plugin for Counter {
        fn init() -> Self {
            Counter { ticks: 0, suspended: 0, resumed: 0 }
        }

        fn update(&mut self) {
            self.ticks += 1;
        }

        fn is_finished(&self) -> bool {
            self.ticks >= 3
        }

        fn suspend(&mut self) {
            self.suspended += 1;
        }

        fn resume(&mut self) {
            self.resumed += 1;
        }
    }

    export_plugin!(Counter);

    // The exported statics are per test binary, so every scenario runs in
    // one test to keep the ordering deterministic.
    #[test]
    fn test_exported_entry_points_follow_the_contract() {
        assert!(!plug_finished(), "no state yet means not finished");
        plug_update(); // no state: must be a no-op

        plug_init();
        plug_update();
        plug_update();
        assert!(!plug_finished());

        let raw: *mut c_void = plug_pre_reload();
        assert!(!raw.is_null());
        // While the block is out, the module must not touch it.
        plug_update();
        assert!(!plug_finished());

        plug_post_reload(raw);
        plug_update();
        assert!(plug_finished());

        let state = unsafe { &*(raw as *const Counter) };
        assert_eq!(state.ticks, 3);
        assert_eq!(state.suspended, 1);
        assert_eq!(state.resumed, 1);

        assert_eq!(plug_abi_version(), CONA_PLUGIN_ABI_VERSION);
    }

    #[test]
    fn test_report_draw() {
        assert!(report_draw("test", Ok(())));
        let failed = std::io::Error::new(std::io::ErrorKind::Other, "not a terminal");
        assert!(!report_draw("test", Err(failed)));
    }

    #[test]
    fn test_guard_passes_results_through() {
        assert_eq!(__private::guard("test", || 41 + 1), 42);
    }
}
