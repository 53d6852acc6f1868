/*
 *  lifecycle/testing.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  In-process plugin fakes for lifecycle tests
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

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::ptr;
use std::rc::Rc;

use crate::plugin::{LoadedPlugin, ModuleIdentity, ModuleSource, PluginError, StateToken};

/// What happened to which module, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load(String),
    Init(String),
    Update(String, u32),
    Extract(String),
    Inject(String, u32),
    Unload(String),
}

pub type Journal = Rc<RefCell<Vec<Event>>>;

/// State block shared by every fake module, like two builds of one plugin.
#[repr(C)]
pub struct FakeState {
    pub updates: u32,
    pub marker: u64,
}

pub const STATE_MARKER: u64 = 0xC0FF_EE00_D00D_F00D;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeModule {
    /// Reports finished once its state has seen this many updates
    Finite(u32),
    /// Does not export the finished query
    Persistent,
    /// Maps fine but lacks a mandatory entry point
    MissingSymbol(&'static str),
}

pub struct FakePlugin {
    identity: ModuleIdentity,
    label: String,
    finish_after: Option<u32>,
    state: *mut FakeState,
    journal: Journal,
}

impl FakePlugin {
    fn record(&self, event: Event) {
        self.journal.borrow_mut().push(event);
    }

    fn state(&self) -> Option<&FakeState> {
        unsafe { self.state.as_ref() }
    }
}

impl LoadedPlugin for FakePlugin {
    fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    fn init(&mut self) {
        self.state = Box::into_raw(Box::new(FakeState {
            updates: 0,
            marker: STATE_MARKER,
        }));
        self.record(Event::Init(self.label.clone()));
    }

    fn extract_state(&mut self) -> StateToken {
        self.record(Event::Extract(self.label.clone()));
        let raw = std::mem::replace(&mut self.state, ptr::null_mut());
        unsafe { StateToken::from_raw(raw.cast()) }
    }

    fn inject_state(&mut self, state: StateToken) {
        self.state = state.into_raw().cast();
        let updates = self.state().map_or(0, |s| {
            assert_eq!(s.marker, STATE_MARKER, "state block corrupted in transit");
            s.updates
        });
        self.record(Event::Inject(self.label.clone(), updates));
    }

    fn update(&mut self) {
        if let Some(state) = unsafe { self.state.as_mut() } {
            state.updates += 1;
            let updates = state.updates;
            self.record(Event::Update(self.label.clone(), updates));
        }
    }

    fn reports_finish(&self) -> bool {
        self.finish_after.is_some()
    }

    fn is_finished(&mut self) -> bool {
        match (self.finish_after, self.state()) {
            (Some(after), Some(state)) => state.updates >= after,
            _ => false,
        }
    }
}

impl Drop for FakePlugin {
    fn drop(&mut self) {
        self.record(Event::Unload(self.label.clone()));
        if !self.state.is_null() {
            drop(unsafe { Box::from_raw(self.state) });
        }
    }
}

/// Serves [`FakePlugin`]s by path and journals every lifecycle call.
pub struct FakeSource {
    modules: HashMap<PathBuf, FakeModule>,
    journal: Journal,
    loads: u64,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
            journal: Journal::default(),
            loads: 0,
        }
    }

    pub fn with(mut self, path: &str, module: FakeModule) -> Self {
        self.set(path, module);
        self
    }

    /// Replace what a path serves, like rebuilding the module file.
    pub fn set(&mut self, path: &str, module: FakeModule) {
        self.modules.insert(PathBuf::from(path), module);
    }

    pub fn journal(&self) -> Journal {
        Rc::clone(&self.journal)
    }
}

impl ModuleSource for FakeSource {
    fn load(&mut self, path: &Path) -> Result<Box<dyn LoadedPlugin>, PluginError> {
        let module = self
            .modules
            .get(path)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(path.to_path_buf()))?;

        self.loads += 1;
        let identity = ModuleIdentity::new(path, self.loads);
        let label = identity.to_string();
        self.journal.borrow_mut().push(Event::Load(label.clone()));

        let finish_after = match module {
            FakeModule::Finite(after) => Some(after),
            FakeModule::Persistent => None,
            FakeModule::MissingSymbol(symbol) => {
                // partially resolved module is released before reporting
                self.journal.borrow_mut().push(Event::Unload(label));
                return Err(PluginError::SymbolNotFound {
                    path: path.to_path_buf(),
                    symbol: symbol.to_string(),
                    reason: "not exported".to_string(),
                });
            }
        };

        Ok(Box::new(FakePlugin {
            identity,
            label,
            finish_after,
            state: ptr::null_mut(),
            journal: Rc::clone(&self.journal),
        }))
    }
}
