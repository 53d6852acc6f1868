/*
 *  lifecycle/slot.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  The single holder of the active plugin module
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

use crate::plugin::{LoadedPlugin, ModuleIdentity};

/// Host-side record of the module currently driving the screen.
///
/// The [`PhaseController`](super::PhaseController) owns the only instance;
/// everything else reaches the active module through a borrow of it.
pub struct PluginSlot {
    plugin: Box<dyn LoadedPlugin>,
}

impl PluginSlot {
    pub fn new(plugin: Box<dyn LoadedPlugin>) -> Self {
        Self { plugin }
    }

    pub fn identity(&self) -> &ModuleIdentity {
        self.plugin.identity()
    }

    pub fn plugin(&self) -> &dyn LoadedPlugin {
        self.plugin.as_ref()
    }

    pub fn plugin_mut(&mut self) -> &mut dyn LoadedPlugin {
        self.plugin.as_mut()
    }

    /// Install an already validated module and hand back the one it replaces.
    ///
    /// The caller decides when the returned module is dropped (and with it
    /// unloaded); nothing of it may be called after that.
    pub fn swap(&mut self, incoming: Box<dyn LoadedPlugin>) -> Box<dyn LoadedPlugin> {
        std::mem::replace(&mut self.plugin, incoming)
    }
}

impl std::fmt::Debug for PluginSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSlot")
            .field("module", self.identity())
            .field("reports_finish", &self.plugin.reports_finish())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{Event, FakeModule, FakeSource};
    use crate::plugin::ModuleSource;
    use std::path::Path;

    #[test]
    fn test_swap_returns_retired_module() {
        let mut source = FakeSource::new()
            .with("a.mod", FakeModule::Persistent)
            .with("b.mod", FakeModule::Persistent);
        let journal = source.journal();

        let mut slot = PluginSlot::new(source.load(Path::new("a.mod")).unwrap());
        assert_eq!(slot.identity().to_string(), "a.mod#1");

        let retired = slot.swap(source.load(Path::new("b.mod")).unwrap());
        assert_eq!(retired.identity().to_string(), "a.mod#1");
        assert_eq!(slot.identity().to_string(), "b.mod#2");
        assert!(!journal.borrow().contains(&Event::Unload("a.mod#1".into())));

        drop(retired);
        assert!(journal.borrow().contains(&Event::Unload("a.mod#1".into())));
    }
}
