/*
 *  lifecycle/reload.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Hot reload - swap the active module while keeping its state
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

//! Hot reload of the active module.
//!
//! The sequence is strictly ordered:
//!
//! 1. extract the state block from the active module
//! 2. load the replacement and resolve its whole contract
//! 3. unload the previous module
//! 4. inject the state block into the replacement
//!
//! If step 2 fails the state goes straight back into the module it came
//! from, so a broken build on disk costs nothing but a log line.

use std::path::Path;

use log::{info, warn};

use super::slot::PluginSlot;
use crate::plugin::{ModuleIdentity, ModuleSource, PluginError};

/// Which module a successful reload retired and which one now runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    pub retired: ModuleIdentity,
    pub active: ModuleIdentity,
}

/// Replace the slot's module with a fresh load of `path`, carrying the state over.
///
/// On error the slot still holds the original module, with its state
/// handed back to it.
pub fn hot_swap<S>(slot: &mut PluginSlot, source: &mut S, path: &Path) -> Result<ReloadReport, PluginError>
where
    S: ModuleSource + ?Sized,
{
    let state = slot.plugin_mut().extract_state();

    let incoming = match source.load(path) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!("Hot reload of {} failed, keeping {}: {}", path.display(), slot.identity(), e);
            slot.plugin_mut().inject_state(state);
            return Err(e);
        }
    };

    let retired = slot.swap(incoming);
    let retired_identity = retired.identity().clone();
    drop(retired);

    slot.plugin_mut().inject_state(state);

    info!("Hot reloaded {} -> {}", retired_identity, slot.identity());
    Ok(ReloadReport {
        retired: retired_identity,
        active: slot.identity().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{Event, FakeModule, FakeSource};

    fn loaded_slot(source: &mut FakeSource, path: &str, updates: u32) -> PluginSlot {
        let mut slot = PluginSlot::new(source.load(Path::new(path)).unwrap());
        slot.plugin_mut().init();
        for _ in 0..updates {
            slot.plugin_mut().update();
        }
        slot
    }

    #[test]
    fn test_state_survives_reload() {
        let mut source = FakeSource::new().with("main.mod", FakeModule::Persistent);
        let journal = source.journal();
        let mut slot = loaded_slot(&mut source, "main.mod", 5);

        let report = hot_swap(&mut slot, &mut source, Path::new("main.mod")).unwrap();
        assert_eq!(report.retired.to_string(), "main.mod#1");
        assert_eq!(report.active.to_string(), "main.mod#2");

        // the new module picks the counter up where the old one left it
        slot.plugin_mut().update();
        let events = journal.borrow();
        assert!(events.contains(&Event::Inject("main.mod#2".into(), 5)));
        assert_eq!(events.last(), Some(&Event::Update("main.mod#2".into(), 6)));
        assert!(!events.contains(&Event::Init("main.mod#2".into())));
    }

    #[test]
    fn test_validate_before_swap_ordering() {
        let mut source = FakeSource::new().with("main.mod", FakeModule::Persistent);
        let journal = source.journal();
        let mut slot = loaded_slot(&mut source, "main.mod", 1);
        journal.borrow_mut().clear();

        hot_swap(&mut slot, &mut source, Path::new("main.mod")).unwrap();

        assert_eq!(
            *journal.borrow(),
            vec![
                Event::Extract("main.mod#1".into()),
                Event::Load("main.mod#2".into()),
                Event::Unload("main.mod#1".into()),
                Event::Inject("main.mod#2".into(), 1),
            ]
        );
    }

    #[test]
    fn test_failed_reload_restores_original_module() {
        let mut source = FakeSource::new().with("main.mod", FakeModule::Persistent);
        let journal = source.journal();
        let mut slot = loaded_slot(&mut source, "main.mod", 3);
        let before = slot.identity().clone();

        source.set("main.mod", FakeModule::MissingSymbol("plug_update"));
        journal.borrow_mut().clear();

        let err = hot_swap(&mut slot, &mut source, Path::new("main.mod")).unwrap_err();
        assert!(matches!(err, PluginError::SymbolNotFound { ref symbol, .. } if symbol == "plug_update"));
        assert_eq!(slot.identity(), &before);

        assert_eq!(
            *journal.borrow(),
            vec![
                Event::Extract("main.mod#1".into()),
                Event::Load("main.mod#2".into()),
                Event::Unload("main.mod#2".into()),
                Event::Inject("main.mod#1".into(), 3),
            ]
        );

        // still fully functional
        slot.plugin_mut().update();
        assert_eq!(journal.borrow().last(), Some(&Event::Update("main.mod#1".into(), 4)));
    }

    #[test]
    fn test_missing_replacement_file() {
        let mut source = FakeSource::new().with("main.mod", FakeModule::Persistent);
        let mut slot = loaded_slot(&mut source, "main.mod", 2);

        let err = hot_swap(&mut slot, &mut source, Path::new("gone.mod")).unwrap_err();
        assert!(matches!(err, PluginError::NotFound(_)));
        assert_eq!(slot.identity().to_string(), "main.mod#1");
    }
}
