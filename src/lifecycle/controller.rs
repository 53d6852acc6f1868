/*
 *  lifecycle/controller.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Phase controller - decides which module drives the screen
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

use log::{debug, info, warn};
use thiserror::Error;

use super::reload::{self, ReloadReport};
use super::slot::PluginSlot;
use super::{Phase, PhaseModules};
use crate::plugin::{LoadedPlugin, ModuleSource, PluginError};

/// What one render-loop step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The phase's module ran and is not finished (or cannot finish).
    Continued(Phase),
    /// The module of `from` finished and `to` is now loaded and initialised.
    Advanced { from: Phase, to: Phase },
}

impl StepOutcome {
    /// Phase whose module ran `update` in this step.
    pub fn phase(&self) -> Phase {
        match *self {
            StepOutcome::Continued(phase) => phase,
            StepOutcome::Advanced { from, .. } => from,
        }
    }
}

/// An automatic phase transition could not load the next module.
///
/// Fatal: the session cannot continue on an undefined slot.
#[derive(Debug, Error)]
#[error("transition {from} -> {to} failed: {source}")]
pub struct TransitionError {
    pub from: Phase,
    pub to: Phase,
    #[source]
    pub source: PluginError,
}

/// A hot reload request that did not swap anything.
///
/// Never fatal: the active module keeps running unchanged.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("hot reload is only available in the main phase (current: {0})")]
    NotReloadable(Phase),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Drives Splash → Boot → Main, owning the one plugin slot.
pub struct PhaseController<S: ModuleSource> {
    slot: PluginSlot,
    phase: Phase,
    modules: PhaseModules,
    source: S,
    main_finish_reported: bool,
}

impl<S: ModuleSource> PhaseController<S> {
    /// Load and initialise the module of `initial` before the render loop starts.
    ///
    /// Failure here is fatal to the host: there is nothing to show.
    pub fn start(mut source: S, modules: PhaseModules, initial: Phase) -> Result<Self, PluginError> {
        let mut plugin = source.load(modules.path(initial))?;
        plugin.init();
        info!("Starting in {} phase with {}", initial, plugin.identity());

        Ok(Self {
            slot: PluginSlot::new(plugin),
            phase: initial,
            modules,
            source,
            main_finish_reported: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn slot(&self) -> &PluginSlot {
        &self.slot
    }

    pub fn modules(&self) -> &PhaseModules {
        &self.modules
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Run one `update` on the active module, then advance if it reports finished.
    ///
    /// At most one transition happens per step.
    pub fn step(&mut self) -> Result<StepOutcome, TransitionError> {
        let current = self.phase;
        self.slot.plugin_mut().update();

        if !self.slot.plugin_mut().is_finished() {
            return Ok(StepOutcome::Continued(current));
        }

        let Some(next) = current.next() else {
            // nothing follows the last phase; keep driving it
            if !self.main_finish_reported {
                warn!("{} phase reported finished; there is no later phase", current);
                self.main_finish_reported = true;
            }
            return Ok(StepOutcome::Continued(current));
        };

        self.advance(current, next)?;
        Ok(StepOutcome::Advanced { from: current, to: next })
    }

    /// Load `to`'s module, then retire the current one.
    fn advance(&mut self, from: Phase, to: Phase) -> Result<(), TransitionError> {
        let path = self.modules.path(to);
        debug!("Phase {} finished, loading {}", from, path.display());

        let mut incoming: Box<dyn LoadedPlugin> = self
            .source
            .load(path)
            .map_err(|source| TransitionError { from, to, source })?;
        incoming.init();

        let retired = self.slot.swap(incoming);
        drop(retired);

        self.phase = to;
        info!("Phase {} -> {} ({})", from, to, self.slot.identity());
        Ok(())
    }

    /// Swap the main module for a fresh load of the same file, keeping its state.
    pub fn hot_reload(&mut self) -> Result<ReloadReport, ReloadError> {
        if !self.phase.is_reloadable() {
            return Err(ReloadError::NotReloadable(self.phase));
        }
        let path = self.modules.path(self.phase).to_path_buf();
        Ok(reload::hot_swap(&mut self.slot, &mut self.source, &path)?)
    }
}

impl<S: ModuleSource> std::fmt::Debug for PhaseController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseController")
            .field("phase", &self.phase)
            .field("slot", &self.slot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing::{Event, FakeModule, FakeSource};

    fn modules() -> PhaseModules {
        PhaseModules::new("splash.mod", "boot.mod", "main.mod")
    }

    fn scenario_source() -> FakeSource {
        FakeSource::new()
            .with("splash.mod", FakeModule::Finite(2))
            .with("boot.mod", FakeModule::Finite(3))
            .with("main.mod", FakeModule::Persistent)
    }

    #[test]
    fn test_scenario_phase_sequence() {
        let mut controller = PhaseController::start(scenario_source(), modules(), Phase::Splash).unwrap();

        let phases: Vec<Phase> = (0..10).map(|_| controller.step().unwrap().phase()).collect();

        use Phase::*;
        assert_eq!(phases, vec![Splash, Splash, Boot, Boot, Boot, Main, Main, Main, Main, Main]);
        assert_eq!(controller.phase(), Main);
    }

    #[test]
    fn test_single_transition_when_finished() {
        const K: usize = 4;
        let source = FakeSource::new()
            .with("splash.mod", FakeModule::Finite(K as u32))
            .with("boot.mod", FakeModule::Persistent)
            .with("main.mod", FakeModule::Persistent);
        let mut controller = PhaseController::start(source, modules(), Phase::Splash).unwrap();

        let outcomes: Vec<StepOutcome> = (1..=8).map(|_| controller.step().unwrap()).collect();

        for (call, outcome) in outcomes.iter().enumerate().map(|(i, o)| (i + 1, o)) {
            match call {
                c if c < K => assert_eq!(*outcome, StepOutcome::Continued(Phase::Splash)),
                K => assert_eq!(*outcome, StepOutcome::Advanced { from: Phase::Splash, to: Phase::Boot }),
                _ => assert_eq!(*outcome, StepOutcome::Continued(Phase::Boot)),
            }
        }
        let advances = outcomes
            .iter()
            .filter(|o| matches!(o, StepOutcome::Advanced { .. }))
            .count();
        assert_eq!(advances, 1);
    }

    #[test]
    fn test_transition_loads_before_unloading() {
        let source = scenario_source();
        let journal = source.journal();
        let mut controller = PhaseController::start(source, modules(), Phase::Splash).unwrap();
        controller.step().unwrap();
        journal.borrow_mut().clear();

        controller.step().unwrap();
        assert_eq!(
            *journal.borrow(),
            vec![
                Event::Update("splash.mod#1".into(), 2),
                Event::Load("boot.mod#2".into()),
                Event::Init("boot.mod#2".into()),
                Event::Unload("splash.mod#1".into()),
            ]
        );
    }

    #[test]
    fn test_startup_failure_is_reported() {
        let source = FakeSource::new().with("splash.mod", FakeModule::MissingSymbol("plug_init"));
        let err = PhaseController::start(source, modules(), Phase::Splash).unwrap_err();
        assert!(matches!(err, PluginError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_failed_transition_is_an_error() {
        let source = FakeSource::new()
            .with("splash.mod", FakeModule::Finite(1))
            .with("boot.mod", FakeModule::MissingSymbol("plug_pre_reload"));
        let mut controller = PhaseController::start(source, modules(), Phase::Splash).unwrap();

        let err = controller.step().unwrap_err();
        assert_eq!((err.from, err.to), (Phase::Splash, Phase::Boot));
        assert_eq!(controller.phase(), Phase::Splash);
    }

    #[test]
    fn test_hot_reload_only_in_main() {
        let mut controller = PhaseController::start(scenario_source(), modules(), Phase::Splash).unwrap();
        assert!(matches!(controller.hot_reload(), Err(ReloadError::NotReloadable(Phase::Splash))));

        while controller.phase() != Phase::Main {
            controller.step().unwrap();
        }
        let report = controller.hot_reload().unwrap();
        assert_eq!(report.retired.path, std::path::PathBuf::from("main.mod"));
        assert_eq!(controller.phase(), Phase::Main);
    }

    #[test]
    fn test_failed_hot_reload_keeps_slot() {
        let source = FakeSource::new().with("main.mod", FakeModule::Persistent);
        let journal = source.journal();
        let mut controller = PhaseController::start(source, modules(), Phase::Main).unwrap();
        controller.step().unwrap();
        controller.step().unwrap();
        let before = controller.slot().identity().clone();

        controller.source_mut().set("main.mod", FakeModule::MissingSymbol("plug_post_reload"));
        assert!(matches!(controller.hot_reload(), Err(ReloadError::Plugin(_))));
        assert_eq!(controller.slot().identity(), &before);

        controller.step().unwrap();
        assert_eq!(journal.borrow().last(), Some(&Event::Update("main.mod#1".into(), 3)));
    }

    #[test]
    fn test_finishing_main_is_terminal() {
        let source = FakeSource::new().with("main.mod", FakeModule::Finite(1));
        let mut controller = PhaseController::start(source, modules(), Phase::Main).unwrap();
        for _ in 0..3 {
            assert_eq!(controller.step().unwrap(), StepOutcome::Continued(Phase::Main));
        }
    }
}
