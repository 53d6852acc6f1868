/*
 *  runner.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Render loop driver
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

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info};
use thiserror::Error;

use crate::frontend::{Frontend, FrontendError};
use crate::lifecycle::{PhaseController, ReloadError, StepOutcome, TransitionError};
use crate::pacer::Pacer;
use crate::plugin::ModuleSource;

/// Why the render loop stopped normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user closed the session (quit key)
    CloseRequested,
    /// A termination signal arrived
    ShutdownSignal,
}

/// Why the render loop had to stop abnormally.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Frontend(#[from] FrontendError),
}

/// Drive the active module until the session is closed.
///
/// Per iteration: observe input and the shutdown flag, run one controller
/// step, act on a reload request (main phase only), then pace the frame.
/// A failed phase transition ends the loop with an error; a failed hot
/// reload only gets logged.
pub fn run_loop<S, F>(
    controller: &mut PhaseController<S>,
    frontend: &mut F,
    pacer: &mut Pacer,
    shutdown: &AtomicBool,
) -> Result<ExitReason, RunError>
where
    S: ModuleSource,
    F: Frontend + ?Sized,
{
    let mut frames: u64 = 0;

    loop {
        if shutdown.load(Ordering::Acquire) {
            info!("Shutdown requested after {} frames", frames);
            return Ok(ExitReason::ShutdownSignal);
        }

        let input = frontend.poll_input()?;
        if input.close_requested {
            info!("Close requested after {} frames in {} phase", frames, controller.phase());
            return Ok(ExitReason::CloseRequested);
        }

        if let StepOutcome::Advanced { from, to } = controller.step()? {
            debug!("Frame {}: {} -> {}", frames, from, to);
        }
        frames += 1;

        if input.reload_requested {
            match controller.hot_reload() {
                Ok(report) => info!("Reloaded {} (was {})", report.active, report.retired),
                Err(ReloadError::NotReloadable(phase)) => {
                    debug!("Reload key ignored in {} phase", phase)
                }
                Err(e) => error!("Hot reload failed, current module keeps running: {}", e),
            }
        }

        pacer.wait();
    }
}
