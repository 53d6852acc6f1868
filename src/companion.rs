/*
 *  companion.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Companion process - optional helper started alongside the render loop
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

use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::CompanionConfig;

/// How long a companion gets to exit after the polite request.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("could not start companion '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A child process that lives exactly as long as the session.
///
/// Stopped on every exit path: explicitly via [`Companion::stop`], or when
/// the value is dropped.
#[derive(Debug)]
pub struct Companion {
    child: Option<Child>,
    program: String,
    grace: Duration,
}

impl Companion {
    pub fn spawn(config: &CompanionConfig) -> Result<Self, CompanionError> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(cwd) = config.cwd.as_ref() {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|source| CompanionError::Spawn {
            program: config.program.clone(),
            source,
        })?;
        info!("Companion '{}' started (pid {})", config.program, child.id());

        Ok(Self {
            child: Some(child),
            program: config.program.clone(),
            grace: DEFAULT_GRACE,
        })
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Process id while the companion is being supervised.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Ask the companion to exit, force it after the grace period.
    ///
    /// Does nothing once the companion has been stopped.
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                info!("Companion '{}' had already exited: {}", self.program, status);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Could not query companion '{}': {}", self.program, e),
        }

        request_exit(&mut child);

        let deadline = Instant::now() + self.grace;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!("Companion '{}' stopped: {}", self.program, status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    warn!("Could not wait for companion '{}': {}", self.program, e);
                    break;
                }
            }
        }

        warn!("Companion '{}' ignored the stop request, killing it", self.program);
        if let Err(e) = child.kill() {
            warn!("Could not kill companion '{}': {}", self.program, e);
        }
        let _ = child.wait();
    }
}

impl Drop for Companion {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn request_exit(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    debug!("Sending SIGTERM to companion pid {}", pid);
    // SAFETY: plain syscall on a pid we own and have not reaped yet.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        warn!("SIGTERM to pid {} failed: {}", pid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn request_exit(child: &mut Child) {
    debug!("Killing companion pid {}", child.id());
    if let Err(e) = child.kill() {
        warn!("Could not kill companion pid {}: {}", child.id(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(program: &str, args: &[&str]) -> CompanionConfig {
        CompanionConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
        }
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let err = Companion::spawn(&config("/nonexistent/cona-companion", &[])).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cona-companion"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_terminates_child_and_is_idempotent() {
        let mut companion = Companion::spawn(&config("sleep", &["30"])).unwrap();
        assert!(companion.id().is_some());

        let started = Instant::now();
        companion.stop();
        assert!(companion.id().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));

        companion.stop();
        assert!(companion.id().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_stubborn_child_is_killed_after_grace() {
        let ignore_term = config("sh", &["-c", "trap '' TERM; sleep 30"]);
        let mut companion = Companion::spawn(&ignore_term)
            .unwrap()
            .with_grace(Duration::from_millis(200));
        // let the shell install its trap
        thread::sleep(Duration::from_millis(200));

        let started = Instant::now();
        companion.stop();
        assert!(companion.id().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_stops_child() {
        let companion = Companion::spawn(&config("sleep", &["30"])).unwrap();
        let pid = companion.id().unwrap() as libc::pid_t;
        drop(companion);
        // reaped, so the pid no longer names our child
        assert_ne!(unsafe { libc::kill(pid, 0) }, 0);
    }
}
