/*
 *  frontend.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
 *
 *  Terminal frontend - owns the terminal session and maps keys to requests
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

use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::ResetColor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// User requests observed since the previous frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub close_requested: bool,
    /// Set once per key press, not while the key is held
    pub reload_requested: bool,
}

impl FrameInput {
    fn absorb(&mut self, other: FrameInput) {
        self.close_requested |= other.close_requested;
        self.reload_requested |= other.reload_requested;
    }
}

/// Where the render loop gets its input from.
pub trait Frontend {
    /// Drain pending input without blocking.
    fn poll_input(&mut self) -> Result<FrameInput, FrontendError>;
}

/// Raw-mode alternate-screen session on the controlling terminal.
///
/// Plugins draw straight to stdout; this type only sets the terminal up,
/// reads keys, and puts everything back on drop.
pub struct TerminalFrontend {
    reload_key: char,
    active: bool,
}

impl TerminalFrontend {
    pub fn enter(reload_key: char) -> Result<Self, FrontendError> {
        terminal::enable_raw_mode()?;
        let mut frontend = Self {
            reload_key: reload_key.to_ascii_lowercase(),
            active: true,
        };
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            frontend.restore();
            return Err(e.into());
        }
        debug!("Terminal session started (reload key '{}')", frontend.reload_key);
        Ok(frontend)
    }

    /// Leave the alternate screen and raw mode. Safe to call more than once.
    pub fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let mut out = io::stdout();
        if let Err(e) = execute!(out, ResetColor, Show, LeaveAlternateScreen) {
            warn!("Could not leave alternate screen: {}", e);
        }
        let _ = out.flush();
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Could not disable raw mode: {}", e);
        }
        debug!("Terminal restored");
    }

    /// Map one key event to the requests it makes.
    pub fn classify(&self, key: KeyEvent) -> FrameInput {
        let mut input = FrameInput::default();
        if key.kind != KeyEventKind::Press {
            return input;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                input.close_requested = true
            }
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => input.close_requested = true,
            KeyCode::Char(c) if c.to_ascii_lowercase() == self.reload_key => {
                input.reload_requested = true
            }
            _ => {}
        }
        input
    }
}

impl Frontend for TerminalFrontend {
    fn poll_input(&mut self) -> Result<FrameInput, FrontendError> {
        let mut input = FrameInput::default();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                input.absorb(self.classify(key));
            }
        }
        Ok(input)
    }
}

impl Drop for TerminalFrontend {
    fn drop(&mut self) {
        self.restore();
    }
}
