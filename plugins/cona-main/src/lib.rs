/*
 *  CONA Main Plugin
 *
 *  Final lifecycle phase. Never finishes; rebuild the crate while the host
 *  runs and press the reload key to swap the code in place.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # CONA main phase
//!
//! The state below survives hot reloads: the frame counter keeps counting
//! and the reload counter goes up by one on every swap. Changing the layout
//! of [`MainContent`] between two builds breaks that hand-off, so restart
//! the host after editing the struct itself.
//!
//! A reload is only counted when the state arrives in a different mapping
//! than the one that last owned it. A failed reload hands the state back to
//! the module it came from, and that must not show up on screen.

use std::io::{self, Write};

use cona_plugin::{export_plugin, Plugin};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

const BACKGROUND: Color = Color::Rgb { r: 0xE6, g: 0x29, b: 0x37 };
const FOREGROUND: Color = Color::White;

/// Lives once per mapping; its address tells two loads of this crate apart.
static MODULE_TAG: u8 = 0;

fn module_tag() -> usize {
    &MODULE_TAG as *const u8 as usize
}

#[repr(C)]
pub struct MainContent {
    frames: u64,
    reloads: u32,
    wave_phase: f32,
    /// [`module_tag`] of the mapping that owns this state
    owner: usize,
}

impl MainContent {
    fn draw(&self) -> io::Result<()> {
        let (w, h) = terminal::size()?;
        let mut out = io::stdout().lock();
        queue!(
            out,
            SetBackgroundColor(BACKGROUND),
            Clear(ClearType::All),
            SetForegroundColor(FOREGROUND),
            MoveTo(2, 1),
            Print("CONA"),
            MoveTo(2, 3),
            Print(format!("frame  {}", self.frames)),
            MoveTo(2, 4),
            Print(format!("reload {}", self.reloads)),
        )?;

        let mid = h as f32 * 0.6;
        for x in 0..w {
            let y = mid + (x as f32 * 0.15 + self.wave_phase).sin() * (h as f32 * 0.15);
            queue!(out, MoveTo(x, y.max(0.0) as u16), Print('•'))?;
        }

        queue!(
            out,
            MoveTo(2, h.saturating_sub(1)),
            Print("[r] reload   [q] quit"),
            ResetColor,
        )?;
        out.flush()
    }
}

impl Plugin for MainContent {
    fn init() -> Self {
        MainContent {
            frames: 0,
            reloads: 0,
            wave_phase: 0.0,
            owner: module_tag(),
        }
    }

    fn update(&mut self) {
        self.frames += 1;
        self.wave_phase = (self.wave_phase + 0.08) % std::f32::consts::TAU;
        cona_plugin::report_draw("cona-main", self.draw());
    }

    fn resume(&mut self) {
        let here = module_tag();
        if self.owner != here {
            self.owner = here;
            self.reloads += 1;
        }
    }
}

export_plugin!(persistent MainContent);
