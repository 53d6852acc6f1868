/*
 *  CONA Boot Plugin
 *
 *  Second lifecycle phase: fake boot log with a loading bar.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

use std::io::{self, Write};
use std::time::Instant;

use cona_plugin::{export_plugin, Plugin};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use rand::Rng;

pub const DURATION_SECS: f32 = 4.5;

const BOOT_MESSAGES: [&str; 11] = [
    "Initializing kernel...",
    "Loading drivers...",
    "Mounting file system...",
    "Allocating memory pages...",
    "Checking integrity...",
    "Starting services...",
    "Connecting to network...",
    "Fetching remote config...",
    "Optimizing shaders...",
    "Pre-rendering lightmaps...",
    "System READY.",
];

const GREEN: Color = Color::Rgb { r: 0x00, g: 0xE4, b: 0x30 };
const DARK_GREEN: Color = Color::Rgb { r: 0x00, g: 0x75, b: 0x2C };

pub struct Boot {
    started: Instant,
    finished: bool,
    /// Seconds after start at which each line appears.
    line_times: Vec<f32>,
}

impl Boot {
    fn with_line_times(line_times: Vec<f32>) -> Self {
        Boot {
            started: Instant::now(),
            finished: false,
            line_times,
        }
    }

    fn visible_lines(&self, t: f32) -> usize {
        self.line_times.iter().take_while(|&&at| t >= at).count()
    }

    fn draw(&self, t: f32) -> io::Result<()> {
        let (w, h) = terminal::size()?;
        let mut out = io::stdout().lock();
        queue!(out, SetBackgroundColor(Color::Black), Clear(ClearType::All))?;

        let top = (h / 2).saturating_sub(BOOT_MESSAGES.len() as u16 / 2 + 2);
        queue!(out, SetForegroundColor(GREEN))?;
        for (i, line) in BOOT_MESSAGES.iter().take(self.visible_lines(t)).enumerate() {
            queue!(out, MoveTo(4, top + i as u16), Print(line))?;
        }

        if t > 0.2 {
            let progress = ((t - 0.2) / (DURATION_SECS - 1.0)).min(1.0);
            let bar_w = (w as f32 * 0.6) as u16;
            let bar_x = (w - bar_w) / 2;
            let bar_y = h.saturating_sub(3);
            let filled = (bar_w as f32 * progress) as u16;
            queue!(
                out,
                MoveTo(bar_x, bar_y),
                SetForegroundColor(GREEN),
                Print("█".repeat(filled as usize)),
                SetForegroundColor(DARK_GREEN),
                Print("░".repeat((bar_w - filled) as usize)),
            )?;
        }

        // dim to black over the final half second
        if t > DURATION_SECS - 0.5 {
            let alpha = ((t - (DURATION_SECS - 0.5)) / 0.5).min(1.0);
            if alpha > 0.5 {
                queue!(out, SetBackgroundColor(Color::Black), Clear(ClearType::All))?;
            }
        }

        queue!(out, ResetColor)?;
        out.flush()
    }
}

impl Plugin for Boot {
    fn init() -> Self {
        let mut rng = rand::rng();
        let mut at = 0.5;
        let line_times = BOOT_MESSAGES
            .iter()
            .map(|_| {
                let shown = at;
                at += 0.2 + rng.random::<f32>() * 0.3;
                shown
            })
            .collect();
        Boot::with_line_times(line_times)
    }

    fn update(&mut self) {
        let t = self.started.elapsed().as_secs_f32();
        if t > DURATION_SECS {
            self.finished = true;
        }
        cona_plugin::report_draw("cona-boot", self.draw(t));
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

export_plugin!(Boot);
