/*
 *  CONA Splash Plugin
 *
 *  First lifecycle phase: pulse, expanding ring, title reveal, fade out.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # CONA splash phase
//!
//! Runs for [`DURATION_SECS`] and then reports itself finished so the host
//! moves on to the boot phase.

use std::io::{self, Write};
use std::time::Instant;

use cona_plugin::{export_plugin, Plugin};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

pub const DURATION_SECS: f32 = 3.5;

const TITLE: &str = "C O N A";
const SUBTITLE: &str = "Clean Open Native Animation";
const BACKGROUND: Color = Color::Rgb { r: 0x0B, g: 0x0B, b: 0x0F };

pub struct Splash {
    started: Instant,
    finished: bool,
}

fn smooth(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn grey(level: f32) -> Color {
    let v = (level.clamp(0.0, 1.0) * 255.0) as u8;
    Color::Rgb { r: v, g: v, b: v }
}

impl Splash {
    fn draw(&self, t: f32) -> io::Result<()> {
        let (w, h) = terminal::size()?;
        let (cx, cy) = (w as f32 * 0.5, h as f32 * 0.5 - 2.0);

        // everything dims together during the last second
        let fade = 1.0 - if t > 2.5 { smooth(t - 2.5) } else { 0.0 };

        let mut out = io::stdout().lock();
        queue!(out, SetBackgroundColor(BACKGROUND), Clear(ClearType::All))?;

        if t < 1.0 {
            let radius = 1.5 + smooth(t / 0.8) * 3.0;
            disc(&mut out, cx, cy, radius, 0.0, grey(0.9 * fade), w, h)?;
        }

        if t > 0.4 && t < 1.6 {
            let rt = smooth((t - 0.4) / 1.2);
            let radius = 4.5 + rt * 9.0;
            disc(&mut out, cx, cy, radius, radius - 0.6, grey(0.6 * (1.0 - rt) * fade), w, h)?;
        }

        if t > 1.0 {
            let alpha = smooth((t - 1.0) / 0.8) * fade;
            let title_x = (cx - TITLE.len() as f32 * 0.5).max(0.0) as u16;
            let sub_x = (cx - SUBTITLE.len() as f32 * 0.5).max(0.0) as u16;
            let title_y = (cy + 3.0).min(h.saturating_sub(2) as f32) as u16;
            queue!(
                out,
                MoveTo(title_x, title_y),
                SetForegroundColor(grey(alpha)),
                Print(TITLE),
                MoveTo(sub_x, title_y + 1),
                SetForegroundColor(grey(alpha * 0.7)),
                Print(SUBTITLE),
            )?;
        }

        queue!(out, ResetColor)?;
        out.flush()
    }
}

/// Fill cells whose distance from the centre lies in `inner..=outer`.
/// Terminal cells are roughly twice as tall as wide, hence the x scaling.
#[allow(clippy::too_many_arguments)]
fn disc(
    out: &mut impl Write,
    cx: f32,
    cy: f32,
    outer: f32,
    inner: f32,
    color: Color,
    w: u16,
    h: u16,
) -> io::Result<()> {
    queue!(out, SetForegroundColor(color))?;
    let top = (cy - outer).floor().max(0.0) as u16;
    let bottom = (cy + outer).ceil().min(h.saturating_sub(1) as f32) as u16;
    let left = (cx - outer * 2.0).floor().max(0.0) as u16;
    let right = (cx + outer * 2.0).ceil().min(w.saturating_sub(1) as f32) as u16;

    for y in top..=bottom {
        for x in left..=right {
            let dx = (x as f32 - cx) * 0.5;
            let dy = y as f32 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d <= outer && d >= inner {
                queue!(out, MoveTo(x, y), Print('█'))?;
            }
        }
    }
    Ok(())
}

impl Plugin for Splash {
    fn init() -> Self {
        Splash {
            started: Instant::now(),
            finished: false,
        }
    }

    fn update(&mut self) {
        let t = self.started.elapsed().as_secs_f32();
        if t > DURATION_SECS {
            self.finished = true;
        }
        cona_plugin::report_draw("cona-splash", self.draw(t));
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

export_plugin!(Splash);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_is_clamped() {
        assert_eq!(smooth(-1.0), 0.0);
        assert_eq!(smooth(2.0), 1.0);
        assert!((smooth(0.5) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_not_finished_before_duration() {
        let splash = Splash::init();
        assert!(!splash.is_finished());
    }
}
