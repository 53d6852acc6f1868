/*
 *  pacer.rs
 *
 *  CONA - Clean Open Native Animation
 *  (c) 2025-26 the CONA authors
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
use std::thread;
use std::time::{Duration, Instant};

/// Frame pacing for the render loop.
pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        let frame = Duration::from_micros((1_000_000u32 / target_fps.max(1)) as u64);
        Self { next_deadline: Instant::now() + frame, frame }
    }

    #[inline]
    pub fn frame(&self) -> Duration {
        self.frame
    }

    /// Sleep until the current frame's deadline and schedule the next one.
    /// A late frame re-anchors the schedule instead of trying to catch up.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if now < self.next_deadline {
            thread::sleep(self.next_deadline - now);
            self.next_deadline += self.frame;
        } else {
            self.next_deadline = now + self.frame;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        assert_eq!(Pacer::new(60).frame(), Duration::from_micros(16_666));
        assert_eq!(Pacer::new(0).frame(), Duration::from_secs(1));
    }

    #[test]
    fn test_wait_holds_the_rate() {
        let mut pacer = Pacer::new(200);
        let start = Instant::now();
        for _ in 0..4 {
            pacer.wait();
        }
        // four 5ms frames
        assert!(start.elapsed() >= Duration::from_millis(19));
    }

    #[test]
    fn test_late_frame_reanchors() {
        let mut pacer = Pacer::new(1000);
        thread::sleep(Duration::from_millis(5));
        let start = Instant::now();
        pacer.wait();
        assert!(pacer.next_deadline >= start + pacer.frame());
    }
}
