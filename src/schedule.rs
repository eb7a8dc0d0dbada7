//! Deferred work and frame-driven animation.
//!
//! Nothing here reads a wall clock. The host reports layout passes and elapsed frame
//! time, which keeps ordering deterministic and lets tests step frames by hand.

use geo::Coord;

/// Work that must wait until the host has laid out the current frame. Tasks run in
/// insertion order and a task already waiting is not queued twice.
#[derive(Debug)]
pub struct LayoutQueue<T> {
    pending: Vec<T>,
}

impl<T> Default for LayoutQueue<T> {
    fn default() -> Self {
        Self { pending: Vec::new() }
    }
}

impl<T: PartialEq> LayoutQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: T) {
        if !self.pending.contains(&task) {
            self.pending.push(task);
        }
    }

    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// One-shot countdown in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    remaining_ms: f64,
    fired: bool,
}

impl Countdown {
    pub fn new(ms: f64) -> Self {
        Self {
            remaining_ms: ms,
            fired: false,
        }
    }

    /// Advance; returns true exactly once, on the tick that reaches zero. A countdown
    /// created at or below zero fires on its first tick.
    pub fn advance(&mut self, dt_ms: f64) -> bool {
        if self.fired {
            return false;
        }
        self.remaining_ms -= dt_ms.max(0.0);
        // NaN durations count as elapsed.
        if !(self.remaining_ms > 0.0) {
            self.fired = true;
        }
        self.fired
    }
}

/// Animated transition of the view center and zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewAnimation<A> {
    from_center: Coord<f64>,
    to_center: Coord<f64>,
    from_zoom: f64,
    to_zoom: f64,
    duration_ms: f64,
    elapsed_ms: f64,
    /// What to do once the animation lands.
    pub then: Option<A>,
}

/// View state for one animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrame {
    pub center: Coord<f64>,
    pub zoom: f64,
    pub finished: bool,
}

impl<A> ViewAnimation<A> {
    pub fn new(
        from: (Coord<f64>, f64),
        to: (Coord<f64>, f64),
        duration_ms: f64,
        then: Option<A>,
    ) -> Self {
        Self {
            from_center: from.0,
            to_center: to.0,
            from_zoom: from.1,
            to_zoom: to.1,
            duration_ms,
            elapsed_ms: 0.0,
            then,
        }
    }

    pub fn step(&mut self, dt_ms: f64) -> ViewFrame {
        self.elapsed_ms += dt_ms.max(0.0);
        let t = if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).min(1.0)
        };
        if t >= 1.0 {
            return ViewFrame {
                center: self.to_center,
                zoom: self.to_zoom,
                finished: true,
            };
        }
        let e = ease_in_out(t);
        ViewFrame {
            center: Coord {
                x: self.from_center.x + (self.to_center.x - self.from_center.x) * e,
                y: self.from_center.y + (self.to_center.y - self.from_center.y) * e,
            },
            zoom: self.from_zoom + (self.to_zoom - self.from_zoom) * e,
            finished: false,
        }
    }
}

fn ease_in_out(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Highlight pulse: a fixed number of swell/settle cycles on one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub feature_id: i64,
    phases: u32,
    interval_ms: f64,
    elapsed_ms: f64,
    phase: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseFrame {
    Phase(u32),
    Finished,
}

impl Pulse {
    pub fn new(feature_id: i64, cycles: u32, interval_ms: f64) -> Self {
        Self {
            feature_id,
            phases: cycles.saturating_mul(2),
            interval_ms: interval_ms.max(1.0),
            elapsed_ms: 0.0,
            phase: 0,
        }
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn step(&mut self, dt_ms: f64) -> PulseFrame {
        self.elapsed_ms += dt_ms.max(0.0);
        if self.elapsed_ms >= self.interval_ms {
            let whole = (self.elapsed_ms / self.interval_ms).floor();
            self.elapsed_ms %= self.interval_ms;
            self.phase = self.phase.saturating_add(whole.min(u32::MAX as f64) as u32);
        }
        if self.phase >= self.phases {
            PulseFrame::Finished
        } else {
            PulseFrame::Phase(self.phase)
        }
    }
}
