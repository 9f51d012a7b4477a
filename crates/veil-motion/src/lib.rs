// Scroll motion for the panel stack: eased continuous scrolling and
// fixed-duration paged jumps, sharing one scroll state.
//
// The controller never sleeps or spawns timers. Each tick publishes the
// next deadline via `next_deadline()`; whoever drives the event loop waits
// until then and calls `tick(now)` again.

mod clock;

use std::time::{Duration, Instant};

pub use clock::{Clock, ManualClock, SystemClock};

/// Fraction of the remaining distance covered per scroll tick.
pub const EASE_FACTOR: f32 = 0.2;
/// ~60 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);
/// Below this distance (px) the scroll snaps onto its target.
pub const SNAP_THRESHOLD: f32 = 1.0;
pub const PAGE_DURATION: Duration = Duration::from_millis(150);

// ──────────────────────────────────────────────
// Configuration & state
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionConfig {
    pub ease_factor: f32,
    pub tick_interval: Duration,
    pub snap_threshold: f32,
    pub page_duration: Duration,
    /// When true a scroll request replaces a running page animation (and
    /// vice versa). When false the request is dropped while the other kind
    /// of animation runs.
    pub preempt: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            ease_factor: EASE_FACTOR,
            tick_interval: TICK_INTERVAL,
            snap_threshold: SNAP_THRESHOLD,
            page_duration: PAGE_DURATION,
            preempt: true,
        }
    }
}

/// Offsets are non-positive: `0` shows the top of the stack and
/// `-max_scroll` shows the bottom. Panels are drawn at `y + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollState {
    pub offset: f32,
    pub target: f32,
    pub animating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Prev,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Animation {
    Idle,
    Ease {
        next_tick: Instant,
    },
    Page {
        started: Instant,
        from: f32,
        next_tick: Instant,
    },
}

/// Cubic ease-out: fast start, gentle landing.
pub fn ease_out_cubic(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powi(3)
}

// ──────────────────────────────────────────────
// MotionController
// ──────────────────────────────────────────────

pub struct MotionController {
    config: MotionConfig,
    state: ScrollState,
    animation: Animation,
    max_scroll: f32,
}

impl MotionController {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: ScrollState::default(),
            animation: Animation::Idle,
            max_scroll: 0.0,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn offset(&self) -> f32 {
        self.state.offset
    }

    pub fn max_scroll(&self) -> f32 {
        self.max_scroll
    }

    pub fn is_animating(&self) -> bool {
        self.state.animating
    }

    pub fn is_paging(&self) -> bool {
        matches!(self.animation, Animation::Page { .. })
    }

    fn clamp(&self, offset: f32) -> f32 {
        offset.clamp(-self.max_scroll, 0.0)
    }

    /// Update the scroll range after a layout pass. Offset and target are
    /// clamped into the new range. Returns true if the offset moved.
    pub fn set_max_scroll(&mut self, max_scroll: f32) -> bool {
        self.max_scroll = if max_scroll.is_finite() {
            max_scroll.max(0.0)
        } else {
            0.0
        };
        self.state.target = self.clamp(self.state.target);
        let clamped = self.clamp(self.state.offset);
        if clamped == self.state.offset {
            return false;
        }
        self.state.offset = clamped;
        if !self.state.animating {
            self.state.target = clamped;
        }
        true
    }

    /// Back to the top with nothing in flight.
    pub fn reset(&mut self) {
        self.state = ScrollState::default();
        self.animation = Animation::Idle;
    }

    /// Drop any pending tick and hold the current offset.
    pub fn cancel(&mut self) {
        self.animation = Animation::Idle;
        self.state.target = self.state.offset;
        self.state.animating = false;
    }

    /// When the next tick is due, if anything is animating.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.animation {
            Animation::Idle => None,
            Animation::Ease { next_tick } | Animation::Page { next_tick, .. } => Some(next_tick),
        }
    }

    // ── Continuous scrolling ──

    /// Move the target by `delta` (negative scrolls down the stack). Starts
    /// the eased loop if it is not already running. Returns false when the
    /// request changed nothing.
    pub fn scroll_by(&mut self, delta: f32, now: Instant) -> bool {
        if !delta.is_finite() {
            return false;
        }
        let target = self.clamp(self.state.target + delta);
        self.retarget(target, now)
    }

    pub fn scroll_to(&mut self, offset: f32, now: Instant) -> bool {
        if !offset.is_finite() {
            return false;
        }
        let target = self.clamp(offset);
        self.retarget(target, now)
    }

    pub fn scroll_to_top(&mut self, now: Instant) -> bool {
        self.scroll_to(0.0, now)
    }

    pub fn scroll_to_bottom(&mut self, now: Instant) -> bool {
        self.scroll_to(-self.max_scroll, now)
    }

    fn retarget(&mut self, target: f32, now: Instant) -> bool {
        let paging = self.is_paging();
        if paging && !self.config.preempt {
            log::debug!("Scroll request ignored while a page animation runs");
            return false;
        }
        if target == self.state.target && !paging {
            return false;
        }

        self.state.target = target;
        if !matches!(self.animation, Animation::Ease { .. }) {
            // A running ease loop re-reads the target on its next tick.
            self.animation = Animation::Ease { next_tick: now };
            self.state.animating = true;
        }
        true
    }

    // ── Paged navigation ──

    /// Jump one page up or down. `stops` are the scroll distances of each
    /// page, ascending from 0. The current page is the stop nearest the
    /// committed target, so rapid presses advance one page each.
    pub fn navigate_to_page(
        &mut self,
        direction: PageDirection,
        stops: &[f32],
        now: Instant,
    ) -> bool {
        if stops.is_empty() {
            return false;
        }
        if matches!(self.animation, Animation::Ease { .. }) && !self.config.preempt {
            log::debug!("Page request ignored while scrolling");
            return false;
        }

        let position = -self.state.target;
        let current = stops
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (**a - position).abs().total_cmp(&(**b - position).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let page = match direction {
            PageDirection::Prev => current.saturating_sub(1),
            PageDirection::Next => current + 1,
        }
        .min(stops.len() - 1);

        let to = self.clamp(-stops[page]);
        if to == self.state.target {
            return false;
        }

        log::debug!("Paging {:?} to page {} (offset {})", direction, page, to);
        self.state.target = to;
        self.state.animating = true;
        self.animation = Animation::Page {
            started: now,
            from: self.state.offset,
            next_tick: now,
        };
        true
    }

    // ── Ticking ──

    /// Advance whatever animation is running. Returns true when the offset
    /// may have changed and a relayout is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.animation {
            Animation::Idle => false,
            Animation::Ease { next_tick } => {
                if now < next_tick {
                    return false;
                }
                let remaining = self.state.target - self.state.offset;
                if remaining.abs() < self.config.snap_threshold {
                    self.finish();
                } else {
                    self.state.offset += remaining * self.config.ease_factor;
                    self.animation = Animation::Ease {
                        next_tick: now + self.config.tick_interval,
                    };
                }
                true
            }
            Animation::Page {
                started,
                from,
                next_tick,
            } => {
                if now < next_tick {
                    return false;
                }
                let duration = self.config.page_duration.as_secs_f32();
                let elapsed = now.saturating_duration_since(started).as_secs_f32();
                let progress = if duration > 0.0 { elapsed / duration } else { 1.0 };
                if progress >= 1.0 {
                    self.finish();
                } else {
                    let to = self.state.target;
                    self.state.offset = from + (to - from) * ease_out_cubic(progress);
                    self.animation = Animation::Page {
                        started,
                        from,
                        next_tick: now + self.config.tick_interval,
                    };
                }
                true
            }
        }
    }

    fn finish(&mut self) {
        self.state.offset = self.state.target;
        self.state.animating = false;
        self.animation = Animation::Idle;
    }
}

impl Default for MotionController {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}
