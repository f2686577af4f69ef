// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Progress display state machine.
//!
//! Consumes a [`SyncResult`] and drives the XP bar from the previously
//! displayed ratio to the new one:
//!
//! ```text
//! Idle -> Animating -> (LevelUp: bar hidden -> indicator shown)? -> Animating -> Idle
//! ```
//!
//! On a level-up the bar first fills to 100% of the old level's range, the
//! bar is hidden, the level-up indicator is shown for a fixed dwell, and then
//! the bar restarts at 0% and animates to the real percentage of the new
//! level. Time only advances through [`ProgressAnimator::tick`], so every
//! sequence is reproducible in tests.

use crate::models::SyncResult;
use crate::services::leveling::xp_progress_percent;
use std::time::Duration;

/// Length of one bar animation.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(2000);
/// Changes smaller than this (in percent) are applied without animating.
pub const NEGLIGIBLE_DELTA: f64 = 0.1;
/// Displayed percent at which a pending level-up starts.
pub const LEVEL_UP_TRIGGER: f64 = 99.9;
/// Delay between hiding the bar and showing the level-up indicator.
pub const BAR_HIDE_DELAY: Duration = Duration::from_millis(300);
/// How long the level-up indicator stays visible.
pub const INDICATOR_DWELL: Duration = Duration::from_millis(2000);

/// Ease-in-out quadratic curve on `t` in `[0, 1]`.
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelUpStage {
    BarHidden,
    IndicatorShown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Idle,
    Animating {
        from: f64,
        to: f64,
        elapsed: Duration,
    },
    LevelUp {
        stage: LevelUpStage,
        elapsed: Duration,
    },
}

/// Level reached at the end of a pending level-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingLevel {
    level: u32,
    points: u64,
}

/// What the UI should render right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub level: u32,
    pub percent: f64,
    pub bar_visible: bool,
    pub indicator_visible: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressAnimator {
    phase: Phase,
    displayed_level: u32,
    displayed_percent: f64,
    bar_visible: bool,
    indicator_visible: bool,
    pending: Option<PendingLevel>,
}

impl Default for ProgressAnimator {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl ProgressAnimator {
    /// Start idle, showing `points` within `level`.
    pub fn new(points: u64, level: u32) -> Self {
        Self {
            phase: Phase::Idle,
            displayed_level: level,
            displayed_percent: xp_progress_percent(points, level),
            bar_visible: true,
            indicator_visible: false,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn frame(&self) -> Frame {
        Frame {
            level: self.displayed_level,
            percent: self.displayed_percent,
            bar_visible: self.bar_visible,
            indicator_visible: self.indicator_visible,
        }
    }

    /// Start animating toward a sync result.
    ///
    /// Supersedes anything in flight: the new animation starts from whatever
    /// is displayed now. If the display is not on the result's old level
    /// (first result, or a level-up that was cut short) it snaps there first.
    pub fn apply(&mut self, result: &SyncResult) {
        self.bar_visible = true;
        self.indicator_visible = false;
        self.pending = None;

        if self.displayed_level != result.old_level {
            self.displayed_level = result.old_level;
            self.displayed_percent = xp_progress_percent(result.old_points, result.old_level);
        }

        if result.leveled_up {
            self.pending = Some(PendingLevel {
                level: result.level,
                points: result.points,
            });
            self.animate_to(100.0);
        } else {
            self.animate_to(xp_progress_percent(result.points, result.level));
        }
    }

    /// Advance time by `dt`. Returns `true` while a sequence is still running.
    pub fn tick(&mut self, dt: Duration) -> bool {
        match self.phase {
            Phase::Idle => {}
            Phase::Animating { from, to, elapsed } => {
                let elapsed = elapsed + dt;
                let t = elapsed.as_secs_f64() / ANIMATION_DURATION.as_secs_f64();
                if t >= 1.0 {
                    self.displayed_percent = to;
                    self.phase = Phase::Idle;
                } else {
                    self.displayed_percent = from + (to - from) * ease_in_out_quad(t);
                    self.phase = Phase::Animating { from, to, elapsed };
                }
                self.maybe_start_level_up();
            }
            Phase::LevelUp { stage, elapsed } => {
                let elapsed = elapsed + dt;
                match stage {
                    LevelUpStage::BarHidden if elapsed >= BAR_HIDE_DELAY => {
                        self.indicator_visible = true;
                        self.phase = Phase::LevelUp {
                            stage: LevelUpStage::IndicatorShown,
                            elapsed: Duration::ZERO,
                        };
                    }
                    LevelUpStage::IndicatorShown if elapsed >= INDICATOR_DWELL => {
                        self.finish_level_up();
                    }
                    _ => self.phase = Phase::LevelUp { stage, elapsed },
                }
            }
        }
        !self.is_idle()
    }

    fn animate_to(&mut self, target: f64) {
        if (target - self.displayed_percent).abs() < NEGLIGIBLE_DELTA {
            self.displayed_percent = target;
            self.phase = Phase::Idle;
            self.maybe_start_level_up();
        } else {
            self.phase = Phase::Animating {
                from: self.displayed_percent,
                to: target,
                elapsed: Duration::ZERO,
            };
        }
    }

    fn maybe_start_level_up(&mut self) {
        if self.pending.is_some() && self.displayed_percent >= LEVEL_UP_TRIGGER {
            self.bar_visible = false;
            self.phase = Phase::LevelUp {
                stage: LevelUpStage::BarHidden,
                elapsed: Duration::ZERO,
            };
        }
    }

    fn finish_level_up(&mut self) {
        self.indicator_visible = false;
        self.bar_visible = true;
        self.phase = Phase::Idle;

        let Some(pending) = self.pending.take() else {
            return;
        };
        self.displayed_level = pending.level;
        self.displayed_percent = 0.0;
        self.animate_to(xp_progress_percent(pending.points, pending.level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(old_points: u64, old_level: u32, points: u64, level: u32) -> SyncResult {
        SyncResult {
            points,
            level,
            leveled_up: level > old_level,
            old_level,
            old_points,
            courses_created: 0,
            courses_updated: 0,
            badges_unlocked: 0,
            error: None,
        }
    }

    fn run_until_idle(animator: &mut ProgressAnimator) -> Vec<Frame> {
        let mut frames = Vec::new();
        for _ in 0..1000 {
            let running = animator.tick(Duration::from_millis(50));
            frames.push(animator.frame());
            if !running {
                break;
            }
        }
        frames
    }

    #[test]
    fn test_ease_endpoints() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert_eq!(ease_in_out_quad(0.5), 0.5);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
        assert!(ease_in_out_quad(0.25) < 0.25);
        assert!(ease_in_out_quad(0.75) > 0.75);
    }

    #[test]
    fn test_animates_within_level() {
        // 100 -> 250 within level 2: 0% -> 50%
        let mut animator = ProgressAnimator::new(100, 2);
        animator.apply(&result(100, 2, 250, 2));
        assert!(matches!(animator.phase(), Phase::Animating { .. }));

        animator.tick(Duration::from_millis(1000));
        assert!((animator.frame().percent - 25.0).abs() < 1e-9);

        animator.tick(Duration::from_millis(1000));
        assert!(animator.is_idle());
        assert!((animator.frame().percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_negligible_delta_does_not_animate() {
        let mut animator = ProgressAnimator::new(250, 2);
        animator.apply(&result(250, 2, 250, 2));
        assert!(animator.is_idle());
        assert!((animator.frame().percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_up_sequence() {
        // 90 (level 1, 90%) -> 250 (level 2, 50%)
        let mut animator = ProgressAnimator::new(90, 1);
        animator.apply(&result(90, 1, 250, 2));

        // Fill the old level first.
        animator.tick(ANIMATION_DURATION);
        let frame = animator.frame();
        assert_eq!(frame.level, 1);
        assert_eq!(frame.percent, 100.0);
        assert!(!frame.bar_visible);
        assert!(!frame.indicator_visible);

        animator.tick(BAR_HIDE_DELAY);
        assert!(animator.frame().indicator_visible);
        assert_eq!(
            animator.phase(),
            Phase::LevelUp {
                stage: LevelUpStage::IndicatorShown,
                elapsed: Duration::ZERO
            }
        );

        animator.tick(INDICATOR_DWELL);
        let frame = animator.frame();
        assert_eq!(frame.level, 2);
        assert_eq!(frame.percent, 0.0);
        assert!(frame.bar_visible);
        assert!(!frame.indicator_visible);

        animator.tick(ANIMATION_DURATION);
        assert!(animator.is_idle());
        assert!((animator.frame().percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_up_frames_are_monotonic_per_level() {
        let mut animator = ProgressAnimator::new(90, 1);
        animator.apply(&result(90, 1, 250, 2));
        let frames = run_until_idle(&mut animator);

        for pair in frames.windows(2) {
            if pair[0].level == pair[1].level {
                assert!(pair[1].percent >= pair[0].percent);
            }
        }
        assert_eq!(frames.last().map(|f| f.level), Some(2));
        assert!(frames.iter().any(|f| f.indicator_visible));
    }

    #[test]
    fn test_new_result_supersedes_in_flight_animation() {
        let mut animator = ProgressAnimator::new(100, 2);
        animator.apply(&result(100, 2, 250, 2));
        animator.tick(Duration::from_millis(1000));
        let midway = animator.frame().percent;

        // A second sync lands before the first animation finishes.
        animator.apply(&result(250, 2, 325, 2));
        match animator.phase() {
            Phase::Animating { from, to, .. } => {
                assert_eq!(from, midway);
                assert!((to - 75.0).abs() < 1e-9);
            }
            other => panic!("expected animation, got {:?}", other),
        }

        run_until_idle(&mut animator);
        assert!((animator.frame().percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_result_superseding_level_up_resets_indicator() {
        let mut animator = ProgressAnimator::new(90, 1);
        animator.apply(&result(90, 1, 250, 2));
        animator.tick(ANIMATION_DURATION);
        animator.tick(BAR_HIDE_DELAY);
        assert!(animator.frame().indicator_visible);

        animator.apply(&result(250, 2, 325, 2));
        let frame = animator.frame();
        assert_eq!(frame.level, 2);
        assert!(frame.bar_visible);
        assert!(!frame.indicator_visible);

        run_until_idle(&mut animator);
        assert!((animator.frame().percent - 75.0).abs() < 1e-9);
    }
}
