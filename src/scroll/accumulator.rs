//! Integrates angle deltas into discrete, hysteresis-filtered scroll steps.
//!
//! Per sample:
//! 1. add the wrap-corrected delta to the accumulator,
//! 2. `raw_ticks = trunc(accumulator / degrees_per_tick)`,
//! 3. suppress a reversal (opposite sign to the last emitted step) until it
//!    reaches the hysteresis threshold, leaving the accumulator untouched,
//! 4. otherwise consume `raw_ticks * degrees_per_tick` and emit the step.
//!
//! The remainder after consumption is always smaller than one tick, so slow
//! rotation is never lost.

use super::normalize::{angle_delta, is_uninitialized, UNINITIALIZED_ANGLE};
use super::{ResolutionMode, ScrollConfig, ScrollStep};

/// Direction of the last emitted step (before the inverse flag is applied).
///
/// Starts as `Negative`, so positive motion from a fresh or reset state has
/// to clear the hysteresis threshold before the first step goes out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    fn of(ticks: i32) -> Option<Self> {
        match ticks {
            t if t > 0 => Some(Self::Positive),
            t if t < 0 => Some(Self::Negative),
            _ => None,
        }
    }

    /// Initial value, restored by [`ScrollAccumulator::reset`].
    pub const INITIAL: Self = Self::Negative;
}

/// Result of feeding one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Less than one tick accumulated.
    Idle,
    /// A reversal below the hysteresis threshold; `pending` ticks stay in
    /// the accumulator.
    Suppressed { pending: i32 },
    /// A step to report.
    Emitted(ScrollStep),
}

impl TickOutcome {
    pub fn step(self) -> Option<ScrollStep> {
        match self {
            TickOutcome::Emitted(step) => Some(step),
            _ => None,
        }
    }
}

/// Accumulator state. Owned by the sampling pipeline for the process lifetime.
#[derive(Clone, Debug)]
pub struct ScrollAccumulator {
    config: ScrollConfig,
    previous_angle: f32,
    accumulator: f32,
    previous_sign: Direction,
}

impl ScrollAccumulator {
    pub const fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            previous_angle: UNINITIALIZED_ANGLE,
            accumulator: 0.0,
            previous_sign: Direction::INITIAL,
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Last sample angle, or the sentinel before the first sample.
    pub fn previous_angle(&self) -> f32 {
        self.previous_angle
    }

    /// Un-emitted rotation in degrees.
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn previous_sign(&self) -> Direction {
        self.previous_sign
    }

    pub fn has_baseline(&self) -> bool {
        !is_uninitialized(self.previous_angle)
    }

    /// Forget the baseline and any pending rotation and re-arm the reversal
    /// gate. The next sample only re-establishes the reference angle.
    pub fn reset(&mut self) {
        self.previous_angle = UNINITIALIZED_ANGLE;
        self.accumulator = 0.0;
        self.previous_sign = Direction::INITIAL;
    }

    /// Feed one angle (degrees) and quantize with the given resolution.
    pub fn update(&mut self, angle: f32, mode: ResolutionMode) -> TickOutcome {
        let delta = angle_delta(angle, self.previous_angle);
        self.previous_angle = angle;
        self.accumulator += delta;

        let degrees_per_tick = self.config.degrees_per_tick(mode);
        // `as` truncates toward zero.
        let raw_ticks = (self.accumulator / degrees_per_tick) as i32;
        let Some(direction) = Direction::of(raw_ticks) else {
            return TickOutcome::Idle;
        };

        let reversal = direction != self.previous_sign;
        if reversal && raw_ticks.saturating_abs() < self.config.hysteresis_threshold {
            debug!("scroll: reversal of {} ticks held back", raw_ticks);
            return TickOutcome::Suppressed { pending: raw_ticks };
        }

        self.previous_sign = direction;
        self.accumulator -= raw_ticks as f32 * degrees_per_tick;

        let ticks = if self.config.inverse {
            -raw_ticks
        } else {
            raw_ticks
        };
        match ScrollStep::saturating_from_ticks(ticks) {
            Some(step) => TickOutcome::Emitted(step),
            None => TickOutcome::Idle,
        }
    }
}

impl Default for ScrollAccumulator {
    fn default() -> Self {
        Self::new(ScrollConfig::DEFAULT)
    }
}
