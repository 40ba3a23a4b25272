//! Angle-to-scroll signal pipeline.
//!
//! ```text
//! angle sample ─▶ normalize ─▶ accumulate / quantize / hysteresis ─▶ ScrollQueue
//! ```
//!
//! Everything here is pure logic: no hardware, no clocks. Timestamps are
//! plain milliseconds supplied by the caller.

pub mod accumulator;
pub mod normalize;
pub mod queue;


use crate::config;

/// One angle reading taken by the sampling task.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngleSample {
    /// Rotation in degrees, nominally `[0, 360)`.
    pub angle: f32,
    /// Monotonic time of the reading (ms since boot).
    pub timestamp_ms: u64,
}

impl AngleSample {
    pub const fn new(angle: f32, timestamp_ms: u64) -> Self {
        Self {
            angle,
            timestamp_ms,
        }
    }
}

/// A signed, non-zero wheel movement in report units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScrollStep(i8);

impl ScrollStep {
    /// Smallest value the wheel usage accepts (logical minimum -127).
    pub const MIN: i8 = -127;
    /// Largest value the wheel usage accepts (logical maximum 127).
    pub const MAX: i8 = 127;

    /// Wrap a wheel value; zero is not a step.
    pub const fn new(value: i8) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Clamp a tick count into the wheel's logical range.
    pub fn saturating_from_ticks(ticks: i32) -> Option<Self> {
        Self::new(ticks.clamp(Self::MIN as i32, Self::MAX as i32) as i8)
    }

    pub const fn get(self) -> i8 {
        self.0
    }
}

/// Which degrees-per-tick constant the accumulator quantizes with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResolutionMode {
    /// One tick per notch.
    #[default]
    Normal,
    /// Host enabled the resolution multiplier: one tick per 1/multiplier notch.
    HighResolution,
}

/// Tuning for the accumulator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScrollConfig {
    /// Rotation that produces one notch.
    pub degrees_per_notch: f32,
    /// Ticks per notch in high-resolution mode.
    pub resolution_multiplier: u8,
    /// A reversal must reach this many ticks before it is emitted.
    pub hysteresis_threshold: i32,
    /// Flip the sign of emitted steps.
    pub inverse: bool,
}

impl ScrollConfig {
    /// Values from [`crate::config`].
    pub const DEFAULT: Self = Self {
        degrees_per_notch: config::SCROLL_DEGREES_PER_NOTCH,
        resolution_multiplier: config::SCROLL_RESOLUTION_MULTIPLIER,
        hysteresis_threshold: config::SCROLL_HYSTERESIS_THRESHOLD,
        inverse: config::SCROLL_INVERSE,
    };

    /// Degrees of rotation per emitted tick in the given mode.
    pub fn degrees_per_tick(&self, mode: ResolutionMode) -> f32 {
        match mode {
            ResolutionMode::Normal => self.degrees_per_notch,
            ResolutionMode::HighResolution => {
                self.degrees_per_notch / self.resolution_multiplier.max(1) as f32
            }
        }
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
