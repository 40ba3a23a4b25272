//! Power-mode scheduler - chooses the sampling cadence and sensor power
//! level from the time since the last emitted scroll step.
//!
//! ```text
//!   idle < LPM_TIMEOUT            ─▶ Active    (8 ms, sensor nominal)
//!   LPM_TIMEOUT <= idle < DOZE    ─▶ LowPower  (50 ms, sensor LPM register)
//!   idle >= DOZE_TIMEOUT          ─▶ Doze      (250 ms, sensor rail off)
//! ```
//!
//! Descending steps one level per evaluation, so Doze is always preceded
//! by LowPower. Any scroll step returns straight to Active.

use crate::config;

/// Power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Wheel in use - full-rate sampling, sensor at nominal power.
    Active,
    /// No recent scrolling - slower sampling, sensor low-power register.
    LowPower,
    /// Long inactivity - slowest sampling, sensor rail off between samples.
    Doze,
}

impl PowerMode {
    fn depth(self) -> u8 {
        match self {
            PowerMode::Active => 0,
            PowerMode::LowPower => 1,
            PowerMode::Doze => 2,
        }
    }

    fn one_deeper(self) -> Self {
        match self {
            PowerMode::Active => PowerMode::LowPower,
            PowerMode::LowPower | PowerMode::Doze => PowerMode::Doze,
        }
    }
}

/// Timeouts and sampling periods for the three modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerTimings {
    pub lpm_timeout_ms: u64,
    pub doze_timeout_ms: u64,
    pub active_period_ms: u32,
    pub lpm_period_ms: u32,
    pub doze_period_ms: u32,
}

impl PowerTimings {
    /// Values from [`crate::config`].
    pub const DEFAULT: Self = Self {
        lpm_timeout_ms: config::LPM_TIMEOUT_MS,
        doze_timeout_ms: config::DOZE_TIMEOUT_MS,
        active_period_ms: config::ACTIVE_SAMPLE_PERIOD_MS,
        lpm_period_ms: config::LPM_SAMPLE_PERIOD_MS,
        doze_period_ms: config::DOZE_SAMPLE_PERIOD_MS,
    };

    /// Sampling period for a mode.
    pub fn period_ms(&self, mode: PowerMode) -> u32 {
        match mode {
            PowerMode::Active => self.active_period_ms,
            PowerMode::LowPower => self.lpm_period_ms,
            PowerMode::Doze => self.doze_period_ms,
        }
    }

    /// Mode an idle duration calls for.
    pub fn target_mode(&self, idle_ms: u64) -> PowerMode {
        if idle_ms >= self.doze_timeout_ms {
            PowerMode::Doze
        } else if idle_ms >= self.lpm_timeout_ms {
            PowerMode::LowPower
        } else {
            PowerMode::Active
        }
    }
}

impl Default for PowerTimings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A mode change the sampler must apply to the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerTransition {
    pub from: PowerMode,
    pub to: PowerMode,
}

/// Tracks inactivity and the current mode.
#[derive(Clone, Debug)]
pub struct PowerModeScheduler {
    timings: PowerTimings,
    mode: PowerMode,
    last_event_ms: u64,
}

impl PowerModeScheduler {
    /// Start in Active with `now_ms` as the last activity.
    pub const fn new(timings: PowerTimings, now_ms: u64) -> Self {
        Self {
            timings,
            mode: PowerMode::Active,
            last_event_ms: now_ms,
        }
    }

    pub fn mode(&self) -> PowerMode {
        self.mode
    }

    pub fn timings(&self) -> &PowerTimings {
        &self.timings
    }

    pub fn last_event_ms(&self) -> u64 {
        self.last_event_ms
    }

    /// Period to sleep before the next sample.
    pub fn sleep_period_ms(&self) -> u32 {
        self.timings.period_ms(self.mode)
    }

    pub fn idle_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_event_ms)
    }

    /// A scroll step was emitted at `now_ms`.
    pub fn record_event(&mut self, now_ms: u64) {
        self.last_event_ms = now_ms;
    }

    /// Re-evaluate after a sample. Returns the transition to apply, or
    /// `None` when the mode is unchanged.
    pub fn evaluate(&mut self, now_ms: u64) -> Option<PowerTransition> {
        let target = self.timings.target_mode(self.idle_ms(now_ms));
        let next = if target.depth() > self.mode.depth() {
            self.mode.one_deeper()
        } else {
            target
        };

        if next == self.mode {
            return None;
        }

        let transition = PowerTransition {
            from: self.mode,
            to: next,
        };
        info!("Power: {:?} -> {:?}", transition.from, transition.to);
        self.mode = next;
        Some(transition)
    }

    /// Back to Active with fresh inactivity tracking (after reconnect).
    pub fn reset(&mut self, now_ms: u64) {
        self.mode = PowerMode::Active;
        self.last_event_ms = now_ms;
    }
}
