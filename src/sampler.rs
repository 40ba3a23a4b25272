//! Sampling cycle: sensor ─▶ pipeline ─▶ queue, plus the power handling the
//! scheduler asks for.
//!
//! [`ScrollPipeline`] is the pure part (accumulator + scheduler, no I/O).
//! [`Sampler`] owns the hardware and runs one cycle per call; the embedded
//! task only supplies the clock and sleeps for the returned period.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;

use crate::config;
use crate::link::LinkState;
use crate::power_mode::{PowerMode, PowerModeScheduler, PowerTimings, PowerTransition};
use crate::scroll::accumulator::{ScrollAccumulator, TickOutcome};
use crate::scroll::queue::ScrollQueue;
use crate::scroll::{AngleSample, ResolutionMode, ScrollConfig, ScrollStep};
use crate::sensor::readiness::{wait_until_ready, Readiness, RetryPolicy};
use crate::sensor::{AngleSensor, Hysteresis, PowerRail, SensorPowerMode};

// ═══════════════════════════════════════════════════════════════════════════
// Pure pipeline
// ═══════════════════════════════════════════════════════════════════════════

/// Result of advancing the pipeline by one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineOutput {
    pub outcome: TickOutcome,
    pub transition: Option<PowerTransition>,
}

/// All mutable scroll state, advanced once per sample.
#[derive(Clone, Debug)]
pub struct ScrollPipeline {
    accumulator: ScrollAccumulator,
    scheduler: PowerModeScheduler,
}

impl ScrollPipeline {
    pub const fn new(scroll: ScrollConfig, timings: PowerTimings, now_ms: u64) -> Self {
        Self {
            accumulator: ScrollAccumulator::new(scroll),
            scheduler: PowerModeScheduler::new(timings, now_ms),
        }
    }

    /// Accumulate one sample, then re-evaluate the power mode.
    pub fn advance(&mut self, sample: AngleSample, resolution: ResolutionMode) -> PipelineOutput {
        let outcome = self.accumulator.update(sample.angle, resolution);
        if let TickOutcome::Emitted(step) = outcome {
            debug!("scroll: step {} at {} ms", step.get(), sample.timestamp_ms);
            self.scheduler.record_event(sample.timestamp_ms);
        }
        PipelineOutput {
            outcome,
            transition: self.scheduler.evaluate(sample.timestamp_ms),
        }
    }

    /// A cycle without a sample: only the idle clock moves.
    pub fn idle(&mut self, now_ms: u64) -> Option<PowerTransition> {
        self.scheduler.evaluate(now_ms)
    }

    /// Drop the baseline and pending rotation, back to Active.
    pub fn reset(&mut self, now_ms: u64) {
        self.accumulator.reset();
        self.scheduler.reset(now_ms);
    }

    pub fn accumulator(&self) -> &ScrollAccumulator {
        &self.accumulator
    }

    pub fn scheduler(&self) -> &PowerModeScheduler {
        &self.scheduler
    }

    pub fn mode(&self) -> PowerMode {
        self.scheduler.mode()
    }
}

impl Default for ScrollPipeline {
    fn default() -> Self {
        Self::new(ScrollConfig::DEFAULT, PowerTimings::DEFAULT, 0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hardware-facing sampler
// ═══════════════════════════════════════════════════════════════════════════

/// Sensor register levels and power-up timing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorSettings {
    /// Wait after enabling the rail before talking to the sensor.
    pub settle_ms: u32,
    /// Register level written on entering LowPower.
    pub low_power_mode: SensorPowerMode,
    pub hysteresis: Hysteresis,
}

impl SensorSettings {
    pub const DEFAULT: Self = Self {
        settle_ms: config::SENSOR_SETTLE_MS,
        low_power_mode: config::SENSOR_LOW_POWER_MODE,
        hysteresis: config::SENSOR_HYSTERESIS,
    };

    /// Sensor register level for a scheduler mode. Doze has no register
    /// level; the rail is off.
    pub fn register_for(&self, mode: PowerMode) -> Option<SensorPowerMode> {
        match mode {
            PowerMode::Active => Some(SensorPowerMode::Nominal),
            PowerMode::LowPower => Some(self.low_power_mode),
            PowerMode::Doze => None,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What one [`Sampler::cycle`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    /// Sleep before the next cycle.
    pub period_ms: u32,
    /// Step handed to the queue (even if the queue dropped it).
    pub emitted: Option<ScrollStep>,
    pub transition: Option<PowerTransition>,
    /// The sensor read failed; the pipeline was not fed.
    pub skipped: bool,
}

pub struct Sampler<S, R, D> {
    sensor: S,
    rail: R,
    delay: D,
    settings: SensorSettings,
    pipeline: ScrollPipeline,
    /// Register write that failed and is retried next cycle.
    pending_register: Option<SensorPowerMode>,
    suspended: bool,
}

impl<S, R, D> Sampler<S, R, D>
where
    S: AngleSensor,
    R: PowerRail,
    D: DelayNs,
{
    /// Starts suspended; the first connected [`Sampler::poll`] initialises
    /// the sensor.
    pub fn new(sensor: S, rail: R, delay: D, settings: SensorSettings, pipeline: ScrollPipeline) -> Self {
        Self {
            sensor,
            rail,
            delay,
            settings,
            pipeline,
            pending_register: None,
            suspended: true,
        }
    }

    pub fn pipeline(&self) -> &ScrollPipeline {
        &self.pipeline
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn rail(&self) -> &R {
        &self.rail
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn pending_register(&self) -> Option<SensorPowerMode> {
        self.pending_register
    }

    /// Power the sensor and run the bounded startup probe.
    pub async fn wait_ready(&mut self, policy: RetryPolicy) -> Readiness {
        self.power_rail_on().await;
        wait_until_ready(&mut self.sensor, &mut self.delay, policy).await
    }

    /// Startup probe with one second chance: if nothing answered, cycle
    /// the rail and probe again under `late`. Only a sensor silent through
    /// both rounds is `Absent`.
    pub async fn bring_up(&mut self, first: RetryPolicy, late: RetryPolicy) -> Readiness {
        match self.wait_ready(first).await {
            Readiness::Absent => {
                warn!("Sampler: no sensor yet, power cycling for a late start");
                self.rail.disable();
                self.wait_ready(late).await
            }
            readiness => readiness,
        }
    }

    async fn power_rail_on(&mut self) {
        if !self.rail.is_enabled() {
            self.rail.enable();
            self.delay.delay_ms(self.settings.settle_ms).await;
        }
    }

    async fn write_register(&mut self, mode: SensorPowerMode) {
        match self.sensor.set_power_mode(mode).await {
            Ok(()) => self.pending_register = None,
            Err(e) => {
                warn!("Sampler: power register write failed: {:?}", e);
                self.pending_register = Some(mode);
            }
        }
    }

    /// Enable the rail, restore register defaults and throw away the first
    /// reading.
    async fn power_up(&mut self) {
        self.power_rail_on().await;
        if let Err(e) = self.sensor.apply_defaults(self.settings.hysteresis).await {
            warn!("Sampler: register defaults failed: {:?}", e);
            self.pending_register = Some(SensorPowerMode::Nominal);
        }
        let _ = self.sensor.fetch_angle().await;
    }

    /// One sampling cycle at `now_ms`.
    pub async fn cycle<M: RawMutex, const N: usize>(
        &mut self,
        queue: &ScrollQueue<M, N>,
        resolution: ResolutionMode,
        now_ms: u64,
    ) -> CycleReport {
        if !self.rail.is_enabled() {
            self.power_up().await;
        }
        if let Some(mode) = self.pending_register {
            self.write_register(mode).await;
        }

        let (emitted, transition, skipped) = match self.sensor.fetch_angle().await {
            Ok(angle) => {
                let out = self
                    .pipeline
                    .advance(AngleSample::new(angle, now_ms), resolution);
                let emitted = out.outcome.step();
                if let Some(step) = emitted {
                    // A full queue is logged by the queue itself.
                    let _ = queue.push(step);
                }
                (emitted, out.transition, false)
            }
            Err(e) => {
                warn!("Sampler: fetch failed: {:?}", e);
                (None, self.pipeline.idle(now_ms), true)
            }
        };

        if let Some(t) = transition {
            match self.settings.register_for(t.to) {
                Some(mode) => self.write_register(mode).await,
                None => self.pending_register = None,
            }
        }
        if self.pipeline.mode() == PowerMode::Doze {
            self.rail.disable();
        }

        CycleReport {
            period_ms: self.pipeline.scheduler().sleep_period_ms(),
            emitted,
            transition,
            skipped,
        }
    }

    /// Connectivity lost: sensor off, pipeline frozen.
    pub fn suspend(&mut self) {
        if !self.suspended {
            info!("Sampler: suspended");
        }
        self.rail.disable();
        self.pending_register = None;
        self.suspended = true;
    }

    /// Connectivity back: re-initialise the sensor and start from a fresh
    /// baseline.
    pub async fn resume<M: RawMutex, const N: usize>(
        &mut self,
        queue: &ScrollQueue<M, N>,
        now_ms: u64,
    ) {
        self.power_up().await;
        self.pipeline.reset(now_ms);
        let stale = queue.clear();
        if stale > 0 {
            debug!("Sampler: dropped {} stale steps", stale);
        }
        self.suspended = false;
        info!("Sampler: resumed");
    }

    /// Everything the sampling task does between two sleeps. Returns how
    /// long to sleep.
    pub async fn poll<M: RawMutex, const N: usize>(
        &mut self,
        queue: &ScrollQueue<M, N>,
        link: &LinkState,
        now_ms: u64,
    ) -> u32 {
        if !link.is_connected() {
            self.suspend();
            return config::DISCONNECTED_POLL_MS;
        }
        if self.suspended {
            self.resume(queue, now_ms).await;
        }
        self.cycle(queue, link.resolution_mode(), now_ms).await.period_ms
    }
}
