//! Bounded startup probe: wait for the sensor to answer and see a magnet.

use embedded_hal_async::delay::DelayNs;

use super::AngleSensor;
use crate::config;
use crate::error::SensorError;

/// Outcome of [`wait_until_ready`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Readiness {
    /// Sensor answered and reports a magnet.
    Ready,
    /// Sensor answered at least once but never reported a usable magnet.
    TimedOut,
    /// Nothing acknowledged the address on any attempt.
    Absent,
}

/// Attempt count and exponential backoff between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    pub attempts: u8,
    pub initial_backoff_ms: u32,
    pub max_backoff_ms: u32,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        attempts: config::SENSOR_READY_ATTEMPTS,
        initial_backoff_ms: config::SENSOR_READY_BACKOFF_MS,
        max_backoff_ms: config::SENSOR_READY_BACKOFF_MAX_MS,
    };

    /// Slower round for a sensor that did not answer at all in the first.
    pub const LATE_START: Self = Self {
        attempts: config::SENSOR_LATE_READY_ATTEMPTS,
        initial_backoff_ms: config::SENSOR_LATE_READY_BACKOFF_MS,
        max_backoff_ms: config::SENSOR_LATE_READY_BACKOFF_MAX_MS,
    };

    /// Sum of the delays between attempts.
    pub fn total_backoff_ms(&self) -> u32 {
        (0..self.attempts.saturating_sub(1)).fold(0u32, |acc, a| acc.saturating_add(self.backoff_ms(a)))
    }

    /// Delay after the zero-based `attempt` failed.
    pub fn backoff_ms(&self, attempt: u8) -> u32 {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Probe the sensor up to `policy.attempts` times, backing off in between.
pub async fn wait_until_ready<S, D>(sensor: &mut S, delay: &mut D, policy: RetryPolicy) -> Readiness
where
    S: AngleSensor,
    D: DelayNs,
{
    let mut nacks = 0u8;

    for attempt in 0..policy.attempts {
        match sensor.probe().await {
            Ok(status) if status.detected => {
                if status.too_weak || status.too_strong {
                    warn!(
                        "Sensor: magnet field out of range (weak={}, strong={})",
                        status.too_weak, status.too_strong
                    );
                }
                info!("Sensor: ready after {} attempt(s)", attempt + 1);
                return Readiness::Ready;
            }
            Ok(_) => {
                debug!("Sensor: {:?} on attempt {}", SensorError::MagnetNotDetected, attempt + 1);
            }
            Err(SensorError::NotPresent) => {
                nacks += 1;
                debug!("Sensor: no ACK on attempt {}", attempt + 1);
            }
            Err(e) => {
                debug!("Sensor: {:?} on attempt {}", e, attempt + 1);
            }
        }

        if attempt + 1 < policy.attempts {
            delay.delay_ms(policy.backoff_ms(attempt)).await;
        }
    }

    if policy.attempts > 0 && nacks == policy.attempts {
        error!("Sensor: absent after {} attempts", policy.attempts);
        Readiness::Absent
    } else {
        warn!("Sensor: not ready after {} attempts", policy.attempts);
        Readiness::TimedOut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Hysteresis, MagnetStatus, SensorPowerMode};
    use embassy_futures::block_on;

    /// Returns scripted probe results, then repeats the last one.
    struct ScriptedSensor<'a> {
        script: &'a [Result<MagnetStatus, SensorError>],
        probes: usize,
    }

    impl AngleSensor for ScriptedSensor<'_> {
        async fn fetch_angle(&mut self) -> Result<f32, SensorError> {
            Ok(0.0)
        }

        async fn probe(&mut self) -> Result<MagnetStatus, SensorError> {
            let i = self.probes.min(self.script.len() - 1);
            self.probes += 1;
            self.script[i]
        }

        async fn set_power_mode(&mut self, _: SensorPowerMode) -> Result<(), SensorError> {
            Ok(())
        }

        async fn set_hysteresis(&mut self, _: Hysteresis) -> Result<(), SensorError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        total_ms: u32,
        calls: u32,
    }

    impl DelayNs for RecordingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns / 1_000_000;
            self.calls += 1;
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
            self.calls += 1;
        }
    }

    const MAGNET: MagnetStatus = MagnetStatus {
        detected: true,
        too_weak: false,
        too_strong: false,
    };
    const NO_MAGNET: MagnetStatus = MagnetStatus {
        detected: false,
        too_weak: false,
        too_strong: false,
    };

    const POLICY: RetryPolicy = RetryPolicy {
        attempts: 4,
        initial_backoff_ms: 10,
        max_backoff_ms: 25,
    };

    #[test]
    fn ready_on_first_probe_without_delay() {
        let mut sensor = ScriptedSensor {
            script: &[Ok(MAGNET)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, POLICY)),
            Readiness::Ready
        );
        assert_eq!(sensor.probes, 1);
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn ready_after_retries() {
        let mut sensor = ScriptedSensor {
            script: &[Err(SensorError::NotPresent), Ok(NO_MAGNET), Ok(MAGNET)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, POLICY)),
            Readiness::Ready
        );
        assert_eq!(sensor.probes, 3);
        assert_eq!(delay.total_ms, 10 + 20);
    }

    #[test]
    fn absent_when_every_attempt_nacks() {
        let mut sensor = ScriptedSensor {
            script: &[Err(SensorError::NotPresent)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, POLICY)),
            Readiness::Absent
        );
        assert_eq!(sensor.probes, 4);
        // Three gaps, capped at 25 ms.
        assert_eq!(delay.total_ms, 10 + 20 + 25);
    }

    #[test]
    fn timed_out_when_device_answers_without_magnet() {
        let mut sensor = ScriptedSensor {
            script: &[Err(SensorError::NotPresent), Ok(NO_MAGNET)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, POLICY)),
            Readiness::TimedOut
        );
    }

    #[test]
    fn bus_errors_time_out_rather_than_absent() {
        let mut sensor = ScriptedSensor {
            script: &[Err(SensorError::Bus)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, POLICY)),
            Readiness::TimedOut
        );
    }

    #[test]
    fn zero_attempts_times_out() {
        let mut sensor = ScriptedSensor {
            script: &[Ok(MAGNET)],
            probes: 0,
        };
        let mut delay = RecordingDelay::default();
        let policy = RetryPolicy {
            attempts: 0,
            ..POLICY
        };
        assert_eq!(
            block_on(wait_until_ready(&mut sensor, &mut delay, policy)),
            Readiness::TimedOut
        );
        assert_eq!(sensor.probes, 0);
    }

    #[test]
    fn late_start_round_outlasts_the_first() {
        assert_eq!(RetryPolicy::DEFAULT.total_backoff_ms(), 10 + 20 + 40 + 80 + 160 + 320 + 500);
        assert_eq!(RetryPolicy::LATE_START.total_backoff_ms(), 500 + 1_000 + 7 * 2_000);
        assert_eq!(POLICY.total_backoff_ms(), 10 + 20 + 25);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(POLICY.backoff_ms(0), 10);
        assert_eq!(POLICY.backoff_ms(1), 20);
        assert_eq!(POLICY.backoff_ms(2), 25);
        assert_eq!(POLICY.backoff_ms(40), 25);
    }
}
