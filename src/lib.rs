//! Host-testable core of the magscroll firmware.
//!
//! Everything that does not need the radio or the nRF peripherals lives
//! here: the angle-to-scroll pipeline, the power-mode scheduler, the AS5600
//! driver (generic over `embedded-hal-async` I²C), connection bookkeeping,
//! HID report encoding and bond records.
//!
//! Usage: `cargo test --lib` (host) or `cargo test` for the integration
//! tests as well.
//!
//! Note: The embedded binary (main.rs, `--features embedded`) adds the
//! Embassy tasks, SoftDevice glue and flash persistence on top of this
//! library.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bonds;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hid;
pub mod link;
pub mod power_mode;
pub mod sampler;
pub mod scroll;
pub mod sensor;

pub use error::{Error, SensorError};

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use crate::dispatch::{drain, ReportSink};
    use crate::hid::{ResolutionMultiplier, WheelReport};
    use crate::link::LinkState;
    use crate::power_mode::{PowerMode, PowerTimings};
    use crate::sampler::{Sampler, ScrollPipeline, SensorSettings};
    use crate::scroll::queue::ScrollQueue;
    use crate::scroll::{AngleSample, ResolutionMode, ScrollConfig};
    use crate::sensor::{AngleSensor, Hysteresis, MagnetStatus, PowerRail, SensorPowerMode};
    use crate::SensorError;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal_async::delay::DelayNs;

    /// A wheel whose angle the test turns directly.
    struct Wheel {
        angle: f32,
    }

    impl AngleSensor for Wheel {
        async fn fetch_angle(&mut self) -> Result<f32, SensorError> {
            Ok(self.angle)
        }

        async fn probe(&mut self) -> Result<MagnetStatus, SensorError> {
            Ok(MagnetStatus {
                detected: true,
                ..MagnetStatus::default()
            })
        }

        async fn set_power_mode(&mut self, _: SensorPowerMode) -> Result<(), SensorError> {
            Ok(())
        }

        async fn set_hysteresis(&mut self, _: Hysteresis) -> Result<(), SensorError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Rail(bool);

    impl PowerRail for Rail {
        fn enable(&mut self) {
            self.0 = true;
        }

        fn disable(&mut self) {
            self.0 = false;
        }

        fn is_enabled(&self) -> bool {
            self.0
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    struct Host {
        wheel: heapless::Vec<i8, 32>,
    }

    impl ReportSink for Host {
        async fn send(&mut self, report: &WheelReport) -> usize {
            self.wheel.push(report.wheel).unwrap();
            1
        }
    }

    const SCROLL: ScrollConfig = ScrollConfig {
        degrees_per_notch: 10.0,
        resolution_multiplier: 16,
        hysteresis_threshold: 3,
        inverse: false,
    };

    fn sampler() -> Sampler<Wheel, Rail, NoDelay> {
        Sampler::new(
            Wheel { angle: 10.0 },
            Rail::default(),
            NoDelay,
            SensorSettings::DEFAULT,
            ScrollPipeline::new(SCROLL, PowerTimings::DEFAULT, 0),
        )
    }

    #[test]
    fn rotation_reaches_host_as_wheel_reports() {
        let queue: ScrollQueue<NoopRawMutex, 10> = ScrollQueue::new();
        let link = LinkState::new();
        link.set_connected(true);
        let mut s = sampler();
        let mut host = Host {
            wheel: heapless::Vec::new(),
        };

        let mut now = 0;
        for angle in [10.0, 40.0, 70.0, 60.0, 90.0] {
            s.sensor_mut().angle = angle;
            block_on(s.poll(&queue, &link, now));
            now += 8;
        }
        block_on(drain(&queue, &mut host));

        // 60° is a one-tick reversal and stays pending; 90° nets +2.
        assert_eq!(host.wheel.as_slice(), &[3, 3, 2]);
    }

    #[test]
    fn disconnect_clears_hi_res_and_stops_events() {
        let queue: ScrollQueue<NoopRawMutex, 10> = ScrollQueue::new();
        let link = LinkState::new();
        link.set_connected(true);
        link.set_resolution_multiplier(ResolutionMultiplier::HIGH);
        let mut s = sampler();

        block_on(s.poll(&queue, &link, 0));
        link.on_all_disconnected();
        assert_eq!(link.resolution_mode(), ResolutionMode::Normal);

        for (i, angle) in [100.0, 200.0, 300.0].into_iter().enumerate() {
            s.sensor_mut().angle = angle;
            block_on(s.poll(&queue, &link, 8 * (i as u64 + 1)));
        }
        assert!(queue.is_empty());
        assert!(!s.rail().is_enabled());
    }

    #[test]
    fn hi_res_host_gets_sixteen_times_the_ticks() {
        let queue: ScrollQueue<NoopRawMutex, 10> = ScrollQueue::new();
        let link = LinkState::new();
        link.set_connected(true);
        let mut s = sampler();

        block_on(s.poll(&queue, &link, 0));
        s.sensor_mut().angle = 40.0;
        block_on(s.poll(&queue, &link, 8));
        assert_eq!(queue.try_dequeue().map(|x| x.get()), Some(3));

        link.set_resolution_multiplier(ResolutionMultiplier::HIGH);
        s.sensor_mut().angle = 50.0;
        block_on(s.poll(&queue, &link, 16));
        assert_eq!(queue.try_dequeue().map(|x| x.get()), Some(16));
    }

    #[test]
    fn idle_pipeline_reaches_doze_via_low_power() {
        let mut p = ScrollPipeline::default();
        let mut modes = heapless::Vec::<PowerMode, 4>::new();
        let mut now = 0u64;
        while now <= crate::config::DOZE_TIMEOUT_MS + 1_000 {
            let out = p.advance(AngleSample::new(42.0, now), ResolutionMode::Normal);
            if let Some(t) = out.transition {
                modes.push(t.to).unwrap();
            }
            now += u64::from(p.scheduler().sleep_period_ms());
        }
        assert_eq!(modes.as_slice(), &[PowerMode::LowPower, PowerMode::Doze]);
    }
}
