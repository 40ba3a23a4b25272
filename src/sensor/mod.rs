//! Angle sensor abstraction and power-rail control.
//!
//! The sampler only talks to these traits; [`as5600::As5600`] is the real
//! implementation and the tests supply mocks.

pub mod as5600;
pub mod readiness;

use embedded_hal::digital::OutputPin;

use crate::error::SensorError;

/// Sensor-internal power mode (AS5600 CONF.PM).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorPowerMode {
    #[default]
    Nominal,
    Lpm1,
    Lpm2,
    Lpm3,
}

impl SensorPowerMode {
    /// Two-bit register encoding.
    pub const fn bits(self) -> u8 {
        match self {
            SensorPowerMode::Nominal => 0b00,
            SensorPowerMode::Lpm1 => 0b01,
            SensorPowerMode::Lpm2 => 0b10,
            SensorPowerMode::Lpm3 => 0b11,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => SensorPowerMode::Nominal,
            0b01 => SensorPowerMode::Lpm1,
            0b10 => SensorPowerMode::Lpm2,
            _ => SensorPowerMode::Lpm3,
        }
    }
}

/// Output hysteresis in LSBs of the 12-bit angle (AS5600 CONF.HYST).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Hysteresis {
    #[default]
    Off,
    Lsb1,
    Lsb2,
    Lsb3,
}

impl Hysteresis {
    pub const fn bits(self) -> u8 {
        match self {
            Hysteresis::Off => 0b00,
            Hysteresis::Lsb1 => 0b01,
            Hysteresis::Lsb2 => 0b10,
            Hysteresis::Lsb3 => 0b11,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Hysteresis::Off,
            0b01 => Hysteresis::Lsb1,
            0b10 => Hysteresis::Lsb2,
            _ => Hysteresis::Lsb3,
        }
    }
}

/// Magnet status flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MagnetStatus {
    /// Magnet detected.
    pub detected: bool,
    /// Field too weak.
    pub too_weak: bool,
    /// Field too strong.
    pub too_strong: bool,
}

/// A contactless absolute angle sensor.
#[allow(async_fn_in_trait)]
pub trait AngleSensor {
    /// Current angle in degrees, `[0, 360)`.
    async fn fetch_angle(&mut self) -> Result<f32, SensorError>;

    /// Magnet status. `Err(NotPresent)` when the device does not answer.
    async fn probe(&mut self) -> Result<MagnetStatus, SensorError>;

    async fn set_power_mode(&mut self, mode: SensorPowerMode) -> Result<(), SensorError>;

    async fn set_hysteresis(&mut self, hysteresis: Hysteresis) -> Result<(), SensorError>;

    /// Restore the configuration used while scrolling: nominal power plus
    /// the configured output hysteresis. Needed after every power-up.
    async fn apply_defaults(&mut self, hysteresis: Hysteresis) -> Result<(), SensorError> {
        self.set_power_mode(SensorPowerMode::Nominal).await?;
        self.set_hysteresis(hysteresis).await
    }
}

/// Switchable supply for the sensor. Infallible: a failed GPIO write is
/// logged, not returned.
pub trait PowerRail {
    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;
}

/// Rail for boards where the sensor is permanently powered.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOn;

impl PowerRail for AlwaysOn {
    fn enable(&mut self) {}

    fn disable(&mut self) {}

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Supply switched by a GPIO output, high = on.
pub struct PinRail<P> {
    pin: P,
    enabled: bool,
}

impl<P: OutputPin> PinRail<P> {
    /// Takes the pin and switches the supply off.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("Rail: supply pin write failed");
        }
        Self { pin, enabled: false }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> PowerRail for PinRail<P> {
    fn enable(&mut self) {
        if self.pin.set_high().is_err() {
            warn!("Rail: supply pin write failed");
        }
        self.enabled = true;
    }

    fn disable(&mut self) {
        if self.pin.set_low().is_err() {
            warn!("Rail: supply pin write failed");
        }
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
