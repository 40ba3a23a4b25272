//! AS5600 12-bit magnetic rotary position sensor over async I²C.
//!
//! Register map (subset used here):
//! ```text
//! 0x08  CONF (low)   [1:0] PM   [3:2] HYST
//! 0x0B  STATUS       bit5 MD (magnet detected)  bit4 ML (too weak)  bit3 MH (too strong)
//! 0x0E  ANGLE (hi)   [3:0] bits 11..8
//! 0x0F  ANGLE (lo)   bits 7..0
//! ```

use embedded_hal_async::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

use super::{AngleSensor, Hysteresis, MagnetStatus, SensorPowerMode};
use crate::config;
use crate::error::SensorError;

pub const REG_CONF_LO: u8 = 0x08;
pub const REG_STATUS: u8 = 0x0B;
pub const REG_ANGLE_HI: u8 = 0x0E;

const STATUS_MD: u8 = 0x20;
const STATUS_ML: u8 = 0x10;
const STATUS_MH: u8 = 0x08;

const CONF_PM_MASK: u8 = 0b0000_0011;
const CONF_HYST_MASK: u8 = 0b0000_1100;
const CONF_HYST_SHIFT: u8 = 2;

/// Full scale of the ANGLE register.
pub const ANGLE_COUNTS: u16 = 4096;

/// Convert a raw 12-bit reading to degrees in `[0, 360)`.
pub fn counts_to_degrees(raw: u16) -> f32 {
    (raw & 0x0FFF) as f32 * 360.0 / ANGLE_COUNTS as f32
}

fn map_bus_error<E: embedded_hal_async::i2c::Error>(err: E) -> SensorError {
    match err.kind() {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => SensorError::NotPresent,
        _ => SensorError::Bus,
    }
}

pub struct As5600<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> As5600<I2C> {
    /// Driver at the factory address.
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, config::AS5600_I2C_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[reg], buf)
            .await
            .map_err(map_bus_error)
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(map_bus_error)
    }

    async fn modify_conf(&mut self, mask: u8, bits: u8) -> Result<(), SensorError> {
        let mut conf = [0u8; 1];
        self.read_regs(REG_CONF_LO, &mut conf).await?;
        let value = (conf[0] & !mask) | (bits & mask);
        if value != conf[0] {
            self.write_reg(REG_CONF_LO, value).await?;
        }
        Ok(())
    }

    /// Raw 12-bit angle.
    pub async fn read_raw_angle(&mut self) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.read_regs(REG_ANGLE_HI, &mut buf).await?;
        Ok(u16::from_be_bytes(buf) & 0x0FFF)
    }

    pub async fn read_angle(&mut self) -> Result<f32, SensorError> {
        Ok(counts_to_degrees(self.read_raw_angle().await?))
    }

    pub async fn status(&mut self) -> Result<MagnetStatus, SensorError> {
        let mut buf = [0u8; 1];
        self.read_regs(REG_STATUS, &mut buf).await?;
        Ok(MagnetStatus {
            detected: buf[0] & STATUS_MD != 0,
            too_weak: buf[0] & STATUS_ML != 0,
            too_strong: buf[0] & STATUS_MH != 0,
        })
    }
}

impl<I2C: I2c> AngleSensor for As5600<I2C> {
    async fn fetch_angle(&mut self) -> Result<f32, SensorError> {
        self.read_angle().await
    }

    async fn probe(&mut self) -> Result<MagnetStatus, SensorError> {
        self.status().await
    }

    async fn set_power_mode(&mut self, mode: SensorPowerMode) -> Result<(), SensorError> {
        debug!("AS5600: power mode {:?}", mode);
        self.modify_conf(CONF_PM_MASK, mode.bits()).await
    }

    async fn set_hysteresis(&mut self, hysteresis: Hysteresis) -> Result<(), SensorError> {
        self.modify_conf(CONF_HYST_MASK, hysteresis.bits() << CONF_HYST_SHIFT)
            .await
    }
}
