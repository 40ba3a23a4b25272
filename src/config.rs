//! Application-wide constants and compile-time configuration.
//!
//! All scroll tuning, power-mode timing, sensor and BLE parameters live
//! here so they can be tuned in one place.

use crate::sensor::{Hysteresis, SensorPowerMode};

// Scroll

/// Wheel units per physical notch advertised to hosts that enable
/// high-resolution scrolling (Resolution Multiplier feature, physical max).
pub const SCROLL_RESOLUTION_MULTIPLIER: u8 = 16;

/// Rotation (degrees) that produces one standard notch.
/// Lower = more sensitive.
pub const SCROLL_DEGREES_PER_NOTCH: f32 = 1.5;

/// Ticks required before a direction reversal is reported.
pub const SCROLL_HYSTERESIS_THRESHOLD: i32 = 3;

/// Invert the reported wheel direction.
pub const SCROLL_INVERSE: bool = true;

/// Scroll steps buffered between the sampling task and the BLE dispatcher.
pub const SCROLL_QUEUE_CAPACITY: usize = 10;

// Power modes

/// Sampling period while the wheel is being used (~125 Hz).
pub const ACTIVE_SAMPLE_PERIOD_MS: u32 = 8;

/// Sampling period after `LPM_TIMEOUT_MS` without a scroll event.
pub const LPM_SAMPLE_PERIOD_MS: u32 = 50;

/// Sampling period after `DOZE_TIMEOUT_MS` without a scroll event.
/// The sensor rail is off between doze samples.
pub const DOZE_SAMPLE_PERIOD_MS: u32 = 250;

/// Idle time before the sensor is switched to its low-power register setting.
pub const LPM_TIMEOUT_MS: u64 = 5_000;

/// Idle time before the sensor rail is switched off between samples.
pub const DOZE_TIMEOUT_MS: u64 = 60_000;

/// Connectivity poll interval while no host is connected.
pub const DISCONNECTED_POLL_MS: u32 = 1_000;

// Sensor (AS5600)

/// 7-bit I²C address of the AS5600.
pub const AS5600_I2C_ADDRESS: u8 = 0x36;

/// Time from rail enable until the first valid angle (datasheet: 10 ms max).
pub const SENSOR_SETTLE_MS: u32 = 10;

/// Register setting used in the LOW_POWER state (20 ms internal polling).
pub const SENSOR_LOW_POWER_MODE: SensorPowerMode = SensorPowerMode::Lpm2;

/// Output hysteresis programmed into the sensor after every power-up.
pub const SENSOR_HYSTERESIS: Hysteresis = Hysteresis::Lsb1;

/// Startup readiness probe: attempts per round.
pub const SENSOR_READY_ATTEMPTS: u8 = 8;

/// Startup readiness probe: first backoff, doubled after each failure.
pub const SENSOR_READY_BACKOFF_MS: u32 = 10;

/// Startup readiness probe: backoff ceiling.
pub const SENSOR_READY_BACKOFF_MAX_MS: u32 = 500;

/// Late-start round after a silent first round and a rail power cycle:
/// attempts, first backoff and ceiling. About 15 s before the sensor is
/// declared absent.
pub const SENSOR_LATE_READY_ATTEMPTS: u8 = 10;
pub const SENSOR_LATE_READY_BACKOFF_MS: u32 = 500;
pub const SENSOR_LATE_READY_BACKOFF_MAX_MS: u32 = 2_000;

// BLE

/// GAP device name (advertised in the scan response).
pub const BLE_DEVICE_NAME: &str = "Magscroll";

/// GAP appearance: HID mouse.
pub const BLE_APPEARANCE_MOUSE: u16 = 0x03C2;

/// Hosts that may be connected at the same time.
pub const MAX_CONNECTIONS: usize = 2;

/// Undirected advertising interval (in 0.625 ms units). 48 = 30 ms.
pub const BLE_ADV_INTERVAL: u32 = 48;

/// Preferred connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms, 12 = 15 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// Slave latency while scrolling is idle.
pub const BLE_SLAVE_LATENCY: u16 = 30;

/// Supervision timeout (in 10 ms units). 430 = 4.3 s.
pub const BLE_SUP_TIMEOUT: u16 = 430;

/// Battery level reported by the Battery service (no ADC on this board).
pub const BATTERY_LEVEL_PERCENT: u8 = 100;

/// Device Information strings.
pub const DIS_MANUFACTURER: &str = "magscroll";
pub const DIS_MODEL: &str = "AS5600 wheel";

// Bond storage

/// Maximum number of bonded hosts kept in flash.
pub const MAX_BONDED_PEERS: usize = 4;

/// Flash page index where bond storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

// Buttons

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;
