//! Wheel input report and the report map that describes it.
//!
//! Input report (ID 1, 2 bytes):
//! ```text
//! Byte 0: Button bitfield (bits 0..4), bits 5..7 padding
//! Byte 1: Wheel (signed, -127..127)
//! ```
//!
//! Feature report (ID 2, 1 byte):
//! ```text
//! Byte 0: bits 0..1 Resolution Multiplier (0 = 1x, 1 = 16x), bits 2..7 padding
//! ```

use crate::scroll::ScrollStep;

/// Wheel input report size in bytes (without report ID).
pub const WHEEL_REPORT_SIZE: usize = 2;

/// Input report carrying buttons and the wheel.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WheelReport {
    /// Button bitfield, bits 0..4.
    pub buttons: u8,
    /// Wheel delta (signed).
    pub wheel: i8,
}

impl WheelReport {
    /// Report for one scroll step with no buttons held.
    pub const fn from_step(step: ScrollStep) -> Self {
        Self {
            buttons: 0,
            wheel: step.get(),
        }
    }

    /// Serialise into a byte slice for the input report characteristic.
    /// Returns the number of bytes written (0 if `buf` is too short).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < WHEEL_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons & 0x1F;
        buf[1] = self.wheel as u8;
        WHEEL_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; WHEEL_REPORT_SIZE] {
        let mut buf = [0u8; WHEEL_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` when no buttons are pressed and the wheel is still.
    pub fn is_idle(&self) -> bool {
        self.buttons & 0x1F == 0 && self.wheel == 0
    }
}

// HID report map for a 5-button wheel mouse with high-resolution scrolling

/// Report map: 5 buttons and a wheel in report 1; the wheel's Resolution
/// Multiplier lives in a logical collection as feature report 2.
pub const REPORT_MAP: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x01, //   Report ID (1)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    //
    //     - Buttons (5 bits + 3 padding) -
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x05, //     Usage Maximum (Button 5)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x05, //     Report Count (5)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x03, //     Report Size (3)
    0x81, 0x01, //     Input (Constant) - padding
    //
    0xA1, 0x02, //     Collection (Logical)
    //
    //       - Resolution Multiplier (feature, 2 bits + 6 padding) -
    0x85, 0x02, //       Report ID (2)
    0x05, 0x01, //       Usage Page (Generic Desktop)
    0x09, 0x48, //       Usage (Resolution Multiplier)
    0x15, 0x00, //       Logical Minimum (0)
    0x25, 0x01, //       Logical Maximum (1)
    0x35, 0x01, //       Physical Minimum (1)
    0x45, 0x10, //       Physical Maximum (16)
    0x75, 0x02, //       Report Size (2)
    0x95, 0x01, //       Report Count (1)
    0xB1, 0x02, //       Feature (Data, Variable, Absolute)
    0x75, 0x06, //       Report Size (6)
    0xB1, 0x01, //       Feature (Constant) - padding
    //
    //       - Scroll wheel -
    0x85, 0x01, //       Report ID (1)
    0x09, 0x38, //       Usage (Wheel)
    0x35, 0x00, //       Physical Minimum (0)
    0x45, 0x00, //       Physical Maximum (0)
    0x15, 0x81, //       Logical Minimum (-127)
    0x25, 0x7F, //       Logical Maximum (127)
    0x75, 0x08, //       Report Size (8)
    0x95, 0x01, //       Report Count (1)
    0x81, 0x06, //       Input (Data, Variable, Relative)
    0xC0, //     End Collection (Logical)
    //
    0xC0, //   End Collection (Physical)
    0xC0, // End Collection (Application)
];
