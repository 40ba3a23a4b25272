//! HID-over-GATT values: report map, input report, feature report and the
//! small control characteristics.

pub mod mouse;


pub use mouse::{WheelReport, REPORT_MAP, WHEEL_REPORT_SIZE};

/// Report ID of the wheel input report.
pub const WHEEL_REPORT_ID: u8 = 1;
/// Report ID of the Resolution Multiplier feature report.
pub const FEATURE_REPORT_ID: u8 = 2;

/// Report Reference descriptor type: input report.
pub const REPORT_TYPE_INPUT: u8 = 0x01;
/// Report Reference descriptor type: feature report.
pub const REPORT_TYPE_FEATURE: u8 = 0x03;

/// HID Information flag: device can wake the host.
pub const HID_INFO_REMOTE_WAKE: u8 = 0x01;
/// HID Information flag: device advertises when bonded but idle.
pub const HID_INFO_NORMALLY_CONNECTABLE: u8 = 0x02;

/// HID Information value: bcdHID 1.01, country 0, flags.
pub const HID_INFO: [u8; 4] = [
    0x01,
    0x01,
    0x00,
    HID_INFO_REMOTE_WAKE | HID_INFO_NORMALLY_CONNECTABLE,
];

/// Report Reference descriptor value for a report.
pub const fn report_reference(report_id: u8, report_type: u8) -> [u8; 2] {
    [report_id, report_type]
}

/// Protocol Mode characteristic value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    Boot,
    #[default]
    Report,
}

impl ProtocolMode {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(ProtocolMode::Boot),
            1 => Some(ProtocolMode::Report),
            _ => None,
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            ProtocolMode::Boot => 0,
            ProtocolMode::Report => 1,
        }
    }
}

/// HID Control Point command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlPoint {
    Suspend,
    ExitSuspend,
}

impl ControlPoint {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(ControlPoint::Suspend),
            1 => Some(ControlPoint::ExitSuspend),
            _ => None,
        }
    }
}

/// Resolution Multiplier feature value. Logical 0 means 1x, logical 1
/// means the full multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResolutionMultiplier(u8);

impl ResolutionMultiplier {
    pub const LOW: Self = Self(0);
    pub const HIGH: Self = Self(1);

    /// Decode a feature report write. Only the two data bits count.
    pub fn from_feature_bytes(data: &[u8]) -> Option<Self> {
        data.first().map(|b| Self(b & 0x03))
    }

    pub const fn to_feature_byte(self) -> u8 {
        self.0
    }

    pub const fn is_high_resolution(self) -> bool {
        self.0 != 0
    }
}
