//! GATT server: HID over GATT, Battery and Device Information services.
//!
//! Registered with the SoftDevice builder API because the HID service needs
//! a Report Reference descriptor on each report characteristic.

use defmt::{debug, info, warn};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError, RegisterError, SetValueError, WriteOp};
use nrf_softdevice::ble::{Connection, SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

use magscroll::config;
use magscroll::hid::{
    report_reference, ControlPoint, ProtocolMode, ResolutionMultiplier, FEATURE_REPORT_ID, HID_INFO,
    REPORT_MAP, REPORT_TYPE_FEATURE, REPORT_TYPE_INPUT, WHEEL_REPORT_ID, WHEEL_REPORT_SIZE,
};

use crate::ble::{LINK, SLOTS};

const HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const HID_INFORMATION: Uuid = Uuid::new_16(0x2a4a);
const HID_REPORT_MAP: Uuid = Uuid::new_16(0x2a4b);
const HID_CONTROL_POINT: Uuid = Uuid::new_16(0x2a4c);
const HID_REPORT: Uuid = Uuid::new_16(0x2a4d);
const HID_PROTOCOL_MODE: Uuid = Uuid::new_16(0x2a4e);
const HID_REPORT_REFERENCE: Uuid = Uuid::new_16(0x2908);

const BATTERY_SERVICE: Uuid = Uuid::new_16(0x180f);
const BATTERY_LEVEL: Uuid = Uuid::new_16(0x2a19);

const DEVICE_INFORMATION: Uuid = Uuid::new_16(0x180a);
const MANUFACTURER_NAME: Uuid = Uuid::new_16(0x2a29);
const MODEL_NUMBER: Uuid = Uuid::new_16(0x2a24);

/// Value handles the server reacts to or notifies on.
pub struct HidService {
    protocol_mode: u16,
    control_point: u16,
    input_report: u16,
    feature_report: u16,
}

impl HidService {
    fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut builder = ServiceBuilder::new(sd, HID_SERVICE)?;

        builder
            .add_characteristic(
                HID_INFORMATION,
                Attribute::new(HID_INFO).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();

        builder
            .add_characteristic(
                HID_REPORT_MAP,
                Attribute::new(REPORT_MAP).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read()),
            )?
            .build();

        let control_point = builder
            .add_characteristic(
                HID_CONTROL_POINT,
                Attribute::new([0u8]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().write_without_response()),
            )?
            .build();

        let protocol_mode = builder
            .add_characteristic(
                HID_PROTOCOL_MODE,
                Attribute::new([ProtocolMode::Report.to_byte()]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read().write_without_response()),
            )?
            .build();

        let mut input = builder.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8; WHEEL_REPORT_SIZE]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().notify()),
        )?;
        input.add_descriptor(
            HID_REPORT_REFERENCE,
            Attribute::new(report_reference(WHEEL_REPORT_ID, REPORT_TYPE_INPUT))
                .security(SecurityMode::JustWorks),
        )?;
        let input_report = input.build();

        let mut feature = builder.add_characteristic(
            HID_REPORT,
            Attribute::new([ResolutionMultiplier::LOW.to_feature_byte()])
                .security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().write()),
        )?;
        feature.add_descriptor(
            HID_REPORT_REFERENCE,
            Attribute::new(report_reference(FEATURE_REPORT_ID, REPORT_TYPE_FEATURE))
                .security(SecurityMode::JustWorks),
        )?;
        let feature_report = feature.build();

        builder.build();

        Ok(Self {
            protocol_mode: protocol_mode.value_handle,
            control_point: control_point.value_handle,
            input_report: input_report.value_handle,
            feature_report: feature_report.value_handle,
        })
    }

    fn on_write(&self, conn: &Connection, handle: u16, data: &[u8]) {
        let Some(link) = conn.handle() else {
            return;
        };

        if handle == self.protocol_mode {
            match data.first().copied().and_then(ProtocolMode::from_byte) {
                Some(mode) => {
                    SLOTS.lock(|s| s.borrow_mut().set_protocol(link, mode));
                }
                None => warn!("HID: bad protocol mode write {=[u8]:x}", data),
            }
        } else if handle == self.feature_report {
            match ResolutionMultiplier::from_feature_bytes(data) {
                Some(multiplier) => LINK.set_resolution_multiplier(multiplier),
                None => warn!("HID: empty feature report write"),
            }
        } else if handle == self.control_point {
            match data.first().copied().and_then(ControlPoint::from_byte) {
                Some(ControlPoint::Suspend) => info!("HID: host {} suspended", link),
                Some(ControlPoint::ExitSuspend) => info!("HID: host {} resumed", link),
                None => debug!("HID: unknown control point value"),
            }
        }
    }
}

pub struct Server {
    hid: HidService,
}

impl Server {
    /// Register every service. Must run before the SoftDevice task starts.
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let hid = HidService::new(sd)?;

        let mut battery = ServiceBuilder::new(sd, BATTERY_SERVICE)?;
        battery
            .add_characteristic(
                BATTERY_LEVEL,
                Attribute::new([config::BATTERY_LEVEL_PERCENT]),
                Metadata::new(Properties::new().read().notify()),
            )?
            .build();
        battery.build();

        let mut info = ServiceBuilder::new(sd, DEVICE_INFORMATION)?;
        info.add_characteristic(
            MANUFACTURER_NAME,
            Attribute::new(config::DIS_MANUFACTURER),
            Metadata::new(Properties::new().read()),
        )?
        .build();
        info.add_characteristic(
            MODEL_NUMBER,
            Attribute::new(config::DIS_MODEL),
            Metadata::new(Properties::new().read()),
        )?
        .build();
        info.build();

        Ok(Self { hid })
    }

    /// Notify one wheel report on the input report characteristic.
    pub fn notify_wheel(
        &self,
        conn: &Connection,
        report: &[u8; WHEEL_REPORT_SIZE],
    ) -> Result<(), NotifyValueError> {
        gatt_server::notify_value(conn, self.hid.input_report, report)
    }

    /// Store the link's current Resolution Multiplier in the feature
    /// report attribute, so a host reading it sees the scaling in use.
    pub fn publish_resolution(&self, sd: &Softdevice) -> Result<(), SetValueError> {
        let value = [LINK.resolution_multiplier().to_feature_byte()];
        gatt_server::set_value(sd, self.hid.feature_report, &value)
    }
}

impl gatt_server::Server for Server {
    type Event = ();

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        self.hid.on_write(conn, handle, data);
        None
    }
}
