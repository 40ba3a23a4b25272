//! Report sink that notifies wheel reports to every report-mode host.

use defmt::warn;
use heapless::Vec;
use nrf_softdevice::ble::Connection;

use magscroll::config::MAX_CONNECTIONS;
use magscroll::dispatch::ReportSink;
use magscroll::error::BleError;
use magscroll::hid::WheelReport;

use crate::ble::server::Server;
use crate::ble::SLOTS;

pub struct NotifySink {
    server: &'static Server,
}

impl NotifySink {
    pub fn new(server: &'static Server) -> Self {
        Self { server }
    }
}

impl ReportSink for NotifySink {
    async fn send(&mut self, report: &WheelReport) -> usize {
        let bytes = report.to_bytes();
        let targets: Vec<Connection, MAX_CONNECTIONS> =
            SLOTS.lock(|s| s.borrow().report_links().cloned().collect());

        let mut reached = 0;
        for conn in &targets {
            match self.server.notify_wheel(conn, &bytes) {
                Ok(()) => reached += 1,
                // Usually the host has not enabled notifications yet.
                Err(_) => warn!("BLE: {:?} on link {:?}", BleError::NotifyFailed, conn.handle()),
            }
        }
        reached
    }
}
