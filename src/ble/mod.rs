//! Bluetooth Low Energy subsystem.
//!
//! Drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertiser** - while a connection slot is free, tries directed
//!    advertising to each bonded host that is not connected, then falls
//!    back to undirected connectable advertising.
//! 2. **Connection tasks** - one per accepted link; registered in
//!    [`SLOTS`], process GATT writes until the host disconnects.
//! 3. **Server / notify** - the HID, Battery and Device Information
//!    services, and the report sink the dispatcher pushes wheel reports
//!    through.
//!
//! Shared state with the sampling task is the [`LINK`] flag pair.

pub mod bonding;
pub mod notify;
pub mod server;

use core::cell::RefCell;
use core::mem;

use defmt::{debug, info, warn};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload,
    ServiceList, ServiceUuid16,
};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::ble::peripheral::{self, AdvertiseError, ConnectableAdvertisement};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, Softdevice};

use magscroll::bonds::DirectedQueue;
use magscroll::config::{self, MAX_BONDED_PEERS, MAX_CONNECTIONS};
use magscroll::error::BleError;
use magscroll::link::{ConnectionSlots, LinkState};

use crate::ble::bonding::{peer_address, to_address, Bonder};
use crate::ble::server::Server;
use crate::storage;

/// Connectivity and hi-res flags read by the sampling task.
pub static LINK: LinkState = LinkState::new();

/// Connected hosts, keyed by connection handle.
pub static SLOTS: Mutex<CriticalSectionRawMutex, RefCell<ConnectionSlots<Connection, MAX_CONNECTIONS>>> =
    Mutex::new(RefCell::new(ConnectionSlots::new()));

/// Raised by a connection task after it released its slot.
static SLOT_FREED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

const APPEARANCE: [u8; 2] = config::BLE_APPEARANCE_MOUSE.to_le_bytes();

static ADV_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
    .services_16(
        ServiceList::Complete,
        &[ServiceUuid16::HUMAN_INTERFACE_DEVICE, ServiceUuid16::BATTERY],
    )
    .raw(AdvertisementDataType::APPEARANCE, &APPEARANCE)
    .build();

static SCAN_DATA: LegacyAdvertisementPayload = LegacyAdvertisementBuilder::new()
    .full_name(config::BLE_DEVICE_NAME)
    .build();

/// SoftDevice configuration: internal RC clock, two peripheral links.
pub fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CONNECTIONS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CONNECTIONS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::BLE_DEVICE_NAME.as_ptr() as _,
            current_len: config::BLE_DEVICE_NAME.len() as u16,
            max_len: config::BLE_DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

/// GAP appearance and preferred connection parameters. Call once after the
/// SoftDevice is enabled.
pub fn configure_gap(_sd: &Softdevice) {
    let ret = unsafe { raw::sd_ble_gap_appearance_set(config::BLE_APPEARANCE_MOUSE) };
    if ret != raw::NRF_SUCCESS {
        warn!("GAP appearance rejected: {}", ret);
    }

    let ppcp = raw::ble_gap_conn_params_t {
        min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
        max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
        slave_latency: config::BLE_SLAVE_LATENCY,
        conn_sup_timeout: config::BLE_SUP_TIMEOUT,
    };
    let ret = unsafe { raw::sd_ble_gap_ppcp_set(&ppcp) };
    if ret != raw::NRF_SUCCESS {
        warn!("GAP PPCP rejected: {}", ret);
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Accept hosts until every slot is taken, then wait for one to leave.
#[embassy_executor::task]
pub async fn advertiser_task(spawner: Spawner, sd: &'static Softdevice, server: &'static Server) -> ! {
    let bonder = bonding::bonder();
    let mut directed: DirectedQueue<MAX_BONDED_PEERS> = DirectedQueue::new();

    // Directed advertising needs the bond list.
    storage::BONDS_LOADED.wait().await;

    loop {
        while !SLOTS.lock(|s| s.borrow().has_free_slot()) {
            SLOT_FREED.wait().await;
        }

        storage::BONDS.lock(|b| {
            let bonds = b.borrow();
            SLOTS.lock(|s| {
                let slots = s.borrow();
                directed.refill(&*bonds, |addr| {
                    slots.iter().any(|slot| peer_address(slot.conn.peer_address()) == *addr)
                });
            });
        });

        let conn = match accept(sd, bonder, &mut directed).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("BLE: {:?}, retrying", e);
                Timer::after_secs(1).await;
                continue;
            }
        };

        let Some(handle) = conn.handle() else {
            continue;
        };
        // Claimed here so the next round sees the slot as taken.
        if let Err(conn) = SLOTS.lock(|s| s.borrow_mut().insert(handle, conn.clone())) {
            warn!("BLE: no slot for link {}", handle);
            let _ = conn.disconnect();
            continue;
        }
        LINK.set_connected(true);
        info!("BLE: host connected on link {}", handle);

        if spawner.spawn(connection_task(sd, server, conn, handle)).is_err() {
            warn!("BLE: connection task pool exhausted");
            release(sd, server, handle);
        }
    }
}

/// One directed attempt per pending bonded host, then undirected until a
/// host connects.
async fn accept(
    sd: &'static Softdevice,
    bonder: &'static Bonder,
    directed: &mut DirectedQueue<MAX_BONDED_PEERS>,
) -> Result<Connection, BleError> {
    while let Some(peer) = directed.next() {
        debug!("BLE: directed advertising to {:?}", peer);
        let adv = ConnectableAdvertisement::NonscannableDirectedHighDuty {
            peer: to_address(peer),
        };
        match peripheral::advertise_pairable(sd, adv, &peripheral::Config::default(), bonder).await {
            Ok(conn) => return Ok(conn),
            Err(AdvertiseError::Timeout) => debug!("BLE: bonded host did not answer"),
            Err(e) => warn!("BLE: directed advertising failed: {:?}", e),
        }
    }

    info!("BLE: advertising");
    let adv = ConnectableAdvertisement::ScannableUndirected {
        adv_data: &ADV_DATA,
        scan_data: &SCAN_DATA,
    };
    let adv_config = peripheral::Config {
        interval: config::BLE_ADV_INTERVAL,
        ..Default::default()
    };
    peripheral::advertise_pairable(sd, adv, &adv_config, bonder)
        .await
        .map_err(|e| {
            warn!("BLE: advertising failed: {:?}", e);
            BleError::AdvertiseFailed
        })
}

/// Serve one host until it disconnects.
#[embassy_executor::task(pool_size = 2)]
async fn connection_task(sd: &'static Softdevice, server: &'static Server, conn: Connection, handle: u16) {
    let _ = gatt_server::run(&conn, server, |_| {}).await;
    info!("BLE: link {} closed", handle);
    release(sd, server, handle);
}

/// Free the link's slot. The last link out also drops hi-res, both in
/// [`LINK`] and in the feature report attribute.
fn release(sd: &Softdevice, server: &Server, handle: u16) {
    let remaining = SLOTS.lock(|s| {
        let mut slots = s.borrow_mut();
        slots.remove(handle);
        slots.len()
    });
    if remaining == 0 {
        LINK.on_all_disconnected();
        if let Err(e) = server.publish_resolution(sd) {
            warn!("BLE: feature report reset failed: {:?}", e);
        }
    }
    SLOT_FREED.signal(());
}
