//! Just Works pairing and bond lookup for the SoftDevice.
//!
//! Bonds live in [`storage::BONDS`] as plain [`BondRecord`]s; this module
//! converts between those and the SoftDevice key types.

use defmt::info;
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    Address, AddressType, Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode,
};
use static_cell::StaticCell;

use magscroll::bonds::{BondRecord, MasterKey, PeerAddress};

use crate::storage;

pub fn peer_address(address: Address) -> PeerAddress {
    let kind = match address.address_type() {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    };
    PeerAddress {
        kind,
        bytes: address.bytes(),
    }
}

pub fn to_address(peer: PeerAddress) -> Address {
    let kind = match peer.kind {
        0 => AddressType::Public,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::RandomStatic,
    };
    Address::new(kind, peer.bytes)
}

fn master_key(id: MasterId) -> MasterKey {
    MasterKey {
        ediv: id.ediv,
        rand: id.rand,
    }
}

/// Accepts every pairing request (no IO) and keeps the keys.
pub struct Bonder;

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        let record = BondRecord {
            address: peer_address(peer_id.addr),
            master: master_key(master_id),
            ltk: key.ltk,
            ltk_flags: key.flags,
            irk: peer_id.irk.as_raw().irk,
        };
        info!("BLE: bonded with {:?}", record.address);
        storage::BONDS.lock(|b| b.borrow_mut().upsert(record));
        storage::SAVE_BONDS.signal(());
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        let master = master_key(master_id);
        storage::BONDS.lock(|b| {
            b.borrow().find_by_master(&master).map(|r| EncryptionInfo {
                ltk: r.ltk,
                flags: r.ltk_flags,
            })
        })
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("BLE: security mode updated: {}", mode);
    }
}

pub fn bonder() -> &'static Bonder {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    BONDER.init(Bonder)
}
