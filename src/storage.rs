//! Persistent storage for bonded hosts.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` crate.
//! The whole bond list is one map item; `sequential-storage` handles wear
//! levelling and page reuse.
//!
//! The list itself is a [`BondStore`] behind a blocking mutex so the
//! SoftDevice security callbacks (which are not async) can read and update
//! it. The storage task writes it back whenever [`SAVE_BONDS`] is raised.

use core::cell::RefCell;
use core::ops::Range;

use defmt::{debug, error, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_storage_async::nor_flash::NorFlash;
use nrf_softdevice::{Flash, Softdevice};
use sequential_storage::cache::NoCache;

use magscroll::bonds::BondStore;
use magscroll::config::{MAX_BONDED_PEERS, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use magscroll::Error;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_RANGE: Range<u32> = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE
    ..(STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key of the bond list in the map storage.
const KEY_BONDS: u8 = 0x01;

type Bonds = BondStore<MAX_BONDED_PEERS>;

/// Serialized list plus room for the item header and key.
const ITEM_BUF_SIZE: usize = Bonds::SERIALIZED_CAPACITY + 32;

pub static BONDS: Mutex<CriticalSectionRawMutex, RefCell<Bonds>> =
    Mutex::new(RefCell::new(BondStore::new()));

/// Raised whenever the bond list changed.
pub static SAVE_BONDS: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Raised once the bond list was read from flash.
pub static BONDS_LOADED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Replace the in-memory list with the one in flash.
pub async fn load(flash: &mut impl NorFlash) -> Result<usize, Error> {
    let mut buf = [0u8; ITEM_BUF_SIZE];

    let fetched = sequential_storage::map::fetch_item::<u8, &[u8], _>(
        flash,
        STORAGE_RANGE,
        &mut NoCache::new(),
        &mut buf,
        &KEY_BONDS,
    )
    .await
    .map_err(|e| {
        error!("Flash read error: {:?}", defmt::Debug2Format(&e));
        Error::Storage
    })?;

    let count = BONDS.lock(|b| {
        let mut bonds = b.borrow_mut();
        bonds.clear();
        let count = fetched.map_or(0, |data| bonds.deserialize_all(data));
        bonds.mark_clean();
        count
    });
    Ok(count)
}

/// Write the in-memory list back if it changed.
pub async fn save(flash: &mut impl NorFlash) -> Result<(), Error> {
    let mut item = [0u8; Bonds::SERIALIZED_CAPACITY];
    let Some(len) = BONDS.lock(|b| {
        let bonds = b.borrow();
        bonds.is_dirty().then(|| bonds.serialize_all(&mut item))
    })
    .transpose()?
    else {
        debug!("BondStore: no changes to save");
        return Ok(());
    };

    let mut buf = [0u8; ITEM_BUF_SIZE];
    let data = &item[..len];
    sequential_storage::map::store_item::<u8, &[u8], _>(
        flash,
        STORAGE_RANGE,
        &mut NoCache::new(),
        &mut buf,
        &KEY_BONDS,
        &data,
    )
    .await
    .map_err(|e| {
        error!("Flash write error: {:?}", defmt::Debug2Format(&e));
        Error::Storage
    })?;

    BONDS.lock(|b| b.borrow_mut().mark_clean());
    Ok(())
}

/// Forget every host. The storage task persists the empty list.
pub fn clear_bonds() {
    BONDS.lock(|b| b.borrow_mut().clear());
    SAVE_BONDS.signal(());
    info!("BondStore: cleared");
}

#[embassy_executor::task]
pub async fn storage_task(sd: &'static Softdevice) -> ! {
    let mut flash = Flash::take(sd);

    match load(&mut flash).await {
        Ok(count) => info!("Loaded {} bonds from flash", count),
        Err(e) => error!("BondStore: load failed: {:?}", e),
    }
    BONDS_LOADED.signal(());

    loop {
        SAVE_BONDS.wait().await;
        match save(&mut flash).await {
            Ok(()) => info!("Saved {} bonds to flash", BONDS.lock(|b| b.borrow().len())),
            Err(e) => error!("BondStore: save failed: {:?}", e),
        }
    }
}
