//! Connection bookkeeping shared between the BLE tasks and the sampler.
//!
//! [`LinkState`] holds the two flags the sampling task reads (any host
//! connected, high-resolution scrolling enabled). [`ConnectionSlots`] tracks
//! each connected host and the protocol mode it selected.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec;

use crate::hid::{ProtocolMode, ResolutionMultiplier};
use crate::scroll::ResolutionMode;

/// Flags written by the connection tasks, read by the sampler. Momentary
/// staleness costs at most one cycle at the wrong rate.
pub struct LinkState {
    connected: AtomicBool,
    hi_res: AtomicBool,
}

impl LinkState {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            hi_res: AtomicBool::new(false),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_high_resolution(&self) -> bool {
        self.hi_res.load(Ordering::Relaxed)
    }

    pub fn resolution_mode(&self) -> ResolutionMode {
        if self.is_high_resolution() {
            ResolutionMode::HighResolution
        } else {
            ResolutionMode::Normal
        }
    }

    /// Host wrote the Resolution Multiplier feature report.
    pub fn set_resolution_multiplier(&self, multiplier: ResolutionMultiplier) {
        let hi_res = multiplier.is_high_resolution();
        if self.hi_res.swap(hi_res, Ordering::Relaxed) != hi_res {
            info!("Link: high-resolution scrolling {}", hi_res);
        }
    }

    /// Current feature report value.
    pub fn resolution_multiplier(&self) -> ResolutionMultiplier {
        if self.is_high_resolution() {
            ResolutionMultiplier::HIGH
        } else {
            ResolutionMultiplier::LOW
        }
    }

    /// Last host gone: no sampling, no hi-res.
    pub fn on_all_disconnected(&self) {
        self.hi_res.store(false, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);
        info!("Link: no hosts connected");
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// One connected host.
#[derive(Clone, Debug)]
pub struct LinkSlot<C> {
    pub handle: u16,
    pub conn: C,
    pub protocol: ProtocolMode,
}

/// Up to `N` concurrent hosts keyed by connection handle.
pub struct ConnectionSlots<C, const N: usize> {
    slots: Vec<LinkSlot<C>, N>,
}

impl<C, const N: usize> ConnectionSlots<C, N> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Register a new link in report mode. Gives the connection back when
    /// every slot is taken.
    pub fn insert(&mut self, handle: u16, conn: C) -> Result<(), C> {
        if self.contains(handle) {
            warn!("Link: handle {} already registered", handle);
            return Err(conn);
        }
        self.slots
            .push(LinkSlot {
                handle,
                conn,
                protocol: ProtocolMode::Report,
            })
            .map_err(|slot| slot.conn)
    }

    /// Release a link. Returns its connection if it was registered.
    pub fn remove(&mut self, handle: u16) -> Option<C> {
        let index = self.slots.iter().position(|s| s.handle == handle)?;
        Some(self.slots.swap_remove(index).conn)
    }

    pub fn set_protocol(&mut self, handle: u16, protocol: ProtocolMode) -> bool {
        match self.slots.iter_mut().find(|s| s.handle == handle) {
            Some(slot) => {
                if slot.protocol != protocol {
                    info!("Link {}: {:?} protocol", handle, protocol);
                }
                slot.protocol = protocol;
                true
            }
            None => false,
        }
    }

    pub fn protocol(&self, handle: u16) -> Option<ProtocolMode> {
        self.slots
            .iter()
            .find_map(|s| (s.handle == handle).then_some(s.protocol))
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.slots.iter().any(|s| s.handle == handle)
    }

    pub fn has_free_slot(&self) -> bool {
        !self.slots.is_full()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkSlot<C>> {
        self.slots.iter()
    }

    /// Connections that receive input reports.
    pub fn report_links(&self) -> impl Iterator<Item = &C> {
        self.slots
            .iter()
            .filter(|s| s.protocol == ProtocolMode::Report)
            .map(|s| &s.conn)
    }
}

impl<C, const N: usize> Default for ConnectionSlots<C, N> {
    fn default() -> Self {
        Self::new()
    }
}
