//! Bonded-peer records and the reconnect order for directed advertising.
//!
//! Records are kept as plain bytes so they can be tested on the host and
//! persisted as one flash item; the BLE layer converts to and from the
//! SoftDevice key types.
//!
//! Record layout (50 bytes):
//! ```text
//! [0]      address type
//! [1..7]   address
//! [7..9]   EDIV (LE)
//! [9..17]  RAND
//! [17..33] LTK
//! [33]     LTK flags
//! [34..50] IRK
//! ```

use heapless::Vec;

use crate::error::Error;

/// Serialized size of one [`BondRecord`].
pub const BOND_RECORD_SIZE: usize = 50;

/// Peer identity address as the radio reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    /// 0 public, 1 random static, 2 resolvable, 3 non-resolvable, 4 anonymous.
    pub kind: u8,
    pub bytes: [u8; 6],
}

/// Key used by a central to look up the LTK on re-encryption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterKey {
    pub ediv: u16,
    pub rand: [u8; 8],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondRecord {
    pub address: PeerAddress,
    pub master: MasterKey,
    pub ltk: [u8; 16],
    pub ltk_flags: u8,
    pub irk: [u8; 16],
}

impl BondRecord {
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.len() < BOND_RECORD_SIZE {
            return Err(Error::BufferOverflow);
        }
        buf[0] = self.address.kind;
        buf[1..7].copy_from_slice(&self.address.bytes);
        buf[7..9].copy_from_slice(&self.master.ediv.to_le_bytes());
        buf[9..17].copy_from_slice(&self.master.rand);
        buf[17..33].copy_from_slice(&self.ltk);
        buf[33] = self.ltk_flags;
        buf[34..50].copy_from_slice(&self.irk);
        Ok(BOND_RECORD_SIZE)
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < BOND_RECORD_SIZE {
            return None;
        }
        let mut record = Self {
            address: PeerAddress {
                kind: data[0],
                bytes: [0; 6],
            },
            master: MasterKey {
                ediv: u16::from_le_bytes([data[7], data[8]]),
                rand: [0; 8],
            },
            ltk: [0; 16],
            ltk_flags: data[33],
            irk: [0; 16],
        };
        record.address.bytes.copy_from_slice(&data[1..7]);
        record.master.rand.copy_from_slice(&data[9..17]);
        record.ltk.copy_from_slice(&data[17..33]);
        record.irk.copy_from_slice(&data[34..50]);
        Some(record)
    }
}

/// In-memory bond list, oldest first, synced with flash by the BLE layer.
pub struct BondStore<const N: usize> {
    records: Vec<BondRecord, N>,
    /// True if the list differs from flash.
    dirty: bool,
}

impl<const N: usize> BondStore<N> {
    /// Bytes needed by [`BondStore::serialize_all`] for a full store.
    pub const SERIALIZED_CAPACITY: usize = 1 + N * BOND_RECORD_SIZE;

    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            dirty: false,
        }
    }

    /// Store a new bond. A record for the same peer address or master key
    /// is replaced in place; otherwise the oldest record makes room.
    pub fn upsert(&mut self, record: BondRecord) {
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.address == record.address || r.master == record.master)
        {
            *existing = record;
            self.dirty = true;
            info!("Bonds: updated existing peer");
            return;
        }

        if self.records.is_full() {
            warn!("Bonds: store full - evicting oldest peer");
            self.records.remove(0);
        }

        let _ = self.records.push(record);
        self.dirty = true;
        info!("Bonds: now storing {}", self.records.len());
    }

    /// Forget every peer.
    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            self.records.clear();
            self.dirty = true;
        }
        info!("Bonds: cleared");
    }

    pub fn find_by_master(&self, master: &MasterKey) -> Option<&BondRecord> {
        self.records.iter().find(|r| r.master == *master)
    }

    pub fn find_by_address(&self, address: &PeerAddress) -> Option<&BondRecord> {
        self.records.iter().find(|r| r.address == *address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Count byte followed by each record.
    pub fn serialize_all(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let needed = 1 + self.records.len() * BOND_RECORD_SIZE;
        if buf.len() < needed {
            return Err(Error::BufferOverflow);
        }
        buf[0] = self.records.len() as u8;
        let mut offset = 1;
        for record in &self.records {
            offset += record.serialize(&mut buf[offset..])?;
        }
        Ok(offset)
    }

    /// Replace the list with the records in `data`. Truncated trailing
    /// records are ignored. Returns how many were loaded.
    pub fn deserialize_all(&mut self, data: &[u8]) -> usize {
        self.records.clear();
        self.dirty = false;

        let Some((&count, mut rest)) = data.split_first() else {
            return 0;
        };
        for _ in 0..count {
            let Some(record) = BondRecord::deserialize(rest) else {
                warn!("Bonds: truncated record list");
                break;
            };
            if self.records.push(record).is_err() {
                break;
            }
            rest = &rest[BOND_RECORD_SIZE..];
        }
        self.records.len()
    }
}

impl<const N: usize> Default for BondStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bonded peers still to try with directed advertising, most recent first.
pub struct DirectedQueue<const N: usize> {
    pending: Vec<PeerAddress, N>,
}

impl<const N: usize> DirectedQueue<N> {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Start a new round with every bonded peer `is_connected` rejects.
    pub fn refill<const B: usize>(
        &mut self,
        bonds: &BondStore<B>,
        mut is_connected: impl FnMut(&PeerAddress) -> bool,
    ) {
        self.pending.clear();
        // Popped from the back, so push oldest first.
        for record in bonds.iter() {
            if is_connected(&record.address) || self.pending.contains(&record.address) {
                continue;
            }
            if self.pending.push(record.address).is_err() {
                break;
            }
        }
    }

    /// Next peer to advertise to; `None` means fall back to undirected.
    pub fn next(&mut self) -> Option<PeerAddress> {
        self.pending.pop()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<const N: usize> Default for DirectedQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
