//! Integration tests for magscroll host-testable logic.
//!
//! The AS5600 driver runs against a simulated chip whose supply is switched
//! by the sampler's power rail, so register state is lost whenever the
//! rail drops.

use std::cell::RefCell;
use std::rc::Rc;

use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use magscroll::bonds::{BondRecord, BondStore, DirectedQueue, MasterKey, PeerAddress};
use magscroll::config;
use magscroll::dispatch::{drain, ReportSink};
use magscroll::hid::{ResolutionMultiplier, WheelReport};
use magscroll::link::LinkState;
use magscroll::power_mode::{PowerMode, PowerTimings};
use magscroll::sampler::{Sampler, ScrollPipeline, SensorSettings};
use magscroll::scroll::queue::ScrollQueue;
use magscroll::scroll::ScrollConfig;
use magscroll::sensor::as5600::{As5600, REG_ANGLE_HI, REG_CONF_LO, REG_STATUS};
use magscroll::sensor::readiness::{Readiness, RetryPolicy};
use magscroll::sensor::PowerRail;

// ═══════════════════════════════════════════════════════════════════════════
// Simulated board
// ═══════════════════════════════════════════════════════════════════════════

struct Chip {
    powered: bool,
    /// Transactions still NACKed after power-up (slow start).
    boot_nacks: u8,
    regs: [u8; 256],
    pointer: usize,
}

impl Chip {
    fn set_counts(&mut self, counts: u16) {
        let [hi, lo] = counts.to_be_bytes();
        self.regs[REG_ANGLE_HI as usize] = hi;
        self.regs[REG_ANGLE_HI as usize + 1] = lo;
    }

    fn conf(&self) -> u8 {
        self.regs[REG_CONF_LO as usize]
    }
}

type SharedChip = Rc<RefCell<Chip>>;

fn chip() -> SharedChip {
    let mut regs = [0u8; 256];
    regs[REG_STATUS as usize] = 0x20; // magnet detected
    Rc::new(RefCell::new(Chip {
        powered: false,
        boot_nacks: 0,
        regs,
        pointer: 0,
    }))
}

#[derive(Debug)]
struct BusError(ErrorKind);

impl embedded_hal_async::i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct Bus(SharedChip);

impl ErrorType for Bus {
    type Error = BusError;
}

impl I2c for Bus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.powered && chip.boot_nacks > 0 {
            chip.boot_nacks -= 1;
            return Err(BusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
        }
        if !chip.powered || address != config::AS5600_I2C_ADDRESS {
            return Err(BusError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        chip.pointer = reg as usize;
                        for &b in data {
                            let p = chip.pointer;
                            chip.regs[p] = b;
                            chip.pointer = (p + 1) % 256;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        let p = chip.pointer;
                        *b = chip.regs[p];
                        chip.pointer = (p + 1) % 256;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Supply switch; cutting it clears the volatile configuration.
struct Rail(SharedChip);

impl PowerRail for Rail {
    fn enable(&mut self) {
        self.0.borrow_mut().powered = true;
    }

    fn disable(&mut self) {
        let mut chip = self.0.borrow_mut();
        chip.powered = false;
        chip.regs[REG_CONF_LO as usize] = 0;
    }

    fn is_enabled(&self) -> bool {
        self.0.borrow().powered
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Default)]
struct Host {
    reports: Vec<[u8; 2]>,
}

impl ReportSink for Host {
    async fn send(&mut self, report: &WheelReport) -> usize {
        self.reports.push(report.to_bytes());
        1
    }
}

type Board = Sampler<As5600<Bus>, Rail, NoDelay>;
type Queue = ScrollQueue<NoopRawMutex, { config::SCROLL_QUEUE_CAPACITY }>;

fn board(chip: &SharedChip) -> Board {
    Sampler::new(
        As5600::new(Bus(chip.clone())),
        Rail(chip.clone()),
        NoDelay,
        SensorSettings::DEFAULT,
        ScrollPipeline::new(ScrollConfig::DEFAULT, PowerTimings::DEFAULT, 0),
    )
}

/// Bring the board up and take the baseline sample at t=0.
fn start(chip: &SharedChip, queue: &Queue, link: &LinkState) -> Board {
    let mut sampler = board(chip);
    assert_eq!(block_on(sampler.wait_ready(RetryPolicy::DEFAULT)), Readiness::Ready);
    block_on(sampler.poll(queue, link, 0));
    sampler
}

fn connected() -> LinkState {
    let link = LinkState::new();
    link.set_connected(true);
    link
}

// 512 counts = 45°, i.e. 30 notches of 1.5°; the default config inverts.
const QUARTER_EIGHTH: u16 = 512;

// ═══════════════════════════════════════════════════════════════════════════
// Sensor to host
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn wheel_turn_reaches_host_as_one_report() {
    let chip = chip();
    let queue = Queue::new();
    let link = connected();
    let mut sampler = start(&chip, &queue, &link);

    // Power-up programmed nominal mode + 1 LSB hysteresis.
    assert_eq!(chip.borrow().conf(), 0b0000_0100);
    assert!(queue.is_empty());

    chip.borrow_mut().set_counts(QUARTER_EIGHTH);
    block_on(sampler.poll(&queue, &link, 8));

    let mut host = Host::default();
    let summary = block_on(drain(&queue, &mut host));
    assert_eq!(summary.reports, 1);
    assert_eq!(host.reports, vec![[0x00, (-30i8) as u8]]);
}

#[test]
fn hi_res_host_gets_sixteenth_notches() {
    let chip = chip();
    let queue = Queue::new();
    let link = connected();
    link.set_resolution_multiplier(
        ResolutionMultiplier::from_feature_bytes(&[0x01]).unwrap(),
    );
    let mut sampler = start(&chip, &queue, &link);

    // 16 counts = 1.40625° = 15 ticks of 0.09375°.
    chip.borrow_mut().set_counts(16);
    block_on(sampler.poll(&queue, &link, 8));
    assert_eq!(queue.try_dequeue().map(|s| s.get()), Some(-15));
}

#[test]
fn wheel_below_one_notch_sends_nothing() {
    let chip = chip();
    let queue = Queue::new();
    let link = connected();
    let mut sampler = start(&chip, &queue, &link);

    chip.borrow_mut().set_counts(16);
    block_on(sampler.poll(&queue, &link, 8));
    assert!(queue.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Power modes on the real driver
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn idle_wheel_steps_down_then_wakes_on_turn() {
    let chip = chip();
    let queue = Queue::new();
    let link = connected();
    let mut sampler = start(&chip, &queue, &link);

    let mut now = 0u64;
    let mut saw_low_power_register = false;
    while sampler.pipeline().mode() != PowerMode::Doze {
        now += u64::from(block_on(sampler.poll(&queue, &link, now)));
        if sampler.pipeline().mode() == PowerMode::LowPower && chip.borrow().conf() == 0b0000_0110 {
            saw_low_power_register = true;
        }
        assert!(now < 2 * config::DOZE_TIMEOUT_MS, "never reached doze");
    }
    assert!(saw_low_power_register);
    assert!(now >= config::DOZE_TIMEOUT_MS);
    // Rail is cut between doze samples.
    assert!(!chip.borrow().powered);
    assert_eq!(
        block_on(sampler.poll(&queue, &link, now)),
        config::DOZE_SAMPLE_PERIOD_MS
    );
    assert!(!chip.borrow().powered);

    chip.borrow_mut().set_counts(QUARTER_EIGHTH);
    let period = block_on(sampler.poll(&queue, &link, now + 250));
    assert_eq!(period, config::ACTIVE_SAMPLE_PERIOD_MS);
    assert_eq!(sampler.pipeline().mode(), PowerMode::Active);
    assert!(chip.borrow().powered);
    assert_eq!(chip.borrow().conf(), 0b0000_0100);
    assert_eq!(queue.try_dequeue().map(|s| s.get()), Some(-30));
}

#[test]
fn reconnect_starts_from_fresh_baseline() {
    let chip = chip();
    let queue = Queue::new();
    let link = connected();
    let mut sampler = start(&chip, &queue, &link);

    link.on_all_disconnected();
    assert_eq!(
        block_on(sampler.poll(&queue, &link, 8)),
        config::DISCONNECTED_POLL_MS
    );
    assert!(!chip.borrow().powered);

    // Turned while no host was listening: never reported.
    chip.borrow_mut().set_counts(QUARTER_EIGHTH);
    block_on(sampler.poll(&queue, &link, 1_008));
    assert!(queue.is_empty());

    link.set_connected(true);
    block_on(sampler.poll(&queue, &link, 2_008));
    assert!(queue.is_empty());
    assert!(chip.borrow().powered);
    assert_eq!(chip.borrow().conf(), 0b0000_0100);
}

#[test]
fn missing_sensor_is_reported_absent() {
    let chip = chip();
    let mut sampler = Sampler::new(
        As5600::with_address(Bus(chip.clone()), 0x40),
        Rail(chip.clone()),
        NoDelay,
        SensorSettings::DEFAULT,
        ScrollPipeline::default(),
    );
    assert_eq!(
        block_on(sampler.bring_up(RetryPolicy::DEFAULT, RetryPolicy::LATE_START)),
        Readiness::Absent
    );
}

#[test]
fn slow_sensor_is_found_in_late_start_round() {
    let chip = chip();
    // Silent for the whole first round and a few late-start attempts.
    chip.borrow_mut().boot_nacks = config::SENSOR_READY_ATTEMPTS + 4;
    let mut sampler = board(&chip);
    assert_eq!(
        block_on(sampler.bring_up(RetryPolicy::DEFAULT, RetryPolicy::LATE_START)),
        Readiness::Ready
    );
    assert_eq!(chip.borrow().boot_nacks, 0);
    assert!(chip.borrow().powered);
}

#[test]
fn no_magnet_times_out() {
    let chip = chip();
    chip.borrow_mut().regs[REG_STATUS as usize] = 0;
    let mut sampler = board(&chip);
    assert_eq!(block_on(sampler.wait_ready(RetryPolicy::DEFAULT)), Readiness::TimedOut);
}

// ═══════════════════════════════════════════════════════════════════════════
// Bonds
// ═══════════════════════════════════════════════════════════════════════════

fn bond(n: u8) -> BondRecord {
    BondRecord {
        address: PeerAddress {
            kind: 1,
            bytes: [n, 0, 0, 0, 0, 0xC0],
        },
        master: MasterKey {
            ediv: u16::from(n) * 100,
            rand: [n; 8],
        },
        ltk: [n; 16],
        ltk_flags: 1,
        irk: [n ^ 0xFF; 16],
    }
}

#[test]
fn bonds_survive_flash_image_and_order_directed_advertising() {
    let mut store: BondStore<{ config::MAX_BONDED_PEERS }> = BondStore::new();
    for n in 1..=3 {
        store.upsert(bond(n));
    }

    let mut image = [0u8; BondStore::<{ config::MAX_BONDED_PEERS }>::SERIALIZED_CAPACITY];
    let len = store.serialize_all(&mut image).unwrap();

    let mut restored: BondStore<{ config::MAX_BONDED_PEERS }> = BondStore::new();
    assert_eq!(restored.deserialize_all(&image[..len]), 3);
    assert_eq!(
        restored.find_by_master(&bond(2).master).map(|r| r.ltk),
        Some([2; 16])
    );

    // Host 3 is already connected; the others are tried newest first.
    let mut directed: DirectedQueue<{ config::MAX_BONDED_PEERS }> = DirectedQueue::new();
    directed.refill(&restored, |addr| *addr == bond(3).address);
    assert_eq!(directed.next(), Some(bond(2).address));
    assert_eq!(directed.next(), Some(bond(1).address));
    assert_eq!(directed.next(), None);
}
