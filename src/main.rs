//! magscroll firmware entry point.
//!
//! Tasks:
//! - `softdevice_task`   - runs the SoftDevice event loop
//! - `storage_task`      - loads bonds at boot, writes them back on change
//! - `advertiser_task`   - accepts hosts, one `connection_task` per link
//! - `sampler_task`      - AS5600 sampling, scroll pipeline, power modes
//! - `dispatch_task`     - drains the scroll queue into HID notifications
//! - `clear_bonds_button_task` - forgets every bonded host
//!
//! Pins (nRF52840-DK): AS5600 SDA P0.26, SCL P0.27, sensor supply P0.29,
//! button 1 (P0.11) clears bonds.

#![no_std]
#![no_main]

mod ble;
mod board;
mod storage;

use defmt::{error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive, Pin};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Delay, Instant, Timer};
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use magscroll::config::{self, SCROLL_QUEUE_CAPACITY};
use magscroll::dispatch;
use magscroll::error::{BleError, Error};
use magscroll::power_mode::PowerTimings;
use magscroll::sampler::{Sampler, ScrollPipeline, SensorSettings};
use magscroll::scroll::queue::ScrollQueue;
use magscroll::scroll::ScrollConfig;
use magscroll::sensor::as5600::As5600;
use magscroll::sensor::readiness::{Readiness, RetryPolicy};
use magscroll::sensor::PinRail;

use crate::ble::notify::NotifySink;
use crate::ble::server::Server;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

type WheelSampler = Sampler<As5600<Twim<'static, peripherals::TWISPI0>>, PinRail<Output<'static>>, Delay>;

/// Steps from the sampling task to the dispatcher.
static SCROLL_QUEUE: ScrollQueue<CriticalSectionRawMutex, SCROLL_QUEUE_CAPACITY> = ScrollQueue::new();

#[embassy_executor::task]
async fn sampler_task(mut sampler: WheelSampler) {
    loop {
        match sampler.bring_up(RetryPolicy::DEFAULT, RetryPolicy::LATE_START).await {
            Readiness::Ready => break,
            Readiness::TimedOut => warn!("Sensor: probing again"),
            Readiness::Absent => {
                error!("Sensor: AS5600 not found, scrolling disabled");
                return;
            }
        }
    }

    loop {
        let now_ms = Instant::now().as_millis();
        let sleep_ms = sampler.poll(&SCROLL_QUEUE, &ble::LINK, now_ms).await;
        Timer::after_millis(u64::from(sleep_ms)).await;
    }
}

#[embassy_executor::task]
async fn dispatch_task(server: &'static Server) -> ! {
    let mut sink = NotifySink::new(server);
    dispatch::run(&SCROLL_QUEUE, &mut sink).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("magscroll starting");

    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::TWISPI0.set_priority(Priority::P3);

    let sd = Softdevice::enable(&ble::softdevice_config());
    ble::configure_gap(sd);

    static SERVER: StaticCell<Server> = StaticCell::new();
    let server: &'static Server = match Server::new(sd) {
        Ok(server) => SERVER.init(server),
        Err(e) => {
            error!("{:?}: {:?}", Error::from(BleError::RegisterFailed), e);
            return;
        }
    };
    let sd: &'static Softdevice = sd;

    unwrap!(spawner.spawn(ble::softdevice_task(sd)));
    unwrap!(spawner.spawn(storage::storage_task(sd)));
    unwrap!(spawner.spawn(ble::advertiser_task(spawner, sd, server)));
    unwrap!(spawner.spawn(dispatch_task(server)));
    unwrap!(spawner.spawn(board::clear_bonds_button_task(p.P0_11.degrade())));

    let mut i2c_config = twim::Config::default();
    i2c_config.frequency = twim::Frequency::K400;
    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, i2c_config);

    let rail = PinRail::new(Output::new(p.P0_29, Level::Low, OutputDrive::Standard));
    let sampler = Sampler::new(
        As5600::with_address(i2c, config::AS5600_I2C_ADDRESS),
        rail,
        Delay,
        SensorSettings::DEFAULT,
        ScrollPipeline::new(ScrollConfig::DEFAULT, PowerTimings::DEFAULT, Instant::now().as_millis()),
    );
    unwrap!(spawner.spawn(sampler_task(sampler)));

    info!("magscroll running");
}
