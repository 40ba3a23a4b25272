//! Board wiring: the clear-bonds button.
//!
//! The button is active-low with the internal pull-up. The AS5600 supply
//! switch is a plain [`magscroll::sensor::PinRail`] built in `main`.

use defmt::info;
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_time::{Duration, Timer};

use magscroll::config::BUTTON_DEBOUNCE_MS;

use crate::storage;

/// Clear every bond on each debounced press.
#[embassy_executor::task]
pub async fn clear_bonds_button_task(pin: AnyPin) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        // Wait for falling edge (button press, active-low).
        btn.wait_for_falling_edge().await;

        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;

        if btn.is_low() {
            info!("Button: clear bonds");
            storage::clear_bonds();

            // Wait for release to avoid repeat triggers.
            btn.wait_for_rising_edge().await;
            Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        }
    }
}
