//! Bounded FIFO of scroll steps between the sampling task (producer) and
//! the BLE dispatcher (consumer).
//!
//! The producer never waits: a full queue drops the new step. The first
//! step into an empty queue raises a wake signal; the consumer sleeps on it
//! and then drains everything without blocking.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::ScrollStep;
use crate::error::Error;

/// How a successful push affected the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Enqueued {
    /// The queue was empty; the consumer was woken.
    Woke,
    /// Other steps were already waiting.
    Appended,
}

pub struct ScrollQueue<M: RawMutex, const N: usize> {
    steps: Channel<M, ScrollStep, N>,
    nonempty: Signal<M, ()>,
}

impl<M: RawMutex, const N: usize> ScrollQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            steps: Channel::new(),
            nonempty: Signal::new(),
        }
    }

    /// Non-blocking enqueue. `Err(Error::QueueFull)` means the step was dropped.
    pub fn push(&self, step: ScrollStep) -> Result<Enqueued, Error> {
        let was_empty = self.steps.is_empty();
        if self.steps.try_send(step).is_err() {
            warn!("scroll queue full - dropping step {}", step.get());
            return Err(Error::QueueFull);
        }

        if was_empty {
            self.nonempty.signal(());
            Ok(Enqueued::Woke)
        } else {
            Ok(Enqueued::Appended)
        }
    }

    /// Non-blocking dequeue, oldest first.
    pub fn try_dequeue(&self) -> Option<ScrollStep> {
        self.steps.try_receive().ok()
    }

    /// Resolves once the queue holds at least one step.
    pub async fn wait_nonempty(&self) {
        loop {
            if !self.steps.is_empty() {
                self.nonempty.reset();
                return;
            }
            self.nonempty.wait().await;
        }
    }

    /// Drop every queued step.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.try_dequeue().is_some() {
            dropped += 1;
        }
        self.nonempty.reset();
        dropped
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<M: RawMutex, const N: usize> Default for ScrollQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
