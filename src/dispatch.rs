//! Transport side of the scroll queue: turn each queued step into one wheel
//! report and hand it to the connected hosts.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::hid::WheelReport;
use crate::scroll::queue::ScrollQueue;

/// Something that delivers wheel reports to hosts.
#[allow(async_fn_in_trait)]
pub trait ReportSink {
    /// Send one report to every report-mode link. Returns how many links
    /// accepted it.
    async fn send(&mut self, report: &WheelReport) -> usize;
}

/// Totals for one [`drain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainSummary {
    pub reports: usize,
    pub deliveries: usize,
}

/// Send every queued step, oldest first, without waiting for new ones.
pub async fn drain<M, S, const N: usize>(queue: &ScrollQueue<M, N>, sink: &mut S) -> DrainSummary
where
    M: RawMutex,
    S: ReportSink,
{
    let mut summary = DrainSummary::default();
    while let Some(step) = queue.try_dequeue() {
        let report = WheelReport::from_step(step);
        let reached = sink.send(&report).await;
        if reached == 0 {
            debug!("dispatch: step {} reached no host", step.get());
        }
        summary.reports += 1;
        summary.deliveries += reached;
    }
    summary
}

/// Dispatcher loop: sleep until the queue becomes non-empty, then drain.
pub async fn run<M, S, const N: usize>(queue: &ScrollQueue<M, N>, sink: &mut S) -> !
where
    M: RawMutex,
    S: ReportSink,
{
    loop {
        queue.wait_nonempty().await;
        drain(queue, sink).await;
    }
}
