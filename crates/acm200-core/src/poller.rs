// ── Routing poller ──
//
// One poll cycle = a bulk status query, then a per-output query for every
// configured output the bulk answer left out. A cycle never runs longer
// than the poll interval, and cycles never overlap: the next tick waits
// for the running cycle to finish.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use acm200_api::{DeviceClient, RouteMap, TcpTransport, Transport};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::RoutingSnapshot;
use crate::sink::RouteSink;

/// What the poller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PollPhase {
    Idle,
    Polling,
}

/// Publishes `Polling` while at least one cycle runs. Background ticks and
/// on-demand refreshes may overlap (one waits for the client slot), so the
/// phase only drops back to `Idle` when the last of them ends.
struct PhaseTracker {
    phase: watch::Sender<PollPhase>,
    active: Mutex<usize>,
}

impl PhaseTracker {
    fn new() -> Self {
        let (phase, _) = watch::channel(PollPhase::Idle);
        Self {
            phase,
            active: Mutex::new(0),
        }
    }

    fn enter(&self) -> PhaseGuard<'_> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active += 1;
        self.phase.send_replace(PollPhase::Polling);
        PhaseGuard(self)
    }
}

/// Leaves the cycle however it ends.
struct PhaseGuard<'a>(&'a PhaseTracker);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.0.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.0.phase.send_replace(PollPhase::Idle);
        }
    }
}

pub struct RoutingPoller<T = TcpTransport> {
    client: Arc<DeviceClient<T>>,
    num_outputs: u16,
    interval: Duration,
    phase: PhaseTracker,
}

impl<T: Transport> RoutingPoller<T> {
    pub fn new(client: Arc<DeviceClient<T>>, num_outputs: u16, interval: Duration) -> Self {
        Self {
            client,
            num_outputs,
            interval,
            phase: PhaseTracker::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> watch::Receiver<PollPhase> {
        self.phase.phase.subscribe()
    }

    /// Run one cycle, bounded by the poll interval. Failures (including a
    /// cycle that outlives the interval) come back as
    /// [`CoreError::UpdateFailed`], except shutdown which stays
    /// [`CoreError::Shutdown`].
    pub async fn poll_once(&self) -> Result<RoutingSnapshot, CoreError> {
        let _phase = self.phase.enter();
        let routes = match tokio::time::timeout(self.interval, self.collect()).await {
            Ok(result) => result.map_err(CoreError::update_failed)?,
            Err(_) => {
                debug!(interval = ?self.interval, "poll cycle abandoned at the interval bound");
                return Err(CoreError::update_failed(CoreError::Timeout {
                    step: "poll cycle".into(),
                    timeout_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
                }));
            }
        };
        Ok(RoutingSnapshot::new(routes, self.num_outputs))
    }

    async fn collect(&self) -> Result<RouteMap, CoreError> {
        let mut routes = self.client.get_bulk_routes().await?;
        routes.retain(|output, _| *output <= self.num_outputs);
        debug!(
            known = routes.len(),
            expected = self.num_outputs,
            "bulk routes received"
        );

        for output in 1..=self.num_outputs {
            if routes.contains_key(&output) {
                continue;
            }
            match self.client.get_route(output).await? {
                Some(input) => {
                    routes.insert(output, input);
                }
                None => debug!(output, "route still unknown after fallback query"),
            }
        }

        Ok(routes)
    }

    /// Poll every `interval` until `cancel` fires, handing each result to
    /// `sink`. The first cycle starts immediately.
    pub async fn run<S>(&self, sink: &S, cancel: CancellationToken)
    where
        S: RouteSink + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            address = %self.client.address(),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "routing poller started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(snapshot) => {
                    debug!(routes = snapshot.len(), "poll cycle complete");
                    sink.publish(Arc::new(snapshot));
                }
                Err(CoreError::Shutdown) => break,
                Err(e) => {
                    warn!(error = %e, "poll cycle failed");
                    sink.update_failed(&e);
                }
            }
        }

        info!(address = %self.client.address(), "routing poller stopped");
    }
}
