//! Background timeout sweeps for the Global, Passive and Mixed policies.
//!
//! One long-lived thread per engine instance. Each cycle does its sweep
//! under the store lock, then sleeps the remainder of the period inside
//! `recv_timeout` on the shutdown channel — so a shutdown signal interrupts
//! the sleep and shutdown latency is bounded by one period.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use super::EngineShared;
use crate::config::WindowConfig;

/// Spawn the sweeper appropriate for `window`, if the policy needs one.
/// Returns the shutdown sender plus the join handle; both are `None` for
/// the purely reactive Active policy.
pub(super) fn spawn(
    shared: &Arc<EngineShared>,
    window: WindowConfig,
) -> Result<(Option<Sender<()>>, Option<JoinHandle<()>>)> {
    let job = match window {
        WindowConfig::Active { .. } => return Ok((None, None)),
        WindowConfig::Global { period } => Job::Global { period },
        WindowConfig::Passive { timeout } => Job::Passive { timeout },
        WindowConfig::Mixed { passive, .. } => Job::Passive { timeout: passive },
    };

    let (tx, rx) = unbounded();
    let shared = Arc::clone(shared);
    let handle = std::thread::Builder::new()
        .name("flowfold-sweeper".into())
        .spawn(move || match job {
            Job::Global { period } => run_global(&shared, &rx, period),
            Job::Passive { timeout } => run_passive(&shared, &rx, timeout),
        })?;
    Ok((Some(tx), Some(handle)))
}

enum Job {
    Global { period: Duration },
    Passive { timeout: Duration },
}

/// Whole-store flush every `period`.
fn run_global(shared: &EngineShared, rx: &Receiver<()>, period: Duration) {
    loop {
        let started = Instant::now();
        let flushed = shared.flush_all();
        if flushed > 0 {
            debug!(flushed, "global sweep flushed store");
        }
        if wait_shutdown(rx, period.saturating_sub(started.elapsed())) {
            return;
        }
    }
}

/// Idle-group eviction against the shared logical clock.
///
/// The clock is advanced by the wall-clock time elapsed since the previous
/// tick; groups whose window end predates `clock - timeout` are emitted and
/// removed. Before the first record seeds the clock there is nothing to
/// measure against, so the pass is skipped.
fn run_passive(shared: &EngineShared, rx: &Receiver<()>, timeout: Duration) {
    let mut last_tick = Instant::now();
    loop {
        let started = Instant::now();
        let cutoff = {
            let mut clock = shared.clock.lock().expect("clock poisoned");
            clock.advance(last_tick.elapsed());
            last_tick = Instant::now();
            clock.cutoff(timeout)
        };
        if let Some(cutoff) = cutoff {
            let evicted = shared.evict_older_than(cutoff);
            if evicted > 0 {
                debug!(evicted, "passive sweep evicted idle groups");
            }
        }
        if wait_shutdown(rx, timeout.saturating_sub(started.elapsed())) {
            return;
        }
    }
}

/// Sleep up to `timeout`, returning true if shutdown was signalled.
fn wait_shutdown(rx: &Receiver<()>, timeout: Duration) -> bool {
    match rx.recv_timeout(timeout) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}
