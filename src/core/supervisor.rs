use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::error::FlowError;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("supervisor is shutting down, not accepting new flows")]
    ShuttingDown,
}

/// Shutdown notification handed to every flow.
///
/// Polling loops wait through [`ShutdownSignal::sleep`] so they stop at the
/// next iteration once shutdown begins.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has begun
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without ever signalling
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration`, or fail with [`FlowError::Cancelled`] if
    /// shutdown begins first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), FlowError> {
        if self.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        tokio::select! {
            _ = self.cancelled() => Err(FlowError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Owns every detached orchestration flow
pub struct FlowSupervisor {
    shutdown_tx: watch::Sender<bool>,
    flows: Mutex<JoinSet<()>>,
    runtime: Option<Handle>,
}

impl FlowSupervisor {
    /// Flows run on the runtime of whoever spawns them
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            flows: Mutex::new(JoinSet::new()),
            runtime: None,
        }
    }

    /// Flows run on `runtime`, so they outlive the HTTP worker that accepted them
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::new()
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Detach a flow. Without a configured runtime this must be called from
    /// within one.
    pub fn spawn<F>(&self, name: &str, flow: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Checked under the lock so shutdown cannot swap the set out in between
        let mut flows = self.lock_flows();
        if self.is_shutting_down() {
            return Err(SupervisorError::ShuttingDown);
        }

        reap_finished(&mut flows);
        match &self.runtime {
            Some(runtime) => flows.spawn_on(flow, runtime),
            None => flows.spawn(flow),
        };

        tracing::debug!("Spawned flow {} ({} in flight)", name, flows.len());
        Ok(())
    }

    /// Number of flows that have not finished yet
    pub fn in_flight(&self) -> usize {
        let mut flows = self.lock_flows();
        reap_finished(&mut flows);
        flows.len()
    }

    /// Signal shutdown, wait up to `grace` for running flows, then abort the
    /// rest. Returns how many flows were aborted.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let mut flows = {
            let mut flows = self.lock_flows();
            self.shutdown_tx.send_replace(true);
            std::mem::take(&mut *flows)
        };
        tracing::info!("Shutting down, waiting for {} flows", flows.len());

        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = flows.join_next().await {
                log_join_result(result);
            }
        })
        .await;

        if drained.is_ok() {
            tracing::info!("All flows finished");
            return 0;
        }

        let aborted = flows.len();
        tracing::warn!("Aborting {} flows still running after {:?}", aborted, grace);
        flows.shutdown().await;
        aborted
    }

    fn lock_flows(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.flows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FlowSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn reap_finished(flows: &mut JoinSet<()>) {
    while let Some(result) = flows.try_join_next() {
        log_join_result(result);
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!("Flow panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_interrupted_by_shutdown() {
        let supervisor = FlowSupervisor::new();
        let signal = supervisor.signal();

        let sleeper = tokio::spawn(async move { signal.sleep(Duration::from_secs(600)).await });
        tokio::task::yield_now().await;

        supervisor.shutdown(Duration::from_secs(1)).await;
        let result = sleeper.await.unwrap();
        assert!(matches!(result, Err(FlowError::Cancelled)));
    }

    #[test]
    fn test_cancelled_pends_until_signalled() {
        let (tx, rx) = watch::channel(false);
        let signal = ShutdownSignal { rx };

        let mut cancelled = tokio_test::task::spawn(signal.cancelled());
        tokio_test::assert_pending!(cancelled.poll());

        tx.send_replace(true);
        assert!(cancelled.is_woken());
        tokio_test::assert_ready!(cancelled.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_signal_sleeps_normally() {
        let signal = ShutdownSignal::never();
        assert!(signal.sleep(Duration::from_secs(3)).await.is_ok());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_refuses_flows_after_shutdown() {
        let supervisor = FlowSupervisor::new();
        assert_eq!(supervisor.shutdown(Duration::from_millis(10)).await, 0);

        let result = supervisor.spawn("late", async {});
        assert!(matches!(result, Err(SupervisorError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_cooperative_flows() {
        let supervisor = FlowSupervisor::new();
        let finished = Arc::new(AtomicBool::new(false));

        let signal = supervisor.signal();
        let flag = finished.clone();
        supervisor
            .spawn("cooperative", async move {
                let _ = signal.sleep(Duration::from_secs(600)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(supervisor.in_flight(), 1);

        let aborted = supervisor.shutdown(Duration::from_secs(5)).await;
        assert_eq!(aborted, 0);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_flow_escapes_concurrent_shutdown() {
        let supervisor = Arc::new(FlowSupervisor::with_runtime(Handle::current()));

        let spawner = {
            let supervisor = supervisor.clone();
            tokio::task::spawn_blocking(move || {
                let mut accepted = 0usize;
                while supervisor.spawn("stuck", std::future::pending::<()>()).is_ok() {
                    accepted += 1;
                }
                accepted
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        supervisor.shutdown(Duration::from_millis(10)).await;
        spawner.await.unwrap();

        // Every accepted flow went into the set shutdown aborted
        assert_eq!(supervisor.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_flows() {
        let supervisor = FlowSupervisor::new();
        supervisor
            .spawn("stuck", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .unwrap();

        let aborted = supervisor.shutdown(Duration::from_secs(1)).await;
        assert_eq!(aborted, 1);
        assert_eq!(supervisor.in_flight(), 0);
    }
}
