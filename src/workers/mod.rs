pub mod status_reconciler;

pub use status_reconciler::StatusReconcilerWorker;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Background tasks owned by the application, started once the servers are bound.
#[derive(Debug)]
pub struct Workers {
    pub status_reconciler: StatusReconcilerWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.status_reconciler.run(shutdown).instrument(tracing::info_span!("status_reconciler")))]
    }
}
