use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::run::StreamState;

/// Handle used to cancel a running bridge stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
    state: Arc<StreamState>,
}

impl AbortHandle {
    /// Requests cancellation of the in-flight engine invocation.
    ///
    /// Once this returns, no further items reach the consumer; the stream
    /// still ends with a normal close. Returns `false` when the stream was
    /// already closed or aborted, in which case nothing happens.
    pub fn abort(&self) -> bool {
        if !self.state.mark_aborted() {
            return false;
        }
        info!(thread_id = %self.state.thread_id(), "bridge run abort requested");
        let _ = self.tx.send(true);
        true
    }
}

/// Cooperative cancel token handed to the engine invocation.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires (for invocations outside a bridge run).
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&mut self) {
        let fired = self.rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

pub(crate) fn cancel_pair(state: Arc<StreamState>) -> (AbortHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx, state }, CancelSignal { rx })
}
