//! Broadcast cancellation for one scan.
//!
//! The signal is raised by dropping the [`Canceller`]: every [`CancelToken`]
//! receiver then observes a disconnected channel, which `select!` treats as
//! ready. Raising it therefore needs no cooperation from the waiting side.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

/// Owning side of the cancellation signal; cancels when dropped
#[derive(Debug)]
pub struct Canceller {
    _signal: Sender<()>,
}

impl Canceller {
    pub fn cancel(self) {}
}

/// Observing side of the cancellation signal
#[derive(Debug, Clone)]
pub struct CancelToken {
    signal: Receiver<()>,
}

impl CancelToken {
    /// Channel that becomes ready once cancellation fires, for use in `select!`
    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Create a linked canceller and token
pub fn cancellation() -> (Canceller, CancelToken) {
    let (tx, rx) = bounded(0);
    (Canceller { _signal: tx }, CancelToken { signal: rx })
}
