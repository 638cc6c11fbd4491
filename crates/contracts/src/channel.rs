//! Stage channel - bounded queue between pipeline stages
//!
//! A thin wrapper around `async_channel::bounded` whose end of stream is
//! either *completed* or *failed(cause)*. Receivers drain everything that
//! was queued before the producer terminated, then observe the termination.

use std::sync::{Arc, OnceLock};

use async_channel::{bounded, Receiver, Sender};

use crate::{ContractError, SharedError};

#[derive(Debug)]
enum Termination {
    Completed,
    Failed(SharedError),
}

/// Create a bounded stage channel
///
/// `name` identifies the queue in errors and logs. A capacity of 0 is
/// treated as 1.
pub fn stage_channel<T>(name: &str, capacity: usize) -> (StageSender<T>, StageReceiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    let termination = Arc::new(OnceLock::new());
    let name: Arc<str> = Arc::from(name);

    (
        StageSender {
            name: Arc::clone(&name),
            tx,
            termination: Arc::clone(&termination),
        },
        StageReceiver {
            name,
            rx,
            termination,
        },
    )
}

/// Producer half of a stage channel
///
/// Dropping it without calling [`complete`](Self::complete) or
/// [`fail`](Self::fail) is observed downstream as an abandoned channel.
#[derive(Debug)]
pub struct StageSender<T> {
    name: Arc<str>,
    tx: Sender<T>,
    termination: Arc<OnceLock<Termination>>,
}

impl<T> StageSender<T> {
    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Push an item, suspending while the queue is full
    ///
    /// # Errors
    /// `ChannelClosed` once the consumer has gone away.
    pub async fn send(&self, item: T) -> Result<(), ContractError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| ContractError::ChannelClosed {
                channel: self.name.to_string(),
            })
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Close the channel normally: no more items will follow
    pub fn complete(self) {
        self.terminate(Termination::Completed);
    }

    /// Close the channel in the failed state
    pub fn fail(self, error: SharedError) {
        self.terminate(Termination::Failed(error));
    }

    fn terminate(&self, termination: Termination) {
        let _ = self.termination.set(termination);
        self.tx.close();
    }
}

impl<T> Drop for StageSender<T> {
    fn drop(&mut self) {
        self.tx.close();
    }
}

/// Consumer half of a stage channel
#[derive(Debug)]
pub struct StageReceiver<T> {
    name: Arc<str>,
    rx: Receiver<T>,
    termination: Arc<OnceLock<Termination>>,
}

impl<T> StageReceiver<T> {
    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull the next item, suspending while the queue is empty
    ///
    /// Returns `Ok(None)` once the producer completed and the queue is
    /// drained.
    ///
    /// # Errors
    /// The producer's cause if it failed, or `ChannelAbandoned` if it went
    /// away without terminating the channel.
    pub async fn recv(&self) -> Result<Option<T>, SharedError> {
        match self.rx.recv().await {
            Ok(item) => Ok(Some(item)),
            Err(_) => match self.termination.get() {
                Some(Termination::Completed) => Ok(None),
                Some(Termination::Failed(error)) => Err(Arc::clone(error)),
                None => Err(Arc::new(ContractError::ChannelAbandoned {
                    channel: self.name.to_string(),
                })),
            },
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is currently empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
