//! State-change notifications between background tasks and a
//! presentation loop.
//!
//! Background work (transport bootstrap, discovery, flood operations)
//! publishes `StateChange` events; whatever drives the display drains the
//! receiving end at its own pace. This keeps the core decoupled from any
//! particular refresh mechanism.

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum StateChange {
    TorReady,
    TorFailed(String),
    HiddenAddress(String),
    PeersUpdated(usize),
    PostsFetched { posts: usize, any_success: bool },
    Published(bool),
}

pub type StateTx = mpsc::UnboundedSender<StateChange>;
pub type StateRx = mpsc::UnboundedReceiver<StateChange>;

pub fn pair() -> (StateTx, StateRx) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_publish_and_drain() {
        let (tx, mut rx) = pair();
        tx.send(StateChange::TorReady).unwrap();
        tx.send(StateChange::PeersUpdated(3)).unwrap();
        assert!(matches!(rx.recv().await, Some(StateChange::TorReady)));
        assert!(matches!(rx.recv().await, Some(StateChange::PeersUpdated(3))));
    }
}
