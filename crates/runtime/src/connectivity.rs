//! Process-wide connectivity signal.

use log::info;
use tokio::sync::watch;

/// Publishes the host-reported network state to the sync scheduler.
///
/// The runtime never probes the network itself; the embedding application
/// reports transitions (airplane mode, interface changes) through
/// [`set_online`](ConnectivityMonitor::set_online).
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        ConnectivityMonitor { state }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Records a transition; repeated reports of the same state are dropped.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(
                "[Runtime] Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
