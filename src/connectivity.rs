//! Process-wide connectivity state and change notifications.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Whether the remote store is believed to be reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectivityState::Online => "online",
            ConnectivityState::Offline => "offline",
        }
    }
}

/// Source of the host environment's current network status
pub trait ConnectivityProbe: Send + Sync {
    fn probe(&self) -> ConnectivityState;
}

/// A fixed state acts as a probe that never changes its answer
impl ConnectivityProbe for ConnectivityState {
    fn probe(&self) -> ConnectivityState {
        *self
    }
}

/// Callback invoked with the new state on every transition
pub type Listener = Arc<dyn Fn(ConnectivityState) + Send + Sync>;

/// Handle returned by [`ConnectivityMonitor::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// Current connectivity plus the listeners interested in transitions.
///
/// Listeners run on the thread that reported the transition, after the
/// listener list lock has been released, so a listener may subscribe or
/// unsubscribe without deadlocking.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        Self {
            online: AtomicBool::new(initial.is_online()),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Initialize from a probe of the host environment
    pub fn from_probe(probe: &dyn ConnectivityProbe) -> Self {
        Self::new(probe.probe())
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_online(self.online.load(Ordering::SeqCst))
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Record `state`; listeners fire only when it differs from the previous one.
    ///
    /// Returns `true` if a transition happened.
    pub fn set_state(&self, state: ConnectivityState) -> bool {
        let previous = self.online.swap(state.is_online(), Ordering::SeqCst);
        if previous == state.is_online() {
            return false;
        }

        log::info!("Connectivity changed: {}", state.as_str());
        for listener in self.snapshot_listeners() {
            listener(state);
        }
        true
    }

    /// Probe the environment and record the result
    pub fn refresh(&self, probe: &dyn ConnectivityProbe) -> ConnectivityState {
        let state = probe.probe();
        self.set_state(state);
        state
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        Subscription(id)
    }

    /// Returns `false` if the subscription was already gone
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        match self.listeners.lock() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(id, _)| *id != subscription.0);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    /// Drop every listener (shutdown)
    pub fn clear(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn snapshot_listeners(&self) -> Vec<Listener> {
        self.listeners
            .lock()
            .map(|l| l.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default()
    }
}
