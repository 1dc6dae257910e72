use serde::{Deserialize, Serialize};

/// Network flags as last reported by a connectivity monitor.
///
/// `is_reachable` is stricter than `is_online`: an interface can be up while
/// the public internet is not reachable (captive portal, dead uplink).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,
    pub is_reachable: bool,
}

impl ConnectivityState {
    pub const OFFLINE: Self = Self {
        is_online: false,
        is_reachable: false,
    };

    pub const READY: Self = Self {
        is_online: true,
        is_reachable: true,
    };

    pub fn new(is_online: bool, is_reachable: bool) -> Self {
        Self {
            is_online,
            is_reachable,
        }
    }

    /// Both flags set: replay may proceed.
    pub fn is_ready(&self) -> bool {
        self.is_online && self.is_reachable
    }

    /// True when moving from `self` to `next` crosses not-ready → ready.
    pub fn becomes_ready(&self, next: &Self) -> bool {
        !self.is_ready() && next.is_ready()
    }
}
