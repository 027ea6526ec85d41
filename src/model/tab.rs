use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(id: i64) -> Self { Self(id) }

            pub const fn get(self) -> i64 { self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
        }
    };
}

host_id!(
    /// Only stable for the lifetime of a browser session.
    TabId
);
host_id!(WindowId);
host_id!(GroupId);

/// A tab as reported by the browser. Owned by the browser; we only read it
/// and ask for changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    /// `None` is the browser's "no group" sentinel.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub discarded: bool,
    /// Milliseconds since the unix epoch.
    #[serde(default)]
    pub last_accessed: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fav_icon_url: Option<String>,
}

impl Tab {
    pub fn new(id: TabId, window_id: WindowId) -> Self {
        Tab {
            id,
            window_id,
            group_id: None,
            index: 0,
            pinned: false,
            active: false,
            discarded: false,
            last_accessed: None,
            title: None,
            url: None,
            fav_icon_url: None,
        }
    }

    /// Tabs the browser never reported an access time for sort as least
    /// recent.
    pub fn recency(&self) -> u64 { self.last_accessed.unwrap_or(0) }

    /// True when the tab is loaded and has sat unused for longer than
    /// `idle`. A tab without an access time is never stale.
    pub fn is_stale(&self, now_ms: u64, idle: Duration) -> bool {
        !self.discarded
            && self
                .last_accessed
                .is_some_and(|at| u128::from(now_ms.saturating_sub(at)) > idle.as_millis())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabGroup {
    pub id: GroupId,
    pub window_id: WindowId,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    #[serde(default)]
    pub focused: bool,
}

pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub fn now_millis() -> u64 { unix_millis(SystemTime::now()) }

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(60 * 60 * 24);
    const HOUR_MS: u64 = 60 * 60 * 1000;

    fn tab(last_accessed: Option<u64>) -> Tab {
        Tab { last_accessed, ..Tab::new(TabId::new(1), WindowId::new(1)) }
    }

    #[test]
    fn stale_only_after_the_idle_period() {
        let now = 100 * HOUR_MS;
        assert!(tab(Some(now - 25 * HOUR_MS)).is_stale(now, DAY));
        assert!(!tab(Some(now - 24 * HOUR_MS)).is_stale(now, DAY));
        assert!(!tab(Some(now)).is_stale(now, DAY));
    }

    #[test]
    fn unknown_access_time_is_never_stale_but_sorts_last() {
        let t = tab(None);
        assert!(!t.is_stale(u64::MAX, DAY));
        assert_eq!(t.recency(), 0);
    }

    #[test]
    fn discarded_tabs_are_not_stale() {
        let t = Tab { discarded: true, ..tab(Some(0)) };
        assert!(!t.is_stale(100 * HOUR_MS, DAY));
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        assert_eq!(serde_json::to_value(GroupId::new(12)).unwrap(), serde_json::json!(12));
        let id: TabId = serde_json::from_value(serde_json::json!(-3)).unwrap();
        assert_eq!(id, TabId::new(-3));
    }
}
