use serde_json::Value;

use super::{TabService, main_group_pointer};
use crate::actor::broadcast::{self, BroadcastEvent, BroadcastReceiver};
use crate::common::config::Settings;
use crate::model::tab::{GroupId, TabId, WindowId};
use crate::sys::browser::Api;
use crate::sys::memory::{BrowserSnapshot, MemoryBrowser};
use crate::sys::storage::{KeyValueStore, MemoryStore};

pub const MAIN_TITLE: &str = "\u{200B}NullTab";

/// A tab service over an in-memory browser and store. The browser and
/// store are shared with the service, so tests can inspect and disturb
/// them directly.
pub struct Harness {
    pub browser: MemoryBrowser,
    pub store: MemoryStore,
    pub service: TabService<MemoryBrowser, MemoryStore>,
    pub events: BroadcastReceiver,
}

impl Harness {
    pub fn new(snapshot: BrowserSnapshot) -> Self {
        Harness::with_settings(snapshot, Settings::default())
    }

    pub fn with_settings(snapshot: BrowserSnapshot, settings: Settings) -> Self {
        let browser = MemoryBrowser::new(snapshot);
        let store = MemoryStore::new();
        let (broadcast_tx, events) = broadcast::channel();
        let service = TabService::new(browser.clone(), store.clone(), settings, broadcast_tx);
        Harness { browser, store, service, events }
    }

    pub async fn set_pointer(&self, group: i64) {
        let pointer = main_group_pointer();
        pointer.set_value(&self.store, &Some(GroupId::new(group))).await.unwrap();
    }

    pub async fn pointer(&self) -> Option<GroupId> {
        main_group_pointer().get_value(&self.store).await.unwrap()
    }

    pub async fn raw_pointer(&self) -> Option<Value> {
        self.store.get(main_group_pointer().key()).await.unwrap()
    }

    pub fn calls(&self, api: Api) -> usize { self.browser.call_count(api) }

    pub fn strip(&self, window: i64) -> Vec<TabId> { self.browser.strip(WindowId::new(window)) }

    pub fn drain_events(&mut self) -> Vec<BroadcastEvent> {
        let mut events = vec![];
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn ids(raw: &[i64]) -> Vec<TabId> { raw.iter().copied().map(TabId::new).collect() }
