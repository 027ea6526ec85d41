use tracing::{debug, info, instrument, warn};

use super::{SwitchOutcome, TabService, main_group_pointer};
use crate::common::error::Result;
use crate::model::tab::{GroupId, TabId, WindowId};
use crate::model::window_storage::WindowStorage;
use crate::sys::browser::{Api, Browser, CreateProperties, GroupOptions, GroupUpdate, TabQuery};
use crate::sys::storage::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardOutcome {
    Opened(TabId),
    AlreadyFocused(TabId),
    Switched(TabId, SwitchOutcome),
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    /// Puts every unpinned tab of `window` into the main group, creating it
    /// if needed, and remembers the window as managed.
    #[instrument(skip(self))]
    pub async fn manage_window(&self, window: WindowId) -> Result<Option<GroupId>> {
        let window = self.call(Api::WindowsGet, self.browser.windows_get(window)).await?;
        let query = TabQuery {
            window_id: Some(window.id),
            pinned: Some(false),
            ..Default::default()
        };
        let tabs = self.call(Api::TabsQuery, self.browser.tabs_query(&query)).await?;
        if tabs.is_empty() {
            debug!(window = %window.id, "no tabs to manage");
            return Ok(None);
        }

        let existing = self.resolve_main_group().await?.map(|g| g.id);
        let options = GroupOptions {
            tab_ids: tabs.iter().map(|t| t.id).collect(),
            group_id: existing,
            window_id: Some(window.id),
        };
        let group = self.call(Api::TabsGroup, self.browser.tabs_group(&options)).await?;

        let pointer = main_group_pointer();
        let swapped = self
            .stored(Api::StorageSet, pointer.replace(&self.store, &existing, &Some(group)))
            .await?;
        if !swapped {
            warn!(%group, "main group pointer changed while managing the window");
        }

        let update =
            GroupUpdate { collapsed: Some(true), title: Some(self.settings.group_title()) };
        self.call(Api::TabGroupsUpdate, self.browser.tab_groups_update(group, &update)).await?;

        let windows = WindowStorage::new(&self.store);
        self.stored(Api::StorageSet, windows.save_managed_window(window.id)).await?;

        info!(%group, window = %window.id, tabs = tabs.len(), "window is now managed");
        Ok(Some(group))
    }

    /// Brings the dashboard forward, opening it if no tab shows it.
    #[instrument(skip(self))]
    pub async fn open_dashboard(&self) -> Result<DashboardOutcome> {
        let url = &self.settings.dashboard_url;
        let query = TabQuery::with_url(url.clone());
        let existing = self.call(Api::TabsQuery, self.browser.tabs_query(&query)).await?;

        match existing.into_iter().next() {
            None => {
                let properties =
                    CreateProperties { url: url.clone(), window_id: None, active: true };
                let tab = self.call(Api::TabsCreate, self.browser.tabs_create(&properties)).await?;
                Ok(DashboardOutcome::Opened(tab.id))
            }
            Some(tab) if tab.active => Ok(DashboardOutcome::AlreadyFocused(tab.id)),
            Some(tab) => {
                let outcome = self.switch_tab_managed(tab.id).await?;
                Ok(DashboardOutcome::Switched(tab.id, outcome))
            }
        }
    }

    pub async fn close_tabs(&self, tabs: &[TabId]) -> Result<()> {
        if tabs.is_empty() {
            return Ok(());
        }
        self.call(Api::TabsRemove, self.browser.tabs_remove(tabs)).await
    }
}
