use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use super::TabService;
use crate::common::error::Result;
use crate::layout_engine::{Partition, partition};
use crate::model::tab::{GroupId, Tab, TabId, WindowId};
use crate::sys::browser::{
    Api, Browser, GroupOptions, GroupUpdate, MoveIndex, TabQuery, TabUpdate, WindowUpdate,
};
use crate::sys::storage::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTab {
    pub tab_id: TabId,
    #[serde(default)]
    pub main_group_id: Option<GroupId>,
    #[serde(default)]
    pub main_window_id: Option<WindowId>,
}

impl SwitchTab {
    /// A switch that only focuses the tab and leaves every group alone.
    pub fn focus_only(tab_id: TabId) -> Self {
        SwitchTab { tab_id, main_group_id: None, main_window_id: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    FocusOnly,
    Regrouped(Partition),
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    /// Focuses `request.tab_id`. When the tab lives in the main window, the
    /// window is rearranged first so that only the most recently used tabs
    /// stay outside the main group.
    #[instrument(skip(self), fields(tab = %request.tab_id))]
    pub async fn switch_tab(&self, request: SwitchTab) -> Result<SwitchOutcome> {
        let tab = self.call(Api::TabsGet, self.browser.tabs_get(request.tab_id)).await?;

        let (Some(main_group), Some(main_window)) = (request.main_group_id, request.main_window_id)
        else {
            debug!("no main group, focusing only");
            self.focus(&tab).await?;
            return Ok(SwitchOutcome::FocusOnly);
        };
        if tab.window_id != main_window || tab.pinned {
            debug!(window = %tab.window_id, pinned = tab.pinned, "tab is unmanaged, focusing only");
            self.focus(&tab).await?;
            return Ok(SwitchOutcome::FocusOnly);
        }

        let query = TabQuery::in_window(main_window);
        let tabs = self.call(Api::TabsQuery, self.browser.tabs_query(&query)).await?;
        let plan = partition(&tabs, tab.id, main_group, self.settings.max_ungrouped_tabs);
        trace!(?plan, "partitioned main window");

        let to_ungroup: Vec<TabId> = tabs
            .iter()
            .filter(|t| t.group_id.is_some() && plan.is_ungrouped(t.id))
            .map(|t| t.id)
            .collect();
        // Group before ungrouping: the browser drops a group as soon as its
        // last tab leaves.
        tokio::try_join!(self.group_into(main_group, &plan.to_group), self.ungroup(&to_ungroup))?;

        let group_survives = !plan.to_group.is_empty()
            || tabs.iter().any(|t| t.group_id == Some(main_group) && !plan.is_ungrouped(t.id));
        if !group_survives {
            debug!(group = %main_group, "main group emptied, skipping collapse");
        }
        let collapse = group_survives.then_some(main_group);

        // Focus runs to completion even when normalizing fails.
        let (normalized, focused) =
            tokio::join!(self.normalize(collapse, &plan.ungrouped), self.focus(&tab));
        normalized.and(focused)?;

        Ok(SwitchOutcome::Regrouped(plan))
    }

    /// Like [`Self::switch_tab`], with the main group looked up first.
    pub async fn switch_tab_managed(&self, tab_id: TabId) -> Result<SwitchOutcome> {
        let main = self.resolve_main_group().await?;
        self.switch_tab(SwitchTab {
            tab_id,
            main_group_id: main.as_ref().map(|g| g.id),
            main_window_id: main.as_ref().map(|g| g.window_id),
        })
        .await
    }

    async fn ungroup(&self, tabs: &[TabId]) -> Result<()> {
        if tabs.is_empty() {
            return Ok(());
        }
        self.call(Api::TabsUngroup, self.browser.tabs_ungroup(tabs)).await
    }

    async fn group_into(&self, group: GroupId, tabs: &[TabId]) -> Result<()> {
        if tabs.is_empty() {
            return Ok(());
        }
        let options =
            GroupOptions { tab_ids: tabs.to_vec(), group_id: Some(group), window_id: None };
        self.call(Api::TabsGroup, self.browser.tabs_group(&options)).await?;
        Ok(())
    }

    /// Collapses the main group, if it still exists, and lines the ungrouped
    /// tabs up at the end of the strip.
    async fn normalize(&self, group: Option<GroupId>, ungrouped: &[TabId]) -> Result<()> {
        let update = GroupUpdate::collapse();
        let collapse = async {
            let Some(group) = group else { return Ok(()) };
            self.call(Api::TabGroupsUpdate, self.browser.tab_groups_update(group, &update))
                .await
                .map(|_| ())
        };
        let line_up = self.call(Api::TabsMove, self.browser.tabs_move(ungrouped, MoveIndex::End));
        let (collapsed, lined_up) = tokio::join!(collapse, line_up);
        collapsed.and(lined_up)
    }

    async fn focus(&self, tab: &Tab) -> Result<()> {
        if tab.discarded {
            self.call(Api::TabsReload, self.browser.tabs_reload(tab.id)).await?;
        }
        let activate = TabUpdate::activate();
        self.call(Api::TabsUpdate, self.browser.tabs_update(tab.id, &activate)).await?;
        let focus = WindowUpdate::focus();
        self.call(Api::WindowsUpdate, self.browser.windows_update(tab.window_id, &focus)).await?;
        Ok(())
    }
}
