//! Views handed to whoever renders the tab lists.
//!
//! Field names follow the extension's camelCase so the same JSON can feed
//! the web UI.

use serde::{Deserialize, Serialize};

use crate::common::collections::HashMap;
use crate::common::config::WATERMARK_PREFIX;
use crate::model::tab::{GroupId, Tab, TabGroup, TabId, Window, WindowId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabData {
    pub id: TabId,
    pub window_id: WindowId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    pub active: bool,
    pub pinned: bool,
    pub discarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<u64>,
}

impl From<&Tab> for TabData {
    fn from(tab: &Tab) -> Self {
        TabData {
            id: tab.id,
            window_id: tab.window_id,
            group_id: tab.group_id,
            title: tab.title.clone(),
            url: tab.url.clone(),
            fav_icon_url: tab.fav_icon_url.clone(),
            active: tab.active,
            pinned: tab.pinned,
            discarded: tab.discarded,
            last_accessed: tab.last_accessed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupData {
    pub id: GroupId,
    /// Title with the watermark stripped.
    pub title: String,
    pub collapsed: bool,
    pub is_main: bool,
    pub tab_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowData {
    pub id: WindowId,
    pub focused: bool,
    /// Strip order.
    pub tabs: Vec<TabData>,
    pub groups: Vec<GroupData>,
}

pub fn display_title(title: &str) -> &str { title.trim_start_matches(WATERMARK_PREFIX) }

impl WindowData {
    /// Assembles one view per window. `tabs` must be in strip order, as the
    /// browser reports them.
    pub fn collect(
        windows: &[Window],
        tabs: &[Tab],
        groups: &[TabGroup],
        main_group: Option<GroupId>,
    ) -> Vec<WindowData> {
        let mut counts: HashMap<GroupId, usize> = HashMap::default();
        for group_id in tabs.iter().filter_map(|t| t.group_id) {
            *counts.entry(group_id).or_default() += 1;
        }

        windows
            .iter()
            .map(|window| WindowData {
                id: window.id,
                focused: window.focused,
                tabs: tabs.iter().filter(|t| t.window_id == window.id).map(TabData::from).collect(),
                groups: groups
                    .iter()
                    .filter(|g| g.window_id == window.id)
                    .map(|g| GroupData {
                        id: g.id,
                        title: display_title(&g.title).to_string(),
                        collapsed: g.collapsed,
                        is_main: Some(g.id) == main_group,
                        tab_count: counts.get(&g.id).copied().unwrap_or(0),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&GroupData> {
        self.groups.iter().find(|g| g.id == id)
    }
}
