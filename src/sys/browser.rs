//! The slice of the browser extension API the tab service talks to.
//!
//! Every call is a suspension point; other extension events may run between
//! any two of them, so nothing returned here is more than a snapshot.

use thiserror::Error;

use crate::model::tab::{GroupId, Tab, TabGroup, TabId, Window, WindowId};

/// A rejected browser call. The browser only gives us a message, so callers
/// classify by its text (see [`crate::common::error::Error`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self { HostError { message: message.into() } }
}

pub type HostResult<T> = Result<T, HostError>;

/// Names of the host calls, used for timeouts, logging and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
pub enum Api {
    #[strum(serialize = "tabs.query")]
    TabsQuery,
    #[strum(serialize = "tabs.get")]
    TabsGet,
    #[strum(serialize = "tabs.update")]
    TabsUpdate,
    #[strum(serialize = "tabs.move")]
    TabsMove,
    #[strum(serialize = "tabs.group")]
    TabsGroup,
    #[strum(serialize = "tabs.ungroup")]
    TabsUngroup,
    #[strum(serialize = "tabs.discard")]
    TabsDiscard,
    #[strum(serialize = "tabs.reload")]
    TabsReload,
    #[strum(serialize = "tabs.create")]
    TabsCreate,
    #[strum(serialize = "tabs.remove")]
    TabsRemove,
    #[strum(serialize = "tabGroups.get")]
    TabGroupsGet,
    #[strum(serialize = "tabGroups.update")]
    TabGroupsUpdate,
    #[strum(serialize = "tabGroups.query")]
    TabGroupsQuery,
    #[strum(serialize = "windows.get")]
    WindowsGet,
    #[strum(serialize = "windows.getCurrent")]
    WindowsGetCurrent,
    #[strum(serialize = "windows.getAll")]
    WindowsGetAll,
    #[strum(serialize = "windows.update")]
    WindowsUpdate,
    #[strum(serialize = "storage.get")]
    StorageGet,
    #[strum(serialize = "storage.set")]
    StorageSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFilter {
    Ungrouped,
    In(GroupId),
}

impl GroupFilter {
    fn matches(self, group: Option<GroupId>) -> bool {
        match self {
            GroupFilter::Ungrouped => group.is_none(),
            GroupFilter::In(id) => group == Some(id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabQuery {
    pub window_id: Option<WindowId>,
    pub group: Option<GroupFilter>,
    pub url: Option<String>,
    pub active: Option<bool>,
    pub pinned: Option<bool>,
}

impl TabQuery {
    pub fn in_window(window_id: WindowId) -> Self {
        TabQuery { window_id: Some(window_id), ..Default::default() }
    }

    pub fn in_group(group_id: GroupId) -> Self {
        TabQuery { group: Some(GroupFilter::In(group_id)), ..Default::default() }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        TabQuery { url: Some(url.into()), ..Default::default() }
    }

    pub fn matches(&self, tab: &Tab) -> bool {
        self.window_id.is_none_or(|w| tab.window_id == w)
            && self.group.is_none_or(|g| g.matches(tab.group_id))
            && self.url.as_ref().is_none_or(|u| tab.url.as_ref() == Some(u))
            && self.active.is_none_or(|a| tab.active == a)
            && self.pinned.is_none_or(|p| tab.pinned == p)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupQuery {
    pub window_id: Option<WindowId>,
    pub title: Option<String>,
    pub collapsed: Option<bool>,
}

impl GroupQuery {
    pub fn titled(title: impl Into<String>) -> Self {
        GroupQuery { title: Some(title.into()), ..Default::default() }
    }

    pub fn matches(&self, group: &TabGroup) -> bool {
        self.window_id.is_none_or(|w| group.window_id == w)
            && self.title.as_ref().is_none_or(|t| &group.title == t)
            && self.collapsed.is_none_or(|c| group.collapsed == c)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabUpdate {
    pub active: Option<bool>,
    pub pinned: Option<bool>,
}

impl TabUpdate {
    pub fn activate() -> Self { TabUpdate { active: Some(true), ..Default::default() } }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub collapsed: Option<bool>,
    pub title: Option<String>,
}

impl GroupUpdate {
    pub fn collapse() -> Self { GroupUpdate { collapsed: Some(true), ..Default::default() } }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowUpdate {
    pub focused: Option<bool>,
}

impl WindowUpdate {
    pub fn focus() -> Self { WindowUpdate { focused: Some(true) } }
}

/// `tabs.group` arguments. Without `group_id` the browser creates a new
/// group, in `window_id` when given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOptions {
    pub tab_ids: Vec<TabId>,
    pub group_id: Option<GroupId>,
    pub window_id: Option<WindowId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveIndex {
    At(usize),
    /// The browser's `index: -1`.
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProperties {
    pub url: String,
    pub window_id: Option<WindowId>,
    pub active: bool,
}

#[allow(async_fn_in_trait)]
pub trait Browser {
    async fn tabs_query(&self, query: &TabQuery) -> HostResult<Vec<Tab>>;
    async fn tabs_get(&self, tab: TabId) -> HostResult<Tab>;
    async fn tabs_update(&self, tab: TabId, update: &TabUpdate) -> HostResult<Tab>;
    /// Moves `tabs` to `index`, keeping the order they were given in.
    async fn tabs_move(&self, tabs: &[TabId], index: MoveIndex) -> HostResult<()>;
    async fn tabs_group(&self, options: &GroupOptions) -> HostResult<GroupId>;
    async fn tabs_ungroup(&self, tabs: &[TabId]) -> HostResult<()>;
    async fn tabs_discard(&self, tab: TabId) -> HostResult<Tab>;
    async fn tabs_reload(&self, tab: TabId) -> HostResult<()>;
    async fn tabs_create(&self, properties: &CreateProperties) -> HostResult<Tab>;
    async fn tabs_remove(&self, tabs: &[TabId]) -> HostResult<()>;

    async fn tab_groups_get(&self, group: GroupId) -> HostResult<TabGroup>;
    async fn tab_groups_update(&self, group: GroupId, update: &GroupUpdate)
    -> HostResult<TabGroup>;
    async fn tab_groups_query(&self, query: &GroupQuery) -> HostResult<Vec<TabGroup>>;

    async fn windows_get(&self, window: WindowId) -> HostResult<Window>;
    async fn windows_get_current(&self) -> HostResult<Window>;
    async fn windows_get_all(&self) -> HostResult<Vec<Window>>;
    async fn windows_update(&self, window: WindowId, update: &WindowUpdate) -> HostResult<Window>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tab(id: i64) -> Tab { Tab::new(TabId::new(id), WindowId::new(1)) }

    #[test]
    fn group_filter_distinguishes_ungrouped() {
        let grouped = Tab { group_id: Some(GroupId::new(4)), ..tab(1) };
        let loose = tab(2);

        let ungrouped = TabQuery { group: Some(GroupFilter::Ungrouped), ..Default::default() };
        assert!(!ungrouped.matches(&grouped));
        assert!(ungrouped.matches(&loose));
        assert!(TabQuery::in_group(GroupId::new(4)).matches(&grouped));
        assert!(!TabQuery::in_group(GroupId::new(5)).matches(&grouped));
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(TabQuery::default().matches(&tab(1)));
        assert!(!TabQuery::in_window(WindowId::new(2)).matches(&tab(1)));
    }

    #[test]
    fn url_query_requires_a_url() {
        let dashboard = Tab { url: Some("ext://dash".into()), ..tab(1) };
        assert!(TabQuery::with_url("ext://dash").matches(&dashboard));
        assert!(!TabQuery::with_url("ext://dash").matches(&tab(2)));
    }

    #[test]
    fn api_names_follow_the_extension_namespace() {
        assert_eq!(Api::TabGroupsQuery.to_string(), "tabGroups.query");
        let name: &'static str = Api::WindowsGetCurrent.into();
        assert_eq!(name, "windows.getCurrent");
    }
}
