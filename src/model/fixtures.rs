use crate::common::collections::BTreeSet;
use crate::model::tab::{GroupId, Tab, TabGroup, TabId, Window, WindowId};
use crate::sys::memory::BrowserSnapshot;

pub fn tab(id: i64, window: i64) -> Tab { Tab::new(TabId::new(id), WindowId::new(window)) }

pub fn group(id: i64, window: i64, title: &str) -> TabGroup {
    TabGroup {
        id: GroupId::new(id),
        window_id: WindowId::new(window),
        collapsed: false,
        title: title.to_string(),
    }
}

/// Windows are derived from the tabs; the lowest window id is focused.
pub fn snapshot(groups: Vec<TabGroup>, tabs: Vec<Tab>) -> BrowserSnapshot {
    let window_ids: BTreeSet<WindowId> = tabs.iter().map(|t| t.window_id).collect();
    let windows = window_ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| Window { id, focused: i == 0 })
        .collect();
    BrowserSnapshot { windows, groups, tabs }
}

pub trait TabFixture {
    fn accessed(self, at: u64) -> Self;
    fn grouped(self, group: i64) -> Self;
    fn pinned(self) -> Self;
    fn active(self) -> Self;
    fn discarded(self) -> Self;
    fn url(self, url: &str) -> Self;
}

impl TabFixture for Tab {
    fn accessed(self, at: u64) -> Self { Tab { last_accessed: Some(at), ..self } }

    fn grouped(self, group: i64) -> Self { Tab { group_id: Some(GroupId::new(group)), ..self } }

    fn pinned(self) -> Self { Tab { pinned: true, ..self } }

    fn active(self) -> Self { Tab { active: true, ..self } }

    fn discarded(self) -> Self { Tab { discarded: true, ..self } }

    fn url(self, url: &str) -> Self { Tab { url: Some(url.to_string()), ..self } }
}
