//! An in-process browser: tabs, groups and windows held in memory.
//!
//! It backs the CLI (state is loaded from and saved to a RON snapshot) and
//! the tests, which use the call log and fault injection to observe and
//! disturb the tab service.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::browser::{
    Api, Browser, CreateProperties, GroupOptions, GroupQuery, GroupUpdate, HostError, HostResult,
    MoveIndex, TabQuery, TabUpdate, WindowUpdate,
};
use crate::common::collections::{HashMap, VecDeque};
use crate::model::tab::{GroupId, Tab, TabGroup, TabId, Window, WindowId, now_millis};

/// Serialised browser state. Tabs are listed in strip order; their `index`
/// fields are recomputed on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    pub windows: Vec<Window>,
    #[serde(default)]
    pub groups: Vec<TabGroup>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone)]
pub enum Fault {
    Fail(HostError),
    /// The call never completes.
    Hang,
}

struct WindowState {
    window: Window,
    strip: Vec<TabId>,
}

#[derive(Default)]
struct State {
    windows: Vec<WindowState>,
    tabs: HashMap<TabId, Tab>,
    groups: Vec<TabGroup>,
    next_id: i64,
    clock: u64,
    calls: Vec<Api>,
    faults: HashMap<Api, VecDeque<Fault>>,
}

#[derive(Clone, Default)]
pub struct MemoryBrowser {
    state: Arc<Mutex<State>>,
}

impl MemoryBrowser {
    pub fn new(snapshot: BrowserSnapshot) -> Self {
        let mut state = State::default();
        let mut max_id = 0;
        for window in snapshot.windows {
            max_id = max_id.max(window.id.get());
            state.windows.push(WindowState { window, strip: vec![] });
        }
        for group in snapshot.groups {
            max_id = max_id.max(group.id.get());
            state.groups.push(group);
        }
        for tab in snapshot.tabs {
            max_id = max_id.max(tab.id.get());
            state.clock = state.clock.max(tab.recency());
            if state.window_mut(tab.window_id).is_err() {
                state.windows.push(WindowState {
                    window: Window { id: tab.window_id, focused: false },
                    strip: vec![],
                });
            }
            if let Ok(window) = state.window_mut(tab.window_id) {
                window.strip.push(tab.id);
            }
            state.tabs.insert(tab.id, tab);
        }
        state.next_id = max_id + 1;
        let window_ids: Vec<WindowId> = state.windows.iter().map(|w| w.window.id).collect();
        for window in window_ids {
            state.reindex(window);
        }
        state.prune_groups();
        MemoryBrowser { state: Arc::new(Mutex::new(state)) }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(MemoryBrowser::new(ron::from_str(&buf)?))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let buf = ron::ser::to_string_pretty(&self.snapshot(), ron::ser::PrettyConfig::default())?;
        File::create(path)?.write_all(buf.as_bytes())?;
        Ok(())
    }

    pub fn snapshot(&self) -> BrowserSnapshot {
        let state = self.state.lock();
        BrowserSnapshot {
            windows: state.windows.iter().map(|w| w.window.clone()).collect(),
            groups: state.groups.clone(),
            tabs: state.strip_order().cloned().collect(),
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Api> { self.state.lock().calls.clone() }

    pub fn call_count(&self, api: Api) -> usize {
        self.state.lock().calls.iter().filter(|&&c| c == api).count()
    }

    pub fn clear_calls(&self) { self.state.lock().calls.clear() }

    /// Makes the next call to `api` behave according to `fault`. Faults
    /// queue up per call.
    pub fn inject(&self, api: Api, fault: Fault) {
        self.state.lock().faults.entry(api).or_default().push_back(fault);
    }

    pub fn fail_next(&self, api: Api, message: impl Into<String>) {
        self.inject(api, Fault::Fail(HostError::new(message)));
    }

    /// Tab ids of `window` in strip order.
    pub fn strip(&self, window: WindowId) -> Vec<TabId> {
        let state = self.state.lock();
        state
            .windows
            .iter()
            .find(|w| w.window.id == window)
            .map(|w| w.strip.clone())
            .unwrap_or_default()
    }

    pub fn tab(&self, tab: TabId) -> Option<Tab> { self.state.lock().tabs.get(&tab).cloned() }

    pub fn group(&self, group: GroupId) -> Option<TabGroup> {
        self.state.lock().groups.iter().find(|g| g.id == group).cloned()
    }

    async fn enter(&self, api: Api) -> HostResult<()> {
        let fault = {
            let mut state = self.state.lock();
            state.calls.push(api);
            state.faults.get_mut(&api).and_then(VecDeque::pop_front)
        };
        trace!(%api, ?fault, "browser call");
        match fault {
            None => Ok(()),
            Some(Fault::Fail(err)) => Err(err),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }
}

fn no_tab(id: TabId) -> HostError { HostError::new(format!("No tab with id: {id}.")) }

fn no_group(id: GroupId) -> HostError { HostError::new(format!("No group with id: {id}.")) }

fn no_window(id: WindowId) -> HostError { HostError::new(format!("No window with id: {id}.")) }

impl State {
    fn tab(&self, id: TabId) -> HostResult<&Tab> { self.tabs.get(&id).ok_or_else(|| no_tab(id)) }

    fn tab_mut(&mut self, id: TabId) -> HostResult<&mut Tab> {
        self.tabs.get_mut(&id).ok_or_else(|| no_tab(id))
    }

    fn group(&self, id: GroupId) -> HostResult<&TabGroup> {
        self.groups.iter().find(|g| g.id == id).ok_or_else(|| no_group(id))
    }

    fn window(&self, id: WindowId) -> HostResult<&WindowState> {
        self.windows.iter().find(|w| w.window.id == id).ok_or_else(|| no_window(id))
    }

    fn window_mut(&mut self, id: WindowId) -> HostResult<&mut WindowState> {
        self.windows.iter_mut().find(|w| w.window.id == id).ok_or_else(|| no_window(id))
    }

    fn strip_order(&self) -> impl Iterator<Item = &Tab> {
        self.windows.iter().flat_map(|w| w.strip.iter()).filter_map(|id| self.tabs.get(id))
    }

    fn fresh_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn tick(&mut self) -> u64 {
        self.clock = (self.clock + 1).max(now_millis());
        self.clock
    }

    fn reindex(&mut self, window: WindowId) {
        let Ok(state) = self.window(window) else { return };
        let strip = state.strip.clone();
        for (index, id) in strip.into_iter().enumerate() {
            if let Some(tab) = self.tabs.get_mut(&id) {
                tab.index = index;
            }
        }
    }

    /// The browser drops groups as soon as their last tab leaves.
    fn prune_groups(&mut self) {
        let tabs = &self.tabs;
        self.groups.retain(|g| tabs.values().any(|t| t.group_id == Some(g.id)));
    }

    fn detach(&mut self, tab: TabId) {
        for window in &mut self.windows {
            window.strip.retain(|&id| id != tab);
        }
    }

    fn activate(&mut self, id: TabId) -> HostResult<()> {
        let window = self.tab(id)?.window_id;
        let now = self.tick();
        for tab in self.tabs.values_mut().filter(|t| t.window_id == window) {
            tab.active = tab.id == id;
        }
        let tab = self.tab_mut(id)?;
        tab.last_accessed = Some(now);
        tab.discarded = false;
        Ok(())
    }

    fn group_tabs(&mut self, options: &GroupOptions) -> HostResult<GroupId> {
        let Some(&first) = options.tab_ids.first() else {
            return Err(HostError::new("At least one tab id must be specified."));
        };
        for &id in &options.tab_ids {
            if self.tab(id)?.pinned {
                return Err(HostError::new(format!("Cannot group pinned tab {id}.")));
            }
        }
        let group_id = match options.group_id {
            Some(id) => self.group(id)?.id,
            None => {
                let window_id = match options.window_id {
                    Some(window) => self.window(window)?.window.id,
                    None => self.tab(first)?.window_id,
                };
                let id = GroupId::new(self.fresh_id());
                let title = String::new();
                self.groups.push(TabGroup { id, window_id, collapsed: false, title });
                id
            }
        };
        let window_id = self.group(group_id)?.window_id;

        for &id in &options.tab_ids {
            let tab = self.tab(id)?;
            if tab.window_id != window_id {
                let old_window = tab.window_id;
                self.detach(id);
                self.window_mut(window_id)?.strip.push(id);
                self.tab_mut(id)?.window_id = window_id;
                self.reindex(old_window);
            }
            self.tab_mut(id)?.group_id = Some(group_id);
        }

        // Members of a group always sit next to each other, starting where
        // the leftmost one was.
        let members: Vec<TabId> = self
            .window(window_id)?
            .strip
            .iter()
            .copied()
            .filter(|id| self.tabs.get(id).is_some_and(|t| t.group_id == Some(group_id)))
            .collect();
        let window = self.window_mut(window_id)?;
        if let Some(anchor) = window.strip.iter().position(|id| members.contains(id)) {
            window.strip.retain(|id| !members.contains(id));
            let anchor = anchor.min(window.strip.len());
            window.strip.splice(anchor..anchor, members);
        }
        self.reindex(window_id);
        self.prune_groups();
        Ok(group_id)
    }
}

impl Browser for MemoryBrowser {
    async fn tabs_query(&self, query: &TabQuery) -> HostResult<Vec<Tab>> {
        self.enter(Api::TabsQuery).await?;
        let state = self.state.lock();
        Ok(state.strip_order().filter(|t| query.matches(t)).cloned().collect())
    }

    async fn tabs_get(&self, tab: TabId) -> HostResult<Tab> {
        self.enter(Api::TabsGet).await?;
        self.state.lock().tab(tab).cloned()
    }

    async fn tabs_update(&self, tab: TabId, update: &TabUpdate) -> HostResult<Tab> {
        self.enter(Api::TabsUpdate).await?;
        let mut state = self.state.lock();
        state.tab(tab)?;
        if update.active == Some(true) {
            state.activate(tab)?;
        }
        if let Some(pinned) = update.pinned {
            let t = state.tab_mut(tab)?;
            t.pinned = pinned;
            if pinned {
                t.group_id = None;
            }
            state.prune_groups();
        }
        state.tab(tab).cloned()
    }

    async fn tabs_move(&self, tabs: &[TabId], index: MoveIndex) -> HostResult<()> {
        self.enter(Api::TabsMove).await?;
        let mut state = self.state.lock();
        for &id in tabs {
            state.tab(id)?;
        }
        let mut touched = vec![];
        for (offset, &id) in tabs.iter().enumerate() {
            let window_id = state.tab(id)?.window_id;
            let window = state.window_mut(window_id)?;
            window.strip.retain(|&t| t != id);
            match index {
                MoveIndex::End => window.strip.push(id),
                MoveIndex::At(at) => {
                    let at = (at + offset).min(window.strip.len());
                    window.strip.insert(at, id);
                }
            }
            touched.push(window_id);
        }
        for window in touched {
            state.reindex(window);
        }
        Ok(())
    }

    async fn tabs_group(&self, options: &GroupOptions) -> HostResult<GroupId> {
        self.enter(Api::TabsGroup).await?;
        self.state.lock().group_tabs(options)
    }

    async fn tabs_ungroup(&self, tabs: &[TabId]) -> HostResult<()> {
        self.enter(Api::TabsUngroup).await?;
        let mut state = self.state.lock();
        for &id in tabs {
            state.tab(id)?;
        }
        for &id in tabs {
            state.tab_mut(id)?.group_id = None;
        }
        state.prune_groups();
        Ok(())
    }

    async fn tabs_discard(&self, tab: TabId) -> HostResult<Tab> {
        self.enter(Api::TabsDiscard).await?;
        let mut state = self.state.lock();
        let t = state.tab_mut(tab)?;
        t.discarded = true;
        Ok(t.clone())
    }

    async fn tabs_reload(&self, tab: TabId) -> HostResult<()> {
        self.enter(Api::TabsReload).await?;
        self.state.lock().tab_mut(tab)?.discarded = false;
        Ok(())
    }

    async fn tabs_create(&self, properties: &CreateProperties) -> HostResult<Tab> {
        self.enter(Api::TabsCreate).await?;
        let mut state = self.state.lock();
        let window_id = match properties.window_id {
            Some(id) => state.window(id)?.window.id,
            None => current_window(&state)?.id,
        };
        let id = TabId::new(state.fresh_id());
        let tab = Tab { url: Some(properties.url.clone()), ..Tab::new(id, window_id) };
        state.tabs.insert(id, tab);
        state.window_mut(window_id)?.strip.push(id);
        state.reindex(window_id);
        if properties.active {
            state.activate(id)?;
        }
        state.tab(id).cloned()
    }

    async fn tabs_remove(&self, tabs: &[TabId]) -> HostResult<()> {
        self.enter(Api::TabsRemove).await?;
        let mut state = self.state.lock();
        for &id in tabs {
            state.tab(id)?;
        }
        for &id in tabs {
            if let Some(tab) = state.tabs.remove(&id) {
                state.detach(id);
                state.reindex(tab.window_id);
            }
        }
        state.prune_groups();
        Ok(())
    }

    async fn tab_groups_get(&self, group: GroupId) -> HostResult<TabGroup> {
        self.enter(Api::TabGroupsGet).await?;
        self.state.lock().group(group).cloned()
    }

    async fn tab_groups_update(
        &self,
        group: GroupId,
        update: &GroupUpdate,
    ) -> HostResult<TabGroup> {
        self.enter(Api::TabGroupsUpdate).await?;
        let mut state = self.state.lock();
        let group = state.groups.iter_mut().find(|g| g.id == group).ok_or_else(|| no_group(group))?;
        if let Some(collapsed) = update.collapsed {
            group.collapsed = collapsed;
        }
        if let Some(title) = &update.title {
            group.title = title.clone();
        }
        Ok(group.clone())
    }

    async fn tab_groups_query(&self, query: &GroupQuery) -> HostResult<Vec<TabGroup>> {
        self.enter(Api::TabGroupsQuery).await?;
        let state = self.state.lock();
        Ok(state.groups.iter().filter(|g| query.matches(g)).cloned().collect())
    }

    async fn windows_get(&self, window: WindowId) -> HostResult<Window> {
        self.enter(Api::WindowsGet).await?;
        Ok(self.state.lock().window(window)?.window.clone())
    }

    async fn windows_get_current(&self) -> HostResult<Window> {
        self.enter(Api::WindowsGetCurrent).await?;
        current_window(&self.state.lock()).cloned()
    }

    async fn windows_get_all(&self) -> HostResult<Vec<Window>> {
        self.enter(Api::WindowsGetAll).await?;
        Ok(self.state.lock().windows.iter().map(|w| w.window.clone()).collect())
    }

    async fn windows_update(&self, window: WindowId, update: &WindowUpdate) -> HostResult<Window> {
        self.enter(Api::WindowsUpdate).await?;
        let mut state = self.state.lock();
        state.window(window)?;
        if update.focused == Some(true) {
            for w in &mut state.windows {
                w.window.focused = w.window.id == window;
            }
        }
        Ok(state.window(window)?.window.clone())
    }
}

fn current_window(state: &State) -> HostResult<&Window> {
    state
        .windows
        .iter()
        .find(|w| w.window.focused)
        .or_else(|| state.windows.first())
        .map(|w| &w.window)
        .ok_or_else(|| HostError::new("No current window."))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::fixtures::{TabFixture, group, snapshot, tab};

    fn ids(raw: &[i64]) -> Vec<TabId> { raw.iter().copied().map(TabId::new).collect() }

    #[tokio::test]
    async fn grouping_makes_members_contiguous() {
        let browser = MemoryBrowser::new(snapshot(
            vec![group(100, 1, "g")],
            vec![tab(1, 1).grouped(100), tab(2, 1), tab(3, 1), tab(4, 1)],
        ));

        browser
            .tabs_group(&GroupOptions {
                tab_ids: ids(&[4]),
                group_id: Some(GroupId::new(100)),
                window_id: None,
            })
            .await
            .unwrap();

        assert_eq!(browser.strip(WindowId::new(1)), ids(&[1, 4, 2, 3]));
        assert_eq!(browser.tab(TabId::new(4)).unwrap().index, 1);
    }

    #[tokio::test]
    async fn empty_groups_disappear() {
        let browser = MemoryBrowser::new(snapshot(
            vec![group(100, 1, "g")],
            vec![tab(1, 1).grouped(100), tab(2, 1)],
        ));

        browser.tabs_ungroup(&ids(&[1])).await.unwrap();

        assert_eq!(browser.group(GroupId::new(100)), None);
        let err = browser.tab_groups_get(GroupId::new(100)).await.unwrap_err();
        assert_eq!(err.message, "No group with id: 100.");
    }

    #[tokio::test]
    async fn new_groups_get_fresh_ids() {
        let browser = MemoryBrowser::new(snapshot(vec![], vec![tab(1, 1), tab(2, 1)]));
        let group_id = browser
            .tabs_group(&GroupOptions { tab_ids: ids(&[2]), group_id: None, window_id: None })
            .await
            .unwrap();
        assert_eq!(group_id, GroupId::new(3));
        assert_eq!(browser.tab(TabId::new(2)).unwrap().group_id, Some(group_id));
    }

    #[tokio::test]
    async fn move_to_end_keeps_given_order() {
        let browser =
            MemoryBrowser::new(snapshot(vec![], vec![tab(1, 1), tab(2, 1), tab(3, 1), tab(4, 1)]));
        browser.tabs_move(&ids(&[3, 1]), MoveIndex::End).await.unwrap();
        assert_eq!(browser.strip(WindowId::new(1)), ids(&[2, 4, 3, 1]));
    }

    #[tokio::test]
    async fn activating_bumps_recency_and_wakes_the_tab() {
        let browser = MemoryBrowser::new(snapshot(
            vec![],
            vec![tab(1, 1).accessed(10).active(), tab(2, 1).accessed(5).discarded()],
        ));
        browser.tabs_update(TabId::new(2), &TabUpdate::activate()).await.unwrap();

        let woken = browser.tab(TabId::new(2)).unwrap();
        assert!(woken.active);
        assert!(!woken.discarded);
        assert!(woken.recency() > 10);
        assert!(!browser.tab(TabId::new(1)).unwrap().active);
    }

    #[tokio::test]
    async fn injected_faults_apply_once() {
        let browser = MemoryBrowser::new(snapshot(vec![], vec![tab(1, 1)]));
        browser.fail_next(Api::TabsGet, "boom");

        assert_eq!(browser.tabs_get(TabId::new(1)).await.unwrap_err().message, "boom");
        assert!(browser.tabs_get(TabId::new(1)).await.is_ok());
        assert_eq!(browser.calls(), vec![Api::TabsGet, Api::TabsGet]);
    }

    #[test]
    fn snapshot_round_trips_through_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser.ron");
        let browser = MemoryBrowser::new(snapshot(
            vec![group(100, 1, "\u{200B}NullTab")],
            vec![tab(1, 1).grouped(100).accessed(3), tab(2, 1).pinned()],
        ));

        browser.save(&path).unwrap();
        let loaded = MemoryBrowser::load(&path).unwrap();

        assert_eq!(loaded.snapshot(), browser.snapshot());
    }

    #[test]
    fn load_reads_hand_written_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser.ron");
        std::fs::write(
            &path,
            r#"(
                windows: [(id: 1, focused: true)],
                tabs: [
                    (id: 10, window_id: 1, url: Some("https://a.example")),
                    (id: 11, window_id: 1, last_accessed: Some(5)),
                ],
            )"#,
        )
        .unwrap();

        let browser = MemoryBrowser::load(&path).unwrap();
        assert_eq!(browser.strip(WindowId::new(1)), ids(&[10, 11]));
        assert_eq!(browser.tab(TabId::new(11)).unwrap().index, 1);
    }
}
