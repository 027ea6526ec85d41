use std::sync::mpsc::{SyncSender, sync_channel};

use tracing::instrument;

use super::{Event, TabService, TabServiceHandle};
use crate::common::error::{Error, Result};
use crate::model::server::WindowData;
use crate::model::tab::TabGroup;
use crate::sys::browser::{Api, Browser, GroupQuery, TabQuery};
use crate::sys::storage::KeyValueStore;

#[derive(Debug)]
pub enum QueryRequest {
    Windows(SyncSender<Result<Vec<WindowData>>>),
    MainGroup(SyncSender<Result<Option<TabGroup>>>),
}

impl TabServiceHandle {
    fn send_query<T>(
        &self,
        build: impl FnOnce(SyncSender<Result<T>>) -> QueryRequest,
    ) -> Result<T> {
        let (tx, rx) = sync_channel(1);
        if self.sender.try_send(Event::Query(build(tx))).is_err() {
            return Err(Error::ServiceStopped);
        }
        rx.recv().map_err(|_| Error::ServiceStopped)?
    }

    pub fn query_windows(&self) -> Result<Vec<WindowData>> {
        self.send_query(QueryRequest::Windows)
    }

    pub fn query_main_group(&self) -> Result<Option<TabGroup>> {
        self.send_query(QueryRequest::MainGroup)
    }
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    pub(super) async fn handle_query_request(&self, req: QueryRequest) {
        match req {
            QueryRequest::Windows(resp) => {
                let _ = resp.send(self.query_windows().await);
            }
            QueryRequest::MainGroup(resp) => {
                let _ = resp.send(self.resolve_main_group().await);
            }
        }
    }

    /// Every window with its tabs and groups, for rendering.
    #[instrument(skip(self))]
    pub async fn query_windows(&self) -> Result<Vec<WindowData>> {
        let main = self.resolve_main_group().await?.map(|g| g.id);
        let windows = self.call(Api::WindowsGetAll, self.browser.windows_get_all()).await?;
        let tabs = self.call(Api::TabsQuery, self.browser.tabs_query(&TabQuery::default())).await?;
        let groups = self
            .call(Api::TabGroupsQuery, self.browser.tab_groups_query(&GroupQuery::default()))
            .await?;
        Ok(WindowData::collect(&windows, &tabs, &groups, main))
    }
}
