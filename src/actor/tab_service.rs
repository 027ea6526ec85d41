//! The tab service owns every change NullTab makes to the browser.
//!
//! Commands arrive over a channel and are handled one at a time on the
//! service's own thread, so two switches requested in quick succession can
//! never interleave their browser calls. After each command a
//! [`BroadcastEvent::TabsChanged`] tells views to read the tab state again.

mod discard;
mod locator;
mod manage;
mod query;
mod switch;

#[cfg(test)]
mod testing;


use std::future::Future;
use std::io;
use std::sync::mpsc::{SyncSender, sync_channel};
use std::thread;

pub use discard::DiscardReport;
pub use locator::{GroupLookup, main_group_pointer};
pub use manage::DashboardOutcome;
pub use query::QueryRequest;
use serde::{Deserialize, Serialize};
pub use switch::{SwitchOutcome, SwitchTab};
use tracing::{Instrument, debug, error, instrument, warn};

use crate::actor;
use crate::actor::broadcast::{BroadcastEvent, BroadcastReceiver, BroadcastSender};
use crate::common::config::Settings;
use crate::common::error::{Error, Result};
use crate::model::tab::{GroupId, TabId, WindowId};
use crate::sys::browser::{Api, Browser, HostResult};
use crate::sys::storage::{KeyValueStore, StorageError};

pub type Sender = actor::Sender<Event>;
type Receiver = actor::Receiver<Event>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Switch with the main group and window supplied by the caller.
    SwitchTab(SwitchTab),
    /// Switch after resolving the main group ourselves.
    SwitchTabManaged(TabId),
    ManageWindow(WindowId),
    SuspendStaleTabs,
    SuspendGroupedTabs,
    OpenDashboard,
    CloseTabs(Vec<TabId>),
}

#[derive(Debug)]
pub enum CommandResponse {
    Switched(SwitchOutcome),
    Managed(Option<GroupId>),
    Suspended(DiscardReport),
    Dashboard(DashboardOutcome),
    Closed,
    /// The browser refused the edit because the user was interacting with
    /// the tab strip. Nothing was retried.
    Skipped,
}

#[derive(Debug)]
pub enum Event {
    Command(Command, Option<SyncSender<Result<CommandResponse>>>),
    Query(QueryRequest),
}

pub struct TabService<B, S> {
    browser: B,
    store: S,
    settings: Settings,
    broadcast_tx: BroadcastSender,
}

#[derive(Clone)]
pub struct TabServiceHandle {
    sender: Sender,
    broadcast_tx: BroadcastSender,
}

impl TabServiceHandle {
    pub fn sender(&self) -> Sender { self.sender.clone() }

    /// Queues `command` without waiting for it. Failures are only logged.
    pub fn send(&self, command: Command) { self.sender.send(Event::Command(command, None)) }

    /// Runs `command` and blocks until the service has handled it.
    pub fn execute(&self, command: Command) -> Result<CommandResponse> {
        let (tx, rx) = sync_channel(1);
        if self.sender.try_send(Event::Command(command, Some(tx))).is_err() {
            return Err(Error::ServiceStopped);
        }
        rx.recv().map_err(|_| Error::ServiceStopped)?
    }

    pub fn switch_tab(&self, request: SwitchTab) -> Result<CommandResponse> {
        self.execute(Command::SwitchTab(request))
    }

    pub fn switch_tab_managed(&self, tab: TabId) -> Result<CommandResponse> {
        self.execute(Command::SwitchTabManaged(tab))
    }

    pub fn manage_window(&self, window: WindowId) -> Result<CommandResponse> {
        self.execute(Command::ManageWindow(window))
    }

    pub fn subscribe(&self) -> BroadcastReceiver { self.broadcast_tx.subscribe() }
}

impl<B, S> TabService<B, S>
where
    B: Browser + Send + 'static,
    S: KeyValueStore + Send + 'static,
{
    /// Starts the service on a thread of its own. The thread exits once
    /// every handle is dropped.
    pub fn spawn(
        browser: B,
        store: S,
        settings: Settings,
        broadcast_tx: BroadcastSender,
    ) -> io::Result<TabServiceHandle> {
        let (sender, events) = actor::channel();
        let service = TabService::new(browser, store, settings, broadcast_tx.clone());
        thread::Builder::new().name("tab-service".to_string()).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "could not start the tab service runtime");
                    return;
                }
            };
            runtime.block_on(service.run(events));
        })?;
        Ok(TabServiceHandle { sender, broadcast_tx })
    }
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    pub fn new(browser: B, store: S, settings: Settings, broadcast_tx: BroadcastSender) -> Self {
        TabService { browser, store, settings, broadcast_tx }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    async fn run(self, mut events: Receiver) {
        while let Some((span, event)) = events.recv().await {
            self.handle_event(event).instrument(span).await;
        }
        debug!("all tab service handles dropped, stopping");
    }

    async fn handle_event(&self, event: Event) {
        match event {
            Event::Command(command, resp) => {
                let result = self.handle_command(command).await;
                match resp {
                    Some(resp) => {
                        let _ = resp.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!(error = %e, "command failed");
                        }
                    }
                }
            }
            Event::Query(req) => self.handle_query_request(req).await,
        }
    }

    #[instrument(name = "tab_service::handle_command", skip(self))]
    pub async fn handle_command(&self, command: Command) -> Result<CommandResponse> {
        let result = match command {
            Command::SwitchTab(request) => {
                self.switch_tab(request).await.map(CommandResponse::Switched)
            }
            Command::SwitchTabManaged(tab) => {
                self.switch_tab_managed(tab).await.map(CommandResponse::Switched)
            }
            Command::ManageWindow(window) => {
                let managed = self.manage_window(window).await;
                if let Ok(Some(group)) = &managed {
                    let _ = self.broadcast_tx.send(BroadcastEvent::MainGroupChanged(Some(*group)));
                }
                managed.map(CommandResponse::Managed)
            }
            Command::SuspendStaleTabs => {
                self.suspend_stale_tabs().await.map(CommandResponse::Suspended)
            }
            Command::SuspendGroupedTabs => {
                self.suspend_grouped_tabs().await.map(CommandResponse::Suspended)
            }
            Command::OpenDashboard => self.open_dashboard().await.map(CommandResponse::Dashboard),
            Command::CloseTabs(tabs) => {
                self.close_tabs(&tabs).await.map(|()| CommandResponse::Closed)
            }
        };
        // Even a failed command may have changed something before it stopped.
        let _ = self.broadcast_tx.send(BroadcastEvent::TabsChanged);

        match result {
            Err(e) if e.is_host_busy() && self.settings.swallow_host_busy => {
                debug!(error = %e, "browser is busy, dropping command");
                Ok(CommandResponse::Skipped)
            }
            other => other,
        }
    }

    /// Awaits a browser call, giving up after the configured timeout.
    async fn call<T>(&self, api: Api, call: impl Future<Output = HostResult<T>>) -> Result<T> {
        let after = self.settings.host_call_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => {
                warn!(%api, ?after, "browser call timed out");
                Err(Error::Timeout { call: api, after })
            }
        }
    }

    /// Like [`Self::call`], for the extension storage.
    async fn stored<T>(
        &self,
        api: Api,
        call: impl Future<Output = std::result::Result<T, StorageError>>,
    ) -> Result<T> {
        let after = self.settings.host_call_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(%api, ?after, "storage call timed out");
                Err(Error::Timeout { call: api, after })
            }
        }
    }
}
