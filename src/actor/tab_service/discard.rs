use tracing::{debug, instrument, warn};

use super::TabService;
use crate::common::error::{Error, Result};
use crate::model::tab::{Tab, TabId, now_millis};
use crate::sys::browser::{Api, Browser, TabQuery};
use crate::sys::storage::KeyValueStore;

/// What a bulk discard did. One tab failing does not stop the others.
#[derive(Debug, Default)]
pub struct DiscardReport {
    pub discarded: Vec<TabId>,
    pub failed: Vec<(TabId, Error)>,
}

impl DiscardReport {
    pub fn is_complete(&self) -> bool { self.failed.is_empty() }
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    /// Discards tabs in the main group that have not been used for
    /// `stale_after`.
    #[instrument(skip(self))]
    pub async fn suspend_stale_tabs(&self) -> Result<DiscardReport> {
        let now = now_millis();
        let idle = self.settings.stale_after;
        self.discard_main_group(|tab| tab.is_stale(now, idle)).await
    }

    /// Discards every loaded tab in the main group.
    #[instrument(skip(self))]
    pub async fn suspend_grouped_tabs(&self) -> Result<DiscardReport> {
        self.discard_main_group(|tab| !tab.discarded).await
    }

    async fn discard_main_group(&self, select: impl Fn(&Tab) -> bool) -> Result<DiscardReport> {
        let Some(group) = self.resolve_main_group().await? else {
            debug!("no main group, nothing to discard");
            return Ok(DiscardReport::default());
        };
        let query = TabQuery::in_group(group.id);
        let tabs = self.call(Api::TabsQuery, self.browser.tabs_query(&query)).await?;

        let mut report = DiscardReport::default();
        for tab in tabs.iter().filter(|t| select(t)) {
            match self.call(Api::TabsDiscard, self.browser.tabs_discard(tab.id)).await {
                Ok(_) => report.discarded.push(tab.id),
                Err(e) => {
                    warn!(tab = %tab.id, error = %e, "could not discard tab");
                    report.failed.push((tab.id, e));
                }
            }
        }
        debug!(discarded = report.discarded.len(), failed = report.failed.len(), "discard done");
        Ok(report)
    }
}
