use tracing::{debug, info, instrument, warn};

use super::TabService;
use crate::common::error::Result;
use crate::model::tab::{GroupId, TabGroup};
use crate::sys::browser::{Api, Browser, GroupQuery};
use crate::sys::storage::{KeyValueStore, StorageItem, StorageKey};

/// Where the main group id is cached between commands.
pub fn main_group_pointer() -> StorageItem<Option<GroupId>> {
    StorageItem::new(StorageKey::local("mainTabGroupId"), None)
}

/// How the main group is looked up. `ByTitleScan` is the recovery path for
/// when the cached id is missing or stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLookup {
    ById(GroupId),
    ByTitleScan(String),
}

impl<B: Browser, S: KeyValueStore> TabService<B, S> {
    /// Finds the managed group, repairing the cached pointer on the way.
    #[instrument(skip(self))]
    pub async fn resolve_main_group(&self) -> Result<Option<TabGroup>> {
        let pointer = main_group_pointer();
        let cached = self.stored(Api::StorageGet, pointer.get_value(&self.store)).await?;

        if let Some(id) = cached {
            if let Some(group) = self.lookup(&GroupLookup::ById(id)).await? {
                return Ok(Some(group));
            }
            debug!(%id, "cached main group is gone, clearing the pointer");
            let cleared =
                self.stored(Api::StorageSet, pointer.replace(&self.store, &cached, &None)).await?;
            if !cleared {
                debug!("pointer was rewritten concurrently, leaving it");
            }
        }

        let lookup = GroupLookup::ByTitleScan(self.settings.group_title());
        let Some(group) = self.lookup(&lookup).await? else {
            debug!("no main group exists yet");
            return Ok(None);
        };
        let cached = self
            .stored(Api::StorageSet, pointer.replace(&self.store, &None, &Some(group.id)))
            .await?;
        if cached {
            info!(id = %group.id, "recovered main group by title");
        }
        Ok(Some(group))
    }

    async fn lookup(&self, lookup: &GroupLookup) -> Result<Option<TabGroup>> {
        match lookup {
            GroupLookup::ById(id) => {
                match self.call(Api::TabGroupsGet, self.browser.tab_groups_get(*id)).await {
                    Ok(group) => Ok(Some(group)),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            }
            GroupLookup::ByTitleScan(title) => {
                let query = GroupQuery::titled(title.clone());
                let mut groups =
                    self.call(Api::TabGroupsQuery, self.browser.tab_groups_query(&query)).await?;
                if groups.len() > 1 {
                    let ignored: Vec<GroupId> = groups[1..].iter().map(|g| g.id).collect();
                    warn!(
                        used = %groups[0].id,
                        ?ignored,
                        "several groups carry the main group title"
                    );
                }
                Ok(if groups.is_empty() { None } else { Some(groups.swap_remove(0)) })
            }
        }
    }
}
