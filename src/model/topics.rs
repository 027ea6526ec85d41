//! User-defined topics and which tab urls belong to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::common::collections::BTreeMap;
use crate::sys::storage::{KeyValueStore, StorageError, StorageItem, StorageKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Tab url to topic id.
pub type TabTopicAssignments = BTreeMap<String, String>;

fn topics_key() -> StorageKey { StorageKey::local("topics") }

fn assignments_item() -> StorageItem<TabTopicAssignments> {
    StorageItem::new(StorageKey::local("tabTopicAssignments"), TabTopicAssignments::new())
}

pub struct TopicStore<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> TopicStore<'a, S> {
    pub fn new(store: &'a S) -> Self { TopicStore { store } }

    /// Stored topics that still parse. Anything else under the key is
    /// skipped.
    pub async fn topics(&self) -> Result<Vec<Topic>, StorageError> {
        let items = match self.store.get(&topics_key()).await? {
            Some(Value::Array(items)) => items,
            Some(other) => {
                debug!(value = %other, "topics are not a list, ignoring");
                return Ok(vec![]);
            }
            None => return Ok(vec![]),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Topic>(item) {
                Ok(topic) => Some(topic),
                Err(e) => {
                    debug!(error = %e, "skipping malformed topic");
                    None
                }
            })
            .collect())
    }

    pub async fn save_topic(
        &self,
        name: impl Into<String>,
        color: Option<String>,
    ) -> Result<Topic, StorageError> {
        let topic = Topic { id: uuid::Uuid::new_v4().to_string(), name: name.into(), color };
        let mut topics = self.topics().await?;
        topics.push(topic.clone());
        self.write_topics(&topics).await?;
        Ok(topic)
    }

    /// Replaces the topic with the same id. Unknown ids are ignored.
    pub async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let topics: Vec<Topic> = self
            .topics()
            .await?
            .into_iter()
            .map(|t| if t.id == topic.id { topic.clone() } else { t })
            .collect();
        self.write_topics(&topics).await
    }

    /// Removes the topic along with every tab assigned to it.
    pub async fn delete_topic(&self, id: &str) -> Result<(), StorageError> {
        let topics: Vec<Topic> = self.topics().await?.into_iter().filter(|t| t.id != id).collect();
        self.write_topics(&topics).await?;

        let mut assignments = self.tab_assignments().await?;
        assignments.retain(|_, topic| topic != id);
        assignments_item().set_value(self.store, &assignments).await
    }

    pub async fn tab_assignments(&self) -> Result<TabTopicAssignments, StorageError> {
        match assignments_item().get_value(self.store).await {
            Err(StorageError::Decode { .. }) => {
                debug!("tab topic assignments are malformed, ignoring");
                Ok(TabTopicAssignments::new())
            }
            other => other,
        }
    }

    pub async fn assign_tab_to_topic(&self, url: &str, topic_id: &str) -> Result<(), StorageError> {
        let mut assignments = self.tab_assignments().await?;
        assignments.insert(url.to_string(), topic_id.to_string());
        assignments_item().set_value(self.store, &assignments).await
    }

    pub async fn remove_tab_assignment(&self, url: &str) -> Result<(), StorageError> {
        let mut assignments = self.tab_assignments().await?;
        if assignments.remove(url).is_some() {
            assignments_item().set_value(self.store, &assignments).await?;
        }
        Ok(())
    }

    async fn write_topics(&self, topics: &[Topic]) -> Result<(), StorageError> {
        let value = serde_json::to_value(topics)
            .map_err(|source| StorageError::Decode { key: topics_key(), source })?;
        self.store.set(&topics_key(), value).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::sys::storage::MemoryStore;

    #[tokio::test]
    async fn saved_topics_get_distinct_ids() {
        let store = MemoryStore::new();
        let topics = TopicStore::new(&store);

        let work = topics.save_topic("Work", Some("blue".into())).await.unwrap();
        let home = topics.save_topic("Home", None).await.unwrap();

        assert_ne!(work.id, home.id);
        assert_eq!(topics.topics().await.unwrap(), vec![work, home]);
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped() {
        let store = MemoryStore::new();
        store
            .set(
                &topics_key(),
                json!([{ "id": "a", "name": "Kept" }, { "name": "no id" }, 42]),
            )
            .await
            .unwrap();

        let topics = TopicStore::new(&store).topics().await.unwrap();
        assert_eq!(topics, vec![Topic { id: "a".into(), name: "Kept".into(), color: None }]);
    }

    #[tokio::test]
    async fn update_replaces_by_id() {
        let store = MemoryStore::new();
        let topics = TopicStore::new(&store);
        let mut topic = topics.save_topic("Reading", None).await.unwrap();

        topic.name = "Later".into();
        topics.update_topic(&topic).await.unwrap();

        assert_eq!(topics.topics().await.unwrap(), vec![topic]);
    }

    #[tokio::test]
    async fn deleting_a_topic_drops_its_assignments() {
        let store = MemoryStore::new();
        let topics = TopicStore::new(&store);
        let work = topics.save_topic("Work", None).await.unwrap();
        let home = topics.save_topic("Home", None).await.unwrap();
        topics.assign_tab_to_topic("https://a.example", &work.id).await.unwrap();
        topics.assign_tab_to_topic("https://b.example", &home.id).await.unwrap();
        topics.assign_tab_to_topic("https://c.example", &work.id).await.unwrap();

        topics.delete_topic(&work.id).await.unwrap();

        assert_eq!(topics.topics().await.unwrap(), vec![home.clone()]);
        let assignments = topics.tab_assignments().await.unwrap();
        assert_eq!(
            assignments.into_iter().collect::<Vec<_>>(),
            vec![("https://b.example".to_string(), home.id)]
        );
    }

    #[tokio::test]
    async fn assignments_can_be_removed() {
        let store = MemoryStore::new();
        let topics = TopicStore::new(&store);
        topics.assign_tab_to_topic("https://a.example", "t1").await.unwrap();

        topics.remove_tab_assignment("https://a.example").await.unwrap();
        topics.remove_tab_assignment("https://never.example").await.unwrap();

        assert!(topics.tab_assignments().await.unwrap().is_empty());
    }
}
