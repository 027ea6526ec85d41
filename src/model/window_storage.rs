use crate::model::tab::WindowId;
use crate::sys::storage::{KeyValueStore, StorageError, StorageItem, StorageKey};

fn managed_windows_item() -> StorageItem<Vec<WindowId>> {
    StorageItem::new(StorageKey::local("managedWindows"), vec![])
}

/// Windows the user handed over to the tab service.
pub struct WindowStorage<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> WindowStorage<'a, S> {
    pub fn new(store: &'a S) -> Self { WindowStorage { store } }

    pub async fn save_managed_window(&self, window: WindowId) -> Result<(), StorageError> {
        let mut windows = self.managed_windows().await?;
        if !windows.contains(&window) {
            windows.push(window);
            managed_windows_item().set_value(self.store, &windows).await?;
        }
        Ok(())
    }

    pub async fn managed_windows(&self) -> Result<Vec<WindowId>, StorageError> {
        managed_windows_item().get_value(self.store).await
    }

    pub async fn remove_managed_window(&self, window: WindowId) -> Result<(), StorageError> {
        let mut windows = self.managed_windows().await?;
        let before = windows.len();
        windows.retain(|&w| w != window);
        let item = managed_windows_item();
        if windows.is_empty() {
            item.remove_value(self.store).await?;
        } else if windows.len() != before {
            item.set_value(self.store, &windows).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::storage::MemoryStore;

    #[tokio::test]
    async fn managed_windows_are_a_set() {
        let store = MemoryStore::new();
        let windows = WindowStorage::new(&store);

        windows.save_managed_window(WindowId::new(1)).await.unwrap();
        windows.save_managed_window(WindowId::new(2)).await.unwrap();
        windows.save_managed_window(WindowId::new(1)).await.unwrap();
        assert_eq!(windows.managed_windows().await.unwrap(), vec![
            WindowId::new(1),
            WindowId::new(2)
        ]);

        windows.remove_managed_window(WindowId::new(1)).await.unwrap();
        assert_eq!(windows.managed_windows().await.unwrap(), vec![WindowId::new(2)]);
    }

    #[tokio::test]
    async fn removing_the_last_window_drops_the_key() {
        let store = MemoryStore::new();
        let windows = WindowStorage::new(&store);
        windows.save_managed_window(WindowId::new(3)).await.unwrap();

        windows.remove_managed_window(WindowId::new(3)).await.unwrap();

        assert_eq!(store.get(managed_windows_item().key()).await.unwrap(), None);
        assert!(windows.managed_windows().await.unwrap().is_empty());
    }
}
