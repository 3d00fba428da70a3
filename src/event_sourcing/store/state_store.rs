use std::collections::HashMap;
use std::marker::PhantomData;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

// ============================================================================
// State Store - latest snapshot per key
// ============================================================================
//
// Backing store for value entities: each key maps to the full current state,
// last write wins. Snapshots are held serialized, like the event store.
//
// ============================================================================

pub struct StateStore<S> {
    name: String,
    snapshots: RwLock<HashMap<String, String>>,
    _phantom: PhantomData<S>,
}

impl<S> StateStore<S>
where
    S: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            snapshots: RwLock::new(HashMap::new()),
            _phantom: PhantomData,
        }
    }

    pub async fn load(&self, key: &str) -> Result<Option<S>> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(key)
            .map(|json| serde_json::from_str(json).map_err(anyhow::Error::from))
            .transpose()
    }

    pub async fn save(&self, key: &str, state: &S) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.snapshots.write().await.insert(key.to_string(), json);

        tracing::debug!(store = %self.name, key = %key, "Saved state snapshot");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.snapshots.write().await.remove(key).is_some())
    }

    /// Store an unchecked snapshot, e.g. one no current schema can read
    #[cfg(test)]
    pub(crate) async fn save_raw(&self, key: &str, json: &str) {
        self.snapshots.write().await.insert(key.to_string(), json.to_string());
    }

    /// All snapshots, sorted by key
    pub async fn load_all(&self) -> Result<Vec<(String, S)>> {
        let snapshots = self.snapshots.read().await;
        let mut all = snapshots
            .iter()
            .map(|(key, json)| -> Result<(String, S)> { Ok((key.clone(), serde_json::from_str(json)?)) })
            .collect::<Result<Vec<_>>>()?;
        all.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        value: u32,
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = StateStore::<Snapshot>::new("test");
        assert_eq!(store.load("k").await.unwrap(), None);

        store.save("k", &Snapshot { value: 1 }).await.unwrap();
        store.save("k", &Snapshot { value: 2 }).await.unwrap();

        assert_eq!(store.load("k").await.unwrap(), Some(Snapshot { value: 2 }));
    }

    #[tokio::test]
    async fn test_delete_and_load_all() {
        let store = StateStore::<Snapshot>::new("test");
        store.save("b", &Snapshot { value: 2 }).await.unwrap();
        store.save("a", &Snapshot { value: 1 }).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
