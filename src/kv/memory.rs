//! In-memory key-value store for tests and local runs

use super::{variable_key, KeyValueStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, String>),
}

/// Hub variables held in a `HashMap`
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_string(&self, hub: &str, key: &str, value: impl Into<String>) {
        self.values
            .write()
            .await
            .insert(variable_key(hub, key), Value::Scalar(value.into()));
    }

    pub async fn set_members<I, S>(&self, hub: &str, key: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = members.into_iter().map(Into::into).collect();
        self.values
            .write()
            .await
            .insert(variable_key(hub, key), Value::Set(set));
    }

    pub async fn set_map<I, K, V>(&self, hub: &str, key: &str, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.values
            .write()
            .await
            .insert(variable_key(hub, key), Value::Map(map));
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_set_as_string_slice(&self, key: &str, hub: &str) -> Result<Vec<String>> {
        let values = self.values.read().await;
        Ok(match values.get(&variable_key(hub, key)) {
            Some(Value::Set(set)) => set.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn get_map(&self, key: &str, hub: &str) -> Result<BTreeMap<String, String>> {
        let values = self.values.read().await;
        Ok(match values.get(&variable_key(hub, key)) {
            Some(Value::Map(map)) => map.clone(),
            _ => BTreeMap::new(),
        })
    }

    async fn get_string(&self, key: &str, hub: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        Ok(match values.get(&variable_key(hub, key)) {
            Some(Value::Scalar(s)) => Some(s.clone()),
            _ => None,
        })
    }
}
