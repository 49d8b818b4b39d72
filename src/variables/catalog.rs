//! Declared-variable catalog
//!
//! Maps `(hub, name)` to the variable's declared type. The snapshot is
//! replaced wholesale per hub; readers never observe a half-applied update.

use super::VariableType;
use crate::error::{IngestError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Lookup of declared variable types
pub trait VariableCatalog: Send + Sync {
    /// Declared type of `name` in `hub`
    fn lookup(&self, hub: &str, name: &str) -> Option<VariableType>;

    /// Every declared variable of `hub`, sorted by name
    fn variables(&self, hub: &str) -> Vec<(String, VariableType)>;

    /// Declared type or `VariableNotFound`
    fn require(&self, hub: &str, name: &str) -> Result<VariableType> {
        self.lookup(hub, name)
            .ok_or_else(|| IngestError::VariableNotFound {
                hub: hub.to_string(),
                name: name.to_string(),
            })
    }
}

/// In-process snapshot of declared variables
#[derive(Debug, Default)]
pub struct DeclaredVariables {
    hubs: RwLock<HashMap<String, BTreeMap<String, VariableType>>>,
}

impl DeclaredVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `{hub: {name: type}}`
    pub fn from_map(hubs: HashMap<String, BTreeMap<String, VariableType>>) -> Self {
        Self {
            hubs: RwLock::new(hubs),
        }
    }

    /// Load a JSON snapshot file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("{}: {}", path.display(), e)))?;
        let hubs: HashMap<String, BTreeMap<String, VariableType>> = serde_json::from_str(&raw)
            .map_err(|e| IngestError::Config(format!("{}: {}", path.display(), e)))?;

        let count: usize = hubs.values().map(BTreeMap::len).sum();
        tracing::info!(path = %path.display(), hubs = hubs.len(), variables = count, "Loaded declared variables");

        Ok(Self::from_map(hubs))
    }

    /// Replace the declarations of one hub
    pub fn replace_hub<I, S>(&self, hub: &str, variables: I)
    where
        I: IntoIterator<Item = (S, VariableType)>,
        S: Into<String>,
    {
        let declared: BTreeMap<String, VariableType> = variables
            .into_iter()
            .map(|(name, var_type)| (name.into(), var_type))
            .collect();

        let mut hubs = self.hubs.write().unwrap_or_else(PoisonError::into_inner);
        if declared.is_empty() {
            hubs.remove(hub);
        } else {
            hubs.insert(hub.to_string(), declared);
        }
    }
}

impl VariableCatalog for DeclaredVariables {
    fn lookup(&self, hub: &str, name: &str) -> Option<VariableType> {
        let hubs = self.hubs.read().unwrap_or_else(PoisonError::into_inner);
        hubs.get(hub).and_then(|vars| vars.get(name)).copied()
    }

    fn variables(&self, hub: &str) -> Vec<(String, VariableType)> {
        let hubs = self.hubs.read().unwrap_or_else(PoisonError::into_inner);
        hubs.get(hub)
            .map(|vars| vars.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_replace() {
        let catalog = DeclaredVariables::new();
        assert!(catalog.lookup("ops", "on_call").is_none());

        catalog.replace_hub("ops", [("on_call", VariableType::Set), ("retries", VariableType::Int)]);
        assert_eq!(catalog.lookup("ops", "on_call"), Some(VariableType::Set));
        assert_eq!(catalog.lookup("dev", "on_call"), None);
        assert_eq!(
            catalog.variables("ops"),
            vec![
                ("on_call".to_string(), VariableType::Set),
                ("retries".to_string(), VariableType::Int)
            ]
        );

        catalog.replace_hub("ops", [("owners", VariableType::Map)]);
        assert!(catalog.lookup("ops", "on_call").is_none());
        assert_eq!(catalog.lookup("ops", "owners"), Some(VariableType::Map));
    }

    #[test]
    fn test_require_missing() {
        let catalog = DeclaredVariables::new();
        let err = catalog.require("ops", "ghost").unwrap_err();
        assert!(matches!(err, IngestError::VariableNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("declared-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"ops": {"on_call": "set", "enabled": "boolean"}}"#).unwrap();

        let catalog = DeclaredVariables::load_file(&path).unwrap();
        assert_eq!(catalog.lookup("ops", "enabled"), Some(VariableType::Boolean));

        std::fs::write(&path, r#"{"ops": {"x": "float"}}"#).unwrap();
        assert!(matches!(
            DeclaredVariables::load_file(&path),
            Err(IngestError::Config(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
