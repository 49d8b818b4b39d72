//! Typed variable commands
//!
//! A variable mutation is parsed against the variable's declared type, then
//! turned into a `var.<operation>` event for downstream automation to apply.
//! Reads dispatch on the same type to the matching key-value call.

pub mod catalog;

pub use catalog::{DeclaredVariables, VariableCatalog};

use crate::error::{IngestError, Result};
use crate::kv::KeyValueStore;
use crate::types::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source tag for variable mutation events
pub const SOURCE: &str = "manual_variables_api";

/// Declared type of a hub variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Int,
    Boolean,
    Set,
    Map,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Int => "int",
            VariableType::Boolean => "boolean",
            VariableType::Set => "set",
            VariableType::Map => "map",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(VariableType::String),
            "int" => Ok(VariableType::Int),
            "boolean" => Ok(VariableType::Boolean),
            "set" => Ok(VariableType::Set),
            "map" => Ok(VariableType::Map),
            other => Err(IngestError::UnsupportedVariableType(other.to_string())),
        }
    }
}

/// Mutation applied to a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Add,
    Remove,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Add => "add",
            Command::Remove => "remove",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Command::Add),
            "remove" => Ok(Command::Remove),
            other => Err(IngestError::UnsupportedCommand(other.to_string())),
        }
    }
}

/// Validates a raw mutation payload and returns its normalized form
pub type ParseFn = fn(&serde_json::Value) -> Result<serde_json::Value>;

/// Parser for `var_type` under `command`
pub fn parser(var_type: VariableType, command: Command) -> ParseFn {
    match (var_type, command) {
        (VariableType::String, _) => parse_string,
        (VariableType::Int, _) => parse_int,
        (VariableType::Boolean, _) => parse_boolean,
        (VariableType::Set, _) => parse_string_list,
        (VariableType::Map, Command::Add) => parse_string_map,
        (VariableType::Map, Command::Remove) => parse_string_list,
    }
}

/// Parser lookup by type name; unknown names are `UnsupportedVariableType`
pub fn get_parser(type_name: &str, command: Command) -> Result<ParseFn> {
    Ok(parser(type_name.parse()?, command))
}

fn parse_string(raw: &serde_json::Value) -> Result<serde_json::Value> {
    match raw {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        _ => Err(IngestError::Parse("string expected".to_string())),
    }
}

fn parse_int(raw: &serde_json::Value) -> Result<serde_json::Value> {
    let n = raw
        .as_i64()
        .map(|n| n.to_string())
        .or_else(|| raw.as_u64().map(|n| n.to_string()))
        .ok_or_else(|| IngestError::Parse("int expected".to_string()))?;
    Ok(serde_json::Value::String(n))
}

fn parse_boolean(raw: &serde_json::Value) -> Result<serde_json::Value> {
    raw.as_bool()
        .map(|b| serde_json::Value::String(b.to_string()))
        .ok_or_else(|| IngestError::Parse("boolean expected".to_string()))
}

fn parse_string_list(raw: &serde_json::Value) -> Result<serde_json::Value> {
    let items: Vec<String> = serde_json::from_value(raw.clone())
        .map_err(|_| IngestError::Parse("list expected".to_string()))?;
    Ok(serde_json::Value::from(items))
}

fn parse_string_map(raw: &serde_json::Value) -> Result<serde_json::Value> {
    let entries: serde_json::Map<String, serde_json::Value> = match raw {
        serde_json::Value::Object(map) if map.values().all(|v| v.is_string()) => map.clone(),
        _ => return Err(IngestError::Parse("map expected".to_string())),
    };
    Ok(serde_json::Value::Object(entries))
}

/// Read a variable's current value through the type-matching store call
pub async fn get_value(
    store: &dyn KeyValueStore,
    var_type: VariableType,
    key: &str,
    hub: &str,
) -> Result<serde_json::Value> {
    let value = match var_type {
        VariableType::Set => serde_json::to_value(store.get_set_as_string_slice(key, hub).await?)?,
        VariableType::Map => serde_json::to_value(store.get_map(key, hub).await?)?,
        VariableType::String | VariableType::Int | VariableType::Boolean => {
            serde_json::to_value(store.get_string(key, hub).await?)?
        }
    };
    Ok(value)
}

/// Payload of a `var.*` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMutation {
    pub variable_ref: String,
    pub data_type: VariableType,
    pub operation: Command,
    pub data: serde_json::Value,
}

impl VariableMutation {
    /// Parse `raw` against `var_type` and build the mutation
    pub fn parse(
        variable_ref: impl Into<String>,
        var_type: VariableType,
        operation: Command,
        raw: &serde_json::Value,
    ) -> Result<Self> {
        let data = parser(var_type, operation)(raw)?;
        Ok(Self {
            variable_ref: variable_ref.into(),
            data_type: var_type,
            operation,
            data,
        })
    }

    /// Canonical event for this mutation in `hub`
    pub fn into_event(self, hub: &str) -> Result<Event> {
        let name = format!("var.{}", self.operation);
        let payload = serde_json::to_value(&self)?;
        Ok(Event::new(name, SOURCE, hub, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use serde_json::json;

    fn parse(var_type: VariableType, command: Command, raw: serde_json::Value) -> Result<serde_json::Value> {
        parser(var_type, command)(&raw)
    }

    fn parse_err(var_type: VariableType, command: Command, raw: serde_json::Value) -> String {
        parse(var_type, command, raw).unwrap_err().to_string()
    }

    #[test]
    fn test_set_parser() {
        let parsed = get_parser("set", Command::Add).unwrap()(&json!(["a", "b"])).unwrap();
        assert_eq!(parsed, json!(["a", "b"]));

        assert_eq!(parse_err(VariableType::Set, Command::Add, json!("a")), "list expected");
        assert_eq!(parse_err(VariableType::Set, Command::Remove, json!({"a": 1})), "list expected");
        assert_eq!(parse_err(VariableType::Set, Command::Add, json!([1, 2])), "list expected");
    }

    #[test]
    fn test_int_parser() {
        assert_eq!(parse(VariableType::Int, Command::Add, json!(123)).unwrap(), json!("123"));
        assert_eq!(parse(VariableType::Int, Command::Add, json!(-7)).unwrap(), json!("-7"));
        assert_eq!(parse_err(VariableType::Int, Command::Add, json!("123")), "int expected");
        assert_eq!(parse_err(VariableType::Int, Command::Add, json!(1.5)), "int expected");
    }

    #[test]
    fn test_string_and_boolean_parsers() {
        assert_eq!(parse(VariableType::String, Command::Add, json!("hi")).unwrap(), json!("hi"));
        assert_eq!(parse_err(VariableType::String, Command::Add, json!(5)), "string expected");

        assert_eq!(parse(VariableType::Boolean, Command::Add, json!(true)).unwrap(), json!("true"));
        assert_eq!(parse(VariableType::Boolean, Command::Remove, json!(false)).unwrap(), json!("false"));
        assert_eq!(parse_err(VariableType::Boolean, Command::Add, json!("true")), "boolean expected");
    }

    #[test]
    fn test_map_parsers_depend_on_command() {
        let add = parse(VariableType::Map, Command::Add, json!({"db": "alice"})).unwrap();
        assert_eq!(add, json!({"db": "alice"}));
        assert_eq!(parse_err(VariableType::Map, Command::Add, json!(["db"])), "map expected");
        assert_eq!(parse_err(VariableType::Map, Command::Add, json!({"db": 1})), "map expected");

        let remove = parse(VariableType::Map, Command::Remove, json!(["db"])).unwrap();
        assert_eq!(remove, json!(["db"]));
        assert_eq!(parse_err(VariableType::Map, Command::Remove, json!({"db": "x"})), "list expected");
    }

    #[test]
    fn test_unsupported_type_and_command() {
        assert!(matches!(
            get_parser("float", Command::Add),
            Err(IngestError::UnsupportedVariableType(t)) if t == "float"
        ));
        assert!(matches!(
            "upsert".parse::<Command>(),
            Err(IngestError::UnsupportedCommand(_))
        ));
    }

    #[test]
    fn test_mutation_event() {
        let mutation =
            VariableMutation::parse("on_call", VariableType::Set, Command::Add, &json!(["bob"])).unwrap();
        let event = mutation.into_event("ops").unwrap();

        assert_eq!(event.name, "var.add");
        assert_eq!(event.source, "manual_variables_api");
        assert_eq!(event.hub_name, "ops");
        assert_eq!(
            event.payload,
            json!({"variableRef": "on_call", "dataType": "set", "operation": "add", "data": ["bob"]})
        );
        assert!(event.validate().is_ok());
    }

    #[tokio::test]
    async fn test_get_value_dispatch() {
        let store = MemoryKeyValueStore::new();
        store.set_members("ops", "on_call", ["bob"]).await;
        store.set_map("ops", "owners", [("db", "alice")]).await;
        store.set_string("ops", "retries", "3").await;

        assert_eq!(
            get_value(&store, VariableType::Set, "on_call", "ops").await.unwrap(),
            json!(["bob"])
        );
        assert_eq!(
            get_value(&store, VariableType::Map, "owners", "ops").await.unwrap(),
            json!({"db": "alice"})
        );
        assert_eq!(
            get_value(&store, VariableType::Int, "retries", "ops").await.unwrap(),
            json!("3")
        );
        assert_eq!(
            get_value(&store, VariableType::String, "missing", "ops").await.unwrap(),
            serde_json::Value::Null
        );
    }
}
