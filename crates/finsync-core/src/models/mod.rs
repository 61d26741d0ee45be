use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub mod period;

/// The full client state, as returned by reads and accepted by writes.
///
/// It is a view over the store: built fresh for every read and never
/// persisted as a unit. `subcategories` and `bankAccounts` may be absent
/// or `null` in a submitted body and default to empty containers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateState {
    pub periods: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subcategories: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bank_accounts: Vec<Value>,
}

impl AggregateState {
    /// The stored document for `key`, i.e. the section wrapped in its field.
    pub fn config_document(&self, key: ConfigKey) -> Value {
        let section = match key {
            ConfigKey::Subcategories => Value::Object(self.subcategories.clone()),
            ConfigKey::BankAccounts => Value::Array(self.bank_accounts.clone()),
        };
        key.wrap(section)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keyed configuration documents.
///
/// Each variant owns exactly one row in the config table. The numeric ids
/// are part of the persisted layout and must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    Subcategories,
    BankAccounts,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 2] = [ConfigKey::Subcategories, ConfigKey::BankAccounts];

    pub fn storage_id(self) -> i32 {
        match self {
            ConfigKey::Subcategories => 1,
            ConfigKey::BankAccounts => 2,
        }
    }

    /// Name of the wrapper field inside the stored document.
    pub fn field(self) -> &'static str {
        match self {
            ConfigKey::Subcategories => "subcategories",
            ConfigKey::BankAccounts => "bankAccounts",
        }
    }

    pub fn wrap(self, section: Value) -> Value {
        let mut wrapper = Map::new();
        wrapper.insert(self.field().to_string(), section);
        Value::Object(wrapper)
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}
