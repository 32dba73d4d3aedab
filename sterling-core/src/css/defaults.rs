use std::{collections::HashMap, sync::Arc};

use crate::css::{PropertyMap, Value};

/// Default property values per type name, plus a `*` entry shared by every type.
///
/// ```
/// use sterling_core::css::{Defaults, Value};
///
/// let mut defaults = Defaults::new();
/// defaults.set("*", "color", "black");
/// defaults.set("Button", "color", "blue");
///
/// assert_eq!(defaults.get("button", "color"), Some(&Value::from("blue")));
/// assert_eq!(defaults.get("label", "color"), Some(&Value::from("black")));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    universal: PropertyMap,
    by_type: HashMap<Arc<str>, PropertyMap>,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a default for `type_name`, or for every type when it is `*`.
    pub fn set(&mut self, type_name: &str, name: &str, value: impl Into<Value>) -> &mut Self {
        if type_name == "*" {
            self.universal.insert(name, value);
        } else {
            let key = Arc::from(type_name.to_ascii_lowercase());
            self.by_type.entry(key).or_default().insert(name, value);
        }
        self
    }

    /// The default for `name` on `type_name`, falling back to the `*` entry.
    pub fn get(&self, type_name: &str, name: &str) -> Option<&Value> {
        self.by_type
            .get(type_name.to_ascii_lowercase().as_str())
            .and_then(|map| map.get(name))
            .or_else(|| self.universal.get(name))
    }

    /// Every default that applies to `type_name`.
    pub fn for_type(&self, type_name: &str) -> PropertyMap {
        let mut merged = self.universal.clone();
        if let Some(map) = self.by_type.get(type_name.to_ascii_lowercase().as_str()) {
            merged.extend_from(map);
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.universal.is_empty() && self.by_type.values().all(PropertyMap::is_empty)
    }
}
