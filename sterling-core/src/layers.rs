//! Per-object property storage built from named layers.
//!
//! A [`PropertyLayerStore`] holds an ordered stack of layers. The effective value of a property is
//! taken from the highest layer that defines it. The [`USER_LAYER`] sits above everything else once it
//! exists, so values written with [`set`](PropertyLayerStore::set) beat anything a stylesheet provides
//! until they are [`delete`](PropertyLayerStore::delete)d again.

use std::{collections::HashMap, fmt, sync::Arc};

use crate::css::{PropertyMap, Value};

/// Layer that receives [`PropertyLayerStore::set`] writes.
pub const USER_LAYER: &str = "user";

/// Handle returned by [`PropertyLayerStore::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

type WatchFn = dyn FnMut(&str, Option<&Value>) + Send;

/// Layered property values for one styled object.
///
/// ```
/// use sterling_core::{css::{PropertyMap, Value}, layers::PropertyLayerStore};
///
/// let mut store = PropertyLayerStore::new();
/// store.add_layer("base", PropertyMap::from_iter([("width", 10)]));
/// store.set("width", 20);
/// assert_eq!(store.get("width"), Some(&Value::Int(20)));
///
/// store.delete("width");
/// assert_eq!(store.get("width"), Some(&Value::Int(10)));
/// ```
#[derive(Default)]
pub struct PropertyLayerStore {
    /// Lowest priority first. The user layer, if present, is always last.
    layers: Vec<(Arc<str>, PropertyMap)>,
    values: PropertyMap,
    watchers: HashMap<Arc<str>, Vec<(WatchId, Box<WatchFn>)>>,
    next_watch: u64,
}

impl fmt::Debug for PropertyLayerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyLayerStore")
            .field("layers", &self.layers)
            .field("values", &self.values)
            .field("watchers", &self.watchers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl PropertyLayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective value of `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Writes `name` into the user layer.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let name: Arc<str> = Arc::from(name);
        self.user_layer_mut().insert(Arc::clone(&name), value);
        self.recompute([name]);
    }

    /// Removes `name` from the user layer, letting the other layers show through again.
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        let (_, user) = self.layers.last_mut().filter(|(layer, _)| layer.as_ref() == USER_LAYER)?;
        let removed = user.remove(name)?;
        self.recompute([Arc::from(name)]);
        Some(removed)
    }

    /// Inserts a layer, or replaces the contents of an existing one.
    ///
    /// A new layer goes below the user layer. Replacing a layer keeps its position.
    pub fn add_layer(&mut self, name: &str, properties: PropertyMap) {
        let mut keys: Vec<Arc<str>> = properties.keys().cloned().collect();

        match self.layers.iter().position(|(layer, _)| layer.as_ref() == name) {
            Some(idx) => {
                let old = std::mem::replace(&mut self.layers[idx].1, properties);
                keys.extend(old.keys().cloned());
            }
            None => {
                let position = match self.layers.last() {
                    Some((last, _)) if last.as_ref() == USER_LAYER && name != USER_LAYER => self.layers.len() - 1,
                    _ => self.layers.len(),
                };
                self.layers.insert(position, (Arc::from(name), properties));
            }
        }

        self.recompute(keys);
    }

    /// Drops a layer. Properties it defined fall back to lower layers, or disappear.
    pub fn remove_layer(&mut self, name: &str) -> Option<PropertyMap> {
        let position = self.layers.iter().position(|(layer, _)| layer.as_ref() == name)?;
        let (_, removed) = self.layers.remove(position);
        self.recompute(removed.keys().cloned().collect::<Vec<_>>());
        Some(removed)
    }

    pub fn layer(&self, name: &str) -> Option<&PropertyMap> {
        self.layers.iter().find(|(layer, _)| layer.as_ref() == name).map(|(_, props)| props)
    }

    /// Layer names, lowest priority first.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(layer, _)| layer.as_ref())
    }

    /// Effective values.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.values.iter()
    }

    /// Calls `callback` with the new effective value whenever the value of `name` changes.
    pub fn watch(&mut self, name: &str, callback: impl FnMut(&str, Option<&Value>) + Send + 'static) -> WatchId {
        let id = WatchId(self.next_watch);
        self.next_watch += 1;
        self.watchers.entry(Arc::from(name)).or_default().push((id, Box::new(callback)));
        id
    }

    pub fn unwatch(&mut self, id: WatchId) -> bool {
        let mut found = false;
        self.watchers.retain(|_, callbacks| {
            let before = callbacks.len();
            callbacks.retain(|(watch, _)| *watch != id);
            found |= callbacks.len() != before;
            !callbacks.is_empty()
        });
        found
    }

    /// Recomputes every effective value from the layers.
    pub fn refresh(&mut self) {
        let mut keys: Vec<Arc<str>> = self.values.keys().cloned().collect();
        for (_, props) in &self.layers {
            keys.extend(props.keys().cloned());
        }
        self.recompute(keys);
    }

    fn user_layer_mut(&mut self) -> &mut PropertyMap {
        let has_user = self.layers.last().is_some_and(|(layer, _)| layer.as_ref() == USER_LAYER);
        if !has_user {
            self.layers.push((Arc::from(USER_LAYER), PropertyMap::new()));
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last].1
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        self.layers.iter().rev().find_map(|(_, props)| props.get(name)).cloned()
    }

    fn recompute(&mut self, keys: impl IntoIterator<Item = Arc<str>>) {
        let mut keys: Vec<Arc<str>> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        for key in keys {
            let new = self.resolve(&key);
            let unchanged = match (self.values.get(&key), &new) {
                (Some(old), Some(new)) => old.is_identical(new),
                (old, new) => old.is_none() && new.is_none(),
            };
            if unchanged {
                continue;
            }

            match &new {
                Some(value) => {
                    self.values.insert(Arc::clone(&key), value.clone());
                }
                None => {
                    self.values.remove(&key);
                }
            }

            if let Some(callbacks) = self.watchers.get_mut(&key) {
                for (_, callback) in callbacks.iter_mut() {
                    callback(&key, new.as_ref());
                }
            }
        }
    }
}
