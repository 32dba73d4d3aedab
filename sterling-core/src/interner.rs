//! String interner shared by selectors and identities.
//!
//! Selector matching compares type names, ids and classes by [`StrId`] instead of by string,
//! so both the parser and [`Identity`](crate::css::Identity) construction go through the same table.

use std::fmt::{self, Display};
use std::sync::OnceLock;
use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

static STRING_INTERNER: OnceLock<RwLock<StringInterner>> = OnceLock::new();

/// An identifier for an interned string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrId(pub(crate) u32);

impl StrId {
    /// Interns `name` in the global table.
    pub fn new(name: &str) -> Self {
        if let Some(id) = StringInterner::global().read().lookup(name) {
            return id;
        }
        StringInterner::global().write().intern(name)
    }

    /// Returns the interned text.
    pub fn as_str(self) -> Arc<str> {
        StringInterner::global().read().get(self).unwrap_or_else(|| Arc::from(""))
    }
}

impl Display for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = StringInterner::global().read().get(*self).ok_or(fmt::Error)?;
        f.write_str(string.as_ref())
    }
}

/// Interns strings into small integer ids.
#[derive(Debug, Default)]
pub struct StringInterner {
    map: HashMap<Arc<str>, StrId>,
    rev: Vec<Arc<str>>,
}

impl StringInterner {
    /// Creates a new string interner.
    pub fn new() -> Self {
        Self {
            map: HashMap::with_capacity(128),
            rev: Vec::with_capacity(128),
        }
    }

    /// Returns the global string interner, initializing it if needed.
    pub fn global() -> &'static RwLock<StringInterner> {
        STRING_INTERNER.get_or_init(|| RwLock::new(StringInterner::new()))
    }

    /// Returns an existing id or assigns a new one.
    pub fn intern(&mut self, name: &str) -> StrId {
        if let Some(id) = self.lookup(name) {
            return id;
        }

        let id = StrId(u32::try_from(self.rev.len()).unwrap_or(u32::MAX));

        let arc: Arc<str> = Arc::from(name);
        self.rev.push(Arc::clone(&arc));
        self.map.insert(arc, id);

        id
    }

    /// Returns the id of an already interned string.
    pub fn lookup(&self, name: &str) -> Option<StrId> {
        self.map.get(name).copied()
    }

    /// Get the interned string for an id, if it exists.
    pub fn get(&self, id: StrId) -> Option<Arc<str>> {
        self.rev.get(id.0 as usize).cloned()
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.rev.len()
    }

    /// Returns `true` if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.rev.is_empty()
    }
}
