//! Conversion of raw declaration text into typed [`Value`]s.
//!
//! A [`FilterChain`] tries each filter in order. A filter that doesn't recognise the text returns
//! [`FilterError::Rejected`] and the next one gets a go. A filter that fails any other way (or panics)
//! is logged and dropped from the chain for good. When nothing claims the text it is kept as a string.

use std::{
    collections::HashMap,
    error,
    fmt::{self, Display},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::error;

use crate::css::Value;

/// Why a filter did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The text isn't something this filter handles.
    Rejected,
    /// The filter is broken; it will be removed from the chain.
    Failed(String),
}

impl error::Error for FilterError {}
impl Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Rejected => f.write_str("value rejected by filter"),
            FilterError::Failed(reason) => write!(f, "filter failed: {reason}"),
        }
    }
}

type FilterFn = dyn Fn(&str) -> Result<Value, FilterError> + Send + Sync;

/// A named conversion function.
#[derive(Clone)]
pub struct Filter {
    name: Arc<str>,
    func: Arc<FilterFn>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Filter {
    pub fn new(name: &str, func: impl Fn(&str) -> Result<Value, FilterError> + Send + Sync + 'static) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, raw: &str) -> Result<Value, FilterError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.func)(raw))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panicked".to_string());
                Err(FilterError::Failed(reason))
            }
        }
    }
}

/// Integers, or finite floats when the text contains a `.`.
pub fn number_filter(raw: &str) -> Result<Value, FilterError> {
    if raw.contains('.') {
        match raw.parse::<f64>() {
            Ok(float) if float.is_finite() => Ok(Value::Float(float)),
            _ => Err(FilterError::Rejected),
        }
    } else {
        raw.parse::<i64>().map(Value::Int).map_err(|_| FilterError::Rejected)
    }
}

/// `true` / `false`, any case.
pub fn bool_filter(raw: &str) -> Result<Value, FilterError> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(Value::Bool(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(Value::Bool(false))
    } else {
        Err(FilterError::Rejected)
    }
}

/// Ordered, self-pruning list of value filters.
#[derive(Debug, Clone)]
pub struct FilterChain {
    filters: Vec<Filter>,
    /// Filters that only apply to a single property, tried before `filters`.
    by_property: HashMap<Arc<str>, Vec<Filter>>,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterChain {
    /// A chain with the number and boolean filters.
    pub fn new() -> Self {
        Self {
            filters: vec![Filter::new("number", number_filter), Filter::new("bool", bool_filter)],
            by_property: HashMap::new(),
        }
    }

    /// A chain with no filters at all; every value stays a string.
    pub fn empty() -> Self {
        Self {
            filters: Vec::new(),
            by_property: HashMap::new(),
        }
    }

    /// Appends a filter to the global chain.
    pub fn add(&mut self, filter: Filter) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Registers a filter that only runs for declarations named `property`.
    pub fn register_property(&mut self, property: &str, filter: Filter) -> &mut Self {
        self.by_property.entry(Arc::from(property)).or_default().push(filter);
        self
    }

    /// Names of the global filters still in the chain.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(Filter::name)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Converts `raw` using only the global filters.
    pub fn convert(&mut self, raw: &str) -> Value {
        Self::run(&mut self.filters, raw).unwrap_or_else(|| Value::from(raw))
    }

    /// Converts the value of the declaration `property: raw`.
    pub fn convert_property(&mut self, property: &str, raw: &str) -> Value {
        if let Some(filters) = self.by_property.get_mut(property) {
            let converted = Self::run(filters, raw);
            if filters.is_empty() {
                self.by_property.remove(property);
            }
            if let Some(value) = converted {
                return value;
            }
        }
        self.convert(raw)
    }

    // Broken filters are only marked while walking and compacted afterwards,
    // so a removal never shifts the filters still to be tried.
    fn run(filters: &mut Vec<Filter>, raw: &str) -> Option<Value> {
        let mut broken: Vec<usize> = Vec::new();
        let mut converted = None;

        for (idx, filter) in filters.iter().enumerate() {
            match filter.call(raw) {
                Ok(value) => {
                    converted = Some(value);
                    break;
                }
                Err(FilterError::Rejected) => {}
                Err(FilterError::Failed(reason)) => {
                    error!("CSS filter '{}' died with the error '{reason}', removed from filter list", filter.name);
                    broken.push(idx);
                }
            }
        }

        if !broken.is_empty() {
            let mut idx = 0;
            filters.retain(|_| {
                let keep = !broken.contains(&idx);
                idx += 1;
                keep
            });
        }

        converted
    }
}
