use std::{
    fmt::{self, Display},
    iter,
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{
    css::selector::{IdList, sorted_unique},
    interner::StrId,
    layers::PropertyLayerStore,
};

/// Anything that can be matched against a stylesheet.
///
/// Implemented by whatever the toolkit uses for its widgets. Only the type name is required.
pub trait Styleable {
    /// Type name used by type selectors. Compared case-insensitively.
    fn type_name(&self) -> &str;

    /// Object id, matched by `#id` selectors.
    fn id(&self) -> Option<&str> {
        None
    }

    /// Classes, matched by `.class` selectors.
    fn classes(&self) -> impl Iterator<Item = &str> {
        iter::empty()
    }

    /// Active pseudo-states such as `hover`.
    fn states(&self) -> impl Iterator<Item = &str> {
        iter::empty()
    }
}

/// A styleable object that owns a [`PropertyLayerStore`] and possibly children.
///
/// This is what [`Stylesheet::apply`](crate::css::Stylesheet::apply) and
/// [`Stylesheet::apply_all`](crate::css::Stylesheet::apply_all) write into.
pub trait StyleNode: Styleable + Sized {
    fn properties_mut(&mut self) -> &mut PropertyLayerStore;

    fn children_mut(&mut self) -> &mut [Self] {
        &mut []
    }
}

/// A snapshot of what a [`Styleable`] looked like when it was attached.
///
/// The ancestor link only exists to answer combinator queries. It points at the ancestor's
/// snapshot, never at the ancestor object itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    type_name: StrId,
    id: Option<StrId>,
    classes: IdList,
    states: IdList,
    ancestor: Option<Arc<Identity>>,
}

impl Identity {
    /// An identity with only a type name.
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: StrId::new(&type_name.to_ascii_lowercase()),
            id: None,
            classes: SmallVec::new(),
            states: SmallVec::new(),
            ancestor: None,
        }
    }

    /// Snapshots `object`.
    pub fn of(object: &impl Styleable, ancestor: Option<Arc<Identity>>) -> Self {
        Self::new(object.type_name())
            .with_id(object.id())
            .with_classes(object.classes())
            .with_states(object.states())
            .with_ancestor(ancestor)
    }

    pub fn with_id(mut self, id: Option<&str>) -> Self {
        self.id = id.filter(|id| !id.is_empty()).map(StrId::new);
        self
    }

    pub fn with_classes<'a>(mut self, classes: impl IntoIterator<Item = &'a str>) -> Self {
        self.classes = sorted_unique(classes.into_iter().filter(|c| !c.is_empty()).map(StrId::new).collect());
        self
    }

    pub fn with_states<'a>(mut self, states: impl IntoIterator<Item = &'a str>) -> Self {
        self.states = sorted_unique(states.into_iter().filter(|s| !s.is_empty()).map(StrId::new).collect());
        self
    }

    pub fn with_ancestor(mut self, ancestor: Option<Arc<Identity>>) -> Self {
        self.ancestor = ancestor;
        self
    }

    pub fn type_name(&self) -> StrId {
        self.type_name
    }

    pub fn id(&self) -> Option<StrId> {
        self.id
    }

    /// Sorted, unique.
    pub fn class_ids(&self) -> &[StrId] {
        &self.classes
    }

    /// Sorted, unique.
    pub fn state_ids(&self) -> &[StrId] {
        &self.states
    }

    /// The immediate ancestor.
    pub fn ancestor(&self) -> Option<&Identity> {
        self.ancestor.as_deref()
    }

    /// Every ancestor, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Identity> {
        iter::successors(self.ancestor(), |identity| identity.ancestor())
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ancestor) = self.ancestor() {
            write!(f, "{ancestor} > ")?;
        }
        write!(f, "{}", self.type_name)?;
        if let Some(id) = self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        for state in &self.states {
            write!(f, ":{state}")?;
        }
        Ok(())
    }
}
