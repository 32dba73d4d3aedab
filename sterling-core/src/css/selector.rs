use std::fmt::{self, Display};

use cssparser::{serialize_identifier, serialize_name};
use smallvec::SmallVec;

use crate::{css::Identity, interner::StrId};

pub(crate) type IdList = SmallVec<[StrId; 4]>;

/// How a selector segment relates to the segment on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// `a > b`: the immediate ancestor must match.
    Child,
    /// `a b`: some ancestor at any depth must match.
    Descendant,
}

/// Rule weight. Compared field by field, so one id outweighs any number of classes,
/// one class outweighs any number of type names, and so on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    pub ids: u32,
    /// Classes and pseudo-states.
    pub classes: u32,
    pub types: u32,
    /// Child combinators; a direct parent is a tighter match than any ancestor.
    pub children: u32,
}

/// Outcome of matching a selector chain from one identity upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainMatch {
    Matched,
    /// A segment failed. The closest descendant combinator may try a higher ancestor.
    RetryFurtherUp,
    /// Ran out of ancestors. No higher starting point can match either.
    Exhausted,
}

/// One compound segment plus an optional link to the segment on its left.
///
/// `panel > button.primary:hover` is the segment `button.primary:hover` whose ancestor is
/// `(panel, Child)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// Lowercased type name; `None` matches any type.
    pub(crate) type_name: Option<StrId>,
    pub(crate) id: Option<StrId>,
    /// Sorted, unique.
    pub(crate) classes: IdList,
    /// Sorted, unique.
    pub(crate) states: IdList,
    pub(crate) ancestor: Option<(Box<Selector>, Combinator)>,
}

impl Selector {
    pub fn type_name(&self) -> Option<StrId> {
        self.type_name
    }

    pub fn id(&self) -> Option<StrId> {
        self.id
    }

    pub fn classes(&self) -> &[StrId] {
        &self.classes
    }

    /// Pseudo-states required by this segment, e.g. `hover`.
    pub fn states(&self) -> &[StrId] {
        &self.states
    }

    pub fn ancestor(&self) -> Option<(&Selector, Combinator)> {
        self.ancestor.as_ref().map(|(sel, comb)| (&**sel, *comb))
    }

    /// Number of segments in the chain, including this one.
    pub fn depth(&self) -> usize {
        1 + self.ancestor().map_or(0, |(sel, _)| sel.depth())
    }

    /// `true` if the segment puts no constraint on the object at all (`*`).
    pub fn is_universal(&self) -> bool {
        self.type_name.is_none() && self.id.is_none() && self.classes.is_empty() && self.states.is_empty()
    }

    /// Tests this segment and, recursively, its ancestor chain against `identity`.
    ///
    /// Pseudo-states are not checked here; the cascade filters on them separately.
    pub fn matches(&self, identity: &Identity) -> bool {
        self.match_chain(identity) == ChainMatch::Matched
    }

    fn match_chain(&self, identity: &Identity) -> ChainMatch {
        if !self.matches_segment(identity) {
            return ChainMatch::RetryFurtherUp;
        }

        match &self.ancestor {
            None => ChainMatch::Matched,
            Some((parent, Combinator::Child)) => match identity.ancestor() {
                Some(ancestor) => parent.match_chain(ancestor),
                None => ChainMatch::Exhausted,
            },
            Some((parent, Combinator::Descendant)) => {
                for ancestor in identity.ancestors() {
                    match parent.match_chain(ancestor) {
                        ChainMatch::RetryFurtherUp => continue,
                        done => return done,
                    }
                }
                ChainMatch::Exhausted
            }
        }
    }

    /// Tests only this segment, ignoring ancestors.
    pub fn matches_segment(&self, identity: &Identity) -> bool {
        if let Some(type_name) = self.type_name
            && type_name != identity.type_name()
        {
            return false;
        }

        if let Some(id) = self.id
            && Some(id) != identity.id()
        {
            return false;
        }

        is_subset(&self.classes, identity.class_ids())
    }

    pub fn specificity(&self) -> Specificity {
        let mut weight = Specificity::default();
        let mut segment = Some(self);
        let mut via_child = false;

        while let Some(sel) = segment {
            weight.ids += u32::from(sel.id.is_some());
            weight.classes += (sel.classes.len() + sel.states.len()) as u32;
            weight.types += u32::from(sel.type_name.is_some());
            weight.children += u32::from(via_child);

            via_child = matches!(sel.ancestor, Some((_, Combinator::Child)));
            segment = sel.ancestor.as_ref().map(|(a, _)| &**a);
        }

        weight
    }

    fn fmt_segment(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_universal() {
            return f.write_str("*");
        }
        if let Some(type_name) = self.type_name {
            serialize_identifier(&type_name.as_str(), f)?;
        }
        if let Some(id) = self.id {
            f.write_str("#")?;
            serialize_name(&id.as_str(), f)?;
        }
        for class in &self.classes {
            f.write_str(".")?;
            serialize_identifier(&class.as_str(), f)?;
        }
        for state in &self.states {
            f.write_str(":")?;
            serialize_identifier(&state.as_str(), f)?;
        }
        Ok(())
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((parent, combinator)) = &self.ancestor {
            write!(f, "{parent}")?;
            match combinator {
                Combinator::Child => f.write_str(" > ")?,
                Combinator::Descendant => f.write_str(" ")?,
            }
        }
        self.fmt_segment(f)
    }
}

/// Both slices sorted and unique.
pub(crate) fn is_subset(needles: &[StrId], haystack: &[StrId]) -> bool {
    if needles.len() > haystack.len() {
        return false;
    }

    let mut rest = haystack.iter();
    'needle: for needle in needles {
        for hay in rest.by_ref() {
            match hay.cmp(needle) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => continue 'needle,
                std::cmp::Ordering::Greater => return false,
            }
        }
        return false;
    }
    true
}

/// Both slices sorted and unique.
pub(crate) fn intersects(a: &[StrId], b: &[StrId]) -> bool {
    a.iter().any(|id| b.binary_search(id).is_ok())
}

pub(crate) fn sorted_unique(mut ids: IdList) -> IdList {
    ids.sort_unstable();
    ids.dedup();
    ids
}
