use std::{
    cell::OnceCell,
    collections::HashMap,
    error,
    fmt::{self, Display},
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bumpalo::{Bump, collections::Vec as BumpVec};
use log::{debug, trace, warn};

use crate::{
    css::{
        self, Defaults, Identity, ParseError, PropertyMap, Selector, Specificity, StyleNode, StyleParser, Styleable,
        selector::{IdList, intersects, sorted_unique},
    },
    hasher::StrIdMap,
    interner::StrId,
    layers::PropertyLayerStore,
};

/// Layer holding [`Defaults`] for the object's type.
pub const DEFAULT_LAYER: &str = "default";
/// Layer holding the merged state-less rules.
pub const BASE_LAYER: &str = "base";
/// Prefix of the per-state layers written by [`Stylesheet::apply`], e.g. `state:hover`.
pub const STATE_LAYER_PREFIX: &str = "state:";

/// Name of the layer holding the properties won by rules for `state`.
pub fn state_layer(state: &str) -> String {
    format!("{STATE_LAYER_PREFIX}{state}")
}

// ---------- Errors ----------

/// A stylesheet file that could not be read or parsed.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Parse(ParseError),
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::Io(err) => Some(err),
            LoadError::Parse(err) => Some(err),
        }
    }
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "Failed to read stylesheet: {err}"),
            LoadError::Parse(err) => write!(f, "Failed to parse stylesheet: {err}"),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

impl From<ParseError> for LoadError {
    fn from(err: ParseError) -> Self {
        LoadError::Parse(err)
    }
}

// ---------- Rules ----------

/// One selector and the declarations it applies.
///
/// Selectors from a comma separated group become separate rules sharing one property map.
#[derive(Debug)]
pub struct Rule {
    selector: Selector,
    properties: Arc<PropertyMap>,
    specificity: Specificity,
    used: AtomicBool,
}

impl Clone for Rule {
    fn clone(&self) -> Self {
        Self {
            selector: self.selector.clone(),
            properties: Arc::clone(&self.properties),
            specificity: self.specificity,
            used: AtomicBool::new(self.used.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.specificity == other.specificity && self.selector == other.selector && self.properties == other.properties
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{} }}", self.selector, self.properties)
    }
}

impl Rule {
    pub fn new(selector: Selector, properties: Arc<PropertyMap>) -> Self {
        Self {
            specificity: selector.specificity(),
            selector,
            properties,
            used: AtomicBool::new(false),
        }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// `true` once the rule has matched an attached object.
    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    fn applies_in(&self, states: &[StrId]) -> bool {
        self.selector.states().is_empty() || intersects(self.selector.states(), states)
    }
}

// ---------- Stylesheet ----------

#[derive(Debug, Default)]
pub(crate) struct StylesheetInner {
    /// Ascending specificity, source order within equal weights.
    pub rules: Vec<Rule>,
    pub defaults: Defaults,
    pub path: Option<PathBuf>,

    // Each rule sits in exactly one bucket, keyed on its right-most segment.
    pub by_id: StrIdMap<Vec<usize>>,
    pub by_class: StrIdMap<Vec<usize>>,
    pub by_type: StrIdMap<Vec<usize>>,
    pub universal: Vec<usize>,
}

impl StylesheetInner {
    fn candidates(&self, identity: &Identity) -> Vec<usize> {
        let mut candidates = self.universal.clone();

        if let Some(rules) = self.by_type.get(&identity.type_name()) {
            candidates.extend_from_slice(rules);
        }
        if let Some(id) = identity.id()
            && let Some(rules) = self.by_id.get(&id)
        {
            candidates.extend_from_slice(rules);
        }
        for class in identity.class_ids() {
            if let Some(rules) = self.by_class.get(class) {
                candidates.extend_from_slice(rules);
            }
        }

        // indices are in weight order
        candidates.sort_unstable();
        candidates
    }
}

/// A parsed stylesheet. Immutable and cheap to clone.
#[derive(Clone, Default)]
pub struct Stylesheet {
    pub(crate) inner: Arc<StylesheetInner>,
}

impl fmt::Debug for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stylesheet").field("rules", &self.inner.rules.len()).finish_non_exhaustive()
    }
}

impl PartialEq for Stylesheet {
    fn eq(&self, other: &Self) -> bool {
        self.inner.rules == other.inner.rules && self.inner.defaults == other.inner.defaults
    }
}

impl Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.inner.rules {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl FromStr for Stylesheet {
    type Err = ParseError;

    fn from_str(css: &str) -> Result<Self, Self::Err> {
        StyleParser::new().parse(css)
    }
}

impl Stylesheet {
    /// Builds the index over `rules`, given in source order.
    pub(crate) fn from_rules(mut rules: Vec<Rule>, defaults: Defaults, path: Option<PathBuf>) -> Self {
        // Stable, so later rules still win ties
        rules.sort_by_key(Rule::specificity);

        let mut inner = StylesheetInner {
            defaults,
            path,
            ..Default::default()
        };

        for (idx, rule) in rules.iter().enumerate() {
            let subject = &rule.selector;
            if let Some(id) = subject.id() {
                inner.by_id.entry(id).or_default().push(idx);
            } else if let Some(class) = subject.classes().first() {
                inner.by_class.entry(*class).or_default().push(idx);
            } else if let Some(type_name) = subject.type_name() {
                inner.by_type.entry(type_name).or_default().push(idx);
            } else {
                inner.universal.push(idx);
            }
        }

        inner.rules = rules;
        Self { inner: Arc::new(inner) }
    }

    /// Reads and parses a stylesheet file with the default [`StyleParser`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Stylesheet, LoadError> {
        Self::from_file_with(path, &mut StyleParser::new())
    }

    /// Reads and parses a stylesheet file with `parser`.
    pub fn from_file_with(path: impl AsRef<Path>, parser: &mut StyleParser) -> Result<Stylesheet, LoadError> {
        let path = path.as_ref();
        let css = fs::read_to_string(path)?;

        let rules = parser.parse_rules(&css).inspect_err(|err| css::log_parse_error(err, Some(path)))?;
        debug!("Loaded {} with {} rules", path.display(), rules.len());

        Ok(Self::from_rules(rules, parser.defaults().clone(), Some(path.to_path_buf())))
    }

    /// The file this sheet was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Rules in cascade order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.inner.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rules.is_empty()
    }

    pub fn defaults(&self) -> &Defaults {
        &self.inner.defaults
    }

    /// Matches `object` against every rule.
    ///
    /// `ancestor` is the identity of the object's parent, usually taken from the parent's own
    /// [`MatchResult::identity`]. The object's active states become the result's active states.
    pub fn attach(&self, object: &impl Styleable, ancestor: Option<Arc<Identity>>) -> MatchResult {
        self.attach_identity(Arc::new(Identity::of(object, ancestor)))
    }

    /// Like [`attach`](Self::attach), for an identity built by hand.
    pub fn attach_identity(&self, identity: Arc<Identity>) -> MatchResult {
        let matched: Vec<usize> = self
            .inner
            .candidates(&identity)
            .into_iter()
            .filter(|&idx| self.inner.rules[idx].selector.matches(&identity))
            .collect();

        for &idx in &matched {
            self.inner.rules[idx].used.store(true, Ordering::Relaxed);
        }
        trace!("{identity} matched {} rules", matched.len());

        MatchResult {
            sheet: Arc::clone(&self.inner),
            states: identity.state_ids().iter().copied().collect(),
            identity,
            matched,
            merged: OnceCell::new(),
        }
    }

    /// Attaches `node` and writes the result into its property store.
    ///
    /// The store gets the type defaults as [`DEFAULT_LAYER`], the state-less rules as
    /// [`BASE_LAYER`], and one [`state_layer`] per active state. Layers of states that are no
    /// longer active are removed. The store then resolves to the same values as
    /// [`MatchResult::properties`], apart from the defaults and the user layer.
    pub fn apply(&self, node: &mut impl StyleNode, ancestor: Option<Arc<Identity>>) -> MatchResult {
        let result = self.attach(&*node, ancestor);
        let defaults = self.inner.defaults.for_type(node.type_name());
        let store = node.properties_mut();

        if defaults.is_empty() {
            store.remove_layer(DEFAULT_LAYER);
        } else {
            store.add_layer(DEFAULT_LAYER, defaults);
        }
        store.add_layer(BASE_LAYER, result.base_properties());
        result.write_state_layers(store);

        result
    }

    /// Applies the sheet to `root` and all of its descendants, parents before children.
    ///
    /// Returns the identity of `root`.
    pub fn apply_all<N: StyleNode>(&self, root: &mut N, ancestor: Option<Arc<Identity>>) -> Arc<Identity> {
        let root_identity = Arc::clone(self.apply(&mut *root, ancestor).identity());

        let temp = Bump::new();
        let mut stack: BumpVec<(&mut N, Arc<Identity>)> = BumpVec::new_in(&temp);
        for child in root.children_mut().iter_mut().rev() {
            stack.push((child, Arc::clone(&root_identity)));
        }

        while let Some((node, parent)) = stack.pop() {
            let identity = Arc::clone(self.apply(&mut *node, Some(parent)).identity());
            for child in node.children_mut().iter_mut().rev() {
                stack.push((child, Arc::clone(&identity)));
            }
        }

        root_identity
    }

    /// Logs every rule that has not matched anything yet and returns their selectors.
    pub fn style_check(&self) -> Vec<String> {
        let mut unused = Vec::new();
        for rule in self.inner.rules.iter().filter(|rule| !rule.is_used()) {
            let selector = rule.selector.to_string();
            match &self.inner.path {
                Some(path) => warn!("Unused style `{selector}` in {}", path.display()),
                None => warn!("Unused style `{selector}`"),
            }
            unused.push(selector);
        }
        unused
    }
}

// ---------- Match results ----------

/// The rules matching one object, in cascade order.
#[derive(Debug, Clone)]
pub struct MatchResult {
    sheet: Arc<StylesheetInner>,
    identity: Arc<Identity>,
    /// Every structural match, whatever its states.
    matched: Vec<usize>,
    states: IdList,
    merged: OnceCell<PropertyMap>,
}

impl MatchResult {
    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    /// Active states, sorted.
    pub fn states(&self) -> &[StrId] {
        &self.states
    }

    /// Contributing rules, lowest weight first.
    ///
    /// A rule whose selector requires states only contributes while one of them is active.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.all_rules().filter(|rule| rule.applies_in(&self.states))
    }

    pub fn matched_rule_count(&self) -> usize {
        self.rules().count()
    }

    /// Merged properties of [`rules`](Self::rules). Higher weights overwrite lower ones.
    pub fn properties(&self) -> &PropertyMap {
        self.merged.get_or_init(|| merge(self.rules()))
    }

    /// Merged properties of the rules that require no state.
    pub fn base_properties(&self) -> PropertyMap {
        merge(self.all_rules().filter(|rule| rule.selector.states().is_empty()))
    }

    /// Merged properties of the rules that require `state`.
    pub fn state_properties(&self, state: &str) -> PropertyMap {
        let state = StrId::new(state);
        merge(self.all_rules().filter(|rule| rule.selector.states().contains(&state)))
    }

    /// Replaces the active states.
    pub fn set_states<'a>(&mut self, states: impl IntoIterator<Item = &'a str>) {
        self.states = sorted_unique(states.into_iter().filter(|s| !s.is_empty()).map(StrId::new).collect());
        self.merged = OnceCell::new();
    }

    /// Turns `state` on or off and rewrites the state layers in `store` to match.
    pub fn set_state(&mut self, store: &mut PropertyLayerStore, state: &str, active: bool) {
        let id = StrId::new(state);
        let mut states: IdList = self.states.iter().copied().filter(|s| *s != id).collect();
        if active {
            states.push(id);
        }
        self.states = sorted_unique(states);
        self.merged = OnceCell::new();

        self.write_state_layers(store);
    }

    /// Splits [`properties`](Self::properties) by the active state whose rule won each property.
    ///
    /// Properties won by a state-less rule are left out. A rule requiring several active states
    /// is counted under the first of them.
    pub fn state_layers(&self) -> Vec<(StrId, PropertyMap)> {
        let mut winners: HashMap<Arc<str>, Option<StrId>> = HashMap::new();
        for rule in self.rules() {
            let state = rule.selector.states().iter().copied().find(|s| self.states.binary_search(s).is_ok());
            for name in rule.properties.keys() {
                winners.insert(Arc::clone(name), state);
            }
        }

        let mut layers: Vec<(StrId, PropertyMap)> = self.states.iter().map(|&state| (state, PropertyMap::new())).collect();
        for (name, value) in self.properties().iter() {
            if let Some(Some(state)) = winners.get(name)
                && let Some((_, layer)) = layers.iter_mut().find(|(s, _)| s == state)
            {
                layer.insert(Arc::clone(name), value.clone());
            }
        }
        layers
    }

    /// Narrows the current matches to those that also match `identity`.
    ///
    /// Rules that did not match here are never reconsidered.
    pub fn rematch(&self, identity: Arc<Identity>) -> MatchResult {
        let matched: Vec<usize> = self.matched.iter().copied().filter(|&idx| self.sheet.rules[idx].selector.matches(&identity)).collect();

        for &idx in &matched {
            self.sheet.rules[idx].used.store(true, Ordering::Relaxed);
        }

        MatchResult {
            sheet: Arc::clone(&self.sheet),
            states: identity.state_ids().iter().copied().collect(),
            identity,
            matched,
            merged: OnceCell::new(),
        }
    }

    fn write_state_layers(&self, store: &mut PropertyLayerStore) {
        let stale: Vec<String> = store
            .layer_names()
            .filter(|name| {
                name.strip_prefix(STATE_LAYER_PREFIX)
                    .is_some_and(|state| !self.states.iter().any(|active| active.as_str().as_ref() == state))
            })
            .map(String::from)
            .collect();
        for name in stale {
            store.remove_layer(&name);
        }

        for (state, properties) in self.state_layers() {
            store.add_layer(&state_layer(&state.as_str()), properties);
        }
    }

    fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.matched.iter().map(|&idx| &self.sheet.rules[idx])
    }
}

fn merge<'a>(rules: impl Iterator<Item = &'a Rule>) -> PropertyMap {
    let mut merged = PropertyMap::new();
    for rule in rules {
        merged.extend_from(&rule.properties);
    }
    merged
}

// ---------- Serde ----------

#[cfg(feature = "serde")]
impl serde::Serialize for Stylesheet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1))?;
        if let Some(path) = &self.inner.path {
            map.serialize_entry("path", path.to_string_lossy().as_ref())?;
        } else {
            map.serialize_entry("css", self.to_string().as_str())?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Stylesheet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};

        struct StylesheetVisitor;

        impl<'de> Visitor<'de> for StylesheetVisitor {
            type Value = Stylesheet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with a \"css\" or \"path\" entry")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut path: Option<String> = None;
                let mut css: Option<String> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "path" if path.is_some() => return Err(de::Error::duplicate_field("path")),
                        "css" if css.is_some() => return Err(de::Error::duplicate_field("css")),
                        "path" => path = Some(map.next_value()?),
                        "css" => css = Some(map.next_value()?),
                        other => return Err(de::Error::unknown_field(other, &["path", "css"])),
                    }
                }

                match (path, css) {
                    (Some(_), Some(_)) => Err(de::Error::custom("expected exactly one of \"path\" or \"css\"")),
                    (Some(path), None) => Stylesheet::from_file(path).map_err(de::Error::custom),
                    (None, Some(css)) => Stylesheet::from_str(&css).map_err(de::Error::custom),
                    (None, None) => Err(de::Error::custom("missing \"path\" or \"css\"")),
                }
            }
        }

        deserializer.deserialize_map(StylesheetVisitor)
    }
}
