//! Stylesheet parsing and matching.
//!
//! ## Overview
//! Stylesheets are typically loaded with the [`stylesheet!()`](crate::stylesheet) macro,
//! but [`Stylesheet`] also implements [`std::str::FromStr`] and has a [`from_file`](crate::css::Stylesheet::from_file) method.
//! A [`StyleParser`] gives control over comment syntax, value filters and per-type defaults.
//!
//! Objects are matched through the [`Styleable`] trait. [`Stylesheet::attach`] returns a [`MatchResult`]
//! with the contributing rules and their merged properties, and [`Stylesheet::apply`] writes those into a
//! [`PropertyLayerStore`](crate::layers::PropertyLayerStore).
//!
//! ## Grammar
//!
//! ```text
//! sheet          := rule*
//! rule           := selector_group '{' declarations '}'
//! selector_group := selector (',' selector)*
//! selector       := segment ((' ' | '>') segment)*
//! segment        := (type_name | '*')? ('#' id)? ('.' class)* (':' state)*
//! declarations   := (name ':' value ';')*
//! comment        := '/*' .. '*/' | '//' .. EOL
//! ```
//!
//! - Type names compare case-insensitively. Ids, classes and states compare exactly.
//! - `a > b` matches `b` whose parent matches `a`. `a b` matches `b` with any ancestor matching `a`.
//! - `:state` selectors only contribute while the object has that state active.
//! - Values are converted by the parser's [`FilterChain`]: integers, floats (anything with a `.`),
//!   `true`/`false`, otherwise the raw text.
//!
//! Parsing is all or nothing. The first malformed selector or declaration fails the whole sheet with a
//! [`ParseError`] pointing at it.
//!
//! ## Specificity
//! Rules are weighed by ids, then classes and states, then type names, then `>` combinators,
//! counted over every segment of the selector. A heavier rule overrides a lighter one.
//! If weights tie, the rule that appears later in the stylesheet wins.
//!
//! ```
//! use std::str::FromStr;
//! use sterling_core::css::{Identity, Stylesheet, Value};
//!
//! let sheet = Stylesheet::from_str("#ok { width: 2; } .wide { width: 3.5; } button { width: 1; }").unwrap();
//! let button = Identity::new("Button").with_id(Some("ok")).with_classes(["wide"]);
//!
//! let result = sheet.attach_identity(button.into());
//! assert_eq!(result.properties().get("width"), Some(&Value::Int(2)));
//! ```

mod defaults;
mod filter;
mod identity;
mod parser;
mod selector;
mod stylesheet;
mod value;

pub use defaults::*;
pub use filter::*;
pub use identity::*;
pub use parser::{CommentMarkers, ParseError, ParseErrorKind, StyleParser};
pub use selector::{Combinator, Selector, Specificity};
pub use stylesheet::*;
pub use value::*;

#[inline]
pub(crate) fn log_parse_error(error: &ParseError, file_name: Option<&std::path::Path>) {
    if let Some(path) = file_name {
        log::error!("{error} in {}", path.display());
    } else {
        log::error!("{error} in <no-filename>");
    }
}

/// Loads a [`Stylesheet`](crate::css::Stylesheet) from a path relative to the crate root.
///
/// In release builds, uses [`include_str`] to embed the CSS text into the binary.
///
/// Panics if the sheet cannot be loaded.
#[macro_export]
macro_rules! stylesheet {
    ($path:literal) => {{
        #[cfg(not(debug_assertions))]
        {
            use std::str::FromStr;
            $crate::css::Stylesheet::from_str(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", $path))).expect("Failed to parse CSS")
        }

        #[cfg(debug_assertions)]
        {
            let css_path = concat!(env!("CARGO_MANIFEST_DIR"), "/", $path);
            $crate::css::Stylesheet::from_file(css_path).expect("Failed to parse CSS")
        }
    }};
}
