#![deny(unsafe_code)]


mod hasher;

#[doc(hidden)]
pub mod interner;

pub mod css;
pub mod layers;

pub use log;

/// The public API
pub mod prelude {
    pub use crate::stylesheet;

    #[doc(inline)]
    pub use crate::css::*;

    #[doc(inline)]
    pub use crate::layers::*;
}
