//! Identifier parsing for Gallica documents.
//!
//! Gallica names every document with an ARK (Archival Resource Key). This
//! module turns the textual forms users paste into a validated [`Ark`].
//!
//! # Example
//!
//! ```
//! use gallica_core::parser::Ark;
//!
//! let ark = Ark::parse("https://gallica.bnf.fr/ark:/12148/bpt6k5619759j").unwrap();
//! assert_eq!(ark.root().without_authority().to_string(), "ark:/12148/bpt6k5619759j");
//! ```

mod ark;
mod error;

pub use ark::{Ark, ArkParts, Scheme};
pub use error::{Component, ParseError, ValidationError};
