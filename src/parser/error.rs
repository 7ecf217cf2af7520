//! Error types for ARK identifier parsing and construction.

use std::fmt;

use thiserror::Error;

/// One of the components of an ARK identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// URI scheme of the resolver (`http` / `https`).
    Scheme,
    /// Resolver host (`gallica.bnf.fr`).
    Authority,
    /// Name Assigning Authority Number (`12148`).
    Naan,
    /// Object name (`bpt6k5619759j`).
    Name,
    /// Sub-path below the object (`f1n10.pdf`).
    Qualifier,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Scheme => "scheme",
            Self::Authority => "authority",
            Self::Naan => "naan",
            Self::Name => "name",
            Self::Qualifier => "qualifier",
        };
        f.write_str(label)
    }
}

/// Errors raised when an [`Ark`](super::Ark) is built from explicit parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A present component is the empty string.
    #[error("{component} must not be empty")]
    Empty {
        /// Offending component.
        component: Component,
    },

    /// A component contains whitespace or a reserved character.
    #[error("{component} contains forbidden character {character:?} at offset {offset}")]
    ForbiddenCharacter {
        /// Offending component.
        component: Component,
        /// The rejected character.
        character: char,
        /// Byte offset inside the component.
        offset: usize,
    },

    /// Scheme given without an authority.
    #[error("scheme given without an authority")]
    SchemeWithoutAuthority,

    /// Authority given without a scheme.
    #[error("authority given without a scheme")]
    AuthorityWithoutScheme,

    /// Authority given for an identifier that has no NAAN.
    #[error("authority requires a naan")]
    AuthorityWithoutNaan,

    /// Qualifiers on a short-form identifier cannot be told apart from a NAAN.
    #[error("qualifiers require a naan")]
    QualifiersWithoutNaan,
}

/// Errors raised while parsing the textual form of an ARK identifier.
///
/// Every positional variant carries the byte offset in the original input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input was empty or whitespace only.
    #[error("empty ARK identifier")]
    Empty,

    /// Two consecutive slashes, or a leading/trailing slash.
    #[error("empty segment at byte {position} in '{input}'")]
    EmptySegment {
        /// The rejected input.
        input: String,
        /// Byte offset of the empty segment.
        position: usize,
    },

    /// A component holds whitespace or one of `@ : / # [ ] ?`.
    #[error("invalid character {character:?} in {component} at byte {position} in '{input}'")]
    InvalidCharacter {
        /// The rejected input.
        input: String,
        /// Component being read.
        component: Component,
        /// The rejected character.
        character: char,
        /// Byte offset of the character.
        position: usize,
    },

    /// A scheme other than http/https.
    #[error("unsupported scheme '{scheme}' in '{input}'\n  Suggestion: use http:// or https://")]
    UnsupportedScheme {
        /// The rejected input.
        input: String,
        /// Scheme as written.
        scheme: String,
        /// Byte offset of the scheme.
        position: usize,
    },

    /// A scheme not followed by `//`.
    #[error("expected '//' after scheme at byte {position} in '{input}'")]
    MissingAuthoritySeparator {
        /// The rejected input.
        input: String,
        /// Byte offset where `//` was expected.
        position: usize,
    },

    /// A resolver prefix not followed by the `ark:` label.
    #[error("expected 'ark:' at byte {position} in '{input}'")]
    MissingArkLabel {
        /// The rejected input.
        input: String,
        /// Byte offset where the label was expected.
        position: usize,
    },

    /// A required component is absent.
    #[error("missing {component} at byte {position} in '{input}'")]
    MissingComponent {
        /// The rejected input.
        input: String,
        /// The absent component.
        component: Component,
        /// Byte offset where the component was expected.
        position: usize,
    },

    /// A pasted link could not be read as a URL.
    #[error("invalid URL '{input}': {reason}")]
    InvalidUrl {
        /// The rejected input.
        input: String,
        /// Parser message.
        reason: String,
    },
}

impl ParseError {
    /// Byte offset of the failure, when the variant has one.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::EmptySegment { position, .. }
            | Self::InvalidCharacter { position, .. }
            | Self::MissingAuthoritySeparator { position, .. }
            | Self::UnsupportedScheme { position, .. }
            | Self::MissingArkLabel { position, .. }
            | Self::MissingComponent { position, .. } => Some(*position),
            Self::Empty | Self::InvalidUrl { .. } => None,
        }
    }
}
