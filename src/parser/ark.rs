//! ARK persistent identifiers: parsing, validation and canonical rendering.
//!
//! Four textual shapes name the same logical identifier:
//!
//! ```text
//! https://gallica.bnf.fr/ark:/12148/bpt6k5619759j/f1n10.pdf   full
//! ark:/12148/bpt6k5619759j/f1n10.pdf                           ark-id
//! 12148/bpt6k5619759j/f1n10.pdf                                bare
//! bpt6k5619759j                                                short
//! ```
//!
//! Parsing is strict. Pasted browser links (with query strings or fragments)
//! go through [`Ark::from_url`] instead.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use super::error::{Component, ParseError, ValidationError};

/// Characters never allowed inside a component.
const RESERVED: [char; 7] = ['@', ':', '/', '#', '[', ']', '?'];

/// Label introducing the NAAN (matched ASCII case-insensitively).
const ARK_LABEL: &str = "ark:";

/// Resolver URI schemes accepted in the full form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Lowercase label as written in a URI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else if label.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else {
            None
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit components for [`Ark::from_parts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArkParts {
    pub scheme: Option<Scheme>,
    pub authority: Option<String>,
    pub naan: Option<String>,
    pub name: String,
    pub qualifiers: Vec<String>,
}

/// A validated ARK identifier.
///
/// Values are immutable; the `with_*`/`root` methods return new values.
/// Equality is case-sensitive on every component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ark {
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme: Option<Scheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    naan: Option<String>,
    name: String,
    qualifiers: Vec<String>,
}

impl Ark {
    /// Parses any of the four accepted shapes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] with the offending byte position for reserved
    /// characters, whitespace, stray slashes, missing components, unsupported
    /// schemes, or a resolver prefix without the `ark:` label.
    ///
    /// # Examples
    ///
    /// ```
    /// use gallica_core::parser::Ark;
    ///
    /// let ark = Ark::parse("ark:/12148/bpt6k5619759j/f1n10.pdf").unwrap();
    /// assert_eq!(ark.naan(), Some("12148"));
    /// assert_eq!(ark.name(), "bpt6k5619759j");
    /// assert_eq!(ark.qualifiers(), ["f1n10.pdf"]);
    /// assert_eq!(ark.to_string(), "ark:/12148/bpt6k5619759j/f1n10.pdf");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let ark = Reader::new(input).classify()?;
        trace!(input, canonical = %ark, "parsed ARK");
        Ok(ark)
    }

    /// Parses a pasted link or any strict shape.
    ///
    /// Inputs containing `://` are read as URLs first: query and fragment
    /// are dropped and the remaining `scheme://host/path` is parsed strictly.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidUrl`] when the link is not a URL, otherwise the
    /// errors of [`Ark::parse`].
    pub fn from_url(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if !trimmed.contains("://") {
            return Self::parse(trimmed);
        }

        let url = Url::parse(trimmed).map_err(|e| ParseError::InvalidUrl {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let Some(host) = url.host_str() else {
            return Err(ParseError::InvalidUrl {
                input: input.to_string(),
                reason: "URL has no host".to_string(),
            });
        };
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let stripped = format!("{}://{}{}", url.scheme(), authority, url.path());
        if url.query().is_some() || url.fragment().is_some() {
            debug!(input, stripped = %stripped, "dropped query/fragment from ARK link");
        }
        Self::parse(&stripped)
    }

    /// Builds an identifier from explicit components.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first component that breaks an
    /// invariant.
    pub fn from_parts(parts: ArkParts) -> Result<Self, ValidationError> {
        let ArkParts {
            scheme,
            authority,
            naan,
            name,
            qualifiers,
        } = parts;

        match (scheme, &authority) {
            (Some(_), None) => return Err(ValidationError::SchemeWithoutAuthority),
            (None, Some(_)) => return Err(ValidationError::AuthorityWithoutScheme),
            _ => {}
        }
        if let Some(authority) = &authority {
            check_component(Component::Authority, authority)?;
            if naan.is_none() {
                return Err(ValidationError::AuthorityWithoutNaan);
            }
        }
        if let Some(naan) = &naan {
            check_component(Component::Naan, naan)?;
        }
        check_component(Component::Name, &name)?;
        if !qualifiers.is_empty() && naan.is_none() {
            return Err(ValidationError::QualifiersWithoutNaan);
        }
        for qualifier in &qualifiers {
            check_component(Component::Qualifier, qualifier)?;
        }

        Ok(Self {
            scheme,
            authority,
            naan,
            name,
            qualifiers,
        })
    }

    #[must_use]
    pub fn scheme(&self) -> Option<Scheme> {
        self.scheme
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    #[must_use]
    pub fn naan(&self) -> Option<&str> {
        self.naan.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// Canonical textual form; identical to `to_string()`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Same identifier with qualifiers cleared.
    #[must_use]
    pub fn root(&self) -> Self {
        Self {
            qualifiers: Vec::new(),
            ..self.clone()
        }
    }

    /// Same identifier without scheme and authority (the `ark:/...` form).
    #[must_use]
    pub fn without_authority(&self) -> Self {
        Self {
            scheme: None,
            authority: None,
            ..self.clone()
        }
    }

    /// Returns a copy with `qualifiers` replacing the current ones.
    ///
    /// # Errors
    ///
    /// Same checks as [`Ark::from_parts`].
    pub fn with_qualifiers<I, S>(&self, qualifiers: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parts(ArkParts {
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
            ..self.to_parts()
        })
    }

    /// Returns a copy resolved against `scheme://authority`.
    ///
    /// # Errors
    ///
    /// Same checks as [`Ark::from_parts`]; short-form identifiers have no
    /// NAAN and are rejected.
    pub fn with_authority(
        &self,
        scheme: Scheme,
        authority: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::from_parts(ArkParts {
            scheme: Some(scheme),
            authority: Some(authority.into()),
            ..self.to_parts()
        })
    }

    /// Decomposes into explicit parts.
    #[must_use]
    pub fn to_parts(&self) -> ArkParts {
        ArkParts {
            scheme: self.scheme,
            authority: self.authority.clone(),
            naan: self.naan.clone(),
            name: self.name.clone(),
            qualifiers: self.qualifiers.clone(),
        }
    }
}

impl fmt::Display for Ark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(scheme), Some(authority)) = (self.scheme, &self.authority) {
            write!(f, "{scheme}://{authority}/")?;
        }
        if let Some(naan) = &self.naan {
            write!(f, "ark:/{naan}/")?;
        }
        f.write_str(&self.name)?;
        for qualifier in &self.qualifiers {
            write!(f, "/{qualifier}")?;
        }
        Ok(())
    }
}

impl FromStr for Ark {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// RFC 3986 `scheme`: a letter, then letters, digits, `+`, `-` or `.`.
fn is_scheme_token(label: &str) -> bool {
    let mut chars = label.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn first_forbidden(text: &str) -> Option<(usize, char)> {
    text.char_indices()
        .find(|(_, c)| c.is_whitespace() || RESERVED.contains(c))
}

fn check_component(component: Component, text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        return Err(ValidationError::Empty { component });
    }
    match first_forbidden(text) {
        Some((offset, character)) => Err(ValidationError::ForbiddenCharacter {
            component,
            character,
            offset,
        }),
        None => Ok(()),
    }
}

/// A `/`-delimited piece of the input and its byte offset.
#[derive(Debug, Clone, Copy)]
struct Segment<'a> {
    text: &'a str,
    offset: usize,
}

fn lex(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut offset = 0;
    for text in input.split('/') {
        segments.push(Segment { text, offset });
        offset += text.len() + 1;
    }
    segments
}

/// Walks lexed segments and assigns them to components.
struct Reader<'a> {
    input: &'a str,
    segments: Vec<Segment<'a>>,
    next: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            segments: lex(input),
            next: 0,
        }
    }

    fn classify(mut self) -> Result<Ark, ParseError> {
        let first = self.segments[0];

        if first.text.eq_ignore_ascii_case(ARK_LABEL) {
            self.next = 1;
            return self.ark_id(None);
        }
        if let Some(label) = first.text.strip_suffix(':')
            && self.introduces_resolver(label)
        {
            return self.resolver_form(label);
        }
        if self.segments.len() == 1 {
            let name = self.component(Component::Name)?;
            return Ok(Ark {
                scheme: None,
                authority: None,
                naan: None,
                name: name.to_string(),
                qualifiers: Vec::new(),
            });
        }
        self.ark_id(None)
    }

    /// `http:`/`https:` always start the resolver form; any other
    /// scheme-shaped label only when followed by `//`. Everything else is
    /// left to component validation, which reports the stray `:`.
    fn introduces_resolver(&self, label: &str) -> bool {
        if Scheme::from_label(label).is_some() {
            return true;
        }
        let double_slash = self.segments.get(1).is_some_and(|s| s.text.is_empty());
        double_slash && is_scheme_token(label)
    }

    fn resolver_form(mut self, label: &str) -> Result<Ark, ParseError> {
        let scheme = Scheme::from_label(label).ok_or_else(|| ParseError::UnsupportedScheme {
            input: self.input.to_string(),
            scheme: label.to_string(),
            position: self.segments[0].offset,
        })?;
        self.next = 1;

        // `//` lexes as one empty segment between scheme and authority.
        match self.bump() {
            Some(segment) if segment.text.is_empty() => {}
            Some(segment) => {
                return Err(ParseError::MissingAuthoritySeparator {
                    input: self.input.to_string(),
                    position: segment.offset,
                });
            }
            None => {
                return Err(ParseError::MissingAuthoritySeparator {
                    input: self.input.to_string(),
                    position: self.input.len(),
                });
            }
        }

        let authority = self.component(Component::Authority)?;

        match self.bump() {
            Some(segment) if segment.text.eq_ignore_ascii_case(ARK_LABEL) => {}
            Some(segment) => {
                return Err(ParseError::MissingArkLabel {
                    input: self.input.to_string(),
                    position: segment.offset,
                });
            }
            None => {
                return Err(ParseError::MissingArkLabel {
                    input: self.input.to_string(),
                    position: self.input.len(),
                });
            }
        }

        self.ark_id(Some((scheme, authority.to_string())))
    }

    fn ark_id(mut self, resolver: Option<(Scheme, String)>) -> Result<Ark, ParseError> {
        let naan = self.component(Component::Naan)?.to_string();
        let name = self.component(Component::Name)?.to_string();

        let mut qualifiers = Vec::new();
        while let Some(segment) = self.bump() {
            self.validate(Component::Qualifier, segment)?;
            qualifiers.push(segment.text.to_string());
        }

        let (scheme, authority) = match resolver {
            Some((scheme, authority)) => (Some(scheme), Some(authority)),
            None => (None, None),
        };
        Ok(Ark {
            scheme,
            authority,
            naan: Some(naan),
            name,
            qualifiers,
        })
    }

    fn bump(&mut self) -> Option<Segment<'a>> {
        let segment = self.segments.get(self.next).copied();
        if segment.is_some() {
            self.next += 1;
        }
        segment
    }

    fn component(&mut self, component: Component) -> Result<&'a str, ParseError> {
        let Some(segment) = self.bump() else {
            return Err(ParseError::MissingComponent {
                input: self.input.to_string(),
                component,
                position: self.input.len(),
            });
        };
        self.validate(component, segment)?;
        Ok(segment.text)
    }

    fn validate(&self, component: Component, segment: Segment<'a>) -> Result<(), ParseError> {
        if segment.text.is_empty() {
            return Err(ParseError::EmptySegment {
                input: self.input.to_string(),
                position: segment.offset,
            });
        }
        if let Some((offset, character)) = first_forbidden(segment.text) {
            return Err(ParseError::InvalidCharacter {
                input: self.input.to_string(),
                component,
                character,
                position: segment.offset + offset,
            });
        }
        Ok(())
    }
}
