//! Marker definitions and the marker registry.
//!
//! A marker is a delimited region embedded in the model's text stream that
//! carries a machine-readable payload instead of prose. The set of
//! recognized markers is closed: each kind is a variant of [`MarkerKind`]
//! with fixed open/close delimiter strings, loaded once at startup and
//! immutable for the process lifetime.

pub mod payload;

pub use payload::{FieldUpdate, PhotoRequest, RawPayload};

use crate::error::{FilterError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open delimiter for trip update markers.
pub const TRIP_UPDATE_OPEN: &str = "<trip_update>";
/// Close delimiter for trip update markers.
pub const TRIP_UPDATE_CLOSE: &str = "</trip_update>";
/// Open delimiter for photo markers.
pub const PHOTO_OPEN: &str = "<photo>";
/// Close delimiter for photo markers.
pub const PHOTO_CLOSE: &str = "</photo>";

/// The closed set of recognized marker types.
///
/// Marker kinds are a fixed enum rather than string literals so that every
/// call site dispatches over the same variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// Structured field update for the subject record
    /// (`{"field": ..., "value": ..., "currency": ...}`).
    TripUpdate,

    /// Inline photo request (`{"query": ..., "caption": ...}`).
    Photo,
}

impl MarkerKind {
    /// Returns the stable name of this marker kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TripUpdate => "trip_update",
            Self::Photo => "photo",
        }
    }

    /// Returns all marker kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::TripUpdate, Self::Photo]
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Definition of one recognized marker type.
///
/// Delimiters are non-empty, distinct, fixed strings known in advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerDef {
    /// The marker kind this definition describes.
    pub kind: MarkerKind,

    /// Opening delimiter string.
    pub open: String,

    /// Closing delimiter string.
    pub close: String,
}

impl MarkerDef {
    /// Creates a new marker definition.
    #[must_use]
    pub fn new(kind: MarkerKind, open: &str, close: &str) -> Self {
        Self {
            kind,
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

/// Immutable registry of all recognized marker definitions.
///
/// Built once at startup and shared by reference for the process lifetime.
///
/// # Examples
///
/// ```
/// use tagflow_rs::marker::{MarkerKind, MarkerRegistry};
///
/// let registry = MarkerRegistry::default();
/// let def = registry.get(MarkerKind::Photo).unwrap();
/// assert_eq!(def.open, "<photo>");
/// ```
#[derive(Debug, Clone)]
pub struct MarkerRegistry {
    /// Marker definitions in priority order.
    defs: Vec<MarkerDef>,
    /// Length in bytes of the longest open delimiter.
    max_open_len: usize,
}

impl MarkerRegistry {
    /// Creates a registry from the given definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty, any delimiter is empty, a
    /// definition reuses its open delimiter as its close delimiter, or two
    /// definitions share a delimiter string.
    pub fn new(defs: Vec<MarkerDef>) -> Result<Self> {
        if defs.is_empty() {
            return Err(FilterError::EmptyRegistry.into());
        }

        let mut seen: Vec<&str> = Vec::with_capacity(defs.len() * 2);
        for def in &defs {
            if def.open.is_empty() || def.close.is_empty() {
                return Err(FilterError::EmptyDelimiter {
                    name: def.kind.name().to_string(),
                }
                .into());
            }
            if def.open == def.close {
                return Err(FilterError::IdenticalDelimiters {
                    name: def.kind.name().to_string(),
                }
                .into());
            }
            for delim in [def.open.as_str(), def.close.as_str()] {
                if seen.contains(&delim) {
                    return Err(FilterError::DuplicateDelimiter {
                        delimiter: delim.to_string(),
                    }
                    .into());
                }
                seen.push(delim);
            }
        }

        let max_open_len = defs.iter().map(|d| d.open.len()).max().unwrap_or(0);
        Ok(Self { defs, max_open_len })
    }

    /// Returns all marker definitions in priority order.
    #[must_use]
    pub fn defs(&self) -> &[MarkerDef] {
        &self.defs
    }

    /// Returns the definition for a marker kind, if registered.
    #[must_use]
    pub fn get(&self, kind: MarkerKind) -> Option<&MarkerDef> {
        self.defs.iter().find(|d| d.kind == kind)
    }

    /// Returns the byte length of the longest open delimiter.
    #[must_use]
    pub const fn max_open_len(&self) -> usize {
        self.max_open_len
    }

    /// Finds the earliest complete open delimiter in `text`.
    ///
    /// Returns the byte offset where the delimiter starts and its
    /// definition. When two open delimiters start at the same offset (one
    /// being a prefix of the other), the shorter wins - it is the one that
    /// completes first in an incremental stream.
    #[must_use]
    pub fn find_open(&self, text: &str) -> Option<(usize, &MarkerDef)> {
        self.defs
            .iter()
            .filter_map(|def| text.find(&def.open).map(|at| (at, def)))
            .min_by_key(|(at, def)| (*at, def.open.len()))
    }

    /// Returns the length in bytes of the longest suffix of `text` that is
    /// a strict, non-empty prefix of some open delimiter.
    ///
    /// This suffix is the "possibly a marker start" portion that must be
    /// withheld from emission. Shorter viable suffixes are always suffixes
    /// of the longest one, so retaining the longest keeps every candidate
    /// match alive.
    #[must_use]
    pub fn ambiguous_suffix_len(&self, text: &str) -> usize {
        let upper = text.len().min(self.max_open_len.saturating_sub(1));
        for len in (1..=upper).rev() {
            let start = text.len() - len;
            if !text.is_char_boundary(start) {
                continue;
            }
            let suffix = &text[start..];
            if self
                .defs
                .iter()
                .any(|d| d.open.len() > len && d.open.starts_with(suffix))
            {
                return len;
            }
        }
        0
    }
}

impl Default for MarkerRegistry {
    /// Returns the built-in registry: trip updates and photos.
    fn default() -> Self {
        // Static delimiter set, known valid.
        let defs = vec![
            MarkerDef::new(MarkerKind::TripUpdate, TRIP_UPDATE_OPEN, TRIP_UPDATE_CLOSE),
            MarkerDef::new(MarkerKind::Photo, PHOTO_OPEN, PHOTO_CLOSE),
        ];
        let max_open_len = defs.iter().map(|d| d.open.len()).max().unwrap_or(0);
        Self { defs, max_open_len }
    }
}

/// Extracts all well-formed marker regions from a complete text.
///
/// Non-streaming counterpart of the filter: scans left to right, earliest
/// region first, and returns the raw inner text of each region in input
/// order. Regions of one kind that happen to sit inside another kind's
/// region are not extracted separately, matching the filter's
/// no-nested-markers rule.
///
/// # Errors
///
/// Returns an error if the combined extraction regex cannot be built
/// (delimiters are escaped, so this indicates a pathological registry).
pub fn scan_text(registry: &MarkerRegistry, text: &str) -> Result<Vec<RawPayload>> {
    let alternatives: Vec<String> = registry
        .defs()
        .iter()
        .enumerate()
        .map(|(i, def)| {
            format!(
                "(?:{}(?P<g{i}>.*?){})",
                regex::escape(&def.open),
                regex::escape(&def.close)
            )
        })
        .collect();
    let pattern = format!("(?s){}", alternatives.join("|"));
    let re = Regex::new(&pattern).map_err(FilterError::from)?;

    let mut payloads = Vec::new();
    for caps in re.captures_iter(text) {
        for (i, def) in registry.defs().iter().enumerate() {
            if let Some(inner) = caps.name(&format!("g{i}")) {
                payloads.push(RawPayload::new(def.kind, inner.as_str()));
                break;
            }
        }
    }
    Ok(payloads)
}
