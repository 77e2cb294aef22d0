//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest orientation value the tracker reports for a face.
const MAX_FACE: u8 = 8;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// An activity key was not of the form `projectId.activityId`.
    #[error("invalid activity key {value:?}: expected \"projectId.activityId\"")]
    InvalidActivityKey { value: String },

    /// A side mapping entry could not be parsed.
    #[error("side {index}: {source}")]
    InvalidSide {
        index: usize,
        #[source]
        source: Box<Self>,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifier the remote service assigned to a time entry.
    ///
    /// Treated as opaque: the service uses integers, but nothing here relies
    /// on that.
    EntryId, "entry ID"
);

/// A raw orientation reading from the tracker.
///
/// `0` and `9` mean the tracker rests in its base, `1..=8` name a face.
/// Any other byte is treated like the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Orientation(u8);

/// Where the tracker currently is, derived from an [`Orientation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Resting in the base (or an unexpected reading).
    Base,
    /// Lying on a face, `1..=8`.
    Face(u8),
}

impl Orientation {
    /// Resting-in-base orientation used to seed an idle machine.
    pub const BASE: Self = Self(0);

    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn placement(self) -> Placement {
        if self.0 >= 1 && self.0 <= MAX_FACE {
            Placement::Face(self.0)
        } else {
            Placement::Base
        }
    }
}

impl From<u8> for Orientation {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A billable task in the remote service: a project and one of its activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityKey {
    pub project: u64,
    pub activity: u64,
}

impl ActivityKey {
    #[must_use]
    pub const fn new(project: u64, activity: u64) -> Self {
        Self { project, activity }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.activity)
    }
}

impl FromStr for ActivityKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidActivityKey {
            value: s.to_string(),
        };
        let (project, activity) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            project: project.parse().map_err(|_| invalid())?,
            activity: activity.parse().map_err(|_| invalid())?,
        })
    }
}

/// Static table from tracker face to activity.
///
/// Indexed by orientation value. Only faces `1..=8` are ever looked up;
/// other indices may be present in configuration but are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideMapping {
    sides: Vec<Option<ActivityKey>>,
}

impl SideMapping {
    /// Parses configured side strings. Blank entries mean "no activity".
    ///
    /// Every non-blank entry is validated, so malformed configuration fails
    /// here instead of on the first flip.
    pub fn parse<S: AsRef<str>>(sides: &[S]) -> Result<Self, ValidationError> {
        let sides = sides
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                let raw = raw.as_ref().trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<ActivityKey>()
                    .map(Some)
                    .map_err(|err| ValidationError::InvalidSide {
                        index,
                        source: Box::new(err),
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { sides })
    }

    /// Activity assigned to `face`, if any.
    #[must_use]
    pub fn activity_for(&self, face: u8) -> Option<ActivityKey> {
        if !(1..=MAX_FACE).contains(&face) {
            return None;
        }
        self.sides.get(usize::from(face)).copied().flatten()
    }

    /// First face mapped to `key`.
    #[must_use]
    pub fn face_for(&self, key: ActivityKey) -> Option<u8> {
        (1..=MAX_FACE).find(|&face| self.activity_for(face) == Some(key))
    }

    /// Mapped faces in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, ActivityKey)> + '_ {
        (1..=MAX_FACE).filter_map(|face| self.activity_for(face).map(|key| (face, key)))
    }
}
