//! Opaque identifiers for timelines, segments and owners

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "tauri", derive(specta::Type))]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id! {
    /// Identifier of a persisted timeline.
    TimelineId
}

string_id! {
    /// Identifier of a segment, stable across edits.
    SegmentId
}

string_id! {
    /// Identifier of the entity that owns a timeline (typically a project).
    OwnerId
}

impl SegmentId {
    /// Generate a fresh identifier for a segment created in a draft.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_segment_ids_are_unique() {
        let a = SegmentId::generate();
        let b = SegmentId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TimelineId::from("tl-42");
        let yaml = serde_yaml_ng::to_string(&id).unwrap();
        assert_eq!(yaml.trim(), "tl-42");
        assert_eq!(id.to_string(), "tl-42");
    }
}
