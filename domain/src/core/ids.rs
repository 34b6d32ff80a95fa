//! Identifier newtypes
//!
//! Ids are prefixed UUID strings so they stay readable in logs and event
//! payloads ("artifact-…", "consensus-…").

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a versioned artifact
    ArtifactId,
    "artifact"
);

string_id!(
    /// Identifier of a single voting session
    SessionId,
    "consensus"
);

string_id!(
    /// Identifier of a voting participant (agent, human, or "system")
    ParticipantId,
    "participant"
);

impl ParticipantId {
    /// The reserved actor id used for system-initiated modifications
    pub fn system() -> Self {
        Self("system".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = ArtifactId::generate();
        let b = ArtifactId::generate();
        assert!(a.as_str().starts_with("artifact-"));
        assert_ne!(a, b);

        assert!(SessionId::generate().as_str().starts_with("consensus-"));
    }

    #[test]
    fn test_id_from_str_round_trips() {
        let id = ParticipantId::from("agent-minimalist-1");
        assert_eq!(id.to_string(), "agent-minimalist-1");
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = ArtifactId::from("artifact-42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"artifact-42\"");
    }
}
