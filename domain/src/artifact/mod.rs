//! Versioned artifacts and property-level changesets

pub mod changeset;
pub mod entities;

pub use changeset::{Change, ChangeSet};
pub use entities::{Artifact, ArtifactMetadata, Iteration, PropertyDiff, StateMap};
