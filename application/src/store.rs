//! Artifact store
//!
//! Owns the versioned state of artifacts and their append-only evolution
//! logs. Commits for a given artifact are strictly serialized behind a
//! per-artifact mutex so version numbers stay gapless; evolution on
//! distinct artifacts proceeds fully in parallel.
//!
//! The store is constructor-scoped: it holds exactly the artifacts created
//! through it and drops them with the owner, no implicit global growth.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use coevolve_domain::{
    Artifact, ArtifactId, ArtifactMetadata, ChangeSet, DomainError, EvolutionEvent, Iteration,
    ParticipantId, PropertyDiff, StateMap,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Outcome of applying a changeset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ApplyOutcome {
    /// Every entry was a no-op after normalization; no iteration created
    NoOp,
    Applied { version: u64, changes: ChangeSet },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    pub fn applied_changes(&self) -> Option<&ChangeSet> {
        match self {
            ApplyOutcome::Applied { changes, .. } => Some(changes),
            ApplyOutcome::NoOp => None,
        }
    }
}

/// Export granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Metadata plus current state
    Summary,
    /// All iterations plus the evolution log
    Full,
}

impl std::str::FromStr for ExportMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" | "json" => Ok(ExportMode::Summary),
            "full" => Ok(ExportMode::Full),
            other => Err(DomainError::validation(format!(
                "unsupported export mode '{other}'"
            ))),
        }
    }
}

/// Export payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ArtifactExport {
    Summary {
        metadata: ArtifactMetadata,
        current_state: StateMap,
        version: u64,
        exported: DateTime<Utc>,
    },
    Full {
        artifact: Artifact,
        log: Vec<EvolutionEvent>,
        exported: DateTime<Utc>,
    },
}

/// Full history view: iterations plus evolution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHistory {
    pub artifact_id: ArtifactId,
    pub created: DateTime<Utc>,
    pub current_version: u64,
    pub iterations: Vec<Iteration>,
    pub log: Vec<EvolutionEvent>,
}

struct ArtifactRecord {
    artifact: Artifact,
    log: Vec<EvolutionEvent>,
}

/// Repository of versioned artifacts with serialized per-artifact commits
#[derive(Default)]
pub struct ArtifactStore {
    // Outer lock guards the index only; each artifact carries its own
    // mutex, the single-writer discipline for commits.
    inner: RwLock<HashMap<ArtifactId, Arc<Mutex<ArtifactRecord>>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new artifact at version 1
    pub async fn create(
        &self,
        initial_state: StateMap,
        metadata: ArtifactMetadata,
    ) -> Result<Artifact, EngineError> {
        let artifact = Artifact::new(initial_state, metadata);
        let snapshot = artifact.clone();
        info!(artifact = %artifact.id, "created artifact");

        self.inner.write().await.insert(
            artifact.id.clone(),
            Arc::new(Mutex::new(ArtifactRecord {
                artifact,
                log: Vec::new(),
            })),
        );
        Ok(snapshot)
    }

    async fn record(&self, id: &ArtifactId) -> Result<Arc<Mutex<ArtifactRecord>>, EngineError> {
        self.inner
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("artifact {id}")).into())
    }

    /// Current state of an artifact
    pub async fn current_state(&self, id: &ArtifactId) -> Result<StateMap, EngineError> {
        let record = self.record(id).await?;
        let guard = record.lock().await;
        Ok(guard.artifact.current_state.clone())
    }

    /// Snapshot of the whole artifact
    pub async fn artifact(&self, id: &ArtifactId) -> Result<Artifact, EngineError> {
        let record = self.record(id).await?;
        let guard = record.lock().await;
        guard.artifact.check_integrity()?;
        Ok(guard.artifact.clone())
    }

    /// Normalize and apply a changeset under the artifact's write lock.
    ///
    /// No-op entries are filtered against the live state; if nothing
    /// survives, no iteration is created and `ApplyOutcome::NoOp` is
    /// returned.
    pub async fn apply_change_set(
        &self,
        id: &ArtifactId,
        changeset: ChangeSet,
        contributors: Vec<ParticipantId>,
    ) -> Result<ApplyOutcome, EngineError> {
        let record = self.record(id).await?;
        let mut guard = record.lock().await;

        let normalized = changeset.normalize_against(&guard.artifact.current_state);
        if normalized.is_empty() {
            debug!(artifact = %id, "changeset reduced to no-op, skipping iteration");
            return Ok(ApplyOutcome::NoOp);
        }

        let version = guard.artifact.commit(normalized.clone(), contributors)?;
        info!(artifact = %id, version, changes = normalized.len(), "applied changeset");
        Ok(ApplyOutcome::Applied {
            version,
            changes: normalized,
        })
    }

    /// Properties differing between two iterations
    pub async fn diff(
        &self,
        id: &ArtifactId,
        v1: u64,
        v2: u64,
    ) -> Result<Vec<PropertyDiff>, EngineError> {
        let record = self.record(id).await?;
        let guard = record.lock().await;
        Ok(guard.artifact.diff(v1, v2)?)
    }

    /// Append to the artifact's evolution log
    pub async fn record_event(
        &self,
        id: &ArtifactId,
        event: EvolutionEvent,
    ) -> Result<(), EngineError> {
        let record = self.record(id).await?;
        record.lock().await.log.push(event);
        Ok(())
    }

    /// Iterations plus evolution log
    pub async fn history(&self, id: &ArtifactId) -> Result<ArtifactHistory, EngineError> {
        let record = self.record(id).await?;
        let guard = record.lock().await;
        guard.artifact.check_integrity()?;
        Ok(ArtifactHistory {
            artifact_id: guard.artifact.id.clone(),
            created: guard.artifact.created,
            current_version: guard.artifact.current_version,
            iterations: guard.artifact.iterations.clone(),
            log: guard.log.clone(),
        })
    }

    /// Export in the requested mode
    pub async fn export(
        &self,
        id: &ArtifactId,
        mode: ExportMode,
    ) -> Result<ArtifactExport, EngineError> {
        let record = self.record(id).await?;
        let guard = record.lock().await;
        guard.artifact.check_integrity()?;

        Ok(match mode {
            ExportMode::Summary => ArtifactExport::Summary {
                metadata: guard.artifact.metadata.clone(),
                current_state: guard.artifact.current_state.clone(),
                version: guard.artifact.current_version,
                exported: Utc::now(),
            },
            ExportMode::Full => ArtifactExport::Full {
                artifact: guard.artifact.clone(),
                log: guard.log.clone(),
                exported: Utc::now(),
            },
        })
    }
}
