//! Core domain model types for stackflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds, action kinds and action status
//! - Artifacts and their payload handles
//! - The per-run artifact store

mod artifact;
mod status;
mod store;

pub use artifact::{Artifact, ArtifactName, PayloadHandle};
pub use status::{ActionKind, ActionStatus, StageKind};
pub use store::ArtifactStore;
