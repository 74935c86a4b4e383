//! Playback Resolution
//!
//! The gate decides whether playback is allowed; a [`PlaybackResolver`]
//! selected by the video's `integration_type` decides how. New providers
//! plug in through [`ResolverRegistry`] without touching the gate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::entity::protected_video::ProtectedVideo;

/// What the client should render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackKind {
    /// Embeddable player markup
    Embed,
    /// Time-limited or direct URL
    Url,
}

/// Resolver output passed through to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackDescriptor {
    #[serde(rename = "type")]
    pub kind: PlaybackKind,
    pub provider: String,
    /// Provider-specific fields (`embed_html`, `playback_url`, `expires_in`, ...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("video {0} has no provider reference")]
    MissingReference(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Provider-specific playback strategy
pub trait PlaybackResolver: Send + Sync {
    fn resolve(
        &self,
        video: &ProtectedVideo,
        now: DateTime<Utc>,
    ) -> Result<PlaybackDescriptor, ResolveError>;
}

/// Resolvers keyed by integration type
#[derive(Default, Clone)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn PlaybackResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        integration_type: impl Into<String>,
        resolver: Arc<dyn PlaybackResolver>,
    ) -> Self {
        self.resolvers.insert(integration_type.into(), resolver);
        self
    }

    pub fn get(&self, integration_type: &str) -> Option<&Arc<dyn PlaybackResolver>> {
        self.resolvers.get(integration_type)
    }

    /// Registered integration types, sorted
    pub fn integration_types(&self) -> Vec<&str> {
        let mut types = self.resolvers.keys().map(String::as_str).collect::<Vec<_>>();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("integration_types", &self.integration_types())
            .finish()
    }
}
