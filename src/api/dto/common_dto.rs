//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ConnectionSummary;
use crate::persistence::Page;

/// Offset/limit query parameters for history endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Messages to skip, newest first. Defaults to 0.
    pub offset: Option<u32>,
    /// Messages to return. Defaults to and is capped at the configured
    /// maximum.
    pub limit: Option<u32>,
}

impl HistoryQuery {
    /// Converts the query into a clamped [`Page`].
    #[must_use]
    pub fn page(&self, max_limit: u32) -> Page {
        Page::new(self.offset, self.limit, max_limit)
    }
}

/// Live connection statistics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Registered connections.
    pub connections: usize,
    /// One summary per registered connection.
    pub live: Vec<ConnectionSummary>,
}
