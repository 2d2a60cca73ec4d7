//! Per-navigation tracing context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patchbay_core::Origin;

/// Correlation context for one page navigation.
///
/// The bridge run and every module activation of a navigation log inside
/// the span returned by [`NavigationContext::span`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationContext {
    /// Unique navigation id.
    pub navigation_id: Uuid,
    /// Correlation id shared with related work (e.g. a reload chain).
    pub correlation_id: Uuid,
    /// Origin being loaded.
    pub origin: Origin,
    /// When the navigation started.
    pub started_at: DateTime<Utc>,
}

impl NavigationContext {
    /// Context for a navigation to `origin`.
    #[must_use]
    pub fn new(origin: Origin) -> Self {
        let id = Uuid::new_v4();
        Self {
            navigation_id: id,
            correlation_id: id,
            origin,
            started_at: Utc::now(),
        }
    }

    /// Reuse an existing navigation id (e.g. the page realm's).
    #[must_use]
    pub fn with_navigation_id(mut self, id: Uuid) -> Self {
        self.navigation_id = id;
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Time since the navigation started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        // started_at is taken at construction, so this is never negative
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed
    }

    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed().num_milliseconds()
    }

    /// Span carrying this context.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "navigation",
            navigation_id = %self.navigation_id,
            correlation_id = %self.correlation_id,
            origin = %self.origin,
        )
    }
}

/// Enters the navigation span and logs its duration on drop.
pub struct NavigationGuard {
    context: NavigationContext,
    _span: tracing::span::EnteredSpan,
}

impl NavigationGuard {
    /// Enter `context`'s span.
    #[must_use]
    pub fn new(context: NavigationContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("Navigation started");
        Self {
            context,
            _span: span,
        }
    }

    /// The guarded context.
    #[must_use]
    pub fn context(&self) -> &NavigationContext {
        &self.context
    }
}

impl Drop for NavigationGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "Navigation finished");
    }
}
