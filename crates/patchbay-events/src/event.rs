//! Coordinator-side event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patchbay_core::{DesiredStateChange, InjectionId, Mode, ScopeKey};

/// Metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event id.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Component that published the event.
    pub source: String,
}

impl EventMetadata {
    /// Create metadata for an event published by `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// Discriminant of [`PatchbayEvent`], used for receiver-side filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`PatchbayEvent::DesiredStateChanged`].
    DesiredStateChanged,
    /// [`PatchbayEvent::ModeChanged`].
    ModeChanged,
    /// [`PatchbayEvent::RegistrationCreated`].
    RegistrationCreated,
    /// [`PatchbayEvent::RegistrationRemoved`].
    RegistrationRemoved,
}

/// An event on the coordinator bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatchbayEvent {
    /// The desired module set of a scope was written or removed.
    DesiredStateChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// What changed.
        change: DesiredStateChange,
    },
    /// The process-wide mode was switched.
    ModeChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// Mode before the switch.
        from: Mode,
        /// Mode after the switch.
        to: Mode,
    },
    /// The host accepted a new registration.
    RegistrationCreated {
        /// Event metadata.
        metadata: EventMetadata,
        /// Registry key.
        scope_key: ScopeKey,
        /// Host-side id.
        injection_id: InjectionId,
    },
    /// A registration was removed from the host.
    RegistrationRemoved {
        /// Event metadata.
        metadata: EventMetadata,
        /// Registry key, if the registration was tracked in the live registry.
        scope_key: Option<ScopeKey>,
        /// Host-side id.
        injection_id: InjectionId,
    },
}

impl PatchbayEvent {
    /// The event's discriminant.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DesiredStateChanged { .. } => EventKind::DesiredStateChanged,
            Self::ModeChanged { .. } => EventKind::ModeChanged,
            Self::RegistrationCreated { .. } => EventKind::RegistrationCreated,
            Self::RegistrationRemoved { .. } => EventKind::RegistrationRemoved,
        }
    }

    /// Stable snake_case name of the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self.kind() {
            EventKind::DesiredStateChanged => "desired_state_changed",
            EventKind::ModeChanged => "mode_changed",
            EventKind::RegistrationCreated => "registration_created",
            EventKind::RegistrationRemoved => "registration_removed",
        }
    }

    /// The event's metadata.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::DesiredStateChanged { metadata, .. }
            | Self::ModeChanged { metadata, .. }
            | Self::RegistrationCreated { metadata, .. }
            | Self::RegistrationRemoved { metadata, .. } => metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_core::Scope;

    #[test]
    fn test_event_type_names() {
        let event = PatchbayEvent::DesiredStateChanged {
            metadata: EventMetadata::new("test"),
            change: DesiredStateChange {
                scope_key: Scope::Global,
                new_module_ids: None,
            },
        };
        assert_eq!(event.event_type(), "desired_state_changed");
        assert_eq!(event.kind(), EventKind::DesiredStateChanged);
        assert_eq!(event.metadata().source, "test");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PatchbayEvent::ModeChanged {
            metadata: EventMetadata::new("test"),
            from: Mode::Standard,
            to: Mode::Global,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "mode_changed");
        assert_eq!(json["to"], "global");
    }
}
