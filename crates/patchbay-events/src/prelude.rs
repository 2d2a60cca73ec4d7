//! Prelude module - commonly used types for convenient import.
//!
//! Use `use patchbay_events::prelude::*;` to import all essential types.

pub use crate::{EventBus, EventKind, EventMetadata, EventReceiver, PatchbayEvent};
