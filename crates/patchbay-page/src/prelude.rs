//! Prelude module - commonly used types for convenient import.
//!
//! Use `use patchbay_page::prelude::*;` to import all essential types.

// Realm
pub use crate::{PageRealm, PageStorage, WindowId};

// Protocol
pub use crate::{
    Activation, ActivationOutcome, BridgedSettings, CapabilityModule, ModuleError, ModuleResult,
    ModuleRuntime,
};

// Messaging
pub use crate::{BridgeKeys, CapturePayload, ReadySignal};
