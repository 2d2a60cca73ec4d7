//! Convenient re-exports for tests.
//!
//! ```rust
//! use patchbay_test::prelude::*;
//! ```

pub use crate::fixtures::{
    init_test_logging, test_config, test_coordinator, test_module_id, test_origin, test_scope,
    test_store,
};
pub use crate::mocks::{HostCall, MockScriptHost, RecordingModule};
