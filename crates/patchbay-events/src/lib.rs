//! Patchbay Events - Event bus for the patchbay coordinator.
//!
//! This crate provides:
//! - [`PatchbayEvent`], the coordinator-side notifications (desired-state
//!   changes, mode transitions, registration lifecycle)
//! - [`EventBus`], a broadcast bus that delivers every event to every
//!   receiver in publish order
//!
//! # Example
//!
//! ```rust
//! use patchbay_core::Mode;
//! use patchbay_events::{EventBus, EventMetadata, PatchbayEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(PatchbayEvent::ModeChanged {
//!     metadata: EventMetadata::new("mode_manager"),
//!     from: Mode::Standard,
//!     to: Mode::Global,
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "mode_changed");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventKind, EventMetadata, PatchbayEvent};
