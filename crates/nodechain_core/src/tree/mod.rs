//! Ordered tree engine.
//!
//! # Responsibility
//! - Keep child order as an embedded prev/next chain per parent.
//! - Expose navigation, placement checks, assembly, mutations and events.
//!
//! # See also
//! - `crate::store` for the record-level persistence seam.

pub mod assembler;
pub mod engine;
pub mod error;
pub mod events;
pub mod navigator;
pub mod placement;
pub mod session;

pub use engine::{Destination, DropPosition, TreeEngine};
pub use error::{ChainFault, DestinationError, TreeError, TreeResult};
pub use events::{event_channel, TreeEvent, TREE_EVENT_CHANNEL_CAPACITY};
pub use placement::PlacementValidator;
pub use session::ViewState;
