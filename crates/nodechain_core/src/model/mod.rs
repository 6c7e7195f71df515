//! Tree record model.
//!
//! # Responsibility
//! - Define the node record shared by store, engine and callers.
//!
//! # Invariants
//! - Sibling order lives only in `prev_id`/`next_id`; there is no index field.

pub mod node;
