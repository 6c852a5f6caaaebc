//! UI-facing event types.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them as JSON to any front end.

pub mod events;
