//! Core data models for the media catalog.
//!
//! These entities are the snapshots handed out by the catalog service and
//! serialize naturally as JSON via `serde`. The mutable bookkeeping behind
//! them lives in `services`.

pub mod cover;
pub mod playlist;
pub mod track;
