//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the report store backends and media storage.

pub mod persistence;
pub mod storage;
