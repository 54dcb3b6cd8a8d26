//! Shared test utilities for carryon
//!
//! This module provides common helpers for the integration tests:
//! - Snapshot and database-dump fixtures
//! - Pre-seeded in-memory storage bridges

pub mod fixtures;
