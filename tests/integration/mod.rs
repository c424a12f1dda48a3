//! Integration test suite for EMBPM
//!
//! End-to-end tests against real git repositories published on disk and reached
//! through `file://` URLs, plus CLI tests running the `embpm` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **git_access**: cloning, tag enumeration and pinned selection
//! - **hierarchy**: target hierarchies installed from repositories
//! - **installer**: dependency graphs, partial failure and idempotence
//! - **cli**: `embpm target` exit codes and persisted settings

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod git_access;
mod hierarchy;
mod installer;
