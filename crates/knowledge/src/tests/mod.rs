//! Cross-module tests for the knowledge crate.
