//! Integration tests for the full evaluation pipeline.

mod integration_tests;
