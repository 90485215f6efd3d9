//! Tests of the shared test runner.
