//! Registry integration tests over in-memory range files.

mod registry_persistence_test;
mod registry_query_test;
