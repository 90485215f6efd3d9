//! Quadtree integration tests: persistence, search modes and file validation.

mod quadtree_persistence_test;
mod quadtree_search_test;
