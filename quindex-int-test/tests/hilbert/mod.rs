//! Hilbert mapping laws checked through the public API.
