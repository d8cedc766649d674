//! Thread-safe associative storage
//!
//! This module provides:
//! - [`ConcurrentMap`] - a reader/writer-locked map with snapshot iteration
//!
//! The map is the storage primitive other components (response caches,
//! routing tables) build on. Callers own key construction: a cache that keys
//! by path alone will collide across methods, and the map cannot detect that.

mod concurrent_map;

pub use concurrent_map::ConcurrentMap;
