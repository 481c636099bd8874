//! Cache module for deduplicating outbound API requests
//!
//! This module provides an in-memory cache keyed by canonical request URL with a
//! configurable TTL (time-to-live). Expired entries are treated as absent, and
//! concurrent lookups for the same key share a single fetch.

mod manager;

pub use manager::{CacheEntry, RequestCache};
