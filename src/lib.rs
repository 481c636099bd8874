//! Anidex Library
//!
//! A cached, rate-limit-aware client for the Jikan (MyAnimeList) API, plus the
//! CLI definitions used by the `anidex` binary.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod output;
