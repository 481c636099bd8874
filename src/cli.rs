//! Command-line interface parsing for Anidex
//!
//! This module handles parsing of CLI arguments using clap: global client
//! settings (which may also come from `ANIDEX_*` environment variables) and one
//! subcommand per API operation.

use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{ClientConfig, JIKAN_BASE_URL};
use crate::data::jikan::{DEFAULT_GENRE_LIMIT, DEFAULT_SEARCH_LIMIT, DEFAULT_TRENDING_LIMIT};
use crate::data::{find_genre, Genre, Relation, GENRES};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified relation name is not recognized
    #[error("Invalid relation: '{0}'. Valid relations: characters, recommendations")]
    InvalidRelation(String),

    /// The specified genre is not in the browsable set
    #[error("Invalid genre: '{0}'. Run `anidex genres` to list valid genres")]
    InvalidGenre(String),

    /// A retry budget of zero would never send a request
    #[error("Invalid --max-attempts: must be at least 1")]
    InvalidAttempts,

    #[error("Invalid --base-url: must not be empty")]
    EmptyBaseUrl,
}

/// Anidex - Search and browse anime from MyAnimeList
#[derive(Parser, Debug)]
#[command(name = "anidex")]
#[command(about = "Search and browse anime via the Jikan (MyAnimeList) API")]
#[command(version)]
pub struct Cli {
    /// Root of the Jikan API
    #[arg(long, env = "ANIDEX_BASE_URL", default_value = JIKAN_BASE_URL)]
    pub base_url: String,

    /// Seconds a cached response stays fresh
    #[arg(long, env = "ANIDEX_CACHE_TTL_SECS", default_value_t = 300)]
    pub ttl_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "ANIDEX_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Attempts per request while the API is rate limiting
    #[arg(long, env = "ANIDEX_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Print raw JSON instead of a listing
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// API operations exposed as subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Search anime by title
    Search {
        /// Free-text query
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: u32,
    },
    /// Show details for one anime
    Show {
        /// MyAnimeList id
        id: u32,
        /// Also list the anime's characters
        #[arg(long)]
        characters: bool,
    },
    /// List top currently-airing anime
    Trending {
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_TRENDING_LIMIT)]
        limit: u32,
    },
    /// List characters or recommendations for an anime
    ///
    /// Valid relations: characters, recommendations
    Related {
        /// MyAnimeList id
        id: u32,
        #[arg(value_parser = parse_relation_arg)]
        relation: Relation,
    },
    /// Browse the most popular anime in a genre
    Genre {
        /// Genre name or MyAnimeList genre id (see `anidex genres`)
        #[arg(value_parser = parse_genre_arg)]
        genre: Genre,
        /// Maximum number of results
        #[arg(short, long, default_value_t = DEFAULT_GENRE_LIMIT)]
        limit: u32,
    },
    /// List the genres available for browsing
    Genres,
}

/// Parses a relation string argument into a Relation.
///
/// # Arguments
/// * `s` - The relation string from CLI
///
/// # Returns
/// * `Ok(Relation)` if the string matches a valid relation
/// * `Err(CliError::InvalidRelation)` if the string doesn't match
pub fn parse_relation_arg(s: &str) -> Result<Relation, CliError> {
    Relation::parse(s).ok_or_else(|| CliError::InvalidRelation(s.to_string()))
}

/// Parses a genre argument, by name or id, into one of the browsable genres.
///
/// # Returns
/// * `Ok(Genre)` if the name or id is listed in `GENRES`
/// * `Err(CliError::InvalidGenre)` otherwise
pub fn parse_genre_arg(s: &str) -> Result<Genre, CliError> {
    find_genre(s).ok_or_else(|| CliError::InvalidGenre(s.to_string()))
}

/// Lines printed by `anidex genres`
pub fn genre_listing() -> Vec<String> {
    GENRES
        .iter()
        .map(|genre| format!("{:>6}  {}", genre.id, genre.name))
        .collect()
}

impl ClientConfig {
    /// Creates a ClientConfig from parsed CLI arguments.
    ///
    /// Pacing settings not exposed on the command line keep their defaults.
    ///
    /// # Returns
    /// * `Ok(ClientConfig)` with the requested settings
    /// * `Err(CliError)` if a setting is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.max_attempts == 0 {
            return Err(CliError::InvalidAttempts);
        }
        if cli.base_url.trim().is_empty() {
            return Err(CliError::EmptyBaseUrl);
        }

        Ok(ClientConfig {
            base_url: cli.base_url.trim().to_string(),
            cache_ttl: Duration::from_secs(cli.ttl_secs),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            max_attempts: cli.max_attempts,
            ..ClientConfig::default()
        })
    }
}
