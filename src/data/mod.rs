//! Core data models for Anidex
//!
//! This module contains the data types decoded from the Jikan API: anime
//! entries, character roles and recommendations, plus the fixed table of
//! genres offered for browsing.

pub mod jikan;
pub mod query;

pub use jikan::{Envelope, JikanClient, JikanError, Relation};
pub use query::{ParamValue, Params};

use serde::{Deserialize, Serialize};

/// An anime entry as returned by the `anime` family of endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anime {
    /// MyAnimeList identifier
    pub mal_id: u32,
    /// Canonical MyAnimeList page
    pub url: Option<String>,
    /// Default (romanized) title
    pub title: String,
    /// English title, if one is published
    pub title_english: Option<String>,
    /// Japanese title
    pub title_japanese: Option<String>,
    /// Plot summary
    pub synopsis: Option<String>,
    /// Media type (TV, Movie, OVA, ...)
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Episode count; absent while airing with an unknown total
    pub episodes: Option<u32>,
    /// Airing status
    pub status: Option<String>,
    /// Mean user score
    pub score: Option<f64>,
    /// Rank by score
    pub rank: Option<u32>,
    /// Rank by membership
    pub popularity: Option<u32>,
    /// Premiere year
    pub year: Option<i32>,
    /// Cover art
    pub images: Option<Images>,
    #[serde(default)]
    pub genres: Vec<Named>,
}

impl Anime {
    /// Title to show to users, preferring the English title
    pub fn display_title(&self) -> &str {
        self.title_english.as_deref().unwrap_or(&self.title)
    }

    /// Best available cover image URL
    pub fn image_url(&self) -> Option<&str> {
        let jpg = self.images.as_ref()?.jpg.as_ref()?;
        jpg.large_image_url
            .as_deref()
            .or(jpg.image_url.as_deref())
    }
}

/// Image variants keyed by format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Images {
    pub jpg: Option<ImageSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    pub image_url: Option<String>,
    pub large_image_url: Option<String>,
}

/// A reference to another MyAnimeList resource (genre, character, anime)
///
/// Jikan names this field `name` for genres and characters but `title` for
/// anime references, so both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Named {
    pub mal_id: u32,
    #[serde(alias = "title")]
    pub name: String,
    pub url: Option<String>,
}

/// A character appearing in an anime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRole {
    pub character: Named,
    /// Main or Supporting
    pub role: Option<String>,
    pub favorites: Option<u32>,
}

/// A browsable genre
///
/// Only implements `Serialize`: genres are looked up from `GENRES` rather than
/// decoded from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Genre {
    /// MyAnimeList genre id
    pub id: u32,
    /// Display name
    pub name: &'static str,
}

/// Genres offered for browsing
pub const GENRES: [Genre; 12] = [
    Genre { id: 1, name: "Action" },
    Genre { id: 2, name: "Adventure" },
    Genre { id: 4, name: "Comedy" },
    Genre { id: 8, name: "Drama" },
    Genre { id: 10, name: "Fantasy" },
    Genre { id: 14, name: "Horror" },
    Genre { id: 7, name: "Mystery" },
    Genre { id: 22, name: "Romance" },
    Genre { id: 24, name: "Sci-Fi" },
    Genre { id: 36, name: "Slice of Life" },
    Genre { id: 37, name: "Supernatural" },
    Genre { id: 41, name: "Thriller" },
];

/// Looks up a browsable genre by id
pub fn get_genre_by_id(id: u32) -> Option<Genre> {
    GENRES.iter().copied().find(|genre| genre.id == id)
}

/// Looks up a browsable genre by id or by name
///
/// Names match case-insensitively and ignore separators, so
/// "slice-of-life", "Slice of Life" and "scifi" all resolve.
pub fn find_genre(s: &str) -> Option<Genre> {
    let s = s.trim();
    if let Ok(id) = s.parse::<u32>() {
        return get_genre_by_id(id);
    }

    let wanted = normalize_genre_name(s);
    GENRES
        .iter()
        .copied()
        .find(|genre| normalize_genre_name(genre.name) == wanted)
}

fn normalize_genre_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// A user recommendation pointing at another anime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub entry: Named,
    pub votes: Option<u32>,
}
