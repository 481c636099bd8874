//! Plain-text rendering of API results for the terminal

use serde_json::Value;

use crate::data::{Anime, CharacterRole, Recommendation};

/// One-line summary of an anime: id, title and whatever metadata is known
pub fn anime_line(anime: &Anime) -> String {
    let mut details = Vec::new();
    if let Some(kind) = &anime.kind {
        details.push(kind.clone());
    }
    if let Some(episodes) = anime.episodes {
        details.push(format!("{} eps", episodes));
    }
    if let Some(year) = anime.year {
        details.push(year.to_string());
    }
    if let Some(score) = anime.score {
        details.push(format!("score {:.2}", score));
    }

    if details.is_empty() {
        format!("{:>6}  {}", anime.mal_id, anime.display_title())
    } else {
        format!(
            "{:>6}  {}  ({})",
            anime.mal_id,
            anime.display_title(),
            details.join(", ")
        )
    }
}

/// Multi-line detail view of an anime
pub fn anime_details(anime: &Anime) -> String {
    let mut lines = vec![anime_line(anime)];

    if anime.title_english.is_some() && anime.title != anime.display_title() {
        lines.push(format!("        Romaji: {}", anime.title));
    }
    if let Some(japanese) = &anime.title_japanese {
        lines.push(format!("        Japanese: {}", japanese));
    }
    if let Some(status) = &anime.status {
        lines.push(format!("        Status: {}", status));
    }
    if !anime.genres.is_empty() {
        let genres: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
        lines.push(format!("        Genres: {}", genres.join(", ")));
    }
    if let Some(url) = &anime.url {
        lines.push(format!("        {}", url));
    }
    if let Some(synopsis) = &anime.synopsis {
        lines.push(String::new());
        lines.push(synopsis.trim().to_string());
    }

    lines.join("\n")
}

pub fn character_line(role: &CharacterRole) -> String {
    match &role.role {
        Some(kind) => format!("{:>6}  {}  ({})", role.character.mal_id, role.character.name, kind),
        None => format!("{:>6}  {}", role.character.mal_id, role.character.name),
    }
}

pub fn recommendation_line(rec: &Recommendation) -> String {
    match rec.votes {
        Some(votes) => format!("{:>6}  {}  ({} votes)", rec.entry.mal_id, rec.entry.name, votes),
        None => format!("{:>6}  {}", rec.entry.mal_id, rec.entry.name),
    }
}

/// Pretty JSON for `--json` output
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Pretty JSON for an untyped listing
pub fn values_json(values: &[Value]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(values)
}
