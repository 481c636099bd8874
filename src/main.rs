//! Anidex - Search and browse anime from the terminal
//!
//! A command-line front end for the Jikan API that searches titles, lists
//! trending and per-genre anime, and shows details for a single entry.

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use anidex::cli::{genre_listing, Cli, Command};
use anidex::config::ClientConfig;
use anidex::data::{JikanClient, Relation, GENRES};
use anidex::output;

/// Sends log output to stderr, filtered by `RUST_LOG` (warnings only by default)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anidex=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Runs one subcommand against the API and prints its result
async fn run(client: &JikanClient, command: &Command, json: bool) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Search { query, limit } => {
            let results = client.search_anime(query, *limit).await?;
            if json {
                println!("{}", output::to_json(&results)?);
            } else if results.is_empty() {
                eprintln!("No anime found for '{}'", query);
            } else {
                results.iter().for_each(|anime| println!("{}", output::anime_line(anime)));
            }
        }
        Command::Show { id, characters } => {
            let (anime, cast) = if *characters {
                futures::future::try_join(client.anime_by_id(*id), client.characters(*id)).await?
            } else {
                (client.anime_by_id(*id).await?, Vec::new())
            };

            let Some(anime) = anime else {
                return Err(format!("No anime found with id {}", id).into());
            };

            if json {
                println!("{}", output::to_json(&anime)?);
                if *characters {
                    println!("{}", output::to_json(&cast)?);
                }
            } else {
                println!("{}", output::anime_details(&anime));
                if *characters {
                    println!("\nCharacters:");
                    cast.iter().for_each(|role| println!("{}", output::character_line(role)));
                }
            }
        }
        Command::Trending { limit } => {
            let results = client.trending_anime(*limit).await?;
            if json {
                println!("{}", output::to_json(&results)?);
            } else {
                results.iter().for_each(|anime| println!("{}", output::anime_line(anime)));
            }
        }
        Command::Related { id, relation } => {
            if json {
                let entries = client.related(*id, *relation).await?;
                println!("{}", output::values_json(&entries)?);
                return Ok(());
            }
            match relation {
                Relation::Characters => client
                    .characters(*id)
                    .await?
                    .iter()
                    .for_each(|role| println!("{}", output::character_line(role))),
                Relation::Recommendations => client
                    .recommendations(*id)
                    .await?
                    .iter()
                    .for_each(|rec| println!("{}", output::recommendation_line(rec))),
            }
        }
        Command::Genre { genre, limit } => {
            let results = client.anime_by_genre(genre.id, *limit).await?;
            if json {
                println!("{}", output::to_json(&results)?);
            } else {
                println!("{} anime", genre.name);
                results.iter().for_each(|anime| println!("{}", output::anime_line(anime)));
            }
        }
        Command::Genres => {
            if json {
                println!("{}", output::to_json(&GENRES)?);
            } else {
                genre_listing().iter().for_each(|line| println!("{}", line));
            }
        }
    }

    Ok(())
}

/// Builds the client from CLI settings and runs the requested command
async fn try_main(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = ClientConfig::from_cli(&cli)?;
    let client = JikanClient::new(config)?;

    run(&client, &cli.command, cli.json).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match try_main(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
