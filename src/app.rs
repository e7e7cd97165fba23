//! Line-oriented control surface over the slideshow controller.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use crate::danbooru::{DanbooruClient, Rating};
use crate::settings::{self, AppSettings};
use crate::slideshow::{Fetcher, ImageSource, Query, SlideshowController, SlideshowState};
use crate::staging::StagingStore;
use crate::wallpaper::SystemWallpaper;

pub fn run() -> Result<()> {
    let mut settings = settings::load();
    let client = Arc::new(DanbooruClient::new()?);
    let staging = StagingStore::open_default()?;
    tracing::debug!("staging directory: {}", staging.dir().display());
    let mut controller = SlideshowController::new(
        Arc::clone(&client) as Arc<dyn ImageSource>,
        client as Arc<dyn Fetcher>,
        Arc::new(SystemWallpaper),
        staging,
    );
    if controller.recover_previous().is_some() {
        println!("{}", controller.status());
    }

    print_help();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        let (command, rest) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (input, ""),
        };
        match command {
            "" => {}
            "start" => {
                controller.start(query_from_settings(&settings));
                println!("{}", controller.status());
            }
            "pause" => {
                controller.pause();
                println!("{}", controller.status());
            }
            "resume" => {
                controller.resume();
                println!("{}", controller.status());
            }
            "stop" => {
                controller.stop();
                println!("{}", controller.status());
            }
            "status" => println!("{}", controller.status()),
            "path" => match controller.current_image_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No wallpaper has been set in this session yet."),
            },
            "source" => match controller.current_image().and_then(|image| image.post_url) {
                Some(url) => println!("{url}"),
                None => println!("No source is recorded for the current wallpaper."),
            },
            "save" => match controller.save_current() {
                Ok(path) => println!("Wallpaper saved to {}", path.display()),
                Err(err) => println!("Save failed: {err:#}"),
            },
            // The query is locked while a session runs.
            "tags" | "rating" | "interval" if controller.state() != SlideshowState::Stopped => {
                println!("Stop the slideshow before changing settings.");
            }
            "tags" => {
                if rest.is_empty() {
                    println!("Tags: {}", settings.tags);
                } else {
                    settings.tags = rest.to_string();
                    persist(&settings);
                }
            }
            "rating" => {
                if rest.is_empty() {
                    println!("Rating: {}", settings.rating.as_str());
                } else {
                    match rest.parse::<Rating>() {
                        Ok(rating) => {
                            settings.rating = rating;
                            persist(&settings);
                        }
                        Err(err) => println!("{err}"),
                    }
                }
            }
            "interval" => {
                if rest.is_empty() {
                    println!("Interval: {} s", settings.interval_secs);
                } else {
                    match rest.parse::<u64>() {
                        Ok(secs) if secs > 0 => {
                            settings.interval_secs = secs;
                            persist(&settings);
                        }
                        _ => println!("The interval must be a positive number of seconds."),
                    }
                }
            }
            "help" | "?" => print_help(),
            "quit" | "exit" => break,
            other => println!("Unknown command: {other}"),
        }
    }

    controller.stop();
    Ok(())
}

fn query_from_settings(settings: &AppSettings) -> Query {
    Query {
        tags: settings.tags.split_whitespace().map(str::to_owned).collect(),
        rating: settings.rating,
        interval_secs: settings.interval_secs,
    }
}

fn persist(settings: &AppSettings) {
    if let Err(err) = settings::save(settings) {
        println!("Could not save settings: {err:#}");
    }
}

fn print_help() {
    println!("Commands:");
    println!("  start            begin the slideshow with the current settings");
    println!("  pause / resume   suspend or continue the running slideshow");
    println!("  stop             end the slideshow");
    println!("  status           show the latest progress line");
    println!("  path             print the current wallpaper file");
    println!("  source           print the post page the wallpaper came from");
    println!("  save             copy the current wallpaper to the save folder");
    println!("  tags [value]     show or change the search tags");
    println!("  rating [value]   show or change the rating (general, sensitive, questionable, explicit)");
    println!("  interval [secs]  show or change the slideshow interval");
    println!("  quit             stop and exit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_splits_tags_on_whitespace() {
        let settings = AppSettings {
            tags: String::from("  genshin_impact   1girl "),
            rating: Rating::Sensitive,
            interval_secs: 120,
        };
        let query = query_from_settings(&settings);
        assert_eq!(query.tags, ["genshin_impact", "1girl"]);
        assert_eq!(query.rating, Rating::Sensitive);
        assert_eq!(query.interval_secs, 120);
        assert_eq!(query.search_tags(), "genshin_impact 1girl rating:sensitive");
    }
}
