//! Danbooru API client: candidate listing and file download.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slideshow::{Fetcher, ImageSource, Query};

pub const BASE_URL: &str = "https://danbooru.donmai.us";

const USER_AGENT: &str = concat!("wallpaper_slideshow/", env!("CARGO_PKG_VERSION"));
/// Posts returned per page of the listing endpoint.
const PAGE_LIMIT: u32 = 100;
const LIST_TIMEOUT: Duration = Duration::from_secs(15);
// File payloads are much larger than the metadata listing.
const FILE_TIMEOUT: Duration = Duration::from_secs(20);

/// Content rating constraint understood by the posts endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    General,
    Sensitive,
    Questionable,
    Explicit,
}

impl Rating {
    pub const ALL: [Rating; 4] = [
        Rating::General,
        Rating::Sensitive,
        Rating::Questionable,
        Rating::Explicit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::General => "general",
            Rating::Sensitive => "sensitive",
            Rating::Questionable => "questionable",
            Rating::Explicit => "explicit",
        }
    }
}

impl std::str::FromStr for Rating {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Rating::ALL
            .into_iter()
            .find(|rating| rating.as_str() == value)
            .ok_or_else(|| anyhow::anyhow!("unknown rating: {value}"))
    }
}

/// One post record from the listing endpoint, reduced to the fields the
/// slideshow needs. Some posts come back without a file; the filter
/// rejects those.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub id: u64,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_ext: Option<String>,
    #[serde(default, rename = "image_width")]
    pub width: u32,
    #[serde(default, rename = "image_height")]
    pub height: u32,
}

impl Candidate {
    /// Human-facing post page for status attribution.
    pub fn post_url(&self) -> String {
        format!("{BASE_URL}/posts/{}", self.id)
    }
}

/// Failures of either remote call, with HTTP status outcomes kept apart
/// from connectivity and timeout outcomes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub struct DanbooruClient {
    list: reqwest::blocking::Client,
    file: reqwest::blocking::Client,
}

impl DanbooruClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            list: build_client(LIST_TIMEOUT)?,
            file: build_client(FILE_TIMEOUT)?,
        })
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

impl ImageSource for DanbooruClient {
    fn fetch_candidates(&self, query: &Query, page: u32) -> Result<Vec<Candidate>, FetchError> {
        let response = self
            .list
            .get(format!("{BASE_URL}/posts.json"))
            .query(&[
                ("tags", query.search_tags()),
                ("limit", PAGE_LIMIT.to_string()),
                ("page", page.to_string()),
            ])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        Ok(response.json()?)
    }
}

impl Fetcher for DanbooruClient {
    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.file.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_deserializes_from_posts_json() {
        let json = r#"[
            {
                "id": 42,
                "file_url": "https://cdn.donmai.us/original/ab/cd/abcdef123.jpg",
                "file_ext": "jpg",
                "image_width": 1920,
                "image_height": 1080,
                "tag_string": "1girl solo"
            },
            {
                "id": 43,
                "image_width": 1280,
                "image_height": 720
            }
        ]"#;
        let candidates: Vec<Candidate> = serde_json::from_str(json).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, 42);
        assert_eq!(
            candidates[0].file_url.as_deref(),
            Some("https://cdn.donmai.us/original/ab/cd/abcdef123.jpg")
        );
        assert_eq!(candidates[0].file_ext.as_deref(), Some("jpg"));
        assert_eq!((candidates[0].width, candidates[0].height), (1920, 1080));
        assert_eq!(candidates[1].file_url, None);
        assert_eq!(candidates[1].file_ext, None);
    }

    #[test]
    fn post_url_is_derived_from_the_id() {
        let candidate = Candidate {
            id: 7077888,
            file_url: None,
            file_ext: None,
            width: 0,
            height: 0,
        };
        assert_eq!(candidate.post_url(), "https://danbooru.donmai.us/posts/7077888");
    }

    #[test]
    fn rating_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&Rating::General).unwrap(), "\"general\"");
        assert_eq!(
            serde_json::from_str::<Rating>("\"questionable\"").unwrap(),
            Rating::Questionable
        );
        for rating in Rating::ALL {
            assert_eq!(rating.as_str().parse::<Rating>().unwrap(), rating);
        }
        assert!("safe".parse::<Rating>().is_err());
    }
}
