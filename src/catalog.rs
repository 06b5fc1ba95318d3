use crate::model::Song;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const BUNDLED_CATALOG: &str = include_str!("../assets/catalog.json");

/// Source of the full song list. No parameters, no pagination.
pub trait CatalogProvider {
    fn fetch(&mut self) -> Result<Vec<Song>>;
    fn describe(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BundledCatalog;

impl CatalogProvider for BundledCatalog {
    fn fetch(&mut self) -> Result<Vec<Song>> {
        parse_catalog(BUNDLED_CATALOG).context("bundled catalog is invalid")
    }

    fn describe(&self) -> String {
        String::from("bundled catalog")
    }
}

#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CatalogProvider for FileCatalog {
    fn fetch(&mut self) -> Result<Vec<Song>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read catalog {}", self.path.display()))?;
        parse_catalog(&raw).with_context(|| format!("in {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct HttpCatalog {
    url: String,
    http_client: ureq::Agent,
}

impl HttpCatalog {
    pub fn new(url: &str) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(15))
            .build();
        Self {
            url: url.trim().to_string(),
            http_client,
        }
    }
}

impl CatalogProvider for HttpCatalog {
    fn fetch(&mut self) -> Result<Vec<Song>> {
        let songs: Vec<Song> = self
            .http_client
            .get(&self.url)
            .call()
            .with_context(|| format!("catalog request to {} failed", self.url))?
            .into_json()
            .with_context(|| format!("failed to parse song list from {}", self.url))?;
        Ok(dedupe_songs(songs))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Picks a provider for a `--catalog` style source: http(s) URLs are fetched,
/// anything else is a file path, and no source means the bundled list.
pub fn provider_for(source: Option<&str>) -> Box<dyn CatalogProvider> {
    match source.map(str::trim).filter(|value| !value.is_empty()) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Box::new(HttpCatalog::new(url))
        }
        Some(path) => Box::new(FileCatalog::new(PathBuf::from(path))),
        None => Box::new(BundledCatalog),
    }
}

/// Parses a JSON song array, keeping the first song for each id.
pub fn parse_catalog(raw: &str) -> Result<Vec<Song>> {
    let songs: Vec<Song> = serde_json::from_str(raw).context("failed to parse song list")?;
    Ok(dedupe_songs(songs))
}

fn dedupe_songs(songs: Vec<Song>) -> Vec<Song> {
    let mut seen = HashSet::with_capacity(songs.len());
    let mut unique = Vec::with_capacity(songs.len());
    for song in songs {
        if !seen.insert(song.id) {
            log::warn!("duplicate song id {} ({}) dropped", song.id, song.title);
            continue;
        }
        unique.push(song);
    }
    unique
}

pub fn bundled_songs() -> Vec<Song> {
    BundledCatalog.fetch().unwrap_or_else(|err| {
        log::error!("{err:#}");
        Vec::new()
    })
}
