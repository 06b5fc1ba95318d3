use crate::model::Song;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BUNDLED_CATEGORIES: &str = include_str!("../assets/categories.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagGroup {
    Tempo,
    Mood,
    Kind,
    Curator,
    Country,
}

impl TagGroup {
    pub const ALL: [TagGroup; 5] = [
        TagGroup::Tempo,
        TagGroup::Mood,
        TagGroup::Kind,
        TagGroup::Curator,
        TagGroup::Country,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Tempo => "Tempo",
            Self::Mood => "Mood",
            Self::Kind => "Type",
            Self::Curator => "Curator",
            Self::Country => "Country",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tempo" => Some(Self::Tempo),
            "mood" => Some(Self::Mood),
            "kind" | "type" => Some(Self::Kind),
            "curator" => Some(Self::Curator),
            "country" => Some(Self::Country),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryEntry {
    pub tag: String,
    pub group: TagGroup,
    pub label: String,
}

/// Explicit tag token to group mapping. Tokens absent from the map belong to
/// no group.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    entries: Vec<CategoryEntry>,
    lookup: HashMap<String, usize>,
}

impl CategoryMap {
    pub fn bundled() -> Self {
        match Self::from_json(BUNDLED_CATEGORIES) {
            Ok(map) => map,
            Err(err) => {
                log::error!("bundled category map is invalid: {err:#}");
                Self::default()
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: Vec<CategoryEntry> =
            serde_json::from_str(raw).context("failed to parse category map")?;
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read category map {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn from_entries(entries: Vec<CategoryEntry>) -> Self {
        let mut map = Self::default();
        for entry in entries {
            if map.lookup.contains_key(&entry.tag) {
                log::warn!("duplicate category tag {:?} ignored", entry.tag);
                continue;
            }
            map.lookup.insert(entry.tag.clone(), map.entries.len());
            map.entries.push(entry);
        }
        map
    }

    pub fn group_of(&self, tag: &str) -> Option<TagGroup> {
        self.entry(tag).map(|entry| entry.group)
    }

    pub fn label_of<'a>(&'a self, tag: &'a str) -> &'a str {
        self.entry(tag).map_or(tag, |entry| entry.label.as_str())
    }

    pub fn country_labels<'a>(&'a self, song: &'a Song) -> impl Iterator<Item = &'a str> + 'a {
        song.tags.iter().filter_map(|tag| {
            self.entry(tag)
                .filter(|entry| entry.group == TagGroup::Country)
                .map(|entry| entry.label.as_str())
        })
    }

    /// Tags of `group` carried by at least one song, in map order.
    pub fn tags_in_group(&self, group: TagGroup, songs: &[Song]) -> Vec<&CategoryEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.group == group)
            .filter(|entry| songs.iter().any(|song| song.has_tag(&entry.tag)))
            .collect()
    }

    /// Resolves a token or a case-insensitive label within `group`.
    pub fn find_tag(&self, group: TagGroup, needle: &str) -> Option<&str> {
        let needle = needle.trim();
        self.entries
            .iter()
            .filter(|entry| entry.group == group)
            .find(|entry| entry.tag == needle || entry.label.eq_ignore_ascii_case(needle))
            .map(|entry| entry.tag.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, tag: &str) -> Option<&CategoryEntry> {
        self.lookup.get(tag).and_then(|idx| self.entries.get(*idx))
    }
}
