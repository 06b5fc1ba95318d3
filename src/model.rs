use serde::{Deserialize, Serialize};

pub type SongId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: SongId,
    #[serde(alias = "judul")]
    pub title: String,
    #[serde(alias = "link")]
    pub source_ref: String,
    #[serde(alias = "tahun", default)]
    pub year: String,
    #[serde(alias = "added", default, skip_serializing_if = "Option::is_none")]
    pub added_on: Option<String>,
    #[serde(alias = "playlist", default)]
    pub tags: Vec<String>,
}

impl Song {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self != Self::Off
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Repeat off",
            Self::All => "Repeat all",
            Self::One => "Repeat one",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Catalog,
    TitleAsc,
    TitleDesc,
    YearAsc,
    YearDesc,
    AddedAsc,
    AddedDesc,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            Self::Catalog => Self::TitleAsc,
            Self::TitleAsc => Self::TitleDesc,
            Self::TitleDesc => Self::YearAsc,
            Self::YearAsc => Self::YearDesc,
            Self::YearDesc => Self::AddedAsc,
            Self::AddedAsc => Self::AddedDesc,
            Self::AddedDesc => Self::Catalog,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Catalog => "Catalog order",
            Self::TitleAsc => "Title A-Z",
            Self::TitleDesc => "Title Z-A",
            Self::YearAsc => "Year oldest",
            Self::YearDesc => "Year newest",
            Self::AddedAsc => "Added oldest",
            Self::AddedDesc => "Added newest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "catalog" => Some(Self::Catalog),
            "title" | "title-asc" => Some(Self::TitleAsc),
            "title-desc" => Some(Self::TitleDesc),
            "year" | "year-asc" => Some(Self::YearAsc),
            "year-desc" => Some(Self::YearDesc),
            "added" | "added-asc" => Some(Self::AddedAsc),
            "added-desc" => Some(Self::AddedDesc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub month_names: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<String>,
}

fn default_volume() -> u8 {
    50
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            sort: SortOrder::default(),
            catalog: None,
            month_names: None,
            categories: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_cycles_off_all_one() {
        assert_eq!(RepeatMode::Off.next(), RepeatMode::All);
        assert_eq!(RepeatMode::All.next(), RepeatMode::One);
        assert_eq!(RepeatMode::One.next(), RepeatMode::Off);
    }

    #[test]
    fn song_accepts_legacy_endpoint_fields() {
        let raw = r#"{
            "id": 29,
            "judul": "LATHI, Weird Genius, Sara Fajira",
            "link": "https://www.youtube.com/watch?v=DJSPhdOcj6M",
            "tahun": "2020 Februari 28",
            "added": "20 Mei 2020",
            "playlist": ["b", "1", "6", "8", "9", "301"]
        }"#;
        let song: Song = serde_json::from_str(raw).expect("parse");
        assert_eq!(song.id, 29);
        assert_eq!(song.added_on.as_deref(), Some("20 Mei 2020"));
        assert!(song.has_tag("301"));
    }

    #[test]
    fn song_serializes_camel_case_without_missing_added_on() {
        let song = Song {
            id: 1,
            title: String::from("Death Bed"),
            source_ref: String::from("https://www.youtube.com/watch?v=YefncL4TagU"),
            year: String::from("2019?"),
            added_on: None,
            tags: vec![String::from("b")],
        };
        let json = serde_json::to_string(&song).expect("serialize");
        assert!(json.contains("\"sourceRef\""));
        assert!(!json.contains("addedOn"));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: Settings = serde_json::from_str("{}").expect("parse");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.volume, 50);
    }

    #[test]
    fn sort_order_cycle_returns_to_catalog() {
        let mut order = SortOrder::Catalog;
        for _ in 0..7 {
            order = order.next();
        }
        assert_eq!(order, SortOrder::Catalog);
        assert_eq!(SortOrder::parse("added-desc"), Some(SortOrder::AddedDesc));
        assert_eq!(SortOrder::parse("bogus"), None);
    }
}
