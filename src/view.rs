use crate::dates::{self, MonthTable};
use crate::model::{Song, SortOrder};
use crate::tags::{CategoryMap, TagGroup};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

/// Single-select tag filter per group plus a free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    active: BTreeMap<TagGroup, String>,
    pub search: String,
}

impl FilterState {
    /// Selecting the already active tag clears the group; `None` always
    /// clears it.
    pub fn toggle(&mut self, group: TagGroup, tag: Option<&str>) {
        match tag {
            Some(tag) if self.active.get(&group).map(String::as_str) != Some(tag) => {
                self.active.insert(group, tag.to_string());
            }
            _ => {
                self.active.remove(&group);
            }
        }
    }

    pub fn active(&self, group: TagGroup) -> Option<&str> {
        self.active.get(&group).map(String::as_str)
    }

    pub fn active_filters(&self) -> impl Iterator<Item = (TagGroup, &str)> {
        self.active.iter().map(|(group, tag)| (*group, tag.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.search.is_empty()
    }

    pub fn matches(&self, song: &Song, categories: &CategoryMap) -> bool {
        self.active.values().all(|tag| song.has_tag(tag)) && self.matches_search(song, categories)
    }

    fn matches_search(&self, song: &Song, categories: &CategoryMap) -> bool {
        let needle = self.search.to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let contains = |value: &str| value.to_lowercase().contains(&needle);
        contains(&song.title)
            || contains(&song.year)
            || song.added_on.as_deref().is_some_and(contains)
            || categories.country_labels(song).any(contains)
    }
}

/// Indices into `songs` that pass `filter`, ordered by `sort`. Sorting is
/// stable, so equal keys keep catalog order.
pub fn build_view(
    songs: &[Song],
    filter: &FilterState,
    sort: SortOrder,
    categories: &CategoryMap,
    months: &MonthTable,
) -> Vec<usize> {
    let mut view: Vec<usize> = songs
        .iter()
        .enumerate()
        .filter(|(_, song)| filter.matches(song, categories))
        .map(|(idx, _)| idx)
        .collect();

    match sort {
        SortOrder::Catalog => {}
        SortOrder::TitleAsc => view.sort_by(|a, b| compare_titles(&songs[*a], &songs[*b])),
        SortOrder::TitleDesc => view.sort_by(|a, b| compare_titles(&songs[*b], &songs[*a])),
        SortOrder::YearAsc => view.sort_by(|a, b| songs[*a].year.cmp(&songs[*b].year)),
        SortOrder::YearDesc => view.sort_by(|a, b| songs[*b].year.cmp(&songs[*a].year)),
        SortOrder::AddedAsc => view.sort_by_cached_key(|idx| {
            dates::added_sort_key(songs[*idx].added_on.as_deref(), months)
        }),
        SortOrder::AddedDesc => view.sort_by_cached_key(|idx| {
            Reverse(dates::added_sort_key(songs[*idx].added_on.as_deref(), months))
        }),
    }

    view
}

fn compare_titles(a: &Song, b: &Song) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(id: u32, title: &str, year: &str, added: Option<&str>, tags: &[&str]) -> Song {
        Song {
            id,
            title: title.to_string(),
            source_ref: format!("https://www.youtube.com/watch?v=id{id}"),
            year: year.to_string(),
            added_on: added.map(str::to_string),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn catalog() -> Vec<Song> {
        vec![
            song(1, "Death Bed", "2019?", Some("25 Maret 2020"), &["b", "2", "d", "60"]),
            song(2, "Peradaban", "2018 Juli 13", Some("13 Mei 2020"), &["b", "3", "6", "9"]),
            song(3, "Bali", "2020 April", None, &["b", "2", "5", "9"]),
            song(4, "Where Have You Been", "2012", Some("9 November 2025"), &["b", "1", "6", "60"]),
            song(5, "after hours", "2012", Some("bogus"), &["c", "3"]),
        ]
    }

    fn view_ids(songs: &[Song], filter: &FilterState, sort: SortOrder) -> Vec<u32> {
        build_view(
            songs,
            filter,
            sort,
            &CategoryMap::bundled(),
            &MonthTable::default(),
        )
        .into_iter()
        .map(|idx| songs[idx].id)
        .collect()
    }

    #[test]
    fn group_filters_combine_with_and() {
        let songs = catalog();
        let mut filter = FilterState::default();
        filter.toggle(TagGroup::Tempo, Some("2"));
        filter.toggle(TagGroup::Country, Some("9"));
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![3]);
    }

    #[test]
    fn toggling_same_tag_twice_clears_group() {
        let songs = catalog();
        let unfiltered = view_ids(&songs, &FilterState::default(), SortOrder::Catalog);

        let mut filter = FilterState::default();
        filter.toggle(TagGroup::Mood, Some("6"));
        assert_eq!(filter.active(TagGroup::Mood), Some("6"));
        filter.toggle(TagGroup::Mood, Some("6"));
        assert_eq!(filter.active(TagGroup::Mood), None);

        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), unfiltered);
    }

    #[test]
    fn selecting_other_tag_replaces_group_filter() {
        let mut filter = FilterState::default();
        filter.toggle(TagGroup::Mood, Some("6"));
        filter.toggle(TagGroup::Mood, Some("5"));
        assert_eq!(filter.active(TagGroup::Mood), Some("5"));
        filter.toggle(TagGroup::Mood, None);
        assert!(filter.is_empty());
    }

    #[test]
    fn search_covers_title_year_added_and_country() {
        let songs = catalog();
        let mut filter = FilterState::default();

        filter.search = String::from("BALI");
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![3]);

        filter.search = String::from("2012");
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![4, 5]);

        filter.search = String::from("mei 2020");
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![2]);

        filter.search = String::from("kingdom");
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![1, 4]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let songs = catalog();
        let view = view_ids(&songs, &FilterState::default(), SortOrder::TitleAsc);
        assert_eq!(view, vec![5, 3, 1, 2, 4]);
    }

    #[test]
    fn year_sort_is_lexicographic_on_display_string() {
        let songs = catalog();
        let view = view_ids(&songs, &FilterState::default(), SortOrder::YearDesc);
        assert_eq!(view, vec![3, 1, 2, 4, 5]);
    }

    #[test]
    fn added_sort_puts_unparseable_dates_first() {
        let songs = catalog();
        let asc = view_ids(&songs, &FilterState::default(), SortOrder::AddedAsc);
        assert_eq!(asc, vec![3, 5, 1, 2, 4]);

        let desc = view_ids(&songs, &FilterState::default(), SortOrder::AddedDesc);
        assert_eq!(desc, vec![4, 2, 1, 3, 5]);
    }

    #[test]
    fn whitespace_search_is_a_literal_substring() {
        let songs = vec![
            song(1, "Death Bed", "2019", None, &["b"]),
            song(2, "Bali", "2020", None, &["b"]),
        ];
        let mut filter = FilterState {
            search: String::from(" "),
            ..FilterState::default()
        };
        assert!(!filter.is_empty());
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![1]);

        filter.search = String::from("h b");
        assert_eq!(view_ids(&songs, &filter, SortOrder::Catalog), vec![1]);
    }

    #[test]
    fn restoring_search_reproduces_view() {
        let songs = catalog();
        let mut filter = FilterState {
            search: String::from("20"),
            ..FilterState::default()
        };
        let before = view_ids(&songs, &filter, SortOrder::AddedDesc);
        filter.search = String::from("bali");
        assert_ne!(view_ids(&songs, &filter, SortOrder::AddedDesc), before);
        filter.search = String::from("20");
        assert_eq!(view_ids(&songs, &filter, SortOrder::AddedDesc), before);
    }
}
