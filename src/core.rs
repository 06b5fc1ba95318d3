use crate::catalog::CatalogProvider;
use crate::config::QueueStore;
use crate::dates::MonthTable;
use crate::model::{RepeatMode, Settings, Song, SongId, SortOrder};
use crate::tags::{CategoryMap, TagGroup};
use crate::view::{self, FilterState};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::time::{Duration, Instant};

const NOTIFICATION_TTL: Duration = Duration::from_secs(3);
pub const MAX_VOLUME: u8 = 100;
/// Sink error code reported while the player service is unstable.
pub const TRANSIENT_SINK_ERROR: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndAction {
    Replay,
    Advance,
    Stop,
}

/// Playback and queue controller. Owns the catalog snapshot, the filtered
/// view, the user queue, shuffle order and the current selection. Every
/// operation is an in-memory transition; storage failures are logged.
pub struct PlayerCore {
    pub songs: Vec<Song>,
    pub categories: CategoryMap,
    pub months: MonthTable,
    filter: FilterState,
    sort: SortOrder,
    view: Vec<usize>,
    queue: Vec<Song>,
    shuffled_order: Vec<Song>,
    pub current: Option<Song>,
    selection: u64,
    pub is_playing: bool,
    pub is_from_queue: bool,
    repeat: RepeatMode,
    shuffled: bool,
    pub volume: u8,
    pub player_ready: bool,
    pub elapsed: Duration,
    pub duration: Duration,
    pending_seek: Option<Duration>,
    clear_requested: bool,
    catalog_loaded: bool,
    notification: Option<Notification>,
    pub dirty: bool,
    store: Box<dyn QueueStore>,
    shuffle_rng: SmallRng,
}

impl PlayerCore {
    pub fn new(store: Box<dyn QueueStore>, categories: CategoryMap, months: MonthTable) -> Self {
        let queue = match store.load() {
            Ok(queue) => queue,
            Err(err) => {
                log::error!("failed to restore queue, starting empty: {err:#}");
                Vec::new()
            }
        };
        if !queue.is_empty() {
            log::info!("restored queue with {} songs", queue.len());
        }

        Self {
            songs: Vec::new(),
            categories,
            months,
            filter: FilterState::default(),
            sort: SortOrder::default(),
            view: Vec::new(),
            queue,
            shuffled_order: Vec::new(),
            current: None,
            selection: 0,
            is_playing: false,
            is_from_queue: false,
            repeat: RepeatMode::Off,
            shuffled: false,
            volume: 50,
            player_ready: false,
            elapsed: Duration::ZERO,
            duration: Duration::ZERO,
            pending_seek: None,
            clear_requested: false,
            catalog_loaded: false,
            notification: None,
            dirty: true,
            store,
            shuffle_rng: rand::make_rng(),
        }
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.set_volume(settings.volume);
        self.set_sort(settings.sort);
    }

    pub fn settings_snapshot(&self, base: &Settings) -> Settings {
        Settings {
            volume: self.volume,
            sort: self.sort,
            ..base.clone()
        }
    }

    /// Fetches the catalog once. A failed fetch leaves the catalog empty.
    pub fn load_catalog(&mut self, provider: &mut dyn CatalogProvider) {
        if self.catalog_loaded {
            log::debug!("catalog already loaded, ignoring reload request");
            return;
        }
        self.catalog_loaded = true;

        let loaded = match provider.fetch() {
            Ok(songs) => {
                log::info!("loaded {} songs from {}", songs.len(), provider.describe());
                self.songs = songs;
                true
            }
            Err(err) => {
                log::error!("failed to load catalog from {}: {err:#}", provider.describe());
                self.songs.clear();
                self.notify("Could not load the song list", NoticeKind::Warning);
                false
            }
        };
        self.rebuild_view();

        let restored = self
            .queue
            .first()
            .and_then(|first| self.catalog_song(first.id))
            .cloned();
        self.is_from_queue = restored.is_some();
        self.current = restored.or_else(|| self.songs.first().cloned());
        self.selection = self.selection.wrapping_add(1);

        if loaded && !self.songs.is_empty() {
            self.resolve_queue_against_catalog();
        }
        self.dirty = true;
    }

    pub fn catalog_loaded(&self) -> bool {
        self.catalog_loaded
    }

    pub fn catalog_song(&self, id: SongId) -> Option<&Song> {
        self.songs.iter().find(|song| song.id == id)
    }

    pub fn view_songs(&self) -> impl Iterator<Item = &Song> + '_ {
        self.view.iter().filter_map(|idx| self.songs.get(*idx))
    }

    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    pub fn view_song(&self, position: usize) -> Option<&Song> {
        self.view.get(position).and_then(|idx| self.songs.get(*idx))
    }

    pub fn queue(&self) -> &[Song] {
        &self.queue
    }

    pub fn shuffled_order(&self) -> &[Song] {
        &self.shuffled_order
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Changes whenever a song is (re)started, including restarting the same
    /// song.
    pub fn selection(&self) -> u64 {
        self.selection
    }

    pub fn is_current(&self, id: SongId) -> bool {
        self.current.as_ref().is_some_and(|song| song.id == id)
    }

    pub fn select_song(&mut self, song: &Song) {
        let Some(song) = self.catalog_song(song.id).cloned() else {
            log::debug!("ignoring selection of unknown song {}", song.id);
            return;
        };
        self.start(song, false);
    }

    pub fn play_queue_item(&mut self, index: usize) {
        let Some(song) = self
            .queue
            .get(index)
            .and_then(|entry| self.catalog_song(entry.id))
            .cloned()
        else {
            return;
        };
        self.start(song, true);
    }

    pub fn play_next(&mut self) {
        self.step(true);
    }

    pub fn play_previous(&mut self) {
        self.step(false);
    }

    pub fn toggle_shuffle(&mut self) {
        if self.shuffled {
            self.shuffled = false;
            self.shuffled_order.clear();
            self.notify("Shuffle off", NoticeKind::Info);
            return;
        }

        self.repeat = RepeatMode::Off;
        let source: Vec<Song> = if !self.queue.is_empty() && self.is_from_queue {
            self.queue.clone()
        } else {
            self.view_songs().cloned().collect()
        };
        let current_id = self.current.as_ref().map(|song| song.id);
        let mut order: Vec<Song> = source
            .into_iter()
            .filter(|song| Some(song.id) != current_id)
            .collect();
        order.shuffle(&mut self.shuffle_rng);
        if let Some(current) = self.current.clone() {
            order.insert(0, current);
        }
        self.shuffled_order = order;
        self.shuffled = true;
        self.notify("Shuffle on", NoticeKind::Info);
    }

    pub fn cycle_repeat(&mut self) {
        self.repeat = self.repeat.next();
        if self.repeat.is_on() {
            self.shuffled = false;
            self.shuffled_order.clear();
        }
        self.notify(self.repeat.label(), NoticeKind::Info);
    }

    pub fn on_track_ended(&mut self) -> TrackEndAction {
        if self.repeat == RepeatMode::One {
            self.is_playing = true;
            self.elapsed = Duration::ZERO;
            self.dirty = true;
            return TrackEndAction::Replay;
        }

        if self.repeat == RepeatMode::All || self.is_from_queue || !self.queue.is_empty() {
            self.play_next();
            return TrackEndAction::Advance;
        }

        self.is_playing = false;
        self.dirty = true;
        TrackEndAction::Stop
    }

    pub fn on_player_ready(&mut self, duration: Duration) {
        self.player_ready = true;
        self.duration = duration;
        self.dirty = true;
    }

    pub fn on_playback_state(&mut self, playing: bool) {
        if self.is_playing != playing {
            self.is_playing = playing;
            self.dirty = true;
        }
    }

    pub fn on_sink_error(&mut self, code: i32) {
        if code == TRANSIENT_SINK_ERROR {
            log::warn!("player reported transient error {code}");
            self.notify(
                "Player service is unstable, try again in a moment",
                NoticeKind::Warning,
            );
            return;
        }

        log::error!("player error {code}, stopping playback");
        self.is_playing = false;
        self.dirty = true;
    }

    pub fn on_progress(&mut self, elapsed: Duration) {
        if self.elapsed != elapsed {
            self.elapsed = elapsed;
            self.dirty = true;
        }
    }

    /// Clears readouts for a freshly constructed sink.
    pub fn reset_progress(&mut self) {
        self.player_ready = false;
        self.elapsed = Duration::ZERO;
        self.duration = Duration::ZERO;
        self.pending_seek = None;
        self.dirty = true;
    }

    /// Queues the catalog copy of `song`. Ids missing from the catalog are ignored.
    pub fn add_to_queue(&mut self, song: &Song) {
        let Some(song) = self.catalog_song(song.id).cloned() else {
            log::warn!("not queueing unknown song {} ({})", song.id, song.title);
            return;
        };
        self.queue.retain(|entry| entry.id != song.id);
        let title = song.title.clone();
        self.queue.push(song);
        self.persist_queue();
        self.notify(&format!("Added \"{title}\" to queue"), NoticeKind::Info);
    }

    pub fn remove_from_queue(&mut self, index: usize) -> bool {
        if index >= self.queue.len() {
            return false;
        }
        self.queue.remove(index);
        self.persist_queue();
        self.dirty = true;
        true
    }

    pub fn reorder_queue(&mut self, from: usize, to: usize) -> bool {
        if from >= self.queue.len() {
            return false;
        }
        let moved = self.queue.remove(from);
        let to = to.min(self.queue.len());
        self.queue.insert(to, moved);
        self.persist_queue();
        self.dirty = true;
        true
    }

    /// First step of clearing the queue; nothing changes until confirmed.
    pub fn request_clear_queue(&mut self) {
        if self.queue.is_empty() {
            self.notify("Queue is already empty", NoticeKind::Info);
            return;
        }
        self.clear_requested = true;
        self.dirty = true;
    }

    pub fn clear_pending(&self) -> bool {
        self.clear_requested
    }

    pub fn confirm_clear_queue(&mut self) {
        if !std::mem::take(&mut self.clear_requested) {
            return;
        }
        self.queue.clear();
        self.persist_queue();
        self.notify("Queue cleared", NoticeKind::Info);
    }

    pub fn cancel_clear_queue(&mut self) {
        self.clear_requested = false;
        self.dirty = true;
    }

    pub fn set_filter(&mut self, group: TagGroup, tag: Option<&str>) {
        self.filter.toggle(group, tag);
        self.rebuild_view();
    }

    pub fn set_search_query(&mut self, text: &str) {
        self.filter.search = text.to_string();
        self.rebuild_view();
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
        self.rebuild_view();
    }

    pub fn toggle_play(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.is_playing = !self.is_playing;
        self.dirty = true;
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        self.dirty = true;
    }

    pub fn seek_to(&mut self, position: Duration) {
        if self.current.is_none() {
            return;
        }
        let position = if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        };
        self.elapsed = position;
        self.pending_seek = Some(position);
        self.dirty = true;
    }

    pub fn take_pending_seek(&mut self) -> Option<Duration> {
        self.pending_seek.take()
    }

    pub fn notify(&mut self, message: &str, kind: NoticeKind) {
        self.notification = Some(Notification {
            message: message.to_string(),
            kind,
            expires_at: Instant::now() + NOTIFICATION_TTL,
        });
        self.dirty = true;
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn expire_notification(&mut self, now: Instant) {
        if self
            .notification
            .as_ref()
            .is_some_and(|notification| notification.expires_at <= now)
        {
            self.notification = None;
            self.dirty = true;
        }
    }

    fn step(&mut self, forward: bool) {
        let Some(current_id) = self.current.as_ref().map(|song| song.id) else {
            return;
        };

        if self.is_from_queue
            && let Some(position) = self.queue.iter().position(|song| song.id == current_id)
        {
            let next = circular_index(position, self.queue.len(), forward);
            let next_id = self.queue[next].id;
            if let Some(song) = self.catalog_song(next_id).cloned() {
                self.start(song, true);
                return;
            }
            log::warn!("queued song {next_id} is not in the catalog");
        }

        let target = {
            let list: Vec<&Song> = if self.shuffled && !self.shuffled_order.is_empty() {
                self.shuffled_order.iter().collect()
            } else {
                self.view_songs().collect()
            };
            if list.is_empty() {
                None
            } else {
                let next = match list.iter().position(|song| song.id == current_id) {
                    Some(position) => circular_index(position, list.len(), forward),
                    None if forward => 0,
                    None => list.len() - 1,
                };
                Some(list[next].clone())
            }
        };

        match target {
            Some(song) => self.start(song, false),
            None => {
                self.is_playing = false;
                self.dirty = true;
            }
        }
    }

    fn start(&mut self, song: Song, from_queue: bool) {
        self.current = Some(song);
        self.selection = self.selection.wrapping_add(1);
        self.is_playing = true;
        self.is_from_queue = from_queue;
        self.dirty = true;
    }

    fn rebuild_view(&mut self) {
        self.view = view::build_view(
            &self.songs,
            &self.filter,
            self.sort,
            &self.categories,
            &self.months,
        );
        self.dirty = true;
    }

    fn resolve_queue_against_catalog(&mut self) {
        let before = self.queue.len();
        let resolved: Vec<Song> = self
            .queue
            .iter()
            .filter_map(|entry| self.catalog_song(entry.id).cloned())
            .collect();
        let changed = resolved != self.queue;
        self.queue = resolved;
        if before != self.queue.len() {
            log::warn!(
                "dropped {} queued songs missing from the catalog",
                before - self.queue.len()
            );
        }
        if changed {
            self.persist_queue();
        }
    }

    fn persist_queue(&mut self) {
        if let Err(err) = self.store.save(&self.queue) {
            log::error!("failed to persist queue: {err:#}");
        }
        self.dirty = true;
    }
}

fn circular_index(position: usize, len: usize, forward: bool) -> usize {
    if forward {
        (position + 1) % len
    } else {
        (position + len - 1) % len
    }
}
