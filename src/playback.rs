use crate::core::{PlayerCore, TrackEndAction};
use crate::keep_awake::KeepAwakeGuard;
use crate::sink::{self, PlaybackSink, SinkEvent, SinkFactory, SinkState};
use std::time::{Duration, Instant};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Connects a `PlayerCore` to one live sink at a time. Called from the event
/// loop; never blocks and never returns errors.
pub struct PlaybackDriver {
    factory: Box<dyn SinkFactory>,
    keep_awake: KeepAwakeGuard,
    sink: Option<Box<dyn PlaybackSink>>,
    loaded_selection: Option<u64>,
    ready: bool,
    applied_volume: Option<u8>,
    applied_playing: Option<bool>,
    progress_due: Option<Instant>,
}

impl PlaybackDriver {
    pub fn new(factory: Box<dyn SinkFactory>, keep_awake: KeepAwakeGuard) -> Self {
        Self {
            factory,
            keep_awake,
            sink: None,
            loaded_selection: None,
            ready: false,
            applied_volume: None,
            applied_playing: None,
            progress_due: None,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn timer_active(&self) -> bool {
        self.progress_due.is_some()
    }

    pub fn keep_awake_held(&self) -> bool {
        self.keep_awake.is_held()
    }

    pub fn tick(&mut self, core: &mut PlayerCore, now: Instant) {
        if self.loaded_selection != Some(core.selection()) {
            self.load_current(core);
        }

        self.route_events(core, now);
        self.sync_desired_state(core);
        self.keep_awake
            .set_wanted(core.is_playing && self.sink.is_some());
        self.poll_progress(core, now);
    }

    pub fn shutdown(&mut self) {
        self.teardown();
        self.loaded_selection = None;
    }

    fn load_current(&mut self, core: &mut PlayerCore) {
        self.teardown();
        core.reset_progress();
        self.loaded_selection = Some(core.selection());

        let Some(song) = core.current.as_ref() else {
            return;
        };
        let Some(media_id) = sink::media_id(&song.source_ref) else {
            log::debug!("no playable media id in {:?}, skipping player", song.source_ref);
            return;
        };
        match self.factory.construct(&media_id) {
            Ok(sink) => {
                log::info!("loaded player for \"{}\" ({media_id})", song.title);
                self.sink = Some(sink);
            }
            Err(err) => log::error!("failed to construct player for {media_id}: {err:#}"),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut sink) = self.sink.take()
            && let Err(err) = sink.destroy()
        {
            log::debug!("player teardown failed: {err:#}");
        }
        self.ready = false;
        self.applied_volume = None;
        self.applied_playing = None;
        self.progress_due = None;
        self.keep_awake.release();
    }

    fn route_events(&mut self, core: &mut PlayerCore, now: Instant) {
        let events = match self.sink.as_mut() {
            Some(sink) => sink.poll_events(),
            None => return,
        };

        for event in events {
            match event {
                SinkEvent::Ready => self.on_ready(core, now),
                SinkEvent::Error(code) => core.on_sink_error(code),
                SinkEvent::StateChange(SinkState::Ended) => match core.on_track_ended() {
                    TrackEndAction::Replay => self.replay(),
                    TrackEndAction::Advance | TrackEndAction::Stop => {}
                },
                SinkEvent::StateChange(SinkState::Playing) => {
                    self.applied_playing = Some(true);
                    core.on_playback_state(true);
                }
                SinkEvent::StateChange(SinkState::Paused) => {
                    self.applied_playing = Some(false);
                    core.on_playback_state(false);
                }
                SinkEvent::StateChange(_) => {}
            }

            // Events queued behind a song change belong to the old player.
            if self.loaded_selection != Some(core.selection()) {
                self.load_current(core);
                return;
            }
        }
    }

    fn on_ready(&mut self, core: &mut PlayerCore, now: Instant) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let duration = sink.duration().unwrap_or_else(|err| {
            log::warn!("player did not report a duration: {err:#}");
            Duration::ZERO
        });
        core.on_player_ready(duration);
        self.ready = true;
        self.applied_volume = None;
        self.applied_playing = None;
        self.progress_due = Some(now);
    }

    fn replay(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if let Err(err) = sink.seek(Duration::ZERO) {
            log::warn!("failed to rewind player: {err:#}");
        }
        match sink.play() {
            Ok(()) => self.applied_playing = Some(true),
            Err(err) => log::warn!("failed to restart player: {err:#}"),
        }
    }

    fn sync_desired_state(&mut self, core: &mut PlayerCore) {
        if !self.ready {
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        if self.applied_volume != Some(core.volume) {
            if let Err(err) = sink.set_volume(core.volume) {
                log::warn!("failed to set player volume: {err:#}");
            }
            self.applied_volume = Some(core.volume);
        }

        if self.applied_playing != Some(core.is_playing) {
            let result = if core.is_playing {
                sink.play()
            } else {
                sink.pause()
            };
            if let Err(err) = result {
                log::warn!("failed to toggle playback: {err:#}");
            }
            self.applied_playing = Some(core.is_playing);
        }

        if let Some(position) = core.take_pending_seek()
            && let Err(err) = sink.seek(position)
        {
            log::warn!("failed to seek player: {err:#}");
        }
    }

    fn poll_progress(&mut self, core: &mut PlayerCore, now: Instant) {
        let Some(due) = self.progress_due else {
            return;
        };
        if now < due {
            return;
        }
        let Some(sink) = self.sink.as_ref() else {
            self.progress_due = None;
            return;
        };
        self.progress_due = Some(now + PROGRESS_INTERVAL);

        if !sink.state().is_advancing() {
            return;
        }
        match sink.current_time() {
            Ok(elapsed) => core.on_progress(elapsed),
            Err(err) => {
                log::debug!("progress timer stopped: {err:#}");
                self.progress_due = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProvider;
    use crate::config::MemoryQueueStore;
    use crate::core::{NoticeKind, TRANSIENT_SINK_ERROR};
    use crate::dates::MonthTable;
    use crate::keep_awake::NoKeepAwake;
    use crate::model::{RepeatMode, Song};
    use crate::tags::CategoryMap;
    use anyhow::{Result, anyhow};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        commands: Vec<String>,
        constructed: Vec<String>,
        events: Vec<SinkEvent>,
        state: Option<SinkState>,
        fail_time: bool,
    }

    type Shared = Rc<RefCell<Recorder>>;

    struct FakeSink {
        media_id: String,
        shared: Shared,
    }

    impl FakeSink {
        fn record(&self, command: String) {
            self.shared.borrow_mut().commands.push(command);
        }
    }

    impl PlaybackSink for FakeSink {
        fn play(&mut self) -> Result<()> {
            self.record(format!("play {}", self.media_id));
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            self.record(format!("pause {}", self.media_id));
            Ok(())
        }

        fn seek(&mut self, position: Duration) -> Result<()> {
            self.record(format!("seek {}", position.as_secs()));
            Ok(())
        }

        fn set_volume(&mut self, volume: u8) -> Result<()> {
            self.record(format!("volume {volume}"));
            Ok(())
        }

        fn current_time(&self) -> Result<Duration> {
            if self.shared.borrow().fail_time {
                return Err(anyhow!("player gone"));
            }
            Ok(Duration::from_secs(42))
        }

        fn duration(&self) -> Result<Duration> {
            Ok(Duration::from_secs(180))
        }

        fn state(&self) -> SinkState {
            self.shared.borrow().state.unwrap_or(SinkState::Playing)
        }

        fn destroy(&mut self) -> Result<()> {
            self.record(format!("destroy {}", self.media_id));
            Err(anyhow!("teardown errors are ignored"))
        }

        fn poll_events(&mut self) -> Vec<SinkEvent> {
            std::mem::take(&mut self.shared.borrow_mut().events)
        }
    }

    struct FakeFactory(Shared);

    impl SinkFactory for FakeFactory {
        fn construct(&mut self, media_id: &str) -> Result<Box<dyn PlaybackSink>> {
            self.0.borrow_mut().constructed.push(media_id.to_string());
            Ok(Box::new(FakeSink {
                media_id: media_id.to_string(),
                shared: self.0.clone(),
            }))
        }
    }

    struct Fixed(Vec<Song>);

    impl CatalogProvider for Fixed {
        fn fetch(&mut self) -> Result<Vec<Song>> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            String::from("fixed")
        }
    }

    fn song(id: u32, source_ref: &str) -> Song {
        Song {
            id,
            title: format!("song {id}"),
            source_ref: source_ref.to_string(),
            year: String::from("2020"),
            added_on: None,
            tags: Vec::new(),
        }
    }

    fn setup() -> (PlayerCore, PlaybackDriver, Shared) {
        let mut core = PlayerCore::new(
            Box::new(MemoryQueueStore::new()),
            CategoryMap::bundled(),
            MonthTable::default(),
        );
        core.load_catalog(&mut Fixed(vec![
            song(1, "https://www.youtube.com/watch?v=one"),
            song(2, "https://www.youtube.com/watch?v=two"),
            song(3, "not a video"),
        ]));
        let shared = Shared::default();
        let driver = PlaybackDriver::new(
            Box::new(FakeFactory(shared.clone())),
            KeepAwakeGuard::new(Box::new(NoKeepAwake)),
        );
        (core, driver, shared)
    }

    fn push_event(shared: &Shared, event: SinkEvent) {
        shared.borrow_mut().events.push(event);
    }

    fn take_commands(shared: &Shared) -> Vec<String> {
        std::mem::take(&mut shared.borrow_mut().commands)
    }

    #[test]
    fn commands_wait_for_readiness() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        core.toggle_play();
        core.set_volume(70);

        driver.tick(&mut core, now);
        assert_eq!(shared.borrow().constructed, vec!["one"]);
        assert!(take_commands(&shared).is_empty());
        assert!(!driver.is_ready());

        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);
        assert!(driver.is_ready());
        assert!(core.player_ready);
        assert_eq!(core.duration, Duration::from_secs(180));
        assert_eq!(take_commands(&shared), vec!["volume 70", "play one"]);
        assert!(driver.keep_awake_held());

        driver.tick(&mut core, now);
        assert!(take_commands(&shared).is_empty());

        core.toggle_play();
        driver.tick(&mut core, now);
        assert_eq!(take_commands(&shared), vec!["pause one"]);
        assert!(!driver.keep_awake_held());
    }

    #[test]
    fn song_change_tears_down_previous_player() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        driver.tick(&mut core, now);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);
        take_commands(&shared);

        core.play_next();
        driver.tick(&mut core, now);
        assert_eq!(take_commands(&shared), vec!["destroy one"]);
        assert_eq!(shared.borrow().constructed, vec!["one", "two"]);
        assert!(!driver.is_ready());
        assert!(!core.player_ready);
        assert!(!driver.timer_active());
    }

    #[test]
    fn unresolvable_media_skips_player() {
        let (mut core, mut driver, shared) = setup();
        let third = core.songs[2].clone();
        core.select_song(&third);
        driver.tick(&mut core, Instant::now());
        assert!(!driver.has_sink());
        assert!(shared.borrow().constructed.is_empty());
        assert!(!driver.keep_awake_held());
    }

    #[test]
    fn ended_event_with_repeat_one_rewinds() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        core.toggle_play();
        driver.tick(&mut core, now);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);
        take_commands(&shared);

        core.cycle_repeat();
        core.cycle_repeat();
        assert_eq!(core.repeat_mode(), RepeatMode::One);
        push_event(&shared, SinkEvent::StateChange(SinkState::Ended));
        driver.tick(&mut core, now);
        assert_eq!(take_commands(&shared), vec!["seek 0", "play one"]);
        assert!(core.is_playing);
        assert_eq!(shared.borrow().constructed.len(), 1);
    }

    #[test]
    fn ended_event_advances_and_drops_stale_events() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        core.cycle_repeat();
        core.toggle_play();
        driver.tick(&mut core, now);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);

        push_event(&shared, SinkEvent::StateChange(SinkState::Ended));
        push_event(&shared, SinkEvent::Error(150));
        driver.tick(&mut core, now);

        assert_eq!(core.current.as_ref().map(|song| song.id), Some(2));
        assert!(core.is_playing);
        assert_eq!(shared.borrow().constructed, vec!["one", "two"]);
    }

    #[test]
    fn sink_state_changes_update_play_flag() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        driver.tick(&mut core, now);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);
        take_commands(&shared);

        push_event(&shared, SinkEvent::StateChange(SinkState::Playing));
        driver.tick(&mut core, now);
        assert!(core.is_playing);
        assert!(take_commands(&shared).is_empty());
    }

    #[test]
    fn transient_error_warns_and_other_errors_stop() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        core.toggle_play();
        driver.tick(&mut core, now);

        push_event(&shared, SinkEvent::Error(TRANSIENT_SINK_ERROR));
        driver.tick(&mut core, now);
        assert!(core.is_playing);
        assert_eq!(core.notification().map(|n| n.kind), Some(NoticeKind::Warning));

        push_event(&shared, SinkEvent::Error(101));
        driver.tick(&mut core, now);
        assert!(!core.is_playing);
    }

    #[test]
    fn pending_seek_is_applied_once_ready() {
        let (mut core, mut driver, shared) = setup();
        let now = Instant::now();
        driver.tick(&mut core, now);
        core.seek_to(Duration::from_secs(30));
        driver.tick(&mut core, now);
        assert!(!take_commands(&shared).iter().any(|cmd| cmd.starts_with("seek")));

        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, now);
        assert!(take_commands(&shared).contains(&String::from("seek 30")));
    }

    #[test]
    fn progress_timer_reads_once_per_second_and_stops_on_error() {
        let (mut core, mut driver, shared) = setup();
        let start = Instant::now();
        driver.tick(&mut core, start);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, start);
        assert!(driver.timer_active());
        assert_eq!(core.elapsed, Duration::from_secs(42));

        core.elapsed = Duration::ZERO;
        driver.tick(&mut core, start + Duration::from_millis(500));
        assert_eq!(core.elapsed, Duration::ZERO);
        driver.tick(&mut core, start + Duration::from_millis(1000));
        assert_eq!(core.elapsed, Duration::from_secs(42));

        shared.borrow_mut().fail_time = true;
        driver.tick(&mut core, start + Duration::from_secs(3));
        assert!(!driver.timer_active());
    }

    #[test]
    fn progress_timer_skips_reads_while_paused() {
        let (mut core, mut driver, shared) = setup();
        let start = Instant::now();
        shared.borrow_mut().state = Some(SinkState::Paused);
        driver.tick(&mut core, start);
        push_event(&shared, SinkEvent::Ready);
        driver.tick(&mut core, start);
        assert_eq!(core.elapsed, Duration::ZERO);
        assert!(driver.timer_active());
    }
}
