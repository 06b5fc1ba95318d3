use anyhow::{Result, bail};
use std::time::{Duration, Instant};

pub const DEFAULT_SIMULATED_DURATION: Duration = Duration::from_secs(210);
const MAX_VOLUME: u8 = 100;

/// Player states as reported by the embedded player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl SinkState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }

    pub fn is_advancing(self) -> bool {
        matches!(self, Self::Playing | Self::Buffering)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Ready,
    Error(i32),
    StateChange(SinkState),
}

/// One constructed player instance bound to a single media id. Commands are
/// fire-and-forget; confirmation arrives through `poll_events`.
pub trait PlaybackSink {
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn set_volume(&mut self, volume: u8) -> Result<()>;
    fn current_time(&self) -> Result<Duration>;
    fn duration(&self) -> Result<Duration>;
    fn state(&self) -> SinkState;
    fn destroy(&mut self) -> Result<()>;
    fn poll_events(&mut self) -> Vec<SinkEvent>;
}

pub trait SinkFactory {
    fn construct(&mut self, media_id: &str) -> Result<Box<dyn PlaybackSink>>;
}

/// Extracts the video id from a watch URL (`?v=` / `&v=`) or a short
/// `youtu.be/<id>` link.
pub fn media_id(source_ref: &str) -> Option<String> {
    let source_ref = source_ref.trim();
    let rest = ["?v=", "&v=", "youtu.be/"]
        .iter()
        .find_map(|marker| source_ref.find(marker).map(|at| &source_ref[at + marker.len()..]))?;
    let id: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}

/// Clock-driven stand-in for an embedded player. It becomes ready on the
/// first poll and ends once the configured duration has elapsed.
pub struct SimulatedSink {
    media_id: String,
    track_duration: Duration,
    volume: u8,
    state: SinkState,
    started_at: Option<Instant>,
    position_offset: Duration,
    announced_ready: bool,
    destroyed: bool,
    pending: Vec<SinkEvent>,
}

impl SimulatedSink {
    pub fn new(media_id: &str, track_duration: Duration) -> Self {
        Self {
            media_id: media_id.to_string(),
            track_duration,
            volume: MAX_VOLUME,
            state: SinkState::Unstarted,
            started_at: None,
            position_offset: Duration::ZERO,
            announced_ready: false,
            destroyed: false,
            pending: Vec::new(),
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    fn position(&self) -> Duration {
        let mut position = self.position_offset;
        if let Some(started_at) = self.started_at {
            position = position.saturating_add(started_at.elapsed());
        }
        position.min(self.track_duration)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            bail!("player for {} was destroyed", self.media_id);
        }
        Ok(())
    }

    fn transition(&mut self, state: SinkState) {
        if self.state != state {
            self.state = state;
            self.pending.push(SinkEvent::StateChange(state));
        }
    }
}

impl PlaybackSink for SimulatedSink {
    fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.position() >= self.track_duration {
            self.position_offset = Duration::ZERO;
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        self.transition(SinkState::Playing);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.position_offset = self.position();
        self.started_at = None;
        if self.state != SinkState::Ended {
            self.transition(SinkState::Paused);
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.ensure_alive()?;
        self.position_offset = position.min(self.track_duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        if self.state == SinkState::Ended {
            self.transition(SinkState::Paused);
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.ensure_alive()?;
        self.volume = volume.min(MAX_VOLUME);
        Ok(())
    }

    fn current_time(&self) -> Result<Duration> {
        self.ensure_alive()?;
        Ok(self.position())
    }

    fn duration(&self) -> Result<Duration> {
        self.ensure_alive()?;
        Ok(self.track_duration)
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn destroy(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.destroyed = true;
        self.started_at = None;
        self.pending.clear();
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SinkEvent> {
        if self.destroyed {
            return Vec::new();
        }
        if !self.announced_ready {
            self.announced_ready = true;
            self.pending.insert(0, SinkEvent::Ready);
            if self.state == SinkState::Unstarted {
                self.state = SinkState::Cued;
            }
        }
        if self.state == SinkState::Playing && self.position() >= self.track_duration {
            self.position_offset = self.track_duration;
            self.started_at = None;
            self.transition(SinkState::Ended);
        }
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedSinkFactory {
    track_duration: Duration,
}

impl SimulatedSinkFactory {
    pub fn new(track_duration: Duration) -> Self {
        Self { track_duration }
    }
}

impl Default for SimulatedSinkFactory {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DURATION)
    }
}

impl SinkFactory for SimulatedSinkFactory {
    fn construct(&mut self, media_id: &str) -> Result<Box<dyn PlaybackSink>> {
        log::debug!("constructing simulated player for {media_id}");
        Ok(Box::new(SimulatedSink::new(media_id, self.track_duration)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn media_id_handles_watch_and_short_links() {
        assert_eq!(
            media_id("https://www.youtube.com/watch?v=4jF_3ey9yck"),
            Some(String::from("4jF_3ey9yck"))
        );
        assert_eq!(
            media_id("https://www.youtube.com/watch?list=PL1&v=abc-DEF_12&t=30"),
            Some(String::from("abc-DEF_12"))
        );
        assert_eq!(
            media_id("https://youtu.be/xyz987?si=share"),
            Some(String::from("xyz987"))
        );
        assert_eq!(media_id("https://example.com/song.mp3"), None);
        assert_eq!(media_id("https://www.youtube.com/watch?v="), None);
    }

    #[test]
    fn state_codes_match_player_contract() {
        for code in [-1, 0, 1, 2, 3, 5] {
            let state = SinkState::from_code(code).expect("known code");
            assert_eq!(state.code(), code);
        }
        assert_eq!(SinkState::from_code(4), None);
    }

    #[test]
    fn simulated_sink_reports_ready_once() {
        let mut sink = SimulatedSink::new("abc", Duration::from_secs(10));
        assert_eq!(sink.poll_events(), vec![SinkEvent::Ready]);
        assert!(sink.poll_events().is_empty());
        assert_eq!(sink.state(), SinkState::Cued);
    }

    #[test]
    fn simulated_sink_ends_after_duration() {
        let mut sink = SimulatedSink::new("abc", Duration::from_millis(20));
        let _ = sink.poll_events();
        sink.play().expect("play");
        assert_eq!(
            sink.poll_events(),
            vec![SinkEvent::StateChange(SinkState::Playing)]
        );

        thread::sleep(Duration::from_millis(40));
        assert_eq!(
            sink.poll_events(),
            vec![SinkEvent::StateChange(SinkState::Ended)]
        );
        assert_eq!(sink.current_time().expect("time"), Duration::from_millis(20));

        sink.seek(Duration::ZERO).expect("seek");
        sink.play().expect("replay");
        assert_eq!(sink.state(), SinkState::Playing);
        assert!(sink.current_time().expect("time") < Duration::from_millis(20));
    }

    #[test]
    fn paused_sink_holds_position() {
        let mut sink = SimulatedSink::new("abc", Duration::from_secs(60));
        sink.seek(Duration::from_secs(12)).expect("seek");
        sink.pause().expect("pause");
        thread::sleep(Duration::from_millis(5));
        assert_eq!(sink.current_time().expect("time"), Duration::from_secs(12));
        sink.set_volume(180).expect("volume");
        assert_eq!(sink.volume(), 100);
    }

    #[test]
    fn destroyed_sink_rejects_commands() {
        let mut sink = SimulatedSink::new("abc", Duration::from_secs(60));
        sink.destroy().expect("destroy");
        assert!(sink.play().is_err());
        assert!(sink.current_time().is_err());
        assert!(sink.destroy().is_err());
        assert!(sink.poll_events().is_empty());
    }
}
