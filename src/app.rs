use crate::catalog;
use crate::config::{self, FileQueueStore};
use crate::core::{NoticeKind, PlayerCore};
use crate::dates::MonthTable;
use crate::keep_awake::{self, KeepAwakeGuard};
use crate::model::{Settings, SortOrder};
use crate::playback::PlaybackDriver;
use crate::sink::SimulatedSinkFactory;
use crate::tags::{CategoryMap, TagGroup};
use crate::ui::{self, ActionPanelView, Focus, ScreenView};
use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::prelude::Rect;
use std::io::stdout;
use std::path::Path;
use std::time::{Duration, Instant};

const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: u8 = 5;
const HELP_TEXT: &str = "Commands: search <text> | filter <group> <tag|off> | sort <title|title-desc|year|year-desc|added|added-desc|none> | clear | volume <0-100>";

#[derive(Debug, Default, Clone)]
pub struct AppOptions {
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InputMode {
    #[default]
    Normal,
    Command,
    Search,
    FilterPicker,
}

#[derive(Debug, Clone)]
struct PickerOption {
    group: Option<TagGroup>,
    tag: String,
}

/// Cursor, focus and line-editing state of the terminal front-end.
#[derive(Debug, Default)]
pub struct AppState {
    focus: Focus,
    catalog_cursor: usize,
    queue_cursor: usize,
    mode: InputMode,
    buffer: String,
    picker: Vec<PickerOption>,
    picker_labels: Vec<String>,
    picker_selected: usize,
}

impl AppState {
    fn clamp_cursors(&mut self, core: &PlayerCore) {
        self.catalog_cursor = self.catalog_cursor.min(core.view_len().saturating_sub(1));
        self.queue_cursor = self.queue_cursor.min(core.queue().len().saturating_sub(1));
    }

    fn move_cursor(&mut self, core: &PlayerCore, down: bool) {
        let (cursor, len) = match self.focus {
            Focus::Catalog => (&mut self.catalog_cursor, core.view_len()),
            Focus::Queue => (&mut self.queue_cursor, core.queue().len()),
        };
        if len == 0 {
            *cursor = 0;
        } else if down {
            *cursor = (*cursor + 1).min(len - 1);
        } else {
            *cursor = cursor.saturating_sub(1);
        }
    }

    fn open_picker(&mut self, core: &PlayerCore) {
        self.picker = vec![PickerOption {
            group: None,
            tag: String::new(),
        }];
        self.picker_labels = vec![String::from("Clear all filters")];
        for group in TagGroup::ALL {
            for entry in core.categories.tags_in_group(group, &core.songs) {
                let active = core.filter().active(group) == Some(entry.tag.as_str());
                self.picker_labels
                    .push(ui::filter_option_label(group, &entry.label, active));
                self.picker.push(PickerOption {
                    group: Some(group),
                    tag: entry.tag.clone(),
                });
            }
        }
        self.picker_selected = self.picker_selected.min(self.picker.len().saturating_sub(1));
        self.mode = InputMode::FilterPicker;
    }

    fn action_panel(&self) -> Option<ActionPanelView> {
        (self.mode == InputMode::FilterPicker).then(|| ActionPanelView {
            title: String::from("Filter"),
            hint: String::from("Enter toggle, Esc close"),
            options: self.picker_labels.clone(),
            selected: self.picker_selected,
        })
    }

    fn prompt(&self) -> Option<(&str, &str)> {
        match self.mode {
            InputMode::Command => Some((":", self.buffer.as_str())),
            InputMode::Search => Some(("/", self.buffer.as_str())),
            InputMode::Normal | InputMode::FilterPicker => None,
        }
    }
}

pub fn run(options: AppOptions) -> Result<()> {
    let settings = config::load_settings().unwrap_or_else(|err| {
        log::error!("failed to load settings, using defaults: {err:#}");
        Settings::default()
    });
    let mut core = build_core(&settings)?;
    let source = options.catalog.or_else(|| settings.catalog.clone());
    let mut provider = catalog::provider_for(source.as_deref());
    core.load_catalog(provider.as_mut());

    let mut driver = PlaybackDriver::new(
        Box::new(SimulatedSinkFactory::default()),
        KeepAwakeGuard::new(keep_awake::platform_keep_awake()),
    );
    let mut state = AppState::default();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut last_draw = Instant::now();
    let mut body = (Rect::default(), Rect::default());

    let result: Result<()> = loop {
        let now = Instant::now();
        driver.tick(&mut core, now);
        core.expire_notification(now);

        if core.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            let panel = state.action_panel();
            let screen = ScreenView {
                focus: state.focus,
                catalog_selected: state.catalog_cursor,
                queue_selected: state.queue_cursor,
                prompt: state.prompt(),
                action_panel: panel.as_ref(),
            };
            terminal.draw(|frame| {
                body = ui::body_rects(frame.area());
                ui::draw(frame, &core, &screen)
            })?;
            core.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if handle_key(&mut core, &mut state, key) == KeyOutcome::Quit {
                    break Ok(());
                }
            }
            Event::Mouse(mouse) => handle_mouse(&core, &mut state, mouse, body),
            Event::Resize(..) => core.dirty = true,
            _ => {}
        }
    };

    driver.shutdown();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    let save_result = config::save_settings(&core.settings_snapshot(&settings));
    result?;
    save_result?;
    Ok(())
}

fn build_core(settings: &Settings) -> Result<PlayerCore> {
    let categories = match settings.categories.as_deref() {
        Some(path) => CategoryMap::load(Path::new(path)).unwrap_or_else(|err| {
            log::warn!("falling back to bundled categories: {err:#}");
            CategoryMap::bundled()
        }),
        None => CategoryMap::bundled(),
    };
    let months = match settings.month_names.clone() {
        Some(names) => MonthTable::from_names(names).unwrap_or_else(|| {
            log::warn!("month_names must list 12 names, using the default table");
            MonthTable::default()
        }),
        None => MonthTable::default(),
    };

    let store = FileQueueStore::in_config_dir()?;
    let mut core = PlayerCore::new(Box::new(store), categories, months);
    core.apply_settings(settings);
    Ok(core)
}

pub fn handle_key(core: &mut PlayerCore, state: &mut AppState, key: KeyEvent) -> KeyOutcome {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyOutcome::Quit;
    }

    let outcome = if core.clear_pending() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => core.confirm_clear_queue(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => core.cancel_clear_queue(),
            _ => {}
        }
        KeyOutcome::Continue
    } else {
        match state.mode {
            InputMode::Normal => handle_normal_key(core, state, key),
            InputMode::Command => {
                handle_command_key(core, state, key);
                KeyOutcome::Continue
            }
            InputMode::Search => {
                handle_search_key(core, state, key);
                KeyOutcome::Continue
            }
            InputMode::FilterPicker => {
                handle_picker_key(core, state, key);
                KeyOutcome::Continue
            }
        }
    };

    state.clamp_cursors(core);
    core.dirty = true;
    outcome
}

fn handle_normal_key(core: &mut PlayerCore, state: &mut AppState, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Down => state.move_cursor(core, true),
        KeyCode::Up => state.move_cursor(core, false),
        KeyCode::Tab | KeyCode::BackTab => {
            state.focus = match state.focus {
                Focus::Catalog => Focus::Queue,
                Focus::Queue => Focus::Catalog,
            };
        }
        KeyCode::Enter => match state.focus {
            Focus::Catalog => {
                if let Some(song) = core.view_song(state.catalog_cursor).cloned() {
                    core.select_song(&song);
                }
            }
            Focus::Queue => core.play_queue_item(state.queue_cursor),
        },
        KeyCode::Char('a') => {
            if let Some(song) = core.view_song(state.catalog_cursor).cloned() {
                core.add_to_queue(&song);
            }
        }
        KeyCode::Char('d') if state.focus == Focus::Queue => {
            core.remove_from_queue(state.queue_cursor);
        }
        KeyCode::Char('K') if state.focus == Focus::Queue && state.queue_cursor > 0 => {
            if core.reorder_queue(state.queue_cursor, state.queue_cursor - 1) {
                state.queue_cursor -= 1;
            }
        }
        KeyCode::Char('J') if state.focus == Focus::Queue => {
            let target = state.queue_cursor + 1;
            if target < core.queue().len() && core.reorder_queue(state.queue_cursor, target) {
                state.queue_cursor = target;
            }
        }
        KeyCode::Char('c') => core.request_clear_queue(),
        KeyCode::Char(' ') => core.toggle_play(),
        KeyCode::Char('n') => core.play_next(),
        KeyCode::Char('p') => core.play_previous(),
        KeyCode::Char('s') => core.toggle_shuffle(),
        KeyCode::Char('r') => core.cycle_repeat(),
        KeyCode::Char('o') => {
            let next = core.sort().next();
            core.set_sort(next);
            core.notify(&format!("Sort: {}", next.label()), NoticeKind::Info);
        }
        KeyCode::Char('f') => state.open_picker(core),
        KeyCode::Char('/') => {
            state.buffer = core.filter().search.clone();
            state.mode = InputMode::Search;
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            core.set_volume(core.volume.saturating_add(VOLUME_STEP));
        }
        KeyCode::Char('-') => core.set_volume(core.volume.saturating_sub(VOLUME_STEP)),
        KeyCode::Right => core.seek_to(core.elapsed.saturating_add(SEEK_STEP)),
        KeyCode::Left => core.seek_to(core.elapsed.saturating_sub(SEEK_STEP)),
        KeyCode::Char(':') => {
            state.buffer.clear();
            state.mode = InputMode::Command;
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn handle_command_key(core: &mut PlayerCore, state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            state.mode = InputMode::Normal;
            state.buffer.clear();
        }
        KeyCode::Enter => {
            state.mode = InputMode::Normal;
            let input = std::mem::take(&mut state.buffer);
            run_command(core, state, &input);
        }
        KeyCode::Backspace => {
            state.buffer.pop();
        }
        KeyCode::Char(ch) => state.buffer.push(ch),
        _ => {}
    }
}

fn handle_search_key(core: &mut PlayerCore, state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            state.buffer.clear();
            core.set_search_query("");
            state.mode = InputMode::Normal;
        }
        KeyCode::Enter => state.mode = InputMode::Normal,
        KeyCode::Backspace => {
            state.buffer.pop();
            core.set_search_query(&state.buffer);
        }
        KeyCode::Char(ch) => {
            state.buffer.push(ch);
            core.set_search_query(&state.buffer);
        }
        _ => {}
    }
}

fn handle_picker_key(core: &mut PlayerCore, state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('f') => state.mode = InputMode::Normal,
        KeyCode::Down => {
            state.picker_selected =
                (state.picker_selected + 1).min(state.picker.len().saturating_sub(1));
        }
        KeyCode::Up => state.picker_selected = state.picker_selected.saturating_sub(1),
        KeyCode::Enter => {
            let Some(option) = state.picker.get(state.picker_selected).cloned() else {
                return;
            };
            match option.group {
                Some(group) => core.set_filter(group, Some(&option.tag)),
                None => {
                    for group in TagGroup::ALL {
                        core.set_filter(group, None);
                    }
                }
            }
            state.open_picker(core);
        }
        _ => {}
    }
}

fn handle_mouse(core: &PlayerCore, state: &mut AppState, mouse: MouseEvent, body: (Rect, Rect)) {
    let focus = if point_in_rect(mouse.column, mouse.row, body.0) {
        Focus::Catalog
    } else if point_in_rect(mouse.column, mouse.row, body.1) {
        Focus::Queue
    } else {
        return;
    };
    let down = match mouse.kind {
        MouseEventKind::ScrollDown => true,
        MouseEventKind::ScrollUp => false,
        _ => return,
    };
    let previous = std::mem::replace(&mut state.focus, focus);
    state.move_cursor(core, down);
    state.focus = previous;
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn run_command(core: &mut PlayerCore, state: &mut AppState, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        core.notify("No command", NoticeKind::Info);
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => core.notify(HELP_TEXT, NoticeKind::Info),
        "search" => {
            core.set_search_query(rest);
            state.catalog_cursor = 0;
        }
        "filter" => {
            let mut filter_split = rest.splitn(2, char::is_whitespace);
            let group = filter_split.next().and_then(TagGroup::parse);
            let value = filter_split.next().unwrap_or("").trim();
            let Some(group) = group else {
                core.notify(
                    "Usage: filter <tempo|mood|type|curator|country> <tag|off>",
                    NoticeKind::Warning,
                );
                return;
            };
            if value.is_empty() || value.eq_ignore_ascii_case("off") {
                core.set_filter(group, None);
                return;
            }
            let Some(tag) = core.categories.find_tag(group, value).map(str::to_string) else {
                core.notify(
                    &format!("Unknown {} tag: {value}", group.label()),
                    NoticeKind::Warning,
                );
                return;
            };
            if core.filter().active(group) != Some(tag.as_str()) {
                core.set_filter(group, Some(&tag));
            }
            state.catalog_cursor = 0;
        }
        "sort" => match SortOrder::parse(rest) {
            Some(order) => {
                core.set_sort(order);
                core.notify(&format!("Sort: {}", order.label()), NoticeKind::Info);
            }
            None => core.notify(
                "Usage: sort <title|title-desc|year|year-desc|added|added-desc|none>",
                NoticeKind::Warning,
            ),
        },
        "clear" => core.request_clear_queue(),
        "volume" => match rest.parse::<u16>() {
            Ok(volume) => {
                let volume = u8::try_from(volume.min(100)).unwrap_or(100);
                core.set_volume(volume);
                core.notify(&format!("Volume: {volume}%"), NoticeKind::Info);
            }
            Err(_) => core.notify("Usage: volume <0-100>", NoticeKind::Warning),
        },
        _ => core.notify("Unknown command. Use :help", NoticeKind::Warning),
    }
}
