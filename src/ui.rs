use crate::core::{NoticeKind, PlayerCore};
use crate::model::Song;
use crate::tags::TagGroup;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE_WITH_VERSION: &str = concat!("Stopify v", env!("CARGO_PKG_VERSION"), "  ");
const KEY_HINT: &str = "Enter play, a add, d remove, J/K move, c clear, Space pause, n/p next/prev, s shuffle, r repeat, o sort, f filter, / search, : command, q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Catalog,
    Queue,
}

pub struct ActionPanelView {
    pub title: String,
    pub hint: String,
    pub options: Vec<String>,
    pub selected: usize,
}

/// Front-end state the renderer needs besides the controller.
pub struct ScreenView<'a> {
    pub focus: Focus,
    pub catalog_selected: usize,
    pub queue_selected: usize,
    pub prompt: Option<(&'a str, &'a str)>,
    pub action_panel: Option<&'a ActionPanelView>,
}

#[derive(Clone, Copy)]
struct ThemePalette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    focus_border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    queued: Color,
    selected_bg: Color,
    popup_bg: Color,
    popup_selected_bg: Color,
}

fn palette() -> ThemePalette {
    ThemePalette {
        bg: Color::Rgb(10, 15, 24),
        panel_bg: Color::Rgb(19, 29, 43),
        panel_alt_bg: Color::Rgb(24, 38, 58),
        border: Color::Rgb(69, 121, 176),
        focus_border: Color::Rgb(100, 203, 184),
        text: Color::Rgb(214, 228, 248),
        muted: Color::Rgb(149, 173, 204),
        accent: Color::Rgb(100, 203, 184),
        alert: Color::Rgb(249, 174, 88),
        queued: Color::Rgb(156, 186, 255),
        selected_bg: Color::Rgb(34, 55, 82),
        popup_bg: Color::Rgb(22, 33, 51),
        popup_selected_bg: Color::Rgb(45, 70, 99),
    }
}

fn screen_layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
            Constraint::Length(3),
        ])
        .split(area)
}

/// Catalog and queue panel areas, for mouse hit testing.
pub fn body_rects(area: Rect) -> (Rect, Rect) {
    let vertical = screen_layout(area);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(vertical[1]);
    (body[0], body[1])
}

pub fn draw(frame: &mut Frame, core: &PlayerCore, screen: &ScreenView<'_>) {
    let colors = palette();
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = screen_layout(frame.area());
    draw_header(frame, core, vertical[0], &colors);

    let (catalog_area, queue_area) = body_rects(frame.area());
    draw_catalog(frame, core, screen, catalog_area, &colors);
    draw_queue(frame, core, screen, queue_area, &colors);
    draw_now_playing(frame, core, vertical[2], &colors);
    draw_footer(frame, core, screen, vertical[3], &colors);

    if let Some(panel) = screen.action_panel {
        draw_action_panel(frame, panel, &colors);
    }
    if core.clear_pending() {
        draw_confirm_clear(frame, core.queue().len(), &colors);
    }
}

fn draw_header(frame: &mut Frame, core: &PlayerCore, area: Rect, colors: &ThemePalette) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );
    let inner = area.inner(Margin {
        vertical: 1,
        horizontal: 1,
    });

    let on_off = |flag: bool| if flag { "on" } else { "off" };
    let mut spans = vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Songs {}/{}", core.view_len(), core.songs.len()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Sort {}", core.sort().label()),
            Style::default().fg(colors.text),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Shuffle {}", on_off(core.is_shuffled())),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  ", Style::default()),
        Span::styled(
            core.repeat_mode().label(),
            Style::default().fg(colors.alert),
        ),
    ];

    let filters = filter_summary(core);
    if !filters.is_empty() {
        spans.push(Span::styled("  |  ", Style::default().fg(colors.muted)));
        spans.push(Span::styled(filters, Style::default().fg(colors.queued)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn filter_summary(core: &PlayerCore) -> String {
    let mut parts: Vec<String> = core
        .filter()
        .active_filters()
        .map(|(group, tag)| format!("{}: {}", group.label(), core.categories.label_of(tag)))
        .collect();
    let search = core.filter().search.trim();
    if !search.is_empty() {
        parts.push(format!("Search: {search}"));
    }
    parts.join(", ")
}

fn draw_catalog(
    frame: &mut Frame,
    core: &PlayerCore,
    screen: &ScreenView<'_>,
    area: Rect,
    colors: &ThemePalette,
) {
    let items: Vec<ListItem> = core
        .view_songs()
        .map(|song| {
            let marker = if core.is_current(song.id) { "  > " } else { "    " };
            let queued = core.queue().iter().any(|entry| entry.id == song.id);
            let mut spans = vec![
                Span::styled(marker, Style::default().fg(colors.accent)),
                Span::styled(
                    song.title.as_str(),
                    Style::default().fg(if queued { colors.queued } else { colors.text }),
                ),
                Span::styled(format!("  {}", song.year), Style::default().fg(colors.muted)),
            ];
            let countries = country_line(core, song);
            if !countries.is_empty() {
                spans.push(Span::styled(
                    format!("  {countries}"),
                    Style::default().fg(colors.muted),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let mut state = ListState::default();
    state.select((core.view_len() > 0).then_some(screen.catalog_selected));

    let title = if core.catalog_loaded() && core.songs.is_empty() {
        String::from("Catalog (no songs)")
    } else {
        String::from("Catalog")
    };
    let list = List::new(items)
        .block(focus_block(&title, screen.focus == Focus::Catalog, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_queue(
    frame: &mut Frame,
    core: &PlayerCore,
    screen: &ScreenView<'_>,
    area: Rect,
    colors: &ThemePalette,
) {
    let items: Vec<ListItem> = core
        .queue()
        .iter()
        .enumerate()
        .map(|(idx, song)| {
            let playing = core.is_from_queue && core.is_current(song.id);
            let style = if playing {
                Style::default().fg(colors.accent)
            } else {
                Style::default().fg(colors.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>2}. ", idx + 1), Style::default().fg(colors.muted)),
                Span::styled(song.title.as_str(), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select((!core.queue().is_empty()).then_some(screen.queue_selected));

    let title = format!("Queue ({})", core.queue().len());
    let list = List::new(items)
        .block(focus_block(&title, screen.focus == Focus::Queue, colors))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_now_playing(frame: &mut Frame, core: &PlayerCore, area: Rect, colors: &ThemePalette) {
    let title_line = match &core.current {
        Some(song) => {
            let state = if core.is_playing { "Playing" } else { "Paused" };
            let mut spans = vec![
                Span::styled(
                    state,
                    Style::default()
                        .fg(colors.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("  {}", song.title), Style::default().fg(colors.text)),
                Span::styled(format!("  {}", song.year), Style::default().fg(colors.muted)),
            ];
            if core.is_from_queue {
                spans.push(Span::styled("  (queue)", Style::default().fg(colors.queued)));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled("Nothing selected", Style::default().fg(colors.muted))),
    };

    let timeline = Line::from(Span::styled(
        timeline_line(core, 26, 14),
        Style::default().fg(colors.text),
    ));
    let paragraph = Paragraph::new(vec![title_line, timeline])
        .block(panel_block(
            "Now Playing",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_footer(
    frame: &mut Frame,
    core: &PlayerCore,
    screen: &ScreenView<'_>,
    area: Rect,
    colors: &ThemePalette,
) {
    let line = if let Some((prefix, buffer)) = screen.prompt {
        Line::from(vec![
            Span::styled(prefix, Style::default().fg(colors.accent)),
            Span::styled(buffer, Style::default().fg(colors.text)),
            Span::styled("_", Style::default().fg(colors.muted)),
        ])
    } else if let Some(notice) = core.notification() {
        let color = match notice.kind {
            NoticeKind::Info => colors.text,
            NoticeKind::Warning => colors.alert,
        };
        Line::from(Span::styled(notice.message.as_str(), Style::default().fg(color)))
    } else {
        Line::from(Span::styled(KEY_HINT, Style::default().fg(colors.muted)))
    };

    let footer = Paragraph::new(line).block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, area);
}

fn country_line(core: &PlayerCore, song: &Song) -> String {
    core.categories
        .country_labels(song)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn filter_option_label(group: TagGroup, label: &str, active: bool) -> String {
    let mark = if active { "[x]" } else { "[ ]" };
    format!("{mark} {}: {label}", group.label())
}

fn focus_block<'a>(title: &'a str, focused: bool, colors: &ThemePalette) -> Block<'a> {
    let border = if focused {
        colors.focus_border
    } else {
        colors.border
    };
    panel_block(title, colors.panel_bg, colors.text, border)
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn draw_action_panel(frame: &mut Frame, panel: &ActionPanelView, colors: &ThemePalette) {
    let popup = centered_rect(frame.area(), 62, 58);
    frame.render_widget(Clear, popup);

    let items: Vec<ListItem> = panel
        .options
        .iter()
        .map(|item| ListItem::new(Span::styled(item, Style::default().fg(colors.text))))
        .collect();

    let mut state = ListState::default();
    if !panel.options.is_empty() {
        state.select(Some(panel.selected.min(panel.options.len() - 1)));
    }

    let list = List::new(items)
        .block(panel_block(
            &panel.title,
            colors.popup_bg,
            colors.text,
            colors.border,
        ))
        .highlight_style(
            Style::default()
                .bg(colors.popup_selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, popup, &mut state);

    let hint_area = Rect {
        x: popup.x.saturating_add(2),
        y: popup.y.saturating_add(popup.height.saturating_sub(2)),
        width: popup.width.saturating_sub(4),
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Span::styled(
            panel.hint.as_str(),
            Style::default().fg(colors.muted),
        )),
        hint_area,
    );
}

fn draw_confirm_clear(frame: &mut Frame, queued: usize, colors: &ThemePalette) {
    let popup = centered_rect(frame.area(), 40, 20);
    frame.render_widget(Clear, popup);
    let text = vec![
        Line::from(Span::styled(
            format!("Remove all {queued} songs from the queue?"),
            Style::default().fg(colors.text),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "y confirm  /  n cancel",
            Style::default().fg(colors.alert),
        )),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(panel_block(
            "Clear Queue",
            colors.popup_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup);
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(core: &PlayerCore, timeline_bar_width: usize, volume_bar_width: usize) -> String {
    let total = (core.player_ready && !core.duration.is_zero()).then_some(core.duration);
    let ratio = total.map(|duration| {
        (core.elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    });
    let volume_ratio = f64::from(core.volume) / 100.0;

    format!(
        "{} / {} {}  |  Vol {} {:>3}%",
        format_duration(core.elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(volume_ratio), volume_bar_width),
        core.volume
    )
}
