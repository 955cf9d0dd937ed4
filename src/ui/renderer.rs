use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::core::app::{App, Screen};
use crate::core::message::Role;
use crate::core::session::Session;

pub fn ui(f: &mut Frame, app: &App) {
    let [body, status] = Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(f.area());

    match app.screen() {
        Screen::Assignment => render_assignment(f, app, body),
        Screen::Picker => render_picker(f, app, body),
        Screen::Loading => render_loading(f, app, body),
        Screen::Chat => render_chat(f, app, body),
    }

    let status_line = match &app.status {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Yellow))),
        None => Line::from(Span::styled(help_text(app.screen()), Style::default().fg(Color::DarkGray))),
    };
    f.render_widget(Paragraph::new(status_line), status);
}

fn help_text(screen: Screen) -> &'static str {
    match screen {
        Screen::Assignment => "↑/↓ move • Enter choose model • Backspace clear • c start chat • q quit",
        Screen::Picker => "↑/↓ move • Enter select • Esc back",
        Screen::Loading => "Loading models… • Ctrl+C quit",
        Screen::Chat => "Enter send • Tab reassign models • Ctrl+C quit",
    }
}

fn render_assignment(f: &mut Frame, app: &App, area: Rect) {
    let registry = app.orchestrator.registry();
    let items: Vec<ListItem> = registry
        .hosts()
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let assigned = registry
                .assignment(i)
                .filter(|a| a.assigned)
                .map(|a| Span::styled(a.model.clone(), Style::default().fg(Color::Green)))
                .unwrap_or_else(|| Span::styled("(unassigned)", Style::default().fg(Color::DarkGray)));
            ListItem::new(Line::from(vec![Span::raw(format!("{}: ", host.name)), assigned]))
        })
        .collect();

    let mut lines_below = Vec::new();
    for err in app.orchestrator.readiness_errors() {
        lines_below.push(Line::from(Span::styled(
            format!("{}: {}", err.host_name, err.message),
            Style::default().fg(Color::Red),
        )));
    }

    let [list_area, errors_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(lines_below.len() as u16)]).areas(area);

    let title = format!(
        "Assign models ({} of {} max)",
        registry.assigned_count(),
        registry.max_assigned()
    );
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.cursor));
    f.render_stateful_widget(list, list_area, &mut state);
    f.render_widget(Paragraph::new(lines_below), errors_area);
}

fn render_picker(f: &mut Frame, app: &App, area: Rect) {
    let Some(picker) = &app.picker else {
        return;
    };
    let host_name = app
        .orchestrator
        .registry()
        .host(picker.host_index)
        .map(|h| h.name.as_str())
        .unwrap_or_default();

    let items: Vec<ListItem> = picker
        .models
        .iter()
        .map(|m| {
            let mut spans = vec![Span::raw(m.name.clone())];
            if m.loaded {
                spans.push(Span::styled(
                    " (currently loaded)",
                    Style::default().fg(Color::Green),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Choose a model for {host_name}")),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(picker.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_loading(f: &mut Frame, app: &App, area: Rect) {
    let elapsed = app
        .loading_since
        .map(|since| since.elapsed().as_secs_f32())
        .unwrap_or_default();
    let mut lines = vec![Line::from(format!("Loading models… {elapsed:.1}s")), Line::default()];
    for (_, host, model) in app.orchestrator.registry().assigned() {
        lines.push(Line::from(format!("  {} - {}", host.name, model)));
    }
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Please wait")),
        area,
    );
}

fn render_chat(f: &mut Frame, app: &App, area: Rect) {
    let [columns_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    let sessions = app.orchestrator.sessions();
    if !sessions.is_empty() {
        let constraints = vec![Constraint::Ratio(1, sessions.len() as u32); sessions.len()];
        let columns = Layout::horizontal(constraints).split(columns_area);
        for (session, column) in sessions.iter().zip(columns.iter()) {
            render_session(f, app, session, *column);
        }
    }

    let title = if app.orchestrator.is_loading() {
        "Waiting for responses…"
    } else {
        "Message"
    };
    let mut textarea = app.textarea.clone();
    textarea.set_block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(&textarea, input_area);
}

fn session_lines(session: &Session, debug: bool) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for turn in session.turns() {
        match turn.role {
            Role::User => lines.push(Line::from(Span::styled(
                format!("> {}", turn.text),
                Style::default().fg(Color::Cyan),
            ))),
            Role::Assistant => {
                lines.extend(turn.text.lines().map(|l| Line::from(l.to_string())));
            }
        }
        lines.push(Line::default());
    }
    if let Some(err) = session.error() {
        lines.push(Line::from(Span::styled(
            format!("Error: {err}"),
            Style::default().fg(Color::Red),
        )));
    }
    if debug && session.metadata().done {
        lines.push(Line::from(Span::styled(
            session.metadata().summary(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn render_session(f: &mut Frame, app: &App, session: &Session, area: Rect) {
    let lines = session_lines(session, app.debug);
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    let scroll = total.saturating_sub(inner_height);

    let mut title = session.label();
    if session.is_streaming() {
        title.push_str(" …");
    }
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(paragraph, area);
}

/// Rows `lines` occupy once word-wrapped to `width` columns, matching the
/// paragraph's `Wrap { trim: false }`.
pub fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    if width == 0 {
        return 0;
    }
    let width = width as usize;
    let rows: usize = lines
        .iter()
        .map(|line| {
            let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
            word_wrapped_rows(&text, width)
        })
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn word_wrapped_rows(text: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut col = 0;
    let mut space = 0;
    let mut word = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if ch.is_whitespace() {
            if word > 0 {
                place_word(&mut rows, &mut col, space, word, width);
                space = 0;
                word = 0;
            }
            space += w.max(1);
        } else {
            word += w;
        }
    }
    if word > 0 {
        place_word(&mut rows, &mut col, space, word, width);
    }
    rows
}

fn place_word(rows: &mut usize, col: &mut usize, space: usize, mut word: usize, width: usize) {
    if *col + space + word <= width {
        *col += space + word;
        return;
    }
    if *col > 0 {
        // Whitespace at the wrap point is dropped.
        *rows += 1;
        *col = 0;
    } else {
        *col = space % width;
        *rows += space / width;
    }
    while word > width - *col {
        word -= width - *col;
        *rows += 1;
        *col = 0;
    }
    *col += word;
}
