use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: workflow list --

    let (banner_label, banner_bg) = if app.is_running() {
        ("RUNNING (s or Alt+Shift+X to stop)", Color::Green)
    } else {
        ("STOPPED (s or Alt+Shift+S to start)", Color::Red)
    };

    let mut lines: Vec<Line> = Vec::new();

    // Help line as first content line inside the bordered panel
    lines.push(Line::from(vec![
        Span::styled(" j", Style::default().fg(Color::Yellow)),
        Span::raw("/"),
        Span::styled("k", Style::default().fg(Color::Yellow)),
        Span::raw(" to select, "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" start/stop, "),
        Span::styled("l", Style::default().fg(Color::Yellow)),
        Span::raw(" logs, "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ]));
    lines.push(Line::from(""));

    if app.workflows.is_empty() {
        lines.push(Line::from(Span::styled(
            "  no workflows found (put .yaml files under workflows/)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, path) in app.workflows.iter().enumerate() {
        let is_selected = i == app.selected;
        let prefix = if is_selected { "> " } else { "  " };
        let marker = if is_selected { "[●]" } else { "[ ]" };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        lines.push(Line::from(vec![
            Span::raw(prefix),
            Span::styled(marker, Style::default().fg(banner_bg)),
            Span::raw(" "),
            Span::styled(
                name,
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", path.display()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    // Split left panel into banner (1 line) + workflow list (fills space)
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    // Full-width centered banner
    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered = format!(
        "{}{}{}",
        " ".repeat(pad_left),
        banner_label,
        " ".repeat(pad_right)
    );
    let banner = Paragraph::new(Line::from(Span::styled(
        centered,
        Style::default()
            .fg(Color::Black)
            .bg(banner_bg)
            .add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(list, left_chunks[1]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Activity ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line for TUI rendering.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        // Fallback for unstructured messages
        return Line::from(raw);
    }

    let level = parts[0];
    let prefix = parts[1];
    let color_idx: u8 = parts[2].parse().unwrap_or(0);
    let timestamp = parts[3];
    let message = parts[4];

    let line_color = match color_idx {
        1 => Color::DarkGray, // COLOR_GRAY
        _ => Color::White,
    };

    let mut spans = Vec::new();

    spans.push(Span::styled(
        timestamp,
        Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw(" "));

    // Level tag: only shown for warn/error
    match level {
        "ERROR" => {
            spans.push(Span::styled("error ", Style::default().fg(Color::Red)));
        }
        "WARN" => {
            spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow)));
        }
        _ => {}
    }

    if !prefix.is_empty() {
        spans.push(Span::styled(
            prefix,
            Style::default().fg(line_color).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::styled(message, Style::default().fg(line_color)));

    Line::from(spans)
}
