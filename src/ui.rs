use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::{App, FocusPane};
use crate::state::{ChatMessage, ChatRole, PLACEHOLDER_TEXT};

/// Most input lines shown before the box scrolls
const MAX_INPUT_LINES: u16 = 5;
const SEND_BUTTON_WIDTH: u16 = 10;

/// Render one line of reply text, turning `**bold**` runs into bold spans.
/// An unmatched `**` is kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split("**").collect();
    // An even number of parts means the last `**` never closed
    let closed = parts.len() % 2 == 1;
    let last = parts.len() - 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let is_bold = i % 2 == 1 && (closed || i != last);
        if is_bold && !part.is_empty() {
            spans.push(Span::styled(
                part.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else if i % 2 == 1 {
            // Empty pair or dangling opener: keep the markers
            let marker = if is_bold { "****".to_string() } else { format!("**{}", part) };
            spans.push(Span::raw(marker));
        } else if !part.is_empty() {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);

    let [header_area, chat_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SEND_BUTTON_WIDTH),
    ])
    .areas(input_row);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_send_button(app, frame, send_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" chatbridge ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(app.settings.backend_url.clone(), Style::default().fg(Color::White)),
        Span::styled(
            format!("  session: {}", app.settings.session_id),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn bubble_lines(msg: &ChatMessage, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        ChatRole::Outgoing => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in msg.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        ChatRole::Incoming => {
            lines.push(Line::from(Span::styled(
                "Bot:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            if msg.pending {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat(animation_frame as usize + 1);
                lines.push(Line::from(Span::styled(
                    format!("{}{}", PLACEHOLDER_TEXT.trim_end_matches('.'), dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else {
                for line in msg.text.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    app.set_chat_viewport(area.width.saturating_sub(2), area.height.saturating_sub(2));

    let focused = app.focus == FocusPane::Transcript;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Conversation ");

    let text = if app.transcript.is_empty() {
        Text::from(Span::styled(
            "Type a message below and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let lines: Vec<Line> = app
            .transcript
            .messages()
            .iter()
            .flat_map(|msg| bubble_lines(msg, app.animation_frame))
            .collect();
        Text::from(lines)
    };

    let line_count = text.lines.len();
    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);

    if line_count as u16 > app.chat_height {
        let mut scrollbar_state = ScrollbarState::new(line_count).position(app.chat_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar_state,
        );
    }
}

/// (line, column) of the cursor, both in chars
fn cursor_line_col(input: &str, cursor: usize) -> (usize, usize) {
    let before: String = input.chars().take(cursor).collect();
    let line = before.matches('\n').count();
    let col = before.rsplit('\n').next().map(|s| s.chars().count()).unwrap_or(0);
    (line, col)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.input_focused();
    let border_color = if !app.input_enabled {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };

    let title = if app.input_enabled { " Message " } else { " Waiting for reply... " };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let (cursor_line, cursor_col) = cursor_line_col(&app.input, app.input_cursor);

    // Keep the cursor visible in both directions
    let v_offset = if inner_height > 0 && cursor_line >= inner_height {
        cursor_line + 1 - inner_height
    } else {
        0
    };
    let h_offset = if inner_width > 0 && cursor_col >= inner_width {
        cursor_col + 1 - inner_width
    } else {
        0
    };

    let text_style = if app.input_enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input = Paragraph::new(app.input.as_str())
        .style(text_style)
        .block(block)
        .scroll((v_offset as u16, h_offset as u16));
    frame.render_widget(input, area);

    if focused && app.input_enabled {
        frame.set_cursor_position((
            area.x + 1 + (cursor_col - h_offset) as u16,
            area.y + 1 + (cursor_line - v_offset) as u16,
        ));
    }
}

fn render_send_button(app: &mut App, frame: &mut Frame, area: Rect) {
    app.send_area = Some(area);

    let style = if app.input_enabled {
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let button = Paragraph::new("Send")
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(button, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.focus {
        FocusPane::Input => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
        ],
        FocusPane::Transcript => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
        ],
    };
    hints.extend(vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
