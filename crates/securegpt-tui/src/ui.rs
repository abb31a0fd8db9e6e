use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use securegpt_core::{segment, BannerKind, ChatMessage, ChatRole, Conversation, SegmentKind};
use crate::app::{App, FocusPane, InputMode};
use crate::highlight::HighlightCache;

const ACCENT: Color = Color::Green;
const SIDEBAR_WIDTH: u16 = 30;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut current_text = String::new();

    while let Some((_, c)) = chars.next() {
        if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some((_, c)) = chars.next() {
                if c == '*' && chars.peek().map(|(_, c)| *c) == Some('*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '`' {
            // Inline code
            let rest: String = chars.clone().map(|(_, c)| c).take_while(|&c| c != '`').collect();
            let closed = chars.clone().nth(rest.chars().count()).is_some();
            if closed && !rest.is_empty() {
                if !current_text.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current_text)));
                }
                for _ in 0..=rest.chars().count() {
                    chars.next();
                }
                spans.push(Span::styled(rest, Style::default().fg(Color::Yellow)));
            } else {
                current_text.push(c);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let main_area = if app.show_sidebar {
        let [sidebar_area, main_area] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)]).areas(body_area);
        render_sidebar(app, frame, sidebar_area);
        app.sidebar_area = Some(sidebar_area);
        main_area
    } else {
        app.sidebar_area = None;
        body_area
    };

    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(main_area);

    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
    render_banner(app, frame, chat_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = if app.is_busy() {
        Span::styled(" generating ", Style::default().fg(Color::Black).bg(Color::Yellow))
    } else {
        Span::raw("")
    };

    let title = Line::from(vec![
        Span::styled(" SecureGPT ", Style::default().fg(ACCENT).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        status,
    ]);
    let model = Line::from(Span::styled(
        format!("model: {} ", app.ollama.model()),
        Style::default().fg(Color::DarkGray),
    ))
    .alignment(Alignment::Right);

    frame.render_widget(Paragraph::new(title), area);
    frame.render_widget(Paragraph::new(model), area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chats ({}) ", app.store.conversations().len()));

    let active = app.store.active_id();
    let items: Vec<ListItem> = app
        .store
        .conversations()
        .iter()
        .map(|c| {
            let style = if Some(c.id.as_str()) == active {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(c.title.clone(), style))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

/// Rows a line takes once wrapped to `width`
fn wrapped_height(line: &Line, width: usize) -> u16 {
    let w = line.width();
    if w == 0 || width == 0 {
        1
    } else {
        w.div_ceil(width) as u16
    }
}

fn role_line(role: ChatRole) -> Line<'static> {
    match role {
        ChatRole::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        ChatRole::Assistant => Line::from(Span::styled(
            "SecureGPT:",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
    }
}

fn code_header(language: &str, number: usize, selected: bool) -> Line<'static> {
    let tag_style = if selected {
        Style::default().fg(Color::Black).bg(Color::Yellow).bold()
    } else {
        Style::default().fg(Color::Black).bg(ACCENT)
    };
    let mut spans = vec![
        Span::styled(format!(" {} ", language), tag_style),
        Span::styled(format!(" #{}", number + 1), Style::default().fg(Color::DarkGray)),
    ];
    if selected {
        spans.push(Span::styled("  y to copy", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

/// Render one assistant answer: prose with light markdown, code highlighted.
/// `code_index` numbers code blocks across the whole conversation.
fn assistant_lines(
    message: &ChatMessage,
    highlights: &mut HighlightCache,
    code_index: &mut usize,
    selected_code: Option<usize>,
    lines: &mut Vec<Line<'static>>,
) {
    for part in segment(&message.content) {
        match part.kind {
            SegmentKind::Text => {
                let text = part.content.trim_matches('\n');
                if text.is_empty() {
                    continue;
                }
                lines.extend(text.split('\n').map(parse_markdown_line));
            }
            SegmentKind::Code => {
                let language = part.language.as_deref().unwrap_or_default();
                let selected = selected_code == Some(*code_index);
                lines.push(code_header(language, *code_index, selected));

                let bar_color = if selected { Color::Yellow } else { Color::DarkGray };
                for code_line in highlights.get(&part.content, language) {
                    let mut spans = vec![Span::styled("│ ", Style::default().fg(bar_color))];
                    spans.extend(code_line.spans.iter().cloned());
                    lines.push(Line::from(spans));
                }
                *code_index += 1;
            }
        }
    }
}

fn chat_lines(
    conversation: &Conversation,
    highlights: &mut HighlightCache,
    selected_code: Option<usize>,
    animation_frame: u8,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut code_index = 0;

    for msg in &conversation.messages {
        lines.push(role_line(msg.role));
        match msg.role {
            ChatRole::User => {
                lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
            }
            ChatRole::Assistant if msg.is_thinking => {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat(animation_frame as usize + 1);
                lines.push(Line::from(Span::styled(
                    format!("{}{}", msg.content, dots),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            ChatRole::Assistant => {
                assistant_lines(msg, highlights, &mut code_index, selected_code, &mut lines);
            }
        }
        lines.push(Line::default());
    }
    lines
}

fn welcome_text() -> Text<'static> {
    let bullet = |title: &'static str, body: &'static str| {
        Line::from(vec![
            Span::styled(format!("• {}: ", title), Style::default().fg(Color::White).bold()),
            Span::styled(body, Style::default().fg(Color::Gray)),
        ])
    };

    Text::from(vec![
        Line::from(Span::styled("What's New!", Style::default().fg(ACCENT).bold())),
        Line::default(),
        Line::from(Span::styled(
            "Experience the latest enhancements designed for insight and control:",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        bullet("Terminal Interface", "A keyboard-driven layout with a chat sidebar."),
        bullet("Local Chat Storage", "Your history, always at your fingertips."),
        bullet("History Management", "Delete chats individually (d) or clear all (D)."),
        bullet("Instant Code Copy", "Select a code block with [ ] and copy it with y."),
        Line::default(),
        Line::from(Span::styled(
            "Note: SecureGPT can make mistakes. Double-check critical information.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ])
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let title = app
        .store
        .active()
        .map(|c| format!(" {} ", c.title))
        .unwrap_or_default();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    app.chat_height = area.height.saturating_sub(2);

    let lines = match app.store.active() {
        Some(conversation) if !conversation.messages.is_empty() => chat_lines(
            conversation,
            &mut app.highlights,
            app.selected_code,
            app.animation_frame,
        ),
        _ => {
            app.total_chat_lines = 0;
            app.chat_scroll = 0;
            let welcome = Paragraph::new(welcome_text())
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(welcome, area);
            return;
        }
    };

    app.total_chat_lines = lines
        .iter()
        .map(|line| wrapped_height(line, inner_width))
        .fold(0u16, u16::saturating_add);
    let max_scroll = app.total_chat_lines.saturating_sub(app.chat_height);
    if app.follow_bottom || app.chat_scroll > max_scroll {
        app.chat_scroll = max_scroll;
    }

    // No trimming, code indentation matters
    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.is_busy();
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if busy {
        Color::DarkGray
    } else if editing || app.focus == FocusPane::Input {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let title = if busy {
        " Waiting for SecureGPT... "
    } else {
        " Ask about security concepts... "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if busy { Color::DarkGray } else { Color::Cyan };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);

    frame.render_widget(input, area);

    if editing && !busy {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " INSERT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => {
            spans.extend(hint(" Enter ", " send "));
            spans.extend(hint(" Esc ", " normal "));
            spans.extend(hint(" Tab ", " chats "));
        }
        (InputMode::Normal, FocusPane::Sidebar) => {
            spans.extend(hint(" j/k ", " nav "));
            spans.extend(hint(" Enter ", " open "));
            spans.extend(hint(" d ", " delete "));
            spans.extend(hint(" D ", " clear all "));
            spans.extend(hint(" n ", " new "));
        }
        (InputMode::Normal, _) => {
            spans.extend(hint(" j/k ", " scroll "));
            spans.extend(hint(" [ ] ", " code "));
            spans.extend(hint(" y ", " copy "));
            spans.extend(hint(" n ", " new "));
            spans.extend(hint(" i ", " ask "));
        }
    }
    if app.input_mode == InputMode::Normal {
        spans.extend(hint(" b ", " sidebar "));
        spans.extend(hint(" q ", " quit "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_banner(app: &App, frame: &mut Frame, area: Rect) {
    let Some(banner) = app.banners.current() else {
        return;
    };

    let width = (banner.message.chars().count() as u16 + 4).min(area.width);
    let height = 3.min(area.height);
    let popup_area = Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    };

    let bg = match banner.kind {
        BannerKind::Success => Color::Green,
        BannerKind::Error => Color::Red,
    };

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(banner.message.clone())
        .style(Style::default().bg(bg).fg(Color::White).bold())
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(bg)));
    frame.render_widget(popup, popup_area);
}
