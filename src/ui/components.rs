//! UI rendering components

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
    },
};

use super::app::{App, AppState, EditorPart};
use super::input::InputMode;
use crate::models::UserField;
use crate::view::{Cell, DetailModel, DetailPanel};

fn highlight() -> Style {
    Style::default()
        .bg(Color::Rgb(50, 50, 80))
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

/// Render the complete UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Search and filter summary
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Status bar
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    if app.input_mode == InputMode::Search {
        render_search_popup(frame, app);
    }
    if app.editor.is_some() {
        render_filter_editor(frame, app);
    }
    if let Some(alert) = &app.alert {
        render_alert(frame, alert);
    }
}

/// Render the header with the search query and active filters
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let store = app.session.store();
    let mut spans = vec![Span::styled(
        format!(" Search: {} ", display_or(store.search_query(), "-")),
        Style::default().fg(Color::Magenta),
    )];

    for condition in store.filters() {
        spans.push(Span::raw("│"));
        spans.push(Span::styled(
            format!(" {} ", condition.describe()),
            Style::default().fg(Color::Yellow),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" entrascope "));
    frame.render_widget(header, area);
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Render the table plus whichever drawer is open
fn render_content(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.state == AppState::Loading {
        let loading = Paragraph::new("Loading users...")
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(loading, area);
        return;
    }

    let drawer_open = matches!(
        app.input_mode,
        InputMode::Filters | InputMode::FilterEditor | InputMode::Columns
    ) || app.session.detail().is_some();

    if !drawer_open {
        render_user_table(frame, app, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_user_table(frame, app, chunks[0]);

    match app.input_mode {
        InputMode::Filters | InputMode::FilterEditor => render_filter_drawer(frame, app, chunks[1]),
        InputMode::Columns => render_column_drawer(frame, app, chunks[1]),
        _ => render_detail_drawer(frame, app, chunks[1]),
    }
}

fn table_cell(cell: &Cell) -> ratatui::widgets::Cell<'static> {
    match cell {
        Cell::Badge(true) => Span::styled("● Enabled", Style::default().fg(Color::Green)).into(),
        Cell::Badge(false) => {
            Span::styled("○ Disabled", Style::default().fg(Color::DarkGray)).into()
        }
        Cell::Name(name) => {
            Span::styled(name.clone(), Style::default().add_modifier(Modifier::BOLD)).into()
        }
        Cell::Text(text) => Span::raw(text.clone()).into(),
    }
}

/// Render the user table for the current view
fn render_user_table(frame: &mut Frame, app: &App, area: Rect) {
    let model = app.session.table();

    let header = Row::new(model.headers.iter().enumerate().map(|(i, h)| {
        let style = if i == app.header_index {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().fg(Color::Yellow)
        };
        ratatui::widgets::Cell::from(h.title()).style(style.add_modifier(Modifier::BOLD))
    }))
    .bottom_margin(1);

    let rows: Vec<Row> = model
        .rows
        .iter()
        .map(|row| Row::new(row.cells.iter().map(table_cell)))
        .collect();

    let col_count = model.headers.len().max(1);
    let widths = vec![Constraint::Ratio(1, col_count as u32); col_count];

    let title = format!(
        " Users ({}/{}) ",
        model.rows.len(),
        app.session.user_count()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(" ↑↓ Navigate │ ←→ Column │ s: Sort │ Enter: Details │ /: Search │ f: Filters │ c: Columns │ q: Quit "),
        )
        .row_highlight_style(highlight())
        .highlight_symbol("▶ ");

    let mut table_state = TableState::default();
    if !model.is_empty() {
        table_state.select(Some(app.row_index));
    }

    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Render the filter drawer
fn render_filter_drawer(frame: &mut Frame, app: &App, area: Rect) {
    let filters = app.session.store().filters();
    let items: Vec<ListItem> = if filters.is_empty() {
        vec![ListItem::new("No filters").style(Style::default().fg(Color::DarkGray))]
    } else {
        filters
            .iter()
            .map(|f| ListItem::new(f.describe()).style(Style::default().fg(Color::Yellow)))
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Filters ({}) ", filters.len()))
                .title_bottom(" a: Add │ e: Edit │ d: Remove │ Esc: Close "),
        )
        .highlight_style(highlight())
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    if !filters.is_empty() {
        state.select(Some(app.filter_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

/// Render the column drawer
fn render_column_drawer(frame: &mut Frame, app: &App, area: Rect) {
    let visible = app.session.store().columns();
    let items: Vec<ListItem> = UserField::ALL
        .iter()
        .map(|field| {
            let shown = visible.contains(field);
            let checkbox = if shown { "[✓]" } else { "[ ]" };
            let style = if shown {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(format!("{} {}", checkbox, field.label())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Columns ({} shown) ", visible.len()))
                .title_bottom(" Space: Toggle │ Esc: Close "),
        )
        .highlight_style(highlight())
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(Some(app.column_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn section_heading(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))
}

fn detail_lines(model: &DetailModel) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            model.subtitle.clone(),
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        section_heading("Basic Information"),
    ];

    for (label, value) in &model.basic {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<20}", label), Style::default().fg(Color::DarkGray)),
            Span::raw(display_or(value, "-").to_string()),
        ]));
    }

    let sections = model.groups.sections();
    if sections.is_empty() {
        lines.push(Line::default());
        lines.push(section_heading("Groups"));
        lines.push(Line::from(Span::styled(
            "  No groups",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (heading, entries) in sections {
        lines.push(Line::default());
        lines.push(section_heading(heading));
        for entry in entries {
            let (prefix, color) = if entry.is_role {
                ("◆", Color::LightRed)
            } else {
                ("•", Color::White)
            };
            lines.push(Line::from(Span::styled(
                format!("  {} {}", prefix, entry.name),
                Style::default().fg(color),
            )));
        }
    }

    lines.push(Line::default());
    lines.push(section_heading("Assigned Licenses"));
    if model.licenses.is_empty() {
        lines.push(Line::from(Span::styled("  No licenses", Style::default().fg(Color::DarkGray))));
    }
    for license in &model.licenses {
        lines.push(Line::from(vec![
            Span::raw(format!("  • {} ", license.name)),
            Span::styled(license.sku_id.clone(), Style::default().fg(Color::DarkGray)),
        ]));
    }

    lines.push(Line::default());
    lines.push(section_heading("Directory Roles"));
    if model.roles.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No directory roles",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for role in &model.roles {
        lines.push(Line::from(Span::styled(
            format!("  ◆ {}", role),
            Style::default().fg(Color::LightRed),
        )));
    }

    lines
}

fn panel_lines(panel: &DetailPanel) -> (String, Vec<Line<'static>>) {
    match panel {
        DetailPanel::Loading { title, user_id } => (
            title.clone(),
            vec![
                Line::from(Span::styled(user_id.clone(), Style::default().fg(Color::Gray))),
                Line::default(),
                Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow))),
            ],
        ),
        DetailPanel::Ready(model) => (model.title.clone(), detail_lines(model)),
    }
}

/// Unwrapped line count of the detail drawer
pub fn detail_line_count(panel: &DetailPanel) -> u16 {
    u16::try_from(panel_lines(panel).1.len()).unwrap_or(u16::MAX)
}

/// Render the user detail drawer
fn render_detail_drawer(frame: &mut Frame, app: &App, area: Rect) {
    let Some(panel) = app.session.detail() else {
        return;
    };
    let (title, lines) = panel_lines(panel);

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", title))
                .title_bottom(" PgUp/PgDn: Scroll │ Esc: Close "),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));

    frame.render_widget(paragraph, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let state_indicator = match app.state {
        AppState::Loading => Span::styled(" ● Loading ", Style::default().fg(Color::Yellow)),
        AppState::Ready => Span::styled(" ● Ready ", Style::default().fg(Color::Green)),
    };

    let mut spans = vec![
        state_indicator,
        Span::raw(format!("│ {} users ", app.session.user_count())),
    ];
    if let Some(message) = &app.message {
        spans.push(Span::styled(format!("│ {} ", message), Style::default().fg(Color::Cyan)));
    }
    spans.push(Span::styled(
        "│ x: Reset │ r: Reload │ e/E/J: Export HTML/CSV/JSON ",
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Render search popup
fn render_search_popup(frame: &mut Frame, app: &App) {
    let area = centered_rect(50, 3, frame.area());

    frame.render_widget(Clear, area);

    let input = Paragraph::new(app.search_input.as_str())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search (Enter to keep, Esc to clear) ")
                .style(Style::default().fg(Color::Cyan)),
        );

    frame.render_widget(input, area);

    frame.set_cursor_position((
        area.x + app.search_input.chars().count() as u16 + 1,
        area.y + 1,
    ));
}

/// Render the add/edit filter form
fn render_filter_editor(frame: &mut Frame, app: &App) {
    let Some(editor) = &app.editor else {
        return;
    };
    let area = centered_rect(60, 7, frame.area());
    frame.render_widget(Clear, area);

    let part_style = |part: EditorPart| {
        if editor.part == part {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let value = if editor.op.needs_value() {
        editor.value.clone()
    } else {
        "(no value)".to_string()
    };

    let lines = vec![
        Line::from(vec![
            Span::raw("Field:    "),
            Span::styled(editor.field.label(), part_style(EditorPart::Field)),
        ]),
        Line::from(vec![
            Span::raw("Operator: "),
            Span::styled(editor.op.label(), part_style(EditorPart::Op)),
        ]),
        Line::from(vec![
            Span::raw("Value:    "),
            Span::styled(value, part_style(EditorPart::Value)),
        ]),
    ];

    let title = if editor.index.is_some() { " Edit Filter " } else { " Add Filter " };
    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_bottom(" Tab: Next │ ←→: Change │ Enter: Save │ Esc: Cancel ")
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(form, area);
}

/// Render a blocking message
fn render_alert(frame: &mut Frame, text: &str) {
    let area = centered_rect(60, 6, frame.area());
    frame.render_widget(Clear, area);

    let alert = Paragraph::new(text.to_string())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Notice ")
                .title_bottom(" Enter: OK ")
                .style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(alert, area);
}

/// Create a centered rectangle
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let height = height.min(r.height);
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((r.height - height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
