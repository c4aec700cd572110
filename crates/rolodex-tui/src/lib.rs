// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use rolodex_app::{
    ClientListState, ClientRecord, ClientStatus, EmptyState, FacetField, ListCommand, ListEvent,
    PanelVisibility, StockType, distinct_places, format_margin,
};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const HALF_PAGE_ROWS: usize = 10;
const NEW_BADGE: &str = "NEW";
const SEARCH_PLACEHOLDER: &str = "Search clients by name, ID, phone, date or place...";
const ANY_LABEL: &str = "any";
const COLUMN_LABELS: [&str; 9] = [
    "", "name", "id", "phone", "date", "place", "status", "stock", "margin",
];

/// Source of client snapshots. The runtime owns the live query; the TUI only
/// starts and stops it.
pub trait ClientFeed {
    fn subscribe(&mut self, tx: Sender<InternalEvent>) -> Result<()>;
    fn unsubscribe(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    Snapshot(Vec<ClientRecord>),
    StreamFailed(String),
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum InputFocus {
    #[default]
    List,
    Search,
    Filters,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    focus: InputFocus,
    selected_row: usize,
    facet_cursor: usize,
    help_visible: bool,
    status_token: u64,
}

pub fn run_app<R: ClientFeed>(state: &mut ClientListState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    start_feed(state, runtime, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match next_key_press() {
            Ok(Some(key)) => {
                if handle_key_event(state, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    stop_feed(state, runtime);
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn next_key_press() -> Result<Option<KeyEvent>> {
    if !event::poll(Duration::from_millis(120)).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn start_feed<R: ClientFeed>(
    state: &mut ClientListState,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = runtime.subscribe(internal_tx.clone()) {
        let message = format!("{error:#}");
        tracing::error!(error = %message, "error subscribing to clients");
        state.dispatch(ListCommand::StreamFailed(message));
    }
}

fn stop_feed<R: ClientFeed>(state: &mut ClientListState, runtime: &mut R) {
    state.dispatch(ListCommand::Deactivate);
    if let Err(error) = runtime.unsubscribe() {
        tracing::warn!(error = %format!("{error:#}"), "error cancelling client subscription");
    }
}

fn process_internal_events(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::Snapshot(records) => {
                tracing::debug!(records = records.len(), "client snapshot received");
                dispatch(state, view_data, tx, ListCommand::ApplySnapshot(records));
            }
            InternalEvent::StreamFailed(message) => {
                tracing::error!(error = %message, "error fetching clients");
                dispatch(state, view_data, tx, ListCommand::StreamFailed(message));
            }
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(ListCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn dispatch(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: ListCommand,
) -> Vec<ListEvent> {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, ListEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
    clamp_selection(state, view_data);
    events
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    dispatch(
        state,
        view_data,
        internal_tx,
        ListCommand::SetStatus(message.into()),
    );
}

fn handle_key_event(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match view_data.focus {
        InputFocus::Search => {
            handle_search_key(state, view_data, internal_tx, key);
            false
        }
        InputFocus::Filters => {
            handle_filter_key(state, view_data, internal_tx, key);
            false
        }
        InputFocus::List => handle_list_key(state, view_data, internal_tx, key),
    }
}

fn handle_search_key(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter => view_data.focus = InputFocus::List,
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            dispatch(state, view_data, internal_tx, ListCommand::ClearSearch);
        }
        KeyCode::Backspace => {
            let mut term = state.filter().search_term.clone();
            if term.pop().is_some() {
                dispatch(state, view_data, internal_tx, ListCommand::SetSearch(term));
            }
        }
        KeyCode::Char(ch) if is_text_input(key) => {
            let mut term = state.filter().search_term.clone();
            term.push(ch);
            dispatch(state, view_data, internal_tx, ListCommand::SetSearch(term));
        }
        _ => {}
    }
}

fn handle_filter_key(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field = FacetField::ALL[view_data.facet_cursor.min(FacetField::ALL.len() - 1)];
    match key.code {
        KeyCode::Esc => view_data.focus = InputFocus::List,
        KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            dispatch(state, view_data, internal_tx, ListCommand::ResetFilters);
        }
        KeyCode::Down | KeyCode::Tab => move_facet_cursor(view_data, 1),
        KeyCode::Up | KeyCode::BackTab => move_facet_cursor(view_data, -1),
        KeyCode::Left | KeyCode::Right if !field.is_margin() => {
            let delta = if key.code == KeyCode::Right { 1 } else { -1 };
            let next = cycle_facet_value(state, field, delta);
            dispatch(
                state,
                view_data,
                internal_tx,
                ListCommand::SetFacet(field, next),
            );
        }
        KeyCode::Backspace => {
            let mut value = state.filter().facet_text(field).to_owned();
            if field.is_margin() {
                value.pop();
            } else {
                value.clear();
            }
            dispatch(
                state,
                view_data,
                internal_tx,
                ListCommand::SetFacet(field, value),
            );
        }
        KeyCode::Char(ch) if field.is_margin() && is_text_input(key) => {
            let mut value = state.filter().facet_text(field).to_owned();
            value.push(ch);
            dispatch(
                state,
                view_data,
                internal_tx,
                ListCommand::SetFacet(field, value),
            );
        }
        _ => {}
    }
}

fn handle_list_key(
    state: &mut ClientListState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => view_data.focus = InputFocus::Search,
        KeyCode::Char('f') => {
            dispatch(state, view_data, internal_tx, ListCommand::ToggleFilterPanel);
            view_data.focus = match state.filter_panel {
                PanelVisibility::Visible => InputFocus::Filters,
                PanelVisibility::Hidden => InputFocus::List,
            };
        }
        KeyCode::Char('F') if state.filter_panel == PanelVisibility::Visible => {
            view_data.focus = InputFocus::Filters;
        }
        KeyCode::Char('x') => {
            if state.filter().search_term.is_empty() {
                emit_status(state, view_data, internal_tx, "search already empty");
            } else {
                dispatch(state, view_data, internal_tx, ListCommand::ClearSearch);
            }
        }
        KeyCode::Char('r') => {
            dispatch(state, view_data, internal_tx, ListCommand::ResetFilters);
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('j') | KeyCode::Down => move_row(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_row(state, view_data, -1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            move_row(state, view_data, HALF_PAGE_ROWS as isize);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            move_row(state, view_data, -(HALF_PAGE_ROWS as isize));
        }
        KeyCode::Char('g') | KeyCode::Home => view_data.selected_row = 0,
        KeyCode::Char('G') | KeyCode::End => {
            view_data.selected_row = state.visible().len().saturating_sub(1);
        }
        _ => {}
    }
    false
}

fn is_text_input(key: KeyEvent) -> bool {
    !key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn move_row(state: &ClientListState, view_data: &mut ViewData, delta: isize) {
    let len = state.visible().len();
    if len == 0 {
        view_data.selected_row = 0;
        return;
    }
    let next = view_data.selected_row.saturating_add_signed(delta);
    view_data.selected_row = next.min(len - 1);
}

fn move_facet_cursor(view_data: &mut ViewData, delta: isize) {
    let len = FacetField::ALL.len() as isize;
    let next = (view_data.facet_cursor as isize + delta).rem_euclid(len);
    view_data.facet_cursor = next as usize;
}

fn clamp_selection(state: &ClientListState, view_data: &mut ViewData) {
    let len = state.visible().len();
    if len == 0 {
        view_data.selected_row = 0;
    } else if view_data.selected_row >= len {
        view_data.selected_row = len - 1;
    }
}

/// The empty string stands for "any" and always comes first.
fn facet_choices(state: &ClientListState, field: FacetField) -> Vec<String> {
    let mut choices = vec![String::new()];
    match field {
        FacetField::Status => {
            choices.extend(ClientStatus::ALL.iter().map(|status| status.as_str().to_owned()));
        }
        FacetField::StockType => {
            choices.extend(StockType::ALL.iter().map(|stock| stock.as_str().to_owned()));
        }
        FacetField::Place => {
            let mut places = distinct_places(state.mirror());
            places.sort();
            choices.extend(places);
            let current = &state.filter().place;
            if !current.is_empty() && !choices.contains(current) {
                choices.push(current.clone());
            }
        }
        FacetField::MinMargin | FacetField::MaxMargin => {}
    }
    choices
}

fn cycle_facet_value(state: &ClientListState, field: FacetField, delta: isize) -> String {
    let choices = facet_choices(state, field);
    let current = state.filter().facet_text(field);
    let index = choices
        .iter()
        .position(|choice| choice == current)
        .unwrap_or(0) as isize;
    let next = (index + delta).rem_euclid(choices.len() as isize) as usize;
    choices[next].clone()
}

fn render(frame: &mut ratatui::Frame<'_>, state: &ClientListState, view_data: &ViewData) {
    let panel_height = match state.filter_panel {
        PanelVisibility::Visible => FacetField::ALL.len() as u16 + 2,
        PanelVisibility::Hidden => 0,
    };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(panel_height),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(state.count_label()).block(
        Block::default()
            .title("Client Directory")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, layout[0]);

    let search_style = if view_data.focus == InputFocus::Search {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let search = Paragraph::new(search_bar_text(state, view_data)).block(
        Block::default()
            .title("search")
            .borders(Borders::ALL)
            .style(search_style),
    );
    frame.render_widget(search, layout[1]);

    if state.filter_panel == PanelVisibility::Visible {
        let panel_style = if view_data.focus == InputFocus::Filters {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let panel = Paragraph::new(filter_panel_text(state, view_data)).block(
            Block::default()
                .title("filters")
                .borders(Borders::ALL)
                .style(panel_style),
        );
        frame.render_widget(panel, layout[2]);
    }

    if state.empty_state() == EmptyState::Populated {
        render_table(frame, layout[3], state, view_data);
    } else {
        let empty = Paragraph::new(empty_state_text(state))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("clients"));
        frame.render_widget(empty, layout[3]);
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[4]);

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &ClientListState,
    view_data: &ViewData,
) {
    let header = Row::new(COLUMN_LABELS.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = state.visible().iter().map(|record| {
        let mut style = Style::default();
        if record.status == ClientStatus::Inactive {
            style = style.fg(Color::DarkGray);
        }
        let cells = row_cells(state, record)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                if index == 0 && !text.is_empty() {
                    Cell::from(text).style(
                        Style::default()
                            .fg(Color::Green)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Cell::from(text)
                }
            })
            .collect::<Vec<_>>();
        Row::new(cells).style(style)
    });

    let widths = [
        Constraint::Length(3),
        Constraint::Min(14),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Min(10),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(8),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().title("clients").borders(Borders::ALL));

    let mut table_state = TableState::default().with_selected(Some(view_data.selected_row));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn row_cells(state: &ClientListState, record: &ClientRecord) -> Vec<String> {
    let badge = if state.is_new(record) { NEW_BADGE } else { "" };
    vec![
        badge.to_owned(),
        record.client_name.clone(),
        record.client_id.clone(),
        record.mobile_num.clone(),
        or_na(&record.date),
        or_na(&record.place),
        record.status.as_str().to_owned(),
        record.stock_type.as_str().to_owned(),
        format_margin(record.margin),
    ]
}

fn or_na(value: &str) -> String {
    if value.is_empty() {
        "N/A".to_owned()
    } else {
        value.to_owned()
    }
}

fn search_bar_text(state: &ClientListState, view_data: &ViewData) -> String {
    let term = &state.filter().search_term;
    let focused = view_data.focus == InputFocus::Search;
    match (term.is_empty(), focused) {
        (true, true) => "_".to_owned(),
        (true, false) => SEARCH_PLACEHOLDER.to_owned(),
        (false, true) => format!("{term}_"),
        (false, false) => format!("{term}  (x clears)"),
    }
}

fn filter_panel_text(state: &ClientListState, view_data: &ViewData) -> String {
    FacetField::ALL
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let marker = if view_data.focus == InputFocus::Filters && index == view_data.facet_cursor
            {
                ">"
            } else {
                " "
            };
            let value = state.filter().facet_text(*field);
            let shown = if value.is_empty() { ANY_LABEL } else { value };
            format!("{marker} {:<11} {shown}", field.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn empty_state_text(state: &ClientListState) -> String {
    let empty = state.empty_state();
    match empty.hint() {
        "" => empty.headline().to_owned(),
        hint => format!("{}\n\n{hint}", empty.headline()),
    }
}

fn status_text(state: &ClientListState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let (mode, default) = match view_data.focus {
        InputFocus::List => (
            "LIST",
            "j/k g/G move | / search | f filters | x clear | r reset | ? help | q quit",
        ),
        InputFocus::Search => ("SEARCH", "type to search | ctrl+u clear | enter/esc done"),
        InputFocus::Filters => (
            "FILTER",
            "up/down field | left/right choose | type margin | ctrl+r reset | esc done",
        ),
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {default}"),
        None => format!("{mode} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "list: j/k move, ctrl+d/ctrl+u half page, g/G top/bottom\n\
search: / focus, type, backspace, ctrl+u clear, enter/esc leave\n\
x clear search, r reset search and filters\n\
filters: f toggle panel, F refocus panel, up/down pick field\n\
left/right cycle status, stock type, place\n\
margins: type a number, backspace edits\n\
ctrl+r reset, esc back to list\n\
NEW marks clients dated today\n\
q or ctrl+c quit, ? close help"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
