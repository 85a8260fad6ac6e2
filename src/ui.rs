use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use facility_map::{
    category_counts, coordinate_coverage, distinct_values, render_map_view, AppConfig, Dataset,
    DatasetCache, DomainDescriptor, Entity, Field, FilterSpec, FilterValue, MapView, Session,
    Surface,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Entities,
    Coordinates,
    Map,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Entities => Page::Coordinates,
            Page::Coordinates => Page::Map,
            Page::Map => Page::Entities,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Entities => Page::Map,
            Page::Coordinates => Page::Entities,
            Page::Map => Page::Coordinates,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Entities => "Entities",
            Page::Coordinates => "Coordinates",
            Page::Map => "Map",
        }
    }
}

/// One domain as loaded at startup
struct DomainTab {
    descriptor: DomainDescriptor,
    dataset: std::result::Result<Arc<Dataset>, String>,
}

pub struct App {
    tabs: Vec<DomainTab>,
    current: usize,
    config: AppConfig,
    session: Session,
    /// Indices into the current dataset passing the table filter
    visible: Vec<usize>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    /// `Some` while typing a name search
    search_input: Option<String>,
    status: String,
}

impl App {
    pub fn new(cache: &DatasetCache, config: AppConfig) -> Self {
        let tabs = cache
            .catalog()
            .iter()
            .map(|descriptor| DomainTab {
                descriptor: descriptor.clone(),
                dataset: cache.get(&descriptor.name).map_err(|e| e.to_string()),
            })
            .collect();

        let mut app = Self {
            tabs,
            current: 0,
            config,
            session: Session::new(),
            visible: Vec::new(),
            state: TableState::default(),
            current_page: Page::Entities,
            show_detail: false,
            search_input: None,
            status: String::new(),
        };
        app.refresh_view();
        app
    }

    fn tab(&self) -> Option<&DomainTab> {
        self.tabs.get(self.current)
    }

    fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.tab().and_then(|t| t.dataset.as_ref().ok())
    }

    fn domain(&self) -> String {
        self.tab().map(|t| t.descriptor.name.clone()).unwrap_or_default()
    }

    fn spec(&self) -> FilterSpec {
        self.session.filter(&self.domain(), Surface::Table)
    }

    fn visible_entities(&self) -> Vec<&Entity> {
        match self.dataset() {
            Some(dataset) => self
                .visible
                .iter()
                .filter_map(|i| dataset.entities().get(*i))
                .collect(),
            None => Vec::new(),
        }
    }

    fn refresh_view(&mut self) {
        let spec = self.spec();
        self.visible = match self.dataset() {
            Some(dataset) => dataset
                .entities()
                .iter()
                .enumerate()
                .filter(|(_, e)| spec.matches(e))
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };

        if self.visible.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    fn update_filter(&mut self, field: Field, value: FilterValue) {
        let domain = self.domain();
        let mut spec = self.spec();
        spec.set(field, value);
        self.session.set_filter_everywhere(&domain, spec);
        self.refresh_view();
    }

    /// Step a dropdown-style filter: MatchAll → first option → ... → MatchAll
    pub fn cycle_filter(&mut self, slot: usize) {
        let Some(field) = self
            .tab()
            .and_then(|t| t.descriptor.filter_fields.get(slot))
            .cloned()
        else {
            return;
        };
        let Some(dataset) = self.dataset() else {
            return;
        };

        let options = distinct_values(dataset.entities(), &field);
        let next = match self.spec().get(&field) {
            FilterValue::MatchAll => options.first().cloned(),
            FilterValue::Exact(current) => options
                .iter()
                .position(|o| o == current)
                .and_then(|i| options.get(i + 1))
                .cloned(),
        };

        self.update_filter(field, FilterValue::from_option(next));
    }

    pub fn clear_filter(&mut self) {
        let domain = self.domain();
        self.session.set_filter_everywhere(&domain, FilterSpec::match_all());
        self.refresh_view();
    }

    pub fn next_domain(&mut self) {
        if !self.tabs.is_empty() {
            self.current = (self.current + 1) % self.tabs.len();
            self.refresh_view();
        }
    }

    pub fn previous_domain(&mut self) {
        if !self.tabs.is_empty() {
            self.current = (self.current + self.tabs.len() - 1) % self.tabs.len();
            self.refresh_view();
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    /// Flip the map toggle and, when it turns on, write the document to disk
    pub fn toggle_map(&mut self) {
        let domain = self.domain();
        let visible = self.session.toggle_map(&domain);
        self.current_page = Page::Map;

        if !visible {
            self.status = format!("Map hidden for {}", domain);
            return;
        }

        let Some(dataset) = self.dataset().cloned() else {
            self.status = "Dataset not loaded".to_string();
            return;
        };

        self.status = match render_map_view(
            &self.session,
            &dataset,
            &self.config.template_path,
            self.config.credentials.as_ref(),
        ) {
            Ok(MapView::Rendered { html, markers }) => {
                let out = PathBuf::from(format!("map_{}.html", domain));
                match fs::write(&out, html) {
                    Ok(()) => format!("Map with {} markers written to {}", markers, out.display()),
                    Err(e) => format!("Could not write {}: {}", out.display(), e),
                }
            }
            Ok(MapView::Unavailable(notice)) => notice,
            Ok(MapView::Hidden) => format!("Map hidden for {}", domain),
            Err(e) => format!("Map render failed: {}", e),
        };
    }

    pub fn selected_entity(&self) -> Option<&Entity> {
        let dataset = self.dataset()?;
        let index = self.visible.get(self.state.selected()?)?;
        dataset.entities().get(*index)
    }

    pub fn next(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.visible.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
        self.state.select(Some(i));
    }

    /// Returns false when the app should quit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if let Some(input) = self.search_input.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let text = input.clone();
                    self.search_input = None;
                    self.update_filter(Field::Name, FilterValue::from_option(Some(text)));
                }
                KeyCode::Esc => self.search_input = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Enter => self.toggle_detail(),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.current_page = self.current_page.previous();
                } else {
                    self.current_page = self.current_page.next();
                }
            }
            KeyCode::BackTab => self.current_page = self.current_page.previous(),
            KeyCode::Right | KeyCode::Char(']') => self.next_domain(),
            KeyCode::Left | KeyCode::Char('[') => self.previous_domain(),
            KeyCode::Char(c @ '1'..='9') => self.cycle_filter(c as usize - '1' as usize),
            KeyCode::Char('/') => self.search_input = Some(String::new()),
            KeyCode::Char('c') => self.clear_filter(),
            KeyCode::Char('m') => self.toggle_map(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => {
                if !self.visible.is_empty() {
                    self.state.select(Some(0));
                }
            }
            KeyCode::End => {
                if !self.visible.is_empty() {
                    self.state.select(Some(self.visible.len() - 1));
                }
            }
            _ => {}
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.context("UI loop failed")
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Domain tabs + page
            Constraint::Length(3), // Active filters
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_filters(f, chunks[1], app);

    match app.current_page {
        Page::Entities if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[2]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Entities => render_table(f, chunks[2], app),
        Page::Coordinates => render_coordinates(f, chunks[2], app),
        Page::Map => render_map_page(f, chunks[2], app),
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];

    for (i, tab) in app.tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if i == app.current {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(tab.descriptor.title.clone(), style));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        app.current_page.title().to_string(),
        Style::default().fg(Color::Cyan),
    ));

    if let Some(dataset) = app.dataset() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Total: {}", dataset.len()),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let spec = app.spec();
    let mut spans = vec![];

    if let Some(tab) = app.tab() {
        for (slot, field) in tab.descriptor.filter_fields.iter().enumerate() {
            let value = match spec.get(field) {
                FilterValue::MatchAll => "All".to_string(),
                FilterValue::Exact(v) => v.clone(),
            };
            spans.push(Span::styled(
                format!("{}", slot + 1),
                Style::default().fg(Color::Yellow),
            ));
            spans.push(Span::raw(format!(" {}: ", field)));
            spans.push(Span::styled(value, Style::default().fg(Color::Green)));
            spans.push(Span::raw("   "));
        }
    }

    spans.push(Span::styled("/", Style::default().fg(Color::Yellow)));
    match &app.search_input {
        Some(input) => spans.push(Span::styled(
            format!(" name: {}_", input),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        None => {
            let value = match spec.get(&Field::Name) {
                FilterValue::MatchAll => "All".to_string(),
                FilterValue::Exact(v) => v.clone(),
            };
            spans.push(Span::raw(" name: "));
            spans.push(Span::styled(value, Style::default().fg(Color::Green)));
        }
    }

    let filters = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );

    f.render_widget(filters, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(tab) = app.tab() else {
        return;
    };

    if let Err(message) = &tab.dataset {
        let error = Paragraph::new(format!("  {}", message)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Load failed "),
        );
        f.render_widget(error, area);
        return;
    }

    let columns = tab.descriptor.display_columns.clone();

    let header_cells = columns.iter().map(|h| {
        Cell::from(h.clone()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app
        .visible_entities()
        .into_iter()
        .map(|entity| {
            let color = if entity.has_location() {
                Color::White
            } else {
                Color::Red
            };
            let cells: Vec<Cell> = columns
                .iter()
                .map(|c| Cell::from(truncate(&entity.display_value(c), 30)))
                .collect();
            Row::new(cells).style(Style::default().fg(color)).height(1)
        })
        .collect();

    let widths: Vec<Constraint> = columns.iter().map(|_| Constraint::Min(8)).collect();
    let title = format!(" Entities ({} rows) ", rows.len());

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_coordinates(f: &mut Frame, area: Rect, app: &App) {
    let view = app.visible_entities();
    let coverage = coordinate_coverage(&view);
    let counts = category_counts(&view);

    let bold = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled("  Coordinate coverage", bold)),
        Line::from(format!("  Rows after filter:      {}", coverage.total)),
        Line::from(format!("  With valid coordinates: {}", coverage.valid)),
        Line::from(format!(
            "  Missing coordinates:    {} ({:.2}%)",
            coverage.missing, coverage.missing_percent
        )),
        Line::from(""),
        Line::from(Span::styled("  Missing by region", bold)),
    ];

    for (region, count) in &coverage.missing_by_region {
        content.push(Line::from(format!("    {:<30} {:>5}", region, count)));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled("  By category", bold)));
    for (category, count) in &counts {
        content.push(Line::from(vec![
            Span::raw(format!("    {:<30} {:>5} ", category, count)),
            Span::styled("█".repeat((*count).min(40)), Style::default().fg(Color::Green)),
        ]));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Coordinate Analysis "),
    );

    f.render_widget(paragraph, area);
}

fn render_map_page(f: &mut Frame, area: Rect, app: &App) {
    let domain = app.domain();
    let visible = app.session.is_map_visible(&domain);
    let located = app
        .visible_entities()
        .iter()
        .filter(|e| e.has_location())
        .count();

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  Map: "),
            if visible {
                Span::styled("shown", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                Span::styled("hidden", Style::default().fg(Color::DarkGray))
            },
        ]),
        Line::from(format!("  Markers in current filter: {}", located)),
        Line::from(format!("  Template: {}", app.config.template_path.display())),
    ];

    if !app.config.map_available() {
        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            "  ⚠ MAP4D_API_KEY is not configured, the map cannot be rendered",
            Style::default().fg(Color::Yellow),
        )));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press m to show/hide the map",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Map "),
    );

    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.visible.len()),
        Style::default().fg(Color::Cyan),
    )];

    if !app.status.is_empty() {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(app.status.clone(), Style::default().fg(Color::Green)));
    }

    for (key, label) in [
        ("←/→", " Domain"),
        ("Tab", " Page"),
        ("1-9", " Filter"),
        ("c", " Clear"),
        ("m", " Map"),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let entity = match app.selected_entity() {
        Some(e) => e,
        None => {
            let no_selection = Paragraph::new("No entity selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let position = match entity.location {
        Some(l) => format!("{}, {}", l.latitude, l.longitude),
        None => "—".to_string(),
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Name: ", label), Span::raw(entity.name.clone())]),
        Line::from(vec![Span::styled("  Id: ", label), Span::raw(entity.id.clone())]),
        Line::from(vec![Span::styled("  Category: ", label), Span::raw(entity.category.clone())]),
        Line::from(vec![
            Span::styled("  Sub-category: ", label),
            Span::raw(entity.subcategory.clone()),
        ]),
        Line::from(vec![
            Span::styled("  Region: ", label),
            Span::raw(entity.region.clone().unwrap_or_default()),
        ]),
        Line::from(vec![
            Span::styled("  Position: ", label),
            Span::styled(
                position,
                Style::default().fg(if entity.has_location() { Color::Green } else { Color::Red }),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  SOURCE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
    ];

    for (column, value) in &entity.raw {
        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", column), Style::default().fg(Color::DarkGray)),
            Span::raw(value.clone()),
        ]));
    }

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Details "),
    );

    f.render_widget(detail_panel, area);
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
