use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::JobsApi;
use crate::auth::AuthStore;
use crate::detail::JobDetailModel;
use crate::fetch::{FetchDriver, RequestStatus, ResourceState};
use crate::listing::{JobListing, ListingState};
use crate::models::{html_to_text, EmploymentType, JobDetailPage, JobSummary, SalaryRange};
use crate::profile::ProfileModel;
use crate::router::{resolve, Resolution, Route};

const FRAME: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginField {
    Username,
    Password,
}

struct LoginForm {
    username: String,
    password: String,
    field: LoginField,
    error: Option<String>,
    request: FetchDriver<String>,
}

impl LoginForm {
    fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            field: LoginField::Username,
            error: None,
            request: FetchDriver::new(),
        }
    }

    fn input(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    Search,
}

struct App {
    api: Arc<dyn JobsApi>,
    auth: AuthStore,
    debounce: Duration,
    route: Route,
    // view models live only while their route is shown
    listing: Option<JobListing>,
    profile: Option<ProfileModel>,
    detail: Option<JobDetailModel>,
    login: LoginForm,
    focus: Focus,
    selected: usize,
    similar_selected: usize,
    scroll_offset: u16,
    should_quit: bool,
}

impl App {
    fn new(api: Arc<dyn JobsApi>, auth: AuthStore, debounce: Duration, start: Route) -> Self {
        Self {
            api,
            auth,
            debounce,
            route: start,
            listing: None,
            profile: None,
            detail: None,
            login: LoginForm::new(),
            focus: Focus::List,
            selected: 0,
            similar_selected: 0,
            scroll_offset: 0,
            should_quit: false,
        }
    }

    fn resolution(&self) -> Resolution {
        resolve(self.route.clone(), &self.auth.session())
    }

    fn navigate(&mut self, route: Route) {
        if route == self.route {
            return;
        }
        tracing::debug!(from = %self.route, to = %route, "Navigate");
        self.route = route;
        self.scroll_offset = 0;
        self.similar_selected = 0;
        self.focus = Focus::List;
    }

    /// Settle routing, mount or drop view models, and advance them.
    fn update(&mut self, now: Instant) {
        if self.auth.is_initializing() {
            self.auth.initialize();
        }
        self.poll_login();

        let shown = match self.resolution() {
            Resolution::Loading => None,
            Resolution::Redirect(to) => {
                self.navigate(to.clone());
                Some(to)
            }
            Resolution::Render(route) => Some(route),
        };

        match &shown {
            Some(Route::Jobs) => {
                if self.listing.is_none() {
                    self.selected = 0;
                    self.listing = Some(JobListing::new(
                        Arc::clone(&self.api),
                        self.auth.subscribe(),
                        self.debounce,
                    ));
                }
                if self.profile.is_none() {
                    self.profile = Some(ProfileModel::new(Arc::clone(&self.api), self.auth.subscribe()));
                }
                if let Some(listing) = self.listing.as_mut() {
                    listing.tick(now);
                }
                if let Some(profile) = self.profile.as_mut() {
                    profile.tick();
                }
                self.clamp_selection();
            }
            _ => {
                self.listing = None;
                self.profile = None;
            }
        }

        match &shown {
            Some(Route::JobDetail(id)) => {
                let detail = match self.detail.take() {
                    Some(mut detail) => {
                        if detail.id() != id {
                            detail.set_id(id);
                        }
                        detail
                    }
                    None => JobDetailModel::new(Arc::clone(&self.api), self.auth.subscribe(), id),
                };
                self.detail.insert(detail).tick();
            }
            _ => self.detail = None,
        }
    }

    /// How long to wait for input before the next frame. Shorter than a
    /// frame when a typed search term is about to settle.
    fn poll_timeout(&self, now: Instant) -> Duration {
        self.listing
            .as_ref()
            .and_then(|listing| listing.next_deadline())
            .map(|deadline| deadline.saturating_duration_since(now).min(FRAME))
            .unwrap_or(FRAME)
    }

    fn poll_login(&mut self) {
        let Some(result) = self.login.request.try_next() else {
            return;
        };
        match result {
            Ok(token) => {
                self.login = LoginForm::new();
                let next = self.auth.login(&token);
                self.navigate(next);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.login.error = Some(e.to_string());
            }
        }
    }

    fn jobs(&self) -> &[JobSummary] {
        match self.listing.as_ref().map(|l| l.state()) {
            Some(ListingState::Success(jobs)) => jobs,
            _ => &[],
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.jobs().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.resolution() {
            Resolution::Loading | Resolution::Redirect(_) => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.should_quit = true;
                }
            }
            Resolution::Render(Route::Login) => self.handle_login_key(key),
            Resolution::Render(Route::Jobs) => match self.focus {
                Focus::Search => self.handle_search_key(key, now),
                Focus::List => self.handle_jobs_key(key),
            },
            Resolution::Render(Route::JobDetail(_)) => self.handle_detail_key(key),
            Resolution::Render(Route::Home) => match key.code {
                KeyCode::Enter => {
                    let next = if self.auth.current_token().is_some() {
                        Route::Jobs
                    } else {
                        Route::Login
                    };
                    self.navigate(next);
                }
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
            Resolution::Render(Route::NotFound) => match key.code {
                KeyCode::Enter => self.navigate(Route::Home),
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.field = match self.login.field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            KeyCode::Backspace => {
                self.login.input().pop();
            }
            KeyCode::Enter => {
                if self.login.request.is_pending() {
                    return;
                }
                if self.login.username.trim().is_empty() || self.login.password.is_empty() {
                    self.login.error = Some("Username and password are required".to_string());
                    return;
                }
                self.login.error = None;
                let api = Arc::clone(&self.api);
                let username = self.login.username.trim().to_string();
                let password = self.login.password.clone();
                self.login
                    .request
                    .issue(async move { api.login(&username, &password).await });
            }
            KeyCode::Char(c) => self.login.input().push(c),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        let Some(listing) = self.listing.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.focus = Focus::List,
            KeyCode::Enter => {
                listing.submit_search();
                self.focus = Focus::List;
            }
            KeyCode::Backspace => {
                let mut term = listing.query().search_term().to_string();
                term.pop();
                listing.query_mut().set_search_term(&term, now);
            }
            KeyCode::Char(c) => {
                let term = format!("{}{}", listing.query().search_term(), c);
                listing.query_mut().set_search_term(&term, now);
            }
            _ => {}
        }
    }

    fn handle_jobs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.jobs().len() {
                    self.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Enter => {
                let target = self.jobs().get(self.selected).map(|job| job.id.clone());
                if let Some(id) = target {
                    self.navigate(Route::JobDetail(id));
                }
            }
            KeyCode::Char('/') => self.focus = Focus::Search,
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                if let Some(listing) = self.listing.as_mut() {
                    listing
                        .query_mut()
                        .toggle_employment_type(EmploymentType::ALL[index].id());
                }
            }
            KeyCode::Char('s') => {
                if let Some(listing) = self.listing.as_mut() {
                    let next = SalaryRange::cycle(listing.query().minimum_package());
                    listing.query_mut().set_minimum_package(next);
                }
            }
            KeyCode::Char('r') => {
                // retry is only offered by the failure views
                if let Some(listing) = self.listing.as_mut() {
                    if listing.status() == RequestStatus::Failure {
                        listing.retry();
                    }
                }
                if let Some(profile) = self.profile.as_mut() {
                    if profile.state().status() == RequestStatus::Failure {
                        profile.retry();
                    }
                }
            }
            KeyCode::Char('L') => {
                let next = self.auth.logout();
                self.navigate(next);
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let similar_count = match self.detail.as_ref().map(|d| d.state()) {
            Some(ResourceState::Success(page)) => page.similar_jobs.len(),
            _ => 0,
        };
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => self.navigate(Route::Jobs),
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => {
                if let Some(detail) = self.detail.as_mut() {
                    if detail.status() == RequestStatus::Failure {
                        detail.retry();
                    }
                }
            }
            KeyCode::Char('J') | KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_add(3);
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.similar_selected + 1 < similar_count {
                    self.similar_selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.similar_selected = self.similar_selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                let target = match self.detail.as_ref().map(|d| d.state()) {
                    Some(ResourceState::Success(page)) => page
                        .similar_jobs
                        .get(self.similar_selected)
                        .map(|job| job.id.clone()),
                    _ => None,
                };
                if let Some(id) = target {
                    self.navigate(Route::JobDetail(id));
                }
            }
            KeyCode::Char('L') => {
                let next = self.auth.logout();
                self.navigate(next);
            }
            _ => {}
        }
    }
}

pub fn run_browse(api: Arc<dyn JobsApi>, auth: AuthStore, debounce: Duration, start: Route) -> Result<()> {
    let mut app = App::new(api, auth, debounce, start);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;
        if app.should_quit {
            break;
        }

        app.update(Instant::now());

        if event::poll(app.poll_timeout(Instant::now()))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Instant::now());
                }
            }
        }
    }
    Ok(())
}

// --- Drawing ---

fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let help = match app.resolution() {
        Resolution::Loading | Resolution::Redirect(_) => {
            draw_centered(frame, rows[0], vec![Line::from("Loading...")]);
            " q:quit"
        }
        Resolution::Render(Route::Login) => {
            draw_login(frame, rows[0], &app.login);
            " tab:switch field  enter:login  esc:quit"
        }
        Resolution::Render(Route::Jobs) => {
            draw_jobs(frame, rows[0], app);
            if app.focus == Focus::Search {
                " type to search  enter:search now  esc:done"
            } else {
                " j/k:navigate  enter:open  /:search  1-4:type  s:salary  r:retry  L:logout  q:quit"
            }
        }
        Resolution::Render(Route::JobDetail(_)) => {
            draw_detail(frame, rows[0], app);
            " j/k:similar  enter:open similar  J/K:scroll  r:retry  esc:back  q:quit"
        }
        Resolution::Render(Route::Home) => {
            let action = if app.auth.current_token().is_some() {
                "Press Enter to find jobs"
            } else {
                "Press Enter to log in"
            };
            draw_centered(
                frame,
                rows[0],
                vec![
                    Line::from(Span::styled(
                        "Find The Job That Fits Your Life",
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    Line::from(action),
                ],
            );
            " enter:continue  q:quit"
        }
        Resolution::Render(Route::NotFound) => {
            draw_centered(
                frame,
                rows[0],
                vec![
                    Line::from(Span::styled("Page Not Found", Style::default().add_modifier(Modifier::BOLD))),
                    Line::from("We are sorry, the page you requested could not be found."),
                ],
            );
            " enter:home  q:quit"
        }
    };

    let help = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[1]);
}

fn draw_centered(frame: &mut Frame, area: Rect, lines: Vec<Line>) {
    let height = lines.len() as u16;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), rows[1]);
}

fn draw_login(frame: &mut Frame, area: Rect, form: &LoginForm) {
    let field = |label: &str, value: String, active: bool| {
        let style = if active {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{:<10}", label), style),
            Span::raw(value),
        ])
    };

    let mut lines = vec![
        Line::from(Span::styled("Jobby", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        field("Username", form.username.clone(), form.field == LoginField::Username),
        field("Password", "*".repeat(form.password.chars().count()), form.field == LoginField::Password),
        Line::from(""),
    ];
    if form.request.is_pending() {
        lines.push(Line::from("Logging in..."));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            format!("*{}", error),
            Style::default().fg(Color::Red),
        )));
    }

    let block = Block::default().borders(Borders::ALL).title(" Login ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_jobs(frame: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    draw_sidebar(frame, columns[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(columns[1]);

    let Some(listing) = app.listing.as_ref() else {
        return;
    };

    let search_style = if app.focus == Focus::Search {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let search = Paragraph::new(listing.query().search_term().to_string())
        .block(Block::default().borders(Borders::ALL).title(" Search ").border_style(search_style));
    frame.render_widget(search, right[0]);

    match listing.state() {
        ListingState::Idle => {}
        ListingState::Loading => draw_centered(frame, right[1], vec![Line::from("Loading...")]),
        ListingState::Failure(_) => draw_centered(
            frame,
            right[1],
            vec![
                Line::from(Span::styled(
                    "Oops! Something Went Wrong",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from("We cannot seem to fetch the jobs. Please try again."),
                Line::from(""),
                Line::from("[r] Retry"),
            ],
        ),
        ListingState::Success(jobs) if jobs.is_empty() => draw_centered(
            frame,
            right[1],
            vec![
                Line::from(Span::styled("No Jobs Found", Style::default().add_modifier(Modifier::BOLD))),
                Line::from("We could not find any jobs. Try other filters."),
            ],
        ),
        ListingState::Success(jobs) => {
            let items: Vec<ListItem> = jobs.iter().map(job_item).collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL).title(format!(" Jobs ({}) ", jobs.len())))
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            let mut list_state = ListState::default().with_selected(Some(app.selected));
            frame.render_stateful_widget(list, right[1], &mut list_state);
        }
    }
}

fn job_item(job: &JobSummary) -> ListItem<'static> {
    let rating = job.rating.map(|r| format!("  * {}", r)).unwrap_or_default();
    ListItem::new(vec![
        Line::from(Span::styled(
            format!("{}{}", truncate(&job.title, 50), rating),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("  {} | {} | {}", job.location, job.employment_type, job.package_per_annum),
            Style::default().fg(Color::Gray),
        )),
    ])
}

fn draw_sidebar(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();

    match app.profile.as_ref().map(|p| p.state()) {
        Some(ResourceState::Success(profile)) => {
            lines.push(Line::from(Span::styled(
                profile.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(profile.short_bio.clone()));
        }
        Some(ResourceState::Failure(_)) => {
            lines.push(Line::from(Span::styled("Profile unavailable [r]", Style::default().fg(Color::Red))));
        }
        _ => lines.push(Line::from("Loading profile...")),
    }
    lines.push(Line::from(""));

    if let Some(listing) = app.listing.as_ref() {
        let query = listing.query();
        lines.push(Line::from(Span::styled(
            "Type of Employment",
            Style::default().fg(Color::Cyan),
        )));
        for (i, kind) in EmploymentType::ALL.iter().enumerate() {
            let mark = if query.employment_types().contains(kind) { "x" } else { " " };
            lines.push(Line::from(format!(" {} [{}] {}", i + 1, mark, kind.label())));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Salary Range", Style::default().fg(Color::Cyan))));
        for range in SalaryRange::ALL {
            let mark = if query.minimum_package() == Some(range) { "o" } else { " " };
            lines.push(Line::from(format!("   ({}) {}", mark, range.label())));
        }
    }

    let block = Block::default().borders(Borders::ALL).title(" Filters ");
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Job Details ");
    match app.detail.as_ref().map(|d| d.state()) {
        Some(ResourceState::Success(page)) => {
            let text = build_detail(page, app.similar_selected);
            let widget = Paragraph::new(text)
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((app.scroll_offset, 0));
            frame.render_widget(widget, area);
        }
        Some(ResourceState::Failure(_)) => {
            frame.render_widget(block, area);
            draw_centered(
                frame,
                area,
                vec![
                    Line::from(Span::styled(
                        "Oops! Something Went Wrong",
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from("We cannot seem to find the page you are looking for."),
                    Line::from(""),
                    Line::from("[r] Retry   [esc] Back to Jobs"),
                ],
            );
        }
        _ => {
            frame.render_widget(block, area);
            draw_centered(frame, area, vec![Line::from("Loading...")]);
        }
    }
}

fn build_detail(page: &JobDetailPage, similar_selected: usize) -> Text<'static> {
    let job = &page.job;
    let summary = &job.summary;
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = Vec::new();

    // Header
    let rating = summary.rating.map(|r| format!("  * {}", r)).unwrap_or_default();
    lines.push(Line::from(Span::styled(format!("{}{}", summary.title, rating), bold)));
    lines.push(Line::from(format!(
        "{} | {} | {}",
        summary.location, summary.employment_type, summary.package_per_annum
    )));
    if let Some(link) = &job.apply_link {
        lines.push(Line::from(Span::styled(
            format!("Visit: {}", link),
            Style::default().fg(Color::Cyan),
        )));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Description", bold)));
    lines.extend(Text::from(summary.description_text()).lines);
    lines.push(Line::from(""));

    if !summary.skills.is_empty() {
        lines.push(Line::from(Span::styled("Skills", bold)));
        let names: Vec<&str> = summary.skills.iter().map(|s| s.name.as_str()).collect();
        lines.push(Line::from(names.join(", ")));
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled("Life at Company", bold)));
    lines.extend(Text::from(html_to_text(&job.life_at_company.description)).lines);
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled("Similar Jobs", bold)));
    if page.similar_jobs.is_empty() {
        lines.push(Line::from(Span::styled("(none)", Style::default().fg(Color::DarkGray))));
    }
    for (i, similar) in page.similar_jobs.iter().enumerate() {
        let marker = if i == similar_selected { "> " } else { "  " };
        let rating = similar.rating.map(|r| format!(" * {}", r)).unwrap_or_default();
        lines.push(Line::from(format!(
            "{}{}{} | {} | {}",
            marker, similar.title, rating, similar.location, similar.employment_type
        )));
    }

    Text::from(lines)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::storage::Storage;
    use crate::test_support::{sample_job, FakeApi};
    use ratatui::backend::TestBackend;

    fn app_with(api: Arc<FakeApi>, token: Option<&str>, start: Route) -> App {
        let storage = Storage::open_in_memory().unwrap();
        if let Some(token) = token {
            storage.set_item(crate::storage::TOKEN_KEY, token).unwrap();
        }
        let auth = AuthStore::new(Box::new(storage));
        App::new(api, auth, Duration::from_millis(500), start)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), Instant::now());
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    async fn settle(app: &mut App) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
            app.update(Instant::now());
        }
    }

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long job title", 10), "a long ...");
        assert_eq!(truncate("ünïcödé ünïcödé", 8), "ünïcö...");
    }

    #[tokio::test]
    async fn test_shows_loading_until_session_restored() {
        let api = Arc::new(FakeApi::default());
        let app = app_with(api, Some("tok"), Route::Jobs);
        assert_eq!(app.resolution(), Resolution::Loading);
        assert!(render(&app).contains("Loading..."));
    }

    #[tokio::test]
    async fn test_unauthorized_redirects_to_login() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api.clone(), None, Route::Jobs);
        app.update(Instant::now());
        assert_eq!(app.route, Route::Login);
        assert!(app.listing.is_none());
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_login_flow_lands_on_jobs() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api.clone(), None, Route::Jobs);
        app.update(Instant::now());

        type_text(&mut app, "rahul");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "wrong");
        press(&mut app, KeyCode::Enter);
        settle(&mut app).await;
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.login.error.as_deref(), Some("username and password didn't match"));

        for _ in 0..5 {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "secret");
        press(&mut app, KeyCode::Enter);
        settle(&mut app).await;

        assert_eq!(app.route, Route::Jobs);
        assert_eq!(app.auth.current_token().as_deref(), Some("token-for-rahul"));
        assert!(app.listing.is_some());
    }

    #[tokio::test]
    async fn test_empty_success_renders_no_jobs_view() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api, Some("tok"), Route::Jobs);
        settle(&mut app).await;

        let screen = render(&app);
        assert!(screen.contains("No Jobs Found"));
        assert!(!screen.contains("Something Went Wrong"));
    }

    #[tokio::test]
    async fn test_failure_renders_retry_view() {
        let api = Arc::new(FakeApi::default());
        let gate = api.gate_jobs();
        let mut app = app_with(api.clone(), Some("tok"), Route::Jobs);
        app.update(Instant::now());
        app.update(Instant::now());
        gate.send(Err(ApiError::Status { status: 500, body: String::new() })).unwrap();
        settle(&mut app).await;

        let screen = render(&app);
        assert!(screen.contains("Something Went Wrong"));
        assert!(screen.contains("Retry"));
        assert!(!screen.contains("No Jobs Found"));

        press(&mut app, KeyCode::Char('r'));
        settle(&mut app).await;
        assert!(render(&app).contains("No Jobs Found"));
    }

    #[tokio::test]
    async fn test_open_detail_and_back_resets_listing() {
        let api = Arc::new(FakeApi::default());
        let gate = api.gate_jobs();
        let mut app = app_with(api.clone(), Some("tok"), Route::Jobs);
        app.update(Instant::now());
        app.update(Instant::now());
        gate.send(Ok(vec![sample_job("a"), sample_job("b")])).unwrap();
        settle(&mut app).await;

        press(&mut app, KeyCode::Char('1'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.route, Route::JobDetail("b".to_string()));
        settle(&mut app).await;
        assert!(app.listing.is_none());
        assert!(render(&app).contains("Similar Jobs"));

        press(&mut app, KeyCode::Esc);
        settle(&mut app).await;
        assert_eq!(app.route, Route::Jobs);
        let listing = app.listing.as_ref().unwrap();
        assert!(listing.query().employment_types().is_empty());
    }

    #[tokio::test]
    async fn test_retry_key_ignored_outside_failure() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api.clone(), Some("tok"), Route::Jobs);
        settle(&mut app).await;
        let calls = api.call_count();

        press(&mut app, KeyCode::Char('r'));
        settle(&mut app).await;
        assert_eq!(api.call_count(), calls);
        assert_eq!(app.listing.as_ref().unwrap().status(), RequestStatus::Success);
    }

    #[tokio::test]
    async fn test_detail_retry_after_failure() {
        let api = Arc::new(FakeApi::default());
        let gate = api.gate_detail();
        let mut app = app_with(api.clone(), Some("tok"), Route::JobDetail("d1".to_string()));
        app.update(Instant::now());
        gate.send(Err(ApiError::Status { status: 404, body: String::new() })).unwrap();
        settle(&mut app).await;
        assert!(render(&app).contains("cannot seem to find the page"));

        press(&mut app, KeyCode::Char('r'));
        settle(&mut app).await;
        assert_eq!(app.detail.as_ref().unwrap().status(), RequestStatus::Success);
        assert!(render(&app).contains("Similar Jobs"));
    }

    #[tokio::test]
    async fn test_poll_timeout_shrinks_for_pending_search() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api, Some("tok"), Route::Jobs);
        settle(&mut app).await;
        let t0 = Instant::now();
        assert_eq!(app.poll_timeout(t0), FRAME);

        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Char('d'));
        let deadline = app.listing.as_ref().unwrap().next_deadline().unwrap();
        assert_eq!(app.poll_timeout(deadline - Duration::from_millis(10)), Duration::from_millis(10));
        assert_eq!(app.poll_timeout(deadline + Duration::from_millis(10)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_logout_returns_to_login() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api, Some("tok"), Route::Jobs);
        settle(&mut app).await;

        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.route, Route::Login);
        assert_eq!(app.auth.current_token(), None);
        app.update(Instant::now());
        assert!(app.listing.is_none());
    }

    #[tokio::test]
    async fn test_unknown_route_renders_not_found() {
        let api = Arc::new(FakeApi::default());
        let mut app = app_with(api, None, Route::parse("/nowhere"));
        app.update(Instant::now());
        assert!(render(&app).contains("Page Not Found"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.route, Route::Home);
    }
}
