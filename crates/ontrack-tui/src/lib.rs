// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Terminal UI for the goal tracker.
//!
//! The UI is a thin event loop over an [`AppRuntime`] implementation: every
//! read and write goes through the trait, so the whole surface can be driven
//! in tests with an in-memory runtime. Rendering is immediate-mode ratatui;
//! overlays (forms, suggestions, confirmations, help) draw over the active
//! tab in a cleared centered rect.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ontrack_app::{
    AppCommand, AppMode, AppSetting, AppState, DashboardStats, FormKind, FormPayload, Goal,
    GoalFormInput, GoalId, GoalStatus, Habit, HabitCompletion, HabitFormInput, HabitFrequency,
    HabitId, Milestone, MilestoneFormInput, MilestoneId, Session, SessionKind, SettingKey,
    SettingValue, SettingValueKind, SignInInput, SignUpInput, TabKind, WeekStart, calendar,
    progress,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::BTreeSet;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::macros::format_description;
use time::{Date, Month};

const PROGRESS_BAR_WIDTH: usize = 20;
const TITLE_COLUMN_CHARS: usize = 32;
const DATE_HINT: &str = "YYYY-MM-DD or blank";
const DONE_MARK: &str = "[x]";
const TODO_MARK: &str = "[ ]";

/// Where a suggestion breakdown came from. The UI shows this verbatim and
/// must never pretend the remote path was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionSource {
    Remote { model: String },
    Template,
}

impl SuggestionSource {
    fn label(&self) -> String {
        match self {
            Self::Remote { model } => format!("model {model}"),
            Self::Template => "built-in template".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionHabit {
    pub title: String,
    pub description: String,
    pub frequency: String,
    pub frequency_value: i32,
    pub estimated_duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionMilestone {
    pub title: String,
    pub description: String,
    /// Days from the goal's start date.
    pub target_date_offset: i64,
    pub estimated_completion_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionBreakdown {
    pub habits: Vec<SuggestionHabit>,
    pub milestones: Vec<SuggestionMilestone>,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionEvent {
    Completed {
        request_id: u64,
        breakdown: SuggestionBreakdown,
    },
    Failed {
        request_id: u64,
        error: String,
    },
}

impl SuggestionEvent {
    fn request_id(&self) -> u64 {
        match self {
            Self::Completed { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Suggestion(SuggestionEvent),
}

/// Everything the UI needs from the outside world. The production
/// implementation wraps the SQLite store and the suggestion client; tests
/// substitute fixtures.
pub trait AppRuntime {
    fn session(&self) -> Option<&Session>;
    fn today(&self) -> Date;

    /// Whether the status bar should include key hints.
    fn show_help_bar(&self) -> bool {
        true
    }

    fn sign_in(&mut self, input: &SignInInput) -> Result<()>;
    fn sign_up(&mut self, input: &SignUpInput) -> Result<()>;
    fn start_guest_session(&mut self) -> Result<()>;
    fn sign_out(&mut self) -> Result<()>;

    fn load_dashboard_stats(&mut self) -> Result<DashboardStats>;
    /// Goals with progress recomputed from current rows, not the stored
    /// advisory value.
    fn load_goals(&mut self) -> Result<Vec<Goal>>;
    fn load_goal_items(&mut self, goal_id: GoalId) -> Result<(Vec<Habit>, Vec<Milestone>)>;
    fn load_habits(&mut self) -> Result<Vec<Habit>>;
    fn load_completions(&mut self) -> Result<Vec<HabitCompletion>>;

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()>;
    fn update_goal(&mut self, goal_id: GoalId, input: &GoalFormInput) -> Result<()>;
    fn update_habit(&mut self, habit_id: HabitId, input: &HabitFormInput) -> Result<()>;
    fn update_milestone(
        &mut self,
        milestone_id: MilestoneId,
        input: &MilestoneFormInput,
    ) -> Result<()>;
    fn set_goal_status(&mut self, goal_id: GoalId, status: GoalStatus) -> Result<()>;
    fn delete_goal(&mut self, goal_id: GoalId) -> Result<()>;
    fn delete_habit(&mut self, habit_id: HabitId) -> Result<()>;
    fn delete_milestone(&mut self, milestone_id: MilestoneId) -> Result<()>;
    /// Returns true when the day ends up marked complete.
    fn toggle_habit_completion(&mut self, habit_id: HabitId, on: Date) -> Result<bool>;
    fn set_milestone_completed(&mut self, milestone_id: MilestoneId, completed: bool)
    -> Result<()>;
    fn move_habit(&mut self, habit_id: HabitId, up: bool) -> Result<bool>;

    fn list_settings(&mut self) -> Result<Vec<AppSetting>>;
    fn put_setting(&mut self, setting: &AppSetting) -> Result<()>;
    fn week_start(&mut self) -> Result<WeekStart>;

    /// Produces a breakdown for the goal. Implementations degrade to a
    /// deterministic template instead of erroring when the remote model is
    /// unavailable; an `Err` here means something local went wrong.
    fn run_breakdown(
        &mut self,
        goal_title: &str,
        goal_description: &str,
    ) -> Result<SuggestionBreakdown>;

    fn spawn_breakdown(
        &mut self,
        request_id: u64,
        goal_title: &str,
        goal_description: &str,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.run_breakdown(goal_title, goal_description) {
            Ok(breakdown) => SuggestionEvent::Completed {
                request_id,
                breakdown,
            },
            Err(error) => SuggestionEvent::Failed {
                request_id,
                error: format!("{error:#}"),
            },
        };
        tx.send(InternalEvent::Suggestion(event))
            .map_err(|_| anyhow::anyhow!("suggestion event channel closed"))?;
        Ok(())
    }

    /// Creates the picked habits and milestones under the goal. Returns how
    /// many of each were created.
    fn apply_breakdown(
        &mut self,
        goal_id: GoalId,
        breakdown: &SuggestionBreakdown,
        habit_picks: &BTreeSet<usize>,
        milestone_picks: &BTreeSet<usize>,
    ) -> Result<(usize, usize)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct AuthUiState {
    mode: AuthMode,
    email: String,
    full_name: String,
    password: String,
    field: usize,
}

impl AuthUiState {
    fn field_count(&self) -> usize {
        match self.mode {
            AuthMode::SignIn => 2,
            AuthMode::SignUp => 3,
        }
    }

    // Field order: email, (full name,) password.
    fn active_field_mut(&mut self) -> &mut String {
        match (self.mode, self.field) {
            (_, 0) => &mut self.email,
            (AuthMode::SignUp, 1) => &mut self.full_name,
            _ => &mut self.password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormTarget {
    Create,
    EditGoal(GoalId),
    EditHabit(HabitId),
    EditMilestone(MilestoneId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormField {
    label: &'static str,
    hint: &'static str,
    value: String,
}

impl FormField {
    fn new(label: &'static str, hint: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            hint,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    kind: FormKind,
    target: FormTarget,
    /// Owning goal for habit and milestone forms.
    goal_id: Option<GoalId>,
    fields: Vec<FormField>,
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfirmAction {
    DeleteGoal(GoalId),
    DeleteHabit(HabitId),
    DeleteMilestone(MilestoneId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfirmUiState {
    message: String,
    action: ConfirmAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct SuggestionUiState {
    visible: bool,
    goal_id: Option<GoalId>,
    goal_title: String,
    breakdown: Option<SuggestionBreakdown>,
    cursor: usize,
    habit_picks: BTreeSet<usize>,
    milestone_picks: BTreeSet<usize>,
    in_flight: Option<u64>,
}

impl SuggestionUiState {
    fn row_count(&self) -> usize {
        self.breakdown
            .as_ref()
            .map(|breakdown| breakdown.habits.len() + breakdown.milestones.len())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GoalDetailUiState {
    goal: Goal,
    habits: Vec<Habit>,
    milestones: Vec<Milestone>,
    /// Indexes milestones first, then habits.
    cursor: usize,
}

impl GoalDetailUiState {
    fn row_count(&self) -> usize {
        self.milestones.len() + self.habits.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CalendarUiState {
    cursor: Date,
    week_start: WeekStart,
    habit_cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SettingEditorUiState {
    key: SettingKey,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    session: Option<Session>,
    today: Date,
    stats: DashboardStats,
    goals: Vec<Goal>,
    goal_cursor: usize,
    detail: Option<GoalDetailUiState>,
    habits: Vec<Habit>,
    completions: Vec<HabitCompletion>,
    calendar: CalendarUiState,
    settings: Vec<AppSetting>,
    setting_cursor: usize,
    auth: AuthUiState,
    form: Option<FormUiState>,
    setting_editor: Option<SettingEditorUiState>,
    confirm: Option<ConfirmUiState>,
    suggestions: SuggestionUiState,
    suggestion_request_seq: u64,
    help_visible: bool,
    help_bar: bool,
    status_token: u64,
}

impl ViewData {
    fn new(today: Date) -> Self {
        Self {
            session: None,
            today,
            stats: DashboardStats::default(),
            goals: Vec::new(),
            goal_cursor: 0,
            detail: None,
            habits: Vec::new(),
            completions: Vec::new(),
            calendar: CalendarUiState {
                cursor: today,
                week_start: WeekStart::Sunday,
                habit_cursor: 0,
            },
            settings: Vec::new(),
            setting_cursor: 0,
            auth: AuthUiState::default(),
            form: None,
            setting_editor: None,
            confirm: None,
            suggestions: SuggestionUiState::default(),
            suggestion_request_seq: 0,
            help_visible: false,
            help_bar: true,
            status_token: 0,
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(runtime.today());
    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(runtime, &mut view_data) {
        state.status_line = Some(format!("load failed: {error}"));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        if event::poll(Duration::from_millis(120)).context("poll event")? {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Suggestion(event) => {
                handle_suggestion_event(state, view_data, tx, event);
            }
        }
    }
}

fn handle_suggestion_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: SuggestionEvent,
) {
    // Results for a request the user already cancelled or superseded are
    // dropped on the floor.
    let Some(request_id) = view_data.suggestions.in_flight else {
        return;
    };
    if event.request_id() != request_id {
        return;
    }

    match event {
        SuggestionEvent::Completed { breakdown, .. } => {
            view_data.suggestions.in_flight = None;
            view_data.suggestions.cursor = 0;
            view_data.suggestions.habit_picks = (0..breakdown.habits.len()).collect();
            view_data.suggestions.milestone_picks = (0..breakdown.milestones.len()).collect();
            view_data.suggestions.breakdown = Some(breakdown);
        }
        SuggestionEvent::Failed { error, .. } => {
            view_data.suggestions = SuggestionUiState::default();
            emit_status(
                state,
                view_data,
                tx,
                format!("suggestions unavailable: {error}"),
            );
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Sets the status line and schedules its timed clear. Bumping the token
/// invalidates any clear already in flight.
fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.status_line = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Top-level key router. Returns true when the app should exit.
fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if runtime.session().is_none() {
        handle_auth_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.confirm.is_some() {
        handle_confirm_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.setting_editor.is_some() {
        handle_setting_editor_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.form.is_some() {
        handle_form_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.suggestions.visible {
        handle_suggestion_overlay_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if key.code == KeyCode::Char('?') {
        view_data.help_visible = true;
        return false;
    }

    if key.code == KeyCode::Char('x') && key.modifiers.contains(KeyModifiers::CONTROL) {
        match runtime.sign_out() {
            Ok(()) => {
                *view_data = ViewData::new(runtime.today());
                *state = AppState::default();
                state.status_line = Some("signed out".to_owned());
            }
            Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
        }
        return false;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Char('f') => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextTab);
            return false;
        }
        KeyCode::BackTab | KeyCode::Char('b') => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevTab);
            return false;
        }
        KeyCode::Char(digit @ '1'..='4') => {
            let index = digit as usize - '1' as usize;
            dispatch_and_refresh(
                state,
                runtime,
                view_data,
                AppCommand::GoToTab(TabKind::ALL[index]),
            );
            return false;
        }
        _ => {}
    }

    match state.mode {
        AppMode::Nav => {
            if key.code == KeyCode::Char('i') {
                state.dispatch(AppCommand::EnterEditMode);
                return false;
            }
            if key.code == KeyCode::Esc {
                if view_data.detail.is_some() && state.active_tab == TabKind::Goals {
                    view_data.detail = None;
                } else {
                    state.dispatch(AppCommand::ClearStatus);
                }
                return false;
            }
        }
        AppMode::Edit => {
            if key.code == KeyCode::Esc {
                state.dispatch(AppCommand::ExitToNav);
                view_data.status_token = view_data.status_token.saturating_add(1);
                schedule_status_clear(internal_tx, view_data.status_token);
                return false;
            }
        }
        // Form keys are routed above; a dangling form mode recovers to nav.
        AppMode::Form(_) => {
            state.dispatch(AppCommand::ExitToNav);
            return false;
        }
    }

    let edit_mode = state.mode == AppMode::Edit;
    match state.active_tab {
        TabKind::Dashboard => {}
        TabKind::Goals => handle_goals_key(state, runtime, view_data, internal_tx, key, edit_mode),
        TabKind::Calendar => handle_calendar_key(state, runtime, view_data, internal_tx, key),
        TabKind::Settings => handle_settings_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_auth_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.code == KeyCode::Char('u') && key.modifiers.contains(KeyModifiers::CONTROL) {
        view_data.auth.mode = match view_data.auth.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        view_data.auth.field = 0;
        return;
    }

    if key.code == KeyCode::Char('g') && key.modifiers.contains(KeyModifiers::CONTROL) {
        match runtime.start_guest_session() {
            Ok(()) => {
                view_data.auth = AuthUiState::default();
                if let Err(error) = refresh_view_data(runtime, view_data) {
                    emit_status(state, view_data, internal_tx, format!("load failed: {error}"));
                    return;
                }
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "guest session: changes are not saved",
                );
            }
            Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
        }
        return;
    }

    match key.code {
        KeyCode::Tab | KeyCode::Down => {
            view_data.auth.field = (view_data.auth.field + 1) % view_data.auth.field_count();
        }
        KeyCode::BackTab | KeyCode::Up => {
            let count = view_data.auth.field_count();
            view_data.auth.field = (view_data.auth.field + count - 1) % count;
        }
        KeyCode::Backspace => {
            view_data.auth.active_field_mut().pop();
        }
        KeyCode::Enter => submit_auth(state, runtime, view_data, internal_tx),
        KeyCode::Esc => {
            view_data.auth = AuthUiState {
                mode: view_data.auth.mode,
                ..AuthUiState::default()
            };
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.auth.active_field_mut().push(c);
        }
        _ => {}
    }
}

fn submit_auth<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let auth = &view_data.auth;
    let result = match auth.mode {
        AuthMode::SignIn => {
            let input = SignInInput {
                email: auth.email.clone(),
                password: auth.password.clone(),
            };
            input.validate().and_then(|()| runtime.sign_in(&input))
        }
        AuthMode::SignUp => {
            let input = SignUpInput {
                email: auth.email.clone(),
                full_name: auth.full_name.clone(),
                password: auth.password.clone(),
            };
            input.validate().and_then(|()| runtime.sign_up(&input))
        }
    };

    match result {
        Ok(()) => {
            view_data.auth = AuthUiState::default();
            if let Err(error) = refresh_view_data(runtime, view_data) {
                emit_status(state, view_data, internal_tx, format!("load failed: {error}"));
                return;
            }
            let name = view_data
                .session
                .as_ref()
                .map(|session| session.profile.full_name.clone())
                .unwrap_or_default();
            emit_status(state, view_data, internal_tx, format!("welcome, {name}"));
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            let Some(confirm) = view_data.confirm.take() else {
                return;
            };
            let result = match confirm.action {
                ConfirmAction::DeleteGoal(goal_id) => {
                    let result = runtime.delete_goal(goal_id);
                    if result.is_ok() {
                        view_data.detail = None;
                    }
                    result.map(|()| "goal deleted")
                }
                ConfirmAction::DeleteHabit(habit_id) => {
                    runtime.delete_habit(habit_id).map(|()| "habit deleted")
                }
                ConfirmAction::DeleteMilestone(milestone_id) => runtime
                    .delete_milestone(milestone_id)
                    .map(|()| "milestone deleted"),
            };
            match result {
                Ok(message) => {
                    refresh_after_write(state, runtime, view_data, internal_tx);
                    emit_status(state, view_data, internal_tx, message);
                }
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.confirm = None;
        }
        _ => {}
    }
}

fn handle_setting_editor_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.setting_editor = None;
        }
        KeyCode::Backspace => {
            if let Some(editor) = &mut view_data.setting_editor {
                editor.value.pop();
            }
        }
        KeyCode::Enter => {
            let Some(editor) = view_data.setting_editor.take() else {
                return;
            };
            let Some(value) = SettingValue::parse_for_key(editor.key, &editor.value) else {
                let message = format!("invalid value for {}", editor.key.label());
                view_data.setting_editor = Some(editor);
                emit_status(state, view_data, internal_tx, message);
                return;
            };
            let setting = AppSetting {
                key: editor.key,
                value,
            };
            match runtime.put_setting(&setting) {
                Ok(()) => {
                    refresh_after_write(state, runtime, view_data, internal_tx);
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("{} updated", setting.key.label()),
                    );
                }
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(editor) = &mut view_data.setting_editor {
                editor.value.push(c);
            }
        }
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
            view_data.status_token = view_data.status_token.saturating_add(1);
            schedule_status_clear(internal_tx, view_data.status_token);
        }
        KeyCode::Tab | KeyCode::Down => {
            if let Some(form) = &mut view_data.form {
                form.cursor = (form.cursor + 1) % form.fields.len();
            }
        }
        KeyCode::BackTab | KeyCode::Up => {
            if let Some(form) = &mut view_data.form {
                form.cursor = (form.cursor + form.fields.len() - 1) % form.fields.len();
            }
        }
        KeyCode::Backspace => {
            if let Some(form) = &mut view_data.form {
                let cursor = form.cursor;
                form.fields[cursor].value.pop();
            }
        }
        KeyCode::Enter => submit_form_from_ui(state, runtime, view_data, internal_tx),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(form) = &mut view_data.form {
                let cursor = form.cursor;
                form.fields[cursor].value.push(c);
            }
        }
        _ => {}
    }
}

fn submit_form_from_ui<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.clone() else {
        return;
    };

    let result: Result<&'static str> = (|| match form.kind {
        FormKind::Goal => {
            let input = goal_input_from_fields(&form.fields)?;
            input.validate()?;
            if let FormTarget::EditGoal(goal_id) = form.target {
                runtime.update_goal(goal_id, &input)?;
                Ok("goal updated")
            } else {
                runtime.submit_form(&FormPayload::Goal(input))?;
                Ok("goal added")
            }
        }
        FormKind::Habit => {
            let goal_id = form
                .goal_id
                .ok_or_else(|| anyhow::anyhow!("habit form lost its goal"))?;
            let input = habit_input_from_fields(goal_id, &form.fields)?;
            input.validate()?;
            if let FormTarget::EditHabit(habit_id) = form.target {
                runtime.update_habit(habit_id, &input)?;
                Ok("habit updated")
            } else {
                runtime.submit_form(&FormPayload::Habit(input))?;
                Ok("habit added")
            }
        }
        FormKind::Milestone => {
            let goal_id = form
                .goal_id
                .ok_or_else(|| anyhow::anyhow!("milestone form lost its goal"))?;
            let input = milestone_input_from_fields(goal_id, &form.fields)?;
            input.validate()?;
            if let FormTarget::EditMilestone(milestone_id) = form.target {
                runtime.update_milestone(milestone_id, &input)?;
                Ok("milestone updated")
            } else {
                runtime.submit_form(&FormPayload::Milestone(input))?;
                Ok("milestone added")
            }
        }
    })();

    match result {
        Ok(message) => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToNav);
            refresh_after_write(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn handle_suggestion_overlay_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.suggestions = SuggestionUiState::default();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let rows = view_data.suggestions.row_count();
            if rows > 0 {
                view_data.suggestions.cursor = (view_data.suggestions.cursor + 1).min(rows - 1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.suggestions.cursor = view_data.suggestions.cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') => {
            let Some(breakdown) = &view_data.suggestions.breakdown else {
                return;
            };
            let habit_count = breakdown.habits.len();
            let cursor = view_data.suggestions.cursor;
            if cursor < habit_count {
                if !view_data.suggestions.habit_picks.remove(&cursor) {
                    view_data.suggestions.habit_picks.insert(cursor);
                }
            } else {
                let index = cursor - habit_count;
                if !view_data.suggestions.milestone_picks.remove(&index) {
                    view_data.suggestions.milestone_picks.insert(index);
                }
            }
        }
        KeyCode::Char('a') => {
            let Some(breakdown) = &view_data.suggestions.breakdown else {
                return;
            };
            let all_picked = view_data.suggestions.habit_picks.len() == breakdown.habits.len()
                && view_data.suggestions.milestone_picks.len() == breakdown.milestones.len();
            if all_picked {
                view_data.suggestions.habit_picks.clear();
                view_data.suggestions.milestone_picks.clear();
            } else {
                view_data.suggestions.habit_picks = (0..breakdown.habits.len()).collect();
                view_data.suggestions.milestone_picks = (0..breakdown.milestones.len()).collect();
            }
        }
        KeyCode::Enter => {
            let suggestions = view_data.suggestions.clone();
            let (Some(goal_id), Some(breakdown)) = (suggestions.goal_id, &suggestions.breakdown)
            else {
                return;
            };
            match runtime.apply_breakdown(
                goal_id,
                breakdown,
                &suggestions.habit_picks,
                &suggestions.milestone_picks,
            ) {
                Ok((habit_count, milestone_count)) => {
                    view_data.suggestions = SuggestionUiState::default();
                    refresh_after_write(state, runtime, view_data, internal_tx);
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("added {habit_count} habits and {milestone_count} milestones"),
                    );
                }
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        _ => {}
    }
}

fn open_suggestions<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    goal: &Goal,
) {
    view_data.suggestion_request_seq = view_data.suggestion_request_seq.saturating_add(1);
    let request_id = view_data.suggestion_request_seq;
    view_data.suggestions = SuggestionUiState {
        visible: true,
        goal_id: Some(goal.id),
        goal_title: goal.title.clone(),
        in_flight: Some(request_id),
        ..SuggestionUiState::default()
    };
    if let Err(error) = runtime.spawn_breakdown(
        request_id,
        &goal.title,
        &goal.description,
        internal_tx.clone(),
    ) {
        view_data.suggestions = SuggestionUiState::default();
        emit_status(state, view_data, internal_tx, format!("{error:#}"));
    }
}

fn handle_goals_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    edit_mode: bool,
) {
    if view_data.detail.is_some() {
        handle_goal_detail_key(state, runtime, view_data, internal_tx, key, edit_mode);
        return;
    }

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if !view_data.goals.is_empty() {
                view_data.goal_cursor = (view_data.goal_cursor + 1).min(view_data.goals.len() - 1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.goal_cursor = view_data.goal_cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(goal) = view_data.goals.get(view_data.goal_cursor).cloned() else {
                return;
            };
            if let Err(error) = open_goal_detail(runtime, view_data, goal) {
                emit_status(state, view_data, internal_tx, format!("{error:#}"));
            }
        }
        KeyCode::Char('@') => {
            if let Some(goal) = view_data.goals.get(view_data.goal_cursor).cloned() {
                open_suggestions(state, runtime, view_data, internal_tx, &goal);
            }
        }
        KeyCode::Char('a') if edit_mode => {
            open_goal_form(state, view_data, None);
        }
        KeyCode::Char('e') if edit_mode => {
            if let Some(goal) = view_data.goals.get(view_data.goal_cursor).cloned() {
                open_goal_form(state, view_data, Some(&goal));
            }
        }
        KeyCode::Char('d') if edit_mode => {
            if let Some(goal) = view_data.goals.get(view_data.goal_cursor) {
                view_data.confirm = Some(ConfirmUiState {
                    message: format!(
                        "delete goal {:?} and all of its habits and milestones?",
                        goal.title
                    ),
                    action: ConfirmAction::DeleteGoal(goal.id),
                });
            }
        }
        KeyCode::Char('s') if edit_mode => {
            if let Some(goal) = view_data.goals.get(view_data.goal_cursor).cloned() {
                cycle_goal_status(state, runtime, view_data, internal_tx, &goal);
            }
        }
        _ => {}
    }
}

fn handle_goal_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    edit_mode: bool,
) {
    let Some(detail) = view_data.detail.clone() else {
        return;
    };

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if let Some(detail) = &mut view_data.detail {
                let rows = detail.row_count();
                if rows > 0 {
                    detail.cursor = (detail.cursor + 1).min(rows - 1);
                }
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if let Some(detail) = &mut view_data.detail {
                detail.cursor = detail.cursor.saturating_sub(1);
            }
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            toggle_detail_row(state, runtime, view_data, internal_tx, &detail);
        }
        KeyCode::Char('@') => {
            open_suggestions(state, runtime, view_data, internal_tx, &detail.goal);
        }
        KeyCode::Char('h') if edit_mode => {
            open_habit_form(state, view_data, detail.goal.id, None);
        }
        KeyCode::Char('m') if edit_mode => {
            open_milestone_form(state, view_data, detail.goal.id, None);
        }
        KeyCode::Char('e') if edit_mode => match detail_row(&detail, detail.cursor) {
            Some(DetailRow::Milestone(milestone)) => {
                let milestone = milestone.clone();
                open_milestone_form(state, view_data, detail.goal.id, Some(&milestone));
            }
            Some(DetailRow::Habit(habit)) => {
                let habit = habit.clone();
                open_habit_form(state, view_data, detail.goal.id, Some(&habit));
            }
            None => {}
        },
        KeyCode::Char('d') if edit_mode => match detail_row(&detail, detail.cursor) {
            Some(DetailRow::Milestone(milestone)) => {
                view_data.confirm = Some(ConfirmUiState {
                    message: format!("delete milestone {:?}?", milestone.title),
                    action: ConfirmAction::DeleteMilestone(milestone.id),
                });
            }
            Some(DetailRow::Habit(habit)) => {
                view_data.confirm = Some(ConfirmUiState {
                    message: format!("delete habit {:?} and its completion history?", habit.title),
                    action: ConfirmAction::DeleteHabit(habit.id),
                });
            }
            None => {}
        },
        KeyCode::Char('s') if edit_mode => {
            cycle_goal_status(state, runtime, view_data, internal_tx, &detail.goal);
        }
        KeyCode::Char('J') if edit_mode => {
            move_selected_habit(state, runtime, view_data, internal_tx, &detail, false);
        }
        KeyCode::Char('K') if edit_mode => {
            move_selected_habit(state, runtime, view_data, internal_tx, &detail, true);
        }
        _ => {}
    }
}

fn toggle_detail_row<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    detail: &GoalDetailUiState,
) {
    let today = view_data.today;
    let result: Result<String> = match detail_row(detail, detail.cursor) {
        Some(DetailRow::Milestone(milestone)) => runtime
            .set_milestone_completed(milestone.id, !milestone.completed)
            .map(|()| {
                if milestone.completed {
                    "milestone reopened".to_owned()
                } else {
                    "milestone completed".to_owned()
                }
            }),
        Some(DetailRow::Habit(habit)) => runtime
            .toggle_habit_completion(habit.id, today)
            .map(|marked| {
                if marked {
                    format!("{} marked done for today", habit.title)
                } else {
                    format!("{} unmarked for today", habit.title)
                }
            }),
        None => return,
    };

    match result {
        Ok(message) => {
            refresh_after_write(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn move_selected_habit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    detail: &GoalDetailUiState,
    up: bool,
) {
    let Some(DetailRow::Habit(habit)) = detail_row(detail, detail.cursor) else {
        return;
    };
    match runtime.move_habit(habit.id, up) {
        Ok(moved) => {
            refresh_after_write(state, runtime, view_data, internal_tx);
            // Keep the cursor on the habit that moved.
            if moved && let Some(detail) = &mut view_data.detail {
                detail.cursor = if up {
                    detail.cursor.saturating_sub(1)
                } else {
                    (detail.cursor + 1).min(detail.row_count().saturating_sub(1))
                };
            }
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn cycle_goal_status<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    goal: &Goal,
) {
    let next = match goal.status {
        GoalStatus::Active => GoalStatus::Completed,
        GoalStatus::Completed => GoalStatus::Paused,
        GoalStatus::Paused => GoalStatus::Active,
    };
    match runtime.set_goal_status(goal.id, next) {
        Ok(()) => {
            refresh_after_write(state, runtime, view_data, internal_tx);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("goal marked {}", next.as_str()),
            );
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

fn handle_calendar_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => shift_calendar_cursor(view_data, -1),
        KeyCode::Right | KeyCode::Char('l') => shift_calendar_cursor(view_data, 1),
        KeyCode::Up => shift_calendar_cursor(view_data, -7),
        KeyCode::Down => shift_calendar_cursor(view_data, 7),
        KeyCode::Char('[') => shift_calendar_month(view_data, -1),
        KeyCode::Char(']') => shift_calendar_month(view_data, 1),
        KeyCode::Char('t') => {
            view_data.calendar.cursor = view_data.today;
        }
        KeyCode::Char('j') => {
            if !view_data.habits.is_empty() {
                view_data.calendar.habit_cursor =
                    (view_data.calendar.habit_cursor + 1).min(view_data.habits.len() - 1);
            }
        }
        KeyCode::Char('k') => {
            view_data.calendar.habit_cursor = view_data.calendar.habit_cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            let Some(habit) = view_data
                .habits
                .get(view_data.calendar.habit_cursor)
                .cloned()
            else {
                return;
            };
            let on = view_data.calendar.cursor;
            match runtime.toggle_habit_completion(habit.id, on) {
                Ok(marked) => {
                    refresh_after_write(state, runtime, view_data, internal_tx);
                    let verb = if marked { "marked done" } else { "unmarked" };
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("{} {} on {}", habit.title, verb, on),
                    );
                }
                Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
            }
        }
        _ => {}
    }
}

fn shift_calendar_cursor(view_data: &mut ViewData, days: i64) {
    if let Some(next) = view_data
        .calendar
        .cursor
        .checked_add(time::Duration::days(days))
    {
        view_data.calendar.cursor = next;
    }
}

fn shift_calendar_month(view_data: &mut ViewData, delta: i32) {
    let cursor = view_data.calendar.cursor;
    let (year, month) = calendar::shift_month(cursor.year(), cursor.month(), delta);
    // Clamp the day when the target month is shorter.
    let day = cursor.day().min(time::util::days_in_year_month(year, month));
    if let Ok(next) = Date::from_calendar_date(year, month, day) {
        view_data.calendar.cursor = next;
    }
}

fn handle_settings_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            if !view_data.settings.is_empty() {
                view_data.setting_cursor =
                    (view_data.setting_cursor + 1).min(view_data.settings.len() - 1);
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.setting_cursor = view_data.setting_cursor.saturating_sub(1);
        }
        KeyCode::Enter | KeyCode::Char('e') | KeyCode::Char(' ') => {
            let Some(setting) = view_data.settings.get(view_data.setting_cursor).cloned() else {
                return;
            };
            match setting.key.expected_value_kind() {
                // Two-state values flip in place; free text opens an editor.
                SettingValueKind::Bool => {
                    let next = match setting.value {
                        SettingValue::Bool(value) => SettingValue::Bool(!value),
                        _ => SettingValue::Bool(true),
                    };
                    apply_setting(state, runtime, view_data, internal_tx, setting.key, next);
                }
                SettingValueKind::WeekStart => {
                    let next = match setting.value {
                        SettingValue::Week(WeekStart::Sunday) => {
                            SettingValue::Week(WeekStart::Monday)
                        }
                        _ => SettingValue::Week(WeekStart::Sunday),
                    };
                    apply_setting(state, runtime, view_data, internal_tx, setting.key, next);
                }
                SettingValueKind::Text => {
                    view_data.setting_editor = Some(SettingEditorUiState {
                        key: setting.key,
                        value: setting.value.display(),
                    });
                }
            }
        }
        _ => {}
    }
}

fn apply_setting<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: SettingKey,
    value: SettingValue,
) {
    let setting = AppSetting { key, value };
    match runtime.put_setting(&setting) {
        Ok(()) => {
            refresh_after_write(state, runtime, view_data, internal_tx);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("{} set to {}", key.label(), setting.value.display()),
            );
        }
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
    }
}

enum DetailRow<'a> {
    Milestone(&'a Milestone),
    Habit(&'a Habit),
}

fn detail_row<'a>(detail: &'a GoalDetailUiState, index: usize) -> Option<DetailRow<'a>> {
    if index < detail.milestones.len() {
        return Some(DetailRow::Milestone(&detail.milestones[index]));
    }
    detail
        .habits
        .get(index - detail.milestones.len())
        .map(DetailRow::Habit)
}

fn open_goal_detail<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    goal: Goal,
) -> Result<()> {
    let (habits, milestones) = runtime.load_goal_items(goal.id)?;
    view_data.detail = Some(GoalDetailUiState {
        goal,
        habits,
        milestones,
        cursor: 0,
    });
    Ok(())
}

fn open_goal_form(state: &mut AppState, view_data: &mut ViewData, existing: Option<&Goal>) {
    let (target, fields) = match existing {
        Some(goal) => (
            FormTarget::EditGoal(goal.id),
            vec![
                FormField::new("title", "", goal.title.clone()),
                FormField::new("description", "", goal.description.clone()),
                FormField::new("start date", DATE_HINT, format_optional_date(goal.start_date)),
                FormField::new(
                    "target date",
                    DATE_HINT,
                    format_optional_date(goal.target_date),
                ),
                FormField::new("status", "active/completed/paused", goal.status.as_str()),
            ],
        ),
        None => (
            FormTarget::Create,
            vec![
                FormField::new("title", "", ""),
                FormField::new("description", "", ""),
                FormField::new("start date", DATE_HINT, ""),
                FormField::new("target date", DATE_HINT, ""),
                FormField::new("status", "active/completed/paused", "active"),
            ],
        ),
    };
    view_data.form = Some(FormUiState {
        kind: FormKind::Goal,
        target,
        goal_id: None,
        fields,
        cursor: 0,
    });
    state.dispatch(AppCommand::OpenForm(FormKind::Goal));
}

fn open_habit_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    goal_id: GoalId,
    existing: Option<&Habit>,
) {
    let (target, fields) = match existing {
        Some(habit) => (
            FormTarget::EditHabit(habit.id),
            vec![
                FormField::new("title", "", habit.title.clone()),
                FormField::new("description", "", habit.description.clone()),
                FormField::new(
                    "frequency",
                    "daily/weekly/monthly/custom",
                    habit.frequency.as_str(),
                ),
                FormField::new(
                    "frequency value",
                    habit.frequency.value_hint(),
                    habit.frequency_value.to_string(),
                ),
                FormField::new(
                    "start date",
                    DATE_HINT,
                    format_optional_date(habit.start_date),
                ),
                FormField::new("due date", DATE_HINT, format_optional_date(habit.due_date)),
            ],
        ),
        None => (
            FormTarget::Create,
            vec![
                FormField::new("title", "", ""),
                FormField::new("description", "", ""),
                FormField::new("frequency", "daily/weekly/monthly/custom", "daily"),
                FormField::new("frequency value", "count per period", "1"),
                FormField::new("start date", DATE_HINT, ""),
                FormField::new("due date", DATE_HINT, ""),
            ],
        ),
    };
    view_data.form = Some(FormUiState {
        kind: FormKind::Habit,
        target,
        goal_id: Some(goal_id),
        fields,
        cursor: 0,
    });
    state.dispatch(AppCommand::OpenForm(FormKind::Habit));
}

fn open_milestone_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    goal_id: GoalId,
    existing: Option<&Milestone>,
) {
    let (target, fields) = match existing {
        Some(milestone) => (
            FormTarget::EditMilestone(milestone.id),
            vec![
                FormField::new("title", "", milestone.title.clone()),
                FormField::new("description", "", milestone.description.clone()),
                FormField::new(
                    "target date",
                    DATE_HINT,
                    format_optional_date(milestone.target_date),
                ),
            ],
        ),
        None => (
            FormTarget::Create,
            vec![
                FormField::new("title", "", ""),
                FormField::new("description", "", ""),
                FormField::new("target date", DATE_HINT, ""),
            ],
        ),
    };
    view_data.form = Some(FormUiState {
        kind: FormKind::Milestone,
        target,
        goal_id: Some(goal_id),
        fields,
        cursor: 0,
    });
    state.dispatch(AppCommand::OpenForm(FormKind::Milestone));
}

fn goal_input_from_fields(fields: &[FormField]) -> Result<GoalFormInput> {
    Ok(GoalFormInput {
        title: field_value(fields, "title"),
        description: field_value(fields, "description"),
        start_date: parse_optional_date(&field_value(fields, "start date"))?,
        target_date: parse_optional_date(&field_value(fields, "target date"))?,
        status: parse_status(&field_value(fields, "status"))?,
    })
}

fn habit_input_from_fields(goal_id: GoalId, fields: &[FormField]) -> Result<HabitFormInput> {
    Ok(HabitFormInput {
        goal_id,
        title: field_value(fields, "title"),
        description: field_value(fields, "description"),
        frequency: parse_frequency(&field_value(fields, "frequency"))?,
        frequency_value: parse_frequency_value(&field_value(fields, "frequency value"))?,
        start_date: parse_optional_date(&field_value(fields, "start date"))?,
        due_date: parse_optional_date(&field_value(fields, "due date"))?,
    })
}

fn milestone_input_from_fields(
    goal_id: GoalId,
    fields: &[FormField],
) -> Result<MilestoneFormInput> {
    Ok(MilestoneFormInput {
        goal_id,
        title: field_value(fields, "title"),
        description: field_value(fields, "description"),
        target_date: parse_optional_date(&field_value(fields, "target date"))?,
    })
}

fn field_value(fields: &[FormField], label: &str) -> String {
    fields
        .iter()
        .find(|field| field.label == label)
        .map(|field| field.value.trim().to_owned())
        .unwrap_or_default()
}

fn parse_optional_date(raw: &str) -> Result<Option<Date>> {
    if raw.is_empty() {
        return Ok(None);
    }
    Date::parse(raw, &format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| anyhow::anyhow!("invalid date {raw:?}; use YYYY-MM-DD"))
}

fn parse_status(raw: &str) -> Result<GoalStatus> {
    GoalStatus::parse(&raw.to_ascii_lowercase())
        .ok_or_else(|| anyhow::anyhow!("invalid status {raw:?}; use active, completed, or paused"))
}

fn parse_frequency(raw: &str) -> Result<HabitFrequency> {
    HabitFrequency::parse(&raw.to_ascii_lowercase()).ok_or_else(|| {
        anyhow::anyhow!("invalid frequency {raw:?}; use daily, weekly, monthly, or custom")
    })
}

fn parse_frequency_value(raw: &str) -> Result<i32> {
    let value: i32 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid frequency value {raw:?}; use a whole number"))?;
    if value < 1 {
        anyhow::bail!("frequency value must be at least 1");
    }
    Ok(value)
}

fn format_optional_date(value: Option<Date>) -> String {
    value.map(|date| date.to_string()).unwrap_or_default()
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
) {
    state.dispatch(command);
    if let Err(error) = refresh_view_data(runtime, view_data) {
        state.status_line = Some(format!("load failed: {error}"));
    }
}

fn refresh_after_write<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = refresh_view_data(runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("reload failed: {error}"));
    }
}

/// Reloads every tab's data from the runtime and clamps cursors against the
/// new row counts. An open detail follows its goal, or closes when the goal
/// is gone.
fn refresh_view_data<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    view_data.session = runtime.session().cloned();
    view_data.today = runtime.today();
    view_data.help_bar = runtime.show_help_bar();
    if view_data.session.is_none() {
        return Ok(());
    }

    view_data.stats = runtime.load_dashboard_stats()?;
    view_data.goals = runtime.load_goals()?;
    view_data.goal_cursor = view_data
        .goal_cursor
        .min(view_data.goals.len().saturating_sub(1));

    if let Some(detail) = &view_data.detail {
        let goal_id = detail.goal.id;
        let cursor = detail.cursor;
        match view_data.goals.iter().find(|goal| goal.id == goal_id) {
            Some(goal) => {
                let (habits, milestones) = runtime.load_goal_items(goal_id)?;
                let rows = habits.len() + milestones.len();
                view_data.detail = Some(GoalDetailUiState {
                    goal: goal.clone(),
                    habits,
                    milestones,
                    cursor: cursor.min(rows.saturating_sub(1)),
                });
            }
            None => view_data.detail = None,
        }
    }

    view_data.habits = runtime.load_habits()?;
    view_data.completions = runtime.load_completions()?;
    view_data.calendar.week_start = runtime.week_start()?;
    view_data.calendar.habit_cursor = view_data
        .calendar
        .habit_cursor
        .min(view_data.habits.len().saturating_sub(1));

    view_data.settings = runtime.list_settings()?;
    view_data.setting_cursor = view_data
        .setting_cursor
        .min(view_data.settings.len().saturating_sub(1));

    Ok(())
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    if view_data.session.is_none() {
        render_auth(frame, view_data, layout[1]);
        let status = Paragraph::new(status_text(state, view_data))
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(status, layout[2]);
        return;
    }

    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles: Vec<String> = TabKind::ALL
        .iter()
        .map(|tab| tab.label().to_owned())
        .collect();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("ontrack").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match state.active_tab {
        TabKind::Dashboard => {
            let body = Paragraph::new(render_dashboard_text(view_data))
                .block(Block::default().borders(Borders::ALL).title("dashboard"));
            frame.render_widget(body, layout[1]);
        }
        TabKind::Goals => match &view_data.detail {
            Some(detail) => {
                let body = Paragraph::new(render_detail_text(detail, view_data)).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(truncate_label(&detail.goal.title, 48)),
                );
                frame.render_widget(body, layout[1]);
            }
            None => render_goals_table(frame, layout[1], view_data),
        },
        TabKind::Calendar => {
            let body = Paragraph::new(render_calendar_text(view_data))
                .block(Block::default().borders(Borders::ALL).title("calendar"));
            frame.render_widget(body, layout[1]);
        }
        TabKind::Settings => render_settings_table(frame, layout[1], view_data),
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(64, 62, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_form_text(form)).block(
            Block::default()
                .title(form_title(form.kind))
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(widget, area);
    }

    if view_data.suggestions.visible {
        let area = centered_rect(72, 70, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_suggestions_text(&view_data.suggestions)).block(
            Block::default()
                .title("suggestions")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(widget, area);
    }

    if let Some(editor) = &view_data.setting_editor {
        let area = centered_rect(52, 22, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(format!(
            "{}: {}_\n\nenter save | esc cancel",
            editor.key.label(),
            editor.value
        ))
        .block(Block::default().title("edit setting").borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if let Some(confirm) = &view_data.confirm {
        let area = centered_rect(56, 22, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(format!("{}\n\ny confirm | n cancel", confirm.message)).block(
            Block::default()
                .title("confirm")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_auth(frame: &mut ratatui::Frame<'_>, view_data: &ViewData, area: Rect) {
    let panel = centered_rect(54, 60, area);
    frame.render_widget(Clear, panel);
    let widget = Paragraph::new(render_auth_text(&view_data.auth)).block(
        Block::default()
            .title("ontrack")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(widget, panel);
}

fn render_auth_text(auth: &AuthUiState) -> String {
    let mut lines = Vec::new();
    match auth.mode {
        AuthMode::SignIn => lines.push("sign in".to_owned()),
        AuthMode::SignUp => lines.push("sign up".to_owned()),
    }
    lines.push(String::new());
    lines.push(auth_field_line("email", &auth.email, auth.field == 0));
    if auth.mode == AuthMode::SignUp {
        lines.push(auth_field_line(
            "full name",
            &auth.full_name,
            auth.field == 1,
        ));
    }
    let password_index = auth.field_count() - 1;
    lines.push(auth_field_line(
        "password",
        &"*".repeat(auth.password.chars().count()),
        auth.field == password_index,
    ));
    lines.push(String::new());
    let toggle = match auth.mode {
        AuthMode::SignIn => "ctrl+u sign up instead",
        AuthMode::SignUp => "ctrl+u sign in instead",
    };
    lines.push(format!(
        "enter submit | tab next field | {toggle} | ctrl+g guest | ctrl+q quit"
    ));
    lines.join("\n")
}

fn auth_field_line(label: &str, value: &str, active: bool) -> String {
    let marker = if active { ">" } else { " " };
    let caret = if active { "_" } else { "" };
    format!("{marker} {label}: {value}{caret}")
}

fn render_dashboard_text(view_data: &ViewData) -> String {
    let mut lines = Vec::new();
    if let Some(session) = &view_data.session {
        let kind = match session.kind {
            SessionKind::Authenticated => "signed in",
            SessionKind::Guest => "guest (not saved)",
        };
        lines.push(format!("{} -- {kind}", session.profile.email));
        if let Some(limit) = session.suggestion_limit() {
            lines.push(format!(
                "suggestion quota: {} of {limit} used",
                session.ai_queries_used
            ));
        }
        lines.push(String::new());
    }
    lines.push(format!("active goals:    {}", view_data.stats.active_goals));
    lines.push(format!(
        "completed goals: {}",
        view_data.stats.completed_goals
    ));
    lines.push(format!("habits tracked:  {}", view_data.stats.total_habits));
    lines.push(format!(
        "habits done today: {}%",
        view_data.stats.completion_rate
    ));
    lines.join("\n")
}

fn render_goals_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let header = Row::new(["title", "status", "progress", "start", "target"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = view_data.goals.iter().enumerate().map(|(index, goal)| {
        let style = if index == view_data.goal_cursor {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        Row::new([
            Cell::from(truncate_label(&goal.title, TITLE_COLUMN_CHARS)),
            Cell::from(goal.status.as_str()),
            Cell::from(progress_bar(goal.progress, PROGRESS_BAR_WIDTH)),
            Cell::from(format_optional_date(goal.start_date)),
            Cell::from(format_optional_date(goal.target_date)),
        ])
        .style(style)
    });

    let widths = [
        Constraint::Min(TITLE_COLUMN_CHARS as u16),
        Constraint::Length(9),
        Constraint::Length((PROGRESS_BAR_WIDTH + 7) as u16),
        Constraint::Length(10),
        Constraint::Length(10),
    ];
    let title = format!("goals ({})", view_data.goals.len());
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_detail_text(detail: &GoalDetailUiState, view_data: &ViewData) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} | {}",
        detail.goal.status.as_str(),
        progress_bar(detail.goal.progress, PROGRESS_BAR_WIDTH)
    ));
    if !detail.goal.description.is_empty() {
        lines.push(detail.goal.description.clone());
    }
    if detail.goal.start_date.is_some() || detail.goal.target_date.is_some() {
        lines.push(format!(
            "start {} | target {}",
            format_optional_date(detail.goal.start_date),
            format_optional_date(detail.goal.target_date),
        ));
    }

    lines.push(String::new());
    lines.push(format!("milestones ({})", detail.milestones.len()));
    for (index, milestone) in detail.milestones.iter().enumerate() {
        let marker = if index == detail.cursor { ">" } else { " " };
        let done = if milestone.completed {
            DONE_MARK
        } else {
            TODO_MARK
        };
        let target = match milestone.target_date {
            Some(date) => format!(" (target {date})"),
            None => String::new(),
        };
        lines.push(format!("{marker} {done} {}{target}", milestone.title));
    }

    lines.push(String::new());
    lines.push(format!("habits ({})", detail.habits.len()));
    for (index, habit) in detail.habits.iter().enumerate() {
        let row = detail.milestones.len() + index;
        let marker = if row == detail.cursor { ">" } else { " " };
        let today_mark =
            if calendar::completed_on(&view_data.completions, habit.id, view_data.today) {
                DONE_MARK
            } else {
                TODO_MARK
            };
        let score = progress::habit_score(habit, &view_data.completions, view_data.today);
        lines.push(format!(
            "{marker} {today_mark} {} ({} x{}, 30d {}%)",
            habit.title,
            habit.frequency.as_str(),
            habit.frequency_value,
            (score * 100.0).round() as u8,
        ));
    }

    lines.push(String::new());
    lines.push("space toggle | esc back".to_owned());
    lines.join("\n")
}

fn render_calendar_text(view_data: &ViewData) -> String {
    let cursor = view_data.calendar.cursor;
    let week_start = view_data.calendar.week_start;
    let mut lines = Vec::new();
    lines.push(format!("{} {}", month_name(cursor.month()), cursor.year()));
    lines.push(
        calendar::weekday_labels(week_start)
            .map(|label| format!("{label:>4}"))
            .join(""),
    );

    for week in calendar::month_grid(cursor.year(), cursor.month(), week_start) {
        let mut row = String::new();
        for cell in week {
            match cell {
                Some(date) => {
                    if date == cursor {
                        row.push_str(&format!("[{:>2}]", date.day()));
                    } else {
                        let due = !calendar::habits_due_on(&view_data.habits, date).is_empty();
                        let done = view_data.habits.iter().any(|habit| {
                            calendar::completed_on(&view_data.completions, habit.id, date)
                        });
                        let mark = if done {
                            '+'
                        } else if due {
                            '*'
                        } else {
                            ' '
                        };
                        row.push_str(&format!("{:>3}{mark}", date.day()));
                    }
                }
                None => row.push_str("    "),
            }
        }
        lines.push(row);
    }

    lines.push(String::new());
    lines.push(format!("habits on {cursor}"));
    if view_data.habits.is_empty() {
        lines.push("  (no habits yet)".to_owned());
    }
    for (index, habit) in view_data.habits.iter().enumerate() {
        let marker = if index == view_data.calendar.habit_cursor {
            ">"
        } else {
            " "
        };
        let done = if calendar::completed_on(&view_data.completions, habit.id, cursor) {
            DONE_MARK
        } else {
            TODO_MARK
        };
        let due = if habit.due_date == Some(cursor) {
            " (due)"
        } else {
            ""
        };
        lines.push(format!("{marker} {done} {}{due}", habit.title));
    }

    lines.push(String::new());
    lines.push("arrows move day | [/] month | t today | j/k habit | space mark".to_owned());
    lines.join("\n")
}

fn render_settings_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let header = Row::new(["setting", "value"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = view_data
        .settings
        .iter()
        .enumerate()
        .map(|(index, setting)| {
            let style = if index == view_data.setting_cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new([
                Cell::from(setting.key.label()),
                Cell::from(setting.value.display()),
            ])
            .style(style)
        });

    let widths = [Constraint::Min(20), Constraint::Min(16)];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title("settings").borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_form_text(form: &FormUiState) -> String {
    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let marker = if index == form.cursor { ">" } else { " " };
        let caret = if index == form.cursor { "_" } else { "" };
        let hint = if field.hint.is_empty() {
            String::new()
        } else {
            format!("  ({})", field.hint)
        };
        lines.push(format!(
            "{marker} {}: {}{caret}{hint}",
            field.label, field.value
        ));
    }
    lines.push(String::new());
    lines.push("enter submit | tab next field | esc cancel".to_owned());
    lines.join("\n")
}

fn form_title(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Goal => "goal",
        FormKind::Habit => "habit",
        FormKind::Milestone => "milestone",
    }
}

fn render_suggestions_text(suggestions: &SuggestionUiState) -> String {
    let mut lines = Vec::new();
    lines.push(format!("breakdown for {:?}", suggestions.goal_title));
    lines.push(String::new());

    let Some(breakdown) = &suggestions.breakdown else {
        lines.push("thinking...".to_owned());
        lines.push(String::new());
        lines.push("esc cancel".to_owned());
        return lines.join("\n");
    };

    lines.push(format!("habits ({})", breakdown.habits.len()));
    for (index, habit) in breakdown.habits.iter().enumerate() {
        let marker = if suggestions.cursor == index { ">" } else { " " };
        let picked = if suggestions.habit_picks.contains(&index) {
            DONE_MARK
        } else {
            TODO_MARK
        };
        lines.push(format!(
            "{marker} {picked} {} ({} x{}, {})",
            habit.title, habit.frequency, habit.frequency_value, habit.estimated_duration,
        ));
    }

    lines.push(String::new());
    lines.push(format!("milestones ({})", breakdown.milestones.len()));
    for (index, milestone) in breakdown.milestones.iter().enumerate() {
        let row = breakdown.habits.len() + index;
        let marker = if suggestions.cursor == row { ">" } else { " " };
        let picked = if suggestions.milestone_picks.contains(&index) {
            DONE_MARK
        } else {
            TODO_MARK
        };
        lines.push(format!(
            "{marker} {picked} {} (+{}d, {})",
            milestone.title, milestone.target_date_offset, milestone.estimated_completion_time,
        ));
    }

    lines.push(String::new());
    lines.push(format!("source: {}", breakdown.source.label()));
    lines.push("space pick | a all/none | enter apply | esc close".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ctrl+x sign out | ? help | b/f or tab tabs | 1-4 jump\n\
nav: j/k move | enter open | space toggle done | @ suggestions | i edit mode | esc back\n\
edit: a add goal | h add habit | m add milestone | e edit | d delete | s cycle status\n\
edit: J/K reorder habit | esc nav\n\
form: type in field | tab/shift+tab field | enter submit | esc cancel\n\
calendar: arrows move day | [/] month | t today | j/k habit | space mark date\n\
suggestions: j/k move | space pick | a all/none | enter apply | esc close\n\
auth: tab field | enter submit | ctrl+u sign in/up | ctrl+g guest"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if status_hidden_by_overlay(view_data) {
        return String::new();
    }

    if view_data.session.is_none() {
        return match &state.status_line {
            Some(status) => status.clone(),
            None => "sign in, or press ctrl+g to explore as a guest".to_owned(),
        };
    }

    let mode = mode_label(state.mode);
    let hint = match state.active_tab {
        TabKind::Dashboard => "b/f tabs | ? help",
        TabKind::Goals => {
            if view_data.detail.is_some() {
                "j/k move | space toggle | @ suggest | i edit | esc back"
            } else {
                "j/k move | enter open | @ suggest | i edit | ? help"
            }
        }
        TabKind::Calendar => "arrows day | [/] month | j/k habit | space mark",
        TabKind::Settings => "j/k move | enter edit",
    };
    match (&state.status_line, view_data.help_bar) {
        (Some(status), true) => format!("{mode} | {status} | {hint}"),
        (Some(status), false) => format!("{mode} | {status}"),
        (None, true) => format!("{mode} | {hint}"),
        (None, false) => mode.to_owned(),
    }
}

fn status_hidden_by_overlay(view_data: &ViewData) -> bool {
    view_data.help_visible
        || view_data.form.is_some()
        || view_data.confirm.is_some()
        || view_data.setting_editor.is_some()
        || view_data.suggestions.visible
}

fn mode_label(mode: AppMode) -> &'static str {
    match mode {
        AppMode::Nav => "nav",
        AppMode::Edit => "edit",
        AppMode::Form(_) => "form",
    }
}

fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100);
    let filled = (percent as usize * width).div_euclid(100);
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
    )
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let kept: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

fn month_name(month: Month) -> &'static str {
    match month {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, AuthMode, InternalEvent, SuggestionBreakdown, SuggestionEvent, SuggestionHabit,
        SuggestionMilestone, SuggestionSource, ViewData, handle_key_event, help_overlay_text,
        process_internal_events, progress_bar, refresh_view_data, render_calendar_text,
        render_dashboard_text, render_detail_text, render_suggestions_text, status_text,
        truncate_label,
    };
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ontrack_app::{
        AppMode, AppSetting, AppState, CompletionId, DashboardStats, FormPayload, Goal,
        GoalFormInput, GoalId, GoalStatus, Habit, HabitCompletion, HabitFormInput, HabitFrequency,
        HabitId, Milestone, MilestoneFormInput, MilestoneId, Profile, ProfileId, Session,
        SettingKey, SettingValue, SignInInput, SignUpInput, TabKind, WeekStart,
    };
    use std::collections::BTreeSet;
    use std::sync::mpsc::{self, Receiver, Sender};
    use time::{Date, Month};

    fn day(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).expect("valid date")
    }

    fn today() -> Date {
        day(2026, Month::February, 19)
    }

    fn profile() -> Profile {
        let created = today().with_hms(8, 0, 0).expect("valid time").assume_utc();
        Profile {
            id: ProfileId::new(1),
            email: "user@example.com".to_owned(),
            full_name: "A User".to_owned(),
            created_at: created,
            updated_at: created,
        }
    }

    fn sample_goal(id: i64, title: &str, progress: u8) -> Goal {
        let created = today().with_hms(8, 0, 0).expect("valid time").assume_utc();
        Goal {
            id: GoalId::new(id),
            profile_id: ProfileId::new(1),
            title: title.to_owned(),
            description: String::new(),
            start_date: Some(day(2026, Month::January, 1)),
            target_date: Some(day(2026, Month::September, 1)),
            status: GoalStatus::Active,
            progress,
            created_at: created,
            updated_at: created,
        }
    }

    fn sample_habit(id: i64, goal_id: i64, title: &str) -> Habit {
        let created = today().with_hms(8, 0, 0).expect("valid time").assume_utc();
        Habit {
            id: HabitId::new(id),
            profile_id: ProfileId::new(1),
            goal_id: GoalId::new(goal_id),
            title: title.to_owned(),
            description: String::new(),
            frequency: HabitFrequency::Daily,
            frequency_value: 1,
            start_date: None,
            due_date: None,
            order_index: id as i32,
            created_at: created,
            updated_at: created,
        }
    }

    fn sample_milestone(id: i64, goal_id: i64, title: &str) -> Milestone {
        let created = today().with_hms(8, 0, 0).expect("valid time").assume_utc();
        Milestone {
            id: MilestoneId::new(id),
            profile_id: ProfileId::new(1),
            goal_id: GoalId::new(goal_id),
            title: title.to_owned(),
            description: String::new(),
            target_date: None,
            completed: false,
            order_index: id as i32,
            created_at: created,
            updated_at: created,
        }
    }

    fn template_breakdown() -> SuggestionBreakdown {
        SuggestionBreakdown {
            habits: vec![
                SuggestionHabit {
                    title: "Training Run".to_owned(),
                    description: String::new(),
                    frequency: "daily".to_owned(),
                    frequency_value: 1,
                    estimated_duration: "45 minutes".to_owned(),
                },
                SuggestionHabit {
                    title: "Long Run".to_owned(),
                    description: String::new(),
                    frequency: "weekly".to_owned(),
                    frequency_value: 1,
                    estimated_duration: "2 hours".to_owned(),
                },
            ],
            milestones: vec![SuggestionMilestone {
                title: "Finish a Half Marathon".to_owned(),
                description: String::new(),
                target_date_offset: 90,
                estimated_completion_time: "12 weeks".to_owned(),
            }],
            source: SuggestionSource::Template,
        }
    }

    #[derive(Debug)]
    struct TestRuntime {
        session: Option<Session>,
        goals: Vec<Goal>,
        habits: Vec<Habit>,
        milestones: Vec<Milestone>,
        completions: Vec<HabitCompletion>,
        settings: Vec<AppSetting>,
        week_start: WeekStart,
        next_completion_id: i64,
        sign_ins: usize,
        sign_ups: usize,
        guest_starts: usize,
        sign_outs: usize,
        submitted: Vec<FormPayload>,
        updated_goals: Vec<(GoalId, GoalFormInput)>,
        status_changes: Vec<(GoalId, GoalStatus)>,
        deleted_goals: Vec<GoalId>,
        toggles: Vec<(HabitId, Date)>,
        milestone_sets: Vec<(MilestoneId, bool)>,
        moves: Vec<(HabitId, bool)>,
        put_settings: Vec<AppSetting>,
        breakdown_error: Option<String>,
        applied: Vec<(GoalId, usize, usize)>,
        help_bar: bool,
    }

    impl TestRuntime {
        fn signed_out() -> Self {
            Self {
                session: None,
                goals: Vec::new(),
                habits: Vec::new(),
                milestones: Vec::new(),
                completions: Vec::new(),
                settings: Vec::new(),
                week_start: WeekStart::Sunday,
                next_completion_id: 1,
                sign_ins: 0,
                sign_ups: 0,
                guest_starts: 0,
                sign_outs: 0,
                submitted: Vec::new(),
                updated_goals: Vec::new(),
                status_changes: Vec::new(),
                deleted_goals: Vec::new(),
                toggles: Vec::new(),
                milestone_sets: Vec::new(),
                moves: Vec::new(),
                put_settings: Vec::new(),
                breakdown_error: None,
                applied: Vec::new(),
                help_bar: true,
            }
        }

        fn signed_in() -> Self {
            Self {
                session: Some(Session::authenticated(profile())),
                goals: vec![
                    sample_goal(1, "Run a Marathon", 40),
                    sample_goal(2, "Write a Book", 10),
                ],
                habits: vec![
                    sample_habit(1, 1, "Morning run"),
                    sample_habit(2, 1, "Stretching"),
                ],
                milestones: vec![
                    sample_milestone(1, 1, "Finish a 10k"),
                    sample_milestone(2, 1, "Finish a half"),
                ],
                settings: vec![
                    AppSetting {
                        key: SettingKey::UiShowDashboard,
                        value: SettingValue::Bool(true),
                    },
                    AppSetting {
                        key: SettingKey::UiWeekStart,
                        value: SettingValue::Week(WeekStart::Sunday),
                    },
                    AppSetting {
                        key: SettingKey::AiModel,
                        value: SettingValue::Text("llama3.2".to_owned()),
                    },
                ],
                ..Self::signed_out()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn session(&self) -> Option<&Session> {
            self.session.as_ref()
        }

        fn today(&self) -> Date {
            today()
        }

        fn show_help_bar(&self) -> bool {
            self.help_bar
        }

        fn sign_in(&mut self, _input: &SignInInput) -> Result<()> {
            self.sign_ins += 1;
            self.session = Some(Session::authenticated(profile()));
            Ok(())
        }

        fn sign_up(&mut self, _input: &SignUpInput) -> Result<()> {
            self.sign_ups += 1;
            self.session = Some(Session::authenticated(profile()));
            Ok(())
        }

        fn start_guest_session(&mut self) -> Result<()> {
            self.guest_starts += 1;
            self.session = Some(Session::guest(profile()));
            Ok(())
        }

        fn sign_out(&mut self) -> Result<()> {
            self.sign_outs += 1;
            self.session = None;
            Ok(())
        }

        fn load_dashboard_stats(&mut self) -> Result<DashboardStats> {
            Ok(DashboardStats {
                active_goals: self
                    .goals
                    .iter()
                    .filter(|goal| goal.status == GoalStatus::Active)
                    .count(),
                completed_goals: self
                    .goals
                    .iter()
                    .filter(|goal| goal.status == GoalStatus::Completed)
                    .count(),
                total_habits: self.habits.len(),
                completion_rate: 0,
            })
        }

        fn load_goals(&mut self) -> Result<Vec<Goal>> {
            Ok(self.goals.clone())
        }

        fn load_goal_items(&mut self, goal_id: GoalId) -> Result<(Vec<Habit>, Vec<Milestone>)> {
            let habits = self
                .habits
                .iter()
                .filter(|habit| habit.goal_id == goal_id)
                .cloned()
                .collect();
            let milestones = self
                .milestones
                .iter()
                .filter(|milestone| milestone.goal_id == goal_id)
                .cloned()
                .collect();
            Ok((habits, milestones))
        }

        fn load_habits(&mut self) -> Result<Vec<Habit>> {
            Ok(self.habits.clone())
        }

        fn load_completions(&mut self) -> Result<Vec<HabitCompletion>> {
            Ok(self.completions.clone())
        }

        fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
            self.submitted.push(payload.clone());
            Ok(())
        }

        fn update_goal(&mut self, goal_id: GoalId, input: &GoalFormInput) -> Result<()> {
            self.updated_goals.push((goal_id, input.clone()));
            Ok(())
        }

        fn update_habit(&mut self, _habit_id: HabitId, _input: &HabitFormInput) -> Result<()> {
            Ok(())
        }

        fn update_milestone(
            &mut self,
            _milestone_id: MilestoneId,
            _input: &MilestoneFormInput,
        ) -> Result<()> {
            Ok(())
        }

        fn set_goal_status(&mut self, goal_id: GoalId, status: GoalStatus) -> Result<()> {
            self.status_changes.push((goal_id, status));
            if let Some(goal) = self.goals.iter_mut().find(|goal| goal.id == goal_id) {
                goal.status = status;
            }
            Ok(())
        }

        fn delete_goal(&mut self, goal_id: GoalId) -> Result<()> {
            self.deleted_goals.push(goal_id);
            self.goals.retain(|goal| goal.id != goal_id);
            self.habits.retain(|habit| habit.goal_id != goal_id);
            self.milestones
                .retain(|milestone| milestone.goal_id != goal_id);
            Ok(())
        }

        fn delete_habit(&mut self, habit_id: HabitId) -> Result<()> {
            self.habits.retain(|habit| habit.id != habit_id);
            self.completions
                .retain(|completion| completion.habit_id != habit_id);
            Ok(())
        }

        fn delete_milestone(&mut self, milestone_id: MilestoneId) -> Result<()> {
            self.milestones
                .retain(|milestone| milestone.id != milestone_id);
            Ok(())
        }

        fn toggle_habit_completion(&mut self, habit_id: HabitId, on: Date) -> Result<bool> {
            self.toggles.push((habit_id, on));
            let existing = self.completions.iter().position(|completion| {
                completion.habit_id == habit_id && completion.completed_at.date() == on
            });
            match existing {
                Some(index) => {
                    self.completions.remove(index);
                    Ok(false)
                }
                None => {
                    let at = on.with_hms(0, 0, 0).expect("valid time").assume_utc();
                    self.completions.push(HabitCompletion {
                        id: CompletionId::new(self.next_completion_id),
                        profile_id: ProfileId::new(1),
                        habit_id,
                        completed_at: at,
                        created_at: at,
                    });
                    self.next_completion_id += 1;
                    Ok(true)
                }
            }
        }

        fn set_milestone_completed(
            &mut self,
            milestone_id: MilestoneId,
            completed: bool,
        ) -> Result<()> {
            self.milestone_sets.push((milestone_id, completed));
            if let Some(milestone) = self
                .milestones
                .iter_mut()
                .find(|milestone| milestone.id == milestone_id)
            {
                milestone.completed = completed;
            }
            Ok(())
        }

        fn move_habit(&mut self, habit_id: HabitId, up: bool) -> Result<bool> {
            self.moves.push((habit_id, up));
            Ok(true)
        }

        fn list_settings(&mut self) -> Result<Vec<AppSetting>> {
            Ok(self.settings.clone())
        }

        fn put_setting(&mut self, setting: &AppSetting) -> Result<()> {
            self.put_settings.push(setting.clone());
            if let Some(existing) = self
                .settings
                .iter_mut()
                .find(|existing| existing.key == setting.key)
            {
                existing.value = setting.value.clone();
            }
            Ok(())
        }

        fn week_start(&mut self) -> Result<WeekStart> {
            Ok(self.week_start)
        }

        fn run_breakdown(
            &mut self,
            _goal_title: &str,
            _goal_description: &str,
        ) -> Result<SuggestionBreakdown> {
            if let Some(error) = &self.breakdown_error {
                bail!("{error}");
            }
            Ok(template_breakdown())
        }

        fn apply_breakdown(
            &mut self,
            goal_id: GoalId,
            _breakdown: &SuggestionBreakdown,
            habit_picks: &BTreeSet<usize>,
            milestone_picks: &BTreeSet<usize>,
        ) -> Result<(usize, usize)> {
            self.applied
                .push((goal_id, habit_picks.len(), milestone_picks.len()));
            Ok((habit_picks.len(), milestone_picks.len()))
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(mut runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut view_data = ViewData::new(today());
            refresh_view_data(&mut runtime, &mut view_data).expect("refresh view data");
            Self {
                state: AppState::default(),
                runtime,
                view_data,
                tx,
                rx,
            }
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn ctrl(&mut self, c: char) -> bool {
            self.press_with(KeyCode::Char(c), KeyModifiers::CONTROL)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            )
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.press(KeyCode::Char(c));
            }
        }

        fn pump(&mut self) {
            process_internal_events(&mut self.state, &mut self.view_data, &self.tx, &self.rx);
        }
    }

    #[test]
    fn ctrl_q_quits() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        assert!(harness.ctrl('q'));
    }

    #[test]
    fn tab_keys_cycle_and_jump() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        assert_eq!(harness.state.active_tab, TabKind::Dashboard);

        harness.press(KeyCode::Tab);
        assert_eq!(harness.state.active_tab, TabKind::Goals);

        harness.press(KeyCode::BackTab);
        assert_eq!(harness.state.active_tab, TabKind::Dashboard);

        harness.press(KeyCode::Char('3'));
        assert_eq!(harness.state.active_tab, TabKind::Calendar);
    }

    #[test]
    fn auth_screen_signs_in_with_typed_credentials() {
        let mut harness = Harness::new(TestRuntime::signed_out());
        harness.type_text("user@example.com");
        harness.press(KeyCode::Tab);
        harness.type_text("secret");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.sign_ins, 1);
        assert!(harness.runtime.session().is_some());
        assert!(harness.view_data.session.is_some());
    }

    #[test]
    fn auth_validation_failure_stays_signed_out() {
        let mut harness = Harness::new(TestRuntime::signed_out());
        harness.type_text("not-an-email");
        harness.press(KeyCode::Tab);
        harness.type_text("secret");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.sign_ins, 0);
        assert!(harness.runtime.session().is_none());
        assert!(harness.state.status_line.is_some());
    }

    #[test]
    fn auth_mode_toggle_adds_full_name_field() {
        let mut harness = Harness::new(TestRuntime::signed_out());
        assert_eq!(harness.view_data.auth.field_count(), 2);

        harness.ctrl('u');
        assert_eq!(harness.view_data.auth.mode, AuthMode::SignUp);
        assert_eq!(harness.view_data.auth.field_count(), 3);

        harness.type_text("user@example.com");
        harness.press(KeyCode::Tab);
        harness.type_text("A User");
        harness.press(KeyCode::Tab);
        harness.type_text("longenough");
        harness.press(KeyCode::Enter);
        assert_eq!(harness.runtime.sign_ups, 1);
    }

    #[test]
    fn guest_shortcut_starts_guest_session() {
        let mut harness = Harness::new(TestRuntime::signed_out());
        harness.ctrl('g');

        assert_eq!(harness.runtime.guest_starts, 1);
        assert!(harness.runtime.session().is_some_and(Session::is_guest));
        let status = harness.state.status_line.as_deref().unwrap_or_default();
        assert!(status.contains("guest"), "status was {status:?}");
    }

    #[test]
    fn sign_out_returns_to_auth_screen() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.ctrl('x');

        assert_eq!(harness.runtime.sign_outs, 1);
        assert!(harness.runtime.session().is_none());
        assert!(harness.view_data.session.is_none());
        assert_eq!(harness.state.active_tab, TabKind::Dashboard);
    }

    #[test]
    fn goal_cursor_moves_and_clamps() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));

        harness.press(KeyCode::Char('j'));
        assert_eq!(harness.view_data.goal_cursor, 1);
        harness.press(KeyCode::Char('j'));
        assert_eq!(harness.view_data.goal_cursor, 1);

        harness.press(KeyCode::Char('k'));
        harness.press(KeyCode::Char('k'));
        assert_eq!(harness.view_data.goal_cursor, 0);
    }

    #[test]
    fn enter_opens_goal_detail_and_esc_closes() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));

        harness.press(KeyCode::Enter);
        let detail = harness.view_data.detail.as_ref().expect("detail open");
        assert_eq!(detail.goal.id, GoalId::new(1));
        assert_eq!(detail.milestones.len(), 2);
        assert_eq!(detail.habits.len(), 2);

        harness.press(KeyCode::Esc);
        assert!(harness.view_data.detail.is_none());
    }

    #[test]
    fn space_toggles_habit_for_today_in_detail() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);

        // Move past both milestones to the first habit.
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char(' '));

        assert_eq!(harness.runtime.toggles, vec![(HabitId::new(1), today())]);
        assert_eq!(harness.runtime.completions.len(), 1);

        // A second toggle restores the original state.
        harness.press(KeyCode::Char(' '));
        assert_eq!(harness.runtime.completions.len(), 0);
    }

    #[test]
    fn space_toggles_milestone_flag_in_detail() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char(' '));

        assert_eq!(
            harness.runtime.milestone_sets,
            vec![(MilestoneId::new(1), true)]
        );

        harness.press(KeyCode::Char(' '));
        assert_eq!(
            harness.runtime.milestone_sets[1],
            (MilestoneId::new(1), false)
        );
    }

    #[test]
    fn mutations_require_edit_mode() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));

        harness.press(KeyCode::Char('d'));
        assert!(harness.view_data.confirm.is_none());

        harness.press(KeyCode::Char('i'));
        assert_eq!(harness.state.mode, AppMode::Edit);
        harness.press(KeyCode::Char('d'));
        assert!(harness.view_data.confirm.is_some());
    }

    #[test]
    fn delete_goal_confirm_and_cancel() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));

        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Char('n'));
        assert!(harness.view_data.confirm.is_none());
        assert!(harness.runtime.deleted_goals.is_empty());

        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Char('y'));
        assert_eq!(harness.runtime.deleted_goals, vec![GoalId::new(1)]);
        assert_eq!(harness.view_data.goals.len(), 1);
    }

    #[test]
    fn add_goal_form_submits_payload() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('a'));
        assert!(matches!(harness.state.mode, AppMode::Form(_)));

        harness.type_text("Learn Spanish");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.submitted.len(), 1);
        match &harness.runtime.submitted[0] {
            FormPayload::Goal(input) => {
                assert_eq!(input.title, "Learn Spanish");
                assert_eq!(input.status, GoalStatus::Active);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.state.mode, AppMode::Nav);
    }

    #[test]
    fn empty_goal_title_keeps_form_open() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('a'));
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.submitted.is_empty());
        assert!(harness.view_data.form.is_some());
        let status = harness.state.status_line.as_deref().unwrap_or_default();
        assert!(status.contains("title"), "status was {status:?}");
    }

    #[test]
    fn malformed_form_date_is_reported() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('a'));

        harness.type_text("Learn Spanish");
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.type_text("02/19/2026");
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.submitted.is_empty());
        assert!(harness.view_data.form.is_some());
        let status = harness.state.status_line.as_deref().unwrap_or_default();
        assert!(status.contains("YYYY-MM-DD"), "status was {status:?}");
    }

    #[test]
    fn edit_goal_form_prefills_and_updates() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('e'));

        let form = harness.view_data.form.as_ref().expect("form open");
        assert_eq!(form.fields[0].value, "Run a Marathon");
        assert_eq!(form.fields[4].value, "active");

        harness.type_text(" in 2026");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.updated_goals.len(), 1);
        let (goal_id, input) = &harness.runtime.updated_goals[0];
        assert_eq!(*goal_id, GoalId::new(1));
        assert_eq!(input.title, "Run a Marathon in 2026");
    }

    #[test]
    fn habit_form_from_detail_carries_goal_id() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('h'));

        harness.type_text("Evening walk");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.submitted.len(), 1);
        match &harness.runtime.submitted[0] {
            FormPayload::Habit(input) => {
                assert_eq!(input.goal_id, GoalId::new(1));
                assert_eq!(input.title, "Evening walk");
                assert_eq!(input.frequency, HabitFrequency::Daily);
                assert_eq!(input.frequency_value, 1);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn milestone_form_from_detail_submits() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('m'));

        harness.type_text("Sign up for a race");
        harness.press(KeyCode::Enter);

        match &harness.runtime.submitted[0] {
            FormPayload::Milestone(input) => {
                assert_eq!(input.goal_id, GoalId::new(1));
                assert_eq!(input.title, "Sign up for a race");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn habit_reorder_keys_call_move() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('i'));

        // Cursor onto the first habit, then swap it downward.
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('J'));

        assert_eq!(harness.runtime.moves, vec![(HabitId::new(1), false)]);
    }

    #[test]
    fn status_key_cycles_goal_status() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('i'));
        harness.press(KeyCode::Char('s'));

        assert_eq!(
            harness.runtime.status_changes,
            vec![(GoalId::new(1), GoalStatus::Completed)]
        );

        harness.press(KeyCode::Char('s'));
        assert_eq!(
            harness.runtime.status_changes[1],
            (GoalId::new(1), GoalStatus::Paused)
        );
    }

    #[test]
    fn suggestions_overlay_fills_from_runtime_breakdown() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('@'));

        assert!(harness.view_data.suggestions.visible);
        assert!(harness.view_data.suggestions.in_flight.is_some());

        harness.pump();
        let suggestions = &harness.view_data.suggestions;
        assert!(suggestions.in_flight.is_none());
        let breakdown = suggestions.breakdown.as_ref().expect("breakdown loaded");
        assert_eq!(breakdown.habits.len(), 2);
        assert_eq!(breakdown.milestones.len(), 1);
        // Everything starts picked.
        assert_eq!(suggestions.habit_picks.len(), 2);
        assert_eq!(suggestions.milestone_picks.len(), 1);
    }

    #[test]
    fn stale_suggestion_events_are_ignored() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.view_data.suggestions.visible = true;
        harness.view_data.suggestions.goal_id = Some(GoalId::new(1));
        harness.view_data.suggestions.in_flight = Some(5);

        harness
            .tx
            .send(InternalEvent::Suggestion(SuggestionEvent::Completed {
                request_id: 4,
                breakdown: template_breakdown(),
            }))
            .expect("send stale event");
        harness.pump();
        assert!(harness.view_data.suggestions.breakdown.is_none());
        assert_eq!(harness.view_data.suggestions.in_flight, Some(5));

        harness
            .tx
            .send(InternalEvent::Suggestion(SuggestionEvent::Completed {
                request_id: 5,
                breakdown: template_breakdown(),
            }))
            .expect("send live event");
        harness.pump();
        assert!(harness.view_data.suggestions.breakdown.is_some());
        assert_eq!(harness.view_data.suggestions.in_flight, None);
    }

    #[test]
    fn suggestion_picks_toggle_and_apply() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('@'));
        harness.pump();

        // Unpick the first habit.
        harness.press(KeyCode::Char(' '));
        assert_eq!(harness.view_data.suggestions.habit_picks.len(), 1);

        harness.press(KeyCode::Enter);
        assert_eq!(harness.runtime.applied, vec![(GoalId::new(1), 1, 1)]);
        assert!(!harness.view_data.suggestions.visible);
        let status = harness.state.status_line.as_deref().unwrap_or_default();
        assert!(status.contains("added 1 habits"), "status was {status:?}");
    }

    #[test]
    fn suggestion_pick_all_none_toggles() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('@'));
        harness.pump();

        harness.press(KeyCode::Char('a'));
        assert!(harness.view_data.suggestions.habit_picks.is_empty());
        assert!(harness.view_data.suggestions.milestone_picks.is_empty());

        harness.press(KeyCode::Char('a'));
        assert_eq!(harness.view_data.suggestions.habit_picks.len(), 2);
        assert_eq!(harness.view_data.suggestions.milestone_picks.len(), 1);
    }

    #[test]
    fn suggestion_failure_closes_overlay_with_status() {
        let mut runtime = TestRuntime::signed_in();
        runtime.breakdown_error = Some("channel broke".to_owned());
        let mut harness = Harness::new(runtime);
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('@'));
        harness.pump();

        assert!(!harness.view_data.suggestions.visible);
        let status = harness.state.status_line.as_deref().unwrap_or_default();
        assert!(
            status.contains("suggestions unavailable"),
            "status was {status:?}"
        );
    }

    #[test]
    fn calendar_keys_move_cursor_and_month() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('3'));

        harness.press(KeyCode::Right);
        assert_eq!(
            harness.view_data.calendar.cursor,
            day(2026, Month::February, 20)
        );

        harness.press(KeyCode::Down);
        assert_eq!(
            harness.view_data.calendar.cursor,
            day(2026, Month::February, 27)
        );

        harness.press(KeyCode::Char(']'));
        assert_eq!(
            harness.view_data.calendar.cursor,
            day(2026, Month::March, 27)
        );

        // The day clamps when the target month is shorter.
        harness.view_data.calendar.cursor = day(2026, Month::March, 31);
        harness.press(KeyCode::Char('['));
        assert_eq!(
            harness.view_data.calendar.cursor,
            day(2026, Month::February, 28)
        );

        harness.press(KeyCode::Char('t'));
        assert_eq!(harness.view_data.calendar.cursor, today());
    }

    #[test]
    fn calendar_space_toggles_on_cursor_date() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('3'));
        harness.press(KeyCode::Left);
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char(' '));

        assert_eq!(
            harness.runtime.toggles,
            vec![(HabitId::new(2), day(2026, Month::February, 18))]
        );
    }

    #[test]
    fn settings_enter_toggles_bool_value() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('4'));
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.put_settings.len(), 1);
        assert_eq!(
            harness.runtime.put_settings[0].value,
            SettingValue::Bool(false)
        );
    }

    #[test]
    fn settings_week_start_flips_between_days() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('4'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);

        assert_eq!(
            harness.runtime.put_settings[0].value,
            SettingValue::Week(WeekStart::Monday)
        );
    }

    #[test]
    fn text_setting_opens_editor_and_saves() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('4'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);

        let editor = harness
            .view_data
            .setting_editor
            .as_ref()
            .expect("editor open");
        assert_eq!(editor.value, "llama3.2");

        for _ in 0.."llama3.2".len() {
            harness.press(KeyCode::Backspace);
        }
        harness.type_text("qwen3:8b");
        harness.press(KeyCode::Enter);

        assert!(harness.view_data.setting_editor.is_none());
        assert_eq!(
            harness.runtime.put_settings[0].value,
            SettingValue::Text("qwen3:8b".to_owned())
        );
    }

    #[test]
    fn stale_status_clear_token_is_ignored() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.state.status_line = Some("saved".to_owned());
        harness.view_data.status_token = 7;

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 6 })
            .expect("send stale clear");
        harness.pump();
        assert_eq!(harness.state.status_line.as_deref(), Some("saved"));

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: 7 })
            .expect("send live clear");
        harness.pump();
        assert!(harness.state.status_line.is_none());
    }

    #[test]
    fn help_overlay_opens_and_closes() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('?'));
        assert!(harness.view_data.help_visible);

        // Unrelated keys leave it open; esc closes.
        harness.press(KeyCode::Char('j'));
        assert!(harness.view_data.help_visible);
        harness.press(KeyCode::Esc);
        assert!(!harness.view_data.help_visible);
    }

    #[test]
    fn refresh_clamps_cursors_after_shrink() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.view_data.goal_cursor = 1;
        harness.runtime.goals.truncate(1);
        refresh_view_data(&mut harness.runtime, &mut harness.view_data).expect("refresh");
        assert_eq!(harness.view_data.goal_cursor, 0);
    }

    #[test]
    fn refresh_drops_detail_for_deleted_goal() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);
        assert!(harness.view_data.detail.is_some());

        harness.runtime.goals.retain(|goal| goal.id != GoalId::new(1));
        refresh_view_data(&mut harness.runtime, &mut harness.view_data).expect("refresh");
        assert!(harness.view_data.detail.is_none());
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 10), "[----------]   0%");
        assert_eq!(progress_bar(50, 10), "[#####-----]  50%");
        assert_eq!(progress_bar(100, 10), "[##########] 100%");
        // Values above 100 clamp instead of overflowing the bar.
        assert_eq!(progress_bar(150, 10), "[##########] 100%");
    }

    #[test]
    fn truncate_label_keeps_short_values() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("a very long goal title", 10), "a very lo…");
    }

    #[test]
    fn dashboard_text_shows_session_and_counts() {
        let harness = Harness::new(TestRuntime::signed_in());
        let text = render_dashboard_text(&harness.view_data);
        assert!(text.contains("user@example.com"));
        assert!(text.contains("active goals:    2"));
        assert!(!text.contains("suggestion quota"));
    }

    #[test]
    fn dashboard_text_shows_guest_quota() {
        let mut runtime = TestRuntime::signed_in();
        runtime.session = Some(Session::guest(profile()));
        let harness = Harness::new(runtime);
        let text = render_dashboard_text(&harness.view_data);
        assert!(text.contains("guest"));
        assert!(text.contains("suggestion quota: 0 of 1 used"));
    }

    #[test]
    fn detail_text_marks_completed_rows() {
        let mut runtime = TestRuntime::signed_in();
        runtime.milestones[0].completed = true;
        let mut harness = Harness::new(runtime);
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Enter);

        let detail = harness.view_data.detail.as_ref().expect("detail open");
        let text = render_detail_text(detail, &harness.view_data);
        assert!(text.contains("[x] Finish a 10k"));
        assert!(text.contains("[ ] Finish a half"));
        assert!(text.contains("Morning run"));
    }

    #[test]
    fn calendar_text_brackets_cursor_day() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('3'));
        let text = render_calendar_text(&harness.view_data);
        assert!(text.contains("February 2026"));
        assert!(text.contains("[19]"), "text was:\n{text}");
        assert!(text.contains("habits on 2026-02-19"));
    }

    #[test]
    fn suggestions_text_lists_breakdown_and_source() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.press(KeyCode::Char('2'));
        harness.press(KeyCode::Char('@'));
        harness.pump();

        let text = render_suggestions_text(&harness.view_data.suggestions);
        assert!(text.contains("Training Run"));
        assert!(text.contains("Finish a Half Marathon"));
        assert!(text.contains("source: built-in template"));
    }

    #[test]
    fn status_text_is_hidden_by_overlays() {
        let mut harness = Harness::new(TestRuntime::signed_in());
        harness.state.status_line = Some("saved".to_owned());
        assert!(status_text(&harness.state, &harness.view_data).contains("saved"));

        harness.view_data.help_visible = true;
        assert!(status_text(&harness.state, &harness.view_data).is_empty());
    }

    #[test]
    fn status_hint_omitted_when_help_bar_disabled() {
        let mut runtime = TestRuntime::signed_in();
        runtime.help_bar = false;
        let mut harness = Harness::new(runtime);
        harness.state.status_line = Some("saved".to_owned());

        let text = status_text(&harness.state, &harness.view_data);
        assert_eq!(text, "nav | saved");
    }

    #[test]
    fn help_text_covers_every_surface() {
        let text = help_overlay_text();
        for needle in ["quit", "form", "calendar", "suggestions", "auth"] {
            assert!(text.contains(needle), "help is missing {needle}");
        }
    }
}
