use std::cell::Cell;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use soru::workflow::Feedback;
use soru::{
    AnswerChoice, AuthError, ChatTicket, GeminiError, ImageHandle, LoginForm, SessionState,
    SignupForm, Solution, SolvePhase, SolveTicket, SolveWorkflow, Subject,
};

use crate::attach;
use crate::command::{self, Command};
use crate::fragments::{RenderCache, Tone};
use crate::session_log::SessionLogger;

const SCROLL_STEP: u16 = 10;
const TOAST_TTL: Duration = Duration::from_secs(4);
/// Columns of the subject grid.
pub const SUBJECT_COLUMNS: usize = 4;
/// A–E plus "don't know".
pub const ANSWER_SLOTS: usize = AnswerChoice::OPTIONS.len() + 1;

/// Side effects the event loop performs on the app's behalf.
#[derive(Debug)]
pub enum Action {
    Solve(SolveTicket),
    Chat(ChatTicket),
    SignIn(LoginForm),
    SignUp(SignupForm),
    LoadImage(PathBuf),
    Paste,
    Logout,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup,
}

/// Field placeholder and whether it is masked.
type FieldSpec = (&'static str, bool);

const LOGIN_FIELDS: &[FieldSpec] = &[("E-posta Adresi", false), ("Şifre", true)];
const SIGNUP_FIELDS: &[FieldSpec] = &[
    ("Ad Soyad", false),
    ("Sınıf (Örn: 11-A)", false),
    ("E-posta Adresi", false),
    ("Şifre", true),
    ("Şifre Tekrar", true),
];

/// Sign-in / sign-up page state.
#[derive(Debug)]
pub struct AuthView {
    pub mode: AuthMode,
    pub login: LoginForm,
    pub signup: SignupForm,
    pub field: usize,
    pub busy: bool,
    pub error: Option<String>,
    pub show_password_help: bool,
}

impl Default for AuthView {
    fn default() -> Self {
        Self {
            mode: AuthMode::Login,
            login: LoginForm::default(),
            signup: SignupForm::default(),
            field: 0,
            busy: false,
            error: None,
            show_password_help: false,
        }
    }
}

impl AuthView {
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self.mode {
            AuthMode::Login => LOGIN_FIELDS,
            AuthMode::Signup => SIGNUP_FIELDS,
        }
    }

    pub fn value(&self, index: usize) -> &str {
        match (self.mode, index) {
            (AuthMode::Login, 0) => &self.login.email,
            (AuthMode::Login, 1) => &self.login.password,
            (AuthMode::Signup, 0) => &self.signup.full_name,
            (AuthMode::Signup, 1) => &self.signup.grade,
            (AuthMode::Signup, 2) => &self.signup.email,
            (AuthMode::Signup, 3) => &self.signup.password,
            (AuthMode::Signup, 4) => &self.signup.confirm_password,
            _ => "",
        }
    }

    fn value_mut(&mut self, index: usize) -> Option<&mut String> {
        Some(match (self.mode, index) {
            (AuthMode::Login, 0) => &mut self.login.email,
            (AuthMode::Login, 1) => &mut self.login.password,
            (AuthMode::Signup, 0) => &mut self.signup.full_name,
            (AuthMode::Signup, 1) => &mut self.signup.grade,
            (AuthMode::Signup, 2) => &mut self.signup.email,
            (AuthMode::Signup, 3) => &mut self.signup.password,
            (AuthMode::Signup, 4) => &mut self.signup.confirm_password,
            _ => return None,
        })
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Signup,
            AuthMode::Signup => AuthMode::Login,
        };
        self.field = 0;
        self.error = None;
    }

    fn next_field(&mut self) {
        self.field = (self.field + 1) % self.fields().len();
    }

    fn prev_field(&mut self) {
        let n = self.fields().len();
        self.field = (self.field + n - 1) % n;
    }

    /// Forget typed passwords once a request has been sent.
    fn clear_secrets(&mut self) {
        self.login.password.clear();
        self.signup.password.clear();
        self.signup.confirm_password.clear();
    }
}

/// Which widget receives keys on the solver page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Input,
    Subject,
    Answer,
}

/// What Enter in the input box does, derived from the workflow phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    ImagePath,
    Chat,
    /// Chat send disabled until the teacher answers
    ChatPending,
    Correction,
    /// A solve is running
    Waiting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    expires: Option<Instant>,
}

pub struct App {
    pub session: SessionState,
    pub offline: bool,
    pub model: String,
    pub auth: AuthView,
    pub workflow: SolveWorkflow,
    pub focus: Focus,
    pub input: String,
    pub cursor_pos: usize,
    pub subject_cursor: usize,
    pub answer_cursor: usize,
    pub image_label: Option<String>,
    pub notice: Option<Notice>,
    pub show_help: bool,
    pub tick: usize,
    pub solve_started: Option<Instant>,
    pub last_solve_ms: Option<u64>,
    pub scroll: u16,
    pub follow_tail: bool,
    /// Largest valid scroll offset, written by the last draw.
    pub max_scroll: Cell<u16>,
    pub dirty: bool,
    pub cache: RenderCache,
    log: Option<SessionLogger>,
}

impl App {
    pub fn new(model: String, offline: bool, log: Option<SessionLogger>) -> Self {
        Self {
            session: SessionState::Loading,
            offline,
            model,
            auth: AuthView::default(),
            workflow: SolveWorkflow::new(),
            focus: Focus::Input,
            input: String::new(),
            cursor_pos: 0,
            subject_cursor: 0,
            answer_cursor: 0,
            image_label: None,
            notice: None,
            show_help: false,
            tick: 0,
            solve_started: None,
            last_solve_ms: None,
            scroll: 0,
            follow_tail: false,
            max_scroll: Cell::new(0),
            dirty: true,
            cache: RenderCache::default(),
            log,
        }
    }

    // ── Derived state ───────────────────────────────────────────────

    pub fn input_mode(&self) -> InputMode {
        match self.workflow.phase() {
            SolvePhase::Loading { .. } => InputMode::Waiting,
            SolvePhase::Solved {
                feedback: Feedback::Correcting,
                ..
            } => InputMode::Correction,
            SolvePhase::Solved { chat, .. } if chat.is_pending() => InputMode::ChatPending,
            SolvePhase::Solved { .. } => InputMode::Chat,
            _ => InputMode::ImagePath,
        }
    }

    /// Subject and answer pickers are shown.
    pub fn choices_open(&self) -> bool {
        matches!(
            self.workflow.phase(),
            SolvePhase::ImageSelected { .. } | SolvePhase::SubjectSelected { .. }
        )
    }

    pub fn answer_at(slot: usize) -> AnswerChoice {
        AnswerChoice::OPTIONS
            .get(slot)
            .copied()
            .unwrap_or(AnswerChoice::Unspecified)
    }

    /// Something on screen animates.
    pub fn is_busy(&self) -> bool {
        matches!(self.session, SessionState::Loading)
            || self.auth.busy
            || matches!(
                self.input_mode(),
                InputMode::Waiting | InputMode::ChatPending
            )
    }

    // ── Notices ─────────────────────────────────────────────────────

    fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind,
            expires: None,
        });
    }

    fn toast(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            kind: NoticeKind::Success,
            expires: Some(Instant::now() + TOAST_TTL),
        });
    }

    pub fn notify_error(&mut self, text: impl Into<String>) {
        self.notify(NoticeKind::Error, text);
        self.dirty = true;
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        if let Some(notice) = &self.notice
            && notice.expires.is_some_and(|t| Instant::now() >= t)
        {
            self.notice = None;
            self.dirty = true;
        }
        if self.is_busy() {
            self.dirty = true;
        }
    }

    // ── Session log ─────────────────────────────────────────────────

    fn log_solve_request(&mut self, ticket: &SolveTicket) {
        if let Some(log) = self.log.as_mut() {
            let req = &ticket.request;
            log.log_solve_request(
                req.subject,
                req.answer,
                req.correction.as_deref(),
                req.image.len(),
            );
        }
    }

    fn log_feedback(&mut self, kind: &str) {
        if let Some(log) = self.log.as_mut() {
            log.log_feedback(kind);
        }
    }

    fn log_last_chat_turn(&mut self) {
        if let (Some(log), Some(turn)) = (self.log.as_mut(), self.workflow.chat_turns().last()) {
            log.log_chat(turn);
        }
    }

    // ── Events from the loop ────────────────────────────────────────

    pub fn set_session(&mut self, state: SessionState) {
        if state == self.session {
            return;
        }
        if self.session.is_approved() && !state.is_approved() {
            self.clear_question();
        }
        if matches!(state, SessionState::LoggedOut) {
            self.auth.busy = false;
        }
        if let Some(log) = self.log.as_mut() {
            let tag = match &state {
                SessionState::Loading => "loading",
                SessionState::Approved(_) => "approved",
                SessionState::Unapproved(_) => "unapproved",
                SessionState::LoggedOut => "logged_out",
            };
            log.log_session(tag, state.identity().map(|i| i.uid.as_str()));
        }
        self.session = state;
        self.dirty = true;
    }

    pub fn account_finished(&mut self, result: Result<(), AuthError>) {
        self.auth.busy = false;
        match result {
            Ok(()) => {
                self.auth.error = None;
                self.auth.clear_secrets();
            }
            Err(e) => self.auth.error = Some(e.user_message()),
        }
        self.dirty = true;
    }

    pub fn image_loaded(&mut self, image: ImageHandle, label: String) {
        self.workflow.select_image(image);
        self.cache.clear();
        self.notify(
            NoticeKind::Info,
            format!("{label} yüklendi. Şimdi dersi seçin."),
        );
        self.image_label = Some(label);
        self.focus = Focus::Subject;
        self.subject_cursor = 0;
        self.answer_cursor = 0;
        self.last_solve_ms = None;
        self.scroll = 0;
        self.follow_tail = false;
        self.dirty = true;
    }

    pub fn solve_finished(
        &mut self,
        epoch: u64,
        result: Result<Solution, GeminiError>,
        elapsed_ms: u64,
    ) {
        if self.workflow.complete_solve(epoch, result) == soru::Completion::Stale {
            return;
        }
        self.solve_started = None;
        self.last_solve_ms = Some(elapsed_ms);
        if let Some(log) = self.log.as_mut() {
            let outcome = match (self.workflow.solution(), self.workflow.error_message()) {
                (Some(solution), _) => Ok(solution),
                (None, message) => Err(message.unwrap_or_default().to_string()),
            };
            log.log_solve_result(outcome, elapsed_ms);
        }
        self.focus = Focus::Input;
        self.scroll = 0;
        self.follow_tail = false;
        self.dirty = true;
    }

    pub fn chat_finished(&mut self, epoch: u64, result: Result<String, GeminiError>) {
        if self.workflow.complete_chat(epoch, result) == soru::Completion::Stale {
            return;
        }
        self.log_last_chat_turn();
        self.follow_tail = true;
        self.dirty = true;
    }

    /// Render every visible text into the cache before drawing.
    pub fn prepare_render(&mut self) {
        if let Some(solution) = self.workflow.solution() {
            self.cache.prepare(&solution.simplified_question, Tone::Body);
            self.cache.prepare(&solution.solution_steps, Tone::Body);
            self.cache.prepare(&solution.final_answer, Tone::FinalAnswer);
            self.cache.prepare(&solution.recommendations, Tone::Body);
        }
        for turn in self.workflow.chat_turns() {
            self.cache.prepare(&turn.content, Tone::Chat);
        }
        tracing::trace!(entries = self.cache.len(), "render cache");
    }

    // ── Key handling ────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }
        self.dirty = true;
        match self.session {
            SessionState::Loading => None,
            SessionState::LoggedOut => self.auth_key(key),
            SessionState::Unapproved(_) => match key.code {
                KeyCode::Enter => Some(Action::Logout),
                _ => None,
            },
            SessionState::Approved(_) => self.solver_key(key),
        }
    }

    fn auth_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.auth.busy {
            return None;
        }
        match key.code {
            KeyCode::F(1) => self.auth.show_password_help = !self.auth.show_password_help,
            KeyCode::F(2) => self.auth.toggle_mode(),
            KeyCode::Tab | KeyCode::Down => self.auth.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.auth.prev_field(),
            KeyCode::Esc => {
                self.auth.error = None;
                self.auth.show_password_help = false;
            }
            KeyCode::Backspace => {
                let field = self.auth.field;
                if let Some(value) = self.auth.value_mut(field) {
                    value.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                let field = self.auth.field;
                if let Some(value) = self.auth.value_mut(field) {
                    value.push(c);
                }
            }
            KeyCode::Enter => return self.submit_auth(),
            _ => {}
        }
        None
    }

    /// Validation failures are reported here without touching the network.
    fn submit_auth(&mut self) -> Option<Action> {
        let validated = match self.auth.mode {
            AuthMode::Login => self.auth.login.validate(),
            AuthMode::Signup => self.auth.signup.validate(),
        };
        if let Err(e) = validated {
            self.auth.error = Some(e.user_message());
            return None;
        }
        self.auth.error = None;
        self.auth.busy = true;
        Some(match self.auth.mode {
            AuthMode::Login => Action::SignIn(self.auth.login.clone()),
            AuthMode::Signup => Action::SignUp(self.auth.signup.clone()),
        })
    }

    fn solver_key(&mut self, key: KeyEvent) -> Option<Action> {
        if self.show_help {
            self.show_help = false;
            if key.code == KeyCode::Esc {
                return None;
            }
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::PageUp => {
                self.scroll_up(SCROLL_STEP);
                return None;
            }
            KeyCode::PageDown => {
                self.scroll_down(SCROLL_STEP);
                return None;
            }
            KeyCode::Char('v') if ctrl => return self.run_command(Command::Paste),
            KeyCode::F(2) => return self.run_command(Command::Like),
            KeyCode::F(3) => return self.run_command(Command::Fix),
            _ => {}
        }
        if self.focus != Focus::Input && !self.choices_open() {
            self.focus = Focus::Input;
        }
        match self.focus {
            Focus::Subject => self.subject_key(key),
            Focus::Answer => self.answer_key(key),
            Focus::Input => self.input_key(key),
        }
    }

    fn subject_key(&mut self, key: KeyEvent) -> Option<Action> {
        let n = Subject::ALL.len();
        match key.code {
            KeyCode::Left => self.subject_cursor = (self.subject_cursor + n - 1) % n,
            KeyCode::Right => self.subject_cursor = (self.subject_cursor + 1) % n,
            KeyCode::Up | KeyCode::Down => {
                self.subject_cursor = (self.subject_cursor + SUBJECT_COLUMNS) % n;
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let subject = Subject::ALL[self.subject_cursor];
                match self.workflow.select_subject(subject) {
                    Ok(()) => self.focus = Focus::Answer,
                    Err(e) => self.notify(NoticeKind::Error, e.to_string()),
                }
            }
            KeyCode::Tab if self.workflow.subject().is_some() => self.focus = Focus::Answer,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Esc => self.focus = Focus::Input,
            _ => {}
        }
        None
    }

    fn answer_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Left => self.answer_cursor = (self.answer_cursor + ANSWER_SLOTS - 1) % ANSWER_SLOTS,
            KeyCode::Right => self.answer_cursor = (self.answer_cursor + 1) % ANSWER_SLOTS,
            KeyCode::Char(c) if c.is_ascii_alphabetic() => {
                let Ok(choice) = c.to_string().parse::<AnswerChoice>() else {
                    return None;
                };
                return self.start_solve(choice);
            }
            KeyCode::Char('?') => return self.start_solve(AnswerChoice::Unspecified),
            KeyCode::Enter | KeyCode::Char(' ') => {
                return self.start_solve(Self::answer_at(self.answer_cursor));
            }
            KeyCode::Esc | KeyCode::BackTab => self.focus = Focus::Subject,
            KeyCode::Tab => self.focus = Focus::Input,
            _ => {}
        }
        None
    }

    fn input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Enter => return self.submit_input(),
            KeyCode::Esc => {
                if self.input_mode() == InputMode::Correction {
                    let _ = self.workflow.cancel_correction();
                }
                self.clear_input();
            }
            KeyCode::Tab if self.choices_open() => {
                self.focus = if self.workflow.subject().is_some() {
                    Focus::Answer
                } else {
                    Focus::Subject
                };
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input.len(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
            }
            _ => {}
        }
        None
    }

    fn submit_input(&mut self) -> Option<Action> {
        let text = self.input.trim().to_string();
        if let Some(cmd) = command::parse(&text) {
            self.clear_input();
            return self.run_command(cmd);
        }
        match self.input_mode() {
            InputMode::Waiting | InputMode::ChatPending => None,
            InputMode::ImagePath if text.is_empty() => {
                if matches!(self.workflow.phase(), SolvePhase::Failed { .. }) {
                    return self.run_command(Command::Retry);
                }
                None
            }
            InputMode::ImagePath => {
                self.clear_input();
                Some(Action::LoadImage(attach::expand_path(&text)))
            }
            InputMode::Chat | InputMode::Correction if text.is_empty() => None,
            InputMode::Chat => match self.workflow.begin_chat(&text) {
                Ok(ticket) => {
                    self.clear_input();
                    self.notice = None;
                    self.log_last_chat_turn();
                    self.follow_tail = true;
                    Some(Action::Chat(ticket))
                }
                Err(e) => {
                    self.notify(NoticeKind::Error, e.to_string());
                    None
                }
            },
            InputMode::Correction => match self.workflow.submit_correction(&text) {
                Ok(ticket) => {
                    self.clear_input();
                    self.log_feedback("correction");
                    Some(self.solve_issued(ticket))
                }
                Err(e) => {
                    self.notify(NoticeKind::Error, e.to_string());
                    None
                }
            },
        }
    }

    fn start_solve(&mut self, answer: AnswerChoice) -> Option<Action> {
        match self.workflow.begin_solve(answer) {
            Ok(ticket) => Some(self.solve_issued(ticket)),
            Err(e) => {
                self.notify(NoticeKind::Error, e.to_string());
                None
            }
        }
    }

    fn solve_issued(&mut self, ticket: SolveTicket) -> Action {
        self.log_solve_request(&ticket);
        self.solve_started = Some(Instant::now());
        self.notice = None;
        self.focus = Focus::Input;
        Action::Solve(ticket)
    }

    pub fn run_command(&mut self, cmd: Command) -> Option<Action> {
        self.dirty = true;
        match cmd {
            Command::New => {
                self.clear_question();
                None
            }
            Command::Image(path) => Some(Action::LoadImage(attach::expand_path(&path))),
            Command::Paste => {
                if self.input_mode() == InputMode::Waiting {
                    return None;
                }
                Some(Action::Paste)
            }
            Command::Like => {
                match self.workflow.like() {
                    Ok(()) => {
                        self.log_feedback("like");
                        if let Some(text) = self.workflow.take_acknowledgement() {
                            self.toast(text);
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "like ignored"),
                }
                None
            }
            Command::Fix => {
                match self.workflow.request_correction() {
                    Ok(()) => {
                        self.clear_input();
                        self.focus = Focus::Input;
                        self.follow_tail = true;
                    }
                    Err(e) => tracing::debug!(error = %e, "correction ignored"),
                }
                None
            }
            Command::Retry => match self.workflow.retry() {
                Ok(ticket) => Some(self.solve_issued(ticket)),
                Err(e) => {
                    tracing::debug!(error = %e, "retry ignored");
                    None
                }
            },
            Command::Logout => Some(Action::Logout),
            Command::Help => {
                self.show_help = true;
                None
            }
            Command::Exit => Some(Action::Quit),
        }
    }

    /// Back to an empty solver page. Outstanding replies become stale.
    fn clear_question(&mut self) {
        self.workflow.reset();
        self.cache.clear();
        self.image_label = None;
        self.focus = Focus::Input;
        self.subject_cursor = 0;
        self.answer_cursor = 0;
        self.notice = None;
        self.solve_started = None;
        self.last_solve_ms = None;
        self.scroll = 0;
        self.follow_tail = false;
        self.clear_input();
    }

    // ── Scrolling ───────────────────────────────────────────────────

    fn current_scroll(&self) -> u16 {
        let max = self.max_scroll.get();
        if self.follow_tail {
            max
        } else {
            self.scroll.min(max)
        }
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.current_scroll().saturating_sub(amount);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let next = self.current_scroll().saturating_add(amount);
        self.follow_tail = next >= self.max_scroll.get();
        self.scroll = next;
    }

    // ── Input editing ───────────────────────────────────────────────

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    /// Delete character before cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let prev = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.input.drain(prev..self.cursor_pos);
            self.cursor_pos = prev;
        }
    }

    /// Delete character at cursor.
    pub fn delete(&mut self) {
        if self.cursor_pos < self.input.len() {
            let next = self.input[self.cursor_pos..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor_pos + i)
                .unwrap_or(self.input.len());
            self.input.drain(self.cursor_pos..next);
        }
    }

    pub fn move_cursor_left(&mut self) {
        if let Some((i, _)) = self.input[..self.cursor_pos].char_indices().next_back() {
            self.cursor_pos = i;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if let Some(c) = self.input[self.cursor_pos..].chars().next() {
            self.cursor_pos += c.len_utf8();
        }
    }
}
