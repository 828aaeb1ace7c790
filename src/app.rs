use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::auth::{AuthProvider, User};
use crate::config::{Config, ConfigStore};
use crate::engine::Engine;
use crate::error::Error;
use crate::history::{Aggregates, HistoryPage};
use crate::session::{Mode, Status, TestConfiguration, TextSource};
use crate::store::ResultStore;

pub type AppEngine = Engine<Box<dyn AuthProvider>, Option<ResultStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Setup,
    Typing,
    Results,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// History screen contents.
#[derive(Debug, Clone)]
pub struct HistoryView {
    pub page: HistoryPage,
    pub aggregates: Aggregates,
}

/// Front-end state around the engine.
pub struct App {
    pub engine: AppEngine,
    /// Selections for the next test, editable while idle.
    pub setup: TestConfiguration,
    pub screen: Screen,
    pub history: Option<HistoryView>,
    /// One-line message for the user (validation errors and the like).
    pub notice: Option<String>,
    /// Setup keys go into the custom text instead of the menu.
    pub editing_text: bool,
    config: Config,
    config_store: Option<Box<dyn ConfigStore>>,
    return_to: Screen,
}

impl App {
    pub fn new(engine: AppEngine, config: Config) -> Self {
        Self {
            engine,
            setup: config.test_configuration(),
            screen: Screen::Setup,
            history: None,
            notice: None,
            editing_text: false,
            config,
            config_store: None,
            return_to: Screen::Setup,
        }
    }

    /// Persist remembered settings through `store` whenever a test starts.
    pub fn with_config_store(mut self, store: Box<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn current_user(&self) -> Option<User> {
        self.engine.auth().current_user()
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        if is_ctrl(&key) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        match self.screen {
            Screen::Setup => self.on_setup_key(key, now),
            Screen::Typing => {
                self.on_typing_key(key, now);
                Action::Continue
            }
            Screen::Results => self.on_results_key(key, now),
            Screen::History => {
                self.on_history_key(key);
                Action::Continue
            }
        }
    }

    /// How long the event loop may sleep before a timer falls due.
    pub fn until_next_timer(&self, now: Instant) -> Option<Duration> {
        self.engine.timers().until_next(now)
    }

    /// Runner tick: deliver due timers.
    pub fn on_tick(&mut self, now: Instant) {
        if self.engine.poll_timers(now).is_some() {
            self.screen = Screen::Results;
        }
    }

    pub fn start_test(&mut self, now: Instant) {
        match self.engine.start(&self.setup, now) {
            Ok(_) => {
                self.notice = None;
                self.screen = Screen::Typing;
                self.remember_setup();
            }
            Err(Error::EmptyText) => {
                self.notice = Some("Please enter or generate text first!".to_string());
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn remember_setup(&mut self) {
        self.config.remember(&self.setup);
        if let Some(store) = &self.config_store {
            if let Err(e) = store.save(&self.config) {
                warn!(error = %e, "failed to save config");
            }
        }
    }

    fn on_setup_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        if self.editing_text {
            self.on_text_edit_key(key, now);
            return Action::Continue;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Action::Quit,
            KeyCode::Enter => self.start_test(now),
            KeyCode::Tab => {
                let mode = match self.setup.mode {
                    Mode::Time => Mode::Chars,
                    Mode::Chars => Mode::Time,
                };
                self.setup.mode = mode;
                self.setup.target_value = mode.default_target();
            }
            KeyCode::Left => self.cycle_target(false),
            KeyCode::Right => self.cycle_target(true),
            KeyCode::Char('s') => {
                self.setup.text_source = match self.setup.text_source {
                    TextSource::Random => TextSource::Custom,
                    TextSource::Custom => TextSource::Random,
                };
                self.editing_text = self.setup.text_source == TextSource::Custom;
            }
            KeyCode::Char('e') if self.setup.text_source == TextSource::Custom => {
                self.editing_text = true;
            }
            KeyCode::Char('h') => self.open_history(),
            _ => {}
        }
        Action::Continue
    }

    fn on_text_edit_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Esc => self.editing_text = false,
            KeyCode::Enter => {
                self.editing_text = false;
                self.start_test(now);
            }
            KeyCode::Backspace => {
                self.setup.text.pop();
            }
            KeyCode::Char('u') if is_ctrl(&key) => self.setup.text.clear(),
            _ => {
                if let Some(c) = typed_char(&key) {
                    self.setup.text.push(c);
                    self.notice = None;
                }
            }
        }
    }

    fn cycle_target(&mut self, forward: bool) {
        let presets = self.setup.mode.presets();
        let current = presets.iter().position(|&p| p == self.setup.target_value);
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % presets.len(),
            (Some(i), false) => (i + presets.len() - 1) % presets.len(),
            (None, _) => 0,
        };
        self.setup.target_value = presets[next];
    }

    fn on_typing_key(&mut self, key: KeyEvent, now: Instant) {
        let typed = self.engine.state().typed_text();
        let ctrl = is_ctrl(&key);

        let edited = match key.code {
            KeyCode::Esc => {
                self.engine.reset();
                self.screen = Screen::Setup;
                return;
            }
            KeyCode::Char('w') | KeyCode::Backspace if ctrl => delete_last_word(typed),
            KeyCode::Char('u') if ctrl => String::new(),
            KeyCode::Backspace => {
                let mut text = typed.to_string();
                text.pop();
                text
            }
            _ => match typed_char(&key) {
                Some(c) => {
                    let mut text = typed.to_string();
                    text.push(c);
                    text
                }
                None => return,
            },
        };

        if edited == typed {
            return;
        }
        match self.engine.edit(edited, now) {
            Ok(_) if self.engine.state().status() == Status::Finished => {
                self.screen = Screen::Results;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "edit rejected"),
        }
    }

    fn on_results_key(&mut self, key: KeyEvent, now: Instant) -> Action {
        match key.code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Enter | KeyCode::Char('n') => {
                self.engine.reset();
                self.start_test(now);
            }
            KeyCode::Esc => {
                self.engine.reset();
                self.screen = Screen::Setup;
            }
            KeyCode::Char('h') => self.open_history(),
            _ => {}
        }
        Action::Continue
    }

    fn on_history_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => {
                self.screen = self.return_to;
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if let Some(view) = &self.history {
                    if view.page.has_next() {
                        let page = view.page.page + 1;
                        self.load_history(page);
                    }
                }
            }
            KeyCode::Left | KeyCode::Char('j') => {
                if let Some(view) = &self.history {
                    if view.page.has_previous() {
                        let page = view.page.page - 1;
                        self.load_history(page);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn open_history(&mut self) {
        if self.current_user().is_none() {
            self.notice = Some("Sign in with --user to keep a history".to_string());
            return;
        }
        if self.load_history(1) {
            self.return_to = self.screen;
            self.screen = Screen::History;
        }
    }

    fn load_history(&mut self, page: u32) -> bool {
        let (Some(user), Some(store)) = (self.current_user(), self.engine.sink().as_ref()) else {
            self.notice = Some("History is unavailable".to_string());
            return false;
        };

        match store
            .history_page(&user, page)
            .and_then(|page| Ok((page, store.aggregates(&user)?)))
        {
            Ok((page, aggregates)) => {
                self.history = Some(HistoryView { page, aggregates });
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to load history");
                self.notice = Some(format!("Could not load history: {e}"));
                false
            }
        }
    }
}

/// Ctrl held on its own. AltGr arrives as Ctrl+Alt on Windows and types text.
fn is_ctrl(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && !key.modifiers.contains(KeyModifiers::ALT)
}

/// The character a key press types, if any.
pub fn typed_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(c) if !is_ctrl(key) => Some(c),
        _ => None,
    }
}

/// Drop the last word and any whitespace after it.
pub fn delete_last_word(text: &str) -> String {
    let trimmed = text.trim_end();
    match trimmed.rfind(char::is_whitespace) {
        Some(idx) => {
            let ws_len = trimmed[idx..].chars().next().map_or(1, char::len_utf8);
            trimmed[..idx + ws_len].to_string()
        }
        None => String::new(),
    }
}
