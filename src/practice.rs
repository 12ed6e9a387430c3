use tracing::{info, warn};

use crate::history::HistoryStore;
use crate::language::PracticeLanguage;
use crate::runtime::Clock;
use crate::session::{Effect, PracticeResult, Session, SessionEvent};
use crate::snippets::SnippetSource;

/// Drives a [`Session`] against its collaborators: draws snippets,
/// timestamps events and hands finished results to history.
pub struct Practice {
    session: Session,
    snippets: Box<dyn SnippetSource>,
    history: Box<dyn HistoryStore>,
    clock: Box<dyn Clock>,
    notification: Option<String>,
}

impl Practice {
    pub fn new(
        language: PracticeLanguage,
        snippets: Box<dyn SnippetSource>,
        history: Box<dyn HistoryStore>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let snippet = snippets.initial(language);
        Self {
            session: Session::new(language, &snippet),
            snippets,
            history,
            clock,
            notification: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn language(&self) -> PracticeLanguage {
        self.session.language()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    pub fn start(&mut self) -> bool {
        let at = self.clock.now();
        self.session.start(at)
    }

    pub fn toggle_pause(&mut self) -> bool {
        let at = self.clock.now();
        self.session.toggle_pause(at)
    }

    pub fn stop(&mut self) -> bool {
        let at = self.clock.now();
        let effects = self.session.apply(SessionEvent::Stop { at });
        let stopped = !effects.is_empty();
        self.perform(effects);
        stopped
    }

    pub fn restart(&mut self) {
        let at = self.clock.now();
        self.session.restart(at);
    }

    /// Fresh random snippet in the current language
    pub fn new_test(&mut self) {
        self.load_snippet(self.language());
    }

    pub fn change_language(&mut self, language: PracticeLanguage) {
        info!(%language, "language changed");
        self.load_snippet(language);
    }

    pub fn handle_input(&mut self, ch: char) {
        let at = self.clock.now();
        let effects = self.session.apply(SessionEvent::Input { ch, at });
        self.perform(effects);
    }

    pub fn on_tick(&mut self) {
        let at = self.clock.now();
        self.session.on_tick(at);
    }

    pub fn last_result(&self) -> Option<&PracticeResult> {
        self.session.last_result()
    }

    pub fn clear_last_result(&mut self) {
        self.session.clear_last_result();
    }

    /// Pending user-facing message, e.g. a result that failed to save
    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }

    pub fn clear_notification(&mut self) {
        self.notification = None;
    }

    fn load_snippet(&mut self, language: PracticeLanguage) {
        let snippet = self.snippets.random(language);
        self.session.apply(SessionEvent::Load { language, snippet });
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::EmitResult(result) => {
                    // the attempt stays finished whether or not it persists
                    if let Err(e) = self.history.append(&result) {
                        warn!(error = %e, "failed to save practice result");
                        self.notification = Some(format!("Could not save result: {e}"));
                    }
                }
            }
        }
    }
}
