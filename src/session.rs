use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::language::PracticeLanguage;
use crate::snippets::normalize_line_endings;
use crate::stats::{calculate_accuracy, calculate_wpm, elapsed_secs};

/// Outcome of one finished or stopped attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeResult {
    pub language: PracticeLanguage,
    pub wpm: u32,
    pub accuracy: u32,
    pub errors: u32,
    pub time: u64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

/// Everything that can happen to a session. Timed events carry the
/// wall-clock instant they occurred at; the session never reads a clock.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Load {
        language: PracticeLanguage,
        snippet: String,
    },
    Start {
        at: SystemTime,
    },
    TogglePause {
        at: SystemTime,
    },
    Stop {
        at: SystemTime,
    },
    Restart {
        at: SystemTime,
    },
    Input {
        ch: char,
        at: SystemTime,
    },
    Tick {
        at: SystemTime,
    },
}

/// Side effects requested by a transition, performed by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    EmitResult(PracticeResult),
}

/// State of one practice attempt over a single snippet
#[derive(Debug, Clone)]
pub struct Session {
    language: PracticeLanguage,
    snippet: Vec<char>,
    current_index: usize,
    error_positions: BTreeSet<usize>,
    phase: Phase,
    started_at: Option<SystemTime>,
    paused_at: Option<SystemTime>,
    accumulated_pause: Duration,
    time_elapsed: u64,
    wpm: u32,
    accuracy: u32,
    last_result: Option<PracticeResult>,
}

/// Pure form of [`Session::apply`]: consumes a state and returns the next
/// state with the effects the transition produced.
pub fn transition(mut state: Session, event: SessionEvent) -> (Session, Vec<Effect>) {
    let effects = state.apply(event);
    (state, effects)
}

impl Session {
    pub fn new(language: PracticeLanguage, snippet: &str) -> Self {
        Self {
            language,
            snippet: normalize_line_endings(snippet).chars().collect(),
            current_index: 0,
            error_positions: BTreeSet::new(),
            phase: Phase::Idle,
            started_at: None,
            paused_at: None,
            accumulated_pause: Duration::ZERO,
            time_elapsed: 0,
            wpm: 0,
            accuracy: 100,
            last_result: None,
        }
    }

    pub fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        let result = match event {
            SessionEvent::Load { language, snippet } => {
                self.load(language, &snippet);
                None
            }
            SessionEvent::Start { at } => {
                self.start(at);
                None
            }
            SessionEvent::TogglePause { at } => {
                self.toggle_pause(at);
                None
            }
            SessionEvent::Stop { at } => self.stop(at),
            SessionEvent::Restart { at } => {
                self.restart(at);
                None
            }
            SessionEvent::Input { ch, at } => self.handle_input(ch, at),
            SessionEvent::Tick { at } => {
                self.on_tick(at);
                None
            }
        };

        result.map(Effect::EmitResult).into_iter().collect()
    }

    /// Replace the snippet and go back to `Idle`
    pub fn load(&mut self, language: PracticeLanguage, snippet: &str) {
        *self = Session::new(language, snippet);
        debug!(%language, len = self.snippet.len(), "snippet loaded");
    }

    /// `Idle -> Running`. Returns false in any other phase.
    pub fn start(&mut self, at: SystemTime) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Running;
        self.started_at = Some(at);
        self.last_result = None;
        info!(language = %self.language, len = self.snippet.len(), "session started");
        true
    }

    /// Flip between `Running` and `Paused`, returning whether the session is
    /// now paused. Does nothing (and returns false) when idle or finished.
    pub fn toggle_pause(&mut self, at: SystemTime) -> bool {
        match self.phase {
            Phase::Running => {
                self.time_elapsed = self.running_secs(at);
                self.paused_at = Some(at);
                self.phase = Phase::Paused;
                debug!(elapsed = self.time_elapsed, "session paused");
                true
            }
            Phase::Paused => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.accumulated_pause += at.duration_since(paused_at).unwrap_or_default();
                }
                self.phase = Phase::Running;
                debug!(paused_ms = self.accumulated_pause.as_millis() as u64, "session resumed");
                false
            }
            Phase::Idle | Phase::Finished => false,
        }
    }

    /// Finish early with the progress made so far
    pub fn stop(&mut self, at: SystemTime) -> Option<PracticeResult> {
        match self.phase {
            Phase::Running | Phase::Paused => {
                let accuracy = calculate_accuracy(self.current_index, self.error_positions.len());
                Some(self.finish(at, accuracy))
            }
            Phase::Idle | Phase::Finished => None,
        }
    }

    /// Reset progress on the same snippet and start again immediately
    pub fn restart(&mut self, at: SystemTime) {
        let snippet: String = self.snippet.iter().collect();
        self.load(self.language, &snippet);
        self.start(at);
    }

    /// Feed one normalized keystroke. Only a correct character advances the
    /// cursor; a wrong one marks the position and must be retyped.
    pub fn handle_input(&mut self, ch: char, at: SystemTime) -> Option<PracticeResult> {
        if self.phase != Phase::Running {
            return None;
        }
        let expected = *self.snippet.get(self.current_index)?;

        if ch == expected {
            self.current_index += 1;
            if self.current_index == self.snippet.len() {
                let accuracy =
                    calculate_accuracy(self.snippet.len(), self.error_positions.len());
                return Some(self.finish(at, accuracy));
            }
        } else {
            self.error_positions.insert(self.current_index);
            // max(.., 1) keeps a first-keystroke miss from dividing by zero
            self.accuracy =
                calculate_accuracy(self.current_index.max(1), self.error_positions.len());
            debug!(index = self.current_index, %expected, got = %ch.escape_debug(), "mistyped");
        }
        None
    }

    /// Periodic clock update while running
    pub fn on_tick(&mut self, at: SystemTime) {
        if self.phase != Phase::Running {
            return;
        }
        self.time_elapsed = self.running_secs(at);
        self.wpm = calculate_wpm(self.current_index, self.time_elapsed);
    }

    fn finish(&mut self, at: SystemTime, accuracy: u32) -> PracticeResult {
        self.time_elapsed = self.running_secs(at);
        self.wpm = calculate_wpm(self.current_index, self.time_elapsed);
        self.accuracy = accuracy;
        self.paused_at = None;
        self.phase = Phase::Finished;

        let result = PracticeResult {
            language: self.language,
            wpm: self.wpm,
            accuracy,
            errors: self.error_positions.len() as u32,
            time: self.time_elapsed,
            date: DateTime::<Utc>::from(at),
        };
        info!(
            language = %result.language,
            wpm = result.wpm,
            accuracy = result.accuracy,
            errors = result.errors,
            time = result.time,
            "session finished"
        );
        self.last_result = Some(result.clone());
        result
    }

    /// Seconds on the clock at `at`; frozen at the pause instant while paused
    fn running_secs(&self, at: SystemTime) -> u64 {
        match self.started_at {
            Some(started_at) => {
                let end = self.paused_at.unwrap_or(at);
                elapsed_secs(started_at, end, self.accumulated_pause)
            }
            None => 0,
        }
    }

    pub fn language(&self) -> PracticeLanguage {
        self.language
    }

    pub fn snippet(&self) -> &[char] {
        &self.snippet
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn expected_char(&self) -> Option<char> {
        self.snippet.get(self.current_index).copied()
    }

    pub fn error_positions(&self) -> &BTreeSet<usize> {
        &self.error_positions
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_started(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn accumulated_pause(&self) -> Duration {
        self.accumulated_pause
    }

    pub fn time_elapsed(&self) -> u64 {
        self.time_elapsed
    }

    pub fn wpm(&self) -> u32 {
        self.wpm
    }

    pub fn accuracy(&self) -> u32 {
        self.accuracy
    }

    pub fn last_result(&self) -> Option<&PracticeResult> {
        self.last_result.as_ref()
    }

    pub fn clear_last_result(&mut self) {
        self.last_result = None;
    }
}
