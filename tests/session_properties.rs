use std::time::{Duration, SystemTime};

use codetype::language::PracticeLanguage;
use codetype::session::{transition, Effect, Phase, Session, SessionEvent};

fn t0() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn secs(n: u64) -> SystemTime {
    t0() + Duration::from_secs(n)
}

fn started(snippet: &str) -> Session {
    let mut session = Session::new(PracticeLanguage::Javascript, snippet);
    assert!(session.start(t0()));
    session
}

#[test]
fn flawless_run_scores_full_accuracy() {
    let mut session = started("const x = 1;");
    let mut result = None;
    for ch in "const x = 1;".chars() {
        result = session.handle_input(ch, secs(6));
    }

    let result = result.expect("last keystroke finishes");
    assert_eq!(result.accuracy, 100);
    assert_eq!(result.errors, 0);
    // 12 chars in 6s: 2.4 words in 0.1 minutes
    assert_eq!(result.wpm, 24);
}

#[test]
fn single_miss_costs_one_position() {
    let text = "let a = b;";
    let mut session = started(text);
    session.handle_input('x', secs(1));
    let mut result = None;
    for ch in text.chars() {
        result = session.handle_input(ch, secs(10));
    }

    let n = text.len() as f64;
    let expected = ((n - 1.0) / n * 100.0).round() as u32;
    assert_eq!(result.unwrap().accuracy, expected);
}

#[test]
fn repeated_misses_at_one_position_count_once() {
    let mut session = started("ab");
    for _ in 0..5 {
        session.handle_input('z', secs(1));
    }
    session.handle_input('a', secs(1));
    let result = session.handle_input('b', secs(2)).unwrap();
    assert_eq!(result.errors, 1);
    assert_eq!(result.accuracy, 50);
}

#[test]
fn paused_time_is_not_counted() {
    let mut session = started("abc");
    session.handle_input('a', secs(5));
    assert!(session.toggle_pause(secs(5)));
    // input while paused is ignored
    assert!(session.handle_input('b', secs(8)).is_none());
    assert_eq!(session.current_index(), 1);
    assert!(!session.toggle_pause(secs(15)));

    session.handle_input('b', secs(18));
    let result = session.handle_input('c', secs(20)).unwrap();
    assert_eq!(result.time, 10);
    assert_eq!(session.accumulated_pause(), Duration::from_secs(10));
}

#[test]
fn stop_scores_only_typed_positions() {
    let text = "x".repeat(50);
    let mut session = started(&text);
    for i in 0..10 {
        if i == 2 || i == 7 {
            session.handle_input('y', secs(1));
        }
        session.handle_input('x', secs(1));
    }

    let result = session.stop(secs(30)).expect("stop emits a result");
    assert_eq!(result.accuracy, 80);
    assert_eq!(result.errors, 2);
    assert_eq!(result.time, 30);
    assert_eq!(session.phase(), Phase::Finished);
    assert!(session.stop(secs(40)).is_none());
}

#[test]
fn restart_resets_progress_on_the_same_snippet() {
    let mut session = started("hello");
    session.handle_input('h', secs(1));
    session.handle_input('q', secs(1));

    session.restart(secs(30));
    assert_eq!(session.phase(), Phase::Running);
    assert_eq!(session.current_index(), 0);
    assert!(session.error_positions().is_empty());
    assert_eq!(session.snippet().iter().collect::<String>(), "hello");

    session.on_tick(secs(33));
    assert_eq!(session.time_elapsed(), 3);
}

#[test]
fn pure_transition_emits_result_once() {
    let state = Session::new(PracticeLanguage::Go, "ok");
    let (state, effects) = transition(state, SessionEvent::Start { at: t0() });
    assert!(effects.is_empty());
    let (state, effects) = transition(state, SessionEvent::Input { ch: 'o', at: secs(1) });
    assert!(effects.is_empty());
    let (state, effects) = transition(state, SessionEvent::Input { ch: 'k', at: secs(2) });
    assert_eq!(effects.len(), 1);
    let Effect::EmitResult(result) = &effects[0];
    assert_eq!(result.language, PracticeLanguage::Go);

    let (_, effects) = transition(state, SessionEvent::Input { ch: 'k', at: secs(3) });
    assert!(effects.is_empty());
}

#[test]
fn crlf_snippets_take_one_enter_per_line() {
    let mut session = started("a\r\nb");
    assert_eq!(session.snippet().len(), 3);
    session.handle_input('a', secs(1));
    assert_eq!(session.expected_char(), Some('\n'));
    session.handle_input('\n', secs(1));
    assert!(session.handle_input('b', secs(2)).is_some());
}
