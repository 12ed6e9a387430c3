use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyModifiers};

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source reading crossterm events on a helper thread
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal event stream closed");
                    break;
                }
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed event source for headless runs
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    /// A source that replays `typed` as key presses and then closes.
    /// `'\n'` arrives as Enter and `'\t'` as Tab, like a terminal sends them.
    pub fn typing(typed: &str) -> Self {
        let (tx, rx) = mpsc::channel();
        for ch in typed.chars() {
            let code = match ch {
                '\n' => KeyCode::Enter,
                '\t' => KeyCode::Tab,
                c => KeyCode::Char(c),
            };
            // rx is alive until we return, so this cannot fail
            let _ = tx.send(AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
        }
        Self { rx }
    }
}

impl EventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long the loop waits for input before refreshing the session clock
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Shortest tick the loop will use; the clock only shows whole seconds
pub const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_TICK),
        }
    }

    /// From the `tick_rate_ms` config value
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Pulls one event per loop iteration, turning quiet intervals into ticks.
///
/// Once the source disconnects (the terminal reader thread died, or a
/// scripted source ran dry) every step sleeps a full interval and ticks,
/// so the loop never spins. Callers check [`Runner::input_closed`] to
/// decide whether to keep going.
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    closed: Cell<bool>,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            closed: Cell::new(false),
        }
    }

    pub fn step(&self) -> AppEvent {
        let interval = self.ticker.interval();
        if self.closed.get() {
            std::thread::sleep(interval);
            return AppEvent::Tick;
        }
        match self.event_source.recv_timeout(interval) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => AppEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("event source closed");
                self.closed.set(true);
                AppEvent::Tick
            }
        }
    }

    pub fn input_closed(&self) -> bool {
        self.closed.get()
    }
}

/// Wall-clock source for session timestamps
pub trait Clock {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        match runner.step() {
            AppEvent::Tick => {}
            other => panic!("expected Tick on timeout, got {other:?}"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        match runner.step() {
            AppEvent::Resize => {}
            other => panic!("expected Resize event, got {other:?}"),
        }
    }

    #[test]
    fn disconnected_source_ticks_and_reports_closed() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        drop(tx);
        let runner = Runner::new(TestEventSource::new(rx), FixedTicker::new(MIN_TICK));

        assert_matches!(runner.step(), AppEvent::Resize);
        assert!(!runner.input_closed());
        assert_matches!(runner.step(), AppEvent::Tick);
        assert!(runner.input_closed());

        let started = std::time::Instant::now();
        assert_matches!(runner.step(), AppEvent::Tick);
        assert!(started.elapsed() >= MIN_TICK);
    }

    #[test]
    fn ticker_never_goes_below_minimum() {
        assert_eq!(FixedTicker::from_millis(0).interval(), MIN_TICK);
        assert_eq!(
            FixedTicker::from_millis(250).interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn typing_source_maps_enter_and_tab() {
        let source = TestEventSource::typing("a\n\t");
        let codes: Vec<KeyCode> = std::iter::from_fn(|| match source.recv_timeout(MIN_TICK) {
            Ok(AppEvent::Key(key)) => Some(key.code),
            _ => None,
        })
        .collect();
        assert_eq!(codes, vec![KeyCode::Char('a'), KeyCode::Enter, KeyCode::Tab]);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        let before = clock.now();

        handle.advance(Duration::from_secs(5));

        assert_eq!(clock.now(), before + Duration::from_secs(5));
    }
}
