use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Period of the race tick driving the robot and the countdown.
pub const TICK_RATE_MS: u64 = 10;

/// Everything the app loop reacts to.
#[derive(Clone, Debug)]
pub enum RaceEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Source of terminal events.
pub trait RaceEventSource: Send + 'static {
    /// Waits at most `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<RaceEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread.
pub struct CrosstermEventSource {
    rx: Receiver<RaceEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // Windows reports releases too; only presses are input
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    Some(RaceEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => Some(RaceEvent::Resize),
                Ok(_) => None,
                Err(e) => {
                    log::error!("terminal event reader stopped: {e}");
                    break;
                }
            };
            if let Some(ev) = forwarded {
                if tx.send(ev).is_err() {
                    break;
                }
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

impl RaceEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RaceEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for tests and headless runs.
pub struct TestEventSource {
    rx: Receiver<RaceEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<RaceEvent>) -> Self {
        Self { rx }
    }
}

impl RaceEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<RaceEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Interleaves terminal events with ticks. A tick is due every interval
/// regardless of how many keys arrive in between.
pub struct Runner<E: RaceEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Cell<Instant>,
}

impl<E: RaceEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Cell::new(Instant::now() + ticker.interval());
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    fn tick(&self) -> RaceEvent {
        self.next_tick.set(Instant::now() + self.ticker.interval());
        RaceEvent::Tick
    }

    /// Next event, or `Tick` once the tick deadline has passed.
    pub fn step(&self) -> RaceEvent {
        let remaining = self
            .next_tick
            .get()
            .saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return self.tick();
        }

        match self.event_source.recv_timeout(remaining) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.tick(),
            Err(RecvTimeoutError::Disconnected) => {
                // no more input; keep ticking at the same pace
                std::thread::sleep(remaining);
                self.tick()
            }
        }
    }
}
