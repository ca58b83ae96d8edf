use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::Result;
use crate::race::{RaceEngine, RaceStatus, RoundConfig};
use crate::results::{DatedResult, ResultsQuery, SortBy, SortField};
use crate::runtime::RaceEvent;

/// Order in which `s` cycles through sort keys on the results screen.
const SORT_CYCLE: [SortBy; 6] = [
    SortBy {
        field: SortField::Date,
        descending: true,
    },
    SortBy {
        field: SortField::Date,
        descending: false,
    },
    SortBy {
        field: SortField::Cpm,
        descending: true,
    },
    SortBy {
        field: SortField::Cpm,
        descending: false,
    },
    SortBy {
        field: SortField::Wpm,
        descending: true,
    },
    SortBy {
        field: SortField::Wpm,
        descending: false,
    },
];

/// Rows shown on the results screen, read once when the screen opens.
#[derive(Debug, Clone, Default)]
pub struct ResultsView {
    pub top: Vec<DatedResult>,
    pub sorted: Vec<DatedResult>,
    pub best_summary: String,
}

#[derive(Debug)]
pub struct App {
    pub engine: RaceEngine,
    pub round_config: RoundConfig,
    pub results_query: ResultsQuery,
    pub compact_results: bool,
    pub results_view: ResultsView,
    /// Digits typed at the handicap question.
    pub question_input: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(engine: RaceEngine, round_config: RoundConfig, results_query: ResultsQuery) -> Self {
        Self {
            engine,
            round_config,
            results_query,
            compact_results: false,
            results_view: ResultsView::default(),
            question_input: String::new(),
            should_quit: false,
        }
    }

    pub fn status(&self) -> RaceStatus {
        self.engine.status()
    }

    pub fn start_round(&mut self) -> Result<()> {
        let status = self.engine.start_round(self.round_config.clone())?;
        if status == RaceStatus::Question {
            self.question_input.clear();
        }
        Ok(())
    }

    pub fn show_results(&mut self) -> Result<()> {
        if self.engine.request_results() == RaceStatus::Results {
            self.refresh_results()?;
        }
        Ok(())
    }

    pub fn refresh_results(&mut self) -> Result<()> {
        let repo = self.engine.repository();
        self.results_view = ResultsView {
            top: repo.query(ResultsQuery {
                sort_by: SortBy::BEST_FIRST,
                show_all: false,
                top_n: self.results_query.top_n,
            })?,
            sorted: repo.query(self.results_query)?,
            best_summary: repo.best_result_summary()?,
        };
        Ok(())
    }

    fn cycle_sort(&mut self) -> Result<()> {
        let current = SORT_CYCLE
            .iter()
            .position(|s| *s == self.results_query.sort_by)
            .unwrap_or(0);
        self.results_query.sort_by = SORT_CYCLE[(current + 1) % SORT_CYCLE.len()];
        self.refresh_results()
    }

    pub fn on_event(&mut self, event: RaceEvent) -> Result<()> {
        match event {
            RaceEvent::Tick => self.engine.tick(),
            RaceEvent::Resize => Ok(()),
            RaceEvent::Key(key) => self.on_key(key),
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return Ok(());
        }

        match self.engine.status() {
            RaceStatus::Running => match key.code {
                KeyCode::Esc => self.quit(),
                KeyCode::Backspace => self.engine.clear_error(),
                KeyCode::Char(c) => self.engine.type_char(c)?,
                _ => {}
            },
            RaceStatus::Question => match key.code {
                KeyCode::Esc => self.quit(),
                KeyCode::Char(c) if c.is_ascii_digit() => self.question_input.push(c),
                KeyCode::Backspace => {
                    self.question_input.pop();
                }
                KeyCode::Enter => {
                    if let Ok(words) = self.question_input.parse::<usize>() {
                        self.engine.answer_question(words);
                    }
                    self.question_input.clear();
                }
                _ => {}
            },
            RaceStatus::Confirm => match key.code {
                KeyCode::Char('o') | KeyCode::Enter => {
                    self.engine.confirm(true)?;
                }
                KeyCode::Char('c') | KeyCode::Esc => {
                    self.engine.confirm(false)?;
                }
                _ => {}
            },
            RaceStatus::Results => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.quit(),
                KeyCode::Char('y') => self.start_round()?,
                KeyCode::Char('s') => self.cycle_sort()?,
                KeyCode::Char('a') => {
                    self.results_query.show_all = !self.results_query.show_all;
                    self.refresh_results()?;
                }
                KeyCode::Char('c') => self.compact_results = !self.compact_results,
                _ => {}
            },
            RaceStatus::Paused | RaceStatus::Won | RaceStatus::Lost | RaceStatus::Tie => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('q') => self.quit(),
                    KeyCode::Char('y') => self.start_round()?,
                    KeyCode::Char('r') => self.show_results()?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn quit(&mut self) {
        self.engine.cancel();
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::opponent::OpponentLevel;
    use crate::results::{ResultEntry, ResultsRepository};
    use crate::sentences::FixedSentence;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn code(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with(text: &str, config: RoundConfig) -> (App, ManualClock) {
        let clock = ManualClock::default();
        let engine = RaceEngine::new(
            ResultsRepository::in_memory(),
            Box::new(FixedSentence(text.to_string())),
            Box::new(clock.clone()),
        )
        .with_max_handicap_words(3);
        (App::new(engine, config, ResultsQuery::default()), clock)
    }

    #[test]
    fn y_starts_and_keys_type() {
        let (mut app, _clock) = app_with("hi there", RoundConfig::default());
        app.on_key(key('y')).unwrap();
        assert_eq!(app.status(), RaceStatus::Running);
        app.on_key(key('h')).unwrap();
        app.on_key(key('x')).unwrap();
        assert_eq!(app.engine.state().user_typed_text, "h");
        assert_eq!(app.engine.state().errored_char, Some('x'));
        app.on_key(code(KeyCode::Backspace)).unwrap();
        assert_eq!(app.engine.state().errored_char, None);
    }

    #[test]
    fn typing_whole_text_wins() {
        let (mut app, _clock) = app_with("hi", RoundConfig::default());
        app.on_key(key('y')).unwrap();
        app.on_key(key('h')).unwrap();
        app.on_key(key('i')).unwrap();
        assert_eq!(app.status(), RaceStatus::Won);
        app.on_key(key('r')).unwrap();
        assert_eq!(app.status(), RaceStatus::Results);
    }

    #[test]
    fn question_flow() {
        let config = RoundConfig {
            handicap: true,
            handicap_word_count: 9,
            ..RoundConfig::default()
        };
        let (mut app, _clock) = app_with("one two three four five", config);
        app.on_key(key('y')).unwrap();
        assert_eq!(app.status(), RaceStatus::Question);
        app.on_key(key('2')).unwrap();
        app.on_key(code(KeyCode::Enter)).unwrap();
        assert_eq!(app.status(), RaceStatus::Paused);
        app.on_key(key('y')).unwrap();
        assert_eq!(app.engine.state().user_typed_text, "one two ");
    }

    #[test]
    fn confirm_flow() {
        let config = RoundConfig {
            compete_against_best: true,
            opponent_level: OpponentLevel::Fast,
            ..RoundConfig::default()
        };
        let (mut app, _clock) = app_with("hello", config);
        app.on_key(key('y')).unwrap();
        assert_eq!(app.status(), RaceStatus::Confirm);
        app.on_key(code(KeyCode::Esc)).unwrap();
        assert_eq!(app.status(), RaceStatus::Paused);
        assert!(!app.should_quit);
        app.on_key(key('y')).unwrap();
        app.on_key(key('o')).unwrap();
        assert_eq!(app.status(), RaceStatus::Running);
    }

    #[test]
    fn results_screen_sorts_and_toggles() {
        let (mut app, clock) = app_with("hello", RoundConfig::default());
        for cpm in [220, 310] {
            clock.advance_ms(1_000);
            app.engine
                .repository()
                .record_round(
                    clock.now(),
                    ResultEntry {
                        wpm: cpm / 6,
                        cps: cpm / 60,
                        cpm,
                        chars: cpm as usize,
                        passed_seconds: 60.0,
                        passed_ms: 60_000,
                    },
                    None,
                )
                .unwrap();
        }
        app.on_key(key('r')).unwrap();
        assert_eq!(app.status(), RaceStatus::Results);
        assert_eq!(app.results_view.top[0].entry.cpm, 310);
        assert_eq!(app.results_view.sorted[0].entry.cpm, 310);

        app.on_key(key('s')).unwrap();
        assert_eq!(app.results_query.sort_by.to_string(), "date");
        assert_eq!(app.results_view.sorted[0].entry.cpm, 220);

        app.on_key(key('a')).unwrap();
        assert!(app.results_query.show_all);
        app.on_key(key('c')).unwrap();
        assert!(app.compact_results);
        assert!(app.results_view.best_summary.contains("310 cpm"));
    }

    #[test]
    fn ticks_reach_the_engine() {
        let (mut app, clock) = app_with("abcdef", RoundConfig::default());
        app.on_key(key('y')).unwrap();
        clock.advance_ms(720);
        app.on_event(RaceEvent::Tick).unwrap();
        assert_eq!(app.engine.state().opponent_char_count, 2);
    }

    #[test]
    fn ctrl_c_quits_anywhere() {
        let (mut app, _clock) = app_with("abc", RoundConfig::default());
        app.on_key(key('y')).unwrap();
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))
            .unwrap();
        assert!(app.should_quit);
        assert_eq!(app.engine.state().user_typed_text, "");
    }
}
