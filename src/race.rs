use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::clock::{elapsed_ms, Clock};
use crate::error::Result;
use crate::opponent::{OpponentCursor, OpponentLevel, ScheduleSource};
use crate::results::{ResultEntry, ResultsRepository};
use crate::scoring::{
    chars_per_minute, chars_per_second, handicap_adjusted_wpm, words_per_minute,
};
use crate::sentences::{head_start, word_count, SentenceProvider};

/// A round ends after this long even if nobody finished.
pub const ROUND_LENGTH_MS: u64 = 60_000;
/// From here on the countdown starts blinking.
pub const TIMER_BLINK_FROM_MS: u64 = 53_000;
pub const TIMER_BLINK_PERIOD_MS: u64 = 500;
pub const RESULT_BLINK_PERIOD_MS: u64 = 300;
pub const RESULT_BLINK_WINDOW_MS: u64 = 2_000;
pub const DEFAULT_MAX_HANDICAP_WORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum RaceStatus {
    #[default]
    Paused,
    Running,
    Won,
    Lost,
    Tie,
    /// Waiting for a corrected handicap word count.
    Question,
    /// Racing the best result was requested but there is none yet.
    Confirm,
    Results,
}

impl RaceStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RaceStatus::Won | RaceStatus::Lost | RaceStatus::Tie)
    }

    pub fn can_start(&self) -> bool {
        matches!(
            self,
            RaceStatus::Paused
                | RaceStatus::Won
                | RaceStatus::Lost
                | RaceStatus::Tie
                | RaceStatus::Results
        )
    }
}

/// Settings for one round, fixed once the round starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoundConfig {
    pub opponent_level: OpponentLevel,
    pub topic: Option<String>,
    pub handicap: bool,
    pub handicap_word_count: usize,
    pub compete_against_best: bool,
}

/// Who typed more of the text. Equal lengths tie.
pub fn compare_outcome(user_text: &str, opponent_text: &str) -> RaceStatus {
    match user_text
        .chars()
        .count()
        .cmp(&opponent_text.chars().count())
    {
        std::cmp::Ordering::Greater => RaceStatus::Won,
        std::cmp::Ordering::Less => RaceStatus::Lost,
        std::cmp::Ordering::Equal => RaceStatus::Tie,
    }
}

/// Words finished within the first `typed` characters of `source`. A word
/// counts once the next source character is a space or the text ends.
pub fn typed_word_count(source: &str, typed: usize) -> usize {
    let chars: Vec<char> = source.chars().collect();
    (1..=typed.min(chars.len()))
        .filter(|&i| chars[i - 1] != ' ' && (i == chars.len() || chars[i] == ' '))
        .count()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Speed {
    pub wpm: u64,
    pub cpm: u64,
    pub cps: u64,
}

/// Everything that changes during a round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundState {
    pub source_text: String,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub user_typed_text: String,
    pub user_char_count: usize,
    pub user_word_count: usize,
    pub opponent_typed_text: String,
    pub opponent_char_count: usize,
    pub opponent_word_count: usize,
    pub elapsed_seconds: f64,
    pub user_speed: Speed,
    pub opponent_speed: Speed,
    pub handicap_adjusted_wpm: u64,
    /// Words handed to the user before the start.
    pub handicap_words: usize,
    /// Elapsed ms at every accepted character.
    pub keystroke_frames: Vec<u64>,
    pub opponent_cursor: OpponentCursor,
    pub schedule_source: Option<ScheduleSource>,
    /// Last mistyped character, until the next correct input.
    pub errored_char: Option<char>,
    pub timer_visible: bool,
    pub result_visible: bool,
    pub recorded: Option<ResultEntry>,
}

impl RoundState {
    pub fn against_best(&self) -> bool {
        self.schedule_source
            .as_ref()
            .is_some_and(ScheduleSource::is_replay)
    }

    fn source_len(&self) -> usize {
        self.source_text.chars().count()
    }

    fn opponent_done(&self) -> bool {
        !self.source_text.is_empty() && self.opponent_char_count >= self.source_len()
    }
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub status: RaceStatus,
    pub state: RoundState,
    pub max_handicap_words: usize,
}

/// Owns the live round and drives it from input and ticks.
pub struct RaceEngine {
    status: RaceStatus,
    state: RoundState,
    repository: ResultsRepository,
    sentences: Box<dyn SentenceProvider>,
    clock: Box<dyn Clock>,
    max_handicap_words: usize,
    handicap_override: Option<usize>,
    pending: Option<RoundConfig>,
    fallback_accepted: bool,
    progress_timer: bool,
    blink_started: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for RaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceEngine")
            .field("status", &self.status)
            .field("state", &self.state)
            .field("progress_timer", &self.progress_timer)
            .finish_non_exhaustive()
    }
}

impl RaceEngine {
    pub fn new(
        repository: ResultsRepository,
        sentences: Box<dyn SentenceProvider>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            status: RaceStatus::Paused,
            state: RoundState::default(),
            repository,
            sentences,
            clock,
            max_handicap_words: DEFAULT_MAX_HANDICAP_WORDS,
            handicap_override: None,
            pending: None,
            fallback_accepted: false,
            progress_timer: false,
            blink_started: None,
        }
    }

    pub fn with_max_handicap_words(mut self, max: usize) -> Self {
        self.max_handicap_words = max;
        self
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn repository(&self) -> &ResultsRepository {
        &self.repository
    }

    pub fn max_handicap_words(&self) -> usize {
        self.max_handicap_words
    }

    pub fn handicap_override(&self) -> Option<usize> {
        self.handicap_override
    }

    pub fn is_ticking(&self) -> bool {
        self.progress_timer || self.blink_started.is_some()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            status: self.status,
            state: self.state.clone(),
            max_handicap_words: self.max_handicap_words,
        }
    }

    fn elapsed_at(&self, now: DateTime<Utc>) -> u64 {
        self.state
            .start_time
            .map(|start| elapsed_ms(start, now))
            .unwrap_or(0)
    }

    /// Starts a round, or parks the engine in `Question`/`Confirm` when the
    /// configuration needs a decision first. Ignored while a round runs.
    pub fn start_round(&mut self, config: RoundConfig) -> Result<RaceStatus> {
        if !self.status.can_start() {
            return Ok(self.status);
        }

        let handicap_words = if config.handicap {
            self.handicap_override
                .unwrap_or(config.handicap_word_count)
        } else {
            0
        };
        if handicap_words > self.max_handicap_words {
            debug!(
                "handicap of {handicap_words} words exceeds {}, asking",
                self.max_handicap_words
            );
            self.pending = Some(config);
            self.status = RaceStatus::Question;
            return Ok(self.status);
        }

        let source = if config.compete_against_best {
            match (self.repository.best_result()?, self.repository.best_frames()?) {
                (Some(best), Some(frames)) if !frames.is_empty() => ScheduleSource::Recorded {
                    frames,
                    cpm: best.entry.cpm,
                },
                _ if self.fallback_accepted => ScheduleSource::FixedCadence(config.opponent_level),
                _ => {
                    debug!("no best result to race against, asking for fallback");
                    self.pending = Some(config);
                    self.status = RaceStatus::Confirm;
                    return Ok(self.status);
                }
            }
        } else {
            ScheduleSource::FixedCadence(config.opponent_level)
        };

        self.fallback_accepted = false;
        self.pending = None;
        self.begin(&config, source, handicap_words);
        Ok(self.status)
    }

    /// Corrected handicap word count from the `Question` prompt. Values above
    /// the maximum leave the prompt open.
    pub fn answer_question(&mut self, words: usize) -> RaceStatus {
        if self.status == RaceStatus::Question && words <= self.max_handicap_words {
            self.handicap_override = Some(words);
            self.pending = None;
            self.status = RaceStatus::Paused;
        }
        self.status
    }

    /// Answer to the `Confirm` prompt: race the robot instead, or go back.
    pub fn confirm(&mut self, accept: bool) -> Result<RaceStatus> {
        if self.status != RaceStatus::Confirm {
            return Ok(self.status);
        }
        self.status = RaceStatus::Paused;
        match self.pending.take() {
            Some(config) if accept => {
                self.fallback_accepted = true;
                self.start_round(config)
            }
            _ => Ok(self.status),
        }
    }

    fn begin(&mut self, config: &RoundConfig, source: ScheduleSource, handicap_words: usize) {
        self.cancel();

        let sentence = self.sentences.sentence(config.topic.as_deref());
        let len = sentence.chars().count();
        let words = handicap_words.min(word_count(&sentence).saturating_sub(1));
        let head = head_start(&sentence, words).to_string();
        let head_chars = head.chars().count();
        let now = self.clock.now();

        info!(
            "round started: {len} chars, opponent {}, handicap {words} words",
            match &source {
                ScheduleSource::FixedCadence(level) => level.to_string(),
                ScheduleSource::Recorded { cpm, .. } => format!("best run at {cpm} cpm"),
            }
        );

        self.state = RoundState {
            user_char_count: head_chars,
            user_word_count: typed_word_count(&sentence, head_chars),
            user_typed_text: head,
            keystroke_frames: vec![0; head_chars],
            handicap_words: words,
            opponent_cursor: OpponentCursor::new(source.schedule(len)),
            schedule_source: Some(source),
            source_text: sentence,
            start_time: Some(now),
            timer_visible: true,
            result_visible: true,
            ..RoundState::default()
        };
        self.status = RaceStatus::Running;
        self.progress_timer = true;
    }

    /// Advances the round by wall-clock time. Outside a round it drives the
    /// end-of-round blink.
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now();

        if !(self.progress_timer && self.status == RaceStatus::Running) {
            self.update_blink(now);
            return Ok(());
        }

        let elapsed = self.elapsed_at(now);
        self.state.elapsed_seconds = elapsed as f64 / 1000.0;

        let due = self.state.opponent_cursor.advance_to(elapsed);
        self.reveal_opponent(due);
        self.refresh_speeds(elapsed, false);

        self.state.timer_visible = elapsed < TIMER_BLINK_FROM_MS
            || (elapsed / TIMER_BLINK_PERIOD_MS) % 2 == 0;

        if elapsed >= ROUND_LENGTH_MS || self.state.opponent_done() {
            self.finalize(now, elapsed)?;
        }
        Ok(())
    }

    fn reveal_opponent(&mut self, count: usize) {
        let state = &mut self.state;
        let next: Vec<char> = state
            .source_text
            .chars()
            .skip(state.opponent_char_count)
            .take(count)
            .collect();
        let len = state.source_len();
        for c in next {
            state.opponent_typed_text.push(c);
            state.opponent_char_count += 1;
            if c == ' ' || state.opponent_char_count == len {
                state.opponent_word_count += 1;
            }
        }
    }

    fn refresh_speeds(&mut self, elapsed: u64, finished: bool) {
        let state = &mut self.state;
        state.user_speed = Speed {
            wpm: words_per_minute(state.user_word_count, elapsed, finished),
            cpm: chars_per_minute(state.user_char_count, elapsed),
            cps: chars_per_second(state.user_char_count, elapsed),
        };
        state.handicap_adjusted_wpm = handicap_adjusted_wpm(
            state.user_word_count,
            state.handicap_words,
            elapsed,
            finished,
        );

        let pinned = state
            .schedule_source
            .as_ref()
            .and_then(ScheduleSource::pinned_cpm)
            .filter(|_| state.opponent_cursor.is_exhausted());
        state.opponent_speed = Speed {
            wpm: words_per_minute(state.opponent_word_count, elapsed, finished),
            cpm: pinned.unwrap_or_else(|| chars_per_minute(state.opponent_char_count, elapsed)),
            cps: chars_per_second(state.opponent_char_count, elapsed),
        };
    }

    /// Offers the full text of the input box. Only extensions that keep the
    /// text a prefix of the source are taken; anything else flags the
    /// mistyped character and leaves progress alone.
    pub fn on_user_input(&mut self, candidate: &str) -> Result<()> {
        if !(self.progress_timer && self.status == RaceStatus::Running) {
            return Ok(());
        }

        if !self.state.source_text.starts_with(candidate) {
            self.state.errored_char = candidate
                .chars()
                .zip(self.state.source_text.chars())
                .find(|(typed, expected)| typed != expected)
                .map(|(typed, _)| typed)
                .or_else(|| candidate.chars().nth(self.state.source_len()));
            return Ok(());
        }

        self.state.errored_char = None;
        let new_count = candidate.chars().count();
        if new_count <= self.state.user_char_count {
            return Ok(());
        }

        let now = self.clock.now();
        let elapsed = self.elapsed_at(now);
        let added = new_count - self.state.user_char_count;
        self.state
            .keystroke_frames
            .extend(std::iter::repeat(elapsed).take(added));
        self.state.user_typed_text = candidate.to_string();
        self.state.user_char_count = new_count;
        self.state.user_word_count = typed_word_count(&self.state.source_text, new_count);

        if self.state.user_typed_text == self.state.source_text {
            self.complete(now, elapsed)
        } else {
            self.refresh_speeds(elapsed, false);
            Ok(())
        }
    }

    /// Convenience for key-at-a-time hosts.
    pub fn type_char(&mut self, c: char) -> Result<()> {
        let mut candidate = self.state.user_typed_text.clone();
        candidate.push(c);
        self.on_user_input(&candidate)
    }

    pub fn clear_error(&mut self) {
        self.state.errored_char = None;
    }

    fn complete(&mut self, now: DateTime<Utc>, elapsed: u64) -> Result<()> {
        self.progress_timer = false;
        self.state.finish_time = Some(now);
        self.state.elapsed_seconds = elapsed as f64 / 1000.0;
        self.refresh_speeds(elapsed, true);
        self.commit(now, elapsed)?;
        self.status = RaceStatus::Won;
        info!("user finished the text in {elapsed} ms");
        self.blink_started = Some(now);
        Ok(())
    }

    fn finalize(&mut self, now: DateTime<Utc>, elapsed: u64) -> Result<()> {
        self.progress_timer = false;
        self.state.finish_time = Some(now);
        self.refresh_speeds(elapsed, true);
        self.commit(now, elapsed)?;
        self.status = compare_outcome(&self.state.user_typed_text, &self.state.opponent_typed_text);
        info!(
            "round over after {elapsed} ms: {} ({} vs {} chars)",
            self.status, self.state.user_char_count, self.state.opponent_char_count
        );
        self.blink_started = Some(now);
        Ok(())
    }

    /// Writes the round to the repository. On failure the round is dropped
    /// back to `Paused` rather than left half-recorded.
    fn commit(&mut self, now: DateTime<Utc>, elapsed: u64) -> Result<()> {
        let state = &self.state;
        let entry = ResultEntry {
            wpm: words_per_minute(state.user_word_count, elapsed, true),
            cps: chars_per_second(state.user_char_count, elapsed),
            cpm: chars_per_minute(state.user_char_count, elapsed),
            chars: state.user_char_count,
            passed_seconds: elapsed as f64 / 1000.0,
            passed_ms: elapsed,
        };

        let written = self.persist(now, &entry);
        if let Err(e) = written {
            self.status = RaceStatus::Paused;
            return Err(e);
        }
        self.state.recorded = Some(entry);
        Ok(())
    }

    fn persist(&self, now: DateTime<Utc>, entry: &ResultEntry) -> Result<()> {
        let previous_best = self.repository.best_result()?;
        let beats = previous_best.map_or(true, |best| entry.cpm > best.entry.cpm);
        let best_frames = (entry.is_eligible() && beats && !self.state.keystroke_frames.is_empty())
            .then(|| self.state.keystroke_frames.clone());
        if best_frames.is_some() {
            debug!("new best at {} cpm, storing frames", entry.cpm);
        }
        self.repository.record_round(now, entry.clone(), best_frames)?;
        Ok(())
    }

    fn update_blink(&mut self, now: DateTime<Utc>) {
        if let Some(started) = self.blink_started {
            let since = elapsed_ms(started, now);
            if since >= RESULT_BLINK_WINDOW_MS {
                self.state.result_visible = true;
                self.blink_started = None;
            } else {
                self.state.result_visible = (since / RESULT_BLINK_PERIOD_MS) % 2 == 0;
            }
        }
    }

    /// Switches to the results view. Not allowed mid-round.
    pub fn request_results(&mut self) -> RaceStatus {
        if self.status != RaceStatus::Running {
            self.status = RaceStatus::Results;
        }
        self.status
    }

    /// Stops both timers. A running round is abandoned and left `Paused`.
    pub fn cancel(&mut self) {
        if self.status == RaceStatus::Running {
            info!("round cancelled");
            self.status = RaceStatus::Paused;
        }
        self.progress_timer = false;
        self.blink_started = None;
        self.state.result_visible = true;
    }
}
