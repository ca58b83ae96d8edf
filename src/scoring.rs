//! Speed metrics for a round.
//!
//! Every rate switches from the raw count to an extrapolated rate only once a
//! minimum amount of time has passed, so a single word typed in the first
//! fraction of a second does not show up as several hundred wpm.
//!
//! The thresholds differ on purpose: wpm extrapolates strictly after one
//! minute (or when the round is finished), cpm from one minute inclusive.
//! Recorded results depend on both, so they are kept as they are.

use std::cmp::Ordering;

use crate::race::RaceStatus;

pub const MS_PER_MINUTE: u64 = 60_000;
pub const MS_PER_SECOND: u64 = 1_000;

/// wpm above this is shown as a good result
pub const GOOD_WPM: u64 = 30;
/// cpm above this is shown as a good result
pub const GOOD_CPM: u64 = 200;

fn per_unit(count: usize, elapsed_ms: u64, unit_ms: u64) -> u64 {
    let units = elapsed_ms as f64 / unit_ms as f64;
    (count as f64 / units).round() as u64
}

pub fn words_per_minute(word_count: usize, elapsed_ms: u64, finished: bool) -> u64 {
    if (finished && elapsed_ms > 0) || elapsed_ms > MS_PER_MINUTE {
        per_unit(word_count, elapsed_ms, MS_PER_MINUTE)
    } else {
        word_count as u64
    }
}

pub fn chars_per_minute(char_count: usize, elapsed_ms: u64) -> u64 {
    if elapsed_ms >= MS_PER_MINUTE {
        per_unit(char_count, elapsed_ms, MS_PER_MINUTE)
    } else {
        char_count as u64
    }
}

pub fn chars_per_second(char_count: usize, elapsed_ms: u64) -> u64 {
    if elapsed_ms > MS_PER_SECOND {
        per_unit(char_count, elapsed_ms, MS_PER_SECOND)
    } else {
        char_count as u64
    }
}

/// Words per minute counting only the words typed after the head start.
pub fn handicap_adjusted_wpm(
    word_count: usize,
    handicap_words: usize,
    elapsed_ms: u64,
    finished: bool,
) -> u64 {
    words_per_minute(
        word_count.saturating_sub(handicap_words),
        elapsed_ms,
        finished,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Higher,
    Lower,
    Equal,
}

pub fn compare_metric(a: u64, b: u64) -> Comparison {
    match a.cmp(&b) {
        Ordering::Greater => Comparison::Higher,
        Ordering::Less => Comparison::Lower,
        Ordering::Equal => Comparison::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedGrade {
    Good,
    Fair,
}

pub fn grade_wpm(wpm: u64) -> SpeedGrade {
    if wpm > GOOD_WPM {
        SpeedGrade::Good
    } else {
        SpeedGrade::Fair
    }
}

pub fn grade_cpm(cpm: u64) -> SpeedGrade {
    if cpm > GOOD_CPM {
        SpeedGrade::Good
    } else {
        SpeedGrade::Fair
    }
}

/// Banner shown once a round is over.
pub fn outcome_message(status: RaceStatus, against_best: bool) -> &'static str {
    match (status, against_best) {
        (RaceStatus::Won, false) => "You won!",
        (RaceStatus::Lost, false) => "Robot won!",
        (RaceStatus::Tie, false) => "It's a tie!",
        (RaceStatus::Won, true) => "You have surpassed your best score!",
        (RaceStatus::Lost, true) => "You were unable to beat your best result.",
        (RaceStatus::Tie, true) => "You matched your best result.",
        _ => "",
    }
}
