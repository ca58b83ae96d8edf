use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How fast the robot types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "kebab-case")]
pub enum OpponentLevel {
    ExtraFast,
    Fast,
    #[default]
    Medium,
    Low,
}

impl OpponentLevel {
    /// Milliseconds between two characters revealed by the robot.
    pub fn interval_ms(&self) -> u64 {
        match self {
            OpponentLevel::ExtraFast => 200,
            OpponentLevel::Fast => 260,
            OpponentLevel::Medium => 360,
            OpponentLevel::Low => 1600,
        }
    }
}

/// Where the opponent's reveal times come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleSource {
    /// One character every `interval_ms` of the level.
    FixedCadence(OpponentLevel),
    /// Replay of a recorded round: the keystroke frames plus the cpm that
    /// round was recorded with.
    Recorded { frames: Vec<u64>, cpm: u64 },
}

impl ScheduleSource {
    /// Millisecond offsets at which character `i` of a `len`-character text is
    /// revealed.
    pub fn schedule(&self, len: usize) -> Vec<u64> {
        match self {
            ScheduleSource::FixedCadence(level) => {
                let interval = level.interval_ms();
                (1..=len as u64).map(|i| i * interval).collect()
            }
            ScheduleSource::Recorded { frames, .. } => frames.iter().copied().take(len).collect(),
        }
    }

    /// A replayed opponent reports the cpm of the recorded round once it has
    /// revealed all recorded frames.
    pub fn pinned_cpm(&self) -> Option<u64> {
        match self {
            ScheduleSource::FixedCadence(_) => None,
            ScheduleSource::Recorded { cpm, .. } => Some(*cpm),
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, ScheduleSource::Recorded { .. })
    }
}

/// Walks an opponent schedule strictly forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpponentCursor {
    schedule: Vec<u64>,
    position: usize,
}

impl OpponentCursor {
    pub fn new(schedule: Vec<u64>) -> Self {
        Self {
            schedule,
            position: 0,
        }
    }

    /// Number of characters that should be visible at `elapsed_ms`, counting
    /// from the current position. Advances the cursor past them.
    pub fn advance_to(&mut self, elapsed_ms: u64) -> usize {
        let start = self.position;
        while self.position < self.schedule.len() && self.schedule[self.position] <= elapsed_ms {
            self.position += 1;
        }
        self.position - start
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.schedule.len()
    }

    pub fn schedule(&self) -> &[u64] {
        &self.schedule
    }
}
