use assert_matches::assert_matches;
use tempfile::tempdir;

use typing_race::clock::{Clock, ManualClock};
use typing_race::opponent::{OpponentLevel, ScheduleSource};
use typing_race::race::{RaceEngine, RaceStatus, RoundConfig};
use typing_race::results::{
    timestamp_key, JsonFileStore, ResultsQuery, ResultsRepository, SortBy, BEST_FRAMES_KEY,
};
use typing_race::sentences::FixedSentence;

const LONG_TEXT: &str = "Rivers carve their valleys slowly, grain by grain, \
until the water that once trickled now roars through stone it has shaped.";

fn file_repository(path: &std::path::Path) -> ResultsRepository {
    ResultsRepository::new(Box::new(JsonFileStore::with_path(path)))
}

fn engine(repository: ResultsRepository, text: &str, clock: &ManualClock) -> RaceEngine {
    RaceEngine::new(
        repository,
        Box::new(FixedSentence(text.to_string())),
        Box::new(clock.clone()),
    )
}

#[test]
fn twenty_characters_typed_at_a_steady_pace_win() {
    let clock = ManualClock::default();
    let text = "abcde fghij klmno pq";
    assert_eq!(text.chars().count(), 20);

    let mut engine = engine(ResultsRepository::in_memory(), text, &clock);
    engine.start_round(RoundConfig::default()).unwrap();

    for c in text.chars() {
        clock.advance_ms(100);
        engine.tick().unwrap();
        engine.type_char(c).unwrap();
    }

    assert_eq!(engine.status(), RaceStatus::Won);
    let recorded = engine.state().recorded.clone().unwrap();
    assert_eq!(recorded.chars, 20);
    assert_eq!(recorded.passed_ms, 2_000);
    assert!((recorded.passed_seconds - 2.0).abs() < f64::EPSILON);
    // keyed by the instant the last character landed
    let document = engine.repository().get_all().unwrap();
    assert!(document.contains_key(&timestamp_key(clock.now())));
    // medium robot managed 5 characters in that time
    assert_eq!(engine.state().opponent_char_count, 5);

    // a two second round is recorded but never becomes the best run
    assert!(!recorded.is_eligible());
    assert_eq!(engine.repository().best_frames().unwrap(), None);
}

#[test]
fn full_minute_round_is_lost_and_becomes_the_best_run() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let clock = ManualClock::default();

    let mut engine = engine(file_repository(&path), LONG_TEXT, &clock);
    engine
        .start_round(RoundConfig {
            opponent_level: OpponentLevel::Low,
            ..RoundConfig::default()
        })
        .unwrap();

    for c in LONG_TEXT.chars().take(10) {
        clock.advance_ms(100);
        engine.type_char(c).unwrap();
    }
    while engine.status() == RaceStatus::Running {
        clock.advance_ms(1_000);
        engine.tick().unwrap();
    }

    assert_eq!(engine.status(), RaceStatus::Lost);
    assert_eq!(engine.state().opponent_char_count, 37);
    let recorded = engine.state().recorded.clone().unwrap();
    assert!((recorded.passed_seconds - 60.0).abs() < 1e-9);
    assert_eq!(recorded.chars, 10);
    assert_eq!(recorded.cpm, 10);

    // everything is on disk: reopen through a fresh store
    let reopened = file_repository(&path);
    let results = reopened
        .query(ResultsQuery {
            sort_by: SortBy::BEST_FIRST,
            ..ResultsQuery::default()
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry, recorded);
    assert_eq!(
        reopened.best_frames().unwrap(),
        Some((1..=10).map(|i| i * 100).collect())
    );

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get(BEST_FRAMES_KEY).is_some());
}

#[test]
fn best_run_is_replayed_and_its_cpm_pinned() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.json");
    let clock = ManualClock::default();

    let mut first = engine(file_repository(&path), LONG_TEXT, &clock);
    first.start_round(RoundConfig::default()).unwrap();
    for c in LONG_TEXT.chars().take(10) {
        clock.advance_ms(100);
        first.type_char(c).unwrap();
    }
    clock.advance_ms(59_000);
    first.tick().unwrap();
    assert!(first.status().is_finished());

    let mut replay = engine(file_repository(&path), LONG_TEXT, &clock);
    let status = replay
        .start_round(RoundConfig {
            compete_against_best: true,
            ..RoundConfig::default()
        })
        .unwrap();
    assert_eq!(status, RaceStatus::Running);
    assert!(replay.state().against_best());
    assert_matches!(
        replay.state().schedule_source,
        Some(ScheduleSource::Recorded { cpm: 10, .. })
    );

    clock.advance_ms(1_100);
    replay.tick().unwrap();
    assert_eq!(replay.state().opponent_char_count, 10);
    assert_eq!(replay.state().opponent_speed.cpm, 10);
}

#[test]
fn racing_best_without_history_asks_first() {
    let clock = ManualClock::default();
    let mut engine = engine(ResultsRepository::in_memory(), LONG_TEXT, &clock);

    let config = RoundConfig {
        compete_against_best: true,
        ..RoundConfig::default()
    };
    assert_eq!(engine.start_round(config).unwrap(), RaceStatus::Confirm);
    assert_eq!(engine.confirm(true).unwrap(), RaceStatus::Running);
    assert!(!engine.state().against_best());
}
