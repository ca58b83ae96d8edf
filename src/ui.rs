use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::App,
    race::{RaceStatus, RoundSnapshot, Speed, ROUND_LENGTH_MS},
    results::DatedResult,
    scoring::{compare_metric, grade_cpm, grade_wpm, outcome_message, Comparison, SpeedGrade},
};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

const GOOD_COLOR: Color = Color::Rgb(11, 201, 35);
const FAIR_COLOR: Color = Color::Rgb(233, 193, 84);
const KEY_COLOR: Color = Color::Cyan;

fn grade_color(grade: SpeedGrade) -> Color {
    match grade {
        SpeedGrade::Good => GOOD_COLOR,
        SpeedGrade::Fair => FAIR_COLOR,
    }
}

fn key_hint<'a>(key: &'a str, label: &'a str) -> Vec<Span<'a>> {
    vec![
        Span::styled(
            key,
            Style::default().fg(KEY_COLOR).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" - {label}   ")),
    ]
}

fn menu_line() -> Line<'static> {
    let mut spans = key_hint("y", "start a new round");
    spans.extend(key_hint("r", "display results"));
    spans.extend(key_hint("esc", "quit"));
    Line::from(spans)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snapshot = self.engine.snapshot();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(area);

        Paragraph::new(Span::styled(
            "TYPING RACE",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        match snapshot.status {
            RaceStatus::Paused => render_intro(chunks[1], buf),
            RaceStatus::Running | RaceStatus::Won | RaceStatus::Lost | RaceStatus::Tie => {
                render_race(&snapshot, chunks[1], buf)
            }
            RaceStatus::Question => render_question(self, &snapshot, chunks[1], buf),
            RaceStatus::Confirm => render_confirm(chunks[1], buf),
            RaceStatus::Results => render_results(self, chunks[1], buf),
        }
    }
}

fn render_intro(area: Rect, buf: &mut Buffer) {
    let mut start = vec![Span::raw("Press ")];
    start.extend(key_hint("y", "accept the challenge and start a round."));
    let lines = vec![
        Line::from("Typer-robot challenges you: who will type the text faster?"),
        Line::from(""),
        Line::from(start),
        Line::from(""),
        menu_line(),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn speed_line(speed: &Speed) -> Line<'static> {
    Line::from(vec![
        Span::raw("wpm: "),
        Span::styled(
            speed.wpm.to_string(),
            Style::default().fg(grade_color(grade_wpm(speed.wpm))),
        ),
        Span::raw("  cpm: "),
        Span::styled(
            speed.cpm.to_string(),
            Style::default().fg(grade_color(grade_cpm(speed.cpm))),
        ),
        Span::raw(format!("  cps: {}", speed.cps)),
    ])
}

/// Marks the user's cpm against the opponent's.
fn comparison_span(user: &Speed, opponent: &Speed) -> Span<'static> {
    let (mark, color) = match compare_metric(user.cpm, opponent.cpm) {
        Comparison::Higher => ("▲", GOOD_COLOR),
        Comparison::Lower => ("▼", Color::Red),
        Comparison::Equal => ("=", FAIR_COLOR),
    };
    Span::styled(
        format!(" {mark}"),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

fn render_race(snapshot: &RoundSnapshot, area: Rect, buf: &mut Buffer) {
    let state = &snapshot.state;
    let status = snapshot.status;
    let running = status == RaceStatus::Running;

    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let text_lines = (state.source_text.width() / inner_width + 1) as u16;
    let box_lines = (state.source_text.width() / (inner_width / 2).max(1) + 3) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),          // status / timer
            Constraint::Length(text_lines), // source
            Constraint::Length(1),          // padding
            Constraint::Length(box_lines),  // typing boxes
            Constraint::Length(1),          // speeds
            Constraint::Min(0),
            Constraint::Length(1), // menu
        ])
        .split(area);

    let banner = if running {
        let remaining = ROUND_LENGTH_MS.saturating_sub((state.elapsed_seconds * 1000.0) as u64);
        let timer = if state.timer_visible {
            format!("{:.0}s left", remaining as f64 / 1000.0)
        } else {
            String::new()
        };
        Line::from(vec![
            Span::styled("Running  ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(timer, Style::default().add_modifier(Modifier::DIM)),
        ])
    } else if state.result_visible {
        let color = match status {
            RaceStatus::Won => GOOD_COLOR,
            RaceStatus::Lost => Color::Red,
            _ => FAIR_COLOR,
        };
        Line::from(Span::styled(
            outcome_message(status, state.against_best()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from("")
    };
    Paragraph::new(banner)
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    // source text: typed part, cursor, rest
    let typed = state.user_char_count;
    let mut spans = vec![Span::styled(
        state.source_text.chars().take(typed).collect::<String>(),
        Style::default().fg(GOOD_COLOR),
    )];
    let mut rest = state.source_text.chars().skip(typed);
    if let Some(next) = rest.next() {
        let cursor_style = if state.errored_char.is_some() {
            Style::default()
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::UNDERLINED | Modifier::BOLD)
        };
        spans.push(Span::styled(next.to_string(), cursor_style));
    }
    spans.push(Span::styled(
        rest.collect::<String>(),
        Style::default().add_modifier(Modifier::DIM),
    ));
    Paragraph::new(Line::from(spans))
        .wrap(Wrap { trim: false })
        .render(chunks[1], buf);

    let boxes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);

    let user_border = if status == RaceStatus::Won {
        GOOD_COLOR
    } else {
        Color::Reset
    };
    let robot_border = if status == RaceStatus::Lost {
        GOOD_COLOR
    } else {
        Color::Reset
    };

    let mut user_spans = vec![Span::raw(state.user_typed_text.clone())];
    if let Some(c) = state.errored_char {
        user_spans.push(Span::styled(
            match c {
                ' ' => "·".to_string(),
                c => c.to_string(),
            },
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }
    Paragraph::new(Line::from(user_spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(user_border))
                .title("You"),
        )
        .wrap(Wrap { trim: false })
        .render(boxes[0], buf);

    let robot_title = if state.against_best() {
        "Your best"
    } else {
        "Robot"
    };
    Paragraph::new(state.opponent_typed_text.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(robot_border))
                .title(robot_title),
        )
        .wrap(Wrap { trim: false })
        .render(boxes[1], buf);

    let speeds = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[4]);
    let mut user_speed = speed_line(&state.user_speed);
    user_speed
        .spans
        .push(comparison_span(&state.user_speed, &state.opponent_speed));
    if state.handicap_words > 0 {
        user_speed.spans.push(Span::styled(
            format!("  (without head start: {} wpm)", state.handicap_adjusted_wpm),
            Style::default().add_modifier(Modifier::ITALIC),
        ));
    }
    Paragraph::new(user_speed)
        .alignment(Alignment::Center)
        .render(speeds[0], buf);
    Paragraph::new(speed_line(&state.opponent_speed))
        .alignment(Alignment::Center)
        .render(speeds[1], buf);

    let legend = if running {
        Line::from(Span::styled(
            "type the text above / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
    } else {
        menu_line()
    };
    Paragraph::new(legend)
        .alignment(Alignment::Center)
        .render(chunks[6], buf);
}

fn render_question(app: &App, snapshot: &RoundSnapshot, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::from(format!(
            "A head start of {} words is more than the allowed {}.",
            app.round_config.handicap_word_count, snapshot.max_handicap_words
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw(format!(
                "How many words should be typed for you? (0-{}): ",
                snapshot.max_handicap_words
            )),
            Span::styled(
                app.question_input.clone(),
                Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "(enter) confirm / (esc)ape",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_confirm(area: Rect, buf: &mut Buffer) {
    let mut choices = key_hint("o", "race the robot instead");
    choices.extend(key_hint("c", "cancel"));
    let lines = vec![
        Line::from("There is no best result to race against yet."),
        Line::from("Finish a full-minute round first to record one."),
        Line::from(""),
        Line::from(choices),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn results_table<'a>(title: String, results: &'a [DatedResult]) -> Table<'a> {
    let rows = results.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.local_date()).style(Style::default().add_modifier(Modifier::DIM)),
            Cell::from(r.entry.wpm.to_string())
                .style(Style::default().fg(grade_color(grade_wpm(r.entry.wpm)))),
            Cell::from(r.entry.cpm.to_string())
                .style(Style::default().fg(grade_color(grade_cpm(r.entry.cpm)))),
        ])
    });

    Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(6),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["date", "wpm", "cpm"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let view = &app.results_view;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(view.best_summary.as_str())
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    if !app.compact_results {
        let tables = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        Widget::render(
            results_table("Top results".to_string(), &view.top),
            tables[0],
            buf,
        );
        Widget::render(
            results_table(
                format!(
                    "Results sorted by {}",
                    app.results_query.sort_by.describe()
                ),
                &view.sorted,
            ),
            tables[1],
            buf,
        );
    }

    Paragraph::new(Span::styled(
        "(s)ort / (a)ll history / (c)ompact / (y) new round / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::race::{RaceEngine, RoundConfig};
    use crate::results::{ResultEntry, ResultsQuery, ResultsRepository};
    use crate::sentences::FixedSentence;

    fn create_test_app(text: &str, config: RoundConfig) -> (App, ManualClock) {
        let clock = ManualClock::default();
        let engine = RaceEngine::new(
            ResultsRepository::in_memory(),
            Box::new(FixedSentence(text.to_string())),
            Box::new(clock.clone()),
        )
        .with_max_handicap_words(2);
        (App::new(engine, config, ResultsQuery::default()), clock)
    }

    fn render(app: &App) -> String {
        let area = Rect::new(0, 0, 100, 30);
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[test]
    fn paused_screen_shows_challenge() {
        let (app, _clock) = create_test_app("hello world", RoundConfig::default());
        let rendered = render(&app);
        assert!(rendered.contains("TYPING RACE"));
        assert!(rendered.contains("Typer-robot challenges you"));
    }

    #[test]
    fn running_screen_shows_boxes_and_timer() {
        let (mut app, _clock) = create_test_app("hello world", RoundConfig::default());
        app.start_round().unwrap();
        app.engine.type_char('h').unwrap();
        app.engine.tick().unwrap();
        let rendered = render(&app);
        assert!(rendered.contains("Running"));
        assert!(rendered.contains("60s left"));
        assert!(rendered.contains("You"));
        assert!(rendered.contains("Robot"));
        assert!(rendered.contains("hello world"));
    }

    #[test]
    fn user_speed_is_marked_against_the_robot() {
        let (mut app, _clock) = create_test_app("hello world", RoundConfig::default());
        app.start_round().unwrap();
        let rendered = render(&app);
        assert!(rendered.contains("cps: 0 ="));

        let (mut ahead, clock) = create_test_app("hello world", RoundConfig::default());
        ahead.start_round().unwrap();
        clock.advance_ms(1_000);
        for c in "hello".chars() {
            ahead.engine.type_char(c).unwrap();
        }
        ahead.engine.tick().unwrap();
        assert_eq!(ahead.engine.state().opponent_char_count, 2);
        let rendered = render(&ahead);
        assert!(rendered.contains('▲'));
        assert!(!rendered.contains('▼'));

        let (mut behind, clock) = create_test_app("hello world", RoundConfig::default());
        behind.start_round().unwrap();
        clock.advance_ms(1_000);
        behind.engine.tick().unwrap();
        let rendered = render(&behind);
        assert!(rendered.contains('▼'));
        assert!(!rendered.contains('▲'));
    }

    #[test]
    fn won_screen_shows_message() {
        let (mut app, _clock) = create_test_app("hi", RoundConfig::default());
        app.start_round().unwrap();
        app.engine.on_user_input("hi").unwrap();
        let rendered = render(&app);
        assert!(rendered.contains("You won!"));
        assert!(rendered.contains("start a new round"));
    }

    #[test]
    fn question_screen_shows_limit() {
        let config = RoundConfig {
            handicap: true,
            handicap_word_count: 7,
            ..RoundConfig::default()
        };
        let (mut app, _clock) = create_test_app("a b c d e f g h", config);
        app.start_round().unwrap();
        app.question_input.push('1');
        let rendered = render(&app);
        assert!(rendered.contains("more than the allowed 2"));
        assert!(rendered.contains("(0-2): 1"));
    }

    #[test]
    fn confirm_screen_offers_fallback() {
        let config = RoundConfig {
            compete_against_best: true,
            ..RoundConfig::default()
        };
        let (mut app, _clock) = create_test_app("hello", config);
        app.start_round().unwrap();
        let rendered = render(&app);
        assert!(rendered.contains("no best result"));
        assert!(rendered.contains("race the robot instead"));
    }

    #[test]
    fn results_screen_lists_entries() {
        let (mut app, clock) = create_test_app("hello", RoundConfig::default());
        app.engine
            .repository()
            .record_round(
                clock.now(),
                ResultEntry {
                    wpm: 47,
                    cps: 4,
                    cpm: 263,
                    chars: 263,
                    passed_seconds: 60.0,
                    passed_ms: 60_000,
                },
                None,
            )
            .unwrap();
        app.show_results().unwrap();
        let rendered = render(&app);
        assert!(rendered.contains("Top results"));
        assert!(rendered.contains("Results sorted by date (descending)"));
        assert!(rendered.contains("263"));

        app.compact_results = true;
        let compact = render(&app);
        assert!(!compact.contains("Top results"));
        assert!(compact.contains("Best result: 47 wpm, 263 cpm"));
    }
}
