use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;

static SENTENCE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/sentences");

/// Supplies the text for a round.
pub trait SentenceProvider {
    /// A sentence for `topic`, or from any topic when `topic` is `None` or
    /// unknown.
    fn sentence(&self, topic: Option<&str>) -> String;
}

#[derive(Deserialize, Clone, Debug)]
pub struct Suite {
    pub topic: String,
    pub sentences: Vec<String>,
}

/// Sentences bundled with the binary, grouped by topic.
#[derive(Clone, Debug)]
pub struct Corpus {
    suites: Vec<Suite>,
}

impl Corpus {
    pub fn embedded() -> Self {
        let suites = SENTENCE_DIR
            .files()
            .filter(|f| f.path().extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|f| f.contents_utf8())
            .filter_map(|contents| match serde_json::from_str::<Suite>(contents) {
                Ok(suite) => Some(suite),
                Err(e) => {
                    log::warn!("skipping unreadable sentence suite: {e}");
                    None
                }
            })
            .collect();
        Self { suites }
    }

    pub fn from_suites(suites: Vec<Suite>) -> Self {
        Self { suites }
    }

    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.suites.iter().map(|s| s.topic.as_str()).collect();
        topics.sort_unstable();
        topics
    }

    pub fn sentences(&self, topic: Option<&str>) -> Vec<&str> {
        let matching: Vec<&Suite> = match topic {
            Some(t) if self.suites.iter().any(|s| s.topic.eq_ignore_ascii_case(t)) => self
                .suites
                .iter()
                .filter(|s| s.topic.eq_ignore_ascii_case(t))
                .collect(),
            _ => self.suites.iter().collect(),
        };
        matching
            .into_iter()
            .flat_map(|s| s.sentences.iter().map(String::as_str))
            .collect()
    }
}

impl SentenceProvider for Corpus {
    fn sentence(&self, topic: Option<&str>) -> String {
        let rng = &mut rand::thread_rng();
        self.sentences(topic)
            .choose(rng)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

/// Always hands out the same text.
#[derive(Clone, Debug)]
pub struct FixedSentence(pub String);

impl SentenceProvider for FixedSentence {
    fn sentence(&self, _topic: Option<&str>) -> String {
        self.0.clone()
    }
}

/// Leading part of `sentence` covering its first `words` words, including the
/// space after the last one.
pub fn head_start(sentence: &str, words: usize) -> &str {
    if words == 0 {
        return "";
    }
    let mut seen = 0;
    for (idx, c) in sentence.char_indices() {
        if c == ' ' {
            seen += 1;
            if seen == words {
                return &sentence[..idx + 1];
            }
        }
    }
    sentence
}

pub fn word_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}
