use core::fmt;
use serde::{Deserialize, Serialize};

/// Answer values strictly above this read as "yes".
pub const YES_THRESHOLD: f64 = 0.7;
/// Answer values strictly below this read as "no".
pub const NO_THRESHOLD: f64 = 0.3;
/// Canonical value recorded for a "maybe"/"don't know" answer.
pub const MAYBE_VALUE: f64 = 0.5;

/// Discrete reading of an answer confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    Maybe,
}

impl Answer {
    pub const ALL: [Answer; 3] = [Answer::Yes, Answer::No, Answer::Maybe];

    pub fn classify(value: f64) -> Self {
        if value > YES_THRESHOLD {
            Answer::Yes
        } else if value < NO_THRESHOLD {
            Answer::No
        } else {
            Answer::Maybe
        }
    }

    pub const fn value(self) -> f64 {
        match self {
            Answer::Yes => 1.0,
            Answer::No => 0.0,
            Answer::Maybe => MAYBE_VALUE,
        }
    }

    /// The boolean carried by a definitive answer; `None` for maybe.
    pub const fn definitive(self) -> Option<bool> {
        match self {
            Answer::Yes => Some(true),
            Answer::No => Some(false),
            Answer::Maybe => None,
        }
    }

    pub const fn from_bool(value: bool) -> Self {
        if value { Answer::Yes } else { Answer::No }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
            Answer::Maybe => "maybe",
        }
    }

    /// Parses the loose spellings a player might type at a prompt.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Answer::Yes),
            "n" | "no" => Some(Answer::No),
            "m" | "maybe" | "u" | "unknown" | "?" | "dk" | "don't know" => Some(Answer::Maybe),
            _ => None,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
