//! Heuristic content-risk classification (RF-14).
//!
//! Scores a script and its image set into a coarse risk level used to bias
//! backend selection. Deterministic and side-effect free; runs before
//! selection on every request. These are pattern heuristics, not
//! guarantees.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Risk level
// ---------------------------------------------------------------------------

/// Coarse content risk, embedded in job metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Heuristic constants
// ---------------------------------------------------------------------------

/// Keywords indicating fine motor detail the cheaper backends render badly.
const FINE_MOTOR_KEYWORDS: &[&str] = &[
    "hand", "hands", "finger", "fingers", "gesture", "gestures", "pointing",
    "typing", "grips", "holding",
];

/// Keywords indicating the viewer must be able to read something.
const LEGIBILITY_KEYWORDS: &[&str] = &[
    "read", "reads", "reading", "sign", "signs", "caption", "captions",
    "screen", "label", "labels", "subtitle",
];

/// Distinct text-overlay markers at or above which a script is high risk.
pub const TEXT_OVERLAY_MARKER_THRESHOLD: usize = 4;

/// Word count above which pacing drift makes a script medium risk.
pub const LONG_SCRIPT_WORD_THRESHOLD: usize = 120;

/// Image count at or above which still-image pacing is medium risk.
pub const MANY_IMAGES_THRESHOLD: usize = 7;

/// Matches inline text-overlay markers: bracketed cues like `[SALE TODAY]`
/// and labeled cues like `overlay: ...` / `on-screen text: ...`.
fn overlay_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\[[^\]\n]{2,60}\]|(?:overlay|on[- ]screen text|title card|text cue)\s*:")
            .unwrap()
    })
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Count distinct text-overlay markers in a script.
pub fn count_overlay_markers(script: &str) -> usize {
    let mut distinct: HashSet<String> = HashSet::new();
    for m in overlay_marker_regex().find_iter(script) {
        distinct.insert(m.as_str().to_lowercase());
    }
    distinct.len()
}

fn contains_keyword(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|w| keywords.contains(&w.as_str()))
}

/// Classify a script and image set into a risk level.
///
/// - High: fine-motor keywords, or at least
///   [`TEXT_OVERLAY_MARKER_THRESHOLD`] distinct overlay markers.
/// - Medium: legibility keywords, a word count over
///   [`LONG_SCRIPT_WORD_THRESHOLD`], or [`MANY_IMAGES_THRESHOLD`]+ images.
/// - Low: everything else.
pub fn classify(script: &str, image_count: usize) -> RiskLevel {
    let words: Vec<String> = script
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    if contains_keyword(&words, FINE_MOTOR_KEYWORDS)
        || count_overlay_markers(script) >= TEXT_OVERLAY_MARKER_THRESHOLD
    {
        return RiskLevel::High;
    }

    if contains_keyword(&words, LEGIBILITY_KEYWORDS)
        || words.len() > LONG_SCRIPT_WORD_THRESHOLD
        || image_count >= MANY_IMAGES_THRESHOLD
    {
        return RiskLevel::Medium;
    }

    RiskLevel::Low
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
