use std::collections::HashMap;

use crate::engine::{ScoreError, TranscriptScorer};

const WEIGHT_REPETITION: f64 = 0.25;
const WEIGHT_SCRIPT: f64 = 0.25;
const WEIGHT_MANIPULATION: f64 = 0.3;
const WEIGHT_AGITATION: f64 = 0.2;

/// Openers typical of rehearsed cold-call scripts.
const SCRIPT_PHRASES: &[&str] = &[
    "my name is",
    "i'm calling from",
    "this is regarding",
    "i need to verify",
    "please hold while",
];

/// Manipulation cues, grouped by tactic. Each group that fires contributes
/// one indicator, mirroring a presence/absence vote across tactics.
const PRESSURE_CUES: &[&str] = &["act now", "right away", "immediately", "last chance"];
const SECRECY_CUES: &[&str] = &["do not tell", "don't tell", "keep this between"];
const VERIFY_CUES: &[&str] = &["verify your identity", "confirm your", "for verification"];
const THREAT_CUES: &[&str] = &["will be suspended", "legal action", "final notice"];

/// Heuristic detection of manipulative delivery patterns in transcript
/// text: phrase repetition, scripted openings, pressure tactics, and
/// agitated delivery.
#[derive(Debug, Default)]
pub struct BehavioralScorer;

impl BehavioralScorer {
    /// Share of the most-repeated three-word phrase, scaled so that even a
    /// few exact repeats in a short segment stand out.
    fn repetition_score(&self, lower: &str) -> f64 {
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() < 3 {
            return 0.0;
        }
        let mut counts: HashMap<&[&str], usize> = HashMap::new();
        for phrase in words.windows(3) {
            *counts.entry(phrase).or_insert(0) += 1;
        }
        let total = words.len() - 2;
        let max_repetition = counts.values().copied().max().unwrap_or(1);
        if max_repetition < 2 {
            return 0.0;
        }
        ((max_repetition as f64 / total as f64) * 10.0).min(1.0)
    }

    fn script_score(&self, lower: &str) -> f64 {
        let hits = SCRIPT_PHRASES.iter().filter(|p| lower.contains(*p)).count();
        (hits as f64 / 3.0).min(1.0)
    }

    fn manipulation_score(&self, lower: &str) -> f64 {
        let groups: [&[&str]; 4] = [PRESSURE_CUES, SECRECY_CUES, VERIFY_CUES, THREAT_CUES];
        let fired = groups
            .iter()
            .filter(|cues| cues.iter().any(|c| lower.contains(c)))
            .count();
        fired as f64 / groups.len() as f64
    }

    /// Textual stand-in for the pacing anomaly: shouting or stacked
    /// exclamation marks read as agitated, non-conversational delivery.
    fn agitation_score(&self, transcript: &str) -> f64 {
        let letters: Vec<char> = transcript.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() {
            return 0.0;
        }
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        let caps_ratio = upper as f64 / letters.len() as f64;
        let exclamations = transcript.matches('!').count();
        if caps_ratio > 0.3 || exclamations >= 3 {
            1.0
        } else {
            0.0
        }
    }
}

impl TranscriptScorer for BehavioralScorer {
    fn score(&self, transcript: &str) -> Result<f64, ScoreError> {
        if transcript.trim().is_empty() {
            return Ok(0.0);
        }
        let lower = transcript.to_lowercase();
        let score = WEIGHT_REPETITION * self.repetition_score(&lower)
            + WEIGHT_SCRIPT * self.script_score(&lower)
            + WEIGHT_MANIPULATION * self.manipulation_score(&lower)
            + WEIGHT_AGITATION * self.agitation_score(transcript);
        Ok(score.clamp(0.0, 1.0))
    }
}
