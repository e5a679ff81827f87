#[cfg(test)]
use mockall::automock;

use crate::lexical::LexicalScorer;
use crate::score::{aggregate, RiskAssessment, SubScores};
use crate::{AcousticScorer, BehavioralScorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Lexical,
    Behavioral,
    Acoustic,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Lexical => "lexical",
            ScoreSource::Behavioral => "behavioral",
            ScoreSource::Acoustic => "acoustic",
        }
    }
}

/// Structured failure from a sub-scorer. The engine never propagates these
/// to the protocol loop; they degrade to a neutral score.
#[derive(Debug, thiserror::Error)]
#[error("{} scorer failed: {reason}", origin.as_str())]
pub struct ScoreError {
    pub origin: ScoreSource,
    pub reason: String,
}

impl ScoreError {
    pub fn new(origin: ScoreSource, reason: impl Into<String>) -> Self {
        Self {
            origin,
            reason: reason.into(),
        }
    }
}

/// Sub-scorer over transcript text. Implementations must be deterministic
/// for identical input.
#[cfg_attr(test, automock)]
pub trait TranscriptScorer: Send + Sync {
    fn score(&self, transcript: &str) -> Result<f64, ScoreError>;
}

/// Sub-scorer over a decoded waveform.
#[cfg_attr(test, automock)]
pub trait WaveformScorer: Send + Sync {
    fn score(&self, samples: &[f32]) -> Result<f64, ScoreError>;
}

/// Runs the scorer adapters for a frame and aggregates the result.
///
/// Dispatch matrix: transcript frames get lexical + behavioral scoring;
/// audio frames get acoustic scoring, plus lexical + behavioral when a
/// transcript accompanies the chunk.
pub struct AnalysisEngine {
    lexical: LexicalScorer,
    behavioral: Box<dyn TranscriptScorer>,
    acoustic: Box<dyn WaveformScorer>,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_scorers(
            Box::new(BehavioralScorer),
            Box::new(AcousticScorer::default()),
        )
    }

    pub fn with_scorers(
        behavioral: Box<dyn TranscriptScorer>,
        acoustic: Box<dyn WaveformScorer>,
    ) -> Self {
        Self {
            lexical: LexicalScorer,
            behavioral,
            acoustic,
        }
    }

    pub fn analyze_transcript(&self, transcript: &str) -> RiskAssessment {
        let lexical = self.lexical.analyze(transcript);
        let behavioral = neutral_on_failure(self.behavioral.score(transcript));
        aggregate(
            SubScores::from_sources(lexical.score, 0.0, behavioral),
            lexical.detected_keywords,
        )
    }

    pub fn analyze_audio(&self, samples: &[f32], transcript: Option<&str>) -> RiskAssessment {
        let acoustic = neutral_on_failure(self.acoustic.score(samples));
        let (lexical, behavioral, detected_keywords) = match transcript {
            Some(text) => {
                let report = self.lexical.analyze(text);
                let behavioral = neutral_on_failure(self.behavioral.score(text));
                (report.score, behavioral, report.detected_keywords)
            }
            None => (0.0, 0.0, Vec::new()),
        };
        aggregate(
            SubScores::from_sources(lexical, acoustic, behavioral),
            detected_keywords,
        )
    }
}

fn neutral_on_failure(result: Result<f64, ScoreError>) -> f64 {
    match result {
        Ok(score) => score.clamp(0.0, 1.0),
        Err(e) => {
            tracing::warn!("{e}; degrading to neutral score");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Recommendation;

    fn mock_behavioral(score: f64) -> Box<MockTranscriptScorer> {
        let mut mock = MockTranscriptScorer::new();
        mock.expect_score().returning(move |_| Ok(score));
        Box::new(mock)
    }

    fn mock_acoustic(score: f64) -> Box<MockWaveformScorer> {
        let mut mock = MockWaveformScorer::new();
        mock.expect_score().returning(move |_| Ok(score));
        Box::new(mock)
    }

    #[test]
    fn transcript_path_leaves_acoustic_neutral() {
        let engine = AnalysisEngine::with_scorers(mock_behavioral(0.5), mock_acoustic(0.9));
        let assessment =
            engine.analyze_transcript("Please wire transfer money urgently to this account");
        // lexical 0.25, acoustic 0, behavioral 0.5, semantic 0.2
        assert_eq!(assessment.sub_scores.acoustic, 0.0);
        let expected = 0.2 * 0.25 + 0.3 * 0.5 + 0.2 * 0.2;
        assert!((assessment.risk_score - expected).abs() < 1e-9);
        assert!(assessment
            .detected_keywords
            .contains(&"wire transfer".to_string()));
    }

    #[test]
    fn audio_without_transcript_scores_acoustic_only() {
        let engine = AnalysisEngine::with_scorers(mock_behavioral(0.8), mock_acoustic(0.6));
        let assessment = engine.analyze_audio(&[0.1, -0.1, 0.2], None);
        assert!((assessment.risk_score - 0.3 * 0.6).abs() < 1e-9);
        assert!(assessment.detected_keywords.is_empty());
    }

    #[test]
    fn audio_with_transcript_runs_all_sources() {
        let engine = AnalysisEngine::with_scorers(mock_behavioral(0.4), mock_acoustic(0.5));
        let assessment = engine.analyze_audio(&[0.1, -0.1], Some("urgent wire transfer"));
        // lexical 0.25 (two keywords + one "urgent" mention)
        let expected = 0.2 * 0.25 + 0.3 * 0.5 + 0.3 * 0.4 + 0.2 * (0.25 * 0.8);
        assert!((assessment.risk_score - expected).abs() < 1e-9);
    }

    #[test]
    fn scorer_failure_degrades_to_neutral() {
        let mut behavioral = MockTranscriptScorer::new();
        behavioral
            .expect_score()
            .returning(|_| Err(ScoreError::new(ScoreSource::Behavioral, "model offline")));
        let engine = AnalysisEngine::with_scorers(Box::new(behavioral), mock_acoustic(0.0));

        let assessment = engine.analyze_transcript("a calm sentence");
        assert_eq!(assessment.sub_scores.behavioral, 0.0);
        assert_eq!(assessment.recommendation, Recommendation::Low);
    }

    #[test]
    fn out_of_range_scorer_output_is_clamped() {
        let engine = AnalysisEngine::with_scorers(mock_behavioral(7.0), mock_acoustic(0.0));
        let assessment = engine.analyze_transcript("hello");
        assert_eq!(assessment.sub_scores.behavioral, 1.0);
        assert!(assessment.risk_score <= 1.0);
    }

    #[test]
    fn default_engine_keeps_risk_in_unit_interval() {
        let engine = AnalysisEngine::new();
        for text in [
            "",
            "hello there",
            "URGENT wire transfer, act now, do not tell anyone!!!",
        ] {
            let assessment = engine.analyze_transcript(text);
            assert!((0.0..=1.0).contains(&assessment.risk_score));
        }
    }
}
