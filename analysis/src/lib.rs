pub mod acoustic;
pub mod behavioral;
pub mod engine;
pub mod lexical;
pub mod score;

pub use acoustic::AcousticScorer;
pub use behavioral::BehavioralScorer;
pub use engine::{AnalysisEngine, ScoreError, ScoreSource, TranscriptScorer, WaveformScorer};
pub use lexical::{LexicalReport, LexicalScorer};
pub use score::{aggregate, Recommendation, RiskAssessment, SubScores, HIGH_RISK_THRESHOLD};
