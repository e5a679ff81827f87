mod frames;
mod outbound;

pub use frames::{AudioFrame, InboundFrame, TranscriptFrame};
pub use outbound::{AnalysisUpdate, ErrorCode, ErrorFrame, ValidationDetail};
