use serde::Deserialize;

/// One inbound frame, decoded from a single text message on the stream.
///
/// The union is untagged: the audio shape is tried first so that a frame
/// carrying both `audio_data` and `transcript` dispatches as audio with an
/// accompanying transcript. Payloads that match neither shape are reported
/// to the client as `invalid_data_format`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Audio(AudioFrame),
    Transcript(TranscriptFrame),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptFrame {
    pub transcript: String,
}

/// Audio chunk encoded as base64 PCM16-LE, with an optional transcript of
/// the same span of speech.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioFrame {
    pub audio_data: String,
    #[serde(default)]
    pub transcript: Option<String>,
}
