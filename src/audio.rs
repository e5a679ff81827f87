use base64::Engine;

/// Failure to turn a transport payload into a waveform; reported to the
/// client as `invalid_audio_data`.
#[derive(Debug, thiserror::Error)]
pub enum AudioDecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload of {0} bytes is not a whole number of 16-bit samples")]
    Truncated(usize),
}

/// Decodes a base64 PCM16-LE payload into normalized f32 samples.
pub fn decode_pcm16(payload: &str) -> Result<Vec<f32>, AudioDecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    if bytes.len() % 2 != 0 {
        return Err(AudioDecodeError::Truncated(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| {
            let v = i16::from_le_bytes([chunk[0], chunk[1]]);
            (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
        })
        .collect())
}

/// Inverse of [`decode_pcm16`], used by clients producing audio frames.
pub fn encode_pcm16(samples: &[f32]) -> String {
    let pcm16: Vec<u8> = samples
        .iter()
        .flat_map(|&sample| {
            ((sample * i16::MAX as f32) as i16)
                .clamp(i16::MIN, i16::MAX)
                .to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}
