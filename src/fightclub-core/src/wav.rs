//! WAV container assembly for raw PCM segments.
//!
//! Segments come back from the speech backend as bare mono 16-bit
//! little-endian samples. They are glued together behind a canonical 44-byte
//! RIFF header.

use std::io::Cursor;

use crate::error::DebateError;

pub const HEADER_LEN: usize = 44;

/// Sample layout shared by every segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::mono16(24_000)
    }
}

impl PcmFormat {
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Largest data chunk a RIFF header can describe (`36 + len` must fit in u32).
pub const MAX_DATA_LEN: u32 = u32::MAX - 36;

/// Concatenate `segments` in order behind a WAV header.
pub fn assemble_wav<S: AsRef<[u8]>>(
    segments: &[S],
    format: PcmFormat,
) -> Result<Vec<u8>, DebateError> {
    let total: usize = segments.iter().map(|s| s.as_ref().len()).sum();
    let data_len = data_len_field(total)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + total);

    bytes.extend_from_slice(&header(format, data_len));
    for segment in segments {
        bytes.extend_from_slice(segment.as_ref());
    }
    Ok(bytes)
}

fn data_len_field(total: usize) -> Result<u32, DebateError> {
    u32::try_from(total)
        .ok()
        .filter(|len| *len <= MAX_DATA_LEN)
        .ok_or_else(|| {
            DebateError::InvalidWav(format!(
                "{total} bytes of audio exceed the WAV limit of {MAX_DATA_LEN}"
            ))
        })
}

fn header(format: PcmFormat, data_len: u32) -> [u8; HEADER_LEN] {
    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&format.channels.to_le_bytes());
    h[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    h[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    h[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_len.to_le_bytes());
    h
}

/// Fields read back out of a canonical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: PcmFormat,
    pub riff_size: u32,
    pub data_len: u32,
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parse the 44-byte header produced by [`assemble_wav`].
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, DebateError> {
    if bytes.len() < HEADER_LEN {
        return Err(DebateError::InvalidWav(format!(
            "expected at least {HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(DebateError::InvalidWav("missing RIFF/WAVE tags".into()));
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err(DebateError::InvalidWav("unexpected chunk layout".into()));
    }
    if le_u16(bytes, 20) != 1 {
        return Err(DebateError::InvalidWav("not PCM".into()));
    }

    Ok(WavHeader {
        format: PcmFormat {
            channels: le_u16(bytes, 22),
            sample_rate: le_u32(bytes, 24),
            bits_per_sample: le_u16(bytes, 34),
        },
        riff_size: le_u32(bytes, 4),
        data_len: le_u32(bytes, 40),
    })
}

/// The sample bytes following the header.
pub fn sample_data(bytes: &[u8]) -> Result<&[u8], DebateError> {
    let header = parse_header(bytes)?;
    let end = HEADER_LEN + header.data_len as usize;
    bytes
        .get(HEADER_LEN..end)
        .ok_or_else(|| DebateError::InvalidWav("data chunk truncated".into()))
}

/// Summary of a finished container, as any WAV reader sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub frames: u32,
    pub duration_secs: f64,
}

/// Read a container back through `hound` to check it plays.
pub fn inspect_wav(bytes: &[u8]) -> Result<WavSummary, DebateError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DebateError::InvalidWav(e.to_string()))?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        frames,
        duration_secs: frames as f64 / spec.sample_rate.max(1) as f64,
    })
}

/// Convert float samples in [-1, 1] to 16-bit little-endian PCM.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes())
        .collect()
}
