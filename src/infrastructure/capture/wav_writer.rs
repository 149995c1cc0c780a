//! Incremental PCM WAV output via hound
//!
//! The capture thread appends each callback buffer as it arrives, so memory
//! stays flat for long sessions and the data already written survives a
//! crash up to the last flush.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::flac_encoder::{EncodingError, PcmLayout};

/// Quantize a float sample in [-1, 1] to a signed integer of `bits` depth
pub fn quantize(sample: f32, bits: u16) -> i32 {
    let full_scale = ((1i64 << (bits.clamp(8, 32) - 1)) - 1) as f64;
    (f64::from(sample.clamp(-1.0, 1.0)) * full_scale).round() as i32
}

/// Open WAV file receiving interleaved float frames
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    bits_per_sample: u16,
    written: u64,
}

impl WavSink {
    pub fn create(path: &Path, layout: PcmLayout) -> Result<Self, EncodingError> {
        let spec = WavSpec {
            channels: layout.channels,
            sample_rate: layout.sample_rate,
            bits_per_sample: layout.bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        let writer =
            WavWriter::create(path, spec).map_err(|e| EncodingError::Write(e.to_string()))?;
        Ok(Self {
            writer,
            bits_per_sample: layout.bits_per_sample,
            written: 0,
        })
    }

    /// Append interleaved samples at the sink's bit depth.
    pub fn write(&mut self, samples: &[f32]) -> Result<(), EncodingError> {
        for &sample in samples {
            self.writer
                .write_sample(quantize(sample, self.bits_per_sample))
                .map_err(|e| EncodingError::Write(e.to_string()))?;
        }
        self.written += samples.len() as u64;
        Ok(())
    }

    /// Samples written so far, across all channels
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Patch the header lengths and close the file.
    pub fn finalize(self) -> Result<u64, EncodingError> {
        let written = self.written;
        self.writer
            .finalize()
            .map_err(|e| EncodingError::Write(e.to_string()))?;
        Ok(written)
    }
}
