//! FLAC encoder for the lossless output format
//!
//! Samples arrive interleaved and already scaled to the target bit depth.
//! Desktop capture spools to WAV first and transcodes the finished file.

use std::path::Path;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;

/// Layout of the PCM being encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmLayout {
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

/// Encode interleaved PCM samples to FLAC bytes
pub fn encode_to_flac(samples: &[i32], layout: PcmLayout) -> Result<Vec<u8>, EncodingError> {
    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{:?}", e)))?;

    let source = MemSource::from_samples(
        samples,
        layout.channels as usize,
        layout.bits_per_sample as usize,
        layout.sample_rate as usize,
    );

    let flac_stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{:?}", e)))?;

    let mut sink = ByteSink::new();
    flac_stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(e.to_string()))?;

    Ok(sink.into_inner())
}

/// Re-encode a finished integer PCM WAV file as FLAC at `dest`.
pub fn transcode_wav_to_flac(source: &Path, dest: &Path) -> Result<(), EncodingError> {
    let mut reader =
        hound::WavReader::open(source).map_err(|e| EncodingError::Read(e.to_string()))?;
    let spec = reader.spec();
    let layout = PcmLayout {
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        sample_rate: spec.sample_rate,
    };
    let samples = reader
        .samples::<i32>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EncodingError::Read(e.to_string()))?;

    let bytes = encode_to_flac(&samples, layout)?;
    std::fs::write(dest, bytes).map_err(|e| EncodingError::Write(e.to_string()))
}

/// Audio encoding errors
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("FLAC config error: {0}")]
    Config(String),

    #[error("FLAC encoding failed: {0}")]
    Encode(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO_16K: PcmLayout = PcmLayout {
        channels: 1,
        bits_per_sample: 16,
        sample_rate: 16_000,
    };

    #[test]
    fn encode_silence() {
        let silence = vec![0i32; 16_000];
        let flac_data = encode_to_flac(&silence, MONO_16K).unwrap();
        assert!(flac_data.len() > 50);
        assert_eq!(&flac_data[0..4], b"fLaC");
    }

    #[test]
    fn encode_with_signal() {
        let samples: Vec<i32> = (0..16_000)
            .map(|i| {
                let t = i as f32 / 16_000.0;
                (f32::sin(2.0 * std::f32::consts::PI * 440.0 * t) * 16000.0) as i32
            })
            .collect();

        let flac_data = encode_to_flac(&samples, MONO_16K).unwrap();
        // Smaller than raw 16-bit PCM
        assert!(flac_data.len() < samples.len() * 2);
    }

    #[test]
    fn encode_stereo_24_bit() {
        let layout = PcmLayout {
            channels: 2,
            bits_per_sample: 24,
            sample_rate: 48_000,
        };
        let samples = vec![0i32; 4_800 * 2];
        let flac_data = encode_to_flac(&samples, layout).unwrap();
        assert_eq!(&flac_data[0..4], b"fLaC");
    }

    #[test]
    fn transcode_spooled_wav() {
        let dir = tempfile::tempdir().unwrap();
        let spool = dir.path().join("take.part.wav");
        let dest = dir.path().join("take.flac");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&spool, spec).unwrap();
        for i in 0..8_820 {
            writer.write_sample(((i % 100) * 50) as i16).unwrap();
        }
        writer.finalize().unwrap();

        transcode_wav_to_flac(&spool, &dest).unwrap();

        let bytes = std::fs::read(&dest).unwrap();
        assert_eq!(&bytes[0..4], b"fLaC");
    }

    #[test]
    fn transcode_missing_source_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = transcode_wav_to_flac(&dir.path().join("gone.wav"), &dir.path().join("x.flac"))
            .unwrap_err();
        assert!(matches!(err, EncodingError::Read(_)));
    }
}
