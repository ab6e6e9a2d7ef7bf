pub mod error;

use error::EngineError;
use std::io::Cursor;
use tts_queue::{Quality, VoiceAttributes};

const SAMPLE_RATE: u32 = 22_050;
/// Presets from the gateway's `NFE_STEPS` override table: higher refinement
/// for `high`, fewer for `fast`.
const NFE_STEPS_HIGH: u32 = 32;
const NFE_STEPS_FAST: u32 = 16;

#[must_use]
pub const fn default_nfe_steps(quality: Quality) -> u32 {
	match quality {
		Quality::High => NFE_STEPS_HIGH,
		Quality::Fast => NFE_STEPS_FAST,
	}
}

/// A decoded, trimmed reference clip ready to hand to the engine.
#[derive(Debug, Clone)]
pub struct PreparedReference {
	pub samples: Vec<i16>,
	pub sample_rate: u32,
	pub reference_text: String,
}

/// One synthesis call's full input. `nfe_steps` is the engine's internal
/// refinement count, derived from `quality` unless overridden.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
	pub text: &'a str,
	pub voice: &'a VoiceAttributes,
	pub speed: f64,
	pub quality: Quality,
	pub nfe_steps: u32,
	pub reference: Option<&'a PreparedReference>,
}

/// Result of one synthesis call: encoded audio bytes plus the engine's own
/// measurement of the resulting clip's duration.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
	pub audio: Vec<u8>,
	pub audio_duration: f64,
}

/// A loadable, expensive-to-initialize, single-instance speech synthesizer.
/// Not `Sync`: a worker owns exactly one and calls it from a single task,
/// never across concurrent jobs.
pub trait SynthesisEngine {
	/// # Errors
	/// Returns `EngineError::Synthesis` if the underlying model fails on
	/// this input.
	fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesisOutput, EngineError>;
}

/// Decode-and-silence-trim for user-submitted reference audio, producing the
/// canonical form the engine expects.
pub trait ReferencePreprocessor {
	/// # Errors
	/// Returns an error if `raw_bytes` is not a decodable WAV, or the clip
	/// is silent end-to-end.
	fn prepare(&self, raw_bytes: &[u8], reference_text: &str, trim_audio_to: Option<f64>) -> Result<PreparedReference, EngineError>;
}

/// Deterministic stand-in for the real model: a sine wave whose length is
/// derived from the input text and speed, frequency nudged by voice
/// attributes so distinct requests are distinguishable in a waveform
/// viewer. Loading this engine is instant; real engines are not, which is
/// why `SynthesisEngine::synthesize` takes `&self` and nothing async.
#[derive(Debug, Clone, Copy)]
pub struct StubEngine {
	sample_rate: u32,
}

impl Default for StubEngine {
	fn default() -> Self {
		Self { sample_rate: SAMPLE_RATE }
	}
}

impl StubEngine {
	#[must_use]
	pub const fn new(sample_rate: u32) -> Self {
		Self { sample_rate }
	}

	fn base_frequency(voice: &VoiceAttributes) -> f64 {
		let mut freq = match voice.gender {
			Some(tts_queue::Gender::Female) => 220.0,
			Some(tts_queue::Gender::Male) => 130.0,
			None => 175.0,
		};
		if matches!(voice.emotion, Some(tts_queue::Emotion::Happy | tts_queue::Emotion::Surprised)) {
			freq *= 1.15;
		}
		if matches!(voice.emotion, Some(tts_queue::Emotion::Sad | tts_queue::Emotion::Monotone)) {
			freq *= 0.9;
		}
		freq
	}
}

impl SynthesisEngine for StubEngine {
	fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<SynthesisOutput, EngineError> {
		if request.text.trim().is_empty() {
			return Err(EngineError::Synthesis("text is empty".to_string()));
		}

		let chars_per_second = 16.0 * request.speed.max(0.01);
		let duration = (request.text.chars().count() as f64 / chars_per_second).clamp(0.2, 60.0);
		let frequency = Self::base_frequency(request.voice);
		let total_samples = (duration * f64::from(self.sample_rate)) as usize;

		let spec = hound::WavSpec { channels: 1, sample_rate: self.sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
		let mut cursor = Cursor::new(Vec::new());
		{
			let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
			for n in 0..total_samples {
				let t = f64::from(u32::try_from(n).unwrap_or(u32::MAX)) / f64::from(self.sample_rate);
				let amplitude = (t * frequency * std::f64::consts::TAU).sin() * 0.2;
				writer.write_sample((amplitude * f64::from(i16::MAX)) as i16)?;
			}
			writer.finalize()?;
		}

		Ok(SynthesisOutput { audio: cursor.into_inner(), audio_duration: duration })
	}
}

/// Silence threshold below which a sample is considered part of leading or
/// trailing silence, expressed as a fraction of full scale.
const SILENCE_THRESHOLD: f64 = 0.02;

/// `hound`-based WAV decode + silence trim. This is the only format `hound`
/// reads, which matches the engine's own WAV-in/WAV-out contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoundPreprocessor;

impl ReferencePreprocessor for HoundPreprocessor {
	fn prepare(&self, raw_bytes: &[u8], reference_text: &str, trim_audio_to: Option<f64>) -> Result<PreparedReference, EngineError> {
		let mut reader = hound::WavReader::new(Cursor::new(raw_bytes))?;
		let spec = reader.spec();
		let samples: Vec<i16> = match spec.sample_format {
			hound::SampleFormat::Int => reader.samples::<i16>().collect::<Result<_, _>>()?,
			hound::SampleFormat::Float => reader
				.samples::<f32>()
				.map(|s| s.map(|v| (v * f32::from(i16::MAX)) as i16))
				.collect::<Result<_, _>>()?,
		};

		let threshold = (SILENCE_THRESHOLD * f64::from(i16::MAX)) as i16;
		let start = samples.iter().position(|&s| s.abs() > threshold);
		let end = samples.iter().rposition(|&s| s.abs() > threshold);

		let (Some(start), Some(end)) = (start, end) else {
			return Err(EngineError::EmptyAfterTrim);
		};

		let mut trimmed = samples[start..=end].to_vec();

		if let Some(max_secs) = trim_audio_to {
			let max_samples = (max_secs * f64::from(spec.sample_rate)) as usize;
			trimmed.truncate(max_samples.max(1));
		}

		Ok(PreparedReference { samples: trimmed, sample_rate: spec.sample_rate, reference_text: reference_text.to_string() })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn voice() -> VoiceAttributes {
		VoiceAttributes::default()
	}

	#[test]
	fn stub_engine_produces_decodable_wav_of_roughly_expected_duration() {
		let engine = StubEngine::default();
		let voice = voice();
		let request = SynthesisRequest { text: "hello there friend", voice: &voice, speed: 1.0, quality: Quality::High, nfe_steps: default_nfe_steps(Quality::High), reference: None };
		let output = engine.synthesize(&request).unwrap();

		assert!(!output.audio.is_empty());
		assert!(output.audio_duration > 0.0);

		let reader = hound::WavReader::new(Cursor::new(&output.audio)).unwrap();
		assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
	}

	#[test]
	fn stub_engine_rejects_empty_text() {
		let engine = StubEngine::default();
		let voice = voice();
		let request = SynthesisRequest { text: "   ", voice: &voice, speed: 1.0, quality: Quality::Fast, nfe_steps: default_nfe_steps(Quality::Fast), reference: None };
		assert!(engine.synthesize(&request).is_err());
	}

	#[test]
	fn faster_speed_yields_shorter_duration() {
		let engine = StubEngine::default();
		let voice = voice();
		let slow = SynthesisRequest { text: "the quick brown fox jumps", voice: &voice, speed: 0.5, quality: Quality::High, nfe_steps: 32, reference: None };
		let fast = SynthesisRequest { text: "the quick brown fox jumps", voice: &voice, speed: 2.0, quality: Quality::High, nfe_steps: 32, reference: None };
		let slow_out = engine.synthesize(&slow).unwrap();
		let fast_out = engine.synthesize(&fast).unwrap();
		assert!(slow_out.audio_duration > fast_out.audio_duration);
	}

	fn encode_test_wav(samples: &[i16]) -> Vec<u8> {
		let spec = hound::WavSpec { channels: 1, sample_rate: 16_000, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
		let mut cursor = Cursor::new(Vec::new());
		{
			let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
			for &s in samples {
				writer.write_sample(s).unwrap();
			}
			writer.finalize().unwrap();
		}
		cursor.into_inner()
	}

	#[test]
	fn preprocessor_trims_leading_and_trailing_silence() {
		let mut samples = vec![0i16; 100];
		samples.extend(std::iter::repeat(10_000).take(50));
		samples.extend(vec![0i16; 100]);
		let raw = encode_test_wav(&samples);

		let prepared = HoundPreprocessor.prepare(&raw, "hello", None).unwrap();
		assert_eq!(prepared.samples.len(), 50);
		assert_eq!(prepared.reference_text, "hello");
	}

	#[test]
	fn preprocessor_rejects_all_silent_clip() {
		let raw = encode_test_wav(&vec![0i16; 200]);
		assert!(HoundPreprocessor.prepare(&raw, "hello", None).is_err());
	}

	#[test]
	fn preprocessor_truncates_to_trim_audio_to_seconds() {
		let samples = vec![10_000i16; 32_000];
		let raw = encode_test_wav(&samples);
		let prepared = HoundPreprocessor.prepare(&raw, "hello", Some(1.0)).unwrap();
		assert_eq!(prepared.samples.len(), 16_000);
	}
}
