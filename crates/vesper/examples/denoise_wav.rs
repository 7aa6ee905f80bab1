//! Run a WAV file through the pipeline and write the cleaned result.
//!
//! The input must hold 16-bit integer or 32-bit float samples. A trailing
//! partial frame is padded with silence.
//!
//! ```sh
//! cargo run -p vesper --features examples --example denoise_wav -- noisy.wav clean.wav --level high
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vesper::config::{
    FixedDigital, GainController2, HighPassFilter, NoiseSuppression, NoiseSuppressionLevel,
};
use vesper::{AudioProcessing, Config, StreamConfig};

mod common;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Level {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl From<Level> for NoiseSuppressionLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => Self::Low,
            Level::Moderate => Self::Moderate,
            Level::High => Self::High,
            Level::VeryHigh => Self::VeryHigh,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Denoise a WAV file with vesper")]
struct Args {
    /// Input WAV file.
    input: PathBuf,

    /// Output WAV file (32-bit float, same rate and channel count).
    output: PathBuf,

    /// Noise suppression level.
    #[arg(short, long, value_enum, default_value_t = Level::Moderate)]
    level: Level,

    /// Disable the high-pass filter.
    #[arg(long)]
    no_hpf: bool,

    /// Fixed gain in dB applied after suppression.
    #[arg(short, long, default_value_t = 0.0)]
    gain_db: f32,
}

fn read_samples(reader: WavReader<BufReader<File>>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("reading float samples"),
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<Result<_, _>>()
            .context("reading 16-bit samples"),
        (format, bits) => bail!("unsupported sample format {format:?} with {bits} bits"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let reader = WavReader::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let spec = reader.spec();
    let stream = StreamConfig::new(spec.sample_rate, spec.channels);
    let samples = read_samples(reader)?;

    let config = Config {
        high_pass_filter: (!args.no_hpf).then(HighPassFilter::default),
        noise_suppression: Some(NoiseSuppression {
            level: args.level.into(),
        }),
        gain_controller2: (args.gain_db != 0.0).then_some(GainController2 {
            fixed_digital: FixedDigital {
                gain_db: args.gain_db,
            },
        }),
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream)
        .build()
        .context("building the pipeline")?;

    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&args.output, out_spec)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let frame_len = stream.num_samples();
    let mut channels = vec![Vec::new(); usize::from(spec.channels)];
    let mut interleaved = Vec::with_capacity(frame_len);
    let mut num_frames = 0usize;
    for chunk in samples.chunks(frame_len) {
        let mut frame = chunk.to_vec();
        frame.resize(frame_len, 0.0);
        common::deinterleave(&frame, &mut channels);

        let mut refs: Vec<&mut [f32]> = channels.iter_mut().map(Vec::as_mut_slice).collect();
        apm.process_capture_f32(&mut refs)?;

        common::interleave(&channels, &mut interleaved);
        for &sample in &interleaved {
            writer.write_sample(sample)?;
        }
        num_frames += 1;
    }
    writer.finalize()?;

    let stats = apm.statistics();
    info!(
        num_frames,
        speech_probability = ?stats.speech_probability,
        output_rms_dbfs = ?stats.output_rms_dbfs,
        "done"
    );
    println!("Wrote {} ({num_frames} frames)", args.output.display());
    Ok(())
}
