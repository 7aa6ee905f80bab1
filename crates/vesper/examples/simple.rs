//! Minimal capture pipeline demo.
//!
//! Feeds a synthetic loudspeaker signal and a microphone signal that picks up
//! part of it through the pipeline with echo control and noise suppression,
//! then prints the statistics of the last frame.
//!
//! ```sh
//! cargo run -p vesper --example simple
//! ```

use vesper::config::{EchoCanceller, NoiseSuppression};
use vesper::{AudioProcessing, Config, StreamConfig};

fn main() -> Result<(), vesper::Error> {
    let stream_config = StreamConfig::new(48_000, 2);
    let num_frames = stream_config.num_frames();

    let config = Config {
        echo_canceller: Some(EchoCanceller::default()),
        noise_suppression: Some(NoiseSuppression::default()),
        ..Default::default()
    };
    let mut apm = AudioProcessing::builder()
        .config(config)
        .capture_config(stream_config)
        .render_config(stream_config)
        .build()?;

    for frame_index in 0..100 {
        let (mut render_l, mut render_r, mut capture_l, mut capture_r) =
            sample_stereo_frames(frame_index * num_frames, num_frames);

        // Render frames are passed through unchanged apart from format conversion.
        apm.process_render_f32(&mut [&mut render_l, &mut render_r])?;
        apm.process_capture_f32(&mut [&mut capture_l, &mut capture_r])?;
    }

    let stats = apm.statistics();
    println!("output level: {:?} dBFS", stats.output_rms_dbfs);
    println!("speech probability: {:?}", stats.speech_probability);
    println!(
        "echo return loss enhancement: {:?} dB",
        stats.echo_return_loss_enhancement
    );
    Ok(())
}

/// One frame of loudspeaker output and of a microphone that hears it.
fn sample_stereo_frames(
    offset: usize,
    num_frames: usize,
) -> (Vec<f32>, Vec<f32>, Vec<f32>, Vec<f32>) {
    let mut render_l = vec![0.0f32; num_frames];
    let mut render_r = vec![0.0f32; num_frames];
    let mut capture_l = vec![0.0f32; num_frames];
    let mut capture_r = vec![0.0f32; num_frames];

    for i in 0..num_frames {
        let t = (offset + i) as f32;
        render_l[i] = (t / 40.0).cos() * 0.4;
        render_r[i] = (t / 40.0).cos() * 0.2;
        capture_l[i] = (t / 20.0).sin() * 0.4 + render_l[i] * 0.2;
        capture_r[i] = (t / 20.0).sin() * 0.2 + render_r[i] * 0.2;
    }

    (render_l, render_r, capture_l, capture_r)
}
