//! Helpers shared by the examples.

/// Splits an interleaved buffer into per-channel vectors.
///
/// ```text
/// [L0, R0, L1, R1]  ->  [[L0, L1], [R0, R1]]
/// ```
pub(crate) fn deinterleave(src: &[f32], dst: &mut [Vec<f32>]) {
    let num_channels = dst.len();
    let num_samples = src.len() / num_channels;
    for ch in dst.iter_mut() {
        ch.clear();
        ch.resize(num_samples, 0.0);
    }
    for (i, &sample) in src.iter().enumerate() {
        dst[i % num_channels][i / num_channels] = sample;
    }
}

/// Joins per-channel vectors into one interleaved buffer.
pub(crate) fn interleave(src: &[Vec<f32>], dst: &mut Vec<f32>) {
    let num_channels = src.len();
    let num_samples = src.first().map_or(0, Vec::len);
    dst.clear();
    dst.resize(num_channels * num_samples, 0.0);
    for (ch, channel) in src.iter().enumerate() {
        for (s, &sample) in channel.iter().enumerate() {
            dst[s * num_channels + ch] = sample;
        }
    }
}
