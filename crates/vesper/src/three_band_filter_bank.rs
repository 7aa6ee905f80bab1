//! Three-band QMF filter bank.
//!
//! Splits a 480-sample (48 kHz, 10 ms) frame into three 160-sample bands
//! covering 0–8, 8–16 and 16–24 kHz, and merges them back. The bank is a
//! polyphase implementation: the input is split into three decimated phases,
//! each phase is filtered by up to four sparse FIR filters, and the filter
//! outputs are modulated into the bands by a DCT-like table. Two of the
//! twelve phase/shift combinations have all-zero filters and are skipped.
//!
//! Analysis followed by synthesis reproduces the input delayed by
//! [`ROUND_TRIP_DELAY`] samples. Reconstruction is close to, but not exactly,
//! perfect.

use derive_more::Debug;

/// Number of bands produced by [`ThreeBandFilterBank::analysis`].
pub const NUM_BANDS: usize = 3;
/// Full-band frame size (48 kHz, 10 ms).
pub const FULL_BAND_SIZE: usize = 480;
/// Samples per band (16 kHz, 10 ms).
pub const SPLIT_BAND_SIZE: usize = FULL_BAND_SIZE / NUM_BANDS;
/// Delay, in full-band samples, of analysis followed by synthesis.
pub const ROUND_TRIP_DELAY: usize = 46;

const STRIDE: usize = 4;
const FILTER_SIZE: usize = 4;
const MEMORY_SIZE: usize = FILTER_SIZE * STRIDE - 1;
const NUM_NON_ZERO_FILTERS: usize = STRIDE * NUM_BANDS - 2;

const SQRT_3: f32 = 1.732_050_8;

#[rustfmt::skip]
const FILTER_COEFFS: [[f32; FILTER_SIZE]; NUM_NON_ZERO_FILTERS] = [
    [-0.00047749, -0.00496888,  0.16547118,  0.00425496],
    [-0.00173287, -0.01585778,  0.14989004,  0.00994113],
    [-0.00304815, -0.02536082,  0.12154542,  0.01157993],
    [-0.00346946, -0.02587886,  0.04760441,  0.00607594],
    [-0.00154717, -0.01136076,  0.01387458,  0.00186353],
    [ 0.00186353,  0.01387458, -0.01136076, -0.00154717],
    [ 0.00607594,  0.04760441, -0.02587886, -0.00346946],
    [ 0.00983212,  0.08543175, -0.02982767, -0.00383509],
    [ 0.00994113,  0.14989004, -0.01585778, -0.00173287],
    [ 0.00425496,  0.16547118, -0.00496888, -0.00047749],
];

#[rustfmt::skip]
const DCT_MODULATION: [[f32; NUM_BANDS]; NUM_NON_ZERO_FILTERS] = [
    [ 2.0,     2.0,  2.0   ],
    [ SQRT_3,  0.0, -SQRT_3],
    [ 1.0,    -2.0,  1.0   ],
    [-1.0,     2.0, -1.0   ],
    [-SQRT_3,  0.0,  SQRT_3],
    [-2.0,    -2.0, -2.0   ],
    [-SQRT_3,  0.0,  SQRT_3],
    [-1.0,     2.0, -1.0   ],
    [ 1.0,    -2.0,  1.0   ],
    [ SQRT_3,  0.0, -SQRT_3],
];

/// Maps a phase/shift combination to its non-zero filter, or `None` for the
/// two all-zero filters (indices 3 and 9).
const fn filter_index(phase: usize, shift: usize) -> Option<usize> {
    match phase + shift * NUM_BANDS {
        3 | 9 => None,
        i if i < 3 => Some(i),
        i if i < 9 => Some(i - 1),
        i => Some(i - 2),
    }
}

/// Sparse FIR filter: `out[k] = sum_i x[k - shift - STRIDE * i] * filter[i]`,
/// reading samples before the block from `state`, which then receives the
/// tail of `input`.
fn filter_core(
    filter: &[f32; FILTER_SIZE],
    input: &[f32; SPLIT_BAND_SIZE],
    shift: usize,
    output: &mut [f32; SPLIT_BAND_SIZE],
    state: &mut [f32; MEMORY_SIZE],
) {
    let mut extended = [0.0_f32; MEMORY_SIZE + SPLIT_BAND_SIZE];
    extended[..MEMORY_SIZE].copy_from_slice(state);
    extended[MEMORY_SIZE..].copy_from_slice(input);

    for (k, out) in output.iter_mut().enumerate() {
        let newest = MEMORY_SIZE + k - shift;
        *out = filter
            .iter()
            .enumerate()
            .map(|(i, &c)| extended[newest - STRIDE * i] * c)
            .sum();
    }

    state.copy_from_slice(&input[SPLIT_BAND_SIZE - MEMORY_SIZE..]);
}

/// Three-band analysis/synthesis filter bank for one channel.
#[derive(Debug, Clone)]
pub struct ThreeBandFilterBank {
    #[debug(skip)]
    analysis_state: [[f32; MEMORY_SIZE]; NUM_NON_ZERO_FILTERS],
    #[debug(skip)]
    synthesis_state: [[f32; MEMORY_SIZE]; NUM_NON_ZERO_FILTERS],
}

impl Default for ThreeBandFilterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreeBandFilterBank {
    pub fn new() -> Self {
        Self {
            analysis_state: [[0.0; MEMORY_SIZE]; NUM_NON_ZERO_FILTERS],
            synthesis_state: [[0.0; MEMORY_SIZE]; NUM_NON_ZERO_FILTERS],
        }
    }

    /// Splits a full-band frame of [`FULL_BAND_SIZE`] samples into
    /// [`NUM_BANDS`] bands.
    ///
    /// Every band is overwritten, whatever it held before.
    pub fn analysis(&mut self, input: &[f32], bands: &mut [[f32; SPLIT_BAND_SIZE]; NUM_BANDS]) {
        debug_assert_eq!(input.len(), FULL_BAND_SIZE);
        for band in bands.iter_mut() {
            band.fill(0.0);
        }

        let mut decimated = [0.0_f32; SPLIT_BAND_SIZE];
        let mut filtered = [0.0_f32; SPLIT_BAND_SIZE];
        for phase in 0..NUM_BANDS {
            for (k, d) in decimated.iter_mut().enumerate() {
                *d = input[NUM_BANDS - 1 - phase + NUM_BANDS * k];
            }

            for shift in 0..STRIDE {
                let Some(index) = filter_index(phase, shift) else {
                    continue;
                };
                filter_core(
                    &FILTER_COEFFS[index],
                    &decimated,
                    shift,
                    &mut filtered,
                    &mut self.analysis_state[index],
                );
                for (band, &modulation) in bands.iter_mut().zip(&DCT_MODULATION[index]) {
                    for (b, &f) in band.iter_mut().zip(&filtered) {
                        *b += modulation * f;
                    }
                }
            }
        }
    }

    /// Merges [`NUM_BANDS`] bands into a full-band frame of
    /// [`FULL_BAND_SIZE`] samples.
    pub fn synthesis(&mut self, bands: &[[f32; SPLIT_BAND_SIZE]; NUM_BANDS], output: &mut [f32]) {
        debug_assert_eq!(output.len(), FULL_BAND_SIZE);
        output.fill(0.0);

        let mut modulated = [0.0_f32; SPLIT_BAND_SIZE];
        let mut filtered = [0.0_f32; SPLIT_BAND_SIZE];
        for phase in 0..NUM_BANDS {
            for shift in 0..STRIDE {
                let Some(index) = filter_index(phase, shift) else {
                    continue;
                };

                modulated.fill(0.0);
                for (band, &modulation) in bands.iter().zip(&DCT_MODULATION[index]) {
                    for (m, &b) in modulated.iter_mut().zip(band) {
                        *m += modulation * b;
                    }
                }
                filter_core(
                    &FILTER_COEFFS[index],
                    &modulated,
                    shift,
                    &mut filtered,
                    &mut self.synthesis_state[index],
                );

                // Upsampling by the band count restores the full-band level.
                for (k, &f) in filtered.iter().enumerate() {
                    output[phase + NUM_BANDS * k] += NUM_BANDS as f32 * f;
                }
            }
        }
    }
}
