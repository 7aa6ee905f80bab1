//! Cascaded biquad (IIR) filter in direct form 1.

/// Coefficients for one second-order section.
///
/// The transfer function is
/// `(b0 + b1 z^-1 + b2 z^-2) / (1 + a0 z^-1 + a1 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiQuadCoefficients {
    pub b: [f32; 3],
    pub a: [f32; 2],
}

#[derive(Debug, Clone)]
struct BiQuad {
    coefficients: BiQuadCoefficients,
    x: [f32; 2],
    y: [f32; 2],
}

impl BiQuad {
    fn new(coefficients: BiQuadCoefficients) -> Self {
        Self {
            coefficients,
            x: [0.0; 2],
            y: [0.0; 2],
        }
    }

    fn process_in_place(&mut self, data: &mut [f32]) {
        let [b0, b1, b2] = self.coefficients.b;
        let [a0, a1] = self.coefficients.a;
        let [mut x0, mut x1] = self.x;
        let [mut y0, mut y1] = self.y;
        for v in data.iter_mut() {
            let input = *v;
            let output = b0 * input + b1 * x0 + b2 * x1 - a0 * y0 - a1 * y1;
            x1 = x0;
            x0 = input;
            y1 = y0;
            y0 = output;
            *v = output;
        }
        self.x = [x0, x1];
        self.y = [y0, y1];
    }
}

/// A chain of second-order sections applied in series.
#[derive(Debug, Clone)]
pub struct CascadedBiQuadFilter {
    biquads: Vec<BiQuad>,
}

impl CascadedBiQuadFilter {
    pub fn new(coefficients: &[BiQuadCoefficients]) -> Self {
        Self {
            biquads: coefficients.iter().copied().map(BiQuad::new).collect(),
        }
    }

    /// Filters `data` through every section, carrying state across calls.
    pub fn process_in_place(&mut self, data: &mut [f32]) {
        for biquad in &mut self.biquads {
            biquad.process_in_place(data);
        }
    }

    /// Filters `x` into `y`.
    pub fn process(&mut self, x: &[f32], y: &mut [f32]) {
        y.copy_from_slice(x);
        self.process_in_place(y);
    }

    /// Clears the filter history.
    pub fn reset(&mut self) {
        for biquad in &mut self.biquads {
            biquad.x = [0.0; 2];
            biquad.y = [0.0; 2];
        }
    }

    pub fn num_sections(&self) -> usize {
        self.biquads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: BiQuadCoefficients = BiQuadCoefficients {
        b: [1.0, 0.0, 0.0],
        a: [0.0, 0.0],
    };

    // Two-sample differentiator: y[n] = x[n] - x[n-1].
    const DIFFERENTIATOR: BiQuadCoefficients = BiQuadCoefficients {
        b: [1.0, -1.0, 0.0],
        a: [0.0, 0.0],
    };

    #[test]
    fn identity_passes_signal_through() {
        let mut filter = CascadedBiQuadFilter::new(&[IDENTITY, IDENTITY]);
        let mut data = [1.0, -2.0, 3.5, 0.25];
        filter.process_in_place(&mut data);
        assert_eq!(data, [1.0, -2.0, 3.5, 0.25]);
    }

    #[test]
    fn state_carries_across_blocks() {
        let mut filter = CascadedBiQuadFilter::new(&[DIFFERENTIATOR]);
        let mut first = [1.0, 2.0];
        filter.process_in_place(&mut first);
        assert_eq!(first, [1.0, 1.0]);

        let mut second = [2.0, 5.0];
        filter.process_in_place(&mut second);
        assert_eq!(second, [0.0, 3.0]);
    }

    #[test]
    fn reset_clears_history() {
        let mut filter = CascadedBiQuadFilter::new(&[DIFFERENTIATOR]);
        let mut block = [4.0, 4.0];
        filter.process_in_place(&mut block);
        filter.reset();
        let mut after = [4.0];
        filter.process_in_place(&mut after);
        assert_eq!(after, [4.0]);
    }

    #[test]
    fn separate_output_matches_in_place() {
        let mut a = CascadedBiQuadFilter::new(&[DIFFERENTIATOR, DIFFERENTIATOR]);
        let mut b = a.clone();
        let x = [0.5, -1.0, 2.0, 3.0];
        let mut y = [0.0; 4];
        a.process(&x, &mut y);
        let mut z = x;
        b.process_in_place(&mut z);
        assert_eq!(y, z);
        assert_eq!(a.num_sections(), 2);
    }
}
