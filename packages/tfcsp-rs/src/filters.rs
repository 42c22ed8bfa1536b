//! Butterworth band-pass filtering
//!
//! Filters are cascades of second-order sections (biquads) designed by the
//! bilinear transform. Epoch data is filtered forward and backward, which
//! doubles the attenuation and cancels the phase shift.

use crate::error::{DecodingError, Result};
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Second-order section coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Cascaded second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct SosFilter {
    sections: Vec<BiquadCoeffs>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    /// Causal pass through every section (Direct Form II Transposed)
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = signal.to_vec();
        for s in &self.sections {
            let (mut z1, mut z2) = (0.0, 0.0);
            for x in out.iter_mut() {
                let input = *x;
                let y = s.b0 * input + z1;
                z1 = s.b1 * input - s.a1 * y + z2;
                z2 = s.b2 * input - s.a2 * y;
                *x = y;
            }
        }
        out
    }

    /// Zero-phase forward-backward filtering with odd reflection padding
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }
        let pad = (6 * self.sections.len()).min(n - 1);
        let first = signal[0];
        let last = signal[n - 1];

        let mut padded = Vec::with_capacity(n + 2 * pad);
        padded.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        padded.extend_from_slice(signal);
        padded.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let mut forward = self.filter(&padded);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();
        backward[pad..pad + n].to_vec()
    }

    /// Filter every row (channel) of a channels x times matrix
    pub fn filtfilt_rows(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(data.nrows(), data.ncols());
        for r in 0..data.nrows() {
            let row: Vec<f64> = data.row(r).iter().copied().collect();
            for (c, v) in self.filtfilt(&row).into_iter().enumerate() {
                out[(r, c)] = v;
            }
        }
        out
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        SosFilter::new(Self::design(Self::prewarp(cutoff, sample_rate), order, false))
    }

    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        SosFilter::new(Self::design(Self::prewarp(cutoff, sample_rate), order, true))
    }

    /// Highpass at `low` cascaded with lowpass at `high`.
    ///
    /// A `low` of zero leaves only the lowpass stage.
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> Result<SosFilter> {
        let nyquist = sample_rate / 2.0;
        if order == 0 {
            return Err(DecodingError::InvalidParameter(
                "filter order must be at least 1".to_string(),
            ));
        }
        if !(low >= 0.0 && low < high) {
            return Err(DecodingError::InvalidParameter(format!(
                "band-pass edges must satisfy 0 <= low < high, got {}-{} Hz",
                low, high
            )));
        }
        if high >= nyquist {
            return Err(DecodingError::InvalidParameter(format!(
                "High cutoff ({} Hz) must be less than Nyquist ({} Hz)",
                high, nyquist
            )));
        }
        let mut sections = Vec::new();
        if low > 0.0 {
            sections.extend(Self::highpass(low, sample_rate, order).sections);
        }
        sections.extend(Self::lowpass(high, sample_rate, order).sections);
        Ok(SosFilter::new(sections))
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    /// Analog poles sit at angle theta_k from the imaginary axis; each
    /// conjugate pair becomes s^2 + 2 sin(theta_k) wn s + wn^2.
    fn design(wn: f64, order: usize, highpass: bool) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);
        let wn2 = wn * wn;

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                // First-order section for the real pole
                let a1 = (wn - 1.0) / (wn + 1.0);
                let coeffs = if highpass {
                    let g = 1.0 / (1.0 + wn);
                    BiquadCoeffs { b0: g, b1: -g, b2: 0.0, a1, a2: 0.0 }
                } else {
                    let g = wn / (1.0 + wn);
                    BiquadCoeffs { b0: g, b1: g, b2: 0.0, a1, a2: 0.0 }
                };
                sections.push(coeffs);
                continue;
            }

            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
            let damping = 2.0 * theta.sin();
            let a0 = 1.0 + damping * wn + wn2;
            let a1 = 2.0 * (wn2 - 1.0) / a0;
            let a2 = (1.0 - damping * wn + wn2) / a0;

            let coeffs = if highpass {
                BiquadCoeffs {
                    b0: 1.0 / a0,
                    b1: -2.0 / a0,
                    b2: 1.0 / a0,
                    a1,
                    a2,
                }
            } else {
                BiquadCoeffs {
                    b0: wn2 / a0,
                    b1: 2.0 * wn2 / a0,
                    b2: wn2 / a0,
                    a1,
                    a2,
                }
            };
            sections.push(coeffs);
        }

        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let filter = ButterworthFilter::lowpass(10.0, 100.0, 4);
        let out = filter.filter(&vec![1.0; 400]);
        assert!((out[399] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_bandpass_keeps_in_band_and_rejects_out_of_band() {
        let fs = 200.0;
        let filter = ButterworthFilter::bandpass(8.0, 12.0, fs, 4).unwrap();

        let inside = sine(10.0, fs, 2000);
        let out = filter.filtfilt(&inside);
        let mid = &out[500..1500];
        // Both edges sit close to 10 Hz, so the doubled attenuation is visible
        assert!(rms(mid) > 0.35, "in-band rms {}", rms(mid));

        let outside = sine(40.0, fs, 2000);
        let out = filter.filtfilt(&outside);
        assert!(rms(&out[500..1500]) < 0.01);
    }

    #[test]
    fn test_filtfilt_has_no_phase_lag() {
        let fs = 250.0;
        let filter = ButterworthFilter::bandpass(5.0, 20.0, fs, 4).unwrap();
        let x = sine(10.0, fs, 2500);
        let y = filter.filtfilt(&x);
        // Peak cross-correlation at zero lag
        let corr = |lag: usize| -> f64 { (500..2000).map(|i| x[i] * y[i + lag]).sum() };
        assert!(corr(0) > corr(3));
        assert!(corr(0) > 0.0);
    }

    #[test]
    fn test_bandpass_validation() {
        assert!(ButterworthFilter::bandpass(8.0, 60.0, 100.0, 4).is_err());
        assert!(ButterworthFilter::bandpass(12.0, 8.0, 100.0, 4).is_err());
        assert!(ButterworthFilter::bandpass(8.0, 12.0, 100.0, 0).is_err());
        let lowpass_only = ButterworthFilter::bandpass(0.0, 12.0, 100.0, 4).unwrap();
        assert_eq!(lowpass_only.sections().len(), 2);
    }

    #[test]
    fn test_odd_order_adds_first_order_section() {
        let filter = ButterworthFilter::highpass(1.0, 100.0, 3);
        assert_eq!(filter.sections().len(), 2);
        assert_eq!(filter.sections()[1].a2, 0.0);
    }
}
