//! Windowed rPPG heartbeat estimation.
//!
//! A photo, screen replay, or injected feed can imitate texture and motion
//! but cannot manufacture the periodic green-channel oscillation that blood
//! flow produces in live skin. The estimator buffers a per-session signal
//! window, band-limits it to the plausible cardiac band, and accepts a rate
//! only when the spectral peak is both physiologically plausible and clearly
//! above the in-band noise floor.

use std::collections::VecDeque;
use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::PipelineConfig;
use crate::signal::SignalWindow;

/// Outcome of one heartbeat estimate.
///
/// `Collecting` (window not yet full enough) is deliberately distinct from
/// `Rejected` (enough data, no credible pulse): only the latter is evidence
/// of a spoof.
#[derive(Debug, Clone, PartialEq)]
pub enum HeartbeatReading {
    Collecting {
        percent: f64,
        collected: usize,
        needed: usize,
    },
    Rejected {
        bpm: f64,
        snr: f64,
        quality: f64,
    },
    Detected {
        bpm: f64,
        snr: f64,
        quality: f64,
        confidence: f64,
    },
}

impl HeartbeatReading {
    pub fn is_rejected(&self) -> bool {
        matches!(self, HeartbeatReading::Rejected { .. })
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, HeartbeatReading::Detected { .. })
    }

    pub fn detail(&self) -> serde_json::Value {
        match self {
            HeartbeatReading::Collecting {
                percent,
                collected,
                needed,
            } => serde_json::json!({
                "status": "collecting",
                "progress": percent,
                "frames_collected": collected,
                "frames_needed": needed,
            }),
            HeartbeatReading::Rejected { bpm, snr, quality } => serde_json::json!({
                "status": "rejected",
                "bpm": bpm,
                "snr": snr,
                "quality": quality,
            }),
            HeartbeatReading::Detected {
                bpm,
                snr,
                quality,
                confidence,
            } => serde_json::json!({
                "status": "detected",
                "bpm": bpm,
                "snr": snr,
                "quality": quality,
                "confidence": confidence,
            }),
        }
    }
}

/// Per-session heartbeat estimator: signal window plus a short history of
/// accepted rates for median smoothing.
#[derive(Debug)]
pub struct HeartbeatEstimator {
    window: SignalWindow,
    bpm_history: VecDeque<f64>,
    sample_rate_hz: f64,
    min_samples: usize,
    band_low_hz: f64,
    band_high_hz: f64,
    bpm_min: f64,
    bpm_max: f64,
    snr_threshold: f64,
    history_depth: usize,
}

impl HeartbeatEstimator {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            window: SignalWindow::new(config.window_capacity()),
            bpm_history: VecDeque::with_capacity(config.bpm_history),
            sample_rate_hz: config.sample_rate_hz,
            min_samples: config.min_samples(),
            band_low_hz: config.band_low_hz,
            band_high_hz: config.band_high_hz,
            bpm_min: config.bpm_min,
            bpm_max: config.bpm_max,
            snr_threshold: config.snr_threshold,
            history_depth: config.bpm_history.max(1),
        }
    }

    /// Feed one sample (forehead green-channel mean) with its timestamp.
    pub fn push(&mut self, sample: f64, timestamp: f64) {
        self.window.push(sample, timestamp);
    }

    pub fn samples_collected(&self) -> usize {
        self.window.len()
    }

    /// Clear all buffered signal and history (subject switch).
    pub fn reset(&mut self) {
        self.window.clear();
        self.bpm_history.clear();
    }

    /// Estimate the current heart rate from the buffered window.
    ///
    /// Pure with respect to the accumulated samples except for the accepted-
    /// rate history: two estimators fed identical sample sequences produce
    /// identical readings.
    pub fn estimate(&mut self) -> HeartbeatReading {
        let collected = self.window.len();
        if collected < self.min_samples {
            return HeartbeatReading::Collecting {
                percent: collected as f64 / self.min_samples as f64 * 100.0,
                collected,
                needed: self.min_samples,
            };
        }

        let raw = self.window.values();
        let detrended = detrend(&raw);
        let filtered = bandpass_zero_phase(
            &detrended,
            self.sample_rate_hz,
            self.band_low_hz,
            self.band_high_hz,
        );
        let quality = signal_quality(&filtered);

        let (bpm, snr) = dominant_rate(
            &filtered,
            self.sample_rate_hz,
            self.band_low_hz,
            self.band_high_hz,
        );

        let plausible = bpm >= self.bpm_min && bpm <= self.bpm_max;
        if plausible && snr > self.snr_threshold {
            if self.bpm_history.len() == self.history_depth {
                self.bpm_history.pop_front();
            }
            self.bpm_history.push_back(bpm);
            let smoothed = median(self.bpm_history.iter().copied());
            let confidence = (quality * snr / 10.0).min(100.0);
            tracing::debug!(bpm = smoothed, snr, quality, "heartbeat detected");
            HeartbeatReading::Detected {
                bpm: smoothed,
                snr,
                quality,
                confidence,
            }
        } else {
            tracing::debug!(bpm, snr, plausible, "heartbeat rejected");
            HeartbeatReading::Rejected { bpm, snr, quality }
        }
    }
}

/// Remove the mean and the least-squares linear trend.
fn detrend(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return signal.to_vec();
    }
    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = signal.iter().sum::<f64>() / nf;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in signal.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    signal
        .iter()
        .enumerate()
        .map(|(i, &y)| y - mean_y - slope * (i as f64 - mean_x))
        .collect()
}

/// First-order RC low-pass, forward direction.
fn lowpass(signal: &[f64], fs: f64, cutoff_hz: f64) -> Vec<f64> {
    if signal.is_empty() || fs <= 0.0 || cutoff_hz <= 0.0 {
        return signal.to_vec();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(signal.len());
    out.push(signal[0]);
    for i in 1..signal.len() {
        let y = alpha * signal[i] + (1.0 - alpha) * out[i - 1];
        out.push(y);
    }
    out
}

/// First-order RC high-pass, forward direction.
fn highpass(signal: &[f64], fs: f64, cutoff_hz: f64) -> Vec<f64> {
    if signal.is_empty() || fs <= 0.0 || cutoff_hz <= 0.0 {
        return signal.to_vec();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(signal.len());
    out.push(signal[0]);
    for i in 1..signal.len() {
        let y = alpha * (out[i - 1] + signal[i] - signal[i - 1]);
        out.push(y);
    }
    out
}

/// Band-pass restricted to `[low_hz, high_hz]`, run forward and then
/// backward so the net phase shift is zero and temporal alignment with the
/// raw signal is preserved.
fn bandpass_zero_phase(signal: &[f64], fs: f64, low_hz: f64, high_hz: f64) -> Vec<f64> {
    let forward = highpass(&lowpass(signal, fs, high_hz), fs, low_hz);
    let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
    reversed = highpass(&lowpass(&reversed, fs, high_hz), fs, low_hz);
    reversed.reverse();
    reversed
}

/// Dominant in-band rate via the FFT magnitude spectrum.
///
/// Returns `(bpm, snr)` where snr = peak magnitude / mean in-band magnitude.
fn dominant_rate(signal: &[f64], fs: f64, low_hz: f64, high_hz: f64) -> (f64, f64) {
    let n = signal.len();
    if n < 4 {
        return (0.0, 0.0);
    }

    // Hamming taper to reduce spectral leakage
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.54 - 0.46 * (2.0 * PI * i as f64 / (n as f64 - 1.0)).cos();
            Complex::new(s * w, 0.0)
        })
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let mut peak_mag = 0.0;
    let mut peak_freq = 0.0;
    let mut band_sum = 0.0;
    let mut band_bins = 0usize;
    for (i, value) in buffer.iter().enumerate().take(n / 2).skip(1) {
        let freq = i as f64 * fs / n as f64;
        if freq < low_hz || freq > high_hz {
            continue;
        }
        let mag = value.norm();
        band_sum += mag;
        band_bins += 1;
        if mag > peak_mag {
            peak_mag = mag;
            peak_freq = freq;
        }
    }

    if band_bins == 0 {
        return (0.0, 0.0);
    }
    let band_mean = band_sum / band_bins as f64;
    let snr = peak_mag / (band_mean + 1e-9);
    (peak_freq * 60.0, snr)
}

/// Secondary quality score: coefficient of variation of the filtered
/// signal, scaled into 0–100.
fn signal_quality(signal: &[f64]) -> f64 {
    if signal.len() < 10 {
        return 0.0;
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let var = signal.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let cv = var.sqrt() / (mean.abs() + 1e-6) * 100.0;
    (cv * 10.0).clamp(0.0, 100.0)
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
