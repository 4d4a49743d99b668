use serde::Deserialize;

/// Every tunable threshold in the pipeline, one named field per heuristic.
///
/// The defaults are the reference values for a consumer webcam at 30 fps.
/// Deployments retune through a TOML file deserialized over these defaults;
/// `#[serde(default)]` lets the file override any subset of fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Heartbeat (rPPG)
    /// Capture rate the signal window is sized for.
    pub sample_rate_hz: f64,
    /// Seconds of signal buffered for spectral analysis.
    pub window_seconds: f64,
    /// Seconds of signal required before an estimate is attempted.
    pub min_seconds: f64,
    /// Lower edge of the physiologically plausible band (Hz). 0.7 Hz = 42 BPM.
    pub band_low_hz: f64,
    /// Upper edge of the plausible band (Hz). 4.0 Hz = 240 BPM.
    pub band_high_hz: f64,
    /// Minimum accepted resting heart rate (BPM).
    pub bpm_min: f64,
    /// Maximum accepted resting heart rate (BPM).
    pub bpm_max: f64,
    /// In-band peak-to-mean ratio required to accept an estimate.
    pub snr_threshold: f64,
    /// Depth of the accepted-BPM history used for median smoothing.
    pub bpm_history: usize,

    // Presentation indicators
    /// Periodicity score above which the moire indicator fires.
    pub moire_threshold: f64,
    /// Divisor normalizing raw spectral-region deviation into [0, 1].
    pub moire_normalizer: f64,
    /// Mean flow magnitude below which a frame pair counts as static.
    pub motion_static_max: f64,
    /// Flow variance below which motion counts as uniform (screen pan).
    pub motion_uniform_variance: f64,
    /// Mean flow magnitude ceiling for the uniform-motion rule.
    pub motion_uniform_avg_max: f64,
    /// Grayscale frames retained for motion analysis.
    pub motion_history: usize,
    /// Laplacian variance above which edges count as artificially sharp.
    pub edge_sharpness_max: f64,
    /// Gradient-magnitude deviation below which gradients are suspiciously flat.
    pub edge_gradient_std_min: f64,
    /// Lower bound of the realistic texture-score band.
    pub texture_min: f64,
    /// Upper bound of the realistic texture-score band.
    pub texture_max: f64,
    /// Brightness std/mean ratio below which illumination is suspiciously flat.
    pub backlight_uniformity_min: f64,
    /// Pixels below this brightness count as "dark" for the bleed check.
    pub backlight_dark_threshold: f64,
    /// Mean brightness of dark pixels above which backlight bleed is assumed.
    pub backlight_dark_mean_max: f64,
    /// Relative spread between channel variances below which channels are
    /// suspiciously balanced.
    pub color_spread_min: f64,

    // Liveness fusion
    /// Confidence assigned when a rejected heartbeat forces a spoof verdict.
    pub no_heartbeat_confidence: f64,
    /// Triggered-indicator count at which the verdict flips to spoof.
    pub spoof_indicator_count: usize,
    /// Spoof confidence used when triggered indicators carry no scores.
    pub spoof_confidence_fallback: f64,

    // Injection integrity
    /// Seconds the environment-scan verdict stays cached.
    pub scan_ttl_secs: u64,
    /// Frames over which the sensor-noise baseline is learned.
    pub noise_baseline_frames: u32,
    /// Absolute noise level below which a feed is suspiciously clean.
    pub noise_floor: f64,
    /// Fraction of the learned baseline below which noise is flagged.
    pub noise_baseline_fraction: f64,
    /// Mean frame difference below which a feed counts as frozen.
    pub stability_min_diff: f64,
    /// Reported frame rates treated as too perfect to be a physical sensor.
    pub perfect_fps: Vec<f64>,
    /// Process names whose presence indicates virtual-camera software.
    pub virtual_camera_processes: Vec<String>,
    /// Sub-check weights; the four sum to 100 in the reference configuration.
    pub weight_environment: f64,
    pub weight_noise: f64,
    pub weight_stability: f64,
    pub weight_metadata: f64,
    /// Combined score must strictly exceed this for an injection verdict.
    pub injection_threshold: f64,

    // Decision fusion and ledger
    /// Maximum decisions retained in the audit ledger.
    pub ledger_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 30.0,
            window_seconds: 10.0,
            min_seconds: 5.0,
            band_low_hz: 0.7,
            band_high_hz: 4.0,
            bpm_min: 50.0,
            bpm_max: 120.0,
            snr_threshold: 2.0,
            bpm_history: 5,

            moire_threshold: 0.6,
            moire_normalizer: 10_000.0,
            motion_static_max: 0.1,
            motion_uniform_variance: 0.5,
            motion_uniform_avg_max: 0.3,
            motion_history: 5,
            edge_sharpness_max: 250.0,
            edge_gradient_std_min: 3.0,
            texture_min: 15.0,
            texture_max: 300.0,
            backlight_uniformity_min: 0.12,
            backlight_dark_threshold: 50.0,
            backlight_dark_mean_max: 35.0,
            color_spread_min: 0.10,

            no_heartbeat_confidence: 90.0,
            spoof_indicator_count: 3,
            spoof_confidence_fallback: 75.0,

            scan_ttl_secs: 30,
            noise_baseline_frames: 10,
            noise_floor: 1.0,
            noise_baseline_fraction: 0.25,
            stability_min_diff: 0.5,
            perfect_fps: vec![25.0, 30.0, 60.0, 120.0],
            virtual_camera_processes: vec![
                "obs".into(),
                "obs64".into(),
                "manycam".into(),
                "xsplit".into(),
                "camtwist".into(),
                "vmix".into(),
                "v4l2loopback".into(),
            ],
            weight_environment: 60.0,
            weight_noise: 15.0,
            weight_stability: 10.0,
            weight_metadata: 15.0,
            injection_threshold: 50.0,

            ledger_capacity: 1000,
        }
    }
}

impl PipelineConfig {
    /// Signal-window capacity in samples.
    pub fn window_capacity(&self) -> usize {
        (self.sample_rate_hz * self.window_seconds) as usize
    }

    /// Samples required before the heartbeat estimator reports anything but
    /// a collecting status.
    pub fn min_samples(&self) -> usize {
        (self.sample_rate_hz * self.min_seconds) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_window_sizes() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_capacity(), 300);
        assert_eq!(config.min_samples(), 150);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config: PipelineConfig =
            toml::from_str("snr_threshold = 3.5\nmoire_threshold = 0.4\n").unwrap();
        assert_eq!(config.snr_threshold, 3.5);
        assert_eq!(config.moire_threshold, 0.4);
        // Untouched fields keep the reference values
        assert_eq!(config.bpm_min, 50.0);
        assert_eq!(config.ledger_capacity, 1000);
    }
}
