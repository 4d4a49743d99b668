//! Camera-injection checker.
//!
//! Orthogonal to liveness: liveness asks whether the pictured face is
//! alive, injection asks whether the frames ever came from a physical
//! sensor. Four weighted sub-checks accumulate into a score out of 100;
//! a strict majority of the weight must agree before the feed is called
//! injected. Missing evidence (no previous frame, no capture metadata)
//! contributes nothing rather than counting either way.

use std::time::{Duration, Instant};

use ndarray::Array2;
use serde_json::json;

use crate::config::PipelineConfig;
use crate::frame::Frame;
use crate::ops;

/// Result of scanning the host for virtual-camera software.
#[derive(Debug, Clone)]
pub struct EnvironmentScan {
    pub detected: bool,
    /// Matched process names, or a short "clean" summary.
    pub summary: String,
}

/// Host inspection seam. The production scanner walks `/proc`; tests
/// substitute fixed results.
pub trait EnvironmentScanner {
    fn scan(&mut self) -> EnvironmentScan;
}

/// Scans `/proc/*/comm` for known virtual-camera process names and checks
/// whether the v4l2loopback module is loaded. Read failures on individual
/// entries are skipped; a process that vanishes mid-scan is not evidence.
#[derive(Debug)]
pub struct ProcessScanner {
    targets: Vec<String>,
}

impl ProcessScanner {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }
}

impl EnvironmentScanner for ProcessScanner {
    fn scan(&mut self) -> EnvironmentScan {
        let mut matches: Vec<String> = Vec::new();

        if let Ok(entries) = std::fs::read_dir("/proc") {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(pid) = name.to_str().filter(|n| n.bytes().all(|b| b.is_ascii_digit()))
                else {
                    continue;
                };
                let Ok(comm) = std::fs::read_to_string(format!("/proc/{pid}/comm")) else {
                    continue;
                };
                let comm = comm.trim().to_ascii_lowercase();
                if self.targets.iter().any(|t| comm.contains(t.as_str())) {
                    matches.push(comm);
                }
            }
        }

        if std::path::Path::new("/sys/module/v4l2loopback").exists() {
            matches.push("v4l2loopback (kernel module)".to_string());
        }

        matches.sort();
        matches.dedup();
        if matches.is_empty() {
            EnvironmentScan {
                detected: false,
                summary: "no virtual camera software found".to_string(),
            }
        } else {
            EnvironmentScan {
                detected: true,
                summary: matches.join(", "),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InjectionVerdict {
    pub injected: bool,
    /// Accumulated sub-check weight, out of 100.
    pub score: f64,
    pub detail: serde_json::Value,
}

#[derive(Debug)]
struct CachedScan {
    result: EnvironmentScan,
    expires_at: Instant,
}

/// Per-session injection state: the environment-scan cache and the learned
/// sensor-noise baseline.
pub struct InjectionChecker {
    config: PipelineConfig,
    scanner: Box<dyn EnvironmentScanner + Send>,
    cache: Option<CachedScan>,
    noise_samples: Vec<f64>,
    noise_baseline: Option<f64>,
}

impl std::fmt::Debug for InjectionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionChecker")
            .field("baseline", &self.noise_baseline)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl InjectionChecker {
    pub fn new(config: &PipelineConfig, scanner: Box<dyn EnvironmentScanner + Send>) -> Self {
        Self {
            config: config.clone(),
            scanner,
            cache: None,
            noise_samples: Vec::new(),
            noise_baseline: None,
        }
    }

    /// Default checker backed by the `/proc` scanner.
    pub fn with_process_scanner(config: &PipelineConfig) -> Self {
        let scanner = ProcessScanner::new(config.virtual_camera_processes.clone());
        Self::new(config, Box::new(scanner))
    }

    pub fn check(
        &mut self,
        frame: &Frame,
        gray: &Array2<f64>,
        prev_gray: Option<&Array2<f64>>,
    ) -> InjectionVerdict {
        let mut score = 0.0;

        let scan = self.environment_scan();
        if scan.detected {
            score += self.config.weight_environment;
        }

        let noise = ops::laplacian_std(gray);
        let noise_flag = self.noise_below_baseline(noise);
        if noise_flag {
            score += self.config.weight_noise;
        }

        let frame_diff = prev_gray.map(|prev| ops::mean_abs_diff(prev, gray));
        let stability_flag = frame_diff.is_some_and(|d| d < self.config.stability_min_diff);
        if stability_flag {
            score += self.config.weight_stability;
        }

        let reported_fps = frame.capture().map(|c| c.reported_fps);
        let metadata_flag = reported_fps.is_some_and(|fps| self.is_perfect_fps(fps));
        if metadata_flag {
            score += self.config.weight_metadata;
        }

        let injected = score > self.config.injection_threshold;
        if injected {
            tracing::warn!(score, environment = %scan.summary, "camera injection suspected");
        }

        InjectionVerdict {
            injected,
            score,
            detail: json!({
                "environment": { "detected": scan.detected, "summary": scan.summary },
                "noise": { "value": noise, "baseline": self.noise_baseline, "flagged": noise_flag },
                "stability": { "frame_diff": frame_diff, "flagged": stability_flag },
                "metadata": { "reported_fps": reported_fps, "flagged": metadata_flag },
            }),
        }
    }

    /// Drop the learned noise baseline (subject switch). The environment
    /// cache survives: the host does not change between sessions.
    pub fn reset(&mut self) {
        self.noise_samples.clear();
        self.noise_baseline = None;
    }

    fn environment_scan(&mut self) -> EnvironmentScan {
        let now = Instant::now();
        if let Some(cached) = &self.cache {
            if cached.expires_at > now {
                return cached.result.clone();
            }
        }
        let result = self.scanner.scan();
        self.cache = Some(CachedScan {
            result: result.clone(),
            expires_at: now + Duration::from_secs(self.config.scan_ttl_secs),
        });
        result
    }

    /// Learns the sensor-noise baseline from the first frames, then flags
    /// frames whose noise drops far below it. Synthetic feeds carry no
    /// sensor noise; a real sensor never goes quiet.
    fn noise_below_baseline(&mut self, noise: f64) -> bool {
        match self.noise_baseline {
            Some(baseline) => {
                let threshold =
                    (baseline * self.config.noise_baseline_fraction).max(self.config.noise_floor);
                noise < threshold
            }
            None => {
                self.noise_samples.push(noise);
                if self.noise_samples.len() >= self.config.noise_baseline_frames as usize {
                    let baseline =
                        self.noise_samples.iter().sum::<f64>() / self.noise_samples.len() as f64;
                    tracing::debug!(baseline, "sensor noise baseline learned");
                    self.noise_baseline = Some(baseline);
                    self.noise_samples.clear();
                }
                false
            }
        }
    }

    /// Physical sensors report fractional rates (29.97, 30.02); an exact
    /// round number from the standard ladder reads as emulated.
    fn is_perfect_fps(&self, fps: f64) -> bool {
        self.config
            .perfect_fps
            .iter()
            .any(|&p| (fps - p).abs() < 1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CaptureInfo;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubScanner {
        detected: bool,
        calls: Arc<AtomicUsize>,
    }

    impl EnvironmentScanner for StubScanner {
        fn scan(&mut self) -> EnvironmentScan {
            self.calls.fetch_add(1, Ordering::SeqCst);
            EnvironmentScan {
                detected: self.detected,
                summary: if self.detected { "obs" } else { "clean" }.to_string(),
            }
        }
    }

    fn checker(detected: bool) -> (InjectionChecker, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = StubScanner {
            detected,
            calls: calls.clone(),
        };
        (
            InjectionChecker::new(&PipelineConfig::default(), Box::new(scanner)),
            calls,
        )
    }

    fn flat_frame(value: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(32, 32, Rgb([value; 3])), 0.0)
    }

    #[test]
    fn test_virtual_camera_process_tips_the_verdict() {
        let (mut checker, _) = checker(true);
        let frame = flat_frame(100);
        let gray = frame.to_gray();
        let verdict = checker.check(&frame, &gray, None);
        assert!(verdict.injected);
        assert_eq!(verdict.score, 60.0);
    }

    #[test]
    fn test_environment_scan_is_cached_within_ttl() {
        let (mut checker, calls) = checker(false);
        let frame = flat_frame(100);
        let gray = frame.to_gray();
        checker.check(&frame, &gray, None);
        checker.check(&frame, &gray, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_soft_signals_alone_stay_under_threshold() {
        let (mut checker, _) = checker(false);
        let config = PipelineConfig::default();
        let capture = CaptureInfo {
            reported_fps: 30.0,
            backend: "test".to_string(),
        };
        let frame = Frame::with_capture(RgbImage::from_pixel(32, 32, Rgb([100; 3])), 0.0, capture);
        let gray = frame.to_gray();

        // Learn the (zero) baseline on a flat feed
        for _ in 0..config.noise_baseline_frames {
            checker.check(&frame, &gray, None);
        }
        // Noise floor + frozen frame + perfect fps: 15 + 10 + 15 = 40
        let verdict = checker.check(&frame, &gray, Some(&gray));
        assert!(!verdict.injected);
        assert_eq!(verdict.score, 40.0);
        assert_eq!(verdict.detail["noise"]["flagged"], true);
        assert_eq!(verdict.detail["stability"]["flagged"], true);
        assert_eq!(verdict.detail["metadata"]["flagged"], true);
    }

    #[test]
    fn test_fractional_fps_is_not_flagged() {
        let (mut checker, _) = checker(false);
        let capture = CaptureInfo {
            reported_fps: 29.97,
            backend: "test".to_string(),
        };
        let frame = Frame::with_capture(RgbImage::from_pixel(32, 32, Rgb([100; 3])), 0.0, capture);
        let gray = frame.to_gray();
        let verdict = checker.check(&frame, &gray, None);
        assert_eq!(verdict.detail["metadata"]["flagged"], false);
    }

    #[test]
    fn test_threshold_comparison_is_strict() {
        // With the environment weight pinned to the threshold, a detected
        // scan alone lands exactly on 50 and must not flip the verdict
        let mut config = PipelineConfig::default();
        config.weight_environment = 50.0;
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = StubScanner {
            detected: true,
            calls,
        };
        let mut checker = InjectionChecker::new(&config, Box::new(scanner));
        let frame = flat_frame(100);
        let gray = frame.to_gray();
        let verdict = checker.check(&frame, &gray, None);
        assert_eq!(verdict.score, 50.0);
        assert!(!verdict.injected);

        config.weight_environment = 51.0;
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = StubScanner {
            detected: true,
            calls,
        };
        let mut checker = InjectionChecker::new(&config, Box::new(scanner));
        let verdict = checker.check(&frame, &gray, None);
        assert_eq!(verdict.score, 51.0);
        assert!(verdict.injected);
    }

    #[test]
    fn test_expired_cache_rescans() {
        let mut config = PipelineConfig::default();
        config.scan_ttl_secs = 0;
        let calls = Arc::new(AtomicUsize::new(0));
        let scanner = StubScanner {
            detected: false,
            calls: calls.clone(),
        };
        let mut checker = InjectionChecker::new(&config, Box::new(scanner));
        let frame = flat_frame(100);
        let gray = frame.to_gray();
        checker.check(&frame, &gray, None);
        checker.check(&frame, &gray, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_relearns_the_noise_baseline() {
        let (mut checker, _) = checker(false);
        let config = PipelineConfig::default();
        let frame = flat_frame(100);
        let gray = frame.to_gray();
        for _ in 0..config.noise_baseline_frames {
            checker.check(&frame, &gray, None);
        }
        checker.reset();
        // Back in the learning phase: no noise penalty
        let verdict = checker.check(&frame, &gray, None);
        assert_eq!(verdict.detail["noise"]["flagged"], false);
    }
}
