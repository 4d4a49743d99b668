//! Grayscale raster operators shared by the indicator bank and the
//! injection checker. All functions are total: degenerate inputs (planes
//! smaller than the 3×3 kernels, empty arrays) return zeros instead of
//! panicking, so a malformed frame can never take the session down.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Arithmetic mean of a plane; 0 for an empty plane.
pub fn mean(plane: &Array2<f64>) -> f64 {
    if plane.is_empty() {
        return 0.0;
    }
    plane.sum() / plane.len() as f64
}

/// Population standard deviation of a plane; 0 for an empty plane.
pub fn std_dev(plane: &Array2<f64>) -> f64 {
    if plane.is_empty() {
        return 0.0;
    }
    let m = mean(plane);
    let var = plane.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / plane.len() as f64;
    var.sqrt()
}

/// 4-neighbor Laplacian over the interior; the one-pixel border is left at
/// zero. Output has the same shape as the input.
pub fn laplacian(gray: &Array2<f64>) -> Array2<f64> {
    let (h, w) = gray.dim();
    let mut out = Array2::zeros((h, w));
    if h < 3 || w < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            out[[y, x]] = gray[[y - 1, x]] + gray[[y + 1, x]] + gray[[y, x - 1]]
                + gray[[y, x + 1]]
                - 4.0 * gray[[y, x]];
        }
    }
    out
}

/// Variance of the interior Laplacian response, the usual sharpness and
/// texture measure. 0 for planes too small to convolve.
pub fn laplacian_variance(gray: &Array2<f64>) -> f64 {
    interior_stats(&laplacian(gray), gray.dim()).1
}

/// Standard deviation of the interior Laplacian response, the per-frame
/// sensor-noise measure used by the injection checker.
pub fn laplacian_std(gray: &Array2<f64>) -> f64 {
    interior_stats(&laplacian(gray), gray.dim()).1.sqrt()
}

/// Sobel gradient planes `(gx, gy)`; borders are zero.
pub fn sobel(gray: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (h, w) = gray.dim();
    let mut gx = Array2::zeros((h, w));
    let mut gy = Array2::zeros((h, w));
    if h < 3 || w < 3 {
        return (gx, gy);
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            gx[[y, x]] = (gray[[y - 1, x + 1]] + 2.0 * gray[[y, x + 1]] + gray[[y + 1, x + 1]])
                - (gray[[y - 1, x - 1]] + 2.0 * gray[[y, x - 1]] + gray[[y + 1, x - 1]]);
            gy[[y, x]] = (gray[[y + 1, x - 1]] + 2.0 * gray[[y + 1, x]] + gray[[y + 1, x + 1]])
                - (gray[[y - 1, x - 1]] + 2.0 * gray[[y - 1, x]] + gray[[y - 1, x + 1]]);
        }
    }
    (gx, gy)
}

/// Gradient-magnitude plane from Sobel responses.
pub fn gradient_magnitude(gray: &Array2<f64>) -> Array2<f64> {
    let (gx, gy) = sobel(gray);
    let (h, w) = gray.dim();
    let mut mag = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            mag[[y, x]] = (gx[[y, x]] * gx[[y, x]] + gy[[y, x]] * gy[[y, x]]).sqrt();
        }
    }
    mag
}

/// Mean and standard deviation of the gradient magnitude over the interior
/// (kernel borders excluded so uniform inputs measure exactly).
pub fn gradient_stats(gray: &Array2<f64>) -> (f64, f64) {
    let mag = gradient_magnitude(gray);
    let (m, var) = interior_stats(&mag, gray.dim());
    (m, var.sqrt())
}

/// Fraction of interior pixels whose gradient magnitude exceeds
/// `threshold`: a binary edge map density.
pub fn edge_density(gray: &Array2<f64>, threshold: f64) -> f64 {
    let (h, w) = gray.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }
    let mag = gradient_magnitude(gray);
    let mut edges = 0usize;
    let mut total = 0usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            total += 1;
            if mag[[y, x]] > threshold {
                edges += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        edges as f64 / total as f64
    }
}

/// Mean absolute difference between two equally sized planes; 0 when the
/// shapes disagree (the comparison is meaningless, not an error).
pub fn mean_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    if a.dim() != b.dim() || a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / a.len() as f64
}

/// Per-pixel normal-flow magnitude between two frames:
/// |temporal gradient| / (|spatial gradient| + 1).
///
/// A static pair produces an all-zero field; a uniformly translating raster
/// produces a near-constant field (low variance). That is exactly what the
/// motion indicator discriminates on, without a full optical-flow solve.
pub fn normal_flow(prev: &Array2<f64>, curr: &Array2<f64>) -> Array2<f64> {
    if prev.dim() != curr.dim() {
        return Array2::zeros(curr.dim());
    }
    let (h, w) = curr.dim();
    let mag = gradient_magnitude(curr);
    let mut flow = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let dt = (curr[[y, x]] - prev[[y, x]]).abs();
            flow[[y, x]] = dt / (mag[[y, x]] + 1.0);
        }
    }
    flow
}

/// Magnitude spectrum of the 2-D discrete Fourier transform, with the
/// zero-frequency component shifted to the center (rows then columns, the
/// separable row/column pass over `rustfft` plans).
pub fn fft2d_magnitude_shifted(gray: &Array2<f64>) -> Array2<f64> {
    let (h, w) = gray.dim();
    if h == 0 || w == 0 {
        return Array2::zeros((h, w));
    }

    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);

    let mut data: Vec<Vec<Complex<f64>>> = (0..h)
        .map(|y| {
            let mut row: Vec<Complex<f64>> =
                (0..w).map(|x| Complex::new(gray[[y, x]], 0.0)).collect();
            row_fft.process(&mut row);
            row
        })
        .collect();

    let mut column = vec![Complex::new(0.0, 0.0); h];
    for x in 0..w {
        for (y, slot) in column.iter_mut().enumerate() {
            *slot = data[y][x];
        }
        col_fft.process(&mut column);
        for (y, value) in column.iter().enumerate() {
            data[y][x] = *value;
        }
    }

    // Shift DC to the center
    let mut out = Array2::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            out[[(y + h / 2) % h, (x + w / 2) % w]] = data[y][x].norm();
        }
    }
    out
}

/// Mean and variance over the interior (border excluded); `(0, 0)` when the
/// plane has no interior.
fn interior_stats(plane: &Array2<f64>, dim: (usize, usize)) -> (f64, f64) {
    let (h, w) = dim;
    if h < 3 || w < 3 {
        return (0.0, 0.0);
    }
    let n = ((h - 2) * (w - 2)) as f64;
    let mut sum = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            sum += plane[[y, x]];
        }
    }
    let m = sum / n;
    let mut var = 0.0;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let d = plane[[y, x]] - m;
            var += d * d;
        }
    }
    (m, var / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(h: usize, w: usize, slope: f64) -> Array2<f64> {
        Array2::from_shape_fn((h, w), |(_, x)| slope * x as f64)
    }

    #[test]
    fn test_laplacian_of_constant_is_zero() {
        let flat = Array2::from_elem((16, 16), 42.0);
        assert_eq!(laplacian_variance(&flat), 0.0);
        assert_eq!(laplacian_std(&flat), 0.0);
    }

    #[test]
    fn test_laplacian_of_linear_ramp_is_zero() {
        // Second derivative of a linear function vanishes
        assert!(laplacian_variance(&ramp(16, 16, 3.0)) < 1e-9);
    }

    #[test]
    fn test_sobel_of_ramp_is_exact() {
        // I(x) = 20x: Sobel x-response is 8 × slope everywhere in the interior
        let (mean_mag, std_mag) = gradient_stats(&ramp(16, 16, 20.0));
        assert!((mean_mag - 160.0).abs() < 1e-9);
        assert!(std_mag < 1e-9);
    }

    #[test]
    fn test_edge_density_flat_vs_checkerboard() {
        let flat = Array2::from_elem((16, 16), 10.0);
        assert_eq!(edge_density(&flat, 50.0), 0.0);

        // Vertical stripes two pixels wide: strong Sobel response at most columns
        let stripes =
            Array2::from_shape_fn((16, 16), |(_, x)| if (x / 2) % 2 == 0 { 255.0 } else { 0.0 });
        assert!(edge_density(&stripes, 50.0) > 0.5);
    }

    #[test]
    fn test_mean_abs_diff_of_shifted_planes() {
        let a = Array2::from_elem((8, 8), 10.0);
        let b = Array2::from_elem((8, 8), 13.0);
        assert!((mean_abs_diff(&a, &b) - 3.0).abs() < 1e-9);
        assert_eq!(mean_abs_diff(&a, &Array2::zeros((4, 4))), 0.0);
    }

    #[test]
    fn test_normal_flow_static_pair_is_zero() {
        let a = Array2::from_shape_fn((16, 16), |(y, x)| (x * 7 + y * 3) as f64);
        let flow = normal_flow(&a, &a);
        assert!(flow.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fft2d_of_uniform_plane_concentrates_at_center() {
        let flat = Array2::from_elem((16, 16), 100.0);
        let spectrum = fft2d_magnitude_shifted(&flat);
        // All energy in the DC bin (shifted to the center)
        assert!((spectrum[[8, 8]] - 100.0 * 256.0).abs() < 1e-3);
        let off_center: f64 = spectrum
            .indexed_iter()
            .filter(|((y, x), _)| !(*y == 8 && *x == 8))
            .map(|(_, v)| *v)
            .sum();
        assert!(off_center < 1e-3);
    }

    #[test]
    fn test_fft2d_of_diagonal_tone_peaks_off_center() {
        let n = 128;
        let tone = Array2::from_shape_fn((n, n), |(y, x)| {
            (2.0 * std::f64::consts::PI * 40.0 * (x + y) as f64 / n as f64).sin() * 100.0
        });
        let spectrum = fft2d_magnitude_shifted(&tone);
        let c = n / 2;
        // Conjugate peaks land at center ± (40, 40)
        assert!(spectrum[[c + 40, c + 40]] > 1e5);
        assert!(spectrum[[c - 40, c - 40]] > 1e5);
        assert!(spectrum[[c, c]] < 1.0);
    }
}
