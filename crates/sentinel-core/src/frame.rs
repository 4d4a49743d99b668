use image::RgbImage;
use ndarray::Array2;

/// Capture-device metadata reported alongside a frame, when the camera layer
/// exposes it. Absent for sources that cannot report it (file replays, raw
/// byte feeds); the metadata sub-check is skipped in that case.
#[derive(Debug, Clone)]
pub struct CaptureInfo {
    /// Frame rate the device claims to deliver. Physical sensors report
    /// slightly fractional values (29.97, 30.02); emulated devices report
    /// exact round numbers.
    pub reported_fps: f64,
    /// Capture backend name, carried into the audit detail.
    pub backend: String,
}

/// One captured video frame: an immutable RGB raster plus its capture
/// timestamp in seconds. Owned transiently by the pipeline call; the only
/// frame state kept across calls is the session's previous grayscale plane.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    timestamp: f64,
    capture: Option<CaptureInfo>,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: f64) -> Self {
        Self {
            image,
            timestamp,
            capture: None,
        }
    }

    pub fn with_capture(image: RgbImage, timestamp: f64, capture: CaptureInfo) -> Self {
        Self {
            image,
            timestamp,
            capture: Some(capture),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn capture(&self) -> Option<&CaptureInfo> {
        self.capture.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Grayscale plane (ITU-R BT.601 luma), row-major `(height, width)`.
    pub fn to_gray(&self) -> Array2<f64> {
        let (w, h) = (self.image.width() as usize, self.image.height() as usize);
        let mut gray = Array2::zeros((h, w));
        for (x, y, pixel) in self.image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            gray[[y as usize, x as usize]] =
                0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        }
        gray
    }

    /// One color plane (0 = red, 1 = green, 2 = blue) as `(height, width)`.
    pub fn channel_plane(&self, channel: usize) -> Array2<f64> {
        let (w, h) = (self.image.width() as usize, self.image.height() as usize);
        let mut plane = Array2::zeros((h, w));
        for (x, y, pixel) in self.image.enumerate_pixels() {
            plane[[y as usize, x as usize]] = f64::from(pixel.0[channel.min(2)]);
        }
        plane
    }

    /// Mean green-channel value inside the forehead portion of a face box.
    ///
    /// The forehead (upper 30% of the face, centered 60% of its width) gives
    /// the strongest pulse signal: thin skin over many capillaries, and
    /// hemoglobin absorbs green light. Returns `None` when the region falls
    /// outside the frame or is degenerate.
    pub fn forehead_green_mean(&self, face: &crate::collaborators::BoundingBox) -> Option<f64> {
        let fx = face.x + face.width / 5;
        let fy = face.y + face.height / 10;
        let fw = face.width * 3 / 5;
        let fh = face.height * 3 / 10;
        if fw == 0 || fh == 0 {
            return None;
        }
        if fx + fw > self.width() || fy + fh > self.height() {
            return None;
        }

        let mut sum = 0.0;
        for y in fy..fy + fh {
            for x in fx..fx + fw {
                sum += f64::from(self.image.get_pixel(x, y).0[1]);
            }
        }
        Some(sum / f64::from(fw * fh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::BoundingBox;
    use image::Rgb;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        Frame::new(
            RgbImage::from_pixel(width, height, Rgb(rgb)),
            0.0,
        )
    }

    #[test]
    fn test_gray_of_solid_image_is_luma() {
        let frame = solid(8, 8, [100, 100, 100]);
        let gray = frame.to_gray();
        assert_eq!(gray.dim(), (8, 8));
        assert!((gray[[0, 0]] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_plane_extracts_single_channel() {
        let frame = solid(4, 4, [10, 200, 30]);
        assert_eq!(frame.channel_plane(0)[[2, 2]], 10.0);
        assert_eq!(frame.channel_plane(1)[[2, 2]], 200.0);
        assert_eq!(frame.channel_plane(2)[[2, 2]], 30.0);
    }

    #[test]
    fn test_forehead_mean_of_uniform_green() {
        let frame = solid(100, 100, [0, 80, 0]);
        let face = BoundingBox {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };
        let mean = frame.forehead_green_mean(&face).unwrap();
        assert!((mean - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_forehead_outside_frame_is_none() {
        let frame = solid(40, 40, [0, 80, 0]);
        let face = BoundingBox {
            x: 30,
            y: 30,
            width: 50,
            height: 50,
        };
        assert!(frame.forehead_green_mean(&face).is_none());
    }

    #[test]
    fn test_degenerate_face_box_is_none() {
        let frame = solid(40, 40, [0, 80, 0]);
        let face = BoundingBox {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        };
        assert!(frame.forehead_green_mean(&face).is_none());
    }
}
