//! Pixel-level frame comparison.

use image::RgbImage;
use std::path::Path;

use super::types::FrameResult;

/// Load a frame from disk as RGB, dropping any alpha channel.
pub fn load_rgb(path: &Path) -> FrameResult<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

/// Whether two decoded frames differ in size or in any pixel.
pub fn images_differ(a: &RgbImage, b: &RgbImage) -> bool {
    a.dimensions() != b.dimensions() || a.as_raw() != b.as_raw()
}

/// Whether the PNG files at `a` and `b` differ visibly.
pub fn frames_differ(a: &Path, b: &Path) -> FrameResult<bool> {
    let first = load_rgb(a)?;
    let second = load_rgb(b)?;
    Ok(images_differ(&first, &second))
}

/// Bounding box `(x, y, width, height)` of the changed region, if any.
pub fn changed_region(a: &RgbImage, b: &RgbImage) -> Option<(u32, u32, u32, u32)> {
    if a.dimensions() != b.dimensions() {
        let (w, h) = b.dimensions();
        return Some((0, 0, w, h));
    }

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in a.enumerate_pixels() {
        if pixel != b.get_pixel(x, y) {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(color))
    }

    #[test]
    fn test_identical_images_do_not_differ() {
        let a = solid(4, 4, [10, 20, 30]);
        let b = solid(4, 4, [10, 20, 30]);
        assert!(!images_differ(&a, &b));
        assert_eq!(changed_region(&a, &b), None);
    }

    #[test]
    fn test_single_pixel_change_is_detected() {
        let a = solid(8, 8, [0, 0, 0]);
        let mut b = a.clone();
        b.put_pixel(3, 5, Rgb([1, 0, 0]));
        assert!(images_differ(&a, &b));
        assert_eq!(changed_region(&a, &b), Some((3, 5, 1, 1)));
    }

    #[test]
    fn test_size_change_is_a_difference() {
        let a = solid(4, 4, [0, 0, 0]);
        let b = solid(4, 5, [0, 0, 0]);
        assert!(images_differ(&a, &b));
        assert_eq!(changed_region(&a, &b), Some((0, 0, 4, 5)));
    }

    #[test]
    fn test_changed_region_spans_all_changes() {
        let a = solid(10, 10, [0, 0, 0]);
        let mut b = a.clone();
        b.put_pixel(1, 2, Rgb([9, 9, 9]));
        b.put_pixel(6, 8, Rgb([9, 9, 9]));
        assert_eq!(changed_region(&a, &b), Some((1, 2, 6, 7)));
    }
}
