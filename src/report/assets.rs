use std::path::Path;

use anyhow::{Context, Result};
use qrcode::{Color, QrCode};
use tracing::{info, warn};

use super::pdf::RasterImage;

/// Longest edge, in pixels, of an embedded logo.
const LOGO_MAX_EDGE: u32 = 256;

/// Loads the branding image. A missing or unreadable file is not an error:
/// the report is produced without it.
pub fn load_logo(path: Option<&Path>) -> Option<RasterImage> {
    let path = path?;

    if !path.exists() {
        warn!(path = %path.display(), "branding image not found, continuing without it");
        return None;
    }

    match decode_logo(path) {
        Ok(image) => {
            info!(
                path = %path.display(),
                width = image.width,
                height = image.height,
                "loaded branding image"
            );
            Some(image)
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "branding image unreadable, continuing without it"
            );
            None
        }
    }
}

fn decode_logo(path: &Path) -> Result<RasterImage> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    let resized = if decoded.width() > LOGO_MAX_EDGE || decoded.height() > LOGO_MAX_EDGE {
        decoded.thumbnail(LOGO_MAX_EDGE, LOGO_MAX_EDGE)
    } else {
        decoded
    };

    let has_alpha = resized.color().has_alpha();
    let rgba = resized.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    Ok(RasterImage {
        width,
        height,
        rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

/// Dark/light module grid of a QR code, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    pub width: usize,
    pub dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(payload: &str) -> Result<Self> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|err| anyhow::anyhow!("failed to encode QR payload: {err}"))?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_logo_degrades_to_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_logo(Some(&dir.path().join("missing.png"))).is_none());
        assert!(load_logo(None).is_none());
    }

    #[test]
    fn unreadable_logo_degrades_to_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"not a png").expect("write");
        assert!(load_logo(Some(&path)).is_none());
    }

    #[test]
    fn png_logo_keeps_alpha_as_mask() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logo.png");
        let mut source = image::RgbaImage::new(4, 2);
        source.put_pixel(0, 0, image::Rgba([20, 50, 100, 0]));
        source.save(&path).expect("save png");

        let logo = load_logo(Some(&path)).expect("logo decodes");
        assert_eq!((logo.width, logo.height), (4, 2));
        assert_eq!(logo.rgb.len(), 4 * 2 * 3);
        assert_eq!(logo.alpha.as_ref().map(|alpha| alpha[0]), Some(0));
    }

    #[test]
    fn qr_matrix_is_square_with_finder_corner() {
        let matrix = QrMatrix::encode("https://example.test/verify?digest=abc").expect("qr");
        assert_eq!(matrix.dark.len(), matrix.width * matrix.width);
        assert!(matrix.width >= 21);
        // top-left finder pattern starts with a dark module
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(matrix.width, 0));
    }
}
