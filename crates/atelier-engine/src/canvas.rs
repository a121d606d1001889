use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};

/// Layered editor output: a background raster plus ordered overlay layers.
///
/// The background is always present but may be empty (zero-sized or fully transparent) when the
/// editor had no distinct base layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    background: DynamicImage,
    layers: Vec<DynamicImage>,
}

impl Canvas {
    pub fn new(background: DynamicImage, layers: Vec<DynamicImage>) -> Self {
        Self { background, layers }
    }

    pub fn from_paths(background: &Path, layers: &[PathBuf]) -> Result<Self> {
        let background = open_layer(background)?;
        let layers = layers
            .iter()
            .map(|path| open_layer(path))
            .collect::<Result<Vec<DynamicImage>>>()?;
        Ok(Self::new(background, layers))
    }

    pub fn background(&self) -> &DynamicImage {
        &self.background
    }

    pub fn layers(&self) -> &[DynamicImage] {
        &self.layers
    }

    pub fn is_background_empty(&self) -> bool {
        is_empty_raster(&self.background)
    }

    /// Background with every overlay alpha-blended on top, in order.
    ///
    /// The composite takes the background's size; layers of another size are stretched to it.
    /// Without a sized background the first sized layer decides. `None` when nothing has pixels.
    pub fn composite(&self) -> Option<RgbaImage> {
        let (width, height) = if has_pixels(&self.background) {
            self.background.dimensions()
        } else {
            self.layers
                .iter()
                .find(|layer| has_pixels(layer))
                .map(|layer| layer.dimensions())?
        };

        let mut base = if self.background.dimensions() == (width, height) {
            self.background.to_rgba8()
        } else {
            RgbaImage::new(width, height)
        };
        for layer in self.layers.iter().filter(|layer| has_pixels(layer)) {
            let top = layer.to_rgba8();
            if top.dimensions() == (width, height) {
                imageops::overlay(&mut base, &top, 0, 0);
            } else {
                let resized = imageops::resize(&top, width, height, FilterType::Triangle);
                imageops::overlay(&mut base, &resized, 0, 0);
            }
        }
        Some(base)
    }
}

fn open_layer(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to open canvas layer {}", path.display()))
}

fn has_pixels(image: &DynamicImage) -> bool {
    image.width() > 0 && image.height() > 0
}

fn is_empty_raster(image: &DynamicImage) -> bool {
    if !has_pixels(image) {
        return true;
    }
    if !image.color().has_alpha() {
        return false;
    }
    image.to_rgba8().pixels().all(|pixel| pixel[3] == 0)
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    use super::Canvas;

    fn solid_rgba(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn opaque_overlay_replaces_background_pixels() {
        let mut stroke = RgbaImage::new(4, 4);
        stroke.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let canvas = Canvas::new(
            solid_rgba(4, 4, [255, 255, 255, 255]),
            vec![DynamicImage::ImageRgba8(stroke)],
        );

        let composite = canvas.composite().expect("composite");
        assert_eq!(composite.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(composite.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn empty_background_takes_layer_size() {
        let canvas = Canvas::new(
            DynamicImage::new_rgba8(0, 0),
            vec![solid_rgba(3, 2, [0, 0, 255, 255])],
        );
        assert!(canvas.is_background_empty());
        let composite = canvas.composite().expect("composite");
        assert_eq!(composite.dimensions(), (3, 2));
        assert_eq!(composite.get_pixel(2, 1), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn mismatched_layers_are_stretched_to_background() {
        let canvas = Canvas::new(
            solid_rgba(8, 8, [0, 0, 0, 255]),
            vec![solid_rgba(2, 2, [0, 255, 0, 255])],
        );
        let composite = canvas.composite().expect("composite");
        assert_eq!(composite.dimensions(), (8, 8));
        assert_eq!(composite.get_pixel(7, 7), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn emptiness_rules() {
        let transparent = Canvas::new(solid_rgba(4, 4, [9, 9, 9, 0]), Vec::new());
        assert!(transparent.is_background_empty());

        let opaque_rgb = Canvas::new(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))),
            Vec::new(),
        );
        assert!(!opaque_rgb.is_background_empty());

        let nothing = Canvas::new(DynamicImage::new_rgba8(0, 0), Vec::new());
        assert!(nothing.composite().is_none());
    }

    #[test]
    fn from_paths_reports_missing_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let background = temp.path().join("bg.png");
        solid_rgba(2, 2, [1, 2, 3, 255]).save(&background)?;

        let canvas = Canvas::from_paths(&background, &[])?;
        assert_eq!(canvas.background().to_rgba8().get_pixel(0, 0), &Rgba([1, 2, 3, 255]));

        let missing = temp.path().join("missing.png");
        let err = Canvas::from_paths(&background, &[missing])
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.contains("missing.png"));
        Ok(())
    }
}
