use image::{DynamicImage, GrayImage, Luma};

use crate::canvas::Canvas;

/// Sources for sketch-guided generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SketchLayers {
    /// Raster the edge map is extracted from.
    pub line_art: DynamicImage,
    /// Composite used as the img2img init image.
    pub color_draft: DynamicImage,
}

/// Sources for masked inpainting.
#[derive(Debug, Clone, PartialEq)]
pub struct InpaintLayers {
    pub base: DynamicImage,
    /// White regenerates, black is kept.
    pub mask: GrayImage,
}

/// Splits a canvas into line art and color draft.
///
/// When the editor supplied no distinct background the color draft doubles as line art, so edges
/// come from the colored sketch itself.
pub fn resolve_sketch_layers(canvas: &Canvas) -> Option<SketchLayers> {
    let color_draft = DynamicImage::ImageRgba8(canvas.composite()?);
    let line_art = if canvas.is_background_empty() {
        color_draft.clone()
    } else {
        canvas.background().clone()
    };
    Some(SketchLayers {
        line_art,
        color_draft,
    })
}

/// Picks the base image and mask for inpainting.
///
/// `None` is the no-input signal: there is no canvas, or it has no overlay layer to take the mask
/// from. The first overlay is the mask source; its alpha channel is the mask when it has one,
/// its luminance otherwise.
pub fn resolve_inpaint_layers(canvas: Option<&Canvas>) -> Option<InpaintLayers> {
    let canvas = canvas?;
    let mask_layer = canvas.layers().first()?;
    let mask = if mask_layer.color().has_alpha() {
        let rgba = mask_layer.to_rgba8();
        GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            Luma([rgba.get_pixel(x, y)[3]])
        })
    } else {
        mask_layer.to_luma8()
    };
    Some(InpaintLayers {
        base: canvas.background().clone(),
        mask,
    })
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    use super::{resolve_inpaint_layers, resolve_sketch_layers};
    use crate::canvas::Canvas;

    fn white_rgb(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(size, size, Rgb([255, 255, 255])))
    }

    #[test]
    fn sketch_uses_background_as_line_art_when_present() {
        let mut colors = RgbaImage::new(4, 4);
        colors.put_pixel(2, 2, Rgba([200, 10, 10, 255]));
        let canvas = Canvas::new(white_rgb(4), vec![DynamicImage::ImageRgba8(colors)]);

        let layers = resolve_sketch_layers(&canvas).expect("layers");
        assert_eq!(&layers.line_art, canvas.background());
        assert_ne!(layers.line_art.to_rgba8(), layers.color_draft.to_rgba8());
        assert_eq!(
            layers.color_draft.to_rgba8().get_pixel(2, 2),
            &Rgba([200, 10, 10, 255])
        );
    }

    #[test]
    fn sketch_falls_back_to_color_draft_without_background() {
        let mut colors = RgbaImage::new(6, 6);
        colors.put_pixel(3, 1, Rgba([0, 0, 0, 255]));
        let canvas = Canvas::new(
            DynamicImage::ImageRgba8(RgbaImage::new(6, 6)),
            vec![DynamicImage::ImageRgba8(colors)],
        );

        let layers = resolve_sketch_layers(&canvas).expect("layers");
        assert_eq!(layers.line_art, layers.color_draft);
    }

    #[test]
    fn inpaint_without_layers_is_no_input() {
        let canvas = Canvas::new(white_rgb(8), Vec::new());
        assert!(resolve_inpaint_layers(Some(&canvas)).is_none());
        assert!(resolve_inpaint_layers(None).is_none());
    }

    #[test]
    fn inpaint_mask_comes_from_alpha_channel() {
        let mut painted = RgbaImage::new(4, 4);
        painted.put_pixel(1, 2, Rgba([255, 255, 255, 255]));
        painted.put_pixel(3, 3, Rgba([0, 0, 0, 128]));
        let canvas = Canvas::new(white_rgb(4), vec![DynamicImage::ImageRgba8(painted)]);

        let layers = resolve_inpaint_layers(Some(&canvas)).expect("layers");
        assert_eq!(layers.mask.get_pixel(1, 2), &Luma([255]));
        assert_eq!(layers.mask.get_pixel(3, 3), &Luma([128]));
        assert_eq!(layers.mask.get_pixel(0, 0), &Luma([0]));
        assert_eq!(&layers.base, canvas.background());
    }

    #[test]
    fn inpaint_mask_uses_luminance_without_alpha() {
        let mut mask = GrayImage::new(3, 3);
        mask.put_pixel(1, 1, Luma([255]));
        let canvas = Canvas::new(
            white_rgb(3),
            vec![
                DynamicImage::ImageLuma8(mask.clone()),
                DynamicImage::ImageRgba8(RgbaImage::new(3, 3)),
            ],
        );

        let layers = resolve_inpaint_layers(Some(&canvas)).expect("layers");
        assert_eq!(layers.mask, mask);
    }
}
