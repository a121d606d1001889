use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

/// PNG-encodes a raster and returns it as base64 text without a data-URL prefix.
pub fn encode_png_base64(image: &DynamicImage) -> Result<String> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(BASE64.encode(bytes.into_inner()))
}

/// Decodes base64 image text, tolerating a leading `data:<mime>;base64,` prefix.
pub fn decode_image_base64(encoded: &str) -> Result<DynamicImage> {
    let payload = strip_data_url(encoded.trim());
    let bytes = BASE64
        .decode(payload)
        .context("image payload is not valid base64")?;
    image::load_from_memory(&bytes).context("image payload is not a decodable image")
}

fn strip_data_url(encoded: &str) -> &str {
    if !encoded.starts_with("data:") {
        return encoded;
    }
    match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    }
}

/// Resizes to the exact generation size with a bicubic filter; untouched when already there.
pub fn resize_to_canonical(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::CatmullRom)
}
