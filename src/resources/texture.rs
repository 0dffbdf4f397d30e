use std::path::Path;

use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::resources::load_binary;

/// Decoded RGBA8 pixels, row-major from the top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// A single-colour texture, handy as a placeholder.
    pub fn solid(width: u32, height: u32, colour: [u8; 4]) -> Self {
        let rgba = colour
            .iter()
            .cycle()
            .take(width as usize * height as usize * 4)
            .copied()
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Decode image file contents.
    ///
    /// `format` is an optional extension hint such as `"png"`; without it the
    /// format is guessed from the data.
    pub fn from_bytes(bytes: &[u8], format: Option<&str>) -> anyhow::Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Ok(Self::from_image(&img))
    }

    pub fn from_image(img: &image::DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            rgba: img.to_rgba8().into_raw(),
        }
    }

    /// Whether the pixel data matches the dimensions.
    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

pub async fn load_texture(path: impl AsRef<Path>) -> anyhow::Result<TextureData> {
    let path = path.as_ref();
    let data = load_binary(path).await?;
    let hint = path.extension().and_then(|ext| ext.to_str());
    let texture = TextureData::from_bytes(&data, hint)?;
    log::info!("loaded {} ({}x{})", path.display(), texture.width, texture.height);
    Ok(texture)
}
