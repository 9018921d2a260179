//! Conversions between `image` buffers and the core pixel types.

use auralize_core::{GrayImage, GrayImageView};
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn gray_from_image(img: &DynamicImage) -> GrayImage {
    let luma = img.to_luma8();
    GrayImage {
        width: luma.width() as usize,
        height: luma.height() as usize,
        data: luma.into_raw(),
    }
}

/// Decode an image file to grayscale.
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, image::ImageError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(gray_from_image(&img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn view_borrows_the_raw_buffer() {
        let img = ::image::GrayImage::from_pixel(5, 3, Luma([42]));
        let view = gray_view(&img);
        assert_eq!((5, 3), (view.width, view.height));
        assert_eq!(42, view.get(4, 2));
    }

    #[test]
    fn color_files_load_as_luma() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("c.png");
        RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]))
            .save(&path)
            .expect("save");
        let gray = load_gray(&path).expect("load");
        assert_eq!(vec![255; 4], gray.data);
    }
}
