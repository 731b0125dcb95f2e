use crate::Error;
use std::path::Path;

/// Helper type used to define the source of `ImageSource`'s data
#[derive(Clone)]
pub enum ImageSource<'a> {
    /// A raw buffer of image data, see `image::load_from_memory` for details
    /// on what is supported
    Memory(&'a [u8]),
    /// The path to an image to load from disk. The image format is inferred
    /// from the file extension, see `image::open` for details
    Path(&'a Path),
    /// An already loaded image that is passed directly to the session
    Image(image::DynamicImage),
}

impl<'a> ImageSource<'a> {
    pub fn from_path(path: &'a Path) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<image::DynamicImage> for ImageSource<'a> {
    fn from(img: image::DynamicImage) -> Self {
        Self::Image(img)
    }
}

impl<'a> From<image::RgbImage> for ImageSource<'a> {
    fn from(img: image::RgbImage) -> Self {
        Self::Image(image::DynamicImage::ImageRgb8(img))
    }
}

impl<'a, S> From<&'a S> for ImageSource<'a>
where
    S: AsRef<Path> + 'a,
{
    fn from(path: &'a S) -> Self {
        Self::Path(path.as_ref())
    }
}

pub fn load_dynamic_image(src: ImageSource<'_>) -> Result<image::DynamicImage, image::ImageError> {
    match src {
        ImageSource::Memory(data) => image::load_from_memory(data),
        ImageSource::Path(path) => image::open(path),
        ImageSource::Image(img) => Ok(img),
    }
}

/// Loads an image as RGB, shrinking it so neither side exceeds `max_size`.
/// Aspect ratio is preserved and images are never enlarged.
pub fn load_image(src: ImageSource<'_>, max_size: Option<u32>) -> Result<image::RgbImage, Error> {
    use image::GenericImageView;

    let img = load_dynamic_image(src)?;

    let img = match max_size {
        Some(size) if img.width() > size || img.height() > size => img.thumbnail(size, size),
        _ => img,
    };

    Ok(img.to_rgb8())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shrinks_to_max_size_keeping_aspect() {
        let img = image::RgbImage::new(200, 100);
        let loaded = load_image(img.into(), Some(50)).unwrap();

        assert_eq!(loaded.dimensions(), (50, 25));
    }

    #[test]
    fn never_enlarges() {
        let img = image::RgbImage::new(20, 10);
        let loaded = load_image(img.into(), Some(384)).unwrap();

        assert_eq!(loaded.dimensions(), (20, 10));
    }

    #[test]
    fn drops_alpha() {
        let img = image::RgbaImage::from_pixel(3, 3, image::Rgba([10, 20, 30, 0]));
        let loaded = load_image(image::DynamicImage::ImageRgba8(img).into(), None).unwrap();

        assert_eq!(*loaded.get_pixel(1, 1), image::Rgb([10, 20, 30]));
    }

    #[test]
    fn garbage_bytes_fail_to_load() {
        let garbage = [0u8, 1, 2, 3, 4, 5];
        assert!(matches!(
            load_image(ImageSource::Memory(&garbage), None),
            Err(Error::Image(_))
        ));
    }
}
