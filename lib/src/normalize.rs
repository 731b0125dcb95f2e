//! Conversion between 8-bit RGB images and the normalized tensors the
//! feature extractor was trained on.

use crate::Error;
use candle_core::{DType, Device, Tensor};

/// Per-channel statistics of the distribution the network expects as input.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    fn default() -> Self {
        Self::IMAGENET
    }
}

impl Normalization {
    /// The statistics of the ImageNet training set, which all of the
    /// torchvision VGG checkpoints were trained with.
    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    /// Converts an image into a `(1, 3, height, width)` tensor, scaling each
    /// channel to `[0, 1]` and then applying `(x - mean) / std`.
    pub fn to_tensor(&self, img: &image::RgbImage, device: &Device) -> Result<Tensor, Error> {
        let (width, height) = img.dimensions();

        let pixels = Tensor::from_slice(img.as_raw(), (height as usize, width as usize, 3), device)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?
            .affine(1.0 / 255.0, 0.0)?;

        let (mean, std) = self.channel_stats(device)?;

        Ok(pixels
            .broadcast_sub(&mean)?
            .broadcast_div(&std)?
            .unsqueeze(0)?)
    }

    /// Reverses `to_tensor`, clamping to the displayable range. This is the
    /// only place clamping happens, the optimized tensor itself is left
    /// untouched.
    pub fn to_image(&self, tensor: &Tensor) -> Result<image::RgbImage, Error> {
        let (batch, channels, height, width) = tensor.dims4()?;
        if batch != 1 || channels != 3 {
            return Err(candle_core::Error::Msg(format!(
                "expected a (1, 3, height, width) image tensor, got {:?}",
                tensor.shape()
            ))
            .into());
        }

        let (mean, std) = self.channel_stats(tensor.device())?;

        let bytes = tensor
            .squeeze(0)?
            .broadcast_mul(&std)?
            .broadcast_add(&mean)?
            .clamp(0f32, 1f32)?
            .affine(255.0, 0.0)?
            .round()?
            .to_dtype(DType::U8)?
            .permute((1, 2, 0))?
            .flatten_all()?
            .to_vec1::<u8>()?;

        image::RgbImage::from_raw(width as u32, height as u32, bytes).ok_or_else(|| {
            candle_core::Error::Msg("pixel buffer doesn't match dimensions".to_owned()).into()
        })
    }

    fn channel_stats(&self, device: &Device) -> Result<(Tensor, Tensor), Error> {
        let mean = Tensor::from_slice(&self.mean, (3, 1, 1), device)?;
        let std = Tensor::from_slice(&self.std, (3, 1, 1), device)?;
        Ok((mean, std))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> image::RgbImage {
        image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 17) as u8, (y * 23) as u8, ((x + y) * 11) as u8])
        })
    }

    #[test]
    fn round_trips_without_optimization() {
        let img = gradient_image(12, 7);
        let norm = Normalization::IMAGENET;

        let tensor = norm.to_tensor(&img, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 7, 12]);

        let back = norm.to_image(&tensor).unwrap();
        assert_eq!(back.dimensions(), img.dimensions());

        for (a, b) in img.as_raw().iter().zip(back.as_raw().iter()) {
            assert!((i16::from(*a) - i16::from(*b)).abs() <= 1, "{} vs {}", a, b);
        }
    }

    #[test]
    fn applies_channel_statistics() {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0]));
        let norm = Normalization::IMAGENET;

        let tensor = norm.to_tensor(&img, &Device::Cpu).unwrap();
        let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();

        let red = (1.0 - 0.485) / 0.229;
        let green = -0.456 / 0.224;
        assert!((values[0] - red).abs() < 1e-5);
        assert!((values[4] - green).abs() < 1e-5);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let tensor = Tensor::from_slice(&[100f32, -100.0, 0.0], (1, 3, 1, 1), &Device::Cpu).unwrap();
        let img = Normalization::IMAGENET.to_image(&tensor).unwrap();

        let pixel = img.get_pixel(0, 0);
        assert_eq!(pixel[0], 255);
        assert_eq!(pixel[1], 0);
        // 0 maps back onto the mean
        assert_eq!(pixel[2], (0.406f32 * 255.0).round() as u8);
    }

    #[test]
    fn rejects_non_image_tensors() {
        let tensor = Tensor::zeros((1, 4, 2, 2), DType::F32, &Device::Cpu).unwrap();
        assert!(Normalization::IMAGENET.to_image(&tensor).is_err());
    }
}
