// BEGIN - Embark standard lints v0.4
// do not change or add/remove here, but one can add exceptions after this section
// for more info see: <https://github.com/EmbarkStudios/rust-ecosystem/issues/59>
#![deny(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::todo,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]
// END - Embark standard lints v0.4

//! `neural-style` is a light API for neural style transfer: the pixels of an
//! image are optimized so that its VGG19 features match the structure of a
//! content image and the texture statistics of a style image.
//!
//! First, you build a `Session` via a `SessionBuilder`, which follows the builder pattern. Calling
//! `build` on the `SessionBuilder` loads the content and style images as well as the network
//! weights, and checks for various errors.
//!
//! `Session` has a `run()` method that runs the optimizer for a fixed number of steps and returns
//! the result as a `StylizedImage`.
//!
//! You can save, stream, or inspect the image from `StylizedImage`.
//!
//! ## Weights
//!
//! The network weights are not bundled. Any VGG19 checkpoint using the torchvision naming works,
//! either the original `.pth` file or a `.safetensors` conversion of it. A loaded `Vgg19` is
//! immutable and can be shared between sessions with an `Arc`.
//!
//! ## Usage
//! Session follows a "builder pattern" for defining parameters, meaning you chain functions together.
//!
//! ```no_run
//! // Create a new session with default parameters
//! let session = neural_style::Session::builder()
//!     // Set some parameters
//!     .steps(150)
//!     .style_weight(1e6)
//!     // Specify the images
//!     .content(&"imgs/tom.jpg")
//!     .style(&"imgs/starry_night.jpg")
//!     .max_size(384)
//!     // And where to find the network
//!     .weights_file(&"vgg19.safetensors")
//!     // Build the session
//!     .build().expect("failed to build session");
//!
//! // Stylize the content image
//! let stylized = session.run(None).expect("failed to stylize");
//!
//! // Save the stylized image to disk
//! stylized.save("my_stylized_img.jpg").expect("failed to save stylized image");
//! ```
mod device;
mod errors;
mod gram;
mod loss;
mod normalize;
pub mod session;
mod utils;
mod vgg;

pub use candle_core;
pub use image;
use std::path::Path;

pub use device::DeviceSelector;
pub use errors::Error;
pub use gram::gram_matrix;
pub use loss::{compose, content_loss, style_loss, total_variation};
pub use loss::{Loss, LossBreakdown, LossWeights, Targets};
pub use normalize::Normalization;
pub use session::{ProgressUpdate, Session, SessionBuilder, TransferProgress};
pub use utils::{load_dynamic_image, load_image, ImageSource};
pub use vgg::{Features, Vgg19, VggLayer};

struct Parameters {
    steps: u32,
    weights: LossWeights,
    learning_rate: f64,
    content_layer: VggLayer,
    style_layers: Vec<VggLayer>,
    max_size: Option<u32>,
    device: DeviceSelector,
    normalization: Normalization,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            steps: 200,
            weights: LossWeights::default(),
            learning_rate: 0.03,
            content_layer: VggLayer::CONV4_2,
            style_layers: vec![
                VggLayer::CONV1_1,
                VggLayer::CONV2_1,
                VggLayer::CONV3_1,
                VggLayer::CONV4_1,
                VggLayer::CONV5_1,
            ],
            max_size: None,
            device: DeviceSelector::Auto,
            normalization: Normalization::IMAGENET,
        }
    }
}

impl Parameters {
    /// The deepest layer any loss term taps, the network is never evaluated
    /// past it.
    fn deepest_layer(&self) -> VggLayer {
        self.style_layers
            .iter()
            .copied()
            .chain(std::iter::once(self.content_layer))
            .max_by_key(|layer| layer.index())
            .unwrap_or(self.content_layer)
    }
}

/// An image produced by a `Session::run()`
pub struct StylizedImage {
    inner: image::RgbImage,
}

impl StylizedImage {
    /// Saves the stylized image to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent_path) = path.parent() {
            std::fs::create_dir_all(&parent_path)?;
        }

        self.inner.save(&path)?;
        Ok(())
    }

    /// Writes the stylized image to the specified stream
    pub fn write<W: std::io::Write>(
        self,
        writer: &mut W,
        fmt: image::ImageOutputFormat,
    ) -> Result<(), Error> {
        let dyn_img = self.into_image();
        Ok(dyn_img.write_to(writer, fmt)?)
    }

    /// Returns the stylized output image
    pub fn into_image(self) -> image::DynamicImage {
        image::DynamicImage::ImageRgb8(self.inner)
    }
}

impl AsRef<image::RgbImage> for StylizedImage {
    fn as_ref(&self) -> &image::RgbImage {
        &self.inner
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deepest_layer_covers_content_and_style() {
        let mut params = Parameters::default();
        assert_eq!(params.deepest_layer(), VggLayer::CONV5_1);

        params.style_layers = vec![VggLayer::CONV1_1];
        assert_eq!(params.deepest_layer(), VggLayer::CONV4_2);

        params.content_layer = VggLayer::CONV1_2;
        params.style_layers = vec![VggLayer::CONV2_1, VggLayer::CONV1_1];
        assert_eq!(params.deepest_layer(), VggLayer::CONV2_1);
    }

    #[test]
    fn save_creates_directories() {
        let img = StylizedImage {
            inner: image::RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3])),
        };

        let dir = std::env::temp_dir().join("neural-style-save-test");
        let path = dir.join("nested").join("out.png");
        img.save(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert_eq!(*loaded.get_pixel(2, 2), image::Rgb([1, 2, 3]));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
