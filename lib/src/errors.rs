use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub struct InvalidRange {
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) value: f64,
    pub(crate) name: &'static str,
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' - value '{}' is outside the range of {}-{}",
            self.name, self.value, self.min, self.max
        )
    }
}

#[derive(Debug)]
pub enum Error {
    /// An error in the image library occurred, eg failed to load/save
    Image(image::ImageError),
    /// An error in the tensor backend occurred, eg a shape mismatch or a
    /// tensor missing from the network weights
    Tensor(candle_core::Error),
    /// An input parameter had an invalid range specified
    InvalidRange(InvalidRange),
    /// Io is notoriously error free with no problems, but we cover it just in case!
    Io(std::io::Error),
    /// The content or style image was never provided to the builder
    MissingImage(&'static str),
    /// An input image has a width or height of zero
    EmptyImage(&'static str),
    /// An input image is too small to survive the max pools in front of the
    /// deepest selected layer
    ImageTooSmall { which: &'static str, min_side: u32 },
    /// No style layers were selected, so there is no style to transfer
    NoStyleLayers,
    /// A layer was requested that is deeper than the loaded network
    UnloadedLayer(&'static str),
    /// Neither a weights file nor an already loaded network was provided
    NoModel,
    /// The network weights could not be found at the given path
    MissingWeights(PathBuf),
    /// The network weights file is in a format we can't read
    UnsupportedWeightsFormat(PathBuf),
    /// The user specified an image format we don't support as the output
    UnsupportedOutputFormat(String),
    /// The composed loss became NaN or infinite during optimization
    NonFiniteLoss { step: u32 },
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Image(err) => Some(err),
            Self::Tensor(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(ie) => write!(f, "{}", ie),
            Self::Tensor(te) => write!(f, "{}", te),
            Self::InvalidRange(ir) => write!(f, "{}", ir),
            Self::Io(io) => write!(f, "{}", io),
            Self::MissingImage(which) => write!(f, "no {} image was provided", which),
            Self::EmptyImage(which) => write!(f, "the {} image has no pixels", which),
            Self::ImageTooSmall { which, min_side } => write!(
                f,
                "the {} image must be at least {}x{} pixels to reach the deepest selected layer",
                which, min_side, min_side
            ),
            Self::NoStyleLayers => write!(f, "at least 1 style layer must be selected"),
            Self::UnloadedLayer(layer) => write!(
                f,
                "layer '{}' is deeper than the loaded network, load it with more layers",
                layer
            ),
            Self::NoModel => write!(
                f,
                "no VGG19 weights file or loaded network was provided"
            ),
            Self::MissingWeights(path) => write!(
                f,
                "the VGG19 weights could not be found at '{}'",
                path.display()
            ),
            Self::UnsupportedWeightsFormat(path) => write!(
                f,
                "the weights file '{}' is not a .safetensors, .pth or .pt file",
                path.display()
            ),
            Self::UnsupportedOutputFormat(fmt) => {
                write!(f, "the output format '{}' is not supported", fmt)
            }
            Self::NonFiniteLoss { step } => {
                write!(f, "the loss became non-finite at step {}", step)
            }
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(ie: image::ImageError) -> Self {
        Self::Image(ie)
    }
}

impl From<candle_core::Error> for Error {
    fn from(te: candle_core::Error) -> Self {
        Self::Tensor(te)
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::Io(io)
    }
}
