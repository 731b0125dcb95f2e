use crate::*;
use candle_core::Var;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use std::sync::Arc;

/// Style transfer session.
///
/// Calling `run()` will optimize a new image and return it, consuming the
/// session in the process. You can provide a `TransferProgress`
/// implementation to periodically get updates with a preview of the image
/// being optimized and the current loss.
///
/// # Example
/// ```no_run
/// let session = neural_style::Session::builder()
///     .content(&"imgs/tom.jpg")
///     .style(&"imgs/starry_night.jpg")
///     .weights_file(&"vgg19.safetensors")
///     .steps(150)
///     .build().expect("failed to build session");
///
/// let stylized = session.run(None).expect("failed to stylize");
/// stylized.save("my_stylized_img.jpg").expect("failed to save image");
/// ```
pub struct Session {
    content: image::RgbImage,
    style: image::RgbImage,
    model: Arc<Vgg19>,
    params: Parameters,
}

impl Session {
    /// Creates a new session with default parameters.
    pub fn builder<'a>() -> SessionBuilder<'a> {
        SessionBuilder::default()
    }

    /// Runs the optimizer for the configured number of steps and outputs the
    /// stylized image, which has the same dimensions as the content image.
    ///
    /// The optimized image starts out as a copy of the content image. Every
    /// `max(10, steps / 10)` steps, as well as after the final step, the
    /// progress callback is invoked on this thread with a preview.
    pub fn run(
        self,
        mut progress: Option<Box<dyn TransferProgress>>,
    ) -> Result<StylizedImage, Error> {
        let Self {
            content,
            style,
            model,
            params,
        } = self;

        let device = model.device();
        let norm = params.normalization;

        let content = norm.to_tensor(&content, device)?;
        let style = norm.to_tensor(&style, device)?;

        let targets = Targets::compute(
            &model,
            &content,
            &style,
            params.content_layer,
            &params.style_layers,
        )?;
        let layers = targets.layers();

        let image = Var::from_tensor(&content)?;
        let mut optimizer = AdamW::new(
            vec![image.clone()],
            ParamsAdamW {
                lr: params.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        let steps = params.steps;
        let report_every = (steps / 10).max(10);

        log::info!(
            "stylizing {:?} image for {} steps on {:?}",
            content.dims(),
            steps,
            device
        );

        for step in 1..=steps {
            let features = model.extract(image.as_tensor(), &layers)?;
            let loss = compose(&features, image.as_tensor(), &targets, &params.weights)?;

            if !loss.total.to_scalar::<f32>()?.is_finite() {
                return Err(Error::NonFiniteLoss { step });
            }

            // Gradients are computed fresh from this loss, nothing carries
            // over from the previous step
            optimizer.backward_step(&loss.total)?;

            if step % report_every == 0 || step == steps {
                let breakdown = loss.breakdown()?;
                log::debug!("step {}/{}: {:?}", step, steps, breakdown);

                if let Some(progress) = progress.as_mut() {
                    let preview = norm.to_image(image.as_tensor())?;
                    progress.update(ProgressUpdate {
                        image: &preview,
                        step,
                        total_steps: steps,
                        loss: breakdown,
                    });
                }
            }
        }

        let stylized = norm.to_image(image.as_tensor())?;
        log::info!("finished stylizing after {} steps", steps);

        Ok(StylizedImage { inner: stylized })
    }
}

enum ModelSource<'a> {
    File(&'a Path),
    Loaded(Arc<Vgg19>),
}

/// Builds a session by setting parameters and adding input images, calling
/// `build` loads the images and the network and checks all of the provided
/// inputs, so that a built session can only fail in `run` for numeric
/// reasons
#[derive(Default)]
pub struct SessionBuilder<'a> {
    content: Option<ImageSource<'a>>,
    style: Option<ImageSource<'a>>,
    model: Option<ModelSource<'a>>,
    params: Parameters,
}

impl<'a> SessionBuilder<'a> {
    /// Creates a new `SessionBuilder`, can also be created via
    /// `Session::builder()`
    pub fn new() -> Self {
        Self::default()
    }

    /// The image whose structure is kept. The output has the same
    /// dimensions as this image (after `max_size` is applied).
    pub fn content<I: Into<ImageSource<'a>>>(mut self, content: I) -> Self {
        self.content = Some(content.into());
        self
    }

    /// The image whose texture and colors are transferred onto the content.
    /// It doesn't need to be the same size as the content image.
    pub fn style<I: Into<ImageSource<'a>>>(mut self, style: I) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Loads the VGG19 weights from a `.safetensors`, `.pth` or `.pt` file
    /// when the session is built. Only the layers the session needs are
    /// loaded.
    pub fn weights_file<P: AsRef<Path> + ?Sized>(mut self, path: &'a P) -> Self {
        self.model = Some(ModelSource::File(path.as_ref()));
        self
    }

    /// Uses an already loaded network, which can be shared between any
    /// number of sessions. The session runs on the device the network was
    /// loaded on, ignoring `device`.
    pub fn model(mut self, model: Arc<Vgg19>) -> Self {
        self.model = Some(ModelSource::Loaded(model));
        self
    }

    /// Shrinks the input images so that neither side exceeds `size`,
    /// keeping their aspect ratio.
    pub fn max_size(mut self, size: u32) -> Self {
        self.params.max_size = Some(size);
        self
    }

    /// The number of optimization steps. Zero steps returns the content
    /// image unchanged.
    ///
    /// Default: 200
    pub fn steps(mut self, steps: u32) -> Self {
        self.params.steps = steps;
        self
    }

    /// How strongly the output is pulled toward the content features.
    ///
    /// Default: 1.0
    pub fn content_weight(mut self, weight: f64) -> Self {
        self.params.weights.content = weight;
        self
    }

    /// How strongly the output is pulled toward the style statistics. The
    /// Gram matrices are small numbers, so this is usually very large.
    ///
    /// Default: 1e6
    pub fn style_weight(mut self, weight: f64) -> Self {
        self.params.weights.style = weight;
        self
    }

    /// How strongly high frequency noise is penalized.
    ///
    /// Default: 1e-4
    pub fn tv_weight(mut self, weight: f64) -> Self {
        self.params.weights.tv = weight;
        self
    }

    /// Sets all three loss weights at once.
    pub fn loss_weights(mut self, weights: LossWeights) -> Self {
        self.params.weights = weights;
        self
    }

    /// The Adam learning rate, in normalized pixel units.
    ///
    /// Default: 0.03
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.params.learning_rate = lr;
        self
    }

    /// The layer whose features represent the content.
    ///
    /// Default: `conv4_2`
    pub fn content_layer(mut self, layer: VggLayer) -> Self {
        self.params.content_layer = layer;
        self
    }

    /// The layers whose Gram matrices represent the style.
    ///
    /// Default: `conv1_1`, `conv2_1`, `conv3_1`, `conv4_1`, `conv5_1`
    pub fn style_layers(mut self, layers: &[VggLayer]) -> Self {
        self.params.style_layers = layers.to_vec();
        self
    }

    /// The device to load the network on when using `weights_file`.
    ///
    /// Default: `DeviceSelector::Auto`
    pub fn device(mut self, device: DeviceSelector) -> Self {
        self.params.device = device;
        self
    }

    /// The channel statistics used to convert images to and from tensors.
    ///
    /// Default: `Normalization::IMAGENET`
    pub fn normalization(mut self, norm: Normalization) -> Self {
        self.params.normalization = norm;
        self
    }

    /// Creates a `Session`, or returns an error if invalid parameters,
    /// input images, or network weights were specified.
    pub fn build(self) -> Result<Session, Error> {
        self.check_parameters_validity()?;

        let content = load_input(self.content, "content", self.params.max_size)?;
        let style = load_input(self.style, "style", self.params.max_size)?;

        let deepest = self.params.deepest_layer();

        let model = match self.model {
            Some(ModelSource::File(path)) => {
                let device = self.params.device.select();
                Arc::new(Vgg19::from_file_through(path, deepest, &device)?)
            }
            Some(ModelSource::Loaded(model)) => model,
            None => return Err(Error::NoModel),
        };

        match model.deepest_layer() {
            Some(loaded) if loaded.index() >= deepest.index() => {}
            _ => return Err(Error::UnloadedLayer(deepest.name())),
        }

        let min_side = deepest.min_input_side();
        for &(img, which) in [(&content, "content"), (&style, "style")].iter() {
            if img.width().min(img.height()) < min_side {
                return Err(Error::ImageTooSmall { which, min_side });
            }
        }

        Ok(Session {
            content,
            style,
            model,
            params: self.params,
        })
    }

    fn check_parameters_validity(&self) -> Result<(), Error> {
        let weights = [
            (self.params.weights.content, "content-weight"),
            (self.params.weights.style, "style-weight"),
            (self.params.weights.tv, "tv-weight"),
        ];

        for &(value, name) in weights.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidRange(errors::InvalidRange {
                    min: 0.0,
                    max: f64::MAX,
                    value,
                    name,
                }));
            }
        }

        let lr = self.params.learning_rate;
        if !lr.is_finite() || lr <= 0.0 {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: f64::EPSILON,
                max: f64::MAX,
                value: lr,
                name: "learning-rate",
            }));
        }

        if self.params.max_size == Some(0) {
            return Err(Error::InvalidRange(errors::InvalidRange {
                min: 1.0,
                max: f64::from(u32::MAX),
                value: 0.0,
                name: "max-size",
            }));
        }

        if self.params.style_layers.is_empty() {
            return Err(Error::NoStyleLayers);
        }

        Ok(())
    }
}

fn load_input(
    src: Option<ImageSource<'_>>,
    which: &'static str,
    max_size: Option<u32>,
) -> Result<image::RgbImage, Error> {
    let img = load_image(src.ok_or(Error::MissingImage(which))?, max_size)?;

    if img.width() == 0 || img.height() == 0 {
        return Err(Error::EmptyImage(which));
    }

    Ok(img)
}

/// The state of the optimization at a reporting step
pub struct ProgressUpdate<'a> {
    /// A denormalized preview of the image being optimized
    pub image: &'a image::RgbImage,
    /// The step that was just completed, starting at 1
    pub step: u32,
    /// The total number of steps in the run
    pub total_steps: u32,
    /// The weighted loss terms at this step
    pub loss: LossBreakdown,
}

/// Allows the optimizer to update external callers with the current
/// progress of the style transfer. Updates are delivered synchronously on
/// the optimizing thread, so a slow implementation slows down the run.
pub trait TransferProgress {
    fn update(&mut self, info: ProgressUpdate<'_>);
}

impl<G> TransferProgress for G
where
    G: FnMut(ProgressUpdate<'_>) + Send,
{
    fn update(&mut self, info: ProgressUpdate<'_>) {
        self(info)
    }
}
