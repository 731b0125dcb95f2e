use crate::{
    gram::gram_matrix,
    vgg::{Features, Vgg19, VggLayer},
    Error,
};
use candle_core::Tensor;

/// How much each term contributes to the optimized objective.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LossWeights {
    pub content: f64,
    pub style: f64,
    pub tv: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            content: 1.0,
            style: 1e6,
            tv: 1e-4,
        }
    }
}

/// The frozen targets of a run, computed once from the content and style
/// images before optimization starts.
pub struct Targets {
    content_layer: VggLayer,
    content: Tensor,
    grams: Vec<(VggLayer, Tensor)>,
}

impl Targets {
    pub fn compute(
        vgg: &Vgg19,
        content: &Tensor,
        style: &Tensor,
        content_layer: VggLayer,
        style_layers: &[VggLayer],
    ) -> Result<Self, Error> {
        let content_features = vgg.extract(content, &[content_layer])?;
        let content = feature(&content_features, content_layer)?.clone();

        let grams = vgg
            .extract(style, style_layers)?
            .iter()
            .map(|(layer, map)| Ok((layer, gram_matrix(map)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self {
            content_layer,
            content,
            grams,
        })
    }

    /// Every layer the loss needs, so a single forward pass serves all terms.
    pub fn layers(&self) -> Vec<VggLayer> {
        std::iter::once(self.content_layer)
            .chain(self.grams.iter().map(|(layer, _)| *layer))
            .collect()
    }

    pub fn content_layer(&self) -> VggLayer {
        self.content_layer
    }

    /// The target Gram matrix for a style layer.
    pub fn gram(&self, layer: VggLayer) -> Option<&Tensor> {
        self.grams
            .iter()
            .find(|(target, _)| *target == layer)
            .map(|(_, gram)| gram)
    }
}

/// The weighted loss terms of one step, still attached to the graph.
pub struct Loss {
    pub total: Tensor,
    content: Tensor,
    style: Tensor,
    tv: Tensor,
}

impl Loss {
    /// Copies each weighted term back as a plain number, this forces a
    /// device sync so it's only done when the values are reported.
    pub fn breakdown(&self) -> Result<LossBreakdown, Error> {
        Ok(LossBreakdown {
            content: self.content.to_scalar::<f32>()?,
            style: self.style.to_scalar::<f32>()?,
            tv: self.tv.to_scalar::<f32>()?,
            total: self.total.to_scalar::<f32>()?,
        })
    }
}

/// The weighted loss terms of one step.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LossBreakdown {
    pub content: f32,
    pub style: f32,
    pub tv: f32,
    pub total: f32,
}

fn feature(features: &Features, layer: VggLayer) -> Result<&Tensor, Error> {
    features
        .get(layer)
        .ok_or_else(|| Error::UnloadedLayer(layer.name()))
}

/// Mean squared error between the current and target content features.
pub fn content_loss(current: &Tensor, target: &Tensor) -> candle_core::Result<Tensor> {
    candle_nn::loss::mse(current, target)
}

/// Mean squared error between current and target Gram matrices, summed over
/// every style layer.
pub fn style_loss(features: &Features, targets: &Targets) -> Result<Tensor, Error> {
    let mut sum = Tensor::zeros((), targets.content.dtype(), targets.content.device())?;

    for (layer, target) in &targets.grams {
        let gram = gram_matrix(feature(features, *layer)?)?;
        sum = sum.add(&candle_nn::loss::mse(&gram, target)?)?;
    }

    Ok(sum)
}

/// Mean absolute difference between vertically adjacent pixels plus the same
/// for horizontally adjacent pixels. A dimension with a single pixel has no
/// neighbors and contributes nothing.
pub fn total_variation(image: &Tensor) -> candle_core::Result<Tensor> {
    let (_, _, height, width) = image.dims4()?;
    let mut tv = Tensor::zeros((), image.dtype(), image.device())?;

    if height > 1 {
        let below = image.narrow(2, 1, height - 1)?;
        let above = image.narrow(2, 0, height - 1)?;
        tv = tv.add(&below.sub(&above)?.abs()?.mean_all()?)?;
    }

    if width > 1 {
        let right = image.narrow(3, 1, width - 1)?;
        let left = image.narrow(3, 0, width - 1)?;
        tv = tv.add(&right.sub(&left)?.abs()?.mean_all()?)?;
    }

    Ok(tv)
}

/// Combines the three terms into the scalar that is minimized:
/// `content * content_loss + style * style_loss + tv * total_variation`.
pub fn compose(
    features: &Features,
    image: &Tensor,
    targets: &Targets,
    weights: &LossWeights,
) -> Result<Loss, Error> {
    let current = feature(features, targets.content_layer)?;

    let content = content_loss(current, &targets.content)?.affine(weights.content, 0.0)?;
    let style = style_loss(features, targets)?.affine(weights.style, 0.0)?;
    let tv = total_variation(image)?.affine(weights.tv, 0.0)?;

    let total = content.add(&style)?.add(&tv)?;

    Ok(Loss {
        total,
        content,
        style,
        tv,
    })
}
