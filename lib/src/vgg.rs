//! The convolutional half of VGG19, used as a frozen feature extractor.
//!
//! Weights are read from a checkpoint using the torchvision naming
//! (`features.{index}.weight`, `features.{index}.bias`), so both the
//! torchvision `.pth` files and their `.safetensors` conversions can be used
//! directly.

use crate::Error;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};
use std::{fmt, path::Path, str::FromStr};

/// A named tap into the network, identified by its position in the
/// sequential `features` stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VggLayer {
    name: &'static str,
    index: usize,
}

impl VggLayer {
    pub const CONV1_1: Self = Self::new("conv1_1", 0);
    pub const CONV1_2: Self = Self::new("conv1_2", 2);
    pub const CONV2_1: Self = Self::new("conv2_1", 5);
    pub const CONV2_2: Self = Self::new("conv2_2", 7);
    pub const CONV3_1: Self = Self::new("conv3_1", 10);
    pub const CONV3_2: Self = Self::new("conv3_2", 12);
    pub const CONV3_3: Self = Self::new("conv3_3", 14);
    pub const CONV3_4: Self = Self::new("conv3_4", 16);
    pub const CONV4_1: Self = Self::new("conv4_1", 19);
    pub const CONV4_2: Self = Self::new("conv4_2", 21);
    pub const CONV4_3: Self = Self::new("conv4_3", 23);
    pub const CONV4_4: Self = Self::new("conv4_4", 25);
    pub const CONV5_1: Self = Self::new("conv5_1", 28);
    pub const CONV5_2: Self = Self::new("conv5_2", 30);
    pub const CONV5_3: Self = Self::new("conv5_3", 32);
    pub const CONV5_4: Self = Self::new("conv5_4", 34);

    /// Every convolution in the network, in forward order.
    pub const ALL: [Self; 16] = [
        Self::CONV1_1,
        Self::CONV1_2,
        Self::CONV2_1,
        Self::CONV2_2,
        Self::CONV3_1,
        Self::CONV3_2,
        Self::CONV3_3,
        Self::CONV3_4,
        Self::CONV4_1,
        Self::CONV4_2,
        Self::CONV4_3,
        Self::CONV4_4,
        Self::CONV5_1,
        Self::CONV5_2,
        Self::CONV5_3,
        Self::CONV5_4,
    ];

    const fn new(name: &'static str, index: usize) -> Self {
        Self { name, index }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|layer| layer.name == name)
    }

    pub fn name(self) -> &'static str {
        self.name
    }

    pub fn index(self) -> usize {
        self.index
    }

    /// The smallest width or height an input can have and still reach this
    /// layer, each max pool in front of it halves the image.
    pub fn min_input_side(self) -> u32 {
        let mut stage = 0;
        let mut pools = 0;

        for block in VGG19_BLOCKS.iter() {
            if stage >= self.index {
                break;
            }

            match block {
                Block::Conv(_) => stage += 2,
                Block::Pool => {
                    pools += 1;
                    stage += 1;
                }
            }
        }

        1 << pools
    }
}

impl fmt::Display for VggLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for VggLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("`{}` is not a VGG19 convolution layer", s))
    }
}

#[derive(Copy, Clone)]
enum Block {
    Conv(usize),
    Pool,
}

/// Output channels of each convolution, with the max pools between them.
const VGG19_BLOCKS: [Block; 21] = [
    Block::Conv(64),
    Block::Conv(64),
    Block::Pool,
    Block::Conv(128),
    Block::Conv(128),
    Block::Pool,
    Block::Conv(256),
    Block::Conv(256),
    Block::Conv(256),
    Block::Conv(256),
    Block::Pool,
    Block::Conv(512),
    Block::Conv(512),
    Block::Conv(512),
    Block::Conv(512),
    Block::Pool,
    Block::Conv(512),
    Block::Conv(512),
    Block::Conv(512),
    Block::Conv(512),
    Block::Pool,
];

#[derive(Debug)]
enum Stage {
    Conv(Conv2d),
    Relu,
    MaxPool,
}

impl Stage {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Conv(conv) => conv.forward(x),
            Self::Relu => x.relu(),
            Self::MaxPool => x.max_pool2d(2),
        }
    }
}

/// Activations captured during a single forward pass, in network order.
pub struct Features {
    pub(crate) maps: Vec<(VggLayer, Tensor)>,
}

impl Features {
    pub fn get(&self, layer: VggLayer) -> Option<&Tensor> {
        self.maps
            .iter()
            .find(|(captured, _)| *captured == layer)
            .map(|(_, map)| map)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VggLayer, &Tensor)> + '_ {
        self.maps.iter().map(|(layer, map)| (*layer, map))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// A frozen VGG19 feature extractor.
///
/// The weights are plain tensors rather than variables, so no gradient is
/// ever computed for them, and the model can be shared between any number of
/// concurrent sessions behind an `Arc`.
#[derive(Debug)]
pub struct Vgg19 {
    stages: Vec<Stage>,
    device: Device,
}

impl Vgg19 {
    /// Builds the full network.
    pub fn load(vb: VarBuilder<'_>) -> Result<Self, Error> {
        Self::load_through(vb, VggLayer::CONV5_4)
    }

    /// Builds the network up to and including `last`, nothing deeper than
    /// that is loaded or ever evaluated.
    pub fn load_through(vb: VarBuilder<'_>, last: VggLayer) -> Result<Self, Error> {
        let device = vb.device().clone();
        let vb = vb.pp("features");

        let mut stages = Vec::with_capacity(last.index + 1);
        let mut in_channels = 3;

        for block in VGG19_BLOCKS.iter() {
            if stages.len() > last.index {
                break;
            }

            match *block {
                Block::Conv(out_channels) => {
                    let config = Conv2dConfig {
                        padding: 1,
                        ..Default::default()
                    };
                    let conv =
                        candle_nn::conv2d(in_channels, out_channels, 3, config, vb.pp(stages.len()))?;

                    stages.push(Stage::Conv(conv));
                    stages.push(Stage::Relu);
                    in_channels = out_channels;
                }
                Block::Pool => stages.push(Stage::MaxPool),
            }
        }

        stages.truncate(last.index + 1);

        Ok(Self { stages, device })
    }

    /// Loads the full network from a `.safetensors`, `.pth` or `.pt`
    /// checkpoint.
    pub fn from_file<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self, Error> {
        Self::from_file_through(path, VggLayer::CONV5_4, device)
    }

    /// Loads the network up to and including `last` from a checkpoint.
    pub fn from_file_through<P: AsRef<Path>>(
        path: P,
        last: VggLayer,
        device: &Device,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingWeights(path.to_owned()));
        }

        log::info!("loading VGG19 weights through {} from {}", last, path.display());

        let vb = match path.extension().and_then(|ext| ext.to_str()) {
            Some("safetensors") => {
                let tensors = candle_core::safetensors::load(path, device)?;
                VarBuilder::from_tensors(tensors, DType::F32, device)
            }
            Some("pth") | Some("pt") => VarBuilder::from_pth(path, DType::F32, device)?,
            _ => return Err(Error::UnsupportedWeightsFormat(path.to_owned())),
        };

        Self::load_through(vb, last)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The deepest layer this network can be tapped at.
    pub fn deepest_layer(&self) -> Option<VggLayer> {
        VggLayer::ALL
            .iter()
            .copied()
            .take_while(|layer| layer.index < self.stages.len())
            .last()
    }

    /// Runs `input` through the network, capturing the convolution output at
    /// each requested layer. The pass stops as soon as the deepest requested
    /// layer has been captured.
    pub fn extract(&self, input: &Tensor, layers: &[VggLayer]) -> Result<Features, Error> {
        let mut wanted = layers.to_vec();
        wanted.sort_by_key(|layer| layer.index);
        wanted.dedup();

        if let Some(deepest) = wanted.last() {
            if deepest.index >= self.stages.len() {
                return Err(Error::UnloadedLayer(deepest.name));
            }
        }

        let mut maps = Vec::with_capacity(wanted.len());
        let mut x = input.clone();

        for (index, stage) in self.stages.iter().enumerate() {
            if maps.len() == wanted.len() {
                break;
            }

            x = stage.forward(&x)?;

            let next = wanted[maps.len()];
            if next.index == index {
                maps.push((next, x.clone()));
            }
        }

        Ok(Features { maps })
    }
}
