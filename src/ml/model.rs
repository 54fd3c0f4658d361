use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{
        activation::relu,
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Total downsampling factor: the stride-2 entry conv plus three pooled blocks.
pub const SIZE_DIVISOR: usize = 16;

/// Batch-norm with Keras' settings: moving averages keep 99% of the old
/// statistics (burn's momentum weighs the new batch) and epsilon is 1e-3.
fn batch_norm_config(channels: usize) -> BatchNormConfig {
    BatchNormConfig::new(channels)
        .with_momentum(0.01)
        .with_epsilon(1e-3)
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SegmentationModelConfig {
    pub num_classes:  usize,
    /// Width of the entry block; encoder widths are 2x, 4x, 8x this.
    #[config(default = 32)]
    pub base_filters: usize,
}

impl SegmentationModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentationModel<B> {
        let f = self.base_filters;

        let entry_conv = Conv2dConfig::new([3, f], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let entry_norm = batch_norm_config(f).init(device);

        let mut down   = Vec::new();
        let mut in_ch  = f;
        for filters in [2 * f, 4 * f, 8 * f] {
            down.push(DownBlock::new(in_ch, filters, device));
            in_ch = filters;
        }

        let mut up = Vec::new();
        for filters in [8 * f, 4 * f, 2 * f, f] {
            up.push(UpBlock::new(in_ch, filters, device));
            in_ch = filters;
        }

        let head = Conv2dConfig::new([f, self.num_classes], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        SegmentationModel { entry_conv, entry_norm, down, up, head }
    }
}

/// Depthwise 3x3 conv followed by a pointwise 1x1 conv.
#[derive(Module, Debug)]
pub struct SeparableConv2d<B: Backend> {
    pub depthwise: Conv2d<B>,
    pub pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv2d<B> {
    fn new(in_ch: usize, out_ch: usize, device: &B::Device) -> Self {
        let depthwise = Conv2dConfig::new([in_ch, in_ch], [3, 3])
            .with_groups(in_ch)
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);
        let pointwise = Conv2dConfig::new([in_ch, out_ch], [1, 1]).init(device);
        Self { depthwise, pointwise }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pointwise.forward(self.depthwise.forward(x))
    }
}

/// Encoder block: two separable convs, a 3x3/2 max-pool and a strided
/// 1x1 projection of the block input added back as a residual.
#[derive(Module, Debug)]
pub struct DownBlock<B: Backend> {
    pub conv1:    SeparableConv2d<B>,
    pub norm1:    BatchNorm<B, 2>,
    pub conv2:    SeparableConv2d<B>,
    pub norm2:    BatchNorm<B, 2>,
    pub pool:     MaxPool2d,
    pub residual: Conv2d<B>,
}

impl<B: Backend> DownBlock<B> {
    fn new(in_ch: usize, filters: usize, device: &B::Device) -> Self {
        Self {
            conv1: SeparableConv2d::new(in_ch, filters, device),
            norm1: batch_norm_config(filters).init(device),
            conv2: SeparableConv2d::new(filters, filters, device),
            norm2: batch_norm_config(filters).init(device),
            pool:  MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            residual: Conv2dConfig::new([in_ch, filters], [1, 1])
                .with_stride([2, 2])
                .init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = self.residual.forward(x.clone());

        let x = self.norm1.forward(self.conv1.forward(relu(x)));
        let x = self.norm2.forward(self.conv2.forward(relu(x)));
        self.pool.forward(x) + residual
    }
}

/// Decoder block: two transposed convs, nearest x2 upsampling and a 1x1
/// projection of the upsampled block input added back as a residual.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    pub conv1:    ConvTranspose2d<B>,
    pub norm1:    BatchNorm<B, 2>,
    pub conv2:    ConvTranspose2d<B>,
    pub norm2:    BatchNorm<B, 2>,
    pub residual: Conv2d<B>,
}

impl<B: Backend> UpBlock<B> {
    fn new(in_ch: usize, filters: usize, device: &B::Device) -> Self {
        Self {
            conv1: ConvTranspose2dConfig::new([in_ch, filters], [3, 3])
                .with_padding([1, 1])
                .init(device),
            norm1: batch_norm_config(filters).init(device),
            conv2: ConvTranspose2dConfig::new([filters, filters], [3, 3])
                .with_padding([1, 1])
                .init(device),
            norm2: batch_norm_config(filters).init(device),
            residual: Conv2dConfig::new([in_ch, filters], [1, 1]).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = self.residual.forward(upsample2x(x.clone()));

        let x = self.norm1.forward(self.conv1.forward(relu(x)));
        let x = self.norm2.forward(self.conv2.forward(relu(x)));
        upsample2x(x) + residual
    }
}

fn upsample2x<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    interpolate(
        x,
        [height * 2, width * 2],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

#[derive(Module, Debug)]
pub struct SegmentationModel<B: Backend> {
    pub entry_conv: Conv2d<B>,
    pub entry_norm: BatchNorm<B, 2>,
    pub down:       Vec<DownBlock<B>>,
    pub up:         Vec<UpBlock<B>>,
    pub head:       Conv2d<B>,
}

impl<B: Backend> SegmentationModel<B> {
    /// images: [batch, 3, H, W] → logits: [batch, num_classes, H, W]
    ///
    /// H and W must be multiples of SIZE_DIVISOR.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = relu(self.entry_norm.forward(self.entry_conv.forward(images)));

        for block in &self.down {
            x = block.forward(x);
        }
        for block in &self.up {
            x = block.forward(x);
        }

        self.head.forward(x)
    }

    /// Most likely class per pixel: [batch, H, W].
    pub fn predict_classes(&self, images: Tensor<B, 4>) -> Tensor<B, 3, Int> {
        self.forward(images).argmax(1).squeeze::<3>(1)
    }

    pub fn forward_loss(
        &self,
        images:  Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 4>) {
        let logits = self.forward(images);
        let loss   = pixel_cross_entropy(logits.clone(), targets);
        (loss, logits)
    }
}

/// Sparse categorical cross-entropy averaged over every pixel.
///
/// logits [N, C, H, W] are flattened to [N*H*W, C] and targets
/// [N, H, W] to [N*H*W].
pub fn pixel_cross_entropy<B: Backend>(
    logits:  Tensor<B, 4>,
    targets: Tensor<B, 3, Int>,
) -> Tensor<B, 1> {
    let [n, c, h, w] = logits.dims();
    let logits  = logits.permute([0, 2, 3, 1]).reshape([n * h * w, c]);
    let targets = targets.reshape([n * h * w]);

    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, targets)
}

/// Number of pixels whose argmax class equals the target.
pub fn correct_pixels<B: Backend>(logits: Tensor<B, 4>, targets: Tensor<B, 3, Int>) -> usize {
    let predicted = logits.argmax(1).squeeze::<3>(1);
    predicted
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
