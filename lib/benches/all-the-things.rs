use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neural_style as ns;
use ns::candle_core::{DType, Device, Tensor};
use rand::{Rng, SeedableRng};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

/// conv1_1, conv1_2 and conv2_1 with seeded random weights, enough to
/// exercise every kind of stage without needing a real checkpoint
fn shallow_model() -> Arc<ns::Vgg19> {
    let mut rng = rand_pcg::Pcg32::seed_from_u64(0);
    let mut tensors = HashMap::new();

    for &(index, in_channels, out_channels) in [(0, 3, 64), (2, 64, 64), (5, 64, 128)].iter() {
        let bound = (6.0 / (in_channels * 9) as f32).sqrt();
        let weight: Vec<f32> = (0..out_channels * in_channels * 9)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();

        tensors.insert(
            format!("features.{}.weight", index),
            Tensor::from_vec(weight, (out_channels, in_channels, 3, 3), &Device::Cpu).unwrap(),
        );
        tensors.insert(
            format!("features.{}.bias", index),
            Tensor::zeros(out_channels, DType::F32, &Device::Cpu).unwrap(),
        );
    }

    let vb = candle_nn::VarBuilder::from_tensors(tensors, DType::F32, &Device::Cpu);
    Arc::new(ns::Vgg19::load_through(vb, ns::VggLayer::CONV2_1).unwrap())
}

fn noise(dim: u32, seed: u64) -> ns::image::RgbImage {
    let mut rng = rand_pcg::Pcg32::seed_from_u64(seed);
    ns::image::RgbImage::from_fn(dim, dim, |_, _| ns::image::Rgb(rng.gen()))
}

fn gram(c: &mut Criterion) {
    let mut group = c.benchmark_group("gram");

    for dim in [16usize, 32, 64, 128].iter() {
        let features = Tensor::ones((1, 64, *dim, *dim), DType::F32, &Device::Cpu).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(dim), &features, |b, features| {
            b.iter(|| black_box(ns::gram_matrix(features).unwrap()));
        });
    }
    group.finish();
}

fn style_transfer(c: &mut Criterion) {
    static DIM: u32 = 16;
    static STEPS: u32 = 10;

    // Build the network once, it's shared by every session just as it
    // would be in a long running service
    let model = shallow_model();

    let mut group = c.benchmark_group("style_transfer");
    group.sample_size(10);

    for dim in [DIM, 2 * DIM, 4 * DIM].iter() {
        let content = noise(*dim, 1);
        let style = noise(*dim, 2);

        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |b, _| {
            b.iter_custom(|iters| {
                let mut total_elapsed = Duration::new(0, 0);
                for _i in 0..iters {
                    let sess = ns::Session::builder()
                        .model(model.clone())
                        .content(content.clone())
                        .style(style.clone())
                        .content_layer(ns::VggLayer::CONV2_1)
                        .style_layers(&[ns::VggLayer::CONV1_1, ns::VggLayer::CONV2_1])
                        .steps(STEPS)
                        .build()
                        .unwrap();

                    let start = Instant::now();
                    black_box(sess.run(None).unwrap());
                    total_elapsed += start.elapsed();
                }

                total_elapsed
            });
        });
    }
    group.finish();
}

criterion_group!(benches, gram, style_transfer);
criterion_main!(benches);
