use candle_core::Tensor;

/// Computes the normalized Gram matrix of a `(batch, channels, height, width)`
/// feature map.
///
/// Every spatial position contributes the outer product of its channel
/// vector, so the spatial layout is discarded and only channel
/// co-activations (texture) remain. The result is divided by
/// `channels * height * width`, which keeps its magnitude independent of the
/// image resolution. Returns a `(batch, channels, channels)` tensor.
pub fn gram_matrix(features: &Tensor) -> candle_core::Result<Tensor> {
    let (batch, channels, height, width) = features.dims4()?;

    let flat = features.reshape((batch, channels, height * width))?;
    let gram = flat.matmul(&flat.t()?.contiguous()?)?;

    gram.affine(1.0 / (channels * height * width) as f64, 0.0)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{Device, IndexOp};

    fn features(channels: usize, height: usize, width: usize) -> Tensor {
        let values: Vec<f32> = (0..channels * height * width)
            .map(|i| ((i * 7919) % 31) as f32 / 7.0 - 2.0)
            .collect();
        Tensor::from_vec(values, (1, channels, height, width), &Device::Cpu).unwrap()
    }

    fn to_rows(gram: &Tensor) -> Vec<Vec<f32>> {
        gram.i(0).unwrap().to_vec2::<f32>().unwrap()
    }

    #[test]
    fn known_values() {
        // two channels over two pixels: [1, 2] and [3, 4]
        let feats = Tensor::from_slice(&[1f32, 2.0, 3.0, 4.0], (1, 2, 1, 2), &Device::Cpu).unwrap();
        let gram = to_rows(&gram_matrix(&feats).unwrap());

        // normalized by 2 * 1 * 2
        assert_eq!(gram, vec![vec![5.0 / 4.0, 11.0 / 4.0], vec![11.0 / 4.0, 25.0 / 4.0]]);
    }

    #[test]
    fn symmetric() {
        let gram = to_rows(&gram_matrix(&features(6, 5, 4)).unwrap());

        for i in 0..6 {
            for j in 0..6 {
                assert!((gram[i][j] - gram[j][i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn positive_semi_definite() {
        let gram = to_rows(&gram_matrix(&features(5, 4, 4)).unwrap());

        let probes: [[f32; 5]; 4] = [
            [1.0, 0.0, 0.0, 0.0, 0.0],
            [1.0, -1.0, 1.0, -1.0, 1.0],
            [0.3, 2.0, -0.7, 0.0, -1.5],
            [-4.0, 0.5, 0.5, 3.0, 0.1],
        ];

        for v in probes.iter() {
            let mut quad = 0.0;
            for i in 0..5 {
                for j in 0..5 {
                    quad += v[i] * gram[i][j] * v[j];
                }
            }
            assert!(quad >= -1e-5, "xᵀGx = {}", quad);
        }
    }

    #[test]
    fn resolution_invariant() {
        let small = features(3, 4, 5);
        let large = small.upsample_nearest2d(8, 10).unwrap();

        let small_gram = to_rows(&gram_matrix(&small).unwrap());
        let large_gram = to_rows(&gram_matrix(&large).unwrap());

        for (a, b) in small_gram.iter().flatten().zip(large_gram.iter().flatten()) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }
}
