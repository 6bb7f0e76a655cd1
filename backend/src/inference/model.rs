use std::path::{Path, PathBuf};

use shared::ModelMetadata;

use super::backend::{load_backend, ModelBackend};
use super::preprocess::{image_to_batch, load_image};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to read image: {0}")]
    Unreadable(std::io::Error),
    #[error("Failed to build input tensor: {0}")]
    Tensor(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced no outputs")]
    EmptyOutput,
}

impl InferenceError {
    /// True when the uploaded file itself is the problem rather than the runtime.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, InferenceError::Decode(_) | InferenceError::Unreadable(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model artifact not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("Unsupported model artifact: {}", .0.display())]
    UnsupportedArtifact(PathBuf),
    #[error("Model artifact {} needs the `{feature}` feature", .path.display())]
    FeatureDisabled {
        path: PathBuf,
        feature: &'static str,
    },
    #[error("Failed to load model: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub probabilities: Vec<f32>,
}

/// Loaded once at startup and shared read-only by every request.
pub struct Model {
    backend: Box<dyn ModelBackend>,
    metadata: ModelMetadata,
}

impl Model {
    pub fn load(model_path: &Path, metadata: ModelMetadata) -> Result<Self, ModelLoadError> {
        let backend = load_backend(model_path, &metadata.input)?;
        log::info!(
            "Model loaded from {} ({} backend, {} input, {} labels)",
            model_path.display(),
            backend.name(),
            metadata.input.layout,
            metadata.labels.len()
        );
        Ok(Self::with_backend(backend, metadata))
    }

    pub fn with_backend(backend: Box<dyn ModelBackend>, metadata: ModelMetadata) -> Self {
        Self { backend, metadata }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn predict(&self, image_path: &Path) -> Result<Prediction, InferenceError> {
        let image = load_image(image_path)?;
        let batch = image_to_batch(&image, &self.metadata.input);
        let mut outputs = self.backend.forward(&batch)?;
        if self.metadata.softmax {
            softmax_in_place(&mut outputs);
        }

        let class_index = argmax(&outputs).ok_or(InferenceError::EmptyOutput)?;
        Ok(Prediction {
            class_index,
            probabilities: outputs,
        })
    }
}

/// Index of the largest value; ties go to the first occurrence and NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        let is_better = match best {
            None => true,
            Some((_, current)) => value > current || (current.is_nan() && !value.is_nan()),
        };
        if is_better {
            best = Some((index, value));
        }
    }
    best.map(|(index, _)| index)
}

pub fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for value in values.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    if sum > 0.0 {
        for value in values.iter_mut() {
            *value /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::backend::FixedBackend;
    use image::{ImageBuffer, Rgb};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        ImageBuffer::from_pixel(width, height, Rgb([200u8, 30, 60]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn argmax_prefers_first_of_equal_maxima() {
        assert_eq!(argmax(&[0.9, 0.1]), Some(0));
        assert_eq!(argmax(&[0.1, 0.9]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn argmax_ignores_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.3]), Some(1));
        assert_eq!(argmax(&[0.3, f32::NAN, 0.7]), Some(2));
        assert_eq!(argmax(&[f32::NAN]), Some(0));
    }

    #[test]
    fn softmax_normalises_and_preserves_order() {
        let mut values = vec![2.0, 1.0, 0.1];
        softmax_in_place(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(argmax(&values), Some(0));
        assert!(values[0] > values[1] && values[1] > values[2]);
    }

    #[test]
    fn predict_runs_a_fifty_by_fifty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "cell.png", 50, 50);
        let backend = FixedBackend::new(vec![0.9, 0.1]);

        let model = Model::with_backend(Box::new(backend), ModelMetadata::default());
        let prediction = model.predict(&path).unwrap();
        assert_eq!(prediction.class_index, 0);
        assert_eq!(prediction.probabilities, vec![0.9, 0.1]);
    }

    #[test]
    fn predict_resizes_before_the_forward_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "large.png", 320, 240);
        let backend = std::sync::Arc::new(FixedBackend::new(vec![0.2, 0.8]));

        struct Shared(std::sync::Arc<FixedBackend>);
        impl ModelBackend for Shared {
            fn name(&self) -> &'static str {
                "shared"
            }
            fn forward(
                &self,
                batch: &ndarray::Array4<f32>,
            ) -> Result<Vec<f32>, InferenceError> {
                self.0.forward(batch)
            }
        }

        let model = Model::with_backend(Box::new(Shared(backend.clone())), ModelMetadata::default());
        assert_eq!(model.predict(&path).unwrap().class_index, 1);
        assert_eq!(
            backend.seen_shapes.lock().unwrap().as_slice(),
            &[vec![1, 50, 50, 3]]
        );
    }

    #[test]
    fn predict_applies_softmax_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "cell.png", 10, 10);
        let metadata = ModelMetadata {
            softmax: true,
            ..ModelMetadata::default()
        };

        let model = Model::with_backend(Box::new(FixedBackend::new(vec![0.0, 3.0])), metadata);
        let prediction = model.predict(&path).unwrap();
        assert_eq!(prediction.class_index, 1);
        let sum: f32 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn predict_surfaces_decode_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"\x89PNG but not really").unwrap();

        let model = Model::with_backend(Box::new(FixedBackend::new(vec![1.0])), ModelMetadata::default());
        let err = model.predict(&path).unwrap_err();
        assert!(err.is_decode_failure());
    }

    #[test]
    fn predict_rejects_empty_model_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "cell.png", 5, 5);

        let model = Model::with_backend(Box::new(FixedBackend::new(vec![])), ModelMetadata::default());
        let err = model.predict(&path).unwrap_err();
        assert!(matches!(err, InferenceError::EmptyOutput));
        assert!(!err.is_decode_failure());
    }
}
