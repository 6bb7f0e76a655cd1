use std::path::Path;

use ndarray::Array4;
use shared::InputSpec;

use super::model::{InferenceError, ModelLoadError};

/// A runtime able to execute the classifier's forward pass on one batch.
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the flattened output row for the single image in `batch`.
    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Picks a runtime from the artifact extension.
pub fn load_backend(
    model_path: &Path,
    input: &InputSpec,
) -> Result<Box<dyn ModelBackend>, ModelLoadError> {
    if !model_path.is_file() {
        return Err(ModelLoadError::Missing(model_path.to_path_buf()));
    }

    let extension = model_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "onnx" => load_onnx(model_path, input),
        "pt" | "pth" => load_torchscript(model_path),
        _ => Err(ModelLoadError::UnsupportedArtifact(model_path.to_path_buf())),
    }
}

#[cfg(feature = "tract")]
fn load_onnx(
    model_path: &Path,
    input: &InputSpec,
) -> Result<Box<dyn ModelBackend>, ModelLoadError> {
    let backend = super::tract_backend::TractBackend::load(model_path, input)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "tract"))]
fn load_onnx(
    model_path: &Path,
    _input: &InputSpec,
) -> Result<Box<dyn ModelBackend>, ModelLoadError> {
    Err(ModelLoadError::FeatureDisabled {
        path: model_path.to_path_buf(),
        feature: "tract",
    })
}

#[cfg(feature = "torch")]
fn load_torchscript(model_path: &Path) -> Result<Box<dyn ModelBackend>, ModelLoadError> {
    let backend = super::torch_backend::TorchBackend::load(model_path)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(model_path: &Path) -> Result<Box<dyn ModelBackend>, ModelLoadError> {
    Err(ModelLoadError::FeatureDisabled {
        path: model_path.to_path_buf(),
        feature: "torch",
    })
}

/// Backend with a canned output, for exercising the pipeline without a model file.
#[cfg(test)]
pub struct FixedBackend {
    pub outputs: Vec<f32>,
    pub seen_shapes: std::sync::Mutex<Vec<Vec<usize>>>,
}

#[cfg(test)]
impl FixedBackend {
    pub fn new(outputs: Vec<f32>) -> Self {
        Self {
            outputs,
            seen_shapes: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl ModelBackend for FixedBackend {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        self.seen_shapes.lock().unwrap().push(batch.shape().to_vec());
        Ok(self.outputs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_backend(&dir.path().join("my_model.onnx"), &InputSpec::default());
        assert!(matches!(result, Err(ModelLoadError::Missing(_))));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my_model.h5");
        std::fs::write(&path, b"weights").unwrap();
        let result = load_backend(&path, &InputSpec::default());
        assert!(matches!(result, Err(ModelLoadError::UnsupportedArtifact(_))));
    }

    #[test]
    fn corrupt_artifact_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["broken.onnx", "broken.pt"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"not a model").unwrap();
            assert!(load_backend(&path, &InputSpec::default()).is_err());
        }
    }
}
