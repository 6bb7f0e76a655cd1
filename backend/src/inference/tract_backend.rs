use std::path::Path;

use ndarray::Array4;
use shared::InputSpec;
use tract_onnx::prelude::*;

use super::backend::ModelBackend;
use super::model::{InferenceError, ModelLoadError};
use super::preprocess::batch_shape;

/// ONNX classifier executed in-process by tract.
pub struct TractBackend {
    plan: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_shape: [usize; 4],
}

impl TractBackend {
    pub fn load(model_path: &Path, input: &InputSpec) -> Result<Self, ModelLoadError> {
        let input_shape = batch_shape(input.layout);
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| ModelLoadError::Runtime(format!("{:#}", e)))?;

        Ok(Self { plan, input_shape })
    }
}

impl ModelBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract-onnx"
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        if batch.shape() != self.input_shape {
            return Err(InferenceError::Tensor(format!(
                "expected input shape {:?}, got {:?}",
                self.input_shape,
                batch.shape()
            )));
        }
        let data = batch
            .as_slice()
            .ok_or_else(|| InferenceError::Tensor("input batch is not contiguous".into()))?;
        let input = Tensor::from_shape::<f32>(&self.input_shape, data)
            .map_err(|e| InferenceError::Tensor(e.to_string()))?;

        let outputs = self
            .plan
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| InferenceError::Model(format!("{:#}", e)))?;
        let output = outputs.first().ok_or(InferenceError::EmptyOutput)?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        Ok(view.iter().copied().collect())
    }
}
