use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use super::backend::ModelBackend;
use super::model::{InferenceError, ModelLoadError};

/// TorchScript classifier. libtorch modules are not assumed reentrant, so
/// forward passes are serialised through the mutex.
pub struct TorchBackend {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchBackend {
    pub fn load(model_path: &Path) -> Result<Self, ModelLoadError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)
            .map_err(|e| ModelLoadError::Runtime(e.to_string()))?;
        log::info!("TorchScript module loaded on {:?}", device);

        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl ModelBackend for TorchBackend {
    fn name(&self) -> &'static str {
        "torch"
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let data = batch
            .as_slice()
            .ok_or_else(|| InferenceError::Tensor("input batch is not contiguous".into()))?;
        let shape: Vec<i64> = batch.shape().iter().map(|&d| d as i64).collect();
        let input = Tensor::from_slice(data)
            .view(shape.as_slice())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".into()))?;
        let output = tch::no_grad(|| module.forward_ts(&[input]))
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
