//! OpenVINO runtime
//!
//! Loads checkpoints into compiled networks. One `Core` is shared by every
//! handle; compiled networks are independent and safe to run concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use ndarray::{ArrayD, IxDyn};
use openvino::{CompiledModel, Core, ElementType, InferRequest, Shape, Tensor};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::model::{Model, ModelLoader};

/// Upper bound on the number of outputs probed after inference
const MAX_OUTPUTS: usize = 16;

/// OpenVINO core, only touched under `Runtime`'s lock
struct CoreCell(Core);

// SAFETY: every access goes through the `RwLock` in `Runtime`.
unsafe impl Send for CoreCell {}
unsafe impl Sync for CoreCell {}

/// Compiled network shared between concurrent forward passes. The lock
/// covers request creation only; inference runs unlocked.
struct SharedCompiled(Mutex<CompiledModel>);

// SAFETY: the compiled model is only reached through the mutex.
unsafe impl Send for SharedCompiled {}
unsafe impl Sync for SharedCompiled {}

impl SharedCompiled {
    fn infer_request(&self) -> Result<InferRequest> {
        Ok(self.0.lock().create_infer_request()?)
    }
}

/// Shared OpenVINO core bound to one device
pub struct Runtime {
    core: RwLock<CoreCell>,
    device: String,
}

impl Runtime {
    pub fn new(device: &str) -> Result<Self> {
        let core = Core::new()?;
        Ok(Self {
            core: RwLock::new(CoreCell(core)),
            device: device.to_string(),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Read and compile a checkpoint
    pub fn load(&self, path: &Path) -> Result<CompiledNetwork> {
        let path_str = checkpoint_str(path)?;

        info!("Loading checkpoint {} on {}", path.display(), self.device);
        let start = Instant::now();

        let mut guard = self.core.write();
        let core = &mut guard.0;
        let model = core
            .read_model_from_file(path_str, "")
            .with_context(|| format!("failed to read {}", path.display()))?;
        let compiled = core.compile_model(&model, self.device.as_str().into())?;

        info!("Checkpoint {} compiled in {:?}", path.display(), start.elapsed());

        Ok(CompiledNetwork {
            compiled: SharedCompiled(Mutex::new(compiled)),
            device: self.device.clone(),
            checkpoint: path.to_path_buf(),
        })
    }
}

impl ModelLoader for Runtime {
    fn load(&self, checkpoint: &Path) -> Result<Arc<dyn Model>> {
        Ok(Arc::new(Runtime::load(self, checkpoint)?))
    }
}

/// A compiled checkpoint
pub struct CompiledNetwork {
    compiled: SharedCompiled,
    device: String,
    checkpoint: PathBuf,
}

impl CompiledNetwork {
    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }
}

impl Model for CompiledNetwork {
    fn device(&self) -> &str {
        &self.device
    }

    fn forward(&self, inputs: &[(&str, &ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>> {
        let mut request = self.compiled.infer_request()?;

        // Tensors must outlive the request's use of them
        let mut tensors = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            tensors.push((*name, write_tensor(array)?));
        }
        for (name, tensor) in &tensors {
            request
                .set_tensor(name, tensor)
                .with_context(|| format!("failed to bind input `{}`", name))?;
        }

        request.infer()?;

        let mut outputs = Vec::new();
        for index in 0..MAX_OUTPUTS {
            match request.get_output_tensor_by_index(index) {
                Ok(tensor) => outputs.push(read_tensor(&tensor)?),
                Err(_) => break,
            }
        }
        debug!("Forward pass on {} produced {} outputs", self.checkpoint.display(), outputs.len());

        Ok(outputs)
    }
}

/// Check a checkpoint exists and can be handed to OpenVINO
fn checkpoint_str(path: &Path) -> Result<&str> {
    if !path.exists() {
        anyhow::bail!("checkpoint not found: {}", path.display());
    }
    path.to_str()
        .with_context(|| format!("checkpoint path is not valid UTF-8: {}", path.display()))
}

/// Copy an array into a new OpenVINO tensor
fn write_tensor(array: &ArrayD<f32>) -> Result<Tensor> {
    let dims: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let shape = Shape::new(&dims)?;
    let mut tensor = Tensor::new(ElementType::F32, &shape)?;

    let contiguous = array.as_standard_layout();
    let data = contiguous
        .as_slice()
        .context("tensor is not contiguous")?;
    unsafe {
        let tensor_data = tensor.get_raw_data_mut()?.as_mut_ptr() as *mut f32;
        std::ptr::copy_nonoverlapping(data.as_ptr(), tensor_data, data.len());
    }

    Ok(tensor)
}

/// Read an f32 OpenVINO tensor into an array
fn read_tensor(tensor: &Tensor) -> Result<ArrayD<f32>> {
    let shape = tensor.get_shape()?;
    let dims: Vec<usize> = shape.get_dimensions().iter().map(|&d| d as usize).collect();
    let total_elements: usize = dims.iter().product();

    let data: Vec<f32> = unsafe {
        let ptr = tensor.get_raw_data()?.as_ptr() as *const f32;
        std::slice::from_raw_parts(ptr, total_elements).to_vec()
    };

    Ok(ArrayD::from_shape_vec(IxDyn(&dims), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let err = checkpoint_str(Path::new("saves/does-not-exist.xml")).unwrap_err();
        assert!(err.to_string().contains("checkpoint not found"));
    }

    #[test]
    fn test_existing_checkpoint() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = checkpoint_str(file.path()).unwrap();
        assert_eq!(Path::new(path), file.path());
    }
}
