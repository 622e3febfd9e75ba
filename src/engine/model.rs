//! Network seam used by the inference objects

use std::path::Path;
use std::sync::Arc;

use ndarray::ArrayD;
use anyhow::Result;

/// A loaded network that maps named input tensors to output tensors
pub trait Model: Send + Sync {
    /// Device the network runs on
    fn device(&self) -> &str;

    /// Run one forward pass. Outputs are returned in the network's output order.
    fn forward(&self, inputs: &[(&str, &ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>>;
}

/// Turns checkpoint paths into runnable networks
pub trait ModelLoader: Send + Sync {
    fn load(&self, checkpoint: &Path) -> Result<Arc<dyn Model>>;
}

/// Take the first output of a forward pass
pub(crate) fn first_output(outputs: Vec<ArrayD<f32>>) -> Result<ArrayD<f32>> {
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("network produced no outputs"))
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    type ForwardFn = dyn Fn(&[(&str, &ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>> + Send + Sync;

    /// Model whose forward pass is a closure, recording input names and shapes
    pub struct FnModel {
        forward: Box<ForwardFn>,
        pub calls: Mutex<Vec<Vec<(String, Vec<usize>)>>>,
    }

    impl FnModel {
        pub fn new(
            forward: impl Fn(&[(&str, &ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>> + Send + Sync + 'static,
        ) -> Self {
            Self {
                forward: Box::new(forward),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl Model for FnModel {
        fn device(&self) -> &str {
            "CPU"
        }

        fn forward(&self, inputs: &[(&str, &ArrayD<f32>)]) -> Result<Vec<ArrayD<f32>>> {
            self.calls.lock().push(
                inputs
                    .iter()
                    .map(|(name, t)| (name.to_string(), t.shape().to_vec()))
                    .collect(),
            );
            (self.forward)(inputs)
        }
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
