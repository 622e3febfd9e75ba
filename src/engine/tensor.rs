//! Tensor payloads carried in request arguments and results
//!
//! On the wire a tensor is `{"shape": [..], "data": [..]}` with `data` in
//! row-major order.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Dense `f32` tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TensorRepr", into = "TensorRepr")]
pub struct Tensor(pub ArrayD<f32>);

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TensorRepr {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl TryFrom<TensorRepr> for Tensor {
    type Error = String;

    fn try_from(repr: TensorRepr) -> Result<Self, Self::Error> {
        let expected: usize = repr.shape.iter().product();
        if expected != repr.data.len() {
            return Err(format!(
                "tensor shape {:?} needs {} elements, got {}",
                repr.shape,
                expected,
                repr.data.len()
            ));
        }
        ArrayD::from_shape_vec(IxDyn(&repr.shape), repr.data)
            .map(Tensor)
            .map_err(|e| e.to_string())
    }
}

impl From<Tensor> for TensorRepr {
    fn from(tensor: Tensor) -> Self {
        let shape = tensor.0.shape().to_vec();
        let data = tensor.0.iter().copied().collect();
        TensorRepr { shape, data }
    }
}

impl Tensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn into_inner(self) -> ArrayD<f32> {
        self.0
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(array: ArrayD<f32>) -> Self {
        Tensor(array)
    }
}

/// Check a tensor has the given rank, returning its dimensions
pub(crate) fn expect_rank(name: &str, tensor: &ArrayD<f32>, rank: usize) -> anyhow::Result<Vec<usize>> {
    if tensor.ndim() != rank {
        anyhow::bail!(
            "`{}` must have {} dimensions, got shape {:?}",
            name,
            rank,
            tensor.shape()
        );
    }
    Ok(tensor.shape().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tensor_from_payload() {
        let tensor: Tensor =
            serde_json::from_value(json!({"shape": [2, 3], "data": [0, 1, 2, 3, 4, 5]})).unwrap();
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.0[[1, 2]], 5.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result: Result<Tensor, _> =
            serde_json::from_value(json!({"shape": [2, 2], "data": [1.0, 2.0, 3.0]}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("needs 4 elements"));
    }

    #[test]
    fn test_serialize_transposed_view_in_logical_order() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let transposed = Tensor(array.reversed_axes());
        let value = serde_json::to_value(transposed).unwrap();
        assert_eq!(value, json!({"shape": [2, 2], "data": [1.0, 3.0, 2.0, 4.0]}));
    }

    #[test]
    fn test_expect_rank() {
        let image = ArrayD::<f32>::zeros(IxDyn(&[3, 4, 5]));
        assert_eq!(expect_rank("image", &image, 3).unwrap(), vec![3, 4, 5]);
        assert!(expect_rank("image", &image, 2).is_err());
    }
}
