//! Backend abstraction for energy evaluation and training.
//!
//! This module provides the `SolverBackend` trait that abstracts over
//! the Burn backends (NdArray, WGPU, CUDA) and their autodiff wrappers,
//! plus the host/device transfer helpers used by every component.
//!
//! All host data is `f32`. Burn converts to the backend float element on
//! upload; downloads are converted back to `f32` so that host-side
//! diagnostics never mix precisions.

use burn::backend::Autodiff;
use burn::prelude::*;
use burn::tensor::TensorData;

use crate::energy::EnergyError;

/// Trait for backends suitable for energy evaluation.
pub trait SolverBackend: Backend {
    /// Get the default device for this backend.
    fn default_device() -> Self::Device;
}

#[cfg(feature = "ndarray")]
impl SolverBackend for burn_ndarray::NdArray<f32> {
    fn default_device() -> Self::Device {
        burn_ndarray::NdArrayDevice::Cpu
    }
}

#[cfg(feature = "wgpu")]
impl SolverBackend for burn_wgpu::Wgpu {
    fn default_device() -> Self::Device {
        burn_wgpu::WgpuDevice::default()
    }
}

#[cfg(feature = "cuda")]
impl SolverBackend for burn_cuda::Cuda {
    fn default_device() -> Self::Device {
        burn_cuda::CudaDevice::default()
    }
}

impl<B: SolverBackend> SolverBackend for Autodiff<B> {
    fn default_device() -> Self::Device {
        B::default_device()
    }
}

/// CPU training backend used by the demo binary and the tests.
#[cfg(feature = "ndarray")]
pub type CpuBackend = burn_ndarray::NdArray<f32>;

/// Autodiff wrapper around [`CpuBackend`].
#[cfg(feature = "ndarray")]
pub type CpuAutodiffBackend = Autodiff<CpuBackend>;

/// Create a 2D tensor from row-major `f32` data.
#[inline]
pub fn tensor_from_rows<B: Backend>(data: &[f32], shape: [usize; 2], device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(data.to_vec(), shape.to_vec()), device)
}

/// Create a 1D tensor from `f32` data.
#[inline]
pub fn tensor_from_slice<B: Backend>(data: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(data.to_vec(), vec![data.len()]), device)
}

/// Create a 1D integer index tensor.
#[inline]
pub fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(data, vec![indices.len()]), device)
}

/// Download a float tensor of any rank to a flat `Vec<f32>`.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>, EnergyError> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| EnergyError::DataTransfer(format!("{e:?}")))
}

/// Download a single-element tensor as `f64`.
pub fn tensor_to_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<f64, EnergyError> {
    let values = tensor_to_vec(tensor)?;
    match values.as_slice() {
        [v] => Ok(f64::from(*v)),
        other => Err(EnergyError::DataTransfer(format!(
            "expected a single element, got {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
#[cfg(feature = "ndarray")]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_rows() {
        let device = CpuBackend::default_device();
        let t = tensor_from_rows::<CpuBackend>(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3], &device);
        assert_eq!(t.dims(), [2, 3]);
        let back = tensor_to_vec(t).unwrap();
        assert_eq!(back, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_scalar_download_rejects_vectors() {
        let device = CpuBackend::default_device();
        let t = tensor_from_slice::<CpuBackend>(&[1.0, 2.0], &device);
        assert!(tensor_to_scalar(t).is_err());

        let s = tensor_from_slice::<CpuBackend>(&[2.5], &device);
        assert_eq!(tensor_to_scalar(s).unwrap(), 2.5);
    }
}
