//! Approximator interface and a baseline network.
//!
//! The trainer only needs [`AmortizedSolver::predict`]. [`BoundaryMlp`] is a
//! plain fully connected network that imposes the Dirichlet data exactly:
//!
//! ```text
//! u = interior ⊙ net(f) + boundary_values
//! ```
//!
//! With `smooth_input` the network sees `[f, Â f]`, where `Â` is the
//! normalized adjacency from the [`GraphInfo`] bundle.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

use crate::graph::GraphInfo;

/// Maps a batch of controls to a batch of predicted states.
pub trait AmortizedSolver<B: Backend> {
    /// Predict states [batch, num_dofs] for controls [batch, num_dofs].
    fn predict(&self, controls: Tensor<B, 2>, graph: &GraphInfo<B>) -> Tensor<B, 2>;
}

/// Configuration of [`BoundaryMlp`].
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryMlpConfig {
    /// Degrees of freedom (input and output width)
    pub num_dofs: usize,
    /// Hidden layer widths
    pub hidden: Vec<usize>,
    /// Append the graph-smoothed control to the input
    pub smooth_input: bool,
}

impl BoundaryMlpConfig {
    /// Two hidden layers of width `2 * num_dofs`, no smoothing.
    pub fn new(num_dofs: usize) -> Self {
        Self {
            num_dofs,
            hidden: vec![2 * num_dofs, 2 * num_dofs],
            smooth_input: false,
        }
    }

    /// Set the hidden layer widths.
    pub fn with_hidden(mut self, hidden: Vec<usize>) -> Self {
        self.hidden = hidden;
        self
    }

    /// Feed `[f, Â f]` instead of `f`.
    pub fn with_smooth_input(mut self, smooth: bool) -> Self {
        self.smooth_input = smooth;
        self
    }

    /// Initialize the network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BoundaryMlp<B> {
        let input = if self.smooth_input {
            2 * self.num_dofs
        } else {
            self.num_dofs
        };

        let mut widths = Vec::with_capacity(self.hidden.len() + 2);
        widths.push(input);
        widths.extend(self.hidden.iter().copied());
        widths.push(self.num_dofs);

        let layers = widths
            .windows(2)
            .map(|w| LinearConfig::new(w[0], w[1]).init(device))
            .collect();

        BoundaryMlp {
            layers,
            activation: Relu::new(),
            smooth_input: self.smooth_input,
        }
    }
}

/// Fully connected network with hard Dirichlet boundary values.
#[derive(Module, Debug)]
pub struct BoundaryMlp<B: Backend> {
    layers: Vec<Linear<B>>,
    activation: Relu,
    smooth_input: bool,
}

impl<B: Backend> BoundaryMlp<B> {
    /// Raw network output before the boundary values are imposed.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = input;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i < last {
                x = self.activation.forward(x);
            }
        }
        x
    }
}

impl<B: Backend> AmortizedSolver<B> for BoundaryMlp<B> {
    fn predict(&self, controls: Tensor<B, 2>, graph: &GraphInfo<B>) -> Tensor<B, 2> {
        let input = if self.smooth_input {
            let smoothed = graph.normalized_adjacency().apply(controls.clone());
            Tensor::cat(vec![controls, smoothed], 1)
        } else {
            controls
        };

        let interior = graph.interior().clone().unsqueeze_dim::<2>(0);
        let boundary = graph.boundary_values().clone().unsqueeze_dim::<2>(0);
        self.forward(input).mul(interior).add(boundary)
    }
}
