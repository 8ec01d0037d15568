// ============================================================
// Layer 5 — Recurrent Stacks
// ============================================================
// Thin stacking wrappers over burn's own LSTM modules.
//
//   StackedBiLstm  encoder, one call over the whole "<s> input </s>"
//   StackedLstm    decoder, stepped one character at a time
//
// The decoder is stepped (rather than run over a padded sequence)
// so that network steps can interleave with base LM queries on the
// partial output. Each step is a burn `Lstm` call with seq_len = 1
// and the carried state of that layer.

use burn::{
    nn::{BiLstm, BiLstmConfig, Lstm, LstmConfig, LstmState},
    prelude::*,
};

/// Recurrent state of one layer, both tensors shaped [1, hidden].
#[derive(Debug, Clone)]
pub struct CellState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell:   Tensor<B, 2>,
}

impl<B: Backend> CellState<B> {
    pub fn zeros(hidden_size: usize, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros([1, hidden_size], device),
            cell:   Tensor::zeros([1, hidden_size], device),
        }
    }

    fn into_lstm(self) -> LstmState<B, 2> {
        LstmState::new(self.cell, self.hidden)
    }

    fn from_lstm(state: LstmState<B, 2>) -> Self {
        Self { hidden: state.hidden, cell: state.cell }
    }
}

/// `layers` unidirectional LSTMs, each feeding the next.
#[derive(Module, Debug)]
pub struct StackedLstm<B: Backend> {
    pub layers:      Vec<Lstm<B>>,
    pub hidden_size: usize,
}

impl<B: Backend> StackedLstm<B> {
    pub fn new(input_size: usize, hidden_size: usize, layers: usize, device: &B::Device) -> Self {
        let layers = (0..layers)
            .map(|l| {
                let inp = if l == 0 { input_size } else { hidden_size };
                LstmConfig::new(inp, hidden_size, true).init(device)
            })
            .collect();
        Self { layers, hidden_size }
    }

    pub fn zero_state(&self, device: &B::Device) -> Vec<CellState<B>> {
        self.layers
            .iter()
            .map(|_| CellState::zeros(self.hidden_size, device))
            .collect()
    }

    /// x: [1, input]. Runs one step through every layer and returns the
    /// top hidden state, [1, hidden].
    pub fn step(&self, x: Tensor<B, 2>, states: &mut [CellState<B>]) -> Tensor<B, 2> {
        let mut x: Tensor<B, 3> = x.unsqueeze_dim(1);
        for (layer, state) in self.layers.iter().zip(states.iter_mut()) {
            let (out, next) = layer.forward(x, Some(state.clone().into_lstm()));
            *state = CellState::from_lstm(next);
            x = out;
        }
        let [_, _, width] = x.dims();
        x.reshape([1, width])
    }
}

/// `layers` bidirectional LSTMs; layer l > 0 reads both directions of
/// layer l - 1.
#[derive(Module, Debug)]
pub struct StackedBiLstm<B: Backend> {
    pub layers:      Vec<BiLstm<B>>,
    pub hidden_size: usize,
}

impl<B: Backend> StackedBiLstm<B> {
    pub fn new(input_size: usize, hidden_size: usize, layers: usize, device: &B::Device) -> Self {
        let layers = (0..layers)
            .map(|l| {
                let inp = if l == 0 { input_size } else { 2 * hidden_size };
                BiLstmConfig::new(inp, hidden_size, true).init(device)
            })
            .collect();
        Self { layers, hidden_size }
    }

    /// xs: [1, len, input] → [1, 2 * hidden], the forward direction's
    /// state after the last position next to the backward direction's
    /// state after the first. An empty sequence yields zeros.
    pub fn encode(&self, xs: Tensor<B, 3>) -> Tensor<B, 2> {
        let h = self.hidden_size;
        let [_, len, _] = xs.dims();
        if len == 0 {
            return Tensor::zeros([1, 2 * h], &xs.device());
        }

        let mut out = xs;
        for layer in &self.layers {
            out = layer.forward(out, None).0;
        }

        let [_, _, width] = out.dims();
        if width != 2 * h {
            // zero layers: nothing to summarise with
            return Tensor::zeros([1, 2 * h], &out.device());
        }
        let fwd = out.clone().slice([0..1, len - 1..len, 0..h]).reshape([1, h]);
        let bwd = out.slice([0..1, 0..1, h..2 * h]).reshape([1, h]);
        Tensor::cat(vec![fwd, bwd], 1)
    }
}
