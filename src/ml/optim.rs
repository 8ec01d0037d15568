// ============================================================
// Layer 5 — Adadelta Optimiser
// ============================================================
// Per-parameter adaptive step sizes with L2 weight decay:
//
//   g      = ∇θ + λ·θ
//   E[g²]  = ρ·E[g²] + (1−ρ)·g²
//   Δ      = g · √(E[Δ²] + ε) / √(E[g²] + ε)
//   E[Δ²]  = ρ·E[Δ²] + (1−ρ)·Δ²
//   θ      = θ − lr·Δ
//
// E[g²] and E[Δ²] are the accumulated squared gradients and updates,
// kept per parameter tensor by burn's OptimizerAdaptor. Each adaptor
// instance owns the state of exactly the module it steps, which is
// what binds one optimiser to one tag's parameters.
//
// Reference: Zeiler (2012) ADADELTA: An Adaptive Learning Rate Method

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
    LearningRate,
};

#[derive(Config, Debug)]
pub struct AdadeltaConfig {
    /// Decay of both running averages
    #[config(default = 0.95)]
    pub rho: f64,
    #[config(default = 1e-6)]
    pub epsilon: f64,
    /// L2 regularisation strength λ
    #[config(default = 0.0)]
    pub weight_decay: f64,
}

impl AdadeltaConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Adadelta, M, B> {
        OptimizerAdaptor::from(Adadelta {
            rho:          self.rho,
            epsilon:      self.epsilon,
            weight_decay: self.weight_decay,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Adadelta {
    rho:          f64,
    epsilon:      f64,
    weight_decay: f64,
}

#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub sq_grad:  Tensor<B, D>,
    pub sq_delta: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let grad = if self.weight_decay > 0.0 {
            grad + tensor.clone().mul_scalar(self.weight_decay)
        } else {
            grad
        };

        let (sq_grad, sq_delta) = match state {
            Some(s) => (s.sq_grad, s.sq_delta),
            None    => (tensor.zeros_like(), tensor.zeros_like()),
        };

        let rho = self.rho;
        let eps = self.epsilon;

        let sq_grad = sq_grad.mul_scalar(rho)
            + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);
        let delta = grad
            .mul(sq_delta.clone().add_scalar(eps).sqrt())
            .div(sq_grad.clone().add_scalar(eps).sqrt());
        let sq_delta = sq_delta.mul_scalar(rho)
            + delta.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);

        let tensor = tensor - delta.mul_scalar(lr);
        (tensor, Some(AdadeltaState { sq_grad, sq_delta }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        AdadeltaState {
            sq_grad:  state.sq_grad.to_device(device),
            sq_delta: state.sq_delta.to_device(device),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::to_f32_vec;
    use burn::{backend::NdArray, tensor::TensorData};

    type B = NdArray;

    fn adadelta(weight_decay: f64) -> Adadelta {
        Adadelta { rho: 0.95, epsilon: 1e-6, weight_decay }
    }

    fn scalar(v: f32) -> Tensor<B, 1> {
        Tensor::from_data(TensorData::new(vec![v], [1]), &Default::default())
    }

    #[test]
    fn test_first_step_matches_formula() {
        let opt = adadelta(0.0);
        let (theta, state) =
            SimpleOptimizer::<B>::step(&opt, 1.0, scalar(1.0), scalar(2.0), None);

        // E[g²] = 0.05·4 = 0.2 ; Δ = 2·√1e-6 / √(0.2 + 1e-6)
        let delta = 2.0 * 1e-3 / (0.2f32 + 1e-6).sqrt();
        let theta = to_f32_vec(theta).unwrap()[0];
        assert!((theta - (1.0 - delta)).abs() < 1e-6);

        let state = state.unwrap();
        assert!((to_f32_vec(state.sq_grad).unwrap()[0] - 0.2).abs() < 1e-6);
        assert!((to_f32_vec(state.sq_delta).unwrap()[0] - 0.05 * delta * delta).abs() < 1e-9);
    }

    #[test]
    fn test_steps_move_against_the_gradient_and_grow() {
        let opt = adadelta(0.0);
        let mut theta = scalar(0.0);
        let mut state = None;
        let mut last_step = 0.0f32;

        for _ in 0..5 {
            let before = to_f32_vec(theta.clone()).unwrap()[0];
            let (t, s) = SimpleOptimizer::<B>::step(&opt, 1.0, theta, scalar(1.0), state);
            let after = to_f32_vec(t.clone()).unwrap()[0];
            assert!(after < before);
            // accumulated updates make later steps larger
            assert!(before - after > last_step);
            last_step = before - after;
            theta = t;
            state = s;
        }
    }

    #[test]
    fn test_weight_decay_pulls_towards_zero() {
        let (plain, _) =
            SimpleOptimizer::<B>::step(&adadelta(0.0), 1.0, scalar(3.0), scalar(0.0), None);
        let (decayed, _) =
            SimpleOptimizer::<B>::step(&adadelta(0.1), 1.0, scalar(3.0), scalar(0.0), None);

        assert_eq!(to_f32_vec(plain).unwrap()[0], 3.0);
        assert!(to_f32_vec(decayed).unwrap()[0] < 3.0);
    }
}
