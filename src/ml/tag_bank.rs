// ============================================================
// Layer 5 — Tag Bank
// ============================================================
// One (network, optimiser) pair per morphological tag:
//
//   tag 0 → TagSlot { model: TransducerModel, optim: Adadelta state }
//   tag 1 → TagSlot { ... }
//   ...
//
// A slot is only ever created whole, so its optimiser can never be
// pointed at another slot's parameters, and nothing outside this
// file can reach into a slot to swap either half. A training step
// touches exactly one slot: the gradients come from a loss built
// from that slot's model alone.
//
// Slots exist for every tag in the tag vocabulary, including tags
// that never occur in the data, so tag ids stay valid indices.

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::domain::{
    example::{CharId, TagId},
    traits::CharLanguageModel,
};
use crate::ml::{
    error::TransducerError,
    model::{TransducerBank, TransducerConfig, TransducerModel},
    model::to_f32_vec,
    numeric::{ensure_all_finite, ensure_finite, ensure_params_finite},
    optim::{Adadelta, AdadeltaConfig},
};

/// Adadelta takes unit steps; its scale comes from the accumulated updates.
const LEARNING_RATE: f64 = 1.0;

type TagOptimizer<B> = OptimizerAdaptor<Adadelta, TransducerModel<B>, B>;

struct TagSlot<B: AutodiffBackend> {
    model: TransducerModel<B>,
    optim: TagOptimizer<B>,
}

impl<B: AutodiffBackend> TagSlot<B> {
    fn new(config: &TransducerConfig, optim: &AdadeltaConfig, device: &B::Device) -> Self {
        Self {
            model: config.init(device),
            optim: optim.init(),
        }
    }
}

pub struct TagBank<B: AutodiffBackend> {
    config: TransducerConfig,
    slots:  Vec<TagSlot<B>>,
}

impl<B: AutodiffBackend> TagBank<B> {
    pub fn new(
        config:    TransducerConfig,
        optim:     &AdadeltaConfig,
        tag_count: usize,
        device:    &B::Device,
    ) -> Self {
        let slots = (0..tag_count)
            .map(|_| TagSlot::new(&config, optim, device))
            .collect();
        Self { config, slots }
    }

    pub fn tag_count(&self) -> usize {
        self.slots.len()
    }

    pub fn config(&self) -> &TransducerConfig {
        &self.config
    }

    /// Forward, backward and one optimiser step for a single example,
    /// all confined to the slot of `tag`. Returns the example's loss.
    ///
    /// Fails if the loss, any step distribution or any updated parameter
    /// is NaN or infinite.
    ///
    /// The autodiff graph is owned by the loss tensor and dropped before
    /// this returns, whether the step succeeds or fails.
    pub fn train_example(
        &mut self,
        tag:    TagId,
        input:  &[CharId],
        target: &[CharId],
        lm:     &dyn CharLanguageModel,
    ) -> Result<f32> {
        let tag_count = self.slots.len();
        let slot = self
            .slots
            .get_mut(tag)
            .ok_or(TransducerError::UnknownTag { tag, tag_count })?;

        let (loss, out) = slot.model.forward_loss(input, target, lm)?;
        let value = ensure_finite("training loss", loss.clone().into_scalar().elem::<f32>())?;
        ensure_all_finite("training distribution", &to_f32_vec(out.log_probs)?)?;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &slot.model);
        slot.model = slot.optim.step(LEARNING_RATE, slot.model.clone(), grads);
        ensure_params_finite(&format!("tag {tag} network"), &slot.model)?;

        Ok(value)
    }

    /// Inference copy of every tag's network (no autodiff tracking).
    pub fn snapshot(&self) -> TransducerBank<B::InnerBackend> {
        TransducerBank {
            tags:       self.slots.iter().map(|s| s.model.valid()).collect(),
            vocab_size: self.config.vocab_size,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::numeric::NumericError;
    use crate::ml::test_support::{tiny_config, UniformLm};
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray>;

    fn bank(tags: usize) -> TagBank<B> {
        TagBank::new(tiny_config(), &AdadeltaConfig::new(), tags, &Default::default())
    }

    fn output_weights(bank: &TagBank<B>, tag: usize) -> Vec<f32> {
        to_f32_vec(bank.snapshot().tags[tag].output.weight.val()).unwrap()
    }

    #[test]
    fn test_one_slot_per_tag() {
        let b = bank(3);
        assert_eq!(b.tag_count(), 3);
        assert_eq!(b.snapshot().tag_count(), 3);
    }

    #[test]
    fn test_step_only_touches_its_tag() {
        let mut b = bank(2);
        let lm = UniformLm::new(tiny_config().vocab_size);

        let tag0_before = output_weights(&b, 0);
        let tag1_before = output_weights(&b, 1);

        for _ in 0..3 {
            let loss = b.train_example(0, &[2, 3], &[3, 2], &lm).unwrap();
            assert!(loss >= 0.0);
        }

        assert_ne!(output_weights(&b, 0), tag0_before);
        assert_eq!(output_weights(&b, 1), tag1_before);
    }

    #[test]
    fn test_overflowing_update_is_trapped() {
        let optim = AdadeltaConfig::new().with_weight_decay(1e39);
        let mut b: TagBank<B> = TagBank::new(tiny_config(), &optim, 2, &Default::default());
        let lm = UniformLm::new(tiny_config().vocab_size);

        let err = b.train_example(1, &[2, 3], &[3, 2], &lm).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NumericError>(),
            Some(NumericError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut b = bank(2);
        let lm = UniformLm::new(tiny_config().vocab_size);
        let err = b.train_example(2, &[2], &[3], &lm).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransducerError>(),
            Some(&TransducerError::UnknownTag { tag: 2, tag_count: 2 })
        );
    }
}
