// ============================================================
// Layer 5 — Numeric Guards
// ============================================================
// Invalid operations, overflow and division by zero show up in
// f32 arithmetic as NaN or ±Inf. Those values must never reach
// an optimiser step or a decoding decision: every loss and every
// distribution coming out of a network (or out of the base LM) is
// checked here, and the first non-finite value stops the run.
// After every optimiser step the updated parameters are checked
// too, so a diverged network never reaches a checkpoint.

use burn::{
    module::{ModuleVisitor, ParamId},
    prelude::*,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NumericError {
    #[error("non-finite value {value} in {what} (index {index})")]
    NonFinite { what: String, index: usize, value: f32 },
}

/// Pass `value` through unchanged if it is finite.
pub fn ensure_finite(what: &str, value: f32) -> Result<f32, NumericError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(NumericError::NonFinite { what: what.to_string(), index: 0, value })
    }
}

/// Check every element of `values`.
pub fn ensure_all_finite(what: &str, values: &[f32]) -> Result<(), NumericError> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(index) => Err(NumericError::NonFinite {
            what: what.to_string(),
            index,
            value: values[index],
        }),
    }
}

/// Walks a module's float parameters and keeps the first non-finite value.
struct ParamScan<'a> {
    what:  &'a str,
    found: Option<NumericError>,
}

impl<B: Backend> ModuleVisitor<B> for ParamScan<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        if self.found.is_some() {
            return;
        }
        let data = tensor.to_data();
        if let Some((index, value)) = data.iter::<f32>().enumerate().find(|(_, v)| !v.is_finite()) {
            self.found = Some(NumericError::NonFinite {
                what: format!("{} (parameter {id})", self.what),
                index,
                value,
            });
        };
    }
}

/// Check every float parameter of `module`.
pub fn ensure_params_finite<B: Backend, M: Module<B>>(
    what:   &str,
    module: &M,
) -> Result<(), NumericError> {
    let mut scan = ParamScan { what, found: None };
    module.visit(&mut scan);
    match scan.found {
        None => Ok(()),
        Some(err) => Err(err),
    }
}
