//! Combined `Effect` + `ParameterInfo` trait for boxed effects.
//!
//! [`EffectWithParams`] bridges the gap between the object-safe [`Effect`]
//! trait and [`ParameterInfo`]: it provides prefixed methods
//! (`effect_param_count()`, `effect_set_param()`, etc.) that are dispatched
//! through a single vtable. A blanket impl covers every concrete type that
//! implements both traits.
//!
//! This trait lives in `nitido-core` (rather than a higher layer) because
//! both `Effect` and `ParameterInfo` are defined here, and [`EffectChain`]
//! stores `Box<dyn EffectWithParams + Send>` to enable runtime parameter
//! access on chain nodes.
//!
//! [`EffectChain`]: crate::EffectChain

use core::any::Any;

use crate::effect::Effect;
use crate::param_info::{ParamDescriptor, ParamWriteError, ParameterInfo};

/// Helper trait to get parameter info from a boxed effect.
///
/// Since `Box<dyn Effect>` doesn't automatically implement `ParameterInfo`,
/// this trait provides a way to access parameter information if the
/// underlying effect implements it.
pub trait EffectWithParams: Effect {
    /// Get the parameter count.
    fn effect_param_count(&self) -> usize;

    /// Get parameter info by index.
    fn effect_param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Get parameter value by index.
    fn effect_get_param(&self, index: usize) -> f32;

    /// Set parameter value by index, clamping to the valid range.
    fn effect_set_param(&mut self, index: usize, value: f32);

    /// Set parameter value by index, rejecting invalid writes.
    ///
    /// Delegates to [`ParameterInfo::set_param_checked`], so effects that
    /// override the checked setter keep their cross-parameter constraints
    /// when driven through the box.
    fn effect_set_param_checked(&mut self, index: usize, value: f32)
    -> Result<(), ParamWriteError>;

    /// Find a parameter index by name (case-insensitive).
    fn effect_find_param_by_name(&self, name: &str) -> Option<usize>;

    /// Borrow the effect as [`Any`] for downcasting to its concrete type.
    ///
    /// Named parameters cover routine retuning; this is the escape hatch
    /// for callers that need an effect's full API back (typed state
    /// queries, preset application) after boxing it into a chain.
    fn as_any(&self) -> &dyn Any;

    /// Mutable counterpart of [`as_any`](Self::as_any).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// Implement EffectWithParams for all types that implement both Effect and ParameterInfo
impl<T: Effect + ParameterInfo + 'static> EffectWithParams for T {
    fn effect_param_count(&self) -> usize {
        self.param_count()
    }

    fn effect_param_info(&self, index: usize) -> Option<ParamDescriptor> {
        self.param_info(index)
    }

    fn effect_get_param(&self, index: usize) -> f32 {
        self.get_param(index)
    }

    fn effect_set_param(&mut self, index: usize, value: f32) {
        self.set_param(index, value);
    }

    fn effect_set_param_checked(
        &mut self,
        index: usize,
        value: f32,
    ) -> Result<(), ParamWriteError> {
        self.set_param_checked(index, value)
    }

    fn effect_find_param_by_name(&self, name: &str) -> Option<usize> {
        self.find_param_by_name(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
