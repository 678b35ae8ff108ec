//! CPU execution engine for elementwise and generalized array operations:
//! broadcasting multi-operand iteration, inner-loop signature resolution,
//! buffered (casting/byte-swapping/aligning) execution, reductions, and
//! floating-point error policy.

pub use core_types::{can_cast, ByteOrder, Casting, DataType, Element, TypeKind, ViewDescriptor};
pub use execution::{
    EngineConfig, ErrorMode, ErrorPolicy, FpeHandler, LoopMethod, UFuncEngine, DEFAULT_BUFSIZE,
};
pub use memory::{Buffer, ScratchPool};
pub use tensor::{compute_strides, NdArray, Tensor};
pub use ufx_ops::{
    fpe::FpeCategory, CoreSignature, Identity, InnerLoopFn, UFunc, UFuncError, UFuncRegistry,
};

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_broadcasts_through_the_facade() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let b = Tensor::from_vec(&[10i32, 20, 30], &[3]).unwrap();
        let out = engine.call("add", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].shape(), &[2, 3]);
        assert_eq!(out[0].read_as::<i32>(), vec![11, 22, 33, 14, 25, 36]);
    }

    #[test]
    fn divide_raise_mode_surfaces_the_category() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 0.0], &[2]).unwrap();
        let b = Tensor::from_vec(&[0.0f64, 0.0], &[2]).unwrap();
        let policy =
            ErrorPolicy::ignore_all().with(FpeCategory::DivideByZero, ErrorMode::Raise);
        let err = engine
            .apply("divide", &[a.into(), b.into()], None, &policy, Casting::Safe)
            .unwrap_err();
        assert!(matches!(
            err,
            UFuncError::FloatingPoint(FpeCategory::DivideByZero)
        ));
    }

    #[test]
    fn reduce_and_accumulate_through_the_facade() {
        let engine = UFuncEngine::new();
        let t = Tensor::from_vec(&[1.0f64, 2.0, 3.0, 4.0], &[4]).unwrap();
        let policy = ErrorPolicy::ignore_all();
        let total = engine
            .reduce("add", t.nd(), &[0], &policy, Casting::Safe)
            .unwrap();
        assert_eq!(total.read_as::<f64>(), vec![10.0]);
        let running = engine
            .accumulate("add", t.nd(), 0, &policy, Casting::Safe)
            .unwrap();
        assert_eq!(running.read_as::<f64>(), vec![1.0, 3.0, 6.0, 10.0]);
    }
}
