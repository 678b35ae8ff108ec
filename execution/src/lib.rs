//! Execution engine for elementwise and generalized operations: resolves the
//! inner loop for the operand types, plans the broadcast iteration, stages
//! operands that cannot be used directly, walks the space chunk by chunk, and
//! applies the floating-point error policy after every inner call.

mod binder;
mod broadcast;
mod buffer;
mod dispatch;
mod fpe;
mod plan;
mod reduce;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use core_types::{Casting, DataType};
use memory::ScratchPool;
use tensor::NdArray;
use ufx_ops::{resolve_loop, UFuncError, UFuncRegistry};

pub use dispatch::LoopMethod;
pub use fpe::{ErrorMode, ErrorPolicy, FpeHandler};

use buffer::plan_staging;
use dispatch::ExecuteArgs;
use plan::{build_elementwise, build_generalized};
use reduce::ReduceArgs;

/// Default scratch capacity, in elements per staged operand chunk.
pub const DEFAULT_BUFSIZE: usize = 8192;

pub(crate) fn allocation_error(e: anyhow::Error) -> UFuncError {
    UFuncError::Allocation(e.to_string())
}

/// Engine-wide defaults. [`UFuncEngine::apply`] takes the error policy and
/// casting discipline explicitly; [`UFuncEngine::call`] falls back to these.
#[derive(Clone)]
pub struct EngineConfig {
    /// Scratch capacity, in elements per staged operand chunk
    pub bufsize: usize,
    pub error_policy: ErrorPolicy,
    /// Polled between chunks when set; a raised flag aborts the invocation.
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bufsize: DEFAULT_BUFSIZE,
            error_policy: ErrorPolicy::default(),
            interrupt: None,
        }
    }
}

/// The invocation surface: owns the operation registry and the scratch pool,
/// and runs one synchronous invocation per `apply`/`reduce`/`accumulate`
/// call. Callers may run independent invocations from different threads; the
/// scratch pool hands each one its own buffer.
pub struct UFuncEngine {
    registry: UFuncRegistry,
    scratch: Arc<ScratchPool>,
    config: EngineConfig,
}

impl UFuncEngine {
    /// Engine with the default configuration and every builtin registered.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut registry = UFuncRegistry::new();
        registry.collect_inventory();
        Self {
            registry,
            scratch: Arc::new(ScratchPool::new()),
            config,
        }
    }

    pub fn registry(&self) -> &UFuncRegistry {
        &self.registry
    }

    /// Mutable registry access, for registering user operations and loops.
    pub fn registry_mut(&mut self) -> &mut UFuncRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply under the engine's default policy with safe casting.
    pub fn call(&self, name: &str, inputs: &[NdArray]) -> Result<Vec<NdArray>, UFuncError> {
        self.apply(name, inputs, None, &self.config.error_policy, Casting::Safe)
    }

    /// Run one invocation: resolve the loop, plan the broadcast iteration,
    /// and execute it. Outputs are freshly allocated unless provided; a
    /// provided output must already have the result shape and is written in
    /// place (and also returned).
    pub fn apply(
        &self,
        name: &str,
        inputs: &[NdArray],
        outputs: Option<&[NdArray]>,
        policy: &ErrorPolicy,
        casting: Casting,
    ) -> Result<Vec<NdArray>, UFuncError> {
        let ufunc = self.registry.lookup(name)?;
        if inputs.len() != ufunc.nin() {
            return Err(UFuncError::ArityMismatch {
                name: name.to_string(),
                kind: "input",
                expected: ufunc.nin(),
                found: inputs.len(),
            });
        }
        if let Some(outs) = outputs {
            if outs.len() != ufunc.nout() {
                return Err(UFuncError::ArityMismatch {
                    name: name.to_string(),
                    kind: "output",
                    expected: ufunc.nout(),
                    found: outs.len(),
                });
            }
        }

        let in_types: Vec<DataType> = inputs.iter().map(|a| a.dtype()).collect();
        let out_types: Vec<Option<DataType>> = match outputs {
            Some(outs) => outs.iter().map(|o| Some(o.dtype())).collect(),
            None => vec![None; ufunc.nout()],
        };
        let res = resolve_loop(ufunc, &in_types, &out_types, casting)?;

        let input_refs: Vec<&NdArray> = inputs.iter().collect();
        let (plan, outs) = if ufunc.signature().is_some() {
            build_generalized(ufunc, &res, &input_refs, outputs)?
        } else {
            build_elementwise(ufunc, &res, &input_refs, outputs)?
        };

        let mut operands: Vec<NdArray> = inputs.to_vec();
        operands.extend(outs.iter().cloned());
        let mut stagings = Vec::with_capacity(operands.len());
        for (i, op) in operands.iter().enumerate() {
            stagings.push(plan_staging(op, plan.loop_types[i], i >= ufunc.nin())?);
        }

        dispatch::execute(&ExecuteArgs {
            plan: &plan,
            operands: &operands,
            stagings: &stagings,
            func: res.func,
            data: res.data,
            nin: ufunc.nin(),
            bufsize: self.config.bufsize,
            scratch: &self.scratch,
            policy,
            interrupt: self.config.interrupt.as_ref(),
        })?;
        Ok(outs)
    }

    /// Fold `input` along the given axes, one axis at a time in ascending
    /// order. The result drops the reduced axes.
    pub fn reduce(
        &self,
        name: &str,
        input: &NdArray,
        axes: &[usize],
        policy: &ErrorPolicy,
        casting: Casting,
    ) -> Result<NdArray, UFuncError> {
        let ufunc = self.registry.lookup(name)?;
        reduce::reduce(
            &ReduceArgs {
                ufunc,
                scratch: &self.scratch,
                bufsize: self.config.bufsize,
                policy,
                casting,
            },
            input,
            axes,
        )
    }

    /// Running fold along one axis; the result keeps the input's shape and
    /// holds every prefix value.
    pub fn accumulate(
        &self,
        name: &str,
        input: &NdArray,
        axis: usize,
        policy: &ErrorPolicy,
        casting: Casting,
    ) -> Result<NdArray, UFuncError> {
        let ufunc = self.registry.lookup(name)?;
        reduce::accumulate(
            &ReduceArgs {
                ufunc,
                scratch: &self.scratch,
                bufsize: self.config.bufsize,
                policy,
                casting,
            },
            input,
            axis,
        )
    }
}

impl Default for UFuncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use core_types::ByteOrder;
    use tensor::Tensor;
    use ufx_ops::fpe::FpeCategory;
    use ufx_ops::{Identity, UFunc};

    fn ignore() -> ErrorPolicy {
        ErrorPolicy::ignore_all()
    }

    /// Same storage, tagged foreign order, with the bytes pre-swapped so the
    /// logical values match `vals`.
    fn swapped_f64(vals: &[f64], shape: &[usize]) -> NdArray {
        let raw: Vec<f64> = vals
            .iter()
            .map(|v| f64::from_bits(v.to_bits().swap_bytes()))
            .collect();
        let t = Tensor::from_vec(&raw, shape).unwrap();
        let nd = t.nd();
        NdArray::from_raw_parts(
            nd.buffer().clone(),
            0,
            nd.shape(),
            nd.strides(),
            DataType::F64,
            ByteOrder::native().swapped(),
        )
        .unwrap()
    }

    /// A 1-d f64 view deliberately offset off the natural alignment.
    fn misaligned_f64(vals: &[f64]) -> NdArray {
        let bytes = vals.len() * 8 + 4;
        let buf = Arc::new(memory::Buffer::allocate(bytes).unwrap());
        unsafe {
            std::ptr::copy_nonoverlapping(
                vals.as_ptr() as *const u8,
                buf.as_ptr().add(4),
                vals.len() * 8,
            );
        }
        NdArray::from_raw_parts(
            buf,
            4,
            &[vals.len()],
            &[8],
            DataType::F64,
            ByteOrder::native(),
        )
        .unwrap()
    }

    #[test]
    fn add_broadcasts_rows() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let b = Tensor::from_vec(&[10i32, 20, 30], &[3]).unwrap();
        let out = engine.call("add", &[a.into(), b.into()]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].shape(), &[2, 3]);
        assert_eq!(out[0].read_as::<i32>(), vec![11, 22, 33, 14, 25, 36]);
    }

    #[test]
    fn scalar_broadcasts_against_vector() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[10.0f64], &[]).unwrap();
        let b = Tensor::from_vec(&[1.0f64, 2.0, 3.0, 4.0, 5.0], &[5]).unwrap();
        let out = engine.call("add", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].shape(), &[5]);
        assert_eq!(
            out[0].read_as::<f64>(),
            vec![11.0, 12.0, 13.0, 14.0, 15.0]
        );
    }

    #[test]
    fn strided_view_takes_the_direct_path() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 2.0, 3.0, 4.0], &[4]).unwrap();
        let rev = NdArray::from_raw_parts(
            a.nd().buffer().clone(),
            24,
            &[4],
            &[-8],
            DataType::F64,
            ByteOrder::native(),
        )
        .unwrap();
        let b = Tensor::from_vec(&[10.0f64, 10.0, 10.0, 10.0], &[4]).unwrap();
        let out = engine.call("add", &[rev, b.into()]).unwrap();
        assert_eq!(out[0].read_as::<f64>(), vec![14.0, 13.0, 12.0, 11.0]);
    }

    #[test]
    fn integer_operands_resolve_into_float_divide() {
        // divide only registers float loops; i32 inputs must stage through
        // the i32 -> f64 cast and still produce exact results.
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32, 9, -6], &[3]).unwrap();
        let b = Tensor::from_vec(&[2i32, 3, 4], &[3]).unwrap();
        let out = engine.call("divide", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].dtype(), DataType::F64);
        assert_eq!(out[0].read_as::<f64>(), vec![0.5, 3.0, -1.5]);
    }

    #[test]
    fn byte_swapped_operand_matches_direct() {
        let engine = UFuncEngine::new();
        let vals = [1.5f64, -2.0, 3.25, 0.0];
        let other = [0.5f64, 0.25, -1.0, 8.0];
        let direct = {
            let a = Tensor::from_vec(&vals, &[4]).unwrap();
            let b = Tensor::from_vec(&other, &[4]).unwrap();
            engine.call("multiply", &[a.into(), b.into()]).unwrap()[0].read_as::<f64>()
        };
        let a = swapped_f64(&vals, &[4]);
        let b = Tensor::from_vec(&other, &[4]).unwrap();
        let staged = engine.call("multiply", &[a, b.into()]).unwrap()[0].read_as::<f64>();
        assert_eq!(staged, direct);
    }

    #[test]
    fn misaligned_operand_matches_direct() {
        let engine = UFuncEngine::new();
        let vals = [4.0f64, 9.0, 16.0, 25.0];
        let direct = {
            let a = Tensor::from_vec(&vals, &[4]).unwrap();
            engine.call("sqrt", &[a.into()]).unwrap()[0].read_as::<f64>()
        };
        let a = misaligned_f64(&vals);
        assert!(!a.is_aligned());
        let staged = engine.call("sqrt", &[a]).unwrap()[0].read_as::<f64>();
        assert_eq!(staged, direct);
        assert_eq!(staged, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn raise_mode_keeps_flushed_chunks() {
        // One-element chunks: the staged i32 inputs force the buffered path.
        let engine = UFuncEngine::with_config(EngineConfig {
            bufsize: 1,
            ..EngineConfig::default()
        });
        let a = Tensor::from_vec(&[2i32, 1], &[2]).unwrap();
        let b = Tensor::from_vec(&[1i32, 0], &[2]).unwrap();
        let out = Tensor::<f64>::from_vec(&[0.0, 0.0], &[2]).unwrap().into_nd();
        let policy = ignore().with(FpeCategory::DivideByZero, ErrorMode::Raise);
        let err = engine
            .apply(
                "divide",
                &[a.into(), b.into()],
                Some(std::slice::from_ref(&out)),
                &policy,
                Casting::Safe,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            UFuncError::FloatingPoint(FpeCategory::DivideByZero)
        ));
        // the first chunk was flushed before the failing one was checked
        assert_eq!(out.read_as::<f64>()[0], 2.0);
    }

    #[test]
    fn divide_by_zero_is_quiet_when_ignored() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 0.0], &[2]).unwrap();
        let b = Tensor::from_vec(&[0.0f64, 0.0], &[2]).unwrap();
        let out = engine
            .apply("divide", &[a.into(), b.into()], None, &ignore(), Casting::Safe)
            .unwrap();
        let r = out[0].read_as::<f64>();
        assert!(r[0].is_infinite());
        assert!(r[1].is_nan());
    }

    #[test]
    fn zero_size_iteration_runs_no_loops() {
        let engine = UFuncEngine::new();
        let a = Tensor::<f64>::empty(&[0]).unwrap();
        let b = Tensor::<f64>::empty(&[0]).unwrap();
        let out = engine.call("add", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].shape(), &[0]);
        assert_eq!(out[0].size(), 0);
    }

    #[test]
    fn provided_output_must_match_broadcast_shape() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let b = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let out = Tensor::<i32>::empty(&[4]).unwrap().into_nd();
        let err = engine
            .apply(
                "add",
                &[a.into(), b.into()],
                Some(std::slice::from_ref(&out)),
                &ignore(),
                Casting::Safe,
            )
            .unwrap_err();
        assert!(matches!(err, UFuncError::OutputShapeMismatch { .. }));
    }

    #[test]
    fn provided_output_casts_on_the_way_out() {
        // The i32 add loop runs, and the staged output casts i32 -> f64.
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let b = Tensor::from_vec(&[10i32, 20, 30], &[3]).unwrap();
        let out = Tensor::<f64>::empty(&[3]).unwrap().into_nd();
        engine
            .apply(
                "add",
                &[a.into(), b.into()],
                Some(std::slice::from_ref(&out)),
                &ignore(),
                Casting::Safe,
            )
            .unwrap();
        assert_eq!(out.read_as::<f64>(), vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn arity_and_name_errors() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1i32], &[1]).unwrap();
        assert!(matches!(
            engine.call("no_such_op", &[a.nd().clone()]).unwrap_err(),
            UFuncError::UnknownUFunc(_)
        ));
        assert!(matches!(
            engine.call("add", &[a.into()]).unwrap_err(),
            UFuncError::ArityMismatch { kind: "input", .. }
        ));
    }

    #[test]
    fn no_loop_for_unsupported_types() {
        let engine = UFuncEngine::new();
        // comparisons emit u8; a provided i8 output is unreachable under
        // safe casting
        let a = Tensor::from_vec(&[1.0f64, 2.0], &[2]).unwrap();
        let b = Tensor::from_vec(&[1.0f64, 2.0], &[2]).unwrap();
        let out = Tensor::<i8>::empty(&[2]).unwrap().into_nd();
        let err = engine
            .apply(
                "less",
                &[a.into(), b.into()],
                Some(std::slice::from_ref(&out)),
                &ignore(),
                Casting::Safe,
            )
            .unwrap_err();
        assert!(matches!(err, UFuncError::TypeResolution { .. }));
    }

    #[test]
    fn comparison_writes_bytes() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 5.0, 3.0], &[3]).unwrap();
        let b = Tensor::from_vec(&[2.0f64, 4.0, 3.0], &[3]).unwrap();
        let out = engine.call("less", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].dtype(), DataType::U8);
        assert_eq!(out[0].read_as::<u8>(), vec![1, 0, 0]);
    }

    #[test]
    fn user_registered_operation_dispatches() {
        unsafe fn double_i32(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                for _ in 0..n {
                    *(p1 as *mut i32) = *(p0 as *const i32) * 2;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                }
            }
        }
        let mut engine = UFuncEngine::new();
        let mut u = UFunc::new("double", 1, 1, Identity::None);
        u.register_loop(
            &[DataType::I32, DataType::I32],
            double_i32,
            std::ptr::null(),
        );
        engine.registry_mut().register(u);
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let out = engine.call("double", &[a.into()]).unwrap();
        assert_eq!(out[0].read_as::<i32>(), vec![2, 4, 6]);
    }

    #[test]
    fn inner1d_matches_dot_product() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_vec(&[1.0f64, 0.5, 2.0], &[3]).unwrap();
        // b's loop shape is (), broadcast against a's (2,)
        let out = engine.call("inner1d", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].shape(), &[2]);
        assert_eq!(out[0].read_as::<f64>(), vec![8.0, 18.5]);
    }

    #[test]
    fn inner1d_rejects_mismatched_core_extents() {
        let engine = UFuncEngine::new();
        let a = Tensor::from_vec(&[1.0f64, 2.0, 3.0], &[3]).unwrap();
        let b = Tensor::from_vec(&[1.0f64, 2.0], &[2]).unwrap();
        let err = engine.call("inner1d", &[a.into(), b.into()]).unwrap_err();
        assert!(matches!(err, UFuncError::CoreDimensionMismatch { .. }));
    }

    #[test]
    fn matvec_applies_per_loop_element() {
        let engine = UFuncEngine::new();
        // two stacked 2x3 matrices against one shared vector
        let m = Tensor::from_vec(
            &[
                1.0f64, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                2.0, 0.0, 0.0, //
                0.0, 0.0, 2.0,
            ],
            &[2, 2, 3],
        )
        .unwrap();
        let v = Tensor::from_vec(&[3.0f64, 5.0, 7.0], &[3]).unwrap();
        let out = engine.call("matvec", &[m.into(), v.into()]).unwrap();
        assert_eq!(out[0].shape(), &[2, 2]);
        assert_eq!(out[0].read_as::<f64>(), vec![3.0, 5.0, 6.0, 14.0]);
    }

    #[test]
    fn generalized_loops_require_direct_operands() {
        let engine = UFuncEngine::new();
        // i32 input resolves into the f64 loop, which would need staging
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let b = Tensor::from_vec(&[1.0f64, 2.0, 3.0], &[3]).unwrap();
        let err = engine.call("inner1d", &[a.into(), b.into()]).unwrap_err();
        assert!(matches!(err, UFuncError::BufferedSignatureLoop(0)));
    }

    #[test]
    fn interrupt_flag_aborts_between_chunks() {
        let flag = Arc::new(AtomicBool::new(true));
        let engine = UFuncEngine::with_config(EngineConfig {
            bufsize: 1,
            interrupt: Some(Arc::clone(&flag)),
            ..EngineConfig::default()
        });
        // staged i32 -> f64 inputs chunk one element at a time
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let b = Tensor::from_vec(&[1i32, 1, 1], &[3]).unwrap();
        let out = Tensor::<f64>::empty(&[3]).unwrap().into_nd();
        let err = engine
            .apply(
                "divide",
                &[a.into(), b.into()],
                Some(std::slice::from_ref(&out)),
                &ignore(),
                Casting::Safe,
            )
            .unwrap_err();
        assert!(matches!(err, UFuncError::Interrupted));
        // the chunk completed before the poll stays flushed
        assert_eq!(out.read_as::<f64>()[0], 1.0);

        flag.store(false, Ordering::Relaxed);
        let a = Tensor::from_vec(&[4i32], &[1]).unwrap();
        let b = Tensor::from_vec(&[2i32], &[1]).unwrap();
        let out = engine.call("divide", &[a.into(), b.into()]).unwrap();
        assert_eq!(out[0].read_as::<f64>(), vec![2.0]);
    }
}
