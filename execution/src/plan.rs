//! Per-invocation iteration plans: the broadcast loop shape, per-operand
//! strides aligned to it, resolved core extents (generalized case), and the
//! chosen loop signature. Output operands are materialized here so the plan
//! covers every operand the dispatcher will touch.

use core_types::DataType;
use tensor::NdArray;
use ufx_ops::{Resolution, UFunc, UFuncError};

use crate::allocation_error;
use crate::binder::bind_core_dims;
use crate::broadcast::{broadcast_shapes, broadcast_strides};

pub struct IterationPlan {
    /// Broadcast loop shape
    pub shape: Vec<usize>,
    /// Per-operand strides aligned to `shape` (stride 0 on stretch dims)
    pub strides: Vec<Vec<isize>>,
    pub generalized: bool,
    /// Resolved extent of each distinct core-dimension name
    pub dim_sizes: Vec<usize>,
    /// Per-operand core byte strides, in declaration order
    pub core_strides: Vec<Vec<isize>>,
    /// Full type signature of the chosen loop
    pub loop_types: Vec<DataType>,
}

impl IterationPlan {
    pub fn total(&self) -> usize {
        self.shape.iter().product()
    }
}

fn alloc_output(shape: &[usize], dtype: DataType) -> Result<NdArray, UFuncError> {
    NdArray::empty(shape, dtype).map_err(allocation_error)
}

/// Plan an elementwise invocation and materialize its outputs. Caller-
/// provided outputs must match the broadcast shape exactly; outputs are
/// never stretched.
pub fn build_elementwise(
    ufunc: &UFunc,
    res: &Resolution<'_>,
    inputs: &[&NdArray],
    provided: Option<&[NdArray]>,
) -> Result<(IterationPlan, Vec<NdArray>), UFuncError> {
    let in_shapes: Vec<&[usize]> = inputs.iter().map(|a| a.shape()).collect();
    let bshape = broadcast_shapes(&in_shapes)?;

    let mut strides = Vec::with_capacity(ufunc.nargs());
    for a in inputs {
        strides.push(broadcast_strides(a.shape(), a.strides(), &bshape));
    }

    let mut outs = Vec::with_capacity(ufunc.nout());
    for j in 0..ufunc.nout() {
        let out = match provided {
            Some(p) => {
                let o = &p[j];
                if o.shape() != bshape.as_slice() {
                    return Err(UFuncError::OutputShapeMismatch {
                        operand: ufunc.nin() + j,
                        expected: bshape.clone(),
                        found: o.shape().to_vec(),
                    });
                }
                o.clone()
            }
            None => alloc_output(&bshape, res.types[ufunc.nin() + j])?,
        };
        strides.push(out.strides().to_vec());
        outs.push(out);
    }

    Ok((
        IterationPlan {
            shape: bshape,
            strides,
            generalized: false,
            dim_sizes: Vec::new(),
            core_strides: vec![Vec::new(); ufunc.nargs()],
            loop_types: res.types.to_vec(),
        },
        outs,
    ))
}

/// Plan a generalized invocation: bind core dimensions, broadcast the loop
/// dimensions, and materialize outputs shaped broadcast-shape + declared
/// core extents.
pub fn build_generalized(
    ufunc: &UFunc,
    res: &Resolution<'_>,
    inputs: &[&NdArray],
    provided: Option<&[NdArray]>,
) -> Result<(IterationPlan, Vec<NdArray>), UFuncError> {
    let sig = ufunc
        .signature()
        .expect("generalized ufunc carries a signature");
    let nin = ufunc.nin();

    let mut operands: Vec<Option<(&[usize], &[isize])>> = inputs
        .iter()
        .map(|a| Some((a.shape(), a.strides())))
        .collect();
    for j in 0..ufunc.nout() {
        operands.push(provided.map(|p| (p[j].shape(), p[j].strides())));
    }
    let (bound, dim_sizes) = bind_core_dims(sig, &operands, nin)?;

    let in_loop_shapes: Vec<&[usize]> = bound[..nin]
        .iter()
        .map(|b| b.as_ref().expect("inputs are always bound").loop_shape.as_slice())
        .collect();
    let bshape = broadcast_shapes(&in_loop_shapes)?;

    let mut strides = Vec::with_capacity(ufunc.nargs());
    let mut core_strides = Vec::with_capacity(ufunc.nargs());
    for b in &bound[..nin] {
        let b = b.as_ref().expect("inputs are always bound");
        strides.push(broadcast_strides(&b.loop_shape, &b.loop_strides, &bshape));
        core_strides.push(b.core_strides.clone());
    }

    let mut outs = Vec::with_capacity(ufunc.nout());
    for j in 0..ufunc.nout() {
        let k = nin + j;
        match bound[k].as_ref() {
            Some(b) => {
                let o = &provided.expect("bound output was provided")[j];
                if b.loop_shape != bshape {
                    let mut expected = bshape.clone();
                    for &ix in sig.dim_indices(k) {
                        expected.push(dim_sizes[ix]);
                    }
                    return Err(UFuncError::OutputShapeMismatch {
                        operand: k,
                        expected,
                        found: o.shape().to_vec(),
                    });
                }
                strides.push(b.loop_strides.clone());
                core_strides.push(b.core_strides.clone());
                outs.push(o.clone());
            }
            None => {
                let mut shape = bshape.clone();
                for &ix in sig.dim_indices(k) {
                    shape.push(dim_sizes[ix]);
                }
                let out = alloc_output(&shape, res.types[k])?;
                strides.push(out.strides()[..bshape.len()].to_vec());
                core_strides.push(out.strides()[bshape.len()..].to_vec());
                outs.push(out);
            }
        }
    }

    Ok((
        IterationPlan {
            shape: bshape,
            strides,
            generalized: true,
            dim_sizes,
            core_strides,
            loop_types: res.types.to_vec(),
        },
        outs,
    ))
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;
    use core_types::Casting;
    use tensor::Tensor;
    use ufx_ops::{resolve_loop, UFuncRegistry};

    fn registry() -> UFuncRegistry {
        let mut reg = UFuncRegistry::new();
        reg.collect_inventory();
        reg
    }

    #[test]
    fn elementwise_plan_stretches_and_allocates() {
        let reg = registry();
        let add = reg.get("add").unwrap();
        let a = Tensor::from_vec(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let b = Tensor::from_vec(&[10i32, 20, 30], &[3]).unwrap();
        let res = resolve_loop(add, &[DataType::I32, DataType::I32], &[None], Casting::Safe)
            .unwrap();
        let (plan, outs) = build_elementwise(add, &res, &[a.nd(), b.nd()], None).unwrap();
        assert_eq!(plan.shape, vec![2, 3]);
        assert_eq!(plan.total(), 6);
        assert!(!plan.generalized);
        // b replays its row over the stretched leading dimension
        assert_eq!(plan.strides[1], vec![0, 4]);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].shape(), &[2, 3]);
        assert_eq!(outs[0].dtype(), DataType::I32);
    }

    #[test]
    fn generalized_plan_appends_core_extents() {
        let reg = registry();
        let matvec = reg.get("matvec").unwrap();
        let m = Tensor::<f64>::empty(&[4, 2, 3]).unwrap();
        let v = Tensor::<f64>::empty(&[3]).unwrap();
        let res = resolve_loop(
            matvec,
            &[DataType::F64, DataType::F64],
            &[None],
            Casting::Safe,
        )
        .unwrap();
        let (plan, outs) = build_generalized(matvec, &res, &[m.nd(), v.nd()], None).unwrap();
        assert!(plan.generalized);
        assert_eq!(plan.shape, vec![4]);
        assert_eq!(plan.dim_sizes, vec![2, 3]);
        assert_eq!(plan.core_strides[0], vec![24, 8]);
        assert_eq!(plan.core_strides[1], vec![8]);
        // output gets the loop shape plus its declared core dimension
        assert_eq!(outs[0].shape(), &[4, 2]);
        assert_eq!(plan.core_strides[2], vec![8]);
    }

    #[test]
    fn provided_output_shape_is_enforced() {
        let reg = registry();
        let add = reg.get("add").unwrap();
        let a = Tensor::from_vec(&[1i32, 2, 3], &[3]).unwrap();
        let b = Tensor::from_vec(&[1i32], &[1]).unwrap();
        let res = resolve_loop(add, &[DataType::I32, DataType::I32], &[None], Casting::Safe)
            .unwrap();
        let out = Tensor::<i32>::empty(&[1]).unwrap().into_nd();
        let err = build_elementwise(add, &res, &[a.nd(), b.nd()], Some(std::slice::from_ref(&out)))
            .unwrap_err();
        assert!(matches!(
            err,
            UFuncError::OutputShapeMismatch { operand: 2, .. }
        ));
    }
}
