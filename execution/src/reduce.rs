//! Reduce and accumulate: a binary elementwise operation folded along an
//! axis, with the accumulator bound into the inner loop at stride 0 (reduce)
//! or walking the output row (accumulate). Axis order is the visit order and
//! is semantically significant.

use std::sync::Arc;

use core_types::{cast_fn, swap_fn, CastFn, Casting};
use memory::ScratchPool;
use tensor::NdArray;
use ufx_ops::{fpe, resolve_loop, Resolution, UFunc, UFuncError};

use crate::allocation_error;
use crate::buffer::{align_up, gather};
use crate::fpe::{check_status, ErrorPolicy};

pub struct ReduceArgs<'a> {
    pub ufunc: &'a UFunc,
    pub scratch: &'a Arc<ScratchPool>,
    pub bufsize: usize,
    pub policy: &'a ErrorPolicy,
    pub casting: Casting,
}

fn check_reducible(u: &UFunc) -> Result<(), UFuncError> {
    if u.nin() != 2 || u.nout() != 1 || u.signature().is_some() {
        return Err(UFuncError::NotReducible(u.name().to_string()));
    }
    Ok(())
}

fn check_axis(axis: usize, rank: usize) -> Result<(), UFuncError> {
    if axis >= rank {
        return Err(UFuncError::AxisOutOfBounds { axis, rank });
    }
    Ok(())
}

/// Fold `input` along the given axes, one axis at a time in ascending order.
/// The output drops the reduced axes.
pub fn reduce(x: &ReduceArgs<'_>, input: &NdArray, axes: &[usize]) -> Result<NdArray, UFuncError> {
    check_reducible(x.ufunc)?;
    let mut sorted: Vec<usize> = axes.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    for &a in &sorted {
        check_axis(a, input.ndim())?;
    }
    fpe::read_and_clear();
    let mut first = true;
    let mut current = input.clone();
    for (k, &axis) in sorted.iter().enumerate() {
        // axes below this one have already been folded away
        current = reduce_one(x, &current, axis - k, &mut first)?;
    }
    Ok(current)
}

/// Running fold along one axis; the output keeps the input's shape and holds
/// every prefix result.
pub fn accumulate(
    x: &ReduceArgs<'_>,
    input: &NdArray,
    axis: usize,
) -> Result<NdArray, UFuncError> {
    check_reducible(x.ufunc)?;
    check_axis(axis, input.ndim())?;
    fpe::read_and_clear();
    let mut first = true;

    let res = resolve_loop(
        x.ufunc,
        &[input.dtype(), input.dtype()],
        &[None],
        x.casting,
    )?;
    let t = res.types[2];
    let telem = t.size_in_bytes();
    let out = NdArray::empty(input.shape(), t).map_err(allocation_error)?;

    let n = input.shape()[axis];
    if n == 0 {
        return Ok(out);
    }

    let in_axis = input.strides()[axis];
    let out_axis = out.strides()[axis];
    let mut outer_shape = input.shape().to_vec();
    outer_shape.remove(axis);
    let mut in_outer = input.strides().to_vec();
    in_outer.remove(axis);
    let mut out_outer = out.strides().to_vec();
    out_outer.remove(axis);

    let staging = StagedInput::plan(x, input, t)?;
    let positions: usize = outer_shape.iter().product();
    let mut walk = TandemWalk::new(&outer_shape, input.data_ptr(), out.data_ptr());

    for pos in 0..positions {
        unsafe { staging.seed(walk.in_ptr, walk.out_ptr, telem) };
        if n > 1 {
            match &staging {
                StagedInput::Direct => {
                    let args = [
                        walk.out_ptr,
                        walk.in_ptr.wrapping_offset(in_axis),
                        walk.out_ptr.wrapping_offset(out_axis),
                    ];
                    let dims = [(n - 1) as isize];
                    let steps = [out_axis, in_axis, out_axis];
                    unsafe { (res.func)(&args, &dims, &steps, res.data) };
                    check_status(x.policy, &mut first)?;
                }
                StagedInput::Buffered(stage) => {
                    let mut done = 1usize;
                    while done < n {
                        let chunk = (n - done).min(stage.bufcnt);
                        let lp = unsafe {
                            stage.fill(walk.in_ptr.wrapping_offset(done as isize * in_axis), in_axis, chunk)
                        };
                        let prev = walk
                            .out_ptr
                            .wrapping_offset((done as isize - 1) * out_axis);
                        let args = [prev, lp, prev.wrapping_offset(out_axis)];
                        let dims = [chunk as isize];
                        let steps = [out_axis, telem as isize, out_axis];
                        unsafe { (res.func)(&args, &dims, &steps, res.data) };
                        check_status(x.policy, &mut first)?;
                        done += chunk;
                    }
                }
            }
        }
        if pos + 1 < positions {
            walk.advance(&outer_shape, &in_outer, &out_outer);
        }
    }
    Ok(out)
}

fn reduce_one(
    x: &ReduceArgs<'_>,
    input: &NdArray,
    axis: usize,
    first: &mut bool,
) -> Result<NdArray, UFuncError> {
    let res: Resolution<'_> = resolve_loop(
        x.ufunc,
        &[input.dtype(), input.dtype()],
        &[None],
        x.casting,
    )?;
    let t = res.types[2];
    let telem = t.size_in_bytes();

    let mut out_shape = input.shape().to_vec();
    out_shape.remove(axis);
    let out = NdArray::empty(&out_shape, t).map_err(allocation_error)?;

    let n = input.shape()[axis];
    if n == 0 {
        // identity-seeded result, or nothing to seed it with
        let id = x
            .ufunc
            .identity()
            .bytes(t)
            .ok_or_else(|| UFuncError::ReduceWithoutIdentity(x.ufunc.name().to_string()))?;
        let base = out.data_ptr();
        for i in 0..out.size() {
            unsafe { std::ptr::copy_nonoverlapping(id.as_ptr(), base.add(i * telem), telem) };
        }
        return Ok(out);
    }

    let in_axis = input.strides()[axis];
    let mut in_outer = input.strides().to_vec();
    in_outer.remove(axis);
    let out_outer = out.strides().to_vec();

    let staging = StagedInput::plan(x, input, t)?;
    let positions = out.size();
    let mut walk = TandemWalk::new(&out_shape, input.data_ptr(), out.data_ptr());

    for pos in 0..positions {
        // the accumulator is the output element, seeded from the first
        // element along the axis
        unsafe { staging.seed(walk.in_ptr, walk.out_ptr, telem) };
        if n > 1 {
            match &staging {
                StagedInput::Direct => {
                    let args = [
                        walk.out_ptr,
                        walk.in_ptr.wrapping_offset(in_axis),
                        walk.out_ptr,
                    ];
                    let dims = [(n - 1) as isize];
                    let steps = [0isize, in_axis, 0];
                    unsafe { (res.func)(&args, &dims, &steps, res.data) };
                    check_status(x.policy, first)?;
                }
                StagedInput::Buffered(stage) => {
                    let mut done = 1usize;
                    while done < n {
                        let chunk = (n - done).min(stage.bufcnt);
                        let lp = unsafe {
                            stage.fill(walk.in_ptr.wrapping_offset(done as isize * in_axis), in_axis, chunk)
                        };
                        let args = [walk.out_ptr, lp, walk.out_ptr];
                        let dims = [chunk as isize];
                        let steps = [0isize, telem as isize, 0];
                        unsafe { (res.func)(&args, &dims, &steps, res.data) };
                        check_status(x.policy, first)?;
                        done += chunk;
                    }
                }
            }
        }
        if pos + 1 < positions {
            walk.advance(&out_shape, &in_outer, &out_outer);
        }
    }
    Ok(out)
}

/// Input and output pointers stepping the same outer index space.
struct TandemWalk {
    index: Vec<usize>,
    in_ptr: *mut u8,
    out_ptr: *mut u8,
}

impl TandemWalk {
    fn new(shape: &[usize], in_ptr: *mut u8, out_ptr: *mut u8) -> Self {
        Self {
            index: vec![0; shape.len()],
            in_ptr,
            out_ptr,
        }
    }

    fn advance(&mut self, shape: &[usize], in_strides: &[isize], out_strides: &[isize]) {
        for d in (0..shape.len()).rev() {
            self.index[d] += 1;
            self.in_ptr = self.in_ptr.wrapping_offset(in_strides[d]);
            self.out_ptr = self.out_ptr.wrapping_offset(out_strides[d]);
            if self.index[d] < shape[d] {
                return;
            }
            self.index[d] = 0;
            self.in_ptr = self
                .in_ptr
                .wrapping_offset(-(shape[d] as isize) * in_strides[d]);
            self.out_ptr = self
                .out_ptr
                .wrapping_offset(-(shape[d] as isize) * out_strides[d]);
        }
    }
}

/// Direct use of the reduction input, or a scratch-staged path with the
/// usual swap/cast pipeline.
enum StagedInput {
    Direct,
    Buffered(Stage),
}

struct Stage {
    _guard: memory::ScratchGuard,
    raw: *mut u8,
    lp: *mut u8,
    raw_elem: usize,
    swap: bool,
    swap_fn: core_types::SwapFn,
    cast: Option<CastFn>,
    bufcnt: usize,
}

impl StagedInput {
    fn plan(x: &ReduceArgs<'_>, input: &NdArray, t: core_types::DataType) -> Result<Self, UFuncError> {
        let direct =
            input.dtype() == t && input.byte_order().is_native() && input.is_aligned();
        if direct {
            return Ok(StagedInput::Direct);
        }
        let raw_elem = input.elem_size();
        let telem = t.size_in_bytes();
        let needs_cast = input.dtype() != t;
        let bufcnt = x.bufsize.max(1);
        let mut len = align_up(bufcnt * raw_elem);
        let loop_off = if needs_cast {
            let off = len;
            len += align_up(bufcnt * telem);
            off
        } else {
            0
        };
        let guard = x.scratch.acquire(len).map_err(allocation_error)?;
        let raw = guard.as_ptr();
        let lp = if needs_cast {
            unsafe { raw.add(loop_off) }
        } else {
            raw
        };
        let cast = if needs_cast {
            Some(
                cast_fn(input.dtype(), t).ok_or_else(|| UFuncError::TypeResolution {
                    name: "cast".to_string(),
                    types: vec![input.dtype(), t],
                })?,
            )
        } else {
            None
        };
        Ok(StagedInput::Buffered(Stage {
            _guard: guard,
            raw,
            lp,
            raw_elem,
            swap: !input.byte_order().is_native(),
            swap_fn: swap_fn(raw_elem),
            cast,
            bufcnt,
        }))
    }

    /// Write one loop-type element read from `src` into the accumulator.
    unsafe fn seed(&self, src: *const u8, acc: *mut u8, telem: usize) {
        match self {
            StagedInput::Direct => std::ptr::copy_nonoverlapping(src, acc, telem),
            StagedInput::Buffered(stage) => {
                gather(src, 0, stage.raw_elem, 1, stage.raw);
                if stage.swap {
                    (stage.swap_fn)(stage.raw, 1);
                }
                match stage.cast {
                    Some(cast) => cast(stage.raw, acc, 1),
                    None => std::ptr::copy_nonoverlapping(stage.raw, acc, telem),
                }
            }
        }
    }
}

impl Stage {
    /// Stage `chunk` strided elements starting at `src`; returns the pointer
    /// the loop reads them from.
    unsafe fn fill(&self, src: *const u8, stride: isize, chunk: usize) -> *mut u8 {
        gather(src, stride, self.raw_elem, chunk, self.raw);
        if self.swap {
            (self.swap_fn)(self.raw, chunk);
        }
        if let Some(cast) = self.cast {
            cast(self.raw, self.lp, chunk);
        }
        self.lp
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
