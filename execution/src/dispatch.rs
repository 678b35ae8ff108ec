//! Walks the broadcast iteration space and invokes the resolved inner loop:
//! one call for fully collapsible layouts, one call per innermost run with
//! an odometer over the outer dimensions, scratch-staged chunks when any
//! operand is not directly usable, and core-block-carrying calls for
//! generalized loops. Floating-point status is polled after every inner
//! call; the external interrupt flag between chunks, never inside one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memory::ScratchPool;
use tensor::NdArray;
use ufx_ops::{fpe, InnerLoopFn, UFuncError};

use crate::allocation_error;
use crate::buffer::{align_up, gather, scatter, Staging};
use crate::fpe::{check_status, ErrorPolicy};
use crate::plan::IterationPlan;

/// How one invocation walks its iteration space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMethod {
    /// Every operand walks the whole space at one constant step; a single
    /// inner call covers everything.
    Single,
    /// Odometer over the outer dimensions, one inner call per innermost run.
    Direct,
    /// Innermost runs staged through the scratch buffer in chunks.
    Buffered,
    /// Generalized loop carrying core sub-blocks; operands must be direct.
    Signature,
}

pub struct ExecuteArgs<'a> {
    pub plan: &'a IterationPlan,
    /// Inputs then outputs, matching the plan's stride tables
    pub operands: &'a [NdArray],
    pub stagings: &'a [Staging],
    pub func: InnerLoopFn,
    pub data: *const (),
    pub nin: usize,
    /// Scratch capacity, in elements per staged operand chunk
    pub bufsize: usize,
    pub scratch: &'a Arc<ScratchPool>,
    pub policy: &'a ErrorPolicy,
    pub interrupt: Option<&'a Arc<AtomicBool>>,
}

/// Whether walking this operand over the whole broadcast space reduces to a
/// single constant step: dense row-major, or fully stretched.
fn flattenable(shape: &[usize], strides: &[isize], elem: usize) -> bool {
    if strides.iter().all(|&s| s == 0) {
        return true;
    }
    let mut expect = elem as isize;
    for (&n, &s) in shape.iter().zip(strides.iter()).rev() {
        if n == 1 {
            continue;
        }
        if s != expect {
            return false;
        }
        expect *= n as isize;
    }
    true
}

pub fn choose_method(x: &ExecuteArgs<'_>) -> Result<LoopMethod, UFuncError> {
    if x.plan.generalized {
        if let Some(i) = x.stagings.iter().position(|s| s.needs_buffer) {
            return Err(UFuncError::BufferedSignatureLoop(i));
        }
        return Ok(LoopMethod::Signature);
    }
    if x.stagings.iter().any(|s| s.needs_buffer) {
        return Ok(LoopMethod::Buffered);
    }
    let flat = x
        .operands
        .iter()
        .enumerate()
        .all(|(i, op)| flattenable(&x.plan.shape, &x.plan.strides[i], op.elem_size()));
    Ok(if flat {
        LoopMethod::Single
    } else {
        LoopMethod::Direct
    })
}

/// Run the invocation to completion, or to the first Raise/interrupt.
/// Already-flushed chunks stay in the outputs either way.
pub fn execute(x: &ExecuteArgs<'_>) -> Result<(), UFuncError> {
    // enter with a clean status word
    fpe::read_and_clear();
    let method = choose_method(x)?;
    if x.plan.total() == 0 {
        return Ok(());
    }
    let mut first = true;
    match method {
        LoopMethod::Single => run_single(x, &mut first),
        LoopMethod::Direct => run_direct(x, &mut first),
        LoopMethod::Buffered => run_buffered(x, &mut first),
        LoopMethod::Signature => run_signature(x, &mut first),
    }
}

fn split_inner(shape: &[usize]) -> (&[usize], usize) {
    match shape.len() {
        0 => (&shape[..0], 1),
        n => (&shape[..n - 1], shape[n - 1]),
    }
}

fn poll_interrupt(flag: Option<&Arc<AtomicBool>>) -> Result<(), UFuncError> {
    if let Some(f) = flag {
        if f.load(Ordering::Relaxed) {
            return Err(UFuncError::Interrupted);
        }
    }
    Ok(())
}

/// Odometer step over the outer dimensions, keeping one pointer per operand.
fn advance(ptrs: &mut [*mut u8], index: &mut [usize], outer: &[usize], strides: &[Vec<isize>]) {
    for d in (0..outer.len()).rev() {
        index[d] += 1;
        for (p, s) in ptrs.iter_mut().zip(strides.iter()) {
            *p = p.wrapping_offset(s[d]);
        }
        if index[d] < outer[d] {
            return;
        }
        index[d] = 0;
        for (p, s) in ptrs.iter_mut().zip(strides.iter()) {
            *p = p.wrapping_offset(-(outer[d] as isize) * s[d]);
        }
    }
}

fn run_single(x: &ExecuteArgs<'_>, first: &mut bool) -> Result<(), UFuncError> {
    let ptrs: Vec<*mut u8> = x.operands.iter().map(|o| o.data_ptr()).collect();
    let steps: Vec<isize> = x
        .operands
        .iter()
        .enumerate()
        .map(|(i, op)| {
            if x.plan.strides[i].iter().all(|&s| s == 0) {
                0
            } else {
                op.elem_size() as isize
            }
        })
        .collect();
    let dims = [x.plan.total() as isize];
    unsafe { (x.func)(&ptrs, &dims, &steps, x.data) };
    check_status(x.policy, first)
}

fn run_direct(x: &ExecuteArgs<'_>, first: &mut bool) -> Result<(), UFuncError> {
    let ndim = x.plan.shape.len();
    let (outer, inner_n) = split_inner(&x.plan.shape);
    let inner_steps: Vec<isize> = x
        .plan
        .strides
        .iter()
        .map(|s| if ndim == 0 { 0 } else { s[ndim - 1] })
        .collect();
    let runs: usize = outer.iter().product();
    let mut ptrs: Vec<*mut u8> = x.operands.iter().map(|o| o.data_ptr()).collect();
    let mut index = vec![0usize; outer.len()];
    let dims = [inner_n as isize];
    for run in 0..runs {
        unsafe { (x.func)(&ptrs, &dims, &inner_steps, x.data) };
        check_status(x.policy, first)?;
        poll_interrupt(x.interrupt)?;
        if run + 1 < runs {
            advance(&mut ptrs, &mut index, outer, &x.plan.strides);
        }
    }
    Ok(())
}

fn run_buffered(x: &ExecuteArgs<'_>, first: &mut bool) -> Result<(), UFuncError> {
    let nargs = x.operands.len();
    let ndim = x.plan.shape.len();
    let (outer, inner_n) = split_inner(&x.plan.shape);
    let bufcnt = x.bufsize.max(1);

    // Carve the arena: one raw-type region per staged operand, plus a
    // loop-type region when a real cast is involved.
    let mut regions = vec![(0usize, 0usize); nargs];
    let mut arena_len = 0usize;
    for (i, s) in x.stagings.iter().enumerate() {
        if !s.needs_buffer {
            continue;
        }
        let raw = arena_len;
        arena_len += align_up(bufcnt * s.raw_elem);
        let loop_off = if s.cast_in.is_some() || s.cast_out.is_some() {
            let off = arena_len;
            arena_len += align_up(bufcnt * s.loop_elem);
            off
        } else {
            raw
        };
        regions[i] = (raw, loop_off);
    }
    let guard = x
        .scratch
        .acquire(arena_len.max(1))
        .map_err(allocation_error)?;
    let arena = guard.as_ptr();

    // memory stride of the innermost dimension, per operand
    let mem_steps: Vec<isize> = x
        .plan
        .strides
        .iter()
        .map(|s| if ndim == 0 { 0 } else { s[ndim - 1] })
        .collect();
    // steps as seen by the inner loop: staged operands become contiguous
    let loop_steps: Vec<isize> = x
        .stagings
        .iter()
        .enumerate()
        .map(|(i, s)| {
            if s.needs_buffer {
                s.loop_elem as isize
            } else {
                mem_steps[i]
            }
        })
        .collect();

    let runs: usize = outer.iter().product();
    let mut ptrs: Vec<*mut u8> = x.operands.iter().map(|o| o.data_ptr()).collect();
    let mut index = vec![0usize; outer.len()];
    let mut call_ptrs: Vec<*mut u8> = vec![std::ptr::null_mut(); nargs];

    for run in 0..runs {
        let mut done = 0usize;
        while done < inner_n {
            // the last chunk may be a partial one
            let chunk = (inner_n - done).min(bufcnt);
            for i in 0..nargs {
                let s = &x.stagings[i];
                let cursor = ptrs[i].wrapping_offset(done as isize * mem_steps[i]);
                if !s.needs_buffer {
                    call_ptrs[i] = cursor;
                    continue;
                }
                let (raw_off, loop_off) = regions[i];
                let raw = unsafe { arena.add(raw_off) };
                let lp = unsafe { arena.add(loop_off) };
                if i < x.nin {
                    unsafe {
                        gather(cursor, mem_steps[i], s.raw_elem, chunk, raw);
                        if s.swap {
                            (s.swap_fn)(raw, chunk);
                        }
                        if let Some(cast) = s.cast_in {
                            cast(raw, lp, chunk);
                        }
                    }
                }
                call_ptrs[i] = lp;
            }
            let dims = [chunk as isize];
            unsafe { (x.func)(&call_ptrs, &dims, &loop_steps, x.data) };
            for i in x.nin..nargs {
                let s = &x.stagings[i];
                if !s.needs_buffer {
                    continue;
                }
                let (raw_off, loop_off) = regions[i];
                let raw = unsafe { arena.add(raw_off) };
                let lp = unsafe { arena.add(loop_off) };
                let cursor = ptrs[i].wrapping_offset(done as isize * mem_steps[i]);
                unsafe {
                    if let Some(cast) = s.cast_out {
                        cast(lp, raw, chunk);
                    }
                    if s.swap {
                        (s.swap_fn)(raw, chunk);
                    }
                    scatter(raw, s.raw_elem, chunk, cursor, mem_steps[i]);
                }
            }
            check_status(x.policy, first)?;
            done += chunk;
            poll_interrupt(x.interrupt)?;
        }
        if run + 1 < runs {
            advance(&mut ptrs, &mut index, outer, &x.plan.strides);
        }
    }
    Ok(())
}

fn run_signature(x: &ExecuteArgs<'_>, first: &mut bool) -> Result<(), UFuncError> {
    let ndim = x.plan.shape.len();
    let (outer, inner_n) = split_inner(&x.plan.shape);
    let mut dims: Vec<isize> = Vec::with_capacity(1 + x.plan.dim_sizes.len());
    dims.push(inner_n as isize);
    dims.extend(x.plan.dim_sizes.iter().map(|&d| d as isize));
    let mut steps: Vec<isize> = x
        .plan
        .strides
        .iter()
        .map(|s| if ndim == 0 { 0 } else { s[ndim - 1] })
        .collect();
    for cs in &x.plan.core_strides {
        steps.extend(cs.iter().copied());
    }

    let runs: usize = outer.iter().product();
    let mut ptrs: Vec<*mut u8> = x.operands.iter().map(|o| o.data_ptr()).collect();
    let mut index = vec![0usize; outer.len()];
    for run in 0..runs {
        unsafe { (x.func)(&ptrs, &dims, &steps, x.data) };
        check_status(x.policy, first)?;
        poll_interrupt(x.interrupt)?;
        if run + 1 < runs {
            advance(&mut ptrs, &mut index, outer, &x.plan.strides);
        }
    }
    Ok(())
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattenable_layouts() {
        // dense row-major i32 (2,3)
        assert!(flattenable(&[2, 3], &[12, 4], 4));
        // fully stretched scalar
        assert!(flattenable(&[2, 3], &[0, 0], 8));
        // stretched row is not collapsible
        assert!(!flattenable(&[2, 3], &[0, 8], 8));
        // strided column view is not collapsible
        assert!(!flattenable(&[4], &[16], 8));
        // unit dims are transparent
        assert!(flattenable(&[2, 1, 3], &[24, 100, 8], 8));
    }
}
