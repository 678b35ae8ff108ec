//! Per-operand staging decisions and the element-wise copies that move data
//! between strided operand memory and the contiguous scratch regions.

use core_types::{cast_fn, swap_fn, CastFn, DataType, SwapFn};
use memory::BUFFER_ALIGN;
use tensor::NdArray;
use ufx_ops::UFuncError;

/// How one operand reaches the inner loop: directly, or staged with some
/// combination of byte swap and descriptor-level cast.
pub struct Staging {
    pub needs_buffer: bool,
    pub swap: bool,
    /// raw type -> loop type, for staged inputs that need a real cast
    pub cast_in: Option<CastFn>,
    /// loop type -> raw type, for staged outputs that need a real cast
    pub cast_out: Option<CastFn>,
    pub swap_fn: SwapFn,
    pub raw_elem: usize,
    pub loop_elem: usize,
}

/// Decide direct-use eligibility: the loop's exact type, native byte order,
/// and natural alignment. Anything else stages through the scratch buffer.
/// When only alignment or byte order is wrong, the gather itself is the
/// identity cast and no converter is attached.
pub fn plan_staging(
    op: &NdArray,
    loop_dtype: DataType,
    is_output: bool,
) -> Result<Staging, UFuncError> {
    let same_type = op.dtype() == loop_dtype;
    let swap = !op.byte_order().is_native();
    let needs_buffer = !same_type || swap || !op.is_aligned();

    let missing = |from: DataType, to: DataType| UFuncError::TypeResolution {
        name: "cast".to_string(),
        types: vec![from, to],
    };
    let cast_in = if needs_buffer && !same_type && !is_output {
        Some(cast_fn(op.dtype(), loop_dtype).ok_or_else(|| missing(op.dtype(), loop_dtype))?)
    } else {
        None
    };
    let cast_out = if needs_buffer && !same_type && is_output {
        Some(cast_fn(loop_dtype, op.dtype()).ok_or_else(|| missing(loop_dtype, op.dtype()))?)
    } else {
        None
    };

    Ok(Staging {
        needs_buffer,
        swap,
        cast_in,
        cast_out,
        swap_fn: swap_fn(op.elem_size()),
        raw_elem: op.elem_size(),
        loop_elem: loop_dtype.size_in_bytes(),
    })
}

/// Round a region size up to the allocation alignment.
pub(crate) fn align_up(n: usize) -> usize {
    (n + BUFFER_ALIGN - 1) & !(BUFFER_ALIGN - 1)
}

/// Strided gather into a contiguous buffer. Element-by-element byte copies,
/// so unaligned and foreign-order sources are fine.
pub unsafe fn gather(src: *const u8, stride: isize, elem: usize, count: usize, dst: *mut u8) {
    let mut s = src;
    let mut d = dst;
    for _ in 0..count {
        std::ptr::copy_nonoverlapping(s, d, elem);
        s = s.wrapping_offset(stride);
        d = d.wrapping_add(elem);
    }
}

/// Inverse of [`gather`]: contiguous buffer back into strided memory.
pub unsafe fn scatter(src: *const u8, elem: usize, count: usize, dst: *mut u8, stride: isize) {
    let mut s = src;
    let mut d = dst;
    for _ in 0..count {
        std::ptr::copy_nonoverlapping(s, d, elem);
        s = s.wrapping_add(elem);
        d = d.wrapping_offset(stride);
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ByteOrder;
    use tensor::Tensor;

    #[test]
    fn direct_when_everything_matches() {
        let t = Tensor::from_vec(&[1.0f64, 2.0], &[2]).unwrap();
        let s = plan_staging(t.nd(), DataType::F64, false).unwrap();
        assert!(!s.needs_buffer);
        assert!(!s.swap);
        assert!(s.cast_in.is_none());
    }

    #[test]
    fn wrong_type_stages_with_cast() {
        let t = Tensor::from_vec(&[1i32, 2], &[2]).unwrap();
        let s = plan_staging(t.nd(), DataType::F64, false).unwrap();
        assert!(s.needs_buffer);
        assert!(s.cast_in.is_some());
        assert_eq!((s.raw_elem, s.loop_elem), (4, 8));
        let out = plan_staging(t.nd(), DataType::F64, true).unwrap();
        assert!(out.cast_out.is_some());
        assert!(out.cast_in.is_none());
    }

    #[test]
    fn foreign_order_stages_without_cast() {
        let t = Tensor::from_vec(&[1.0f64, 2.0], &[2]).unwrap();
        let nd = t.nd();
        let v = tensor::NdArray::from_raw_parts(
            nd.buffer().clone(),
            0,
            nd.shape(),
            nd.strides(),
            DataType::F64,
            ByteOrder::native().swapped(),
        )
        .unwrap();
        let s = plan_staging(&v, DataType::F64, false).unwrap();
        assert!(s.needs_buffer);
        assert!(s.swap);
        assert!(s.cast_in.is_none());
    }

    #[test]
    fn gather_scatter_roundtrip() {
        let src: Vec<u32> = vec![1, 0, 2, 0, 3, 0];
        let mut packed = vec![0u32; 3];
        unsafe {
            gather(
                src.as_ptr() as *const u8,
                8,
                4,
                3,
                packed.as_mut_ptr() as *mut u8,
            );
        }
        assert_eq!(packed, vec![1, 2, 3]);

        let mut spread = vec![0u32; 6];
        unsafe {
            scatter(
                packed.as_ptr() as *const u8,
                4,
                3,
                spread.as_mut_ptr() as *mut u8,
                8,
            );
        }
        assert_eq!(spread, vec![1, 0, 2, 0, 3, 0]);
    }
}
