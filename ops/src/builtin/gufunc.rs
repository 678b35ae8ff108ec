//! Generalized operations: their loops consume whole core sub-arrays per
//! step of the outer broadcast loop. The dispatcher passes the resolved
//! distinct core extents in `dims[1..]` and each operand's core byte
//! strides behind the outer steps.

use core_types::DataType::*;

use crate::register_ufunc;
use crate::types::Identity;
use crate::UFunc;

macro_rules! inner1d_loop {
    ($name:ident, $ty:ty) => {
        // signature (i),(i)->(): steps[3] and steps[4] are the two inputs'
        // core strides for `i`.
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let di = dims[1] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut p2 = args[2];
                for _ in 0..n {
                    let mut q0 = p0;
                    let mut q1 = p1;
                    let mut acc: $ty = 0.0;
                    for _ in 0..di {
                        acc += *(q0 as *const $ty) * *(q1 as *const $ty);
                        q0 = q0.wrapping_offset(steps[3]);
                        q1 = q1.wrapping_offset(steps[4]);
                    }
                    *(p2 as *mut $ty) = acc;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                    p2 = p2.wrapping_offset(steps[2]);
                }
            }
        }
    };
}

inner1d_loop!(inner1d_f32, f32);
inner1d_loop!(inner1d_f64, f64);

/// Sub-array dot product over the shared core dimension.
pub fn inner1d() -> UFunc {
    UFunc::new("inner1d", 2, 1, Identity::None)
        .with_loop(&[F32, F32, F32], inner1d_f32)
        .with_loop(&[F64, F64, F64], inner1d_f64)
        .with_signature("(i),(i)->()")
        .expect("inner1d signature parses")
}
register_ufunc!(inner1d);

// signature (m,n),(n)->(m): dims = [count, m, n]; steps[3..5] are the matrix
// core strides, steps[5] the vector's, steps[6] the output's.
unsafe fn matvec_f64(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
    unsafe {
        let n = dims[0] as usize;
        let dm = dims[1] as usize;
        let dn = dims[2] as usize;
        let mut p0 = args[0];
        let mut p1 = args[1];
        let mut p2 = args[2];
        for _ in 0..n {
            for i in 0..dm {
                let mut row = p0.wrapping_offset(i as isize * steps[3]);
                let mut x = p1;
                let mut acc = 0.0f64;
                for _ in 0..dn {
                    acc += *(row as *const f64) * *(x as *const f64);
                    row = row.wrapping_offset(steps[4]);
                    x = x.wrapping_offset(steps[5]);
                }
                *(p2.wrapping_offset(i as isize * steps[6]) as *mut f64) = acc;
            }
            p0 = p0.wrapping_offset(steps[0]);
            p1 = p1.wrapping_offset(steps[1]);
            p2 = p2.wrapping_offset(steps[2]);
        }
    }
}

/// Matrix-vector product over named core dimensions.
pub fn matvec() -> UFunc {
    UFunc::new("matvec", 2, 1, Identity::None)
        .with_loop(&[F64, F64, F64], matvec_f64)
        .with_signature("(m,n),(n)->(m)")
        .expect("matvec signature parses")
}
register_ufunc!(matvec);
