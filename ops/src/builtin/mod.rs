//! Built-in loop catalogue. Loops are macro-expanded per element type and
//! registered in promotion order, which is what resolution scans.

/// Elementwise binary loop with no exception tracking.
macro_rules! binary_loop {
    ($name:ident, $ty:ty, |$a:ident, $b:ident| $expr:expr) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut p2 = args[2];
                for _ in 0..n {
                    let $a = *(p0 as *const $ty);
                    let $b = *(p1 as *const $ty);
                    *(p2 as *mut $ty) = $expr;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                    p2 = p2.wrapping_offset(steps[2]);
                }
            }
        }
    };
}

/// Float binary loop; folds observed exception bits into the sticky status
/// word once per call.
macro_rules! float_binary_loop {
    ($name:ident, $ty:ty, |$a:ident, $b:ident| $expr:expr) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut p2 = args[2];
                let mut flags = 0u32;
                for _ in 0..n {
                    let $a = *(p0 as *const $ty);
                    let $b = *(p1 as *const $ty);
                    let r: $ty = $expr;
                    if r.is_nan() && !$a.is_nan() && !$b.is_nan() {
                        flags |= crate::fpe::FPE_INVALID;
                    } else if r.is_infinite() && $a.is_finite() && $b.is_finite() {
                        flags |= crate::fpe::FPE_OVERFLOW;
                    } else if r.is_subnormal() {
                        flags |= crate::fpe::FPE_UNDERFLOW;
                    }
                    *(p2 as *mut $ty) = r;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                    p2 = p2.wrapping_offset(steps[2]);
                }
                crate::fpe::raise_flags(flags);
            }
        }
    };
}

/// Float division; distinguishes divide-by-zero from invalid 0/0.
macro_rules! float_div_loop {
    ($name:ident, $ty:ty) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut p2 = args[2];
                let mut flags = 0u32;
                for _ in 0..n {
                    let a = *(p0 as *const $ty);
                    let b = *(p1 as *const $ty);
                    let r = a / b;
                    if b == 0.0 {
                        if a == 0.0 {
                            flags |= crate::fpe::FPE_INVALID;
                        } else if !a.is_nan() {
                            flags |= crate::fpe::FPE_DIVIDEBYZERO;
                        }
                    } else if r.is_nan() && !a.is_nan() && !b.is_nan() {
                        flags |= crate::fpe::FPE_INVALID;
                    } else if r.is_infinite() && a.is_finite() {
                        flags |= crate::fpe::FPE_OVERFLOW;
                    } else if r.is_subnormal() {
                        flags |= crate::fpe::FPE_UNDERFLOW;
                    }
                    *(p2 as *mut $ty) = r;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                    p2 = p2.wrapping_offset(steps[2]);
                }
                crate::fpe::raise_flags(flags);
            }
        }
    };
}

/// Elementwise unary loop with no exception tracking.
macro_rules! unary_loop {
    ($name:ident, $ty:ty, |$a:ident| $expr:expr) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                for _ in 0..n {
                    let $a = *(p0 as *const $ty);
                    *(p1 as *mut $ty) = $expr;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                }
            }
        }
    };
}

/// Float unary loop with invalid/overflow tracking.
macro_rules! float_unary_loop {
    ($name:ident, $ty:ty, |$a:ident| $expr:expr) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut flags = 0u32;
                for _ in 0..n {
                    let $a = *(p0 as *const $ty);
                    let r: $ty = $expr;
                    if r.is_nan() && !$a.is_nan() {
                        flags |= crate::fpe::FPE_INVALID;
                    } else if r.is_infinite() && $a.is_finite() {
                        flags |= crate::fpe::FPE_OVERFLOW;
                    }
                    *(p1 as *mut $ty) = r;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                }
                crate::fpe::raise_flags(flags);
            }
        }
    };
}

/// Comparison loop; writes 0/1 bytes.
macro_rules! cmp_loop {
    ($name:ident, $ty:ty, |$a:ident, $b:ident| $expr:expr) => {
        unsafe fn $name(args: &[*mut u8], dims: &[isize], steps: &[isize], _data: *const ()) {
            unsafe {
                let n = dims[0] as usize;
                let mut p0 = args[0];
                let mut p1 = args[1];
                let mut p2 = args[2];
                for _ in 0..n {
                    let $a = *(p0 as *const $ty);
                    let $b = *(p1 as *const $ty);
                    let r: bool = $expr;
                    *p2 = r as u8;
                    p0 = p0.wrapping_offset(steps[0]);
                    p1 = p1.wrapping_offset(steps[1]);
                    p2 = p2.wrapping_offset(steps[2]);
                }
            }
        }
    };
}

mod arith;
mod compare;
mod gufunc;
mod unary;
