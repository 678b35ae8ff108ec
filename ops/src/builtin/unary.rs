//! Unary operations.

use core_types::DataType::*;

use crate::register_ufunc;
use crate::types::Identity;
use crate::UFunc;

unary_loop!(negative_i8, i8, |a| a.wrapping_neg());
unary_loop!(negative_i16, i16, |a| a.wrapping_neg());
unary_loop!(negative_i32, i32, |a| a.wrapping_neg());
unary_loop!(negative_i64, i64, |a| a.wrapping_neg());
unary_loop!(negative_f32, f32, |a| -a);
unary_loop!(negative_f64, f64, |a| -a);

pub fn negative() -> UFunc {
    UFunc::new("negative", 1, 1, Identity::None)
        .with_loop(&[I8, I8], negative_i8)
        .with_loop(&[I16, I16], negative_i16)
        .with_loop(&[I32, I32], negative_i32)
        .with_loop(&[I64, I64], negative_i64)
        .with_loop(&[F32, F32], negative_f32)
        .with_loop(&[F64, F64], negative_f64)
}
register_ufunc!(negative);

unary_loop!(absolute_i8, i8, |a| a.wrapping_abs());
unary_loop!(absolute_i16, i16, |a| a.wrapping_abs());
unary_loop!(absolute_i32, i32, |a| a.wrapping_abs());
unary_loop!(absolute_i64, i64, |a| a.wrapping_abs());
unary_loop!(absolute_f32, f32, |a| a.abs());
unary_loop!(absolute_f64, f64, |a| a.abs());

pub fn absolute() -> UFunc {
    UFunc::new("absolute", 1, 1, Identity::None)
        .with_loop(&[I8, I8], absolute_i8)
        .with_loop(&[I16, I16], absolute_i16)
        .with_loop(&[I32, I32], absolute_i32)
        .with_loop(&[I64, I64], absolute_i64)
        .with_loop(&[F32, F32], absolute_f32)
        .with_loop(&[F64, F64], absolute_f64)
}
register_ufunc!(absolute);

float_unary_loop!(sqrt_f32, f32, |a| a.sqrt());
float_unary_loop!(sqrt_f64, f64, |a| a.sqrt());

pub fn sqrt() -> UFunc {
    UFunc::new("sqrt", 1, 1, Identity::None)
        .with_loop(&[F32, F32], sqrt_f32)
        .with_loop(&[F64, F64], sqrt_f64)
}
register_ufunc!(sqrt);
