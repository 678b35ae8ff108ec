//! Arithmetic binary operations. Integer loops wrap on overflow; float
//! loops report exceptional conditions through the sticky status word.

use core_types::DataType::*;

use crate::register_ufunc;
use crate::types::Identity;
use crate::UFunc;

binary_loop!(add_i8, i8, |a, b| a.wrapping_add(b));
binary_loop!(add_u8, u8, |a, b| a.wrapping_add(b));
binary_loop!(add_i16, i16, |a, b| a.wrapping_add(b));
binary_loop!(add_u16, u16, |a, b| a.wrapping_add(b));
binary_loop!(add_i32, i32, |a, b| a.wrapping_add(b));
binary_loop!(add_u32, u32, |a, b| a.wrapping_add(b));
binary_loop!(add_i64, i64, |a, b| a.wrapping_add(b));
binary_loop!(add_u64, u64, |a, b| a.wrapping_add(b));
float_binary_loop!(add_f32, f32, |a, b| a + b);
float_binary_loop!(add_f64, f64, |a, b| a + b);

pub fn add() -> UFunc {
    UFunc::new("add", 2, 1, Identity::Zero)
        .with_loop(&[I8, I8, I8], add_i8)
        .with_loop(&[U8, U8, U8], add_u8)
        .with_loop(&[I16, I16, I16], add_i16)
        .with_loop(&[U16, U16, U16], add_u16)
        .with_loop(&[I32, I32, I32], add_i32)
        .with_loop(&[U32, U32, U32], add_u32)
        .with_loop(&[I64, I64, I64], add_i64)
        .with_loop(&[U64, U64, U64], add_u64)
        .with_loop(&[F32, F32, F32], add_f32)
        .with_loop(&[F64, F64, F64], add_f64)
}
register_ufunc!(add);

binary_loop!(subtract_i8, i8, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_u8, u8, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_i16, i16, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_u16, u16, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_i32, i32, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_u32, u32, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_i64, i64, |a, b| a.wrapping_sub(b));
binary_loop!(subtract_u64, u64, |a, b| a.wrapping_sub(b));
float_binary_loop!(subtract_f32, f32, |a, b| a - b);
float_binary_loop!(subtract_f64, f64, |a, b| a - b);

pub fn subtract() -> UFunc {
    UFunc::new("subtract", 2, 1, Identity::Zero)
        .with_loop(&[I8, I8, I8], subtract_i8)
        .with_loop(&[U8, U8, U8], subtract_u8)
        .with_loop(&[I16, I16, I16], subtract_i16)
        .with_loop(&[U16, U16, U16], subtract_u16)
        .with_loop(&[I32, I32, I32], subtract_i32)
        .with_loop(&[U32, U32, U32], subtract_u32)
        .with_loop(&[I64, I64, I64], subtract_i64)
        .with_loop(&[U64, U64, U64], subtract_u64)
        .with_loop(&[F32, F32, F32], subtract_f32)
        .with_loop(&[F64, F64, F64], subtract_f64)
}
register_ufunc!(subtract);

binary_loop!(multiply_i8, i8, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_u8, u8, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_i16, i16, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_u16, u16, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_i32, i32, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_u32, u32, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_i64, i64, |a, b| a.wrapping_mul(b));
binary_loop!(multiply_u64, u64, |a, b| a.wrapping_mul(b));
float_binary_loop!(multiply_f32, f32, |a, b| a * b);
float_binary_loop!(multiply_f64, f64, |a, b| a * b);

pub fn multiply() -> UFunc {
    UFunc::new("multiply", 2, 1, Identity::One)
        .with_loop(&[I8, I8, I8], multiply_i8)
        .with_loop(&[U8, U8, U8], multiply_u8)
        .with_loop(&[I16, I16, I16], multiply_i16)
        .with_loop(&[U16, U16, U16], multiply_u16)
        .with_loop(&[I32, I32, I32], multiply_i32)
        .with_loop(&[U32, U32, U32], multiply_u32)
        .with_loop(&[I64, I64, I64], multiply_i64)
        .with_loop(&[U64, U64, U64], multiply_u64)
        .with_loop(&[F32, F32, F32], multiply_f32)
        .with_loop(&[F64, F64, F64], multiply_f64)
}
register_ufunc!(multiply);

float_div_loop!(divide_f32, f32);
float_div_loop!(divide_f64, f64);

/// True division: integer operands resolve into the float loops.
pub fn divide() -> UFunc {
    UFunc::new("divide", 2, 1, Identity::None)
        .with_loop(&[F32, F32, F32], divide_f32)
        .with_loop(&[F64, F64, F64], divide_f64)
}
register_ufunc!(divide);

binary_loop!(maximum_i8, i8, |a, b| a.max(b));
binary_loop!(maximum_u8, u8, |a, b| a.max(b));
binary_loop!(maximum_i16, i16, |a, b| a.max(b));
binary_loop!(maximum_u16, u16, |a, b| a.max(b));
binary_loop!(maximum_i32, i32, |a, b| a.max(b));
binary_loop!(maximum_u32, u32, |a, b| a.max(b));
binary_loop!(maximum_i64, i64, |a, b| a.max(b));
binary_loop!(maximum_u64, u64, |a, b| a.max(b));
// NaN propagates, unlike f32::max
binary_loop!(maximum_f32, f32, |a, b| if a.is_nan() || a >= b { a } else { b });
binary_loop!(maximum_f64, f64, |a, b| if a.is_nan() || a >= b { a } else { b });

pub fn maximum() -> UFunc {
    UFunc::new("maximum", 2, 1, Identity::None)
        .with_loop(&[I8, I8, I8], maximum_i8)
        .with_loop(&[U8, U8, U8], maximum_u8)
        .with_loop(&[I16, I16, I16], maximum_i16)
        .with_loop(&[U16, U16, U16], maximum_u16)
        .with_loop(&[I32, I32, I32], maximum_i32)
        .with_loop(&[U32, U32, U32], maximum_u32)
        .with_loop(&[I64, I64, I64], maximum_i64)
        .with_loop(&[U64, U64, U64], maximum_u64)
        .with_loop(&[F32, F32, F32], maximum_f32)
        .with_loop(&[F64, F64, F64], maximum_f64)
}
register_ufunc!(maximum);

binary_loop!(minimum_i8, i8, |a, b| a.min(b));
binary_loop!(minimum_u8, u8, |a, b| a.min(b));
binary_loop!(minimum_i16, i16, |a, b| a.min(b));
binary_loop!(minimum_u16, u16, |a, b| a.min(b));
binary_loop!(minimum_i32, i32, |a, b| a.min(b));
binary_loop!(minimum_u32, u32, |a, b| a.min(b));
binary_loop!(minimum_i64, i64, |a, b| a.min(b));
binary_loop!(minimum_u64, u64, |a, b| a.min(b));
binary_loop!(minimum_f32, f32, |a, b| if a.is_nan() || a <= b { a } else { b });
binary_loop!(minimum_f64, f64, |a, b| if a.is_nan() || a <= b { a } else { b });

pub fn minimum() -> UFunc {
    UFunc::new("minimum", 2, 1, Identity::None)
        .with_loop(&[I8, I8, I8], minimum_i8)
        .with_loop(&[U8, U8, U8], minimum_u8)
        .with_loop(&[I16, I16, I16], minimum_i16)
        .with_loop(&[U16, U16, U16], minimum_u16)
        .with_loop(&[I32, I32, I32], minimum_i32)
        .with_loop(&[U32, U32, U32], minimum_u32)
        .with_loop(&[I64, I64, I64], minimum_i64)
        .with_loop(&[U64, U64, U64], minimum_u64)
        .with_loop(&[F32, F32, F32], minimum_f32)
        .with_loop(&[F64, F64, F64], minimum_f64)
}
register_ufunc!(minimum);
