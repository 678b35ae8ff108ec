//! Comparison operations; results are 0/1 bytes.

use core_types::DataType::*;

use crate::register_ufunc;
use crate::types::Identity;
use crate::UFunc;

macro_rules! comparison_ufunc {
    ($factory:ident, $l32:ident, $l64:ident, $lu64:ident, $lf32:ident, $lf64:ident) => {
        pub fn $factory() -> UFunc {
            UFunc::new(stringify!($factory), 2, 1, Identity::None)
                .with_loop(&[I32, I32, U8], $l32)
                .with_loop(&[I64, I64, U8], $l64)
                .with_loop(&[U64, U64, U8], $lu64)
                .with_loop(&[F32, F32, U8], $lf32)
                .with_loop(&[F64, F64, U8], $lf64)
        }
        register_ufunc!($factory);
    };
}

cmp_loop!(equal_i32, i32, |a, b| a == b);
cmp_loop!(equal_i64, i64, |a, b| a == b);
cmp_loop!(equal_u64, u64, |a, b| a == b);
cmp_loop!(equal_f32, f32, |a, b| a == b);
cmp_loop!(equal_f64, f64, |a, b| a == b);
comparison_ufunc!(equal, equal_i32, equal_i64, equal_u64, equal_f32, equal_f64);

cmp_loop!(not_equal_i32, i32, |a, b| a != b);
cmp_loop!(not_equal_i64, i64, |a, b| a != b);
cmp_loop!(not_equal_u64, u64, |a, b| a != b);
cmp_loop!(not_equal_f32, f32, |a, b| a != b);
cmp_loop!(not_equal_f64, f64, |a, b| a != b);
comparison_ufunc!(
    not_equal,
    not_equal_i32,
    not_equal_i64,
    not_equal_u64,
    not_equal_f32,
    not_equal_f64
);

cmp_loop!(less_i32, i32, |a, b| a < b);
cmp_loop!(less_i64, i64, |a, b| a < b);
cmp_loop!(less_u64, u64, |a, b| a < b);
cmp_loop!(less_f32, f32, |a, b| a < b);
cmp_loop!(less_f64, f64, |a, b| a < b);
comparison_ufunc!(less, less_i32, less_i64, less_u64, less_f32, less_f64);

cmp_loop!(less_equal_i32, i32, |a, b| a <= b);
cmp_loop!(less_equal_i64, i64, |a, b| a <= b);
cmp_loop!(less_equal_u64, u64, |a, b| a <= b);
cmp_loop!(less_equal_f32, f32, |a, b| a <= b);
cmp_loop!(less_equal_f64, f64, |a, b| a <= b);
comparison_ufunc!(
    less_equal,
    less_equal_i32,
    less_equal_i64,
    less_equal_u64,
    less_equal_f32,
    less_equal_f64
);

cmp_loop!(greater_i32, i32, |a, b| a > b);
cmp_loop!(greater_i64, i64, |a, b| a > b);
cmp_loop!(greater_u64, u64, |a, b| a > b);
cmp_loop!(greater_f32, f32, |a, b| a > b);
cmp_loop!(greater_f64, f64, |a, b| a > b);
comparison_ufunc!(
    greater,
    greater_i32,
    greater_i64,
    greater_u64,
    greater_f32,
    greater_f64
);

cmp_loop!(greater_equal_i32, i32, |a, b| a >= b);
cmp_loop!(greater_equal_i64, i64, |a, b| a >= b);
cmp_loop!(greater_equal_u64, u64, |a, b| a >= b);
cmp_loop!(greater_equal_f32, f32, |a, b| a >= b);
cmp_loop!(greater_equal_f64, f64, |a, b| a >= b);
comparison_ufunc!(
    greater_equal,
    greater_equal_i32,
    greater_equal_i64,
    greater_equal_u64,
    greater_equal_f32,
    greater_equal_f64
);
