use core_types::{Casting, DataType, can_cast};

use crate::op::UFunc;
use crate::types::{InnerLoopFn, UFuncError};

/// Outcome of loop selection: the winning table index, its full signature,
/// and the function to invoke.
pub struct Resolution<'u> {
    pub index: usize,
    pub types: &'u [DataType],
    pub func: InnerLoopFn,
    pub data: *const (),
}

/// Select the inner loop for the given operand types.
///
/// This is a linear, registration-order scan: the first loop whose input
/// types are all reachable from the operand types under `casting` wins,
/// whether or not a later loop would be a closer match. Output slots only
/// constrain the scan when the caller supplied an output operand, in which
/// case the loop's declared output type must be castable to it.
pub fn resolve_loop<'u>(
    ufunc: &'u UFunc,
    in_types: &[DataType],
    out_types: &[Option<DataType>],
    casting: Casting,
) -> Result<Resolution<'u>, UFuncError> {
    debug_assert_eq!(in_types.len(), ufunc.nin());
    debug_assert_eq!(out_types.len(), ufunc.nout());

    'table: for (index, lp) in ufunc.loops().iter().enumerate() {
        for (&have, &want) in in_types.iter().zip(&lp.types[..ufunc.nin()]) {
            if !can_cast(have, want, casting) {
                continue 'table;
            }
        }
        for (requested, &declared) in out_types.iter().zip(&lp.types[ufunc.nin()..]) {
            if let Some(out) = requested {
                if !can_cast(declared, *out, casting) {
                    continue 'table;
                }
            }
        }
        return Ok(Resolution {
            index,
            types: &lp.types,
            func: lp.func,
            data: lp.data,
        });
    }
    Err(UFuncError::TypeResolution {
        name: ufunc.name().to_string(),
        types: in_types.to_vec(),
    })
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
