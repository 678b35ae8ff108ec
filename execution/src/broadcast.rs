//! Trailing-alignment shape broadcasting.

use ufx_ops::UFuncError;

/// Common iteration shape of the given operand shapes: shapes are aligned at
/// their trailing end, absent leading dimensions count as 1, and each aligned
/// position takes the maximum extent after checking that every non-1 extent
/// there agrees.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>, UFuncError> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; ndim];
    for shape in shapes {
        let lead = ndim - shape.len();
        for (i, &d) in shape.iter().enumerate() {
            let b = &mut out[lead + i];
            if d == *b || d == 1 {
                continue;
            }
            if *b == 1 {
                *b = d;
            } else {
                return Err(UFuncError::ShapeMismatch {
                    dim: lead + i,
                    left: *b,
                    right: d,
                });
            }
        }
    }
    Ok(out)
}

/// Stride vector aligned to the broadcast shape. Dimensions the operand does
/// not have, and dimensions stretched from extent 1, replay one element with
/// stride 0.
pub fn broadcast_strides(shape: &[usize], strides: &[isize], bshape: &[usize]) -> Vec<isize> {
    let lead = bshape.len() - shape.len();
    let mut out = vec![0isize; bshape.len()];
    for (i, (&d, &s)) in shape.iter().zip(strides.iter()).enumerate() {
        out[lead + i] = if d == 1 && bshape[lead + i] != 1 { 0 } else { s };
    }
    out
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
