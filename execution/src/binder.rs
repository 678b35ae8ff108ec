//! Splits generalized-ufunc operands into loop and core dimensions and
//! resolves every named core extent.

use ufx_ops::{CoreSignature, UFuncError};

/// Loop/core split for one operand.
#[derive(Debug)]
pub struct BoundOperand {
    pub loop_shape: Vec<usize>,
    pub loop_strides: Vec<isize>,
    /// One byte stride per declared core dimension; 0 for omitted dims.
    pub core_strides: Vec<isize>,
}

/// Bind every operand against the signature. `operands` covers inputs then
/// outputs, `None` marking outputs the caller did not supply. Core
/// dimensions are stripped from the trailing end; the first occurrence of a
/// name fixes its extent and later occurrences must agree. Returns the
/// per-operand splits and the resolved extent of each distinct name (1 for
/// names bound only through omitted dimensions).
pub fn bind_core_dims(
    sig: &CoreSignature,
    operands: &[Option<(&[usize], &[isize])>],
    nin: usize,
) -> Result<(Vec<Option<BoundOperand>>, Vec<usize>), UFuncError> {
    let mut dim_sizes: Vec<Option<usize>> = vec![None; sig.num_distinct()];
    let mut bound = Vec::with_capacity(operands.len());

    for (k, operand) in operands.iter().enumerate() {
        let Some((shape, strides)) = operand else {
            bound.push(None);
            continue;
        };
        let declared = sig.num_dims(k);
        let ixs = sig.dim_indices(k);
        let omis = sig.omissible(k);
        let rank = shape.len();

        // A rank-deficient operand must omit exactly its `?`-marked
        // dimensions, and only inputs may do so.
        let omissible_count = omis.iter().filter(|&&o| o).count();
        let used = if rank >= declared {
            declared
        } else {
            let missing = declared - rank;
            if k >= nin || missing != omissible_count || omissible_count == 0 {
                return Err(UFuncError::RankTooSmall {
                    operand: k,
                    needed: declared,
                    rank,
                });
            }
            declared - missing
        };
        let all_present = used == declared;
        let loop_rank = rank - used;

        let mut core_strides = vec![0isize; declared];
        let mut pos = loop_rank;
        for (j, (&ix, &omit)) in ixs.iter().zip(omis.iter()).enumerate() {
            if all_present || !omit {
                let extent = shape[pos];
                match dim_sizes[ix] {
                    None => dim_sizes[ix] = Some(extent),
                    Some(e) if e == extent => {}
                    Some(e) => {
                        return Err(UFuncError::CoreDimensionMismatch {
                            name: sig.names()[ix].clone(),
                            expected: e,
                            found: extent,
                        });
                    }
                }
                core_strides[j] = strides[pos];
                pos += 1;
            }
            // omitted dims bind as extent 1 and are never materialized
        }

        bound.push(Some(BoundOperand {
            loop_shape: shape[..loop_rank].to_vec(),
            loop_strides: strides[..loop_rank].to_vec(),
            core_strides,
        }));
    }

    let dim_sizes = dim_sizes.into_iter().map(|d| d.unwrap_or(1)).collect();
    Ok((bound, dim_sizes))
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
