use core_types::DataType;
use thiserror::Error;

use crate::fpe::FpeCategory;

/// Inner-loop ABI shared by built-in and user-registered loops.
///
/// `args` holds one data pointer per operand, inputs first. `dims[0]` is the
/// element count of this call; for generalized loops `dims[1..]` carries the
/// resolved distinct core-dimension extents. `steps[..args.len()]` are the
/// per-operand byte steps of the counted dimension; generalized loops find
/// their flattened per-operand core byte strides behind them.
pub type InnerLoopFn =
    unsafe fn(args: &[*mut u8], dims: &[isize], steps: &[isize], data: *const ());

/// One registered inner loop: full type signature (inputs then outputs),
/// the function, and its opaque data pointer.
pub struct Loop {
    pub types: Vec<DataType>,
    pub func: InnerLoopFn,
    pub data: *const (),
}

// Loop data points at 'static tables.
unsafe impl Send for Loop {}
unsafe impl Sync for Loop {}

/// Identity element used to seed reductions over an empty axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    None,
    Zero,
    One,
}

impl Identity {
    /// Raw native-order bytes of the identity in the given type, if any.
    pub fn bytes(self, dtype: DataType) -> Option<Vec<u8>> {
        macro_rules! encode {
            ($v:expr) => {
                Some(match dtype {
                    DataType::I8 => (($v) as i8).to_ne_bytes().to_vec(),
                    DataType::U8 => (($v) as u8).to_ne_bytes().to_vec(),
                    DataType::I16 => (($v) as i16).to_ne_bytes().to_vec(),
                    DataType::U16 => (($v) as u16).to_ne_bytes().to_vec(),
                    DataType::I32 => (($v) as i32).to_ne_bytes().to_vec(),
                    DataType::U32 => (($v) as u32).to_ne_bytes().to_vec(),
                    DataType::I64 => (($v) as i64).to_ne_bytes().to_vec(),
                    DataType::U64 => (($v) as u64).to_ne_bytes().to_vec(),
                    DataType::F32 => (($v) as f32).to_ne_bytes().to_vec(),
                    DataType::F64 => (($v) as f64).to_ne_bytes().to_vec(),
                })
            };
        }
        match self {
            Identity::None => None,
            Identity::Zero => encode!(0),
            Identity::One => encode!(1),
        }
    }
}

/// Everything that can go wrong between an `apply` call and its outputs.
#[derive(Debug, Error)]
pub enum UFuncError {
    #[error("unknown ufunc `{0}`")]
    UnknownUFunc(String),

    #[error("ufunc `{name}` takes {expected} {kind} operands, {found} given")]
    ArityMismatch {
        name: String,
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("operands could not be broadcast together (dimension {dim}: {left} vs {right})")]
    ShapeMismatch { dim: usize, left: usize, right: usize },

    #[error("output operand {operand} has shape {found:?}, expected {expected:?}")]
    OutputShapeMismatch {
        operand: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("core dimension `{name}` has size {found}, expected {expected}")]
    CoreDimensionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("operand {operand} has rank {rank}, but its core signature needs {needed} dimensions")]
    RankTooSmall {
        operand: usize,
        needed: usize,
        rank: usize,
    },

    #[error("invalid core signature `{signature}`: {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("ufunc `{name}` has no loop matching operand types {types:?}")]
    TypeResolution {
        name: String,
        types: Vec<DataType>,
    },

    #[error("floating point {0} encountered")]
    FloatingPoint(FpeCategory),

    #[error("zero-size reduction axis and ufunc `{0}` has no identity")]
    ReduceWithoutIdentity(String),

    #[error("ufunc `{0}` is not reducible (needs two inputs, one output, no core signature)")]
    NotReducible(String),

    #[error("generalized loops need directly usable operands; operand {0} requires buffering")]
    BufferedSignatureLoop(usize),

    #[error("axis {axis} is out of bounds for rank {rank}")]
    AxisOutOfBounds { axis: usize, rank: usize },

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("interrupted between chunks")]
    Interrupted,
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
