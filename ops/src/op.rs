use core_types::{DataType, MAX_ARGS};

use crate::signature::CoreSignature;
use crate::types::{Identity, InnerLoopFn, Loop, UFuncError};

/// A registered operation: arity, reduction identity, the ordered inner-loop
/// table, and (for generalized ufuncs) the parsed core signature.
///
/// The loop table is scanned linearly at resolution time, so registration
/// order is part of an operation's observable behavior.
pub struct UFunc {
    name: &'static str,
    nin: usize,
    nout: usize,
    identity: Identity,
    loops: Vec<Loop>,
    signature: Option<CoreSignature>,
}

impl UFunc {
    pub fn new(name: &'static str, nin: usize, nout: usize, identity: Identity) -> Self {
        assert!(
            nin >= 1 && nout >= 1 && nin + nout <= MAX_ARGS,
            "operation `{name}` must carry between 2 and {MAX_ARGS} operands"
        );
        Self {
            name,
            nin,
            nout,
            identity,
            loops: Vec::new(),
            signature: None,
        }
    }

    /// Append a built-in loop. Panics if the signature arity is wrong; the
    /// builtin tables are static.
    pub fn with_loop(mut self, types: &[DataType], func: InnerLoopFn) -> Self {
        self.push_loop(types, func, std::ptr::null());
        self
    }

    /// Attach a parsed core signature, turning this into a generalized ufunc.
    pub fn with_signature(mut self, sig: &str) -> Result<Self, UFuncError> {
        self.signature = Some(CoreSignature::parse(sig, self.nin, self.nout)?);
        Ok(self)
    }

    /// Append a user loop behind everything registered so far. Resolution
    /// scans the table in this order.
    pub fn register_loop(&mut self, types: &[DataType], func: InnerLoopFn, data: *const ()) {
        self.push_loop(types, func, data);
    }

    fn push_loop(&mut self, types: &[DataType], func: InnerLoopFn, data: *const ()) {
        assert_eq!(
            types.len(),
            self.nargs(),
            "loop signature for `{}` must cover all {} operands",
            self.name,
            self.nargs()
        );
        self.loops.push(Loop {
            types: types.to_vec(),
            func,
            data,
        });
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn nin(&self) -> usize {
        self.nin
    }

    pub fn nout(&self) -> usize {
        self.nout
    }

    pub fn nargs(&self) -> usize {
        self.nin + self.nout
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn signature(&self) -> Option<&CoreSignature> {
        self.signature.as_ref()
    }
}
