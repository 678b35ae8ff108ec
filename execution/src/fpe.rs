//! Per-invocation floating-point error policy, applied to the sticky status
//! word after every inner-loop call.

use std::sync::Arc;

use ufx_ops::fpe::{self, FpeCategory};
use ufx_ops::UFuncError;

/// What to do when a category shows up in the status word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorMode {
    Ignore,
    Warn,
    Raise,
    Call,
    Print,
    Log,
}

/// User callback for [`ErrorMode::Call`].
pub type FpeHandler = Arc<dyn Fn(FpeCategory) + Send + Sync>;

/// One mode per category plus the optional handler. Built per invocation;
/// nothing here is global.
#[derive(Clone)]
pub struct ErrorPolicy {
    pub divide_by_zero: ErrorMode,
    pub overflow: ErrorMode,
    pub underflow: ErrorMode,
    pub invalid: ErrorMode,
    pub handler: Option<FpeHandler>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            divide_by_zero: ErrorMode::Warn,
            overflow: ErrorMode::Warn,
            underflow: ErrorMode::Ignore,
            invalid: ErrorMode::Warn,
            handler: None,
        }
    }
}

impl ErrorPolicy {
    /// The same mode for all four categories.
    pub fn all(mode: ErrorMode) -> Self {
        Self {
            divide_by_zero: mode,
            overflow: mode,
            underflow: mode,
            invalid: mode,
            handler: None,
        }
    }

    pub fn ignore_all() -> Self {
        Self::all(ErrorMode::Ignore)
    }

    pub fn with(mut self, category: FpeCategory, mode: ErrorMode) -> Self {
        match category {
            FpeCategory::DivideByZero => self.divide_by_zero = mode,
            FpeCategory::Overflow => self.overflow = mode,
            FpeCategory::Underflow => self.underflow = mode,
            FpeCategory::Invalid => self.invalid = mode,
        }
        self
    }

    pub fn with_handler(mut self, handler: FpeHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn mode(&self, category: FpeCategory) -> ErrorMode {
        match category {
            FpeCategory::DivideByZero => self.divide_by_zero,
            FpeCategory::Overflow => self.overflow,
            FpeCategory::Underflow => self.underflow,
            FpeCategory::Invalid => self.invalid,
        }
    }
}

/// Read-and-clear the sticky word and apply the policy. `first` is the
/// once-per-invocation latch shared by the Warn and Print modes.
pub fn check_status(policy: &ErrorPolicy, first: &mut bool) -> Result<(), UFuncError> {
    let flags = fpe::read_and_clear();
    if flags == 0 {
        return Ok(());
    }
    for cat in FpeCategory::ALL {
        if flags & cat.flag() == 0 {
            continue;
        }
        match policy.mode(cat) {
            ErrorMode::Ignore => {}
            ErrorMode::Warn => {
                if *first {
                    *first = false;
                    log::warn!("floating point {cat} encountered");
                }
            }
            ErrorMode::Raise => return Err(UFuncError::FloatingPoint(cat)),
            ErrorMode::Call => {
                if let Some(handler) = policy.handler.as_ref() {
                    handler(cat);
                }
            }
            ErrorMode::Print => {
                if *first {
                    *first = false;
                    eprintln!("Warning: floating point {cat} encountered");
                }
            }
            ErrorMode::Log => log::debug!("floating point {cat} encountered"),
        }
    }
    Ok(())
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use ufx_ops::fpe::{raise_flags, FPE_DIVIDEBYZERO, FPE_OVERFLOW};

    #[test]
    fn raise_surfaces_the_category() {
        fpe::read_and_clear();
        raise_flags(FPE_DIVIDEBYZERO);
        let policy = ErrorPolicy::ignore_all().with(FpeCategory::DivideByZero, ErrorMode::Raise);
        let mut first = true;
        let err = check_status(&policy, &mut first).unwrap_err();
        assert!(matches!(
            err,
            UFuncError::FloatingPoint(FpeCategory::DivideByZero)
        ));
    }

    #[test]
    fn ignored_categories_pass_through() {
        fpe::read_and_clear();
        raise_flags(FPE_OVERFLOW);
        let mut first = true;
        check_status(&ErrorPolicy::ignore_all(), &mut first).unwrap();
        // the check cleared the word
        assert_eq!(fpe::read_and_clear(), 0);
    }

    #[test]
    fn call_mode_invokes_handler() {
        fpe::read_and_clear();
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let policy = ErrorPolicy::all(ErrorMode::Call)
            .with_handler(Arc::new(|_cat| {
                CALLS.fetch_add(1, Ordering::SeqCst);
            }));
        raise_flags(FPE_OVERFLOW | FPE_DIVIDEBYZERO);
        let mut first = true;
        check_status(&policy, &mut first).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}
