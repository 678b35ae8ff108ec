//! Sticky floating-point status shared between the inner loops and the
//! dispatcher. Loops accumulate exception bits locally and merge them once
//! per call; the dispatcher reads-and-clears the word after each call.

use std::cell::Cell;
use std::fmt;

pub const FPE_DIVIDEBYZERO: u32 = 1;
pub const FPE_OVERFLOW: u32 = 2;
pub const FPE_UNDERFLOW: u32 = 4;
pub const FPE_INVALID: u32 = 8;

thread_local! {
    static STATUS: Cell<u32> = const { Cell::new(0) };
}

/// OR exception bits into the thread's sticky status word.
pub fn raise_flags(flags: u32) {
    if flags != 0 {
        STATUS.with(|s| s.set(s.get() | flags));
    }
}

/// Read the sticky status word and clear it.
pub fn read_and_clear() -> u32 {
    STATUS.with(|s| s.replace(0))
}

/// The four exception categories tracked by the status word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FpeCategory {
    DivideByZero,
    Overflow,
    Underflow,
    Invalid,
}

impl FpeCategory {
    pub const ALL: [FpeCategory; 4] = [
        FpeCategory::DivideByZero,
        FpeCategory::Overflow,
        FpeCategory::Underflow,
        FpeCategory::Invalid,
    ];

    pub fn flag(self) -> u32 {
        match self {
            FpeCategory::DivideByZero => FPE_DIVIDEBYZERO,
            FpeCategory::Overflow => FPE_OVERFLOW,
            FpeCategory::Underflow => FPE_UNDERFLOW,
            FpeCategory::Invalid => FPE_INVALID,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FpeCategory::DivideByZero => "divide by zero",
            FpeCategory::Overflow => "overflow",
            FpeCategory::Underflow => "underflow",
            FpeCategory::Invalid => "invalid value",
        }
    }
}

impl fmt::Display for FpeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_read_and_clear() {
        read_and_clear();
        assert_eq!(read_and_clear(), 0);
        raise_flags(FPE_OVERFLOW);
        raise_flags(FPE_INVALID);
        assert_eq!(read_and_clear(), FPE_OVERFLOW | FPE_INVALID);
        assert_eq!(read_and_clear(), 0);
    }

    #[test]
    fn category_flags_are_distinct() {
        let mut seen = 0u32;
        for cat in FpeCategory::ALL {
            assert_eq!(seen & cat.flag(), 0);
            seen |= cat.flag();
        }
        assert_eq!(seen, 0b1111);
    }
}
