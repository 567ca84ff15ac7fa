//! Types definitions to address IR registers.
//!
//! Registers are numbered slots of a method frame. Wide values (`long` and `double`)
//! occupy a register pair `(r, r + 1)` addressed by its first register. A distinguished
//! [`Reg::RESULT`] slot holds the pending result of the last invocation or of the last
//! instruction followed by a `move-result-pseudo`.

use serde::Serialize;
use std::fmt;

/// The register type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Reg(u32);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == Self::RESULT {
            write!(f, "result")
        } else {
            write!(f, "v{}", self.0)
        }
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(u32::from(r))
    }
}

impl From<u32> for Reg {
    fn from(r: u32) -> Self {
        Self(r)
    }
}

impl From<Reg> for u32 {
    fn from(r: Reg) -> Self {
        r.0
    }
}

impl Reg {
    /// The pseudo register receiving invocation results and pseudo results.
    pub const RESULT: Self = Self(u32::MAX);

    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the following register.
    ///
    /// This function is used to address register pairs without manipulating slot
    /// numbers directly.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_display() {
        assert_eq!(format!("{}", Reg::from(3u16)), "v3");
        assert_eq!(format!("{}", Reg::from(3u16).next()), "v4");
        assert_eq!(format!("{}", Reg::RESULT), "result");
    }
}
