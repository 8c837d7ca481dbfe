//! This module defines [Term].

use std::fmt;

/// Bit that distinguishes nulls from constants.
const NULL_FLAG: u64 = 1 << 63;

/// Encoded value of a tuple component.
///
/// A term is either a constant, identified by its dictionary id,
/// or a null generated for an existential variable.
/// Both kinds share one `u64` space; the highest bit marks nulls,
/// so every constant is smaller than every null.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Term(u64);

impl Term {
    /// Largest id that can be stored in a [Term].
    pub const MAX_ID: u64 = NULL_FLAG - 1;

    /// Create a constant from its dictionary id.
    pub fn constant(id: u64) -> Self {
        debug_assert!(id <= Self::MAX_ID);
        Self(id & Self::MAX_ID)
    }

    /// Create a null from its id.
    pub fn null(id: u64) -> Self {
        debug_assert!(id <= Self::MAX_ID);
        Self(NULL_FLAG | (id & Self::MAX_ID))
    }

    /// Return `true` if this term is a generated null.
    pub fn is_null(self) -> bool {
        self.0 & NULL_FLAG != 0
    }

    /// Return `true` if this term is a constant.
    pub fn is_constant(self) -> bool {
        !self.is_null()
    }

    /// Return the id of the term without its tag.
    pub fn value(self) -> u64 {
        self.0 & Self::MAX_ID
    }

    /// Return the raw encoding of the term.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "_:N{}", self.value())
        } else {
            write!(f, "c{}", self.value())
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;

    use super::Term;

    #[test]
    fn nulls_are_tagged() {
        let constant = Term::constant(7);
        let null = Term::null(7);

        assert!(constant.is_constant());
        assert!(null.is_null());
        assert_ne!(constant, null);
        assert_eq!(constant.value(), null.value());
    }

    #[quickcheck]
    fn constants_sort_before_nulls(constant: u64, null: u64) -> bool {
        let constant = Term::constant(constant & Term::MAX_ID);
        let null = Term::null(null & Term::MAX_ID);

        constant < null
    }
}
