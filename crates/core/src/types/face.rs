//! Face selection within an uploaded picture.

use core::fmt;

/// Error returned for a face number outside the accepted range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("face index must be between 1 and {max} (got {0})", max = FaceIndex::MAX)]
pub struct FaceIndexError(pub i64);

/// Which detected face to use.
///
/// Callers count faces from 1; the engine counts from 0. The value is stored
/// 0-based and only converted back for display and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FaceIndex(u8);

impl FaceIndex {
    /// Highest face number a caller may ask for.
    pub const MAX: u8 = 10;

    /// Parse a caller-supplied, 1-based face number.
    ///
    /// # Errors
    ///
    /// Returns [`FaceIndexError`] when the number is outside `1..=MAX`.
    pub fn from_one_based(number: i64) -> Result<Self, FaceIndexError> {
        match u8::try_from(number) {
            Ok(n @ 1..=Self::MAX) => Ok(Self(n - 1)),
            _ => Err(FaceIndexError(number)),
        }
    }

    /// Index as the engine sees it.
    #[must_use]
    pub const fn zero_based(self) -> usize {
        self.0 as usize
    }

    /// Index as the caller sees it.
    #[must_use]
    pub const fn one_based(self) -> usize {
        self.0 as usize + 1
    }
}

impl fmt::Display for FaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.one_based())
    }
}
