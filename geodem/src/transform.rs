//! Conversion between user coordinates and a dataset's native frame.

use std::fmt;

/// Maps points between the caller's projection and the dataset's native
/// frame (geographic degrees, or EGSA87 metres for the Greek sheets).
pub trait CoordinateTransform: Send + Sync + fmt::Debug {
    /// User coordinates to native coordinates.
    fn to_native(&self, x: f64, y: f64) -> (f64, f64);

    /// Native coordinates to user coordinates.
    fn from_native(&self, x: f64, y: f64) -> (f64, f64);
}

/// The user works in the dataset's native frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl CoordinateTransform for Identity {
    fn to_native(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }

    fn from_native(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Shifts user coordinates by a constant offset.
    #[derive(Debug)]
    pub(crate) struct Offset(pub f64, pub f64);

    impl CoordinateTransform for Offset {
        fn to_native(&self, x: f64, y: f64) -> (f64, f64) {
            (x + self.0, y + self.1)
        }

        fn from_native(&self, x: f64, y: f64) -> (f64, f64) {
            (x - self.0, y - self.1)
        }
    }

    #[test]
    fn test_identity() {
        assert_eq!(Identity.to_native(23.5, 38.25), (23.5, 38.25));
        assert_eq!(Identity.from_native(-122.0, 37.0), (-122.0, 37.0));
    }

    #[test]
    fn test_offset_inverts() {
        let t = Offset(100.0, -50.0);
        let (x, y) = t.to_native(1.0, 2.0);
        assert_eq!(t.from_native(x, y), (1.0, 2.0));
    }
}
