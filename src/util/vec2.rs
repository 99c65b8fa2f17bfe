use serde::{Deserialize, Serialize};

/// 2D vector in world units (y grows downward)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Arithmetic midpoint of two positions
    #[inline]
    pub fn midpoint(&self, other: Vec2) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        let a = Vec2::new(100.0, 40.0);
        let b = Vec2::new(101.0, 44.0);
        assert_eq!(a.midpoint(b), Vec2::new(100.5, 42.0));
        assert_eq!(a.midpoint(b), b.midpoint(a));
    }

    #[test]
    fn test_is_finite() {
        assert!(Vec2::new(1.0, 2.0).is_finite());
        assert!(!Vec2::new(f32::NAN, 2.0).is_finite());
        assert!(!Vec2::new(1.0, f32::INFINITY).is_finite());
    }
}
