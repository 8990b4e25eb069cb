//! Foot marker relay. IK targets are copied onto the pop markers unchanged.

use nalgebra as na;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootPair {
    pub right: na::Point3<f32>,
    pub left: na::Point3<f32>,
}

impl FootPair {
    pub fn new(right: na::Point3<f32>, left: na::Point3<f32>) -> Self {
        Self { right, left }
    }

    /// Positions the pop markers should take this tick.
    pub fn mirror(targets: &FootPair) -> FootPair {
        *targets
    }
}

impl Default for FootPair {
    fn default() -> Self {
        Self::new(na::Point3::origin(), na::Point3::origin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_copies_both_feet() {
        let targets = FootPair::new(na::Point3::new(0.2, 0.4, 0.1), na::Point3::new(-0.2, 0.1, -0.1));
        let pops = FootPair::mirror(&targets);
        assert_eq!(pops.right, targets.right);
        assert_eq!(pops.left, targets.left);
    }
}
