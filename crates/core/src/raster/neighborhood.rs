//! Neighborhood kernels for focal operations

/// Circular window of `radius` cells around a cell: every offset with
/// `dr² + dc² <= radius²`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    radius: usize,
}

impl Neighborhood {
    pub fn circle(radius: usize) -> Self {
        Self { radius }
    }

    /// Get the radius of the neighborhood
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Get the size of the neighborhood (width and height)
    pub fn size(&self) -> usize {
        self.radius * 2 + 1
    }

    /// Check if a relative position is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        let r = self.radius as isize;
        dr * dr + dc * dc <= r * r
    }

    /// Relative positions in this neighborhood, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius as isize;
        let mut offsets = Vec::with_capacity(self.size() * self.size());

        for dr in -r..=r {
            for dc in -r..=r {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }

        offsets
    }
}

impl Default for Neighborhood {
    /// Radius one: the center and its four rook neighbours
    fn default() -> Self {
        Neighborhood::circle(1)
    }
}
