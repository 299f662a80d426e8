//! Axis-aligned bounding boxes.

use cgmath::{EuclideanSpace, Point3, Transform};

use crate::data_structures::instance::Instance;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing `points`, `None` when there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        points.into_iter().fold(None, |acc: Option<Aabb>, p| match acc {
            None => Some(Aabb::new(p, p)),
            Some(aabb) => Some(aabb.including(p)),
        })
    }

    pub fn including(&self, p: Point3<f32>) -> Self {
        Self {
            min: Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn union(&self, other: &Aabb) -> Self {
        self.including(other.min).including(other.max)
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Re-fits the box around its eight corners after `transform`.
    ///
    /// Rotations make the result looser than the transformed geometry, which is
    /// the usual trade-off for box-of-boxes bounds.
    pub fn transformed(&self, transform: &Instance) -> Self {
        let matrix = transform.to_matrix();
        let corners = self.corners().map(|corner| matrix.transform_point(corner));
        let first = Aabb::new(corners[0], corners[0]);
        corners[1..]
            .iter()
            .fold(first, |aabb, corner| aabb.including(*corner))
    }
}

/// Union of optional boxes; `None` only when every input is `None`.
pub fn merge<I>(boxes: I) -> Option<Aabb>
where
    I: IntoIterator<Item = Option<Aabb>>,
{
    boxes
        .into_iter()
        .flatten()
        .reduce(|acc, aabb| acc.union(&aabb))
}
