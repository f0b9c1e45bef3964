//! Unstructured point data, partitioned by logical pieces.

use std::any::Any;

use super::{DataObject, ExtentType};
use crate::extent::Extent;
use crate::information::Information;

/// A flat set of 3D points. Pieces are logical partitions; the object
/// holds whichever piece its producer last generated.
#[derive(Default)]
pub struct PointSet {
    info: Information,
    points: Vec<[f64; 3]>,
}

impl PointSet {
    pub fn new() -> Self {
        PointSet {
            info: Information::new(),
            points: Vec::new(),
        }
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn push_point(&mut self, point: [f64; 3]) {
        self.points.push(point);
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

impl DataObject for PointSet {
    fn extent_type(&self) -> ExtentType {
        ExtentType::Pieces
    }

    fn information(&self) -> &Information {
        &self.info
    }

    fn information_mut(&mut self) -> &mut Information {
        &mut self.info
    }

    fn initialize(&mut self) {
        self.info.clear();
        self.points.clear();
    }

    // Piece-based data has no index-space box to shrink to.
    fn crop(&mut self, _extent: &Extent) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_clears_points_and_information() {
        let mut points = PointSet::new();
        points.push_point([1.0, 2.0, 3.0]);
        points
            .information_mut()
            .set(crate::data::data_keys::data_piece_number(), 2);
        points.initialize();
        assert_eq!(points.num_points(), 0);
        assert!(points.information().is_empty());
    }

    #[test]
    fn test_crop_is_a_no_op() {
        let mut points = PointSet::new();
        points.push_point([0.0, 0.0, 0.0]);
        points.crop(&Extent::new(5, 6, 5, 6, 5, 6));
        assert_eq!(points.num_points(), 1);
    }
}
