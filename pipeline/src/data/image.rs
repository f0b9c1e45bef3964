//! Structured image data: one scalar per point over a 3D extent.

use std::any::Any;

use log::warn;

use super::{DataObject, ExtentType};
use crate::data::data_keys;
use crate::extent::Extent;
use crate::information::Information;

/// A structured dataset over a six-integer extent, with an optional ghost
/// mask marking points outside the zero-ghost region of a piece.
#[derive(Default)]
pub struct ImageData {
    info: Information,
    extent: Extent,
    scalars: Vec<f64>,
    ghosts: Option<Vec<u8>>,
}

impl ImageData {
    pub fn new() -> Self {
        ImageData {
            info: Information::new(),
            extent: Extent::EMPTY,
            scalars: Vec::new(),
            ghosts: None,
        }
    }

    /// The extent this object covers.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Resize to `extent`, zero-filling scalars and recording the extent on
    /// the data information.
    pub fn allocate(&mut self, extent: Extent) {
        self.extent = extent;
        self.scalars = vec![0.0; extent.num_points()];
        self.ghosts = None;
        self.info.set(data_keys::data_extent(), extent);
    }

    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if self.extent.is_empty() {
            return None;
        }
        let e = self.extent.0;
        if x < e[0] || x > e[1] || y < e[2] || y > e[3] || z < e[4] || z > e[5] {
            return None;
        }
        let (nx, ny, _) = self.extent.dimensions();
        let ix = (x - e[0]) as usize;
        let iy = (y - e[2]) as usize;
        let iz = (z - e[4]) as usize;
        Some((iz * ny + iy) * nx + ix)
    }

    pub fn scalar(&self, x: i32, y: i32, z: i32) -> Option<f64> {
        self.index(x, y, z).map(|i| self.scalars[i])
    }

    pub fn set_scalar(&mut self, x: i32, y: i32, z: i32, value: f64) {
        match self.index(x, y, z) {
            Some(i) => self.scalars[i] = value,
            None => warn!("set_scalar at ({} {} {}) outside extent {}", x, y, z, self.extent),
        }
    }

    pub fn is_ghost(&self, x: i32, y: i32, z: i32) -> bool {
        match (&self.ghosts, self.index(x, y, z)) {
            (Some(ghosts), Some(i)) => ghosts[i] != 0,
            _ => false,
        }
    }

    /// Number of non-ghost points.
    pub fn num_real_points(&self) -> usize {
        match &self.ghosts {
            Some(ghosts) => ghosts.iter().filter(|&&g| g == 0).count(),
            None => self.scalars.len(),
        }
    }
}

impl DataObject for ImageData {
    fn extent_type(&self) -> ExtentType {
        ExtentType::ThreeD
    }

    fn information(&self) -> &Information {
        &self.info
    }

    fn information_mut(&mut self) -> &mut Information {
        &mut self.info
    }

    fn initialize(&mut self) {
        self.info.clear();
        self.extent = Extent::EMPTY;
        self.scalars.clear();
        self.ghosts = None;
    }

    fn crop(&mut self, extent: &Extent) {
        let target = extent.clamp_to(&self.extent);
        if target == self.extent {
            return;
        }
        let mut cropped = vec![0.0; target.num_points()];
        let mut cropped_ghosts = self.ghosts.as_ref().map(|_| vec![0u8; target.num_points()]);
        if !target.is_empty() {
            let (nx, ny, _) = target.dimensions();
            let t = target.0;
            for z in t[4]..=t[5] {
                for y in t[2]..=t[3] {
                    for x in t[0]..=t[1] {
                        let Some(src) = self.index(x, y, z) else {
                            continue;
                        };
                        let ix = (x - t[0]) as usize;
                        let iy = (y - t[2]) as usize;
                        let iz = (z - t[4]) as usize;
                        let dst = (iz * ny + iy) * nx + ix;
                        cropped[dst] = self.scalars[src];
                        if let (Some(out), Some(ghosts)) = (&mut cropped_ghosts, &self.ghosts) {
                            out[dst] = ghosts[src];
                        }
                    }
                }
            }
        }
        self.extent = target;
        self.scalars = cropped;
        self.ghosts = cropped_ghosts;
        self.info.set(data_keys::data_extent(), target);
    }

    fn generate_ghost_array(&mut self, zero_extent: &Extent) {
        if self.extent.is_empty() {
            return;
        }
        let mut ghosts = vec![0u8; self.extent.num_points()];
        let e = self.extent.0;
        let mut i = 0;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    let point = Extent::new(x, x, y, y, z, z);
                    if !zero_extent.contains(&point) {
                        ghosts[i] = 1;
                    }
                    i += 1;
                }
            }
        }
        self.ghosts = Some(ghosts);
    }

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
    fn test_allocate_and_index() {
        let mut image = ImageData::new();
        image.allocate(Extent::new(0, 4, 0, 4, 0, 0));
        image.set_scalar(3, 2, 0, 7.5);
        assert_eq!(image.scalar(3, 2, 0), Some(7.5));
        assert_eq!(image.scalar(5, 0, 0), None);
        assert_eq!(
            image.information().get(data_keys::data_extent()),
            Some(Extent::new(0, 4, 0, 4, 0, 0))
        );
    }

    #[test]
    fn test_crop_keeps_values() {
        let mut image = ImageData::new();
        image.allocate(Extent::new(0, 9, 0, 9, 0, 0));
        image.set_scalar(4, 4, 0, 1.0);
        image.set_scalar(9, 9, 0, 2.0);
        image.crop(&Extent::new(2, 5, 2, 5, 0, 0));
        assert_eq!(image.extent(), Extent::new(2, 5, 2, 5, 0, 0));
        assert_eq!(image.scalar(4, 4, 0), Some(1.0));
        assert_eq!(image.scalar(9, 9, 0), None);
    }

    #[test]
    fn test_ghost_array_marks_outside_zero_extent() {
        let mut image = ImageData::new();
        image.allocate(Extent::new(0, 5, 0, 0, 0, 0));
        image.generate_ghost_array(&Extent::new(0, 3, 0, 0, 0, 0));
        assert!(!image.is_ghost(2, 0, 0));
        assert!(image.is_ghost(4, 0, 0));
        assert_eq!(image.num_real_points(), 4);
    }

    #[test]
    fn test_initialize_wipes_information() {
        let mut image = ImageData::new();
        image.allocate(Extent::new(0, 1, 0, 0, 0, 0));
        image.initialize();
        assert!(image.information().is_empty());
        assert!(image.extent().is_empty());
    }
}
