//! Data objects: the computed results owned by output ports.
//!
//! Every data object carries its own information bag recording what update
//! request produced it. The executive compares those records against the
//! port-side request to decide whether a node must re-execute.

mod image;
mod point_set;

pub use image::ImageData;
pub use point_set::PointSet;

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::extent::Extent;
use crate::information::Information;

/// How a data object's domain is partitioned for streaming.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExtentType {
    /// Unstructured: piece p of n logical partitions.
    Pieces,
    /// Structured: a six-integer index-space box.
    ThreeD,
}

/// The contract every produced result satisfies.
pub trait DataObject: Any {
    fn extent_type(&self) -> ExtentType;

    /// The data-side information bag (what request produced this object).
    fn information(&self) -> &Information;
    fn information_mut(&mut self) -> &mut Information;

    /// Wipe contents and data information in preparation for execution.
    fn initialize(&mut self);

    /// Shrink the object to the given extent. Piece-based objects ignore
    /// this.
    fn crop(&mut self, extent: &Extent);

    /// Mark everything outside `zero_extent` as ghost. Only meaningful for
    /// structured objects produced with ghost levels.
    fn generate_ghost_array(&mut self, zero_extent: &Extent) {
        let _ = zero_extent;
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to a data object. The pipeline model is single-threaded,
/// so a producing port and its consumers share one `Rc`.
pub type DataRef = Rc<RefCell<dyn DataObject>>;

/// Wrap a concrete data object into a shared handle.
pub fn data_ref<T: DataObject>(object: T) -> DataRef {
    Rc::new(RefCell::new(object))
}

/// Data-side keys recording the satisfied request.
pub mod data_keys {
    use std::sync::OnceLock;

    use crate::extent::Extent;
    use crate::information::key::Key;

    macro_rules! data_key {
        ($(#[$doc:meta])* $name:ident, $ty:ty, $key_name:literal) => {
            $(#[$doc])*
            pub fn $name() -> Key<$ty> {
                static K: OnceLock<Key<$ty>> = OnceLock::new();
                *K.get_or_init(|| Key::new($key_name))
            }
        };
    }

    data_key!(
        /// The structured extent this object actually covers.
        data_extent, Extent, "data.extent"
    );
    data_key!(
        /// The full requested extent when the object holds one piece of a
        /// multi-piece request.
        all_pieces_extent, Extent, "data.all_pieces_extent"
    );
    data_key!(data_piece_number, i64, "data.piece_number");
    data_key!(data_number_of_pieces, i64, "data.number_of_pieces");
    data_key!(data_number_of_ghost_levels, i64, "data.number_of_ghost_levels");
    data_key!(
        /// The time value this object was produced at.
        data_time_step, f64, "data.time_step"
    );
}
