//! Well-known pipeline keys: the wire protocol between the executive and
//! algorithm nodes. Each accessor interns its key once.

use std::sync::OnceLock;

use crate::extent::Extent;
use crate::information::key::Key;

macro_rules! pipeline_key {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $key_name:literal) => {
        $(#[$doc])*
        pub fn $name() -> Key<$ty> {
            static K: OnceLock<Key<$ty>> = OnceLock::new();
            *K.get_or_init(|| Key::new($key_name))
        }
    };
}

pipeline_key!(
    /// The full structured domain an output can produce.
    whole_extent, Extent, "pipeline.whole_extent"
);
pipeline_key!(
    /// The sub-domain requested from an output.
    update_extent, Extent, "pipeline.update_extent"
);
pipeline_key!(
    /// How a consumer's update extent interacts with previous requests:
    /// [`UPDATE_EXTENT_COMBINE`] unions, [`UPDATE_EXTENT_REPLACE`] overrides.
    update_extent_initialized, i64, "pipeline.update_extent_initialized"
);
pipeline_key!(
    /// Running union of all consumer-requested extents within one cycle.
    combined_update_extent, Extent, "pipeline.combined_update_extent"
);
pipeline_key!(
    /// Opt-out flag: the update extent may exceed the whole extent.
    unrestricted_update_extent, i64, "pipeline.unrestricted_update_extent"
);
pipeline_key!(
    /// Crop produced data to the update extent after execution.
    exact_extent, i64, "pipeline.exact_extent"
);
pipeline_key!(update_piece_number, i64, "pipeline.update_piece_number");
pipeline_key!(update_number_of_pieces, i64, "pipeline.update_number_of_pieces");
pipeline_key!(update_number_of_ghost_levels, i64, "pipeline.update_number_of_ghost_levels");
pipeline_key!(
    /// The discrete time values an output can produce.
    time_steps, Vec<f64>, "pipeline.time_steps"
);
pipeline_key!(
    /// The continuous [min, max] time range an output covers.
    time_range, Vec<f64>, "pipeline.time_range"
);
pipeline_key!(
    /// The time value requested from an output.
    update_time_step, f64, "pipeline.update_time_step"
);
pipeline_key!(
    /// The time value requested by the previous update cycle.
    previous_update_time_step, f64, "pipeline.previous_update_time_step"
);
pipeline_key!(
    /// Set when an output's metadata depends on the requested time.
    time_dependent_information, i64, "pipeline.time_dependent_information"
);
pipeline_key!(
    /// The algorithm can honor piece requests itself.
    can_handle_piece_request, i64, "pipeline.can_handle_piece_request"
);
pipeline_key!(
    /// The algorithm fills whatever structured sub-extent it is given, so
    /// the executive may split piece requests into sub-extents for it.
    can_produce_sub_extent, i64, "pipeline.can_produce_sub_extent"
);
pipeline_key!(
    /// Overrides the splitter mode used when breaking extents into pieces.
    update_split_mode, i64, "pipeline.update_split_mode"
);

/// Union this update extent with previously requested ones (default).
pub const UPDATE_EXTENT_COMBINE: i64 = 1;
/// Discard previously requested extents and take this one verbatim.
pub const UPDATE_EXTENT_REPLACE: i64 = 2;
