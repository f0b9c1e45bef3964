//! A demand-driven streaming pipeline for algorithm graphs.
//!
//! Algorithms are wired into a [`executive::Pipeline`] and pulled from the
//! downstream end: a consumer describes what it wants (an extent, a piece
//! of a partitioned result, a time value) on an output port's information
//! bag, and an update run propagates that request upstream, re-executing
//! only the algorithms whose cached outputs cannot satisfy it.
//!
//! ```no_run
//! use pipeline::executive::Pipeline;
//! # use pipeline::algorithm::Algorithm;
//! # fn source() -> Box<dyn Algorithm> { unimplemented!() }
//! # fn smooth() -> Box<dyn Algorithm> { unimplemented!() }
//! # fn main() -> Result<(), pipeline::error::PipelineError> {
//! let mut pipeline = Pipeline::new();
//! let reader = pipeline.add_algorithm("reader", source());
//! let filter = pipeline.add_algorithm("smooth", smooth());
//! pipeline.connect(reader, 0, filter, 0)?;
//! pipeline.set_update_piece(filter, 0, 0, 4, 1)?;
//! pipeline.update(filter)?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod data;
pub mod error;
pub mod executive;
pub mod extent;
pub mod information;
pub mod request;
pub mod splitter;

pub use algorithm::{Algorithm, PortContext, PortState};
pub use data::{data_ref, DataObject, DataRef, ExtentType, ImageData, PointSet};
pub use error::PipelineError;
pub use executive::{NodeId, Pipeline};
pub use extent::Extent;
pub use information::behavior::{metadata_key, IntRequestKey, KeyBehavior};
pub use information::key::Key;
pub use information::{InfoValue, Information};
pub use request::{Direction, Request, RequestKind};
pub use splitter::{ExtentSplitter, SplitMode};
