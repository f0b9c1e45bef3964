//! Ensemble member selection as a pipeline extension.
//!
//! Registers a request key pair that lets consumers ask a producer for a
//! specific member of an ensemble. The executive needs no knowledge of
//! ensembles: the key's behavior copies the request upstream during extent
//! propagation, votes for re-execution when the requested member differs
//! from the produced one, and records the satisfied member on the data.

use std::sync::OnceLock;

use log::debug;
use pipeline::algorithm::{Algorithm, PortContext};
use pipeline::data::{data_ref, PointSet};
use pipeline::error::PipelineError;
use pipeline::information::behavior::IntRequestKey;
use pipeline::request::Request;
use pipeline::{NodeId, Pipeline};

/// The member request key, interned once per process.
pub fn ensemble_member_key() -> IntRequestKey {
    static KEY: OnceLock<IntRequestKey> = OnceLock::new();
    *KEY.get_or_init(|| IntRequestKey::register("ensemble.member", "data.ensemble.member"))
}

/// Ask a port for one member of its ensemble.
pub fn set_update_member(
    pipeline: &mut Pipeline,
    node: NodeId,
    port: usize,
    member: i64,
) -> Result<(), PipelineError> {
    pipeline
        .output_information_mut(node, port)?
        .set(ensemble_member_key().key(), member);
    Ok(())
}

/// A source producing one point cloud per ensemble member.
pub struct EnsembleSource {
    pub num_members: i64,
}

impl EnsembleSource {
    pub fn new(num_members: i64) -> Self {
        EnsembleSource { num_members }
    }
}

impl Algorithm for EnsembleSource {
    fn num_input_ports(&self) -> usize {
        0
    }

    fn num_output_ports(&self) -> usize {
        1
    }

    fn request_data_object(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let out = ports.output_mut(0)?;
        if out.data.is_none() {
            out.data = Some(data_ref(PointSet::new()));
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let out = ports.output(0)?;
        let member = out.info.get(ensemble_member_key().key()).unwrap_or(0);
        if member < 0 || member >= self.num_members {
            return Err(PipelineError::execution(format!(
                "ensemble member {} out of range (0..{})",
                member, self.num_members
            )));
        }
        debug!("producing ensemble member {}", member);
        let data = out
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("ensemble source has no output data object"))?;
        let mut data = data.borrow_mut();
        let points: &mut PointSet = data
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not a point set"))?;
        // One recognizable point per member.
        points.push_point([member as f64, member as f64, 0.0]);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
