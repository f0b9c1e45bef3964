//! The algorithm trait and the port context handed to algorithms.
//!
//! An algorithm never sees the graph. Every request arrives with a
//! `PortContext` holding snapshots of its input and output ports; the
//! executive moves the real port state in and out around the call.

use crate::data::DataRef;
use crate::error::PipelineError;
use crate::information::Information;
use crate::request::{Request, RequestKind};

/// One port's state as seen by an algorithm: the information bag and the
/// data object, if one exists yet.
#[derive(Default)]
pub struct PortState {
    pub info: Information,
    pub data: Option<DataRef>,
}

/// Everything an algorithm may read and write while handling a request.
///
/// `inputs[port]` holds one entry per connection on that input port, in
/// connection order. Input information bags are the upstream producers'
/// output bags, so writes to them during the update-extent pass are the
/// requests this node places upstream.
#[derive(Default)]
pub struct PortContext {
    pub inputs: Vec<Vec<PortState>>,
    pub outputs: Vec<PortState>,
}

impl PortContext {
    /// The first connection on input port `port`, or an error naming it.
    pub fn input(&self, port: usize) -> Result<&PortState, PipelineError> {
        self.inputs
            .get(port)
            .and_then(|connections| connections.first())
            .ok_or_else(|| PipelineError::port(format!("no connection on input port {}", port)))
    }

    pub fn input_mut(&mut self, port: usize) -> Result<&mut PortState, PipelineError> {
        self.inputs
            .get_mut(port)
            .and_then(|connections| connections.first_mut())
            .ok_or_else(|| PipelineError::port(format!("no connection on input port {}", port)))
    }

    pub fn output(&self, port: usize) -> Result<&PortState, PipelineError> {
        self.outputs
            .get(port)
            .ok_or_else(|| PipelineError::port(format!("no output port {}", port)))
    }

    pub fn output_mut(&mut self, port: usize) -> Result<&mut PortState, PipelineError> {
        self.outputs
            .get_mut(port)
            .ok_or_else(|| PipelineError::port(format!("no output port {}", port)))
    }
}

/// A node's computation. Implementors override the narrow hooks for the
/// request kinds they care about; everything else defaults to "nothing to
/// do".
pub trait Algorithm {
    fn num_input_ports(&self) -> usize;
    fn num_output_ports(&self) -> usize;

    /// Optional input ports may be left unconnected.
    fn input_port_optional(&self, port: usize) -> bool {
        let _ = port;
        false
    }

    /// Entry point for all requests. The default dispatches on the request
    /// kind; override only to intercept the protocol itself.
    fn process_request(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        match request.kind {
            RequestKind::DataObject => self.request_data_object(request, ports),
            RequestKind::Information => self.request_information(request, ports),
            RequestKind::UpdateTime => self.request_update_time(request, ports),
            RequestKind::TimeDependentInformation => {
                self.request_time_dependent_information(request, ports)
            }
            RequestKind::UpdateExtent => self.request_update_extent(request, ports),
            RequestKind::Data => self.request_data(request, ports),
        }
    }

    /// Create this node's output data objects.
    fn request_data_object(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    /// Publish metadata (whole extent, time steps) on the output bags.
    fn request_information(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    /// Translate the requested output time into input time requests.
    fn request_update_time(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    /// Refresh metadata that depends on the requested time.
    fn request_time_dependent_information(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    /// Translate the requested output extent into input extent requests.
    fn request_update_extent(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    /// Execute: fill the output data objects from the inputs. Set
    /// `request.continue_executing` to ask for another execution within
    /// the same update cycle.
    fn request_data(
        &mut self,
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let _ = (request, ports);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
