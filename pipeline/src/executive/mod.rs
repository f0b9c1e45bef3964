//! The pipeline executive: the algorithm graph plus the generic request
//! forwarding machinery.
//!
//! Nodes own their output ports (information bag and produced data). A
//! consumer's "input information" is the producing port's bag, so requests
//! written upstream during propagation land directly where the producer
//! reads them. The streaming passes themselves live in [`streaming`].

mod streaming;

use std::collections::HashSet;
use std::mem;

use log::{error, trace};
use uuid::Uuid;

use crate::algorithm::{Algorithm, PortContext, PortState};
use crate::data::DataRef;
use crate::error::PipelineError;
use crate::information::key;
use crate::information::{keys, Information};
use crate::request::{Request, RequestKind};

/// Handle to a node in one `Pipeline`. Ids are not valid across pipelines.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(usize);

/// A directed edge from an output port to an input port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Connection {
    pub from: (NodeId, usize),
    pub to: (NodeId, usize),
}

struct OutputPort {
    info: Information,
    data: Option<DataRef>,
}

pub(crate) struct NodeEntry {
    uuid: Uuid,
    label: String,
    /// Taken out while the algorithm runs; `None` here means "executing".
    algorithm: Option<Box<dyn Algorithm>>,
    num_input_ports: usize,
    outputs: Vec<OutputPort>,
    /// The algorithm asked for another execution in this update cycle.
    pub(crate) continue_executing: bool,
    /// Last extent propagation found nothing to do.
    pub(crate) short_circuited: bool,
    /// When this node was last modified.
    mtime: u64,
    /// Max modification time over this node and everything upstream.
    pub(crate) pipeline_mtime: u64,
    pub(crate) data_object_time: u64,
    pub(crate) information_time: u64,
    /// When this node's outputs were last (re)generated.
    pub(crate) data_time: u64,
}

/// A demand-driven algorithm graph.
#[derive(Default)]
pub struct Pipeline {
    nodes: Vec<NodeEntry>,
    connections: Vec<Connection>,
    mtime_counter: u64,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.mtime_counter += 1;
        self.mtime_counter
    }

    /// Add an algorithm as a new node. Port counts are fixed at insertion.
    pub fn add_algorithm(&mut self, label: &str, algorithm: Box<dyn Algorithm>) -> NodeId {
        let mtime = self.tick();
        let num_input_ports = algorithm.num_input_ports();
        let outputs = (0..algorithm.num_output_ports())
            .map(|_| OutputPort {
                info: Information::new(),
                data: None,
            })
            .collect();
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            uuid: Uuid::new_v4(),
            label: label.to_string(),
            algorithm: Some(algorithm),
            num_input_ports,
            outputs,
            continue_executing: false,
            short_circuited: false,
            mtime,
            pipeline_mtime: mtime,
            data_object_time: 0,
            information_time: 0,
            data_time: 0,
        });
        trace!("added node '{}' ({})", label, self.nodes[id.0].uuid);
        id
    }

    /// Connect `from`'s output port to `to`'s input port.
    pub fn connect(
        &mut self,
        from: NodeId,
        from_port: usize,
        to: NodeId,
        to_port: usize,
    ) -> Result<(), PipelineError> {
        let from_entry = self.entry_checked(from)?;
        if from_port >= from_entry.outputs.len() {
            return Err(PipelineError::port(format!(
                "'{}' has no output port {}",
                from_entry.label, from_port
            )));
        }
        let to_entry = self.entry_checked(to)?;
        if to_port >= to_entry.num_input_ports {
            return Err(PipelineError::port(format!(
                "'{}' has no input port {}",
                to_entry.label, to_port
            )));
        }
        if from == to {
            return Err(PipelineError::graph(format!(
                "cannot connect '{}' to itself",
                to_entry.label
            )));
        }
        let connection = Connection {
            from: (from, from_port),
            to: (to, to_port),
        };
        if self.connections.contains(&connection) {
            return Err(PipelineError::graph(format!(
                "'{}' port {} is already connected to '{}' port {}",
                self.nodes[from.0].label, from_port, self.nodes[to.0].label, to_port
            )));
        }
        self.connections.push(connection);
        self.modified(to);
        Ok(())
    }

    /// Bump the node's modification time, forcing downstream re-execution
    /// on the next update.
    pub fn modified(&mut self, node: NodeId) {
        let time = self.tick();
        self.nodes[node.0].mtime = time;
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn label(&self, node: NodeId) -> &str {
        &self.nodes[node.0].label
    }

    pub fn uuid(&self, node: NodeId) -> Uuid {
        self.nodes[node.0].uuid
    }

    fn entry_checked(&self, node: NodeId) -> Result<&NodeEntry, PipelineError> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| PipelineError::graph(format!("unknown node id {:?}", node)))
    }

    pub fn output_information(
        &self,
        node: NodeId,
        port: usize,
    ) -> Result<&Information, PipelineError> {
        let entry = self.entry_checked(node)?;
        entry
            .outputs
            .get(port)
            .map(|out| &out.info)
            .ok_or_else(|| PipelineError::port(format!("'{}' has no output port {}", entry.label, port)))
    }

    pub fn output_information_mut(
        &mut self,
        node: NodeId,
        port: usize,
    ) -> Result<&mut Information, PipelineError> {
        self.entry_checked(node)?;
        let entry = &mut self.nodes[node.0];
        let label = entry.label.clone();
        entry
            .outputs
            .get_mut(port)
            .map(|out| &mut out.info)
            .ok_or_else(|| PipelineError::port(format!("'{}' has no output port {}", label, port)))
    }

    /// The data object currently held by an output port, if any.
    pub fn output_data(&self, node: NodeId, port: usize) -> Result<Option<DataRef>, PipelineError> {
        let entry = self.entry_checked(node)?;
        entry
            .outputs
            .get(port)
            .map(|out| out.data.clone())
            .ok_or_else(|| PipelineError::port(format!("'{}' has no output port {}", entry.label, port)))
    }

    /// Borrow the node's algorithm, for configuration between updates.
    pub fn algorithm_mut(&mut self, node: NodeId) -> Result<&mut dyn Algorithm, PipelineError> {
        self.entry_checked(node)?;
        let entry = &mut self.nodes[node.0];
        match entry.algorithm.as_deref_mut() {
            Some(algorithm) => Ok(algorithm),
            None => Err(PipelineError::execution(format!(
                "'{}' is currently executing",
                entry.label
            ))),
        }
    }

    /// The producers wired into one input port, in connection order.
    fn input_connections(&self, node: NodeId, port: usize) -> Vec<(NodeId, usize)> {
        self.connections
            .iter()
            .filter(|c| c.to == (node, port))
            .map(|c| c.from)
            .collect()
    }

    fn has_connected_inputs(&self, node: NodeId) -> bool {
        self.connections.iter().any(|c| c.to.0 == node)
    }

    /// First connected producer across all input ports, used as the source
    /// of downstream-copied metadata.
    fn first_input(&self, node: NodeId) -> Option<(NodeId, usize)> {
        (0..self.nodes[node.0].num_input_ports)
            .find_map(|port| self.input_connections(node, port).into_iter().next())
    }

    /// Max modification time over `node` and everything upstream of it.
    /// Fails on a cycle.
    pub(crate) fn update_pipeline_mtime(&mut self, node: NodeId) -> Result<u64, PipelineError> {
        let mut visiting = HashSet::new();
        self.pipeline_mtime_recurse(node, &mut visiting)
    }

    fn pipeline_mtime_recurse(
        &mut self,
        node: NodeId,
        visiting: &mut HashSet<NodeId>,
    ) -> Result<u64, PipelineError> {
        if !visiting.insert(node) {
            return Err(PipelineError::graph(format!(
                "cycle detected at '{}'",
                self.nodes[node.0].label
            )));
        }
        let mut time = self.nodes[node.0].mtime;
        for port in 0..self.nodes[node.0].num_input_ports {
            for (upstream, _) in self.input_connections(node, port) {
                time = time.max(self.pipeline_mtime_recurse(upstream, visiting)?);
            }
        }
        visiting.remove(&node);
        self.nodes[node.0].pipeline_mtime = time;
        Ok(time)
    }

    /// Forward a request across every input connection, restoring the
    /// originating-port field around each hop. The first failure aborts
    /// the pass.
    pub(crate) fn forward_upstream(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        for port in 0..self.nodes[node.0].num_input_ports {
            let connections = self.input_connections(node, port);
            if connections.is_empty() {
                let optional = match self.nodes[node.0].algorithm.as_deref() {
                    Some(algorithm) => algorithm.input_port_optional(port),
                    None => false,
                };
                if !optional {
                    return Err(PipelineError::graph(format!(
                        "input port {} of '{}' is not connected",
                        port, self.nodes[node.0].label
                    )));
                }
                continue;
            }
            for (upstream, upstream_port) in connections {
                let saved = request.from_output_port;
                request.from_output_port = Some(upstream_port);
                let result = self.process_request(upstream, request);
                request.from_output_port = saved;
                result?;
            }
        }
        Ok(())
    }

    /// Run the node's algorithm against a snapshot of its ports, after
    /// seeding default information for the request kind.
    pub(crate) fn call_algorithm(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        self.copy_default_information(node, request)?;

        let mut algorithm = self.nodes[node.0].algorithm.take().ok_or_else(|| {
            PipelineError::execution(format!(
                "'{}' invoked recursively during its own execution",
                self.nodes[node.0].label
            ))
        })?;
        let mut ports = self.take_port_context(node);
        trace!(
            "calling '{}' for {:?}",
            self.nodes[node.0].label,
            request.kind
        );
        let result = algorithm.process_request(request, &mut ports);
        self.restore_port_context(node, ports);
        self.nodes[node.0].algorithm = Some(algorithm);

        if let Err(err) = &result {
            error!(
                "'{}' failed during {:?}: {}",
                self.nodes[node.0].label, request.kind, err
            );
        }
        result
    }

    fn take_port_context(&mut self, node: NodeId) -> PortContext {
        let mut inputs = Vec::with_capacity(self.nodes[node.0].num_input_ports);
        for port in 0..self.nodes[node.0].num_input_ports {
            let states = self
                .input_connections(node, port)
                .into_iter()
                .map(|(upstream, upstream_port)| {
                    let out = &self.nodes[upstream.0].outputs[upstream_port];
                    PortState {
                        info: out.info.clone(),
                        data: out.data.clone(),
                    }
                })
                .collect();
            inputs.push(states);
        }
        let outputs = self.nodes[node.0]
            .outputs
            .iter_mut()
            .map(|out| PortState {
                info: mem::take(&mut out.info),
                data: out.data.take(),
            })
            .collect();
        PortContext { inputs, outputs }
    }

    fn restore_port_context(&mut self, node: NodeId, ports: PortContext) {
        // Requests the algorithm wrote onto its inputs go back to the
        // producing ports. Input data is never replaced by a consumer.
        for (port, states) in ports.inputs.into_iter().enumerate() {
            let connections = self.input_connections(node, port);
            for ((upstream, upstream_port), state) in connections.into_iter().zip(states) {
                self.nodes[upstream.0].outputs[upstream_port].info = state.info;
            }
        }
        for (out, state) in self.nodes[node.0].outputs.iter_mut().zip(ports.outputs) {
            out.info = state.info;
            out.data = state.data;
        }
    }

    /// Seed the information bags an algorithm is about to see with the
    /// protocol's defaults for this request kind.
    fn copy_default_information(
        &mut self,
        node: NodeId,
        request: &Request,
    ) -> Result<(), PipelineError> {
        match request.kind {
            RequestKind::Information => self.copy_defaults_downstream(node, request),
            RequestKind::UpdateExtent => self.copy_defaults_update_extent(node, request),
            RequestKind::UpdateTime | RequestKind::TimeDependentInformation => {
                self.copy_defaults_update_time(node, request)
            }
            RequestKind::DataObject | RequestKind::Data => Ok(()),
        }
    }

    /// Metadata flows from the first input to every output unless the
    /// algorithm overrides it.
    fn copy_defaults_downstream(
        &mut self,
        node: NodeId,
        request: &Request,
    ) -> Result<(), PipelineError> {
        let Some((upstream, upstream_port)) = self.first_input(node) else {
            return Ok(());
        };
        let from = self.nodes[upstream.0].outputs[upstream_port].info.clone();
        for out in &mut self.nodes[node.0].outputs {
            out.info.copy_entry(&from, keys::whole_extent().id());
            out.info.copy_entry(&from, keys::time_steps().id());
            out.info.copy_entry(&from, keys::time_range().id());
            out.info
                .copy_entry(&from, keys::time_dependent_information().id());
            for id in from.keys() {
                if let Some(behavior) = key::behavior(id) {
                    behavior.copy_default_information(request, &from, &mut out.info);
                }
            }
        }
        Ok(())
    }

    /// Default upstream extent request: whatever was asked of this node is
    /// asked of its inputs, on top of whole-extent defaults.
    fn copy_defaults_update_extent(
        &mut self,
        node: NodeId,
        request: &Request,
    ) -> Result<(), PipelineError> {
        if self.nodes[node.0].outputs.is_empty() {
            return Ok(());
        }
        let port = request.from_output_port.unwrap_or(0);
        let from = self.nodes[node.0].outputs[port].info.clone();

        let copied = [
            keys::update_piece_number().id(),
            keys::update_number_of_pieces().id(),
            keys::update_number_of_ghost_levels().id(),
            keys::update_extent().id(),
            keys::update_extent_initialized().id(),
            keys::update_time_step().id(),
        ];

        for input_port in 0..self.nodes[node.0].num_input_ports {
            for (upstream, upstream_port) in self.input_connections(node, input_port) {
                if self.nodes[upstream.0].outputs[upstream_port].data.is_none() {
                    return Err(PipelineError::execution(format!(
                        "input port {} of '{}' has no data object; was the information pass run?",
                        input_port, self.nodes[node.0].label
                    )));
                }
                let in_info = &mut self.nodes[upstream.0].outputs[upstream_port].info;
                in_info.set(keys::update_piece_number(), 0);
                in_info.set(keys::update_number_of_pieces(), 1);
                in_info.set(keys::update_number_of_ghost_levels(), 0);
                if let Some(whole) = in_info.get(keys::whole_extent()) {
                    in_info.set(keys::update_extent(), whole);
                }
                for id in copied {
                    if from.has_id(id) {
                        in_info.copy_entry(&from, id);
                    }
                }
                in_info.remove(keys::exact_extent());
                for id in from.keys() {
                    if let Some(behavior) = key::behavior(id) {
                        behavior.copy_default_information(request, &from, in_info);
                    }
                }
            }
        }
        Ok(())
    }

    fn copy_defaults_update_time(
        &mut self,
        node: NodeId,
        request: &Request,
    ) -> Result<(), PipelineError> {
        if self.nodes[node.0].outputs.is_empty() {
            return Ok(());
        }
        let port = request.from_output_port.unwrap_or(0);
        let from = self.nodes[node.0].outputs[port].info.clone();
        for input_port in 0..self.nodes[node.0].num_input_ports {
            for (upstream, upstream_port) in self.input_connections(node, input_port) {
                let in_info = &mut self.nodes[upstream.0].outputs[upstream_port].info;
                in_info.copy_entry(&from, keys::update_time_step().id());
                for id in from.keys() {
                    if let Some(behavior) = key::behavior(id) {
                        behavior.copy_default_information(request, &from, in_info);
                    }
                }
            }
        }
        Ok(())
    }

    /// Strip all scheduling state from a port whose data object was
    /// replaced, so nothing stale survives into the next cycle.
    pub(crate) fn reset_pipeline_information(info: &mut Information) {
        info.remove(keys::whole_extent());
        info.remove(keys::update_extent());
        info.remove(keys::update_extent_initialized());
        info.remove(keys::combined_update_extent());
        info.remove(keys::unrestricted_update_extent());
        info.remove(keys::exact_extent());
        info.remove(keys::update_piece_number());
        info.remove(keys::update_number_of_pieces());
        info.remove(keys::update_number_of_ghost_levels());
        info.remove(keys::time_steps());
        info.remove(keys::time_range());
        info.remove(keys::update_time_step());
        info.remove(keys::previous_update_time_step());
        info.remove(keys::time_dependent_information());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;

    struct Passthrough {
        inputs: usize,
    }

    impl Algorithm for Passthrough {
        fn num_input_ports(&self) -> usize {
            self.inputs
        }
        fn num_output_ports(&self) -> usize {
            1
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn test_connect_validates_ports() {
        let mut pipeline = Pipeline::new();
        let a = pipeline.add_algorithm("a", Box::new(Passthrough { inputs: 0 }));
        let b = pipeline.add_algorithm("b", Box::new(Passthrough { inputs: 1 }));
        assert!(pipeline.connect(a, 1, b, 0).is_err());
        assert!(pipeline.connect(a, 0, b, 1).is_err());
        assert!(pipeline.connect(a, 0, a, 0).is_err());
        assert!(pipeline.connect(a, 0, b, 0).is_ok());
        assert!(pipeline.connect(a, 0, b, 0).is_err());
    }

    #[test]
    fn test_pipeline_mtime_is_max_over_upstream() {
        let mut pipeline = Pipeline::new();
        let a = pipeline.add_algorithm("a", Box::new(Passthrough { inputs: 0 }));
        let b = pipeline.add_algorithm("b", Box::new(Passthrough { inputs: 1 }));
        pipeline.connect(a, 0, b, 0).unwrap();
        let first = pipeline.update_pipeline_mtime(b).unwrap();
        pipeline.modified(a);
        let second = pipeline.update_pipeline_mtime(b).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_unconnected_required_input_fails_forwarding() {
        let mut pipeline = Pipeline::new();
        let b = pipeline.add_algorithm("b", Box::new(Passthrough { inputs: 1 }));
        let mut request = crate::request::Request::information(Some(0));
        let err = pipeline.forward_upstream(b, &mut request).unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }
}
