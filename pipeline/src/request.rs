//! Requests traversing the algorithm graph.
//!
//! A request is a small value type, not an information bag: exactly one
//! request kind, the output port it originated from, and the forwarding
//! protocol flags. Request-scoped state therefore never leaks into the
//! per-port information bags between passes.

/// The six request kinds the executive understands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestKind {
    /// Create output data objects.
    DataObject,
    /// Produce/refresh output metadata (whole extent, time steps).
    Information,
    /// Propagate the requested time step upstream.
    UpdateTime,
    /// Refresh metadata that depends on the requested time.
    TimeDependentInformation,
    /// Propagate the requested extent/piece upstream.
    UpdateExtent,
    /// Execute algorithms and produce data.
    Data,
}

/// The direction a request is forwarded through the graph.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Upstream,
    Downstream,
}

/// A request in flight. Created per pass by the executive, mutated in
/// place as it traverses the graph (the originating port field is saved
/// and restored around each upstream hop).
#[derive(Clone, Copy, Debug)]
pub struct Request {
    pub kind: RequestKind,
    /// The output port the request was made from, if any.
    pub from_output_port: Option<usize>,
    pub direction: Direction,
    /// Invoke the algorithm before forwarding upstream.
    pub algorithm_before_forward: bool,
    /// Invoke the algorithm after forwarding upstream.
    pub algorithm_after_forward: bool,
    /// Set by an algorithm during the data pass to signal that more
    /// internal executions are needed for the same update cycle.
    pub continue_executing: bool,
}

impl Request {
    fn new(kind: RequestKind, port: Option<usize>, before: bool, after: bool) -> Self {
        Request {
            kind,
            from_output_port: port,
            direction: Direction::Upstream,
            algorithm_before_forward: before,
            algorithm_after_forward: after,
            continue_executing: false,
        }
    }

    /// Data-object creation: inputs are created before the node itself.
    pub fn data_object(port: Option<usize>) -> Self {
        Request::new(RequestKind::DataObject, port, false, true)
    }

    /// Metadata pass: inputs report before the node itself.
    pub fn information(port: Option<usize>) -> Self {
        Request::new(RequestKind::Information, port, false, true)
    }

    /// Time propagation: the node processes before its inputs.
    pub fn update_time(port: Option<usize>) -> Self {
        Request::new(RequestKind::UpdateTime, port, true, false)
    }

    /// Time-dependent metadata must be known upstream first.
    pub fn time_dependent_information(port: Option<usize>) -> Self {
        Request::new(RequestKind::TimeDependentInformation, port, false, true)
    }

    /// Extent propagation: the node processes before its inputs.
    pub fn update_extent(port: Option<usize>) -> Self {
        Request::new(RequestKind::UpdateExtent, port, true, false)
    }

    /// Data pass: inputs execute before the node itself.
    pub fn data(port: Option<usize>) -> Self {
        Request::new(RequestKind::Data, port, false, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_protocol_flags() {
        assert!(Request::update_extent(Some(0)).algorithm_before_forward);
        assert!(!Request::update_extent(Some(0)).algorithm_after_forward);
        assert!(Request::data(Some(0)).algorithm_after_forward);
        assert!(Request::time_dependent_information(None).algorithm_after_forward);
        assert!(Request::update_time(None).algorithm_before_forward);
    }
}
