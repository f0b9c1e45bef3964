//! The streaming passes: metadata, time, extent and data.

use std::mem;
use std::rc::Rc;

use log::{debug, trace};

use super::{NodeId, Pipeline};
use crate::data::{data_keys, ExtentType};
use crate::error::PipelineError;
use crate::information::key;
use crate::information::{keys, Information};
use crate::request::{Request, RequestKind};
use crate::splitter::{ExtentSplitter, SplitMode};
use crate::extent::Extent;

impl Pipeline {
    /// Bring output port 0 of `node` up to date.
    pub fn update(&mut self, node: NodeId) -> Result<(), PipelineError> {
        self.update_port(node, 0)
    }

    /// Bring one output port of `node` up to date: refresh metadata, run
    /// the upstream passes and execute stale algorithms, repeating while
    /// the node requests continuation.
    pub fn update_port(&mut self, node: NodeId, port: usize) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        self.update_information(node)?;
        self.update_loop(node, port)
    }

    /// Like [`update_port`](Self::update_port), with extra request keys
    /// merged into the port information after the metadata pass.
    pub fn update_with_requests(
        &mut self,
        node: NodeId,
        port: usize,
        requests: &Information,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        self.update_information(node)?;
        self.port_info_mut(node, port).append(requests);
        self.update_loop(node, port)
    }

    /// Update port 0 with the update extent forced to the whole extent.
    pub fn update_whole_extent(&mut self, node: NodeId) -> Result<(), PipelineError> {
        self.check_output_port(node, 0)?;
        self.update_information(node)?;
        self.set_update_extent_to_whole_extent(node, 0)?;
        self.update_loop(node, 0)
    }

    fn update_loop(&mut self, node: NodeId, port: usize) -> Result<(), PipelineError> {
        self.propagate_update_time(node, port)?;
        self.update_time_dependent_information(node, port)?;
        self.propagate_update_extent(node, port)?;
        let short_circuited = mem::replace(&mut self.nodes[node.0].short_circuited, false);
        if short_circuited {
            debug!("'{}' port {} is already up to date", self.label(node), port);
            return Ok(());
        }
        self.update_data(node, port)
    }

    /// Refresh pipeline modification times, output data objects and
    /// metadata for `node` and everything upstream.
    pub fn update_information(&mut self, node: NodeId) -> Result<(), PipelineError> {
        self.entry_checked(node)?;
        self.update_pipeline_mtime(node)?;
        let mut request = Request::data_object(None);
        self.process_request(node, &mut request)?;
        let mut request = Request::information(None);
        self.process_request(node, &mut request)
    }

    /// Send the requested time upstream, if one has been set on the port.
    pub fn propagate_update_time(&mut self, node: NodeId, port: usize) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        if !self.nodes[node.0].outputs[port].info.has(keys::update_time_step()) {
            return Ok(());
        }
        let mut request = Request::update_time(Some(port));
        self.process_request(node, &mut request)
    }

    /// Refresh metadata that depends on the requested time, when the
    /// producer declared it time dependent.
    pub fn update_time_dependent_information(
        &mut self,
        node: NodeId,
        port: usize,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = &self.nodes[node.0].outputs[port].info;
        if info.get(keys::time_dependent_information()).unwrap_or(0) == 0 {
            return Ok(());
        }
        let mut request = Request::time_dependent_information(Some(port));
        self.process_request(node, &mut request)
    }

    /// Send the requested extent/piece upstream. Leaves the node's
    /// short-circuit flag set when nothing needs to execute.
    pub fn propagate_update_extent(
        &mut self,
        node: NodeId,
        port: usize,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let mut request = Request::update_extent(Some(port));
        self.process_request(node, &mut request)
    }

    /// Execute stale algorithms, upstream first.
    pub fn update_data(&mut self, node: NodeId, port: usize) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let mut request = Request::data(Some(port));
        self.process_request(node, &mut request)
    }

    pub(crate) fn process_request(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        match request.kind {
            RequestKind::DataObject => self.handle_data_object(node, request),
            RequestKind::Information => self.handle_information(node, request),
            RequestKind::UpdateTime => self.handle_update_time(node, request),
            RequestKind::TimeDependentInformation => {
                self.handle_time_dependent_information(node, request)
            }
            RequestKind::UpdateExtent => self.handle_update_extent(node, request),
            RequestKind::Data => self.handle_data(node, request),
        }
    }

    fn handle_data_object(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        let entry = &self.nodes[node.0];
        if entry.pipeline_mtime <= entry.data_object_time {
            return Ok(());
        }
        self.forward_upstream(node, request)?;

        let before: Vec<_> = self.nodes[node.0]
            .outputs
            .iter()
            .map(|out| out.data.clone())
            .collect();
        self.call_algorithm(node, request)?;
        for (port, previous) in before.into_iter().enumerate() {
            // Creating the first data object is not a replacement;
            // request keys set before the first update stay in force.
            let replaced = match (&previous, &self.nodes[node.0].outputs[port].data) {
                (Some(a), Some(b)) => !Rc::ptr_eq(a, b),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if replaced {
                trace!("'{}' replaced its data object on port {}", self.label(node), port);
                Pipeline::reset_pipeline_information(&mut self.nodes[node.0].outputs[port].info);
            }
        }
        self.nodes[node.0].data_object_time = self.tick();
        Ok(())
    }

    fn handle_information(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        let entry = &self.nodes[node.0];
        if entry.pipeline_mtime <= entry.information_time {
            return Ok(());
        }
        self.forward_upstream(node, request)?;
        self.call_algorithm(node, request)?;

        for port in 0..self.nodes[node.0].outputs.len() {
            let Some(data) = self.nodes[node.0].outputs[port].data.clone() else {
                return Err(PipelineError::execution(format!(
                    "'{}' produced no data object on output port {}",
                    self.label(node),
                    port
                )));
            };
            let borrowed = data.borrow();
            let extent_type = borrowed.extent_type();
            let data_extent = borrowed
                .information()
                .get(data_keys::data_extent())
                .unwrap_or(Extent::EMPTY);
            drop(borrowed);

            let info = &mut self.nodes[node.0].outputs[port].info;
            if extent_type == ExtentType::ThreeD && !info.has(keys::whole_extent()) {
                info.set(keys::whole_extent(), data_extent);
            }
            // Default request: everything, in one piece.
            if !info.has(keys::update_piece_number()) {
                info.set(keys::update_piece_number(), 0);
            }
            if !info.has(keys::update_number_of_pieces()) {
                info.set(keys::update_number_of_pieces(), 1);
            }
            if !info.has(keys::update_number_of_ghost_levels()) {
                info.set(keys::update_number_of_ghost_levels(), 0);
            }
            if !info.has(keys::update_extent()) {
                if let Some(whole) = info.get(keys::whole_extent()) {
                    info.set(keys::update_extent(), whole);
                }
            }
        }
        self.nodes[node.0].information_time = self.tick();
        Ok(())
    }

    fn handle_update_time(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        if !self.need_to_execute_data(node, request.from_output_port) {
            return Ok(());
        }
        self.call_algorithm(node, request)?;
        self.forward_upstream(node, request)
    }

    fn handle_time_dependent_information(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        if !self.need_to_execute_data(node, request.from_output_port) {
            return Ok(());
        }
        self.forward_upstream(node, request)?;
        self.call_algorithm(node, request)
    }

    fn handle_update_extent(
        &mut self,
        node: NodeId,
        request: &mut Request,
    ) -> Result<(), PipelineError> {
        self.nodes[node.0].short_circuited = true;
        self.verify_output_information(node, request.from_output_port)?;

        // Fold the incoming request into the running union for this
        // cycle; every consumer's forward lands here in turn, so a port
        // with several consumers ends up asked for all of them at once.
        if let Some(port) = request.from_output_port {
            if port < self.nodes[node.0].outputs.len() {
                let info = &mut self.nodes[node.0].outputs[port].info;
                if info.get(keys::update_extent_initialized())
                    != Some(keys::UPDATE_EXTENT_REPLACE)
                {
                    if let Some(update) = info.get(keys::update_extent()) {
                        let combined = info
                            .get(keys::combined_update_extent())
                            .unwrap_or(Extent::EMPTY);
                        if combined.is_empty() {
                            info.set(keys::combined_update_extent(), update);
                        } else if update.is_empty() {
                            info.set(keys::update_extent(), combined);
                        } else {
                            let merged = combined.union(&update);
                            info.set(keys::combined_update_extent(), merged);
                            info.set(keys::update_extent(), merged);
                        }
                    }
                }
            }
        }

        if !self.need_to_execute_data(node, request.from_output_port) {
            trace!(
                "'{}' does not need to execute; stopping extent propagation",
                self.label(node)
            );
            self.finish_data_pass(node, request.from_output_port);
            return Ok(());
        }
        self.nodes[node.0].short_circuited = false;

        self.call_algorithm(node, request)?;
        self.forward_upstream(node, request)
    }

    fn handle_data(&mut self, node: NodeId, request: &mut Request) -> Result<(), PipelineError> {
        if self.need_to_execute_data(node, request.from_output_port) {
            self.forward_upstream(node, request)?;

            // Run the algorithm to completion here, repeating while it
            // asks for another pass, so consumers only ever see data
            // from a finished streaming sequence.
            loop {
                debug!("executing '{}'", self.label(node));
                self.execute_data_start(node);
                request.continue_executing = false;
                let result = self.call_algorithm(node, request);
                self.nodes[node.0].continue_executing =
                    request.continue_executing && result.is_ok();
                result?;
                self.execute_data_end(node, request)?;
                if !self.nodes[node.0].continue_executing {
                    break;
                }
                trace!("'{}' requested another execution", self.label(node));
            }
        }
        self.finish_data_pass(node, request.from_output_port);
        Ok(())
    }

    /// End-of-pass cleanup that runs whether or not the node executed:
    /// crop to the exact extent when asked, and reset the extent
    /// accumulation for the next cycle.
    fn finish_data_pass(&mut self, node: NodeId, port: Option<usize>) {
        for p in self.ports_for(node, port) {
            if self.nodes[node.0].outputs[p]
                .info
                .get(keys::exact_extent())
                .unwrap_or(0)
                != 0
            {
                let update = self.nodes[node.0].outputs[p].info.get(keys::update_extent());
                if let (Some(data), Some(update)) =
                    (self.nodes[node.0].outputs[p].data.clone(), update)
                {
                    data.borrow_mut().crop(&update);
                }
            }
            let info = &mut self.nodes[node.0].outputs[p].info;
            if info.has(keys::combined_update_extent()) {
                info.set(keys::combined_update_extent(), Extent::EMPTY);
            }
        }
    }

    fn ports_for(&self, node: NodeId, port: Option<usize>) -> std::ops::Range<usize> {
        match port {
            Some(p) => p..p + 1,
            None => 0..self.nodes[node.0].outputs.len(),
        }
    }

    /// Decide whether the node's outputs are stale for the current request.
    pub(crate) fn need_to_execute_data(&self, node: NodeId, port: Option<usize>) -> bool {
        let entry = &self.nodes[node.0];
        if entry.continue_executing {
            return true;
        }

        // What the first input's data object recorded, for the piece
        // consistency check on filters.
        let input_pieces = self.first_input(node).and_then(|(upstream, upstream_port)| {
            let data = self.nodes[upstream.0].outputs[upstream_port].data.as_ref()?;
            let data = data.borrow();
            let info = data.information();
            Some((
                info.get(data_keys::data_piece_number())?,
                info.get(data_keys::data_number_of_pieces())?,
            ))
        });

        for p in self.ports_for(node, port) {
            let out = &entry.outputs[p];
            let piece = out.info.get(keys::update_piece_number()).unwrap_or(0);
            let num_pieces = out.info.get(keys::update_number_of_pieces()).unwrap_or(1);

            // A serial source can only ever produce piece 0. Skip it for
            // the other pieces instead of re-executing.
            if entry.num_input_ports == 0
                && num_pieces > 1
                && piece > 0
                && out.info.get(keys::can_handle_piece_request()).unwrap_or(0) == 0
                && out.info.get(keys::can_produce_sub_extent()).unwrap_or(0) == 0
            {
                continue;
            }

            let Some(data) = &out.data else {
                return true;
            };
            if entry.pipeline_mtime > entry.data_time {
                return true;
            }
            let data = data.borrow();
            let data_info = data.information();

            let ghost = out
                .info
                .get(keys::update_number_of_ghost_levels())
                .unwrap_or(0);

            let recorded = (
                data_info.get(data_keys::data_piece_number()),
                data_info.get(data_keys::data_number_of_pieces()),
            );
            match data.extent_type() {
                ExtentType::Pieces => match recorded {
                    (Some(dp), Some(dn)) => {
                        if dp != piece || dn != num_pieces {
                            return true;
                        }
                    }
                    _ => return true,
                },
                ExtentType::ThreeD => {
                    // Piece bookkeeping only matters if the data was made
                    // through a piece request.
                    if let (Some(dp), Some(dn)) = recorded {
                        if dp != piece || dn != num_pieces {
                            return true;
                        }
                    }
                    let update = out.info.get(keys::update_extent()).unwrap_or(Extent::EMPTY);
                    let produced = data_info
                        .get(data_keys::all_pieces_extent())
                        .or_else(|| data_info.get(data_keys::data_extent()))
                        .unwrap_or(Extent::EMPTY);
                    if !update.is_empty() && !produced.contains(&update) {
                        return true;
                    }
                }
            }
            if num_pieces > 1
                && data_info
                    .get(data_keys::data_number_of_ghost_levels())
                    .unwrap_or(0)
                    < ghost
            {
                return true;
            }

            if let Some((in_piece, in_pieces)) = input_pieces {
                if in_piece != piece || in_pieces != num_pieces {
                    return true;
                }
            }

            if Self::need_to_execute_based_on_time(&out.info, data_info) {
                return true;
            }
            for id in out.info.keys() {
                if let Some(behavior) = key::behavior(id) {
                    if behavior.need_to_execute(&out.info, data_info) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// The data was produced at a different time than is now requested.
    fn need_to_execute_based_on_time(out_info: &Information, data_info: &Information) -> bool {
        // A port without a time range has no time-aware producer upstream.
        if !out_info.has(keys::time_range()) {
            return false;
        }
        let Some(update_time) = out_info.get(keys::update_time_step()) else {
            return false;
        };
        // Repeating the previous request never re-triggers work, even when
        // the producer snapped it to a different available step.
        if out_info.get(keys::previous_update_time_step()) == Some(update_time) {
            return false;
        }
        let target = Self::snap_time(update_time, out_info.get(keys::time_steps()));
        match data_info.get(data_keys::data_time_step()) {
            None => true,
            Some(produced) => produced != target,
        }
    }

    /// Snap a requested time to the nearest discrete step, if any exist.
    fn snap_time(requested: f64, steps: Option<Vec<f64>>) -> f64 {
        let Some(steps) = steps else {
            return requested;
        };
        steps
            .into_iter()
            .min_by(|a, b| {
                (a - requested)
                    .abs()
                    .total_cmp(&(b - requested).abs())
            })
            .unwrap_or(requested)
    }

    /// Check that the request on each port is complete and satisfiable
    /// before any algorithm executes.
    fn verify_output_information(
        &mut self,
        node: NodeId,
        port: Option<usize>,
    ) -> Result<(), PipelineError> {
        for p in self.ports_for(node, port) {
            let label = self.label(node).to_string();
            let out = &self.nodes[node.0].outputs[p];
            let Some(data) = &out.data else {
                return Err(PipelineError::execution(format!(
                    "no data object on output port {} of '{}'",
                    p, label
                )));
            };
            let extent_type = data.borrow().extent_type();
            match extent_type {
                ExtentType::Pieces => {
                    if !out.info.has(keys::update_piece_number())
                        || !out.info.has(keys::update_number_of_pieces())
                    {
                        return Err(PipelineError::information(format!(
                            "no update piece has been requested from output port {} of '{}'",
                            p, label
                        )));
                    }
                    if !out.info.has(keys::update_number_of_ghost_levels()) {
                        self.nodes[node.0].outputs[p]
                            .info
                            .set(keys::update_number_of_ghost_levels(), 0);
                    }
                }
                ExtentType::ThreeD => {
                    let Some(whole) = out.info.get(keys::whole_extent()) else {
                        return Err(PipelineError::information(format!(
                            "no whole extent has been set on output port {} of '{}'",
                            p, label
                        )));
                    };
                    let Some(update) = out.info.get(keys::update_extent()) else {
                        return Err(PipelineError::information(format!(
                            "no update extent has been requested from output port {} of '{}'",
                            p, label
                        )));
                    };
                    if !out.info.has(keys::unrestricted_update_extent())
                        && !update.is_empty()
                        && !whole.contains(&update)
                    {
                        return Err(PipelineError::information(format!(
                            "update extent {} requested from output port {} of '{}' \
                             is outside the whole extent {}",
                            update, p, label, whole
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Prepare outputs for execution: wipe stale contents and translate
    /// piece requests into sub-extents for producers that support it.
    fn execute_data_start(&mut self, node: NodeId) {
        let continuing = self.nodes[node.0].continue_executing;
        for p in 0..self.nodes[node.0].outputs.len() {
            let info = self.nodes[node.0].outputs[p].info.clone();
            let data = self.nodes[node.0].outputs[p].data.clone();
            if let Some(data) = &data {
                if !continuing {
                    data.borrow_mut().initialize();
                }
            }

            let num_pieces = info.get(keys::update_number_of_pieces()).unwrap_or(1);
            if info.get(keys::can_produce_sub_extent()).unwrap_or(0) != 0 && num_pieces > 1 {
                let piece = info.get(keys::update_piece_number()).unwrap_or(0);
                let ghost = info.get(keys::update_number_of_ghost_levels()).unwrap_or(0);
                let whole = info.get(keys::whole_extent()).unwrap_or(Extent::EMPTY);
                let mode = SplitMode::from_i64(info.get(keys::update_split_mode()).unwrap_or(0));
                let requested = info.get(keys::update_extent()).unwrap_or(whole);
                let splitter = ExtentSplitter::new(whole, ghost as i32, mode);
                let sub = splitter.split(piece, num_pieces);
                trace!(
                    "'{}' port {}: piece {} of {} maps to sub-extent {}",
                    self.label(node),
                    p,
                    piece,
                    num_pieces,
                    sub
                );
                self.nodes[node.0].outputs[p].info.set(keys::update_extent(), sub);
                if let Some(data) = &data {
                    data.borrow_mut()
                        .information_mut()
                        .set(data_keys::all_pieces_extent(), requested);
                }
            }
        }
    }

    /// Finish an execution: carve ghosts, restore pre-split requests
    /// and, when the cycle is over, record what was produced.
    fn execute_data_end(&mut self, node: NodeId, request: &Request) -> Result<(), PipelineError> {
        for p in 0..self.nodes[node.0].outputs.len() {
            let info = self.nodes[node.0].outputs[p].info.clone();
            let Some(data) = self.nodes[node.0].outputs[p].data.clone() else {
                continue;
            };
            let num_pieces = info.get(keys::update_number_of_pieces()).unwrap_or(1);
            let ghost = info.get(keys::update_number_of_ghost_levels()).unwrap_or(0);
            let sub_extent_piece =
                info.get(keys::can_produce_sub_extent()).unwrap_or(0) != 0 && num_pieces > 1;

            let mut restore = None;
            {
                let mut data = data.borrow_mut();
                if sub_extent_piece && ghost > 0 {
                    let piece = info.get(keys::update_piece_number()).unwrap_or(0);
                    let whole = info.get(keys::whole_extent()).unwrap_or(Extent::EMPTY);
                    let mode =
                        SplitMode::from_i64(info.get(keys::update_split_mode()).unwrap_or(0));
                    let zero = ExtentSplitter::new(whole, 0, mode).split(piece, num_pieces);
                    data.generate_ghost_array(&zero);
                }
                if let Some(full) = data.information().get(data_keys::all_pieces_extent()) {
                    restore = Some(full);
                }
            }
            if let Some(full) = restore {
                self.nodes[node.0].outputs[p].info.set(keys::update_extent(), full);
            }
        }

        if !request.continue_executing {
            self.mark_outputs_generated(node, request);
            let time = self.tick();
            self.nodes[node.0].data_time = time;
            for p in 0..self.nodes[node.0].outputs.len() {
                self.nodes[node.0].outputs[p]
                    .info
                    .remove(keys::update_extent_initialized());
            }
        }
        Ok(())
    }

    /// Record, on each data object, the request it just satisfied.
    fn mark_outputs_generated(&mut self, node: NodeId, request: &Request) {
        let input_time = self.first_input(node).and_then(|(upstream, upstream_port)| {
            let data = self.nodes[upstream.0].outputs[upstream_port].data.as_ref()?;
            let time = data.borrow().information().get(data_keys::data_time_step());
            time
        });

        for p in 0..self.nodes[node.0].outputs.len() {
            let info = self.nodes[node.0].outputs[p].info.clone();
            let piece = info.get(keys::update_piece_number()).unwrap_or(0);
            let num_pieces = info.get(keys::update_number_of_pieces()).unwrap_or(1);
            let ghost = info.get(keys::update_number_of_ghost_levels()).unwrap_or(0);

            if let Some(data) = self.nodes[node.0].outputs[p].data.clone() {
                let mut data = data.borrow_mut();
                let data_info = data.information_mut();

                // The algorithm may have recorded its own piece layout.
                match data_info.get(data_keys::data_piece_number()) {
                    None | Some(-1) => data_info.set(data_keys::data_piece_number(), piece),
                    Some(_) => {}
                }
                match data_info.get(data_keys::data_number_of_pieces()) {
                    None | Some(-1) => {
                        data_info.set(data_keys::data_number_of_pieces(), num_pieces)
                    }
                    Some(_) => {}
                }
                // Data never claims fewer ghost levels than were produced.
                let existing = data_info
                    .get(data_keys::data_number_of_ghost_levels())
                    .unwrap_or(0);
                data_info.set(data_keys::data_number_of_ghost_levels(), existing.max(ghost));

                if let Some(time) = input_time {
                    data_info.set(data_keys::data_time_step(), time);
                } else if let Some(requested) = info.get(keys::update_time_step()) {
                    let produced = Self::snap_time(requested, info.get(keys::time_steps()));
                    data_info.set(data_keys::data_time_step(), produced);
                }

                for id in info.keys() {
                    if let Some(behavior) = key::behavior(id) {
                        behavior.store_meta_data(request, &info, data_info);
                    }
                }
            }

            let port_info = &mut self.nodes[node.0].outputs[p].info;
            match info.get(keys::update_time_step()) {
                Some(time) => port_info.set(keys::previous_update_time_step(), time),
                None => port_info.remove(keys::previous_update_time_step()),
            }
        }
    }

    fn check_output_port(&self, node: NodeId, port: usize) -> Result<(), PipelineError> {
        let entry = self.entry_checked(node)?;
        if port >= entry.outputs.len() {
            return Err(PipelineError::port(format!(
                "'{}' has no output port {}",
                entry.label, port
            )));
        }
        Ok(())
    }

    fn port_info_mut(&mut self, node: NodeId, port: usize) -> &mut Information {
        &mut self.nodes[node.0].outputs[port].info
    }

    /// The whole extent published on a port, empty if none was set.
    pub fn whole_extent(&self, node: NodeId, port: usize) -> Result<Extent, PipelineError> {
        Ok(self
            .output_information(node, port)?
            .get(keys::whole_extent())
            .unwrap_or(Extent::EMPTY))
    }

    /// Publish a whole extent on a port directly, outside the metadata
    /// pass. Marks the node modified when the value changes.
    pub fn set_whole_extent(
        &mut self,
        node: NodeId,
        port: usize,
        extent: Extent,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = self.port_info_mut(node, port);
        if info.get(keys::whole_extent()) != Some(extent) {
            info.set(keys::whole_extent(), extent);
            self.modified(node);
        }
        Ok(())
    }

    /// The update extent currently requested from a port, empty if none.
    pub fn update_extent(&self, node: NodeId, port: usize) -> Result<Extent, PipelineError> {
        Ok(self
            .output_information(node, port)?
            .get(keys::update_extent())
            .unwrap_or(Extent::EMPTY))
    }

    /// Request a structured extent from a port. Repeated requests within
    /// one cycle accumulate: the propagated extent is their union.
    pub fn set_update_extent(
        &mut self,
        node: NodeId,
        port: usize,
        extent: Extent,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = self.port_info_mut(node, port);
        let mode = info.get(keys::update_extent_initialized());
        let combined = if mode == Some(keys::UPDATE_EXTENT_COMBINE) {
            info.get(keys::combined_update_extent())
                .unwrap_or(Extent::EMPTY)
                .union(&extent)
        } else {
            extent
        };
        info.set(keys::combined_update_extent(), combined);
        info.set(keys::update_extent(), extent);
        if mode != Some(keys::UPDATE_EXTENT_REPLACE) {
            info.set(keys::update_extent_initialized(), keys::UPDATE_EXTENT_COMBINE);
        }
        Ok(())
    }

    /// Make every later [`set_update_extent`](Self::set_update_extent)
    /// within this cycle replace instead of accumulate.
    pub fn set_update_extent_replace_mode(
        &mut self,
        node: NodeId,
        port: usize,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        self.port_info_mut(node, port)
            .set(keys::update_extent_initialized(), keys::UPDATE_EXTENT_REPLACE);
        Ok(())
    }

    /// Request everything a port can produce.
    pub fn set_update_extent_to_whole_extent(
        &mut self,
        node: NodeId,
        port: usize,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = self.port_info_mut(node, port);
        info.set(keys::update_piece_number(), 0);
        info.set(keys::update_number_of_pieces(), 1);
        info.set(keys::update_number_of_ghost_levels(), 0);
        let whole = info.get(keys::whole_extent());
        if let Some(whole) = whole {
            self.set_update_extent(node, port, whole)?;
        }
        Ok(())
    }

    /// Request one piece of a partitioned result.
    pub fn set_update_piece(
        &mut self,
        node: NodeId,
        port: usize,
        piece: i64,
        num_pieces: i64,
        ghost_levels: i64,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = self.port_info_mut(node, port);
        info.set(keys::update_piece_number(), piece);
        info.set(keys::update_number_of_pieces(), num_pieces);
        info.set(keys::update_number_of_ghost_levels(), ghost_levels);
        Ok(())
    }

    /// Request data at a specific time value.
    pub fn set_update_time_step(
        &mut self,
        node: NodeId,
        port: usize,
        time: f64,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        self.port_info_mut(node, port).set(keys::update_time_step(), time);
        Ok(())
    }

    /// Ask that produced data be cropped to exactly the update extent.
    pub fn set_request_exact_extent(
        &mut self,
        node: NodeId,
        port: usize,
        exact: bool,
    ) -> Result<(), PipelineError> {
        self.check_output_port(node, port)?;
        let info = self.port_info_mut(node, port);
        if exact {
            info.set(keys::exact_extent(), 1);
        } else {
            info.remove(keys::exact_extent());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;

    struct NoPorts;

    impl Algorithm for NoPorts {
        fn num_input_ports(&self) -> usize {
            0
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
    fn test_snap_time_picks_nearest_step() {
        assert_eq!(Pipeline::snap_time(0.6, Some(vec![0.0, 0.5, 1.0])), 0.5);
        assert_eq!(Pipeline::snap_time(0.9, Some(vec![0.0, 0.5, 1.0])), 1.0);
        assert_eq!(Pipeline::snap_time(0.3, None), 0.3);
        assert_eq!(Pipeline::snap_time(0.3, Some(vec![])), 0.3);
    }

    #[test]
    fn test_set_update_extent_accumulates_within_a_cycle() {
        let mut pipeline = Pipeline::new();
        let node = pipeline.add_algorithm("source", Box::new(NoPorts));
        pipeline
            .set_update_extent(node, 0, Extent::new(0, 4, 0, 9, 0, 0))
            .unwrap();
        pipeline
            .set_update_extent(node, 0, Extent::new(5, 9, 0, 3, 0, 0))
            .unwrap();
        let info = pipeline.output_information(node, 0).unwrap();
        assert_eq!(
            info.get(keys::combined_update_extent()),
            Some(Extent::new(0, 9, 0, 9, 0, 0))
        );
        // The last explicit request is kept verbatim on the port.
        assert_eq!(
            info.get(keys::update_extent()),
            Some(Extent::new(5, 9, 0, 3, 0, 0))
        );
    }

    #[test]
    fn test_replace_mode_drops_earlier_requests() {
        let mut pipeline = Pipeline::new();
        let node = pipeline.add_algorithm("source", Box::new(NoPorts));
        pipeline
            .set_update_extent(node, 0, Extent::new(0, 4, 0, 9, 0, 0))
            .unwrap();
        pipeline.set_update_extent_replace_mode(node, 0).unwrap();
        pipeline
            .set_update_extent(node, 0, Extent::new(5, 9, 0, 3, 0, 0))
            .unwrap();
        let info = pipeline.output_information(node, 0).unwrap();
        assert_eq!(
            info.get(keys::combined_update_extent()),
            Some(Extent::new(5, 9, 0, 3, 0, 0))
        );
    }
}
