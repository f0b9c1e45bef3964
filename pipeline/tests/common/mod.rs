//! Test algorithms with externally observable execution counts.

use std::cell::Cell;
use std::rc::Rc;

use pipeline::algorithm::{Algorithm, PortContext};
use pipeline::data::{data_ref, ImageData, PointSet};
use pipeline::error::PipelineError;
use pipeline::extent::Extent;
use pipeline::information::keys;
use pipeline::request::Request;

pub type Counter = Rc<Cell<usize>>;

pub fn counter() -> Counter {
    Rc::new(Cell::new(0))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A structured source filling its update extent with a constant value
/// (plus the requested time, when one is set).
pub struct ImageSource {
    pub whole: Extent,
    pub value: f64,
    pub time_steps: Option<Vec<f64>>,
    pub sub_extent: bool,
    /// Always fill the whole extent, ignoring the requested one.
    pub produce_whole: bool,
    /// Hand out a fresh data object on every metadata refresh.
    pub replace_output: bool,
    pub executions: Counter,
    pub time_requests: Counter,
}

impl ImageSource {
    pub fn new(whole: Extent, executions: Counter) -> Self {
        ImageSource {
            whole,
            value: 1.0,
            time_steps: None,
            sub_extent: false,
            produce_whole: false,
            replace_output: false,
            executions,
            time_requests: counter(),
        }
    }
}

impl Algorithm for ImageSource {
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
        if out.data.is_none() || self.replace_output {
            out.data = Some(data_ref(ImageData::new()));
        }
        Ok(())
    }

    fn request_update_time(
        &mut self,
        _request: &mut Request,
        _ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.time_requests.set(self.time_requests.get() + 1);
        Ok(())
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        let out = ports.output_mut(0)?;
        out.info.set(keys::whole_extent(), self.whole);
        if let Some(steps) = &self.time_steps {
            out.info.set(keys::time_steps(), steps.clone());
            out.info
                .set(keys::time_range(), vec![steps[0], steps[steps.len() - 1]]);
        }
        if self.sub_extent {
            out.info.set(keys::can_produce_sub_extent(), 1);
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let out = ports.output_mut(0)?;
        let extent = if self.produce_whole {
            self.whole
        } else {
            out.info.get(keys::update_extent()).unwrap_or(self.whole)
        };
        let value = self.value + out.info.get(keys::update_time_step()).unwrap_or(0.0);
        let data = out
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("image source has no output data object"))?;
        let mut data = data.borrow_mut();
        let image: &mut ImageData = data
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not image data"))?;
        image.allocate(extent);
        let e = extent.0;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    image.set_scalar(x, y, z, value);
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Adds a constant to every scalar of its input image.
pub struct ShiftFilter {
    pub shift: f64,
    pub executions: Counter,
}

impl Algorithm for ShiftFilter {
    fn num_input_ports(&self) -> usize {
        1
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
            out.data = Some(data_ref(ImageData::new()));
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let input = ports
            .input(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("shift filter has no input data"))?;
        let input = input.borrow();
        let source: &ImageData = input
            .as_any()
            .downcast_ref()
            .ok_or_else(|| PipelineError::execution("input is not image data"))?;

        let output = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("shift filter has no output data object"))?;
        let mut output = output.borrow_mut();
        let image: &mut ImageData = output
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not image data"))?;

        let extent = source.extent();
        image.allocate(extent);
        let e = extent.0;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    let value = source.scalar(x, y, z).unwrap_or(0.0);
                    image.set_scalar(x, y, z, value + self.shift);
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Copies its input unchanged, but runs at its own fixed time instead of
/// the pipeline-requested one.
pub struct TimeFixedFilter {
    pub time_step: f64,
    pub executions: Counter,
}

impl Algorithm for TimeFixedFilter {
    fn num_input_ports(&self) -> usize {
        1
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
            out.data = Some(data_ref(ImageData::new()));
        }
        Ok(())
    }

    fn request_information(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        // This filter is not a time producer: downstream time requests
        // must not make it re-execute.
        let out = ports.output_mut(0)?;
        out.info.remove(keys::time_steps());
        out.info.remove(keys::time_range());
        Ok(())
    }

    fn request_update_time(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        ports
            .input_mut(0)?
            .info
            .set(keys::update_time_step(), self.time_step);
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        // The default copy forwards the consumer's time; override it.
        ports
            .input_mut(0)?
            .info
            .set(keys::update_time_step(), self.time_step);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let input = ports
            .input(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("time filter has no input data"))?;
        let input = input.borrow();
        let source: &ImageData = input
            .as_any()
            .downcast_ref()
            .ok_or_else(|| PipelineError::execution("input is not image data"))?;

        let output = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("time filter has no output data object"))?;
        let mut output = output.borrow_mut();
        let image: &mut ImageData = output
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not image data"))?;

        let extent = source.extent();
        image.allocate(extent);
        let e = extent.0;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    image.set_scalar(x, y, z, source.scalar(x, y, z).unwrap_or(0.0));
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Appends one point per execution and keeps asking for more executions
/// until `total_passes` have run in the current update cycle.
pub struct StreamingPointSource {
    pub total_passes: usize,
    pass: usize,
    pub executions: Counter,
}

impl StreamingPointSource {
    pub fn new(total_passes: usize, executions: Counter) -> Self {
        StreamingPointSource {
            total_passes,
            pass: 0,
            executions,
        }
    }
}

impl Algorithm for StreamingPointSource {
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
        request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let data = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("point source has no output data object"))?;
        let mut data = data.borrow_mut();
        let points: &mut PointSet = data
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not a point set"))?;
        points.push_point([self.pass as f64, 0.0, 0.0]);

        self.pass += 1;
        if self.pass < self.total_passes {
            request.continue_executing = true;
        } else {
            self.pass = 0;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Passes its input image through but always requests a fixed window of
/// it, no matter what was asked downstream.
pub struct WindowFilter {
    pub window: Extent,
    pub executions: Counter,
}

impl Algorithm for WindowFilter {
    fn num_input_ports(&self) -> usize {
        1
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
            out.data = Some(data_ref(ImageData::new()));
        }
        Ok(())
    }

    fn request_update_extent(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        ports
            .input_mut(0)?
            .info
            .set(keys::update_extent(), self.window);
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let input = ports
            .input(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("window filter has no input data"))?;
        let input = input.borrow();
        let source: &ImageData = input
            .as_any()
            .downcast_ref()
            .ok_or_else(|| PipelineError::execution("input is not image data"))?;

        let output = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("window filter has no output data object"))?;
        let mut output = output.borrow_mut();
        let image: &mut ImageData = output
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not image data"))?;

        let extent = source.extent();
        image.allocate(extent);
        let e = extent.0;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    image.set_scalar(x, y, z, source.scalar(x, y, z).unwrap_or(0.0));
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Sums two image inputs over the union of their extents.
pub struct CombineFilter {
    pub executions: Counter,
}

impl Algorithm for CombineFilter {
    fn num_input_ports(&self) -> usize {
        2
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
            out.data = Some(data_ref(ImageData::new()));
        }
        Ok(())
    }

    fn request_data(
        &mut self,
        _request: &mut Request,
        ports: &mut PortContext,
    ) -> Result<(), PipelineError> {
        self.executions.set(self.executions.get() + 1);
        let mut inputs = Vec::new();
        for port in 0..2 {
            inputs.push(
                ports
                    .input(port)?
                    .data
                    .clone()
                    .ok_or_else(|| PipelineError::execution("combine filter has no input data"))?,
            );
        }
        let output = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("combine filter has no output data object"))?;
        let mut output = output.borrow_mut();
        let image: &mut ImageData = output
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not image data"))?;

        let borrowed: Vec<_> = inputs.iter().map(|data| data.borrow()).collect();
        let mut extent = Extent::EMPTY;
        for input in &borrowed {
            let source: &ImageData = input
                .as_any()
                .downcast_ref()
                .ok_or_else(|| PipelineError::execution("input is not image data"))?;
            extent = extent.union(&source.extent());
        }
        image.allocate(extent);
        let e = extent.0;
        for input in &borrowed {
            let source: &ImageData = input
                .as_any()
                .downcast_ref()
                .ok_or_else(|| PipelineError::execution("input is not image data"))?;
            for z in e[4]..=e[5] {
                for y in e[2]..=e[3] {
                    for x in e[0]..=e[1] {
                        if let Some(value) = source.scalar(x, y, z) {
                            let current = image.scalar(x, y, z).unwrap_or(0.0);
                            image.set_scalar(x, y, z, current + value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Copies its input point set downstream unchanged.
pub struct PointRelayFilter {
    pub executions: Counter,
}

impl Algorithm for PointRelayFilter {
    fn num_input_ports(&self) -> usize {
        1
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
        self.executions.set(self.executions.get() + 1);
        let input = ports
            .input(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("relay has no input data"))?;
        let input = input.borrow();
        let source: &PointSet = input
            .as_any()
            .downcast_ref()
            .ok_or_else(|| PipelineError::execution("input is not a point set"))?;

        let output = ports
            .output(0)?
            .data
            .clone()
            .ok_or_else(|| PipelineError::execution("relay has no output data object"))?;
        let mut output = output.borrow_mut();
        let points: &mut PointSet = output
            .as_any_mut()
            .downcast_mut()
            .ok_or_else(|| PipelineError::execution("output is not a point set"))?;
        for point in source.points() {
            points.push_point(*point);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
