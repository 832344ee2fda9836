use crate::{FilterError, TensorData, TensorsInfo};

/// A filter node in the tensor pipeline.
///
/// The host interrogates the filter for its frame layout once, allocates
/// buffers, and then calls [Filter::invoke] for every frame that passes
/// through the node. Implementations that keep state across frames (a
/// generation context, a decoder window) own that state themselves.
pub trait Filter: Send {
    /// The layout of the input frame this filter consumes.
    fn input_info(&self) -> TensorsInfo;

    /// The layout of the output frame this filter produces.
    fn output_info(&self) -> TensorsInfo;

    /// Offer an externally imposed input layout, returning the output layout
    /// that would result. Filters with fixed frames return
    /// [FilterError::FixedDimensions].
    fn set_input_info(&mut self, info: &TensorsInfo) -> Result<TensorsInfo, FilterError> {
        let _ = info;
        Err(FilterError::FixedDimensions)
    }

    /// Whether the host should allocate output buffers before calling
    /// [Filter::invoke].
    fn allocate_before_invoke(&self) -> bool {
        true
    }

    /// Process one frame. `output` is pre-allocated to the negotiated layout
    /// when [Filter::allocate_before_invoke] is true.
    fn invoke(
        &mut self,
        input: &[TensorData],
        output: &mut [TensorData],
    ) -> Result<(), FilterError>;
}
