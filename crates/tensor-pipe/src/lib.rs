//! The contract between a streaming tensor pipeline host and its filter plugins.
//!
//! A host drives a filter in three steps: it queries the filter's frame layout
//! ([Filter::input_info] / [Filter::output_info]), allocates buffers accordingly,
//! and then calls [Filter::invoke] once per frame. Filters make themselves known
//! to the host through the process-wide [FilterRegistry].
//!
//! This crate deliberately contains no transport, caps negotiation or buffer
//! pooling; those belong to the host runtime.
#![deny(missing_docs)]

use thiserror::Error;

mod filter;
mod registry;

pub use filter::Filter;
pub use registry::{registry, FilterFactory, FilterRegistry};

/// The maximum rank of a single tensor. Dimensions beyond a tensor's natural
/// rank are fixed to 1.
pub const TENSOR_RANK_LIMIT: usize = 16;

/// The maximum number of tensors in one frame.
pub const TENSOR_COUNT_LIMIT: usize = 16;

/// The element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    /// Unsigned 8-bit integer. Raw byte payloads (text, audio samples) travel as this.
    UInt8,
    /// Signed 32-bit integer.
    Int32,
    /// 32-bit float.
    Float32,
}

impl TensorType {
    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            TensorType::UInt8 => 1,
            TensorType::Int32 => 4,
            TensorType::Float32 => 4,
        }
    }
}

/// The layout of a single tensor: element type plus a fixed-rank dimension list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    /// The element type.
    pub ty: TensorType,
    /// Per-axis extents. Unused trailing axes are 1.
    pub dimensions: [usize; TENSOR_RANK_LIMIT],
}

impl TensorInfo {
    /// Create an info from the leading dimensions; the remaining axes are 1.
    pub fn new(ty: TensorType, leading: &[usize]) -> Self {
        assert!(
            leading.len() <= TENSOR_RANK_LIMIT,
            "a tensor has at most {TENSOR_RANK_LIMIT} dimensions"
        );
        let mut dimensions = [1; TENSOR_RANK_LIMIT];
        dimensions[..leading.len()].copy_from_slice(leading);
        Self { ty, dimensions }
    }

    /// Total number of elements.
    pub fn element_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Total size of the tensor in bytes.
    pub fn byte_size(&self) -> usize {
        self.element_count() * self.ty.element_size()
    }
}

/// The per-frame descriptor: every tensor the filter consumes or produces in
/// one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TensorsInfo {
    tensors: Vec<TensorInfo>,
}

impl TensorsInfo {
    /// Create a descriptor from a list of tensor infos.
    ///
    /// # Panics
    /// Panics if more than [TENSOR_COUNT_LIMIT] tensors are supplied.
    pub fn new(tensors: Vec<TensorInfo>) -> Self {
        assert!(
            tensors.len() <= TENSOR_COUNT_LIMIT,
            "a frame has at most {TENSOR_COUNT_LIMIT} tensors"
        );
        Self { tensors }
    }

    /// The tensors in this frame.
    pub fn tensors(&self) -> &[TensorInfo] {
        &self.tensors
    }

    /// Number of tensors in this frame.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the frame is empty.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// One tensor's worth of frame data, paired with its layout.
#[derive(Debug, Clone)]
pub struct TensorData {
    info: TensorInfo,
    data: Vec<u8>,
}

impl TensorData {
    /// Allocate a zero-filled tensor for the given layout. This is what a host
    /// does for filters that request pre-allocated outputs.
    pub fn new_zeroed(info: TensorInfo) -> Self {
        let len = info.byte_size();
        Self {
            info,
            data: vec![0; len],
        }
    }

    /// Build a tensor from existing bytes.
    pub fn from_bytes(info: TensorInfo, data: Vec<u8>) -> Result<Self, FilterError> {
        if data.len() != info.byte_size() {
            return Err(FilterError::ShapeMismatch {
                expected: info.byte_size(),
                actual: data.len(),
            });
        }
        Ok(Self { info, data })
    }

    /// The layout of this tensor.
    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The raw bytes, mutably.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Errors reported by a filter to its host.
#[derive(Error, Debug)]
pub enum FilterError {
    /// The filter's frame layout is fixed and cannot be renegotiated.
    #[error("this filter does not accept externally imposed dimensions")]
    FixedDimensions,
    /// A buffer handed to the filter does not match the negotiated layout.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    ShapeMismatch {
        /// The byte size the negotiated layout calls for.
        expected: usize,
        /// The byte size actually supplied.
        actual: usize,
    },
    /// The frame carried the wrong number of tensors.
    #[error("tensor count mismatch: expected {expected} tensors, got {actual}")]
    TensorCountMismatch {
        /// The tensor count the negotiated layout calls for.
        expected: usize,
        /// The tensor count actually supplied.
        actual: usize,
    },
    /// The filter failed while processing a frame.
    #[error("filter invocation failed: {0}")]
    Invoke(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// No filter is registered under the requested name.
    #[error("no filter registered under {name:?}")]
    UnknownFilter {
        /// The name that was looked up.
        name: String,
    },
}
