//! Raw 8-bit volumetric chunk payloads.
//!
//! A chunk of a volumetric dataset is a dense brick of voxels stored as raw
//! bytes, one byte per voxel, x varying fastest. `RawVolumeDecoder` checks
//! the byte count against the expected brick dimensions.

use crate::cache::ByteSize;
use crate::fetch::{DecodeError, Decoder};

/// Default brick edge length used by volumetric chunk servers.
pub const DEFAULT_BRICK_EDGE: usize = 64;

/// Decoded voxel brick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    dims: [usize; 3],
    data: Vec<u8>,
}

impl Volume {
    /// Wrap raw voxels. Fails if `data.len()` is not `dims[0] * dims[1] * dims[2]`.
    pub fn new(dims: [usize; 3], data: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = voxel_count(dims);
        if data.len() != expected {
            return Err(DecodeError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Voxel at (x, y, z), or `None` outside the brick.
    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        let [w, h, d] = self.dims;
        if x >= w || y >= h || z >= d {
            return None;
        }
        self.data.get(x + w * (y + h * z)).copied()
    }
}

impl ByteSize for Volume {
    fn byte_size(&self) -> u64 {
        self.data.len() as u64
    }
}

fn voxel_count(dims: [usize; 3]) -> usize {
    dims.iter().product()
}

/// Decodes fetched bytes into a `Volume` of fixed dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawVolumeDecoder {
    dims: [usize; 3],
}

impl RawVolumeDecoder {
    pub fn new(dims: [usize; 3]) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }
}

impl Default for RawVolumeDecoder {
    fn default() -> Self {
        Self::new([DEFAULT_BRICK_EDGE; 3])
    }
}

impl Decoder for RawVolumeDecoder {
    type Payload = Volume;

    fn decode(&self, key: &str, bytes: Vec<u8>) -> Result<Volume, DecodeError> {
        Volume::new(self.dims, bytes).inspect_err(|e| {
            tracing::debug!(key, error = %e, "chunk does not match brick dimensions");
        })
    }
}
