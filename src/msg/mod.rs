//! Transform message types exchanged with the buffer.
//!
//! These mirror the shape of the usual `geometry_msgs/TransformStamped` and
//! `tf2_msgs/TFMessage` pairs: a header naming the parent frame and stamp, the
//! child frame id, and the transform mapping child coordinates into the parent.

mod conversion;

use nalgebra::{UnitQuaternion, Vector3};

use crate::common::Stamp;

pub use conversion::{to_rigid3, to_transform_stamped};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub stamp: Stamp,
    /// Parent frame of the transform.
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: Transform,
}

/// A batch of transforms delivered together, as published on `/tf`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}

impl From<Vec<TransformStamped>> for TfMessage {
    fn from(transforms: Vec<TransformStamped>) -> Self {
        Self { transforms }
    }
}
