use crate::common::Time;
use crate::geometry::Rigid3;

use super::{Header, Transform, TransformStamped};

impl From<Transform> for Rigid3 {
    fn from(t: Transform) -> Self {
        Rigid3::new(t.translation, t.rotation)
    }
}

impl From<Rigid3> for Transform {
    fn from(r: Rigid3) -> Self {
        Self {
            translation: r.translation,
            rotation: r.rotation,
        }
    }
}

/// Drops the header and returns the bare rigid transform `T_parent_child`.
pub fn to_rigid3(msg: &TransformStamped) -> Rigid3 {
    msg.transform.into()
}

pub fn to_transform_stamped(
    transform: Rigid3,
    parent: impl Into<String>,
    child: impl Into<String>,
    time: Time,
) -> TransformStamped {
    TransformStamped {
        header: Header {
            stamp: time.into(),
            frame_id: parent.into(),
        },
        child_frame_id: child.into(),
        transform: transform.into(),
    }
}
