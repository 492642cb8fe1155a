//! Relates sensor frames to the tracking frame.
//!
//! Every incoming sensor message carries its own frame id; before it can be
//! fed to the SLAM front end its pose relative to the tracking frame must be
//! known at the message's timestamp. [`TfBridge`] answers that question from a
//! transform source it does not own, and turns every lookup failure into
//! `None` so that a missing transform only drops the one message.

use std::time::Duration;

use tracing::warn;

use crate::common::{Time, duration_from_secs_saturating};
use crate::config::BridgeOptions;
use crate::geometry::Rigid3;
use crate::msg::to_rigid3;
use crate::tf::{LookupTransform, TfError};

pub struct TfBridge<'a, B: LookupTransform + ?Sized> {
    tracking_frame: String,
    lookup_transform_timeout: Duration,
    buffer: &'a B,
}

impl<'a, B: LookupTransform + ?Sized> TfBridge<'a, B> {
    /// Negative and NaN timeouts are treated as zero. Timeouts too large for
    /// a `Duration`, infinity included, saturate to `Duration::MAX`, which
    /// makes lookups wait until the data arrives.
    pub fn new(
        tracking_frame: impl Into<String>,
        lookup_transform_timeout_sec: f64,
        buffer: &'a B,
    ) -> Self {
        Self {
            tracking_frame: tracking_frame.into(),
            lookup_transform_timeout: duration_from_secs_saturating(lookup_transform_timeout_sec),
            buffer,
        }
    }

    pub fn from_options(options: &BridgeOptions, buffer: &'a B) -> Self {
        Self::new(
            options.tracking_frame.clone(),
            options.lookup_transform_timeout_sec,
            buffer,
        )
    }

    pub fn tracking_frame(&self) -> &str {
        &self.tracking_frame
    }

    pub fn lookup_transform_timeout(&self) -> Duration {
        self.lookup_transform_timeout
    }

    /// Returns `T_tracking_frame` at `time`, or `None` if it cannot be
    /// resolved within the configured timeout.
    pub fn lookup_to_tracking(&self, time: Time, frame_id: &str) -> Option<Rigid3> {
        match self.try_lookup_to_tracking(time, frame_id) {
            Ok(transform) => Some(transform),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn try_lookup_to_tracking(&self, time: Time, frame_id: &str) -> Result<Rigid3, TfError> {
        let mut timeout = self.lookup_transform_timeout;
        let latest_tf_time: Time = self
            .buffer
            .lookup_transform(&self.tracking_frame, frame_id, Time::ZERO, timeout)?
            .header
            .stamp
            .into();
        if latest_tf_time >= time {
            // Newer data is already buffered, so waiting cannot help. Otherwise
            // a request for data that is too old would wait the full timeout.
            timeout = Duration::ZERO;
        }
        let stamped = self
            .buffer
            .lookup_transform(&self.tracking_frame, frame_id, time, timeout)?;
        Ok(to_rigid3(&stamped))
    }
}
