//! Per-frame transform history.
//!
//! Each child frame owns one cache holding the transforms to its parent over
//! time. The parent is stored per sample, so a frame may be re-parented while
//! the system runs and lookups at older times still see the old tree.

use std::collections::VecDeque;
use std::time::Duration;

use crate::common::Time;
use crate::geometry::Rigid3;

use super::TfError;

/// One stamped edge `T_parent_child`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSample {
    pub stamp: Time,
    pub parent: String,
    pub transform: Rigid3,
}

#[derive(Debug, Clone)]
pub struct TimeCache {
    /// Sorted by stamp, oldest first.
    samples: VecDeque<TransformSample>,
    cache_duration: Duration,
    is_static: bool,
}

impl TimeCache {
    pub fn new_dynamic(cache_duration: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            cache_duration,
            is_static: false,
        }
    }

    pub fn new_static() -> Self {
        Self {
            samples: VecDeque::with_capacity(1),
            cache_duration: Duration::ZERO,
            is_static: true,
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest_time(&self) -> Option<Time> {
        self.samples.back().map(|s| s.stamp)
    }

    pub fn oldest_time(&self) -> Option<Time> {
        self.samples.front().map(|s| s.stamp)
    }

    pub fn latest(&self) -> Option<&TransformSample> {
        self.samples.back()
    }

    /// Inserts a sample, returning false if it is too old to be kept.
    pub fn insert(&mut self, sample: TransformSample) -> bool {
        if self.is_static {
            self.samples.clear();
            self.samples.push_back(sample);
            return true;
        }

        if let Some(latest) = self.latest_time() {
            if sample.stamp.saturating_add(self.cache_duration) < latest {
                return false;
            }
        }

        let idx = self.samples.partition_point(|s| s.stamp < sample.stamp);
        match self.samples.get_mut(idx) {
            Some(existing) if existing.stamp == sample.stamp => *existing = sample,
            _ => self.samples.insert(idx, sample),
        }

        self.prune();
        true
    }

    fn prune(&mut self) {
        let Some(latest) = self.latest_time() else {
            return;
        };
        while let Some(front) = self.samples.front() {
            if front.stamp.saturating_add(self.cache_duration) < latest {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns the transform valid at `time`, interpolating when it falls
    /// between two samples. `Time::ZERO` selects the newest sample.
    ///
    /// `frame` is the child frame this cache belongs to, used for errors.
    pub fn sample_at(&self, time: Time, frame: &str) -> Result<TransformSample, TfError> {
        let (Some(oldest), Some(latest)) = (self.samples.front(), self.samples.back()) else {
            return Err(TfError::UnknownFrame(frame.to_string()));
        };

        if self.is_static {
            return Ok(TransformSample {
                stamp: time,
                ..latest.clone()
            });
        }

        if time.is_zero() || time == latest.stamp {
            return Ok(latest.clone());
        }

        if time < oldest.stamp || time > latest.stamp {
            return Err(TfError::Extrapolation {
                frame: frame.to_string(),
                requested: time,
                earliest: oldest.stamp,
                latest: latest.stamp,
            });
        }

        // oldest < time < latest, so both neighbours exist.
        let idx = self.samples.partition_point(|s| s.stamp < time);
        let after = &self.samples[idx];
        if after.stamp == time {
            return Ok(after.clone());
        }
        let before = &self.samples[idx - 1];

        // Interpolating across a re-parenting makes no sense.
        if before.parent != after.parent {
            return Ok(before.clone());
        }

        let span = after.stamp.duration_since(before.stamp).as_secs_f64();
        let factor = time.duration_since(before.stamp).as_secs_f64() / span;
        Ok(TransformSample {
            stamp: time,
            parent: before.parent.clone(),
            transform: Rigid3::interpolate(&before.transform, &after.transform, factor),
        })
    }

    pub fn parent_at(&self, time: Time, frame: &str) -> Result<String, TfError> {
        self.sample_at(time, frame).map(|s| s.parent)
    }
}
