//! Thread-safe, time-indexed frame tree.
//!
//! Every child frame owns a [`TimeCache`] of transforms to its parent. A lookup
//! walks both frames up towards the root until the two chains meet, composing
//! the edges at the requested time.
//!
//! Blocking lookups park on a condition variable that is notified whenever a
//! transform is inserted, so a waiter wakes as soon as the data it needs
//! arrives instead of polling.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::common::Time;
use crate::geometry::Rigid3;
use crate::msg::{TransformStamped, to_transform_stamped};

use super::TfError;
use super::time_cache::{TimeCache, TransformSample};

/// Default history kept per frame.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

/// Walking more parents than this means the tree has a cycle.
const MAX_GRAPH_DEPTH: usize = 1000;

/// Anything that can answer "where is `source_frame` in `target_frame` at
/// `time`", waiting up to `timeout` for the data.
///
/// The returned transform maps points from the source frame into the target
/// frame. `Time::ZERO` asks for the latest available data.
pub trait LookupTransform {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError>;
}

impl<T: LookupTransform + ?Sized> LookupTransform for &T {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError> {
        (**self).lookup_transform(target_frame, source_frame, time, timeout)
    }
}

impl<T: LookupTransform + ?Sized> LookupTransform for Arc<T> {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError> {
        (**self).lookup_transform(target_frame, source_frame, time, timeout)
    }
}

#[derive(Debug)]
pub struct TransformBuffer {
    state: Mutex<BufferState>,
    /// Notified after every successful insert.
    updated: Condvar,
}

#[derive(Debug)]
struct BufferState {
    /// Keyed by child frame id.
    caches: HashMap<String, TimeCache>,
    /// Last publisher seen per child frame.
    authorities: HashMap<String, String>,
    cache_duration: Duration,
}

/// A frame reached while walking towards the root.
struct ChainLink {
    frame: String,
    /// Transform from the walk's starting frame into `frame`.
    to_frame: Rigid3,
    /// Oldest "newest stamp" over the dynamic edges walked so far.
    latest: Option<Time>,
}

impl TransformBuffer {
    pub fn new() -> Self {
        Self::with_cache_duration(DEFAULT_CACHE_DURATION)
    }

    pub fn with_cache_duration(cache_duration: Duration) -> Self {
        Self {
            state: Mutex::new(BufferState {
                caches: HashMap::new(),
                authorities: HashMap::new(),
                cache_duration,
            }),
            updated: Condvar::new(),
        }
    }

    pub fn cache_duration(&self) -> Duration {
        self.state.lock().cache_duration
    }

    /// Inserts `T_parent_child` from `transform` and wakes blocked lookups.
    ///
    /// `authority` names the publisher and is only kept for diagnostics.
    pub fn set_transform(
        &self,
        transform: &TransformStamped,
        authority: &str,
        is_static: bool,
    ) -> Result<(), TfError> {
        let parent = validate_frame_id(&transform.header.frame_id)?;
        let child = validate_frame_id(&transform.child_frame_id)?;

        if parent == child {
            return Err(TfError::InvalidTransform(format!(
                "frame \"{child}\" cannot be its own parent (authority \"{authority}\")"
            )));
        }

        let rigid = Rigid3::from(transform.transform);
        if rigid.has_nan() {
            return Err(TfError::InvalidTransform(format!(
                "transform \"{parent}\" -> \"{child}\" from authority \"{authority}\" contains NaN"
            )));
        }

        let Some(stamp) = transform.header.stamp.checked_time() else {
            return Err(TfError::InvalidTransform(format!(
                "stamp {:?} of transform \"{parent}\" -> \"{child}\" from authority \
                 \"{authority}\" is outside the representable time range",
                transform.header.stamp
            )));
        };
        {
            let mut state = self.state.lock();
            let cache_duration = state.cache_duration;
            let cache = state
                .caches
                .entry(child.to_string())
                .or_insert_with(|| new_cache(is_static, cache_duration));
            if cache.is_static() != is_static {
                debug!(
                    frame = child,
                    is_static, "replacing transform cache after static/dynamic switch"
                );
                *cache = new_cache(is_static, cache_duration);
            }

            let inserted = cache.insert(TransformSample {
                stamp,
                parent: parent.to_string(),
                transform: rigid,
            });
            if !inserted {
                return Err(TfError::InvalidTransform(format!(
                    "ignoring data from the past for frame \"{child}\" at time {stamp} \
                     (authority \"{authority}\")"
                )));
            }
            state
                .authorities
                .insert(child.to_string(), authority.to_string());
        }

        self.updated.notify_all();
        Ok(())
    }

    /// Non-blocking lookup of the transform mapping `source_frame` into
    /// `target_frame` at `time`.
    pub fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
    ) -> Result<TransformStamped, TfError> {
        self.state.lock().lookup(target_frame, source_frame, time)
    }

    /// Like [`lookup_transform`](Self::lookup_transform) but waits up to
    /// `timeout` for the required data to arrive.
    ///
    /// With a zero timeout a single attempt is made and its error returned
    /// as-is; otherwise a failure after waiting is reported as
    /// [`TfError::Timeout`] wrapping the last lookup error. A timeout too
    /// large to form a deadline (such as `Duration::MAX`) waits until the
    /// lookup succeeds.
    pub fn lookup_transform_with_timeout(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            let err = match state.lookup(target_frame, source_frame, time) {
                Ok(transform) => return Ok(transform),
                // Waiting cannot fix a malformed request.
                Err(err @ TfError::InvalidFrameId(_)) => return Err(err),
                Err(err) => err,
            };

            if timeout.is_zero() {
                return Err(err);
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    return Err(TfError::Timeout {
                        target_frame: target_frame.to_string(),
                        source_frame: source_frame.to_string(),
                        timeout,
                        cause: Box::new(err),
                    });
                }
                Some(deadline) => {
                    self.updated.wait_until(&mut state, deadline);
                }
                None => self.updated.wait(&mut state),
            }
        }
    }

    pub fn can_transform(&self, target_frame: &str, source_frame: &str, time: Time) -> bool {
        self.lookup_transform(target_frame, source_frame, time).is_ok()
    }

    /// Newest time at which every dynamic edge between the two frames has data.
    ///
    /// Returns `Time::ZERO` when the path is made only of static transforms.
    pub fn latest_common_time(
        &self,
        target_frame: &str,
        source_frame: &str,
    ) -> Result<Time, TfError> {
        self.state.lock().latest_common_time(target_frame, source_frame)
    }

    pub fn frame_exists(&self, frame_id: &str) -> bool {
        self.state.lock().frame_exists(frame_id)
    }

    /// All known frames, children and roots alike, in sorted order.
    pub fn frames(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut frames = BTreeSet::new();
        for (child, cache) in &state.caches {
            frames.insert(child.clone());
            if let Some(latest) = cache.latest() {
                frames.insert(latest.parent.clone());
            }
        }
        frames.into_iter().collect()
    }

    pub fn authority(&self, frame_id: &str) -> Option<String> {
        self.state.lock().authorities.get(frame_id).cloned()
    }

    /// One line per child frame naming its latest parent.
    pub fn all_frames_as_string(&self) -> String {
        let state = self.state.lock();
        let mut children: Vec<_> = state
            .caches
            .iter()
            .filter_map(|(child, cache)| cache.latest().map(|s| (child, &s.parent)))
            .collect();
        children.sort();
        children
            .into_iter()
            .map(|(child, parent)| format!("Frame {child} exists with parent {parent}.\n"))
            .collect()
    }

    /// Drops all dynamic history. Static transforms are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.caches.retain(|_, cache| cache.is_static());
        let BufferState {
            caches,
            authorities,
            ..
        } = &mut *state;
        authorities.retain(|frame, _| caches.contains_key(frame));
    }
}

impl Default for TransformBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LookupTransform for TransformBuffer {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
        timeout: Duration,
    ) -> Result<TransformStamped, TfError> {
        self.lookup_transform_with_timeout(target_frame, source_frame, time, timeout)
    }
}

impl BufferState {
    fn frame_exists(&self, frame_id: &str) -> bool {
        self.caches.contains_key(frame_id)
            || self
                .caches
                .values()
                .any(|c| c.latest().is_some_and(|s| s.parent == frame_id))
    }

    fn check_frames(&self, target_frame: &str, source_frame: &str) -> Result<(), TfError> {
        for frame in [target_frame, source_frame] {
            validate_frame_id(frame)?;
            if !self.frame_exists(frame) {
                return Err(TfError::UnknownFrame(frame.to_string()));
            }
        }
        Ok(())
    }

    fn lookup(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
    ) -> Result<TransformStamped, TfError> {
        if target_frame == source_frame {
            validate_frame_id(target_frame)?;
            let stamp = if time.is_zero() {
                self.caches
                    .get(target_frame)
                    .and_then(TimeCache::latest_time)
                    .unwrap_or(Time::ZERO)
            } else {
                time
            };
            return Ok(to_transform_stamped(
                Rigid3::identity(),
                target_frame,
                source_frame,
                stamp,
            ));
        }

        self.check_frames(target_frame, source_frame)?;

        let resolved = if time.is_zero() {
            self.latest_common_time(target_frame, source_frame)?
        } else {
            time
        };

        let (target_link, source_link) = self.meet(target_frame, source_frame, resolved)?;
        // T_target_source = T_common_target^-1 * T_common_source
        let transform = target_link.to_frame.inverse() * source_link.to_frame;
        Ok(to_transform_stamped(
            transform,
            target_frame,
            source_frame,
            resolved,
        ))
    }

    fn latest_common_time(&self, target_frame: &str, source_frame: &str) -> Result<Time, TfError> {
        if target_frame == source_frame {
            return Ok(Time::ZERO);
        }
        self.check_frames(target_frame, source_frame)?;

        let (target_link, source_link) = self.meet(target_frame, source_frame, Time::ZERO)?;
        let latest = match (target_link.latest, source_link.latest) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Ok(latest.unwrap_or(Time::ZERO))
    }

    /// Walks both frames towards the root and returns the two links that
    /// reach their first common ancestor: `(target side, source side)`.
    fn meet(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: Time,
    ) -> Result<(ChainLink, ChainLink), TfError> {
        let mut pending_error = None;

        let mut source_chain = vec![ChainLink {
            frame: source_frame.to_string(),
            to_frame: Rigid3::identity(),
            latest: None,
        }];
        loop {
            let tip = &source_chain[source_chain.len() - 1];
            // Target is an ancestor of source: no need to walk further.
            if tip.frame == target_frame {
                break;
            }
            match self.step(tip, time) {
                Ok(Some(next)) => source_chain.push(next),
                Ok(None) => break,
                // A path may still exist below the failing edge.
                Err(err) => {
                    pending_error = Some(err);
                    break;
                }
            }
            if source_chain.len() > MAX_GRAPH_DEPTH {
                return Err(TfError::Loop {
                    frame: source_frame.to_string(),
                });
            }
        }

        let index: HashMap<String, usize> = source_chain
            .iter()
            .enumerate()
            .map(|(i, link)| (link.frame.clone(), i))
            .collect();

        let mut target_link = ChainLink {
            frame: target_frame.to_string(),
            to_frame: Rigid3::identity(),
            latest: None,
        };
        let mut depth = 0;
        loop {
            if let Some(&i) = index.get(&target_link.frame) {
                let source_link = source_chain.swap_remove(i);
                return Ok((target_link, source_link));
            }
            match self.step(&target_link, time) {
                Ok(Some(next)) => target_link = next,
                Ok(None) => break,
                Err(err) => {
                    pending_error = pending_error.or(Some(err));
                    break;
                }
            }
            depth += 1;
            if depth > MAX_GRAPH_DEPTH {
                return Err(TfError::Loop {
                    frame: target_frame.to_string(),
                });
            }
        }

        Err(pending_error.unwrap_or_else(|| TfError::Connectivity {
            target_frame: target_frame.to_string(),
            source_frame: source_frame.to_string(),
        }))
    }

    /// Moves one edge up from `link`, or returns `None` at a root.
    fn step(&self, link: &ChainLink, time: Time) -> Result<Option<ChainLink>, TfError> {
        let Some(cache) = self.caches.get(&link.frame) else {
            return Ok(None);
        };
        let sample = cache.sample_at(time, &link.frame)?;
        let latest = if cache.is_static() {
            link.latest
        } else {
            let edge_latest = cache.latest_time();
            match (link.latest, edge_latest) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            }
        };
        Ok(Some(ChainLink {
            frame: sample.parent,
            to_frame: sample.transform * link.to_frame,
            latest,
        }))
    }
}

fn new_cache(is_static: bool, cache_duration: Duration) -> TimeCache {
    if is_static {
        TimeCache::new_static()
    } else {
        TimeCache::new_dynamic(cache_duration)
    }
}

fn validate_frame_id(frame_id: &str) -> Result<&str, TfError> {
    if frame_id.is_empty() || frame_id.starts_with('/') {
        return Err(TfError::InvalidFrameId(frame_id.to_string()));
    }
    Ok(frame_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Stamp;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::PI;
    use std::thread;

    fn stamped(
        parent: &str,
        child: &str,
        secs: f64,
        translation: Vector3<f64>,
    ) -> TransformStamped {
        to_transform_stamped(
            Rigid3::from_translation(translation),
            parent,
            child,
            Time::from_secs_f64(secs),
        )
    }

    /// Builds the following tree at time `t` (seconds):
    /// * `item` fixed in `world` at (1, 0, 0)
    /// * `base_link` moving through `world` at (0, t, 0)
    /// * `camera` fixed on `base_link` at (0.5, 0, 0)
    fn build_test_tree(buffer: &TransformBuffer, t: f64) {
        let item = stamped("world", "item", t, Vector3::new(1.0, 0.0, 0.0));
        buffer.set_transform(&item, "test", true).unwrap();
        let base_link = stamped("world", "base_link", t, Vector3::new(0.0, t, 0.0));
        buffer.set_transform(&base_link, "test", false).unwrap();
        let camera = stamped("base_link", "camera", t, Vector3::new(0.5, 0.0, 0.0));
        buffer.set_transform(&camera, "test", true).unwrap();
    }

    #[test]
    fn test_basic_lookup() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);

        let res = buffer.lookup_transform("camera", "item", Time::ZERO).unwrap();
        assert_eq!(res.header.frame_id, "camera");
        assert_eq!(res.child_frame_id, "item");
        assert_relative_eq!(
            res.transform.translation,
            Vector3::new(0.5, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_interpolated_lookup() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);
        build_test_tree(&buffer, 1.0);

        let res = buffer
            .lookup_transform("camera", "item", Time::from_nanos(700_000_000))
            .unwrap();
        assert_eq!(Time::from(res.header.stamp), Time::from_nanos(700_000_000));
        assert_relative_eq!(
            res.transform.translation,
            Vector3::new(0.5, -0.7, 0.0),
            epsilon = 1e-9
        );

        // The inverse direction maps item points into the camera frame the other way.
        let inv = buffer
            .lookup_transform("item", "camera", Time::from_nanos(700_000_000))
            .unwrap();
        assert_relative_eq!(
            inv.transform.translation,
            Vector3::new(-0.5, 0.7, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_latest_lookup_uses_newest_dynamic_stamp() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);
        build_test_tree(&buffer, 1.0);

        let res = buffer
            .lookup_transform("world", "camera", Time::ZERO)
            .unwrap();
        assert_eq!(Time::from(res.header.stamp), Time::from_secs_f64(1.0));
        assert_relative_eq!(
            res.transform.translation,
            Vector3::new(0.5, 1.0, 0.0),
            epsilon = 1e-9
        );

        assert_eq!(
            buffer.latest_common_time("world", "camera").unwrap(),
            Time::from_secs_f64(1.0)
        );
    }

    #[test]
    fn test_static_only_path_resolves_to_zero() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 3.0);

        let res = buffer
            .lookup_transform("base_link", "camera", Time::ZERO)
            .unwrap();
        assert_eq!(Time::from(res.header.stamp), Time::ZERO);

        // Static edges answer for any time.
        assert!(buffer.can_transform("base_link", "camera", Time::from_secs_f64(1e6)));
    }

    #[test]
    fn test_extrapolation_error() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);
        build_test_tree(&buffer, 1.0);

        let err = buffer
            .lookup_transform("camera", "item", Time::from_secs_f64(2.0))
            .unwrap_err();
        assert!(matches!(err, TfError::Extrapolation { ref frame, .. } if frame == "base_link"));
    }

    #[test]
    fn test_same_frame_is_identity() {
        let buffer = TransformBuffer::new();
        let res = buffer
            .lookup_transform("laser", "laser", Time::from_nanos(5))
            .unwrap();
        assert_eq!(res.transform.translation, Vector3::zeros());
        assert_eq!(Time::from(res.header.stamp), Time::from_nanos(5));
    }

    #[test]
    fn test_unknown_and_disconnected_frames() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);
        buffer
            .set_transform(&stamped("map", "odom", 0.0, Vector3::zeros()), "test", true)
            .unwrap();

        let err = buffer
            .lookup_transform("world", "laser", Time::ZERO)
            .unwrap_err();
        assert_eq!(err, TfError::UnknownFrame("laser".into()));

        let err = buffer
            .lookup_transform("world", "odom", Time::ZERO)
            .unwrap_err();
        assert!(matches!(err, TfError::Connectivity { .. }));
    }

    #[test]
    fn test_rejects_invalid_transforms() {
        let buffer = TransformBuffer::new();

        let rooted = stamped("/world", "a", 0.0, Vector3::zeros());
        let err = buffer.set_transform(&rooted, "test", false).unwrap_err();
        assert_eq!(err, TfError::InvalidFrameId("/world".into()));

        let own_parent = stamped("a", "a", 0.0, Vector3::zeros());
        let err = buffer.set_transform(&own_parent, "test", false).unwrap_err();
        assert!(matches!(err, TfError::InvalidTransform(_)));

        let nan = stamped("world", "a", 0.0, Vector3::new(f64::NAN, 0.0, 0.0));
        let err = buffer.set_transform(&nan, "test", false).unwrap_err();
        assert!(matches!(err, TfError::InvalidTransform(_)));
        assert!(!err.is_lookup_failure());

        assert!(buffer.frames().is_empty());
    }

    #[test]
    fn test_rejects_data_older_than_cache() {
        let buffer = TransformBuffer::with_cache_duration(Duration::from_secs(1));
        let recent = stamped("odom", "base_link", 5.0, Vector3::zeros());
        buffer.set_transform(&recent, "test", false).unwrap();

        let stale = stamped("odom", "base_link", 1.0, Vector3::zeros());
        let err = buffer.set_transform(&stale, "test", false).unwrap_err();
        assert!(matches!(err, TfError::InvalidTransform(_)));
    }

    #[test]
    fn test_frames_and_description() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);

        assert_eq!(buffer.frames(), vec!["base_link", "camera", "item", "world"]);
        assert!(buffer.frame_exists("world"));
        assert!(!buffer.frame_exists("laser"));
        assert_eq!(buffer.authority("camera").as_deref(), Some("test"));
        assert_eq!(
            buffer.all_frames_as_string(),
            "Frame base_link exists with parent world.\n\
             Frame camera exists with parent base_link.\n\
             Frame item exists with parent world.\n"
        );
    }

    #[test]
    fn test_clear_keeps_static_transforms() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);
        buffer.clear();

        assert!(buffer.can_transform("base_link", "camera", Time::ZERO));
        assert!(!buffer.can_transform("world", "camera", Time::ZERO));
        assert_eq!(buffer.authority("base_link"), None);
    }

    /// The tree changes shape over time:
    /// * 1-2 s: base -> camera1 -> marker -> target
    /// * 3-4 s: base -> camera2 -> marker -> target
    #[test]
    fn test_dynamic_tree() {
        let buffer = TransformBuffer::new();
        let base_to_camera1 = stamped("base", "camera1", 1.0, Vector3::new(1.0, 0.0, 0.0));
        buffer.set_transform(&base_to_camera1, "test", true).unwrap();
        let base_to_camera2 = to_transform_stamped(
            Rigid3::new(
                Vector3::new(-1.0, 0.0, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI),
            ),
            "base",
            "camera2",
            Time::from_secs_f64(1.0),
        );
        buffer.set_transform(&base_to_camera2, "test", true).unwrap();
        let marker_to_target = stamped("marker", "target", 1.0, Vector3::new(-0.5, 0.0, 0.0));
        buffer.set_transform(&marker_to_target, "test", true).unwrap();

        for (parent, secs, y) in [
            ("camera1", 1.0, 1.0),
            ("camera1", 2.0, -1.0),
            ("camera2", 3.0, 1.0),
            ("camera2", 4.0, -1.0),
        ] {
            let marker = stamped(parent, "marker", secs, Vector3::new(1.0, y, 0.0));
            buffer.set_transform(&marker, "test", false).unwrap();
        }

        let at = |secs: f64| {
            buffer
                .lookup_transform("base", "target", Time::from_secs_f64(secs))
                .unwrap()
                .transform
                .translation
        };
        assert_relative_eq!(at(1.0), Vector3::new(1.5, 1.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(at(1.5), Vector3::new(1.5, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(at(2.0), Vector3::new(1.5, -1.0, 0.0), epsilon = 1e-9);
        // Between a re-parenting the earlier sample wins.
        assert_relative_eq!(at(2.5), Vector3::new(1.5, -1.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(at(3.0), Vector3::new(-1.5, -1.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(at(3.5), Vector3::new(-1.5, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(at(4.0), Vector3::new(-1.5, 1.0, 0.0), epsilon = 1e-9);

        assert_eq!(
            buffer.latest_common_time("base", "target").unwrap(),
            Time::from_secs_f64(4.0)
        );
    }

    #[test]
    fn test_blocking_lookup_wakes_on_insert() {
        let buffer = Arc::new(TransformBuffer::new());
        let writer = Arc::clone(&buffer);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let odom = stamped("odom", "base_link", 1.0, Vector3::new(2.0, 0.0, 0.0));
            writer.set_transform(&odom, "test", false).unwrap();
        });

        let start = Instant::now();
        let res = buffer
            .lookup_transform_with_timeout(
                "odom",
                "base_link",
                Time::from_secs_f64(1.0),
                Duration::from_secs(5),
            )
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(res.transform.translation.x, 2.0);
        handle.join().unwrap();
    }

    #[test]
    fn test_blocking_lookup_times_out() {
        let buffer = TransformBuffer::new();
        build_test_tree(&buffer, 0.0);

        let timeout = Duration::from_millis(30);
        let start = Instant::now();
        let err = buffer
            .lookup_transform_with_timeout("world", "camera", Time::from_secs_f64(1.0), timeout)
            .unwrap_err();
        assert!(start.elapsed() >= timeout);
        match err {
            TfError::Timeout { cause, .. } => {
                assert!(matches!(*cause, TfError::Extrapolation { .. }))
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_timeout_returns_underlying_error() {
        let buffer = TransformBuffer::new();
        let err = LookupTransform::lookup_transform(
            &buffer,
            "world",
            "laser",
            Time::ZERO,
            Duration::ZERO,
        )
        .unwrap_err();
        assert_eq!(err, TfError::UnknownFrame("world".into()));
    }

    #[test]
    fn test_unbounded_timeout_waits_for_data() {
        let buffer = Arc::new(TransformBuffer::new());
        build_test_tree(&buffer, 0.0);

        // Data already present returns at once.
        let res = buffer
            .lookup_transform_with_timeout("world", "camera", Time::ZERO, Duration::MAX)
            .unwrap();
        assert_eq!(Time::from(res.header.stamp), Time::ZERO);

        let writer = Arc::clone(&buffer);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let odom = stamped("odom", "world", 1.0, Vector3::new(0.0, 0.0, 3.0));
            writer.set_transform(&odom, "test", false).unwrap();
        });

        let res = LookupTransform::lookup_transform(
            &buffer,
            "odom",
            "item",
            Time::from_secs_f64(1.0),
            Duration::MAX,
        )
        .unwrap();
        assert_relative_eq!(
            res.transform.translation,
            Vector3::new(1.0, 0.0, 3.0),
            epsilon = 1e-9
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_cycle_is_loop_error() {
        let buffer = TransformBuffer::new();
        let a_to_b = stamped("a", "b", 1.0, Vector3::x());
        let b_to_a = stamped("b", "a", 1.0, Vector3::y());
        let a_to_c = stamped("a", "c", 1.0, Vector3::z());
        buffer.set_transform(&a_to_b, "test", false).unwrap();
        buffer.set_transform(&b_to_a, "test", false).unwrap();
        buffer.set_transform(&a_to_c, "test", false).unwrap();

        let is_loop = |err: TfError| matches!(err, TfError::Loop { .. });
        for time in [Time::ZERO, Time::from_secs_f64(1.0)] {
            let err = buffer.lookup_transform("c", "b", time).unwrap_err();
            assert!(is_loop(err));
        }
        assert!(is_loop(buffer.latest_common_time("c", "b").unwrap_err()));
    }

    #[test]
    fn test_stamps_after_2038_stay_distinct() {
        let buffer = TransformBuffer::new();
        let first = Time::from_secs_f64(3.0e9);
        let second = Time::from_secs_f64(3.0e9 + 1.0);
        for (time, x) in [(first, 1.0), (second, 3.0)] {
            let odom = to_transform_stamped(
                Rigid3::from_translation(Vector3::new(x, 0.0, 0.0)),
                "odom",
                "base_link",
                time,
            );
            buffer.set_transform(&odom, "test", false).unwrap();
        }

        let res = buffer
            .lookup_transform("odom", "base_link", first)
            .unwrap();
        assert_eq!(Time::from(res.header.stamp), first);
        assert_relative_eq!(res.transform.translation.x, 1.0, epsilon = 1e-12);

        let halfway = first.saturating_add(Duration::from_millis(500));
        let res = buffer
            .lookup_transform("odom", "base_link", halfway)
            .unwrap();
        assert_relative_eq!(res.transform.translation.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_unrepresentable_stamp() {
        let buffer = TransformBuffer::new();
        let mut odom = stamped("odom", "base_link", 1.0, Vector3::zeros());
        odom.header.stamp = Stamp {
            sec: i64::MAX,
            nanosec: 0,
        };
        let err = buffer.set_transform(&odom, "test", false).unwrap_err();
        assert!(matches!(err, TfError::InvalidTransform(_)));
        assert!(!buffer.frame_exists("base_link"));
    }
}
