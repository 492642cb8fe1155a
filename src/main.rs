use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tf_bridge::bridge::TfBridge;
use tf_bridge::common::Time;
use tf_bridge::config::BridgeOptions;
use tf_bridge::io::euroc::{BODY_FRAME, CAM0_FRAME, EurocTransforms, WORLD_FRAME};
use tf_bridge::msg::TfMessage;
use tf_bridge::tf::{TransformBuffer, TransformListener};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let dataset_path = args
        .next()
        .unwrap_or_else(|| "data/euroc/MH_01_easy/mav0".to_string());
    let options = match args.next() {
        Some(path) => BridgeOptions::load(&path)?,
        None => BridgeOptions {
            tracking_frame: BODY_FRAME.to_string(),
            ..BridgeOptions::default()
        },
    };

    println!("Loading EuRoC transforms from: {}", dataset_path);
    let transforms = EurocTransforms::load(&dataset_path)
        .with_context(|| format!("Failed to load dataset at {}", dataset_path))?;
    println!(
        "Loaded {} ground truth poses, {} extrinsics",
        transforms.groundtruth.len(),
        transforms.extrinsics.len()
    );

    // Replay the sequence through the listener as a live system would see it,
    // querying the bridge right after each pose is published.
    let buffer = Arc::new(TransformBuffer::with_cache_duration(
        options.cache_duration(),
    ));
    let (listener, dynamic_tx, static_tx) = TransformListener::channel(Arc::clone(&buffer));
    static_tx.send(TfMessage::from(transforms.extrinsics.clone()))?;

    let bridge = TfBridge::from_options(&options, &*buffer);
    println!(
        "Looking up frames relative to \"{}\" (timeout {:?})",
        bridge.tracking_frame(),
        bridge.lookup_transform_timeout()
    );

    let mut hits = 0usize;
    let mut misses = 0usize;
    for (i, transform) in transforms.groundtruth.iter().enumerate() {
        let time = Time::from(transform.header.stamp);
        dynamic_tx.send(TfMessage::from(vec![transform.clone()]))?;

        for frame in [CAM0_FRAME, WORLD_FRAME] {
            match bridge.lookup_to_tracking(time, frame) {
                Some(t) => {
                    hits += 1;
                    if i % 1000 == 0 {
                        println!(
                            "t={} {} in {}: [{:.3}, {:.3}, {:.3}] angle={:.3} rad",
                            time,
                            frame,
                            bridge.tracking_frame(),
                            t.translation.x,
                            t.translation.y,
                            t.translation.z,
                            t.rotation.angle()
                        );
                    }
                }
                None => misses += 1,
            }
        }
    }
    drop(dynamic_tx);
    drop(static_tx);
    listener.join();

    print!("{}", buffer.all_frames_as_string());
    println!("Done! {} lookups succeeded, {} failed", hits, misses);
    Ok(())
}
