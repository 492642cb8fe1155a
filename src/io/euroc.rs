use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use nalgebra::{Matrix4, Vector3};
use serde::Deserialize;
use tracing::{info, warn};

use crate::common::Time;
use crate::geometry::Rigid3;
use crate::msg::{TransformStamped, to_transform_stamped};

/// Frame names used when replaying a EuRoC sequence into a transform buffer.
pub const WORLD_FRAME: &str = "world";
pub const BODY_FRAME: &str = "body";
pub const CAM0_FRAME: &str = "cam0";
pub const CAM1_FRAME: &str = "cam1";
pub const IMU0_FRAME: &str = "imu0";

/// All transforms of a EuRoC MAV sequence, ready to be inserted in a buffer.
#[derive(Debug, Clone)]
pub struct EurocTransforms {
    /// `world -> body` ground truth poses, one per row.
    pub groundtruth: Vec<TransformStamped>,
    /// `body -> sensor` extrinsics from each `sensor.yaml`.
    pub extrinsics: Vec<TransformStamped>,
}

impl EurocTransforms {
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Ground truth is optional - some sequences might not have it
        let groundtruth = open(root.join("state_groundtruth_estimate0/data.csv"))
            .and_then(|file| load_groundtruth(file, WORLD_FRAME, BODY_FRAME))
            .unwrap_or_else(|e| {
                warn!("Could not load ground truth: {:#}. Continuing without it.", e);
                Vec::new()
            });

        let mut extrinsics = Vec::new();
        let sensors = [
            ("cam0", CAM0_FRAME),
            ("cam1", CAM1_FRAME),
            ("imu0", IMU0_FRAME),
        ];
        for (sensor, frame) in sensors {
            let yaml = root.join(sensor).join("sensor.yaml");
            if !yaml.exists() {
                warn!("No extrinsics for {} at {:?}", sensor, yaml);
                continue;
            }
            let t_body_sensor = load_sensor_extrinsics(open(yaml)?)
                .with_context(|| format!("Failed to read {} extrinsics", sensor))?;
            extrinsics.push(to_transform_stamped(t_body_sensor, BODY_FRAME, frame, Time::ZERO));
        }

        info!(
            "Loaded {} ground truth poses and {} extrinsics from {:?}",
            groundtruth.len(),
            extrinsics.len(),
            root
        );
        Ok(Self {
            groundtruth,
            extrinsics,
        })
    }
}

fn open(path: PathBuf) -> Result<File> {
    File::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Reads `state_groundtruth_estimate0/data.csv` rows as `parent -> child`
/// transforms.
///
/// Only the first eight columns are used: timestamp (ns), position, and the
/// w-first orientation quaternion. Velocity and bias columns are ignored.
pub fn load_groundtruth<R: Read>(
    reader: R,
    parent: &str,
    child: &str,
) -> Result<Vec<TransformStamped>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        // CSV format: timestamp, p_RS_R_x, p_RS_R_y, p_RS_R_z, q_RS_w, q_RS_x, q_RS_y, q_RS_z, ...
        if rec.len() < 8 {
            continue;
        }
        let ts: u64 = rec[0].trim().parse()?;

        let position = Vector3::new(
            rec[1].trim().parse()?,
            rec[2].trim().parse()?,
            rec[3].trim().parse()?,
        );

        let qw: f64 = rec[4].trim().parse()?;
        let qx: f64 = rec[5].trim().parse()?;
        let qy: f64 = rec[6].trim().parse()?;
        let qz: f64 = rec[7].trim().parse()?;
        let pose = Rigid3::from_quaternion(qw, qx, qy, qz, position);

        entries.push(to_transform_stamped(pose, parent, child, Time::from_nanos(ts)));
    }
    Ok(entries)
}

/// EuRoC T_BS transform format: has cols, rows, data fields
#[derive(Debug, Deserialize)]
struct TransformYaml {
    data: Vec<f64>,
}

/// The part of a EuRoC `sensor.yaml` we need.
#[derive(Debug, Deserialize)]
struct SensorYaml {
    #[serde(rename = "T_BS")]
    t_bs: TransformYaml,
}

/// Reads the body-from-sensor transform `T_BS` of a `sensor.yaml`.
pub fn load_sensor_extrinsics<R: Read>(reader: R) -> Result<Rigid3> {
    let sensor: SensorYaml = serde_yaml::from_reader(reader)?;
    transform_from(&sensor.t_bs.data)
}

fn transform_from(data: &[f64]) -> Result<Rigid3> {
    if data.len() != 16 {
        bail!("Expected 16 elements for transform, got {}", data.len());
    }
    let mat = Matrix4::from_row_slice(data);
    Ok(Rigid3::from_matrix(mat))
}
