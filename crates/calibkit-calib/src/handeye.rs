//! Robot gripper poses and the hand-eye solution.

use crate::{ConfigError, PersistError};
use nalgebra::{
    Isometry3, Matrix3, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Hand-eye solver variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandEyeMethod {
    #[default]
    Tsai,
    Park,
    Horaud,
    Andreff,
    Daniilidis,
}

impl HandEyeMethod {
    pub const ALL: [HandEyeMethod; 5] = [
        HandEyeMethod::Tsai,
        HandEyeMethod::Park,
        HandEyeMethod::Horaud,
        HandEyeMethod::Andreff,
        HandEyeMethod::Daniilidis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HandEyeMethod::Tsai => "tsai",
            HandEyeMethod::Park => "park",
            HandEyeMethod::Horaud => "horaud",
            HandEyeMethod::Andreff => "andreff",
            HandEyeMethod::Daniilidis => "daniilidis",
        }
    }
}

impl fmt::Display for HandEyeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HandEyeMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownHandEyeMethod(s.to_string()))
    }
}

/// Gripper pose in the robot base frame for one calibration image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GripperPose(pub Isometry3<f64>);

impl GripperPose {
    /// Position plus unit quaternion given as `[x, y, z, w]`. The quaternion
    /// is normalized; a zero quaternion is rejected.
    pub fn from_quaternion(position: [f64; 3], xyzw: [f64; 4]) -> Option<Self> {
        let [x, y, z, w] = xyzw;
        let q = Quaternion::new(w, x, y, z);
        let norm = q.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return None;
        }
        Some(Self::from_parts(position, UnitQuaternion::from_quaternion(q)))
    }

    /// Position plus Rodrigues rotation vector (axis times angle, radians).
    pub fn from_rotation_vector(position: [f64; 3], rvec: [f64; 3]) -> Self {
        Self::from_parts(
            position,
            UnitQuaternion::from_scaled_axis(Vector3::from(rvec)),
        )
    }

    /// Position plus roll, pitch, yaw in degrees (`R = Rz(yaw) Ry(pitch) Rx(roll)`).
    pub fn from_rpy_degrees(position: [f64; 3], rpy_deg: [f64; 3]) -> Self {
        let [roll, pitch, yaw] = rpy_deg.map(f64::to_radians);
        Self::from_parts(
            position,
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    fn from_parts(position: [f64; 3], rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(
            Translation3::from(Vector3::from(position)),
            rotation,
        ))
    }

    #[inline]
    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.0
    }
}

impl From<Isometry3<f64>> for GripperPose {
    fn from(iso: Isometry3<f64>) -> Self {
        Self(iso)
    }
}

/// On-disk rotation forms accepted by [`load_gripper_poses`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationRecord {
    /// `[x, y, z, w]`.
    Quaternion([f64; 4]),
    Rvec([f64; 3]),
    RpyDeg([f64; 3]),
}

/// One entry of a pose file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GripperPoseRecord {
    pub position: [f64; 3],
    pub rotation: RotationRecord,
}

impl GripperPoseRecord {
    pub fn to_pose(&self) -> Option<GripperPose> {
        match self.rotation {
            RotationRecord::Quaternion(q) => GripperPose::from_quaternion(self.position, q),
            RotationRecord::Rvec(r) => Some(GripperPose::from_rotation_vector(self.position, r)),
            RotationRecord::RpyDeg(rpy) => Some(GripperPose::from_rpy_degrees(self.position, rpy)),
        }
    }
}

/// Load a JSON list of gripper poses, in image order.
///
/// ```json
/// [
///   { "position": [0.41, -0.02, 0.33], "rotation": { "quaternion": [0, 0, 0, 1] } },
///   { "position": [0.40, 0.05, 0.31], "rotation": { "rpy_deg": [180, 0, 12.5] } }
/// ]
/// ```
pub fn load_gripper_poses(path: impl AsRef<Path>) -> Result<Vec<GripperPose>, PersistError> {
    let raw = fs::read_to_string(path)?;
    let records: Vec<GripperPoseRecord> = serde_json::from_str(&raw)?;
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.to_pose().ok_or_else(|| PersistError::InvalidValue {
                key: format!("poses[{i}].rotation"),
                reason: "zero-length quaternion".to_string(),
            })
        })
        .collect()
}

/// Camera pose in the gripper frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandEyeTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    pub method: HandEyeMethod,
}

impl HandEyeTransform {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>, method: HandEyeMethod) -> Self {
        Self {
            rotation,
            translation,
            method,
        }
    }

    /// Orthonormal with determinant +1, within `tol`.
    pub fn is_proper_rotation(&self, tol: f64) -> bool {
        let r = &self.rotation;
        let orthogonality = (r.transpose() * r - Matrix3::identity()).abs().max();
        orthogonality <= tol && (r.determinant() - 1.0).abs() <= tol
    }

    /// Nearest rigid transform.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation = Rotation3::from_matrix(&self.rotation);
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn method_names_parse() {
        assert_eq!("Tsai".parse::<HandEyeMethod>().unwrap(), HandEyeMethod::Tsai);
        assert_eq!(
            " daniilidis ".parse::<HandEyeMethod>().unwrap(),
            HandEyeMethod::Daniilidis
        );
        assert!("svd".parse::<HandEyeMethod>().is_err());
        assert_eq!(HandEyeMethod::default(), HandEyeMethod::Tsai);
    }

    #[test]
    fn rotation_forms_agree() {
        let p = [0.1, 0.2, 0.3];
        // 90 degrees about z in each representation.
        let half = FRAC_PI_2 / 2.0;
        let from_q = GripperPose::from_quaternion(p, [0.0, 0.0, half.sin(), half.cos()]).unwrap();
        let from_r = GripperPose::from_rotation_vector(p, [0.0, 0.0, FRAC_PI_2]);
        let from_e = GripperPose::from_rpy_degrees(p, [0.0, 0.0, 90.0]);
        for pose in [from_r, from_e] {
            assert_relative_eq!(pose.0, from_q.0, epsilon = 1e-12);
        }
        let x = from_q.0 * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(x, nalgebra::Point3::new(0.1, 1.2, 0.3), epsilon = 1e-12);
        assert!(GripperPose::from_quaternion(p, [0.0; 4]).is_none());
    }

    #[test]
    fn pose_file_loads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.json");
        fs::write(
            &path,
            r#"[
                {"position": [1, 2, 3], "rotation": {"quaternion": [0, 0, 0, 2]}},
                {"position": [4, 5, 6], "rotation": {"rvec": [0, 0, 0]}},
                {"position": [7, 8, 9], "rotation": {"rpy_deg": [0, 0, 0]}}
            ]"#,
        )
        .unwrap();
        let poses = load_gripper_poses(&path).unwrap();
        assert_eq!(poses.len(), 3);
        assert_relative_eq!(poses[0].0.translation.vector, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(poses[0].0.rotation.angle(), 0.0);
        assert_relative_eq!(poses[2].0.translation.vector, Vector3::new(7.0, 8.0, 9.0));

        fs::write(
            &path,
            r#"[{"position": [0, 0, 0], "rotation": {"quaternion": [0, 0, 0, 0]}}]"#,
        )
        .unwrap();
        assert!(matches!(
            load_gripper_poses(&path),
            Err(PersistError::InvalidValue { .. })
        ));
    }

    #[test]
    fn proper_rotation_check() {
        let good = HandEyeTransform::new(
            *Rotation3::from_euler_angles(0.3, -0.2, 1.1).matrix(),
            Vector3::new(0.01, 0.02, 0.1),
            HandEyeMethod::Park,
        );
        assert!(good.is_proper_rotation(1e-9));
        assert_relative_eq!(good.to_isometry().translation.vector, good.translation);

        let mut reflected = good;
        reflected.rotation.set_column(2, &(-good.rotation.column(2)));
        assert!(!reflected.is_proper_rotation(1e-6));
    }
}
