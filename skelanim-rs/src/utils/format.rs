//! Formatting utilities

use glam::{Quat, Vec3};

/// Three decimals per component
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}

/// Rotation as XYZ Euler angles in degrees
pub fn format_rotation(q: Quat) -> String {
    let (x, y, z) = q.to_euler(glam::EulerRot::XYZ);
    format!(
        "({:.1}°, {:.1}°, {:.1}°)",
        x.to_degrees(),
        y.to_degrees(),
        z.to_degrees()
    )
}

/// Seconds with millisecond precision
pub fn format_seconds(seconds: f32) -> String {
    format!("{seconds:.3}s")
}

/// A fraction as a percentage
pub fn format_percentage(value: f32) -> String {
    format!("{:.1}%", value * 100.0)
}

/// `-` for missing values
pub fn format_optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
