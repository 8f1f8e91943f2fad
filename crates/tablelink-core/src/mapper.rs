//! Projection of 2D grid poses into the 3D audio space.
//!
//! Game space has its origin at the top-left corner of the scene with Y
//! growing downwards. Audio space is centred on the scene, Y-up, with
//! forward along +Z. The grid is projected onto the flat Y = 0 plane, so
//! the vertical audio axis is always zero for token positions.

use glam::Vec3;

/// Up vector shared by the avatar and the camera.
pub const AUDIO_UP: Vec3 = Vec3::Y;

/// Token geometry as reported by the host.
///
/// `x`/`y` are the pixel coordinates of the top-left corner, `width` and
/// `height` are measured in grid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Pixel dimensions of the active scene and its grid cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneDimensions {
    pub width: f32,
    pub height: f32,
    pub grid_size: f32,
}

/// Position and orientation in audio space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioPose {
    pub position: Vec3,
    pub front: Vec3,
    pub top: Vec3,
}

impl TokenRect {
    /// Pixel centre of the token.
    pub fn center(&self, grid_size: f32) -> (f32, f32) {
        (
            self.x + self.width * grid_size / 2.0,
            self.y + self.height * grid_size / 2.0,
        )
    }
}

/// Facing vector for a clockwise rotation in degrees.
///
/// 0° faces +Z, 90° faces +X.
pub fn facing(rotation_degrees: f32) -> Vec3 {
    let radians = rotation_degrees.to_radians();
    Vec3::new(radians.sin(), 0.0, radians.cos())
}

/// Map a token pose onto the audio plane.
pub fn map(
    token: &TokenRect,
    scene: &SceneDimensions,
    rotation_degrees: f32,
    scale: f32,
) -> AudioPose {
    let (center_x, center_y) = token.center(scene.grid_size);
    let position = Vec3::new(
        (center_x - scene.width / 2.0) * scale,
        0.0,
        (center_y - scene.height / 2.0) * scale,
    );

    AudioPose {
        position,
        front: facing(rotation_degrees),
        top: AUDIO_UP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn scene_1000() -> SceneDimensions {
        SceneDimensions {
            width: 1000.0,
            height: 1000.0,
            grid_size: 100.0,
        }
    }

    fn token_at(x: f32, y: f32) -> TokenRect {
        TokenRect {
            x,
            y,
            width: 1.0,
            height: 1.0,
        }
    }

    #[test]
    fn test_reference_scenario() {
        let pose = map(&token_at(100.0, 100.0), &scene_1000(), 0.0, 0.1);
        assert!(pose.position.abs_diff_eq(Vec3::new(-35.0, 0.0, -35.0), EPS));
        assert!(pose.front.abs_diff_eq(Vec3::Z, EPS));
        assert_eq!(pose.top, Vec3::Y);
    }

    #[test]
    fn test_token_center_uses_grid_cells() {
        let token = TokenRect {
            x: 200.0,
            y: 300.0,
            width: 2.0,
            height: 3.0,
        };
        let (cx, cy) = token.center(50.0);
        assert!((cx - 250.0).abs() < EPS);
        assert!((cy - 375.0).abs() < EPS);
    }

    #[test]
    fn test_centered_token_maps_to_origin() {
        let pose = map(&token_at(450.0, 450.0), &scene_1000(), 45.0, 0.5);
        assert!(pose.position.abs_diff_eq(Vec3::ZERO, EPS));
    }

    #[test]
    fn test_position_is_linear_in_scale() {
        let scene = SceneDimensions {
            width: 3200.0,
            height: 1800.0,
            grid_size: 140.0,
        };
        for &(x, y) in &[(0.0, 0.0), (140.0, 980.0), (2900.5, 12.25), (1600.0, 900.0)] {
            for &scale in &[0.01, 0.1, 0.37, 2.0] {
                let single = map(&token_at(x, y), &scene, 0.0, scale).position;
                let double = map(&token_at(x, y), &scene, 0.0, scale * 2.0).position;
                assert!(double.abs_diff_eq(single * 2.0, 1e-2));
                assert_eq!(single.y, 0.0);
            }
        }
    }

    #[test]
    fn test_facing_cardinal_directions() {
        assert!(facing(0.0).abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), EPS));
        assert!(facing(90.0).abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), EPS));
        assert!(facing(180.0).abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), EPS));
        assert!(facing(270.0).abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), EPS));
    }

    #[test]
    fn test_facing_is_unit_length() {
        let mut rotation = -720.0;
        while rotation <= 720.0 {
            let front = facing(rotation);
            assert!((front.length() - 1.0).abs() < EPS, "rotation {}", rotation);
            assert_eq!(front.y, 0.0);
            rotation += 7.5;
        }
    }

    #[test]
    fn test_map_is_deterministic() {
        let token = token_at(123.4, 567.8);
        let a = map(&token, &scene_1000(), 33.0, 0.1);
        let b = map(&token, &scene_1000(), 33.0, 0.1);
        assert_eq!(a, b);
    }
}
