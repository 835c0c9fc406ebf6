//! Random scene generation, plus the built-in test textures.
//!
//! Produces `.scn` text the parser reads back: a camera on the −Y side
//! looking at the origin, a white sky, and a seeded scatter of spheres,
//! triangles, and parallelograms (textured half the time) that keeps a
//! clear radius around the camera.

use crate::math::{Color, Point3, Vec3};
use crate::rng::RandomSequence;
use crate::scene::Surface;
use crate::tga::{self, TgaError};
use std::fmt::Write as _;
use std::io;
use std::path::Path;

pub const DEFAULT_SEED: u64 = 4815162342;

const TEXTURE_FILES: [&str; 2] = ["data/checkerboard.tga", "data/bricks.tga"];

fn random_unilateral_v3(rng: &mut RandomSequence) -> Vec3 {
    Vec3::new(rng.unilateral(), rng.unilateral(), rng.unilateral())
}

fn random_bilateral_v3(rng: &mut RandomSequence) -> Vec3 {
    Vec3::new(rng.bilateral(), rng.bilateral(), rng.bilateral())
}

/// A random point in the scene cube at least `min_dist` from `point`,
/// so generated geometry never sits on top of the camera.
fn random_v3_avoiding_point(
    rng: &mut RandomSequence,
    point: Point3,
    min_dist: f32,
    max_coord: f32,
) -> Vec3 {
    let min_dist_sq = min_dist * min_dist;
    let mut result = random_bilateral_v3(rng) * max_coord;
    while (result - point).length_squared() < min_dist_sq {
        result = random_bilateral_v3(rng) * max_coord;
    }
    result
}

/// Generates the scene text for `num_objects` random objects inside a cube
/// of half-extent `scene_size`.
pub fn generate_scene(num_objects: u32, scene_size: f32, seed: u64) -> String {
    let mut rng = RandomSequence::new(seed);
    let mut out = String::new();

    let camera_origin = Vec3::new(0.0, -0.75 * scene_size, 0.0);
    let camera_look_at = Vec3::zero();
    let min_dist_from_camera = 1.5;
    let mut max_sphere_radius = 5.0f32;
    if camera_origin.y + min_dist_from_camera + max_sphere_radius > scene_size {
        max_sphere_radius = scene_size - camera_origin.y - min_dist_from_camera;
    }

    out.push_str("Textures\n{\n");
    for (index, file) in TEXTURE_FILES.iter().enumerate() {
        let _ = writeln!(out, "\t{} = \"{}\",", index + 1, file);
    }
    out.push_str("}\n\n");

    let _ = writeln!(
        out,
        "Camera (Origin = ({:.2}, {:.2}, {:.2}), DistToSurface = 1, SurfaceWidth = 1, SurfaceHeight = 1)\n{{\n\tLookAt = ({:.2}, {:.2}, {:.2}),\n\tSkyColor = (1, 1, 1),\n}}\n",
        camera_origin.x,
        camera_origin.y,
        camera_origin.z,
        camera_look_at.x,
        camera_look_at.y,
        camera_look_at.z
    );

    for _ in 0..num_objects {
        let kind = rng.unilateral();
        if kind < 1.0 / 3.0 {
            let radius = 0.2 + (max_sphere_radius - 0.2) * rng.unilateral();
            let center = random_v3_avoiding_point(
                &mut rng,
                camera_origin,
                min_dist_from_camera + radius,
                scene_size,
            );
            let color = random_unilateral_v3(&mut rng);
            let glossy = rng.unilateral();
            let _ = writeln!(
                out,
                "Sphere (Center = ({:.2}, {:.2}, {:.2}), Radius = {:.2})\n{{\n\tColor = ({:.2}, {:.2}, {:.2}),\n\tGlossy = {:.2},\n}}\n",
                center.x, center.y, center.z, radius, color.x, color.y, color.z, glossy
            );
        } else if kind < 2.0 / 3.0 {
            let radius = 0.2 + (max_sphere_radius - 0.2) * rng.unilateral();
            let center = random_v3_avoiding_point(
                &mut rng,
                camera_origin,
                min_dist_from_camera + radius,
                scene_size,
            );
            let v0 = center + random_bilateral_v3(&mut rng) * radius;
            let v1 = center + random_bilateral_v3(&mut rng) * radius;
            let v2 = center + random_bilateral_v3(&mut rng) * radius;
            let glossy = rng.unilateral();
            if rng.unilateral() < 0.5 {
                let color = random_unilateral_v3(&mut rng);
                let _ = writeln!(
                    out,
                    "Triangle (Vertices = (({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2})))\n{{\n\tColor = ({:.2}, {:.2}, {:.2}),\n\tGlossy = {:.2},\n}}\n",
                    v0.x, v0.y, v0.z, v1.x, v1.y, v1.z, v2.x, v2.y, v2.z,
                    color.x, color.y, color.z, glossy
                );
            } else {
                let texture = (rng.next_raw() >> 32) as u32 % TEXTURE_FILES.len() as u32 + 1;
                let _ = writeln!(
                    out,
                    "Triangle (Vertices = (({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2})))\n{{\n\tTexture = {},\n\tUVMap = ((0, 0), (1, 0), (0, 1)),\n\tGlossy = {:.2},\n}}\n",
                    v0.x, v0.y, v0.z, v1.x, v1.y, v1.z, v2.x, v2.y, v2.z,
                    texture,
                    0.5 * glossy
                );
            }
        } else {
            let radius = 0.2 + (max_sphere_radius - 0.2) * rng.unilateral();
            let origin = random_v3_avoiding_point(
                &mut rng,
                camera_origin,
                min_dist_from_camera + radius,
                scene_size,
            );
            let x_axis = random_bilateral_v3(&mut rng) * (0.5 * radius);
            let y_axis = random_bilateral_v3(&mut rng) * (0.5 * radius);
            let glossy = rng.unilateral();
            if rng.unilateral() < 0.5 {
                let color = random_unilateral_v3(&mut rng);
                let _ = writeln!(
                    out,
                    "Parallelogram (Origin = ({:.2}, {:.2}, {:.2}), Axes = (({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2})))\n{{\n\tColor = ({:.2}, {:.2}, {:.2}),\n\tGlossy = {:.2},\n}}\n",
                    origin.x, origin.y, origin.z,
                    x_axis.x, x_axis.y, x_axis.z, y_axis.x, y_axis.y, y_axis.z,
                    color.x, color.y, color.z, glossy
                );
            } else {
                let texture = (rng.next_raw() >> 32) as u32 % TEXTURE_FILES.len() as u32 + 1;
                let _ = writeln!(
                    out,
                    "Parallelogram (Origin = ({:.2}, {:.2}, {:.2}), Axes = (({:.2}, {:.2}, {:.2}), ({:.2}, {:.2}, {:.2})))\n{{\n\tTexture = {},\n\tUVMap = ((0, 0), (1, 0), (0, 1)),\n\tGlossy = {:.2},\n}}\n",
                    origin.x, origin.y, origin.z,
                    x_axis.x, x_axis.y, x_axis.z, y_axis.x, y_axis.y, y_axis.z,
                    texture,
                    0.5 * glossy
                );
            }
        }
    }

    out
}

/// Writes a generated scene to disk.
pub fn write_scene(
    path: &Path,
    num_objects: u32,
    scene_size: f32,
    seed: u64,
) -> io::Result<()> {
    std::fs::write(path, generate_scene(num_objects, scene_size, seed))
}

// ─── Built-in textures ──────────────────────────────────────────────────────

/// The 2×2 checkerboard: black/white with black in the lower-left and
/// upper-right corners.
pub fn checkerboard_texture() -> Surface {
    let mut surface = Surface::new(2, 2);
    surface.set(0, 0, Color::zero());
    surface.set(1, 0, Color::ones());
    surface.set(0, 1, Color::ones());
    surface.set(1, 1, Color::zero());
    surface
}

/// A 16×16 brick wall: light mortar lines over two courses of offset
/// bricks. Rows are listed bottom-up like the raster they become.
pub fn brick_texture() -> Surface {
    const I: Color = Color::new(0.8, 0.8, 0.8);
    const J: Color = Color::new(0.7, 0.7, 0.7);
    const D: Color = Color::new(0.5, 0.4, 0.2);
    const L: Color = Color::new(0.7, 0.5, 0.2);

    const ROWS: [&str; 16] = [
        "IJIJIJIJIJIJIJIJ",
        "JIJJJJJJJJJJJJJJ",
        "DDIJDDDDDDDDDDDD",
        "DLJJDLDLDLDLDLDL",
        "LLIJDDLDLDLDLDLD",
        "DLJJDLDLDLDLDLDL",
        "LLIJDDLDLDLDLDLD",
        "LLJIDLLLLLLLLLLL",
        "IJIJIJIJIJIJIJIJ",
        "JJJJJJJJJIJJJJJJ",
        "DDDDDDDDDDIJDDDD",
        "DLDLDLDLDLJJDLDL",
        "LDLDLDLDLLIJDDLD",
        "DLDLDLDLDLJJDLDL",
        "LDLDLDLDLLIJDDLD",
        "LLLLLLLLLLJIDLLL",
    ];

    let mut surface = Surface::new(16, 16);
    for (y, row) in ROWS.iter().enumerate() {
        for (x, cell) in row.bytes().enumerate() {
            let color = match cell {
                b'I' => I,
                b'J' => J,
                b'D' => D,
                _ => L,
            };
            surface.set(x as u32, y as u32, color);
        }
    }
    surface
}

/// Writes `checkerboard.tga` and `bricks.tga` into `dir`, creating it if
/// needed. These are the textures the generated scenes reference.
pub fn write_builtin_textures(dir: &Path) -> Result<(), TgaError> {
    if let Err(source) = std::fs::create_dir_all(dir) {
        return Err(TgaError::Write {
            path: dir.to_path_buf(),
            source,
        });
    }
    tga::write_tga(&checkerboard_texture(), &dir.join("checkerboard.tga"), true)?;
    tga::write_tga(&brick_texture(), &dir.join("bricks.tga"), true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_scene;
    use crate::scene::Shape;

    #[test]
    fn generated_scene_has_camera_and_sky() {
        // Strip the texture block so parsing needs no files on disk.
        let text = generate_scene(10, 20.0, DEFAULT_SEED);
        let body = text.split_once("}\n\n").unwrap().1;
        let scene = parse_scene(body.as_bytes()).unwrap();

        assert_eq!(scene.sky_color, Color::ones());
        assert_eq!(scene.camera.origin, Vec3::new(0.0, -15.0, 0.0));
        assert!(!scene.objects.is_empty());
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        assert_eq!(generate_scene(25, 30.0, 7), generate_scene(25, 30.0, 7));
        assert_ne!(generate_scene(25, 30.0, 7), generate_scene(25, 30.0, 8));
    }

    #[test]
    fn objects_keep_their_distance_from_the_camera() {
        let text = generate_scene(40, 20.0, 99);
        let body = text.split_once("}\n\n").unwrap().1;
        let scene = parse_scene(body.as_bytes()).unwrap();
        let camera = Vec3::new(0.0, -15.0, 0.0);

        for object in &scene.objects {
            if let Shape::Sphere { center, radius } = object.shape {
                // Written coordinates are rounded to 2 decimals; allow slack.
                assert!(
                    (center - camera).length() + 0.05 >= 1.5 + radius - 0.05,
                    "sphere at {center} radius {radius} crowds the camera"
                );
            }
        }
    }

    #[test]
    fn checkerboard_matches_expected_corners() {
        let texture = checkerboard_texture();
        assert_eq!(texture.at(0, 0), Color::zero());
        assert_eq!(texture.at(1, 1), Color::zero());
        assert_eq!(texture.at(1, 0), Color::ones());
        assert_eq!(texture.at(0, 1), Color::ones());
    }

    #[test]
    fn brick_texture_is_16_by_16() {
        let texture = brick_texture();
        assert_eq!(texture.width, 16);
        assert_eq!(texture.height, 16);
        assert_eq!(texture.at(0, 0), Color::new(0.8, 0.8, 0.8));
    }

    #[test]
    fn textures_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        write_builtin_textures(dir.path()).unwrap();
        let loaded = crate::tga::load_tga(&dir.path().join("checkerboard.tga"), true).unwrap();
        assert_eq!(loaded.width, 2);
        assert_eq!(loaded.height, 2);
        assert_eq!(loaded.at(0, 0), Color::zero());
        // 1.0 encodes to 255 and decodes back to 1.0 exactly.
        assert_eq!(loaded.at(1, 0), Color::ones());
    }
}
