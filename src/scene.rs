use crate::camera::Camera;
use crate::math::*;

// ─── Geometry ───────────────────────────────────────────────────────────────

/// The geometric part of a scene object. A tagged enum rather than trait
/// objects: the intersection kernel dispatches on the tag inside the hot
/// loop, and the spatial partition refers to objects by index, so there is
/// no vtable chasing and no lifetime entanglement between the tree and the
/// scene.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// The set of points P with P·normal = displacement. The normal need
    /// not be unit length; intersection is scale-invariant.
    Plane { normal: Vec3, displacement: f32 },
    Sphere { center: Point3, radius: f32 },
    Triangle { vertices: [Point3; 3] },
    /// P = origin + u·x_axis + v·y_axis with u, v ∈ [0, 1].
    Parallelogram {
        origin: Point3,
        x_axis: Vec3,
        y_axis: Vec3,
    },
}

/// A scene object: a shape plus its shading parameters.
#[derive(Debug, Clone)]
pub struct Object {
    pub shape: Shape,
    /// Base surface color in linear RGB, used when no texture applies.
    pub color: Color,
    /// Interpolation weight between a random diffuse bounce (0) and a pure
    /// mirror reflection (1).
    pub glossy: f32,
    /// Probability per hit that the ray passes through the surface with a
    /// refraction-like deflection instead of bouncing.
    pub translucency: f32,
    /// Offset from 1 of the refraction coefficient used by pass-through.
    pub refraction: f32,
    /// 0 = untextured; otherwise a 1-based reference into the scene's
    /// texture table.
    pub texture: u32,
    /// Canonical UVs for the three reference vertices, composed with the
    /// hit's (u, v) at shading time. Meaningful for triangles and
    /// parallelograms.
    pub uv_map: [Uv; 3],
}

impl Object {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            color: Color::zero(),
            glossy: 0.0,
            translucency: 0.0,
            refraction: 0.0,
            texture: 0,
            uv_map: [Uv::zero(); 3],
        }
    }
}

// ─── Raster surface ─────────────────────────────────────────────────────────

/// A raster of linear RGB pixels, row-major, row 0 at the bottom (matching
/// the bottom-up TGA layout). Used both for loaded textures and for the
/// render target.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::zero(); (width * height) as usize],
        }
    }

    #[inline]
    pub fn at(&self, x: u32, y: u32) -> Color {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[(y * self.width + x) as usize] = color;
    }
}

// ─── Scene ──────────────────────────────────────────────────────────────────

/// A fully loaded scene: immutable once parsing finishes.
///
/// Textures follow the 1-based indexing convention of the scene format: a
/// declaration `N = "path"` lands in `textures[N − 1]`, and 0 on an object
/// means untextured.
#[derive(Debug, Clone)]
pub struct Scene {
    pub objects: Vec<Object>,
    pub textures: Vec<Surface>,
    pub camera: Camera,
    pub sky_color: Color,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            textures: Vec::new(),
            camera: Camera::default(),
            sky_color: Color::zero(),
        }
    }
}
