use crate::math::*;
use crate::scene::{Object, Scene, Shape};

// ─── Hit record ─────────────────────────────────────────────────────────────

/// The closest hit found so far. `dist == 0` means no hit — the kernel only
/// ever records strictly positive distances, so zero is unambiguous.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub dist: f32,
    /// Index of the hit object in the scene's object array. Only
    /// meaningful when `dist > 0`.
    pub object: usize,
    /// Unit surface normal, flipped to face against the incoming ray.
    pub normal: Vec3,
    /// Parametric surface coordinates for triangles and parallelograms.
    pub uv: Uv,
}

impl RayHit {
    pub const MISS: RayHit = RayHit {
        dist: 0.0,
        object: 0,
        normal: Vec3::zero(),
        uv: Uv::zero(),
    };

    #[inline(always)]
    pub fn is_hit(&self) -> bool {
        self.dist > 0.0
    }
}

// ─── Statistics ─────────────────────────────────────────────────────────────

/// Counters gathered along the hot path. Cache-line aligned so per-worker
/// records never share a line.
#[repr(align(64))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceStats {
    pub rays_cast: u64,
    pub nodes_checked: u64,
    pub objects_checked: u64,
    pub samples_computed: u64,
}

impl TraceStats {
    pub fn merge(&mut self, other: &TraceStats) {
        self.rays_cast += other.rays_cast;
        self.nodes_checked += other.nodes_checked;
        self.objects_checked += other.objects_checked;
        self.samples_computed += other.samples_computed;
    }
}

// ─── Kernel ─────────────────────────────────────────────────────────────────

/// Tests one object against the ray and records it in `hit` if it is the
/// new closest intersection with t > ε. `dir` must be unit length.
///
/// Degenerate cases (near-parallel rays, zero-area faces, zero-length
/// normals, negative discriminants) fall through as misses; nothing in
/// here can panic on scene data.
#[inline]
pub fn intersect_object(
    object: &Object,
    index: usize,
    origin: Point3,
    dir: Vec3,
    hit: &mut RayHit,
) {
    match object.shape {
        Shape::Plane {
            normal,
            displacement,
        } => {
            let denom = dir.dot(normal);
            if denom.abs() > EPSILON {
                let t = (displacement - origin.dot(normal)) / denom;
                if t > EPSILON && (hit.dist == 0.0 || t < hit.dist) {
                    hit.dist = t;
                    hit.object = index;
                    hit.normal = if denom < 0.0 { normal } else { -normal };
                }
            }
        }

        Shape::Sphere { center, radius } => {
            let from_center = origin - center;
            let b = dir.dot(from_center);
            let discriminant = b * b - from_center.length_squared() + radius * radius;
            if discriminant > EPSILON {
                let root = discriminant.sqrt();
                let mut t = -b - root;
                if t <= 0.0 {
                    // Near root behind the origin: the ray starts inside,
                    // take the far root.
                    t = -b + root;
                }
                if t > EPSILON && (hit.dist == 0.0 || t < hit.dist) {
                    let normal = (origin + dir * t - center).normalized_or_zero();
                    if normal != Vec3::zero() {
                        hit.dist = t;
                        hit.object = index;
                        hit.normal = normal;
                    }
                }
            }
        }

        Shape::Triangle { vertices } => {
            let ab = vertices[1] - vertices[0];
            let ac = vertices[2] - vertices[0];
            let normal = ab.cross(ac).normalized_or_zero();
            if normal != Vec3::zero() {
                let denom = dir.dot(normal);
                if denom.abs() > EPSILON {
                    let t = (vertices[0] - origin).dot(normal) / denom;
                    if t > EPSILON && (hit.dist == 0.0 || t < hit.dist) {
                        let ap = origin + dir * t - vertices[0];
                        let ab_dot_ac = ab.dot(ac);
                        let ab_perp = ac - ab * (ab_dot_ac / ab.length_squared());
                        let v = ap.dot(ab_perp) / ab_perp.length_squared();
                        if v > 0.0 {
                            let ac_perp = ab - ac * (ab_dot_ac / ac.length_squared());
                            let u = ap.dot(ac_perp) / ac_perp.length_squared();
                            if u > 0.0 && u + v < 1.0 {
                                hit.dist = t;
                                hit.object = index;
                                hit.normal = if denom < 0.0 { normal } else { -normal };
                                hit.uv = Uv::new(u, v);
                            }
                        }
                    }
                }
            }
        }

        Shape::Parallelogram {
            origin: par_origin,
            x_axis,
            y_axis,
        } => {
            let normal = x_axis.cross(y_axis).normalized_or_zero();
            if normal != Vec3::zero() {
                let denom = dir.dot(normal);
                if denom.abs() > EPSILON {
                    let t = (par_origin - origin).dot(normal) / denom;
                    if t > EPSILON && (hit.dist == 0.0 || t < hit.dist) {
                        let ap = origin + dir * t - par_origin;
                        let ab_dot_ac = x_axis.dot(y_axis);
                        let ab_perp = y_axis - x_axis * (ab_dot_ac / x_axis.length_squared());
                        let v = ap.dot(ab_perp) / ab_perp.length_squared();
                        if v > 0.0 {
                            let ac_perp = x_axis - y_axis * (ab_dot_ac / y_axis.length_squared());
                            let u = ap.dot(ac_perp) / ac_perp.length_squared();
                            if u > 0.0 && u < 1.0 && v < 1.0 {
                                hit.dist = t;
                                hit.object = index;
                                hit.normal = if denom < 0.0 { normal } else { -normal };
                                hit.uv = Uv::new(u, v);
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Closest hit over the flat object list, without any acceleration
/// structure. The spatial partition query must agree with this for every
/// ray (up to rays grazing leaf boundaries).
pub fn intersect_scene_flat(
    scene: &Scene,
    origin: Point3,
    dir: Vec3,
    stats: &mut TraceStats,
) -> RayHit {
    let mut hit = RayHit::MISS;
    for (index, object) in scene.objects.iter().enumerate() {
        intersect_object(object, index, origin, dir, &mut hit);
    }
    stats.objects_checked += scene.objects.len() as u64;
    stats.rays_cast += 1;
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Object;

    fn sphere_at_origin() -> Scene {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Sphere {
            center: Point3::zero(),
            radius: 1.0,
        }));
        scene
    }

    #[test]
    fn sphere_head_on_hit() {
        let scene = sphere_at_origin();
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.0, 0.0, -5.0),
            Vec3::new(0.0, 0.0, 1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert!((hit.dist - 4.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
    }

    #[test]
    fn sphere_ray_from_inside_hits_far_side() {
        let scene = sphere_at_origin();
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::zero(),
            Vec3::new(0.0, 0.0, 1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert!((hit.dist - 1.0).abs() < 1e-4);
    }

    #[test]
    fn plane_hit_with_facing_normal() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Plane {
            normal: Vec3::new(0.0, 0.0, 1.0),
            displacement: 0.0,
        }));
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert!((hit.dist - 1.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn plane_parallel_ray_misses() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Plane {
            normal: Vec3::new(0.0, 0.0, 1.0),
            displacement: 0.0,
        }));
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            &mut stats,
        );
        assert!(!hit.is_hit());
    }

    #[test]
    fn triangle_interior_hit_has_barycentric_uv() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Triangle {
            vertices: [
                Point3::zero(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
        }));
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.25, 0.25, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert!((hit.dist - 1.0).abs() < 1e-5);
        assert!(hit.uv.x > 0.0 && hit.uv.x < 1.0);
        assert!(hit.uv.y > 0.0 && hit.uv.y < 1.0);
        assert!(hit.uv.x + hit.uv.y < 1.0);
    }

    #[test]
    fn triangle_outside_misses() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Triangle {
            vertices: [
                Point3::zero(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
        }));
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.75, 0.75, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            &mut stats,
        );
        assert!(!hit.is_hit());
    }

    #[test]
    fn degenerate_triangle_is_silent_miss() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Triangle {
            vertices: [Point3::zero(), Point3::zero(), Point3::new(0.0, 1.0, 0.0)],
        }));
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            &mut stats,
        );
        assert!(!hit.is_hit());
    }

    #[test]
    fn parallelogram_accepts_full_unit_square() {
        let mut scene = Scene::default();
        scene.objects.push(Object::new(Shape::Parallelogram {
            origin: Point3::zero(),
            x_axis: Vec3::new(1.0, 0.0, 0.0),
            y_axis: Vec3::new(0.0, 1.0, 0.0),
        }));
        let mut stats = TraceStats::default();
        // (0.75, 0.75) is outside the triangle with the same edges but
        // inside the parallelogram.
        let hit = intersect_scene_flat(
            &scene,
            Point3::new(0.75, 0.75, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert!((hit.uv.x - 0.75).abs() < 1e-4);
        assert!((hit.uv.y - 0.75).abs() < 1e-4);
    }

    #[test]
    fn closest_of_two_spheres_wins() {
        let mut scene = Scene::default();
        for z in [3.0, 6.0] {
            scene.objects.push(Object::new(Shape::Sphere {
                center: Point3::new(0.0, 0.0, z),
                radius: 1.0,
            }));
        }
        let mut stats = TraceStats::default();
        let hit = intersect_scene_flat(
            &scene,
            Point3::zero(),
            Vec3::new(0.0, 0.0, 1.0),
            &mut stats,
        );
        assert!(hit.is_hit());
        assert_eq!(hit.object, 0);
        assert!((hit.dist - 2.0).abs() < 1e-4);
    }

    #[test]
    fn normals_face_the_ray() {
        // Fire rays at every shape family from both sides; the recorded
        // normal must always oppose the ray direction.
        let shapes = [
            Shape::Plane {
                normal: Vec3::new(0.0, 0.0, 1.0),
                displacement: 0.0,
            },
            Shape::Triangle {
                vertices: [
                    Point3::new(-1.0, -1.0, 0.0),
                    Point3::new(1.0, -1.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
            },
            Shape::Parallelogram {
                origin: Point3::new(-0.5, -0.5, 0.0),
                x_axis: Vec3::new(1.0, 0.0, 0.0),
                y_axis: Vec3::new(0.0, 1.0, 0.0),
            },
            Shape::Sphere {
                center: Point3::zero(),
                radius: 0.5,
            },
        ];
        for shape in shapes {
            let mut scene = Scene::default();
            scene.objects.push(Object::new(shape));
            for dir_z in [-1.0f32, 1.0] {
                let mut stats = TraceStats::default();
                let hit = intersect_scene_flat(
                    &scene,
                    Point3::new(0.0, 0.0, -2.0 * dir_z),
                    Vec3::new(0.0, 0.0, dir_z),
                    &mut stats,
                );
                assert!(hit.is_hit(), "{shape:?} from z dir {dir_z} missed");
                assert!(
                    hit.normal.dot(Vec3::new(0.0, 0.0, dir_z)) <= 0.0,
                    "normal does not face the ray for {shape:?}"
                );
            }
        }
    }
}
