use crate::arena::MemoryArena;
use crate::intersect::{intersect_object, RayHit, TraceStats};
use crate::math::*;
use crate::scene::{Object, Scene, Shape};
use tracing::warn;

// ─── Tree layout ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Build-time only: created but not yet classified. None survive in a
    /// finished tree.
    Unknown,
    Internal,
    Leaf,
}

/// One node of the partition. Nodes live contiguously in the partition's
/// node array and reference children by index, which keeps descent walking
/// a flat allocation instead of chasing pointers.
///
/// Internal nodes are fully described by `split_axis` plus their children
/// (the split value is `children[0].bounds.max[split_axis]`); leaves carry
/// their bounds for the exit-face test and a `[first_index, first_index +
/// count)` window into the global object-index array.
#[derive(Debug, Clone, Copy)]
pub struct SpatialNode {
    pub bounds: Aabb,
    pub kind: NodeKind,
    pub split_axis: usize,
    pub children: [u32; 2],
    pub first_index: u32,
    pub count: u32,
}

/// The finished acceleration structure: node storage (root at index 0) and
/// the global object-index array. The array may hold duplicates — an
/// object straddling a split plane appears under both children.
#[derive(Debug)]
pub struct SpatialPartition {
    pub nodes: Vec<SpatialNode>,
    pub object_indices: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct PartitionParams {
    pub max_objects_per_leaf: u32,
    pub max_leaf_depth: u32,
    /// Half-extent of the cube around the camera that clips the root
    /// bounds; +∞ leaves the world unclipped.
    pub max_distance: f32,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            max_objects_per_leaf: 8,
            max_leaf_depth: 32,
            max_distance: f32::MAX,
        }
    }
}

const NODE_SIZE: usize = std::mem::size_of::<SpatialNode>();
const INDEX_SIZE: usize = std::mem::size_of::<u32>();

// ─── Object bounds ──────────────────────────────────────────────────────────

/// World-space bounding box of an object. Axis-aligned planes become slabs
/// (unbounded on their two free axes); any other plane claims the whole
/// world and gets carved down by the relative pass during the build.
pub fn world_bounds(object: &Object) -> Aabb {
    match object.shape {
        Shape::Plane {
            normal,
            displacement,
        } => {
            if normal.x == 0.0 && normal.y == 0.0 {
                Aabb::new(
                    Point3::new(f32::MIN, f32::MIN, displacement),
                    Point3::new(f32::MAX, f32::MAX, displacement),
                )
            } else if normal.y == 0.0 && normal.z == 0.0 {
                Aabb::new(
                    Point3::new(displacement, f32::MIN, f32::MIN),
                    Point3::new(displacement, f32::MAX, f32::MAX),
                )
            } else if normal.z == 0.0 && normal.x == 0.0 {
                Aabb::new(
                    Point3::new(f32::MIN, displacement, f32::MIN),
                    Point3::new(f32::MAX, displacement, f32::MAX),
                )
            } else {
                Aabb::EVERYTHING
            }
        }

        Shape::Sphere { center, radius } => {
            let r = Vec3::splat(radius);
            Aabb::new(center - r, center + r)
        }

        Shape::Triangle { vertices } => {
            let min = vertices[0]
                .min_components(vertices[1])
                .min_components(vertices[2]);
            let max = vertices[0]
                .max_components(vertices[1])
                .max_components(vertices[2]);
            Aabb::new(min, max)
        }

        Shape::Parallelogram {
            origin,
            x_axis,
            y_axis,
        } => {
            let v0 = origin;
            let v1 = v0 + x_axis;
            let v2 = v1 + y_axis;
            let v3 = v0 + y_axis;
            let min = v0
                .min_components(v1)
                .min_components(v2)
                .min_components(v3);
            let max = v0
                .max_components(v1)
                .max_components(v2)
                .max_components(v3);
            Aabb::new(min, max)
        }
    }
}

/// Corner t values of a plane N·P = D over a box face grid on `axis`,
/// feeding both the plane slab clip and the face-candidate generation for
/// triangles and parallelograms.
fn plane_corner_ts(n: Vec3, d: f32, bounds: &Aabb, axis: usize) -> [(f32, f32, f32); 4] {
    let a2 = (axis + 1) % 3;
    let a3 = (axis + 2) % 3;
    let mut out = [(0.0, 0.0, 0.0); 4];
    let mut i = 0;
    for &b2 in &[bounds.min[a2], bounds.max[a2]] {
        for &b3 in &[bounds.min[a3], bounds.max[a3]] {
            let t = (d - b2 * n[a2] - b3 * n[a3]) / n[axis];
            out[i] = (t, b2, b3);
            i += 1;
        }
    }
    out
}

/// Bounding box of the part of an object that lies inside `bounds`.
/// Recomputed when a node splits, so slabs shrink, spheres carve, and
/// triangles/parallelograms clip; a straddler that misses the child box
/// entirely comes out empty (swapped) and drops out of both sides.
pub fn relative_bounds(object: &Object, bounds: &Aabb) -> Aabb {
    match object.shape {
        Shape::Plane {
            normal,
            displacement,
        } => {
            let mut result = Aabb::new(Point3::zero(), Point3::zero());
            for axis in 0..3 {
                if normal[axis] != 0.0 {
                    let ts = plane_corner_ts(normal, displacement, bounds, axis);
                    let mut min_t = f32::MAX;
                    let mut max_t = f32::MIN;
                    for &(t, _, _) in &ts {
                        min_t = min_t.min(t);
                        max_t = max_t.max(t);
                    }
                    result.min[axis] = min_t.max(bounds.min[axis]);
                    result.max[axis] = max_t.min(bounds.max[axis]);
                } else {
                    result.min[axis] = bounds.min[axis];
                    result.max[axis] = bounds.max[axis];
                }
            }
            result
        }

        Shape::Sphere { center, radius } => {
            let clamped = Point3::new(
                center.x.clamp(bounds.min.x, bounds.max.x),
                center.y.clamp(bounds.min.y, bounds.max.y),
                center.z.clamp(bounds.min.z, bounds.max.z),
            );
            if (clamped - center).length_squared() <= radius * radius {
                let mut result = Aabb::new(Point3::zero(), Point3::zero());
                for axis in 0..3 {
                    let mut v = clamped - center;
                    v[axis] = 0.0;
                    let a = (radius * radius - v.length_squared()).sqrt();
                    result.min[axis] = (center[axis] - a).max(bounds.min[axis]);
                    result.max[axis] = (center[axis] + a).min(bounds.max[axis]);
                }
                result
            } else {
                Aabb::new(bounds.max, bounds.min)
            }
        }

        Shape::Triangle { vertices } => {
            let edges = [
                vertices[1] - vertices[0],
                vertices[2] - vertices[1],
                vertices[0] - vertices[2],
            ];
            let mut candidates: Vec<Point3> = Vec::with_capacity(33);
            candidates.extend_from_slice(&vertices);
            collect_edge_crossings(&vertices[..3], &edges, bounds, &mut candidates);

            let n = edges[0].cross(edges[1]);
            if n != Vec3::zero() {
                let d = vertices[0].dot(n);
                let ab_dot_ac = -edges[0].dot(edges[2]);
                let mut ab_perp = -edges[2] - edges[0] * (ab_dot_ac / edges[0].length_squared());
                ab_perp = ab_perp / ab_perp.length_squared();
                let mut ac_perp = edges[0] + edges[2] * (ab_dot_ac / edges[2].length_squared());
                ac_perp = ac_perp / ac_perp.length_squared();
                collect_face_candidates(n, d, bounds, vertices[0], ac_perp, ab_perp, false, &mut candidates);
            }

            bounds_of_contained(&candidates, bounds)
        }

        Shape::Parallelogram {
            origin,
            x_axis,
            y_axis,
        } => {
            let verts = [origin, origin + x_axis, origin + x_axis + y_axis, origin + y_axis];
            let edges = [x_axis, y_axis, -x_axis, -y_axis];
            let mut candidates: Vec<Point3> = Vec::with_capacity(40);
            candidates.extend_from_slice(&verts);
            collect_edge_crossings(&verts, &edges, bounds, &mut candidates);

            let n = edges[0].cross(edges[1]);
            if n != Vec3::zero() {
                let d = verts[0].dot(n);
                let ab_dot_ac = edges[0].dot(edges[1]);
                let mut ab_perp = edges[1] - edges[0] * (ab_dot_ac / edges[0].length_squared());
                ab_perp = ab_perp / ab_perp.length_squared();
                let mut ac_perp = edges[0] - edges[1] * (ab_dot_ac / edges[1].length_squared());
                ac_perp = ac_perp / ac_perp.length_squared();
                collect_face_candidates(n, d, bounds, verts[0], ac_perp, ab_perp, true, &mut candidates);
            }

            bounds_of_contained(&candidates, bounds)
        }
    }
}

/// Points where a polygon edge crosses one of the box's face planes,
/// clamped to the edge's [0, 1] parameter range. Division by a zero edge
/// component yields ±∞ or NaN and fails the range check.
fn collect_edge_crossings(
    verts: &[Point3],
    edges: &[Vec3],
    bounds: &Aabb,
    out: &mut Vec<Point3>,
) {
    for axis in 0..3 {
        for (vert, edge) in verts.iter().zip(edges.iter()) {
            let t_min = (bounds.min[axis] - vert[axis]) / edge[axis];
            let t_max = (bounds.max[axis] - vert[axis]) / edge[axis];
            if (0.0..=1.0).contains(&t_min) {
                out.push(*vert + *edge * t_min);
            }
            if (0.0..=1.0).contains(&t_max) {
                out.push(*vert + *edge * t_max);
            }
        }
    }
}

/// Points where the polygon's supporting plane pierces a box edge, kept
/// when the pierce point lies inside the polygon's parameter region
/// (u + v ≤ 1 for triangles, the unit square for parallelograms).
#[allow(clippy::too_many_arguments)]
fn collect_face_candidates(
    n: Vec3,
    d: f32,
    bounds: &Aabb,
    v0: Point3,
    ac_perp: Vec3,
    ab_perp: Vec3,
    unit_square: bool,
    out: &mut Vec<Point3>,
) {
    for axis in 0..3 {
        let a2 = (axis + 1) % 3;
        let a3 = (axis + 2) % 3;
        if n[axis] != 0.0 {
            for (t, b2, b3) in plane_corner_ts(n, d, bounds, axis) {
                let mut test = Point3::zero();
                test[axis] = t;
                test[a2] = b2;
                test[a3] = b3;
                let ap = test - v0;
                let u = ap.dot(ac_perp);
                let v = ap.dot(ab_perp);
                let inside = if unit_square {
                    (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)
                } else {
                    u >= 0.0 && v >= 0.0 && u + v <= 1.0
                };
                if inside {
                    out.push(test);
                }
            }
        }
    }
}

fn bounds_of_contained(candidates: &[Point3], bounds: &Aabb) -> Aabb {
    let mut result = Aabb::new(bounds.max, bounds.min);
    for &p in candidates {
        if bounds.contains(p) {
            result.min = result.min.min_components(p);
            result.max = result.max.max_components(p);
        }
    }
    result
}

// ─── Build ──────────────────────────────────────────────────────────────────

/// Picks the split axis for a node: midpoint split, choosing the axis that
/// minimizes the larger side, but only if that actually beats keeping the
/// node whole; otherwise fall back to the longest axis so subdivision can
/// still make spatial progress on clustered input. Returns the axis and
/// the low-side count (the high slice's base offset).
fn choose_split(
    bounds: &Aabb,
    object_bounds: &[Aabb],
    indices: &[u32],
    check_valid: bool,
    parent_count: u32,
) -> (usize, u32) {
    let mut split_axis = None;
    let mut best_count = parent_count;
    let mut split_count_low = 0u32;
    let mut largest_axis = 0usize;
    let mut largest_size = f32::MIN;
    let mut largest_count_low = 0u32;

    for axis in 0..3 {
        let split_point = 0.5 * (bounds.max[axis] + bounds.min[axis]);
        let mut count_low = 0u32;
        let mut count_high = 0u32;
        for &oi in indices {
            let b = &object_bounds[oi as usize];
            if check_valid && !b.is_valid_on(axis) {
                continue;
            }
            if b.min[axis] < split_point {
                count_low += 1;
            }
            if b.max[axis] >= split_point {
                count_high += 1;
            }
        }

        let max_count = count_low.max(count_high);
        if max_count < best_count {
            best_count = max_count;
            split_count_low = count_low;
            split_axis = Some(axis);
        }

        let size = bounds.max[axis] - bounds.min[axis];
        if size > largest_size {
            largest_axis = axis;
            largest_size = size;
            largest_count_low = count_low;
        }
    }

    match split_axis {
        Some(axis) => (axis, split_count_low),
        None => (largest_axis, largest_count_low),
    }
}

/// Writes the low slice at `out[0..]` and the high slice at
/// `out[count_low_base..]`; straddlers land in both. Returns the two
/// counts (the low count always equals `count_low_base`, recounted).
fn partition_objects(
    object_bounds: &[Aabb],
    indices: &[u32],
    axis: usize,
    split_point: f32,
    count_low_base: u32,
    check_valid: bool,
    out: &mut [u32],
) -> (u32, u32) {
    let mut count_low = 0u32;
    let mut count_high = 0u32;
    for &oi in indices {
        let b = &object_bounds[oi as usize];
        if check_valid && !b.is_valid_on(axis) {
            continue;
        }
        if b.min[axis] < split_point {
            out[count_low as usize] = oi;
            count_low += 1;
        }
        if b.max[axis] >= split_point {
            out[(count_low_base + count_high) as usize] = oi;
            count_high += 1;
        }
    }
    (count_low, count_high)
}

impl SpatialPartition {
    /// A degenerate partition: one leaf over everything, identity indices.
    /// Used for scenes at or below the leaf capacity, and as the fallback
    /// when scratch cannot even hold the bounding boxes.
    fn single_leaf(object_count: usize, main: &mut MemoryArena) -> SpatialPartition {
        main.charge(NODE_SIZE + object_count * INDEX_SIZE);
        SpatialPartition {
            nodes: vec![SpatialNode {
                bounds: Aabb::EVERYTHING,
                kind: NodeKind::Leaf,
                split_axis: 0,
                children: [0, 0],
                first_index: 0,
                count: object_count as u32,
            }],
            object_indices: (0..object_count as u32).collect(),
        }
    }

    /// Breadth-first construction. Each level reads the previous level's
    /// index layout from one buffer and writes the next into a fresh one
    /// (low slice, then high slice, per split node; leaves copy through),
    /// charging the scratch arena per level. When the scratch budget runs
    /// dry the remaining frontier is frozen into leaves — a shallower tree
    /// renders slower, never wrong.
    pub fn build(
        scene: &Scene,
        params: &PartitionParams,
        main: &mut MemoryArena,
        scratch: &mut MemoryArena,
    ) -> SpatialPartition {
        let object_count = scene.objects.len();
        if object_count as u32 <= params.max_objects_per_leaf {
            return Self::single_leaf(object_count, main);
        }

        let temp = scratch.begin_temporary();
        if !scratch.charge(object_count * std::mem::size_of::<Aabb>()) {
            warn!("scratch arena cannot hold object bounds; building flat partition");
            scratch.end_temporary(temp);
            return Self::single_leaf(object_count, main);
        }

        let mut object_bounds: Vec<Aabb> =
            scene.objects.iter().map(world_bounds).collect();
        let mut root_bounds = object_bounds[0];
        for b in &object_bounds[1..] {
            root_bounds = root_bounds.union(*b);
        }

        let max_dist = Vec3::splat(params.max_distance);
        let camera_bounds = Aabb::new(
            scene.camera.origin - max_dist,
            scene.camera.origin + max_dist,
        );
        root_bounds = root_bounds.intersection(camera_bounds);

        let identity: Vec<u32> = (0..object_count as u32).collect();

        let mut nodes: Vec<SpatialNode> = Vec::new();
        main.charge(NODE_SIZE);
        nodes.push(SpatialNode {
            bounds: root_bounds,
            kind: NodeKind::Internal,
            split_axis: 0,
            children: [1, 2],
            first_index: 0,
            count: object_count as u32,
        });

        let mut circular = scratch.begin_temporary();
        scratch.charge(2 * object_count * INDEX_SIZE);
        let mut cur: Vec<u32> = vec![0; 2 * object_count];

        // Root split uses the raw world boxes; every deeper split reclips.
        let (axis, count_low_base) = choose_split(
            &root_bounds,
            &object_bounds,
            &identity,
            false,
            object_count as u32,
        );
        nodes[0].split_axis = axis;
        let split_point = 0.5 * (root_bounds.max[axis] + root_bounds.min[axis]);
        let (count_low, count_high) = partition_objects(
            &object_bounds,
            &identity,
            axis,
            split_point,
            count_low_base,
            false,
            &mut cur,
        );

        main.charge(2 * NODE_SIZE);
        let mut low = SpatialNode {
            bounds: root_bounds,
            kind: NodeKind::Unknown,
            split_axis: 0,
            children: [0, 0],
            first_index: 0,
            count: count_low,
        };
        low.bounds.max[axis] = split_point;
        let mut high = SpatialNode {
            bounds: root_bounds,
            kind: NodeKind::Unknown,
            split_axis: 0,
            children: [0, 0],
            first_index: count_low,
            count: count_high,
        };
        high.bounds.min[axis] = split_point;
        nodes.push(low);
        nodes.push(high);

        let mut total_index_count = (count_low + count_high) as usize;

        for _depth in 0..params.max_leaf_depth {
            let level_bytes = 2 * total_index_count * INDEX_SIZE;
            if !scratch.has_room(level_bytes) {
                // Ring-buffer wrap: the buffers of finished levels are dead
                // weight, release their charges and try again.
                scratch.end_temporary(circular);
                circular = scratch.begin_temporary();
                if !scratch.has_room(level_bytes) {
                    warn!("insufficient scratch space for spatial partition; stopping subdivision");
                    break;
                }
            }
            scratch.charge(level_bytes);
            let mut next: Vec<u32> = vec![0; 2 * total_index_count];

            let mut index_count: u32 = 0;
            let mut node_split = false;
            let level_node_count = nodes.len();

            for node_id in 1..level_node_count {
                let kind = nodes[node_id].kind;
                let count = nodes[node_id].count;

                if kind == NodeKind::Unknown && count > params.max_objects_per_leaf {
                    if main.has_room(2 * NODE_SIZE + 2 * total_index_count * INDEX_SIZE) {
                        node_split = true;
                        let bounds = nodes[node_id].bounds;
                        let first = nodes[node_id].first_index as usize;
                        let slice_end = first + count as usize;

                        for &oi in &cur[first..slice_end] {
                            object_bounds[oi as usize] =
                                relative_bounds(&scene.objects[oi as usize], &bounds);
                        }

                        let (axis, count_low_base) = choose_split(
                            &bounds,
                            &object_bounds,
                            &cur[first..slice_end],
                            true,
                            count,
                        );
                        let split_point = 0.5 * (bounds.max[axis] + bounds.min[axis]);
                        let (count_low, count_high) = partition_objects(
                            &object_bounds,
                            &cur[first..slice_end],
                            axis,
                            split_point,
                            count_low_base,
                            true,
                            &mut next[index_count as usize..],
                        );

                        let child_base = nodes.len() as u32;
                        nodes[node_id].kind = NodeKind::Internal;
                        nodes[node_id].split_axis = axis;
                        nodes[node_id].children = [child_base, child_base + 1];

                        main.charge(2 * NODE_SIZE);
                        let mut low = SpatialNode {
                            bounds,
                            kind: NodeKind::Unknown,
                            split_axis: 0,
                            children: [0, 0],
                            first_index: index_count,
                            count: count_low,
                        };
                        low.bounds.max[axis] = split_point;
                        let mut high = SpatialNode {
                            bounds,
                            kind: NodeKind::Unknown,
                            split_axis: 0,
                            children: [0, 0],
                            first_index: index_count + count_low,
                            count: count_high,
                        };
                        high.bounds.min[axis] = split_point;
                        nodes.push(low);
                        nodes.push(high);

                        index_count += count_low + count_high;
                    } else {
                        warn!("main arena exhausted; freezing node into a leaf");
                        copy_through(&mut nodes[node_id], &cur, &mut next, &mut index_count);
                    }
                } else if kind != NodeKind::Internal {
                    copy_through(&mut nodes[node_id], &cur, &mut next, &mut index_count);
                }
            }

            total_index_count = index_count as usize;
            cur = next;

            if !node_split {
                break;
            }
        }

        for node in &mut nodes[1..] {
            if node.kind == NodeKind::Unknown {
                node.kind = NodeKind::Leaf;
            }
        }

        main.charge(total_index_count * INDEX_SIZE);
        let object_indices = cur[..total_index_count].to_vec();

        scratch.end_temporary(circular);
        scratch.end_temporary(temp);

        SpatialPartition {
            nodes,
            object_indices,
        }
    }

    // ─── Query ──────────────────────────────────────────────────────────

    /// Walks from the root down to the leaf containing `p`, using only the
    /// split axis of internal nodes.
    #[inline]
    fn descend(&self, p: Point3, nodes_checked: &mut u64) -> usize {
        let mut id = 0usize;
        loop {
            let node = &self.nodes[id];
            if node.kind != NodeKind::Internal {
                return id;
            }
            *nodes_checked += 1;
            let low = node.children[0] as usize;
            let split_value = self.nodes[low].bounds.max[node.split_axis];
            id = if p[node.split_axis] < split_value {
                low
            } else {
                node.children[1] as usize
            };
        }
    }

    /// Closest hit through the partition: visit the leaves the ray passes
    /// through in increasing-t order, testing only the objects they hold,
    /// and stop as soon as the best hit is closer than the next leaf
    /// boundary. Faces shared with the root box are "no exit" — the ray is
    /// leaving the world there — which also prevents a false stop where a
    /// leaf face happens to lie on the world boundary.
    pub fn intersect(
        &self,
        scene: &Scene,
        origin: Point3,
        dir: Vec3,
        stats: &mut TraceStats,
    ) -> RayHit {
        let mut hit = RayHit::MISS;
        let mut nodes_checked = 0u64;
        let mut objects_checked = 0u64;

        let start = origin + dir * EPSILON;
        let mut node_id = self.descend(start, &mut nodes_checked);

        loop {
            let node = &self.nodes[node_id];
            let first = node.first_index as usize;
            for &oi in &self.object_indices[first..first + node.count as usize] {
                objects_checked += 1;
                intersect_object(&scene.objects[oi as usize], oi as usize, origin, dir, &mut hit);
            }

            let root = &self.nodes[0];
            let mut exit_dist = f32::MAX;
            for axis in 0..3 {
                if dir[axis] > 0.0 && node.bounds.max[axis] != root.bounds.max[axis] {
                    let t = (node.bounds.max[axis] - origin[axis]) / dir[axis];
                    if t > 0.0 && (hit.dist == 0.0 || t < hit.dist) && t < exit_dist {
                        exit_dist = t;
                    }
                } else if dir[axis] < 0.0 && node.bounds.min[axis] != root.bounds.min[axis] {
                    let t = (node.bounds.min[axis] - origin[axis]) / dir[axis];
                    if t > 0.0 && (hit.dist == 0.0 || t < hit.dist) && t < exit_dist {
                        exit_dist = t;
                    }
                }
            }

            if exit_dist == f32::MAX {
                break;
            }

            let next_p = origin + dir * (exit_dist + EPSILON);
            let next_id = self.descend(next_p, &mut nodes_checked);
            if next_id == node_id {
                // Numerical stall on a boundary; the best hit so far stands.
                break;
            }
            node_id = next_id;
        }

        stats.nodes_checked += nodes_checked;
        stats.objects_checked += objects_checked;
        stats.rays_cast += 1;
        hit
    }
}

fn copy_through(
    node: &mut SpatialNode,
    cur: &[u32],
    next: &mut [u32],
    index_count: &mut u32,
) {
    let first = node.first_index as usize;
    let count = node.count as usize;
    next[*index_count as usize..*index_count as usize + count]
        .copy_from_slice(&cur[first..first + count]);
    node.first_index = *index_count;
    node.kind = NodeKind::Leaf;
    *index_count += count as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersect::intersect_scene_flat;
    use crate::rng::RandomSequence;

    fn sphere(center: Point3, radius: f32) -> Object {
        Object::new(Shape::Sphere { center, radius })
    }

    fn arenas() -> (MemoryArena, MemoryArena) {
        (
            MemoryArena::new(64 * 1024 * 1024, 16),
            MemoryArena::new(64 * 1024 * 1024, 16),
        )
    }

    #[test]
    fn single_object_builds_root_leaf() {
        let mut scene = Scene::default();
        scene.objects.push(sphere(Point3::zero(), 1.0));
        let (mut main, mut scratch) = arenas();
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        assert_eq!(partition.nodes.len(), 1);
        assert_eq!(partition.nodes[0].kind, NodeKind::Leaf);
        assert_eq!(partition.nodes[0].count, 1);
        assert_eq!(partition.object_indices, vec![0]);
    }

    #[test]
    fn world_bounds_of_axis_aligned_plane_is_a_slab() {
        let plane = Object::new(Shape::Plane {
            normal: Vec3::new(0.0, 0.0, 1.0),
            displacement: 2.0,
        });
        let b = world_bounds(&plane);
        assert_eq!(b.min.z, 2.0);
        assert_eq!(b.max.z, 2.0);
        assert_eq!(b.min.x, f32::MIN);
        assert_eq!(b.max.y, f32::MAX);
    }

    #[test]
    fn world_bounds_of_oblique_plane_is_everything() {
        let plane = Object::new(Shape::Plane {
            normal: Vec3::new(1.0, 1.0, 1.0),
            displacement: 0.0,
        });
        assert_eq!(world_bounds(&plane), Aabb::EVERYTHING);
    }

    #[test]
    fn relative_bounds_carves_sphere_against_box() {
        let obj = sphere(Point3::zero(), 1.0);
        let bounds = Aabb::new(Point3::new(0.5, -2.0, -2.0), Point3::splat(2.0));
        let b = relative_bounds(&obj, &bounds);
        assert!(b.is_valid_on(0));
        assert_eq!(b.min.x, 0.5);
        assert!(b.max.x <= 1.0 + 1e-5);
        // Chord at x = 0.5 has half-height √(1 − 0.25)
        let half = (1.0f32 - 0.25).sqrt();
        assert!((b.max.y - half).abs() < 1e-4);
    }

    #[test]
    fn relative_bounds_of_disjoint_sphere_is_empty() {
        let obj = sphere(Point3::splat(10.0), 1.0);
        let bounds = Aabb::new(Point3::zero(), Point3::ones());
        let b = relative_bounds(&obj, &bounds);
        assert!(!b.is_valid_on(0));
    }

    #[test]
    fn relative_bounds_clips_triangle() {
        let obj = Object::new(Shape::Triangle {
            vertices: [
                Point3::new(-2.0, 0.0, 0.5),
                Point3::new(2.0, 0.0, 0.5),
                Point3::new(0.0, 2.0, 0.5),
            ],
        });
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::splat(1.0));
        let b = relative_bounds(&obj, &bounds);
        assert!(b.is_valid_on(0) && b.is_valid_on(1) && b.is_valid_on(2));
        assert!(b.max.x <= 1.0 + 1e-5);
        assert!(b.min.x >= -1e-5);
        assert!((b.min.z - 0.5).abs() < 1e-5 && (b.max.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn children_share_the_split_plane() {
        let mut scene = Scene::default();
        let mut rng = RandomSequence::new(99);
        for _ in 0..64 {
            scene.objects.push(sphere(
                Point3::new(
                    rng.bilateral() * 10.0,
                    rng.bilateral() * 10.0,
                    rng.bilateral() * 10.0,
                ),
                0.5,
            ));
        }
        let (mut main, mut scratch) = arenas();
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        for node in &partition.nodes {
            if node.kind == NodeKind::Internal {
                let low = &partition.nodes[node.children[0] as usize];
                let high = &partition.nodes[node.children[1] as usize];
                assert_eq!(
                    low.bounds.max[node.split_axis],
                    high.bounds.min[node.split_axis]
                );
            }
        }
    }

    #[test]
    fn leaves_cover_every_object() {
        let mut scene = Scene::default();
        let mut rng = RandomSequence::new(4242);
        for _ in 0..100 {
            scene.objects.push(sphere(
                Point3::new(
                    rng.bilateral() * 20.0,
                    rng.bilateral() * 20.0,
                    rng.bilateral() * 20.0,
                ),
                1.0,
            ));
        }
        let (mut main, mut scratch) = arenas();
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        let mut seen = vec![false; scene.objects.len()];
        for node in &partition.nodes {
            if node.kind == NodeKind::Leaf {
                let first = node.first_index as usize;
                for &oi in &partition.object_indices[first..first + node.count as usize] {
                    seen[oi as usize] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s), "some object is in no leaf");
    }

    #[test]
    fn query_agrees_with_flat_intersection() {
        let mut scene = Scene::default();
        let mut rng = RandomSequence::new(31337);
        for _ in 0..80 {
            scene.objects.push(sphere(
                Point3::new(
                    rng.bilateral() * 15.0,
                    rng.bilateral() * 15.0,
                    rng.bilateral() * 15.0,
                ),
                0.3 + rng.unilateral(),
            ));
        }
        let (mut main, mut scratch) = arenas();
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        let mut ray_rng = RandomSequence::new(777);
        for _ in 0..500 {
            let origin = Point3::new(
                ray_rng.bilateral() * 25.0,
                ray_rng.bilateral() * 25.0,
                ray_rng.bilateral() * 25.0,
            );
            let dir = ray_rng.unit_sphere();
            let mut s1 = TraceStats::default();
            let mut s2 = TraceStats::default();
            let flat = intersect_scene_flat(&scene, origin, dir, &mut s1);
            let fast = partition.intersect(&scene, origin, dir, &mut s2);
            assert_eq!(flat.is_hit(), fast.is_hit(), "hit/miss mismatch");
            if flat.is_hit() {
                assert!(
                    (flat.dist - fast.dist).abs() < 1e-3,
                    "distance mismatch: {} vs {}",
                    flat.dist,
                    fast.dist
                );
            }
        }
    }

    #[test]
    fn tiny_scratch_budget_still_builds_usable_tree() {
        let mut scene = Scene::default();
        let mut rng = RandomSequence::new(5);
        for _ in 0..64 {
            scene.objects.push(sphere(
                Point3::new(
                    rng.bilateral() * 10.0,
                    rng.bilateral() * 10.0,
                    rng.bilateral() * 10.0,
                ),
                0.25,
            ));
        }
        let mut main = MemoryArena::new(64 * 1024 * 1024, 16);
        // Room for the bounds array and the first buffer, little more.
        let mut scratch = MemoryArena::new(64 * 24 + 64 * 2 * 4 + 256, 16);
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        // Still a usable tree: every leaf indexes real objects.
        assert!(partition
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Leaf));
        let mut stats = TraceStats::default();
        let hit = partition.intersect(
            &scene,
            Point3::new(0.0, 0.0, -50.0),
            Vec3::new(0.0, 0.0, 1.0),
            &mut stats,
        );
        let mut flat_stats = TraceStats::default();
        let flat = intersect_scene_flat(
            &scene,
            Point3::new(0.0, 0.0, -50.0),
            Vec3::new(0.0, 0.0, 1.0),
            &mut flat_stats,
        );
        assert_eq!(hit.is_hit(), flat.is_hit());
    }

    #[test]
    fn partition_visits_fewer_objects_than_flat() {
        let mut scene = Scene::default();
        let mut rng = RandomSequence::new(2024);
        for _ in 0..200 {
            scene.objects.push(sphere(
                Point3::new(
                    rng.bilateral() * 30.0,
                    rng.bilateral() * 30.0,
                    rng.bilateral() * 30.0,
                ),
                0.4,
            ));
        }
        let (mut main, mut scratch) = arenas();
        let partition =
            SpatialPartition::build(&scene, &PartitionParams::default(), &mut main, &mut scratch);

        let mut flat_stats = TraceStats::default();
        let mut fast_stats = TraceStats::default();
        let mut ray_rng = RandomSequence::new(11);
        for _ in 0..200 {
            let origin = Point3::new(
                ray_rng.bilateral() * 40.0,
                ray_rng.bilateral() * 40.0,
                ray_rng.bilateral() * 40.0,
            );
            let dir = ray_rng.unit_sphere();
            intersect_scene_flat(&scene, origin, dir, &mut flat_stats);
            partition.intersect(&scene, origin, dir, &mut fast_stats);
        }
        assert!(
            fast_stats.objects_checked < flat_stats.objects_checked,
            "partition tested {} objects, flat {}",
            fast_stats.objects_checked,
            flat_stats.objects_checked
        );
    }
}
