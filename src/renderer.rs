use crate::intersect::{intersect_scene_flat, RayHit, TraceStats};
use crate::math::*;
use crate::partition::SpatialPartition;
use crate::rng::RandomSequence;
use crate::scene::{Object, Scene, Surface};
use crossterm::style::Stylize;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

// ─── Render options ─────────────────────────────────────────────────────────

pub struct RenderOptions {
    /// Sub-samples per axis per pixel; the total per pixel is the square.
    pub samples_per_axis: u32,
    pub max_bounces: u32,
    /// Emit sampled per-ray diagnostics for the probe pixel and the first
    /// few translucency events.
    pub debug: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            samples_per_axis: 16,
            max_bounces: 4,
            debug: false,
        }
    }
}

/// Pixel whose first sub-sample gets traced verbosely under `--debug`.
const DEBUG_PROBE: (u32, u32) = (85, 180);
/// How many translucency events to narrate before going quiet.
const DEBUG_TRANSLUCENCY_LIMIT: u32 = 10;

// ─── Progress reporter ──────────────────────────────────────────────────────

/// A progress bar on stderr, safe to tick from every render worker.
struct ProgressBar {
    total: u32,
    done: AtomicU32,
    last_pct: AtomicU32,
    start: Instant,
}

impl ProgressBar {
    fn new(total: u32) -> Self {
        Self {
            total,
            done: AtomicU32::new(0),
            last_pct: AtomicU32::new(0),
            start: Instant::now(),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let pct = done * 100 / self.total;
        let last = self.last_pct.swap(pct, Ordering::Relaxed);
        if pct != last {
            let elapsed = self.start.elapsed().as_secs_f64();
            let rate = done as f64 / elapsed;
            let remaining = (self.total - done) as f64 / rate;
            let bar_width = 24;
            let filled = (pct as usize * bar_width) / 100;
            let bar = format!("{}{}", "█".repeat(filled), "░".repeat(bar_width - filled));
            eprint!("\r  Rendering: │{bar}│ {pct:3}%  ETA {remaining:.0}s   ");
        }
    }

    fn finish(&self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        let bar = "█".repeat(24).green();
        eprintln!("\r  Rendering: │{bar}│ 100%  {elapsed:.2}s       ");
    }
}

// ─── Shading ────────────────────────────────────────────────────────────────

/// Surface color at a hit: the texture sample when the object references a
/// texture, its base color otherwise.
///
/// The UV composition reproduces the established behavior of this renderer:
/// `lerp(uv0, hit.u, uv1) + lerp(uv0, hit.v, uv2)`, and the object's
/// 1-based texture index is applied directly to the 0-based table (slot 0
/// is skipped). An index past the table, or a texture that never loaded,
/// falls back to the base color.
fn sample_surface_color(scene: &Scene, object: &Object, hit: &RayHit) -> Color {
    if object.texture > 0 {
        if let Some(texture) = scene.textures.get(object.texture as usize) {
            if texture.width > 0 && texture.height > 0 {
                let uv = object.uv_map[0].lerp(object.uv_map[1], hit.uv.x)
                    + object.uv_map[0].lerp(object.uv_map[2], hit.uv.y);
                let sx = (uv.x * texture.width as f32).floor() as i64;
                let sy = (uv.y * texture.height as f32).floor() as i64;
                let sx = sx.rem_euclid(texture.width as i64) as u32;
                let sy = sy.rem_euclid(texture.height as i64) as u32;
                return texture.at(sx, sy);
            }
        }
    }
    object.color
}

/// Traces one camera sub-sample through up to `max_bounces` interactions,
/// returning the accumulated throughput. On a miss the throughput picks up
/// the sky color and the path ends.
#[allow(clippy::too_many_arguments)]
fn trace_sample(
    scene: &Scene,
    partition: Option<&SpatialPartition>,
    options: &RenderOptions,
    rng: &mut RandomSequence,
    mut ray_dir: Vec3,
    mut probe: bool,
    translucency_events: &AtomicU32,
    stats: &mut TraceStats,
) -> Color {
    let mut ray_origin = scene.camera.origin;
    let mut sample_color = Color::ones();

    for bounce in 0..options.max_bounces {
        if probe {
            debug!(
                bounce,
                origin = %ray_origin,
                dir = %ray_dir,
                "probe ray"
            );
        }

        let hit = match partition {
            Some(partition) => partition.intersect(scene, ray_origin, ray_dir, stats),
            None => intersect_scene_flat(scene, ray_origin, ray_dir, stats),
        };

        if !hit.is_hit() {
            sample_color = sample_color.hadamard(scene.sky_color);
            break;
        }

        ray_origin = ray_origin + ray_dir * hit.dist;
        let object = &scene.objects[hit.object];
        let cos_incident = ray_dir.dot(hit.normal);
        let mut falloff = 1.0;

        if rng.unilateral() < object.translucency {
            // Pass through with a refraction-like deflection of the
            // component parallel to the surface.
            let parallel = ray_dir - hit.normal * cos_incident;
            let mut refraction_coeff = 1.0 + object.refraction;
            if cos_incident < 0.0 {
                refraction_coeff = 1.0 / refraction_coeff;
            }
            ray_dir = (ray_dir - parallel * (1.0 - refraction_coeff)).normalized_or_zero();

            if options.debug
                && translucency_events.fetch_add(1, Ordering::Relaxed) < DEBUG_TRANSLUCENCY_LIMIT
            {
                probe = true;
                debug!(
                    bounce,
                    at = %ray_origin,
                    translucency = object.translucency,
                    refraction_coeff,
                    new_dir = %ray_dir,
                    "translucency hit"
                );
            }
        } else {
            // Interpolate between a random diffuse direction and the pure
            // mirror reflection; glossy = 1 is a perfect mirror.
            let reflection = ray_dir - hit.normal * (2.0 * cos_incident);
            let mut random_bounce = (hit.normal + rng.unit_ball()).normalized_or_zero();
            if cos_incident > 0.0 {
                random_bounce = -random_bounce;
            }
            ray_dir = random_bounce
                .lerp(reflection, object.glossy)
                .normalized_or(hit.normal);
            falloff = ray_dir.dot(hit.normal).abs();
        }

        // Step off the surface to avoid immediately re-hitting it.
        ray_origin = ray_origin + ray_dir * EPSILON;

        let surface_color = sample_surface_color(scene, object, &hit);
        sample_color = sample_color.hadamard(surface_color * falloff);

        if probe {
            debug!(
                hit_object = hit.object,
                normal = %hit.normal,
                falloff,
                "probe bounce"
            );
        }
    }

    sample_color
}

// ─── Driver ─────────────────────────────────────────────────────────────────

/// Renders the scene into `surface`, distributing rows across the rayon
/// pool. Every row seeds its own RNG from its Y coordinate, so the output
/// is byte-identical no matter how many workers run or in what order the
/// rows complete. Returns the reduced statistics.
pub fn render(
    scene: &Scene,
    partition: Option<&SpatialPartition>,
    surface: &mut Surface,
    options: &RenderOptions,
) -> TraceStats {
    let width = surface.width;
    let height = surface.height;
    if width == 0 || height == 0 {
        return TraceStats::default();
    }

    let samples = options.samples_per_axis;
    let camera = &scene.camera;

    let pixel_width = camera.surface_width / width as f32;
    let pixel_height = camera.surface_height / height as f32;
    let sample_width = pixel_width / samples as f32;
    let sample_height = pixel_height / samples as f32;
    let sample_weight = 1.0 / (samples * samples) as f32;
    let surface_origin = camera.x_axis * (-0.5 * camera.surface_width + 0.5 * sample_width)
        + camera.y_axis * (-0.5 * camera.surface_height + 0.5 * sample_height)
        - camera.z_axis * camera.dist_to_surface;

    let thread_count = rayon::current_num_threads();
    eprintln!("  {thread_count} threads...");

    // One padded slot per worker; rows merge into their worker's slot, and
    // the locks are effectively uncontended.
    let thread_stats: Vec<Mutex<TraceStats>> = (0..thread_count)
        .map(|_| Mutex::new(TraceStats::default()))
        .collect();
    let progress = ProgressBar::new(height);
    let translucency_events = AtomicU32::new(0);

    surface
        .pixels
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let mut rng = RandomSequence::for_row(y);
            let mut stats = TraceStats::default();

            for x in 0..width {
                let mut pixel_color = Color::zero();
                for j in 0..samples {
                    for i in 0..samples {
                        stats.samples_computed += 1;
                        let probe = options.debug
                            && x == DEBUG_PROBE.0
                            && y == DEBUG_PROBE.1
                            && i == 0
                            && j == 0;

                        let u = x as f32 * pixel_width + i as f32 * sample_width;
                        let v = y as f32 * pixel_height + j as f32 * sample_height;
                        let ray_dir = (surface_origin + camera.x_axis * u + camera.y_axis * v)
                            .normalized_or_zero();

                        pixel_color += trace_sample(
                            scene,
                            partition,
                            options,
                            &mut rng,
                            ray_dir,
                            probe,
                            &translucency_events,
                            &mut stats,
                        );
                    }
                }
                row[x as usize] = pixel_color * sample_weight;
            }

            let slot = rayon::current_thread_index().unwrap_or(0);
            thread_stats[slot]
                .lock()
                .expect("render worker panicked holding a stats lock")
                .merge(&stats);
            progress.tick();
        });

    progress.finish();

    let mut overall = TraceStats::default();
    for (index, slot) in thread_stats.iter().enumerate() {
        let stats = slot
            .lock()
            .expect("render worker panicked holding a stats lock");
        eprintln!(
            "  Thread {index}: {} rays cast, {} spatial nodes checked, {} objects checked, {} samples computed",
            stats.rays_cast, stats.nodes_checked, stats.objects_checked, stats.samples_computed
        );
        overall.merge(&stats);
    }
    eprintln!("  --------");
    eprintln!(
        "  Overall: {} rays cast, {} spatial nodes checked, {} objects checked, {} samples computed",
        overall.rays_cast, overall.nodes_checked, overall.objects_checked, overall.samples_computed
    );

    overall
}

// ─── Summary ────────────────────────────────────────────────────────────────

/// Aggregate render report for the final console summary.
pub struct RenderReport {
    pub stats: TraceStats,
    pub elapsed_secs: f64,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
}

impl RenderReport {
    pub fn mrays_per_sec(&self) -> f64 {
        self.stats.rays_cast as f64 / self.elapsed_secs / 1e6
    }

    pub fn print_summary(&self) {
        let fill = "━".repeat(30);
        eprintln!("  {fill}");
        eprintln!("  Time:     {:.4}s", self.elapsed_secs);
        eprintln!(
            "  Rays:     {:.2}M total",
            self.stats.rays_cast as f64 / 1e6
        );
        eprintln!("  Speed:    {:.2} Mrays/s", self.mrays_per_sec());
        eprintln!(
            "  Image:    {}×{} @ {} spp",
            self.width,
            self.height,
            self.samples_per_pixel
        );
        eprintln!("  {fill}");
    }
}
