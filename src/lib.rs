//! # lumen
//!
//! An offline CPU path tracer. It reads a `.scn` scene description and a
//! set of TGA textures, renders by stochastic ray tracing, and writes a
//! 24-bit TGA image.
//!
//! ## Architecture
//!
//! - **Geometry**: four primitive families (plane, sphere, triangle,
//!   parallelogram) stored as a tagged enum; the intersection kernel
//!   dispatches on the tag in the hot loop.
//! - **Acceleration**: a kd-style binary axis-aligned partition built with
//!   midpoint splits; objects straddling a split are duplicated into both
//!   children, and queries walk the leaves along the ray, stopping once
//!   the best hit is closer than the next leaf boundary.
//! - **Shading**: throughput path tracing — a Lambertian/mirror
//!   interpolation per bounce plus a probabilistic refraction-like
//!   pass-through, with texture lookup and a constant sky on miss.
//! - **Driver**: rows run in parallel on rayon, each with its own
//!   xorshift* sequence seeded from the row index, so images are
//!   byte-identical across runs and worker counts.

pub mod arena;
pub mod camera;
pub mod intersect;
pub mod math;
pub mod parser;
pub mod partition;
pub mod renderer;
pub mod rng;
pub mod scene;
pub mod scenegen;
pub mod tga;
