//! Deterministic planet generator: `name -> PlanetParams` (minus position).
//!
//! The world file only supplies `{name, x, y}`; everything else is derived
//! from the name so that two rooms loading the same world produce
//! identical planets, including across OS/architecture.

use crate::planet::{PlanetParams, WorldPlanetEntry};
use crate::vector::Point;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

/// FNV-1a: a simple, architecture-independent hash over bytes, used only to
/// turn a planet's name into a PRNG seed. Not a security hash.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Parameter ranges a generated planet is drawn from.
const RADIUS_RANGE: (f64, f64) = (150.0, 900.0);
const MASS_PER_RADIUS_RANGE: (f64, f64) = (8_000.0, 40_000.0);
const ATMOSPHERE_RATIO_RANGE: (f64, f64) = (0.1, 0.5);
const SURFACE_DENSITY_RANGE: (f64, f64) = (0.2, 2.5);
const NOISE_SCALE_RANGE: (f64, f64) = (0.5, 4.0);

/// Derives a planet's parameters from its name alone; `position` is taken
/// from the world file separately by the caller.
pub fn generate_planet_params(name: &str) -> PlanetParams {
    let seed = fnv1a(name.as_bytes());
    let mut rng = StdRng::seed_from_u64(seed);

    let radius = rng.random_range(RADIUS_RANGE.0..=RADIUS_RANGE.1);
    let mass_per_radius = rng.random_range(MASS_PER_RADIUS_RANGE.0..=MASS_PER_RADIUS_RANGE.1);
    let atmosphere_height = radius * rng.random_range(ATMOSPHERE_RATIO_RANGE.0..=ATMOSPHERE_RATIO_RANGE.1);
    let surface_density = rng.random_range(SURFACE_DENSITY_RANGE.0..=SURFACE_DENSITY_RANGE.1);
    let noise_scale = rng.random_range(NOISE_SCALE_RANGE.0..=NOISE_SCALE_RANGE.1);

    PlanetParams {
        id: name.to_string(),
        position: Point::new(0.0, 0.0), // overwritten by the caller from the world file
        radius,
        mass: radius * mass_per_radius,
        atmosphere_height,
        surface_density,
        seed,
        color_primary: random_hex_color(&mut rng),
        color_secondary: random_hex_color(&mut rng),
        noise_scale,
    }
}

/// Builds a full `PlanetParams` for a world-file entry by combining the
/// generated (name-seeded) parameters with the entry's position.
pub fn planet_from_world_entry(entry: &WorldPlanetEntry) -> PlanetParams {
    let mut params = generate_planet_params(&entry.name);
    params.position = Point::new(entry.x, entry.y);
    params
}

fn random_hex_color(rng: &mut StdRng) -> String {
    let r: u8 = rng.random();
    let g: u8 = rng.random();
    let b: u8 = rng.random();
    format!("#{r:02x}{g:02x}{b:02x}")
}
