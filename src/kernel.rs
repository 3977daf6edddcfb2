//! Pure physics kernel: gravity, atmospheric density, air resistance, and
//! angular damping. Shared in spirit with a client predictor (not present
//! in this crate, which is server-only) — these functions touch no
//! external state and allocate nothing, so the same math runs identically
//! wherever it's called from.

use crate::constants::{AIR_RESISTANCE_K, ANGULAR_SNAP_THRESHOLD, G, GRAVITY_EPSILON};
use crate::planet::PlanetParams;
use crate::vector::{vector, Vector};

/// A point mass contributing to the gravity field: planets, mainly.
#[derive(Debug, Clone, Copy)]
pub struct GravitySource {
    pub position: Vector,
    pub mass: f64,
}

impl GravitySource {
    pub fn from_planet(planet: &PlanetParams) -> Self {
        Self {
            position: planet.position.to_vector(),
            mass: planet.mass,
        }
    }
}

/// Sum of gravitational force from every source acting on a body at
/// `position` with the given `mass`. `ε` guards the singularity when a
/// source sits exactly at `position`.
pub fn gravity(position: Vector, mass: f64, sources: &[GravitySource]) -> Vector {
    let mut force = vector(0.0, 0.0);
    for source in sources {
        let r = source.position - position;
        let d2 = r.norm_squared().max(GRAVITY_EPSILON);
        let d = d2.sqrt();
        if d == 0.0 {
            continue;
        }
        let r_hat = r / d;
        force += r_hat * (G * source.mass * mass / d2);
    }
    force
}

/// Atmospheric density at `position`, the maximum contribution across all
/// planets. A body outside every atmosphere has density 0.
pub fn density_at(position: Vector, planets: &[PlanetParams]) -> f64 {
    let mut max_density = 0.0_f64;
    for planet in planets {
        let dist = (planet.position.to_vector() - position).norm();
        let above_surface = (dist - planet.radius).max(0.0);
        let density = if planet.atmosphere_height > 0.0 {
            planet.surface_density * (1.0 - (above_surface / planet.atmosphere_height)).max(0.0)
        } else if above_surface <= 0.0 {
            planet.surface_density
        } else {
            0.0
        };
        max_density = max_density.max(density);
    }
    max_density
}

/// Force opposing `velocity`, proportional to `density` and `|velocity|²`.
/// Zero velocity yields zero force.
pub fn air_resistance(velocity: Vector, density: f64) -> Vector {
    let speed = velocity.norm();
    if speed == 0.0 {
        return vector(0.0, 0.0);
    }
    velocity * (-AIR_RESISTANCE_K * density * speed)
}

/// Applies one step of angular damping to `angular_velocity`, snapping to
/// zero below the kernel's threshold. `damping` must be in `[0, 1)`.
pub fn angular_damping(angular_velocity: f64, damping: f64) -> f64 {
    debug_assert!((0.0..1.0).contains(&damping), "damping out of [0,1)");
    let damped = angular_velocity * (1.0 - damping);
    if damped.abs() <= ANGULAR_SNAP_THRESHOLD {
        0.0
    } else {
        damped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planet::PlanetParams;
    use crate::vector::Point;

    fn planet_at(x: f64, y: f64, radius: f64, mass: f64, atmosphere: f64, density: f64) -> PlanetParams {
        PlanetParams {
            id: "p".into(),
            position: Point::new(x, y),
            radius,
            mass,
            atmosphere_height: atmosphere,
            surface_density: density,
            seed: 0,
            color_primary: "#000000".into(),
            color_secondary: "#000000".into(),
            noise_scale: 1.0,
        }
    }

    #[test]
    fn gravity_is_pure_and_repeatable() {
        let sources = vec![GravitySource {
            position: vector(100.0, 0.0),
            mass: 1e7,
        }];
        let a = gravity(vector(0.0, 0.0), 1.0, &sources);
        let b = gravity(vector(0.0, 0.0), 1.0, &sources);
        assert_eq!(a, b);
        // Force should point toward the source (positive x).
        assert!(a.x > 0.0);
        assert!(a.y.abs() < 1e-9);
    }

    #[test]
    fn gravity_sums_across_sources() {
        let sources = vec![
            GravitySource {
                position: vector(100.0, 0.0),
                mass: 1e7,
            },
            GravitySource {
                position: vector(-100.0, 0.0),
                mass: 1e7,
            },
        ];
        let force = gravity(vector(0.0, 0.0), 1.0, &sources);
        // Symmetric sources cancel on the x axis.
        assert!(force.x.abs() < 1e-6);
    }

    #[test]
    fn gravity_guards_singularity_at_zero_distance() {
        let sources = vec![GravitySource {
            position: vector(0.0, 0.0),
            mass: 1e7,
        }];
        let force = gravity(vector(0.0, 0.0), 1.0, &sources);
        assert!(force.x.is_finite() && force.y.is_finite());
    }

    #[test]
    fn density_at_zero_outside_every_atmosphere() {
        let planets = vec![planet_at(0.0, 0.0, 500.0, 1e7, 200.0, 1.0)];
        let density = density_at(vector(1000.0, 0.0), &planets);
        assert_eq!(density, 0.0);
    }

    #[test]
    fn density_at_full_at_surface() {
        let planets = vec![planet_at(0.0, 0.0, 500.0, 1e7, 200.0, 1.0)];
        let density = density_at(vector(500.0, 0.0), &planets);
        assert!((density - 1.0).abs() < 1e-9);
    }

    #[test]
    fn density_at_zero_atmosphere_height_is_a_surface_step() {
        let planets = vec![planet_at(0.0, 0.0, 500.0, 1e7, 0.0, 1.0)];
        assert_eq!(density_at(vector(400.0, 0.0), &planets), 1.0);
        assert_eq!(density_at(vector(600.0, 0.0), &planets), 0.0);
    }

    #[test]
    fn density_at_takes_max_over_overlapping_planets() {
        let planets = vec![
            planet_at(0.0, 0.0, 500.0, 1e7, 200.0, 1.0),
            planet_at(50.0, 0.0, 400.0, 1e7, 400.0, 3.0),
        ];
        let density = density_at(vector(500.0, 0.0), &planets);
        assert!(density >= 1.0);
    }

    #[test]
    fn air_resistance_opposes_velocity() {
        let v = vector(10.0, 0.0);
        let force = air_resistance(v, 1.0);
        assert!(force.x < 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn air_resistance_zero_velocity_is_zero_force() {
        let force = air_resistance(vector(0.0, 0.0), 5.0);
        assert_eq!(force, vector(0.0, 0.0));
    }

    #[test]
    fn angular_damping_scales_and_snaps() {
        let damped = angular_damping(1.0, 0.5);
        assert!((damped - 0.5).abs() < 1e-9);
        let snapped = angular_damping(0.0005, 0.5);
        assert_eq!(snapped, 0.0);
    }
}
