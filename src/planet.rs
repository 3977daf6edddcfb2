//! Planet definitions. Immutable for the lifetime of a room once loaded.

use crate::vector::Point;
use serde::{Deserialize, Serialize};

/// One entry in a world file: everything a planet needs beyond its derived
/// (name-seeded) numeric properties.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldPlanetEntry {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

/// A planet's full physical and visual parameters, frozen after room
/// creation: the planet set never changes for the lifetime of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetParams {
    pub id: String,
    pub position: Point,
    pub radius: f64,
    pub mass: f64,
    pub atmosphere_height: f64,
    pub surface_density: f64,
    pub seed: u64,
    pub color_primary: String,
    pub color_secondary: String,
    pub noise_scale: f64,
}
