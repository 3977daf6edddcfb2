//! Replicated state types: `PlayerConfig`, `PlayerState`, `RoomState`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::planet::PlanetParams;
use crate::vector::Point;

/// Hull and physical properties shared by every player in a room
/// (identical for all players).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub mass: f64,
    pub friction: f64,
    pub friction_air: f64,
    pub restitution: f64,
    pub collision_category: u32,
    pub collision_mask: u32,
    pub vertices: Vec<Point>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            friction: 0.1,
            friction_air: 0.02,
            restitution: 0.2,
            collision_category: 1,
            collision_mask: u32::MAX,
            vertices: vec![
                Point::new(0.0, -10.0),
                Point::new(7.0, 10.0),
                Point::new(-7.0, 10.0),
            ],
        }
    }
}

/// A player's replicated state, as broadcast to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub session_id: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub vx: f64,
    pub vy: f64,
    pub angular_velocity: f64,
    pub is_sleeping: bool,
    pub is_thrusting: bool,
    pub cargo: String,
}

impl PlayerState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            vx: 0.0,
            vy: 0.0,
            angular_velocity: 0.0,
            is_sleeping: false,
            is_thrusting: false,
            cargo: String::new(),
        }
    }
}

/// Full room state: what a joining client is synced with on join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomState {
    pub physics_step: u64,
    pub players: HashMap<String, PlayerState>,
    pub planets: HashMap<String, PlanetParams>,
    pub player_config: PlayerConfig,
}

impl RoomState {
    pub fn new(player_config: PlayerConfig) -> Self {
        Self {
            physics_step: 0,
            players: HashMap::new(),
            planets: HashMap::new(),
            player_config,
        }
    }
}
