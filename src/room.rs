//! Room Core: the tick loop. Owns the world, planets, players, input
//! queues, thrust flags, and the delta encoder for one room. This is the
//! heart of the crate — everything else exists to feed it inputs and
//! carry its broadcasts to clients.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::constants::{
    G, ORBITAL_BUFFER, PHYSICS_TIMESTEP_MS, PLAYER_THRUST_FORCE, WATCHDOG_STEPS,
};
use crate::delta::{DeltaEncoder, PlayerDelta};
use crate::error::RoomError;
use crate::input::{InputMessage, InputQueue, RawInputMessage};
use crate::kernel::{self, GravitySource};
use crate::metrics::RoomMetrics;
use crate::planet::PlanetParams;
use crate::state::{PlayerConfig, PlayerState, RoomState};
use crate::time::{Clock, Millis};
use crate::vector::{vector, Vector};
use crate::world::{Body, World};

/// The room's run/pause/step control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Run,
    Pause,
}

/// Result of one executed physics step, ready to broadcast.
#[derive(Debug, Clone)]
pub struct PhysicsUpdate {
    pub step: u64,
    pub deltas: HashMap<String, PlayerDelta>,
}

pub struct RoomCore {
    pub id: String,
    world: World,
    planets: Vec<PlanetParams>,
    player_config: PlayerConfig,
    players: HashMap<String, PlayerState>,
    thrust_on: HashMap<String, bool>,
    input_queues: HashMap<String, InputQueue>,
    delta_encoder: DeltaEncoder,
    physics_step: u64,
    accumulator: Millis,
    last_physics_update_time: Millis,
    control_mode: ControlMode,
    step_requested: bool,
    pub metrics: RoomMetrics,
    clock: Arc<dyn Clock>,
    pub created_at: Millis,
}

impl RoomCore {
    pub fn new(id: impl Into<String>, planets: Vec<PlanetParams>, player_config: PlayerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            id: id.into(),
            world: World::new(),
            planets,
            player_config,
            players: HashMap::new(),
            thrust_on: HashMap::new(),
            input_queues: HashMap::new(),
            delta_encoder: DeltaEncoder::new(),
            physics_step: 0,
            accumulator: 0.0,
            last_physics_update_time: now,
            control_mode: ControlMode::Run,
            step_requested: false,
            metrics: RoomMetrics::new(),
            clock,
            created_at: now,
        }
    }

    pub fn physics_step(&self) -> u64 {
        self.physics_step
    }

    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Full state snapshot for a just-joined client's initial sync.
    pub fn snapshot(&self) -> RoomState {
        let mut state = RoomState::new(self.player_config.clone());
        state.physics_step = self.physics_step;
        state.players = self.players.clone();
        state.planets = self
            .planets
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        state
    }

    /// Spawns a player in orbit of the first planet (by insertion order) or
    /// at a configurable default if the room has no planets, and registers
    /// the new session atomically across all four per-player maps.
    pub fn on_join(&mut self, session_id: &str) -> Result<(), RoomError> {
        let (position, angle, velocity) = self.spawn_pose();
        let mut body = Body::new(
            session_id,
            position,
            self.player_config.mass,
            self.player_config.vertices.clone(),
        );
        body.angle = angle;
        body.velocity = velocity;
        body.angular_damping = self.player_config.friction_air;
        body.collision_category = self.player_config.collision_category;
        body.collision_mask = self.player_config.collision_mask;

        self.world.add(body)?;
        self.players.insert(session_id.to_string(), PlayerState::new(session_id));
        self.thrust_on.insert(session_id.to_string(), false);
        self.input_queues.insert(session_id.to_string(), InputQueue::default());
        self.metrics.players_joined += 1;
        info!(room_id = %self.id, session_id, "player joined");
        Ok(())
    }

    /// Removes a player's body and erases every per-player entry
    /// atomically.
    pub fn on_leave(&mut self, session_id: &str) {
        self.world.remove(session_id);
        self.players.remove(session_id);
        self.thrust_on.remove(session_id);
        self.input_queues.remove(session_id);
        self.delta_encoder.remove(session_id);
        self.metrics.players_left += 1;
        info!(room_id = %self.id, session_id, "player left");
    }

    /// Stops the room: removes every body and clears all state.
    pub fn dispose(&mut self) {
        let ids: Vec<String> = self.players.keys().cloned().collect();
        for id in ids {
            self.on_leave(&id);
        }
    }

    /// Returns spawn position, ship angle, and the tangential velocity that
    /// puts a fresh body into a circular orbit at radius `r` rather than
    /// free-falling toward the planet from rest.
    fn spawn_pose(&self) -> (Vector, f64, Vector) {
        match self.planets.first() {
            Some(planet) => {
                let r = planet.radius + planet.atmosphere_height + ORBITAL_BUFFER;
                let theta = rand::rng().random_range(0.0..std::f64::consts::TAU);
                let planet_pos = planet.position.to_vector();
                let radial = vector(theta.cos(), theta.sin());
                let position = planet_pos + radial * r;
                // Ship's "up" faces away from the planet: thrust (applied
                // along angle - π/2, see `apply_forces`) must point along
                // `radial`'s direction, so angle = theta + π/2.
                let angle = crate::vector::wrap_angle(theta + FRAC_PI_2);

                let orbital_speed = (G * planet.mass / r).sqrt();
                let tangent = vector(-theta.sin(), theta.cos());
                let velocity = tangent * orbital_speed;

                (position, angle, velocity)
            }
            None => (vector(0.0, 0.0), 0.0, vector(0.0, 0.0)),
        }
    }

    /// Validates and enqueues one raw client input for `session_id`.
    /// Unknown sessions are dropped with a warning.
    pub fn enqueue_input(&mut self, session_id: &str, raw: &RawInputMessage) -> Result<(), RoomError> {
        let Some(queue) = self.input_queues.get_mut(session_id) else {
            warn!(room_id = %self.id, session_id, "input for unknown session");
            return Err(RoomError::UnknownSession(session_id.to_string()));
        };
        if let Err(reason) = queue.enqueue_raw(raw, &mut self.metrics) {
            warn!(room_id = %self.id, session_id, reason, "dropped invalid input");
            return Err(RoomError::InvalidInput(reason));
        }
        Ok(())
    }

    /// Applies a `setServerControlMode` message.
    pub fn set_control_mode(&mut self, mode: &str) {
        match mode {
            "run" => {
                if self.control_mode == ControlMode::Pause {
                    self.last_physics_update_time = self.clock.now_ms();
                    self.accumulator = 0.0;
                }
                self.control_mode = ControlMode::Run;
            }
            "pause" => {
                self.control_mode = ControlMode::Pause;
            }
            "step" => {
                if self.control_mode == ControlMode::Pause {
                    self.step_requested = true;
                } else {
                    warn!(room_id = %self.id, "step requested while not paused; ignored");
                }
            }
            other => {
                warn!(room_id = %self.id, mode = other, "unknown control mode; ignored");
            }
        }
    }

    /// Drives the tick loop once: folds in elapsed wall-clock time, applies
    /// the watchdog, and executes as many fixed steps as the accumulator
    /// allows. Returns one [`PhysicsUpdate`] per executed step whose delta
    /// was non-empty, in step order. Returns
    /// `Err(RoomError::InternalInvariantViolation)` if a step detects a
    /// broken invariant; the caller must treat the room as fatally broken.
    pub fn tick(&mut self, now_ms: Millis) -> Result<Vec<PhysicsUpdate>, RoomError> {
        let elapsed = now_ms - self.last_physics_update_time;
        self.last_physics_update_time = now_ms;
        self.accumulator += elapsed;

        if self.accumulator > WATCHDOG_STEPS * PHYSICS_TIMESTEP_MS {
            warn!(room_id = %self.id, accumulator = self.accumulator, "accumulator watchdog tripped; resetting");
            self.accumulator = 0.0;
            self.metrics.accumulator_resets += 1;
        }

        let mut updates = Vec::new();
        while self.accumulator >= PHYSICS_TIMESTEP_MS {
            let perform_update = match self.control_mode {
                ControlMode::Run => true,
                ControlMode::Pause => {
                    if self.step_requested {
                        self.step_requested = false;
                        true
                    } else {
                        false
                    }
                }
            };

            if perform_update {
                if let Some(update) = self.run_one_step()? {
                    updates.push(update);
                }
            }

            self.accumulator -= PHYSICS_TIMESTEP_MS;
        }

        Ok(updates)
    }

    fn run_one_step(&mut self) -> Result<Option<PhysicsUpdate>, RoomError> {
        let dt_seconds = PHYSICS_TIMESTEP_MS / 1000.0;

        // 1. Drain and apply inputs.
        let session_ids: Vec<String> = self.players.keys().cloned().collect();
        for session_id in &session_ids {
            let Some(queue) = self.input_queues.get_mut(session_id) else {
                continue;
            };
            let drained = queue.drain_for_step();
            for queued in drained {
                match queued.message {
                    InputMessage::ThrustStart => {
                        self.thrust_on.insert(session_id.clone(), true);
                    }
                    InputMessage::ThrustStop => {
                        self.thrust_on.insert(session_id.clone(), false);
                    }
                    InputMessage::SetAngle { value } => {
                        self.world.set_angle(session_id, value);
                    }
                }
            }
        }

        // 2. Gravity sources from the (frozen) planet set.
        let gravity_sources: Vec<GravitySource> =
            self.planets.iter().map(GravitySource::from_planet).collect();

        // 3. Apply per-body forces.
        for session_id in &session_ids {
            let Some(body) = self.world.get(session_id) else {
                debug!(room_id = %self.id, session_id, "missing body mid-loop; skipping");
                continue;
            };
            let position = body.position;
            let velocity = body.velocity;
            let mass = body.mass;
            let angle = body.angle;

            let gravity_force = kernel::gravity(position, mass, &gravity_sources);
            let density = kernel::density_at(position, &self.planets);
            let drag_force = kernel::air_resistance(velocity, density);
            self.world.apply_force(session_id, gravity_force + drag_force);

            if *self.thrust_on.get(session_id).unwrap_or(&false) {
                let thrust_dir = angle - FRAC_PI_2;
                let thrust = vector(thrust_dir.cos(), thrust_dir.sin()) * PLAYER_THRUST_FORCE;
                self.world.apply_force(session_id, thrust);
            }
        }

        // 4. Integrate.
        self.world.step(dt_seconds);

        let previous_step = self.physics_step;
        self.physics_step += 1;
        if self.physics_step != previous_step + 1 {
            return Err(RoomError::InternalInvariantViolation(format!(
                "physicsStep went from {previous_step} to {} in room {}",
                self.physics_step, self.id
            )));
        }
        self.metrics.ticks_executed += 1;

        // 5. Sync replicated state from bodies and compute deltas.
        let mut deltas = HashMap::new();
        for session_id in &session_ids {
            let Some(body) = self.world.get(session_id) else {
                continue;
            };
            let is_thrusting = *self.thrust_on.get(session_id).unwrap_or(&false);
            let Some(player_state) = self.players.get_mut(session_id) else {
                continue;
            };
            player_state.x = body.position.x;
            player_state.y = body.position.y;
            player_state.angle = body.angle;
            player_state.vx = body.velocity.x;
            player_state.vy = body.velocity.y;
            player_state.angular_velocity = body.angular_velocity;
            player_state.is_sleeping = body.is_sleeping;
            player_state.is_thrusting = is_thrusting;

            let delta = self.delta_encoder.compute_delta(player_state);
            if !delta.is_empty() {
                self.delta_encoder.merge(session_id, player_state, &delta);
                deltas.insert(session_id.clone(), delta);
            }
        }

        if deltas.is_empty() {
            Ok(None)
        } else {
            Ok(Some(PhysicsUpdate {
                step: self.physics_step,
                deltas,
            }))
        }
    }

    /// Handles a debug/admin `updateState` message by writing directly
    /// into a player's replicated state without going through physics.
    /// Honored unconditionally, logging loudly so the decision is visible
    /// in production traces.
    pub fn apply_debug_state_update(&mut self, session_id: &str, partial: &PlayerDelta) {
        let Some(state) = self.players.get_mut(session_id) else {
            warn!(room_id = %self.id, session_id, "updateState for unknown session");
            return;
        };
        warn!(room_id = %self.id, session_id, "applying debug updateState");
        if let Some(x) = partial.x {
            state.x = x;
        }
        if let Some(y) = partial.y {
            state.y = y;
        }
        if let Some(angle) = partial.angle {
            state.angle = angle;
        }
        if let Some(vx) = partial.vx {
            state.vx = vx;
        }
        if let Some(vy) = partial.vy {
            state.vy = vy;
        }
        if let Some(is_sleeping) = partial.is_sleeping {
            state.is_sleeping = is_sleeping;
        }
        if let Some(is_thrusting) = partial.is_thrusting {
            state.is_thrusting = is_thrusting;
        }
        if let Some(body) = self.world.get_mut(session_id) {
            body.position = vector(state.x, state.y);
            body.angle = state.angle;
            body.velocity = vector(state.vx, state.vy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planet::WorldPlanetEntry;
    use crate::planet_gen::planet_from_world_entry;
    use crate::time::ManualClock;

    fn one_planet_room() -> (RoomCore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let planet = planet_from_world_entry(&WorldPlanetEntry {
            name: "P0".to_string(),
            x: 0.0,
            y: 0.0,
        });
        let mut planet = planet;
        planet.radius = 500.0;
        planet.mass = 1e7;
        planet.atmosphere_height = 200.0;
        planet.surface_density = 1.0;

        let room = RoomCore::new("room-1", vec![planet], PlayerConfig::default(), clock.clone());
        (room, clock)
    }

    fn raw_input(input: &str, value: Option<f64>) -> RawInputMessage {
        RawInputMessage {
            input: input.to_string(),
            value: value.map(|v| serde_json::json!(v)),
            seq: None,
        }
    }

    fn advance(room: &mut RoomCore, clock: &ManualClock, steps: u64) -> Vec<PhysicsUpdate> {
        let mut all = Vec::new();
        for _ in 0..steps {
            clock.advance(PHYSICS_TIMESTEP_MS);
            all.extend(room.tick(clock.now_ms()).expect("no invariant violation in tests"));
        }
        all
    }

    #[test]
    fn join_registers_all_four_maps_atomically() {
        let (mut room, _clock) = one_planet_room();
        room.on_join("s1").unwrap();
        assert!(room.players.contains_key("s1"));
        assert!(room.thrust_on.contains_key("s1"));
        assert!(room.input_queues.contains_key("s1"));
        assert!(room.world.contains("s1"));
    }

    #[test]
    fn leave_erases_all_four_maps_and_last_broadcast() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        advance(&mut room, &clock, 1);
        room.on_leave("s1");
        assert!(!room.players.contains_key("s1"));
        assert!(!room.thrust_on.contains_key("s1"));
        assert!(!room.input_queues.contains_key("s1"));
        assert!(!room.world.contains("s1"));
        assert!(!room.delta_encoder.has_snapshot("s1"));
    }

    #[test]
    fn spawn_and_drift_stays_within_orbital_band() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        advance(&mut room, &clock, 120);

        let planet = &room.planets[0];
        let r = planet.radius + planet.atmosphere_height + ORBITAL_BUFFER;
        let state = room.players.get("s1").unwrap();
        let dist = (state.x * state.x + state.y * state.y).sqrt();
        assert!(dist >= r && dist <= r + 2.0, "dist={dist} r={r}");
        assert!(!state.is_thrusting);
    }

    #[test]
    fn thrust_increases_speed_while_active() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        advance(&mut room, &clock, 10);

        room.enqueue_input("s1", &raw_input("thrust_start", None)).unwrap();
        advance(&mut room, &clock, 1);
        assert!(room.players.get("s1").unwrap().is_thrusting);

        let speed_before = {
            let s = room.players.get("s1").unwrap();
            (s.vx * s.vx + s.vy * s.vy).sqrt()
        };
        advance(&mut room, &clock, 59);
        let speed_after = {
            let s = room.players.get("s1").unwrap();
            (s.vx * s.vx + s.vy * s.vy).sqrt()
        };
        assert!(speed_after > speed_before);

        room.enqueue_input("s1", &raw_input("thrust_stop", None)).unwrap();
        advance(&mut room, &clock, 1);
        assert!(!room.players.get("s1").unwrap().is_thrusting);
    }

    #[test]
    fn invalid_set_angle_is_dropped_and_angle_unchanged() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        advance(&mut room, &clock, 1);
        let angle_before = room.players.get("s1").unwrap().angle;

        let bad = RawInputMessage {
            input: "set_angle".to_string(),
            value: Some(serde_json::json!(null)),
            seq: None,
        };
        assert!(room.enqueue_input("s1", &bad).is_err());
        assert_eq!(room.metrics.inputs_dropped, 1);

        advance(&mut room, &clock, 1);
        let angle_after = room.players.get("s1").unwrap().angle;
        assert_eq!(angle_before, angle_after);
    }

    #[test]
    fn pause_is_lossless() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        room.set_control_mode("pause");
        let step_before = room.physics_step();
        let pos_before = {
            let s = room.players.get("s1").unwrap();
            (s.x, s.y)
        };

        let updates = advance(&mut room, &clock, 30);
        assert!(updates.is_empty());
        assert_eq!(room.physics_step(), step_before);
        let pos_after = {
            let s = room.players.get("s1").unwrap();
            (s.x, s.y)
        };
        assert_eq!(pos_before, pos_after);
    }

    #[test]
    fn step_once_advances_exactly_one_step() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        room.set_control_mode("pause");
        advance(&mut room, &clock, 5); // drain any pending accumulator

        let step_before = room.physics_step();
        room.set_control_mode("step");
        let updates = advance(&mut room, &clock, 10);
        assert_eq!(room.physics_step(), step_before + 1);
        assert!(updates.len() <= 1);
    }

    #[test]
    fn step_while_not_paused_is_ignored() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        let step_before = room.physics_step();
        room.set_control_mode("step"); // mode is Run, so this is ignored
        advance(&mut room, &clock, 1);
        assert_eq!(room.physics_step(), step_before + 1); // the normal run-mode tick, not a step-trigger
    }

    #[test]
    fn resuming_from_pause_does_not_backfill_frames() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        room.set_control_mode("pause");
        clock.advance(PHYSICS_TIMESTEP_MS * 50.0); // big wall-clock gap while paused
        room.tick(clock.now_ms()).unwrap();

        room.set_control_mode("run");
        let updates = advance(&mut room, &clock, 1);
        assert!(updates.len() <= 1, "resuming should not replay 50 missed steps");
    }

    #[test]
    fn watchdog_resets_instead_of_running_twenty_steps() {
        let (mut room, clock) = one_planet_room();
        room.on_join("s1").unwrap();
        clock.advance(PHYSICS_TIMESTEP_MS * 20.0);
        let step_before = room.physics_step();
        let updates = room.tick(clock.now_ms()).unwrap();
        assert_eq!(room.metrics.accumulator_resets, 1);
        assert!(updates.len() <= 1);
        assert!(room.physics_step() <= step_before + 1);
    }

    #[test]
    fn unknown_session_input_is_rejected() {
        let (mut room, _clock) = one_planet_room();
        let result = room.enqueue_input("ghost", &raw_input("thrust_start", None));
        assert!(matches!(result, Err(RoomError::UnknownSession(_))));
    }

    #[test]
    fn no_planets_spawns_at_default_origin() {
        let clock = Arc::new(ManualClock::new());
        let mut room = RoomCore::new("room-2", vec![], PlayerConfig::default(), clock);
        room.on_join("s1").unwrap();
        let state = room.players.get("s1").unwrap();
        assert_eq!((state.x, state.y), (0.0, 0.0));
    }
}
