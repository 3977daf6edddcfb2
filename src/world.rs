//! The physics world: owns rigid bodies and integrates one fixed step at a
//! time. All per-step forces are expected to already have been applied via
//! [`World::apply_force`] before [`World::step`] is called; [`World::step`]
//! itself only integrates and applies angular damping/collision response.
//!
//! This does not wrap an external physics engine (see DESIGN.md for why):
//! it is a small, inspectable semi-implicit Euler integrator, matching the
//! kernel's own "specified mathematically" contract.

use std::collections::HashMap;

use crate::error::RoomError;
use crate::kernel;
use crate::vector::{vector, wrap_angle, Point, Vector};

/// A rigid body owned by a [`World`].
#[derive(Debug, Clone)]
pub struct Body {
    pub id: String,
    pub position: Vector,
    pub velocity: Vector,
    pub angle: f64,
    pub angular_velocity: f64,
    pub mass: f64,
    pub angular_damping: f64,
    pub vertices: Vec<Point>,
    pub collision_category: u32,
    pub collision_mask: u32,
    pub is_static: bool,
    pub is_sleeping: bool,
    force_accum: Vector,
    torque_accum: f64,
}

impl Body {
    pub fn new(id: impl Into<String>, position: Vector, mass: f64, vertices: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: vector(0.0, 0.0),
            angle: 0.0,
            angular_velocity: 0.0,
            mass,
            angular_damping: 0.0,
            vertices,
            collision_category: 1,
            collision_mask: u32::MAX,
            is_static: false,
            is_sleeping: false,
            force_accum: vector(0.0, 0.0),
            torque_accum: 0.0,
        }
    }

    /// Approximate bounding radius used for cheap collision checks, derived
    /// from the hull vertices (furthest point from the body's origin).
    fn bounding_radius(&self) -> f64 {
        self.vertices
            .iter()
            .map(|v| (v.x * v.x + v.y * v.y).sqrt())
            .fold(0.0_f64, f64::max)
            .max(1.0)
    }
}

/// A collision detected during the most recent `step`.
#[derive(Debug, Clone)]
pub struct CollisionPair {
    pub body_a: String,
    pub body_b: String,
    pub contact_point: Point,
}

/// Owns all bodies in a room and integrates them one fixed step at a time.
#[derive(Default)]
pub struct World {
    bodies: HashMap<String, Body>,
    last_collisions: Vec<CollisionPair>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `body`, failing with [`RoomError::Conflict`] if its id is
    /// already present.
    pub fn add(&mut self, body: Body) -> Result<(), RoomError> {
        if self.bodies.contains_key(&body.id) {
            return Err(RoomError::Conflict(body.id));
        }
        self.bodies.insert(body.id.clone(), body);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Body> {
        self.bodies.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Body> {
        self.bodies.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bodies.contains_key(id)
    }

    /// Accumulates `force` onto `id`, waking it if it was sleeping. A body
    /// that receives non-zero force this step must not remain sleeping.
    pub fn apply_force(&mut self, id: &str, force: Vector) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.force_accum += force;
            if force.norm_squared() > 0.0 {
                body.is_sleeping = false;
            }
        }
    }

    pub fn apply_torque(&mut self, id: &str, torque: f64) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.torque_accum += torque;
            if torque != 0.0 {
                body.is_sleeping = false;
            }
        }
    }

    /// Sets `id`'s angle, wrapping `theta` to `(-π, π]` first.
    pub fn set_angle(&mut self, id: &str, theta: f64) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.angle = wrap_angle(theta);
        }
    }

    pub fn set_angular_velocity(&mut self, id: &str, omega: f64) {
        if let Some(body) = self.bodies.get_mut(id) {
            body.angular_velocity = omega;
        }
    }

    /// Ordered collision pairs detected during the last `step`.
    pub fn bodies_colliding_this_step(&self) -> &[CollisionPair] {
        &self.last_collisions
    }

    /// Integrates one fixed step of duration `dt` (seconds). Never fails.
    pub fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            if body.is_static || body.is_sleeping {
                body.force_accum = vector(0.0, 0.0);
                body.torque_accum = 0.0;
                continue;
            }

            let acceleration = body.force_accum / body.mass;
            body.velocity += acceleration * dt;
            body.position += body.velocity * dt;

            let angular_acceleration = body.torque_accum / body.mass;
            body.angular_velocity += angular_acceleration * dt;
            body.angular_velocity = kernel::angular_damping(body.angular_velocity, body.angular_damping);
            body.angle = wrap_angle(body.angle + body.angular_velocity * dt);

            body.force_accum = vector(0.0, 0.0);
            body.torque_accum = 0.0;
        }

        self.last_collisions = self.detect_collisions();
    }

    fn detect_collisions(&self) -> Vec<CollisionPair> {
        let mut pairs = Vec::new();
        let ids: Vec<&String> = self.bodies.keys().collect();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let a = &self.bodies[ids[i]];
                let b = &self.bodies[ids[j]];
                if a.collision_category & b.collision_mask == 0
                    || b.collision_category & a.collision_mask == 0
                {
                    continue;
                }
                let delta = b.position - a.position;
                let distance = delta.norm();
                let overlap_threshold = a.bounding_radius() + b.bounding_radius();
                if distance < overlap_threshold {
                    let midpoint = a.position + delta * 0.5;
                    pairs.push(CollisionPair {
                        body_a: a.id.clone(),
                        body_b: b.id.clone(),
                        contact_point: Point::from_vector(midpoint),
                    });
                }
            }
        }
        pairs
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
