//! Kernel and simulation constants.
//!
//! These are compiled-in rather than environment-configurable: they shape
//! the determinism of the simulation, not its deployment (host/port/world
//! path are environment knobs instead; see `main.rs`).

/// Gravitational constant used by [`crate::kernel::gravity`]. Tuned for
/// pixel-scale 2D orbits, not SI units.
pub const G: f64 = 6.674e-2;

/// Minimum squared distance used to guard the gravity singularity.
pub const GRAVITY_EPSILON: f64 = 1.0;

/// Coefficient `k` in the air-resistance force `-k * density * |v| * v`.
pub const AIR_RESISTANCE_K: f64 = 0.02;

/// Angular velocities at or below this magnitude are snapped to zero after damping.
pub const ANGULAR_SNAP_THRESHOLD: f64 = 0.001;

/// Magnitude of the thrust force applied while a player's `thrust_start` is active.
pub const PLAYER_THRUST_FORCE: f64 = 4000.0;

/// Fixed physics step duration in milliseconds (≈60 Hz).
pub const PHYSICS_TIMESTEP_MS: f64 = 1000.0 / 60.0;

/// Accumulator watchdog limit, expressed as a multiple of the timestep.
pub const WATCHDOG_STEPS: f64 = 10.0;

/// Extra clearance added to `radius + atmosphereHeight` when spawning a player in orbit.
pub const ORBITAL_BUFFER: f64 = 50.0;

/// Delta-encoding thresholds.
pub const SYNC_POS: f64 = 0.05;
pub const SYNC_VEL: f64 = 0.05;
pub const SYNC_ANG: f64 = 0.01;

/// Default bound on a player's pending-input queue.
pub const DEFAULT_INPUT_QUEUE_CAPACITY: usize = 256;
