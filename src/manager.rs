//! Room Manager: creates a room actor on first reference to a given room
//! id, routes client messages to it, and disposes rooms that stay empty
//! past an idle window.
//!
//! One tokio task owns each room's state exclusively: the tick loop never
//! contends with request handling for a shared lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::delta::PlayerDelta;
use crate::error::RoomError;
use crate::input::RawInputMessage;
use crate::planet::{PlanetParams, WorldPlanetEntry};
use crate::planet_gen::planet_from_world_entry;
use crate::room::{PhysicsUpdate, RoomCore};
use crate::state::{PlayerConfig, RoomState};
use crate::time::{Clock, Millis, SystemClock};

pub type RoomId = String;

/// Generates an 8-character alphanumeric room id for clients that join
/// without naming a room — the "create a fresh room" path, as opposed to
/// joining an existing id.
pub fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    (0..8)
        .map(|_| {
            let n: u8 = rng.random_range(0..36);
            if n < 10 {
                (b'0' + n) as char
            } else {
                (b'A' + (n - 10)) as char
            }
        })
        .collect()
}

/// A just-accepted message for a room's tick-loop actor.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        session_id: String,
        outbound: mpsc::UnboundedSender<ServerEvent>,
        reply: oneshot::Sender<Result<(RoomState, Millis), RoomError>>,
    },
    Leave {
        session_id: String,
    },
    Input {
        session_id: String,
        raw: RawInputMessage,
    },
    SetControlMode {
        mode: String,
    },
    DebugUpdateState {
        session_id: String,
        delta: PlayerDelta,
    },
}

/// An event pushed out of a room actor toward one connected client.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    WorldCreationTime(Millis),
    Pong(u64),
    Physics(PhysicsUpdate),
    InitialState(RoomState),
    RoomCreated(RoomId),
}

const TICK_POLL_INTERVAL: Duration = Duration::from_millis(8);
const IDLE_DISPOSAL_TIMEOUT: Duration = Duration::from_secs(300);

pub struct RoomManager {
    rooms: Mutex<HashMap<RoomId, mpsc::Sender<RoomCommand>>>,
    world_dir: PathBuf,
    player_config: PlayerConfig,
}

impl RoomManager {
    pub fn new(world_dir: PathBuf, player_config: PlayerConfig) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            world_dir,
            player_config,
        })
    }

    /// Returns the command channel for `room_id`'s actor, spawning it on
    /// demand if it doesn't exist yet or its previous actor has exited.
    pub fn room_sender(&self, room_id: &str) -> mpsc::Sender<RoomCommand> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(sender) = rooms.get(room_id) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }

        let (planets, load_failure) = match load_world_planets(&self.world_dir, room_id) {
            Ok(planets) => (planets, None),
            Err(err) => {
                warn!(room_id, error = %err, "starting room in degraded mode with no planets");
                (Vec::new(), Some(err))
            }
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let mut room_core = RoomCore::new(room_id, planets, self.player_config.clone(), clock.clone());
        if load_failure.is_some() {
            room_core.metrics.config_load_failures += 1;
        }
        let (sender, receiver) = mpsc::channel(256);
        info!(room_id, "spawning room actor");
        tokio::spawn(run_room(room_core, receiver, clock));
        rooms.insert(room_id.to_string(), sender.clone());
        sender
    }

    /// Drops registry entries whose actor has already terminated (it
    /// disposes itself after sitting empty past [`IDLE_DISPOSAL_TIMEOUT`]).
    /// Called periodically from `main`.
    pub fn prune_disposed_rooms(&self) {
        let mut rooms = self.rooms.lock().unwrap();
        rooms.retain(|room_id, sender| {
            let alive = !sender.is_closed();
            if !alive {
                info!(room_id, "pruned disposed room from registry");
            }
            alive
        });
    }
}

fn load_world_planets(world_dir: &Path, room_id: &str) -> Result<Vec<PlanetParams>, RoomError> {
    let named = world_dir.join(format!("{room_id}.world.json"));
    let path = if named.exists() {
        named
    } else {
        world_dir.join("default.world.json")
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|err| RoomError::ConfigLoadFailure(format!("{}: {err}", path.display())))?;

    serde_json::from_str::<Vec<WorldPlanetEntry>>(&contents)
        .map(|entries| entries.iter().map(planet_from_world_entry).collect())
        .map_err(|err| RoomError::ConfigLoadFailure(format!("{}: {err}", path.display())))
}

/// A room's tick loop and command-processing actor. Owns the only mutable
/// reference to its `RoomCore`: no locking is needed inside a room because
/// nothing else ever touches it concurrently.
async fn run_room(mut room: RoomCore, mut commands: mpsc::Receiver<RoomCommand>, clock: Arc<dyn Clock>) {
    let mut outbound: HashMap<String, mpsc::UnboundedSender<ServerEvent>> = HashMap::new();
    let mut ticker = tokio::time::interval(TICK_POLL_INTERVAL);
    let mut idle_since: Option<Instant> = None;
    let room_id = room.id.clone();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let updates = match room.tick(clock.now_ms()) {
                    Ok(updates) => updates,
                    Err(err) => {
                        warn!(room_id = %room_id, error = %err, "room invariant violated; disposing room and disconnecting clients");
                        room.dispose();
                        outbound.clear();
                        break;
                    }
                };
                for update in updates {
                    broadcast(&mut outbound, ServerEvent::Physics(update));
                }

                if room.is_empty() {
                    let since = *idle_since.get_or_insert_with(Instant::now);
                    if since.elapsed() > IDLE_DISPOSAL_TIMEOUT {
                        info!(room_id = %room_id, "disposing idle empty room");
                        room.dispose();
                        break;
                    }
                } else {
                    idle_since = None;
                }
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    info!(room_id = %room_id, "room command channel closed; shutting down actor");
                    room.dispose();
                    break;
                };
                handle_command(&mut room, &mut outbound, cmd);
                idle_since = None;
            }
        }
    }
}

fn handle_command(room: &mut RoomCore, outbound: &mut HashMap<String, mpsc::UnboundedSender<ServerEvent>>, cmd: RoomCommand) {
    match cmd {
        RoomCommand::Join { session_id, outbound: sender, reply } => {
            let result = room.on_join(&session_id).map(|()| (room.snapshot(), room.created_at));
            if result.is_ok() {
                outbound.insert(session_id, sender);
            }
            let _ = reply.send(result);
        }
        RoomCommand::Leave { session_id } => {
            room.on_leave(&session_id);
            outbound.remove(&session_id);
        }
        RoomCommand::Input { session_id, raw } => {
            let _ = room.enqueue_input(&session_id, &raw);
        }
        RoomCommand::SetControlMode { mode } => {
            room.set_control_mode(&mode);
        }
        RoomCommand::DebugUpdateState { session_id, delta } => {
            room.apply_debug_state_update(&session_id, &delta);
        }
    }
}


fn broadcast(outbound: &mut HashMap<String, mpsc::UnboundedSender<ServerEvent>>, event: ServerEvent) {
    outbound.retain(|_, sender| sender.send(event.clone()).is_ok());
}
