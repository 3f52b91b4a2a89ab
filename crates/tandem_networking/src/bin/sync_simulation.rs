//! # Shared Object Simulation
//!
//! Three peers pass one object around over a delayed loopback session:
//! - A carries it in a circle and drops it
//! - B picks it up, C grabs it out of B's hands
//! - C disconnects while still holding it
//!
//! Usage: `sync_simulation [config.toml]`

use std::time::Instant;

use tandem_networking::{
    ColliderFlag, LoopbackHub, LoopbackLink, NetworkConditions, ObjectId, SyncPeer,
};
use tandem_shared::{Pose, Quaternion, TandemConfig, Vec3};

const OBJECT: ObjectId = 1;

type Peer = SyncPeer<LoopbackLink, ColliderFlag>;

struct Session {
    hub: LoopbackHub,
    peers: Vec<Peer>,
    dt: f32,
    frames: u64,
}

impl Session {
    fn new(config: &TandemConfig, conditions: NetworkConditions) -> Self {
        let hub = LoopbackHub::with_conditions(conditions, config.network.seed);
        let peers = (0..3)
            .map(|_| {
                let (link, inbound) = hub.connect();
                let mut peer = SyncPeer::new(link, inbound, config);
                peer.spawn_movable(OBJECT, Pose::IDENTITY, ColliderFlag::new());
                peer
            })
            .collect();
        Self {
            hub,
            peers,
            dt: 1.0 / config.network.tick_rate as f32,
            frames: 0,
        }
    }

    fn frame(&mut self) {
        self.hub.advance();
        for peer in &mut self.peers {
            peer.tick(self.dt);
        }
        self.frames += 1;
    }

    /// Runs `seconds` of frames, moving the object with `path` if `holder` holds it.
    fn carry(&mut self, holder: usize, seconds: f32, path: impl Fn(f32) -> Pose) {
        let frames = (seconds / self.dt).round() as u32;
        for frame in 0..frames {
            let t = frame as f32 * self.dt;
            if let Err(err) = self.peers[holder].move_held(OBJECT, path(t)) {
                println!("  move failed: {err}");
            }
            self.frame();
        }
    }

    fn idle(&mut self, seconds: f32) {
        let frames = (seconds / self.dt).round() as u32;
        for _ in 0..frames {
            self.frame();
        }
    }

    fn pose(&self, index: usize) -> Pose {
        self.peers[index]
            .movable(OBJECT)
            .map_or(Pose::IDENTITY, |movable| movable.lock().pose())
    }

    fn spread(&self, live: &[usize]) -> f32 {
        let mut worst = 0.0_f32;
        for &a in live {
            for &b in live {
                worst = worst.max(self.pose(a).position.distance(self.pose(b).position));
            }
        }
        worst
    }

    fn print_states(&self, title: &str, live: &[usize]) {
        println!("┌─ {title:<62}┐");
        for &index in live {
            let peer = &self.peers[index];
            if let Some(movable) = peer.movable(OBJECT) {
                let movable = movable.lock();
                let p = movable.pose().position;
                println!(
                    "│ Peer {}: {:<20} at ({:>6.2}, {:>6.2}, {:>6.2}) owner {:?}",
                    peer.id(),
                    movable.state().to_string(),
                    p.x,
                    p.y,
                    p.z,
                    self.hub.owner_of(OBJECT),
                );
            }
        }
        println!("│ Spread between peers: {:.6}", self.spread(live));
        println!("└──────────────────────────────────────────────────────────────────┘");
        println!();
    }
}

fn circle(radius: f32) -> impl Fn(f32) -> Pose {
    move |t| {
        let angle = t * std::f32::consts::TAU * 0.25;
        Pose::new(
            Vec3::new(radius * angle.cos(), 1.0, radius * angle.sin()),
            Quaternion::from_euler_degrees(Vec3::new(0.0, angle.to_degrees(), 0.0)),
        )
    }
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TANDEM - SHARED OBJECT SIMULATION                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let (config, conditions) = match std::env::args().nth(1) {
        Some(path) => match TandemConfig::load(&path) {
            Ok(config) => {
                let conditions = NetworkConditions::from_config(&config.network);
                (config, conditions)
            }
            Err(err) => {
                eprintln!("Cannot use {path}: {err}");
                std::process::exit(1);
            }
        },
        None => (TandemConfig::default(), NetworkConditions::AVERAGE),
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Peers:              3");
    println!("│ Tick Rate:          {} Hz", config.network.tick_rate);
    println!("│ Broadcast Rate:     {} Hz", config.sync.broadcast_rate_hz);
    println!("│ Smoothing Decay:    {}", config.sync.smoothing_decay);
    println!("│ Snap To Grid:       {}", config.sync.snap_enabled);
    println!("│ Latency:            {} ticks", conditions.latency_ticks);
    println!("│ Jitter:             {} ticks", conditions.jitter_ticks);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let start = Instant::now();
    let mut session = Session::new(&config, conditions);
    let all = [0, 1, 2];

    // 1. A carries and drops.
    if let Err(err) = session.peers[0].pickup(OBJECT) {
        println!("Peer A pickup failed: {err}");
    }
    session.carry(0, 2.0, circle(2.0));
    session.print_states("A HOLDING", &all);
    if let Err(err) = session.peers[0].drop_object(OBJECT) {
        println!("Peer A drop failed: {err}");
    }
    session.idle(0.5);
    session.print_states("A DROPPED", &all);

    // 2. B picks up, C steals.
    if let Err(err) = session.peers[1].pickup(OBJECT) {
        println!("Peer B pickup failed: {err}");
    }
    session.carry(1, 1.0, circle(3.0));
    if let Err(err) = session.peers[2].pickup(OBJECT) {
        println!("Peer C pickup failed: {err}");
    }
    session.carry(2, 1.0, circle(1.5));
    session.print_states("C TOOK IT FROM B", &all);

    // 3. C leaves mid-hold.
    session.peers[2].link().disconnect();
    session.idle(1.0);
    let live = [0, 1];
    session.print_states("C DISCONNECTED", &live);

    let elapsed = start.elapsed();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SIMULATION RESULTS                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    println!("┌─ TIMING ────────────────────────────────────────────────────────┐");
    println!("│ Frames:             {}", session.frames);
    println!("│ Real Time:          {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let hub = session.hub.stats();
    println!("┌─ NETWORK ───────────────────────────────────────────────────────┐");
    println!("│ Packets Sent:       {}", hub.packets_sent);
    println!("│ Delivered:          {}", hub.packets_delivered);
    println!("│ Delayed:            {}", hub.packets_delayed);
    println!("│ Dropped:            {}", hub.packets_dropped);
    println!("│ Rejected Publishes: {}", hub.rejected_publishes);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ PER PEER ──────────────────────────────────────────────────────┐");
    for peer in &session.peers {
        let broker = peer.broker().stats();
        if let Some(movable) = peer.movable(OBJECT) {
            let stats = *movable.lock().stats();
            println!(
                "│ Peer {}: pickups {} drops {} broadcasts {} applied {} stale {} conflicts {} settles {}",
                peer.id(),
                stats.pickups,
                stats.drops,
                stats.broadcasts,
                stats.snapshots_applied,
                stats.stale_discarded,
                stats.ownership_conflicts,
                stats.settles,
            );
        }
        println!(
            "│         fast calls {} slow calls {} failed {}",
            broker.fast_invocations, broker.slow_invocations, broker.failed_callbacks,
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let spread = session.spread(&live);
    if spread < 1e-3 {
        println!("✓ Remaining peers agree on the pose (spread {spread:.6})");
    } else {
        println!("✗ Remaining peers disagree on the pose (spread {spread:.6})");
    }
}
