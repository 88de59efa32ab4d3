//! Lockstep Headless - Scripted Match Runner
//!
//! Plays one scripted match through the loopback relay with two peers, then
//! replays a single player's script through both the networked and the local
//! path. Exits with an error if any two runs that should agree end with
//! different state digests.
//!
//! Usage: `lockstep-headless [sync.toml]`

mod arena;

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, ensure, Context};
use lockstep_protocol::{encode_server, Frame, FrameId, PlayerId};
use lockstep_sync::{GameState, LoopbackRelay, SyncManager, SyncObserver, SyncParams};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arena::Arena;

/// Ticks carrying scripted input.
const SCRIPT_TICKS: u32 = 40;
/// Empty ticks after the script so trailing frames drain.
const SETTLE_TICKS: u32 = 4;

/// Logs flow-control events for one peer.
struct MatchLog {
    player_id: PlayerId,
}

impl SyncObserver for MatchLog {
    fn game_begin(&mut self, _arg: i32) {
        tracing::info!(player = self.player_id, "game begin");
    }

    fn round_begin(&mut self, _arg: i32) {
        tracing::info!(player = self.player_id, "round begin");
    }

    fn control_start(&mut self, _arg: i32) {
        tracing::debug!(player = self.player_id, "control start");
    }

    fn round_end(&mut self, _arg: i32) {
        tracing::info!(player = self.player_id, "round end");
    }

    fn game_end(&mut self, _arg: i32) {
        tracing::info!(player = self.player_id, "game end");
    }

    fn game_exit(&mut self, player_id: PlayerId) {
        tracing::info!(player = self.player_id, exited = player_id, "player left");
    }
}

struct Peer {
    player_id: PlayerId,
    manager: SyncManager,
    arena: Rc<RefCell<Arena>>,
}

impl Peer {
    fn new(player_id: PlayerId) -> Self {
        let arena = Rc::new(RefCell::new(Arena::new()));
        let mut manager = SyncManager::new();

        let sink = arena.clone();
        manager.set_frame_listener(move |_frame_id: FrameId, frame: &Frame| {
            sink.borrow_mut().apply(frame);
        });
        manager.add_observer(MatchLog { player_id });

        Self {
            player_id,
            manager,
            arena,
        }
    }

    fn finish(mut self) -> anyhow::Result<u64> {
        ensure!(
            self.manager.game_state() == GameState::GameEnd,
            "player {} finished in state {}",
            self.player_id,
            self.manager.game_state()
        );

        let digest = self.arena.borrow().digest()?;
        tracing::info!(
            player = self.player_id,
            frames = self.arena.borrow().tick,
            digest = %format!("{digest:016x}"),
            "peer finished"
        );
        self.manager.stop();
        Ok(digest)
    }
}

/// Submits one tick of scripted input. The host also drives the match flow.
fn submit(manager: &mut SyncManager, player_id: PlayerId, host: bool, tick: u32) -> anyhow::Result<()> {
    if host {
        match tick {
            0 => manager.send_game_begin()?,
            1 => manager.send_round_begin()?,
            2 => manager.send_control_start()?,
            t if t == SCRIPT_TICKS - 2 => manager.send_round_end()?,
            t if t == SCRIPT_TICKS - 1 => {
                manager.send_game_end()?;
                manager.send_game_exit()?;
            }
            _ => {}
        }
    }

    if (3..SCRIPT_TICKS - 2).contains(&tick) {
        if tick % 4 == 0 {
            let direction = if player_id % 2 == 1 { 1 } else { -1 };
            manager.send_command(arena::TURN, 300 * direction)?;
        }
        manager.send_command(arena::MOVE, 250 + (tick % 5) as i32 * 50)?;
    }

    Ok(())
}

/// Runs the script for `players` through one loopback relay. Returns one
/// digest per player.
fn run_networked(params: &SyncParams, players: &[PlayerId]) -> anyhow::Result<Vec<u64>> {
    let Some(&host) = players.first() else {
        bail!("a networked match needs at least one player");
    };

    let relay = LoopbackRelay::new(params.session_id);
    let mut peers = Vec::with_capacity(players.len());
    for &player_id in players {
        let mut peer = Peer::new(player_id);
        peer.manager
            .start(params.clone(), player_id, Some(Box::new(relay.connect(player_id))))
            .with_context(|| format!("starting player {player_id}"))?;
        peers.push(peer);
    }

    for tick in 0..SCRIPT_TICKS + SETTLE_TICKS {
        for peer in &mut peers {
            submit(&mut peer.manager, peer.player_id, peer.player_id == host, tick)?;
        }

        let bytes = encode_server(&relay.tick())?;
        for peer in &mut peers {
            peer.manager.on_receive_bytes(&bytes)?;
            // One drive per local tick keeps the backlog empty.
            for _ in 0..params.client_frame_rate_multiple {
                peer.manager.drive()?;
            }
        }
    }

    peers.into_iter().map(Peer::finish).collect()
}

/// Runs one player's script without a relay.
fn run_local(params: &SyncParams, player_id: PlayerId) -> anyhow::Result<u64> {
    let params = SyncParams {
        use_local: true,
        max_frame_id: 0,
        ..params.clone()
    };

    let mut peer = Peer::new(player_id);
    peer.manager.start(params, player_id, None)?;

    for tick in 0..SCRIPT_TICKS + SETTLE_TICKS {
        submit(&mut peer.manager, player_id, true, tick)?;
        peer.manager.drive()?;
    }

    peer.finish()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("lockstep=debug".parse()?))
        .init();

    let params = match std::env::args().nth(1) {
        Some(path) => SyncParams::from_toml_file(&path).with_context(|| format!("loading {path}"))?,
        None => SyncParams::networked(1, 1000, 2),
    };
    params.validate()?;

    tracing::info!(
        session = params.session_id,
        multiple = params.client_frame_rate_multiple,
        "Starting lockstep headless runner"
    );

    let digests = run_networked(&params, &[1, 2])?;
    ensure!(
        digests.windows(2).all(|pair| pair[0] == pair[1]),
        "peers desynchronized: {digests:x?}"
    );
    println!("networked match: {:016x}", digests[0]);

    let single_tick = SyncParams {
        client_frame_rate_multiple: 1,
        ..params.clone()
    };
    let networked = run_networked(&single_tick, &[1])?;
    let local = run_local(&single_tick, 1)?;
    ensure!(
        networked == [local],
        "local path diverged: networked {:016x}, local {local:016x}",
        networked[0]
    );
    println!("local parity:    {local:016x}");

    Ok(())
}
