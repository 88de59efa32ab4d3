//! Lockstep orchestrator.
//!
//! The [`SyncManager`] owns the frame buffer, the pacer and (in networked
//! mode) the [`SyncClient`]. Each [`SyncManager::drive`] executes frames in
//! strictly increasing index order. Inside a frame, flow-control commands are
//! dispatched first, in stored order, then the whole frame goes to the frame
//! listener exactly once.
//!
//! # Frame-rate multiple
//!
//! Network frame `n` is buffered at local index `n * multiple`, and the ticks
//! `n * multiple + 1 ..= n * multiple + multiple - 1` between two network slots
//! are interpolation ticks that carry no commands. They execute as empty
//! frames. A network slot that is due but absent halts the session with
//! [`SyncError::MissingFrame`]; skipping it would desynchronize peers.
//!
//! # Round restarts
//!
//! The relay numbers frames from 1 again after a frame carrying
//! `ROUND_BEGIN`. Frames that arrive while such a frame is buffered but not
//! yet executed belong to the next round, so they are held back and buffered
//! only after the restart has cleared the old round. Delivery is assumed to
//! be in order across a round boundary.

use lockstep_protocol::{decode_server, vkey, Frame, FrameId, PlayerId, ServerMessage, VKey};

use crate::buffer::{FrameBuffer, Ingest};
use crate::client::SyncClient;
use crate::config::{PacerConfig, SyncParams};
use crate::error::SyncError;
use crate::events::{FrameListener, SyncObserver};
use crate::pacer::{FrameController, FramePacer};
use crate::state::GameState;
use crate::transport::Transport;

pub struct SyncManager {
    params: SyncParams,
    pacer_config: PacerConfig,
    player_id: PlayerId,

    client: Option<SyncClient>,
    pacer: Option<Box<dyn FramePacer>>,
    buffer: FrameBuffer,

    running: bool,
    state: GameState,
    /// Last executed local tick.
    current_frame: FrameId,
    /// Highest tick allowed to execute.
    locked_frame: FrameId,
    /// Bumped on every round restart so an in-flight drive stops early.
    round_epoch: u64,
    /// A buffered frame carries `ROUND_BEGIN` that has not executed yet.
    restart_pending: bool,
    /// Raw frames received after that frame, in arrival order.
    next_round: Vec<Frame>,

    frame_listener: Option<Box<dyn FrameListener>>,
    observers: Vec<Box<dyn SyncObserver>>,
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncManager {
    pub fn new() -> Self {
        Self::with_pacer_config(PacerConfig::default())
    }

    /// Manager whose default pacer uses `pacer_config`.
    pub fn with_pacer_config(pacer_config: PacerConfig) -> Self {
        Self {
            params: SyncParams::default(),
            pacer_config,
            player_id: 0,
            client: None,
            pacer: None,
            buffer: FrameBuffer::new(),
            running: false,
            state: GameState::None,
            current_frame: 0,
            locked_frame: 0,
            round_epoch: 0,
            restart_pending: false,
            next_round: Vec::new(),
            frame_listener: None,
            observers: Vec::new(),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Sets the single frame listener, replacing any previous one.
    pub fn set_frame_listener(&mut self, listener: impl FrameListener + 'static) {
        self.frame_listener = Some(Box::new(listener));
    }

    /// Appends an observer. Observers fire in registration order.
    pub fn add_observer(&mut self, observer: impl SyncObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts a session with the default [`FrameController`].
    ///
    /// Networked sessions require a `transport`; local sessions ignore it.
    pub fn start(
        &mut self,
        params: SyncParams,
        player_id: PlayerId,
        transport: Option<Box<dyn Transport>>,
    ) -> Result<(), SyncError> {
        let pacer = Box::new(FrameController::new(
            self.pacer_config,
            params.client_frame_rate_multiple,
        ));
        self.start_with_pacer(params, player_id, transport, pacer)
    }

    /// Starts a session with a caller-supplied pacer.
    pub fn start_with_pacer(
        &mut self,
        params: SyncParams,
        player_id: PlayerId,
        transport: Option<Box<dyn Transport>>,
        pacer: Box<dyn FramePacer>,
    ) -> Result<(), SyncError> {
        params.validate()?;

        let client = if params.use_local {
            if transport.is_some() {
                tracing::debug!(player = player_id, "local session ignores transport");
            }
            None
        } else {
            let transport = transport.ok_or(SyncError::MissingTransport)?;
            let mut client = SyncClient::new(transport);
            client.set_session_identity(params.session_id);
            client.set_auth_info(params.auth_id);
            client.connect();
            client.verify_auth();
            Some(client)
        };

        if let Some(mut previous) = self.client.take() {
            previous.close();
        }

        tracing::info!(
            player = player_id,
            session = params.session_id,
            local = params.use_local,
            multiple = params.client_frame_rate_multiple,
            "sync session started"
        );

        self.params = params;
        self.player_id = player_id;
        self.client = client;
        self.pacer = Some(pacer);
        self.locked_frame = self.start_ceiling();
        self.buffer.clear();
        self.restart_pending = false;
        self.next_round.clear();
        self.running = true;
        self.transition(GameState::Create);
        self.current_frame = 0;
        Ok(())
    }

    /// Ends the session from any state. Drops the client, the pacer, the
    /// listener and every observer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.running {
            tracing::info!(player = self.player_id, frame = self.current_frame, "sync session stopped");
        }

        self.transition(GameState::None);

        if let Some(mut client) = self.client.take() {
            client.close();
        }
        self.pacer = None;

        self.frame_listener = None;
        self.observers.clear();
        self.buffer.clear();
        self.restart_pending = false;
        self.next_round.clear();
        self.running = false;
    }

    /// Ceiling at session start and after every round restart.
    fn start_ceiling(&self) -> FrameId {
        if self.params.use_local {
            self.params.max_frame_id
        } else {
            self.params.client_frame_rate_multiple - 1
        }
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the simulation. A no-op when not running.
    pub fn drive(&mut self) -> Result<(), SyncError> {
        if !self.running {
            return Ok(());
        }

        if self.params.use_local {
            if self.locked_frame == 0 || self.current_frame < self.locked_frame {
                self.current_frame += 1;
                self.execute_at(self.current_frame)?;
            }
            return Ok(());
        }

        if let Some(client) = self.client.as_mut() {
            client.drive();
        }

        let speed = match self.pacer.as_mut() {
            Some(pacer) => pacer.advance(self.current_frame),
            None => 0,
        };

        let epoch = self.round_epoch;
        for _ in 0..speed {
            // A round restart invalidates the pacer's answer.
            if !self.running || self.round_epoch != epoch {
                break;
            }
            if self.current_frame < self.locked_frame {
                self.current_frame += 1;
                self.execute_at(self.current_frame)?;
            }
        }

        Ok(())
    }

    fn execute_at(&mut self, frame_id: FrameId) -> Result<(), SyncError> {
        let frame = match self.buffer.get(frame_id) {
            Some(frame) => frame.clone(),
            None if self.params.use_local || !self.is_network_slot(frame_id) => Frame::empty(frame_id),
            None => {
                tracing::error!(
                    player = self.player_id,
                    frame = frame_id,
                    "network frame missing, halting session"
                );
                self.running = false;
                return Err(SyncError::MissingFrame(frame_id));
            }
        };

        self.execute_frame(frame_id, &frame)
    }

    fn is_network_slot(&self, frame_id: FrameId) -> bool {
        frame_id % self.params.client_frame_rate_multiple == 0
    }

    fn execute_frame(&mut self, frame_id: FrameId, frame: &Frame) -> Result<(), SyncError> {
        let mut restarted = false;
        for cmd in frame.vkeys.iter().filter(|cmd| vkey::is_flow_control(cmd.vkey)) {
            match cmd.vkey {
                vkey::GAME_BEGIN => self.handle_game_begin(cmd.arg()),
                vkey::ROUND_BEGIN => {
                    self.handle_round_begin(cmd.arg());
                    restarted = true;
                }
                vkey::CONTROL_START => self.handle_control_start(cmd.arg()),
                vkey::ROUND_END => self.handle_round_end(cmd.arg()),
                vkey::GAME_END => self.handle_game_end(cmd.arg()),
                vkey::GAME_EXIT => self.handle_game_exit(cmd.origin_id),
                _ => {}
            }
        }

        if let Some(listener) = self.frame_listener.as_mut() {
            listener.on_frame(frame_id, frame);
        }

        if restarted {
            self.replay_next_round()?;
        }
        Ok(())
    }

    /// Buffers the frames held back while the restart was pending.
    fn replay_next_round(&mut self) -> Result<(), SyncError> {
        let staged = std::mem::take(&mut self.next_round);
        if staged.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            player = self.player_id,
            frames = staged.len(),
            "buffering frames held for the new round"
        );
        self.receive_frames(staged)
    }

    // ========================================================================
    // Flow control
    // ========================================================================

    fn transition(&mut self, next: GameState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(player = self.player_id, from = %self.state, to = %next, "game state");
        } else {
            tracing::warn!(
                player = self.player_id,
                from = %self.state,
                to = %next,
                "unexpected game state transition"
            );
        }
        self.state = next;
    }

    fn handle_game_begin(&mut self, arg: i32) {
        self.transition(GameState::GameBegin);
        for observer in &mut self.observers {
            observer.game_begin(arg);
        }
    }

    fn handle_round_begin(&mut self, arg: i32) {
        self.transition(GameState::RoundBegin);
        self.current_frame = 0;
        self.locked_frame = self.start_ceiling();
        self.buffer.clear();
        self.restart_pending = false;
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.reset();
        }
        self.round_epoch += 1;

        for observer in &mut self.observers {
            observer.round_begin(arg);
        }
    }

    fn handle_control_start(&mut self, arg: i32) {
        self.transition(GameState::ControlStart);
        for observer in &mut self.observers {
            observer.control_start(arg);
        }
    }

    fn handle_round_end(&mut self, arg: i32) {
        self.transition(GameState::RoundEnd);
        for observer in &mut self.observers {
            observer.round_end(arg);
        }
    }

    fn handle_game_end(&mut self, arg: i32) {
        self.transition(GameState::GameEnd);
        for observer in &mut self.observers {
            observer.game_end(arg);
        }
    }

    fn handle_game_exit(&mut self, player_id: PlayerId) {
        tracing::info!(player = player_id, "player exited");
        for observer in &mut self.observers {
            observer.game_exit(player_id);
        }
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Buffers a batch from the relay.
    ///
    /// Every frame is processed even if an earlier one is rejected; the first
    /// error is returned.
    pub fn on_receive(&mut self, message: ServerMessage) -> Result<(), SyncError> {
        self.receive_frames(message.frames)
    }

    fn receive_frames(&mut self, frames: Vec<Frame>) -> Result<(), SyncError> {
        let mut result = Ok(());
        for frame in frames {
            if let Err(e) = self.on_receive_server_frame(frame) {
                tracing::warn!(player = self.player_id, "rejected server frame: {e}");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Decodes and buffers a batch from the relay.
    pub fn on_receive_bytes(&mut self, data: &[u8]) -> Result<(), SyncError> {
        let message = decode_server(data)?;
        self.on_receive(message)
    }

    /// Handles one frame from the relay.
    ///
    /// Out-of-band frames (index `<= 0`) execute immediately. Others are
    /// rescaled to local ticks, buffered, and extend the ceiling to cover
    /// their interpolation ticks. A late, lower frame never lowers the
    /// ceiling. Frames arriving behind an unexecuted `ROUND_BEGIN` are held
    /// for the next round. Frames arriving while stopped are dropped.
    pub fn on_receive_server_frame(&mut self, mut frame: Frame) -> Result<(), SyncError> {
        if !self.running {
            tracing::debug!(frame = frame.frame_id, "dropping frame, not running");
            return Ok(());
        }

        if frame.is_out_of_band() {
            let frame_id = frame.frame_id;
            return self.execute_frame(frame_id, &frame);
        }

        if self.restart_pending {
            tracing::trace!(frame = frame.frame_id, "holding frame for next round");
            self.next_round.push(frame);
            return Ok(());
        }

        let restarts_round = frame.vkeys.iter().any(|cmd| cmd.vkey == vkey::ROUND_BEGIN);
        let multiple = self.params.client_frame_rate_multiple;
        frame.frame_id = frame.frame_id.saturating_mul(multiple);

        let frame_id = self.buffer.ingest(Ingest::Network(frame))?;
        self.restart_pending = restarts_round;
        self.locked_frame = self.locked_frame.max(frame_id.saturating_add(multiple - 1));
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.notify_arrived(frame_id);
        }

        tracing::trace!(frame = frame_id, ceiling = self.locked_frame, "buffered server frame");
        Ok(())
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Submits a command.
    ///
    /// Networked sessions forward it to the relay tagged with the current
    /// tick. Local sessions append it to the next local frame.
    pub fn send_command(&mut self, vkey: i32, arg: i32) -> Result<(), SyncError> {
        if !self.running {
            return Err(SyncError::NotRunning);
        }

        if self.params.use_local {
            let command = VKey::with_arg(vkey, arg, self.player_id);
            self.buffer.ingest(Ingest::Local {
                frame_id: self.current_frame + 1,
                command,
            })?;
        } else if let Some(client) = self.client.as_mut() {
            if !client.send(vkey, arg, self.current_frame as u32) {
                tracing::debug!(vkey = vkey::name(vkey), "command dropped, link down");
            }
        }

        Ok(())
    }

    pub fn send_game_begin(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::GAME_BEGIN, 0)
    }

    pub fn send_round_begin(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::ROUND_BEGIN, 0)
    }

    pub fn send_control_start(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::CONTROL_START, 0)
    }

    pub fn send_round_end(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::ROUND_END, 0)
    }

    pub fn send_game_end(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::GAME_END, 0)
    }

    pub fn send_game_exit(&mut self) -> Result<(), SyncError> {
        self.send_command(vkey::GAME_EXIT, 0)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn game_state(&self) -> GameState {
        self.state
    }

    pub fn current_frame(&self) -> FrameId {
        self.current_frame
    }

    pub fn locked_frame(&self) -> FrameId {
        self.locked_frame
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn params(&self) -> &SyncParams {
        &self.params
    }

    /// Buffered indices in ascending order.
    pub fn buffered_frames(&self) -> Vec<FrameId> {
        self.buffer.frame_ids()
    }

    /// The relay link, in networked sessions.
    pub fn client(&self) -> Option<&SyncClient> {
        self.client.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::LoopbackRelay;
    use lockstep_protocol::encode_server;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SESSION: u32 = 11;
    const AUTH_ID: i32 = 5150;
    const PLAYER: PlayerId = 3;

    type FrameLog = Rc<RefCell<Vec<(FrameId, Frame)>>>;

    #[derive(Debug, Clone, PartialEq)]
    enum Flow {
        GameBegin(i32),
        RoundBegin(i32),
        ControlStart(i32),
        RoundEnd(i32),
        GameEnd(i32),
        GameExit(PlayerId),
    }

    type FlowLog = Rc<RefCell<Vec<(&'static str, Flow)>>>;

    struct Recorder {
        tag: &'static str,
        log: FlowLog,
    }

    impl Recorder {
        fn push(&self, flow: Flow) {
            self.log.borrow_mut().push((self.tag, flow));
        }
    }

    impl SyncObserver for Recorder {
        fn game_begin(&mut self, arg: i32) {
            self.push(Flow::GameBegin(arg));
        }
        fn round_begin(&mut self, arg: i32) {
            self.push(Flow::RoundBegin(arg));
        }
        fn control_start(&mut self, arg: i32) {
            self.push(Flow::ControlStart(arg));
        }
        fn round_end(&mut self, arg: i32) {
            self.push(Flow::RoundEnd(arg));
        }
        fn game_end(&mut self, arg: i32) {
            self.push(Flow::GameEnd(arg));
        }
        fn game_exit(&mut self, player_id: PlayerId) {
            self.push(Flow::GameExit(player_id));
        }
    }

    /// Pacer that always allows one tick, trusting the manager's ceiling.
    struct Eager;

    impl FramePacer for Eager {
        fn advance(&mut self, _current: FrameId) -> u32 {
            1
        }
        fn notify_arrived(&mut self, _frame_id: FrameId) {}
        fn reset(&mut self) {}
    }

    fn record_frames(manager: &mut SyncManager) -> FrameLog {
        let log: FrameLog = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        manager.set_frame_listener(move |frame_id: FrameId, frame: &Frame| {
            sink.borrow_mut().push((frame_id, frame.clone()));
        });
        log
    }

    fn networked(multiple: i32) -> (SyncManager, LoopbackRelay, FrameLog) {
        let relay = LoopbackRelay::new(SESSION);
        let mut manager = SyncManager::new();
        let log = record_frames(&mut manager);
        manager
            .start(
                SyncParams::networked(SESSION, AUTH_ID, multiple),
                PLAYER,
                Some(Box::new(relay.connect(PLAYER))),
            )
            .unwrap();
        (manager, relay, log)
    }

    fn local() -> (SyncManager, FrameLog) {
        let mut manager = SyncManager::new();
        let log = record_frames(&mut manager);
        manager.start(SyncParams::local(0), PLAYER, None).unwrap();
        (manager, log)
    }

    /// Relay tick, delivery and drive in one step.
    fn step(manager: &mut SyncManager, relay: &LoopbackRelay) {
        manager.on_receive(relay.tick()).unwrap();
        manager.drive().unwrap();
    }

    fn ids(log: &FrameLog) -> Vec<FrameId> {
        log.borrow().iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn start_authenticates_with_relay() {
        let (manager, relay, _) = networked(1);
        assert_eq!(manager.game_state(), GameState::Create);
        assert!(manager.is_running());
        assert!(manager.client().is_some_and(|c| c.is_running()));
        assert_eq!(relay.authenticated_players(), vec![PLAYER]);
        assert_eq!(manager.locked_frame(), 0);
    }

    #[test]
    fn start_validates() {
        let mut manager = SyncManager::new();
        assert!(matches!(
            manager.start(SyncParams::networked(SESSION, AUTH_ID, 1), PLAYER, None),
            Err(SyncError::MissingTransport)
        ));
        assert!(matches!(
            manager.start(SyncParams::networked(SESSION, AUTH_ID, 0), PLAYER, None),
            Err(SyncError::InvalidParams(_))
        ));
        assert!(!manager.is_running());
        assert_eq!(manager.game_state(), GameState::None);
    }

    #[test]
    fn send_before_start_fails() {
        let mut manager = SyncManager::new();
        assert!(matches!(manager.send_command(vkey::USER_BASE, 1), Err(SyncError::NotRunning)));
        assert!(manager.drive().is_ok());
    }

    #[test]
    fn executes_in_index_order() {
        let (mut manager, _relay, log) = networked(1);
        for id in [3, 1, 2] {
            manager
                .on_receive_server_frame(Frame::new(id, vec![VKey::with_arg(vkey::USER_BASE, id, 1)]))
                .unwrap();
        }
        assert_eq!(manager.buffered_frames(), vec![1, 2, 3]);

        for _ in 0..4 {
            manager.drive().unwrap();
        }
        assert_eq!(ids(&log), vec![1, 2, 3]);
        let args: Vec<i32> = log.borrow().iter().map(|(_, f)| f.vkeys[0].arg()).collect();
        assert_eq!(args, vec![1, 2, 3]);
    }

    #[test]
    fn frame_rate_multiple_unlocks_four_ticks() {
        let (mut manager, _relay, log) = networked(4);
        assert_eq!(manager.locked_frame(), 3);

        // Interpolation ticks before the first network slot.
        for _ in 0..3 {
            manager.drive().unwrap();
        }
        assert_eq!(ids(&log), vec![1, 2, 3]);
        assert!(log.borrow().iter().all(|(_, f)| f.is_empty()));
        manager.drive().unwrap();
        assert_eq!(manager.current_frame(), 3);

        manager.on_receive_server_frame(Frame::empty(1)).unwrap();
        for _ in 0..4 {
            manager.drive().unwrap();
        }
        assert_eq!(manager.current_frame(), 7);
        log.borrow_mut().clear();

        manager
            .on_receive_server_frame(Frame::new(2, vec![VKey::with_arg(vkey::USER_BASE, 0, 1)]))
            .unwrap();
        assert!(manager.buffered_frames().contains(&8));
        assert_eq!(manager.locked_frame(), 11);

        for _ in 0..5 {
            manager.drive().unwrap();
        }
        assert_eq!(ids(&log), vec![8, 9, 10, 11]);
        assert_eq!(log.borrow()[0].1.vkeys.len(), 1);
        assert_eq!(manager.current_frame(), 11);
    }

    #[test]
    fn missing_network_slot_halts_session() {
        let relay = LoopbackRelay::new(SESSION);
        let mut manager = SyncManager::new();
        let log = record_frames(&mut manager);
        manager
            .start_with_pacer(
                SyncParams::networked(SESSION, AUTH_ID, 1),
                PLAYER,
                Some(Box::new(relay.connect(PLAYER))),
                Box::new(Eager),
            )
            .unwrap();

        manager.on_receive_server_frame(Frame::empty(2)).unwrap();
        assert!(matches!(manager.drive(), Err(SyncError::MissingFrame(1))));
        assert!(!manager.is_running());

        assert!(manager.drive().is_ok());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn duplicate_frame_is_rejected_and_batch_continues() {
        let (mut manager, _relay, log) = networked(1);
        let first = Frame::new(1, vec![VKey::with_arg(vkey::USER_BASE, 1, 1)]);
        manager.on_receive_server_frame(first.clone()).unwrap();

        let batch = ServerMessage {
            frames: vec![
                Frame::new(1, vec![VKey::with_arg(vkey::USER_BASE, 99, 2)]),
                Frame::empty(2),
            ],
        };
        assert!(matches!(manager.on_receive(batch), Err(SyncError::DuplicateFrame(1))));
        assert_eq!(manager.buffered_frames(), vec![1, 2]);

        manager.drive().unwrap();
        assert_eq!(log.borrow()[0], (1, first));
    }

    #[test]
    fn out_of_band_frame_executes_immediately() {
        let (mut manager, _relay, log) = networked(1);
        let flows: FlowLog = Rc::new(RefCell::new(Vec::new()));
        manager.add_observer(Recorder { tag: "a", log: flows.clone() });

        let exit = Frame::new(0, vec![VKey::with_arg(vkey::GAME_EXIT, 0, 9)]);
        manager.on_receive_server_frame(exit.clone()).unwrap();

        assert_eq!(*flows.borrow(), vec![("a", Flow::GameExit(9))]);
        assert_eq!(*log.borrow(), vec![(0, exit)]);
        assert!(manager.buffered_frames().is_empty());
        assert_eq!(manager.current_frame(), 0);
    }

    #[test]
    fn flow_commands_drive_state_machine() {
        let (mut manager, relay, log) = networked(1);
        let flows: FlowLog = Rc::new(RefCell::new(Vec::new()));
        manager.add_observer(Recorder { tag: "first", log: flows.clone() });
        manager.add_observer(Recorder { tag: "second", log: flows.clone() });

        manager.send_game_begin().unwrap();
        step(&mut manager, &relay);
        assert_eq!(manager.game_state(), GameState::GameBegin);

        manager.send_round_begin().unwrap();
        step(&mut manager, &relay);
        assert_eq!(manager.game_state(), GameState::RoundBegin);
        assert_eq!(manager.current_frame(), 0);

        manager.send_control_start().unwrap();
        step(&mut manager, &relay);
        assert_eq!(manager.game_state(), GameState::ControlStart);
        assert_eq!(manager.current_frame(), 1);

        manager.send_round_end().unwrap();
        step(&mut manager, &relay);
        manager.send_game_end().unwrap();
        step(&mut manager, &relay);
        assert_eq!(manager.game_state(), GameState::GameEnd);

        let expected = [
            Flow::GameBegin(0),
            Flow::RoundBegin(0),
            Flow::ControlStart(0),
            Flow::RoundEnd(0),
            Flow::GameEnd(0),
        ];
        let flows = flows.borrow();
        assert_eq!(flows.len(), expected.len() * 2);
        for (i, flow) in expected.iter().enumerate() {
            assert_eq!(flows[2 * i], ("first", flow.clone()));
            assert_eq!(flows[2 * i + 1], ("second", flow.clone()));
        }

        // Listener saw every frame, flow commands included.
        assert_eq!(ids(&log), vec![1, 2, 1, 2, 3]);
    }

    #[test]
    fn round_begin_resets_buffer_and_ceiling() {
        let (mut manager, _relay, log) = networked(1);
        manager.on_receive_server_frame(Frame::empty(1)).unwrap();
        manager.drive().unwrap();
        manager
            .on_receive_server_frame(Frame::new(2, vec![VKey::with_arg(vkey::ROUND_BEGIN, 0, 1)]))
            .unwrap();
        assert_eq!(manager.locked_frame(), 2);
        assert_eq!(manager.buffered_frames(), vec![1, 2]);

        manager.drive().unwrap();
        assert_eq!(manager.game_state(), GameState::RoundBegin);
        assert_eq!(manager.current_frame(), 0);
        assert_eq!(manager.locked_frame(), 0);
        assert!(manager.buffered_frames().is_empty());

        manager.drive().unwrap();
        assert_eq!(ids(&log), vec![1, 2]);
    }

    #[test]
    fn next_round_frames_arriving_early_are_held() {
        let (mut manager, relay, log) = networked(1);
        manager.send_game_begin().unwrap();
        step(&mut manager, &relay);

        // Restart and the first frame of the new round land in one batch.
        manager.send_round_begin().unwrap();
        let mut batch = relay.tick();
        manager.send_command(vkey::USER_BASE, 7).unwrap();
        batch.frames.extend(relay.tick().frames);
        assert_eq!(batch.frames.iter().map(|f| f.frame_id).collect::<Vec<_>>(), vec![2, 1]);

        manager.on_receive(batch).unwrap();
        assert_eq!(manager.buffered_frames(), vec![1, 2]);

        manager.drive().unwrap();
        assert_eq!(manager.game_state(), GameState::RoundBegin);
        assert_eq!(manager.current_frame(), 0);
        assert_eq!(manager.buffered_frames(), vec![1]);
        assert_eq!(manager.locked_frame(), 1);

        manager.drive().unwrap();
        for _ in 0..3 {
            step(&mut manager, &relay);
        }

        assert!(manager.is_running());
        assert_eq!(manager.current_frame(), 4);
        assert_eq!(ids(&log), vec![1, 2, 1, 2, 3, 4]);
        assert_eq!(log.borrow()[2].1.vkeys, vec![VKey::with_arg(vkey::USER_BASE, 7, PLAYER)]);
    }

    #[test]
    fn held_frames_carry_over_a_second_restart() {
        let (mut manager, _relay, log) = networked(1);
        let restart = |id| Frame::new(id, vec![VKey::with_arg(vkey::ROUND_BEGIN, 0, 1)]);
        manager
            .on_receive(ServerMessage {
                frames: vec![restart(1), restart(1), Frame::empty(1)],
            })
            .unwrap();
        assert_eq!(manager.buffered_frames(), vec![1]);

        manager.drive().unwrap();
        assert_eq!(manager.buffered_frames(), vec![1]);
        manager.drive().unwrap();
        assert_eq!(manager.buffered_frames(), vec![1]);
        manager.drive().unwrap();

        assert_eq!(ids(&log), vec![1, 1, 1]);
        assert!(log.borrow()[2].1.is_empty());
        assert_eq!(manager.current_frame(), 1);
    }

    #[test]
    fn gameplay_keys_skip_flow_dispatch() {
        let (mut manager, _relay, log) = networked(1);
        let flows: FlowLog = Rc::new(RefCell::new(Vec::new()));
        manager.add_observer(Recorder { tag: "a", log: flows.clone() });

        manager
            .on_receive_server_frame(Frame::new(
                1,
                vec![VKey::with_arg(vkey::AUTH, 1, 1), VKey::with_arg(vkey::USER_BASE, 2, 1)],
            ))
            .unwrap();
        manager.drive().unwrap();

        assert!(flows.borrow().is_empty());
        assert_eq!(manager.game_state(), GameState::Create);
        assert_eq!(log.borrow()[0].1.vkeys.len(), 2);
    }

    #[test]
    fn local_mode_round_restart() {
        let script: [&[i32]; 6] = [
            &[vkey::GAME_BEGIN],
            &[vkey::USER_BASE],
            &[vkey::ROUND_BEGIN, vkey::USER_BASE + 1],
            &[vkey::USER_BASE + 2],
            &[vkey::CONTROL_START],
            &[vkey::USER_BASE + 3],
        ];

        let mut local = SyncManager::new();
        let local_log = record_frames(&mut local);
        local.start(SyncParams::local(10), PLAYER, None).unwrap();

        let (mut net, relay, net_log) = networked(1);

        for (tick, keys) in script.iter().enumerate() {
            for &key in *keys {
                local.send_command(key, tick as i32).unwrap();
                net.send_command(key, tick as i32).unwrap();
            }
            local.drive().unwrap();
            step(&mut net, &relay);

            if tick == 2 {
                assert_eq!(local.game_state(), GameState::RoundBegin);
                assert_eq!(local.current_frame(), 0);
                assert_eq!(local.locked_frame(), 10);
                assert!(local.buffered_frames().is_empty());
                assert_eq!(net.current_frame(), 0);
                assert_eq!(net.locked_frame(), 0);
            }
        }

        assert_eq!(ids(&local_log), vec![1, 2, 3, 1, 2, 3]);
        assert_eq!(*local_log.borrow(), *net_log.borrow());
        assert_eq!(local.game_state(), GameState::ControlStart);
        assert_eq!(net.game_state(), GameState::ControlStart);
        assert_eq!(local.locked_frame(), 10);
    }

    #[test]
    fn local_mode_matches_networked() {
        let script: [&[(i32, i32)]; 4] = [
            &[(vkey::USER_BASE, 1), (vkey::USER_BASE + 1, 2)],
            &[],
            &[(vkey::USER_BASE + 2, 3)],
            &[(vkey::USER_BASE, 4)],
        ];

        let (mut local, local_log) = local();
        for tick in script {
            for &(key, arg) in tick {
                local.send_command(key, arg).unwrap();
            }
            local.drive().unwrap();
        }

        let (mut net, relay, net_log) = networked(1);
        for tick in script {
            for &(key, arg) in tick {
                net.send_command(key, arg).unwrap();
            }
            step(&mut net, &relay);
        }

        assert_eq!(ids(&local_log), vec![1, 2, 3, 4]);
        assert_eq!(*local_log.borrow(), *net_log.borrow());
        assert_eq!(local_log.borrow()[0].1.vkeys[1], VKey::with_arg(vkey::USER_BASE + 1, 2, PLAYER));
    }

    #[test]
    fn local_mode_respects_max_frame() {
        let mut manager = SyncManager::new();
        let log = record_frames(&mut manager);
        manager.start(SyncParams::local(2), PLAYER, None).unwrap();
        assert!(manager.client().is_none());

        for _ in 0..4 {
            manager.drive().unwrap();
        }
        assert_eq!(ids(&log), vec![1, 2]);
        assert_eq!(manager.current_frame(), 2);
    }

    #[test]
    fn stop_from_any_state_silences_drive() {
        let (mut manager, relay, log) = networked(1);
        let flows: FlowLog = Rc::new(RefCell::new(Vec::new()));
        manager.add_observer(Recorder { tag: "a", log: flows.clone() });

        manager.send_game_begin().unwrap();
        step(&mut manager, &relay);
        manager.send_command(vkey::USER_BASE, 1).unwrap();
        manager.on_receive(relay.tick()).unwrap();

        let frames_before = log.borrow().len();
        let flows_before = flows.borrow().len();

        manager.stop();
        assert_eq!(manager.game_state(), GameState::None);
        assert!(!manager.is_running());
        assert!(manager.buffered_frames().is_empty());
        assert!(manager.client().is_none());

        assert!(manager.drive().is_ok());
        assert!(manager.on_receive(relay.tick()).is_ok());
        assert!(matches!(manager.send_command(vkey::USER_BASE, 1), Err(SyncError::NotRunning)));
        assert_eq!(log.borrow().len(), frames_before);
        assert_eq!(flows.borrow().len(), flows_before);

        manager.stop();
        assert_eq!(manager.game_state(), GameState::None);
    }

    #[test]
    fn stop_before_start_is_harmless() {
        let mut manager = SyncManager::new();
        manager.stop();
        assert_eq!(manager.game_state(), GameState::None);
        assert!(manager.drive().is_ok());
    }

    #[test]
    fn reconnects_after_connectivity_returns() {
        let (mut manager, relay, _log) = networked(1);

        relay.set_available(false);
        manager.send_command(vkey::USER_BASE, 1).unwrap();
        assert!(manager.client().is_some_and(|c| c.is_reconnect_pending()));

        manager.drive().unwrap();
        assert!(manager.client().is_some_and(|c| c.is_reconnect_pending()));

        relay.set_available(true);
        manager.drive().unwrap();
        assert!(manager.client().is_some_and(|c| c.is_running() && !c.is_reconnect_pending()));

        manager.send_command(vkey::USER_BASE, 2).unwrap();
        assert_eq!(relay.pending_commands(), 1);
    }

    #[test]
    fn receives_encoded_batches() {
        let (mut manager, _relay, _log) = networked(2);
        let bytes = encode_server(&ServerMessage::single(Frame::empty(1))).unwrap();
        manager.on_receive_bytes(&bytes).unwrap();
        assert_eq!(manager.buffered_frames(), vec![2]);
        assert_eq!(manager.locked_frame(), 3);

        assert!(matches!(manager.on_receive_bytes(&[0xff]), Err(SyncError::Codec(_))));
    }
}
