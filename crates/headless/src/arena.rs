//! Toy simulation fed by executed frames.
//!
//! Each player steers one avatar on the XZ plane. All state is fixed-point,
//! so every peer that executes the same frames ends with the same digest.

use lockstep_math::{Fix64, Quaternion, Vector3};
use lockstep_protocol::{vkey, Frame, PlayerId};
use serde::Serialize;

/// Walk along the current heading. Argument: distance in millimeters.
pub const MOVE: i32 = vkey::USER_BASE;

/// Yaw about +Y. Argument: angle in milliradians.
pub const TURN: i32 = vkey::USER_BASE + 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Avatar {
    pub player_id: PlayerId,
    pub position: Vector3,
    pub heading: Quaternion,
}

impl Avatar {
    fn spawn(player_id: PlayerId) -> Self {
        Self {
            player_id,
            position: Vector3::from_ints(player_id as i32 * 2, 0, 0),
            heading: Quaternion::NO_ROTATION,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Arena {
    /// Frames applied so far.
    pub tick: u32,
    /// Sorted by player id.
    pub avatars: Vec<Avatar>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, frame: &Frame) {
        self.tick += 1;

        for cmd in &frame.vkeys {
            match cmd.vkey {
                MOVE => {
                    let avatar = self.avatar_mut(cmd.origin_id);
                    let distance = Fix64::from_ratio(cmd.arg(), 1000);
                    avatar.position += avatar.heading * Vector3::FORWARD * distance;
                }
                TURN => {
                    let avatar = self.avatar_mut(cmd.origin_id);
                    let yaw = Quaternion::angle_axis(Fix64::from_ratio(cmd.arg(), 1000), Vector3::UP);
                    avatar.heading = (yaw * avatar.heading).normalized();
                }
                _ => {}
            }
        }
    }

    /// Spawns on first use so every peer creates avatars at the same frame.
    fn avatar_mut(&mut self, player_id: PlayerId) -> &mut Avatar {
        let index = match self.avatars.binary_search_by_key(&player_id, |a| a.player_id) {
            Ok(index) => index,
            Err(index) => {
                self.avatars.insert(index, Avatar::spawn(player_id));
                index
            }
        };
        &mut self.avatars[index]
    }

    pub fn avatar(&self, player_id: PlayerId) -> Option<&Avatar> {
        self.avatars.iter().find(|a| a.player_id == player_id)
    }

    /// FNV-1a over the bincode encoding of the whole arena.
    pub fn digest(&self) -> anyhow::Result<u64> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        Ok(bytes.iter().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x0000_0100_0000_01b3)
        }))
    }
}
