//! Reserved command keys.
//!
//! Keys below [`USER_BASE`] are owned by the sync layer. Gameplay defines its
//! own keys starting at [`USER_BASE`].

/// Session authentication. Consumed by the relay, never broadcast.
pub const AUTH: i32 = 1;

// Flow control
pub const GAME_BEGIN: i32 = 3;
pub const ROUND_BEGIN: i32 = 4;
pub const CONTROL_START: i32 = 7;
pub const GAME_EXIT: i32 = 8;
pub const ROUND_END: i32 = 9;
pub const GAME_END: i32 = 10;

/// First key free for gameplay commands.
pub const USER_BASE: i32 = 100;

/// True for keys the sync manager dispatches to its observers.
pub const fn is_flow_control(vkey: i32) -> bool {
    matches!(
        vkey,
        GAME_BEGIN | ROUND_BEGIN | CONTROL_START | GAME_EXIT | ROUND_END | GAME_END
    )
}

/// Human-readable key name for logs.
pub const fn name(vkey: i32) -> &'static str {
    match vkey {
        AUTH => "AUTH",
        GAME_BEGIN => "GAME_BEGIN",
        ROUND_BEGIN => "ROUND_BEGIN",
        CONTROL_START => "CONTROL_START",
        GAME_EXIT => "GAME_EXIT",
        ROUND_END => "ROUND_END",
        GAME_END => "GAME_END",
        _ => "USER",
    }
}
