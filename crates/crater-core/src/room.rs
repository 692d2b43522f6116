use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters used in room codes. Omits glyphs that read alike (I/1, O/0).
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Seeds handed out by the relay lie in `0..MAX_MATCH_SEED`.
pub const MAX_MATCH_SEED: u64 = 1_000_000;

/// A match needs exactly this many seated players.
pub const PLAYERS_PER_MATCH: usize = 2;

/// Current state of a relay room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Waiting,
    Playing,
    /// A result was reported; the room stays open until everyone leaves.
    Finished,
}

/// Generate a random room code such as `K7QX`.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Pick a match seed shared by both peers.
pub fn generate_seed<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.random_range(0..MAX_MATCH_SEED)
}

/// Returns true if `code` could have come from [`generate_room_code`].
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}
