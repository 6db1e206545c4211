//! Zobrist keys: 64-bit values that (almost uniquely) identify a position,
//! used by a transposition layer to recognise positions it has seen before.
//! A fixed-seed RNG fills one value per (square, color, piece kind) plus one
//! side-to-move value; a position's key is the XOR of the entries for its
//! occupied squares, with the side value folded in while Red is to move.

use crate::position::{piece_kind_idx, PieceKind};
use crate::square::Square;
use crate::{color_idx, Color};

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};

// Fixed seed so keys are reproducible across runs; changing it invalidates
// any externally stored keys.
const SEED: u64 = 18061995;

struct ZobristTable {
  piece_sq: [[[u64; 7]; 2]; 90],
  side_to_move: u64,
}

static ZOBRIST: Lazy<ZobristTable> = Lazy::new(|| {
  let mut rng = StdRng::seed_from_u64(SEED);
  let mut piece_sq = [[[0u64; 7]; 2]; 90];
  for square in piece_sq.iter_mut() {
    for color in square.iter_mut() {
      for entry in color.iter_mut() {
        *entry = rng.random();
      }
    }
  }
  ZobristTable { piece_sq, side_to_move: rng.random() }
});

/// Key contribution of a `kind` piece of `color` standing on `sq`.
pub fn piece_key(sq: Square, color: Color, kind: PieceKind) -> u64 {
  ZOBRIST.piece_sq[sq.index() as usize][color_idx(color)][piece_kind_idx(kind)]
}

/// Key contribution of the side to move.
pub fn side_key() -> u64 {
  ZOBRIST.side_to_move
}
