//! Attack generation for the seven piece kinds, built once at first use.
//!
//! Sliders (chariot, cannon) and the horse are occupancy-sensitive: each
//! square stores its relevant-occupancy mask and a dense attack array
//! addressed by gathering the masked occupancy bits into an index
//! (bit-extraction lookup). Leapers with static geometry (pawn, advisor,
//! king) are plain per-square tables; the elephant's eye and the horse's leg
//! occupancy are part of the table index.

use crate::bitboard::Bitboard;
use crate::square::{Square, FILE_COUNT, RANK_COUNT};
use crate::{color_idx, Color};

use once_cell::sync::Lazy;

const ORTHO_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAG_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

// Horse moves as (d_rank, d_file, leg_d_rank, leg_d_file): the leg is the
// orthogonal square one step from the horse toward the target.
const HORSE_MOVES: [(i8, i8, i8, i8); 8] = [
  (2, 1, 1, 0), (2, -1, 1, 0), (-2, 1, -1, 0), (-2, -1, -1, 0),
  (1, 2, 0, 1), (-1, 2, 0, 1), (1, -2, 0, -1), (-1, -2, 0, -1),
];

// Elephant moves as (d_rank, d_file, eye_d_rank, eye_d_file): the eye is the
// diagonal square midway to the target.
const ELEPHANT_MOVES: [(i8, i8, i8, i8); 4] = [
  (2, 2, 1, 1), (2, -2, 1, -1), (-2, 2, -1, 1), (-2, -2, -1, -1),
];

/// Gather the bits of `value` selected by `mask` into a dense low-bit index
/// (software PEXT). Bit i of the result is the i-th lowest mask bit of `value`.
fn extract(value: u64, mut mask: u64) -> u64 {
  let mut out = 0u64;
  let mut bit = 0;
  while mask != 0 {
    let lsb = mask & mask.wrapping_neg();
    if value & lsb != 0 {
      out |= 1 << bit;
    }
    mask ^= lsb;
    bit += 1;
  }
  out
}

/// Dense index of `occ` restricted to `mask`: lo-lane mask bits first, then
/// hi-lane mask bits. Must agree with the subset enumeration order below.
fn occupancy_index(occ: Bitboard, mask: Bitboard) -> usize {
  let lo_bits = mask.lo.count_ones();
  (extract(occ.lo, mask.lo) | extract(occ.hi, mask.hi) << lo_bits) as usize
}

/// The `index`-th subset of `mask`, scattering index bits over the mask bits
/// in ascending square order (the inverse of `occupancy_index`).
fn occupancy_subset(mask: Bitboard, index: usize) -> Bitboard {
  let mut occ = Bitboard::empty();
  let mut rest = mask;
  let mut bit = 0;
  while let Some(s) = rest.pop_lsb() {
    if index & (1 << bit) != 0 {
      occ.set(Square::from_index(s).unwrap());
    }
    bit += 1;
  }
  occ
}

/// One square's occupancy-indexed attack tables. Chariot and cannon scan the
/// same rank/file squares, so they share a mask and an index; only the stored
/// attack sets differ.
struct SliderEntry {
  mask: Bitboard,
  rook: Vec<Bitboard>,
  cannon: Vec<Bitboard>,
}

/// One square's leg- or eye-indexed attack table (horse, elephant).
struct MaskedEntry {
  mask: Bitboard,
  attacks: Vec<Bitboard>,
}

/// Relevant occupancy for rank/file sliders on `sq`: the squares of its rank
/// and file, excluding `sq` itself and the outermost square of each ray (no
/// ray continues past the edge, so the edge square never changes the result).
fn slider_mask(sq: Square) -> Bitboard {
  let mut mask = Bitboard::empty();
  for f in 1..FILE_COUNT - 1 {
    if f != sq.file() {
      mask.set(Square::from_file_rank(f, sq.rank()).unwrap());
    }
  }
  for r in 1..RANK_COUNT - 1 {
    if r != sq.rank() {
      mask.set(Square::from_file_rank(sq.file(), r).unwrap());
    }
  }
  mask
}

/// Chariot attacks from `sq`: outward in four orthogonal directions, stopping
/// at and including the first occupied square.
fn gen_rook_attacks(sq: Square, occ: Bitboard) -> Bitboard {
  let mut attacks = Bitboard::empty();
  for (dr, df) in ORTHO_DIRS {
    let mut step = 1;
    while let Some(to) = sq.offset(dr * step, df * step) {
      attacks.set(to);
      if occ.test(to) {
        break;
      }
      step += 1;
    }
  }
  attacks
}

/// Cannon attacks from `sq`: the quiet set (empty squares strictly before the
/// first blocker, where the cannon slides like a chariot) plus the capture set
/// (the first occupied square strictly beyond that screen, if any). Squares
/// between screen and target are reachable by neither move nor capture.
fn gen_cannon_attacks(sq: Square, occ: Bitboard) -> Bitboard {
  let mut attacks = Bitboard::empty();
  for (dr, df) in ORTHO_DIRS {
    let mut step = 1;
    let mut screened = false;
    while let Some(to) = sq.offset(dr * step, df * step) {
      if !screened {
        if occ.test(to) {
          screened = true;
        }
        else {
          attacks.set(to);
        }
      }
      else if occ.test(to) {
        attacks.set(to);
        break;
      }
      step += 1;
    }
  }
  attacks
}

/// The four orthogonal neighbours of `sq` that are on the board (horse legs).
fn horse_leg_mask(sq: Square) -> Bitboard {
  let mut mask = Bitboard::empty();
  for (dr, df) in ORTHO_DIRS {
    if let Some(leg) = sq.offset(dr, df) {
      mask.set(leg);
    }
  }
  mask
}

/// The four diagonal neighbours of `sq` that are on the board
/// (elephant eyes, and the blockers of inbound horse jumps).
fn diagonal_mask(sq: Square) -> Bitboard {
  let mut mask = Bitboard::empty();
  for (dr, df) in DIAG_DIRS {
    if let Some(eye) = sq.offset(dr, df) {
      mask.set(eye);
    }
  }
  mask
}

/// Horse attacks from `sq`: each of the eight targets is reachable only while
/// its leg square is empty.
fn gen_horse_attacks(sq: Square, occ: Bitboard) -> Bitboard {
  let mut attacks = Bitboard::empty();
  for (dr, df, leg_dr, leg_df) in HORSE_MOVES {
    if let Some(to) = sq.offset(dr, df) {
      // A target on the board always has its leg on the board.
      let leg = sq.offset(leg_dr, leg_df).unwrap();
      if !occ.test(leg) {
        attacks.set(to);
      }
    }
  }
  attacks
}

/// Squares from which a horse would attack `sq`. Horse jumps are not
/// symmetric: the inbound jump from `sq + (dr, df)` is blocked by the
/// *diagonal* neighbour of `sq` in that quadrant, not by the leg the forward
/// table checks, so the reverse probe gets its own table.
fn gen_horse_attackers(sq: Square, occ: Bitboard) -> Bitboard {
  let mut attackers = Bitboard::empty();
  for (dr, df, _, _) in HORSE_MOVES {
    if let Some(from) = sq.offset(dr, df) {
      let eye = sq.offset(dr.signum(), df.signum()).unwrap();
      if !occ.test(eye) {
        attackers.set(from);
      }
    }
  }
  attackers
}

/// Elephant attacks from `sq`: the four two-step diagonals, each requiring an
/// empty eye and a target on the same side of the river as `sq`.
fn gen_elephant_attacks(sq: Square, occ: Bitboard) -> Bitboard {
  let mut attacks = Bitboard::empty();
  let own_half = sq.rank() <= 4;
  for (dr, df, eye_dr, eye_df) in ELEPHANT_MOVES {
    if let Some(to) = sq.offset(dr, df) {
      if (to.rank() <= 4) != own_half {
        continue;
      }
      let eye = sq.offset(eye_dr, eye_df).unwrap();
      if !occ.test(eye) {
        attacks.set(to);
      }
    }
  }
  attacks
}

/// Advisor attacks from `sq`: one diagonal step, confined to the palace.
fn gen_advisor_attacks(sq: Square) -> Bitboard {
  let mut attacks = Bitboard::empty();
  for (dr, df) in DIAG_DIRS {
    if let Some(to) = sq.offset(dr, df) {
      if to.in_palace() {
        attacks.set(to);
      }
    }
  }
  attacks
}

/// King attacks from `sq`: one orthogonal step, confined to the palace.
/// The flying-general rule is enforced by the attack query and the legality
/// filter, not here.
fn gen_king_attacks(sq: Square) -> Bitboard {
  let mut attacks = Bitboard::empty();
  for (dr, df) in ORTHO_DIRS {
    if let Some(to) = sq.offset(dr, df) {
      if to.in_palace() {
        attacks.set(to);
      }
    }
  }
  attacks
}

/// Pawn attacks from `sq` for `color`: one step forward, plus one step
/// sideways once the pawn has crossed the river.
fn gen_pawn_attacks(sq: Square, color: Color) -> Bitboard {
  let mut attacks = Bitboard::empty();
  let forward = match color {
    Color::Red => 1,
    Color::Black => -1,
  };
  if let Some(to) = sq.offset(forward, 0) {
    attacks.set(to);
  }
  if sq.crossed_river(color) {
    for df in [-1, 1] {
      if let Some(to) = sq.offset(0, df) {
        attacks.set(to);
      }
    }
  }
  attacks
}

fn build_masked_table(
  mask_of: fn(Square) -> Bitboard,
  gen: fn(Square, Bitboard) -> Bitboard,
) -> Vec<MaskedEntry> {
  let mut table = Vec::with_capacity(90);
  for s in 0..90u8 {
    let sq = Square::from_index(s).unwrap();
    let mask = mask_of(sq);
    let subsets = 1usize << mask.count();
    let mut attacks = vec![Bitboard::empty(); subsets];
    for (i, entry) in attacks.iter_mut().enumerate() {
      *entry = gen(sq, occupancy_subset(mask, i));
    }
    table.push(MaskedEntry { mask, attacks });
  }
  table
}

static SLIDER_TBL: Lazy<Vec<SliderEntry>> = Lazy::new(|| {
  let mut table = Vec::with_capacity(90);
  for s in 0..90u8 {
    let sq = Square::from_index(s).unwrap();
    let mask = slider_mask(sq);
    let subsets = 1usize << mask.count();
    let mut rook = vec![Bitboard::empty(); subsets];
    let mut cannon = vec![Bitboard::empty(); subsets];
    for i in 0..subsets {
      let occ = occupancy_subset(mask, i);
      rook[i] = gen_rook_attacks(sq, occ);
      cannon[i] = gen_cannon_attacks(sq, occ);
    }
    table.push(SliderEntry { mask, rook, cannon });
  }
  table
});

static HORSE_TBL: Lazy<Vec<MaskedEntry>> =
  Lazy::new(|| build_masked_table(horse_leg_mask, gen_horse_attacks));

static HORSE_REV_TBL: Lazy<Vec<MaskedEntry>> =
  Lazy::new(|| build_masked_table(diagonal_mask, gen_horse_attackers));

static ELEPHANT_TBL: Lazy<Vec<MaskedEntry>> =
  Lazy::new(|| build_masked_table(diagonal_mask, gen_elephant_attacks));

static ADVISOR_TBL: Lazy<[Bitboard; 90]> = Lazy::new(|| {
  let mut table = [Bitboard::empty(); 90];
  for (s, entry) in table.iter_mut().enumerate() {
    *entry = gen_advisor_attacks(Square::from_index(s as u8).unwrap());
  }
  table
});

static KING_TBL: Lazy<[Bitboard; 90]> = Lazy::new(|| {
  let mut table = [Bitboard::empty(); 90];
  for (s, entry) in table.iter_mut().enumerate() {
    *entry = gen_king_attacks(Square::from_index(s as u8).unwrap());
  }
  table
});

static PAWN_TBL: Lazy<[[Bitboard; 90]; 2]> = Lazy::new(|| {
  let mut table = [[Bitboard::empty(); 90]; 2];
  for s in 0..90u8 {
    let sq = Square::from_index(s).unwrap();
    table[0][s as usize] = gen_pawn_attacks(sq, Color::Red);
    table[1][s as usize] = gen_pawn_attacks(sq, Color::Black);
  }
  table
});

/// Chariot attack set from `sq` under occupancy `occ`.
pub fn rook_attacks(occ: Bitboard, sq: Square) -> Bitboard {
  let entry = &SLIDER_TBL[sq.index() as usize];
  entry.rook[occupancy_index(occ, entry.mask)]
}

/// Cannon attack set from `sq` under occupancy `occ`: quiet slides up to the
/// first blocker plus the screened capture square, if any.
pub fn cannon_attacks(occ: Bitboard, sq: Square) -> Bitboard {
  let entry = &SLIDER_TBL[sq.index() as usize];
  entry.cannon[occupancy_index(occ, entry.mask)]
}

/// Horse attack set from `sq` under occupancy `occ` (legs respected).
pub fn horse_attacks(occ: Bitboard, sq: Square) -> Bitboard {
  let entry = &HORSE_TBL[sq.index() as usize];
  entry.attacks[occupancy_index(occ, entry.mask)]
}

/// Squares from which a horse would attack `sq` under occupancy `occ`.
pub fn horse_attackers(occ: Bitboard, sq: Square) -> Bitboard {
  let entry = &HORSE_REV_TBL[sq.index() as usize];
  entry.attacks[occupancy_index(occ, entry.mask)]
}

/// Elephant attack set from `sq` under occupancy `occ` (eyes respected,
/// river never crossed).
pub fn elephant_attacks(occ: Bitboard, sq: Square) -> Bitboard {
  let entry = &ELEPHANT_TBL[sq.index() as usize];
  entry.attacks[occupancy_index(occ, entry.mask)]
}

/// Advisor attack set from `sq`.
pub fn advisor_attacks(sq: Square) -> Bitboard {
  ADVISOR_TBL[sq.index() as usize]
}

/// King attack set from `sq`.
pub fn king_attacks(sq: Square) -> Bitboard {
  KING_TBL[sq.index() as usize]
}

/// Pawn attack set from `sq` for `color`.
pub fn pawn_attacks(sq: Square, color: Color) -> Bitboard {
  PAWN_TBL[color_idx(color)][sq.index() as usize]
}
