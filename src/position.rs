//! Board state: per-kind and per-color bitboards, a 90-slot mailbox kept in
//! lockstep with them, the incrementally maintained Zobrist keys, and the
//! make/unmake machinery with its growable undo stack.

use std::fmt;

use crate::attacks::{
  advisor_attacks, cannon_attacks, elephant_attacks, horse_attackers, king_attacks, rook_attacks,
};
use crate::bitboard::{between, Bitboard};
use crate::move_gen::Move;
use crate::square::Square;
use crate::zobrist;
use crate::{color_idx, Color};

/// The seven Xiangqi piece kinds, without color.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PieceKind {
  Pawn,
  Horse,
  Elephant,
  Rook,
  Advisor,
  King,
  Cannon,
}

impl PieceKind {
  /// Map a 0..=6 index to a `PieceKind` (0=P,1=N,2=B,3=R,4=A,5=K,6=C).
  pub fn from_index(s: usize) -> Option<PieceKind> {
    match s {
      0 => Some(PieceKind::Pawn),
      1 => Some(PieceKind::Horse),
      2 => Some(PieceKind::Elephant),
      3 => Some(PieceKind::Rook),
      4 => Some(PieceKind::Advisor),
      5 => Some(PieceKind::King),
      6 => Some(PieceKind::Cannon),
      _ => None,
    }
  }

  /// Notation letter, lowercase; the Red side uppercases it.
  pub fn code(self) -> char {
    match self {
      PieceKind::Pawn => 'p',
      PieceKind::Horse => 'n',
      PieceKind::Elephant => 'b',
      PieceKind::Rook => 'r',
      PieceKind::Advisor => 'a',
      PieceKind::King => 'k',
      PieceKind::Cannon => 'c',
    }
  }

  /// Inverse of `code`, for lowercase letters only.
  pub fn from_code(c: char) -> Option<PieceKind> {
    match c {
      'p' => Some(PieceKind::Pawn),
      'n' => Some(PieceKind::Horse),
      'b' => Some(PieceKind::Elephant),
      'r' => Some(PieceKind::Rook),
      'a' => Some(PieceKind::Advisor),
      'k' => Some(PieceKind::King),
      'c' => Some(PieceKind::Cannon),
      _ => None,
    }
  }
}

/// Map a `PieceKind` to its 0..=6 index (P=0, N=1, B=2, R=3, A=4, K=5, C=6).
#[inline]
pub fn piece_kind_idx(pk: PieceKind) -> usize {
  match pk {
    PieceKind::Pawn => 0,
    PieceKind::Horse => 1,
    PieceKind::Elephant => 2,
    PieceKind::Rook => 3,
    PieceKind::Advisor => 4,
    PieceKind::King => 5,
    PieceKind::Cannon => 6,
  }
}

/// A concrete piece on the board: its kind and color.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Piece {
  pub kind: PieceKind,
  pub color: Color,
}

/// Error returned by `make_move` for a request the board cannot apply.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IllegalMove {
  /// The origin square holds no piece. The board is left unchanged;
  /// this always indicates a caller bug.
  NoPieceAtOrigin,
}

impl fmt::Display for IllegalMove {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      IllegalMove::NoPieceAtOrigin => write!(f, "no piece on the origin square"),
    }
  }
}

impl std::error::Error for IllegalMove {}

/// Per-ply snapshot. `unmake_move` restores the previous snapshot wholesale,
/// so the keys never need to be re-XORed on the way back.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct State {
  pub key: u64,
  pub pawn_key: u64,
  pub non_pawn_keys: [u64; 2],
  pub moved: Option<PieceKind>,
  pub captured: Option<PieceKind>,
  pub half_move_clock: u32,
  pub full_move_number: u32,
}

impl State {
  pub fn new() -> Self {
    State {
      key: 0,
      pawn_key: 0,
      non_pawn_keys: [0, 0],
      moved: None,
      captured: None,
      half_move_clock: 0,
      full_move_number: 1,
    }
  }
}

impl Default for State {
  fn default() -> Self { State::new() }
}

/// The live position. Piece placement is held three ways at once - per-kind
/// bitboards, per-color bitboards, and the mailbox - and every mutation goes
/// through `make_move`/`unmake_move` (or the null variants) to keep them and
/// the Zobrist keys in lockstep.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Board {
  pieces: [Bitboard; 7],  // per kind, both colors together
  colors: [Bitboard; 2],  // per side
  mailbox: [Option<PieceKind>; 90],
  stm: Color,
  state: State,
  history: Vec<(State, Move)>,
  ply: usize,
}

impl Board {
  /// Create an empty board (no pieces), Red to move.
  pub fn empty() -> Self {
    Board {
      pieces: [Bitboard::empty(); 7],
      colors: [Bitboard::empty(); 2],
      mailbox: [None; 90],
      stm: Color::Red,
      state: State::new(),
      history: Vec::new(),
      ply: 0,
    }
  }

  /// Place `piece` on `sq` during construction. Callers finish with
  /// `refresh_keys` once the full position is assembled.
  pub fn set_piece(&mut self, sq: Square, piece: Piece) {
    self.pieces[piece_kind_idx(piece.kind)].set(sq);
    self.colors[color_idx(piece.color)].set(sq);
    self.mailbox[sq.index() as usize] = Some(piece.kind);
  }

  pub fn set_side_to_move(&mut self, color: Color) {
    self.stm = color;
  }

  pub fn set_counters(&mut self, half_move_clock: u32, full_move_number: u32) {
    self.state.half_move_clock = half_move_clock;
    self.state.full_move_number = full_move_number;
  }

  /// Recompute all three Zobrist keys from scratch. Used after bulk
  /// construction; make/unmake keep them current incrementally afterwards.
  pub fn refresh_keys(&mut self) {
    let (key, pawn_key, non_pawn_keys) = self.computed_keys();
    self.state.key = key;
    self.state.pawn_key = pawn_key;
    self.state.non_pawn_keys = non_pawn_keys;
  }

  /// Return the piece kind at `sq` if any.
  pub fn piece_at(&self, sq: Square) -> Option<PieceKind> {
    self.mailbox[sq.index() as usize]
  }

  /// Return the color of the piece at `sq` if any.
  pub fn color_at(&self, sq: Square) -> Option<Color> {
    if self.colors[0].test(sq) {
      Some(Color::Red)
    }
    else if self.colors[1].test(sq) {
      Some(Color::Black)
    }
    else {
      None
    }
  }

  /// Bitboard of `color`'s pieces of `kind`.
  pub fn pieces_of(&self, kind: PieceKind, color: Color) -> Bitboard {
    self.pieces[piece_kind_idx(kind)] & self.colors[color_idx(color)]
  }

  /// Bitboard of all of `color`'s pieces.
  pub fn occupancy(&self, color: Color) -> Bitboard {
    self.colors[color_idx(color)]
  }

  /// Bitboard of every occupied square.
  pub fn all_occupancy(&self) -> Bitboard {
    self.colors[0] | self.colors[1]
  }

  /// Locate the general of `color` (LSB if somehow multiple).
  pub fn king_square(&self, color: Color) -> Option<Square> {
    self.pieces_of(PieceKind::King, color).lsb().and_then(Square::from_index)
  }

  pub fn side_to_move(&self) -> Color { self.stm }
  pub fn ply(&self) -> usize { self.ply }
  pub fn key(&self) -> u64 { self.state.key }
  pub fn pawn_key(&self) -> u64 { self.state.pawn_key }
  pub fn non_pawn_keys(&self) -> [u64; 2] { self.state.non_pawn_keys }
  pub fn half_move_clock(&self) -> u32 { self.state.half_move_clock }
  pub fn full_move_number(&self) -> u32 { self.state.full_move_number }

  /// True if `mv` lands on an enemy piece.
  pub fn is_capture(&self, mv: Move) -> bool {
    self.piece_at(mv.to()).is_some()
  }

  pub fn is_quiet(&self, mv: Move) -> bool {
    !self.is_capture(mv)
  }

  /// Noisy coincides with capture: Xiangqi has no promotions.
  pub fn is_noisy(&self, mv: Move) -> bool {
    self.is_capture(mv)
  }

  /// Apply `mv` for the side to move: toggle the affected bitboards and
  /// mailbox slots, XOR the piece-square hashes into the running keys, push
  /// the prior state onto the undo stack, and flip the side to move.
  pub fn make_move(&mut self, mv: Move) -> Result<(), IllegalMove> {
    let from = mv.from();
    let to = mv.to();
    let piece = self.mailbox[from.index() as usize].ok_or(IllegalMove::NoPieceAtOrigin)?;
    let captured = self.mailbox[to.index() as usize];
    let side = self.stm;

    self.history.push((self.state, mv));

    self.toggle(from, piece, side);
    self.toggle(to, piece, side);
    self.mailbox[from.index() as usize] = None;
    self.mailbox[to.index() as usize] = Some(piece);
    self.xor_keys(from, side, piece);
    self.xor_keys(to, side, piece);

    if let Some(victim) = captured {
      self.toggle(to, victim, !side);
      self.xor_keys(to, !side, victim);
    }

    self.state.moved = Some(piece);
    self.state.captured = captured;
    self.state.half_move_clock = if captured.is_some() || piece == PieceKind::Pawn {
      0
    }
    else {
      self.state.half_move_clock + 1
    };
    if side == Color::Black {
      self.state.full_move_number += 1;
    }
    self.state.key ^= zobrist::side_key();
    self.stm = !side;
    self.ply += 1;

    #[cfg(debug_assertions)]
    self.audit();

    Ok(())
  }

  /// Revert the most recent `make_move`, restoring the saved state wholesale.
  pub fn unmake_move(&mut self) {
    let (prev, mv) = self.history.pop().expect("unmake without a prior make");
    self.ply -= 1;
    self.stm = !self.stm;
    let side = self.stm;
    let from = mv.from();
    let to = mv.to();
    let piece = self.state.moved.expect("history entry records the moved piece");

    self.toggle(to, piece, side);
    self.toggle(from, piece, side);
    self.mailbox[from.index() as usize] = Some(piece);
    self.mailbox[to.index() as usize] = self.state.captured;
    if let Some(victim) = self.state.captured {
      self.toggle(to, victim, !side);
    }

    self.state = prev;

    #[cfg(debug_assertions)]
    self.audit();
  }

  /// Pass the turn: flip the side to move, nothing else changes on the board.
  /// Used by null-move pruning in a search layer.
  pub fn make_null_move(&mut self) {
    self.history.push((self.state, Move::null()));
    self.state.moved = None;
    self.state.captured = None;
    self.state.key ^= zobrist::side_key();
    self.stm = !self.stm;
    self.ply += 1;

    #[cfg(debug_assertions)]
    self.audit();
  }

  /// Revert the most recent `make_null_move`.
  pub fn unmake_null_move(&mut self) {
    let (prev, _) = self.history.pop().expect("unmake without a prior null move");
    self.ply -= 1;
    self.stm = !self.stm;
    self.state = prev;

    #[cfg(debug_assertions)]
    self.audit();
  }

  /// Duplicate the board for another worker thread. The undo stack carries
  /// over up to the current ply; the copies share nothing mutable.
  pub fn copy(&self) -> Board {
    self.clone()
  }

  /// Returns true iff `sq` is attacked by pieces of color `by`.
  ///
  /// Sliders are probed by computing attacks FROM `sq` with the current
  /// occupancy and intersecting with `by`'s bitboard of that kind. Horses
  /// need the reverse table: an inbound jump is blocked next to `sq`, not
  /// next to the horse. The flying-general rule is folded in at the end,
  /// with `sq` standing in for the defending general.
  pub fn is_square_attacked_by(&self, sq: Square, by: Color) -> bool {
    let occ = self.all_occupancy();

    if (rook_attacks(occ, sq) & self.pieces_of(PieceKind::Rook, by)).any() {
      return true;
    }

    // Only the screened-capture part of the cannon set can intersect a
    // piece, and that part is symmetric between the two endpoints.
    if (cannon_attacks(occ, sq) & self.pieces_of(PieceKind::Cannon, by)).any() {
      return true;
    }

    if (horse_attackers(occ, sq) & self.pieces_of(PieceKind::Horse, by)).any() {
      return true;
    }

    // The elephant's eye is the midpoint of the jump, so the probe from the
    // target uses the same eye as the jump itself.
    if (elephant_attacks(occ, sq) & self.pieces_of(PieceKind::Elephant, by)).any() {
      return true;
    }

    // Advisors and the general only ever capture within the palace.
    if sq.in_palace() {
      if (advisor_attacks(sq) & self.pieces_of(PieceKind::Advisor, by)).any() {
        return true;
      }
      if (king_attacks(sq) & self.pieces_of(PieceKind::King, by)).any() {
        return true;
      }
    }

    // Pawns: directly ahead of the attacker, or beside it once across the river.
    let pawns = self.pieces_of(PieceKind::Pawn, by);
    let behind = match by {
      Color::Red => -1,
      Color::Black => 1,
    };
    if let Some(from) = sq.offset(behind, 0) {
      if pawns.test(from) {
        return true;
      }
    }
    for df in [-1, 1] {
      if let Some(from) = sq.offset(0, df) {
        if pawns.test(from) && from.crossed_river(by) {
          return true;
        }
      }
    }

    // Flying generals: an open file to the enemy general attacks `sq` as if
    // the defending general stood there.
    if let Some(their_king) = self.king_square(by) {
      if their_king.file() == sq.file() && (between(sq, their_king) & occ).is_empty() {
        return true;
      }
    }

    false
  }

  /// Returns true iff any square in `squares` is attacked by the opponent of
  /// `defending`.
  pub fn is_attacked(&self, defending: Color, squares: Bitboard) -> bool {
    let mut rest = squares;
    while let Some(s) = rest.pop_lsb() {
      let sq = Square::from_index(s).unwrap();
      if self.is_square_attacked_by(sq, !defending) {
        return true;
      }
    }
    false
  }

  /// True iff `color`'s general is attacked (the flying-general rule counts).
  pub fn is_check(&self, color: Color) -> bool {
    match self.king_square(color) {
      Some(sq) => self.is_square_attacked_by(sq, !color),
      None => false,
    }
  }

  fn toggle(&mut self, sq: Square, kind: PieceKind, color: Color) {
    let mask = Bitboard::single(sq);
    self.pieces[piece_kind_idx(kind)] = self.pieces[piece_kind_idx(kind)] ^ mask;
    self.colors[color_idx(color)] = self.colors[color_idx(color)] ^ mask;
  }

  // XOR one piece-square hash into the keys it belongs to.
  fn xor_keys(&mut self, sq: Square, color: Color, kind: PieceKind) {
    let hash = zobrist::piece_key(sq, color, kind);
    self.state.key ^= hash;
    if kind == PieceKind::Pawn {
      self.state.pawn_key ^= hash;
    }
    else {
      self.state.non_pawn_keys[color_idx(color)] ^= hash;
    }
  }

  /// All three keys recomputed from the piece placement alone.
  fn computed_keys(&self) -> (u64, u64, [u64; 2]) {
    let mut key = 0u64;
    let mut pawn_key = 0u64;
    let mut non_pawn_keys = [0u64; 2];
    for c in 0..2 {
      let color = Color::from_index(c).unwrap();
      for k in 0..7 {
        let kind = PieceKind::from_index(k).unwrap();
        let mut rest = self.pieces_of(kind, color);
        while let Some(s) = rest.pop_lsb() {
          let sq = Square::from_index(s).unwrap();
          let hash = zobrist::piece_key(sq, color, kind);
          key ^= hash;
          if kind == PieceKind::Pawn {
            pawn_key ^= hash;
          }
          else {
            non_pawn_keys[c] ^= hash;
          }
        }
      }
    }
    if self.stm == Color::Red {
      key ^= zobrist::side_key();
    }
    (key, pawn_key, non_pawn_keys)
  }

  // Full consistency audit after every make/unmake in debug builds: the
  // incremental keys must match a from-scratch recompute, and the mailbox
  // must agree with the bitboards square by square.
  #[cfg(debug_assertions)]
  fn audit(&self) {
    let (key, pawn_key, non_pawn_keys) = self.computed_keys();
    debug_assert_eq!(self.state.key, key, "incremental key drifted from recompute");
    debug_assert_eq!(self.state.pawn_key, pawn_key, "incremental pawn key drifted");
    debug_assert_eq!(self.state.non_pawn_keys, non_pawn_keys, "incremental non-pawn keys drifted");
    for s in 0..90u8 {
      let sq = Square::from_index(s).unwrap();
      let from_bitboards = (0..7)
        .find(|&k| self.pieces[k].test(sq))
        .map(|k| PieceKind::from_index(k).unwrap());
      debug_assert_eq!(self.mailbox[s as usize], from_bitboards, "mailbox out of sync at {}", sq);
      let red = self.colors[0].test(sq);
      let black = self.colors[1].test(sq);
      debug_assert!(!(red && black), "both colors claim {}", sq);
      debug_assert_eq!(from_bitboards.is_some(), red || black, "color bitboards out of sync at {}", sq);
    }
  }
}
