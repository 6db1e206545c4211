//! Move encoding and pseudo-legal/legal move generation.
//!
//! A move is 16 bits: origin, target, and a quiet/capture flag. Generation
//! walks each piece kind's own-color set, computes its attack set from the
//! tables, masks off own-color occupancy, and emits one move per target.
//! Legality (own general left safe, generals never facing) is decided by
//! making the move and probing `is_square_attacked_by`, because cannon
//! screens make pin reasoning non-local: dropping a piece onto a ray can
//! *create* an attack as easily as block one.

use std::fmt::{self, Display, Formatter};

use crate::attacks::{
  advisor_attacks, cannon_attacks, elephant_attacks, horse_attacks, king_attacks, pawn_attacks,
  rook_attacks,
};
use crate::bitboard::Bitboard;
use crate::position::{Board, PieceKind};
use crate::square::Square;

pub const QUIET_FLAG: u16 = 0;
pub const CAPTURE_FLAG: u16 = 1;

/// A move packed into 16 bits: bits 0..=6 the origin square, bits 7..=13 the
/// target square, bits 14..=15 the flag. Seven-bit fields cover indices 0..=89.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Move(u16);

impl Move {
  pub fn new(from: Square, to: Square, flag: u16) -> Move {
    Move(from.index() as u16 | (to.index() as u16) << 7 | flag << 14)
  }

  /// Sentinel recorded in the history for null moves; never a real move.
  pub fn null() -> Move {
    Move(0)
  }

  pub fn from(self) -> Square {
    Square::from_index((self.0 & 0x7f) as u8).unwrap()
  }

  pub fn to(self) -> Square {
    Square::from_index((self.0 >> 7 & 0x7f) as u8).unwrap()
  }

  pub fn flag(self) -> u16 {
    self.0 >> 14
  }

  pub fn is_capture(self) -> bool {
    self.flag() == CAPTURE_FLAG
  }

  /// The raw 16-bit encoding.
  pub fn value(self) -> u16 {
    self.0
  }
}

impl Display for Move {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}{}", self.from(), self.to())
  }
}

/// Selects which subset of moves `generate` emits.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MoveFilter {
  /// Every pseudo-legal move.
  All,
  /// Only moves landing on an enemy piece.
  Captures,
  /// The complement of `Captures`.
  Quiets,
  /// Moves that leave the own general unattacked; meant for positions
  /// already in check, where they are exactly the check evasions.
  Evasions,
  /// Pseudo-legal moves minus any that leave the own general attacked or
  /// the generals facing on an open file.
  Legal,
}

pub trait MoveGen {
  fn pawn_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn cannon_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn rook_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn horse_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn advisor_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn elephant_moves(&self, filter: MoveFilter) -> Vec<Move>;
  fn king_moves(&self, filter: MoveFilter) -> Vec<Move>;

  /// Moves for the side to move under `filter`. `All`/`Captures`/`Quiets`
  /// are pseudo-legal; `Evasions` and `Legal` verify each candidate by
  /// make, attack probe, unmake.
  fn generate(&mut self, filter: MoveFilter) -> Vec<Move>;

  /// Shorthand for `generate(MoveFilter::Legal)`.
  fn legal_moves(&mut self) -> Vec<Move>;

  /// Whether `mv` checks the opponent: makes the move, probes, unmakes.
  fn gives_check(&mut self, mv: Move) -> bool;
}

fn keep(filter: MoveFilter, is_capture: bool) -> bool {
  match filter {
    MoveFilter::Captures => is_capture,
    MoveFilter::Quiets => !is_capture,
    _ => true,
  }
}

// Emit a move per attack-set target that is not already ours, with the flag
// read off the enemy occupancy.
fn push_targets(board: &Board, from: Square, attacks: Bitboard, filter: MoveFilter, moves: &mut Vec<Move>) {
  let own = board.occupancy(board.side_to_move());
  let enemy = board.occupancy(!board.side_to_move());
  let mut targets = attacks & !own;
  while let Some(to_idx) = targets.pop_lsb() {
    let to = Square::from_index(to_idx).unwrap();
    let is_capture = enemy.test(to);
    if keep(filter, is_capture) {
      moves.push(Move::new(from, to, if is_capture { CAPTURE_FLAG } else { QUIET_FLAG }));
    }
  }
}

fn pseudo_legal(board: &Board, filter: MoveFilter) -> Vec<Move> {
  let mut moves = Vec::new();
  moves.extend(board.pawn_moves(filter));
  moves.extend(board.cannon_moves(filter));
  moves.extend(board.rook_moves(filter));
  moves.extend(board.horse_moves(filter));
  moves.extend(board.advisor_moves(filter));
  moves.extend(board.elephant_moves(filter));
  moves.extend(board.king_moves(filter));
  moves
}

impl MoveGen for Board {
  fn pawn_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let color = self.side_to_move();
    let mut rest = self.pieces_of(PieceKind::Pawn, color);
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, pawn_attacks(from, color), filter, &mut moves);
    }
    moves
  }

  fn cannon_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let occ = self.all_occupancy();
    let mut rest = self.pieces_of(PieceKind::Cannon, self.side_to_move());
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, cannon_attacks(occ, from), filter, &mut moves);
    }
    moves
  }

  fn rook_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let occ = self.all_occupancy();
    let mut rest = self.pieces_of(PieceKind::Rook, self.side_to_move());
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, rook_attacks(occ, from), filter, &mut moves);
    }
    moves
  }

  fn horse_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let occ = self.all_occupancy();
    let mut rest = self.pieces_of(PieceKind::Horse, self.side_to_move());
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, horse_attacks(occ, from), filter, &mut moves);
    }
    moves
  }

  fn advisor_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let mut rest = self.pieces_of(PieceKind::Advisor, self.side_to_move());
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, advisor_attacks(from), filter, &mut moves);
    }
    moves
  }

  fn elephant_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    let occ = self.all_occupancy();
    let mut rest = self.pieces_of(PieceKind::Elephant, self.side_to_move());
    while let Some(from_idx) = rest.pop_lsb() {
      let from = Square::from_index(from_idx).unwrap();
      push_targets(self, from, elephant_attacks(occ, from), filter, &mut moves);
    }
    moves
  }

  fn king_moves(&self, filter: MoveFilter) -> Vec<Move> {
    let mut moves = Vec::new();
    if let Some(from) = self.king_square(self.side_to_move()) {
      push_targets(self, from, king_attacks(from), filter, &mut moves);
    }
    moves
  }

  fn generate(&mut self, filter: MoveFilter) -> Vec<Move> {
    match filter {
      MoveFilter::All | MoveFilter::Captures | MoveFilter::Quiets => pseudo_legal(self, filter),
      MoveFilter::Evasions | MoveFilter::Legal => {
        let mover = self.side_to_move();
        let mut moves = Vec::new();
        for mv in pseudo_legal(self, MoveFilter::All) {
          self.make_move(mv).expect("generated moves start from an occupied square");
          let safe = !self.is_check(mover);
          self.unmake_move();
          if safe {
            moves.push(mv);
          }
        }
        moves
      }
    }
  }

  fn legal_moves(&mut self) -> Vec<Move> {
    self.generate(MoveFilter::Legal)
  }

  fn gives_check(&mut self, mv: Move) -> bool {
    if self.make_move(mv).is_err() {
      return false;
    }
    let check = self.is_check(self.side_to_move());
    self.unmake_move();
    check
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fen;
  use crate::position::{Board, Piece, PieceKind};
  use crate::Color;
  use std::collections::HashSet;

  fn sq(n: &str) -> Square {
    Square::from_notation(n).unwrap()
  }

  fn board_from(placements: &[(&str, PieceKind, Color)], stm: Color) -> Board {
    let mut b = Board::empty();
    for &(n, kind, color) in placements {
      b.set_piece(sq(n), Piece { kind, color });
    }
    b.set_side_to_move(stm);
    b.refresh_keys();
    b
  }

  fn move_set(moves: &[Move]) -> HashSet<u16> {
    moves.iter().map(|m| m.value()).collect()
  }

  fn has_move(moves: &[Move], from: &str, to: &str) -> bool {
    moves.iter().any(|m| m.from() == sq(from) && m.to() == sq(to))
  }

  #[test]
  fn move_encoding_roundtrip() {
    let mv = Move::new(sq("b2"), sq("i9"), CAPTURE_FLAG);
    assert_eq!(mv.from(), sq("b2"));
    assert_eq!(mv.to(), sq("i9"));
    assert!(mv.is_capture());
    assert_eq!(mv.to_string(), "b2i9");
    let quiet = Move::new(sq("a0"), sq("a1"), QUIET_FLAG);
    assert!(!quiet.is_capture());
  }

  #[test]
  fn start_position_has_44_legal_moves() {
    let mut b = fen::parse(fen::START_POSITION).unwrap();
    let legal = b.legal_moves();
    assert_eq!(legal.len(), 44);
    // Nothing is pinned or facing at the start, so pseudo-legal agrees.
    assert_eq!(b.generate(MoveFilter::All).len(), 44);
    // The only captures are the two cannon strikes on the enemy horses.
    let captures = b.generate(MoveFilter::Captures);
    assert_eq!(captures.len(), 2);
    assert!(has_move(&captures, "b2", "b9"));
    assert!(has_move(&captures, "h2", "h9"));
  }

  #[test]
  fn captures_and_quiets_partition_all() {
    let mut b = fen::parse(fen::START_POSITION).unwrap();
    // Step into a midgame-ish position to make the partition non-trivial.
    for (from, to) in [("b2", "e2"), ("h9", "g7"), ("b0", "c2"), ("b7", "b4")] {
      let legal = b.legal_moves();
      let mv = *legal
        .iter()
        .find(|m| m.from() == sq(from) && m.to() == sq(to))
        .expect("scripted move is legal");
      b.make_move(mv).unwrap();
    }
    let all = move_set(&b.generate(MoveFilter::All));
    let captures = move_set(&b.generate(MoveFilter::Captures));
    let quiets = move_set(&b.generate(MoveFilter::Quiets));
    assert!(captures.is_subset(&all));
    assert!(quiets.is_subset(&all));
    assert!(captures.is_disjoint(&quiets));
    assert_eq!(captures.len() + quiets.len(), all.len());
  }

  #[test]
  fn cannon_captures_only_through_a_screen() {
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("b2", PieceKind::Cannon, Color::Red),
        ("b5", PieceKind::Pawn, Color::Red),
        ("b9", PieceKind::Pawn, Color::Black),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(has_move(&legal, "b2", "b9"), "screened capture must exist");
    assert!(!has_move(&legal, "b2", "b5"), "own screen is not a target");
    assert!(!has_move(&legal, "b2", "b6"), "squares past the screen are dead");

    // Without the screen the cannon can neither capture b9 nor land on it.
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("b2", PieceKind::Cannon, Color::Red),
        ("b9", PieceKind::Pawn, Color::Black),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(!has_move(&legal, "b2", "b9"));
    assert!(has_move(&legal, "b2", "b8"));
  }

  #[test]
  fn horse_moves_blocked_by_leg() {
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("b0", PieceKind::Horse, Color::Red),
        ("b1", PieceKind::Pawn, Color::Red),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(!has_move(&legal, "b0", "a2"));
    assert!(!has_move(&legal, "b0", "c2"));
    assert!(has_move(&legal, "b0", "d1"));

    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("b0", PieceKind::Horse, Color::Red),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(has_move(&legal, "b0", "a2"));
    assert!(has_move(&legal, "b0", "c2"));
  }

  #[test]
  fn elephant_blocked_by_eye_and_river() {
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("c0", PieceKind::Elephant, Color::Red),
        ("b1", PieceKind::Pawn, Color::Red),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(!has_move(&legal, "c0", "a2"), "blocked eye");
    assert!(has_move(&legal, "c0", "e2"));
    // No elephant move ever lands across the river.
    assert!(legal
      .iter()
      .filter(|m| m.from() == sq("c0"))
      .all(|m| m.to().rank() <= 4));
  }

  #[test]
  fn flying_generals_constrain_king_moves() {
    // Bare kings face to face on the e-file: stepping aside is the only
    // way out, staying on the file keeps them facing.
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("e9", PieceKind::King, Color::Black),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(has_move(&legal, "e0", "d0"));
    assert!(has_move(&legal, "e0", "f0"));
    assert!(!has_move(&legal, "e0", "e1"));

    // Conversely a king may not step INTO a facing configuration.
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
      ],
      Color::Red,
    );
    let legal = b.legal_moves();
    assert!(!has_move(&legal, "e0", "d0"));
    assert!(has_move(&legal, "e0", "f0"));
    assert!(has_move(&legal, "e0", "e1"));
  }

  #[test]
  fn evasions_resolve_the_check() {
    // Black chariot on e5 checks the red general; f0 sidesteps, and the
    // red chariot can capture the checker. d0 would face the black general.
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("e5", PieceKind::Rook, Color::Black),
        ("a5", PieceKind::Rook, Color::Red),
      ],
      Color::Red,
    );
    assert!(b.is_check(Color::Red));
    let evasions = b.generate(MoveFilter::Evasions);
    assert_eq!(move_set(&evasions), move_set(&b.legal_moves()));
    assert!(has_move(&evasions, "e0", "f0"));
    assert!(has_move(&evasions, "a5", "e5"));
    assert!(!has_move(&evasions, "e0", "d0"));
    for mv in evasions {
      b.make_move(mv).unwrap();
      assert!(!b.is_check(Color::Red));
      b.unmake_move();
    }
  }

  #[test]
  fn moving_onto_a_file_can_create_a_cannon_screen() {
    // The e-file cannon has no screen, so there is no check yet; the horse
    // stepping to e1 would itself become the screen and expose the general.
    // This is why legality is decided by make-and-probe rather than pin masks.
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("d9", PieceKind::King, Color::Black),
        ("e6", PieceKind::Cannon, Color::Black),
        ("g2", PieceKind::Horse, Color::Red),
      ],
      Color::Red,
    );
    assert!(!b.is_check(Color::Red));
    let legal = b.legal_moves();
    assert!(!has_move(&legal, "g2", "e1"));
    assert!(!has_move(&legal, "g2", "e3"));
    assert!(has_move(&legal, "g2", "f4"));
  }

  #[test]
  fn gives_check_probes_without_disturbing_the_board() {
    let mut b = board_from(
      &[
        ("e0", PieceKind::King, Color::Red),
        ("e9", PieceKind::King, Color::Black),
        ("e4", PieceKind::Pawn, Color::Red),
        ("h2", PieceKind::Cannon, Color::Red),
      ],
      Color::Red,
    );
    let before = b.clone();
    // h2-e2 lines the cannon up behind the e4 screen against the general.
    assert!(b.gives_check(Move::new(sq("h2"), sq("e2"), QUIET_FLAG)));
    assert!(!b.gives_check(Move::new(sq("h2"), sq("g2"), QUIET_FLAG)));
    assert_eq!(b, before);
  }

  #[test]
  fn make_unmake_hundred_move_roundtrip() {
    let mut b = fen::parse(fen::START_POSITION).unwrap();
    let before = b.clone();
    let mut made = 0;
    for i in 0..100 {
      let legal = b.legal_moves();
      if legal.is_empty() {
        break;
      }
      let mv = legal[(i * 7) % legal.len()];
      b.make_move(mv).unwrap();
      made += 1;
    }
    for _ in 0..made {
      b.unmake_move();
    }
    assert_eq!(b, before);
  }
}
