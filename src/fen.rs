//! Position notation: ten `/`-separated rank groups from rank 9 down to rank
//! 0 (letters `rnbakcp`, uppercase = Red, digits 1..9 for empty runs), the
//! side to move (`w`/`b`), two reserved `-` fields, the half-move clock and
//! the full-move number. The reserved fields and counters may be omitted.

use std::fmt;

use crate::position::{Board, Piece, PieceKind};
use crate::square::Square;
use crate::Color;

/// The standard Xiangqi start position.
pub const START_POSITION: &str =
  "rnbakabnr/9/1c5c1/p1p1p1p1p/9/9/P1P1P1P1P/1C5C1/9/RNBAKABNR w - - 0 1";

/// Error returned when a position string is structurally invalid.
#[derive(Debug, Clone)]
pub struct FenError {
  pub reason: String,
  pub fen: String,
}

impl FenError {
  fn new(reason: &str, fen: &str) -> FenError {
    FenError { reason: reason.to_string(), fen: fen.to_string() }
  }
}

impl fmt::Display for FenError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "invalid position string ({}): {}", self.reason, self.fen)
  }
}

impl std::error::Error for FenError {}

/// Parse a position string into a `Board`.
///
/// Enforced rules:
/// - Exactly 10 ranks (9 slashes), each summing to exactly 9 squares.
/// - No two adjacent digits within a rank (they must be merged).
/// - Exactly one `K` and exactly one `k`.
/// - Side to move is `w` (Red) or `b`.
/// - Half-move and full-move fields, when present, are non-negative integers.
///
/// All three Zobrist keys are recomputed from scratch after parsing.
pub fn parse(fen: &str) -> Result<Board, FenError> {
  let parts: Vec<&str> = fen.split_whitespace().collect();
  if parts.len() < 2 {
    return Err(FenError::new("expected placement and side-to-move fields", fen));
  }
  if parts.len() > 6 {
    return Err(FenError::new("too many fields", fen));
  }

  let mut board = Board::empty();
  let mut file: u8 = 0;
  let mut rank: u8 = 9; // rank 9 comes first
  let mut slashes: u8 = 0;
  let mut prev_digit = false;
  let mut red_kings = 0;
  let mut black_kings = 0;

  for c in parts[0].chars() {
    match c {
      '1'..='9' => {
        if prev_digit {
          return Err(FenError::new("adjacent digits in a rank must be merged", fen));
        }
        prev_digit = true;
        file += c.to_digit(10).unwrap() as u8;
        if file > 9 {
          return Err(FenError::new("rank describes more than 9 squares", fen));
        }
      }
      '/' => {
        prev_digit = false;
        // End of a rank: must have exactly 9 files completed.
        if file != 9 {
          return Err(FenError::new("rank does not sum to 9 squares", fen));
        }
        slashes += 1;
        if slashes > 9 {
          return Err(FenError::new("expected exactly 10 ranks", fen));
        }
        file = 0;
        rank -= 1;
      }
      letter => {
        prev_digit = false;
        if file >= 9 {
          return Err(FenError::new("rank describes more than 9 squares", fen));
        }
        let kind = match PieceKind::from_code(letter.to_ascii_lowercase()) {
          Some(kind) => kind,
          None => return Err(FenError::new("unknown piece letter", fen)),
        };
        let color = if letter.is_ascii_uppercase() { Color::Red } else { Color::Black };
        if kind == PieceKind::King {
          match color {
            Color::Red => red_kings += 1,
            Color::Black => black_kings += 1,
          }
        }
        let sq = Square::from_file_rank(file, rank).unwrap();
        board.set_piece(sq, Piece { kind, color });
        file += 1;
      }
    }
  }

  if slashes != 9 || file != 9 {
    return Err(FenError::new("expected exactly 10 ranks of 9 squares", fen));
  }
  if red_kings != 1 {
    return Err(FenError::new("expected exactly one red general", fen));
  }
  if black_kings != 1 {
    return Err(FenError::new("expected exactly one black general", fen));
  }

  let stm = match parts[1] {
    "w" => Color::Red,
    "b" => Color::Black,
    _ => return Err(FenError::new("side to move must be 'w' or 'b'", fen)),
  };

  // parts[2] and parts[3] are reserved placeholders; their content is ignored.
  let half_move: u32 = match parts.get(4) {
    Some(s) => s.parse().map_err(|_| FenError::new("half-move clock must be a non-negative integer", fen))?,
    None => 0,
  };
  let full_move: u32 = match parts.get(5) {
    Some(s) => s.parse().map_err(|_| FenError::new("full-move number must be a non-negative integer", fen))?,
    None => 1,
  };

  board.set_side_to_move(stm);
  board.set_counters(half_move, full_move);
  board.refresh_keys();
  Ok(board)
}

/// Render `board` as a six-field position string; the inverse of `parse`.
pub fn emit(board: &Board) -> String {
  let mut out = String::new();
  for rank in (0..10).rev() {
    let mut empty = 0;
    for file in 0..9 {
      let sq = Square::from_file_rank(file, rank).unwrap();
      match board.piece_at(sq) {
        Some(kind) => {
          if empty > 0 {
            out.push_str(&empty.to_string());
            empty = 0;
          }
          let code = kind.code();
          if board.color_at(sq) == Some(Color::Red) {
            out.push(code.to_ascii_uppercase());
          }
          else {
            out.push(code);
          }
        }
        None => empty += 1,
      }
    }
    if empty > 0 {
      out.push_str(&empty.to_string());
    }
    if rank > 0 {
      out.push('/');
    }
  }
  let stm = match board.side_to_move() {
    Color::Red => 'w',
    Color::Black => 'b',
  };
  out.push(' ');
  out.push(stm);
  out.push_str(&format!(" - - {} {}", board.half_move_clock(), board.full_move_number()));
  out
}

impl Board {
  /// Parse a position string; see `fen::parse`.
  pub fn from_position_string(fen: &str) -> Result<Board, FenError> {
    parse(fen)
  }

  /// Render the position as a string; see `fen::emit`.
  pub fn to_position_string(&self) -> String {
    emit(self)
  }

  /// The standard start position.
  pub fn start_position() -> Board {
    parse(START_POSITION).expect("start position constant parses")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::position::PieceKind;
  use crate::Color;

  #[test]
  fn parse_start_position() {
    let b = Board::start_position();
    assert_eq!(b.side_to_move(), Color::Red);
    assert_eq!(b.all_occupancy().count(), 32);
    assert_eq!(b.occupancy(Color::Red).count(), 16);
    assert_eq!(b.occupancy(Color::Black).count(), 16);
    for color in [Color::Red, Color::Black] {
      assert_eq!(b.pieces_of(PieceKind::Pawn, color).count(), 5);
      assert_eq!(b.pieces_of(PieceKind::Rook, color).count(), 2);
      assert_eq!(b.pieces_of(PieceKind::Horse, color).count(), 2);
      assert_eq!(b.pieces_of(PieceKind::Elephant, color).count(), 2);
      assert_eq!(b.pieces_of(PieceKind::Advisor, color).count(), 2);
      assert_eq!(b.pieces_of(PieceKind::Cannon, color).count(), 2);
      assert_eq!(b.pieces_of(PieceKind::King, color).count(), 1);
    }
    assert_eq!(b.king_square(Color::Red), Square::from_notation("e0"));
    assert_eq!(b.king_square(Color::Black), Square::from_notation("e9"));
    assert_eq!(b.half_move_clock(), 0);
    assert_eq!(b.full_move_number(), 1);
    assert_eq!(b.ply(), 0);
  }

  #[test]
  fn emit_round_trips_the_start_position() {
    let b = Board::start_position();
    assert_eq!(b.to_position_string(), START_POSITION);
    let again = parse(&b.to_position_string()).unwrap();
    assert_eq!(again, b);
  }

  #[test]
  fn emit_round_trips_counters_and_side() {
    let fen = "4k4/9/9/9/9/9/9/9/9/3K5 b - - 17 42";
    let b = parse(fen).unwrap();
    assert_eq!(b.side_to_move(), Color::Black);
    assert_eq!(b.half_move_clock(), 17);
    assert_eq!(b.full_move_number(), 42);
    assert_eq!(b.to_position_string(), fen);
  }

  #[test]
  fn missing_fields_default() {
    let b = parse("4k4/9/9/9/9/9/9/9/9/4K4 w").unwrap();
    assert_eq!(b.half_move_clock(), 0);
    assert_eq!(b.full_move_number(), 1);
  }

  #[test]
  fn keys_depend_only_on_the_position() {
    // Same placement spelled with different trailing fields hashes the same.
    let a = parse("4k4/9/9/9/4p4/9/9/9/9/4K4 w - - 0 1").unwrap();
    let b = parse("4k4/9/9/9/4p4/9/9/9/9/4K4 w").unwrap();
    let c = parse("4k4/9/9/9/4p4/9/9/9/9/4K4 w - - 33 7").unwrap();
    assert_eq!(a.key(), b.key());
    assert_eq!(a.key(), c.key());
    assert_eq!(a.pawn_key(), c.pawn_key());
    assert_eq!(a.non_pawn_keys(), c.non_pawn_keys());
    // Side to move is part of the key.
    let d = parse("4k4/9/9/9/4p4/9/9/9/9/4K4 b").unwrap();
    assert_ne!(a.key(), d.key());
  }

  #[test]
  fn error_when_rank_count_wrong() {
    assert!(parse("9/9/9/9/9/9/9/9/4K4 w").is_err()); // 9 ranks
    assert!(parse("9/9/9/9/9/9/9/9/9/9/4K4 w").is_err()); // 11 ranks
  }

  #[test]
  fn error_when_rank_sum_wrong() {
    assert!(parse("4k4/8/9/9/9/9/9/9/9/4K4 w").is_err()); // short rank
    assert!(parse("4k5/9/9/9/9/9/9/9/9/4K4 w").is_err()); // long rank
  }

  #[test]
  fn error_on_adjacent_digits() {
    assert!(parse("4k4/45/9/9/9/9/9/9/9/4K4 w").is_err());
  }

  #[test]
  fn error_on_king_count() {
    assert!(parse("4k4/9/9/9/9/9/9/9/9/9 w").is_err()); // missing K
    assert!(parse("9/9/9/9/9/9/9/9/9/4K4 w").is_err()); // missing k
    assert!(parse("4k4/9/9/9/9/9/9/4K4/9/4K4 w").is_err()); // two K
  }

  #[test]
  fn error_on_bad_tokens() {
    assert!(parse("4k4/9/9/9/9/9/9/9/9/4K4 x").is_err()); // side token
    assert!(parse("4q4/9/9/9/9/9/9/9/9/4K4 w").is_err()); // no queens here
    assert!(parse("4k4/9/9/9/9/9/9/9/9/4K4 w - - -3 1").is_err()); // clock
    assert!(parse("4k4/9/9/9/9/9/9/9/9/4K4 w - - 0 x").is_err()); // move no
    assert!(parse("4k4/9/9/9/9/9/9/9/9/4K4").is_err()); // placement only
  }
}
