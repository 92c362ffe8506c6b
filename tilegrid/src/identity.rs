//! Tile identities.
//!
//! # Identifier Format
//!
//! - Numbered tiles: `T` + 3-digit sequence number, e.g. `T001`.
//! - Lettered tiles: `T` + letter code + 2-digit sub-tile number, e.g. `TA01`.
//!
//! Sequence and sub-tile numbers are dense and 1-based: they count only the
//! tiles that are actually emitted, in row-major order of the full grid.
//!
//! Letter codes enumerate letter cells row-major: `A`, `B`, ... `Z`, then
//! `AA`, `AB`, ... (bijective base-26, like spreadsheet columns).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapper::CandidateTile;

/// Stable identifier of an emitted tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileIdentity {
    /// Dense 1-based sequence number over a numbered grid.
    Numbered(usize),
    /// Letter cell code plus dense 1-based sub-tile number within that cell.
    Lettered { letter: String, subtile: usize },
}

impl TileIdentity {
    /// Parse an identifier such as `T001` or `TA01`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tilegrid::TileIdentity;
    ///
    /// assert_eq!(TileIdentity::parse("T012"), Some(TileIdentity::Numbered(12)));
    /// assert_eq!(
    ///     TileIdentity::parse("TAB03"),
    ///     Some(TileIdentity::Lettered { letter: "AB".to_string(), subtile: 3 })
    /// );
    /// assert_eq!(TileIdentity::parse("X001"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix('T')?;
        let split = rest
            .find(|c: char| !c.is_ascii_uppercase())
            .unwrap_or(rest.len());
        let (letter, digits) = rest.split_at(split);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let number: usize = digits.parse().ok()?;
        if number == 0 {
            return None;
        }

        if letter.is_empty() {
            Some(TileIdentity::Numbered(number))
        } else {
            Some(TileIdentity::Lettered {
                letter: letter.to_string(),
                subtile: number,
            })
        }
    }

    /// Sequence or sub-tile number.
    pub fn number(&self) -> usize {
        match self {
            TileIdentity::Numbered(n) => *n,
            TileIdentity::Lettered { subtile, .. } => *subtile,
        }
    }

    /// Letter code, for lettered tiles.
    pub fn letter(&self) -> Option<&str> {
        match self {
            TileIdentity::Numbered(_) => None,
            TileIdentity::Lettered { letter, .. } => Some(letter),
        }
    }
}

impl fmt::Display for TileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileIdentity::Numbered(n) => write!(f, "T{:03}", n),
            TileIdentity::Lettered { letter, subtile } => write!(f, "T{}{:02}", letter, subtile),
        }
    }
}

/// Letter code for a zero-based, row-major letter cell index.
///
/// # Examples
///
/// ```
/// use tilegrid::identity::letter_code;
///
/// assert_eq!(letter_code(0), "A");
/// assert_eq!(letter_code(25), "Z");
/// assert_eq!(letter_code(26), "AA");
/// assert_eq!(letter_code(27), "AB");
/// ```
pub fn letter_code(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`letter_code`]. Returns `None` for anything but uppercase ASCII letters.
pub fn letter_index(code: &str) -> Option<usize> {
    if code.is_empty() {
        return None;
    }
    let mut n: usize = 0;
    for b in code.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        n = n.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)?;
    }
    Some(n - 1)
}

/// Assign identities to candidate tiles.
///
/// `keep[i]` says whether `candidates[i]` is emitted. Candidates must be in
/// row-major order of the full grid; the result is aligned with them and
/// holds `None` for dropped tiles.
///
/// Numbers come from positional order only, so the same survivors always
/// produce the same identities, whatever order their data was checked in.
pub fn assign_identities(candidates: &[CandidateTile], keep: &[bool]) -> Vec<Option<TileIdentity>> {
    debug_assert_eq!(candidates.len(), keep.len());

    let mut sequence = 0;
    let mut per_letter: Vec<usize> = Vec::new();

    candidates
        .iter()
        .zip(keep)
        .map(|(candidate, &kept)| {
            if !kept {
                return None;
            }
            Some(match &candidate.letter {
                None => {
                    sequence += 1;
                    TileIdentity::Numbered(sequence)
                }
                Some(slot) => {
                    if per_letter.len() <= slot.index {
                        per_letter.resize(slot.index + 1, 0);
                    }
                    per_letter[slot.index] += 1;
                    TileIdentity::Lettered {
                        letter: slot.code.clone(),
                        subtile: per_letter[slot.index],
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{AreaDefinition, Extent};
    use crate::grid::{LetteredGridSpec, ReferenceArea, TileGridSpec};
    use crate::mapper::plan_tiles;

    #[test]
    fn test_display() {
        assert_eq!(TileIdentity::Numbered(1).to_string(), "T001");
        assert_eq!(TileIdentity::Numbered(1234).to_string(), "T1234");
        let id = TileIdentity::Lettered {
            letter: "C".to_string(),
            subtile: 4,
        };
        assert_eq!(id.to_string(), "TC04");
        assert_eq!(id.letter(), Some("C"));
        assert_eq!(id.number(), 4);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(TileIdentity::parse("T"), None);
        assert_eq!(TileIdentity::parse("TA"), None);
        assert_eq!(TileIdentity::parse("T000"), None);
        assert_eq!(TileIdentity::parse("Ta01"), None);
        assert_eq!(TileIdentity::parse("TA0B"), None);
        assert_eq!(TileIdentity::parse("001"), None);
    }

    #[test]
    fn test_roundtrip() {
        let ids = [
            TileIdentity::Numbered(1),
            TileIdentity::Numbered(99),
            TileIdentity::Lettered {
                letter: "A".to_string(),
                subtile: 1,
            },
            TileIdentity::Lettered {
                letter: "AZ".to_string(),
                subtile: 12,
            },
        ];
        for id in ids {
            assert_eq!(TileIdentity::parse(&id.to_string()), Some(id));
        }
    }

    #[test]
    fn test_letter_codes() {
        assert_eq!(letter_code(1), "B");
        assert_eq!(letter_code(29), "AD");
        assert_eq!(letter_code(51), "AZ");
        assert_eq!(letter_code(52), "BA");
        assert_eq!(letter_code(701), "ZZ");
        assert_eq!(letter_code(702), "AAA");

        for i in 0..2000 {
            assert_eq!(letter_index(&letter_code(i)), Some(i));
        }
        assert_eq!(letter_index(""), None);
        assert_eq!(letter_index("a"), None);
    }

    fn area() -> AreaDefinition {
        AreaDefinition::new(
            "test",
            "p",
            200,
            100,
            Extent::new(-1000.0, -1500.0, 1000.0, 1500.0),
        )
        .unwrap()
    }

    #[test]
    fn test_numbered_dense_sequence() {
        let plan = plan_tiles(&TileGridSpec::numbered(3, 3), &area()).unwrap();
        let keep = [true, false, true, true, false, false, true, true, true];
        let ids = assign_identities(&plan.candidates, &keep);

        let numbers: Vec<usize> = ids.iter().flatten().map(|id| id.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(ids[1], None);
        assert_eq!(ids[2], Some(TileIdentity::Numbered(2)));
    }

    #[test]
    fn test_lettered_numbering_per_letter() {
        let spec = LetteredGridSpec::new(2, 2, ReferenceArea::Dataset).subtiles(2, 2);
        let plan = plan_tiles(&TileGridSpec::lettered(spec), &area()).unwrap();
        assert_eq!(plan.candidates.len(), 16);

        // Drop the first sub-tile of every letter cell
        let keep: Vec<bool> = plan
            .candidates
            .iter()
            .map(|c| !(c.grid_row % 2 == 0 && c.grid_col % 2 == 0))
            .collect();
        let ids = assign_identities(&plan.candidates, &keep);
        let names: Vec<String> = ids.iter().flatten().map(|id| id.to_string()).collect();

        // Row 0: A's 2nd sub-tile, B's 2nd sub-tile
        assert_eq!(&names[..2], &["TA01", "TB01"]);
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"TD03".to_string()));
        assert!(!names.contains(&"TD04".to_string()));
    }
}
