//! Chart-driven die scaling for creature size changes.
//!
//! The progression chart and its irregular d4/d10 handling reproduce the
//! published errata tables as data. Do not try to re-derive them from a
//! closed formula; the chart is the source of truth.

use crate::common::{Float, Int, UInt};
use serde::{Deserialize, Serialize};

/// Creature size category, ordered smallest to largest.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Fine,
    Diminutive,
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
    Gargantuan,
    Colossal,
}

impl Size {
    pub const NAMES: [(&'static str, Size); 9] = [
        ("fine", Size::Fine),
        ("diminutive", Size::Diminutive),
        ("tiny", Size::Tiny),
        ("small", Size::Small),
        ("medium", Size::Medium),
        ("large", Size::Large),
        ("huge", Size::Huge),
        ("gargantuan", Size::Gargantuan),
        ("colossal", Size::Colossal),
    ];

    pub const fn index(self) -> Int {
        self as Int
    }

    /// Clamping conversion from a numeric size index.
    pub fn from_index(index: Int) -> Self {
        match index {
            i if i <= 0 => Size::Fine,
            1 => Size::Diminutive,
            2 => Size::Tiny,
            3 => Size::Small,
            4 => Size::Medium,
            5 => Size::Large,
            6 => Size::Huge,
            7 => Size::Gargantuan,
            _ => Size::Colossal,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, s)| s)
    }

    fn up(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    fn down(self) -> Self {
        Self::from_index(self.index() - 1)
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::Medium
    }
}

/// The damage-die progression as `(count, faces)` pairs. Adjacent entries
/// are single chart steps.
const STEP_CHART: [(UInt, UInt); 21] = [
    (1, 1),
    (1, 2),
    (1, 3),
    (1, 4),
    (1, 6),
    (1, 8),
    (1, 10),
    (2, 6),
    (2, 8),
    (3, 6),
    (3, 8),
    (4, 6),
    (4, 8),
    (6, 6),
    (6, 8),
    (8, 6),
    (8, 8),
    (12, 6),
    (12, 8),
    (16, 6),
    (16, 8),
];

const ONE_D6: usize = 4;
const ONE_D8: usize = 5;

fn chart_index(count: UInt, faces: UInt) -> Option<usize> {
    STEP_CHART.iter().position(|&(c, f)| c == count && f == faces)
}

/// Multiple d4s fold onto the d6/d8 ladder before any stepping happens.
fn fold_d4(count: UInt, faces: UInt) -> (UInt, UInt) {
    if faces != 4 || count < 2 {
        return (count, faces);
    }
    if count % 2 == 0 {
        (count / 2, 8)
    } else {
        ((count + 1) / 2, 6)
    }
}

/// Maps an expression missing from the chart onto a tabulated entry.
///
/// d6/d8 counts floor to the largest tabulated count below them; anything
/// else goes by nearest expected value, ties toward the smaller entry.
fn nearest_index(count: UInt, faces: UInt) -> usize {
    if faces == 6 || faces == 8 {
        let floored = STEP_CHART
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &(c, f))| f == faces && c <= count)
            .map(|(i, _)| i);
        if let Some(i) = floored {
            return i;
        }
    }

    let avg = |c: UInt, f: UInt| c as Float * (f as Float + 1.0) / 2.0;
    let target = avg(count, faces);
    let mut best = 0;
    let mut best_distance = Float::INFINITY;
    for (i, &(c, f)) in STEP_CHART.iter().enumerate() {
        let distance = (avg(c, f) - target).abs();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Scales a die expression by `delta` size categories (positive = larger),
/// starting from a creature of size `initial`.
///
/// Categories are crossed one at a time. A crossing is a single chart step
/// when the creature is still small (at or below Small going up, at or
/// below Medium going down) or the expression is small (at or below 1d6
/// going up, 1d8 going down); otherwise it is a double step. Two or more
/// d10s transform straight onto the d8 ladder instead, doubling their count
/// upward and keeping it downward; that transform consumes the crossing.
pub fn step_die_expr(count: UInt, faces: UInt, delta: Int, initial: Size) -> (UInt, UInt) {
    if delta == 0 || count == 0 {
        return (count, faces);
    }

    let (mut count, mut faces) = fold_d4(count, faces);
    let mut size = initial;

    for _ in 0..delta.unsigned_abs() {
        if delta > 0 {
            if faces == 10 && count >= 2 {
                count *= 2;
                faces = 8;
                size = size.up();
                continue;
            }
            let index = chart_index(count, faces).unwrap_or_else(|| nearest_index(count, faces));
            let steps = if size <= Size::Small || index <= ONE_D6 { 1 } else { 2 };
            let (c, f) = STEP_CHART[(index + steps).min(STEP_CHART.len() - 1)];
            count = c;
            faces = f;
            size = size.up();
        } else {
            if faces == 10 && count >= 2 {
                faces = 8;
                size = size.down();
                continue;
            }
            let index = chart_index(count, faces).unwrap_or_else(|| nearest_index(count, faces));
            let steps = if size <= Size::Medium || index <= ONE_D8 { 1 } else { 2 };
            let (c, f) = STEP_CHART[index.saturating_sub(steps)];
            count = c;
            faces = f;
            size = size.down();
        }
    }

    (count, faces)
}
