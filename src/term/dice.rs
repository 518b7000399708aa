use super::TermLike;
use crate::common::*;
use crate::roll::{EvalContext, FormulaError};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Raw dice notation as produced by the tokenizer: `NdF` plus keep/drop
/// modifiers.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiceSpec {
    pub count: UInt,
    pub faces: UInt,
    pub mods: Vec<DiceMod>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiceMod {
    pub kind: DiceModKind,
    pub sel: ModSelector,
    pub count: UInt,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiceModKind {
    Keep,
    Drop,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModSelector {
    Highest,
    Lowest,
}

impl fmt::Display for DiceMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(match self.kind {
            DiceModKind::Keep => 'k',
            DiceModKind::Drop => 'p',
        })?;
        f.write_char(match self.sel {
            ModSelector::Highest => 'h',
            ModSelector::Lowest => 'l',
        })?;
        write!(f, "{}", self.count)
    }
}

/// One rolled die: its natural result, whether a modifier kept it, and an
/// override recorded by a static-roll correction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DieRoll {
    pub result: UInt,
    pub kept: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub forced: Option<Int>,
}

impl DieRoll {
    fn new(result: UInt) -> Self {
        Self {
            result,
            kept: true,
            forced: None,
        }
    }

    /// The value this die contributes, honoring a forced override.
    pub fn value(&self) -> Number {
        match self.forced {
            Some(forced) => Number::Int(forced),
            None => Number::from(self.result),
        }
    }
}

/// A randomness-producing term: a pool of same-faced dice with keep/drop
/// modifiers. Unevaluated until `rolls` is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceTerm {
    pub count: UInt,
    pub faces: NonZeroUInt,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub mods: Vec<DiceMod>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub rolls: Vec<DieRoll>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl DiceTerm {
    pub fn new(count: UInt, faces: NonZeroUInt) -> Self {
        Self {
            count,
            faces,
            mods: Vec::new(),
            rolls: Vec::new(),
            flavor: None,
        }
    }

    /// The standard check die, 1d20.
    pub fn standard() -> Self {
        const D20: NonZeroUInt = match NonZeroUInt::new(20) {
            Some(faces) => faces,
            None => panic!("20 is non-zero"),
        };
        Self::new(1, D20)
    }

    pub(crate) fn from_spec(spec: DiceSpec) -> Result<Self, FormulaError> {
        let faces = NonZeroUInt::new(spec.faces)
            .ok_or_else(|| FormulaError::value("dice must have at least one face"))?;
        if spec.count == 0 {
            return Err(FormulaError::value("dice pools must contain at least one die"));
        }
        Ok(Self {
            count: spec.count,
            faces,
            mods: spec.mods,
            rolls: Vec::new(),
            flavor: None,
        })
    }

    pub fn evaluated(&self) -> bool {
        !self.rolls.is_empty()
    }

    /// The first kept die. Check rolls treat it as the active result.
    pub fn active(&self) -> Option<&DieRoll> {
        self.rolls.iter().find(|d| d.kept)
    }

    pub fn active_value(&self) -> Option<Number> {
        self.active().map(DieRoll::value)
    }

    /// The active die's natural (pre-override) result.
    pub fn active_natural(&self) -> Option<UInt> {
        self.active().map(|d| d.result)
    }

    /// Forces the active die to `value`, returning the total delta this
    /// introduces. Other dice are left untouched.
    pub(crate) fn override_active(&mut self, value: Int) -> Option<Number> {
        let die = self.rolls.iter_mut().find(|d| d.kept)?;
        let old = die.value();
        die.forced = Some(value);
        Some(Number::Int(value) - old)
    }

    fn apply_mod(&mut self, m: &DiceMod) {
        let mut order: Vec<usize> = (0..self.rolls.len())
            .filter(|&i| self.rolls[i].kept)
            .collect();
        order.sort_by_key(|&i| self.rolls[i].result);
        if m.sel == ModSelector::Highest {
            order.reverse();
        }

        let n = m.count as usize;
        let dropped: Vec<usize> = match m.kind {
            DiceModKind::Keep => order.iter().skip(n).copied().collect(),
            DiceModKind::Drop => order.iter().take(n).copied().collect(),
        };
        for i in dropped {
            self.rolls[i].kept = false;
        }
    }
}

impl TermLike for DiceTerm {
    fn total(&self) -> Option<Number> {
        if !self.evaluated() {
            return None;
        }
        Some(
            self.rolls
                .iter()
                .filter(|d| d.kept)
                .map(DieRoll::value)
                .fold(Number::ZERO, |a, b| a + b),
        )
    }

    fn expression(&self) -> String {
        let mut ret = format!("{}d{}", self.count, self.faces);
        for m in &self.mods {
            let _ = write!(ret, "{}", m);
        }
        ret
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        false
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        vec![self]
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.evaluated() {
            return Ok(());
        }
        for _ in 0..self.count {
            let result = ctx.roll_die(self.faces)?;
            self.rolls.push(DieRoll::new(result));
        }
        let mods = std::mem::take(&mut self.mods);
        for m in &mods {
            self.apply_mod(m);
        }
        self.mods = mods;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roll::{EvalOptions, StepRoller};

    fn evaluated(spec: &str, start: UInt) -> DiceTerm {
        let mut roller = StepRoller::new(start, 1);
        let mut ctx = EvalContext::new(&mut roller, &EvalOptions::default());
        let tokens = crate::parse::lex_single(spec);
        let spec = match tokens {
            Some(crate::parse::TokenKind::Dice(spec)) => spec,
            other => panic!("not a dice spec: {:?}", other),
        };
        let mut term = DiceTerm::from_spec(spec).unwrap();
        term.evaluate(&mut ctx).unwrap();
        term
    }

    #[test]
    fn test_plain_roll() {
        let term = evaluated("3d6", 4);
        assert_eq!(term.total(), Some(Number::Int(4 + 5 + 6)));
        assert_eq!(term.expression(), "3d6");
    }

    #[test]
    fn test_keep_highest() {
        let term = evaluated("3d6kh1", 4);
        assert_eq!(term.total(), Some(Number::Int(6)));
        let kept: Vec<bool> = term.rolls.iter().map(|d| d.kept).collect();
        assert_eq!(kept, vec![false, false, true]);
        assert_eq!(term.expression(), "3d6kh1");
    }

    #[test]
    fn test_drop_lowest() {
        let term = evaluated("4d8pl2", 3);
        // rolls 3, 4, 5, 6; dropping the two lowest leaves 5 + 6
        assert_eq!(term.total(), Some(Number::Int(11)));
    }

    #[test]
    fn test_override_active() {
        let mut term = evaluated("3d6kh1", 4);
        let delta = term.override_active(10).unwrap();
        assert_eq!(delta, Number::Int(4));
        assert_eq!(term.total(), Some(Number::Int(10)));
        assert_eq!(term.active_natural(), Some(6));
        // untouched natural results remain in the record
        let naturals: Vec<UInt> = term.rolls.iter().map(|d| d.result).collect();
        assert_eq!(naturals, vec![4, 5, 6]);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut term = evaluated("2d10", 7);
        let before = term.clone();
        let mut roller = StepRoller::new(1, 1);
        let mut ctx = EvalContext::new(&mut roller, &EvalOptions::default());
        term.evaluate(&mut ctx).unwrap();
        assert_eq!(term, before);
    }
}
