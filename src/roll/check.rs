use super::{DefaultRoller, EvalOptions, FormulaError, Roll, Roller};
use crate::common::*;
use crate::data::RollData;
use crate::term::{simplify::simplify, DiceTerm, Term, TermLike};
use serde::{Deserialize, Serialize};

/// Options for a die-based pass/fail check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOptions {
    /// Critical threshold; an active result at or above it is a crit.
    pub critical: Int,
    /// Natural results at or below this misfire. 0 means never.
    pub misfire: Int,
    /// Forced active result, the "take 10/20" mechanism.
    pub static_roll: Option<Int>,
    /// Formula fragment spliced in ahead of evaluation.
    pub bonus: String,
    pub flavor: String,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            critical: 20,
            misfire: 0,
            static_roll: None,
            bonus: String::new(),
            flavor: String::new(),
        }
    }
}

/// A check roll: a check die plus modifiers, with critical/fumble
/// detection and a single post-evaluation static override.
///
/// Lifecycle: constructed, bonus spliced, evaluated, then (at most once)
/// the static override corrects the active die in place. A constructed
/// check that is never evaluated is simply dropped; an interactive prompt
/// being dismissed produces no roll at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRoll {
    roll: Roll,
    data: RollData,
    pub options: CheckOptions,
    bonus_applied: bool,
    override_applied: bool,
}

impl CheckRoll {
    /// Builds a check from a formula whose first term is the check die.
    ///
    /// A leading bare number becomes the static roll, with a standard d20
    /// synthesized as the check die, so literal overrides and "take 20"
    /// share one path. Anything else up front is a formula error.
    pub fn new(
        formula: &str,
        data: &RollData,
        options: CheckOptions,
    ) -> Result<Self, FormulaError> {
        let mut roll = Roll::parse(formula, data)?;
        let mut options = options;

        match roll.terms.first() {
            Some(Term::Dice(_)) => {}
            Some(Term::Numeric(n))
                if !roll.terms.iter().any(|t| matches!(t, Term::Dice(_))) =>
            {
                options.static_roll = Some(n.value.as_int());
                roll.terms[0] = DiceTerm::standard().into();
            }
            Some(other) => {
                return Err(FormulaError::UnsupportedLeadingTerm(other.formula()));
            }
            None => return Err(FormulaError::EmptyFormula),
        }

        if !options.flavor.is_empty() {
            roll.options.flavor = Some(options.flavor.clone());
        }

        Ok(Self {
            roll,
            data: data.clone(),
            options,
            bonus_applied: false,
            override_applied: false,
        })
    }

    /// Late bonus injection, e.g. from a dialog. Only before evaluation.
    pub fn set_bonus(&mut self, bonus: impl Into<String>) -> Result<(), FormulaError> {
        if self.roll.evaluated() {
            return Err(FormulaError::AlreadyEvaluated);
        }
        self.options.bonus = bonus.into();
        Ok(())
    }

    /// Late static-roll injection. Only before evaluation.
    pub fn set_static_roll(&mut self, value: Option<Int>) -> Result<(), FormulaError> {
        if self.roll.evaluated() {
            return Err(FormulaError::AlreadyEvaluated);
        }
        self.options.static_roll = value;
        Ok(())
    }

    /// Splices the bonus fragment onto the term sequence, prefixing an
    /// explicit `+` when the fragment does not lead with an operator.
    fn apply_bonus(&mut self) -> Result<(), FormulaError> {
        if self.roll.evaluated() {
            return Err(FormulaError::AlreadyEvaluated);
        }
        if self.bonus_applied || self.options.bonus.trim().is_empty() {
            self.bonus_applied = true;
            return Ok(());
        }

        let parsed = crate::parse::parse(&self.options.bonus, &self.data)?;
        let terms = simplify(parsed.terms);
        if terms.is_empty() {
            self.bonus_applied = true;
            return Ok(());
        }
        if !matches!(terms.first(), Some(Term::Operator(_))) {
            self.roll
                .terms
                .push(crate::term::OperatorTerm::new(BinaryOperator::Add).into());
        }
        self.roll.terms.extend(terms);
        self.bonus_applied = true;
        Ok(())
    }

    /// Overwrites the check die's active result in place and corrects the
    /// stored total by the same delta. Never a re-evaluation.
    fn apply_static_override(&mut self) -> Result<(), FormulaError> {
        if self.override_applied {
            return Ok(());
        }
        let value = match self.options.static_roll {
            Some(value) => value,
            None => {
                self.override_applied = true;
                return Ok(());
            }
        };
        let die = match self.roll.terms.first_mut() {
            Some(Term::Dice(die)) => die,
            _ => {
                return Err(FormulaError::MalformedExpression(
                    "check roll lost its check die".to_owned(),
                ))
            }
        };
        if let Some(delta) = die.override_active(value) {
            self.roll.adjust_total(delta);
        }
        self.override_applied = true;
        Ok(())
    }

    pub fn evaluate(&mut self) -> Result<Number, FormulaError> {
        self.evaluate_with(&mut DefaultRoller::default(), &EvalOptions::default())
    }

    pub fn evaluate_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.apply_bonus()?;
        self.roll.evaluate_with(roller, opts)?;
        self.apply_static_override()?;
        self.roll.total()
    }

    pub async fn evaluate_async(&mut self) -> Result<Number, FormulaError> {
        let mut roller = DefaultRoller::default();
        self.evaluate_async_with(&mut roller, &EvalOptions::default())
            .await
    }

    pub async fn evaluate_async_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.apply_bonus()?;
        self.roll.evaluate_async_with(roller, opts).await?;
        self.apply_static_override()?;
        self.roll.total()
    }

    fn check_die(&self) -> Option<&DiceTerm> {
        match self.roll.terms.first() {
            Some(Term::Dice(die)) => Some(die),
            _ => None,
        }
    }

    /// Active result at or above the critical threshold.
    pub fn is_crit(&self) -> bool {
        self.check_die()
            .and_then(DiceTerm::active_value)
            .map_or(false, |v| v >= Number::Int(self.options.critical))
    }

    pub fn is_nat20(&self) -> bool {
        self.natural_on_d20() == Some(20)
    }

    pub fn is_nat1(&self) -> bool {
        self.natural_on_d20() == Some(1)
    }

    /// Natural result at or below the misfire threshold.
    pub fn is_misfire(&self) -> bool {
        self.check_die()
            .and_then(DiceTerm::active_natural)
            .map_or(false, |natural| natural as Int <= self.options.misfire)
    }

    fn natural_on_d20(&self) -> Option<UInt> {
        let die = self.check_die()?;
        if die.faces.get() != 20 {
            return None;
        }
        die.active_natural()
    }

    pub fn evaluated(&self) -> bool {
        self.roll.evaluated()
    }

    pub fn total(&self) -> Result<Number, FormulaError> {
        self.roll.total()
    }

    /// Chat-renderable projections.
    pub fn formula(&self) -> String {
        self.roll.formula()
    }

    pub fn flavor(&self) -> &str {
        &self.options.flavor
    }

    pub fn roll(&self) -> &Roll {
        &self.roll
    }
}
