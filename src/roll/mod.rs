mod check;
mod damage;
mod error;
mod roller;
mod safe;

use crate::common::*;
use crate::data::RollData;
use crate::term::{simplify::simplify, DiceTerm, NumericTerm, Term, TermLike};
use serde::{Deserialize, Serialize};

pub use check::{CheckOptions, CheckRoll};
pub use damage::{DamageClass, DamageRoll, DamageType};
pub use error::{FormulaError, RollWarning};
pub use roller::{DefaultRoller, RngRoller, Roller, StepRoller};
pub use safe::{safe_roll, safe_roll_async, safe_roll_async_with, safe_roll_with, SafeRollOptions};

/// Per-evaluation switches. `minimize`/`maximize` force worst/best-case
/// dice for previews instead of randomness.
#[derive(Debug, Copy, Clone)]
pub struct EvalOptions {
    pub minimize: bool,
    pub maximize: bool,
    pub max_rolls: Option<usize>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            minimize: false,
            maximize: false,
            max_rolls: Some(1000),
        }
    }
}

/// Shared state threaded through one evaluation pass: the roller, the
/// forced-resolution flags and the runaway-formula guard.
pub struct EvalContext<'a> {
    roller: &'a mut dyn Roller,
    max_rolls: Option<usize>,
    rolls: usize,
    minimize: bool,
    maximize: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(roller: &'a mut dyn Roller, opts: &EvalOptions) -> Self {
        Self {
            roller,
            max_rolls: opts.max_rolls,
            rolls: 0,
            minimize: opts.minimize,
            maximize: opts.maximize,
        }
    }

    fn count_rolls(&mut self, n: usize) -> Result<(), FormulaError> {
        self.rolls += n;
        if self.max_rolls.map_or(false, |max| self.rolls > max) {
            Err(FormulaError::TooManyRolls)
        } else {
            Ok(())
        }
    }

    pub(crate) fn roll_die(&mut self, faces: NonZeroUInt) -> Result<UInt, FormulaError> {
        self.count_rolls(1)?;
        Ok(if self.minimize {
            1
        } else if self.maximize {
            faces.get()
        } else {
            self.roller.roll(faces)
        })
    }
}

enum FoldOp {
    Unary(UnaryOperator),
    Binary(BinaryOperator),
}

impl FoldOp {
    fn precedence(&self) -> u8 {
        match self {
            Self::Unary(_) => 4,
            Self::Binary(op) => op.precedence(),
        }
    }
}

fn apply_binary(left: Number, op: BinaryOperator, right: Number) -> Result<Number, FormulaError> {
    use BinaryOperator::*;

    Ok(match op {
        Add => left + right,
        Sub => left - right,
        Mul => left * right,
        Div => {
            if right == Number::ZERO {
                return Err(FormulaError::ZeroDivision);
            }
            left / right
        }
        Flr => {
            if right == Number::ZERO {
                return Err(FormulaError::ZeroDivision);
            }
            (left / right).floor()
        }
        Rem => {
            if right == Number::ZERO {
                return Err(FormulaError::ZeroModulo);
            }
            left % right
        }
        Lt => (left < right).into(),
        Gt => (left > right).into(),
        Le => (left <= right).into(),
        Ge => (left >= right).into(),
        Eq => (left == right).into(),
        Ne => (left != right).into(),
    })
}

fn apply_fold_op(values: &mut Vec<Number>, op: FoldOp) -> Result<(), FormulaError> {
    let underflow = || FormulaError::MalformedExpression("operator without operands".to_owned());
    match op {
        FoldOp::Unary(UnaryOperator::Pos) => {
            values.last().ok_or_else(underflow)?;
        }
        FoldOp::Unary(UnaryOperator::Neg) => {
            let v = values.pop().ok_or_else(underflow)?;
            values.push(-v);
        }
        FoldOp::Binary(op) => {
            let right = values.pop().ok_or_else(underflow)?;
            let left = values.pop().ok_or_else(underflow)?;
            values.push(apply_binary(left, op, right)?);
        }
    }
    Ok(())
}

/// Folds an evaluated flat term sequence into a single number, honoring
/// the comparison < addition < multiplication precedence ladder and
/// leading unary signs. The empty sequence folds to zero.
pub(crate) fn fold_terms(terms: &[Term]) -> Result<Number, FormulaError> {
    let mut values: Vec<Number> = Vec::new();
    let mut ops: Vec<FoldOp> = Vec::new();
    let mut expect_operand = true;

    for term in terms {
        match term {
            Term::Operator(o) => {
                if expect_operand {
                    match o.op {
                        BinaryOperator::Add => ops.push(FoldOp::Unary(UnaryOperator::Pos)),
                        BinaryOperator::Sub => ops.push(FoldOp::Unary(UnaryOperator::Neg)),
                        other => {
                            return Err(FormulaError::MalformedExpression(format!(
                                "operator '{}' is missing its left-hand operand",
                                other
                            )))
                        }
                    }
                } else {
                    let p = o.op.precedence();
                    while ops.last().map_or(false, |top| top.precedence() >= p) {
                        if let Some(top) = ops.pop() {
                            apply_fold_op(&mut values, top)?;
                        }
                    }
                    ops.push(FoldOp::Binary(o.op));
                    expect_operand = true;
                }
            }
            operand => {
                if !expect_operand {
                    return Err(FormulaError::MalformedExpression(
                        "adjacent operands without an operator".to_owned(),
                    ));
                }
                values.push(operand.total().ok_or(FormulaError::NotEvaluated)?);
                expect_operand = false;
            }
        }
    }

    if values.is_empty() && ops.is_empty() {
        return Ok(Number::ZERO);
    }
    if expect_operand {
        return Err(FormulaError::MalformedExpression(
            "dangling trailing operator".to_owned(),
        ));
    }
    while let Some(op) = ops.pop() {
        apply_fold_op(&mut values, op)?;
    }
    match (values.pop(), values.is_empty()) {
        (Some(v), true) => Ok(v),
        _ => Err(FormulaError::MalformedExpression(
            "unbalanced expression".to_owned(),
        )),
    }
}

/// Options carried by a plain roll. The typed wrappers layer their own
/// richer bags on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollOptions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl RollOptions {
    fn is_empty(&self) -> bool {
        self.flavor.is_none()
    }
}

/// A parsed, simplified formula: the term sequence plus everything needed
/// to evaluate it once and replay it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roll {
    source: String,
    pub(crate) terms: Vec<Term>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    total: Option<Number>,
    #[serde(skip_serializing_if = "RollOptions::is_empty", default)]
    pub options: RollOptions,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    warnings: Vec<RollWarning>,
    /// Non-fatal error attached by the safe evaluation wrapper.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<FormulaError>,
}

impl Roll {
    /// Parses and simplifies `formula`, resolving `@path` references
    /// against `data`. The data context is read, never retained.
    pub fn parse(formula: &str, data: &RollData) -> Result<Self, FormulaError> {
        let parsed = crate::parse::parse(formula, data)?;
        Ok(Self {
            source: formula.trim().to_owned(),
            terms: simplify(parsed.terms),
            total: None,
            options: RollOptions::default(),
            warnings: parsed.warnings,
            error: None,
        })
    }

    /// The zero-valued placeholder the safe wrapper falls back to.
    pub(crate) fn zero() -> Self {
        Self {
            source: "0".to_owned(),
            terms: vec![NumericTerm::new(Number::ZERO).into()],
            total: Some(Number::ZERO),
            options: RollOptions::default(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// The input string this roll was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Reconstructs a reparsable formula from the current term sequence.
    pub fn formula(&self) -> String {
        if self.terms.is_empty() {
            return "0".to_owned();
        }
        self.terms
            .iter()
            .map(TermLike::formula)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn evaluated(&self) -> bool {
        self.total.is_some()
    }

    /// The evaluated total. Unevaluated rolls never report one.
    pub fn total(&self) -> Result<Number, FormulaError> {
        self.total.ok_or(FormulaError::NotEvaluated)
    }

    pub fn dice(&self) -> Vec<&DiceTerm> {
        self.terms.iter().flat_map(TermLike::dice).collect()
    }

    pub fn is_deterministic(&self) -> bool {
        self.terms.iter().all(TermLike::is_deterministic)
    }

    pub fn warnings(&self) -> &[RollWarning] {
        &self.warnings
    }

    fn ensure_unevaluated(&self) -> Result<(), FormulaError> {
        if self.evaluated() {
            Err(FormulaError::AlreadyEvaluated)
        } else {
            Ok(())
        }
    }

    /// Blocking evaluation with the thread-local RNG.
    pub fn evaluate(&mut self) -> Result<Number, FormulaError> {
        self.evaluate_with(&mut DefaultRoller::default(), &EvalOptions::default())
    }

    /// Blocking evaluation. Terms resolve strictly left-to-right.
    pub fn evaluate_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.ensure_unevaluated()?;
        let mut ctx = EvalContext::new(roller, opts);
        for term in &mut self.terms {
            term.evaluate(&mut ctx)?;
        }
        let total = fold_terms(&self.terms)?;
        self.total = Some(total);
        Ok(total)
    }

    /// Suspending evaluation with the thread-local RNG.
    pub async fn evaluate_async(&mut self) -> Result<Number, FormulaError> {
        let mut roller = DefaultRoller::default();
        self.evaluate_async_with(&mut roller, &EvalOptions::default())
            .await
    }

    /// Suspending evaluation. Shares the blocking path's semantics; the
    /// walk only yields at the boundary of a term's own randomness.
    pub async fn evaluate_async_with(
        &mut self,
        roller: &mut dyn Roller,
        opts: &EvalOptions,
    ) -> Result<Number, FormulaError> {
        self.ensure_unevaluated()?;
        let mut ctx = EvalContext::new(roller, opts);
        for term in &mut self.terms {
            if !term.is_deterministic() {
                tokio::task::yield_now().await;
            }
            term.evaluate(&mut ctx)?;
        }
        let total = fold_terms(&self.terms)?;
        self.total = Some(total);
        Ok(total)
    }

    /// In-place total correction used by the static-roll override. Not a
    /// re-evaluation; already-rolled terms stay untouched.
    pub(crate) fn adjust_total(&mut self, delta: Number) {
        if let Some(total) = self.total {
            self.total = Some(total + delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(formula: &str, start: UInt) -> Roll {
        let mut roller = StepRoller::new(start, 1);
        let mut roll = Roll::parse(formula, &RollData::new()).unwrap();
        roll.evaluate_with(&mut roller, &EvalOptions::default()).unwrap();
        roll
    }

    fn check(formula: &str, start: UInt, expected: impl Into<Number>) {
        assert_eq!(eval(formula, start).total().unwrap(), expected.into());
    }

    #[test]
    fn test_eval_numbers() {
        check("2", 1, 2);
        check("2.5", 1, 2.5);
        check("-2", 1, -2);
        check("- - 2", 1, 2);
    }

    #[test]
    fn test_eval_precedence() {
        check("2 + 3", 1, 5);
        check("1 + 2 * 3", 1, 7);
        check("2 * (1 - 3)", 1, -4);
        check("10 / 4", 1, 2);
        check("10 // 4", 1, 2);
        check("3.5 % 2", 1, 1.5);
        check("1 + 2 == 3", 1, 1);
        check("2 > 3", 1, 0);
    }

    #[test]
    fn test_eval_dice() {
        check("1d20 + 4", 10, 14);
        check("2d6", 10, 4 + 5);
        check("3d6kh1 * 2", 4, 12);
    }

    #[test]
    fn test_eval_minimize_maximize() {
        let mut roll = Roll::parse("2d6 + 1", &RollData::new()).unwrap();
        let mut roller = StepRoller::new(3, 1);
        let opts = EvalOptions {
            minimize: true,
            ..EvalOptions::default()
        };
        roll.evaluate_with(&mut roller, &opts).unwrap();
        assert_eq!(roll.total().unwrap(), Number::Int(3));

        let mut roll = Roll::parse("2d6 + 1", &RollData::new()).unwrap();
        let opts = EvalOptions {
            maximize: true,
            ..EvalOptions::default()
        };
        roll.evaluate_with(&mut roller, &opts).unwrap();
        assert_eq!(roll.total().unwrap(), Number::Int(13));
    }

    #[test]
    fn test_unevaluated_roll_has_no_total() {
        let roll = Roll::parse("1d6", &RollData::new()).unwrap();
        assert!(!roll.evaluated());
        assert_eq!(roll.total(), Err(FormulaError::NotEvaluated));
    }

    #[test]
    fn test_no_reevaluation() {
        let mut roll = eval("1d6", 3);
        let mut roller = StepRoller::new(1, 1);
        assert_eq!(
            roll.evaluate_with(&mut roller, &EvalOptions::default()),
            Err(FormulaError::AlreadyEvaluated)
        );
    }

    #[test]
    fn test_max_rolls_guard() {
        let mut roll = Roll::parse("100d6", &RollData::new()).unwrap();
        let mut roller = StepRoller::new(1, 1);
        let opts = EvalOptions {
            max_rolls: Some(50),
            ..EvalOptions::default()
        };
        assert_eq!(
            roll.evaluate_with(&mut roller, &opts),
            Err(FormulaError::TooManyRolls)
        );
    }

    #[test]
    fn test_formula_round_trip() {
        let roll = Roll::parse("1d8 + 2 * 3", &RollData::new()).unwrap();
        let text = roll.formula();
        let again = Roll::parse(&text, &RollData::new()).unwrap();
        assert_eq!(again.formula(), text);
    }

    #[test]
    fn test_division_by_zero() {
        let mut roll = Roll::parse("1 / 0", &RollData::new()).unwrap();
        let mut roller = StepRoller::new(1, 1);
        assert_eq!(
            roll.evaluate_with(&mut roller, &EvalOptions::default()),
            Err(FormulaError::ZeroDivision)
        );
    }

    #[test]
    fn test_dice_listing() {
        let roll = eval("1d6 + (1d8 + 2) + if(1, 1d4)", 1);
        assert_eq!(roll.dice().len(), 3);
    }
}
