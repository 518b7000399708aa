pub mod dice;
pub mod function;
pub mod math;
pub(crate) mod simplify;

use crate::common::{BinaryOperator, Number};
use crate::roll::{fold_terms, EvalContext, FormulaError};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

pub use dice::DiceTerm;
pub use function::FnTerm;
pub use function::{IfElseTerm, IfTerm, LookupTerm, SizeReachTerm, SizeRollTerm};
pub use math::MathTerm;

/// Contract shared by every node in a formula's term sequence.
#[enum_dispatch]
pub trait TermLike {
    /// Numeric result; `None` until the term has been evaluated.
    fn total(&self) -> Option<Number>;

    /// Canonical textual form, without the flavor suffix. Must stay
    /// reparsable at every point of the term's lifecycle.
    fn expression(&self) -> String;

    fn flavor(&self) -> Option<&str>;

    fn set_flavor(&mut self, flavor: Option<String>);

    /// Whether re-evaluating would repeat the same total.
    fn is_deterministic(&self) -> bool;

    /// Flattened randomness-producing sub-terms, for tooltip consumers.
    fn dice(&self) -> Vec<&DiceTerm>;

    /// Depth-first evaluation; arguments resolve left-to-right before the
    /// term computes its own total. A no-op on an already-evaluated term.
    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError>;

    /// Expression plus the flavor suffix.
    fn formula(&self) -> String {
        match self.flavor() {
            Some(flavor) => format!("{}[{}]", self.expression(), flavor),
            None => self.expression(),
        }
    }
}

#[enum_dispatch(TermLike)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Numeric(NumericTerm),
    Operator(OperatorTerm),
    Dice(DiceTerm),
    Parens(ParensTerm),
    String(StringTerm),
    Math(MathTerm),
    Function(FnTerm),
}

impl Term {
    pub(crate) fn is_operator(&self) -> bool {
        matches!(self, Term::Operator(_))
    }
}

/// An ordered term sequence with a cached total. Used for whole formulas,
/// parenthetical groups and function-term arguments alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub terms: Vec<Term>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
}

impl Expr {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms, total: None }
    }

    pub fn literal(value: impl Into<Number>) -> Self {
        let value = value.into();
        Self {
            terms: vec![NumericTerm::new(value).into()],
            total: Some(value),
        }
    }

    pub fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<Number, FormulaError> {
        if let Some(total) = self.total {
            return Ok(total);
        }
        for term in &mut self.terms {
            term.evaluate(ctx)?;
        }
        let total = fold_terms(&self.terms)?;
        self.total = Some(total);
        Ok(total)
    }

    pub fn expression(&self) -> String {
        self.terms
            .iter()
            .map(TermLike::formula)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn dice(&self) -> Vec<&DiceTerm> {
        self.terms.iter().flat_map(TermLike::dice).collect()
    }

    pub fn is_deterministic(&self) -> bool {
        self.terms.iter().all(TermLike::is_deterministic)
    }

    pub(crate) fn is_literal_one(&self) -> bool {
        matches!(
            self.terms.as_slice(),
            [Term::Numeric(n)] if n.value == Number::ONE
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericTerm {
    pub value: Number,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl NumericTerm {
    pub fn new(value: impl Into<Number>) -> Self {
        Self {
            value: value.into(),
            flavor: None,
        }
    }
}

impl TermLike for NumericTerm {
    fn total(&self) -> Option<Number> {
        Some(self.value)
    }

    fn expression(&self) -> String {
        self.value.to_string()
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        Vec::new()
    }

    fn evaluate(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct OperatorTerm {
    pub op: BinaryOperator,
}

impl OperatorTerm {
    pub fn new(op: BinaryOperator) -> Self {
        Self { op }
    }
}

impl TermLike for OperatorTerm {
    fn total(&self) -> Option<Number> {
        None
    }

    fn expression(&self) -> String {
        self.op.to_string()
    }

    fn flavor(&self) -> Option<&str> {
        None
    }

    fn set_flavor(&mut self, _flavor: Option<String>) {}

    fn is_deterministic(&self) -> bool {
        true
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        Vec::new()
    }

    fn evaluate(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        Ok(())
    }
}

/// A parenthesized sub-expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParensTerm {
    pub expr: Expr,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl ParensTerm {
    pub fn new(expr: Expr) -> Self {
        Self { expr, flavor: None }
    }
}

impl TermLike for ParensTerm {
    fn total(&self) -> Option<Number> {
        self.expr.total
    }

    fn expression(&self) -> String {
        format!("({})", self.expr.expression())
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        self.expr.is_deterministic()
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        self.expr.dice()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        self.expr.evaluate(ctx).map(|_| ())
    }
}

/// An unparsed fragment awaiting simplification. Fragments that survive
/// the simplifier fail evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringTerm {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl StringTerm {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            flavor: None,
        }
    }

    /// The inner text when the fragment is a bracketed flavor annotation.
    pub(crate) fn as_flavor_text(&self) -> Option<&str> {
        self.text
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .filter(|s| !s.is_empty() && !s.contains('[') && !s.contains(']'))
    }
}

impl TermLike for StringTerm {
    fn total(&self) -> Option<Number> {
        None
    }

    fn expression(&self) -> String {
        self.text.clone()
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        Vec::new()
    }

    fn evaluate(&mut self, _ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        Err(FormulaError::UnresolvedFragment(self.text.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_term() {
        let mut term = NumericTerm::new(5);
        term.set_flavor(Some("fire".to_owned()));
        assert_eq!(term.total(), Some(Number::Int(5)));
        assert_eq!(term.expression(), "5");
        assert_eq!(term.formula(), "5[fire]");
        assert!(term.is_deterministic());
    }

    #[test]
    fn test_string_term_flavor_text() {
        assert_eq!(StringTerm::new("[acid]").as_flavor_text(), Some("acid"));
        assert_eq!(StringTerm::new("2d6").as_flavor_text(), None);
        assert_eq!(StringTerm::new("[]").as_flavor_text(), None);
    }

    #[test]
    fn test_expr_literal_one() {
        assert!(Expr::literal(1).is_literal_one());
        assert!(!Expr::literal(2).is_literal_one());
    }
}
