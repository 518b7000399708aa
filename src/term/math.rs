use super::{DiceTerm, Expr, TermLike};
use crate::common::Number;
use crate::roll::{EvalContext, FormulaError};
use serde::{Deserialize, Serialize};

/// An entry in the read-only math function table. Raw call expressions
/// resolve through this table and never through ambient lookup.
struct MathFn {
    name: &'static str,
    min_args: usize,
    max_args: usize,
    apply: fn(&[Number]) -> Number,
}

fn first(v: &[Number]) -> Number {
    v.first().copied().unwrap_or(Number::ZERO)
}

const MATH_FNS: &[MathFn] = &[
    MathFn { name: "abs", min_args: 1, max_args: 1, apply: |v| Number::Float(first(v).as_float().abs()) },
    MathFn { name: "ceil", min_args: 1, max_args: 1, apply: |v| Number::Int(first(v).as_float().ceil() as i32) },
    MathFn { name: "floor", min_args: 1, max_args: 1, apply: |v| first(v).floor() },
    MathFn { name: "round", min_args: 1, max_args: 1, apply: |v| Number::Int(first(v).as_float().round() as i32) },
    MathFn { name: "sqrt", min_args: 1, max_args: 1, apply: |v| Number::Float(first(v).as_float().sqrt()) },
    MathFn {
        name: "min",
        min_args: 1,
        max_args: usize::MAX,
        apply: |v| v.iter().copied().fold(first(v), |a, b| if b < a { b } else { a }),
    },
    MathFn {
        name: "max",
        min_args: 1,
        max_args: usize::MAX,
        apply: |v| v.iter().copied().fold(first(v), |a, b| if b > a { b } else { a }),
    },
];

fn math_fn(name: &str) -> Option<&'static MathFn> {
    MATH_FNS.iter().find(|f| f.name == name)
}

pub(crate) fn is_math_fn(name: &str) -> bool {
    math_fn(name).is_some()
}

/// A call to a math-table function. Keeps its call form through
/// simplification and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathTerm {
    pub name: String,
    pub args: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl MathTerm {
    pub(crate) fn new(name: &str, args: Vec<Expr>) -> Result<Self, FormulaError> {
        let f = math_fn(name).ok_or_else(|| FormulaError::UnknownFunction(name.to_owned()))?;
        if args.len() < f.min_args || args.len() > f.max_args {
            return Err(FormulaError::Arity {
                name: name.to_owned(),
                expected: if f.max_args == usize::MAX {
                    format!("at least {}", f.min_args)
                } else if f.min_args == f.max_args {
                    f.min_args.to_string()
                } else {
                    format!("{} to {}", f.min_args, f.max_args)
                },
                found: args.len(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            args,
            total: None,
            flavor: None,
        })
    }
}

impl TermLike for MathTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        let args = self
            .args
            .iter()
            .map(Expr::expression)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, args)
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        self.args.iter().all(Expr::is_deterministic)
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        self.args.iter().flat_map(Expr::dice).collect()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &mut self.args {
            values.push(arg.evaluate(ctx)?);
        }
        let f = math_fn(&self.name)
            .ok_or_else(|| FormulaError::UnknownFunction(self.name.clone()))?;
        self.total = Some((f.apply)(&values));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roll::{EvalOptions, StepRoller};

    fn eval(name: &str, args: Vec<Expr>) -> Number {
        let mut term = MathTerm::new(name, args).unwrap();
        let mut roller = StepRoller::new(1, 1);
        let mut ctx = EvalContext::new(&mut roller, &EvalOptions::default());
        term.evaluate(&mut ctx).unwrap();
        term.total().unwrap()
    }

    #[test]
    fn test_table_application() {
        assert_eq!(eval("max", vec![Expr::literal(3), Expr::literal(7)]), Number::Int(7));
        assert_eq!(eval("min", vec![Expr::literal(3), Expr::literal(7)]), Number::Int(3));
        assert_eq!(eval("floor", vec![Expr::literal(2.9)]), Number::Int(2));
        assert_eq!(eval("abs", vec![Expr::literal(-4)]), Number::Float(4.0));
    }

    #[test]
    fn test_unknown_and_arity() {
        assert!(matches!(
            MathTerm::new("nope", vec![Expr::literal(1)]),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            MathTerm::new("sqrt", vec![]),
            Err(FormulaError::Arity { .. })
        ));
    }

    #[test]
    fn test_call_form_expression() {
        let term = MathTerm::new("max", vec![Expr::literal(1), Expr::literal(4)]).unwrap();
        assert_eq!(term.expression(), "max(1, 4)");
    }
}
