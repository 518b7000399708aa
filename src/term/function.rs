use super::{DiceTerm, Expr, TermLike};
use crate::common::*;
use crate::roll::{EvalContext, FormulaError};
use crate::size::{step_die_expr, Size};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Descriptor for a callable formula term. The parser queries descriptors
/// in registration order; dispatch never falls back to reflection.
pub struct FnDescriptor {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub construct: fn(Vec<Expr>) -> Result<FnTerm, FormulaError>,
}

pub static FN_REGISTRY: &[FnDescriptor] = &[
    FnDescriptor {
        name: "if",
        matches: |s| s == "if",
        construct: |args| IfTerm::from_args(args).map(FnTerm::from),
    },
    FnDescriptor {
        name: "ifelse",
        matches: |s| s == "ifelse",
        construct: |args| IfElseTerm::from_args(args).map(FnTerm::from),
    },
    FnDescriptor {
        name: "lookup",
        matches: |s| s == "lookup",
        construct: |args| LookupTerm::from_args(args).map(FnTerm::from),
    },
    FnDescriptor {
        name: "sizeReach",
        matches: |s| s == "sizeReach",
        construct: |args| SizeReachTerm::from_args(args).map(FnTerm::from),
    },
    FnDescriptor {
        name: "sizeRoll",
        matches: |s| s == "sizeRoll",
        construct: |args| SizeRollTerm::from_args(args).map(FnTerm::from),
    },
];

pub(crate) fn find(identifier: &str) -> Option<&'static FnDescriptor> {
    FN_REGISTRY.iter().find(|d| (d.matches)(identifier))
}

fn arity(name: &str, expected: &str, found: usize) -> FormulaError {
    FormulaError::Arity {
        name: name.to_owned(),
        expected: expected.to_owned(),
        found,
    }
}

#[enum_dispatch(TermLike)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "camelCase")]
pub enum FnTerm {
    If(IfTerm),
    IfElse(IfElseTerm),
    Lookup(LookupTerm),
    SizeReach(SizeReachTerm),
    SizeRoll(SizeRollTerm),
}

/// `if(condition, ifTrue?)`: the ifTrue total when the condition is
/// truthy, otherwise 0. A missing ifTrue is the literal 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfTerm {
    pub condition: Expr,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub if_true: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl IfTerm {
    pub(crate) fn from_args(args: Vec<Expr>) -> Result<Self, FormulaError> {
        let found = args.len();
        if !(1..=2).contains(&found) {
            return Err(arity("if", "1 to 2", found));
        }
        let mut args = args.into_iter();
        let condition = args.next().ok_or_else(|| arity("if", "1 to 2", found))?;
        Ok(Self {
            condition,
            if_true: args.next(),
            total: None,
            flavor: None,
        })
    }
}

impl TermLike for IfTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        match &self.if_true {
            Some(t) if !t.is_literal_one() => {
                format!("if({}, {})", self.condition.expression(), t.expression())
            }
            _ => format!("if({})", self.condition.expression()),
        }
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        self.condition.is_deterministic()
            && self.if_true.as_ref().map_or(true, Expr::is_deterministic)
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        let mut ret = self.condition.dice();
        if let Some(t) = &self.if_true {
            ret.extend(t.dice());
        }
        ret
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let cond = self.condition.evaluate(ctx)?;
        let if_true = match &mut self.if_true {
            Some(t) => t.evaluate(ctx)?,
            None => Number::ONE,
        };
        self.total = Some(if cond.is_truthy() { if_true } else { Number::ZERO });
        Ok(())
    }
}

/// `ifelse(condition, ifTrue?, ifFalse?)`. After evaluation only the taken
/// branch is retained; the untaken branch drops out of serialized state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfElseTerm {
    pub condition: Expr,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub if_true: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub if_false: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl IfElseTerm {
    pub fn new(condition: Expr, if_true: Option<Expr>, if_false: Option<Expr>) -> Self {
        Self {
            condition,
            if_true,
            if_false,
            total: None,
            flavor: None,
        }
    }

    pub(crate) fn from_args(args: Vec<Expr>) -> Result<Self, FormulaError> {
        let found = args.len();
        if !(1..=3).contains(&found) {
            return Err(arity("ifelse", "1 to 3", found));
        }
        let mut args = args.into_iter();
        let condition = args.next().ok_or_else(|| arity("ifelse", "1 to 3", found))?;
        Ok(Self::new(condition, args.next(), args.next()))
    }
}

impl TermLike for IfElseTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        let cond = self.condition.expression();
        match (&self.if_true, &self.if_false) {
            (Some(t), Some(f)) => {
                format!("ifelse({}, {}, {})", cond, t.expression(), f.expression())
            }
            (Some(t), None) => format!("ifelse({}, {})", cond, t.expression()),
            // the truthy branch was discarded after a falsy evaluation;
            // any stand-in keeps the reparse on the false branch
            (None, Some(f)) => format!("ifelse({}, 1, {})", cond, f.expression()),
            (None, None) => format!("ifelse({})", cond),
        }
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        self.condition.is_deterministic()
            && self.if_true.as_ref().map_or(true, Expr::is_deterministic)
            && self.if_false.as_ref().map_or(true, Expr::is_deterministic)
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        let mut ret = self.condition.dice();
        if let Some(t) = &self.if_true {
            ret.extend(t.dice());
        }
        if let Some(f) = &self.if_false {
            ret.extend(f.dice());
        }
        ret
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let cond = self.condition.evaluate(ctx)?;
        let if_true = match &mut self.if_true {
            Some(t) => t.evaluate(ctx)?,
            None => Number::ONE,
        };
        let if_false = match &mut self.if_false {
            Some(f) => f.evaluate(ctx)?,
            None => Number::ZERO,
        };
        if cond.is_truthy() {
            self.if_false = None;
            self.total = Some(if_true);
        } else {
            self.if_true = None;
            self.total = Some(if_false);
        }
        Ok(())
    }
}

/// `lookup(search, v0, v1, ...)`: indexes the value list by the search
/// total; anything out of bounds resets to the first value. Only the
/// selected value survives evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTerm {
    pub search: Expr,
    pub values: NonEmpty<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl LookupTerm {
    pub(crate) fn from_args(args: Vec<Expr>) -> Result<Self, FormulaError> {
        let found = args.len();
        if found < 3 {
            return Err(arity("lookup", "at least 3", found));
        }
        let mut args = args.into_iter();
        let search = args.next().ok_or_else(|| arity("lookup", "at least 3", found))?;
        let values = NonEmpty::try_from_vec(args.collect())
            .map_err(|_| arity("lookup", "at least 3", found))?;
        Ok(Self {
            search,
            values,
            total: None,
            flavor: None,
        })
    }
}

impl TermLike for LookupTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        let mut parts = vec![self.search.expression()];
        parts.extend(self.values.iter().map(Expr::expression));
        // a compacted term has one surviving value; doubling it keeps the
        // reparse inside lookup's arity and lands on it at any index
        if self.total.is_some() && self.values.len() == 1 {
            parts.push(self.values[0].expression());
        }
        format!("lookup({})", parts.join(", "))
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        self.search.is_deterministic() && self.values.iter().all(Expr::is_deterministic)
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        let mut ret = self.search.dice();
        for v in &self.values {
            ret.extend(v.dice());
        }
        ret
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let search = self.search.evaluate(ctx)?;
        let mut totals = Vec::with_capacity(self.values.len());
        for value in self.values.iter_mut() {
            totals.push(value.evaluate(ctx)?);
        }

        let index = search.as_int();
        let index = if index >= 0 && (index as usize) < totals.len() {
            index as usize
        } else {
            0
        };
        self.total = Some(totals[index]);
        let selected = self.values[index].clone();
        self.values = NonEmpty::new(selected);
        Ok(())
    }
}

/// Shared argument handling for the size-scaling variants: evaluates
/// `(count, faces, delta?, initialSize?)` and runs the step chart.
fn step_args(
    name: &str,
    args: &mut [Expr],
    ctx: &mut EvalContext<'_>,
) -> Result<(UInt, UInt), FormulaError> {
    let mut totals = Vec::with_capacity(args.len());
    for arg in args.iter_mut() {
        totals.push(arg.evaluate(ctx)?);
    }

    let (count, faces) = match (totals.first(), totals.get(1)) {
        (Some(&c), Some(&f)) => (c, f),
        _ => return Err(arity(name, "2 to 4", totals.len())),
    };
    let count = count.as_int();
    if count <= 0 {
        return Err(FormulaError::value(format!("{} requires a positive die count", name)));
    }
    let faces = faces.as_int();
    if faces <= 0 {
        return Err(FormulaError::value(format!("{} requires positive die faces", name)));
    }
    let delta = totals.get(2).map_or(0, |n| n.as_int());
    let initial = totals
        .get(3)
        .map_or_else(Size::default, |n| Size::from_index(n.as_int()));

    Ok(step_die_expr(count as UInt, faces as UInt, delta, initial))
}

fn size_arity(name: &'static str, args: &[Expr]) -> Result<(), FormulaError> {
    let found = args.len();
    if (2..=4).contains(&found) {
        Ok(())
    } else {
        Err(arity(name, "2 to 4", found))
    }
}

fn size_expression(name: &str, args: &[Expr]) -> String {
    let args = args.iter().map(Expr::expression).collect::<Vec<_>>().join(", ");
    format!("{}({})", name, args)
}

/// `sizeReach(count, faces, delta?, initialSize?)`: steps the die chart
/// and rolls the result, except that a die-less outcome (a stepped-down
/// d1) collapses to plain arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeReachTerm {
    pub args: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub roll: Option<DiceTerm>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl SizeReachTerm {
    pub(crate) fn from_args(args: Vec<Expr>) -> Result<Self, FormulaError> {
        size_arity("sizeReach", &args)?;
        Ok(Self {
            args,
            roll: None,
            total: None,
            flavor: None,
        })
    }
}

impl TermLike for SizeReachTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        size_expression("sizeReach", &self.args)
    }

    fn flavor(&self) -> Option<&str> {
        self.flavor.as_deref()
    }

    fn set_flavor(&mut self, flavor: Option<String>) {
        self.flavor = flavor;
    }

    fn is_deterministic(&self) -> bool {
        // unknown until the stepped expression exists
        self.total.is_some() && self.roll.is_none()
    }

    fn dice(&self) -> Vec<&DiceTerm> {
        self.roll.iter().collect()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let (count, faces) = step_args("sizeReach", &mut self.args, ctx)?;
        if faces == 1 {
            self.total = Some(Number::from(count));
            return Ok(());
        }
        let faces = NonZeroUInt::new(faces)
            .ok_or_else(|| FormulaError::value("sizeReach produced a zero-faced die"))?;
        let mut roll = DiceTerm::new(count, faces);
        roll.evaluate(ctx)?;
        self.total = roll.total();
        self.roll = Some(roll);
        Ok(())
    }
}

/// `sizeRoll(count, faces, delta?, initialSize?)`: steps the die chart and
/// always rolls live dice, d1 included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRollTerm {
    pub args: Vec<Expr>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub roll: Option<DiceTerm>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flavor: Option<String>,
}

impl SizeRollTerm {
    pub(crate) fn from_args(args: Vec<Expr>) -> Result<Self, FormulaError> {
        size_arity("sizeRoll", &args)?;
        Ok(Self {
            args,
            roll: None,
            total: None,
            flavor: None,
        })
    }

    /// The stepped dice expression, e.g. `2d6`, once evaluated.
    pub fn stepped_expression(&self) -> Option<String> {
        self.roll.as_ref().map(TermLike::expression)
    }
}

impl TermLike for SizeRollTerm {
    fn total(&self) -> Option<Number> {
        self.total
    }

    fn expression(&self) -> String {
        size_expression("sizeRoll", &self.args)
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
        self.roll.iter().collect()
    }

    fn evaluate(&mut self, ctx: &mut EvalContext<'_>) -> Result<(), FormulaError> {
        if self.total.is_some() {
            return Ok(());
        }
        let (count, faces) = step_args("sizeRoll", &mut self.args, ctx)?;
        let faces = NonZeroUInt::new(faces)
            .ok_or_else(|| FormulaError::value("sizeRoll produced a zero-faced die"))?;
        let mut roll = DiceTerm::new(count, faces);
        roll.evaluate(ctx)?;
        self.total = roll.total();
        self.roll = Some(roll);
        Ok(())
    }
}
