use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaError {
    #[error("syntax error at position {position} ({fragment:?}): {message}")]
    Syntax {
        position: usize,
        fragment: String,
        message: String,
    },
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("unknown identifier {0:?}")]
    UnknownIdentifier(String),
    #[error("{name} expects {expected} arguments, got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("a check must lead with a die or a plain number, found {0:?}")]
    UnsupportedLeadingTerm(String),
    #[error("empty formula")]
    EmptyFormula,
    #[error("unresolved fragment {0:?}")]
    UnresolvedFragment(String),
    #[error("malformed expression: {0}")]
    MalformedExpression(String),
    #[error("{0}")]
    Value(String),
    #[error("cannot divide by zero")]
    ZeroDivision,
    #[error("cannot take modulus by zero")]
    ZeroModulo,
    #[error("too many dice rolled")]
    TooManyRolls,
    #[error("roll has not been evaluated")]
    NotEvaluated,
    #[error("roll has already been evaluated")]
    AlreadyEvaluated,
    #[error("@{0} resolved to nothing and was replaced with 0")]
    NullReference(String),
}

impl FormulaError {
    pub fn value(msg: impl ToString) -> Self {
        Self::Value(msg.to_string())
    }
}

/// A soft warning recorded during parsing: the referenced path resolved to
/// nothing and 0 was substituted.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RollWarning {
    pub path: String,
}

impl RollWarning {
    pub(crate) fn as_error(&self) -> FormulaError {
        FormulaError::NullReference(self.path.clone())
    }
}

impl fmt::Display for RollWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} resolved to nothing and was replaced with 0", self.path)
    }
}
