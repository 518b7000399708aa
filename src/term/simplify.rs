//! Post-parse cleanup over a flat term sequence. Runs once before a roll
//! is considered evaluable, and must be idempotent.

use super::{DiceTerm, NumericTerm, OperatorTerm, Term, TermLike};
use crate::common::BinaryOperator;
use crate::parse::{lex_single, TokenKind};

pub(crate) fn simplify(terms: Vec<Term>) -> Vec<Term> {
    let mut out: Vec<Term> = Vec::with_capacity(terms.len());

    for term in terms {
        // a stray bracketed fragment becomes the previous term's flavor
        if let Term::String(s) = &term {
            if let Some(text) = s.as_flavor_text() {
                let attachable = matches!(
                    out.last(),
                    Some(t @ (Term::Numeric(_) | Term::Function(_))) if t.flavor().is_none()
                );
                if attachable {
                    let text = text.to_owned();
                    if let Some(prev) = out.last_mut() {
                        prev.set_flavor(Some(text));
                    }
                    continue;
                }
            }
        }

        // a dangling fragment absorbs the following non-operator term
        let absorb = !term.is_operator()
            && matches!(out.last(), Some(Term::String(prev)) if prev.as_flavor_text().is_none());
        if absorb {
            if let Some(Term::String(prev)) = out.last_mut() {
                prev.text.push_str(&term.formula());
            }
            continue;
        }

        out.push(term);
    }

    let mut out: Vec<Term> = out.into_iter().map(reclassify).collect();

    // leading operators other than unary minus are dropped
    while let Some(Term::Operator(op)) = out.first() {
        if op.op == BinaryOperator::Sub {
            break;
        }
        out.remove(0);
    }
    // so are trailing dangling operators
    while matches!(out.last(), Some(t) if t.is_operator()) {
        out.pop();
    }

    out
}

/// Re-runs the tokenizer's recognizer over a leftover fragment. Fragments
/// that resolve to a single concrete token become real terms; the rest
/// stay string terms and fail at evaluation time.
fn reclassify(term: Term) -> Term {
    let s = match term {
        Term::String(s) => s,
        other => return other,
    };

    let tok = match lex_single(s.text.trim()) {
        Some(tok) => tok,
        None => return Term::String(s),
    };
    let rebuilt = match tok {
        TokenKind::Integer(x) => Some(Term::from(NumericTerm::new(x))),
        TokenKind::Decimal(x) => Some(Term::from(NumericTerm::new(x))),
        TokenKind::Dice(spec) => DiceTerm::from_spec(spec).ok().map(Term::from),
        tok => tok.as_binary_op().map(|op| Term::from(OperatorTerm::new(op))),
    };

    match rebuilt {
        Some(mut t) => {
            if s.flavor.is_some() {
                t.set_flavor(s.flavor);
            }
            t
        }
        None => Term::String(s),
    }
}
