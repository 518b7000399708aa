use super::lexer::{lexer, Lexer, TokenKind};
use crate::common::Number;
use crate::data::{DataValue, RollData};
use crate::roll::{FormulaError, RollWarning};
use crate::size::Size;
use crate::term::simplify::simplify;
use crate::term::{
    function, math, DiceTerm, Expr, MathTerm, NumericTerm, OperatorTerm, ParensTerm, StringTerm,
    Term, TermLike,
};
use logos_iter::LogosIter;

type PResult<T> = Result<T, FormulaError>;

/// Read-only constant table for bare identifiers. Never consulted through
/// ambient lookup; sizes resolve to their category indices.
const CONSTANTS: &[(&str, Number)] = &[("true", Number::ONE), ("false", Number::ZERO)];

fn constant(name: &str) -> Option<Number> {
    CONSTANTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, v)| v)
        .or_else(|| Size::from_name(name).map(|s| Number::Int(s.index())))
}

#[derive(Debug)]
pub(crate) struct Parsed {
    pub terms: Vec<Term>,
    pub warnings: Vec<RollWarning>,
}

/// Parses a formula into a flat term sequence, resolving `@path`
/// references against `data` as it goes.
pub(crate) fn parse(formula: &str, data: &RollData) -> PResult<Parsed> {
    let mut parser = Parser {
        lexer: lexer(formula),
        data,
        warnings: Vec::new(),
    };
    let terms = parser.parse_terms(Stops::NONE)?;
    if terms.is_empty() {
        return Err(FormulaError::EmptyFormula);
    }
    Ok(Parsed {
        terms,
        warnings: parser.warnings,
    })
}

/// Token kinds that end the current term sequence without being consumed.
#[derive(Debug, Copy, Clone, Default)]
struct Stops {
    paren: bool,
    comma: bool,
    colon: bool,
}

impl Stops {
    const NONE: Self = Self {
        paren: false,
        comma: false,
        colon: false,
    };
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    data: &'a RollData,
    warnings: Vec<RollWarning>,
}

impl<'a> Parser<'a> {
    fn at_stop(&mut self, stops: Stops) -> bool {
        match self.lexer.peek() {
            Some(TokenKind::RightParen) => stops.paren,
            Some(TokenKind::Comma) => stops.comma,
            Some(TokenKind::Colon) => stops.colon,
            Some(_) => false,
            None => true,
        }
    }

    fn syntax(&mut self, message: impl Into<String>) -> FormulaError {
        FormulaError::Syntax {
            position: self.lexer.span().start,
            fragment: self.lexer.slice().to_owned(),
            message: message.into(),
        }
    }

    fn parse_terms(&mut self, stops: Stops) -> PResult<Vec<Term>> {
        let mut terms = Vec::new();

        while !self.at_stop(stops) {
            let tok = match self.lexer.next() {
                Some(tok) => tok,
                None => break,
            };

            if let Some(op) = tok.as_binary_op() {
                terms.push(OperatorTerm::new(op).into());
                continue;
            }

            match tok {
                TokenKind::Integer(x) => terms.push(NumericTerm::new(x).into()),
                TokenKind::Decimal(x) => terms.push(NumericTerm::new(x).into()),
                TokenKind::Dice(spec) => terms.push(DiceTerm::from_spec(spec)?.into()),
                TokenKind::LeftParen => {
                    let inner = self.parse_terms(Stops {
                        paren: true,
                        ..Stops::NONE
                    })?;
                    self.expect_right_paren()?;
                    terms.push(ParensTerm::new(Expr::new(simplify(inner))).into());
                }
                TokenKind::Question => return self.parse_ternary(terms, stops),
                TokenKind::Flavor(text) => match terms.last_mut() {
                    Some(t) if !t.is_operator() && t.flavor().is_none() => {
                        t.set_flavor(Some(text));
                    }
                    _ => terms.push(StringTerm::new(format!("[{}]", text)).into()),
                },
                TokenKind::Reference(path) => match self.data.get(&path) {
                    Some(DataValue::Number(n)) => terms.push(NumericTerm::new(*n).into()),
                    Some(DataValue::Text(text)) => {
                        terms.push(StringTerm::new(text.clone()).into())
                    }
                    None => {
                        self.warnings.push(RollWarning { path });
                        terms.push(NumericTerm::new(Number::ZERO).into());
                    }
                },
                TokenKind::Identifier(name) => {
                    if matches!(self.lexer.peek(), Some(TokenKind::LeftParen)) {
                        self.lexer.next();
                        let args = self.parse_args()?;
                        terms.push(self.build_call(&name, args)?);
                    } else if let Some(value) = constant(&name) {
                        terms.push(NumericTerm::new(value).into());
                    } else {
                        return Err(FormulaError::UnknownIdentifier(name));
                    }
                }
                TokenKind::ErrZeroDice => {
                    return Err(self.syntax("dice need at least one die and one face"))
                }
                TokenKind::ErrEmptyFlavor => {
                    return Err(self.syntax("flavor annotations cannot be empty"))
                }
                _ => return Err(self.syntax("unexpected token")),
            }
        }

        Ok(terms)
    }

    /// `cond ? a : b` desugars straight into an `ifelse` function term.
    fn parse_ternary(&mut self, condition: Vec<Term>, stops: Stops) -> PResult<Vec<Term>> {
        if condition.is_empty() {
            return Err(self.syntax("'?' without a condition"));
        }
        let if_true = self.parse_terms(Stops {
            colon: true,
            ..stops
        })?;
        match self.lexer.next() {
            Some(TokenKind::Colon) => {}
            _ => return Err(self.syntax("expected ':' after '?' branch")),
        }
        let if_false = self.parse_terms(stops)?;
        if if_true.is_empty() || if_false.is_empty() {
            return Err(self.syntax("'?' branches cannot be empty"));
        }

        let term = function::IfElseTerm::new(
            Expr::new(simplify(condition)),
            Some(Expr::new(simplify(if_true))),
            Some(Expr::new(simplify(if_false))),
        );
        Ok(vec![Term::Function(term.into())])
    }

    fn parse_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.lexer.peek(), Some(TokenKind::RightParen)) {
            self.lexer.next();
            return Ok(args);
        }

        loop {
            let terms = self.parse_terms(Stops {
                paren: true,
                comma: true,
                colon: false,
            })?;
            if terms.is_empty() {
                return Err(self.syntax("empty function argument"));
            }
            args.push(Expr::new(simplify(terms)));

            match self.lexer.next() {
                Some(TokenKind::Comma) => continue,
                Some(TokenKind::RightParen) => break,
                _ => return Err(self.syntax("expected ',' or ')' in argument list")),
            }
        }

        Ok(args)
    }

    /// Bare identifier followed by `(`: function-term registry first, the
    /// math table second, otherwise an unknown function.
    fn build_call(&mut self, name: &str, args: Vec<Expr>) -> PResult<Term> {
        if let Some(descriptor) = function::find(name) {
            return Ok(Term::Function((descriptor.construct)(args)?));
        }
        if math::is_math_fn(name) {
            return Ok(Term::Math(MathTerm::new(name, args)?));
        }
        Err(FormulaError::UnknownFunction(name.to_owned()))
    }

    fn expect_right_paren(&mut self) -> PResult<()> {
        match self.lexer.next() {
            Some(TokenKind::RightParen) => Ok(()),
            _ => Err(self.syntax("expected ')'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::FnTerm;

    fn parse_ok(formula: &str) -> Vec<Term> {
        parse(formula, &RollData::new()).unwrap().terms
    }

    #[test]
    fn test_parse_arithmetic() {
        let terms = parse_ok("1 + 2 * 3");
        assert_eq!(terms.len(), 5);
        assert!(matches!(terms[0], Term::Numeric(_)));
        assert!(matches!(terms[1], Term::Operator(_)));
    }

    #[test]
    fn test_parse_dice_and_parens() {
        let terms = parse_ok("(1d8 + 2) * 3");
        assert!(matches!(terms[0], Term::Parens(_)));
        assert_eq!(terms[0].expression(), "(1d8 + 2)");
    }

    #[test]
    fn test_parse_function_call() {
        let terms = parse_ok("if(3 > 2, 5)");
        assert_eq!(terms.len(), 1);
        match &terms[0] {
            Term::Function(FnTerm::If(t)) => {
                assert_eq!(t.condition.expression(), "3 > 2");
            }
            other => panic!("unexpected term: {:?}", other),
        }
    }

    #[test]
    fn test_parse_math_call_keeps_form() {
        let terms = parse_ok("max(1d6, 4)[test]");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].formula(), "max(1d6, 4)[test]");
        assert!(matches!(terms[0], Term::Math(_)));
    }

    #[test]
    fn test_parse_ternary_desugars() {
        let terms = parse_ok("1 == 1 ? 1d6 : 0");
        assert_eq!(terms.len(), 1);
        match &terms[0] {
            Term::Function(FnTerm::IfElse(t)) => {
                assert_eq!(t.condition.expression(), "1 == 1");
                assert_eq!(t.if_true.as_ref().unwrap().expression(), "1d6");
                assert_eq!(t.if_false.as_ref().unwrap().expression(), "0");
            }
            other => panic!("unexpected term: {:?}", other),
        }
    }

    #[test]
    fn test_parse_references() {
        let data = RollData::new().with("str", 3).with("extra", "2d6");
        let parsed = parse("1d20 + @str + @extra", &data).unwrap();
        assert!(parsed.warnings.is_empty());
        assert!(matches!(parsed.terms[2], Term::Numeric(_)));
        assert!(matches!(parsed.terms[4], Term::String(_)));
    }

    #[test]
    fn test_parse_missing_reference_warns() {
        let parsed = parse("1d20 + @missing", &RollData::new()).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].path, "missing");
        assert_eq!(parsed.terms[2].total(), Some(Number::ZERO));
    }

    #[test]
    fn test_parse_constants() {
        let terms = parse_ok("true + medium");
        assert_eq!(terms[0].total(), Some(Number::ONE));
        assert_eq!(terms[2].total(), Some(Number::Int(4)));
    }

    #[test]
    fn test_parse_flavor_attaches() {
        let terms = parse_ok("2d6[fire] + 3");
        assert_eq!(terms[0].flavor(), Some("fire"));
    }

    #[test]
    fn test_parse_errors() {
        let data = RollData::new();
        assert!(matches!(
            parse("", &data),
            Err(FormulaError::EmptyFormula)
        ));
        assert!(matches!(
            parse("frobnicate(1)", &data),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            parse("bogus", &data),
            Err(FormulaError::UnknownIdentifier(_))
        ));
        assert!(matches!(
            parse("lookup(1, 2)", &data),
            Err(FormulaError::Arity { .. })
        ));
        assert!(matches!(
            parse("0d6", &data),
            Err(FormulaError::Syntax { .. })
        ));
        assert!(matches!(
            parse("(1 + 2", &data),
            Err(FormulaError::Syntax { .. })
        ));
        assert!(matches!(
            parse("1 + 2)", &data),
            Err(FormulaError::Syntax { .. })
        ));
    }
}
