mod lexer;
mod parser;

pub(crate) use lexer::{lexer, TokenKind};
pub(crate) use parser::{parse, Parsed};

/// Runs the lexer over a fragment and returns its token only when the
/// fragment is exactly one token. The simplifier uses this as the shared
/// recognizer for leftover string fragments.
pub(crate) fn lex_single(s: &str) -> Option<TokenKind> {
    let mut lex = lexer(s);
    let tok = lex.next()?;
    if lex.next().is_some() {
        return None;
    }
    Some(tok)
}
