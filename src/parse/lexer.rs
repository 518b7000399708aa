use crate::common::*;
use crate::term::dice::{DiceMod, DiceModKind, DiceSpec, ModSelector};
use logos::{Lexer as LogosLexer, Logos};
use logos_iter::{LogosIter, PeekableLexer};
use std::fmt;

pub(crate) type Lexer<'a> = PeekableLexer<'a, LogosLexer<'a, TokenKind>, TokenKind>;

pub(crate) fn lexer(s: &str) -> Lexer {
    TokenKind::lexer(s).peekable_lexer()
}

#[derive(Logos, Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    #[regex(r"[0-9]+", |lex| lex.slice().parse())]
    Integer(Int),
    #[regex(r"([0-9]+\.[0-9]*)|(\.[0-9]+)", |lex| lex.slice().parse())]
    Decimal(Float),

    #[regex(r"([1-9][0-9]*)?d[1-9][0-9]*((k|p)(h|l)[0-9]*)*", dice_callback, priority = 6)]
    Dice(DiceSpec),

    #[regex(r"[A-Za-z_][A-Za-z_0-9]*", ident_callback, priority = 2)]
    Identifier(String),

    #[regex(r"@[A-Za-z_][A-Za-z_0-9.]*", |lex| lex.slice()[1..].to_owned())]
    Reference(String),

    #[regex(r"\[[^\]]+\]", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_owned()
    })]
    Flavor(String),

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token(",")]
    Comma,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("//")]
    SlashSlash,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqualEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<=")]
    LessEqual,
    #[token("!=")]
    BangEqual,
    #[token("<")]
    LessThan,
    #[token(">")]
    GreaterThan,

    #[token("[]")]
    ErrEmptyFlavor,
    #[regex(r"0d[0-9]+", priority = 5)]
    #[regex(r"([1-9][0-9]*)?d0[0-9]*", priority = 5)]
    ErrZeroDice,

    #[regex(r"[ \t\r\n]+", logos::skip)]
    #[error]
    Error,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        use TokenKind::*;

        match self {
            Integer(_) => "<integer>",
            Decimal(_) => "<decimal>",
            Dice(_) => "<dice>",
            Identifier(_) => "<identifier>",
            Reference(_) => "<reference>",
            Flavor(_) => "<flavor>",
            LeftParen => "'('",
            RightParen => "')'",
            Comma => "','",
            Question => "'?'",
            Colon => "':'",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            SlashSlash => "'//'",
            Slash => "'/'",
            Percent => "'%'",
            EqualEqual => "'=='",
            GreaterEqual => "'>='",
            LessEqual => "'<='",
            BangEqual => "'!='",
            LessThan => "'<'",
            GreaterThan => "'>'",
            ErrEmptyFlavor | ErrZeroDice | Error => "<error>",
        }
    }

    pub fn as_binary_op(&self) -> Option<BinaryOperator> {
        use BinaryOperator::*;
        Some(match self {
            Self::Plus => Add,
            Self::Minus => Sub,
            Self::Star => Mul,
            Self::Slash => Div,
            Self::SlashSlash => Flr,
            Self::Percent => Rem,
            Self::LessThan => Lt,
            Self::GreaterThan => Gt,
            Self::LessEqual => Le,
            Self::GreaterEqual => Ge,
            Self::EqualEqual => Eq,
            Self::BangEqual => Ne,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn dice_callback<'s>(lex: &mut LogosLexer<'s, TokenKind>) -> Option<DiceSpec> {
    parse_dice_spec(lex.slice())
}

fn ident_callback<'s>(lex: &mut LogosLexer<'s, TokenKind>) -> String {
    lex.slice().to_owned()
}

// The regex has already vetted the shape; `None` only fires on count
// overflow, which logos surfaces as an error token.
fn parse_dice_spec(s: &str) -> Option<DiceSpec> {
    let d = s.find('d')?;
    let count = if d == 0 { 1 } else { s[..d].parse().ok()? };
    let rest = &s[d + 1..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let faces = rest[..end].parse().ok()?;

    let tail = rest[end..].as_bytes();
    let mut mods = Vec::new();
    let mut i = 0;
    while i + 1 < tail.len() {
        let kind = match tail[i] {
            b'k' => DiceModKind::Keep,
            b'p' => DiceModKind::Drop,
            _ => break,
        };
        let sel = match tail[i + 1] {
            b'h' => ModSelector::Highest,
            _ => ModSelector::Lowest,
        };
        i += 2;
        let start = i;
        while i < tail.len() && tail[i].is_ascii_digit() {
            i += 1;
        }
        let count = if start == i {
            1
        } else {
            rest[end + start..end + i].parse().ok()?
        };
        mods.push(DiceMod { kind, sel, count });
    }

    Some(DiceSpec { count, faces, mods })
}
