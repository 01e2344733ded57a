use crate::error::{ExprError, Result, Span};
use logos::Logos;

/// Tokens of the query expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Keywords
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLiteral(i64),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape(lex.slice()))]
    StringLiteral(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // Punctuation
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,

    // End of input
    Eof,
}

/// Strip the surrounding quotes and resolve backslash escapes
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self { token, span }
    }
}

/// Tokenize an expression, appending a trailing [`Token::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut lex = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(token_result) = lex.next() {
        let span = Span::new(lex.span().start, lex.span().end);
        match token_result {
            Ok(token) => tokens.push(SpannedToken::new(token, span)),
            Err(_) => {
                return Err(ExprError::Lex {
                    span,
                    message: format!("Invalid token: {}", &source[span.start..span.end]),
                });
            }
        }
    }

    tokens.push(SpannedToken::new(
        Token::Eof,
        Span::new(source.len(), source.len()),
    ));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = kinds("and or not in if else True False None");
        assert_eq!(
            tokens,
            vec![
                Token::And,
                Token::Or,
                Token::Not,
                Token::In,
                Token::If,
                Token::Else,
                Token::True,
                Token::False,
                Token::None,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_identifiers_are_not_keywords() {
        let tokens = kinds("index android status_x");
        assert!(matches!(&tokens[0], Token::Identifier(s) if s == "index"));
        assert!(matches!(&tokens[1], Token::Identifier(s) if s == "android"));
        assert!(matches!(&tokens[2], Token::Identifier(s) if s == "status_x"));
    }

    #[test]
    fn test_literals() {
        let tokens = kinds(r#"42 3.5 "double" 'single'"#);
        assert_eq!(tokens[0], Token::IntLiteral(42));
        assert_eq!(tokens[1], Token::FloatLiteral(3.5));
        assert_eq!(tokens[2], Token::StringLiteral("double".into()));
        assert_eq!(tokens[3], Token::StringLiteral("single".into()));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r"'it\'s' 'a\nb'");
        assert_eq!(tokens[0], Token::StringLiteral("it's".into()));
        assert_eq!(tokens[1], Token::StringLiteral("a\nb".into()));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("+ - * / % == != < <= > >= && || !");
        assert_eq!(tokens[5], Token::EqEq);
        assert_eq!(tokens[8], Token::Le);
        assert_eq!(tokens[11], Token::AndAnd);
        assert_eq!(tokens[13], Token::Bang);
    }

    #[test]
    fn test_lowercase_literals_are_identifiers() {
        let tokens = kinds("true false none");
        assert!(matches!(&tokens[0], Token::Identifier(s) if s == "true"));
        assert!(matches!(&tokens[2], Token::Identifier(s) if s == "none"));
    }

    #[test]
    fn test_int_literal_out_of_range() {
        assert_eq!(kinds("9223372036854775807")[0], Token::IntLiteral(i64::MAX));
        let err = tokenize("x > 99999999999999999999").unwrap_err();
        assert!(matches!(err, ExprError::Lex { span, .. } if span.start == 4));
    }

    #[test]
    fn test_invalid_token() {
        let err = tokenize("title @ 3").unwrap_err();
        assert!(matches!(err, ExprError::Lex { span, .. } if span.start == 6));
    }
}
