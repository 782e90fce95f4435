use chumsky::prelude::*;
use thiserror::Error;

use crate::diagnostic::{line_col, Diagnostic, Label, Span};
use crate::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub lexeme: String,
    pub span: Span,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("Invalid character '{found}' at line {line}, column {col}")]
    InvalidCharacter { found: char, line: usize, col: usize, span: Span },
    #[error("Unexpected end of input at line {line}, column {col}")]
    UnexpectedEof { line: usize, col: usize, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::InvalidCharacter { span, .. } | LexError::UnexpectedEof { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LexError::InvalidCharacter { found, span, .. } => {
                Diagnostic::error(format!("invalid character '{}'", found))
                    .with_code("E0100")
                    .with_label(Label::primary(*span, "not recognized here"))
            }
            LexError::UnexpectedEof { span, .. } => Diagnostic::error("unexpected end of input")
                .with_code("E0100")
                .with_label(Label::primary(*span, "input ends here"))
                .with_help("check for an unterminated string literal"),
        }
    }
}

pub fn lexer<'a>()
-> impl Parser<'a, &'a str, Vec<(Token, SimpleSpan)>, extra::Err<Simple<'a, char>>> {
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(|s: &str| {
            if s.contains('.') {
                Token::Float(s.parse().unwrap_or(0.0))
            } else {
                // Literals too large for i64 degrade to floats.
                s.parse::<i64>()
                    .map(Token::Int)
                    .unwrap_or_else(|_| Token::Float(s.parse().unwrap_or(f64::INFINITY)))
            }
        });

    let double_quoted = just('"')
        .ignore_then(none_of("\"").repeated().to_slice())
        .then_ignore(just('"'));
    let single_quoted = just('\'')
        .ignore_then(none_of("'").repeated().to_slice())
        .then_ignore(just('\''));
    let string = double_quoted
        .or(single_quoted)
        .map(|s: &str| Token::String(s.to_string()));

    let ident = text::ident().map(|s: &str| Token::keyword(s).unwrap_or_else(|| Token::Ident(s.to_string())));

    let op_double = choice((
        just("==").to(Token::Eq),
        just("!=").to(Token::NotEq),
        just(">=").to(Token::GreaterEq),
        just("<=").to(Token::LessEq),
        just("->").to(Token::Arrow),
    ));

    let op_single = choice((
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
        just('^').to(Token::Caret),
        just('>').to(Token::Greater),
        just('<').to(Token::Less),
        just('=').to(Token::Assign),
        just('.').to(Token::Dot),
        just(',').to(Token::Comma),
        just(';').to(Token::Semicolon),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('{').to(Token::LBrace),
        just('}').to(Token::RBrace),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
    ));

    let comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    let token = number.or(string).or(ident).or(op_double).or(op_single);

    token
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(comment.clone().repeated())
        .padded()
        .repeated()
        .collect()
        .then_ignore(comment.repeated())
        .padded()
        .then_ignore(end())
}

/// Tokenizes a whole program. The returned sequence always ends with `Token::Eof`.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
    let raw = match lexer().parse(source).into_result() {
        Ok(tokens) => tokens,
        Err(errors) => {
            let offset = errors.first().map(|e| e.span().start).unwrap_or(0);
            let (line, col) = line_col(source, offset);
            return Err(match source.get(offset..).and_then(|rest| rest.chars().next()) {
                Some(found) => LexError::InvalidCharacter {
                    found,
                    line,
                    col,
                    span: Span::new(offset, offset + found.len_utf8()),
                },
                None => LexError::UnexpectedEof {
                    line,
                    col,
                    span: Span::new(offset, offset),
                },
            });
        }
    };

    let mut tokens = Vec::with_capacity(raw.len() + 1);
    let mut cursor = Cursor::default();
    for (token, span) in raw {
        let (line, col) = cursor.advance_to(source, span.start);
        tokens.push(SpannedToken {
            token,
            lexeme: source[span.start..span.end].to_string(),
            span: Span::new(span.start, span.end),
            line,
            col,
        });
    }
    let (line, col) = cursor.advance_to(source, source.len());
    tokens.push(SpannedToken {
        token: Token::Eof,
        lexeme: String::new(),
        span: Span::new(source.len(), source.len()),
        line,
        col,
    });

    tracing::debug!(count = tokens.len(), "tokenized program");
    Ok(tokens)
}

/// Incremental line/column tracking so positions are computed in one pass.
struct Cursor {
    offset: usize,
    line: usize,
    col: usize,
}

impl Default for Cursor {
    fn default() -> Self {
        Self { offset: 0, line: 1, col: 1 }
    }
}

impl Cursor {
    fn advance_to(&mut self, source: &str, target: usize) -> (usize, usize) {
        for ch in source[self.offset..target].chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.offset = target;
        (self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("Lexer failed")
            .into_iter()
            .map(|st| st.token)
            .collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(lex("let"), vec![Token::Let, Token::Eof]);
        assert_eq!(lex("parallel"), vec![Token::Parallel, Token::Eof]);
        assert_eq!(lex("delete"), vec![Token::Delete, Token::Eof]);
        assert_eq!(lex("null"), vec![Token::Null, Token::Eof]);
        assert_eq!(
            lex("def class struct"),
            vec![Token::Def, Token::Class, Token::Struct, Token::Eof]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(lex("foo"), vec![Token::Ident("foo".to_string()), Token::Eof]);
        assert_eq!(lex("_tmp1"), vec![Token::Ident("_tmp1".to_string()), Token::Eof]);
        assert_eq!(lex("letter"), vec![Token::Ident("letter".to_string()), Token::Eof]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![Token::Int(42), Token::Eof]);
        assert_eq!(lex("0"), vec![Token::Int(0), Token::Eof]);
        assert_eq!(lex("3.14"), vec![Token::Float(3.14), Token::Eof]);
    }

    #[test]
    fn test_strings_either_quote() {
        assert_eq!(lex(r#""hello""#), vec![Token::String("hello".to_string()), Token::Eof]);
        assert_eq!(lex("'world'"), vec![Token::String("world".to_string()), Token::Eof]);
        assert_eq!(lex(r#"'say "hi"'"#), vec![Token::String("say \"hi\"".to_string()), Token::Eof]);
        assert_eq!(lex(r#""""#), vec![Token::String(String::new()), Token::Eof]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("+ - * / % ^ > < >= <= == != = ->"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Caret,
                Token::Greater,
                Token::Less,
                Token::GreaterEq,
                Token::LessEq,
                Token::Eq,
                Token::NotEq,
                Token::Assign,
                Token::Arrow,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = "// leading comment\nlet x = 10; // trailing\n// only comment";
        assert_eq!(
            lex(source),
            vec![
                Token::Let,
                Token::Ident("x".to_string()),
                Token::Assign,
                Token::Int(10),
                Token::Semicolon,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_comment_only_program() {
        assert_eq!(lex("// nothing here\n"), vec![Token::Eof]);
        assert_eq!(lex("   \n\t"), vec![Token::Eof]);
    }

    #[test]
    fn test_lambda_tokens() {
        assert_eq!(
            lex("(a, b) -> a + b"),
            vec![
                Token::LParen,
                Token::Ident("a".to_string()),
                Token::Comma,
                Token::Ident("b".to_string()),
                Token::RParen,
                Token::Arrow,
                Token::Ident("a".to_string()),
                Token::Plus,
                Token::Ident("b".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_subtraction_is_not_a_negative_literal() {
        assert_eq!(
            lex("i-1"),
            vec![Token::Ident("i".to_string()), Token::Minus, Token::Int(1), Token::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("let x = 1;\n  print(x);").unwrap();
        let print = tokens.iter().find(|t| t.token == Token::Print).unwrap();
        assert_eq!((print.line, print.col), (2, 3));
        assert_eq!(print.lexeme, "print");
        assert_eq!(tokens.last().unwrap().token, Token::Eof);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("let x = 1;\nlet y = @;").unwrap_err();
        match err {
            LexError::InvalidCharacter { found, line, col, .. } => {
                assert_eq!(found, '@');
                assert_eq!((line, col), (2, 9));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        assert!(tokenize("print(\"oops);").is_err());
    }
}
