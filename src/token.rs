use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Let,
    If,
    Else,
    While,
    For,
    Def,
    Return,
    Class,
    Struct,
    Null,
    True,
    False,
    Parallel,
    Delete,
    Input,
    Print,
    And,
    Or,
    Not,

    // Literals and Identifiers
    Ident(String),
    Int(i64),
    Float(f64),
    String(String),

    // Arithmetic Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,

    // Comparison Operators
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,

    Assign,
    Arrow,

    // Delimiters
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl Token {
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "let" => Token::Let,
            "if" => Token::If,
            "else" => Token::Else,
            "while" => Token::While,
            "for" => Token::For,
            "def" => Token::Def,
            "return" => Token::Return,
            "class" => Token::Class,
            "struct" => Token::Struct,
            "null" => Token::Null,
            "true" => Token::True,
            "false" => Token::False,
            "parallel" => Token::Parallel,
            "delete" => Token::Delete,
            "input" => Token::Input,
            "print" => Token::Print,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => return None,
        };
        Some(token)
    }

    /// Human-readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{}`", name),
            Token::Int(n) => format!("number `{}`", n),
            Token::Float(n) => format!("number `{}`", n),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Eof => "end of input".to_string(),
            other => format!("`{}`", other),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Let => "let",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::Def => "def",
            Token::Return => "return",
            Token::Class => "class",
            Token::Struct => "struct",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::Parallel => "parallel",
            Token::Delete => "delete",
            Token::Input => "input",
            Token::Print => "print",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Ident(name) => return write!(f, "{}", name),
            Token::Int(n) => return write!(f, "{}", n),
            Token::Float(n) => return write!(f, "{}", n),
            Token::String(s) => return write!(f, "\"{}\"", s),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::Greater => ">",
            Token::Less => "<",
            Token::GreaterEq => ">=",
            Token::LessEq => "<=",
            Token::Assign => "=",
            Token::Arrow => "->",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Eof => "<eof>",
        };
        f.write_str(text)
    }
}
