//! Tokenizer for filter expressions.

use crate::error::{FilterError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Str(_) => "string literal".to_string(),
            Self::Number(n) => format!("number {n}"),
            Self::True => "'true'".to_string(),
            Self::False => "'false'".to_string(),
            Self::Null => "'null'".to_string(),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
            Self::Eq => "'=='".to_string(),
            Self::Ne => "'!='".to_string(),
            Self::Lt => "'<'".to_string(),
            Self::Le => "'<='".to_string(),
            Self::Gt => "'>'".to_string(),
            Self::Ge => "'>='".to_string(),
            Self::Match => "'=~'".to_string(),
            Self::NotMatch => "'!~'".to_string(),
            Self::StartsWith => "'=^'".to_string(),
            Self::NotStartsWith => "'!^'".to_string(),
            Self::EndsWith => "'=$'".to_string(),
            Self::NotEndsWith => "'!$'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::LBracket => "'['".to_string(),
            Self::RBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Dot => "'.'".to_string(),
        }
    }
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match ch {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            ',' => single(&mut chars, Token::Comma),
            '.' => single(&mut chars, Token::Dot),
            '=' => {
                chars.next();
                match chars.next().map(|(_, c)| c) {
                    Some('=') => Token::Eq,
                    Some('~') => Token::Match,
                    Some('^') => Token::StartsWith,
                    Some('$') => Token::EndsWith,
                    _ => return Err(FilterError::syntax(position, "expected '==', '=~', '=^' or '=$'")),
                }
            }
            '!' => {
                chars.next();
                match chars.peek().map(|&(_, c)| c) {
                    Some('=') => single(&mut chars, Token::Ne),
                    Some('~') => single(&mut chars, Token::NotMatch),
                    Some('^') => single(&mut chars, Token::NotStartsWith),
                    Some('$') => single(&mut chars, Token::NotEndsWith),
                    _ => Token::Not,
                }
            }
            '<' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c == '=') {
                    single(&mut chars, Token::Le)
                } else {
                    Token::Lt
                }
            }
            '>' => {
                chars.next();
                if chars.peek().is_some_and(|&(_, c)| c == '=') {
                    single(&mut chars, Token::Ge)
                } else {
                    Token::Gt
                }
            }
            '&' | '|' => {
                chars.next();
                if chars.next().map(|(_, c)| c) != Some(ch) {
                    return Err(FilterError::syntax(position, format!("expected '{ch}{ch}'")));
                }
                if ch == '&' { Token::And } else { Token::Or }
            }
            '\'' | '"' => {
                chars.next();
                Token::Str(read_string(&mut chars, ch, position)?)
            }
            c if c.is_ascii_digit() || c == '-' => read_number(&mut chars, position)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                keyword(ident)
            }
            other => {
                return Err(FilterError::syntax(position, format!("unexpected character '{other}'")));
            }
        };

        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn single(chars: &mut Chars<'_>, token: Token) -> Token {
    chars.next();
    token
}

fn keyword(ident: String) -> Token {
    match ident.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Ident(ident),
    }
}

fn read_string(chars: &mut Chars<'_>, quote: char, start: usize) -> Result<String> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next().map(|(_, c)| c) {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(escaped) => out.push(escaped),
                None => break,
            },
            c if c == quote => return Ok(out),
            c => out.push(c),
        }
    }
    Err(FilterError::syntax(start, "unterminated string literal"))
}

fn read_number(chars: &mut Chars<'_>, start: usize) -> Result<Token> {
    let mut text = String::new();
    if let Some(&(_, '-')) = chars.peek() {
        text.push('-');
        chars.next();
    }
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| FilterError::syntax(start, format!("invalid number '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn tokenizes_path_comparison() {
        assert_eq!(
            kinds("alarm.severity == 'MAJOR'"),
            vec![
                Token::Ident("alarm".to_string()),
                Token::Dot,
                Token::Ident("severity".to_string()),
                Token::Eq,
                Token::Str("MAJOR".to_string()),
            ]
        );
    }

    #[test]
    fn tokenizes_all_operators() {
        assert_eq!(
            kinds("== != < <= > >= =~ !~ =^ !^ =$ !$ && || !"),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Match,
                Token::NotMatch,
                Token::StartsWith,
                Token::NotStartsWith,
                Token::EndsWith,
                Token::NotEndsWith,
                Token::And,
                Token::Or,
                Token::Not,
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            kinds("and or not true false null AND"),
            vec![
                Token::And,
                Token::Or,
                Token::Not,
                Token::True,
                Token::False,
                Token::Null,
                Token::Ident("AND".to_string()),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\"b\\c""#), vec![Token::Str("a\"b\\c".to_string())]);
        assert_eq!(kinds(r"'it\'s'"), vec![Token::Str("it's".to_string())]);
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("42 -3 2.5"), vec![
            Token::Number(42.0),
            Token::Number(-3.0),
            Token::Number(2.5),
        ]);
    }

    #[test]
    fn positions_are_byte_offsets() {
        let tokens = tokenize("a  == 'b'").unwrap();
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 3, 6]);
    }

    #[test]
    fn unterminated_string_is_error() {
        let err = tokenize("alarm.uei == 'oops").unwrap_err();
        assert_eq!(err, FilterError::syntax(13, "unterminated string literal"));
    }

    #[test]
    fn lone_ampersand_is_error() {
        assert!(tokenize("a & b").is_err());
    }

    #[test]
    fn lone_equals_is_error() {
        assert!(tokenize("a = b").is_err());
    }

    #[test]
    fn malformed_number_is_error() {
        assert!(tokenize("1.2.3").is_err());
        assert!(tokenize("-").is_err());
    }
}
