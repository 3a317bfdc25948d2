use std::fmt;
use std::ops::Range;

/// Byte range within one source unit.
pub type Span = Range<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    // keywords
    Shape,
    Op,
    Async,
    Let,
    New,
    Return,
    Await,
    // punctuation
    ColonColon,
    Colon,
    Arrow,
    Lt,
    Gt,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Dot,
    Comma,
    Semi,
    Eq,
    Hash,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident(name) => return write!(f, "identifier `{name}`"),
            TokenKind::Str(s) => return write!(f, "string \"{s}\""),
            TokenKind::Shape => "`shape`",
            TokenKind::Op => "`op`",
            TokenKind::Async => "`async`",
            TokenKind::Let => "`let`",
            TokenKind::New => "`new`",
            TokenKind::Return => "`return`",
            TokenKind::Await => "`await`",
            TokenKind::ColonColon => "`::`",
            TokenKind::Colon => "`:`",
            TokenKind::Arrow => "`->`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Dot => "`.`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::Eq => "`=`",
            TokenKind::Hash => "`#`",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// Words that cannot be used as identifiers.
pub const KEYWORDS: [&str; 7] = ["shape", "op", "async", "let", "new", "return", "await"];

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "shape" => Some(TokenKind::Shape),
        "op" => Some(TokenKind::Op),
        "async" => Some(TokenKind::Async),
        "let" => Some(TokenKind::Let),
        "new" => Some(TokenKind::New),
        "return" => Some(TokenKind::Return),
        "await" => Some(TokenKind::Await),
        _ => None,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split source text into tokens. The last token is always [`TokenKind::Eof`].
///
/// `//` starts a comment running to the end of the line.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_ident_start(c) {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !is_ident_continue(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            let word = &text[start..end];
            let kind = keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()));
            tokens.push(Token {
                kind,
                span: start..end,
            });
            continue;
        }

        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, '"')) => value.push('"'),
                        Some((_, '\\')) => value.push('\\'),
                        Some((i, other)) => {
                            return Err(LexError {
                                message: format!("unknown escape `\\{other}`"),
                                span: i - 1..i + other.len_utf8(),
                            })
                        }
                        None => break,
                    },
                    '\n' => break,
                    other => value.push(other),
                }
            }
            let Some(end) = end else {
                return Err(LexError {
                    message: "unterminated string literal".to_string(),
                    span: start..text.len(),
                });
            };
            tokens.push(Token {
                kind: TokenKind::Str(value),
                span: start..end,
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let (kind, len) = match (c, next) {
            ('/', Some('/')) => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
            (':', Some(':')) => (TokenKind::ColonColon, 2),
            ('-', Some('>')) => (TokenKind::Arrow, 2),
            (':', _) => (TokenKind::Colon, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semi, 1),
            ('=', _) => (TokenKind::Eq, 1),
            ('#', _) => (TokenKind::Hash, 1),
            (other, _) => {
                return Err(LexError {
                    message: format!("unexpected character `{other}`"),
                    span: start..start + other.len_utf8(),
                })
            }
        };
        if len == 2 {
            chars.next();
        }
        tokens.push(Token {
            kind,
            span: start..start + len,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: text.len()..text.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_type_path() {
        assert_eq!(
            kinds("app.users::User<[core::Int]>"),
            vec![
                TokenKind::Ident("app".into()),
                TokenKind::Dot,
                TokenKind::Ident("users".into()),
                TokenKind::ColonColon,
                TokenKind::Ident("User".into()),
                TokenKind::Lt,
                TokenKind::LBracket,
                TokenKind::Ident("core".into()),
                TokenKind::ColonColon,
                TokenKind::Ident("Int".into()),
                TokenKind::RBracket,
                TokenKind::Gt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_strings_and_comments() {
        assert_eq!(
            kinds("async op // trailing\n#[http(GET, \"/a\\\"b\")] ->"),
            vec![
                TokenKind::Async,
                TokenKind::Op,
                TokenKind::Hash,
                TokenKind::LBracket,
                TokenKind::Ident("http".into()),
                TokenKind::LParen,
                TokenKind::Ident("GET".into()),
                TokenKind::Comma,
                TokenKind::Str("/a\"b".into()),
                TokenKind::RParen,
                TokenKind::RBracket,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = tokenize("let  x").unwrap();
        assert_eq!(tokens[0].span, 0..3);
        assert_eq!(tokens[1].span, 5..6);
        assert_eq!(tokens[2].span, 6..6);
    }

    #[test]
    fn test_lex_errors() {
        let err = tokenize("shape $").unwrap_err();
        assert_eq!(err.span, 6..7);
        assert!(tokenize("\"open").is_err());
    }
}
