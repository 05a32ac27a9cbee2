//! Lexer and parser for the S-expression tree format.
//!
//! ```text
//! ; a comment
//! (Block
//!   (Call "f" @id="f()"
//!     (Arg "x")))
//! ```

use std::collections::VecDeque;

use facet::Facet;
use gumleaf::indextree::NodeId;
use gumleaf::{NodeData, Tree, TreeBuilder};

/// A malformed S-expression. Offsets are in bytes from the start of the input.
#[derive(Facet, Debug, Clone, PartialEq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum SyntaxError {
    /// expected {expected} at byte {offset}, found {found}
    Unexpected {
        offset: usize,
        expected: String,
        found: String,
    },

    /// string starting at byte {offset} is never closed
    UnterminatedString { offset: usize },

    /// unknown escape `\{escape}` at byte {offset}
    InvalidEscape { offset: usize, escape: String },

    /// node opened at byte {offset} is never closed
    Unclosed { offset: usize },

    /// unexpected input after the root node at byte {offset}
    TrailingInput { offset: usize },
}

impl SyntaxError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match *self {
            SyntaxError::Unexpected { offset, .. }
            | SyntaxError::UnterminatedString { offset }
            | SyntaxError::InvalidEscape { offset, .. }
            | SyntaxError::Unclosed { offset }
            | SyntaxError::TrailingInput { offset } => offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    /// A node type.
    Word(String),
    /// Unescaped contents of a string literal.
    Str(String),
    /// `@key=`, the string follows.
    MetaKey(String),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Word(word) => format!("`{word}`"),
            TokenKind::Str(_) => "a string".to_string(),
            TokenKind::MetaKey(key) => format!("`@{key}=`"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

/// Split `text` into tokens, dropping whitespace and comments.
fn lex(text: &str) -> Result<VecDeque<Token>, SyntaxError> {
    let mut tokens = VecDeque::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            ';' => {
                while chars.next_if(|&(_, c)| c != '\n').is_some() {}
                continue;
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '"' => {
                chars.next();
                TokenKind::Str(lex_string(&mut chars, offset)?)
            }
            '@' => {
                chars.next();
                let key = lex_word(&mut chars);
                if key.is_empty() || chars.next_if(|&(_, c)| c == '=').is_none() {
                    return Err(SyntaxError::Unexpected {
                        offset,
                        expected: "`@key=`".to_string(),
                        found: format!("`@{key}`"),
                    });
                }
                TokenKind::MetaKey(key)
            }
            c if is_word_start(c) => TokenKind::Word(lex_word(&mut chars)),
            c => {
                return Err(SyntaxError::Unexpected {
                    offset,
                    expected: "a token".to_string(),
                    found: format!("`{c}`"),
                });
            }
        };
        tokens.push_back(Token { kind, offset });
    }

    Ok(tokens)
}

type Chars<'a> = core::iter::Peekable<core::str::CharIndices<'a>>;

fn lex_word(chars: &mut Chars<'_>) -> String {
    let mut word = String::new();
    if let Some((_, c)) = chars.next_if(|&(_, c)| is_word_start(c)) {
        word.push(c);
        while let Some((_, c)) = chars.next_if(|&(_, c)| is_word_char(c)) {
            word.push(c);
        }
    }
    word
}

/// Contents of a string literal whose opening quote is at `start` and
/// has already been consumed.
fn lex_string(chars: &mut Chars<'_>, start: usize) -> Result<String, SyntaxError> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(SyntaxError::UnterminatedString { offset: start }),
            Some((_, '"')) => return Ok(out),
            Some((at, '\\')) => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => {
                    return Err(SyntaxError::InvalidEscape {
                        offset: at,
                        escape: other.to_string(),
                    });
                }
                None => return Err(SyntaxError::UnterminatedString { offset: start }),
            },
            Some((_, c)) => out.push(c),
        }
    }
}

struct Parser {
    tokens: VecDeque<Token>,
    builder: TreeBuilder,
    /// Byte length of the input, reported when tokens run out.
    end: usize,
}

impl Parser {
    fn current(&self) -> Option<&TokenKind> {
        self.tokens.front().map(|t| &t.kind)
    }

    fn bump(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    fn offset(&self) -> usize {
        self.tokens.front().map_or(self.end, |t| t.offset)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        SyntaxError::Unexpected {
            offset: self.offset(),
            expected: expected.to_string(),
            found: self
                .current()
                .map_or_else(|| "end of input".to_string(), TokenKind::describe),
        }
    }

    fn parse(mut self) -> Result<Tree, SyntaxError> {
        if self.current().is_none() {
            return Ok(Tree::empty());
        }

        // open nodes and the offset of their `(`
        let mut open: Vec<(NodeId, usize)> = vec![self.node(None)?];
        while let Some(&(id, start)) = open.last() {
            match self.current() {
                Some(TokenKind::LParen) => open.push(self.node(Some(id))?),
                Some(TokenKind::RParen) => {
                    self.bump();
                    open.pop();
                }
                None => return Err(SyntaxError::Unclosed { offset: start }),
                Some(_) => return Err(self.unexpected("`(` or `)`")),
            }
        }

        if self.current().is_some() {
            return Err(SyntaxError::TrailingInput {
                offset: self.offset(),
            });
        }
        Ok(self.builder.build())
    }

    /// `( TYPE STRING? META*`, attached under `parent`.
    fn node(&mut self, parent: Option<NodeId>) -> Result<(NodeId, usize), SyntaxError> {
        let start = self.offset();
        if self.current() != Some(&TokenKind::LParen) {
            return Err(self.unexpected("`(`"));
        }
        self.bump();

        let mut data = match self.current() {
            Some(TokenKind::Word(kind)) => NodeData::new(kind.as_str()),
            _ => return Err(self.unexpected("a node type")),
        };
        self.bump();

        if let Some(TokenKind::Str(value)) = self.current() {
            data = data.with_value(value.as_str());
            self.bump();
        }

        while let Some(TokenKind::MetaKey(key)) = self.current() {
            let key = key.clone();
            self.bump();
            match self.bump() {
                Some(Token {
                    kind: TokenKind::Str(value),
                    ..
                }) => {
                    data.metadata.insert(key, value);
                }
                other => {
                    let offset = other.as_ref().map_or(self.end, |t| t.offset);
                    return Err(SyntaxError::Unexpected {
                        offset,
                        expected: "a string".to_string(),
                        found: other
                            .map_or_else(|| "end of input".to_string(), |t| t.kind.describe()),
                    });
                }
            }
        }

        let id = match parent {
            None => self.builder.set_root(data),
            Some(parent) => self.builder.add_child(parent, data),
        };
        Ok((id, start))
    }
}

/// Parse S-expression text into a tree. Empty input (or only comments)
/// gives an empty tree.
pub fn parse(text: &str) -> Result<Tree, SyntaxError> {
    let tokens = lex(text)?;
    Parser {
        tokens,
        builder: TreeBuilder::new(),
        end: text.len(),
    }
    .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn parses_types_values_and_metadata() {
        let tree = parse(
            r#"
            ; i++
            (Expr @id="postfix"
              (Name "i")
              (Op "++"))
            "#,
        )
        .unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.kind(root), "Expr");
        assert_eq!(tree.value(root), None);
        assert_eq!(tree.get(root).metadata.identity(), Some("postfix"));

        let op = tree.child(root, 1).unwrap();
        assert_eq!(tree.kind(op), "Op");
        assert_eq!(tree.value(op), Some("++"));
    }

    #[test]
    fn escapes_and_type_characters() {
        let tree = parse(r#"(java.lang:Type-1 "a \"b\"\n\\")"#).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.kind(root), "java.lang:Type-1");
        assert_eq!(tree.value(root), Some("a \"b\"\n\\"));
    }

    #[test]
    fn empty_input_is_an_empty_tree() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  ; nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn errors_point_at_the_offending_byte() {
        assert_eq!(
            parse("(A (B)").unwrap_err(),
            SyntaxError::Unclosed { offset: 0 }
        );
        assert_eq!(
            parse("(A) (B)").unwrap_err(),
            SyntaxError::TrailingInput { offset: 4 }
        );
        assert_eq!(
            parse(r#"(A "x)"#).unwrap_err(),
            SyntaxError::UnterminatedString { offset: 3 }
        );
        assert_eq!(
            parse(r#"(A "\q")"#).unwrap_err(),
            SyntaxError::InvalidEscape {
                offset: 4,
                escape: "q".to_string()
            }
        );
        assert_eq!(parse("(\"A\")").unwrap_err().offset(), 1);
        assert_eq!(parse("(A @id (B))").unwrap_err().offset(), 3);
        assert_eq!(parse("(A @id=(B))").unwrap_err().offset(), 7);
        assert_eq!(parse("(A B)").unwrap_err().offset(), 3);
        assert_eq!(parse("(A #)").unwrap_err().offset(), 3);
    }
}
