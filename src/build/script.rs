//! Script bundling and minification.
//!
//! The minifier works on tokens rather than an AST: comments go, whitespace
//! collapses, and string, template and regex literals are copied through
//! untouched. Line breaks survive wherever automatic semicolon insertion could
//! depend on them. The output is lexed again and must produce the same token
//! stream as the input; anything else is a [`TransformError`] and the caller
//! ships the source as-is.

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("unterminated {kind} starting at offset {offset}")]
    Unterminated { kind: &'static str, offset: usize },
    #[error("unexpected `{found}` at offset {offset}")]
    Unbalanced { found: char, offset: usize },
    #[error("`{open}` opened at offset {offset} is never closed")]
    Unclosed { open: char, offset: usize },
    #[error("minified output diverges from source near offset {offset}")]
    Diverged { offset: usize },
}

/// Wrap the entry script in its own function scope, as an IIFE bundle would.
pub fn bundle(source: &str) -> String {
    format!("(()=>{{\n{source}\n}})();\n")
}

/// Bundle and minify `source`.
///
/// Falls back to the untransformed source when the minified bundle does not
/// pass the syntax check; the build carries on either way.
pub fn transform_script(source: &str) -> String {
    match minify_script(&bundle(source)) {
        Ok(minified) => {
            debug!(
                before = source.len(),
                after = minified.len(),
                "script minified"
            );
            minified
        }
        Err(err) => {
            warn!(%err, "script minification failed; emitting untransformed source");
            source.to_string()
        }
    }
}

/// Minify a script and verify the result re-lexes to the same tokens.
pub fn minify_script(source: &str) -> Result<String, TransformError> {
    let tokens = Lexer::new(source).run()?;
    let minified = emit(&tokens);
    check_syntax(&tokens, &minified)?;
    Ok(minified)
}

fn check_syntax(expected: &[Token], minified: &str) -> Result<(), TransformError> {
    let actual = Lexer::new(minified).run()?;
    for (i, want) in expected.iter().enumerate() {
        match actual.get(i) {
            Some(got) if got.kind == want.kind && got.text == want.text => {}
            _ => return Err(TransformError::Diverged { offset: want.offset }),
        }
    }
    if let Some(extra) = actual.get(expected.len()) {
        return Err(TransformError::Diverged {
            offset: extra.offset,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Word,
    Punct,
    Literal,
}

/// Whitespace seen before a token; a newline outranks plain spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    text: String,
    gap: Gap,
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    /// `block` is false for object literals.
    Brace { block: bool },
    /// `header` marks the condition of `if`/`while`/`for`/`with`.
    Paren { header: bool },
    Bracket,
    Template,
}

impl Open {
    fn as_char(self) -> char {
        match self {
            Open::Brace { .. } => '{',
            Open::Paren { .. } => '(',
            Open::Bracket => '[',
            Open::Template => '`',
        }
    }
}

const HEADER_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "case",
    "do",
    "else",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "yield",
    "await",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || (!c.is_ascii() && !c.is_whitespace())
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    gap: Gap,
    tokens: Vec<Token>,
    stack: Vec<(Open, usize)>,
    /// Whether a `/` right after the last `)` or `}` starts a regex.
    regex_after_close: bool,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            gap: Gap::None,
            tokens: Vec::new(),
            stack: Vec::new(),
            regex_after_close: false,
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn push(&mut self, kind: Kind, start: usize) {
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token {
            kind,
            text,
            gap: self.gap,
            offset: start,
        });
        self.gap = Gap::None;
    }

    fn run(mut self) -> Result<Vec<Token>, TransformError> {
        while let Some(c) = self.peek(0) {
            if is_line_break(c) {
                self.gap = Gap::Newline;
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() || c == '\u{feff}' {
                self.gap = self.gap.max(Gap::Space);
                self.pos += 1;
                continue;
            }
            if c == '/' && self.peek(1) == Some('/') {
                while self.peek(0).is_some_and(|c| !is_line_break(c)) {
                    self.pos += 1;
                }
                self.gap = self.gap.max(Gap::Space);
                continue;
            }
            if c == '/' && self.peek(1) == Some('*') {
                self.block_comment()?;
                continue;
            }

            let start = self.pos;
            match c {
                '\'' | '"' => {
                    self.string(c)?;
                    self.push(Kind::Literal, start);
                }
                '`' => {
                    self.pos += 1;
                    self.template_chunk(start)?;
                }
                '/' if self.regex_allowed() => {
                    self.regex()?;
                    self.push(Kind::Literal, start);
                }
                '{' | '(' | '[' => {
                    let open = match c {
                        '{' => Open::Brace {
                            block: self.brace_opens_block(),
                        },
                        '(' => Open::Paren {
                            header: self.paren_opens_header(),
                        },
                        _ => Open::Bracket,
                    };
                    self.stack.push((open, start));
                    self.pos += 1;
                    self.push(Kind::Punct, start);
                }
                '}' | ')' | ']' => {
                    let regex_next = match (c, self.stack.pop()) {
                        ('}', Some((Open::Template, template_start))) => {
                            self.pos += 1;
                            self.template_chunk(template_start)?;
                            continue;
                        }
                        ('}', Some((Open::Brace { block }, _))) => block,
                        (')', Some((Open::Paren { header }, _))) => header,
                        (']', Some((Open::Bracket, _))) => false,
                        _ => {
                            return Err(TransformError::Unbalanced {
                                found: c,
                                offset: start,
                            });
                        }
                    };
                    self.pos += 1;
                    self.push(Kind::Punct, start);
                    self.regex_after_close = regex_next;
                }
                c if is_word_char(c) => {
                    while self.peek(0).is_some_and(is_word_char) {
                        self.pos += 1;
                    }
                    self.push(Kind::Word, start);
                }
                _ => {
                    self.pos += 1;
                    self.push(Kind::Punct, start);
                }
            }
        }

        if let Some((open, offset)) = self.stack.pop() {
            return Err(match open {
                Open::Template => TransformError::Unterminated {
                    kind: "template literal",
                    offset,
                },
                open => TransformError::Unclosed {
                    open: open.as_char(),
                    offset,
                },
            });
        }
        Ok(self.tokens)
    }

    fn block_comment(&mut self) -> Result<(), TransformError> {
        let start = self.pos;
        self.pos += 2;
        let mut gap = Gap::Space;
        loop {
            match self.peek(0) {
                None => {
                    return Err(TransformError::Unterminated {
                        kind: "block comment",
                        offset: start,
                    });
                }
                Some('*') if self.peek(1) == Some('/') => {
                    self.pos += 2;
                    break;
                }
                Some(c) => {
                    if is_line_break(c) {
                        gap = Gap::Newline;
                    }
                    self.pos += 1;
                }
            }
        }
        self.gap = self.gap.max(gap);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), TransformError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek(0) {
                Some('\\') => {
                    // `\` followed by CRLF is a single line continuation
                    self.pos += if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') {
                        3
                    } else {
                        2
                    };
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(c) if !is_line_break(c) => self.pos += 1,
                _ => {
                    return Err(TransformError::Unterminated {
                        kind: "string literal",
                        offset: start,
                    });
                }
            }
        }
    }

    /// Scan template text up to the closing backtick or the next `${`, which
    /// opens an expression context on the stack.
    fn template_chunk(&mut self, template_start: usize) -> Result<(), TransformError> {
        let start = self.pos - 1;
        loop {
            match self.peek(0) {
                None => {
                    return Err(TransformError::Unterminated {
                        kind: "template literal",
                        offset: template_start,
                    });
                }
                Some('\\') => self.pos += 2,
                Some('`') => {
                    self.pos += 1;
                    self.push(Kind::Literal, start);
                    return Ok(());
                }
                Some('$') if self.peek(1) == Some('{') => {
                    self.pos += 2;
                    self.push(Kind::Literal, start);
                    self.stack.push((Open::Template, template_start));
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn regex(&mut self) -> Result<(), TransformError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.peek(0) {
                Some('\\') if self.peek(1).is_some_and(|c| !is_line_break(c)) => self.pos += 2,
                Some('[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some('/') if !in_class => {
                    self.pos += 1;
                    break;
                }
                Some(c) if !is_line_break(c) && c != '\\' => self.pos += 1,
                _ => {
                    return Err(TransformError::Unterminated {
                        kind: "regular expression",
                        offset: start,
                    });
                }
            }
        }
        while self.peek(0).is_some_and(is_word_char) {
            self.pos += 1;
        }
        Ok(())
    }

    /// A `/` starts a regex unless it follows something that ends an operand.
    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(token) => match token.kind {
                Kind::Literal => token.text.ends_with("${"),
                Kind::Word => REGEX_KEYWORDS.contains(&token.text.as_str()),
                Kind::Punct => match token.text.as_str() {
                    ")" | "}" => self.regex_after_close,
                    "]" => false,
                    _ => true,
                },
            },
        }
    }

    fn paren_opens_header(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.kind == Kind::Word && HEADER_KEYWORDS.contains(&t.text.as_str()))
    }

    /// Statement position: after `)`, `;`, braces, an arrow, or a word that
    /// is not an operator keyword. Anything else opens an object literal.
    fn brace_opens_block(&self) -> bool {
        let Some(last) = self.tokens.last() else {
            return true;
        };
        match last.kind {
            Kind::Literal => false,
            Kind::Word => {
                matches!(last.text.as_str(), "else" | "do")
                    || !REGEX_KEYWORDS.contains(&last.text.as_str())
            }
            Kind::Punct => match last.text.as_str() {
                ")" | ";" | "{" | "}" => true,
                ">" => {
                    let n = self.tokens.len();
                    n >= 2
                        && last.gap == Gap::None
                        && self.tokens[n - 2].text == "="
                }
                _ => false,
            },
        }
    }
}

fn emit(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(prev) = prev
            && let Some(sep) = separator(prev, token)
        {
            out.push(sep);
        }
        out.push_str(&token.text);
        prev = Some(token);
    }
    out
}

fn separator(prev: &Token, next: &Token) -> Option<char> {
    match next.gap {
        Gap::None => None,
        Gap::Newline if !newline_droppable(prev, next) => Some('\n'),
        Gap::Newline | Gap::Space => needs_space(prev, next).then_some(' '),
    }
}

fn first_char(token: &Token) -> char {
    token.text.chars().next().unwrap_or(' ')
}

fn last_char(token: &Token) -> char {
    token.text.chars().last().unwrap_or(' ')
}

/// A line break can go when the surrounding punctuation already ends or
/// continues the statement, so no semicolon would be inserted there.
fn newline_droppable(prev: &Token, next: &Token) -> bool {
    let before = last_char(prev);
    let after = first_char(next);
    (prev.kind != Kind::Word && "{;,([:=?&|!<>*%^~".contains(before))
        || (next.kind != Kind::Word && "}),;.:?=&|*%<>^]".contains(after))
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    let before = last_char(prev);
    let after = first_char(next);
    if is_word_char(before) && is_word_char(after) {
        return true;
    }
    if prev.kind == Kind::Word && before.is_ascii_digit() && after == '.' {
        return first_char(prev).is_ascii_digit();
    }
    matches!(
        (before, after),
        ('+', '+') | ('-', '-') | ('/', '/') | ('/', '*')
    )
}
