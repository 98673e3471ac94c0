//! Indentation-aware tokenizer for the factor language.
//!
//! Produces a flat token stream with synthetic `Newline`/`Indent`/`Dedent`
//! tokens, Python-style. Blank and comment-only lines emit nothing. Newlines
//! inside brackets are suppressed (implicit line joining). Every token carries
//! its 1-based source line so downstream violations can point at real code.

use thiserror::Error;

/// Token kinds. Keywords are pre-classified by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Num(f64),
    Str(String),

    Newline,
    Indent,
    Dedent,
    EndOfFile,

    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,

    KwImport,
    KwFrom,
    KwAs,
    KwWhile,
    KwFor,
    KwIn,
    KwIf,
    KwElif,
    KwElse,
    KwBreak,
    KwContinue,
    KwReturn,
    KwLambda,
    KwAnd,
    KwOr,
    KwNot,
    KwTrue,
    KwFalse,
    KwNone,
    KwDef,
}

/// A token plus its 1-based source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: Tok,
    pub line: u32,
}

/// Lexing failures. All carry the offending line.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LexError {
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },
    #[error("line {line}: inconsistent indentation")]
    BadIndent { line: u32 },
    #[error("line {line}: unexpected character '{ch}'")]
    IllegalChar { line: u32, ch: char },
    #[error("line {line}: malformed number literal")]
    BadNumber { line: u32 },
}

fn keyword(name: &str) -> Option<Tok> {
    Some(match name {
        "import" => Tok::KwImport,
        "from" => Tok::KwFrom,
        "as" => Tok::KwAs,
        "while" => Tok::KwWhile,
        "for" => Tok::KwFor,
        "in" => Tok::KwIn,
        "if" => Tok::KwIf,
        "elif" => Tok::KwElif,
        "else" => Tok::KwElse,
        "break" => Tok::KwBreak,
        "continue" => Tok::KwContinue,
        "return" => Tok::KwReturn,
        "lambda" => Tok::KwLambda,
        "and" => Tok::KwAnd,
        "or" => Tok::KwOr,
        "not" => Tok::KwNot,
        "True" => Tok::KwTrue,
        "False" => Tok::KwFalse,
        "None" => Tok::KwNone,
        "def" => Tok::KwDef,
        _ => return None,
    })
}

/// Tokenize a full source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut bracket_depth: usize = 0;
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line: u32 = 1;
    let mut at_line_start = true;

    while i < chars.len() {
        if at_line_start && bracket_depth == 0 {
            // Measure indentation; tabs count as 4 columns.
            let mut width = 0usize;
            let mut j = i;
            while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
                width += if chars[j] == '\t' { 4 } else { 1 };
                j += 1;
            }
            // Blank or comment-only line: consume and move on.
            if j >= chars.len() || chars[j] == '\n' || chars[j] == '#' {
                while j < chars.len() && chars[j] != '\n' {
                    j += 1;
                }
                if j < chars.len() {
                    j += 1;
                    line += 1;
                }
                i = j;
                continue;
            }
            let current = *indents.last().unwrap();
            if width > current {
                indents.push(width);
                tokens.push(Token {
                    kind: Tok::Indent,
                    line,
                });
            } else if width < current {
                while *indents.last().unwrap() > width {
                    indents.pop();
                    tokens.push(Token {
                        kind: Tok::Dedent,
                        line,
                    });
                }
                if *indents.last().unwrap() != width {
                    return Err(LexError::BadIndent { line });
                }
            }
            i = j;
            at_line_start = false;
            continue;
        }

        let c = chars[i];
        match c {
            '\n' => {
                if bracket_depth == 0 {
                    // Collapse consecutive newlines into one token.
                    if !matches!(tokens.last().map(|t| &t.kind), Some(Tok::Newline) | None) {
                        tokens.push(Token {
                            kind: Tok::Newline,
                            line,
                        });
                    }
                    at_line_start = true;
                }
                line += 1;
                i += 1;
            }
            ' ' | '\t' | '\r' => {
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '\\' if i + 1 < chars.len() && chars[i + 1] == '\n' => {
                // Explicit line continuation.
                line += 1;
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let start_line = line;
                let mut s = String::new();
                i += 1;
                loop {
                    if i >= chars.len() || chars[i] == '\n' {
                        return Err(LexError::UnterminatedString { line: start_line });
                    }
                    if chars[i] == quote {
                        i += 1;
                        break;
                    }
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        s.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token {
                    kind: Tok::Str(s),
                    line: start_line,
                });
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == '_'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '+' || chars[i] == '-')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().filter(|&&c| c != '_').collect();
                let value: f64 = text.parse().map_err(|_| LexError::BadNumber { line })?;
                tokens.push(Token {
                    kind: Tok::Num(value),
                    line,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                let kind = keyword(&name).unwrap_or(Tok::Name(name));
                tokens.push(Token { kind, line });
            }
            _ => {
                let (kind, width) = match c {
                    '+' => (Tok::Plus, 1),
                    '-' => (Tok::Minus, 1),
                    '*' => {
                        if chars.get(i + 1) == Some(&'*') {
                            (Tok::DoubleStar, 2)
                        } else {
                            (Tok::Star, 1)
                        }
                    }
                    '/' => {
                        if chars.get(i + 1) == Some(&'/') {
                            (Tok::DoubleSlash, 2)
                        } else {
                            (Tok::Slash, 1)
                        }
                    }
                    '%' => (Tok::Percent, 1),
                    '=' => {
                        if chars.get(i + 1) == Some(&'=') {
                            (Tok::EqEq, 2)
                        } else {
                            (Tok::Assign, 1)
                        }
                    }
                    '!' => {
                        if chars.get(i + 1) == Some(&'=') {
                            (Tok::NotEq, 2)
                        } else {
                            return Err(LexError::IllegalChar { line, ch: c });
                        }
                    }
                    '<' => {
                        if chars.get(i + 1) == Some(&'=') {
                            (Tok::LtEq, 2)
                        } else {
                            (Tok::Lt, 1)
                        }
                    }
                    '>' => {
                        if chars.get(i + 1) == Some(&'=') {
                            (Tok::GtEq, 2)
                        } else {
                            (Tok::Gt, 1)
                        }
                    }
                    '(' => {
                        bracket_depth += 1;
                        (Tok::LParen, 1)
                    }
                    ')' => {
                        bracket_depth = bracket_depth.saturating_sub(1);
                        (Tok::RParen, 1)
                    }
                    '[' => {
                        bracket_depth += 1;
                        (Tok::LBracket, 1)
                    }
                    ']' => {
                        bracket_depth = bracket_depth.saturating_sub(1);
                        (Tok::RBracket, 1)
                    }
                    ',' => (Tok::Comma, 1),
                    ':' => (Tok::Colon, 1),
                    '.' => (Tok::Dot, 1),
                    _ => return Err(LexError::IllegalChar { line, ch: c }),
                };
                tokens.push(Token { kind, line });
                i += width;
            }
        }
    }

    // Close the final logical line and any open blocks.
    if !matches!(tokens.last().map(|t| &t.kind), Some(Tok::Newline) | None) {
        tokens.push(Token {
            kind: Tok::Newline,
            line,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            kind: Tok::Dedent,
            line,
        });
    }
    tokens.push(Token {
        kind: Tok::EndOfFile,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_assignment() {
        let toks = kinds("x = 1");
        assert_eq!(
            toks,
            vec![
                Tok::Name("x".into()),
                Tok::Assign,
                Tok::Num(1.0),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn keywords_classified() {
        let toks = kinds("import pandas");
        assert_eq!(toks[0], Tok::KwImport);
        assert_eq!(toks[1], Tok::Name("pandas".into()));
    }

    #[test]
    fn indent_dedent_pairs() {
        let src = "while True:\n    x = 1\ny = 2\n";
        let toks = kinds(src);
        assert!(toks.contains(&Tok::Indent));
        assert!(toks.contains(&Tok::Dedent));
    }

    #[test]
    fn comment_only_lines_are_skipped() {
        let toks = kinds("# just a comment\n\n# another\n");
        assert_eq!(toks, vec![Tok::EndOfFile]);
    }

    #[test]
    fn newline_suppressed_inside_brackets() {
        let toks = kinds("x = f(1,\n      2)");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let toks = tokenize("a = 1\nb = 2\n").unwrap();
        let b = toks
            .iter()
            .find(|t| t.kind == Tok::Name("b".into()))
            .unwrap();
        assert_eq!(b.line, 2);
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = tokenize("x = 'oops\n").unwrap_err();
        assert_eq!(err, LexError::UnterminatedString { line: 1 });
    }

    #[test]
    fn bad_dedent_rejected() {
        let src = "if True:\n    x = 1\n  y = 2\n";
        assert!(matches!(
            tokenize(src),
            Err(LexError::BadIndent { line: 3 })
        ));
    }

    #[test]
    fn dunder_names_survive() {
        let toks = kinds("x.__class__");
        assert!(toks.contains(&Tok::Name("__class__".into())));
    }

    #[test]
    fn scientific_notation() {
        let toks = kinds("x = 1.5e-3");
        assert!(toks.iter().any(|t| matches!(t, Tok::Num(n) if (*n - 0.0015).abs() < 1e-12)));
    }
}
