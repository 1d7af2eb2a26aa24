//! XPath tokenizer.
//!
//! Applies the XPath 1.0 disambiguation rules (section 3.7): whether `*` is a
//! multiplication or a name test, and whether `and`/`or`/`div`/`mod` are
//! operators, depends on the preceding token.

use crate::error_handling::XsltError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    /// `*` used as a name test
    Star,
    /// `*` used as multiplication
    Multiply,
    And,
    Or,
    Div,
    Mod,
    /// QName, or `prefix:*`
    Name(String),
    /// Axis name; the `::` has been consumed
    AxisName(String),
    /// `text`, `node`, `comment` or `processing-instruction` before `(`
    NodeType(String),
    FunctionName(String),
    Literal(String),
    Number(f64),
    Variable(String),
}

impl Token {
    /// Whether a following `*` or NCName should be read as an operator.
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::AxisName(_)
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Equal
                | Token::NotEqual
                | Token::Less
                | Token::LessEqual
                | Token::Greater
                | Token::GreaterEqual
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
        )
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Splits `expr` into tokens paired with their character offsets.
pub(crate) fn tokenize(expr: &str) -> Result<Vec<(Token, usize)>, XsltError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens: Vec<(Token, usize)> = Vec::new();
    let mut i = 0;

    let error = |position: usize, message: &str| XsltError::XPathSyntax {
        expr: expr.to_string(),
        position,
        message: message.to_string(),
    };

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let operand_before = tokens.last().is_some_and(|(t, _)| t.ends_operand());

        let token = match c {
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                i += 2;
                Token::DotDot
            }
            '.' if chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                let (number, next) = read_number(&chars, i);
                i = next;
                Token::Number(number)
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '=' => {
                i += 1;
                Token::Equal
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::NotEqual
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::LessEqual
            }
            '<' => {
                i += 1;
                Token::Less
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                i += 2;
                Token::GreaterEqual
            }
            '>' => {
                i += 1;
                Token::Greater
            }
            '*' => {
                i += 1;
                if operand_before {
                    Token::Multiply
                } else {
                    Token::Star
                }
            }
            '"' | '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| error(start, "unterminated string literal"))?;
                let literal: String = chars[i + 1..i + 1 + close].iter().collect();
                i += close + 2;
                Token::Literal(literal)
            }
            '$' => {
                i += 1;
                let (name, next) = read_qname(&chars, i);
                if name.is_empty() {
                    return Err(error(start, "expected a variable name after '$'"));
                }
                i = next;
                Token::Variable(name)
            }
            d if d.is_ascii_digit() => {
                let (number, next) = read_number(&chars, i);
                i = next;
                Token::Number(number)
            }
            n if is_name_start(n) => {
                let (name, next) = read_qname(&chars, i);
                i = next;
                if operand_before {
                    match name.as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "div" => Token::Div,
                        "mod" => Token::Mod,
                        _ => return Err(error(start, "expected an operator")),
                    }
                } else {
                    let mut j = i;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if chars.get(j) == Some(&':') && chars.get(j + 1) == Some(&':') {
                        i = j + 2;
                        Token::AxisName(name)
                    } else if chars.get(j) == Some(&'(') {
                        match name.as_str() {
                            "text" | "node" | "comment" | "processing-instruction" => {
                                Token::NodeType(name)
                            }
                            _ => Token::FunctionName(name),
                        }
                    } else {
                        Token::Name(name)
                    }
                }
            }
            _ => return Err(error(start, &format!("unexpected character '{c}'"))),
        };
        tokens.push((token, start));
    }

    Ok(tokens)
}

fn read_number(chars: &[char], mut i: usize) -> (f64, usize) {
    let start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' && chars.get(i + 1) != Some(&'.') {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let text: String = chars[start..i].iter().collect();
    (text.parse().unwrap_or(f64::NAN), i)
}

/// Reads `ncname`, `prefix:ncname` or `prefix:*`, stopping before `::`.
fn read_qname(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_name_char(chars[i]) {
        i += 1;
    }
    if i < chars.len() && chars[i] == ':' && chars.get(i + 1) != Some(&':') {
        match chars.get(i + 1) {
            Some('*') => i += 2,
            Some(&c) if is_name_start(c) => {
                i += 1;
                while i < chars.len() && is_name_char(chars[i]) {
                    i += 1;
                }
            }
            _ => {}
        }
    }
    (chars[start..i].iter().collect(), i)
}
