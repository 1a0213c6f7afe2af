//! 词法分析
//!
//! 使用 `nom` 识别单个记号，主循环负责跳过空白并记录位置。

use crate::error::{ExpressionError, Result};
use nom::{
    IResult,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace1, one_of, satisfy},
    combinator::{opt, recognize},
    sequence::{pair, tuple},
};

/// 记号类型
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    String(String),
    Name(String),
    Operator(&'static str),
    Punctuation(char),
    Eof,
}

/// 记号（附带在源表达式中的字节偏移）
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

impl Token {
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Operator(o) if o == op)
    }

    pub fn is_punctuation(&self, c: char) -> bool {
        self.kind == TokenKind::Punctuation(c)
    }
}

/// 单词操作符，按优先匹配顺序排列
const WORD_OPERATORS: &[(&[&str], &str)] = &[
    (&["not", "in"], "not in"),
    (&["starts", "with"], "starts with"),
    (&["ends", "with"], "ends with"),
    (&["contains"], "contains"),
    (&["matches"], "matches"),
    (&["and"], "and"),
    (&["not"], "not"),
    (&["or"], "or"),
    (&["in"], "in"),
];

/// 符号操作符，长的在前
const SYMBOL_OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "**", "..", "??", "<", ">", "+", "-", "~",
    "*", "/", "%", "!", "|", "^", "&",
];

const PUNCTUATION: &str = "()[]{},.?:";

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 将表达式切分为记号序列，末尾总是 `Eof`
pub fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = expression;

    loop {
        rest = rest.trim_start();
        let position = expression.len() - rest.len();

        let Some(first) = rest.chars().next() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                position,
            });
            return Ok(tokens);
        };

        let parsed = if first == '"' || first == '\'' {
            string_literal(rest).map_err(|_| {
                ExpressionError::syntax("字符串未闭合", position, expression)
            })?
        } else {
            next_token(rest).map_err(|_| {
                ExpressionError::syntax(format!("无法识别的字符 \"{}\"", first), position, expression)
            })?
        };

        rest = parsed.0;
        tokens.push(Token {
            kind: parsed.1,
            position,
        });
    }
}

fn next_token(input: &str) -> IResult<&str, TokenKind> {
    if let Ok(found) = number(input) {
        return Ok(found);
    }
    if let Ok(found) = word_operator(input) {
        return Ok(found);
    }
    if let Ok(found) = symbol_operator(input) {
        return Ok(found);
    }
    if let Ok((rest, c)) = one_of::<_, _, nom::error::Error<&str>>(PUNCTUATION)(input) {
        return Ok((rest, TokenKind::Punctuation(c)));
    }
    name(input)
}

fn digits(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == '_')))(input)
}

fn number(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize(tuple((
        digits,
        opt(pair(char('.'), digits)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digits))),
    )))(input)?;

    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let invalid = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float));

    if cleaned.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        let f = cleaned.parse::<f64>().map_err(|_| invalid())?;
        return Ok((rest, TokenKind::Float(f)));
    }

    match cleaned.parse::<i64>() {
        Ok(i) => Ok((rest, TokenKind::Integer(i))),
        // 超出 i64 范围的整数按浮点数处理
        Err(_) => {
            let f = cleaned.parse::<f64>().map_err(|_| invalid())?;
            Ok((rest, TokenKind::Float(f)))
        }
    }
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    let (body, quote) = one_of("\"'")(input)?;
    let mut result = String::new();
    let mut chars = body.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            c if c == quote => {
                return Ok((&body[idx + c.len_utf8()..], TokenKind::String(result)));
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => result.push('\n'),
                Some((_, 't')) => result.push('\t'),
                Some((_, 'r')) => result.push('\r'),
                Some((_, '0')) => result.push('\0'),
                Some((_, escaped)) => result.push(escaped),
                None => break,
            },
            other => result.push(other),
        }
    }

    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn match_words<'a>(input: &'a str, words: &[&str]) -> Option<&'a str> {
    let mut rest = input;
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            let (after_space, _) = multispace1::<_, nom::error::Error<&str>>(rest).ok()?;
            rest = after_space;
        }
        let (after_word, _) = tag::<_, _, nom::error::Error<&str>>(*word)(rest).ok()?;
        rest = after_word;
    }

    // 单词操作符不能是标识符的前缀（如 `order`、`index`）
    if rest.chars().next().is_some_and(is_name_char) {
        return None;
    }
    Some(rest)
}

fn word_operator(input: &str) -> IResult<&str, TokenKind> {
    WORD_OPERATORS
        .iter()
        .find_map(|(words, op)| {
            match_words(input, words).map(|rest| (rest, TokenKind::Operator(*op)))
        })
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn symbol_operator(input: &str) -> IResult<&str, TokenKind> {
    SYMBOL_OPERATORS
        .iter()
        .find_map(|op| {
            tag::<_, _, nom::error::Error<&str>>(*op)(input)
                .ok()
                .map(|(rest, _)| (rest, TokenKind::Operator(*op)))
        })
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn name(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize(pair(satisfy(is_name_start), take_while(is_name_char)))(input)?;
    Ok((rest, TokenKind::Name(text.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<TokenKind> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds(r#"age > "18""#),
            vec![
                TokenKind::Name("age".to_string()),
                TokenKind::Operator(">"),
                TokenKind::String("18".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_word_operators() {
        assert_eq!(
            kinds("age not   in [1, 2.5]"),
            vec![
                TokenKind::Name("age".to_string()),
                TokenKind::Operator("not in"),
                TokenKind::Punctuation('['),
                TokenKind::Integer(1),
                TokenKind::Punctuation(','),
                TokenKind::Float(2.5),
                TokenKind::Punctuation(']'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_word_operator_prefix_is_name() {
        assert_eq!(
            kinds("order and notice"),
            vec![
                TokenKind::Name("order".to_string()),
                TokenKind::Operator("and"),
                TokenKind::Name("notice".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_strict_operators() {
        assert_eq!(
            kinds("a === null"),
            vec![
                TokenKind::Name("a".to_string()),
                TokenKind::Operator("==="),
                TokenKind::Name("null".to_string()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("!x")[0], TokenKind::Operator("!"));
    }

    #[test]
    fn test_range_is_not_float() {
        assert_eq!(
            kinds("1..3"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Operator(".."),
                TokenKind::Integer(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"" 'it\'s'"#),
            vec![
                TokenKind::String("say \"hi\"".to_string()),
                TokenKind::String("it's".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("a  ==  b").unwrap();
        assert_eq!(tokens[1].position, 3);
        assert_eq!(tokens[2].position, 7);
    }

    #[test]
    fn test_unclosed_string() {
        let err = tokenize(r#"name == "John"#).unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { position: 8, .. }));
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { position: 2, .. }));
    }
}
