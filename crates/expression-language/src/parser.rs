//! 语法分析
//!
//! 基于优先级爬升的递归下降解析器，输入为词法分析产出的记号序列。

use crate::error::{ExpressionError, Result};
use crate::function::FunctionRegistry;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::node::{AccessKind, BinaryOperator, Node, ParsedExpression, UnaryOperator};
use crate::value::Numeric;
use serde_json::Value;

/// 语法树允许的最大嵌套层数
///
/// 括号、一元运算、非逻辑二元运算、成员访问与三元表达式各算一层；
/// `&&`/`||` 长链保存为同一层，不受限制。
pub const MAX_NESTING_DEPTH: usize = 256;

/// 解析表达式
///
/// 函数调用只允许引用 `functions` 中已注册的函数，否则返回
/// [`ExpressionError::UndefinedFunction`]。
pub fn parse(expression: &str, functions: &FunctionRegistry) -> Result<ParsedExpression> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        cursor: 0,
        depth: 0,
        functions,
    };

    let root = parser.parse_expression(0)?;
    if parser.current().kind != TokenKind::Eof {
        return Err(parser.error(format!("意外的{}", describe(&parser.current().kind))));
    }

    Ok(ParsedExpression::new(expression, root))
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
    functions: &'a FunctionRegistry,
}

impl Parser<'_> {
    fn current(&self) -> &Token {
        // tokenize 保证最后一个记号是 Eof
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::syntax(message, self.current().position, self.expression)
    }

    fn expect_punctuation(&mut self, c: char, message: &str) -> Result<()> {
        if self.current().is_punctuation(c) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "{}，实际为{}",
                message,
                describe(&self.current().kind)
            )))
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(format!("嵌套超过 {} 层", MAX_NESTING_DEPTH)));
        }
        Ok(())
    }

    fn parse_expression(&mut self, precedence: u16) -> Result<Node> {
        let depth = self.depth;
        let result = self
            .descend()
            .and_then(|_| self.parse_operators(precedence));
        self.depth = depth;
        result
    }

    fn parse_operators(&mut self, precedence: u16) -> Result<Node> {
        let mut expr = self.parse_primary()?;

        loop {
            let TokenKind::Operator(symbol) = self.current().kind else {
                break;
            };
            let Some(operator) = BinaryOperator::from_symbol(symbol) else {
                break;
            };
            if operator.precedence() < precedence {
                break;
            }

            if !operator.is_logical() {
                self.descend()?;
            }
            self.advance();
            let next_precedence = if operator.is_right_associative() {
                operator.precedence()
            } else {
                operator.precedence() + 1
            };
            let right = self.parse_expression(next_precedence)?;
            expr = Node::binary(operator, expr, right);
        }

        if precedence == 0 {
            return self.parse_conditional(expr);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        if let TokenKind::Operator(symbol) = self.current().kind {
            if let Some(operator) = UnaryOperator::from_symbol(symbol) {
                self.advance();
                let operand = self.parse_expression(operator.precedence())?;
                return self.parse_postfix(Node::unary(operator, operand));
            }
        }

        if self.current().is_punctuation('(') {
            self.advance();
            let expr = self.parse_expression(0)?;
            self.expect_punctuation(')', "括号未闭合")?;
            return self.parse_postfix(expr);
        }

        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> Result<Node> {
        let token = self.advance();

        let node = match token.kind {
            TokenKind::Name(name) => match name.to_ascii_lowercase().as_str() {
                "true" => Node::Constant(Value::Bool(true)),
                "false" => Node::Constant(Value::Bool(false)),
                "null" => Node::Constant(Value::Null),
                _ if self.current().is_punctuation('(') => {
                    if !self.functions.contains_key(&name) {
                        return Err(ExpressionError::UndefinedFunction { name });
                    }
                    let arguments = self.parse_arguments()?;
                    Node::Function { name, arguments }
                }
                _ => Node::Name(name),
            },
            TokenKind::Integer(i) => Node::Constant(Value::from(i)),
            TokenKind::Float(f) => Node::Constant(Numeric::Float(f).into_value()),
            TokenKind::String(s) => Node::Constant(Value::String(s)),
            TokenKind::Punctuation('[') => self.parse_array()?,
            TokenKind::Punctuation('{') => self.parse_hash()?,
            other => {
                return Err(ExpressionError::syntax(
                    format!("意外的{}", describe(&other)),
                    token.position,
                    self.expression,
                ));
            }
        };

        self.parse_postfix(node)
    }

    /// 左方括号已消费
    fn parse_array(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        while !self.current().is_punctuation(']') {
            if !items.is_empty() {
                self.expect_punctuation(',', "数组元素之间需要逗号")?;
                if self.current().is_punctuation(']') {
                    break;
                }
            }
            items.push(self.parse_expression(0)?);
        }
        self.expect_punctuation(']', "数组未闭合")?;
        Ok(Node::Array(items))
    }

    /// 左花括号已消费
    fn parse_hash(&mut self) -> Result<Node> {
        let mut entries = Vec::new();
        while !self.current().is_punctuation('}') {
            if !entries.is_empty() {
                self.expect_punctuation(',', "哈希元素之间需要逗号")?;
                if self.current().is_punctuation('}') {
                    break;
                }
            }

            let key_token = self.advance();
            let key = match key_token.kind {
                TokenKind::Name(key) | TokenKind::String(key) => key,
                TokenKind::Integer(i) => i.to_string(),
                other => {
                    return Err(ExpressionError::syntax(
                        format!("哈希键必须是字符串、名称或整数，实际为{}", describe(&other)),
                        key_token.position,
                        self.expression,
                    ));
                }
            };
            self.expect_punctuation(':', "哈希键后需要冒号")?;
            entries.push((key, self.parse_expression(0)?));
        }
        self.expect_punctuation('}', "哈希未闭合")?;
        Ok(Node::Hash(entries))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        self.expect_punctuation('(', "函数调用需要左括号")?;
        let mut arguments = Vec::new();
        while !self.current().is_punctuation(')') {
            if !arguments.is_empty() {
                self.expect_punctuation(',', "参数之间需要逗号")?;
            }
            arguments.push(self.parse_expression(0)?);
        }
        self.expect_punctuation(')', "参数列表未闭合")?;
        Ok(arguments)
    }

    fn parse_postfix(&mut self, mut node: Node) -> Result<Node> {
        loop {
            if self.current().is_punctuation('.') || self.current().is_punctuation('[') {
                self.descend()?;
            }
            if self.current().is_punctuation('.') {
                self.advance();
                let token = self.advance();
                let TokenKind::Name(attribute) = token.kind else {
                    return Err(ExpressionError::syntax(
                        "\".\" 之后需要属性名",
                        token.position,
                        self.expression,
                    ));
                };
                if self.current().is_punctuation('(') {
                    return Err(self.error(format!("不支持方法调用 \"{}()\"", attribute)));
                }
                node = Node::GetAttr {
                    node: Box::new(node),
                    attribute: Box::new(Node::Constant(Value::String(attribute))),
                    kind: AccessKind::Property,
                };
            } else if self.current().is_punctuation('[') {
                self.advance();
                let attribute = self.parse_expression(0)?;
                self.expect_punctuation(']', "下标未闭合")?;
                node = Node::GetAttr {
                    node: Box::new(node),
                    attribute: Box::new(attribute),
                    kind: AccessKind::Index,
                };
            } else {
                return Ok(node);
            }
        }
    }

    /// 三元表达式 `a ? b : c`、`a ?: b` 与 `a ? b`
    fn parse_conditional(&mut self, mut expr: Node) -> Result<Node> {
        while self.current().is_punctuation('?') {
            self.descend()?;
            self.advance();
            let (then, otherwise) = if self.current().is_punctuation(':') {
                self.advance();
                (expr.clone(), self.parse_expression(0)?)
            } else {
                let then = self.parse_expression(0)?;
                let otherwise = if self.current().is_punctuation(':') {
                    self.advance();
                    self.parse_expression(0)?
                } else {
                    Node::Constant(Value::Null)
                };
                (then, otherwise)
            };
            expr = Node::conditional(expr, then, otherwise);
        }
        Ok(expr)
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Integer(i) => format!("数字 {}", i),
        TokenKind::Float(f) => format!("数字 {}", f),
        TokenKind::String(s) => format!("字符串 \"{}\"", s),
        TokenKind::Name(n) => format!("名称 \"{}\"", n),
        TokenKind::Operator(op) => format!("操作符 \"{}\"", op),
        TokenKind::Punctuation(c) => format!("标点 \"{}\"", c),
        TokenKind::Eof => "表达式结尾".to_string(),
    }
}
