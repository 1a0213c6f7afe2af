//! 表达式语法树

use serde_json::Value;

/// 一元操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

impl UnaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "!" | "not" => Some(Self::Not),
            "-" => Some(Self::Negate),
            "+" => Some(Self::Plus),
            _ => None,
        }
    }

    pub fn precedence(self) -> u16 {
        match self {
            Self::Not => 50,
            Self::Negate | Self::Plus => 500,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Negate => "-",
            Self::Plus => "+",
        }
    }
}

/// 二元操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    Identical,
    NotEqual,
    NotIdentical,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    In,
    NotIn,
    Matches,
    Contains,
    StartsWith,
    EndsWith,
    Range,
    Add,
    Subtract,
    Concat,
    Multiply,
    Divide,
    Modulo,
    Power,
    Coalesce,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "or" | "||" => Self::Or,
            "and" | "&&" => Self::And,
            "|" => Self::BitOr,
            "^" => Self::BitXor,
            "&" => Self::BitAnd,
            "==" => Self::Equal,
            "===" => Self::Identical,
            "!=" => Self::NotEqual,
            "!==" => Self::NotIdentical,
            "<" => Self::Less,
            ">" => Self::Greater,
            "<=" => Self::LessOrEqual,
            ">=" => Self::GreaterOrEqual,
            "in" => Self::In,
            "not in" => Self::NotIn,
            "matches" => Self::Matches,
            "contains" => Self::Contains,
            "starts with" => Self::StartsWith,
            "ends with" => Self::EndsWith,
            ".." => Self::Range,
            "+" => Self::Add,
            "-" => Self::Subtract,
            "~" => Self::Concat,
            "*" => Self::Multiply,
            "/" => Self::Divide,
            "%" => Self::Modulo,
            "**" => Self::Power,
            "??" => Self::Coalesce,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::Equal => "==",
            Self::Identical => "===",
            Self::NotEqual => "!=",
            Self::NotIdentical => "!==",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Matches => "matches",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::Range => "..",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Concat => "~",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Power => "**",
            Self::Coalesce => "??",
        }
    }

    pub fn precedence(self) -> u16 {
        match self {
            Self::Or => 10,
            Self::And => 15,
            Self::BitOr => 16,
            Self::BitXor => 17,
            Self::BitAnd => 18,
            Self::Equal
            | Self::Identical
            | Self::NotEqual
            | Self::NotIdentical
            | Self::Less
            | Self::Greater
            | Self::LessOrEqual
            | Self::GreaterOrEqual
            | Self::In
            | Self::NotIn
            | Self::Matches
            | Self::Contains
            | Self::StartsWith
            | Self::EndsWith => 20,
            Self::Range => 25,
            Self::Add | Self::Subtract => 30,
            Self::Concat => 40,
            Self::Multiply | Self::Divide | Self::Modulo => 60,
            Self::Power => 200,
            Self::Coalesce => 500,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, Self::Power)
    }

    /// `&&` 与 `||`
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// 成员访问方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// `a.b`
    Property,
    /// `a[expr]`
    Index,
}

/// 语法树节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(Value),
    Name(String),
    Array(Vec<Node>),
    Hash(Vec<(String, Node)>),
    Unary {
        operator: UnaryOperator,
        node: Box<Node>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// 同一逻辑操作符连接的操作数序列：`a && b && c` 保存为一层
    Logical {
        operator: BinaryOperator,
        operands: Vec<Node>,
    },
    Conditional {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Function {
        name: String,
        arguments: Vec<Node>,
    },
    GetAttr {
        node: Box<Node>,
        attribute: Box<Node>,
        kind: AccessKind,
    },
}

impl Node {
    pub fn unary(operator: UnaryOperator, node: Node) -> Self {
        Self::Unary {
            operator,
            node: Box::new(node),
        }
    }

    /// 逻辑操作符转为 [`Node::logical`]
    pub fn binary(operator: BinaryOperator, left: Node, right: Node) -> Self {
        if operator.is_logical() {
            return Self::logical(operator, left, right);
        }
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// 左操作数是同一操作符的序列时直接追加，长链不会加深语法树
    pub fn logical(operator: BinaryOperator, left: Node, right: Node) -> Self {
        match left {
            Self::Logical {
                operator: existing,
                mut operands,
            } if existing == operator => {
                operands.push(right);
                Self::Logical { operator, operands }
            }
            left => Self::Logical {
                operator,
                operands: vec![left, right],
            },
        }
    }

    pub fn conditional(condition: Node, then: Node, otherwise: Node) -> Self {
        Self::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// 按出现顺序收集引用到的变量名（去重）
    pub fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            Self::Constant(_) => {}
            Self::Name(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            Self::Array(items) => items.iter().for_each(|item| item.collect_names(names)),
            Self::Hash(entries) => entries.iter().for_each(|(_, v)| v.collect_names(names)),
            Self::Unary { node, .. } => node.collect_names(names),
            Self::Binary { left, right, .. } => {
                left.collect_names(names);
                right.collect_names(names);
            }
            Self::Logical { operands, .. } => {
                operands.iter().for_each(|operand| operand.collect_names(names))
            }
            Self::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_names(names);
                then.collect_names(names);
                otherwise.collect_names(names);
            }
            Self::Function { arguments, .. } => {
                arguments.iter().for_each(|arg| arg.collect_names(names))
            }
            Self::GetAttr {
                node, attribute, ..
            } => {
                node.collect_names(names);
                attribute.collect_names(names);
            }
        }
    }
}

/// 解析结果：原始表达式与语法树
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExpression {
    expression: String,
    root: Node,
}

impl ParsedExpression {
    pub fn new(expression: impl Into<String>, root: Node) -> Self {
        Self {
            expression: expression.into(),
            root,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// 表达式引用的所有变量
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.root.collect_names(&mut names);
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Node {
        Node::Name(n.to_string())
    }

    #[test]
    fn test_logical_chain_stays_flat() {
        let chain = ["a", "b", "c", "d"]
            .into_iter()
            .map(name)
            .reduce(|left, right| Node::binary(BinaryOperator::And, left, right))
            .unwrap();
        assert_eq!(
            chain,
            Node::Logical {
                operator: BinaryOperator::And,
                operands: vec![name("a"), name("b"), name("c"), name("d")],
            }
        );
    }

    #[test]
    fn test_mixed_logical_operators_nest() {
        let node = Node::binary(
            BinaryOperator::Or,
            Node::binary(BinaryOperator::And, name("a"), name("b")),
            name("c"),
        );
        let Node::Logical { operator, operands } = node else {
            panic!("expected logical node");
        };
        assert_eq!(operator, BinaryOperator::Or);
        assert_eq!(operands.len(), 2);
        assert!(matches!(operands[0], Node::Logical { operator: BinaryOperator::And, .. }));
    }

    #[test]
    fn test_non_logical_operator_stays_binary() {
        assert!(matches!(
            Node::binary(BinaryOperator::Add, name("a"), name("b")),
            Node::Binary { operator: BinaryOperator::Add, .. }
        ));
    }
}
