//! 表达式引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("语法错误: {message}，位置 {position}，表达式 \"{expression}\"")]
    Syntax {
        message: String,
        position: usize,
        expression: String,
    },

    #[error("变量 \"{name}\" 未定义")]
    UndefinedVariable { name: String },

    #[error("函数 \"{name}\" 不存在")]
    UndefinedFunction { name: String },

    #[error("类型不匹配: 无法对 {left} 和 {right} 执行 \"{operator}\"")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("函数 {function} 参数无效: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("除数不能为零")]
    DivisionByZero,

    #[error("无效的正则表达式: {0}")]
    InvalidRegex(String),

    #[error("无法在 {target} 上访问成员 \"{member}\"")]
    NotIndexable { target: String, member: String },
}

impl ExpressionError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize, expression: &str) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
            expression: expression.to_string(),
        }
    }

    pub(crate) fn type_mismatch(
        operator: &str,
        left: &serde_json::Value,
        right: &serde_json::Value,
    ) -> Self {
        Self::TypeMismatch {
            operator: operator.to_string(),
            left: crate::value::type_name(left).to_string(),
            right: crate::value::type_name(right).to_string(),
        }
    }

    /// 是否为解析阶段产生的错误
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. } | Self::UndefinedFunction { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExpressionError>;
