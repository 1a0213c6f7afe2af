//! 谓词函数
//!
//! 编译后的表达式会调用 `str_starts_with`、`str_contains`、`str_ends_with`
//! 和 `empty` 四个函数，这里把它们注册到表达式引擎。

use expression_language::{
    ExpressionError, ExpressionFunction, ExpressionFunctionProvider, ExpressionLanguage,
    Result as ExpressionResult, is_truthy, to_string_lossy,
};
use serde_json::Value;

pub const STR_STARTS_WITH: &str = "str_starts_with";
pub const STR_CONTAINS: &str = "str_contains";
pub const STR_ENDS_WITH: &str = "str_ends_with";
pub const EMPTY: &str = "empty";

/// 谓词函数注册表
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateRegistry;

impl PredicateRegistry {
    /// 构建注册了全部谓词的表达式引擎
    pub fn language() -> ExpressionLanguage {
        ExpressionLanguage::builder().provider(Self).build()
    }
}

impl ExpressionFunctionProvider for PredicateRegistry {
    fn functions(&self) -> Vec<ExpressionFunction> {
        vec![
            string_predicate(STR_STARTS_WITH, |s, prefix| s.starts_with(prefix)),
            string_predicate(STR_CONTAINS, |s, needle| s.contains(needle)),
            string_predicate(STR_ENDS_WITH, |s, suffix| s.ends_with(suffix)),
            ExpressionFunction::new(
                EMPTY,
                |args| format!("{}({})", EMPTY, args.join(", ")),
                |_, args| {
                    let [value] = expect_arity::<1>(EMPTY, args)?;
                    Ok(Value::Bool(!is_truthy(value)))
                },
            ),
        ]
    }
}

fn string_predicate(name: &'static str, test: fn(&str, &str) -> bool) -> ExpressionFunction {
    ExpressionFunction::new(
        name,
        move |args| format!("{}({})", name, args.join(", ")),
        move |_, args| {
            let [subject, pattern] = expect_arity::<2>(name, args)?;
            let subject = string_argument(name, subject)?;
            let pattern = string_argument(name, pattern)?;
            Ok(Value::Bool(test(&subject, &pattern)))
        },
    )
}

fn expect_arity<'a, const N: usize>(
    function: &str,
    args: &'a [Value],
) -> ExpressionResult<&'a [Value; N]> {
    args.try_into().map_err(|_| ExpressionError::InvalidArgument {
        function: function.to_string(),
        message: format!("需要 {} 个参数，实际 {} 个", N, args.len()),
    })
}

fn string_argument(function: &str, value: &Value) -> ExpressionResult<String> {
    to_string_lossy(value).ok_or_else(|| ExpressionError::InvalidArgument {
        function: function.to_string(),
        message: "参数必须是标量值".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use expression_language::Variables;
    use serde_json::json;

    fn eval(expression: &str) -> ExpressionResult<Value> {
        let variables: Variables = json!({
            "name": "John Doe",
            "age": 30,
            "blank": "",
            "zero": "0",
            "nothing": null,
            "tags": []
        })
        .as_object()
        .cloned()
        .unwrap();
        PredicateRegistry::language().evaluate(expression, &variables)
    }

    #[test]
    fn test_string_predicates() {
        assert_eq!(eval(r#"str_starts_with(name, "Jo")"#).unwrap(), json!(true));
        assert_eq!(eval(r#"str_starts_with(name, "Doe")"#).unwrap(), json!(false));
        assert_eq!(eval(r#"str_contains(name, "n D")"#).unwrap(), json!(true));
        assert_eq!(eval(r#"str_ends_with(name, "Doe")"#).unwrap(), json!(true));
        assert_eq!(eval(r#"!str_ends_with(name, "Jo")"#).unwrap(), json!(true));
    }

    #[test]
    fn test_empty_needle_always_matches() {
        assert_eq!(eval(r#"str_contains(name, "")"#).unwrap(), json!(true));
        assert_eq!(eval(r#"str_starts_with(blank, "")"#).unwrap(), json!(true));
    }

    #[test]
    fn test_numbers_are_converted_to_strings() {
        assert_eq!(eval(r#"str_starts_with(age, "3")"#).unwrap(), json!(true));
        assert_eq!(eval(r#"str_ends_with(age, 0)"#).unwrap(), json!(true));
    }

    #[test]
    fn test_empty() {
        for expression in ["empty(blank)", "empty(zero)", "empty(nothing)", "empty(tags)", "empty(0)", "empty(false)"] {
            assert_eq!(eval(expression).unwrap(), json!(true), "{}", expression);
        }
        assert_eq!(eval(r#"empty("x")"#).unwrap(), json!(false));
        assert_eq!(eval("empty(age)").unwrap(), json!(false));
        assert_eq!(eval("!empty(name)").unwrap(), json!(true));
    }

    #[test]
    fn test_wrong_arity() {
        let err = eval("str_contains(name)").unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidArgument { ref function, .. } if function == STR_CONTAINS));
        assert!(eval("empty(name, age)").is_err());
    }

    #[test]
    fn test_array_argument_rejected() {
        assert!(matches!(
            eval(r#"str_contains(tags, "a")"#),
            Err(ExpressionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_compiled_form() {
        let language = PredicateRegistry::language();
        assert_eq!(
            language.compile(r#"!str_starts_with(name, "Jo")"#).unwrap(),
            r#"(!str_starts_with(name, "Jo"))"#
        );
        for name in [STR_STARTS_WITH, STR_CONTAINS, STR_ENDS_WITH, EMPTY] {
            assert!(language.has_function(name));
        }
    }
}
