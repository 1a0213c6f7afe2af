//! 解析结果缓存
//!
//! 同一表达式只解析一次，后续求值直接复用语法树。

use crate::node::ParsedExpression;
use dashmap::DashMap;
use std::sync::Arc;

/// 默认缓存容量
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// 默认可缓存的最长表达式（字节）
pub const DEFAULT_MAX_EXPRESSION_LEN: usize = 4096;

/// 解析缓存
///
/// 缓存实现必须线程安全，表达式引擎会在多个请求间共享同一个实例。
pub trait ParserCache: Send + Sync {
    fn get(&self, expression: &str) -> Option<Arc<ParsedExpression>>;

    fn insert(&self, expression: String, parsed: Arc<ParsedExpression>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);
}

/// 基于 DashMap 的内存缓存
///
/// 容量满时清空后重新填充。超过 `max_expression_len` 的表达式不缓存，
/// 占用上限约为 `capacity * max_expression_len` 的源码及其语法树。
#[derive(Debug)]
pub struct InMemoryParserCache {
    entries: DashMap<String, Arc<ParsedExpression>>,
    capacity: usize,
    max_expression_len: usize,
}

impl InMemoryParserCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            max_expression_len: DEFAULT_MAX_EXPRESSION_LEN,
        }
    }

    pub fn with_max_expression_len(mut self, max_expression_len: usize) -> Self {
        self.max_expression_len = max_expression_len;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_expression_len(&self) -> usize {
        self.max_expression_len
    }
}

impl Default for InMemoryParserCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ParserCache for InMemoryParserCache {
    fn get(&self, expression: &str) -> Option<Arc<ParsedExpression>> {
        self.entries.get(expression).map(|entry| entry.value().clone())
    }

    fn insert(&self, expression: String, parsed: Arc<ParsedExpression>) {
        if expression.len() > self.max_expression_len {
            tracing::trace!(len = expression.len(), "表达式过长，不缓存");
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&expression) {
            tracing::debug!(capacity = self.capacity, "解析缓存已满，清空后重新填充");
            self.entries.clear();
        }
        self.entries.insert(expression, parsed);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// 不缓存任何内容
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopParserCache;

impl ParserCache for NoopParserCache {
    fn get(&self, _expression: &str) -> Option<Arc<ParsedExpression>> {
        None
    }

    fn insert(&self, _expression: String, _parsed: Arc<ParsedExpression>) {}

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}
}
