//! 编译上下文
//!
//! 一次编译的全部共享状态：类型注册表、main 块的符号表、作用域状态与诊断。
//! 分析器与代码生成器都显式接收它。

use crate::error::Diagnostics;
use crate::semantic::scope::{ScopeKind, ScopeManager};
use crate::semantic::symbol_table::SymbolTable;
use crate::types::TypeRegistry;

#[derive(Default)]
pub struct CompilationContext {
    pub types: TypeRegistry,
    /// main 块中声明的变量
    pub program_scope: SymbolTable,
    pub scopes: ScopeManager,
    pub diagnostics: Diagnostics,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 方法内为局部变量表，类内为成员表，否则为 main 的符号表
    pub fn current_scope(&self) -> &SymbolTable {
        match self.scopes.current() {
            ScopeKind::Method(method) => &self.types.method(method).locals,
            ScopeKind::Class(class) => &self.types.class(class).members,
            ScopeKind::Program => &self.program_scope,
        }
    }

    pub fn current_scope_mut(&mut self) -> &mut SymbolTable {
        match self.scopes.current() {
            ScopeKind::Method(method) => &mut self.types.method_mut(method).locals,
            ScopeKind::Class(class) => &mut self.types.class_mut(class).members,
            ScopeKind::Program => &mut self.program_scope,
        }
    }

    /// 方法内返回所在类的成员表，其余位置没有外层作用域
    pub fn enclosing_scope(&self) -> Option<&SymbolTable> {
        match self.scopes.current() {
            ScopeKind::Method(method) => Some(&self.types.class(self.types.method(method).owner).members),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.diagnostics.is_aborted()
    }
}
