//! 作用域管理器
//!
//! 只记录"在 main 中 / 在类 C 中 / 在 C 的方法 M 中"，
//! 具体的符号表由 `CompilationContext` 根据当前状态给出。

use crate::types::{ClassId, MethodId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Method(MethodId),
    Class(ClassId),
    /// main 块，以及任何类之外的位置
    Program,
}

#[derive(Debug, Default, Clone)]
pub struct ScopeManager {
    in_main: bool,
    class: Option<ClassId>,
    method: Option<MethodId>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_main(&mut self) {
        self.in_main = true;
    }

    pub fn leave_main(&mut self) {
        self.in_main = false;
    }

    pub fn enter_class(&mut self, class: ClassId) {
        self.class = Some(class);
    }

    pub fn leave_class(&mut self) {
        self.class = None;
        self.method = None;
    }

    pub fn enter_method(&mut self, method: MethodId) {
        self.method = Some(method);
    }

    pub fn leave_method(&mut self) {
        self.method = None;
    }

    pub fn in_main(&self) -> bool {
        self.in_main
    }

    pub fn current_class(&self) -> Option<ClassId> {
        self.class
    }

    pub fn current_method(&self) -> Option<MethodId> {
        // 方法只在类内有效
        self.class.and(self.method)
    }

    pub fn current(&self) -> ScopeKind {
        match (self.class, self.method) {
            (Some(_), Some(method)) => ScopeKind::Method(method),
            (Some(class), None) => ScopeKind::Class(class),
            (None, _) => ScopeKind::Program,
        }
    }
}
