//! 语句分析

use std::mem;
use crate::ast::*;
use crate::codegen::runtime::MAIN_EXIT_LABEL;
use crate::types::{MethodKind, Type};
use super::analyzer::SemanticAnalyzer;

impl SemanticAnalyzer<'_> {
    pub(super) fn analyze_block(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        body.into_iter().map(|stmt| self.analyze_stmt(stmt)).collect()
    }

    pub(super) fn analyze_stmt(&mut self, stmt: Stmt) -> Stmt {
        let ctor_call_allowed = mem::replace(&mut self.ctor_call_allowed, false);
        let Stmt { kind, line } = stmt;
        let kind = match kind {
            StmtKind::Expr(expr) => StmtKind::Expr(self.analyze_expr(expr)),
            StmtKind::Declaration { var_type, names } => {
                let names = self.analyze_declaration(&var_type, names, line);
                StmtKind::Declaration { var_type, names }
            }
            StmtKind::Print(expr) => {
                let expr = self.analyze_expr(expr);
                if !expr.ty.is_int() && !expr.ty.is_error() {
                    self.terminal(
                        line,
                        format!("print expects an int value, found '{}'", self.describe(expr.ty)),
                    );
                }
                StmtKind::Print(expr)
            }
            StmtKind::Block(body) => StmtKind::Block(self.analyze_block(body)),
            StmtKind::If { cond, then_branch, else_branch } => {
                let cond = self.analyze_condition(cond, "if");
                let then_branch = Box::new(self.analyze_stmt(*then_branch));
                let else_branch = else_branch.map(|stmt| Box::new(self.analyze_stmt(*stmt)));
                StmtKind::If { cond, then_branch, else_branch }
            }
            StmtKind::While { cond, body } => {
                let cond = self.analyze_condition(cond, "while");
                self.loop_depth += 1;
                let body = Box::new(self.analyze_stmt(*body));
                self.loop_depth -= 1;
                StmtKind::While { cond, body }
            }
            StmtKind::Return { value, .. } => self.analyze_return(value, line),
            StmtKind::Break => {
                self.check_in_loop("break", line);
                StmtKind::Break
            }
            StmtKind::Continue => {
                self.check_in_loop("continue", line);
                StmtKind::Continue
            }
            StmtKind::Delete(target) => self.analyze_delete(target, line),
            StmtKind::ConstructorInvoke { target, args, .. } => {
                self.analyze_constructor_invoke(target, args, line, ctor_call_allowed)
            }
            StmtKind::Empty => StmtKind::Empty,
        };
        Stmt { kind, line }
    }

    /// 返回成功安装的名字；被拒绝的重复声明不再进入代码生成
    fn analyze_declaration(&mut self, var_type: &TypeName, names: Vec<String>, line: usize) -> Vec<String> {
        let ty = self.resolve_type_name(var_type, line);
        let mut declared = Vec::with_capacity(names.len());
        for name in names {
            let shadows_param = self
                .ctx
                .scopes
                .current_method()
                .is_some_and(|m| self.ctx.types.method(m).param_index(&name).is_some());
            if shadows_param || !self.ctx.current_scope_mut().install(name.clone(), ty) {
                self.ctx
                    .diagnostics
                    .error(line, format!("variable '{}' is already declared", name));
            } else {
                tracing::trace!(variable = %name, "declared variable");
                declared.push(name);
            }
        }
        declared
    }

    fn analyze_condition(&mut self, cond: Expr, construct: &str) -> Expr {
        let cond = self.analyze_expr(cond);
        if !cond.ty.is_int() && !cond.ty.is_error() {
            self.terminal(
                cond.line,
                format!(
                    "condition of '{}' must be an int expression, found '{}'",
                    construct,
                    self.describe(cond.ty)
                ),
            );
        }
        cond
    }

    fn check_in_loop(&mut self, statement: &str, line: usize) {
        if self.loop_depth == 0 {
            self.terminal(line, format!("{} statement out of scope", statement));
        }
    }

    /// 方法内跳到 `<Class>$<signature>$exit`，main 中跳到 `main$exit`
    fn analyze_return(&mut self, value: Option<Expr>, line: usize) -> StmtKind {
        let value = value.map(|v| self.analyze_expr(v));

        if let Some(method) = self.ctx.scopes.current_method() {
            let method = self.ctx.types.method(method);
            let kind = method.kind;
            let return_type = method.return_type;
            let name = method.name.clone();
            let exit_label = method.exit_label();

            let value = match (kind, value) {
                (MethodKind::Method, Some(value)) => match return_type {
                    Some(expected) => Some(self.coerce(value, expected, line)),
                    None => Some(value),
                },
                (MethodKind::Method, None) => {
                    self.terminal(line, format!("method '{}' must return a value", name));
                    None
                }
                (_, Some(value)) => {
                    self.terminal(line, "constructors and destructors cannot return a value");
                    Some(value)
                }
                (_, None) => None,
            };
            return StmtKind::Return { value, exit_label: Some(exit_label) };
        }

        if self.ctx.scopes.in_main() {
            if let Some(v) = &value {
                if !v.ty.is_int() && !v.ty.is_error() {
                    self.terminal(
                        line,
                        format!("main can only return an int value, found '{}'", self.describe(v.ty)),
                    );
                }
            }
            return StmtKind::Return { value, exit_label: Some(MAIN_EXIT_LABEL.to_string()) };
        }

        self.terminal(line, "return statement out of scope");
        StmtKind::Return { value, exit_label: None }
    }

    /// 按赋值规则把返回值转换为声明的返回类型
    fn coerce(&mut self, value: Expr, expected: Type, line: usize) -> Expr {
        if value.ty.is_error() || expected.is_error() || value.ty == expected {
            return value;
        }
        if self.ctx.types.is_assignable(value.ty, expected) {
            return Expr::convert(value, expected);
        }
        self.terminal(
            line,
            format!(
                "cannot return '{}' from a method returning '{}'",
                self.describe(value.ty),
                self.describe(expected)
            ),
        );
        value.into_error()
    }

    fn analyze_delete(&mut self, target: Expr, line: usize) -> StmtKind {
        let target = self.analyze_expr(target);
        match target.ty {
            Type::Class(_) | Type::Error => {}
            Type::Int => self.terminal(line, "Can not delete int values"),
            Type::Null => self.terminal(line, "Can not delete null references"),
            other => {
                self.terminal(line, format!("Can not delete values of type '{}'", self.describe(other)))
            }
        }
        StmtKind::Delete(target)
    }

    fn analyze_constructor_invoke(
        &mut self,
        target: CtorTarget,
        args: Vec<Expr>,
        line: usize,
        allowed: bool,
    ) -> StmtKind {
        let mut args = self.analyze_args(args);
        let mut resolved = None;

        let current = self
            .ctx
            .scopes
            .current_method()
            .filter(|m| self.ctx.types.method(*m).kind == MethodKind::Constructor);
        match current {
            None => self.terminal(line, "constructor invocation outside of a constructor"),
            Some(_) if !allowed => self.terminal(
                line,
                "constructor invocation must be the first statement of a constructor",
            ),
            Some(current) => {
                let owner = self.ctx.types.method(current).owner;
                let class = match target {
                    CtorTarget::This => Some(owner),
                    CtorTarget::Super => self.ctx.types.class(owner).parent,
                };
                if let Some(class) = class {
                    if !args.iter().any(|a| a.ty.is_error()) {
                        let arg_types: Vec<Type> = args.iter().map(|a| a.ty).collect();
                        let name = self.ctx.types.class(class).name.clone();
                        match self
                            .ctx
                            .types
                            .resolve_method(class, &name, MethodKind::Constructor, &arg_types)
                        {
                            Some((id, _)) if id == current => {
                                self.terminal(line, format!("constructor of class '{}' invokes itself", name))
                            }
                            Some((id, exact)) => {
                                args = self.convert_args(args, id, exact);
                                resolved = Some(id);
                            }
                            None => self.terminal(
                                line,
                                format!(
                                    "class '{}' has no constructor {}",
                                    name,
                                    self.describe_call(&name, &arg_types)
                                ),
                            ),
                        }
                    }
                }
            }
        }

        StmtKind::ConstructorInvoke { target, args, resolved }
    }
}
