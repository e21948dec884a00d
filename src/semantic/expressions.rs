//! 表达式分析
//!
//! 每个函数按值接收节点，返回已标注类型的替换节点。
//! 变量与字段引用被包进 Deref；隐式拓宽插入 Convert。
//! 操作数已是 Error 类型时不再重复报告。

use crate::ast::*;
use crate::semantic::scope::ScopeKind;
use crate::types::{MethodId, MethodKind, Type};
use super::analyzer::SemanticAnalyzer;

impl SemanticAnalyzer<'_> {
    pub(super) fn analyze_expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, ty, line } = expr;
        match kind {
            ExprKind::IntLiteral(value) => Expr::typed(line, ExprKind::IntLiteral(value), Type::Int),
            ExprKind::Null => Expr::typed(line, ExprKind::Null, Type::Null),
            ExprKind::This => self.analyze_this(line),
            ExprKind::Variable { name, .. } => self.analyze_variable(name, line),
            ExprKind::Binary { op, left, right } => self.analyze_binary(op, *left, *right, line),
            ExprKind::Unary { op, operand } => self.analyze_unary(op, *operand, line),
            ExprKind::Assign { target, value } => self.analyze_assign(*target, *value, line),
            ExprKind::FieldRef { object, field, .. } => self.analyze_field_ref(*object, field, line),
            ExprKind::Call { receiver, method, args, .. } => self.analyze_call(receiver, method, args, line),
            ExprKind::New { class_name, args, .. } => self.analyze_new(class_name, args, line),
            ExprKind::Cast { target, expr, .. } => self.analyze_cast(target, *expr, line),
            // 变量和字段引用重新分析时会再次包裹
            ExprKind::Deref(inner) => self.analyze_expr(*inner),
            ExprKind::Convert(inner) => {
                let inner = self.analyze_expr(*inner);
                let ty = if ty == Type::NoType { inner.ty } else { ty };
                Expr::convert(inner, ty)
            }
        }
    }

    pub(super) fn analyze_args(&mut self, args: Vec<Expr>) -> Vec<Expr> {
        args.into_iter().map(|arg| self.analyze_expr(arg)).collect()
    }

    fn analyze_this(&mut self, line: usize) -> Expr {
        let ty = match self.ctx.scopes.current_method() {
            Some(method) => Type::Class(self.ctx.types.method(method).owner),
            None => {
                self.terminal(line, "'this' used outside of a method");
                Type::Error
            }
        };
        Expr::typed(line, ExprKind::This, ty)
    }

    fn analyze_variable(&mut self, name: String, line: usize) -> Expr {
        match self.resolve_variable(&name) {
            Some((ty, binding)) => {
                let address = Expr::typed(
                    line,
                    ExprKind::Variable { name, binding: Some(binding) },
                    Type::Deref,
                );
                Expr::deref(address, ty)
            }
            None => {
                self.ctx
                    .diagnostics
                    .error(line, format!("variable '{}' is not declared", name));
                Expr::typed(line, ExprKind::Variable { name, binding: None }, Type::Error)
            }
        }
    }

    /// 依次查找当前作用域、方法参数、外层（类成员）作用域
    fn resolve_variable(&self, name: &str) -> Option<(Type, Binding)> {
        let scope = self.ctx.current_scope();
        if let Some(ty) = scope.lookup(name) {
            return match self.ctx.scopes.current() {
                ScopeKind::Method(_) => scope.position(name).map(|slot| (ty, Binding::Local(slot))),
                ScopeKind::Class(class) => self
                    .ctx
                    .types
                    .field_offset(class, name)
                    .map(|offset| (ty, Binding::Field(offset))),
                ScopeKind::Program => Some((ty, Binding::MainVar)),
            };
        }

        let method = self.ctx.types.method(self.ctx.scopes.current_method()?);
        if let Some(index) = method.param_index(name) {
            return Some((method.params[index].param_type, Binding::Param(index)));
        }

        let ty = self.ctx.enclosing_scope()?.lookup(name)?;
        let offset = self.ctx.types.field_offset(method.owner, name)?;
        Some((ty, Binding::Field(offset)))
    }

    fn analyze_binary(&mut self, op: BinaryOp, left: Expr, right: Expr, line: usize) -> Expr {
        let left = self.analyze_expr(left);
        let right = self.analyze_expr(right);
        if op == BinaryOp::Eq {
            return self.analyze_equality(left, right, line);
        }

        let ty = if left.ty.is_error() || right.ty.is_error() {
            Type::Error
        } else if left.ty.is_int() && right.ty.is_int() {
            Type::Int
        } else {
            self.terminal(
                line,
                format!(
                    "operator '{}' expects int operands, found '{}' and '{}'",
                    op.symbol(),
                    self.describe(left.ty),
                    self.describe(right.ty)
                ),
            );
            Type::Error
        };
        Expr::typed(
            line,
            ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
            ty,
        )
    }

    /// 相等比较：null 与任何值可比；类之间须有祖先关系，较派生的一侧转换为祖先
    fn analyze_equality(&mut self, mut left: Expr, mut right: Expr, line: usize) -> Expr {
        let ty = match (left.ty, right.ty) {
            (Type::Error, _) | (_, Type::Error) => Type::Error,
            (Type::Null, _) | (_, Type::Null) => Type::Int,
            (Type::Int, Type::Int) => Type::Int,
            (Type::Class(a), Type::Class(b)) => match self.ctx.types.related(a, b) {
                Some(ancestor) => {
                    if a != ancestor {
                        left = Expr::convert(left, Type::Class(ancestor));
                    } else if b != ancestor {
                        right = Expr::convert(right, Type::Class(ancestor));
                    }
                    Type::Int
                }
                None => {
                    self.terminal(
                        line,
                        format!(
                            "types are unrelated: cannot compare '{}' with '{}'",
                            self.describe(left.ty),
                            self.describe(right.ty)
                        ),
                    );
                    Type::Error
                }
            },
            (l, r) => {
                self.terminal(
                    line,
                    format!(
                        "operator '==' cannot compare '{}' with '{}'",
                        self.describe(l),
                        self.describe(r)
                    ),
                );
                Type::Error
            }
        };
        Expr::typed(
            line,
            ExprKind::Binary {
                op: BinaryOp::Eq,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        )
    }

    fn analyze_unary(&mut self, op: UnaryOp, operand: Expr, line: usize) -> Expr {
        let operand = self.analyze_expr(operand);
        let ty = match operand.ty {
            Type::Int => Type::Int,
            Type::Error => Type::Error,
            other => {
                self.terminal(
                    line,
                    format!(
                        "operator '{}' expects an int operand, found '{}'",
                        op.symbol(),
                        self.describe(other)
                    ),
                );
                Type::Error
            }
        };
        Expr::typed(line, ExprKind::Unary { op, operand: Box::new(operand) }, ty)
    }

    fn analyze_assign(&mut self, target: Expr, value: Expr, line: usize) -> Expr {
        let target = self.analyze_expr(target);
        let value = self.analyze_expr(value);

        // 赋值目标需要地址：剥去 Deref
        let (target, target_ty) = match target {
            Expr { kind: ExprKind::Deref(address), ty, .. } => (*address, ty),
            other if other.ty.is_error() => (other, Type::Error),
            other => {
                self.terminal(line, "left side of assignment is not assignable");
                (other, Type::Error)
            }
        };

        let (value, ty) = if target_ty.is_error() || value.ty.is_error() {
            (value, Type::Error)
        } else if target_ty == value.ty {
            (value, target_ty)
        } else if target_ty.is_null() {
            self.terminal(line, "cannot assign to a null reference");
            (value, Type::Error)
        } else if target_ty.is_int() || value.ty.is_int() {
            self.terminal(
                line,
                format!(
                    "cannot assign '{}' to '{}'",
                    self.describe(value.ty),
                    self.describe(target_ty)
                ),
            );
            (value, Type::Error)
        } else if self.ctx.types.is_assignable(value.ty, target_ty) {
            (Expr::convert(value, target_ty), target_ty)
        } else {
            let reason = match (value.ty.as_class(), target_ty.as_class()) {
                (Some(from), Some(to)) if self.ctx.types.related(from, to).is_some() => {
                    "an explicit cast is required"
                }
                _ => "types are unrelated",
            };
            self.terminal(
                line,
                format!(
                    "cannot assign '{}' to '{}': {}",
                    self.describe(value.ty),
                    self.describe(target_ty),
                    reason
                ),
            );
            (value, Type::Error)
        };

        Expr::typed(
            line,
            ExprKind::Assign { target: Box::new(target), value: Box::new(value) },
            ty,
        )
    }

    fn analyze_field_ref(&mut self, object: Expr, field: String, line: usize) -> Expr {
        let object = self.analyze_expr(object);
        let resolved = match object.ty {
            Type::Error => None,
            Type::Class(class) => {
                let ty = self.ctx.types.lookup_field(class, &field);
                let offset = self.ctx.types.field_offset(class, &field);
                match (ty, offset) {
                    (Some(ty), Some(offset)) => Some((ty, offset)),
                    _ => {
                        self.terminal(
                            line,
                            format!("class '{}' has no field '{}'", self.describe(object.ty), field),
                        );
                        None
                    }
                }
            }
            other => {
                self.terminal(
                    line,
                    format!(
                        "cannot access field '{}' on a value of type '{}'",
                        field,
                        self.describe(other)
                    ),
                );
                None
            }
        };

        match resolved {
            Some((ty, offset)) => {
                let address = Expr::typed(
                    line,
                    ExprKind::FieldRef { object: Box::new(object), field, offset: Some(offset) },
                    Type::Deref,
                );
                Expr::deref(address, ty)
            }
            None => Expr::typed(
                line,
                ExprKind::FieldRef { object: Box::new(object), field, offset: None },
                Type::Error,
            ),
        }
    }

    fn analyze_call(&mut self, receiver: Receiver, method: String, args: Vec<Expr>, line: usize) -> Expr {
        let args = self.analyze_args(args);
        let current_class = self
            .ctx
            .scopes
            .current_method()
            .map(|m| self.ctx.types.method(m).owner);

        // 确定查找方法的起点类
        let (receiver, search) = match receiver {
            Receiver::Implicit => {
                if current_class.is_none() {
                    self.terminal(
                        line,
                        format!("method '{}' called without a receiver outside of a class", method),
                    );
                }
                (Receiver::Implicit, current_class)
            }
            Receiver::Super => {
                let parent = current_class.and_then(|c| self.ctx.types.class(c).parent);
                if parent.is_none() {
                    self.terminal(line, "'super' used outside of a method");
                }
                (Receiver::Super, parent)
            }
            Receiver::Expr(object) => {
                let object = self.analyze_expr(*object);
                let search = match object.ty {
                    Type::Class(class) => Some(class),
                    Type::Error => None,
                    other => {
                        self.terminal(
                            line,
                            format!(
                                "cannot call method '{}' on a value of type '{}'",
                                method,
                                self.describe(other)
                            ),
                        );
                        None
                    }
                };
                (Receiver::Expr(Box::new(object)), search)
            }
        };

        let mut resolved = None;
        let mut slot = None;
        let mut ty = Type::Error;
        let args = match search {
            Some(class) if !args.iter().any(|a| a.ty.is_error()) => {
                let arg_types: Vec<Type> = args.iter().map(|a| a.ty).collect();
                match self.ctx.types.resolve_method(class, &method, MethodKind::Method, &arg_types) {
                    Some((id, exact)) => {
                        let target = self.ctx.types.method(id);
                        ty = target.return_type.unwrap_or(Type::Error);
                        if !matches!(receiver, Receiver::Super) {
                            slot = self.ctx.types.vmt_slot(class, &target.signature);
                        }
                        resolved = Some(id);
                        self.convert_args(args, id, exact)
                    }
                    None => {
                        self.terminal(
                            line,
                            format!(
                                "method '{}' is not declared in class '{}'",
                                self.describe_call(&method, &arg_types),
                                self.ctx.types.class(class).name
                            ),
                        );
                        args
                    }
                }
            }
            _ => args,
        };

        Expr::typed(
            line,
            ExprKind::Call { receiver, method, args, resolved, slot },
            ty,
        )
    }

    fn analyze_new(&mut self, class_name: String, args: Vec<Expr>, line: usize) -> Expr {
        let args = self.analyze_args(args);
        let Some(class) = self.ctx.types.lookup_class(&class_name) else {
            self.terminal(line, format!("class '{}' is not declared", class_name));
            return Expr::typed(
                line,
                ExprKind::New { class_name, args, class: None, constructor: None },
                Type::Error,
            );
        };
        if args.iter().any(|a| a.ty.is_error()) {
            return Expr::typed(
                line,
                ExprKind::New { class_name, args, class: Some(class), constructor: None },
                Type::Error,
            );
        }

        let arg_types: Vec<Type> = args.iter().map(|a| a.ty).collect();
        match self
            .ctx
            .types
            .resolve_method(class, &class_name, MethodKind::Constructor, &arg_types)
        {
            Some((id, exact)) => {
                let args = self.convert_args(args, id, exact);
                Expr::typed(
                    line,
                    ExprKind::New { class_name, args, class: Some(class), constructor: Some(id) },
                    Type::Class(class),
                )
            }
            None => {
                self.terminal(
                    line,
                    format!(
                        "class '{}' has no constructor {}",
                        class_name,
                        self.describe_call(&class_name, &arg_types)
                    ),
                );
                Expr::typed(
                    line,
                    ExprKind::New { class_name, args, class: Some(class), constructor: None },
                    Type::Error,
                )
            }
        }
    }

    /// 目标类必须已声明；向下转换是否合法留到运行时检查
    fn analyze_cast(&mut self, target: String, expr: Expr, line: usize) -> Expr {
        let expr = self.analyze_expr(expr);
        let class = self.ctx.types.lookup_class(&target);
        let ty = match (class, expr.ty) {
            (None, _) => {
                self.terminal(line, format!("cast to undeclared class '{}'", target));
                Type::Error
            }
            (Some(_), Type::Error) => Type::Error,
            (Some(class), Type::Class(_) | Type::Null) => Type::Class(class),
            (Some(_), other) => {
                self.terminal(
                    line,
                    format!(
                        "cannot cast a value of type '{}' to class '{}'",
                        self.describe(other),
                        target
                    ),
                );
                Type::Error
            }
        };
        Expr::typed(line, ExprKind::Cast { target, expr: Box::new(expr), class }, ty)
    }

    /// 非精确匹配时给类型不同的实参加上 Convert
    pub(super) fn convert_args(&self, args: Vec<Expr>, method: MethodId, exact: bool) -> Vec<Expr> {
        if exact {
            return args;
        }
        let params: Vec<Type> = self
            .ctx
            .types
            .method(method)
            .params
            .iter()
            .map(|p| p.param_type)
            .collect();
        args.into_iter()
            .zip(params)
            .map(|(arg, param)| if arg.ty == param { arg } else { Expr::convert(arg, param) })
            .collect()
    }
}
