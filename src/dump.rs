//! 语法树与类表的文本转储
//!
//! 每个节点占一行，子节点缩进两格；表达式行以 `: <类型>` 结尾。

use std::fmt::Write;

use crate::ast::*;
use crate::types::{vmt_method_offset, MethodKind, TypeRegistry, VMT_DESTRUCTOR_OFFSET};

struct TreeWriter<'a> {
    types: &'a TypeRegistry,
    out: String,
    depth: usize,
}

impl<'a> TreeWriter<'a> {
    fn new(types: &'a TypeRegistry) -> Self {
        Self {
            types,
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn type_name(name: &TypeName) -> &str {
        match name {
            TypeName::Int => "int",
            TypeName::Class(class) => class,
        }
    }

    fn class(&mut self, decl: &ClassDecl) {
        let parent = decl.parent.as_deref().unwrap_or("Object");
        self.line(&format!("ClassDecl {} extends {} (line {})", decl.name, parent, decl.line));
        self.nested(|w| {
            for member in &decl.members {
                match member {
                    Member::Field(field) => w.line(&format!(
                        "Field {} {}",
                        Self::type_name(&field.field_type),
                        field.names.join(", ")
                    )),
                    Member::Method(method) => w.method(method),
                }
            }
        });
    }

    fn method(&mut self, decl: &MethodDecl) {
        let kind = match decl.kind {
            MethodKind::Method => "Method",
            MethodKind::Constructor => "Constructor",
            MethodKind::Destructor => "Destructor",
        };
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| format!("{} {}", Self::type_name(&p.param_type), p.name))
            .collect();
        let mut header = format!("{} {}({})", kind, decl.name, params.join(", "));
        if let Some(ret) = &decl.return_type {
            let _ = write!(header, " -> {}", Self::type_name(ret));
        }
        if decl.synthetic {
            header.push_str(" [synthetic]");
        }
        self.line(&header);
        self.nested(|w| w.stmts(&decl.body));
    }

    fn stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.line("ExprStmt");
                self.nested(|w| w.expr(expr));
            }
            StmtKind::Declaration { var_type, names } => {
                self.line(&format!("Declaration {} {}", Self::type_name(var_type), names.join(", ")));
            }
            StmtKind::Print(expr) => {
                self.line("Print");
                self.nested(|w| w.expr(expr));
            }
            StmtKind::Block(body) => {
                self.line("Block");
                self.nested(|w| w.stmts(body));
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.line("If");
                self.nested(|w| {
                    w.expr(cond);
                    w.stmt(then_branch);
                    if let Some(else_branch) = else_branch {
                        w.line("Else");
                        w.nested(|w| w.stmt(else_branch));
                    }
                });
            }
            StmtKind::While { cond, body } => {
                self.line("While");
                self.nested(|w| {
                    w.expr(cond);
                    w.stmt(body);
                });
            }
            StmtKind::Return { value, exit_label } => {
                match exit_label {
                    Some(label) => self.line(&format!("Return -> {}", label)),
                    None => self.line("Return"),
                }
                if let Some(value) = value {
                    self.nested(|w| w.expr(value));
                }
            }
            StmtKind::Break => self.line("Break"),
            StmtKind::Continue => self.line("Continue"),
            StmtKind::Delete(target) => {
                self.line("Delete");
                self.nested(|w| w.expr(target));
            }
            StmtKind::ConstructorInvoke { target, args, resolved } => {
                let name = match target {
                    CtorTarget::This => "this",
                    CtorTarget::Super => "super",
                };
                match resolved {
                    Some(id) => self.line(&format!("ConstructorInvoke {} -> {}", name, self.types.method(*id).label)),
                    None => self.line(&format!("ConstructorInvoke {}", name)),
                }
                self.nested(|w| args.iter().for_each(|a| w.expr(a)));
            }
            StmtKind::Empty => self.line("Empty"),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let head = match &expr.kind {
            ExprKind::IntLiteral(value) => format!("IntLiteral {}", value),
            ExprKind::Null => "Null".to_string(),
            ExprKind::This => "This".to_string(),
            ExprKind::Variable { name, binding } => match binding {
                Some(binding) => format!("Variable {} {:?}", name, binding),
                None => format!("Variable {}", name),
            },
            ExprKind::Binary { op, .. } => format!("Binary {}", op.symbol()),
            ExprKind::Unary { op, .. } => format!("Unary {}", op.symbol()),
            ExprKind::Assign { .. } => "Assign".to_string(),
            ExprKind::FieldRef { field, offset, .. } => match offset {
                Some(offset) => format!("FieldRef {} @{}", field, offset),
                None => format!("FieldRef {}", field),
            },
            ExprKind::Call { receiver, method, resolved, slot, .. } => {
                let mut head = match receiver {
                    Receiver::Super => format!("Call super.{}", method),
                    _ => format!("Call {}", method),
                };
                if let Some(id) = resolved {
                    let _ = write!(head, " -> {}", self.types.method(*id).label);
                }
                if let Some(slot) = slot {
                    let _ = write!(head, " [slot {}]", slot);
                }
                head
            }
            ExprKind::New { class_name, .. } => format!("New {}", class_name),
            ExprKind::Cast { target, .. } => format!("Cast {}", target),
            ExprKind::Deref(_) => "Deref".to_string(),
            ExprKind::Convert(_) => "Convert".to_string(),
        };
        self.line(&format!("{} : {}", head, self.types.type_name(expr.ty)));

        self.nested(|w| match &expr.kind {
            ExprKind::Binary { left, right, .. } => {
                w.expr(left);
                w.expr(right);
            }
            ExprKind::Unary { operand, .. } => w.expr(operand),
            ExprKind::Assign { target, value } => {
                w.expr(target);
                w.expr(value);
            }
            ExprKind::FieldRef { object, .. } => w.expr(object),
            ExprKind::Call { receiver, args, .. } => {
                if let Receiver::Expr(object) = receiver {
                    w.expr(object);
                }
                args.iter().for_each(|a| w.expr(a));
            }
            ExprKind::New { args, .. } => args.iter().for_each(|a| w.expr(a)),
            ExprKind::Cast { expr, .. } | ExprKind::Deref(expr) | ExprKind::Convert(expr) => w.expr(expr),
            ExprKind::IntLiteral(_) | ExprKind::Null | ExprKind::This | ExprKind::Variable { .. } => {}
        });
    }
}

/// 转储整棵语法树
pub fn dump_unit(unit: &CompilationUnit, types: &TypeRegistry) -> String {
    let mut writer = TreeWriter::new(types);
    writer.line("CompilationUnit");
    writer.nested(|w| {
        for class in &unit.classes {
            w.class(class);
        }
        w.line(&format!("Main (line {})", unit.main.line));
        w.nested(|w| w.stmts(&unit.main.body));
    });
    writer.out
}

/// 转储类表：字段偏移、方法标签与 VMT 布局
pub fn dump_classes(types: &TypeRegistry) -> String {
    let mut out = String::new();
    for (id, class) in types.classes() {
        match class.parent {
            Some(parent) => {
                let _ = writeln!(out, "class {} extends {}", class.name, types.class(parent).name);
            }
            None => {
                let _ = writeln!(out, "class {}", class.name);
            }
        }
        for (owner, name) in types.field_layout(id) {
            let offset = types.field_offset(owner, &name).unwrap_or_default();
            let ty = types.lookup_field(owner, &name).unwrap_or(types.error_type());
            let _ = writeln!(out, "  field {}.{} : {} @{}", types.class(owner).name, name, types.type_name(ty), offset);
        }
        for &method in &class.methods {
            let method = types.method(method);
            let _ = writeln!(out, "  method {} ({} locals)", method.label, method.locals.len());
        }
        let _ = writeln!(out, "  vmt {}", class.vmt_label());
        let destructor = class
            .destructor
            .map(|d| types.method(d).label.clone())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "    @{} {}", VMT_DESTRUCTOR_OFFSET, destructor);
        for (slot, &method) in class.vmt.iter().enumerate() {
            let _ = writeln!(out, "    @{} {}", vmt_method_offset(slot), types.method(method).label);
        }
    }
    out
}
