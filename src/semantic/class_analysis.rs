//! 类定义、继承关系与成员声明分析

use std::mem;
use crate::ast::{ClassDecl, Member, MethodDecl, Stmt, StmtKind};
use crate::types::{ClassId, MethodKind, ParameterInfo, Redeclaration, Type, OBJECT_CLASS};
use super::analyzer::SemanticAnalyzer;

impl SemanticAnalyzer<'_> {
    /// 登记全部类并解析父类，返回父类先于子类的处理顺序
    pub(super) fn collect_classes(&mut self, classes: &mut [ClassDecl]) -> Vec<usize> {
        for class in classes.iter_mut() {
            match self.ctx.types.register_class(&class.name, class.line) {
                Ok(id) => class.resolved = Some(id),
                Err(err) => self.report_error(err),
            }
        }

        let object = self.ctx.types.object();
        for class in classes.iter() {
            let Some(id) = class.resolved else { continue };
            let parent_name = class.parent.as_deref().unwrap_or(OBJECT_CLASS);
            let parent = match self.ctx.types.lookup_class(parent_name) {
                Some(parent) => parent,
                None => {
                    self.terminal(
                        class.line,
                        format!("Class '{}' extends undefined class '{}'", class.name, parent_name),
                    );
                    object
                }
            };
            self.ctx.types.set_parent(id, parent);
        }

        // 检测循环继承，出错的类改挂到 Object 下继续分析
        for class in classes.iter() {
            let Some(id) = class.resolved else { continue };
            if self.inherits_from_itself(id) {
                self.terminal(
                    class.line,
                    format!("Circular inheritance detected involving class '{}'", class.name),
                );
                self.ctx.types.set_parent(id, object);
            }
        }

        let mut order: Vec<usize> = (0..classes.len())
            .filter(|&i| classes[i].resolved.is_some())
            .collect();
        order.sort_by_key(|&i| {
            classes[i]
                .resolved
                .map_or(0, |id| self.ctx.types.chain(id).len())
        });
        order
    }

    fn inherits_from_itself(&self, class: ClassId) -> bool {
        let mut visited = Vec::new();
        let mut current = self.ctx.types.class(class).parent;
        while let Some(parent) = current {
            if parent == class {
                return true;
            }
            if visited.contains(&parent) {
                return false;
            }
            visited.push(parent);
            current = self.ctx.types.class(parent).parent;
        }
        false
    }

    /// 声明类的字段与方法，并标记所属类
    pub(super) fn declare_members(&mut self, class: &mut ClassDecl) {
        let Some(id) = class.resolved else { return };
        for member in class.members.iter_mut() {
            match member {
                Member::Field(field) => {
                    field.owner = Some(class.name.clone());
                    let ty = self.resolve_type_name(&field.field_type, field.line);
                    for name in &field.names {
                        if let Err(redeclared) = self.ctx.types.add_member(id, name, ty) {
                            self.report_redeclaration(field.line, &class.name, redeclared);
                        }
                    }
                }
                Member::Method(method) => {
                    method.owner = Some(class.name.clone());
                    self.declare_method(id, method);
                }
            }
        }
    }

    /// 建立方法类型并加入所属类
    pub(super) fn declare_method(&mut self, class: ClassId, method: &mut MethodDecl) {
        let class_name = self.ctx.types.class(class).name.clone();

        let mut params: Vec<ParameterInfo> = Vec::with_capacity(method.params.len());
        for param in &method.params {
            let ty = self.resolve_type_name(&param.param_type, param.line);
            if params.iter().any(|p| p.name == param.name) {
                self.terminal(
                    param.line,
                    format!("duplicate parameter declaration '{}' in method '{}'", param.name, method.name),
                );
                continue;
            }
            params.push(ParameterInfo::new(param.name.clone(), ty));
        }

        let return_type = match (method.kind, &method.return_type) {
            (MethodKind::Method, Some(name)) => Some(self.resolve_type_name(name, method.line)),
            (MethodKind::Method, None) => {
                self.terminal(method.line, format!("method '{}' must declare a return type", method.name));
                Some(Type::Error)
            }
            (_, Some(_)) => {
                self.terminal(
                    method.line,
                    format!("constructors and destructors of class '{}' cannot declare a return type", class_name),
                );
                None
            }
            (_, None) => None,
        };

        match method.kind {
            MethodKind::Constructor if method.name != class_name => {
                self.terminal(
                    method.line,
                    format!("constructor '{}' does not match class name '{}'", method.name, class_name),
                );
            }
            MethodKind::Destructor if !method.params.is_empty() => {
                self.terminal(
                    method.line,
                    format!("destructor of class '{}' cannot take parameters", class_name),
                );
            }
            _ => {}
        }

        let id = self
            .ctx
            .types
            .declare_method(class, &method.name, method.kind, params, return_type);
        match self.ctx.types.add_member(class, &method.name, Type::Method(id)) {
            Ok(()) => {
                method.resolved = Some(id);
                if !method.synthetic {
                    let class_type = self.ctx.types.class_mut(class);
                    match method.kind {
                        MethodKind::Constructor => class_type.has_constructor = true,
                        MethodKind::Destructor => class_type.has_destructor = true,
                        MethodKind::Method => {}
                    }
                }
                tracing::trace!(label = %self.ctx.types.method(id).label, "declared method");
            }
            Err(redeclared) => self.report_redeclaration(method.line, &class_name, redeclared),
        }
    }

    fn report_redeclaration(&mut self, line: usize, class: &str, redeclared: Redeclaration) {
        let message = match &redeclared {
            Redeclaration::Field(name) => {
                format!("field '{}' is already declared in class '{}'", name, class)
            }
            Redeclaration::Method(signature) => {
                format!("method '{}' is already declared in class '{}'", signature, class)
            }
            Redeclaration::Destructor => {
                format!("class '{}' declares more than one destructor", class)
            }
        };
        self.ctx.diagnostics.report(line, redeclared.severity(), message);
    }

    /// 继承字段；没有显式构造/析构函数时合成转发给父类的缺省版本
    pub(super) fn complete_class(&mut self, class: &mut ClassDecl) {
        let Some(id) = class.resolved else { return };
        self.ctx.types.inherit_fields(id);

        if !self.ctx.types.class(id).has_constructor {
            let body = vec![Stmt::super_call(class.line, Vec::new())];
            let ctor = MethodDecl::build(
                class.line,
                MethodKind::Constructor,
                class.name.clone(),
                None,
                Vec::new(),
                body,
            );
            self.graft_default(id, class, ctor);
        }
        if self.ctx.types.class(id).destructor.is_none() {
            // 父类析构函数在出口处统一调用
            let dtor = MethodDecl::build(
                class.line,
                MethodKind::Destructor,
                format!("~{}", class.name),
                None,
                Vec::new(),
                Vec::new(),
            );
            self.graft_default(id, class, dtor);
        }
    }

    fn graft_default(&mut self, id: ClassId, class: &mut ClassDecl, mut method: MethodDecl) {
        method.synthetic = true;
        method.owner = Some(class.name.clone());
        self.declare_method(id, &mut method);
        tracing::debug!(class = %class.name, method = %method.name, "synthesized default member");
        class.members.push(Member::Method(method));
    }

    pub(super) fn analyze_class_bodies(&mut self, class: &mut ClassDecl) {
        let Some(id) = class.resolved else { return };
        self.ctx.scopes.enter_class(id);
        for member in class.members.iter_mut() {
            if let Member::Method(method) = member {
                self.analyze_method(method);
            }
        }
        self.ctx.scopes.leave_class();
    }

    fn analyze_method(&mut self, method: &mut MethodDecl) {
        let Some(id) = method.resolved else { return };
        self.ctx.scopes.enter_method(id);
        self.loop_depth = 0;

        let mut body = mem::take(&mut method.body);
        let is_constructor = method.kind == MethodKind::Constructor;
        let invokes_constructor = matches!(
            body.first(),
            Some(Stmt { kind: StmtKind::ConstructorInvoke { .. }, .. })
        );
        if is_constructor && !invokes_constructor {
            // 隐式 super()
            body.insert(0, Stmt::super_call(method.line, Vec::new()));
        }

        self.ctor_call_allowed = is_constructor;
        method.body = self.analyze_block(body);
        self.ctor_call_allowed = false;
        self.ctx.scopes.leave_method();
    }
}
