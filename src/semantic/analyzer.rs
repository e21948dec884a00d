//! 语义分析器核心实现

use crate::ast::*;
use crate::context::CompilationContext;
use crate::error::TError;
use crate::types::Type;

/// 语义分析器
pub struct SemanticAnalyzer<'a> {
    pub(super) ctx: &'a mut CompilationContext,
    /// 当前所在 while 循环的嵌套深度
    pub(super) loop_depth: usize,
    /// 只有构造函数体的首句可以是 this(...) / super(...)
    pub(super) ctor_call_allowed: bool,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(ctx: &'a mut CompilationContext) -> Self {
        Self {
            ctx,
            loop_depth: 0,
            ctor_call_allowed: false,
        }
    }

    /// 分析并改写整棵树；诊断记录在上下文中
    #[tracing::instrument(skip_all, fields(classes = unit.classes.len()))]
    pub fn analyze(&mut self, unit: CompilationUnit) -> CompilationUnit {
        let CompilationUnit { mut classes, main } = unit;

        // 第一遍：登记类并解析继承关系
        let order = self.collect_classes(&mut classes);

        // 第二遍：声明字段与方法（父类先于子类）
        for &index in &order {
            self.declare_members(&mut classes[index]);
        }

        // 第三遍：继承字段，合成缺省构造/析构函数
        for &index in &order {
            self.complete_class(&mut classes[index]);
        }

        // 第四遍：构造 VMT
        for &index in &order {
            if let Some(id) = classes[index].resolved {
                self.ctx.types.build_vmt(id);
            }
        }

        // 第五遍：分析方法体与 main
        for class in classes.iter_mut() {
            self.analyze_class_bodies(class);
        }
        let main = self.analyze_main(main);

        tracing::debug!(
            diagnostics = self.ctx.diagnostics.len(),
            aborted = self.ctx.is_aborted(),
            "semantic analysis finished"
        );
        CompilationUnit { classes, main }
    }

    fn analyze_main(&mut self, main: MainBlock) -> MainBlock {
        self.ctx.scopes.enter_main();
        self.loop_depth = 0;
        let body = self.analyze_block(main.body);
        self.ctx.scopes.leave_main();
        MainBlock { body, line: main.line }
    }

    pub(super) fn resolve_type_name(&mut self, name: &TypeName, line: usize) -> Type {
        match name {
            TypeName::Int => Type::Int,
            TypeName::Class(class) => match self.ctx.types.lookup_class(class) {
                Some(id) => Type::Class(id),
                None => {
                    self.terminal(line, format!("type '{}' is not declared", class));
                    Type::Error
                }
            },
        }
    }

    pub(super) fn describe(&self, ty: Type) -> String {
        self.ctx.types.type_name(ty)
    }

    /// 形如 `f(int, A)` 的调用描述，用于诊断
    pub(super) fn describe_call(&self, name: &str, args: &[Type]) -> String {
        let args: Vec<String> = args.iter().map(|t| self.describe(*t)).collect();
        format!("{}({})", name, args.join(", "))
    }

    pub(super) fn terminal(&mut self, line: usize, message: impl Into<String>) {
        self.ctx.diagnostics.terminal(line, message);
    }

    pub(super) fn report_error(&mut self, err: TError) {
        match err {
            TError::Semantic { line, message } => self.terminal(line, message),
            other => self.terminal(0, other.to_string()),
        }
    }
}
