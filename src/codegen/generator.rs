//! 程序级代码生成：VMT 数据、类方法与 main

use crate::ast::{ClassDecl, CompilationUnit, MainBlock, Member, MethodDecl};
use crate::codegen::context::AsmGenerator;
use crate::codegen::runtime::{MAIN_EXIT_LABEL, MAIN_LABEL};
use crate::error::{codegen_error, TResult};
use crate::types::{ClassId, MethodKind};

impl AsmGenerator<'_> {
    /// 生成整个程序的汇编文本
    #[tracing::instrument(skip_all, fields(classes = unit.classes.len()))]
    pub fn generate(&mut self, unit: &CompilationUnit) -> TResult<String> {
        self.emit_header();
        self.emit_vmts()?;
        self.emit_object_routines()?;

        for class in &unit.classes {
            self.generate_class(class)?;
        }
        self.generate_main(&unit.main)?;

        tracing::debug!(bytes = self.code.len(), "code generation finished");
        Ok(std::mem::take(&mut self.code))
    }

    /// 每个类一张 VMT：父类 VMT、析构函数、虚方法槽位
    fn emit_vmts(&mut self) -> TResult<()> {
        let ctx = self.ctx;
        self.emit_line("\t.data");
        for (_, class) in ctx.types.classes() {
            let destructor = class
                .destructor
                .ok_or_else(|| codegen_error(format!("class '{}' has no destructor", class.name)))?;
            let parent = class
                .parent
                .map(|p| ctx.types.class(p).vmt_label())
                .unwrap_or_else(|| "0".to_string());

            self.emit_line("\t.align 4");
            self.emit_label(&class.vmt_label());
            self.emit_line(&format!("\t.long\t{}", parent));
            self.emit_line(&format!("\t.long\t{}", ctx.types.method(destructor).label));
            for &slot in &class.vmt {
                self.emit_line(&format!("\t.long\t{}", ctx.types.method(slot).label));
            }
        }
        Ok(())
    }

    fn generate_class(&mut self, class: &ClassDecl) -> TResult<()> {
        let id = class
            .resolved
            .ok_or_else(|| codegen_error(format!("class '{}' was not analyzed", class.name)))?;
        self.emit_comment(&format!("class {}", class.name));
        for member in &class.members {
            if let Member::Method(method) = member {
                self.generate_method(id, method)?;
            }
        }
        Ok(())
    }

    fn generate_method(&mut self, class: ClassId, method: &MethodDecl) -> TResult<()> {
        let ctx = self.ctx;
        let id = method
            .resolved
            .ok_or_else(|| codegen_error(format!("method '{}' was not analyzed", method.name)))?;
        let method_type = ctx.types.method(id);

        self.in_main = false;
        self.emit_prologue(&method_type.label, method_type.locals.len());
        for stmt in &method.body {
            self.generate_statement(stmt)?;
        }
        self.emit_line("\tmovl\t$0, %eax");
        self.emit_label(&method_type.exit_label());

        // 析构函数结束时调用父类析构函数
        if method_type.kind == MethodKind::Destructor {
            if let Some(parent) = ctx.types.class(class).parent {
                let parent_destructor = ctx.types.class(parent).destructor.ok_or_else(|| {
                    codegen_error(format!("class '{}' has no destructor", ctx.types.class(parent).name))
                })?;
                self.emit_line("\tpushl\t8(%ebp)");
                self.emit_line(&format!("\tcall\t{}", ctx.types.method(parent_destructor).label));
                self.emit_line("\taddl\t$4, %esp");
            }
        }
        self.emit_epilogue();
        Ok(())
    }

    fn generate_main(&mut self, main: &MainBlock) -> TResult<()> {
        self.in_main = true;
        self.emit_comment("main");
        self.emit_prologue(MAIN_LABEL, 0);
        for stmt in &main.body {
            self.generate_statement(stmt)?;
        }
        self.emit_line("\tmovl\t$0, %eax");
        self.emit_label(MAIN_EXIT_LABEL);
        self.emit_epilogue();
        self.in_main = false;
        Ok(())
    }
}
