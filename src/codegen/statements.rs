//! 语句代码生成（包含所有控制流结构）
//!
//! 每条语句执行前后栈深度不变。

use crate::ast::*;
use crate::codegen::context::AsmGenerator;
use crate::codegen::runtime::{main_var_label, OUTPUT_INTEGER, RELEASE};
use crate::error::{codegen_error, TResult};
use crate::types::VMT_DESTRUCTOR_OFFSET;

impl AsmGenerator<'_> {
    /// 生成单个语句代码
    pub fn generate_statement(&mut self, stmt: &Stmt) -> TResult<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.generate_expression(expr)?;
                self.emit_line("\taddl\t$4, %esp");
            }
            StmtKind::Declaration { names, .. } => {
                // 方法内的局部变量已在栈帧中预留
                if self.in_main {
                    for name in names {
                        self.emit_line("\t.data");
                        self.emit_line("\t.align 4");
                        self.emit_line(&format!("{}:\t.long 0", main_var_label(name)));
                        self.emit_line("\t.text");
                    }
                }
            }
            StmtKind::Print(expr) => {
                self.generate_expression(expr)?;
                self.emit_line(&format!("\tcall\t{}", OUTPUT_INTEGER));
                self.emit_line("\taddl\t$4, %esp");
            }
            StmtKind::Block(body) => {
                for stmt in body {
                    self.generate_statement(stmt)?;
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.generate_if_statement(cond, then_branch, else_branch.as_deref())?;
            }
            StmtKind::While { cond, body } => {
                self.generate_while_statement(cond, body)?;
            }
            StmtKind::Return { value, exit_label } => {
                let exit_label = exit_label.as_ref().ok_or_else(|| {
                    codegen_error(format!("line {}: return statement has no exit label", stmt.line))
                })?;
                if let Some(value) = value {
                    self.generate_expression(value)?;
                    self.emit_line("\tpopl\t%eax");
                }
                self.emit_line(&format!("\tjmp\t{}", exit_label));
            }
            StmtKind::Break => {
                let target = self
                    .current_loop()
                    .map(|l| l.end_label.clone())
                    .ok_or_else(|| codegen_error(format!("line {}: break outside of a loop", stmt.line)))?;
                self.emit_line(&format!("\tjmp\t{}", target));
            }
            StmtKind::Continue => {
                let target = self
                    .current_loop()
                    .map(|l| l.cond_label.clone())
                    .ok_or_else(|| codegen_error(format!("line {}: continue outside of a loop", stmt.line)))?;
                self.emit_line(&format!("\tjmp\t{}", target));
            }
            StmtKind::Delete(target) => {
                self.generate_delete(target, stmt.line)?;
            }
            StmtKind::ConstructorInvoke { args, resolved, .. } => {
                let ctx = self.ctx;
                let ctor = resolved.ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved constructor invocation", stmt.line))
                })?;
                self.generate_arguments(args)?;
                self.emit_load_this();
                self.emit_line(&format!("\tcall\t{}", ctx.types.method(ctor).label));
                self.emit_line(&format!("\taddl\t${}, %esp", 4 * (args.len() + 1)));
            }
            StmtKind::Empty => {}
        }
        Ok(())
    }

    /// 生成 if 语句代码
    fn generate_if_statement(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> TResult<()> {
        let else_label = self.new_label();
        let end_label = self.new_label();

        self.generate_expression(cond)?;
        self.emit_line("\tpopl\t%eax");
        self.emit_line("\tcmpl\t$0, %eax");
        self.emit_line(&format!("\tje\t{}", else_label));
        self.generate_statement(then_branch)?;
        self.emit_line(&format!("\tjmp\t{}", end_label));

        self.emit_label(&else_label);
        if let Some(else_branch) = else_branch {
            self.generate_statement(else_branch)?;
        }
        self.emit_label(&end_label);
        Ok(())
    }

    /// 生成 while 语句代码
    fn generate_while_statement(&mut self, cond: &Expr, body: &Stmt) -> TResult<()> {
        let (cond_label, end_label) = self.new_loop_labels();

        // 条件块
        self.emit_label(&cond_label);
        self.generate_expression(cond)?;
        self.emit_line("\tpopl\t%eax");
        self.emit_line("\tcmpl\t$0, %eax");
        self.emit_line(&format!("\tje\t{}", end_label));

        // 循环体
        self.enter_loop(cond_label.clone(), end_label.clone());
        self.generate_statement(body)?;
        self.exit_loop();
        self.emit_line(&format!("\tjmp\t{}", cond_label));

        // 结束块
        self.emit_label(&end_label);
        Ok(())
    }

    /// 空检查后经 VMT 槽 1 调用析构函数，再释放对象
    fn generate_delete(&mut self, target: &Expr, line: usize) -> TResult<()> {
        self.generate_expression(target)?;
        self.emit_null_check(line);
        self.emit_line("\tmovl\t(%esp), %eax");
        self.emit_line("\tmovl\t(%eax), %eax");
        self.emit_line(&format!("\tmovl\t{}(%eax), %eax", VMT_DESTRUCTOR_OFFSET));
        self.emit_line("\tcall\t*%eax");
        self.emit_line(&format!("\tcall\t{}", RELEASE));
        self.emit_line("\taddl\t$4, %esp");
        Ok(())
    }
}
