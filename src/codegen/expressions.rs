//! 表达式代码生成
//!
//! 每个表达式求值后恰好在栈顶留下一个单元：地址节点留下地址，其余留下值。

use crate::ast::*;
use crate::codegen::context::AsmGenerator;
use crate::codegen::runtime::{main_var_label, ALLOCATE, REPORT_DIVIDE_BY_ZERO};
use crate::error::{codegen_error, TResult};
use crate::types::{vmt_method_offset, ClassId, MethodId, Type};

impl AsmGenerator<'_> {
    pub fn generate_expression(&mut self, expr: &Expr) -> TResult<()> {
        if matches!(expr.ty, Type::Error | Type::NoType) {
            return Err(codegen_error(format!(
                "line {}: refusing to generate code for an ill-typed expression",
                expr.line
            )));
        }

        match &expr.kind {
            ExprKind::IntLiteral(value) => self.emit_line(&format!("\tpushl\t${}", value)),
            ExprKind::Null => self.emit_line("\tpushl\t$0"),
            ExprKind::This => self.emit_load_this(),
            ExprKind::Variable { name, binding } => {
                let binding = binding.ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved variable '{}'", expr.line, name))
                })?;
                self.generate_variable_address(name, binding);
            }
            ExprKind::Binary { op, left, right } => {
                self.generate_expression(left)?;
                self.generate_expression(right)?;
                self.generate_binary_operation(*op, expr.line);
            }
            ExprKind::Unary { op, operand } => {
                self.generate_expression(operand)?;
                self.emit_line("\tpopl\t%eax");
                match op {
                    UnaryOp::Neg => self.emit_line("\tnegl\t%eax"),
                    UnaryOp::Not => {
                        self.emit_line("\tcmpl\t$0, %eax");
                        self.emit_line("\tsete\t%al");
                        self.emit_line("\tmovzbl\t%al, %eax");
                    }
                }
                self.emit_line("\tpushl\t%eax");
            }
            ExprKind::Assign { target, value } => {
                self.generate_expression(target)?;
                self.generate_expression(value)?;
                self.emit_line("\tpopl\t%eax");
                self.emit_line("\tpopl\t%edx");
                self.emit_line("\tmovl\t%eax, (%edx)");
                self.emit_line("\tpushl\t%eax");
            }
            ExprKind::FieldRef { object, field, offset } => {
                let offset = offset.ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved field '{}'", expr.line, field))
                })?;
                self.generate_expression(object)?;
                self.emit_null_check(expr.line);
                self.emit_line("\tpopl\t%eax");
                self.emit_line(&format!("\taddl\t${}, %eax", offset));
                self.emit_line("\tpushl\t%eax");
            }
            ExprKind::Call { receiver, method, args, resolved, slot } => {
                let resolved = resolved.ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved method '{}'", expr.line, method))
                })?;
                self.generate_call(receiver, args, resolved, *slot, expr.line)?;
            }
            ExprKind::New { class_name, args, class, constructor } => {
                let (class, constructor) = class.zip(*constructor).ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved instantiation of '{}'", expr.line, class_name))
                })?;
                self.generate_new(args, class, constructor, expr.line)?;
            }
            ExprKind::Cast { target, expr: inner, class } => {
                let class = class.ok_or_else(|| {
                    codegen_error(format!("line {}: unresolved cast to '{}'", expr.line, target))
                })?;
                self.generate_expression(inner)?;
                let vmt = self.ctx.types.class(class).vmt_label();
                self.emit_cast_check(&vmt, expr.line);
            }
            ExprKind::Deref(address) => {
                self.generate_expression(address)?;
                self.emit_line("\tpopl\t%eax");
                self.emit_line("\tmovl\t(%eax), %eax");
                self.emit_line("\tpushl\t%eax");
            }
            // 引用的表示不变
            ExprKind::Convert(inner) => self.generate_expression(inner)?,
        }
        Ok(())
    }

    pub(super) fn emit_load_this(&mut self) {
        self.emit_line("\tmovl\t8(%ebp), %eax");
        self.emit_line("\tpushl\t%eax");
    }

    /// 压入变量的存储地址
    fn generate_variable_address(&mut self, name: &str, binding: Binding) {
        match binding {
            Binding::MainVar => self.emit_line(&format!("\tpushl\t${}", main_var_label(name))),
            Binding::Param(index) => {
                // 8(%ebp) 是 this，参数从 12(%ebp) 开始
                self.emit_line(&format!("\tleal\t{}(%ebp), %eax", 12 + 4 * index));
                self.emit_line("\tpushl\t%eax");
            }
            Binding::Local(slot) => {
                self.emit_line(&format!("\tleal\t-{}(%ebp), %eax", 4 * (slot + 1)));
                self.emit_line("\tpushl\t%eax");
            }
            Binding::Field(offset) => {
                self.emit_line("\tmovl\t8(%ebp), %eax");
                self.emit_line(&format!("\taddl\t${}, %eax", offset));
                self.emit_line("\tpushl\t%eax");
            }
        }
    }

    /// 弹出两个操作数，计算后压入结果
    fn generate_binary_operation(&mut self, op: BinaryOp, line: usize) {
        let (instruction, set) = match op {
            BinaryOp::Div => return self.generate_division(line),
            BinaryOp::Add => ("addl", None),
            BinaryOp::Sub => ("subl", None),
            BinaryOp::Mul => ("imull", None),
            BinaryOp::Eq => ("cmpl", Some("sete")),
            BinaryOp::Lt => ("cmpl", Some("setl")),
            BinaryOp::Gt => ("cmpl", Some("setg")),
        };
        self.emit_line("\tpopl\t%edx");
        self.emit_line("\tpopl\t%eax");
        self.emit_line(&format!("\t{}\t%edx, %eax", instruction));
        if let Some(set) = set {
            self.emit_line(&format!("\t{}\t%al", set));
            self.emit_line("\tmovzbl\t%al, %eax");
        }
        self.emit_line("\tpushl\t%eax");
    }

    /// 除数为 0 时报告并以 0 作为结果
    fn generate_division(&mut self, line: usize) {
        let zero_label = self.new_label();
        let done_label = self.new_label();
        self.emit_line("\tpopl\t%ecx");
        self.emit_line("\tcmpl\t$0, %ecx");
        self.emit_line(&format!("\tje\t{}", zero_label));
        self.emit_line("\tpopl\t%eax");
        self.emit_line("\tcltd");
        self.emit_line("\tidivl\t%ecx");
        self.emit_line("\tpushl\t%eax");
        self.emit_line(&format!("\tjmp\t{}", done_label));
        self.emit_label(&zero_label);
        self.emit_line("\tpopl\t%eax");
        self.emit_line(&format!("\tpushl\t${}", line));
        self.emit_line(&format!("\tcall\t{}", REPORT_DIVIDE_BY_ZERO));
        self.emit_line("\taddl\t$4, %esp");
        self.emit_line("\tpushl\t$0");
        self.emit_label(&done_label);
    }

    /// 实参自右向左压栈
    pub(super) fn generate_arguments(&mut self, args: &[Expr]) -> TResult<()> {
        for arg in args.iter().rev() {
            self.generate_expression(arg)?;
        }
        Ok(())
    }

    /// 接收者最后压栈，位于被调方的 8(%ebp)
    fn generate_call(
        &mut self,
        receiver: &Receiver,
        args: &[Expr],
        method: MethodId,
        slot: Option<usize>,
        line: usize,
    ) -> TResult<()> {
        let ctx = self.ctx;
        self.generate_arguments(args)?;
        match receiver {
            Receiver::Super => {
                self.emit_load_this();
                self.emit_line(&format!("\tcall\t{}", ctx.types.method(method).label));
            }
            Receiver::Implicit => {
                self.emit_load_this();
                self.emit_virtual_call(slot, line)?;
            }
            Receiver::Expr(object) => {
                self.generate_expression(object)?;
                self.emit_null_check(line);
                self.emit_virtual_call(slot, line)?;
            }
        }
        self.emit_line(&format!("\taddl\t${}, %esp", 4 * (args.len() + 1)));
        self.emit_line("\tpushl\t%eax");
        Ok(())
    }

    fn emit_virtual_call(&mut self, slot: Option<usize>, line: usize) -> TResult<()> {
        let slot = slot.ok_or_else(|| codegen_error(format!("line {}: call has no VMT slot", line)))?;
        self.emit_line("\tmovl\t(%esp), %eax");
        self.emit_line("\tmovl\t(%eax), %eax");
        self.emit_line(&format!("\tmovl\t{}(%eax), %eax", vmt_method_offset(slot)));
        self.emit_line("\tcall\t*%eax");
        Ok(())
    }

    /// 分配对象、写入 VMT 指针并调用构造函数
    fn generate_new(&mut self, args: &[Expr], class: ClassId, constructor: MethodId, line: usize) -> TResult<()> {
        let ctx = self.ctx;
        self.generate_arguments(args)?;
        self.emit_line("\tpushl\t$4");
        self.emit_line(&format!("\tpushl\t${}", ctx.types.instance_cells(class)));
        self.emit_line(&format!("\tcall\t{}", ALLOCATE));
        self.emit_line("\taddl\t$8, %esp");
        self.emit_out_of_memory_check(line);
        self.emit_line(&format!("\tmovl\t${}, (%eax)", ctx.types.class(class).vmt_label()));
        self.emit_line("\tpushl\t%eax");
        self.emit_line(&format!("\tcall\t{}", ctx.types.method(constructor).label));
        self.emit_line("\tpopl\t%eax");
        if !args.is_empty() {
            self.emit_line(&format!("\taddl\t${}, %esp", 4 * args.len()));
        }
        self.emit_line("\tpushl\t%eax");
        Ok(())
    }
}
