//! 运行时支持库接口与内置 Object 例程
//!
//! 所有运行时例程按 cdecl 约定调用：参数自右向左压栈，调用者清栈。

use crate::codegen::context::AsmGenerator;
use crate::error::{codegen_error, TResult};

pub const MAIN_LABEL: &str = "main";
pub const MAIN_EXIT_LABEL: &str = "main$exit";

/// output_integer(value)
pub const OUTPUT_INTEGER: &str = "RTS_outputInteger";
/// report_divide_by_zero(line)
pub const REPORT_DIVIDE_BY_ZERO: &str = "RTS_printDivideByZeroError";
/// check_null_reference(line, address)
pub const CHECK_NULL_REFERENCE: &str = "RTS_checkForNullReference";
/// check_cast(line, target_vmt, object)
pub const CHECK_CAST: &str = "RTS_checkCast";
/// report_out_of_memory(line)
pub const REPORT_OUT_OF_MEMORY: &str = "RTS_outOfMemoryError";
pub const ALLOCATE: &str = "calloc";
pub const RELEASE: &str = "free";

const RUNTIME_SYMBOLS: [&str; 7] = [
    OUTPUT_INTEGER,
    REPORT_DIVIDE_BY_ZERO,
    CHECK_NULL_REFERENCE,
    CHECK_CAST,
    REPORT_OUT_OF_MEMORY,
    ALLOCATE,
    RELEASE,
];

pub fn main_var_label(name: &str) -> String {
    format!("mainvar${}", name)
}

impl AsmGenerator<'_> {
    /// 声明外部运行时符号
    pub(super) fn emit_header(&mut self) {
        self.emit_comment("T compiler output");
        for symbol in RUNTIME_SYMBOLS {
            self.emit_line(&format!("\t.extern\t{}", symbol));
        }
    }

    /// 例程入口：建立栈帧并为局部变量预留空间
    pub(super) fn emit_prologue(&mut self, label: &str, locals: usize) {
        self.emit_line("\t.text");
        self.emit_line("\t.align 4");
        self.emit_line(&format!("\t.globl {}", label));
        self.emit_label(label);
        self.emit_line("\tpushl\t%ebp");
        self.emit_line("\tmovl\t%esp, %ebp");
        if locals > 0 {
            self.emit_line(&format!("\tsubl\t${}, %esp", 4 * locals));
        }
    }

    pub(super) fn emit_epilogue(&mut self) {
        self.emit_line("\tmovl\t%ebp, %esp");
        self.emit_line("\tpopl\t%ebp");
        self.emit_line("\tret");
    }

    /// 栈顶地址为空时报告；地址留在栈上
    pub(super) fn emit_null_check(&mut self, line: usize) {
        self.emit_line(&format!("\tpushl\t${}", line));
        self.emit_line(&format!("\tcall\t{}", CHECK_NULL_REFERENCE));
        self.emit_line("\taddl\t$4, %esp");
    }

    /// 检查栈顶对象是否属于目标类；对象留在栈上
    pub(super) fn emit_cast_check(&mut self, target_vmt: &str, line: usize) {
        self.emit_line(&format!("\tpushl\t${}", target_vmt));
        self.emit_line(&format!("\tpushl\t${}", line));
        self.emit_line(&format!("\tcall\t{}", CHECK_CAST));
        self.emit_line("\taddl\t$8, %esp");
    }

    /// calloc 返回 0 时报告内存不足
    pub(super) fn emit_out_of_memory_check(&mut self, line: usize) {
        let ok_label = self.new_label();
        self.emit_line("\tcmpl\t$0, %eax");
        self.emit_line(&format!("\tjne\t{}", ok_label));
        self.emit_line(&format!("\tpushl\t${}", line));
        self.emit_line(&format!("\tcall\t{}", REPORT_OUT_OF_MEMORY));
        self.emit_line("\taddl\t$4, %esp");
        self.emit_label(&ok_label);
    }

    /// Object 的构造函数、析构函数与 equals
    pub(super) fn emit_object_routines(&mut self) -> TResult<()> {
        let ctx = self.ctx;
        let object = ctx.types.class(ctx.types.object());
        if object.methods.is_empty() {
            return Err(codegen_error("class Object has no routines"));
        }
        self.emit_comment("class Object");
        for &id in &object.methods {
            let method = ctx.types.method(id);
            self.emit_prologue(&method.label, 0);
            if method.is_virtual() {
                // equals：this 与参数是否为同一对象
                self.emit_line("\tmovl\t8(%ebp), %eax");
                self.emit_line("\tcmpl\t12(%ebp), %eax");
                self.emit_line("\tsete\t%al");
                self.emit_line("\tmovzbl\t%al, %eax");
            }
            self.emit_label(&method.exit_label());
            self.emit_epilogue();
        }
        Ok(())
    }
}
