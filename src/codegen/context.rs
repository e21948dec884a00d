//! 汇编生成上下文和状态管理

use crate::context::CompilationContext;
use crate::error::{codegen_error, TResult};

/// 循环上下文，用于支持 break/continue
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub cond_label: String,  // continue 跳转的目标（条件检查）
    pub end_label: String,   // break 跳转的目标（循环结束）
}

/// 汇编生成器核心上下文
pub struct AsmGenerator<'a> {
    pub(super) ctx: &'a CompilationContext,
    pub(super) code: String,
    label_counter: usize,
    loop_counter: usize,
    loop_stack: Vec<LoopContext>,
    /// 正在生成 main 块（声明落到 .data 段）
    pub(super) in_main: bool,
}

impl<'a> AsmGenerator<'a> {
    /// 语义分析报告过终止性错误时拒绝创建生成器
    pub fn new(ctx: &'a CompilationContext) -> TResult<Self> {
        if ctx.is_aborted() {
            return Err(codegen_error(
                "semantic analysis reported terminal errors; refusing to generate code",
            ));
        }
        Ok(Self {
            ctx,
            code: String::new(),
            label_counter: 0,
            loop_counter: 0,
            loop_stack: Vec::new(),
            in_main: false,
        })
    }

    /// 发射一行代码
    pub fn emit_line(&mut self, line: &str) {
        self.code.push_str(line);
        self.code.push('\n');
    }

    pub fn emit_label(&mut self, label: &str) {
        self.emit_line(&format!("{}:", label));
    }

    pub fn emit_comment(&mut self, text: &str) {
        self.emit_line(&format!("#\t{}", text));
    }

    /// 创建新的分支标签 `L<n>`
    pub fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    /// 创建一对循环标签 `W<n>`：条件检查与循环结束
    pub fn new_loop_labels(&mut self) -> (String, String) {
        let cond_label = format!("W{}", self.loop_counter);
        let end_label = format!("W{}", self.loop_counter + 1);
        self.loop_counter += 2;
        (cond_label, end_label)
    }

    /// 进入循环上下文
    pub fn enter_loop(&mut self, cond_label: String, end_label: String) {
        self.loop_stack.push(LoopContext { cond_label, end_label });
    }

    /// 退出循环上下文
    pub fn exit_loop(&mut self) {
        self.loop_stack.pop();
    }

    /// 获取当前循环上下文（用于 break/continue）
    pub fn current_loop(&self) -> Option<&LoopContext> {
        self.loop_stack.last()
    }
}
