//! T 汇编代码生成器
//!
//! 把分析后的语法树翻译成 32 位 AT&T 语法的栈机汇编。
//! 只接受分析阶段没有终止性错误的上下文。

pub mod context;
mod expressions;
mod statements;
pub mod runtime;
mod generator;

// 公开 AsmGenerator 作为代码生成器的入口
pub use context::AsmGenerator;
