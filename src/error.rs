use thiserror::Error;
use std::fmt;

#[derive(Error, Debug, Clone)]
pub enum TError {
    #[error("Semantic error at line {line}: {message}")]
    Semantic { line: usize, message: String },

    #[error("Compilation aborted with {} error(s)", .diagnostics.len())]
    Aborted { diagnostics: Vec<Diagnostic> },

    #[error("Code generation error: {0}")]
    CodeGen(String),
}

pub type TResult<T> = Result<T, TError>;

/// 诊断严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 分析继续，出错节点标记为 Error 类型
    NonTerminal,
    /// 设置中止标志，拒绝代码生成
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// 一次编译中收集到的全部诊断
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    aborted: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, line: usize, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Terminal => {
                tracing::error!(line, %message, "terminal diagnostic");
                self.aborted = true;
            }
            Severity::NonTerminal => tracing::warn!(line, %message, "diagnostic"),
        }
        self.items.push(Diagnostic { line, severity, message });
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.report(line, Severity::NonTerminal, message);
    }

    pub fn terminal(&mut self, line: usize, message: impl Into<String>) {
        self.report(line, Severity::Terminal, message);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }
}

pub fn semantic_error(line: usize, message: impl Into<String>) -> TError {
    TError::Semantic {
        line,
        message: message.into(),
    }
}

pub fn codegen_error(message: impl Into<String>) -> TError {
    TError::CodeGen(message.into())
}
