pub mod error;
pub mod types;
pub mod ast;
pub mod context;
pub mod semantic;
pub mod codegen;
pub mod dump;

use std::path::Path;
use anyhow::Context as _;

use ast::CompilationUnit;
use context::CompilationContext;
use error::{Diagnostic, TError, TResult};

pub use error::Severity;

/// 编译选项，对应 -before / -after / -classes 开关
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// 转储分析前的语法树
    pub dump_before: bool,
    /// 转储分析后的语法树
    pub dump_after: bool,
    /// 转储类表与 VMT
    pub dump_classes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStage {
    BeforeAnalysis,
    AfterAnalysis,
    Classes,
}

/// 一次成功编译的产物
#[derive(Debug, Clone)]
pub struct Compilation {
    pub assembly: String,
    /// 非终止性诊断
    pub warnings: Vec<Diagnostic>,
    pub dumps: Vec<(DumpStage, String)>,
}

impl Compilation {
    pub fn dump(&self, stage: DumpStage) -> Option<&str> {
        self.dumps
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, text)| text.as_str())
    }
}

/// 语义分析的结果，无论成功与否都保留上下文与改写后的树
pub struct Analysis {
    pub context: CompilationContext,
    pub unit: CompilationUnit,
}

pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompileOptions::default())
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// 只做语义分析
    pub fn analyze(&self, unit: CompilationUnit) -> Analysis {
        let mut context = CompilationContext::new();
        let unit = semantic::SemanticAnalyzer::new(&mut context).analyze(unit);
        Analysis { context, unit }
    }

    /// 分析并生成汇编；出现终止性错误时不生成代码
    pub fn compile(&self, unit: CompilationUnit) -> TResult<Compilation> {
        let mut dumps = Vec::new();
        let mut context = CompilationContext::new();

        // 1. 分析前转储
        if self.options.dump_before {
            dumps.push((DumpStage::BeforeAnalysis, dump::dump_unit(&unit, &context.types)));
        }

        // 2. 语义分析
        let unit = semantic::SemanticAnalyzer::new(&mut context).analyze(unit);

        if self.options.dump_after {
            dumps.push((DumpStage::AfterAnalysis, dump::dump_unit(&unit, &context.types)));
        }
        if self.options.dump_classes {
            dumps.push((DumpStage::Classes, dump::dump_classes(&context.types)));
        }

        if context.is_aborted() {
            return Err(TError::Aborted {
                diagnostics: context.diagnostics.items().to_vec(),
            });
        }

        // 3. 代码生成
        let assembly = codegen::AsmGenerator::new(&context)?.generate(&unit)?;

        Ok(Compilation {
            assembly,
            warnings: context.diagnostics.items().to_vec(),
            dumps,
        })
    }

    /// 编译并把汇编写入文件
    pub fn compile_to_file(&self, unit: CompilationUnit, output_path: impl AsRef<Path>) -> anyhow::Result<Compilation> {
        let output_path = output_path.as_ref();
        let compilation = self.compile(unit).context("compilation failed")?;
        std::fs::write(output_path, &compilation.assembly)
            .with_context(|| format!("failed to write assembly to {}", output_path.display()))?;
        Ok(compilation)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
