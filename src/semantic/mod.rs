//! 语义分析
//!
//! 先登记类与继承关系，再声明成员、继承字段、构造 VMT，
//! 最后改写并标注每个方法体与 main 块。

mod analyzer;
mod class_analysis;
mod expressions;
mod statements;
pub mod scope;
pub mod symbol_table;

pub use analyzer::SemanticAnalyzer;
