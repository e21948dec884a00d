//! 语法树
//!
//! 树由外部解析器构造。每个节点在构造时固定源码行号；表达式节点的
//! `ty` 初始为 `NoType`，由语义分析改写。分析按值消费节点并返回替换节点，
//! 被包裹的子节点由新的父节点独占。

use crate::types::{ClassId, MethodId, MethodKind, Type};

/// 源码中书写的类型名
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Class(String),
}

impl TypeName {
    pub fn class(name: impl Into<String>) -> Self {
        TypeName::Class(name.into())
    }
}

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub classes: Vec<ClassDecl>,
    pub main: MainBlock,
}

impl CompilationUnit {
    pub fn new(classes: Vec<ClassDecl>, main: MainBlock) -> Self {
        Self { classes, main }
    }
}

#[derive(Debug, Clone)]
pub struct MainBlock {
    pub body: Vec<Stmt>,
    pub line: usize,
}

impl MainBlock {
    pub fn new(line: usize, body: Vec<Stmt>) -> Self {
        Self { body, line }
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    /// 缺省时父类为 Object
    pub parent: Option<String>,
    pub members: Vec<Member>,
    pub line: usize,
    pub resolved: Option<ClassId>,
}

impl ClassDecl {
    pub fn new(line: usize, name: impl Into<String>, parent: Option<&str>, members: Vec<Member>) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            members,
            line,
            resolved: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub field_type: TypeName,
    pub names: Vec<String>,
    pub owner: Option<String>,
    pub line: usize,
}

impl FieldDecl {
    pub fn new(line: usize, field_type: TypeName, names: &[&str]) -> Member {
        Member::Field(Self {
            field_type,
            names: names.iter().map(|n| n.to_string()).collect(),
            owner: None,
            line,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub param_type: TypeName,
    pub name: String,
    pub line: usize,
}

impl Param {
    pub fn new(line: usize, param_type: TypeName, name: impl Into<String>) -> Self {
        Self {
            param_type,
            name: name.into(),
            line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub kind: MethodKind,
    pub name: String,
    pub return_type: Option<TypeName>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub owner: Option<String>,
    pub resolved: Option<MethodId>,
    /// 由分析器合成的缺省构造/析构函数
    pub synthetic: bool,
    pub line: usize,
}

impl MethodDecl {
    pub fn method(
        line: usize,
        name: impl Into<String>,
        return_type: TypeName,
        params: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Member {
        Member::Method(Self::build(line, MethodKind::Method, name.into(), Some(return_type), params, body))
    }

    pub fn constructor(line: usize, class: impl Into<String>, params: Vec<Param>, body: Vec<Stmt>) -> Member {
        Member::Method(Self::build(line, MethodKind::Constructor, class.into(), None, params, body))
    }

    pub fn destructor(line: usize, class: &str, body: Vec<Stmt>) -> Member {
        Member::Method(Self::build(line, MethodKind::Destructor, format!("~{}", class), None, Vec::new(), body))
    }

    pub(crate) fn build(
        line: usize,
        kind: MethodKind,
        name: String,
        return_type: Option<TypeName>,
        params: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            kind,
            name,
            return_type,
            params,
            body,
            owner: None,
            resolved: None,
            synthetic: false,
            line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Declaration { var_type: TypeName, names: Vec<String> },
    Print(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While { cond: Expr, body: Box<Stmt> },
    Return { value: Option<Expr>, exit_label: Option<String> },
    Break,
    Continue,
    Delete(Expr),
    /// 构造函数体首句的 this(...) / super(...)
    ConstructorInvoke {
        target: CtorTarget,
        args: Vec<Expr>,
        resolved: Option<MethodId>,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorTarget {
    This,
    Super,
}

impl Stmt {
    pub fn new(line: usize, kind: StmtKind) -> Self {
        Self { kind, line }
    }

    pub fn expr(expr: Expr) -> Self {
        let line = expr.line;
        Self::new(line, StmtKind::Expr(expr))
    }

    pub fn declare(line: usize, var_type: TypeName, names: &[&str]) -> Self {
        Self::new(
            line,
            StmtKind::Declaration {
                var_type,
                names: names.iter().map(|n| n.to_string()).collect(),
            },
        )
    }

    pub fn print(line: usize, expr: Expr) -> Self {
        Self::new(line, StmtKind::Print(expr))
    }

    pub fn block(line: usize, body: Vec<Stmt>) -> Self {
        Self::new(line, StmtKind::Block(body))
    }

    pub fn if_then(line: usize, cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::new(
            line,
            StmtKind::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch: else_branch.map(Box::new),
            },
        )
    }

    pub fn while_loop(line: usize, cond: Expr, body: Stmt) -> Self {
        Self::new(line, StmtKind::While { cond, body: Box::new(body) })
    }

    pub fn ret(line: usize, value: Option<Expr>) -> Self {
        Self::new(line, StmtKind::Return { value, exit_label: None })
    }

    pub fn brk(line: usize) -> Self {
        Self::new(line, StmtKind::Break)
    }

    pub fn cont(line: usize) -> Self {
        Self::new(line, StmtKind::Continue)
    }

    pub fn delete(line: usize, target: Expr) -> Self {
        Self::new(line, StmtKind::Delete(target))
    }

    pub fn this_call(line: usize, args: Vec<Expr>) -> Self {
        Self::new(line, StmtKind::ConstructorInvoke { target: CtorTarget::This, args, resolved: None })
    }

    pub fn super_call(line: usize, args: Vec<Expr>) -> Self {
        Self::new(line, StmtKind::ConstructorInvoke { target: CtorTarget::Super, args, resolved: None })
    }

    pub fn empty(line: usize) -> Self {
        Self::new(line, StmtKind::Empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// 变量的存储位置，由分析器确定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// main 块中声明的静态单元 `mainvar$<name>`
    MainVar,
    Param(usize),
    /// 方法局部变量的栈帧槽位
    Local(usize),
    /// 相对 this 的字段偏移
    Field(usize),
}

#[derive(Debug, Clone)]
pub enum Receiver {
    /// 方法体内省略接收者的调用，接收者为 this
    Implicit,
    Super,
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i32),
    Null,
    This,
    Variable { name: String, binding: Option<Binding> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    FieldRef { object: Box<Expr>, field: String, offset: Option<usize> },
    Call {
        receiver: Receiver,
        method: String,
        args: Vec<Expr>,
        resolved: Option<MethodId>,
        /// 虚调用的 VMT 槽位；super 调用为静态绑定
        slot: Option<usize>,
    },
    New {
        class_name: String,
        args: Vec<Expr>,
        class: Option<ClassId>,
        constructor: Option<MethodId>,
    },
    Cast { target: String, expr: Box<Expr>, class: Option<ClassId> },
    /// 把子节点给出的地址读成值
    Deref(Box<Expr>),
    /// 隐式转换，运行时不改变值
    Convert(Box<Expr>),
}

impl Expr {
    pub fn new(line: usize, kind: ExprKind) -> Self {
        Self { kind, ty: Type::NoType, line }
    }

    pub(crate) fn typed(line: usize, kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty, line }
    }

    pub fn int(line: usize, value: i32) -> Self {
        Self::new(line, ExprKind::IntLiteral(value))
    }

    pub fn null(line: usize) -> Self {
        Self::new(line, ExprKind::Null)
    }

    pub fn this(line: usize) -> Self {
        Self::new(line, ExprKind::This)
    }

    pub fn var(line: usize, name: impl Into<String>) -> Self {
        Self::new(line, ExprKind::Variable { name: name.into(), binding: None })
    }

    pub fn binary(line: usize, op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(line, ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    pub fn unary(line: usize, op: UnaryOp, operand: Expr) -> Self {
        Self::new(line, ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn assign(line: usize, target: Expr, value: Expr) -> Self {
        Self::new(line, ExprKind::Assign { target: Box::new(target), value: Box::new(value) })
    }

    pub fn field(line: usize, object: Expr, field: impl Into<String>) -> Self {
        Self::new(line, ExprKind::FieldRef { object: Box::new(object), field: field.into(), offset: None })
    }

    pub fn call(line: usize, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call_with(line, Receiver::Implicit, method, args)
    }

    pub fn call_on(line: usize, receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call_with(line, Receiver::Expr(Box::new(receiver)), method, args)
    }

    pub fn call_super(line: usize, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call_with(line, Receiver::Super, method, args)
    }

    fn call_with(line: usize, receiver: Receiver, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            line,
            ExprKind::Call { receiver, method: method.into(), args, resolved: None, slot: None },
        )
    }

    pub fn new_object(line: usize, class_name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            line,
            ExprKind::New { class_name: class_name.into(), args, class: None, constructor: None },
        )
    }

    pub fn cast(line: usize, target: impl Into<String>, expr: Expr) -> Self {
        Self::new(line, ExprKind::Cast { target: target.into(), expr: Box::new(expr), class: None })
    }

    /// 包裹地址节点，结果类型为被引用变量的类型
    pub(crate) fn deref(inner: Expr, ty: Type) -> Self {
        let line = inner.line;
        Self::typed(line, ExprKind::Deref(Box::new(inner)), ty)
    }

    pub(crate) fn convert(inner: Expr, ty: Type) -> Self {
        let line = inner.line;
        Self::typed(line, ExprKind::Convert(Box::new(inner)), ty)
    }

    /// 把表达式重新标为错误类型，保留其子树
    pub(crate) fn into_error(mut self) -> Self {
        self.ty = Type::Error;
        self
    }
}
