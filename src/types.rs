//! 类型注册表
//!
//! 内置类型是 `Type` 的单元变体，按值比较即按身份比较；
//! 类和方法保存在注册表内部的 arena 中，树节点只持有它们的 id。

use std::collections::HashMap;
use crate::error::{semantic_error, Severity, TResult};
use crate::semantic::symbol_table::SymbolTable;

pub const OBJECT_CLASS: &str = "Object";
pub const DESTRUCTOR_SIGNATURE: &str = "Destructor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Null,
    /// 分析前的占位类型
    NoType,
    Error,
    /// 节点当前表示地址而不是值
    Deref,
    Class(ClassId),
    Method(MethodId),
}

impl Type {
    pub fn is_error(self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_int(self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_null(self) -> bool {
        matches!(self, Type::Null)
    }

    pub fn as_class(self) -> Option<ClassId> {
        match self {
            Type::Class(id) => Some(id),
            _ => None,
        }
    }

    /// 可以作为变量、字段或参数的类型
    pub fn is_concrete(self) -> bool {
        matches!(self, Type::Int | Type::Class(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    Destructor,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: Type,
}

#[derive(Debug, Clone)]
pub struct ParameterInfo {
    pub name: String,
    pub param_type: Type,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, param_type: Type) -> Self {
        Self {
            name: name.into(),
            param_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassType {
    pub name: String,
    pub parent: Option<ClassId>,
    /// 字段（含继承来的副本）与按签名索引的方法
    pub members: SymbolTable,
    /// 本类直接声明的字段，按声明顺序
    pub fields: Vec<FieldInfo>,
    /// 本类直接声明的方法，按声明顺序
    pub methods: Vec<MethodId>,
    pub has_constructor: bool,
    pub has_destructor: bool,
    pub destructor: Option<MethodId>,
    /// 虚方法槽位，不含父类 VMT 与析构函数两个保留槽
    pub vmt: Vec<MethodId>,
}

impl ClassType {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            members: SymbolTable::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            has_constructor: false,
            has_destructor: false,
            destructor: None,
            vmt: Vec::new(),
        }
    }

    pub fn vmt_label(&self) -> String {
        format!("{}$VMT", self.name)
    }
}

/// 第 index 个虚方法在 VMT 中的字节偏移
pub fn vmt_method_offset(index: usize) -> usize {
    4 * (index + 2)
}

/// VMT 中析构函数槽位的字节偏移
pub const VMT_DESTRUCTOR_OFFSET: usize = 4;

#[derive(Debug, Clone)]
pub struct MethodType {
    pub name: String,
    pub owner: ClassId,
    pub params: Vec<ParameterInfo>,
    /// 构造函数与析构函数没有返回值
    pub return_type: Option<Type>,
    pub kind: MethodKind,
    /// 方法体内声明的局部变量
    pub locals: SymbolTable,
    pub signature: String,
    pub label: String,
}

impl MethodType {
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn exit_label(&self) -> String {
        format!("{}$exit", self.label)
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == MethodKind::Method
    }
}

/// 向类添加成员时发现的重复声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redeclaration {
    Field(String),
    Method(String),
    Destructor,
}

impl Redeclaration {
    pub fn severity(&self) -> Severity {
        match self {
            Redeclaration::Field(_) => Severity::NonTerminal,
            Redeclaration::Method(_) | Redeclaration::Destructor => Severity::Terminal,
        }
    }
}

pub struct TypeRegistry {
    classes: Vec<ClassType>,
    methods: Vec<MethodType>,
    by_name: HashMap<String, ClassId>,
    object: ClassId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let object = ClassId(0);
        let mut registry = Self {
            classes: vec![ClassType::new(OBJECT_CLASS)],
            methods: Vec::new(),
            by_name: HashMap::from([(OBJECT_CLASS.to_string(), object)]),
            object,
        };
        registry.seed_object();
        registry
    }

    /// Object 自带空构造函数、空析构函数与 equals(Object)
    fn seed_object(&mut self) {
        let object = self.object;
        let ctor = self.declare_method(object, OBJECT_CLASS, MethodKind::Constructor, Vec::new(), None);
        let dtor = self.declare_method(object, DESTRUCTOR_SIGNATURE, MethodKind::Destructor, Vec::new(), None);
        let equals = self.declare_method(
            object,
            "equals",
            MethodKind::Method,
            vec![ParameterInfo::new("other", Type::Class(object))],
            Some(Type::Int),
        );
        for method in [ctor, dtor, equals] {
            let name = self.method(method).name.clone();
            let seeded = self.add_member(object, &name, Type::Method(method));
            debug_assert!(seeded.is_ok());
        }
        let class = self.class_mut(object);
        class.has_constructor = true;
        class.has_destructor = true;
        self.build_vmt(object);
    }

    pub fn int_type(&self) -> Type {
        Type::Int
    }

    pub fn null_type(&self) -> Type {
        Type::Null
    }

    pub fn error_type(&self) -> Type {
        Type::Error
    }

    pub fn no_type(&self) -> Type {
        Type::NoType
    }

    pub fn object(&self) -> ClassId {
        self.object
    }

    pub fn register_class(&mut self, name: &str, line: usize) -> TResult<ClassId> {
        if self.by_name.contains_key(name) {
            return Err(semantic_error(line, format!("Class '{}' already defined", name)));
        }
        let id = ClassId(self.classes.len());
        self.classes.push(ClassType::new(name));
        self.by_name.insert(name.to_string(), id);
        tracing::trace!(class = name, ?id, "registered class");
        Ok(id)
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn class(&self, id: ClassId) -> &ClassType {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassType {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &MethodType {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodType {
        &mut self.methods[id.0]
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassType)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    pub fn set_parent(&mut self, class: ClassId, parent: ClassId) {
        self.classes[class.0].parent = Some(parent);
    }

    /// 从 class 自身开始沿父类链向上，直到 Object
    pub fn chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut current = self.class(class).parent;
        while let Some(parent) = current {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = self.class(parent).parent;
        }
        chain
    }

    /// 父类链，不含 class 自身
    pub fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = self.chain(class);
        chain.remove(0);
        chain
    }

    /// 自反的子类关系
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        self.chain(class).contains(&ancestor)
    }

    /// 两个类有祖先关系时返回较高的那个
    pub fn related(&self, a: ClassId, b: ClassId) -> Option<ClassId> {
        if self.is_subclass(a, b) {
            Some(b)
        } else if self.is_subclass(b, a) {
            Some(a)
        } else {
            None
        }
    }

    /// 相同类型、null 赋给类、子类赋给祖先
    pub fn is_assignable(&self, from: Type, to: Type) -> bool {
        match (from, to) {
            _ if from == to => true,
            (Type::Null, Type::Class(_)) => true,
            (Type::Class(sub), Type::Class(sup)) => self.is_subclass(sub, sup),
            _ => false,
        }
    }

    pub fn type_name(&self, ty: Type) -> String {
        match ty {
            Type::Int => "int".to_string(),
            Type::Null => "null".to_string(),
            Type::NoType => "notype".to_string(),
            Type::Error => "error".to_string(),
            Type::Deref => "deref".to_string(),
            Type::Class(id) => self.class(id).name.clone(),
            Type::Method(id) => self.method(id).signature.clone(),
        }
    }

    /// 方法签名：名字加各参数类型名，以 `$` 连接
    pub fn signature(&self, name: &str, kind: MethodKind, params: &[Type]) -> String {
        if kind == MethodKind::Destructor {
            return DESTRUCTOR_SIGNATURE.to_string();
        }
        let mut signature = name.to_string();
        for ty in params {
            signature.push('$');
            signature.push_str(&self.type_name(*ty));
        }
        signature
    }

    /// 创建方法类型，尚未加入所属类
    pub fn declare_method(
        &mut self,
        owner: ClassId,
        name: &str,
        kind: MethodKind,
        params: Vec<ParameterInfo>,
        return_type: Option<Type>,
    ) -> MethodId {
        let param_types: Vec<Type> = params.iter().map(|p| p.param_type).collect();
        let signature = self.signature(name, kind, &param_types);
        let label = format!("{}${}", self.class(owner).name, signature);
        let id = MethodId(self.methods.len());
        self.methods.push(MethodType {
            name: name.to_string(),
            owner,
            params,
            return_type,
            kind,
            locals: SymbolTable::new(),
            signature,
            label,
        });
        id
    }

    /// 添加字段或方法；方法按签名进入方法子表
    pub fn add_member(&mut self, class: ClassId, name: &str, ty: Type) -> Result<(), Redeclaration> {
        match ty {
            Type::Method(id) => {
                let kind = self.method(id).kind;
                let signature = self.method(id).signature.clone();
                let class_type = &mut self.classes[class.0];
                if kind == MethodKind::Destructor && class_type.destructor.is_some() {
                    return Err(Redeclaration::Destructor);
                }
                if !class_type.members.install_method(signature.clone(), ty) {
                    return Err(Redeclaration::Method(signature));
                }
                if kind == MethodKind::Destructor {
                    class_type.destructor = Some(id);
                }
                class_type.methods.push(id);
                Ok(())
            }
            field_type => {
                let class_type = &mut self.classes[class.0];
                if !class_type.members.install(name, field_type) {
                    return Err(Redeclaration::Field(name.to_string()));
                }
                class_type.fields.push(FieldInfo {
                    name: name.to_string(),
                    field_type,
                });
                Ok(())
            }
        }
    }

    /// 把祖先字段复制进成员表，已有同名字段时保留近者
    pub fn inherit_fields(&mut self, class: ClassId) {
        let object = self.object;
        for ancestor in self.ancestors(class) {
            if ancestor == object {
                break;
            }
            let inherited: Vec<(String, Type)> = self
                .class(ancestor)
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.field_type))
                .collect();
            let members = &mut self.classes[class.0].members;
            for (name, ty) in inherited {
                if members.install(name.clone(), ty) {
                    tracing::trace!(field = %name, "inherited field");
                }
            }
        }
    }

    pub fn lookup_field(&self, class: ClassId, name: &str) -> Option<Type> {
        self.class(class).members.lookup(name)
    }

    /// 对象布局：祖先字段在前，按根到叶的顺序
    pub fn field_layout(&self, class: ClassId) -> Vec<(ClassId, String)> {
        let mut chain = self.chain(class);
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|c| {
                self.class(c)
                    .fields
                    .iter()
                    .map(move |f| (c, f.name.clone()))
            })
            .collect()
    }

    /// 字段相对对象起始地址的字节偏移，第 0 个单元是 VMT 指针
    pub fn field_offset(&self, class: ClassId, name: &str) -> Option<usize> {
        let owner = self
            .chain(class)
            .into_iter()
            .find(|c| self.class(*c).fields.iter().any(|f| f.name == name))?;
        let index = self
            .field_layout(class)
            .iter()
            .position(|(c, n)| *c == owner && n == name)?;
        Some(4 * (index + 1))
    }

    /// 实例占用的 4 字节单元数
    pub fn instance_cells(&self, class: ClassId) -> usize {
        self.field_layout(class).len() + 1
    }

    /// 构造 VMT：沿继承链自根向下收集虚方法，签名相同则原位覆盖，否则追加
    pub fn build_vmt(&mut self, class: ClassId) {
        let mut chain = self.chain(class);
        chain.reverse();
        let mut slots: Vec<MethodId> = Vec::new();
        for c in chain {
            for &id in &self.class(c).methods {
                let method = self.method(id);
                if !method.is_virtual() {
                    continue;
                }
                match slots
                    .iter()
                    .position(|s| self.method(*s).signature == method.signature)
                {
                    Some(index) => slots[index] = id,
                    None => slots.push(id),
                }
            }
        }
        tracing::debug!(class = %self.class(class).name, slots = slots.len(), "built VMT");
        self.classes[class.0].vmt = slots;
    }

    pub fn vmt_slot(&self, class: ClassId, signature: &str) -> Option<usize> {
        self.class(class)
            .vmt
            .iter()
            .position(|m| self.method(*m).signature == signature)
    }

    /// 按实参类型解析方法或构造函数
    ///
    /// 先按签名精确匹配，找不到再接受拓宽与 null 实参。返回值的第二项
    /// 表示是否精确匹配。构造函数只在本类中查找。
    pub fn resolve_method(
        &self,
        class: ClassId,
        name: &str,
        kind: MethodKind,
        args: &[Type],
    ) -> Option<(MethodId, bool)> {
        let candidates = match kind {
            MethodKind::Method => self.chain(class),
            _ => vec![class],
        };
        let signature = self.signature(name, kind, args);
        for &c in &candidates {
            if let Some(Type::Method(id)) = self.class(c).members.lookup_method(&signature) {
                if self.method(id).kind == kind {
                    return Some((id, true));
                }
            }
        }
        for &c in &candidates {
            for &id in &self.class(c).methods {
                let method = self.method(id);
                if method.kind == kind
                    && method.name == name
                    && method.params.len() == args.len()
                    && args
                        .iter()
                        .zip(&method.params)
                        .all(|(arg, param)| self.is_assignable(*arg, param.param_type))
                {
                    return Some((id, false));
                }
            }
        }
        None
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
