//! 符号表
//!
//! 名字到类型的有序绑定，外加一个按方法签名索引的方法子表。
//! 查找按插入顺序线性进行，插入顺序即字段布局顺序。

use crate::types::Type;

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<(String, Type)>,
    methods: Vec<(String, Type)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装一个绑定；名字已存在时返回 false 且不修改表
    pub fn install(&mut self, name: impl Into<String>, ty: Type) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, ty));
        true
    }

    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// 绑定在表中的位置（局部变量的栈帧槽位）
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    /// 按签名安装方法；签名重复时返回 false
    pub fn install_method(&mut self, signature: impl Into<String>, ty: Type) -> bool {
        let signature = signature.into();
        if self.methods.iter().any(|(s, _)| *s == signature) {
            return false;
        }
        self.methods.push((signature, ty));
        true
    }

    pub fn lookup_method(&self, signature: &str) -> Option<Type> {
        self.methods
            .iter()
            .find(|(s, _)| s == signature)
            .map(|(_, ty)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Type)> {
        self.entries.iter().map(|(n, ty)| (n.as_str(), *ty))
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, Type)> {
        self.methods.iter().map(|(s, ty)| (s.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_rejects_duplicates_without_mutation() {
        let mut table = SymbolTable::new();
        assert!(table.is_empty());
        assert!(table.install("x", Type::Int));
        assert!(!table.is_empty());
        assert!(!table.install("x", Type::Null));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("x"), Some(Type::Int));
    }

    #[test]
    fn test_lookup_preserves_insertion_order() {
        let mut table = SymbolTable::new();
        table.install("b", Type::Int);
        table.install("a", Type::Int);
        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(table.position("a"), Some(1));
        assert_eq!(table.lookup("missing"), None);
    }

    #[test]
    fn test_method_table_is_separate_from_names() {
        let mut table = SymbolTable::new();
        assert!(table.install("f", Type::Int));
        assert!(table.install_method("f", Type::Null));
        assert!(!table.install_method("f", Type::Int));
        assert!(table.install_method("f$int", Type::Int));
        assert_eq!(table.lookup_method("f"), Some(Type::Null));
        assert_eq!(table.methods().count(), 2);
        assert_eq!(table.len(), 1);
    }
}
