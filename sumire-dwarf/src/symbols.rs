//! シンボルテーブル

use crate::loader::DwarfLoader;
use object::{Object, ObjectSymbol};

/// シンボルの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    None,
    Object,
    Function,
    Section,
    File,
}

/// シンボル情報
#[derive(Debug, Clone)]
pub struct Symbol {
    /// マングルされたシンボル名
    pub name: String,
    /// デマングルされたシンボル名（可読な形式）
    pub demangled_name: String,
    /// シンボルの種別
    pub kind: SymbolKind,
    pub address: u64,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: String, kind: SymbolKind, address: u64) -> Self {
        let demangled_name = demangle_symbol(&name);
        Self {
            name,
            demangled_name,
            kind,
            address,
        }
    }

    /// 表示用の名前を取得する
    pub fn display_name(&self) -> &str {
        &self.demangled_name
    }
}

/// シンボル名をデマングルする
fn demangle_symbol(name: &str) -> String {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }
    name.to_string()
}

fn symbol_kind(kind: object::SymbolKind) -> SymbolKind {
    match kind {
        object::SymbolKind::Text => SymbolKind::Function,
        object::SymbolKind::Data => SymbolKind::Object,
        object::SymbolKind::Section => SymbolKind::Section,
        object::SymbolKind::File => SymbolKind::File,
        _ => SymbolKind::None,
    }
}

/// ELFシンボルテーブルからフラットなテーブルを構築する
pub fn build_symbol_table(loader: &DwarfLoader) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for symbol in loader.object_file().symbols() {
        if let Ok(name) = symbol.name() {
            if !name.is_empty() {
                symbols.push(Symbol::new(
                    name.to_string(),
                    symbol_kind(symbol.kind()),
                    symbol.address(),
                ));
            }
        }
    }

    symbols.sort_by_key(|s| s.address);
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass_through_demangling() {
        let sym = Symbol::new("main".to_string(), SymbolKind::Function, 0x1000);
        assert_eq!(sym.display_name(), "main");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(symbol_kind(object::SymbolKind::Text), SymbolKind::Function);
        assert_eq!(symbol_kind(object::SymbolKind::Data), SymbolKind::Object);
        assert_eq!(symbol_kind(object::SymbolKind::Section), SymbolKind::Section);
        assert_eq!(symbol_kind(object::SymbolKind::File), SymbolKind::File);
        assert_eq!(symbol_kind(object::SymbolKind::Unknown), SymbolKind::None);
    }
}
