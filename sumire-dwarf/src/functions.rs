//! 関数テーブル

use crate::loader::DwarfLoader;
use crate::Result;

/// 関数情報
///
/// アドレス範囲は [low, high) です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub low_address: u64,
    pub high_address: u64,
}

impl FunctionInfo {
    /// pcがこの関数の範囲内にあるかどうか
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.low_address && pc < self.high_address
    }
}

/// DW_TAG_subprogram DIEから関数テーブルを構築する
///
/// 名前とアドレス範囲が揃ったDIEだけを採用し、low addressでソートした
/// フラットなテーブルを返します。
pub fn build_function_table(loader: &DwarfLoader) -> Result<Vec<FunctionInfo>> {
    let dwarf = loader.dwarf();
    let mut functions = Vec::new();

    let mut unit_iter = dwarf.units();
    while let Some(header) = unit_iter.next()? {
        let unit = dwarf.unit(header)?;
        let mut entries = unit.entries();

        while let Some((_, entry)) = entries.next_dfs()? {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }

            let mut name = None;
            let mut low = None;
            let mut high_addr = None;
            let mut high_offset = None;

            let mut attrs = entry.attrs();
            while let Some(attr) = attrs.next()? {
                match attr.name() {
                    gimli::DW_AT_name => {
                        if let Ok(s) = dwarf.attr_string(&unit, attr.value()) {
                            name = Some(s.to_string_lossy().into_owned());
                        }
                    }
                    gimli::DW_AT_low_pc => {
                        low = dwarf.attr_address(&unit, attr.value())?;
                    }
                    gimli::DW_AT_high_pc => {
                        // Addr形式またはlow_pcからのオフセット形式
                        if let Some(addr) = dwarf.attr_address(&unit, attr.value())? {
                            high_addr = Some(addr);
                        } else {
                            high_offset = attr.value().udata_value();
                        }
                    }
                    _ => {}
                }
            }

            let (Some(name), Some(low)) = (name, low) else {
                continue;
            };
            let high = match (high_addr, high_offset) {
                (Some(addr), _) => addr,
                (None, Some(offset)) => low + offset,
                (None, None) => continue,
            };

            functions.push(FunctionInfo {
                name,
                low_address: low,
                high_address: high,
            });
        }
    }

    functions.sort_by_key(|f| f.low_address);
    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let f = FunctionInfo {
            name: "foo".to_string(),
            low_address: 0x1000,
            high_address: 0x1020,
        };
        assert!(f.contains(0x1000));
        assert!(f.contains(0x101f));
        assert!(!f.contains(0x1020));
        assert!(!f.contains(0xfff));
    }
}
