//! Linker version scripts listing a shared library's exported symbols.

use crate::process::{arg, Cmd};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Defined global or weak symbols with default or protected visibility, from
/// `readelf --dyn-syms` output. Version suffixes are dropped.
pub fn exported_symbols(readelf_output: &str) -> Vec<String> {
    let mut symbols = BTreeSet::new();
    for line in readelf_output.lines() {
        // Num: Value Size Type Bind Vis Ndx Name
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [num, _value, _size, _type, bind, vis, ndx, name, ..] = fields[..] else {
            continue;
        };
        if !num.ends_with(':') {
            continue;
        }
        if !matches!(bind, "GLOBAL" | "WEAK") || !matches!(vis, "DEFAULT" | "PROTECTED") {
            continue;
        }
        if ndx == "UND" {
            continue;
        }
        let name = name.split('@').next().unwrap_or(name);
        if !name.is_empty() {
            symbols.insert(name.to_string());
        }
    }
    symbols.into_iter().collect()
}

pub fn map_file_contents(section: &str, symbols: &[String]) -> String {
    let mut out = String::from("# AUTO-GENERATED by build-toolchain. DO NOT EDIT.\n");
    out.push_str(&format!("LIBCLANG_RT_{section} {{\n"));
    out.push_str("  global:\n");
    for symbol in symbols {
        out.push_str(&format!("    {symbol};\n"));
    }
    out.push_str("  local:\n");
    out.push_str("    *;\n");
    out.push_str("};\n");
    out
}

/// Writes the version script for `lib_file` to `map_file`.
pub fn create_map_file(readelf: &Path, lib_file: &Path, map_file: &Path, section: &str) -> Result<()> {
    let output = Cmd::new([arg(readelf), "--dyn-syms".to_string(), arg(lib_file)]).output()?;
    let symbols = exported_symbols(&output);
    fs::write(map_file, map_file_contents(section, &symbols))
        .with_context(|| format!("Failed to write {}", map_file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const READELF: &str = "
Symbol table '.dynsym' contains 7 entries:
   Num:    Value          Size Type    Bind   Vis       Ndx Name
     0: 0000000000000000     0 NOTYPE  LOCAL  DEFAULT   UND
     1: 0000000000000000     0 FUNC    GLOBAL DEFAULT   UND malloc@LIBC
     2: 0000000000041230    88 FUNC    GLOBAL DEFAULT    12 __asan_init@@LIBCLANG_RT_ASAN
     3: 0000000000041300    16 FUNC    WEAK   DEFAULT    12 __sanitizer_print_stack_trace
     4: 0000000000041400    16 FUNC    GLOBAL HIDDEN     12 __asan_internal
     5: 0000000000041500     8 OBJECT  GLOBAL PROTECTED  20 __asan_option_detect_stack_use_after_return
     6: 0000000000041230    88 FUNC    GLOBAL DEFAULT    12 __asan_init@LIBCLANG_RT_ASAN_OLD
";

    #[test]
    fn test_exported_symbols() {
        assert_eq!(
            exported_symbols(READELF),
            vec![
                "__asan_init",
                "__asan_option_detect_stack_use_after_return",
                "__sanitizer_print_stack_trace",
            ]
        );
    }

    #[test]
    fn test_map_file_contents() {
        let contents = map_file_contents("TSAN", &["__tsan_init".to_string()]);
        assert_eq!(
            contents,
            "# AUTO-GENERATED by build-toolchain. DO NOT EDIT.\n\
             LIBCLANG_RT_TSAN {\n  global:\n    __tsan_init;\n  local:\n    *;\n};\n"
        );
    }
}
