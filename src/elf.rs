//! ELF-level imports built on the `object` crate.
//!
//! The symbol recovery itself only cares about the `.mdebug` section, but
//! the section headers and the regular `.symtab` still carry useful symbols:
//! labels, function and object sizes, and the addresses needed to read the
//! values of global variables out of the data sections.

use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind};

use crate::database::{SymbolDatabase, SymbolSourceHandle, SymbolSourceKind};
use crate::error::{Error, Result};

/// The symbol table formats that can appear in these executables, in order
/// of how useful their contents are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolTableFormat {
    Symtab,
    Mdebug,
    Stab,
    Dwarf,
    Sndll,
}

pub struct SymbolTableFormatInfo {
    pub format: SymbolTableFormat,
    pub format_name: &'static str,
    pub section_name: &'static str,
    pub utility: u32,
}

pub const SYMBOL_TABLE_FORMATS: [SymbolTableFormatInfo; 5] = [
    SymbolTableFormatInfo {
        format: SymbolTableFormat::Symtab,
        format_name: "symtab",
        section_name: ".symtab",
        utility: 2,
    },
    SymbolTableFormatInfo {
        format: SymbolTableFormat::Mdebug,
        format_name: "mdebug",
        section_name: ".mdebug",
        utility: 3,
    },
    SymbolTableFormatInfo {
        format: SymbolTableFormat::Stab,
        format_name: "stab",
        section_name: ".stab",
        utility: 0,
    },
    SymbolTableFormatInfo {
        format: SymbolTableFormat::Dwarf,
        format_name: "dwarf",
        section_name: ".debug",
        utility: 0,
    },
    SymbolTableFormatInfo {
        format: SymbolTableFormat::Sndll,
        format_name: "sndll",
        section_name: ".sndata",
        utility: 1,
    },
];

pub fn symbol_table_format_from_name(format_name: &str) -> Option<&'static SymbolTableFormatInfo> {
    SYMBOL_TABLE_FORMATS
        .iter()
        .find(|info| info.format_name == format_name)
}

pub fn symbol_table_format_from_section(
    section_name: &str,
) -> Option<&'static SymbolTableFormatInfo> {
    SYMBOL_TABLE_FORMATS
        .iter()
        .find(|info| info.section_name == section_name)
}

/// Picks the symbol table section to read: an explicitly named one, or the
/// most useful format present in the file.
pub fn select_symbol_table<'data, 'file>(
    file: &'file object::File<'data>,
    section: Option<&str>,
    format: Option<SymbolTableFormat>,
) -> Result<(object::Section<'data, 'file>, SymbolTableFormat)> {
    if let Some(section_name) = section {
        let section = file
            .section_by_name(section_name)
            .ok_or_else(|| Error::MissingSection(section_name.to_string()))?;
        let format = match format {
            Some(format) => format,
            None => {
                symbol_table_format_from_section(section_name)
                    .ok_or_else(|| {
                        Error::Fatal(
                            "cannot determine symbol table format from section name".to_string(),
                        )
                    })?
                    .format
            }
        };
        return Ok((section, format));
    }

    let mut best: Option<(object::Section, SymbolTableFormat, u32)> = None;
    for info in &SYMBOL_TABLE_FORMATS {
        if best.as_ref().is_some_and(|(_, _, utility)| *utility >= info.utility) {
            continue;
        }
        if let Some(section) = file.section_by_name(info.section_name) {
            best = Some((section, info.format, info.utility));
        }
    }

    let (section, detected_format, _) =
        best.ok_or_else(|| Error::MissingSection(".mdebug".to_string()))?;
    Ok((section, format.unwrap_or(detected_format)))
}

/// Creates a section symbol for every allocated section header.
pub fn import_section_headers(
    database: &mut SymbolDatabase,
    file: &object::File,
) -> Result<SymbolSourceHandle> {
    let source = database
        .symbol_sources
        .create_source("ELF section headers", SymbolSourceKind::SymbolTable);

    for section in file.sections() {
        let name = section.name().map_err(|_| Error::format("section name", 0))?;
        if section.address() == 0 {
            continue;
        }
        let symbol = database
            .sections
            .create_symbol(name, source, Some(section.address() as u32));
        symbol.size = section.size() as u32;
    }

    Ok(source)
}

/// Imports the regular ELF symbol table. Much less informative than the
/// `.mdebug` section, but it is where labels live, and it can fill gaps when
/// `ignore_existing_symbols` is set.
pub fn import_symbol_table(
    database: &mut SymbolDatabase,
    file: &object::File,
    ignore_existing_symbols: bool,
) -> Result<SymbolSourceHandle> {
    let source = database
        .symbol_sources
        .create_source(".symtab", SymbolSourceKind::SymbolTable);

    for symbol in file.symbols() {
        let address = symbol.address() as u32;
        if address == 0 {
            continue;
        }
        let name = symbol.name().map_err(|_| Error::format("symbol name", 0))?;
        if name.is_empty() {
            continue;
        }

        match symbol.kind() {
            SymbolKind::Text => {
                if ignore_existing_symbols
                    && database.functions.first_handle_from_address(address).is_some()
                {
                    continue;
                }
                let function = database
                    .functions
                    .create_symbol(name, source, Some(address));
                function.size = symbol.size() as u32;
            }
            SymbolKind::Data => {
                if ignore_existing_symbols
                    && database
                        .global_variables
                        .first_handle_from_address(address)
                        .is_some()
                {
                    continue;
                }
                let global = database
                    .global_variables
                    .create_symbol(name, source, Some(address));
                global.size = symbol.size() as u32;
            }
            SymbolKind::Label | SymbolKind::Unknown => {
                database.labels.create_symbol(name, source, Some(address));
            }
            SymbolKind::File => {
                database.source_files.create_symbol(name, source, None);
            }
            _ => {}
        }
    }

    Ok(source)
}

/// Reads `size` bytes at a virtual address out of whichever section contains
/// it. Returns `None` for addresses with no backing data, e.g. in `.bss`.
pub fn read_virtual(file: &object::File, address: u32, size: usize) -> Option<Vec<u8>> {
    let address = address as u64;
    for section in file.sections() {
        if section.kind() == SectionKind::UninitializedData {
            continue;
        }
        let start = section.address();
        let end = start + section.size();
        if address >= start && address + size as u64 <= end {
            let data = section.data().ok()?;
            let offset = (address - start) as usize;
            return data.get(offset..offset + size).map(|bytes| bytes.to_vec());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 32-bit little-endian MIPS ELF header with no sections at all.
    fn minimal_elf() -> Vec<u8> {
        let mut image = vec![0u8; 52];
        image[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        image[4] = 1; // 32-bit
        image[5] = 1; // little-endian
        image[6] = 1; // version
        image[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        image[18..20].copy_from_slice(&8u16.to_le_bytes()); // EM_MIPS
        image[20..24].copy_from_slice(&1u32.to_le_bytes());
        image[40..42].copy_from_slice(&52u16.to_le_bytes()); // ehsize
        image[46..48].copy_from_slice(&40u16.to_le_bytes()); // shentsize
        image
    }

    #[test]
    fn missing_symbol_table_is_fatal() {
        let image = minimal_elf();
        let file = object::File::parse(image.as_slice()).unwrap();
        assert!(matches!(
            select_symbol_table(&file, None, None),
            Err(Error::MissingSection(_))
        ));
        assert!(matches!(
            select_symbol_table(&file, Some(".mdebug"), None),
            Err(Error::MissingSection(_))
        ));
    }
}
