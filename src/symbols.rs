//! Rewrites the raw `.mdebug` symbol records into a stream of parsed symbols.
//!
//! STABS strings may be split over multiple records when they get too long;
//! a record ending in `\` continues in the next one. Reassembled strings are
//! handed to the STABS parser and everything else is classified by its code
//! so the importer can drive its state machine without caring about the raw
//! encoding.

use tracing::warn;

use crate::error::{Error, Result};
use crate::flags::STRICT_PARSING;
use crate::lexer::Cursor;
use crate::mdebug::{self, Symbol};
use crate::stabs::{parse_stabs_symbol, StabsSymbol};

#[derive(Debug)]
pub enum ParsedSymbolKind {
    NameColonType(StabsSymbol),
    SourceFile,
    SubSourceFile,
    LBrac,
    RBrac,
    FunctionEnd,
    NonStabs,
}

#[derive(Debug)]
pub struct ParsedSymbol<'a> {
    pub kind: ParsedSymbolKind,
    pub raw: Symbol<'a>,
}

/// Parses a translation unit's symbol records.
///
/// A truncated symbol string clears `STRICT_PARSING` in `flags` so that the
/// rest of the file is parsed leniently; the faults that follow a truncation
/// are a consequence of the same compiler bug.
pub fn parse_symbols<'a>(input: &[Symbol<'a>], flags: &mut u32) -> Result<Vec<ParsedSymbol<'a>>> {
    let mut output = Vec::new();
    let mut prefix = String::new();

    for &symbol in input {
        if !symbol.is_stabs() {
            output.push(ParsedSymbol {
                kind: ParsedSymbolKind::NonStabs,
                raw: symbol,
            });
            continue;
        }

        match symbol.code() {
            mdebug::N_GSYM
            | mdebug::N_FUN
            | mdebug::N_STSYM
            | mdebug::N_LCSYM
            | mdebug::N_RSYM
            | mdebug::N_LSYM
            | mdebug::N_PSYM => {
                if symbol.string.is_empty() {
                    if !prefix.is_empty() {
                        return Err(Error::Fatal("invalid STABS continuation".to_string()));
                    }
                    if symbol.code() == mdebug::N_FUN {
                        output.push(ParsedSymbol {
                            kind: ParsedSymbolKind::FunctionEnd,
                            raw: symbol,
                        });
                    }
                    continue;
                }

                if let Some(continued) = symbol.string.strip_suffix('\\') {
                    prefix.push_str(continued);
                    continue;
                }

                let symbol_string = if prefix.is_empty() {
                    symbol.string.to_string()
                } else {
                    let mut joined = std::mem::take(&mut prefix);
                    joined.push_str(symbol.string);
                    joined
                };

                let mut cursor = Cursor::new(&symbol_string);
                match parse_stabs_symbol(&mut cursor) {
                    Ok(parsed) => {
                        if !cursor.is_empty() {
                            if *flags & STRICT_PARSING != 0 {
                                return Err(Error::Fatal(format!(
                                    "unknown data '{}' at the end of the '{}' stab",
                                    cursor.remaining(),
                                    parsed.name
                                )));
                            }
                            warn!(
                                "unknown data '{}' at the end of the '{}' stab",
                                cursor.remaining(),
                                parsed.name
                            );
                        }
                        output.push(ParsedSymbol {
                            kind: ParsedSymbolKind::NameColonType(parsed),
                            raw: symbol,
                        });
                    }
                    Err(Error::Truncated) => {
                        // Report a warning and try to tolerate further faults
                        // caused as a result of this.
                        warn!("{} Symbol string: {}", Error::Truncated, symbol_string);
                        *flags &= !STRICT_PARSING;
                    }
                    Err(error) => return Err(error),
                }
            }
            mdebug::N_SOL => output.push(ParsedSymbol {
                kind: ParsedSymbolKind::SubSourceFile,
                raw: symbol,
            }),
            mdebug::N_LBRAC => output.push(ParsedSymbol {
                kind: ParsedSymbolKind::LBrac,
                raw: symbol,
            }),
            mdebug::N_RBRAC => output.push(ParsedSymbol {
                kind: ParsedSymbolKind::RBrac,
                raw: symbol,
            }),
            mdebug::N_SO => output.push(ParsedSymbol {
                kind: ParsedSymbolKind::SourceFile,
                raw: symbol,
            }),
            0 | mdebug::N_OPT | mdebug::N_BINCL => {}
            code => {
                warn!(
                    "unhandled N_{} symbol: {}",
                    mdebug::stabs_code_to_string(code),
                    symbol.string
                );
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::NO_IMPORTER_FLAGS;
    use crate::mdebug::{StorageType, SymbolClass, STABS_CODE_OFFSET};

    fn stab(code: u32, string: &str) -> Symbol {
        Symbol {
            string,
            value: 0,
            storage_type: StorageType::Nil,
            storage_class: SymbolClass::Nil,
            index: STABS_CODE_OFFSET + code,
        }
    }

    #[test]
    fn continuations_are_reassembled() {
        let input = [
            stab(mdebug::N_LSYM, "LongEnum:t(1,1)=eA:0,\\"),
            stab(mdebug::N_LSYM, "B:1,;"),
        ];
        let mut flags = NO_IMPORTER_FLAGS;
        let output = parse_symbols(&input, &mut flags).unwrap();
        assert_eq!(output.len(), 1);
        let ParsedSymbolKind::NameColonType(symbol) = &output[0].kind else {
            panic!("expected name colon type");
        };
        assert_eq!(symbol.name, "LongEnum");
    }

    #[test]
    fn empty_function_stab_ends_a_function() {
        let input = [stab(mdebug::N_FUN, "")];
        let mut flags = NO_IMPORTER_FLAGS;
        let output = parse_symbols(&input, &mut flags).unwrap();
        assert_eq!(output.len(), 1);
        assert!(matches!(output[0].kind, ParsedSymbolKind::FunctionEnd));
    }

    #[test]
    fn truncation_disables_strict_parsing() {
        let input = [
            stab(mdebug::N_LSYM, "Truncated:t(1,1)=s4field_name_cut_off_mid_identifi"),
            stab(mdebug::N_LSYM, "Fine:t(1,2)=e;"),
        ];
        let mut flags = STRICT_PARSING;
        let output = parse_symbols(&input, &mut flags).unwrap();
        assert_eq!(flags & STRICT_PARSING, 0);
        // The truncated symbol is dropped, the rest of the file still parses.
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn dangling_continuation_is_an_error() {
        let input = [
            stab(mdebug::N_LSYM, "Unfinished:t(1,1)=eA:0,\\"),
            stab(mdebug::N_LSYM, ""),
        ];
        let mut flags = NO_IMPORTER_FLAGS;
        assert!(parse_symbols(&input, &mut flags).is_err());
    }
}
