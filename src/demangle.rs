//! Name demangling.
//!
//! The importer treats the demangler as a pure function over the mangled
//! name; when it fails the mangled form is kept.

use cpp_demangle::{DemangleOptions, Symbol};

pub fn demangle(mangled: &str) -> Option<String> {
    if mangled.is_empty() {
        return None;
    }
    let symbol = Symbol::new(mangled).ok()?;
    symbol.demangle(&DemangleOptions::default()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangled_names_are_demangled() {
        assert_eq!(
            demangle("_Z14SimpleFunctionv").as_deref(),
            Some("SimpleFunction()")
        );
    }

    #[test]
    fn unmangled_names_are_left_alone() {
        assert_eq!(demangle("main"), None);
        assert_eq!(demangle(""), None);
    }
}
