//! End-to-end tests for the .mdebug import pipeline, driven by synthetic
//! symbol streams based on real compiler outputs from the old homebrew
//! toolchain (GCC 3.2.3) except where otherwise stated.

use mdebug_recover::ast::{NodeDescriptor, NodeKind, StorageClass};
use mdebug_recover::database::{SymbolDatabase, SymbolSourceKind};
use mdebug_recover::flags::{DONT_DEDUPLICATE_TYPES, NO_IMPORTER_FLAGS};
use mdebug_recover::importer::{import_file, AnalysisContext};
use mdebug_recover::mdebug::{
    File, StorageType, Symbol, SymbolClass, N_FUN, N_LBRAC, N_LSYM, N_PSYM, N_RBRAC,
    STABS_CODE_OFFSET,
};

fn stab(value: u32, storage_type: StorageType, storage_class: SymbolClass, code: u32, string: &str) -> Symbol {
    Symbol {
        string,
        value,
        storage_type,
        storage_class,
        index: STABS_CODE_OFFSET + code,
    }
}

fn raw(value: u32, storage_type: StorageType, storage_class: SymbolClass, index: u32, string: &str) -> Symbol {
    Symbol {
        string,
        value,
        storage_type,
        storage_class,
        index,
    }
}

fn lsym(string: &str) -> Symbol {
    stab(0, StorageType::Nil, SymbolClass::Nil, N_LSYM, string)
}

fn run_importer(symbols: Vec<Symbol>, flags: u32) -> mdebug_recover::Result<SymbolDatabase> {
    let mut database = SymbolDatabase::new();
    let source = database
        .symbol_sources
        .create_source("test", SymbolSourceKind::SymbolTable);
    let context = AnalysisContext::new(source, flags, None);
    let file = File {
        full_path: "test.cpp".to_string(),
        symbols,
        language: 0,
    };
    import_file(&mut database, &file, &context)?;
    Ok(database)
}

fn import(symbols: Vec<Symbol>) -> SymbolDatabase {
    run_importer(symbols, NO_IMPORTER_FLAGS).expect("import failed")
}

// ee-g++ -gstabs
// enum Enum {};
#[test]
fn plain_enum() {
    let database = import(vec![lsym("Enum:t(1,1)=e;")]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database.data_types.first_handle_from_name("Enum").unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::Enum);
    assert_eq!(node.storage_class, StorageClass::None);
}

// ee-g++ -gstabs
// typedef enum NamedTypedefedEnum {} NamedTypedefedEnum;
#[test]
fn named_typedefed_enum() {
    let database = import(vec![
        lsym("Enum:t(1,1)=e;"),
        lsym("Enum:t(1,2)=(1,1)"),
    ]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database.data_types.first_handle_from_name("Enum").unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::Enum);
    assert_eq!(node.storage_class, StorageClass::Typedef);
}

// ee-g++ -gstabs
// struct Struct {};
#[test]
fn plain_struct() {
    let database = import(vec![
        lsym("Struct:T(1,1)=s1;"),
        lsym("Struct:t(1,1)"),
    ]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database.data_types.first_handle_from_name("Struct").unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::StructOrUnion);
    assert_eq!(node.storage_class, StorageClass::None);
}

// ee-g++ -gstabs
// typedef struct {} TypedefedStruct;
#[test]
fn typedefed_struct() {
    let database = import(vec![lsym("TypedefedStruct:t(1,1)=s1;")]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database
        .data_types
        .first_handle_from_name("TypedefedStruct")
        .unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::StructOrUnion);
    assert_eq!(node.storage_class, StorageClass::Typedef);
}

// ee-g++ -gstabs
// typedef struct NamedTypedefedStruct {} NamedTypedefedStruct;
#[test]
fn named_typedefed_struct() {
    let database = import(vec![
        lsym("NamedTypedefedStruct:T(1,1)=s1;"),
        lsym("NamedTypedefedStruct:t(1,1)"),
        lsym("NamedTypedefedStruct:t(1,2)=(1,1)"),
    ]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database
        .data_types
        .first_handle_from_name("NamedTypedefedStruct")
        .unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::StructOrUnion);
    assert_eq!(node.storage_class, StorageClass::Typedef);
}

// Synthetic example. Something like:
// typedef struct {} StrangeStruct;
#[test]
fn strange_struct() {
    let database = import(vec![
        lsym("StrangeStruct:T(1,1)=s1;"),
        lsym("StrangeStruct:t(1,2)=(1,1)"),
    ]);

    assert_eq!(database.data_types.len(), 1);
    let handle = database
        .data_types
        .first_handle_from_name("StrangeStruct")
        .unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    assert_eq!(node.descriptor(), NodeDescriptor::StructOrUnion);
    assert_eq!(node.storage_class, StorageClass::Typedef);
}

// ee-g++ -gstabs
// void SimpleFunction() {}
#[test]
fn simple_function() {
    let database = import(vec![
        stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "Z14SimpleFunctionv:F(0,23)"),
        raw(0x00000000, StorageType::Label, SymbolClass::Text, 1, "$LM1"),
        raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "_Z14SimpleFunctionv"),
        raw(0x0000000c, StorageType::Label, SymbolClass::Text, 1, "$LM2"),
        raw(0x00000020, StorageType::End, SymbolClass::Text, 31, "_Z14SimpleFunctionv"),
    ]);

    assert_eq!(database.functions.len(), 1);
    let handle = database
        .functions
        .first_handle_from_name("Z14SimpleFunctionv")
        .unwrap();
    let function = database.functions.symbol_from_handle(handle).unwrap();
    assert_eq!(function.size, 0x20);
    assert_eq!(function.line_numbers.len(), 2);
}

// iop-gcc -gstabs
// void SimpleFunction() {}
#[test]
fn simple_function_iop() {
    let database = import(vec![
        raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "SimpleFunction"),
        raw(0x0000000c, StorageType::Label, SymbolClass::Text, 1, "$LM2"),
        raw(0x00000020, StorageType::End, SymbolClass::Text, 27, "SimpleFunction"),
        stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "SimpleFunction:F22"),
    ]);

    assert_eq!(database.functions.len(), 1);
    let handle = database
        .functions
        .first_handle_from_name("SimpleFunction")
        .unwrap();
    let function = database.functions.symbol_from_handle(handle).unwrap();
    assert!(function.ty.is_some());
}

// ee-g++ -gstabs
// int ComplicatedFunction(int a, float b, char* c) {
// 	int x = b < 0;
// 	if(a) { int y = b + *c; return y; }
// 	{ int z = b + a; x += z; }
// 	return x;
// }
#[test]
fn complicated_function() {
    let database = import(vec![
        stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "_Z19ComplicatedFunctionifPc:F(0,1)"),
        stab(0xffffffd0, StorageType::Nil, SymbolClass::Nil, N_PSYM, "a:p(0,1)"),
        stab(0xffffffd4, StorageType::Nil, SymbolClass::Nil, N_PSYM, "b:p(0,14)"),
        stab(0xffffffd8, StorageType::Nil, SymbolClass::Nil, N_PSYM, "c:p(1,1)=*(0,2)"),
        raw(0x00000000, StorageType::Label, SymbolClass::Text, 1, "$LM1"),
        raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "_Z19ComplicatedFunctionifPc"),
        raw(0x00000018, StorageType::Label, SymbolClass::Text, 2, "$LM2"),
        raw(0x00000100, StorageType::End, SymbolClass::Text, 34, "_Z19ComplicatedFunctionifPc"),
        stab(0xffffffdc, StorageType::Nil, SymbolClass::Nil, N_LSYM, "x:(0,1)"),
        stab(0x00000018, StorageType::Nil, SymbolClass::Nil, N_LBRAC, ""),
        stab(0xffffffe0, StorageType::Nil, SymbolClass::Nil, N_LSYM, "y:(0,1)"),
        stab(0x00000054, StorageType::Nil, SymbolClass::Nil, N_LBRAC, ""),
        stab(0x00000088, StorageType::Nil, SymbolClass::Nil, N_RBRAC, ""),
        stab(0xffffffe4, StorageType::Nil, SymbolClass::Nil, N_LSYM, "z:(0,1)"),
        stab(0x000000a4, StorageType::Nil, SymbolClass::Nil, N_LBRAC, ""),
        stab(0x000000cc, StorageType::Nil, SymbolClass::Nil, N_RBRAC, ""),
        stab(0x000000e8, StorageType::Nil, SymbolClass::Nil, N_RBRAC, ""),
    ]);

    assert_eq!(database.functions.len(), 1);
    assert_eq!(database.parameter_variables.len(), 3);
    assert_eq!(database.local_variables.len(), 3);

    let function_handle = database
        .functions
        .first_handle_from_name("_Z19ComplicatedFunctionifPc")
        .unwrap();
    for local in &database.local_variables {
        assert_eq!(local.function, Some(function_handle));
    }
    let function = database
        .functions
        .symbol_from_handle(function_handle)
        .unwrap();
    assert!(function.parameter_variables.is_some());
    assert!(function.local_variables.is_some());
}

// Nested blocks have to balance out by the end of the translation unit.
#[test]
fn mismatched_brackets_abort_the_import() {
    let unmatched_close = run_importer(
        vec![
            stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "f:F(0,1)"),
            raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "f"),
            raw(0x00000100, StorageType::End, SymbolClass::Text, 2, "f"),
            stab(0x00000010, StorageType::Nil, SymbolClass::Nil, N_RBRAC, ""),
        ],
        NO_IMPORTER_FLAGS,
    );
    assert!(unmatched_close.is_err());

    let unmatched_open = run_importer(
        vec![
            stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "f:F(0,1)"),
            raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "f"),
            raw(0x00000100, StorageType::End, SymbolClass::Text, 2, "f"),
            stab(0x00000010, StorageType::Nil, SymbolClass::Nil, N_LBRAC, ""),
        ],
        NO_IMPORTER_FLAGS,
    );
    assert!(unmatched_open.is_err());
}

// A function that is opened but never closed means the symbol table was cut
// short.
#[test]
fn truncated_symbol_table_is_an_error() {
    let result = run_importer(
        vec![
            stab(0x00000000, StorageType::Label, SymbolClass::Text, N_FUN, "f:F(0,1)"),
            raw(0x00000000, StorageType::Proc, SymbolClass::Text, 1, "f"),
        ],
        NO_IMPORTER_FLAGS,
    );
    assert!(result.is_err());
}

// Struct layouts observed in the wild respect the size invariant: the struct
// is at least as big as the end of its last field.
#[test]
fn struct_field_offsets_are_consistent() {
    let database = import(vec![
        lsym("int:t(0,1)=r(0,1);-2147483648;2147483647;"),
        lsym("Vec2:T(1,1)=s8x:(0,1),0,32;y:(0,1),32,32;;"),
    ]);

    let handle = database.data_types.first_handle_from_name("Vec2").unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    let node = data_type.ty.as_ref().unwrap();
    let NodeKind::StructOrUnion(struct_or_union) = &node.kind else {
        panic!("expected a struct");
    };

    let mut end_bits = 0;
    for field in &struct_or_union.fields {
        assert!(field.absolute_offset_bytes >= 0);
        assert_eq!(field.absolute_offset_bytes, field.relative_offset_bytes);
        end_bits = end_bits.max(field.relative_offset_bytes * 8 + field.size_bits);
    }
    assert!(node.size_bits >= end_bits);
}

// Types observed in multiple files accumulate those files, and per-file mode
// keeps them separate instead.
#[test]
fn type_deduplication_across_files() {
    let mut database = SymbolDatabase::new();
    let source = database
        .symbol_sources
        .create_source("test", SymbolSourceKind::SymbolTable);
    let context = AnalysisContext::new(source, NO_IMPORTER_FLAGS, None);
    for path in ["a.cpp", "b.cpp"] {
        let file = File {
            full_path: path.to_string(),
            symbols: vec![lsym("Shared:T(1,1)=s4value:(1,2)=r(1,2);0;4294967295;,0,32;;")],
            language: 0,
        };
        import_file(&mut database, &file, &context).unwrap();
    }

    assert_eq!(database.data_types.len(), 1);
    let handle = database.data_types.first_handle_from_name("Shared").unwrap();
    let data_type = database.data_types.symbol_from_handle(handle).unwrap();
    assert_eq!(data_type.files.len(), 2);
    assert!(!data_type.probably_defined_in_cpp_file);

    let mut per_file = SymbolDatabase::new();
    let source = per_file
        .symbol_sources
        .create_source("test", SymbolSourceKind::SymbolTable);
    let context = AnalysisContext::new(source, DONT_DEDUPLICATE_TYPES, None);
    for path in ["a.cpp", "b.cpp"] {
        let file = File {
            full_path: path.to_string(),
            symbols: vec![lsym("Shared:T(1,1)=s4value:(1,2)=r(1,2);0;4294967295;,0,32;;")],
            language: 0,
        };
        import_file(&mut per_file, &file, &context).unwrap();
    }
    assert_eq!(per_file.data_types.len(), 2);
    for data_type in &per_file.data_types {
        assert!(data_type.source_file.is_some());
    }
}

// Structurally different types under one name are kept as siblings and
// flagged as conflicting.
#[test]
fn conflicting_types_are_preserved() {
    let mut database = SymbolDatabase::new();
    let source = database
        .symbol_sources
        .create_source("test", SymbolSourceKind::SymbolTable);
    let context = AnalysisContext::new(source, NO_IMPORTER_FLAGS, None);
    for (path, stab_string) in [
        ("a.cpp", "Mystery:T(1,1)=s4value:(1,2)=r(1,2);0;4294967295;,0,32;;"),
        ("b.cpp", "Mystery:T(1,1)=s8value:(1,2)=r(1,2);0;4294967295;,0,32;other:(1,2),32,32;;"),
    ] {
        let file = File {
            full_path: path.to_string(),
            symbols: vec![lsym(stab_string)],
            language: 0,
        };
        import_file(&mut database, &file, &context).unwrap();
    }

    assert_eq!(database.data_types.len(), 2);
    for data_type in &database.data_types {
        assert!(data_type.conflict);
        assert!(data_type.compare_fail_reason.is_some());
    }
}
