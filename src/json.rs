//! Serializes the symbol database as JSON for consumption by other tools.
//!
//! The `version` field must be bumped on any incompatible change to the
//! structure of the output.

use serde_json::{json, Map, Value};

use crate::ast::{
    access_specifier_to_string, builtin_class_to_string, node_type_to_string,
    storage_class_to_string, AccessSpecifier, MemberFunctionModifier, Node, NodeKind, StorageClass,
    TypeNameSource,
};
use crate::database::{
    global_storage_location_to_string, GlobalStorage, RegisterStorage, StackStorage, Storage,
    SymbolDatabase,
};
use crate::registers;

pub const JSON_FORMAT_VERSION: u32 = 8;

pub fn write_json(database: &SymbolDatabase) -> Value {
    let mut root = Map::new();
    root.insert("version".to_string(), json!(JSON_FORMAT_VERSION));

    root.insert(
        "data_types".to_string(),
        database
            .data_types
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if !symbol.files.is_empty() {
                    object.insert(
                        "files".to_string(),
                        symbol.files.iter().map(|file| json!(file.0)).collect(),
                    );
                }
                if symbol.conflict {
                    object.insert("conflict".to_string(), json!(true));
                    if let Some(reason) = symbol.compare_fail_reason {
                        object.insert("compare_fail_reason".to_string(), json!(reason));
                    }
                }
                if symbol.probably_defined_in_cpp_file {
                    object.insert("probably_defined_in_cpp_file".to_string(), json!(true));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "functions".to_string(),
        database
            .functions
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if let Some(address) = symbol.address {
                    object.insert("address".to_string(), json!(address));
                }
                if symbol.size != 0 {
                    object.insert("size".to_string(), json!(symbol.size));
                }
                if !symbol.relative_path.is_empty() {
                    object.insert("relative_path".to_string(), json!(symbol.relative_path));
                }
                if symbol.storage_class != StorageClass::None {
                    object.insert(
                        "storage_class".to_string(),
                        json!(storage_class_to_string(symbol.storage_class)),
                    );
                }
                if !symbol.line_numbers.is_empty() {
                    object.insert(
                        "line_numbers".to_string(),
                        symbol
                            .line_numbers
                            .iter()
                            .map(|(address, line)| json!([address, line]))
                            .collect(),
                    );
                }
                if !symbol.sub_source_files.is_empty() {
                    object.insert(
                        "sub_source_files".to_string(),
                        symbol
                            .sub_source_files
                            .iter()
                            .map(|(address, path)| json!([address, path]))
                            .collect(),
                    );
                }
                if symbol.is_member_function_ish {
                    object.insert("is_member_function_ish".to_string(), json!(true));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "global_variables".to_string(),
        database
            .global_variables
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if let Some(address) = symbol.storage.address {
                    object.insert("address".to_string(), json!(address));
                }
                object.insert(
                    "storage".to_string(),
                    global_storage_object(&symbol.storage),
                );
                if symbol.storage_class != StorageClass::None {
                    object.insert(
                        "storage_class".to_string(),
                        json!(storage_class_to_string(symbol.storage_class)),
                    );
                }
                if let Some(source_file) = symbol.source_file {
                    object.insert("source_file".to_string(), json!(source_file.0));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "labels".to_string(),
        database
            .labels
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if let Some(address) = symbol.address {
                    object.insert("address".to_string(), json!(address));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "local_variables".to_string(),
        database
            .local_variables
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if let Some(function) = symbol.function {
                    if let Some(index) = database.functions.index_from_handle(function) {
                        object.insert("function".to_string(), json!(index));
                    }
                }
                object.insert("storage".to_string(), storage_object(&symbol.storage));
                if let (Some(low), Some(high)) = symbol.live_range {
                    object.insert("live_range".to_string(), json!([low, high]));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "parameter_variables".to_string(),
        database
            .parameter_variables
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                object.insert("storage".to_string(), storage_object(&symbol.storage));
                if let Some(function) = symbol.function {
                    if let Some(index) = database.functions.index_from_handle(function) {
                        object.insert("function".to_string(), json!(index));
                    }
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "sections".to_string(),
        database
            .sections
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if let Some(address) = symbol.address {
                    object.insert("address".to_string(), json!(address));
                }
                if symbol.size != 0 {
                    object.insert("size".to_string(), json!(symbol.size));
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "source_files".to_string(),
        database
            .source_files
            .iter()
            .map(|symbol| {
                let mut object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                if !symbol.relative_path.is_empty() {
                    object.insert("relative_path".to_string(), json!(symbol.relative_path));
                }
                if let Some(text_address) = symbol.text_address {
                    object.insert("text_address".to_string(), json!(text_address));
                }
                if !symbol.toolchain_version_info.is_empty() {
                    object.insert(
                        "toolchain_version".to_string(),
                        symbol
                            .toolchain_version_info
                            .iter()
                            .map(|info| json!(info))
                            .collect(),
                    );
                }
                Value::Object(object)
            })
            .collect(),
    );

    root.insert(
        "symbol_sources".to_string(),
        database
            .symbol_sources
            .iter()
            .map(|symbol| {
                let object = symbol_object(&symbol.name, symbol.source.0, &symbol.ty, database);
                Value::Object(object)
            })
            .collect(),
    );

    Value::Object(root)
}

fn symbol_object(
    name: &str,
    source: u32,
    ty: &Option<Node>,
    database: &SymbolDatabase,
) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("name".to_string(), json!(name));
    object.insert("source".to_string(), json!(source));
    if let Some(node) = ty {
        object.insert("type".to_string(), ast_node_to_json(node, database));
    }
    object
}

fn global_storage_object(storage: &GlobalStorage) -> Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("global"));
    object.insert(
        "location".to_string(),
        json!(global_storage_location_to_string(storage.location)),
    );
    if let Some(address) = storage.address {
        object.insert("address".to_string(), json!(address));
    }
    Value::Object(object)
}

fn register_storage_object(storage: &RegisterStorage) -> Value {
    let (register_class, register_index) =
        registers::map_dbx_register_index(storage.dbx_register_number);
    json!({
        "type": "register",
        "register": registers::register_name(storage.dbx_register_number).unwrap_or("invalid"),
        "register_class": match register_class {
            registers::RegisterClass::Gpr => "gpr",
            registers::RegisterClass::Fpr => "fpr",
            registers::RegisterClass::Invalid => "invalid",
        },
        "dbx_register_number": storage.dbx_register_number,
        "register_index": register_index,
        "is_by_reference": storage.is_by_reference,
    })
}

fn stack_storage_object(storage: &StackStorage) -> Value {
    json!({
        "type": "stack",
        "offset": storage.stack_pointer_offset,
    })
}

fn storage_object(storage: &Storage) -> Value {
    match storage {
        Storage::Global(global) => global_storage_object(global),
        Storage::Register(register) => register_storage_object(register),
        Storage::Stack(stack) => stack_storage_object(stack),
    }
}

/// Recursively serializes an AST node. Only attributes that differ from
/// their defaults are written out to keep the output small.
pub fn ast_node_to_json(node: &Node, database: &SymbolDatabase) -> Value {
    let mut object = Map::new();

    object.insert("descriptor".to_string(), json!(node_type_to_string(node)));

    if !node.name.is_empty() {
        object.insert("name".to_string(), json!(node.name));
    }
    if node.storage_class != StorageClass::None {
        object.insert(
            "storage_class".to_string(),
            json!(storage_class_to_string(node.storage_class)),
        );
    }
    if node.relative_offset_bytes != -1 {
        object.insert(
            "relative_offset_bytes".to_string(),
            json!(node.relative_offset_bytes),
        );
    }
    if node.absolute_offset_bytes != -1 {
        object.insert(
            "absolute_offset_bytes".to_string(),
            json!(node.absolute_offset_bytes),
        );
    }
    if node.size_bits != -1 {
        object.insert("size_bits".to_string(), json!(node.size_bits));
    }
    if node.is_const {
        object.insert("is_const".to_string(), json!(true));
    }
    if node.is_volatile {
        object.insert("is_volatile".to_string(), json!(true));
    }
    if node.access_specifier != AccessSpecifier::Public {
        object.insert(
            "access_specifier".to_string(),
            json!(access_specifier_to_string(node.access_specifier)),
        );
    }

    match &node.kind {
        NodeKind::Array(array) => {
            object.insert(
                "element_type".to_string(),
                ast_node_to_json(&array.element_type, database),
            );
            object.insert("element_count".to_string(), json!(array.element_count));
        }
        NodeKind::BitField(bitfield) => {
            object.insert(
                "bitfield_offset_bits".to_string(),
                json!(bitfield.bitfield_offset_bits),
            );
            object.insert(
                "underlying_type".to_string(),
                ast_node_to_json(&bitfield.underlying_type, database),
            );
        }
        NodeKind::BuiltIn(builtin) => {
            object.insert(
                "class".to_string(),
                json!(builtin_class_to_string(builtin.bclass)),
            );
        }
        NodeKind::Data(data) => {
            object.insert("string".to_string(), json!(data.string));
            if !data.field_name.is_empty() {
                object.insert("field_name".to_string(), json!(data.field_name));
            }
        }
        NodeKind::Enum(enumeration) => {
            object.insert(
                "constants".to_string(),
                enumeration
                    .constants
                    .iter()
                    .map(|(value, name)| json!({"value": value, "name": name}))
                    .collect(),
            );
        }
        NodeKind::FunctionType(function) => {
            if let Some(return_type) = &function.return_type {
                object.insert(
                    "return_type".to_string(),
                    ast_node_to_json(return_type, database),
                );
            }
            if let Some(parameters) = &function.parameters {
                object.insert(
                    "parameters".to_string(),
                    parameters
                        .iter()
                        .map(|parameter| ast_node_to_json(parameter, database))
                        .collect(),
                );
            }
            let modifier = match function.modifier {
                MemberFunctionModifier::None => "none",
                MemberFunctionModifier::Static => "static",
                MemberFunctionModifier::Virtual => "virtual",
            };
            object.insert("modifier".to_string(), json!(modifier));
            object.insert("vtable_index".to_string(), json!(function.vtable_index));
            object.insert(
                "is_constructor".to_string(),
                json!(function.is_constructor),
            );
        }
        NodeKind::InitializerList(list) => {
            object.insert(
                "children".to_string(),
                list.children
                    .iter()
                    .map(|child| ast_node_to_json(child, database))
                    .collect(),
            );
            if !list.field_name.is_empty() {
                object.insert("field_name".to_string(), json!(list.field_name));
            }
        }
        NodeKind::PointerOrReference(pointer_or_reference) => {
            object.insert(
                "value_type".to_string(),
                ast_node_to_json(&pointer_or_reference.value_type, database),
            );
        }
        NodeKind::PointerToDataMember(member_pointer) => {
            object.insert(
                "class_type".to_string(),
                ast_node_to_json(&member_pointer.class_type, database),
            );
            object.insert(
                "member_type".to_string(),
                ast_node_to_json(&member_pointer.member_type, database),
            );
        }
        NodeKind::StructOrUnion(struct_or_union) => {
            if struct_or_union.is_struct {
                object.insert(
                    "base_classes".to_string(),
                    struct_or_union
                        .base_classes
                        .iter()
                        .map(|base_class| ast_node_to_json(base_class, database))
                        .collect(),
                );
            }
            object.insert(
                "fields".to_string(),
                struct_or_union
                    .fields
                    .iter()
                    .map(|field| ast_node_to_json(field, database))
                    .collect(),
            );
            object.insert(
                "member_functions".to_string(),
                struct_or_union
                    .member_functions
                    .iter()
                    .map(|member_function| ast_node_to_json(member_function, database))
                    .collect(),
            );
        }
        NodeKind::TypeName(type_name) => {
            let source = match type_name.source {
                TypeNameSource::Reference => "reference",
                TypeNameSource::CrossReference => "cross_reference",
                TypeNameSource::Error => "error",
            };
            object.insert("source".to_string(), json!(source));
            object.insert("type_name".to_string(), json!(type_name.type_name));
            let data_type_index = database
                .lookup_type(type_name, true)
                .and_then(|handle| database.data_types.index_from_handle(handle))
                .map(|index| index as i64)
                .unwrap_or(-1);
            object.insert("data_type_handle".to_string(), json!(data_type_index));
        }
    }

    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BuiltIn, BuiltInClass};
    use crate::database::SymbolSourceKind;

    #[test]
    fn version_is_stable() {
        let database = SymbolDatabase::new();
        let value = write_json(&database);
        assert_eq!(value["version"], json!(8));
        assert!(value["data_types"].as_array().unwrap().is_empty());
    }

    #[test]
    fn builtins_serialize_their_class() {
        let mut database = SymbolDatabase::new();
        let source = database
            .symbol_sources
            .create_source("test", SymbolSourceKind::SymbolTable);
        let file = database
            .source_files
            .create_symbol("test.cpp", source, None)
            .handle;
        let node = Node::new(NodeKind::BuiltIn(BuiltIn {
            bclass: BuiltInClass::Signed32,
        }));
        database.create_data_type_if_unique(node, "int", file, source);

        let value = write_json(&database);
        let data_types = value["data_types"].as_array().unwrap();
        assert_eq!(data_types.len(), 1);
        assert_eq!(data_types[0]["name"], json!("int"));
        assert_eq!(data_types[0]["type"]["descriptor"], json!("builtin"));
        assert_eq!(
            data_types[0]["type"]["class"],
            json!("32-bit signed integer")
        );
    }
}
