//! Recovers the values of global variables from the data sections.
//!
//! Each refined value becomes a `Data` or `InitializerList` node attached to
//! the variable, which the printer emits after an `=` sign. Only variables
//! with a valid address outside the BSS sections can be refined.

use object::File as ElfFile;

use crate::ast::{BuiltInClass, Node, NodeKind};
use crate::database::{
    DataTypeHandle, GlobalStorageLocation, Storage, SymbolDatabase,
};
use crate::elf::read_virtual;

struct RefinementContext<'a, 'data> {
    database: &'a SymbolDatabase,
    elf: &'a ElfFile<'data>,
}

/// Refines all global variables and static locals in the database.
pub fn refine_variables(database: &mut SymbolDatabase, elf: &ElfFile) {
    let global_handles: Vec<_> = database
        .global_variables
        .iter()
        .filter(|global| {
            refinable(global.storage.location, global.storage.address) && global.ty.is_some()
        })
        .map(|global| global.handle)
        .collect();

    for handle in global_handles {
        let (address, ty) = {
            let global = database.global_variables.symbol_from_handle(handle).unwrap();
            (global.storage.address.unwrap(), global.ty.clone().unwrap())
        };
        let context = RefinementContext { database, elf };
        let mut processing = Vec::new();
        let data = refine_node(address, &ty, &context, &mut processing);
        if let Some(global) = database.global_variables.symbol_from_handle_mut(handle) {
            global.data = data;
        }
    }

    let local_handles: Vec<_> = database
        .local_variables
        .iter()
        .filter(|local| match &local.storage {
            Storage::Global(global) => refinable(global.location, global.address),
            _ => false,
        })
        .filter(|local| local.ty.is_some())
        .map(|local| local.handle)
        .collect();

    for handle in local_handles {
        let (address, ty) = {
            let local = database.local_variables.symbol_from_handle(handle).unwrap();
            let Storage::Global(global) = &local.storage else {
                continue;
            };
            (global.address.unwrap(), local.ty.clone().unwrap())
        };
        let context = RefinementContext { database, elf };
        let mut processing = Vec::new();
        let data = refine_node(address, &ty, &context, &mut processing);
        if let Some(local) = database.local_variables.symbol_from_handle_mut(handle) {
            local.data = data;
        }
    }
}

fn refinable(location: GlobalStorageLocation, address: Option<u32>) -> bool {
    address.is_some()
        && location != GlobalStorageLocation::Bss
        && location != GlobalStorageLocation::SBss
}

fn refine_node(
    address: u32,
    ty: &Node,
    context: &RefinementContext,
    processing: &mut Vec<DataTypeHandle>,
) -> Option<Node> {
    match &ty.kind {
        NodeKind::Array(array) => {
            if array.element_type.computed_size_bytes < 0 {
                return Some(data_node("CCC_CANNOT_COMPUTE_ELEMENT_SIZE"));
            }
            let element_size = array.element_type.computed_size_bytes;
            let mut children = Vec::new();
            for index in 0..array.element_count {
                let offset = (index * element_size) as u32;
                let mut element =
                    refine_node(address.wrapping_add(offset), &array.element_type, context, processing)?;
                set_field_name(&mut element, format!("[{index}]"));
                children.push(element);
            }
            Some(Node::new(NodeKind::InitializerList(
                crate::ast::InitializerList {
                    children,
                    field_name: String::new(),
                },
            )))
        }
        NodeKind::BitField(_) => Some(data_node("BITFIELD")),
        NodeKind::BuiltIn(builtin) => refine_builtin(address, builtin.bclass, context),
        NodeKind::Enum(enumeration) => {
            let bytes = read_virtual(context.elf, address, 4)?;
            let value = i32::from_le_bytes(bytes.try_into().ok()?);
            for (number, name) in &enumeration.constants {
                if number == &value {
                    return Some(data_node(name));
                }
            }
            Some(data_node(value.to_string()))
        }
        NodeKind::PointerOrReference(_) => refine_pointer(address, context),
        NodeKind::PointerToDataMember(_) => refine_builtin(address, BuiltInClass::Unsigned32, context),
        NodeKind::StructOrUnion(struct_or_union) => {
            let mut children = Vec::new();
            for (index, base_class) in struct_or_union.base_classes.iter().enumerate() {
                let base_address =
                    address.wrapping_add(base_class.absolute_offset_bytes.max(0) as u32);
                let mut child = refine_node(base_address, base_class, context, processing)?;
                set_field_name(&mut child, format!("base class {index}"));
                children.push(child);
            }
            for field in &struct_or_union.fields {
                if field.storage_class == crate::ast::StorageClass::Static {
                    continue;
                }
                let field_address =
                    address.wrapping_add(field.relative_offset_bytes.max(0) as u32);
                let mut child = refine_node(field_address, field, context, processing)?;
                set_field_name(&mut child, format!(".{}", field.name));
                children.push(child);
            }
            Some(Node::new(NodeKind::InitializerList(
                crate::ast::InitializerList {
                    children,
                    field_name: String::new(),
                },
            )))
        }
        NodeKind::TypeName(type_name) => {
            if let Some(handle) = context.database.lookup_type(type_name, false) {
                if !processing.contains(&handle) {
                    if let Some(resolved) = context
                        .database
                        .data_types
                        .symbol_from_handle(handle)
                        .and_then(|data_type| data_type.ty.as_ref())
                    {
                        processing.push(handle);
                        let result = refine_node(address, resolved, context, processing);
                        processing.pop();
                        return result;
                    }
                }
            }
            Some(data_node("CCC_TYPE_LOOKUP_FAILED"))
        }
        _ => None,
    }
}

fn refine_builtin(
    address: u32,
    bclass: BuiltInClass,
    context: &RefinementContext,
) -> Option<Node> {
    let size = crate::ast::builtin_class_size(bclass) as usize;
    match bclass {
        BuiltInClass::Void => None,
        BuiltInClass::Unsigned8
        | BuiltInClass::Unqualified8
        | BuiltInClass::Unsigned16
        | BuiltInClass::Unsigned32
        | BuiltInClass::Unsigned64 => {
            let bytes = read_virtual(context.elf, address, size)?;
            let mut value = 0u64;
            for (index, byte) in bytes.iter().enumerate() {
                value |= (*byte as u64) << (index * 8);
            }
            Some(data_node(value.to_string()))
        }
        BuiltInClass::Signed8 | BuiltInClass::Signed16 | BuiltInClass::Signed32
        | BuiltInClass::Signed64 => {
            let bytes = read_virtual(context.elf, address, size)?;
            let mut value = 0u64;
            for (index, byte) in bytes.iter().enumerate() {
                value |= (*byte as u64) << (index * 8);
            }
            // Sign extend.
            let shift = 64 - size * 8;
            let value = ((value << shift) as i64) >> shift;
            Some(data_node(value.to_string()))
        }
        BuiltInClass::Bool8 => {
            let bytes = read_virtual(context.elf, address, 1)?;
            Some(data_node(if bytes[0] != 0 { "true" } else { "false" }))
        }
        BuiltInClass::Float32 => {
            let bytes = read_virtual(context.elf, address, 4)?;
            let value = f32::from_le_bytes(bytes.try_into().ok()?);
            Some(data_node(single_precision_float_to_string(value)))
        }
        BuiltInClass::Float64 => {
            let bytes = read_virtual(context.elf, address, 8)?;
            let value = f64::from_le_bytes(bytes.try_into().ok()?);
            Some(data_node(value.to_string()))
        }
        BuiltInClass::Unsigned128
        | BuiltInClass::Signed128
        | BuiltInClass::Unqualified128
        | BuiltInClass::Float128 => {
            // The 128-bit types are vector registers, printed lane by lane.
            let bytes = read_virtual(context.elf, address, 16)?;
            let mut lanes = [0f32; 4];
            for (index, lane) in lanes.iter_mut().enumerate() {
                let start = index * 4;
                *lane = f32::from_le_bytes(bytes[start..start + 4].try_into().ok()?);
            }
            Some(data_node(format!(
                "VECTOR({}, {}, {}, {})",
                single_precision_float_to_string(lanes[0]),
                single_precision_float_to_string(lanes[1]),
                single_precision_float_to_string(lanes[2]),
                single_precision_float_to_string(lanes[3])
            )))
        }
    }
}

fn refine_pointer(address: u32, context: &RefinementContext) -> Option<Node> {
    let bytes = read_virtual(context.elf, address, 4)?;
    let pointee = u32::from_le_bytes(bytes.try_into().ok()?);
    if pointee == 0 {
        return Some(data_node("NULL"));
    }
    if let Some(function) = context
        .database
        .functions
        .first_handle_from_address(pointee)
        .and_then(|handle| context.database.functions.symbol_from_handle(handle))
    {
        return Some(data_node(function.name.clone()));
    }
    Some(data_node(format!("{pointee:#x}")))
}

fn data_node(string: impl Into<String>) -> Node {
    Node::new(NodeKind::Data(crate::ast::Data {
        string: string.into(),
        field_name: String::new(),
    }))
}

fn set_field_name(node: &mut Node, field_name: String) {
    match &mut node.kind {
        NodeKind::Data(data) => data.field_name = field_name,
        NodeKind::InitializerList(list) => list.field_name = field_name,
        _ => {}
    }
}

fn single_precision_float_to_string(value: f32) -> String {
    let mut result = value.to_string();
    if !result.contains('.') {
        result.push('.');
    }
    result.push('f');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(single_precision_float_to_string(1.0), "1.f");
        assert_eq!(single_precision_float_to_string(0.5), "0.5f");
    }
}
