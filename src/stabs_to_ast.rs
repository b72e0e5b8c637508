//! Translation of parsed STABS type trees into AST nodes.
//!
//! Type references are resolved through the per-translation-unit type table
//! here. Named types reached while walking a tree are substituted with a
//! type name node instead of being inlined, which both matches the source
//! level semantics and prevents infinite expansion of cyclic types.

use std::collections::BTreeMap;

use tracing::warn;

use crate::ast::{
    self, AccessSpecifier, BuiltInClass, Node, NodeKind, StorageClass, TypeName, TypeNameSource,
};
use crate::error::{Error, Result};
use crate::flags::STRICT_PARSING;
use crate::stabs::{
    StabsField, StabsFieldVisibility, StabsMemberFunctionSet, StabsSymbol, StabsSymbolDescriptor,
    StabsType, StabsTypeBody, StabsTypeNumber,
};

/// Hard limit on the recursion depth, comfortably above anything a real
/// symbol table produces.
const MAX_RECURSION_DEPTH: i32 = 1000;

pub struct StabsToAstState<'a> {
    /// Handle value of the source file being imported, stored into type name
    /// nodes so lookups can go through the right type table later.
    pub file_handle: u32,
    pub stabs_types: &'a BTreeMap<StabsTypeNumber, &'a StabsType>,
    pub flags: u32,
}

/// Converts the type tree of a `t`/`T` symbol into the node stored in the
/// database for a data type.
pub fn stabs_data_type_symbol_to_ast(symbol: &StabsSymbol, state: &StabsToAstState) -> Result<Node> {
    let mut node = stabs_type_to_ast(&symbol.ty, state, 0, 0, 0, false, false)?;
    node.name = if symbol.name == " " {
        String::new()
    } else {
        symbol.name.clone()
    };
    node.storage_class = data_type_storage_class(symbol);
    node.stabs_type_number = symbol.ty.number;
    Ok(node)
}

/// `t` symbols usually mean typedef, except GCC also uses them for plain
/// enums and for re-stating the type number of a tag, so those stay unmarked.
fn data_type_storage_class(symbol: &StabsSymbol) -> StorageClass {
    if symbol.descriptor != StabsSymbolDescriptor::TypeName {
        return StorageClass::None;
    }
    match &symbol.ty.body {
        None => StorageClass::None,
        Some(StabsTypeBody::Enum(_))
        | Some(StabsTypeBody::Range { .. })
        | Some(StabsTypeBody::FloatingPointBuiltin { .. })
        | Some(StabsTypeBody::Builtin(_)) => StorageClass::None,
        Some(_) => StorageClass::Typedef,
    }
}

/// Like [`stabs_type_to_ast`], but errors become a warning plus an error
/// marker node instead of failing the caller. Used for variable types, where
/// a single bad type should not abort the surrounding function.
pub fn stabs_type_to_ast_and_handle_errors(
    ty: &StabsType,
    state: &StabsToAstState,
    substitute_type_name: bool,
    force_substitute: bool,
) -> Node {
    match stabs_type_to_ast(ty, state, 0, 0, 0, substitute_type_name, force_substitute) {
        Ok(node) => node,
        Err(error) => {
            warn!("failed to convert STABS type to AST: {error}");
            let mut type_name = TypeName::reference("CCC_ERROR");
            type_name.source = TypeNameSource::Error;
            Node::new(NodeKind::TypeName(type_name))
        }
    }
}

/// The recursive worker.
///
/// `depth` counts structural nesting and controls type name substitution;
/// `recursion_depth` additionally counts reference hops so that reference
/// cycles hit the recursion limit instead of looping forever.
pub fn stabs_type_to_ast(
    ty: &StabsType,
    state: &StabsToAstState,
    abs_parent_offset_bytes: i32,
    depth: i32,
    recursion_depth: i32,
    substitute_type_name: bool,
    force_substitute: bool,
) -> Result<Node> {
    if recursion_depth > MAX_RECURSION_DEPTH {
        let mut type_name = TypeName::reference("CCC_BADRECURSION");
        type_name.source = TypeNameSource::Error;
        return Ok(Node::new(NodeKind::TypeName(type_name)));
    }

    // Replace types with their name where that is more appropriate: struct
    // fields and variables of a named type should read as that name, not as a
    // copy of the whole definition.
    if let Some(name) = &ty.name {
        let try_substitute = depth > 0
            && matches!(
                ty.body,
                Some(StabsTypeBody::Range { .. }) | Some(StabsTypeBody::Builtin(_))
            );
        let is_name_empty = name.is_empty() || name == " ";
        // Unfortunately, a common case seems to be that __builtin_va_list is
        // indistinguishable from void*, so it is not printed by name.
        let is_va_list = name == "__builtin_va_list";
        if (substitute_type_name || try_substitute) && !is_name_empty && !is_va_list {
            let mut type_name = TypeName::reference(name.clone());
            type_name.referenced_file_handle = Some(state.file_handle);
            type_name.referenced_stabs_type_number = ty.number;
            return Ok(Node::new(NodeKind::TypeName(type_name)));
        }
    }

    // Prevent infinite recursion when an automatically generated member
    // function references an unnamed type.
    if force_substitute {
        let unnamed = match &ty.body {
            Some(StabsTypeBody::Enum(_)) => Some("__unnamed_enum"),
            Some(StabsTypeBody::Struct { .. }) => Some("__unnamed_struct"),
            Some(StabsTypeBody::Union { .. }) => Some("__unnamed_union"),
            _ => None,
        };
        if let Some(unnamed) = unnamed {
            let mut type_name = TypeName::reference(unnamed);
            type_name.referenced_file_handle = Some(state.file_handle);
            type_name.referenced_stabs_type_number = ty.number;
            return Ok(Node::new(NodeKind::TypeName(type_name)));
        }
    }

    let Some(body) = &ty.body else {
        // The definition of the type was given elsewhere, so look it up by
        // its type number.
        if ty.anonymous {
            return Err(Error::Fatal(
                "cannot lookup type (type is anonymous)".to_string(),
            ));
        }
        let Some(&resolved) = state.stabs_types.get(&ty.number) else {
            if state.flags & STRICT_PARSING != 0 {
                return Err(Error::Lookup {
                    what: "STABS type number",
                    key: format!("({},{})", ty.number.file, ty.number.index),
                });
            }
            warn!(
                "failed to lookup STABS type by its type number ({},{})",
                ty.number.file, ty.number.index
            );
            let mut type_name = TypeName::reference(format!(
                "CCC_BADTYPELOOKUP({},{})",
                ty.number.file, ty.number.index
            ));
            type_name.source = TypeNameSource::Error;
            return Ok(Node::new(NodeKind::TypeName(type_name)));
        };
        return stabs_type_to_ast(
            resolved,
            state,
            abs_parent_offset_bytes,
            depth,
            recursion_depth + 1,
            substitute_type_name,
            force_substitute,
        );
    };

    let node = match body {
        StabsTypeBody::TypeReference(inner) => {
            if ty.anonymous || inner.anonymous || inner.number != ty.number {
                stabs_type_to_ast(
                    inner,
                    state,
                    abs_parent_offset_bytes,
                    depth,
                    recursion_depth + 1,
                    substitute_type_name,
                    force_substitute,
                )?
            } else {
                // In STABS, void is a reference to itself.
                Node::new(NodeKind::TypeName(TypeName::reference("void")))
            }
        }
        StabsTypeBody::Array { index, element } => {
            let element_node = stabs_type_to_ast(
                element,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                force_substitute,
            )?;

            let Some(StabsTypeBody::Range { low, high, .. }) = &index.body else {
                return Err(Error::Fatal("invalid index type for array".to_string()));
            };
            let low: i64 = low
                .parse()
                .map_err(|_| Error::Fatal("failed to parse low part of range".to_string()))?;
            if low != 0 {
                return Err(Error::Fatal("array index range not based at zero".to_string()));
            }
            let high: i64 = high
                .parse()
                .map_err(|_| Error::Fatal("failed to parse high part of range".to_string()))?;

            let element_count = if high == 4294967295 {
                // Some compilers wrote out a wrapped around value here for
                // zero length arrays.
                0
            } else {
                (high + 1) as i32
            };

            Node::new(NodeKind::Array(ast::Array {
                element_type: Box::new(element_node),
                element_count,
            }))
        }
        StabsTypeBody::Enum(fields) => Node::new(NodeKind::Enum(ast::Enum {
            constants: fields.clone(),
        })),
        StabsTypeBody::Function { return_type } => {
            let return_node = stabs_type_to_ast(
                return_type,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                force_substitute,
            )?;
            Node::new(NodeKind::FunctionType(ast::FunctionType {
                return_type: Some(Box::new(return_node)),
                ..Default::default()
            }))
        }
        StabsTypeBody::VolatileQualifier(inner) => {
            let mut node = stabs_type_to_ast(
                inner,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                substitute_type_name,
                force_substitute,
            )?;
            node.is_volatile = true;
            node
        }
        StabsTypeBody::ConstQualifier(inner) => {
            let mut node = stabs_type_to_ast(
                inner,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                substitute_type_name,
                force_substitute,
            )?;
            node.is_const = true;
            node
        }
        StabsTypeBody::Range { low, high, .. } => {
            let bclass = classify_range(low, high)?;
            Node::new(NodeKind::BuiltIn(ast::BuiltIn { bclass }))
        }
        StabsTypeBody::Struct {
            size,
            base_classes,
            fields,
            member_functions,
            ..
        } => {
            let mut node = struct_or_union_to_ast(
                true,
                *size,
                base_classes,
                fields,
                member_functions,
                ty.name.as_deref(),
                state,
                abs_parent_offset_bytes,
                depth,
                recursion_depth,
                force_substitute,
            )?;
            node.size_bits = (*size * 8) as i32;
            node
        }
        StabsTypeBody::Union {
            size,
            fields,
            member_functions,
        } => {
            let mut node = struct_or_union_to_ast(
                false,
                *size,
                &[],
                fields,
                member_functions,
                ty.name.as_deref(),
                state,
                abs_parent_offset_bytes,
                depth,
                recursion_depth,
                force_substitute,
            )?;
            node.size_bits = (*size * 8) as i32;
            node
        }
        StabsTypeBody::CrossReference { kind, identifier } => {
            let mut type_name = TypeName::reference(identifier.clone());
            type_name.source = TypeNameSource::CrossReference;
            type_name.forward_declared_kind = Some(*kind);
            Node::new(NodeKind::TypeName(type_name))
        }
        StabsTypeBody::FloatingPointBuiltin { bytes, .. } => {
            let bclass = match bytes {
                1 => BuiltInClass::Unsigned8,
                2 => BuiltInClass::Unsigned16,
                4 => BuiltInClass::Unsigned32,
                8 => BuiltInClass::Unsigned64,
                16 => BuiltInClass::Unsigned128,
                _ => BuiltInClass::Unsigned8,
            };
            Node::new(NodeKind::BuiltIn(ast::BuiltIn { bclass }))
        }
        StabsTypeBody::Method {
            return_type,
            parameter_types,
            ..
        } => {
            let return_node = stabs_type_to_ast(
                return_type,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                true,
            )?;
            let mut parameters = Vec::new();
            for parameter_type in parameter_types {
                parameters.push(stabs_type_to_ast(
                    parameter_type,
                    state,
                    abs_parent_offset_bytes,
                    depth + 1,
                    recursion_depth + 1,
                    true,
                    true,
                )?);
            }
            Node::new(NodeKind::FunctionType(ast::FunctionType {
                return_type: Some(Box::new(return_node)),
                parameters: Some(parameters),
                ..Default::default()
            }))
        }
        StabsTypeBody::Pointer(inner) | StabsTypeBody::Reference(inner) => {
            let value_node = stabs_type_to_ast(
                inner,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                force_substitute,
            )?;
            Node::new(NodeKind::PointerOrReference(ast::PointerOrReference {
                is_pointer: matches!(body, StabsTypeBody::Pointer(_)),
                value_type: Box::new(value_node),
            }))
        }
        StabsTypeBody::PointerToDataMember {
            class_type,
            member_type,
        } => {
            let class_node = stabs_type_to_ast(
                class_type,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                true,
            )?;
            let member_node = stabs_type_to_ast(
                member_type,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                true,
            )?;
            Node::new(NodeKind::PointerToDataMember(ast::PointerToDataMember {
                class_type: Box::new(class_node),
                member_type: Box::new(member_node),
            }))
        }
        StabsTypeBody::SizeAttribute { size_bits, inner } => {
            let mut node = stabs_type_to_ast(
                inner,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                substitute_type_name,
                force_substitute,
            )?;
            node.size_bits = *size_bits as i32;
            node
        }
        StabsTypeBody::Builtin(type_id) => {
            if *type_id != 16 {
                return Err(Error::Fatal(format!("unknown built-in type {type_id}")));
            }
            Node::new(NodeKind::BuiltIn(ast::BuiltIn {
                bclass: BuiltInClass::Bool8,
            }))
        }
    };

    Ok(node)
}

#[allow(clippy::too_many_arguments)]
fn struct_or_union_to_ast(
    is_struct: bool,
    _size: i64,
    base_classes: &[crate::stabs::StabsBaseClass],
    fields: &[StabsField],
    member_functions: &[StabsMemberFunctionSet],
    type_name: Option<&str>,
    state: &StabsToAstState,
    abs_parent_offset_bytes: i32,
    depth: i32,
    recursion_depth: i32,
    force_substitute: bool,
) -> Result<Node> {
    let mut base_class_nodes = Vec::new();
    for base_class in base_classes {
        let mut node = stabs_type_to_ast(
            &base_class.ty,
            state,
            abs_parent_offset_bytes,
            depth + 1,
            recursion_depth + 1,
            true,
            force_substitute,
        )?;
        node.is_base_class = true;
        node.absolute_offset_bytes = base_class.offset;
        node.access_specifier = visibility_to_access_specifier(base_class.visibility);
        base_class_nodes.push(node);
    }

    let mut field_nodes = Vec::new();
    for field in fields {
        field_nodes.push(field_to_ast(
            field,
            state,
            abs_parent_offset_bytes,
            depth,
            recursion_depth,
        )?);
    }

    let member_function_nodes = member_functions_to_ast(
        member_functions,
        type_name,
        state,
        abs_parent_offset_bytes,
        depth,
        recursion_depth,
    )?;

    Ok(Node::new(NodeKind::StructOrUnion(ast::StructOrUnion {
        is_struct,
        base_classes: base_class_nodes,
        fields: field_nodes,
        member_functions: member_function_nodes,
    })))
}

fn field_to_ast(
    field: &StabsField,
    state: &StabsToAstState,
    abs_parent_offset_bytes: i32,
    depth: i32,
    recursion_depth: i32,
) -> Result<Node> {
    let relative_offset_bytes = field.offset_bits / 8;
    let absolute_offset_bytes = abs_parent_offset_bytes + relative_offset_bytes;

    if detect_bitfield(field, state) {
        let underlying = stabs_type_to_ast(
            &field.ty,
            state,
            absolute_offset_bytes,
            depth + 1,
            recursion_depth + 1,
            true,
            false,
        )?;
        let mut node = Node::new(NodeKind::BitField(ast::BitField {
            underlying_type: Box::new(underlying),
            bitfield_offset_bits: field.offset_bits % 8,
        }));
        node.name = if field.name == " " {
            String::new()
        } else {
            field.name.clone()
        };
        node.relative_offset_bytes = relative_offset_bytes;
        node.absolute_offset_bytes = absolute_offset_bytes;
        node.size_bits = field.size_bits;
        node.access_specifier = visibility_to_access_specifier(field.visibility);
        return Ok(node);
    }

    let mut node = stabs_type_to_ast(
        &field.ty,
        state,
        absolute_offset_bytes,
        depth + 1,
        recursion_depth + 1,
        true,
        false,
    )?;
    node.name = field.name.clone();
    node.relative_offset_bytes = relative_offset_bytes;
    node.absolute_offset_bytes = absolute_offset_bytes;
    node.size_bits = field.size_bits;
    node.access_specifier = visibility_to_access_specifier(field.visibility);

    if field.name.starts_with("$vf")
        || field.name.starts_with("_vptr$")
        || field.name.starts_with("_vptr.")
    {
        node.is_vtable_pointer = true;
    }

    if field.is_static {
        node.storage_class = StorageClass::Static;
    }

    Ok(node)
}

/// Bit-fields are not marked as such in the format; they are detected by the
/// field's size not matching the size of its underlying type.
fn detect_bitfield(field: &StabsField, state: &StabsToAstState) -> bool {
    // Static fields can't be bitfields.
    if field.is_static {
        return false;
    }

    // Resolve type references.
    let mut ty = &field.ty;
    for _ in 0..50 {
        match &ty.body {
            None => {
                if ty.anonymous {
                    return false;
                }
                match state.stabs_types.get(&ty.number) {
                    Some(&next) if !std::ptr::eq(next, ty) => ty = next,
                    _ => return false,
                }
            }
            Some(StabsTypeBody::TypeReference(inner)) => {
                if !inner.anonymous && inner.number == ty.number {
                    return false;
                }
                ty = inner;
            }
            Some(StabsTypeBody::ConstQualifier(inner)) => ty = inner,
            Some(StabsTypeBody::VolatileQualifier(inner)) => ty = inner,
            _ => break,
        }
    }

    // Determine the size of the underlying type.
    let underlying_type_size_bits = match &ty.body {
        Some(StabsTypeBody::Range { low, high, .. }) => match classify_range(low, high) {
            Ok(bclass) => ast::builtin_class_size(bclass) * 8,
            Err(_) => return false,
        },
        Some(StabsTypeBody::CrossReference { kind, .. }) => {
            if *kind == ast::ForwardDeclaredKind::Enum {
                32
            } else {
                return false;
            }
        }
        Some(StabsTypeBody::SizeAttribute { size_bits, .. }) => *size_bits as i32,
        Some(StabsTypeBody::Builtin(_)) => 8,
        _ => return false,
    };

    if underlying_type_size_bits == 0 {
        return false;
    }

    field.size_bits != underlying_type_size_bits
}

fn member_functions_to_ast(
    member_functions: &[StabsMemberFunctionSet],
    type_name: Option<&str>,
    state: &StabsToAstState,
    abs_parent_offset_bytes: i32,
    depth: i32,
    recursion_depth: i32,
) -> Result<Vec<Node>> {
    let type_name_no_template_args =
        type_name.map(|name| name.split('<').next().unwrap_or(name).to_string());

    let mut nodes = Vec::new();
    for function_set in member_functions {
        for overload in &function_set.overloads {
            let mut node = stabs_type_to_ast(
                &overload.ty,
                state,
                abs_parent_offset_bytes,
                depth + 1,
                recursion_depth + 1,
                true,
                true,
            )?;
            // Old compilers wrote out the assignment operator as __as.
            if function_set.name == "__as" {
                node.name = "operator=".to_string();
            } else {
                node.name = function_set.name.clone();
            }
            if let NodeKind::FunctionType(function) = &mut node.kind {
                function.modifier = overload.modifier;
                function.is_constructor = false;
                if let Some(type_name) = type_name {
                    function.is_constructor |= function_set.name == type_name;
                }
                if let Some(no_template_args) = &type_name_no_template_args {
                    function.is_constructor |= &function_set.name == no_template_args;
                }
                if let Some(vtable_index) = overload.vtable_index {
                    function.vtable_index = vtable_index;
                }
            }
            node.is_const = overload.is_const;
            node.is_volatile = overload.is_volatile;
            node.access_specifier = visibility_to_access_specifier(overload.visibility);
            nodes.push(node);
        }
    }

    Ok(nodes)
}

pub fn visibility_to_access_specifier(visibility: StabsFieldVisibility) -> AccessSpecifier {
    match visibility {
        StabsFieldVisibility::None => AccessSpecifier::Public,
        StabsFieldVisibility::Public => AccessSpecifier::Public,
        StabsFieldVisibility::Protected => AccessSpecifier::Protected,
        StabsFieldVisibility::Private => AccessSpecifier::Private,
        StabsFieldVisibility::PublicOptimizedOut => AccessSpecifier::Public,
    }
}

/// Classifies an integral or floating point range type.
///
/// The tables below are observed compiler outputs, including octal sentinels
/// and values too big to store in 64 bits; they are matched textually rather
/// than extrapolated from.
fn classify_range(low: &str, high: &str) -> Result<BuiltInClass> {
    const STRINGS: &[(&str, &str, BuiltInClass)] = &[
        ("4", "0", BuiltInClass::Float32),
        (
            "000000000000000000000000",
            "001777777777777777777777",
            BuiltInClass::Unsigned64,
        ),
        (
            "00000000000000000000000000000000000000000000",
            "00000000000000000000001777777777777777777777",
            BuiltInClass::Unsigned64,
        ),
        // IOP
        ("0000000000000", "01777777777777777777777", BuiltInClass::Unsigned64),
        ("0", "18446744073709551615", BuiltInClass::Unsigned64),
        (
            "001000000000000000000000",
            "000777777777777777777777",
            BuiltInClass::Signed64,
        ),
        (
            "00000000000000000000001000000000000000000000",
            "00000000000000000000000777777777777777777777",
            BuiltInClass::Signed64,
        ),
        // IOP
        ("01000000000000000000000", "0777777777777777777777", BuiltInClass::Signed64),
        ("-9223372036854775808", "9223372036854775807", BuiltInClass::Signed64),
        ("8", "0", BuiltInClass::Float64),
        (
            "00000000000000000000000000000000000000000000",
            "03777777777777777777777777777777777777777777",
            BuiltInClass::Unsigned128,
        ),
        (
            "02000000000000000000000000000000000000000000",
            "01777777777777777777777777777777777777777777",
            BuiltInClass::Signed128,
        ),
        (
            "000000000000000000000000",
            "0377777777777777777777777777777777",
            BuiltInClass::Unqualified128,
        ),
        ("16", "0", BuiltInClass::Float128),
        // Old homebrew toolchain
        ("0", "-1", BuiltInClass::Unqualified128),
    ];

    for &(low_string, high_string, bclass) in STRINGS {
        if low == low_string && high == high_string {
            return Ok(bclass);
        }
    }

    // For smaller values the bounds are parsed as integers, octal if there is
    // a leading zero.
    let low_value = parse_range_bound(low)
        .ok_or_else(|| Error::Fatal("failed to parse low part of range".to_string()))?;
    let high_value = parse_range_bound(high)
        .ok_or_else(|| Error::Fatal("failed to parse high part of range".to_string()))?;

    const INTEGERS: &[(i64, i64, BuiltInClass)] = &[
        (0, 255, BuiltInClass::Unsigned8),
        (-128, 127, BuiltInClass::Signed8),
        (0, 127, BuiltInClass::Unqualified8),
        (0, 65535, BuiltInClass::Unsigned16),
        (-32768, 32767, BuiltInClass::Signed16),
        (0, 4294967295, BuiltInClass::Unsigned32),
        (-2147483648, 2147483647, BuiltInClass::Signed32),
    ];

    for &(low_bound, high_bound, bclass) in INTEGERS {
        // Some compilers emit the magnitude of the lower bound instead of the
        // bound itself.
        if (low_bound == low_value || low_bound == -low_value) && high_bound == high_value {
            return Ok(bclass);
        }
    }

    Err(Error::Fatal(format!("failed to classify range {low}..{high}")))
}

fn parse_range_bound(bound: &str) -> Option<i64> {
    let (negative, digits) = match bound.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, bound),
    };
    let radix = if digits.starts_with('0') && digits.len() > 1 {
        8
    } else {
        10
    };
    let value = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Cursor;
    use crate::stabs::parse_stabs_symbol;

    fn symbol(input: &str) -> StabsSymbol {
        let mut cursor = Cursor::new(input);
        parse_stabs_symbol(&mut cursor).expect(input)
    }

    fn translate(inputs: &[&str]) -> Vec<Node> {
        let symbols: Vec<StabsSymbol> = inputs.iter().map(|&input| symbol(input)).collect();
        let mut stabs_types = BTreeMap::new();
        for symbol in &symbols {
            symbol.ty.enumerate_numbered_types(&mut stabs_types);
        }
        let state = StabsToAstState {
            file_handle: 0,
            stabs_types: &stabs_types,
            flags: 0,
        };
        symbols
            .iter()
            .map(|symbol| stabs_data_type_symbol_to_ast(symbol, &state).unwrap())
            .collect()
    }

    #[test]
    fn int_range_is_classified() {
        assert_eq!(
            classify_range("-2147483648", "2147483647").unwrap(),
            BuiltInClass::Signed32
        );
        assert_eq!(classify_range("4", "0").unwrap(), BuiltInClass::Float32);
        assert_eq!(
            classify_range("0000000000000", "01777777777777777777777").unwrap(),
            BuiltInClass::Unsigned64
        );
        assert!(classify_range("17", "23").is_err());
    }

    #[test]
    fn plain_enum_is_not_a_typedef() {
        let nodes = translate(&["Enum:t(1,1)=eA:0,B:1,;"]);
        assert_eq!(nodes[0].storage_class, StorageClass::None);
        assert!(matches!(nodes[0].kind, NodeKind::Enum(_)));
    }

    #[test]
    fn typedefed_struct_is_a_typedef() {
        let nodes = translate(&["TypedefedStruct:t(1,1)=s4a:(1,2)=r(1,2);0;255;,0,8;;"]);
        assert_eq!(nodes[0].storage_class, StorageClass::Typedef);
        assert!(matches!(nodes[0].kind, NodeKind::StructOrUnion(_)));
    }

    #[test]
    fn typedef_by_reference_resolves_to_the_definition() {
        let nodes = translate(&["Enum:t(1,1)=eA:0,;", "Enum:t(1,2)=(1,1)"]);
        assert_eq!(nodes[1].storage_class, StorageClass::Typedef);
        assert!(matches!(nodes[1].kind, NodeKind::Enum(_)));
    }

    #[test]
    fn named_field_types_are_substituted() {
        let nodes = translate(&[
            "Inner:T(1,1)=s4x:(1,3)=r(1,3);-2147483648;2147483647;,0,32;;",
            "Outer:T(1,2)=s4inner:(1,1),0,32;;",
        ]);
        let NodeKind::StructOrUnion(outer) = &nodes[1].kind else {
            panic!("expected struct");
        };
        let NodeKind::TypeName(field_type) = &outer.fields[0].kind else {
            panic!("expected type name, got {:?}", outer.fields[0].kind);
        };
        assert_eq!(field_type.type_name, "Inner");
    }

    #[test]
    fn bitfields_are_detected() {
        let nodes = translate(&[
            "Flags:T(1,1)=s4a:(1,2)=r(1,2);-2147483648;2147483647;,0,3;b:(1,2),3,5;c:(1,2),8,32;;",
        ]);
        let NodeKind::StructOrUnion(flags) = &nodes[0].kind else {
            panic!("expected struct");
        };
        assert!(matches!(flags.fields[0].kind, NodeKind::BitField(_)));
        assert_eq!(flags.fields[0].size_bits, 3);
        let NodeKind::BitField(second) = &flags.fields[1].kind else {
            panic!("expected bitfield");
        };
        assert_eq!(second.bitfield_offset_bits, 3);
        // A full-width field is not a bitfield.
        assert!(!matches!(flags.fields[2].kind, NodeKind::BitField(_)));
    }

    #[test]
    fn failed_lookups_produce_an_error_marker() {
        let nodes = translate(&["Broken:t(1,1)=*(7,7)"]);
        let NodeKind::PointerOrReference(pointer) = &nodes[0].kind else {
            panic!("expected pointer");
        };
        let NodeKind::TypeName(pointee) = &pointer.value_type.kind else {
            panic!("expected type name");
        };
        assert_eq!(pointee.type_name, "CCC_BADTYPELOOKUP(7,7)");
        assert_eq!(pointee.source, TypeNameSource::Error);
    }

    #[test]
    fn reference_cycles_hit_the_recursion_limit() {
        let nodes = translate(&["A:t(1,1)=(1,2)=(1,1)"]);
        let NodeKind::TypeName(marker) = &nodes[0].kind else {
            panic!("expected type name, got {:?}", nodes[0].kind);
        };
        assert_eq!(marker.type_name, "CCC_BADRECURSION");
    }

    #[test]
    fn void_is_a_reference_to_itself() {
        let nodes = translate(&["void:t(0,23)=(0,23)"]);
        let NodeKind::TypeName(type_name) = &nodes[0].kind else {
            panic!("expected type name");
        };
        assert_eq!(type_name.type_name, "void");
    }
}
