//! The abstract syntax tree that parsed STABS types are translated into.
//!
//! Nodes own their children exclusively. Variables, functions and source
//! files are not AST nodes; they live in the symbol database and carry a type
//! node each.

use crate::stabs::StabsTypeNumber;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageClass {
    #[default]
    None,
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessSpecifier {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemberFunctionModifier {
    #[default]
    None,
    Static,
    Virtual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardDeclaredKind {
    Enum,
    Struct,
    Union,
}

/// Where a type name node came from. Error markers get a warning comment in
/// the printed output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeNameSource {
    Reference,
    CrossReference,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuiltInClass {
    Void,
    Unsigned8,
    Signed8,
    Unqualified8,
    Bool8,
    Unsigned16,
    Signed16,
    Unsigned32,
    Signed32,
    Float32,
    Unsigned64,
    Signed64,
    Float64,
    Unsigned128,
    Signed128,
    Unqualified128,
    Float128,
}

pub fn builtin_class_size(bclass: BuiltInClass) -> i32 {
    match bclass {
        BuiltInClass::Void => 0,
        BuiltInClass::Unsigned8 | BuiltInClass::Signed8 | BuiltInClass::Unqualified8 => 1,
        BuiltInClass::Bool8 => 1,
        BuiltInClass::Unsigned16 | BuiltInClass::Signed16 => 2,
        BuiltInClass::Unsigned32 | BuiltInClass::Signed32 | BuiltInClass::Float32 => 4,
        BuiltInClass::Unsigned64 | BuiltInClass::Signed64 | BuiltInClass::Float64 => 8,
        BuiltInClass::Unsigned128
        | BuiltInClass::Signed128
        | BuiltInClass::Unqualified128
        | BuiltInClass::Float128 => 16,
    }
}

pub fn builtin_class_to_string(bclass: BuiltInClass) -> &'static str {
    match bclass {
        BuiltInClass::Void => "void",
        BuiltInClass::Unsigned8 => "8-bit unsigned integer",
        BuiltInClass::Signed8 => "8-bit signed integer",
        BuiltInClass::Unqualified8 => "8-bit integer",
        BuiltInClass::Bool8 => "8-bit boolean",
        BuiltInClass::Unsigned16 => "16-bit unsigned integer",
        BuiltInClass::Signed16 => "16-bit signed integer",
        BuiltInClass::Unsigned32 => "32-bit unsigned integer",
        BuiltInClass::Signed32 => "32-bit signed integer",
        BuiltInClass::Float32 => "32-bit floating point",
        BuiltInClass::Unsigned64 => "64-bit unsigned integer",
        BuiltInClass::Signed64 => "64-bit signed integer",
        BuiltInClass::Float64 => "64-bit floating point",
        BuiltInClass::Unsigned128 => "128-bit unsigned integer",
        BuiltInClass::Signed128 => "128-bit signed integer",
        BuiltInClass::Unqualified128 => "128-bit integer",
        BuiltInClass::Float128 => "128-bit floating point",
    }
}

/// A single AST node plus the annotations shared by all node kinds.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub storage_class: StorageClass,
    pub relative_offset_bytes: i32,
    pub absolute_offset_bytes: i32,
    pub size_bits: i32,
    pub computed_size_bytes: i32,
    pub access_specifier: AccessSpecifier,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_base_class: bool,
    pub is_vtable_pointer: bool,
    pub stabs_type_number: StabsTypeNumber,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Node {
        Node {
            name: String::new(),
            storage_class: StorageClass::None,
            relative_offset_bytes: -1,
            absolute_offset_bytes: -1,
            size_bits: -1,
            computed_size_bytes: -1,
            access_specifier: AccessSpecifier::Public,
            is_const: false,
            is_volatile: false,
            is_base_class: false,
            is_vtable_pointer: false,
            stabs_type_number: StabsTypeNumber::default(),
            kind,
        }
    }

    pub fn descriptor(&self) -> NodeDescriptor {
        match &self.kind {
            NodeKind::Array(_) => NodeDescriptor::Array,
            NodeKind::BitField(_) => NodeDescriptor::BitField,
            NodeKind::BuiltIn(_) => NodeDescriptor::BuiltIn,
            NodeKind::Data(_) => NodeDescriptor::Data,
            NodeKind::Enum(_) => NodeDescriptor::Enum,
            NodeKind::FunctionType(_) => NodeDescriptor::FunctionType,
            NodeKind::InitializerList(_) => NodeDescriptor::InitializerList,
            NodeKind::PointerOrReference(_) => NodeDescriptor::PointerOrReference,
            NodeKind::PointerToDataMember(_) => NodeDescriptor::PointerToDataMember,
            NodeKind::StructOrUnion(_) => NodeDescriptor::StructOrUnion,
            NodeKind::TypeName(_) => NodeDescriptor::TypeName,
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = Vec::new();
        match &self.kind {
            NodeKind::Array(array) => children.push(&array.element_type),
            NodeKind::BitField(bitfield) => children.push(&bitfield.underlying_type),
            NodeKind::BuiltIn(_) | NodeKind::Data(_) | NodeKind::Enum(_) => {}
            NodeKind::FunctionType(function) => {
                if let Some(return_type) = &function.return_type {
                    children.push(return_type);
                }
                if let Some(parameters) = &function.parameters {
                    children.extend(parameters.iter());
                }
            }
            NodeKind::InitializerList(list) => children.extend(list.children.iter()),
            NodeKind::PointerOrReference(pointer) => children.push(&pointer.value_type),
            NodeKind::PointerToDataMember(pointer) => {
                children.push(&pointer.class_type);
                children.push(&pointer.member_type);
            }
            NodeKind::StructOrUnion(struct_or_union) => {
                children.extend(struct_or_union.base_classes.iter());
                children.extend(struct_or_union.fields.iter());
                children.extend(struct_or_union.member_functions.iter());
            }
            NodeKind::TypeName(_) => {}
        }
        children
    }

    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        let mut children: Vec<&mut Node> = Vec::new();
        match &mut self.kind {
            NodeKind::Array(array) => children.push(&mut array.element_type),
            NodeKind::BitField(bitfield) => children.push(&mut bitfield.underlying_type),
            NodeKind::BuiltIn(_) | NodeKind::Data(_) | NodeKind::Enum(_) => {}
            NodeKind::FunctionType(function) => {
                if let Some(return_type) = &mut function.return_type {
                    children.push(return_type);
                }
                if let Some(parameters) = &mut function.parameters {
                    children.extend(parameters.iter_mut());
                }
            }
            NodeKind::InitializerList(list) => children.extend(list.children.iter_mut()),
            NodeKind::PointerOrReference(pointer) => children.push(&mut pointer.value_type),
            NodeKind::PointerToDataMember(pointer) => {
                children.push(&mut pointer.class_type);
                children.push(&mut pointer.member_type);
            }
            NodeKind::StructOrUnion(struct_or_union) => {
                children.extend(struct_or_union.base_classes.iter_mut());
                children.extend(struct_or_union.fields.iter_mut());
                children.extend(struct_or_union.member_functions.iter_mut());
            }
            NodeKind::TypeName(_) => {}
        }
        children
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeDescriptor {
    Array,
    BitField,
    BuiltIn,
    Data,
    Enum,
    FunctionType,
    InitializerList,
    PointerOrReference,
    PointerToDataMember,
    StructOrUnion,
    TypeName,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Array(Array),
    BitField(BitField),
    BuiltIn(BuiltIn),
    Data(Data),
    Enum(Enum),
    FunctionType(FunctionType),
    InitializerList(InitializerList),
    PointerOrReference(PointerOrReference),
    PointerToDataMember(PointerToDataMember),
    StructOrUnion(StructOrUnion),
    TypeName(TypeName),
}

#[derive(Clone, Debug)]
pub struct Array {
    pub element_type: Box<Node>,
    pub element_count: i32,
}

#[derive(Clone, Debug)]
pub struct BitField {
    pub underlying_type: Box<Node>,
    pub bitfield_offset_bits: i32,
}

#[derive(Clone, Debug)]
pub struct BuiltIn {
    pub bclass: BuiltInClass,
}

/// A refined value recovered from the data sections, printed verbatim.
#[derive(Clone, Debug)]
pub struct Data {
    pub string: String,
    pub field_name: String,
}

#[derive(Clone, Debug)]
pub struct Enum {
    pub constants: Vec<(i32, String)>,
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub return_type: Option<Box<Node>>,
    pub parameters: Option<Vec<Node>>,
    pub modifier: MemberFunctionModifier,
    pub vtable_index: i32,
    pub is_constructor: bool,
    /// Handle value of the function symbol defining this member function, if
    /// one was matched up.
    pub definition_handle: Option<u32>,
}

impl Default for FunctionType {
    fn default() -> FunctionType {
        FunctionType {
            return_type: None,
            parameters: None,
            modifier: MemberFunctionModifier::None,
            vtable_index: -1,
            is_constructor: false,
            definition_handle: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct InitializerList {
    pub children: Vec<Node>,
    pub field_name: String,
}

#[derive(Clone, Debug)]
pub struct PointerOrReference {
    pub is_pointer: bool,
    pub value_type: Box<Node>,
}

#[derive(Clone, Debug)]
pub struct PointerToDataMember {
    pub class_type: Box<Node>,
    pub member_type: Box<Node>,
}

#[derive(Clone, Debug)]
pub struct StructOrUnion {
    pub is_struct: bool,
    pub base_classes: Vec<Node>,
    pub fields: Vec<Node>,
    pub member_functions: Vec<Node>,
}

#[derive(Clone, Debug)]
pub struct TypeName {
    pub source: TypeNameSource,
    pub type_name: String,
    /// The source file whose type table the type number below refers to.
    pub referenced_file_handle: Option<u32>,
    pub referenced_stabs_type_number: StabsTypeNumber,
    pub forward_declared_kind: Option<ForwardDeclaredKind>,
}

impl TypeName {
    pub fn reference(type_name: impl Into<String>) -> TypeName {
        TypeName {
            source: TypeNameSource::Reference,
            type_name: type_name.into(),
            referenced_file_handle: None,
            referenced_stabs_type_number: StabsTypeNumber::default(),
            forward_declared_kind: None,
        }
    }
}

/// The first attribute found to differ between two compared nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareFailReason {
    Descriptor,
    StorageClass,
    Name,
    RelativeOffsetBytes,
    AbsoluteOffsetBytes,
    BitfieldOffsetBits,
    SizeBits,
    Constness,
    ArrayElementCount,
    BuiltinClass,
    FunctionReturnType,
    FunctionParameterCount,
    FunctionParameters,
    FunctionModifier,
    FunctionIsConstructor,
    EnumConstants,
    BaseClassCount,
    FieldsSize,
    MemberFunctionCount,
    TypeName,
}

pub fn compare_fail_reason_to_string(reason: CompareFailReason) -> &'static str {
    match reason {
        CompareFailReason::Descriptor => "descriptor",
        CompareFailReason::StorageClass => "storage class",
        CompareFailReason::Name => "name",
        CompareFailReason::RelativeOffsetBytes => "relative offset",
        CompareFailReason::AbsoluteOffsetBytes => "absolute offset",
        CompareFailReason::BitfieldOffsetBits => "bitfield offset",
        CompareFailReason::SizeBits => "size",
        CompareFailReason::Constness => "constness",
        CompareFailReason::ArrayElementCount => "array element count",
        CompareFailReason::BuiltinClass => "builtin class",
        CompareFailReason::FunctionReturnType => "function return type",
        CompareFailReason::FunctionParameterCount => "function parameter count",
        CompareFailReason::FunctionParameters => "function parameter",
        CompareFailReason::FunctionModifier => "function modifier",
        CompareFailReason::FunctionIsConstructor => "function is constructor",
        CompareFailReason::EnumConstants => "enum constant",
        CompareFailReason::BaseClassCount => "base class count",
        CompareFailReason::FieldsSize => "fields size",
        CompareFailReason::MemberFunctionCount => "member function count",
        CompareFailReason::TypeName => "type name",
    }
}

/// Structurally compares two nodes, returning the first differing attribute,
/// or `None` if the nodes match.
///
/// Comparison is lexical over the tree: children are compared in order and
/// the walk short-circuits on the first mismatch. Files, conflict flags and
/// fail reasons are intentionally not compared; neither are the STABS type
/// numbers, which vary between translation units by construction.
pub fn compare_nodes(
    lhs: &Node,
    rhs: &Node,
    check_intrusive_fields: bool,
) -> Option<CompareFailReason> {
    if lhs.descriptor() != rhs.descriptor() {
        return Some(CompareFailReason::Descriptor);
    }
    if check_intrusive_fields {
        if lhs.storage_class != rhs.storage_class {
            return Some(CompareFailReason::StorageClass);
        }
        if lhs.name != rhs.name {
            return Some(CompareFailReason::Name);
        }
        if lhs.relative_offset_bytes != rhs.relative_offset_bytes {
            return Some(CompareFailReason::RelativeOffsetBytes);
        }
        if lhs.absolute_offset_bytes != rhs.absolute_offset_bytes {
            return Some(CompareFailReason::AbsoluteOffsetBytes);
        }
        if lhs.size_bits != rhs.size_bits {
            return Some(CompareFailReason::SizeBits);
        }
        if lhs.is_const != rhs.is_const {
            return Some(CompareFailReason::Constness);
        }
    }
    match (&lhs.kind, &rhs.kind) {
        (NodeKind::Array(lhs), NodeKind::Array(rhs)) => {
            if let Some(reason) = compare_nodes(&lhs.element_type, &rhs.element_type, true) {
                return Some(reason);
            }
            if lhs.element_count != rhs.element_count {
                return Some(CompareFailReason::ArrayElementCount);
            }
        }
        (NodeKind::BitField(lhs), NodeKind::BitField(rhs)) => {
            if lhs.bitfield_offset_bits != rhs.bitfield_offset_bits {
                return Some(CompareFailReason::BitfieldOffsetBits);
            }
            if let Some(reason) = compare_nodes(&lhs.underlying_type, &rhs.underlying_type, true) {
                return Some(reason);
            }
        }
        (NodeKind::BuiltIn(lhs), NodeKind::BuiltIn(rhs)) => {
            if lhs.bclass != rhs.bclass {
                return Some(CompareFailReason::BuiltinClass);
            }
        }
        (NodeKind::Data(_), NodeKind::Data(_))
        | (NodeKind::InitializerList(_), NodeKind::InitializerList(_)) => {
            unreachable!("data nodes are never compared");
        }
        (NodeKind::Enum(lhs), NodeKind::Enum(rhs)) => {
            if lhs.constants != rhs.constants {
                return Some(CompareFailReason::EnumConstants);
            }
        }
        (NodeKind::FunctionType(lhs), NodeKind::FunctionType(rhs)) => {
            match (&lhs.return_type, &rhs.return_type) {
                (Some(lhs_return), Some(rhs_return)) => {
                    if let Some(reason) = compare_nodes(lhs_return, rhs_return, true) {
                        return Some(reason);
                    }
                }
                (None, None) => {}
                _ => return Some(CompareFailReason::FunctionReturnType),
            }
            match (&lhs.parameters, &rhs.parameters) {
                (Some(lhs_parameters), Some(rhs_parameters)) => {
                    if lhs_parameters.len() != rhs_parameters.len() {
                        return Some(CompareFailReason::FunctionParameterCount);
                    }
                    for (lhs_parameter, rhs_parameter) in
                        lhs_parameters.iter().zip(rhs_parameters.iter())
                    {
                        if let Some(reason) = compare_nodes(lhs_parameter, rhs_parameter, true) {
                            return Some(reason);
                        }
                    }
                }
                (None, None) => {}
                _ => return Some(CompareFailReason::FunctionParameters),
            }
            if lhs.modifier != rhs.modifier {
                return Some(CompareFailReason::FunctionModifier);
            }
            if lhs.is_constructor != rhs.is_constructor {
                return Some(CompareFailReason::FunctionIsConstructor);
            }
        }
        (NodeKind::PointerOrReference(lhs), NodeKind::PointerOrReference(rhs)) => {
            if lhs.is_pointer != rhs.is_pointer {
                return Some(CompareFailReason::Descriptor);
            }
            if let Some(reason) = compare_nodes(&lhs.value_type, &rhs.value_type, true) {
                return Some(reason);
            }
        }
        (NodeKind::PointerToDataMember(lhs), NodeKind::PointerToDataMember(rhs)) => {
            if let Some(reason) = compare_nodes(&lhs.class_type, &rhs.class_type, true) {
                return Some(reason);
            }
            if let Some(reason) = compare_nodes(&lhs.member_type, &rhs.member_type, true) {
                return Some(reason);
            }
        }
        (NodeKind::StructOrUnion(lhs), NodeKind::StructOrUnion(rhs)) => {
            if lhs.is_struct != rhs.is_struct {
                return Some(CompareFailReason::Descriptor);
            }
            if lhs.base_classes.len() != rhs.base_classes.len() {
                return Some(CompareFailReason::BaseClassCount);
            }
            for (lhs_base, rhs_base) in lhs.base_classes.iter().zip(rhs.base_classes.iter()) {
                if let Some(reason) = compare_nodes(lhs_base, rhs_base, true) {
                    return Some(reason);
                }
            }
            if lhs.fields.len() != rhs.fields.len() {
                return Some(CompareFailReason::FieldsSize);
            }
            for (lhs_field, rhs_field) in lhs.fields.iter().zip(rhs.fields.iter()) {
                if let Some(reason) = compare_nodes(lhs_field, rhs_field, true) {
                    return Some(reason);
                }
            }
            if lhs.member_functions.len() != rhs.member_functions.len() {
                return Some(CompareFailReason::MemberFunctionCount);
            }
            for (lhs_function, rhs_function) in
                lhs.member_functions.iter().zip(rhs.member_functions.iter())
            {
                if let Some(reason) = compare_nodes(lhs_function, rhs_function, true) {
                    return Some(reason);
                }
            }
        }
        (NodeKind::TypeName(lhs), NodeKind::TypeName(rhs)) => {
            // The source is not compared so that references and cross
            // references to the same type are treated as equal. Neither are
            // the file handle and type number, which differ between
            // translation units for matching types.
            if lhs.type_name != rhs.type_name {
                return Some(CompareFailReason::TypeName);
            }
        }
        _ => unreachable!("descriptors already compared"),
    }
    None
}

pub fn node_type_to_string(node: &Node) -> &'static str {
    match &node.kind {
        NodeKind::Array(_) => "array",
        NodeKind::BitField(_) => "bitfield",
        NodeKind::BuiltIn(_) => "builtin",
        NodeKind::Data(_) => "data",
        NodeKind::Enum(_) => "enum",
        NodeKind::FunctionType(_) => "function_type",
        NodeKind::InitializerList(_) => "initializer_list",
        NodeKind::PointerOrReference(pointer_or_reference) => {
            if pointer_or_reference.is_pointer {
                "pointer"
            } else {
                "reference"
            }
        }
        NodeKind::PointerToDataMember(_) => "pointer_to_data_member",
        NodeKind::StructOrUnion(struct_or_union) => {
            if struct_or_union.is_struct {
                "struct"
            } else {
                "union"
            }
        }
        NodeKind::TypeName(_) => "type_name",
    }
}

pub fn storage_class_to_string(storage_class: StorageClass) -> &'static str {
    match storage_class {
        StorageClass::None => "none",
        StorageClass::Typedef => "typedef",
        StorageClass::Extern => "extern",
        StorageClass::Static => "static",
        StorageClass::Auto => "auto",
        StorageClass::Register => "register",
    }
}

pub fn access_specifier_to_string(specifier: AccessSpecifier) -> &'static str {
    match specifier {
        AccessSpecifier::Public => "public",
        AccessSpecifier::Protected => "protected",
        AccessSpecifier::Private => "private",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(bclass: BuiltInClass) -> Node {
        Node::new(NodeKind::BuiltIn(BuiltIn { bclass }))
    }

    #[test]
    fn comparison_is_reflexive() {
        let node = builtin(BuiltInClass::Signed32);
        assert_eq!(compare_nodes(&node, &node, true), None);
    }

    #[test]
    fn comparison_is_symmetric() {
        let lhs = builtin(BuiltInClass::Signed32);
        let rhs = builtin(BuiltInClass::Unsigned32);
        assert_eq!(
            compare_nodes(&lhs, &rhs, true),
            Some(CompareFailReason::BuiltinClass)
        );
        assert_eq!(
            compare_nodes(&rhs, &lhs, true),
            Some(CompareFailReason::BuiltinClass)
        );
    }

    #[test]
    fn first_differing_attribute_is_reported() {
        let mut lhs = builtin(BuiltInClass::Signed32);
        let mut rhs = builtin(BuiltInClass::Unsigned32);
        lhs.name = "a".to_string();
        rhs.name = "b".to_string();
        // The name differs before the builtin class is ever looked at.
        assert_eq!(
            compare_nodes(&lhs, &rhs, true),
            Some(CompareFailReason::Name)
        );
        assert_eq!(compare_nodes(&lhs, &rhs, false), {
            Some(CompareFailReason::BuiltinClass)
        });
    }

    #[test]
    fn nested_field_mismatch_is_found() {
        let make = |count| {
            let mut field = builtin(BuiltInClass::Signed16);
            field.name = "x".to_string();
            let mut array = Node::new(NodeKind::Array(Array {
                element_type: Box::new(field),
                element_count: count,
            }));
            array.name = "xs".to_string();
            Node::new(NodeKind::StructOrUnion(StructOrUnion {
                is_struct: true,
                base_classes: Vec::new(),
                fields: vec![array],
                member_functions: Vec::new(),
            }))
        };
        assert_eq!(compare_nodes(&make(4), &make(4), true), None);
        assert_eq!(
            compare_nodes(&make(4), &make(5), true),
            Some(CompareFailReason::ArrayElementCount)
        );
    }
}
