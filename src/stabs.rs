//! Parser for the STABS micro-language.
//!
//! Each symbol string has the form `name:descriptor<type-tree>[,...]` where
//! the type tree is a densely encoded grammar of single-character type
//! descriptors. Parsing one symbol produces a [`StabsSymbol`] owning a fully
//! structured [`StabsType`] tree; references to other types by number are
//! left unresolved here and looked up during AST translation.

use std::collections::BTreeMap;

use crate::ast::{ForwardDeclaredKind, MemberFunctionModifier};
use crate::error::{Error, Result};
use crate::lexer::Cursor;

/// Identifies a type within a translation unit.
///
/// Older toolchains emit a single integer (`file` stays -1), newer ones a
/// `(file,index)` pair where `file` is an include file index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StabsTypeNumber {
    pub file: i32,
    pub index: i32,
}

impl Default for StabsTypeNumber {
    fn default() -> StabsTypeNumber {
        StabsTypeNumber { file: -1, index: -1 }
    }
}

impl StabsTypeNumber {
    pub fn valid(&self) -> bool {
        self.index > -1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabsSymbolDescriptor {
    LocalVariable,
    ReferenceParameterA,
    LocalFunction,
    GlobalFunction,
    GlobalVariable,
    RegisterParameter,
    ValueParameter,
    RegisterVariable,
    StaticGlobalVariable,
    TypeName,
    EnumStructOrTypeTag,
    StaticLocalVariable,
    ReferenceParameterV,
}

impl StabsSymbolDescriptor {
    fn from_char(c: char) -> Result<StabsSymbolDescriptor> {
        Ok(match c {
            'a' => StabsSymbolDescriptor::ReferenceParameterA,
            'f' => StabsSymbolDescriptor::LocalFunction,
            'F' => StabsSymbolDescriptor::GlobalFunction,
            'G' => StabsSymbolDescriptor::GlobalVariable,
            'P' => StabsSymbolDescriptor::RegisterParameter,
            'p' => StabsSymbolDescriptor::ValueParameter,
            'r' => StabsSymbolDescriptor::RegisterVariable,
            'S' => StabsSymbolDescriptor::StaticGlobalVariable,
            't' => StabsSymbolDescriptor::TypeName,
            'T' => StabsSymbolDescriptor::EnumStructOrTypeTag,
            'V' => StabsSymbolDescriptor::StaticLocalVariable,
            'v' => StabsSymbolDescriptor::ReferenceParameterV,
            _ => return Err(Error::InvalidDescriptor(c)),
        })
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self,
            StabsSymbolDescriptor::LocalFunction | StabsSymbolDescriptor::GlobalFunction
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabsFieldVisibility {
    None,
    Private,
    Protected,
    Public,
    PublicOptimizedOut,
}

impl StabsFieldVisibility {
    fn from_char(c: char) -> Result<StabsFieldVisibility> {
        Ok(match c {
            '\0' => StabsFieldVisibility::None,
            '0' => StabsFieldVisibility::Private,
            '1' => StabsFieldVisibility::Protected,
            '2' => StabsFieldVisibility::Public,
            '9' => StabsFieldVisibility::PublicOptimizedOut,
            _ => return Err(Error::InvalidVisibility(c)),
        })
    }
}

/// A single type tree node.
///
/// For example in `123=*456`, 123 is the type number, the body is a pointer,
/// and the pointee is a body-less reference to type number 456.
#[derive(Clone, Debug, Default)]
pub struct StabsType {
    /// Only populated for type tags and cross references.
    pub name: Option<String>,
    pub anonymous: bool,
    pub number: StabsTypeNumber,
    pub is_typedef: bool,
    pub is_root: bool,
    /// `None` means the type is only a reference by number and its definition
    /// has to be looked up in the per-translation-unit type table.
    pub body: Option<StabsTypeBody>,
}

impl StabsType {
    fn with_info(anonymous: bool, number: StabsTypeNumber) -> StabsType {
        StabsType {
            anonymous,
            number,
            ..Default::default()
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Direct children of this node, in source order.
    pub fn children(&self) -> Vec<&StabsType> {
        let mut children = Vec::new();
        match &self.body {
            None => {}
            Some(StabsTypeBody::TypeReference(inner))
            | Some(StabsTypeBody::VolatileQualifier(inner))
            | Some(StabsTypeBody::ConstQualifier(inner))
            | Some(StabsTypeBody::Pointer(inner))
            | Some(StabsTypeBody::Reference(inner)) => children.push(&**inner),
            Some(StabsTypeBody::Array { index, element }) => {
                children.push(&**index);
                children.push(&**element);
            }
            Some(StabsTypeBody::Enum(_)) => {}
            Some(StabsTypeBody::Function { return_type }) => children.push(&**return_type),
            Some(StabsTypeBody::Range { base, .. }) => children.push(&**base),
            Some(StabsTypeBody::Struct {
                base_classes,
                fields,
                member_functions,
                first_base_class,
                ..
            }) => {
                for base_class in base_classes {
                    children.push(&base_class.ty);
                }
                for field in fields {
                    children.push(&field.ty);
                }
                for set in member_functions {
                    for overload in &set.overloads {
                        children.push(&overload.ty);
                        if let Some(virtual_type) = &overload.virtual_type {
                            children.push(virtual_type);
                        }
                    }
                }
                if let Some(first_base_class) = first_base_class {
                    children.push(&**first_base_class);
                }
            }
            Some(StabsTypeBody::Union {
                fields,
                member_functions,
                ..
            }) => {
                for field in fields {
                    children.push(&field.ty);
                }
                for set in member_functions {
                    for overload in &set.overloads {
                        children.push(&overload.ty);
                        if let Some(virtual_type) = &overload.virtual_type {
                            children.push(virtual_type);
                        }
                    }
                }
            }
            Some(StabsTypeBody::CrossReference { .. }) => {}
            Some(StabsTypeBody::FloatingPointBuiltin { .. }) => {}
            Some(StabsTypeBody::Method {
                class_type,
                return_type,
                parameter_types,
            }) => {
                if let Some(class_type) = class_type {
                    children.push(&**class_type);
                }
                children.push(&**return_type);
                children.extend(parameter_types.iter());
            }
            Some(StabsTypeBody::PointerToDataMember {
                class_type,
                member_type,
            }) => {
                children.push(&**class_type);
                children.push(&**member_type);
            }
            Some(StabsTypeBody::SizeAttribute { inner, .. }) => children.push(&**inner),
            Some(StabsTypeBody::Builtin(_)) => {}
        }
        children
    }

    /// Collects every numbered node of this tree into the translation unit's
    /// type table. The first definition of a given number wins.
    pub fn enumerate_numbered_types<'a>(
        &'a self,
        output: &mut BTreeMap<StabsTypeNumber, &'a StabsType>,
    ) {
        if !self.anonymous && self.number.valid() && self.has_body() {
            output.entry(self.number).or_insert(self);
        }
        for child in self.children() {
            child.enumerate_numbered_types(output);
        }
    }
}

#[derive(Clone, Debug)]
pub enum StabsTypeBody {
    TypeReference(Box<StabsType>),
    Array {
        index: Box<StabsType>,
        element: Box<StabsType>,
    },
    Enum(Vec<(i32, String)>),
    Function {
        return_type: Box<StabsType>,
    },
    VolatileQualifier(Box<StabsType>),
    ConstQualifier(Box<StabsType>),
    /// `low` and `high` are kept as strings; some compilers emit values too
    /// large for 64 bits, or octal sentinels.
    Range {
        base: Box<StabsType>,
        low: String,
        high: String,
    },
    Struct {
        size: i64,
        base_classes: Vec<StabsBaseClass>,
        fields: Vec<StabsField>,
        member_functions: Vec<StabsMemberFunctionSet>,
        first_base_class: Option<Box<StabsType>>,
    },
    Union {
        size: i64,
        fields: Vec<StabsField>,
        member_functions: Vec<StabsMemberFunctionSet>,
    },
    CrossReference {
        kind: ForwardDeclaredKind,
        identifier: String,
    },
    FloatingPointBuiltin {
        fpclass: i32,
        bytes: i32,
    },
    Method {
        class_type: Option<Box<StabsType>>,
        return_type: Box<StabsType>,
        parameter_types: Vec<StabsType>,
    },
    Pointer(Box<StabsType>),
    Reference(Box<StabsType>),
    PointerToDataMember {
        class_type: Box<StabsType>,
        member_type: Box<StabsType>,
    },
    SizeAttribute {
        size_bits: i64,
        inner: Box<StabsType>,
    },
    Builtin(i64),
}

#[derive(Clone, Debug)]
pub struct StabsBaseClass {
    pub visibility: StabsFieldVisibility,
    pub offset: i32,
    pub ty: StabsType,
}

#[derive(Clone, Debug)]
pub struct StabsField {
    pub name: String,
    pub visibility: StabsFieldVisibility,
    pub ty: StabsType,
    pub is_static: bool,
    pub offset_bits: i32,
    pub size_bits: i32,
    /// Type name of a static member, parsed in place of offset and size.
    pub type_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StabsMemberFunctionSet {
    pub name: String,
    pub overloads: Vec<StabsMemberFunction>,
}

#[derive(Clone, Debug)]
pub struct StabsMemberFunction {
    pub ty: StabsType,
    pub visibility: StabsFieldVisibility,
    pub is_const: bool,
    pub is_volatile: bool,
    pub modifier: MemberFunctionModifier,
    pub vtable_index: Option<i32>,
    pub virtual_type: Option<StabsType>,
}

#[derive(Clone, Debug)]
pub struct StabsSymbol {
    pub name: String,
    pub descriptor: StabsSymbolDescriptor,
    pub ty: StabsType,
}

/// Parses a whole `name:descriptor<type>` symbol string.
///
/// The cursor is left pointing at whatever follows the symbol so that the
/// caller can decide how to treat trailing garbage.
pub fn parse_stabs_symbol(cursor: &mut Cursor) -> Result<StabsSymbol> {
    let name = cursor.eat_dodgy_identifier()?;
    cursor.expect(':', "identifier")?;

    let descriptor = match cursor.peek() {
        Some(c) if c.is_ascii_digit() || c == '(' => StabsSymbolDescriptor::LocalVariable,
        Some(_) => StabsSymbolDescriptor::from_char(cursor.eat_char("descriptor")?)?,
        None => return Err(Error::UnexpectedEnd("descriptor")),
    };

    // GCC emits a `t` after `T` for tags that are also typedefed.
    if descriptor != StabsSymbolDescriptor::LocalVariable && cursor.peek() == Some('t') {
        cursor.eat_char("descriptor")?;
    }

    let mut ty = parse_top_level_type(cursor)?;

    // Nested functions carry a `,enclosing,nested` suffix.
    if descriptor.is_function() && cursor.peek() == Some(',') {
        cursor.eat_char("function suffix")?;
        cursor.eat_identifier()?;
        cursor.expect(',', "function suffix")?;
        cursor.eat_identifier()?;
    }

    // Variable names must not become type names: in `somevar:P123=*456` the
    // type 123 can be referenced by number, but it is not called "somevar".
    let is_type = matches!(
        descriptor,
        StabsSymbolDescriptor::TypeName | StabsSymbolDescriptor::EnumStructOrTypeTag
    );
    if is_type {
        ty.name = Some(name.clone());
    }
    ty.is_typedef = descriptor == StabsSymbolDescriptor::TypeName;
    ty.is_root = true;

    Ok(StabsSymbol {
        name,
        descriptor,
        ty,
    })
}

fn parse_top_level_type(cursor: &mut Cursor) -> Result<StabsType> {
    let mut ty = parse_type(cursor)?;

    // First base class suffix.
    if matches!(ty.body, Some(StabsTypeBody::Struct { .. }))
        && cursor.remaining().starts_with("~%")
    {
        cursor.eat_char("first base class suffix")?;
        cursor.eat_char("first base class suffix")?;
        let base = parse_type(cursor)?;
        if let Some(StabsTypeBody::Struct {
            first_base_class, ..
        }) = &mut ty.body
        {
            *first_base_class = Some(Box::new(base));
        }
        cursor.expect(';', "first base class suffix")?;
    }

    // Extra live range information; parsed and discarded.
    if cursor.remaining().starts_with(";l") {
        cursor.eat_char("live range suffix")?;
        cursor.eat_char("live range suffix")?;
        cursor.expect('(', "live range suffix")?;
        cursor.expect('#', "live range suffix")?;
        cursor.eat_s32("live range suffix")?;
        cursor.expect(',', "live range suffix")?;
        cursor.expect('#', "live range suffix")?;
        cursor.eat_s32("live range suffix")?;
        cursor.expect(')', "live range suffix")?;
    }

    Ok(ty)
}

fn parse_type(cursor: &mut Cursor) -> Result<StabsType> {
    let anonymous;
    let mut number = StabsTypeNumber::default();

    match cursor.peek() {
        Some('(') => {
            // Type numbers made up of an include file index and a type index.
            cursor.eat_char("type number")?;
            number.file = cursor.eat_s32("file number")?;
            cursor.expect(',', "type number")?;
            number.index = cursor.eat_s32("type number")?;
            cursor.expect(')', "type number")?;
            anonymous = false;

            if cursor.peek() != Some('=') {
                return Ok(StabsType::with_info(false, number));
            }
            cursor.eat_char("type number")?;
        }
        Some(c) if c.is_ascii_digit() => {
            // Plain single-integer type numbers, the more common case for
            // games built with older toolchains.
            number.index = cursor.eat_s32("type number")?;
            anonymous = false;

            if cursor.peek() != Some('=') {
                return Ok(StabsType::with_info(false, number));
            }
            cursor.eat_char("type number")?;
        }
        Some(_) => {
            anonymous = true;
        }
        None => return Err(Error::UnexpectedEnd("type")),
    }

    let mut ty = StabsType::with_info(anonymous, number);

    let body = match cursor.peek() {
        Some(c) if c.is_ascii_digit() || c == '(' => {
            let inner = parse_type(cursor)?;
            StabsTypeBody::TypeReference(Box::new(inner))
        }
        Some('a') => {
            cursor.eat_char("array")?;
            let index = parse_type(cursor)?;
            let element = parse_type(cursor)?;
            StabsTypeBody::Array {
                index: Box::new(index),
                element: Box::new(element),
            }
        }
        Some('e') => {
            cursor.eat_char("enum")?;
            let mut fields = Vec::new();
            while cursor.peek() != Some(';') {
                let name = cursor.eat_dodgy_identifier()?;
                cursor.expect(':', "enum")?;
                let value = cursor.eat_s32("enum value")?;
                fields.push((value, name));
                cursor.expect(',', "enum")?;
            }
            cursor.eat_char("enum")?;
            StabsTypeBody::Enum(fields)
        }
        Some('f') => {
            cursor.eat_char("function")?;
            let return_type = parse_type(cursor)?;
            StabsTypeBody::Function {
                return_type: Box::new(return_type),
            }
        }
        Some('B') => {
            cursor.eat_char("volatile qualifier")?;
            StabsTypeBody::VolatileQualifier(Box::new(parse_type(cursor)?))
        }
        Some('k') => {
            cursor.eat_char("const qualifier")?;
            StabsTypeBody::ConstQualifier(Box::new(parse_type(cursor)?))
        }
        Some('r') => {
            cursor.eat_char("range")?;
            let base = parse_type(cursor)?;
            cursor.expect(';', "range type descriptor")?;
            let low = cursor.eat_dodgy_identifier()?;
            cursor.expect(';', "low range value")?;
            let high = cursor.eat_dodgy_identifier()?;
            cursor.expect(';', "high range value")?;
            StabsTypeBody::Range {
                base: Box::new(base),
                low,
                high,
            }
        }
        Some('s') => {
            cursor.eat_char("struct")?;
            let size = cursor.eat_s64("struct size")?;

            let mut base_classes = Vec::new();
            if cursor.peek() == Some('!') {
                cursor.eat_char("base class section")?;
                let base_class_count = cursor.eat_s32("base class count")?;
                cursor.expect(',', "base class section")?;
                for _ in 0..base_class_count {
                    cursor.eat_char("base class section")?;
                    let visibility =
                        StabsFieldVisibility::from_char(cursor.eat_char("base class visibility")?)?;
                    let offset = cursor.eat_s32("base class offset")?;
                    cursor.expect(',', "base class section")?;
                    let ty = parse_type(cursor)?;
                    cursor.expect(';', "base class section")?;
                    base_classes.push(StabsBaseClass {
                        visibility,
                        offset,
                        ty,
                    });
                }
            }

            let fields = parse_field_list(cursor)?;
            let member_functions = parse_member_functions(cursor)?;
            StabsTypeBody::Struct {
                size,
                base_classes,
                fields,
                member_functions,
                first_base_class: None,
            }
        }
        Some('u') => {
            cursor.eat_char("union")?;
            let size = cursor.eat_s64("union size")?;
            let fields = parse_field_list(cursor)?;
            let member_functions = parse_member_functions(cursor)?;
            StabsTypeBody::Union {
                size,
                fields,
                member_functions,
            }
        }
        Some('x') => {
            cursor.eat_char("cross reference")?;
            let kind = match cursor.eat_char("cross reference type")? {
                'e' => ForwardDeclaredKind::Enum,
                's' => ForwardDeclaredKind::Struct,
                'u' => ForwardDeclaredKind::Union,
                c => return Err(Error::InvalidDescriptor(c)),
            };
            let identifier = cursor.eat_dodgy_identifier()?;
            cursor.expect(':', "cross reference")?;
            ty.name = Some(identifier.clone());
            StabsTypeBody::CrossReference { kind, identifier }
        }
        Some('R') => {
            cursor.eat_char("floating point builtin")?;
            let fpclass = cursor.eat_s32("floating point builtin class")?;
            cursor.expect(';', "floating point builtin")?;
            let bytes = cursor.eat_s32("floating point builtin")?;
            cursor.expect(';', "floating point builtin")?;
            cursor.eat_s32("floating point builtin")?;
            cursor.expect(';', "floating point builtin")?;
            StabsTypeBody::FloatingPointBuiltin { fpclass, bytes }
        }
        Some('#') => {
            cursor.eat_char("method")?;
            if cursor.peek() == Some('#') {
                cursor.eat_char("method")?;
                let return_type = parse_type(cursor)?;
                if cursor.peek() == Some(';') {
                    cursor.eat_char("method")?;
                }
                StabsTypeBody::Method {
                    class_type: None,
                    return_type: Box::new(return_type),
                    parameter_types: Vec::new(),
                }
            } else {
                let class_type = parse_type(cursor)?;
                cursor.expect(',', "method")?;
                let return_type = parse_type(cursor)?;
                let mut parameter_types = Vec::new();
                loop {
                    match cursor.peek() {
                        Some(';') => {
                            cursor.eat_char("method")?;
                            break;
                        }
                        Some(_) => {
                            cursor.expect(',', "method")?;
                            parameter_types.push(parse_type(cursor)?);
                        }
                        None => break,
                    }
                }
                StabsTypeBody::Method {
                    class_type: Some(Box::new(class_type)),
                    return_type: Box::new(return_type),
                    parameter_types,
                }
            }
        }
        Some('&') => {
            cursor.eat_char("reference")?;
            StabsTypeBody::Reference(Box::new(parse_type(cursor)?))
        }
        Some('*') => {
            cursor.eat_char("pointer")?;
            StabsTypeBody::Pointer(Box::new(parse_type(cursor)?))
        }
        Some('@') => {
            cursor.eat_char("type attribute")?;
            match cursor.peek() {
                Some(c) if c.is_ascii_digit() || c == '(' => {
                    let class_type = parse_type(cursor)?;
                    cursor.expect(',', "pointer to non-static data member")?;
                    let member_type = parse_type(cursor)?;
                    StabsTypeBody::PointerToDataMember {
                        class_type: Box::new(class_type),
                        member_type: Box::new(member_type),
                    }
                }
                Some('s') => {
                    cursor.eat_char("type attribute")?;
                    let size_bits = cursor.eat_s64("type attribute")?;
                    cursor.expect(';', "type attribute")?;
                    let inner = parse_type(cursor)?;
                    StabsTypeBody::SizeAttribute {
                        size_bits,
                        inner: Box::new(inner),
                    }
                }
                Some(c) => return Err(Error::InvalidDescriptor(c)),
                None => return Err(Error::UnexpectedEnd("type attribute")),
            }
        }
        Some('-') => {
            cursor.eat_char("builtin")?;
            let type_id = cursor.eat_s64("builtin")?;
            cursor.expect(';', "builtin")?;
            StabsTypeBody::Builtin(type_id)
        }
        Some(c) => return Err(Error::InvalidDescriptor(c)),
        None => return Err(Error::UnexpectedEnd("type descriptor")),
    };

    ty.body = Some(body);
    Ok(ty)
}

fn parse_field_list(cursor: &mut Cursor) -> Result<Vec<StabsField>> {
    let mut fields = Vec::new();

    loop {
        match cursor.peek() {
            Some(';') => {
                cursor.eat_char("field list")?;
                break;
            }
            Some(_) => {}
            None => break,
        }

        let before_field = cursor.clone();

        let name = cursor.eat_dodgy_identifier()?;
        cursor.expect(':', "identifier")?;

        let mut visibility = StabsFieldVisibility::None;
        if cursor.peek() == Some('/') {
            cursor.eat_char("field visibility")?;
            visibility = StabsFieldVisibility::from_char(cursor.eat_char("field visibility")?)?;
        }

        // A second colon here means we actually started reading the member
        // function section, which uses `name::` as its delimiter.
        if cursor.peek() == Some(':') {
            *cursor = before_field;
            break;
        }

        let ty = parse_type(cursor)?;

        let mut field = StabsField {
            name,
            visibility,
            ty,
            is_static: false,
            offset_bits: 0,
            size_bits: 0,
            type_name: None,
        };

        if field.name.starts_with('$') {
            // Virtual table pointers.
            cursor.expect(',', "field type")?;
            field.offset_bits = cursor.eat_s32("field offset")?;
            cursor.expect(';', "field offset")?;
        } else if cursor.peek() == Some(':') {
            cursor.eat_char("static field")?;
            field.is_static = true;
            field.type_name = Some(cursor.eat_dodgy_identifier()?);
            cursor.expect(';', "identifier")?;
        } else if cursor.peek() == Some(',') {
            cursor.eat_char("field")?;
            field.offset_bits = cursor.eat_s32("field offset")?;
            cursor.expect(',', "field offset")?;
            field.size_bits = cursor.eat_s32("field size")?;
            cursor.expect(';', "field size")?;
        } else {
            return Err(Error::ExpectedChar {
                expected: ',',
                context: "field",
            });
        }

        fields.push(field);
    }

    Ok(fields)
}

fn parse_member_functions(cursor: &mut Cursor) -> Result<Vec<StabsMemberFunctionSet>> {
    // Check for if the next character is from an enclosing field list. If this
    // is the case, the next character will be ',' for normal fields and ':'
    // for static fields.
    if let Some(',') | Some(':') = cursor.peek() {
        return Ok(Vec::new());
    }

    let mut member_functions = Vec::new();

    loop {
        match cursor.peek() {
            Some(';') => {
                cursor.eat_char("member function")?;
                break;
            }
            Some(_) => {}
            None => break,
        }

        let name = cursor.eat_identifier()?;
        cursor.expect(':', "member function")?;
        cursor.expect(':', "member function")?;

        let mut overloads = Vec::new();
        loop {
            match cursor.peek() {
                Some(';') => {
                    cursor.eat_char("member function")?;
                    break;
                }
                Some(_) => {}
                None => break,
            }

            let ty = parse_type(cursor)?;
            cursor.expect(':', "member function")?;
            cursor.eat_dodgy_identifier()?;
            cursor.expect(';', "member function")?;

            let visibility =
                StabsFieldVisibility::from_char(cursor.eat_char("member function visibility")?)?;
            if visibility == StabsFieldVisibility::None {
                return Err(Error::InvalidVisibility('\0'));
            }

            let (is_const, is_volatile) = match cursor.eat_char("member function modifiers")? {
                'A' => (false, false),
                'B' => (true, false),
                'C' => (false, true),
                'D' => (true, true),
                '?' | '.' => (false, false),
                c => return Err(Error::InvalidMemberFunctionModifiers(c)),
            };

            let mut function = StabsMemberFunction {
                ty,
                visibility,
                is_const,
                is_volatile,
                modifier: MemberFunctionModifier::None,
                vtable_index: None,
                virtual_type: None,
            };

            match cursor.eat_char("member function type")? {
                '.' => function.modifier = MemberFunctionModifier::None,
                '?' => function.modifier = MemberFunctionModifier::Static,
                '*' => {
                    function.vtable_index = Some(cursor.eat_s32("vtable index")?);
                    cursor.expect(';', "virtual member function")?;
                    function.virtual_type = Some(parse_type(cursor)?);
                    cursor.expect(';', "virtual member function")?;
                    function.modifier = MemberFunctionModifier::Virtual;
                }
                c => return Err(Error::InvalidMemberFunctionModifiers(c)),
            }

            overloads.push(function);
        }

        member_functions.push(StabsMemberFunctionSet { name, overloads });
    }

    Ok(member_functions)
}

pub fn visibility_to_string(visibility: StabsFieldVisibility) -> &'static str {
    match visibility {
        StabsFieldVisibility::Private => "private",
        StabsFieldVisibility::Protected => "protected",
        StabsFieldVisibility::Public => "public",
        StabsFieldVisibility::PublicOptimizedOut => "public_optimizedout",
        StabsFieldVisibility::None => "none",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> StabsSymbol {
        let mut cursor = Cursor::new(input);
        let symbol = parse_stabs_symbol(&mut cursor).expect(input);
        assert!(cursor.is_empty(), "trailing input: {}", cursor.remaining());
        symbol
    }

    // typedef int s32;
    #[test]
    fn type_number() {
        let symbol = parse("s32:t1=0");
        assert!(!symbol.ty.anonymous);
        assert_eq!(symbol.ty.number.file, -1);
        assert_eq!(symbol.ty.number.index, 1);
        assert!(symbol.ty.has_body());
        assert!(symbol.ty.is_typedef);
    }

    // typedef int s32;
    #[test]
    fn fancy_type_number() {
        let symbol = parse("s32:t(1,1)=(0,1)");
        assert!(!symbol.ty.anonymous);
        assert_eq!(symbol.ty.number.file, 1);
        assert_eq!(symbol.ty.number.index, 1);
        assert!(symbol.ty.has_body());

        let Some(StabsTypeBody::TypeReference(inner)) = &symbol.ty.body else {
            panic!("expected type reference");
        };
        assert!(!inner.anonymous);
        assert_eq!(inner.number.file, 0);
        assert_eq!(inner.number.index, 1);
        assert!(!inner.has_body());
    }

    // namespace Namespace { struct A; }
    // template <typename T> struct DodgyTypeName {};
    // template class DodgyTypeName<Namespace::A>;
    #[test]
    fn dodgy_type_name() {
        let symbol = parse("DodgyTypeName<Namespace::A>:T(1,1)=s1;");
        assert_eq!(symbol.name, "DodgyTypeName<Namespace::A>");
        assert_eq!(symbol.ty.name.as_deref(), Some("DodgyTypeName<Namespace::A>"));
    }

    // typedef int Array[1][2];
    #[test]
    fn multi_dimensional_array() {
        let symbol = parse(
            "Array:t(1,1)=(1,2)=ar(1,3)=r(1,3);0;4294967295;;0;0;(1,4)=ar(1,3);0;1;(1,5)=ar(1,3);0;2;(0,1)",
        );
        let Some(StabsTypeBody::TypeReference(inner)) = &symbol.ty.body else {
            panic!("expected type reference");
        };
        assert!(matches!(inner.body, Some(StabsTypeBody::Array { .. })));
    }

    // enum E { A = 0, B = 1, C = 2147483647, D = -2147483648 };
    #[test]
    fn enum_constants() {
        let symbol = parse("E:t(1,1)=eA:0,B:1,C:2147483647,D:-2147483648,;");
        let Some(StabsTypeBody::Enum(fields)) = &symbol.ty.body else {
            panic!("expected enum");
        };
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], (0, "A".to_string()));
        assert_eq!(fields[1], (1, "B".to_string()));
        assert_eq!(fields[2], (2147483647, "C".to_string()));
        assert_eq!(fields[3], (-2147483648, "D".to_string()));
    }

    // typedef int (function)();
    #[test]
    fn function_type() {
        let symbol = parse("function:t(1,1)=(1,2)=f(0,1)");
        let Some(StabsTypeBody::TypeReference(inner)) = &symbol.ty.body else {
            panic!("expected type reference");
        };
        let Some(StabsTypeBody::Function { return_type }) = &inner.body else {
            panic!("expected function");
        };
        assert_eq!(return_type.number.file, 0);
        assert_eq!(return_type.number.index, 1);
    }

    // int
    #[test]
    fn range_builtin() {
        let symbol = parse("int:t(0,1)=r(0,1);-2147483648;2147483647;");
        let Some(StabsTypeBody::Range { low, high, .. }) = &symbol.ty.body else {
            panic!("expected range");
        };
        assert_eq!(low, "-2147483648");
        assert_eq!(high, "2147483647");
    }

    // struct SimpleStruct { int a; };
    #[test]
    fn simple_struct() {
        let symbol = parse("SimpleStruct:T(1,1)=s4a:(0,1),0,32;;");
        let Some(StabsTypeBody::Struct {
            size,
            base_classes,
            fields,
            member_functions,
            ..
        }) = &symbol.ty.body
        else {
            panic!("expected struct");
        };
        assert_eq!(*size, 4);
        assert!(base_classes.is_empty());
        assert!(member_functions.is_empty());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].offset_bits, 0);
        assert_eq!(fields[0].size_bits, 32);
    }

    // union Union { int i; float f; };
    #[test]
    fn union_fields() {
        let symbol = parse("Union:T(1,1)=u4i:(0,1),0,32;f:(0,14),0,32;;");
        let Some(StabsTypeBody::Union { size, fields, .. }) = &symbol.ty.body else {
            panic!("expected union");
        };
        assert_eq!(*size, 4);
        assert_eq!(fields.len(), 2);
    }

    // struct ForwardDeclared;
    // typedef ForwardDeclared* ForwardDeclaredPtr;
    #[test]
    fn cross_reference() {
        let symbol = parse("ForwardDeclaredPtr:t(1,1)=(1,2)=*(1,3)=xsForwardDeclared:");
        let Some(StabsTypeBody::TypeReference(inner)) = &symbol.ty.body else {
            panic!("expected type reference");
        };
        let Some(StabsTypeBody::Pointer(pointee)) = &inner.body else {
            panic!("expected pointer");
        };
        let Some(StabsTypeBody::CrossReference { kind, identifier }) = &pointee.body else {
            panic!("expected cross reference");
        };
        assert_eq!(*kind, ForwardDeclaredKind::Struct);
        assert_eq!(identifier, "ForwardDeclared");
    }

    // class WithMemberFunctions { int f(); static void g(char); };
    #[test]
    fn member_functions() {
        let symbol = parse(
            "WithMemberFunctions:T(1,1)=s1f::(1,2)=#(1,1),(0,1),(1,3)=*(1,1);:_ZN19WithMemberFunctions1fEv;2A.;g::(1,4)=f(0,23):_ZN19WithMemberFunctions1gEc;2A?;;",
        );
        let Some(StabsTypeBody::Struct {
            member_functions, ..
        }) = &symbol.ty.body
        else {
            panic!("expected struct");
        };
        assert_eq!(member_functions.len(), 2);
        assert_eq!(member_functions[0].name, "f");
        assert_eq!(member_functions[0].overloads.len(), 1);
        assert_eq!(
            member_functions[0].overloads[0].modifier,
            MemberFunctionModifier::None
        );
        assert_eq!(member_functions[1].name, "g");
        assert_eq!(
            member_functions[1].overloads[0].modifier,
            MemberFunctionModifier::Static
        );
    }

    // A truncated symbol string, as produced by a known GCC bug.
    #[test]
    fn truncated_symbol() {
        let mut cursor = Cursor::new("Truncated:T(1,1)=s64field:(1,2");
        assert!(matches!(
            parse_stabs_symbol(&mut cursor),
            Err(Error::Truncated) | Err(Error::UnexpectedEnd(_)) | Err(Error::ExpectedChar { .. })
        ));
    }

    #[test]
    fn numbered_types_are_enumerated() {
        let symbol = parse("Outer:T(1,1)=s8a:(1,2)=*(1,3)=xsInner:,0,32;b:(0,1),32,32;;");
        let mut numbered = BTreeMap::new();
        symbol.ty.enumerate_numbered_types(&mut numbered);
        assert!(numbered.contains_key(&StabsTypeNumber { file: 1, index: 1 }));
        assert!(numbered.contains_key(&StabsTypeNumber { file: 1, index: 2 }));
        assert!(numbered.contains_key(&StabsTypeNumber { file: 1, index: 3 }));
    }
}
