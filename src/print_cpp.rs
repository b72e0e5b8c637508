//! Prints recovered symbols as C++-like source.
//!
//! The output is an approximation for humans to read and iterate on; it is
//! not expected to compile, but it is deterministic for a given input and
//! configuration.

use std::collections::BTreeSet;
use std::io::Write;

use crate::ast::{
    access_specifier_to_string, builtin_class_to_string, AccessSpecifier, BuiltInClass, Node,
    NodeKind, StorageClass, TypeNameSource,
};
use crate::database::{
    DataType, Function, FunctionHandle, GlobalVariable, LocalVariable, Storage, SymbolDatabase,
};
use crate::error::Result;
use crate::registers;

#[derive(Clone, Copy, Debug)]
pub struct CppPrinterConfig {
    pub print_offsets_and_sizes: bool,
    pub print_function_bodies: bool,
    pub print_storage_information: bool,
    pub print_variable_data: bool,
    pub omit_this_parameter: bool,
    pub substitute_parameter_lists: bool,
    pub skip_statics: bool,
    pub make_globals_extern: bool,
    pub skip_member_functions_outside_types: bool,
    pub use_mangled_names: bool,
}

impl Default for CppPrinterConfig {
    fn default() -> CppPrinterConfig {
        CppPrinterConfig {
            print_offsets_and_sizes: true,
            print_function_bodies: true,
            print_storage_information: true,
            print_variable_data: false,
            omit_this_parameter: false,
            substitute_parameter_lists: false,
            skip_statics: false,
            make_globals_extern: false,
            skip_member_functions_outside_types: false,
            use_mangled_names: false,
        }
    }
}

/// The name of the variable or field being declared, threaded down the AST
/// walk so it can be printed in the right place: after the pointer characters
/// and before the array indices.
#[derive(Default)]
struct VariableName<'a> {
    identifier: Option<&'a str>,
    pointer_chars: Vec<char>,
    array_indices: Vec<i32>,
}

impl<'a> VariableName<'a> {
    fn new(identifier: &'a str) -> VariableName<'a> {
        VariableName {
            identifier: Some(identifier),
            ..Default::default()
        }
    }
}

const INSERT_SPACE_TO_LEFT: u32 = 1 << 0;
const BRACKETS_IF_POINTER: u32 = 1 << 2;

pub struct CppPrinter<'a, W: Write> {
    out: &'a mut W,
    config: CppPrinterConfig,
    digits_for_offset: i32,
    last_wants_spacing: bool,
    has_anything_been_printed: bool,
}

impl<'a, W: Write> CppPrinter<'a, W> {
    pub fn new(out: &'a mut W, config: CppPrinterConfig) -> CppPrinter<'a, W> {
        CppPrinter {
            out,
            config,
            digits_for_offset: 0,
            last_wants_spacing: false,
            has_anything_been_printed: false,
        }
    }

    pub fn comment_block_beginning(&mut self, input_file: &str) -> Result<()> {
        if self.has_anything_been_printed {
            writeln!(self.out)?;
        }

        writeln!(self.out, "// Symbols recovered from a .mdebug symbol table")?;
        writeln!(self.out, "// ")?;
        writeln!(self.out, "// Input file:")?;
        writeln!(self.out, "//   {input_file}")?;

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn comment_block_toolchain_version_info(
        &mut self,
        database: &SymbolDatabase,
    ) -> Result<()> {
        let mut toolchain_version_info = BTreeSet::new();
        for source_file in &database.source_files {
            if source_file.toolchain_version_info.is_empty() {
                toolchain_version_info.insert("unknown".to_string());
            } else {
                for info in &source_file.toolchain_version_info {
                    toolchain_version_info.insert(info.clone());
                }
            }
        }

        writeln!(self.out, "// Toolchain version(s):")?;
        for info in &toolchain_version_info {
            writeln!(self.out, "//   {info}")?;
        }

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn comment_block_builtin_types(&mut self, database: &SymbolDatabase) -> Result<()> {
        let mut builtins: BTreeSet<(String, BuiltInClass)> = BTreeSet::new();
        for data_type in &database.data_types {
            if let Some(node) = &data_type.ty {
                if let NodeKind::BuiltIn(builtin) = &node.kind {
                    builtins.insert((data_type.name.clone(), builtin.bclass));
                }
            }
        }

        if !builtins.is_empty() {
            writeln!(self.out, "// Built-in types:")?;
            for (name, bclass) in &builtins {
                writeln!(
                    self.out,
                    "//   {:<25}{}",
                    name,
                    builtin_class_to_string(*bclass)
                )?;
            }
        }

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn comment_block_file(&mut self, path: &str) -> Result<()> {
        if self.has_anything_been_printed {
            writeln!(self.out)?;
        }

        writeln!(
            self.out,
            "// *****************************************************************************"
        )?;
        writeln!(self.out, "// FILE -- {path}")?;
        writeln!(
            self.out,
            "// *****************************************************************************"
        )?;

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn begin_include_guard(&mut self, marker: &str) -> Result<()> {
        if self.has_anything_been_printed {
            writeln!(self.out)?;
        }

        writeln!(self.out, "#ifndef {marker}")?;
        writeln!(self.out, "#define {marker}")?;

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn end_include_guard(&mut self, marker: &str) -> Result<()> {
        if self.has_anything_been_printed {
            writeln!(self.out)?;
        }

        writeln!(self.out, "#endif // {marker}")?;

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    pub fn include_directive(&mut self, path: &str) -> Result<()> {
        if self.has_anything_been_printed {
            writeln!(self.out)?;
        }

        writeln!(self.out, "#include \"{path}\"")?;

        self.last_wants_spacing = true;
        self.has_anything_been_printed = true;
        Ok(())
    }

    /// Prints a data type declaration. Built-in types are skipped (they are
    /// listed by [`Self::comment_block_builtin_types`] instead); returns
    /// whether anything was printed.
    pub fn data_type(&mut self, symbol: &DataType, database: &SymbolDatabase) -> Result<bool> {
        let Some(node) = &symbol.ty else {
            return Ok(false);
        };
        if matches!(node.kind, NodeKind::BuiltIn(_)) {
            return Ok(false);
        }

        let wants_spacing = matches!(node.kind, NodeKind::Enum(_) | NodeKind::StructOrUnion(_));
        if self.has_anything_been_printed && (self.last_wants_spacing || wants_spacing) {
            writeln!(self.out)?;
        }

        let is_anonymous_enum = matches!(node.kind, NodeKind::Enum(_)) && node.name.is_empty();
        if symbol.conflict && !is_anonymous_enum {
            writeln!(
                self.out,
                "// warning: multiple differing types with the same name ({} not equal)",
                symbol.compare_fail_reason.unwrap_or("error")
            )?;
        }
        if let NodeKind::TypeName(type_name) = &node.kind {
            if type_name.source == TypeNameSource::Error {
                writeln!(
                    self.out,
                    "// warning: this type name was generated to handle an error"
                )?;
            }
        }

        if let NodeKind::StructOrUnion(_) = &node.kind {
            if node.size_bits > 0 {
                self.digits_for_offset =
                    ((node.size_bits as f32 / 8.0).log2() / 4.0).ceil() as i32;
            }
        }

        let mut name = VariableName::new(&symbol.name);
        self.ast_node(node, &mut name, 0, database)?;
        writeln!(self.out, ";")?;

        self.last_wants_spacing = wants_spacing;
        self.has_anything_been_printed = true;

        Ok(true)
    }

    pub fn function(&mut self, symbol: &Function, database: &SymbolDatabase) -> Result<()> {
        if self.config.skip_statics && symbol.storage_class == StorageClass::Static {
            return Ok(());
        }
        if self.config.skip_member_functions_outside_types && symbol.is_member_function_ish {
            return Ok(());
        }

        let local_variables = database.local_variables.span(symbol.local_variables);

        let wants_spacing = self.config.print_function_bodies && !local_variables.is_empty();
        if self.has_anything_been_printed && (self.last_wants_spacing || wants_spacing) {
            writeln!(self.out)?;
        }

        if self.config.print_storage_information {
            write!(
                self.out,
                "/* {:08x} {:08x} */ ",
                symbol.address.unwrap_or(0),
                symbol.size
            )?;
        }

        // The storage class, return type and function name.
        self.storage_class(symbol.storage_class)?;
        if let Some(return_type) = &symbol.ty {
            let mut dummy = VariableName::default();
            self.ast_node(return_type, &mut dummy, 0, database)?;
            write!(self.out, " ")?;
        }
        let printed_name = if self.config.use_mangled_names {
            symbol.name.as_str()
        } else {
            symbol.demangled_name()
        };
        let mut name = VariableName::new(printed_name);
        self.variable_name(&mut name, BRACKETS_IF_POINTER)?;

        // The parameter list.
        write!(self.out, "(")?;
        if symbol.parameter_variables.is_some() {
            let parameter_variables = database.parameter_variables.span(symbol.parameter_variables);
            let skip_this = self.config.omit_this_parameter
                && parameter_variables
                    .first()
                    .is_some_and(|parameter| parameter.name == "this");
            let start = usize::from(skip_this);
            for (index, parameter) in parameter_variables.iter().enumerate().skip(start) {
                let mut parameter_name = VariableName::new(&parameter.name);
                if let Some(ty) = &parameter.ty {
                    self.ast_node(ty, &mut parameter_name, 0, database)?;
                } else {
                    self.variable_name(&mut parameter_name, NO_VAR_PRINT_FLAGS)?;
                }
                if index + 1 != parameter_variables.len() {
                    write!(self.out, ", ")?;
                }
            }
        } else {
            write!(self.out, "/* parameters unknown */")?;
        }
        write!(self.out, ")")?;

        // The function body, or at least the local variable declarations.
        if self.config.print_function_bodies {
            write!(self.out, " ")?;
            if local_variables.is_empty() {
                write!(self.out, "{{}}")?;
            } else {
                writeln!(self.out, "{{")?;
                for local in local_variables {
                    self.indent(1)?;
                    self.local_variable(local, database)?;
                    writeln!(self.out, ";")?;
                }
                write!(self.out, "}}")?;
            }
        } else {
            write!(self.out, ";")?;
        }

        writeln!(self.out)?;

        self.last_wants_spacing = wants_spacing;
        self.has_anything_been_printed = true;
        Ok(())
    }

    fn local_variable(&mut self, symbol: &LocalVariable, database: &SymbolDatabase) -> Result<()> {
        if self.config.print_storage_information {
            self.variable_storage_comment(&symbol.storage)?;
        }
        let mut name = VariableName::new(&symbol.name);
        if let Some(ty) = &symbol.ty {
            self.ast_node(ty, &mut name, 1, database)?;
        } else {
            self.variable_name(&mut name, NO_VAR_PRINT_FLAGS)?;
        }
        if self.config.print_variable_data {
            if let Some(data) = &symbol.data {
                write!(self.out, " = ")?;
                let mut dummy = VariableName::default();
                self.ast_node(data, &mut dummy, 1, database)?;
            }
        }
        Ok(())
    }

    pub fn global_variable(
        &mut self,
        symbol: &GlobalVariable,
        database: &SymbolDatabase,
    ) -> Result<()> {
        let Some(node) = &symbol.ty else {
            return Ok(());
        };

        if self.config.skip_statics && node.storage_class == StorageClass::Static {
            return Ok(());
        }

        let wants_spacing = self.config.print_variable_data
            && symbol
                .data
                .as_ref()
                .is_some_and(|data| matches!(data.kind, NodeKind::InitializerList(_)));
        if self.has_anything_been_printed && (self.last_wants_spacing || wants_spacing) {
            writeln!(self.out)?;
        }

        if self.config.print_storage_information {
            self.variable_storage_comment(&Storage::Global(symbol.storage))?;
        }

        if self.config.make_globals_extern && node.storage_class == StorageClass::None {
            write!(self.out, "extern ")?;
        }

        let printed_name = if self.config.use_mangled_names {
            symbol.name.as_str()
        } else {
            symbol.demangled_name()
        };
        let mut name = VariableName::new(printed_name);
        self.ast_node(node, &mut name, 0, database)?;

        if self.config.print_variable_data {
            if let Some(data) = &symbol.data {
                write!(self.out, " = ")?;
                let mut dummy = VariableName::default();
                self.ast_node(data, &mut dummy, 0, database)?;
            }
        }
        writeln!(self.out, ";")?;

        self.last_wants_spacing = wants_spacing;
        self.has_anything_been_printed = true;
        Ok(())
    }

    fn ast_node<'n>(
        &mut self,
        node: &'n Node,
        parent_name: &mut VariableName<'n>,
        indentation_level: usize,
        database: &SymbolDatabase,
    ) -> Result<()> {
        let mut this_name = VariableName::new(&node.name);
        let name: &mut VariableName<'n> = if node.name.is_empty() {
            parent_name
        } else {
            &mut this_name
        };

        if let NodeKind::FunctionType(function) = &node.kind {
            if function.vtable_index > -1 {
                write!(self.out, "/* vtable[{}] */ ", function.vtable_index)?;
            }
        }

        self.storage_class(node.storage_class)?;

        if node.is_const {
            write!(self.out, "const ")?;
        }
        if node.is_volatile {
            write!(self.out, "volatile ")?;
        }

        match &node.kind {
            NodeKind::Array(array) => {
                name.array_indices.push(array.element_count);
                self.ast_node(&array.element_type, name, indentation_level, database)?;
            }
            NodeKind::BitField(bit_field) => {
                self.ast_node(&bit_field.underlying_type, name, indentation_level, database)?;
                write!(self.out, " : {}", node.size_bits)?;
            }
            NodeKind::BuiltIn(builtin) => {
                if builtin.bclass == BuiltInClass::Void {
                    write!(self.out, "void")?;
                } else {
                    write!(
                        self.out,
                        "CCC_BUILTIN({})",
                        builtin_class_to_string(builtin.bclass)
                    )?;
                }
                self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
            }
            NodeKind::Data(data) => {
                if !data.field_name.is_empty() {
                    write!(self.out, "/* {} = */ ", data.field_name)?;
                }
                write!(self.out, "{}", data.string)?;
            }
            NodeKind::Enum(enumeration) => {
                write!(self.out, "enum")?;
                let name_on_top =
                    indentation_level == 0 && node.storage_class != StorageClass::Typedef;
                if name_on_top {
                    self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
                }
                write!(self.out, " {{")?;
                if self.config.print_offsets_and_sizes && node.size_bits > -1 {
                    write!(self.out, " // {:#x}", node.size_bits / 8)?;
                }
                writeln!(self.out)?;
                for (index, (value, constant_name)) in enumeration.constants.iter().enumerate() {
                    let is_last = index == enumeration.constants.len() - 1;
                    self.indent(indentation_level + 1)?;
                    writeln!(
                        self.out,
                        "{constant_name} = {value}{}",
                        if is_last { "" } else { "," }
                    )?;
                }
                self.indent(indentation_level)?;
                write!(self.out, "}}")?;
                if !name_on_top {
                    self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
                }
            }
            NodeKind::FunctionType(function) => {
                match function.modifier {
                    crate::ast::MemberFunctionModifier::Static => write!(self.out, "static ")?,
                    crate::ast::MemberFunctionModifier::Virtual => write!(self.out, "virtual ")?,
                    crate::ast::MemberFunctionModifier::None => {}
                }
                if !function.is_constructor {
                    if let Some(return_type) = &function.return_type {
                        let mut dummy = VariableName::default();
                        self.ast_node(return_type, &mut dummy, indentation_level, database)?;
                        write!(self.out, " ")?;
                    }
                }
                self.variable_name(name, BRACKETS_IF_POINTER)?;
                write!(self.out, "(")?;

                // The parameters provided in STABS member function
                // declarations are unreliable, so they are swapped out for
                // the ones from the function definition when available.
                let mut printed = false;
                if self.config.substitute_parameter_lists {
                    if let Some(definition) = function
                        .definition_handle
                        .and_then(|handle| database.functions.symbol_from_handle(FunctionHandle(handle)))
                    {
                        if definition.parameter_variables.is_some() {
                            let parameters =
                                database.parameter_variables.span(definition.parameter_variables);
                            let skip_this = self.config.omit_this_parameter
                                && parameters.first().is_some_and(|p| p.name == "this");
                            let start = usize::from(skip_this);
                            for (index, parameter) in parameters.iter().enumerate().skip(start) {
                                let mut parameter_name = VariableName::new(&parameter.name);
                                if let Some(ty) = &parameter.ty {
                                    self.ast_node(ty, &mut parameter_name, indentation_level, database)?;
                                }
                                if index + 1 != parameters.len() {
                                    write!(self.out, ", ")?;
                                }
                            }
                            printed = true;
                        }
                    }
                }
                if !printed {
                    if let Some(parameters) = &function.parameters {
                        let skip_this = self.config.omit_this_parameter
                            && parameters.first().is_some_and(|p| p.name == "this");
                        let start = usize::from(skip_this);
                        for (index, parameter) in parameters.iter().enumerate().skip(start) {
                            let mut dummy = VariableName::default();
                            self.ast_node(parameter, &mut dummy, indentation_level, database)?;
                            if index + 1 != parameters.len() {
                                write!(self.out, ", ")?;
                            }
                        }
                    } else {
                        write!(self.out, "/* parameters unknown */")?;
                    }
                }
                write!(self.out, ")")?;
            }
            NodeKind::InitializerList(list) => {
                if !list.field_name.is_empty() {
                    write!(self.out, "/* {} = */ ", list.field_name)?;
                }
                writeln!(self.out, "{{")?;
                for (index, child) in list.children.iter().enumerate() {
                    self.indent(indentation_level + 1)?;
                    let mut dummy = VariableName::default();
                    self.ast_node(child, &mut dummy, indentation_level + 1, database)?;
                    if index != list.children.len() - 1 {
                        write!(self.out, ",")?;
                    }
                    writeln!(self.out)?;
                }
                self.indent(indentation_level)?;
                write!(self.out, "}}")?;
            }
            NodeKind::PointerOrReference(pointer_or_reference) => {
                name.pointer_chars
                    .push(if pointer_or_reference.is_pointer { '*' } else { '&' });
                self.ast_node(&pointer_or_reference.value_type, name, indentation_level, database)?;
                self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
            }
            NodeKind::PointerToDataMember(member_pointer) => {
                // This probably isn't correct for nested pointers to data
                // members, but for now lets not think about that.
                let mut dummy = VariableName::default();
                self.ast_node(&member_pointer.member_type, &mut dummy, indentation_level, database)?;
                write!(self.out, " ")?;
                let mut dummy = VariableName::default();
                self.ast_node(&member_pointer.class_type, &mut dummy, indentation_level, database)?;
                write!(self.out, "::")?;
                self.variable_name(name, NO_VAR_PRINT_FLAGS)?;
            }
            NodeKind::StructOrUnion(struct_or_union) => {
                let mut access_specifier = AccessSpecifier::Public;
                if struct_or_union.is_struct {
                    write!(self.out, "struct")?;
                } else {
                    write!(self.out, "union")?;
                }
                let name_on_top =
                    indentation_level == 0 && node.storage_class != StorageClass::Typedef;
                if name_on_top {
                    self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
                }

                if !struct_or_union.base_classes.is_empty() {
                    write!(self.out, " : ")?;
                    for (index, base_class) in struct_or_union.base_classes.iter().enumerate() {
                        self.offset(base_class)?;
                        if base_class.access_specifier != AccessSpecifier::Public {
                            write!(
                                self.out,
                                "{} ",
                                access_specifier_to_string(base_class.access_specifier)
                            )?;
                        }
                        let mut dummy = VariableName::default();
                        self.ast_node(base_class, &mut dummy, indentation_level + 1, database)?;
                        if index != struct_or_union.base_classes.len() - 1 {
                            write!(self.out, ", ")?;
                        }
                    }
                }

                write!(self.out, " {{")?;
                if self.config.print_offsets_and_sizes {
                    write!(self.out, " // {:#x}", node.size_bits / 8)?;
                }
                writeln!(self.out)?;

                for field in &struct_or_union.fields {
                    if access_specifier != field.access_specifier {
                        self.indent(indentation_level)?;
                        writeln!(
                            self.out,
                            "{}:",
                            access_specifier_to_string(field.access_specifier)
                        )?;
                        access_specifier = field.access_specifier;
                    }
                    self.indent(indentation_level + 1)?;
                    self.offset(field)?;
                    self.ast_node(field, name, indentation_level + 1, database)?;
                    writeln!(self.out, ";")?;
                }

                if !struct_or_union.member_functions.is_empty() {
                    if !struct_or_union.fields.is_empty() {
                        self.indent(indentation_level + 1)?;
                        writeln!(self.out)?;
                    }
                    for member_function in &struct_or_union.member_functions {
                        if access_specifier != member_function.access_specifier {
                            self.indent(indentation_level)?;
                            writeln!(
                                self.out,
                                "{}:",
                                access_specifier_to_string(member_function.access_specifier)
                            )?;
                            access_specifier = member_function.access_specifier;
                        }
                        self.indent(indentation_level + 1)?;
                        self.ast_node(member_function, name, indentation_level + 1, database)?;
                        writeln!(self.out, ";")?;
                    }
                }

                self.indent(indentation_level)?;
                write!(self.out, "}}")?;
                if !name_on_top {
                    self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
                }
            }
            NodeKind::TypeName(type_name) => {
                write!(self.out, "{}", type_name.type_name)?;
                self.variable_name(name, INSERT_SPACE_TO_LEFT)?;
            }
        }

        Ok(())
    }

    fn storage_class(&mut self, storage_class: StorageClass) -> Result<()> {
        match storage_class {
            StorageClass::None => {}
            StorageClass::Typedef => write!(self.out, "typedef ")?,
            StorageClass::Extern => write!(self.out, "extern ")?,
            StorageClass::Static => write!(self.out, "static ")?,
            StorageClass::Auto => write!(self.out, "auto ")?,
            StorageClass::Register => write!(self.out, "register ")?,
        }
        Ok(())
    }

    fn variable_name(&mut self, name: &mut VariableName, print_flags: u32) -> Result<()> {
        let has_name = name.identifier.is_some_and(|identifier| !identifier.is_empty());
        let has_brackets = (print_flags & BRACKETS_IF_POINTER != 0) && !name.pointer_chars.is_empty();
        if has_name && (print_flags & INSERT_SPACE_TO_LEFT != 0) {
            write!(self.out, " ")?;
        }
        if has_brackets {
            write!(self.out, "(")?;
        }
        for &pointer_char in name.pointer_chars.iter().rev() {
            write!(self.out, "{pointer_char}")?;
        }
        name.pointer_chars.clear();
        if has_name {
            write!(self.out, "{}", name.identifier.take().unwrap())?;
        }
        for index in &name.array_indices {
            write!(self.out, "[{index}]")?;
        }
        name.array_indices.clear();
        if has_brackets {
            write!(self.out, ")")?;
        }
        Ok(())
    }

    fn variable_storage_comment(&mut self, storage: &Storage) -> Result<()> {
        write!(self.out, "/* ")?;
        match storage {
            Storage::Global(global_storage) => {
                write!(
                    self.out,
                    "{}",
                    crate::database::global_storage_location_to_string(global_storage.location)
                )?;
                if let Some(address) = global_storage.address {
                    write!(self.out, " {address:x}")?;
                }
            }
            Storage::Register(register_storage) => {
                let register_name = registers::register_name(register_storage.dbx_register_number)
                    .unwrap_or("invalid");
                write!(
                    self.out,
                    "{register_name} {}",
                    register_storage.dbx_register_number
                )?;
            }
            Storage::Stack(stack_storage) => {
                if stack_storage.stack_pointer_offset >= 0 {
                    write!(self.out, "{:#x}(sp)", stack_storage.stack_pointer_offset)?;
                } else {
                    write!(self.out, "-{:#x}(sp)", -stack_storage.stack_pointer_offset)?;
                }
            }
        }
        write!(self.out, " */ ")?;
        Ok(())
    }

    fn offset(&mut self, node: &Node) -> Result<()> {
        if self.config.print_offsets_and_sizes
            && node.storage_class != StorageClass::Static
            && node.absolute_offset_bytes > -1
        {
            let digits = self.digits_for_offset.clamp(0, 16) as usize;
            write!(
                self.out,
                "/* 0x{:0digits$x}",
                node.absolute_offset_bytes,
                digits = digits
            )?;
            if let NodeKind::BitField(bit_field) = &node.kind {
                write!(self.out, ":{}", bit_field.bitfield_offset_bits)?;
            }
            write!(self.out, " */ ")?;
        }
        Ok(())
    }

    fn indent(&mut self, level: usize) -> Result<()> {
        for _ in 0..level {
            write!(self.out, "\t")?;
        }
        Ok(())
    }
}

const NO_VAR_PRINT_FLAGS: u32 = 0;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, NodeKind};
    use crate::database::{SymbolDatabase, SymbolSourceKind};

    fn print_data_type(node: Node, name: &str) -> String {
        let mut database = SymbolDatabase::new();
        let source = database
            .symbol_sources
            .create_source("test", SymbolSourceKind::SymbolTable);
        let file = database
            .source_files
            .create_symbol("test.cpp", source, None)
            .handle;
        let handle = database
            .create_data_type_if_unique(node, name, file, source)
            .unwrap();

        let mut out = Vec::new();
        let mut printer = CppPrinter::new(&mut out, CppPrinterConfig::default());
        let symbol = database.data_types.symbol_from_handle(handle).unwrap();
        printer.data_type(symbol, &database).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn builtin(bclass: BuiltInClass) -> Node {
        Node::new(NodeKind::BuiltIn(ast::BuiltIn { bclass }))
    }

    fn type_name(name: &str) -> Node {
        Node::new(NodeKind::TypeName(ast::TypeName::reference(name)))
    }

    #[test]
    fn enums_print_with_constants() {
        let mut node = Node::new(NodeKind::Enum(ast::Enum {
            constants: vec![(0, "FIRST".to_string()), (1, "SECOND".to_string())],
        }));
        node.size_bits = 32;
        let output = print_data_type(node, "Flags");
        assert_eq!(
            output,
            "enum Flags { // 0x4\n\tFIRST = 0,\n\tSECOND = 1\n};\n"
        );
    }

    #[test]
    fn struct_fields_print_offsets() {
        let mut first = type_name("int");
        first.name = "a".to_string();
        first.relative_offset_bytes = 0;
        first.absolute_offset_bytes = 0;
        first.size_bits = 32;
        let mut second = type_name("int");
        second.name = "b".to_string();
        second.relative_offset_bytes = 4;
        second.absolute_offset_bytes = 4;
        second.size_bits = 32;

        let mut node = Node::new(NodeKind::StructOrUnion(ast::StructOrUnion {
            is_struct: true,
            base_classes: Vec::new(),
            fields: vec![first, second],
            member_functions: Vec::new(),
        }));
        node.size_bits = 64;

        let output = print_data_type(node, "Pair");
        assert_eq!(
            output,
            "struct Pair { // 0x8\n\t/* 0x0 */ int a;\n\t/* 0x4 */ int b;\n};\n"
        );
    }

    #[test]
    fn bitfields_print_bit_offsets() {
        let mut field = Node::new(NodeKind::BitField(ast::BitField {
            underlying_type: Box::new(type_name("unsigned int")),
            bitfield_offset_bits: 3,
        }));
        field.name = "flag".to_string();
        field.relative_offset_bytes = 0;
        field.absolute_offset_bytes = 0;
        field.size_bits = 5;

        let mut node = Node::new(NodeKind::StructOrUnion(ast::StructOrUnion {
            is_struct: true,
            base_classes: Vec::new(),
            fields: vec![field],
            member_functions: Vec::new(),
        }));
        node.size_bits = 32;

        let output = print_data_type(node, "Packed");
        assert_eq!(
            output,
            "struct Packed { // 0x4\n\t/* 0x0:3 */ unsigned int flag : 5;\n};\n"
        );
    }

    #[test]
    fn pointers_accumulate_right_to_left() {
        let pointer = Node::new(NodeKind::PointerOrReference(ast::PointerOrReference {
            is_pointer: true,
            value_type: Box::new(Node::new(NodeKind::PointerOrReference(
                ast::PointerOrReference {
                    is_pointer: true,
                    value_type: Box::new(type_name("char")),
                },
            ))),
        }));
        let mut node = pointer;
        node.storage_class = StorageClass::Typedef;
        let output = print_data_type(node, "StringTable");
        assert_eq!(output, "typedef char **StringTable;\n");
    }

    #[test]
    fn access_specifier_changes_are_labelled() {
        let mut hidden = type_name("int");
        hidden.name = "hidden".to_string();
        hidden.relative_offset_bytes = 0;
        hidden.absolute_offset_bytes = 0;
        hidden.access_specifier = AccessSpecifier::Private;

        let mut node = Node::new(NodeKind::StructOrUnion(ast::StructOrUnion {
            is_struct: true,
            base_classes: Vec::new(),
            fields: vec![hidden],
            member_functions: Vec::new(),
        }));
        node.size_bits = 32;

        let output = print_data_type(node, "Sneaky");
        assert_eq!(
            output,
            "struct Sneaky { // 0x4\nprivate:\n\t/* 0x0 */ int hidden;\n};\n"
        );
    }

    #[test]
    fn inheritance_is_annotated() {
        let mut base = type_name("Base");
        base.is_base_class = true;
        base.absolute_offset_bytes = 0;
        base.access_specifier = AccessSpecifier::Public;

        let mut node = Node::new(NodeKind::StructOrUnion(ast::StructOrUnion {
            is_struct: true,
            base_classes: vec![base],
            fields: Vec::new(),
            member_functions: Vec::new(),
        }));
        node.size_bits = 32;

        let output = print_data_type(node, "Derived");
        assert_eq!(output, "struct Derived : /* 0x0 */ Base { // 0x4\n};\n");
    }

    #[test]
    fn function_pointers_get_parentheses() {
        let function = Node::new(NodeKind::FunctionType(ast::FunctionType {
            return_type: Some(Box::new(builtin(BuiltInClass::Void))),
            parameters: Some(Vec::new()),
            ..Default::default()
        }));
        let mut pointer = Node::new(NodeKind::PointerOrReference(ast::PointerOrReference {
            is_pointer: true,
            value_type: Box::new(function),
        }));
        pointer.storage_class = StorageClass::Typedef;
        let output = print_data_type(pointer, "Callback");
        assert_eq!(output, "typedef void (*Callback)();\n");
    }
}
