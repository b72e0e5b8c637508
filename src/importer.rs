//! Imports an `.mdebug` symbol table into a symbol database.
//!
//! The heavy lifting is done per translation unit by a small state machine
//! that walks the parsed symbol stream. Depending on the compiler version the
//! records of a function can appear in either of these orders:
//!
//!   proc            fun
//!   ... lines ...   ... parameters ...
//!   end             proc
//!   fun             ... lines ...
//!   ... params ...  end
//!   ... blocks ...  ... blocks ...

use std::collections::{BTreeMap, HashMap};

use crate::ast::{Node, NodeKind, StorageClass};
use crate::database::{
    FunctionHandle, GlobalStorage, GlobalStorageLocation, GlobalVariableHandle,
    LocalVariableHandle, ParameterVariableHandle, RegisterStorage, SourceFileHandle, StackStorage,
    Storage, SymbolDatabase, SymbolRange, SymbolSourceHandle, SymbolSourceKind,
};
use crate::error::{Error, Result};
use crate::flags::{
    DONT_DEDUPLICATE_TYPES, STRIP_ACCESS_SPECIFIERS, STRIP_GENERATED_FUNCTIONS,
    STRIP_MEMBER_FUNCTIONS,
};
use crate::mdebug::{self, StorageType, SymbolClass, SymbolTableReader};
use crate::stabs::{StabsSymbol, StabsSymbolDescriptor, StabsType, StabsTypeNumber};
use crate::stabs_to_ast::{
    stabs_data_type_symbol_to_ast, stabs_type_to_ast_and_handle_errors, StabsToAstState,
};
use crate::symbols::{parse_symbols, ParsedSymbolKind};

/// The demangler is an external collaborator; it gets a mangled name and
/// either produces a readable one or gives up.
pub type DemanglerFn = fn(&str) -> Option<String>;

pub struct AnalysisContext<'a> {
    globals: HashMap<&'a str, (u32, SymbolClass)>,
    source: SymbolSourceHandle,
    flags: u32,
    demangler: Option<DemanglerFn>,
}

impl AnalysisContext<'_> {
    pub fn new(
        source: SymbolSourceHandle,
        flags: u32,
        demangler: Option<DemanglerFn>,
    ) -> AnalysisContext<'static> {
        AnalysisContext {
            globals: HashMap::new(),
            source,
            flags,
            demangler,
        }
    }
}

/// Imports every translation unit of the given symbol table. Returns the
/// handle of the newly created symbol source.
pub fn import_symbol_table(
    database: &mut SymbolDatabase,
    reader: &SymbolTableReader,
    flags: u32,
    demangler: Option<DemanglerFn>,
) -> Result<SymbolSourceHandle> {
    let source = database
        .symbol_sources
        .create_source(".mdebug", SymbolSourceKind::SymbolTable);

    // The addresses of the global variables aren't present in the local
    // symbol table, so they are pulled out of the external table instead.
    let external_symbols = reader.parse_external_symbols()?;
    let mut globals = HashMap::new();
    for external in &external_symbols {
        if external.storage_type == StorageType::Global
            && external.storage_class != SymbolClass::Undefined
        {
            globals.insert(external.string, (external.value, external.storage_class));
        }
    }

    let context = AnalysisContext {
        globals,
        source,
        flags,
        demangler,
    };

    for file_index in 0..reader.file_count() {
        let file = reader.parse_file(file_index)?;
        import_file(database, &file, &context)?;
    }

    finish_import(database, flags, source);

    Ok(source)
}

/// Imports a single translation unit. Exposed so tests can drive the
/// importer with synthetic symbol streams.
pub fn import_file(
    database: &mut SymbolDatabase,
    file: &mdebug::File,
    context: &AnalysisContext,
) -> Result<()> {
    let source_file = database
        .source_files
        .create_symbol(&file.full_path, context.source, None)
        .handle;

    // Sometimes the INFO symbols contain information about what toolchain
    // version was used for building the executable.
    for symbol in &file.symbols {
        if symbol.storage_class == SymbolClass::Info && symbol.string != "@stabs" {
            if let Some(symbol_file) = database.source_files.symbol_from_handle_mut(source_file) {
                symbol_file
                    .toolchain_version_info
                    .insert(symbol.string.to_string());
            }
        }
    }

    // Parse the stab strings into a data structure that's vaguely one-to-one
    // with the text-based representation.
    let mut flags = context.flags;
    let parsed_symbols = parse_symbols(&file.symbols, &mut flags)?;

    // Types can be referenced by their number from other stabs, so build a
    // map of type numbers to the parsed types.
    let mut stabs_types: BTreeMap<StabsTypeNumber, &StabsType> = BTreeMap::new();
    for symbol in &parsed_symbols {
        if let ParsedSymbolKind::NameColonType(stabs_symbol) = &symbol.kind {
            stabs_symbol.ty.enumerate_numbered_types(&mut stabs_types);
        }
    }

    let ast_state = StabsToAstState {
        file_handle: source_file.0,
        stabs_types: &stabs_types,
        flags,
    };

    let mut analyser = LocalSymbolTableAnalyser {
        database,
        context,
        ast_state: &ast_state,
        source_file,
        state: AnalysisState::NotInFunction,
        functions: None,
        global_variables: None,
        current_function: None,
        current_parameter_variables: None,
        current_local_variables: None,
        pending_local_variables: Vec::new(),
        block_stack: Vec::new(),
        next_relative_path: String::new(),
    };

    for symbol in &parsed_symbols {
        match &symbol.kind {
            ParsedSymbolKind::NameColonType(stabs_symbol) => {
                match stabs_symbol.descriptor {
                    StabsSymbolDescriptor::LocalFunction
                    | StabsSymbolDescriptor::GlobalFunction => {
                        analyser.function(&stabs_symbol.name, &stabs_symbol.ty, symbol.raw.value)?;
                    }
                    StabsSymbolDescriptor::ReferenceParameterA
                    | StabsSymbolDescriptor::RegisterParameter
                    | StabsSymbolDescriptor::ValueParameter
                    | StabsSymbolDescriptor::ReferenceParameterV => {
                        let is_stack_variable =
                            stabs_symbol.descriptor == StabsSymbolDescriptor::ValueParameter;
                        let is_by_reference = matches!(
                            stabs_symbol.descriptor,
                            StabsSymbolDescriptor::ReferenceParameterA
                                | StabsSymbolDescriptor::ReferenceParameterV
                        );
                        analyser.parameter(
                            &stabs_symbol.name,
                            &stabs_symbol.ty,
                            is_stack_variable,
                            symbol.raw.value as i32,
                            is_by_reference,
                        )?;
                    }
                    StabsSymbolDescriptor::RegisterVariable
                    | StabsSymbolDescriptor::LocalVariable
                    | StabsSymbolDescriptor::StaticLocalVariable => {
                        let (storage, is_static) = match stabs_symbol.descriptor {
                            StabsSymbolDescriptor::StaticLocalVariable => {
                                let location =
                                    symbol_class_to_location(symbol.raw.storage_class)
                                        .ok_or_else(|| {
                                            Error::Fatal(
                                                "invalid static local variable location"
                                                    .to_string(),
                                            )
                                        })?;
                                let storage = Storage::Global(GlobalStorage {
                                    location,
                                    address: Some(symbol.raw.value),
                                });
                                (storage, true)
                            }
                            StabsSymbolDescriptor::RegisterVariable => {
                                let storage = Storage::Register(RegisterStorage {
                                    dbx_register_number: symbol.raw.value as i32,
                                    is_by_reference: false,
                                });
                                (storage, false)
                            }
                            _ => {
                                let storage = Storage::Stack(StackStorage {
                                    stack_pointer_offset: symbol.raw.value as i32,
                                });
                                (storage, false)
                            }
                        };
                        analyser.local_variable(
                            &stabs_symbol.name,
                            &stabs_symbol.ty,
                            storage,
                            is_static,
                        )?;
                    }
                    StabsSymbolDescriptor::GlobalVariable
                    | StabsSymbolDescriptor::StaticGlobalVariable => {
                        let is_static =
                            stabs_symbol.descriptor == StabsSymbolDescriptor::StaticGlobalVariable;
                        let mut address = None;
                        let mut location = symbol_class_to_location(symbol.raw.storage_class);
                        if is_static {
                            // For static global variables the address is
                            // stored in the local symbol table.
                            address = Some(symbol.raw.value);
                        } else {
                            // For non-static globals it is only present in
                            // the external symbol table.
                            if let Some(&(value, storage_class)) =
                                context.globals.get(stabs_symbol.name.as_str())
                            {
                                address = Some(value);
                                location = symbol_class_to_location(storage_class);
                            }
                        }
                        let location = location.ok_or_else(|| {
                            Error::Fatal("invalid global variable location".to_string())
                        })?;
                        analyser.global_variable(
                            &stabs_symbol.name,
                            address,
                            &stabs_symbol.ty,
                            is_static,
                            location,
                        )?;
                    }
                    StabsSymbolDescriptor::TypeName
                    | StabsSymbolDescriptor::EnumStructOrTypeTag => {
                        analyser.data_type(stabs_symbol)?;
                    }
                }
            }
            ParsedSymbolKind::SourceFile => {
                analyser.source_file(symbol.raw.string, symbol.raw.value)?;
            }
            ParsedSymbolKind::SubSourceFile => {
                analyser.sub_source_file(symbol.raw.string, symbol.raw.value)?;
            }
            ParsedSymbolKind::LBrac => analyser.lbrac(symbol.raw.value)?,
            ParsedSymbolKind::RBrac => analyser.rbrac(symbol.raw.value)?,
            ParsedSymbolKind::FunctionEnd => analyser.function_end()?,
            ParsedSymbolKind::NonStabs => {
                if symbol.raw.storage_class == SymbolClass::Text {
                    match symbol.raw.storage_type {
                        StorageType::Proc => {
                            analyser.procedure(symbol.raw.string, symbol.raw.value, false)?;
                        }
                        StorageType::StaticProc => {
                            analyser.procedure(symbol.raw.string, symbol.raw.value, true)?;
                        }
                        StorageType::Label => {
                            analyser.label(
                                symbol.raw.string,
                                symbol.raw.value,
                                symbol.raw.index as i32,
                            )?;
                        }
                        StorageType::End => {
                            analyser.text_end(symbol.raw.string, symbol.raw.value as i32)?;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    analyser.finish()
}

fn finish_import(database: &mut SymbolDatabase, flags: u32, source: SymbolSourceHandle) {
    // Types that only ever appeared in a single file were probably defined in
    // a .c/.cpp file rather than a header. Later passes modify the file
    // lists, so this has to be decided now.
    for data_type in database.data_types.iter_mut() {
        if data_type.source == source && data_type.files.len() == 1 {
            data_type.probably_defined_in_cpp_file = true;
        }
    }

    apply_ast_filters(database, flags);
    compute_sizes(database);
}

enum AnalysisState {
    NotInFunction,
    InFunctionBeginning,
    InFunctionEnd,
}

pub struct LocalSymbolTableAnalyser<'a, 'b> {
    database: &'b mut SymbolDatabase,
    context: &'b AnalysisContext<'a>,
    ast_state: &'b StabsToAstState<'b>,
    source_file: SourceFileHandle,
    state: AnalysisState,
    functions: Option<SymbolRange<FunctionHandle>>,
    global_variables: Option<SymbolRange<GlobalVariableHandle>>,
    current_function: Option<FunctionHandle>,
    current_parameter_variables: Option<SymbolRange<ParameterVariableHandle>>,
    current_local_variables: Option<SymbolRange<LocalVariableHandle>>,
    pending_local_variables: Vec<LocalVariableHandle>,
    block_stack: Vec<Vec<LocalVariableHandle>>,
    next_relative_path: String,
}

impl<'a, 'b> LocalSymbolTableAnalyser<'a, 'b> {
    fn source_file(&mut self, path: &str, text_address: u32) -> Result<()> {
        if let Some(file) = self.database.source_files.symbol_from_handle_mut(self.source_file) {
            file.relative_path = path.to_string();
            file.text_address = Some(text_address);
            if self.next_relative_path.is_empty() {
                self.next_relative_path = path.to_string();
            }
        }
        Ok(())
    }

    fn sub_source_file(&mut self, path: &str, text_address: u32) -> Result<()> {
        if let (Some(function), AnalysisState::InFunctionBeginning) =
            (self.current_function, &self.state)
        {
            if let Some(function) = self.database.functions.symbol_from_handle_mut(function) {
                function
                    .sub_source_files
                    .push((text_address, path.to_string()));
            }
        } else {
            self.next_relative_path = path.to_string();
        }
        Ok(())
    }

    fn data_type(&mut self, symbol: &StabsSymbol) -> Result<()> {
        let node = stabs_data_type_symbol_to_ast(symbol, self.ast_state)?;
        let name = node.name.clone();

        if self.context.flags & DONT_DEDUPLICATE_TYPES != 0 {
            let number = node.stabs_type_number;
            let data_type = self
                .database
                .data_types
                .create_symbol(&name, self.context.source, None);
            let handle = data_type.handle;
            data_type.files = vec![self.source_file];
            data_type.source_file = Some(self.source_file);
            data_type.ty = Some(node);
            if number.valid() {
                if let Some(file) = self
                    .database
                    .source_files
                    .symbol_from_handle_mut(self.source_file)
                {
                    file.stabs_type_number_to_handle.insert(number, handle);
                }
            }
        } else {
            self.database.create_data_type_if_unique(
                node,
                &name,
                self.source_file,
                self.context.source,
            );
        }

        Ok(())
    }

    fn global_variable(
        &mut self,
        name: &str,
        address: Option<u32>,
        ty: &StabsType,
        is_static: bool,
        location: GlobalStorageLocation,
    ) -> Result<()> {
        let mut node = stabs_type_to_ast_and_handle_errors(ty, self.ast_state, true, false);
        if is_static {
            node.storage_class = StorageClass::Static;
        }

        let demangled = self.demangle(name);
        let global = self
            .database
            .global_variables
            .create_symbol(name, self.context.source, address);
        let handle = global.handle;
        global.demangled_name = demangled;
        if is_static {
            global.storage_class = StorageClass::Static;
        }
        global.ty = Some(node);
        global.storage = GlobalStorage { location, address };

        SymbolRange::expand_to_include(&mut self.global_variables, handle);

        Ok(())
    }

    fn procedure(&mut self, name: &str, address: u32, is_static: bool) -> Result<()> {
        if !self.is_current_function(name) {
            self.create_function(address, name)?;
        }

        if is_static {
            if let Some(function) = self.current_function_mut() {
                function.storage_class = StorageClass::Static;
            }
        }

        self.pending_local_variables.clear();
        self.block_stack.clear();

        Ok(())
    }

    fn label(&mut self, label: &str, address: u32, line_number: i32) -> Result<()> {
        if label.starts_with('$') {
            if let Some(function) = self.current_function_mut() {
                function.line_numbers.push((address, line_number));
            }
        }
        Ok(())
    }

    fn text_end(&mut self, _name: &str, function_size: i32) -> Result<()> {
        if matches!(self.state, AnalysisState::InFunctionBeginning) {
            if let Some(function) = self.current_function_mut() {
                function.size = function_size as u32;
            }
            self.state = AnalysisState::InFunctionEnd;
        }
        Ok(())
    }

    fn function(&mut self, name: &str, return_type: &StabsType, address: u32) -> Result<()> {
        if !self.is_current_function(name) {
            self.create_function(address, name)?;
        }

        let node = stabs_type_to_ast_and_handle_errors(return_type, self.ast_state, true, true);
        if let Some(function) = self.current_function_mut() {
            function.ty = Some(node);
        }

        Ok(())
    }

    fn function_end(&mut self) -> Result<()> {
        self.flush_current_function();
        Ok(())
    }

    fn parameter(
        &mut self,
        name: &str,
        ty: &StabsType,
        is_stack_variable: bool,
        offset_or_register: i32,
        is_by_reference: bool,
    ) -> Result<()> {
        if self.current_function.is_none() {
            return Err(Error::Fatal(
                "parameter symbol before first func/proc symbol".to_string(),
            ));
        }

        let node = stabs_type_to_ast_and_handle_errors(ty, self.ast_state, true, true);
        let parameter = self
            .database
            .parameter_variables
            .create_symbol(name, self.context.source, None);
        let handle = parameter.handle;
        parameter.ty = Some(node);
        parameter.storage = if is_stack_variable {
            Storage::Stack(StackStorage {
                stack_pointer_offset: offset_or_register,
            })
        } else {
            Storage::Register(RegisterStorage {
                dbx_register_number: offset_or_register,
                is_by_reference,
            })
        };

        SymbolRange::expand_to_include(&mut self.current_parameter_variables, handle);

        Ok(())
    }

    fn local_variable(
        &mut self,
        name: &str,
        ty: &StabsType,
        storage: Storage,
        is_static: bool,
    ) -> Result<()> {
        if self.current_function.is_none() {
            return Ok(());
        }

        let mut node = stabs_type_to_ast_and_handle_errors(ty, self.ast_state, true, false);
        if is_static {
            node.storage_class = StorageClass::Static;
        }

        let address = match &storage {
            Storage::Global(global) => global.address,
            _ => None,
        };
        let local = self
            .database
            .local_variables
            .create_symbol(name, self.context.source, address);
        let handle = local.handle;
        local.ty = Some(node);
        local.storage = storage;

        self.pending_local_variables.push(handle);
        SymbolRange::expand_to_include(&mut self.current_local_variables, handle);

        Ok(())
    }

    fn lbrac(&mut self, begin_offset: u32) -> Result<()> {
        let text_address = self.text_address();
        for &handle in &self.pending_local_variables {
            if let Some(local) = self.database.local_variables.symbol_from_handle_mut(handle) {
                local.live_range.0 = Some(text_address.wrapping_add(begin_offset));
            }
        }
        self.block_stack
            .push(std::mem::take(&mut self.pending_local_variables));
        Ok(())
    }

    fn rbrac(&mut self, end_offset: u32) -> Result<()> {
        let text_address = self.text_address();
        let block = self.block_stack.pop().ok_or_else(|| {
            Error::Fatal("RBRAC symbol without a matching LBRAC symbol".to_string())
        })?;
        for handle in block {
            if let Some(local) = self.database.local_variables.symbol_from_handle_mut(handle) {
                local.live_range.1 = Some(text_address.wrapping_add(end_offset));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        if matches!(self.state, AnalysisState::InFunctionBeginning) {
            let name = self
                .database
                .source_files
                .symbol_from_handle(self.source_file)
                .map(|file| file.name.clone())
                .unwrap_or_default();
            return Err(Error::Fatal(format!(
                "unexpected end of symbol table for '{name}'"
            )));
        }
        if !self.block_stack.is_empty() {
            return Err(Error::Fatal(
                "LBRAC symbol without a matching RBRAC symbol".to_string(),
            ));
        }

        self.flush_current_function();

        self.database
            .set_source_file_functions(self.source_file, self.functions);
        self.database
            .set_source_file_global_variables(self.source_file, self.global_variables);

        Ok(())
    }

    fn create_function(&mut self, address: u32, name: &str) -> Result<()> {
        self.flush_current_function();

        let demangled = self.demangle(name);
        let function = self
            .database
            .functions
            .create_symbol(name, self.context.source, Some(address));
        let handle = function.handle;
        function.demangled_name = demangled;

        self.current_function = Some(handle);
        SymbolRange::expand_to_include(&mut self.functions, handle);
        self.state = AnalysisState::InFunctionBeginning;

        if !self.next_relative_path.is_empty() {
            let relative_path = self.next_relative_path.clone();
            if let Some(function) = self.current_function_mut() {
                function.relative_path = relative_path;
            }
        }

        Ok(())
    }

    /// Hands the accumulated parameter and local variables to the function
    /// being closed.
    fn flush_current_function(&mut self) {
        if let Some(function) = self.current_function.take() {
            self.database
                .set_function_parameter_variables(function, self.current_parameter_variables);
            self.database
                .set_function_local_variables(function, self.current_local_variables);
        }
        self.current_parameter_variables = None;
        self.current_local_variables = None;
        self.pending_local_variables.clear();
    }

    /// GCC writes function stabs without the leading underscore that the
    /// corresponding procedure records carry, so one leading underscore is
    /// ignored when matching them up.
    fn is_current_function(&self, name: &str) -> bool {
        let Some(current) = self
            .current_function
            .and_then(|handle| self.database.functions.symbol_from_handle(handle))
        else {
            return false;
        };
        let current = current.name.as_str();
        current == name
            || current.strip_prefix('_') == Some(name)
            || name.strip_prefix('_') == Some(current)
    }

    fn current_function_mut(&mut self) -> Option<&mut crate::database::Function> {
        self.current_function
            .and_then(|handle| self.database.functions.symbol_from_handle_mut(handle))
    }

    fn text_address(&self) -> u32 {
        self.database
            .source_files
            .symbol_from_handle(self.source_file)
            .and_then(|file| file.text_address)
            .unwrap_or(0)
    }

    fn demangle(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        self.context.demangler.and_then(|demangle| demangle(name))
    }
}

fn symbol_class_to_location(symbol_class: SymbolClass) -> Option<GlobalStorageLocation> {
    match symbol_class {
        SymbolClass::Nil => Some(GlobalStorageLocation::Nil),
        SymbolClass::Data => Some(GlobalStorageLocation::Data),
        SymbolClass::Bss => Some(GlobalStorageLocation::Bss),
        SymbolClass::Abs => Some(GlobalStorageLocation::Abs),
        SymbolClass::SData => Some(GlobalStorageLocation::SData),
        SymbolClass::SBss => Some(GlobalStorageLocation::SBss),
        SymbolClass::RData => Some(GlobalStorageLocation::RData),
        SymbolClass::Common => Some(GlobalStorageLocation::Common),
        SymbolClass::SCommon => Some(GlobalStorageLocation::SCommon),
        _ => None,
    }
}

/// Applies the strip flags to every type node in the database.
fn apply_ast_filters(database: &mut SymbolDatabase, flags: u32) {
    if flags & (STRIP_ACCESS_SPECIFIERS | STRIP_MEMBER_FUNCTIONS | STRIP_GENERATED_FUNCTIONS) == 0 {
        return;
    }
    for_each_type_node_mut(database, &mut |node| filter_node(node, flags));
}

fn filter_node(node: &mut Node, flags: u32) {
    if flags & STRIP_ACCESS_SPECIFIERS != 0 {
        node.access_specifier = crate::ast::AccessSpecifier::Public;
    }
    if let NodeKind::StructOrUnion(struct_or_union) = &mut node.kind {
        if flags & STRIP_MEMBER_FUNCTIONS != 0 {
            struct_or_union.member_functions.clear();
        } else if flags & STRIP_GENERATED_FUNCTIONS != 0 {
            let name_no_template_args =
                node.name.split('<').next().unwrap_or(&node.name).to_string();
            let is_special = |function: &Node| {
                let parameter_count = match &function.kind {
                    NodeKind::FunctionType(function_type) => function_type
                        .parameters
                        .as_ref()
                        .map(|parameters| parameters.len())
                        .unwrap_or(0),
                    _ => return false,
                };
                function.name == "operator="
                    || function.name.starts_with('$')
                    || (function.name == name_no_template_args && parameter_count == 0)
            };
            let only_special_functions = struct_or_union
                .member_functions
                .iter()
                .filter(|function| matches!(function.kind, NodeKind::FunctionType(_)))
                .all(|function| is_special(function));
            if only_special_functions {
                struct_or_union
                    .member_functions
                    .retain(|function| !is_special(function));
            }
        }
    }
    for child in node.children_mut() {
        filter_node(child, flags);
    }
}

/// Fills in `computed_size_bytes` for every node. Type names resolve through
/// the database, so data types are processed repeatedly until the sizes stop
/// propagating.
fn compute_sizes(database: &mut SymbolDatabase) {
    let data_type_handles: Vec<_> = database.data_types.iter().map(|d| d.handle).collect();
    let mut changed = true;
    let mut passes = 0;
    while changed && passes < 16 {
        changed = false;
        passes += 1;
        for &handle in &data_type_handles {
            let Some(mut node) = database
                .data_types
                .symbol_from_handle_mut(handle)
                .and_then(|data_type| data_type.ty.take())
            else {
                continue;
            };
            changed |= compute_size_bytes(&mut node, database);
            if let Some(data_type) = database.data_types.symbol_from_handle_mut(handle) {
                data_type.ty = Some(node);
            }
        }
    }

    let function_handles: Vec<_> = database.functions.iter().map(|f| f.handle).collect();
    for handle in function_handles {
        if let Some(mut node) = database
            .functions
            .symbol_from_handle_mut(handle)
            .and_then(|function| function.ty.take())
        {
            compute_size_bytes(&mut node, database);
            if let Some(function) = database.functions.symbol_from_handle_mut(handle) {
                function.ty = Some(node);
            }
        }
    }
    let global_handles: Vec<_> = database.global_variables.iter().map(|g| g.handle).collect();
    for handle in global_handles {
        if let Some(mut node) = database
            .global_variables
            .symbol_from_handle_mut(handle)
            .and_then(|global| global.ty.take())
        {
            compute_size_bytes(&mut node, database);
            if let Some(global) = database.global_variables.symbol_from_handle_mut(handle) {
                global.ty = Some(node);
            }
        }
    }
    let local_handles: Vec<_> = database.local_variables.iter().map(|l| l.handle).collect();
    for handle in local_handles {
        if let Some(mut node) = database
            .local_variables
            .symbol_from_handle_mut(handle)
            .and_then(|local| local.ty.take())
        {
            compute_size_bytes(&mut node, database);
            if let Some(local) = database.local_variables.symbol_from_handle_mut(handle) {
                local.ty = Some(node);
            }
        }
    }
}

/// Postorder size computation for one tree. Returns true if any node gained
/// a size.
fn compute_size_bytes(node: &mut Node, database: &SymbolDatabase) -> bool {
    let mut changed = false;
    for child in node.children_mut() {
        changed |= compute_size_bytes(child, database);
    }

    if node.computed_size_bytes > -1 {
        return changed;
    }

    let computed = match &node.kind {
        NodeKind::Array(array) => {
            if array.element_type.computed_size_bytes > -1 {
                Some(array.element_type.computed_size_bytes * array.element_count)
            } else {
                None
            }
        }
        NodeKind::BuiltIn(builtin) => Some(crate::ast::builtin_class_size(builtin.bclass)),
        NodeKind::Enum(_) => Some(4),
        NodeKind::StructOrUnion(_) => Some(node.size_bits / 8),
        NodeKind::PointerOrReference(_) => Some(4),
        NodeKind::TypeName(type_name) => database
            .lookup_type(type_name, false)
            .and_then(|handle| database.data_types.symbol_from_handle(handle))
            .and_then(|data_type| data_type.ty.as_ref())
            .and_then(|resolved| {
                if resolved.computed_size_bytes > -1 {
                    Some(resolved.computed_size_bytes)
                } else {
                    None
                }
            }),
        _ => None,
    };

    if let Some(computed) = computed {
        node.computed_size_bytes = computed;
        changed = true;
    }

    changed
}

/// Adds pointers from member function declarations to their definitions
/// using the demangled names as a heuristic.
pub fn fill_in_pointers_to_member_function_definitions(database: &mut SymbolDatabase) {
    let functions: Vec<(FunctionHandle, String)> = database
        .functions
        .iter()
        .map(|function| (function.handle, function.demangled_name().to_string()))
        .collect();

    for (function_handle, demangled_name) in functions {
        let Some(name_separator_pos) = demangled_name.rfind("::") else {
            continue;
        };
        let function_name = demangled_name[name_separator_pos + 2..].to_string();
        // This won't work for some template types, and that's okay.
        let qualifier = &demangled_name[..name_separator_pos];
        let type_name = match qualifier.rfind("::") {
            Some(type_separator_pos) => &qualifier[type_separator_pos + 2..],
            None => qualifier,
        };

        let mut is_member_function_ish = false;
        for data_type_handle in database.data_types.handles_from_name(type_name) {
            let Some(data_type) = database.data_types.symbol_from_handle_mut(data_type_handle)
            else {
                continue;
            };
            if let Some(node) = &mut data_type.ty {
                if let NodeKind::StructOrUnion(struct_or_union) = &mut node.kind {
                    for declaration in &mut struct_or_union.member_functions {
                        if declaration.name == function_name {
                            if let NodeKind::FunctionType(function_type) = &mut declaration.kind {
                                function_type.definition_handle = Some(function_handle.0);
                                is_member_function_ish = true;
                            }
                        }
                    }
                }
            }
        }
        if is_member_function_ish {
            if let Some(function) = database.functions.symbol_from_handle_mut(function_handle) {
                function.is_member_function_ish = true;
            }
        }
    }
}

fn for_each_type_node_mut(database: &mut SymbolDatabase, callback: &mut impl FnMut(&mut Node)) {
    for data_type in database.data_types.iter_mut() {
        if let Some(node) = &mut data_type.ty {
            callback(node);
        }
    }
    for function in database.functions.iter_mut() {
        if let Some(node) = &mut function.ty {
            callback(node);
        }
    }
    for global in database.global_variables.iter_mut() {
        if let Some(node) = &mut global.ty {
            callback(node);
        }
    }
    for local in database.local_variables.iter_mut() {
        if let Some(node) = &mut local.ty {
            callback(node);
        }
    }
    for parameter in database.parameter_variables.iter_mut() {
        if let Some(node) = &mut parameter.ty {
            callback(node);
        }
    }
}
