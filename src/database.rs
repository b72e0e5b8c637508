//! The symbol database.
//!
//! Symbols are owned by handle-indexed lists, one per symbol type. Handles
//! are monotonically increasing and never reused, so they stay valid for the
//! lifetime of the database even as symbols are created and destroyed, and
//! iteration order always reflects the order of first definition.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexSet;

use crate::ast::{self, Node, NodeKind, StorageClass};
use crate::stabs::StabsTypeNumber;

pub trait SymbolHandle: Copy + Eq {
    fn from_value(value: u32) -> Self;
    fn value(self) -> u32;
}

macro_rules! symbol_handle {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl SymbolHandle for $name {
            fn from_value(value: u32) -> $name {
                $name(value)
            }

            fn value(self) -> u32 {
                self.0
            }
        }
    };
}

symbol_handle!(DataTypeHandle);
symbol_handle!(FunctionHandle);
symbol_handle!(GlobalVariableHandle);
symbol_handle!(LabelHandle);
symbol_handle!(LocalVariableHandle);
symbol_handle!(ParameterVariableHandle);
symbol_handle!(SectionHandle);
symbol_handle!(SourceFileHandle);
symbol_handle!(SymbolSourceHandle);

/// A contiguous run of handles. The last handle points at the last real
/// element of the run, not one past it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolRange<H> {
    pub first: H,
    pub last: H,
}

impl<H: SymbolHandle> SymbolRange<H> {
    pub fn expand_to_include(range: &mut Option<SymbolRange<H>>, handle: H) {
        match range {
            Some(range) => {
                debug_assert!(range.last.value() < handle.value());
                range.last = handle;
            }
            None => {
                *range = Some(SymbolRange {
                    first: handle,
                    last: handle,
                });
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlobalStorageLocation {
    #[default]
    Nil,
    Data,
    Bss,
    Abs,
    SData,
    SBss,
    RData,
    Common,
    SCommon,
}

pub fn global_storage_location_to_string(location: GlobalStorageLocation) -> &'static str {
    match location {
        GlobalStorageLocation::Nil => "nil",
        GlobalStorageLocation::Data => "data",
        GlobalStorageLocation::Bss => "bss",
        GlobalStorageLocation::Abs => "abs",
        GlobalStorageLocation::SData => "sdata",
        GlobalStorageLocation::SBss => "sbss",
        GlobalStorageLocation::RData => "rdata",
        GlobalStorageLocation::Common => "common",
        GlobalStorageLocation::SCommon => "scommon",
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalStorage {
    pub location: GlobalStorageLocation,
    pub address: Option<u32>,
}

#[derive(Clone, Copy, Debug)]
pub struct RegisterStorage {
    pub dbx_register_number: i32,
    pub is_by_reference: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct StackStorage {
    pub stack_pointer_offset: i32,
}

/// Where a variable lives at runtime.
#[derive(Clone, Copy, Debug)]
pub enum Storage {
    Global(GlobalStorage),
    Register(RegisterStorage),
    Stack(StackStorage),
}

impl Default for Storage {
    fn default() -> Storage {
        Storage::Global(GlobalStorage::default())
    }
}

/// Implemented by all the symbol types stored in a [`SymbolList`].
pub trait Symbol: Default {
    type Handle: SymbolHandle;

    const KIND_NAME: &'static str;
    const WITH_ADDRESS_MAP: bool;
    const WITH_NAME_MAP: bool;

    fn handle_value(&self) -> u32;
    fn set_handle(&mut self, value: u32);
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn source(&self) -> SymbolSourceHandle;
    fn set_source(&mut self, source: SymbolSourceHandle);
    fn address(&self) -> Option<u32>;
    fn set_address(&mut self, address: Option<u32>);
    fn type_node(&self) -> Option<&Node>;
    fn type_node_mut(&mut self) -> Option<&mut Node>;

    fn handle(&self) -> Self::Handle {
        Self::Handle::from_value(self.handle_value())
    }
}

macro_rules! impl_symbol {
    ($symbol:ident, $handle:ident, $kind_name:literal, address: $address:literal, name_map: $name_map:literal) => {
        impl Symbol for $symbol {
            type Handle = $handle;

            const KIND_NAME: &'static str = $kind_name;
            const WITH_ADDRESS_MAP: bool = $address;
            const WITH_NAME_MAP: bool = $name_map;

            fn handle_value(&self) -> u32 {
                self.handle.0
            }

            fn set_handle(&mut self, value: u32) {
                self.handle = $handle(value);
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn source(&self) -> SymbolSourceHandle {
                self.source
            }

            fn set_source(&mut self, source: SymbolSourceHandle) {
                self.source = source;
            }

            fn address(&self) -> Option<u32> {
                self.address_ref()
            }

            fn set_address(&mut self, address: Option<u32>) {
                self.set_address_impl(address);
            }

            fn type_node(&self) -> Option<&Node> {
                self.ty.as_ref()
            }

            fn type_node_mut(&mut self) -> Option<&mut Node> {
                self.ty.as_mut()
            }
        }
    };
}

/// A data type recovered from one or more translation units.
#[derive(Debug, Default)]
pub struct DataType {
    pub handle: DataTypeHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub ty: Option<Node>,
    /// The files in which this exact type was observed.
    pub files: Vec<SourceFileHandle>,
    pub conflict: bool,
    pub compare_fail_reason: Option<&'static str>,
    pub probably_defined_in_cpp_file: bool,
    /// Only populated when types are not being deduplicated.
    pub source_file: Option<SourceFileHandle>,
}

impl DataType {
    fn address_ref(&self) -> Option<u32> {
        None
    }

    fn set_address_impl(&mut self, _address: Option<u32>) {}
}

impl_symbol!(DataType, DataTypeHandle, "data type", address: false, name_map: true);

#[derive(Debug, Default)]
pub struct Function {
    pub handle: FunctionHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub demangled_name: Option<String>,
    pub address: Option<u32>,
    /// The return type.
    pub ty: Option<Node>,
    pub size: u32,
    pub storage_class: StorageClass,
    pub relative_path: String,
    pub line_numbers: Vec<(u32, i32)>,
    pub sub_source_files: Vec<(u32, String)>,
    pub is_member_function_ish: bool,
    pub source_file: Option<SourceFileHandle>,
    pub parameter_variables: Option<SymbolRange<ParameterVariableHandle>>,
    pub local_variables: Option<SymbolRange<LocalVariableHandle>>,
}

impl Function {
    fn address_ref(&self) -> Option<u32> {
        self.address
    }

    fn set_address_impl(&mut self, address: Option<u32>) {
        self.address = address;
    }

    pub fn demangled_name(&self) -> &str {
        self.demangled_name.as_deref().unwrap_or(&self.name)
    }
}

impl_symbol!(Function, FunctionHandle, "function", address: true, name_map: true);

#[derive(Debug, Default)]
pub struct GlobalVariable {
    pub handle: GlobalVariableHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub demangled_name: Option<String>,
    pub ty: Option<Node>,
    pub size: u32,
    pub storage_class: StorageClass,
    pub storage: GlobalStorage,
    pub source_file: Option<SourceFileHandle>,
    /// The refined value of the variable, if data refinement ran.
    pub data: Option<Node>,
}

impl GlobalVariable {
    fn address_ref(&self) -> Option<u32> {
        self.storage.address
    }

    fn set_address_impl(&mut self, address: Option<u32>) {
        self.storage.address = address;
    }

    pub fn demangled_name(&self) -> &str {
        self.demangled_name.as_deref().unwrap_or(&self.name)
    }
}

impl_symbol!(GlobalVariable, GlobalVariableHandle, "global variable", address: true, name_map: true);

#[derive(Debug, Default)]
pub struct Label {
    pub handle: LabelHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub address: Option<u32>,
    pub ty: Option<Node>,
}

impl Label {
    fn address_ref(&self) -> Option<u32> {
        self.address
    }

    fn set_address_impl(&mut self, address: Option<u32>) {
        self.address = address;
    }
}

impl_symbol!(Label, LabelHandle, "label", address: true, name_map: false);

#[derive(Debug, Default)]
pub struct LocalVariable {
    pub handle: LocalVariableHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub ty: Option<Node>,
    pub storage: Storage,
    /// Address range over which the variable is live, filled in from the
    /// surrounding block brackets.
    pub live_range: (Option<u32>, Option<u32>),
    pub function: Option<FunctionHandle>,
    pub data: Option<Node>,
}

impl LocalVariable {
    fn address_ref(&self) -> Option<u32> {
        match &self.storage {
            Storage::Global(global) => global.address,
            _ => None,
        }
    }

    fn set_address_impl(&mut self, address: Option<u32>) {
        if let Storage::Global(global) = &mut self.storage {
            global.address = address;
        }
    }
}

impl_symbol!(LocalVariable, LocalVariableHandle, "local variable", address: true, name_map: false);

#[derive(Debug, Default)]
pub struct ParameterVariable {
    pub handle: ParameterVariableHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub ty: Option<Node>,
    pub storage: Storage,
    pub function: Option<FunctionHandle>,
}

impl ParameterVariable {
    fn address_ref(&self) -> Option<u32> {
        None
    }

    fn set_address_impl(&mut self, _address: Option<u32>) {}
}

impl_symbol!(ParameterVariable, ParameterVariableHandle, "parameter variable", address: false, name_map: false);

#[derive(Debug, Default)]
pub struct Section {
    pub handle: SectionHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub address: Option<u32>,
    pub size: u32,
    pub ty: Option<Node>,
}

impl Section {
    fn address_ref(&self) -> Option<u32> {
        self.address
    }

    fn set_address_impl(&mut self, address: Option<u32>) {
        self.address = address;
    }
}

impl_symbol!(Section, SectionHandle, "section", address: true, name_map: true);

#[derive(Debug, Default)]
pub struct SourceFile {
    pub handle: SourceFileHandle,
    pub source: SymbolSourceHandle,
    /// The full path from the file descriptor.
    pub name: String,
    pub relative_path: String,
    pub text_address: Option<u32>,
    pub ty: Option<Node>,
    pub stabs_type_number_to_handle: BTreeMap<StabsTypeNumber, DataTypeHandle>,
    pub toolchain_version_info: IndexSet<String>,
    pub functions: Option<SymbolRange<FunctionHandle>>,
    pub global_variables: Option<SymbolRange<GlobalVariableHandle>>,
}

impl SourceFile {
    fn address_ref(&self) -> Option<u32> {
        None
    }

    fn set_address_impl(&mut self, _address: Option<u32>) {}

    pub fn full_path(&self) -> &str {
        &self.name
    }
}

impl_symbol!(SourceFile, SourceFileHandle, "source file", address: false, name_map: false);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SymbolSourceKind {
    #[default]
    SymbolTable,
    Analysis,
    UserDefined,
}

#[derive(Debug, Default)]
pub struct SymbolSource {
    pub handle: SymbolSourceHandle,
    pub source: SymbolSourceHandle,
    pub name: String,
    pub kind: SymbolSourceKind,
    pub ty: Option<Node>,
}

impl SymbolSource {
    fn address_ref(&self) -> Option<u32> {
        None
    }

    fn set_address_impl(&mut self, _address: Option<u32>) {}
}

impl_symbol!(SymbolSource, SymbolSourceHandle, "symbol source", address: false, name_map: false);

/// An ordered container of symbols of one type, with by-handle, by-name and
/// by-address lookup.
#[derive(Debug)]
pub struct SymbolList<T: Symbol> {
    symbols: Vec<T>,
    next_handle: u32,
    address_to_handle: HashMap<u32, u32>,
    name_to_handles: HashMap<String, Vec<u32>>,
}

impl<T: Symbol> Default for SymbolList<T> {
    fn default() -> SymbolList<T> {
        SymbolList {
            symbols: Vec::new(),
            next_handle: 0,
            address_to_handle: HashMap::new(),
            name_to_handles: HashMap::new(),
        }
    }
}

impl<T: Symbol> SymbolList<T> {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.symbols.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.symbols.iter_mut()
    }

    fn index_of(&self, handle_value: u32) -> Option<usize> {
        self.symbols
            .binary_search_by_key(&handle_value, |symbol| symbol.handle_value())
            .ok()
    }

    pub fn symbol_from_handle(&self, handle: T::Handle) -> Option<&T> {
        self.index_of(handle.value()).map(|index| &self.symbols[index])
    }

    pub fn symbol_from_handle_mut(&mut self, handle: T::Handle) -> Option<&mut T> {
        self.index_of(handle.value())
            .map(|index| &mut self.symbols[index])
    }

    /// The position of a symbol in iteration order, used by the JSON writer
    /// to emit stable indices.
    pub fn index_from_handle(&self, handle: T::Handle) -> Option<usize> {
        self.index_of(handle.value())
    }

    pub fn handles_from_name(&self, name: &str) -> Vec<T::Handle> {
        self.name_to_handles
            .get(name)
            .map(|handles| handles.iter().map(|&value| T::Handle::from_value(value)).collect())
            .unwrap_or_default()
    }

    pub fn first_handle_from_name(&self, name: &str) -> Option<T::Handle> {
        self.name_to_handles
            .get(name)
            .and_then(|handles| handles.first())
            .map(|&value| T::Handle::from_value(value))
    }

    pub fn first_handle_from_address(&self, address: u32) -> Option<T::Handle> {
        self.address_to_handle
            .get(&address)
            .map(|&value| T::Handle::from_value(value))
    }

    /// Iterates over the symbols in a range in handle order.
    pub fn span(&self, range: Option<SymbolRange<T::Handle>>) -> &[T] {
        let Some(range) = range else {
            return &[];
        };
        let first = self
            .symbols
            .partition_point(|symbol| symbol.handle_value() < range.first.value());
        let last = self
            .symbols
            .partition_point(|symbol| symbol.handle_value() <= range.last.value());
        &self.symbols[first..last]
    }

    pub fn span_mut(&mut self, range: Option<SymbolRange<T::Handle>>) -> &mut [T] {
        let Some(range) = range else {
            return &mut [];
        };
        let first = self
            .symbols
            .partition_point(|symbol| symbol.handle_value() < range.first.value());
        let last = self
            .symbols
            .partition_point(|symbol| symbol.handle_value() <= range.last.value());
        &mut self.symbols[first..last]
    }

    /// Creates a new symbol. If another symbol of the same type exists at the
    /// same address it is destroyed and replaced.
    pub fn create_symbol(
        &mut self,
        name: &str,
        source: SymbolSourceHandle,
        address: Option<u32>,
    ) -> &mut T {
        let handle_value = self.next_handle;
        self.next_handle += 1;

        if T::WITH_ADDRESS_MAP {
            if let Some(address) = address {
                if let Some(&existing) = self.address_to_handle.get(&address) {
                    self.destroy_symbol(T::Handle::from_value(existing));
                }
                self.address_to_handle.insert(address, handle_value);
            }
        }
        if T::WITH_NAME_MAP {
            self.name_to_handles
                .entry(name.to_string())
                .or_default()
                .push(handle_value);
        }

        let mut symbol = T::default();
        symbol.set_handle(handle_value);
        symbol.set_name(name.to_string());
        symbol.set_source(source);
        symbol.set_address(address);
        self.symbols.push(symbol);
        self.symbols.last_mut().unwrap()
    }

    pub fn destroy_symbol(&mut self, handle: T::Handle) -> bool {
        let Some(index) = self.index_of(handle.value()) else {
            return false;
        };
        self.unlink_maps(index);
        self.symbols.remove(index);
        true
    }

    /// Destroys all the symbols from a given symbol source. For example, this
    /// can be used to free a symbol table without destroying user-defined
    /// symbols.
    pub fn destroy_symbols_from_source(&mut self, source: SymbolSourceHandle) {
        let mut index = 0;
        while index < self.symbols.len() {
            if self.symbols[index].source() == source {
                self.unlink_maps(index);
                self.symbols.remove(index);
            } else {
                index += 1;
            }
        }
    }

    fn unlink_maps(&mut self, index: usize) {
        let symbol = &self.symbols[index];
        if T::WITH_ADDRESS_MAP {
            if let Some(address) = symbol.address() {
                if self.address_to_handle.get(&address) == Some(&symbol.handle_value()) {
                    self.address_to_handle.remove(&address);
                }
            }
        }
        if T::WITH_NAME_MAP {
            if let Some(handles) = self.name_to_handles.get_mut(symbol.name()) {
                handles.retain(|&value| value != symbol.handle_value());
                if handles.is_empty() {
                    self.name_to_handles.remove(symbol.name());
                }
            }
        }
    }
}

impl<'a, T: Symbol> IntoIterator for &'a SymbolList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

impl SymbolList<SymbolSource> {
    /// Symbol sources have no source of their own, so they point at
    /// themselves.
    pub fn create_source(&mut self, name: &str, kind: SymbolSourceKind) -> SymbolSourceHandle {
        let handle = SymbolSourceHandle(self.next_handle);
        let source = self.create_symbol(name, handle, None);
        source.kind = kind;
        handle
    }
}

/// The database that owns all the symbols.
#[derive(Debug, Default)]
pub struct SymbolDatabase {
    pub data_types: SymbolList<DataType>,
    pub functions: SymbolList<Function>,
    pub global_variables: SymbolList<GlobalVariable>,
    pub labels: SymbolList<Label>,
    pub local_variables: SymbolList<LocalVariable>,
    pub parameter_variables: SymbolList<ParameterVariable>,
    pub sections: SymbolList<Section>,
    pub source_files: SymbolList<SourceFile>,
    pub symbol_sources: SymbolList<SymbolSource>,
}

impl SymbolDatabase {
    pub fn new() -> SymbolDatabase {
        SymbolDatabase::default()
    }

    pub fn destroy_symbols_from_source(&mut self, source: SymbolSourceHandle) {
        self.data_types.destroy_symbols_from_source(source);
        self.functions.destroy_symbols_from_source(source);
        self.global_variables.destroy_symbols_from_source(source);
        self.labels.destroy_symbols_from_source(source);
        self.local_variables.destroy_symbols_from_source(source);
        self.parameter_variables.destroy_symbols_from_source(source);
        self.sections.destroy_symbols_from_source(source);
        self.source_files.destroy_symbols_from_source(source);
        self.symbol_sources.destroy_symbols_from_source(source);
    }

    /// Assigns the parameter variables in `range` to a function and links
    /// them back to it.
    pub fn set_function_parameter_variables(
        &mut self,
        function: FunctionHandle,
        range: Option<SymbolRange<ParameterVariableHandle>>,
    ) {
        for parameter in self.parameter_variables.span_mut(range) {
            parameter.function = Some(function);
        }
        if let Some(symbol) = self.functions.symbol_from_handle_mut(function) {
            symbol.parameter_variables = range;
        }
    }

    pub fn set_function_local_variables(
        &mut self,
        function: FunctionHandle,
        range: Option<SymbolRange<LocalVariableHandle>>,
    ) {
        for local in self.local_variables.span_mut(range) {
            local.function = Some(function);
        }
        if let Some(symbol) = self.functions.symbol_from_handle_mut(function) {
            symbol.local_variables = range;
        }
    }

    pub fn set_source_file_functions(
        &mut self,
        source_file: SourceFileHandle,
        range: Option<SymbolRange<FunctionHandle>>,
    ) {
        for function in self.functions.span_mut(range) {
            function.source_file = Some(source_file);
        }
        if let Some(symbol) = self.source_files.symbol_from_handle_mut(source_file) {
            symbol.functions = range;
        }
    }

    pub fn set_source_file_global_variables(
        &mut self,
        source_file: SourceFileHandle,
        range: Option<SymbolRange<GlobalVariableHandle>>,
    ) {
        for global in self.global_variables.span_mut(range) {
            global.source_file = Some(source_file);
        }
        if let Some(symbol) = self.source_files.symbol_from_handle_mut(source_file) {
            symbol.global_variables = range;
        }
    }

    /// Resolves a type name node to a data type, first by its STABS type
    /// number through the originating file's table, then optionally by name.
    /// Both lookups can fail, e.g. for types that are forward declared but
    /// never defined.
    pub fn lookup_type(
        &self,
        type_name: &ast::TypeName,
        fallback_on_name_lookup: bool,
    ) -> Option<DataTypeHandle> {
        if let Some(file_handle) = type_name.referenced_file_handle {
            if type_name.referenced_stabs_type_number.valid() {
                if let Some(source_file) = self
                    .source_files
                    .symbol_from_handle(SourceFileHandle(file_handle))
                {
                    if let Some(&handle) = source_file
                        .stabs_type_number_to_handle
                        .get(&type_name.referenced_stabs_type_number)
                    {
                        return Some(handle);
                    }
                }
            }
        }

        if fallback_on_name_lookup {
            return self.data_types.first_handle_from_name(&type_name.type_name);
        }

        None
    }

    /// Deduplicates a fresh data type against the types with the same name
    /// that have already been processed.
    ///
    /// A structural match appends the originating file to the existing type;
    /// a mismatch with every sibling creates a new sibling and marks the
    /// conflict on both sides. Anonymous enums that match a named enum
    /// already in the database are dropped entirely to avoid cluttering the
    /// output.
    pub fn create_data_type_if_unique(
        &mut self,
        node: Node,
        name: &str,
        source_file: SourceFileHandle,
        source: SymbolSourceHandle,
    ) -> Option<DataTypeHandle> {
        if let Some(handle) = self.find_matching_named_enum(&node, name) {
            // An anonymous copy of an enum that also exists with a name.
            self.link_stabs_type_number(&node, source_file, handle);
            return Some(handle);
        }

        let siblings = self.data_types.handles_from_name(name);
        if siblings.is_empty() {
            let data_type = self.data_types.create_symbol(name, source, None);
            let handle = data_type.handle;
            data_type.files = vec![source_file];
            data_type.ty = Some(node);
            self.link_stabs_type_number_of(handle, source_file);
            return Some(handle);
        }

        let mut fail_reason = None;
        for &sibling_handle in &siblings {
            enum Outcome {
                Matches,
                TypedefMerge,
                Conflict(ast::CompareFailReason),
                Skip,
            }

            let outcome = {
                let Some(sibling) = self.data_types.symbol_from_handle(sibling_handle) else {
                    continue;
                };
                let Some(sibling_node) = &sibling.ty else {
                    continue;
                };
                match ast::compare_nodes(sibling_node, &node, true) {
                    None => Outcome::Matches,
                    // A typedef for a type and the plain type itself differ
                    // only in their top-level storage class. Merge them and
                    // keep the typedef, since GCC emits both for a single
                    // `typedef struct Name {...} Name;`.
                    Some(ast::CompareFailReason::StorageClass)
                        if is_typedef_of_same_type(sibling_node, &node) =>
                    {
                        Outcome::TypedefMerge
                    }
                    Some(reason) => {
                        // Differing anonymous enums under the same (empty)
                        // name are not conflicts; they are simply unrelated.
                        let is_anonymous_enum = matches!(sibling_node.kind, NodeKind::Enum(_))
                            && sibling.name.is_empty();
                        if is_anonymous_enum {
                            Outcome::Skip
                        } else {
                            Outcome::Conflict(reason)
                        }
                    }
                }
            };

            match outcome {
                Outcome::Matches => {
                    let sibling = self
                        .data_types
                        .symbol_from_handle_mut(sibling_handle)
                        .expect("checked above");
                    if !sibling.files.contains(&source_file) {
                        sibling.files.push(source_file);
                    }
                    self.link_stabs_type_number(&node, source_file, sibling_handle);
                    return Some(sibling_handle);
                }
                Outcome::TypedefMerge => {
                    let sibling = self
                        .data_types
                        .symbol_from_handle_mut(sibling_handle)
                        .expect("checked above");
                    if let Some(sibling_node) = &mut sibling.ty {
                        sibling_node.storage_class = StorageClass::Typedef;
                    }
                    if !sibling.files.contains(&source_file) {
                        sibling.files.push(source_file);
                    }
                    self.link_stabs_type_number(&node, source_file, sibling_handle);
                    return Some(sibling_handle);
                }
                Outcome::Conflict(reason) => {
                    let reason = ast::compare_fail_reason_to_string(reason);
                    fail_reason = Some(reason);
                    let sibling = self
                        .data_types
                        .symbol_from_handle_mut(sibling_handle)
                        .expect("checked above");
                    sibling.conflict = true;
                    sibling.compare_fail_reason = Some(reason);
                }
                Outcome::Skip => {}
            }
        }

        // No sibling matched.
        let data_type = self.data_types.create_symbol(name, source, None);
        let handle = data_type.handle;
        data_type.files = vec![source_file];
        data_type.conflict = fail_reason.is_some();
        data_type.compare_fail_reason = fail_reason;
        data_type.ty = Some(node);
        self.link_stabs_type_number_of(handle, source_file);
        Some(handle)
    }

    fn find_matching_named_enum(&self, node: &Node, name: &str) -> Option<DataTypeHandle> {
        if !name.is_empty() {
            return None;
        }
        let NodeKind::Enum(anonymous) = &node.kind else {
            return None;
        };
        for data_type in &self.data_types {
            if data_type.name.is_empty() {
                continue;
            }
            if let Some(existing) = &data_type.ty {
                if let NodeKind::Enum(existing_enum) = &existing.kind {
                    if existing_enum.constants == anonymous.constants {
                        return Some(data_type.handle);
                    }
                }
            }
        }
        None
    }

    fn link_stabs_type_number(
        &mut self,
        node: &Node,
        source_file: SourceFileHandle,
        data_type: DataTypeHandle,
    ) {
        if node.stabs_type_number.valid() {
            if let Some(file) = self.source_files.symbol_from_handle_mut(source_file) {
                file.stabs_type_number_to_handle
                    .insert(node.stabs_type_number, data_type);
            }
        }
    }

    fn link_stabs_type_number_of(&mut self, handle: DataTypeHandle, source_file: SourceFileHandle) {
        let number = self
            .data_types
            .symbol_from_handle(handle)
            .and_then(|data_type| data_type.ty.as_ref())
            .map(|node| node.stabs_type_number);
        if let Some(number) = number {
            if number.valid() {
                if let Some(file) = self.source_files.symbol_from_handle_mut(source_file) {
                    file.stabs_type_number_to_handle.insert(number, handle);
                }
            }
        }
    }
}

/// True if one node is the typedef'd form of the other: the top-level storage
/// classes are none and typedef in some order and everything else matches.
fn is_typedef_of_same_type(lhs: &Node, rhs: &Node) -> bool {
    let classes = (lhs.storage_class, rhs.storage_class);
    let typedef_pair = matches!(
        classes,
        (StorageClass::None, StorageClass::Typedef) | (StorageClass::Typedef, StorageClass::None)
    );
    if !typedef_pair {
        return false;
    }
    let mut aligned = rhs.clone();
    aligned.storage_class = lhs.storage_class;
    ast::compare_nodes(lhs, &aligned, true).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BuiltIn, BuiltInClass, Enum};

    fn enum_node(constants: &[(i32, &str)]) -> Node {
        Node::new(NodeKind::Enum(Enum {
            constants: constants
                .iter()
                .map(|(value, name)| (*value, name.to_string()))
                .collect(),
        }))
    }

    fn test_database() -> (SymbolDatabase, SymbolSourceHandle, SourceFileHandle) {
        let mut database = SymbolDatabase::new();
        let source = database
            .symbol_sources
            .create_source("test", SymbolSourceKind::SymbolTable);
        let file = database
            .source_files
            .create_symbol("main.cpp", source, None)
            .handle;
        (database, source, file)
    }

    #[test]
    fn handles_survive_destruction() {
        let (mut database, source, _) = test_database();
        let first = database
            .functions
            .create_symbol("a", source, Some(0x100))
            .handle;
        let second = database
            .functions
            .create_symbol("b", source, Some(0x200))
            .handle;
        database.functions.destroy_symbol(first);
        assert!(database.functions.symbol_from_handle(first).is_none());
        let survivor = database.functions.symbol_from_handle(second).unwrap();
        assert_eq!(survivor.name, "b");
    }

    #[test]
    fn matching_types_are_merged() {
        let (mut database, source, file) = test_database();
        let second_file = database
            .source_files
            .create_symbol("other.cpp", source, None)
            .handle;

        let first = database
            .create_data_type_if_unique(enum_node(&[(0, "A")]), "E", file, source)
            .unwrap();
        let second = database
            .create_data_type_if_unique(enum_node(&[(0, "A")]), "E", second_file, source)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(database.data_types.len(), 1);
        let merged = database.data_types.symbol_from_handle(first).unwrap();
        assert_eq!(merged.files, vec![file, second_file]);
        assert!(!merged.conflict);
    }

    #[test]
    fn conflicting_types_become_siblings() {
        let (mut database, source, file) = test_database();
        let first = database
            .create_data_type_if_unique(enum_node(&[(0, "A")]), "E", file, source)
            .unwrap();
        let second = database
            .create_data_type_if_unique(enum_node(&[(1, "A")]), "E", file, source)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(database.data_types.len(), 2);
        for handle in [first, second] {
            let sibling = database.data_types.symbol_from_handle(handle).unwrap();
            assert!(sibling.conflict);
            assert_eq!(sibling.compare_fail_reason, Some("enum constant"));
        }
    }

    #[test]
    fn deduplication_is_idempotent() {
        let (mut database, source, file) = test_database();
        for _ in 0..3 {
            database.create_data_type_if_unique(enum_node(&[(0, "A")]), "E", file, source);
        }
        assert_eq!(database.data_types.len(), 1);
    }

    #[test]
    fn typedef_and_plain_type_are_merged() {
        let (mut database, source, file) = test_database();
        let plain = enum_node(&[(0, "A")]);
        let mut typedefed = enum_node(&[(0, "A")]);
        typedefed.storage_class = StorageClass::Typedef;

        let first = database
            .create_data_type_if_unique(plain, "E", file, source)
            .unwrap();
        let second = database
            .create_data_type_if_unique(typedefed, "E", file, source)
            .unwrap();

        assert_eq!(first, second);
        let merged = database.data_types.symbol_from_handle(first).unwrap();
        assert_eq!(
            merged.ty.as_ref().unwrap().storage_class,
            StorageClass::Typedef
        );
        assert!(!merged.conflict);
    }

    #[test]
    fn anonymous_enum_matching_a_named_one_is_dropped() {
        let (mut database, source, file) = test_database();
        let named = database
            .create_data_type_if_unique(enum_node(&[(0, "A"), (1, "B")]), "Named", file, source)
            .unwrap();
        let anonymous = database
            .create_data_type_if_unique(enum_node(&[(0, "A"), (1, "B")]), "", file, source)
            .unwrap();
        assert_eq!(named, anonymous);
        assert_eq!(database.data_types.len(), 1);
    }

    #[test]
    fn builtins_with_the_same_name_conflict_on_class() {
        let (mut database, source, file) = test_database();
        let make = |bclass| Node::new(NodeKind::BuiltIn(BuiltIn { bclass }));
        database.create_data_type_if_unique(make(BuiltInClass::Signed32), "word", file, source);
        database.create_data_type_if_unique(make(BuiltInClass::Unsigned32), "word", file, source);
        assert_eq!(database.data_types.len(), 2);
        let handle = database.data_types.first_handle_from_name("word").unwrap();
        let first = database.data_types.symbol_from_handle(handle).unwrap();
        assert_eq!(first.compare_fail_reason, Some("builtin class"));
    }
}
