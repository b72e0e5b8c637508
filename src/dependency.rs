//! Type dependency graph, printed in graphviz DOT format.

use std::collections::BTreeSet;
use std::io::Write;

use crate::ast::{Node, NodeKind};
use crate::database::{DataTypeHandle, SymbolDatabase};
use crate::error::Result;

/// For each data type, in iteration order, the set of data types it refers
/// to.
pub type TypeDependencyAdjacencyList = Vec<BTreeSet<DataTypeHandle>>;

pub fn build_type_dependency_graph(database: &SymbolDatabase) -> TypeDependencyAdjacencyList {
    let mut graph = Vec::with_capacity(database.data_types.len());
    for data_type in &database.data_types {
        let mut dependencies = BTreeSet::new();
        if let Some(node) = &data_type.ty {
            collect_dependencies(node, database, &mut dependencies);
        }
        dependencies.remove(&data_type.handle);
        graph.push(dependencies);
    }
    graph
}

fn collect_dependencies(
    node: &Node,
    database: &SymbolDatabase,
    dependencies: &mut BTreeSet<DataTypeHandle>,
) {
    if let NodeKind::TypeName(type_name) = &node.kind {
        if let Some(handle) = database.lookup_type(type_name, true) {
            dependencies.insert(handle);
        }
    }
    for child in node.children() {
        collect_dependencies(child, database, dependencies);
    }
}

pub fn print_type_dependency_graph<W: Write>(
    out: &mut W,
    database: &SymbolDatabase,
    graph: &TypeDependencyAdjacencyList,
) -> Result<()> {
    writeln!(out, "digraph {{")?;
    for (index, data_type) in database.data_types.iter().enumerate() {
        let name = if data_type.name.is_empty() {
            "(anonymous)"
        } else {
            data_type.name.as_str()
        };
        writeln!(
            out,
            "\ttype_{} [label=\"{}\"];",
            data_type.handle.0,
            name.replace('"', "\\\"")
        )?;
        if let Some(dependencies) = graph.get(index) {
            for dependency in dependencies {
                writeln!(out, "\ttype_{} -> type_{};", data_type.handle.0, dependency.0)?;
            }
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}
