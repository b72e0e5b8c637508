//! Reconstructs a source tree from an executable's symbol table.
//!
//! The output directory must contain a `SOURCES.txt` file listing the
//! relative paths of the source files to emit, in the order their
//! translation units appear in the symbol table. Files that have been worked
//! on are preserved: only files that are missing, empty, or still carry the
//! `// STATUS: NOT STARTED` marker on their first line are overwritten.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use object::Object;

use mdebug_recover::data_refinement::refine_variables;
use mdebug_recover::database::{SourceFileHandle, SymbolDatabase};
use mdebug_recover::demangle::demangle;
use mdebug_recover::error::{Error, Result};
use mdebug_recover::flags::NO_IMPORTER_FLAGS;
use mdebug_recover::mdebug::SymbolTableReader;
use mdebug_recover::print_cpp::{CppPrinter, CppPrinterConfig};
use mdebug_recover::{elf, importer};

#[derive(Parser)]
#[command(
    name = "mrecover",
    about = "Reconstructs a source tree from a .mdebug symbol table",
    version
)]
struct Cli {
    /// The executable to read symbols from.
    input_elf: PathBuf,
    /// The directory to write source files into. Must contain a SOURCES.txt
    /// file.
    output_directory: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::try_parse().unwrap_or_else(|error| {
        let _ = error.print();
        std::process::exit(1);
    });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.output_directory.is_dir() {
        return Err(Error::Fatal(
            "output path needs to be a directory".to_string(),
        ));
    }

    let sources_file_path = cli.output_directory.join("SOURCES.txt");
    let source_paths = parse_sources_file(&sources_file_path)?;

    let file = fs::File::open(&cli.input_elf)?;
    let image = unsafe { memmap2::Mmap::map(&file)? };
    let object = object::File::parse(&*image)
        .map_err(|error| Error::Fatal(format!("failed to parse ELF file: {error}")))?;

    let mut database = SymbolDatabase::new();
    elf::import_section_headers(&mut database, &object)?;

    let section = object
        .section_by_name(".mdebug")
        .ok_or_else(|| Error::MissingSection(".mdebug".to_string()))?;
    let (offset, _) = object::ObjectSection::file_range(&section)
        .ok_or_else(|| Error::MissingSection(".mdebug".to_string()))?;
    let reader = SymbolTableReader::new(&image, offset as usize)?;
    importer::import_symbol_table(&mut database, &reader, NO_IMPORTER_FLAGS, Some(demangle))?;

    importer::fill_in_pointers_to_member_function_definitions(&mut database);
    refine_variables(&mut database, &object);

    // Group duplicate source file entries and filter out files not referenced
    // in the SOURCES.txt file. The two lists are matched up in order by file
    // name, because the full paths in the symbol table are build machine
    // paths.
    let mut path_to_source_files: BTreeMap<String, Vec<SourceFileHandle>> = BTreeMap::new();
    let mut path_index = 0;
    for source_file in &database.source_files {
        if path_index >= source_paths.len() {
            break;
        }
        let source_name = file_name(source_file.full_path());
        let path_name = file_name(&source_paths[path_index]);
        if source_name == path_name {
            path_to_source_files
                .entry(source_paths[path_index].clone())
                .or_default()
                .push(source_file.handle);
            path_index += 1;
        }
    }

    for (relative_path, source_files) in &path_to_source_files {
        let relative_header_path = Path::new(relative_path).with_extension("h");

        let path = cli.output_directory.join(relative_path);
        let header_path = cli.output_directory.join(&relative_header_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().into_owned())
            .unwrap_or_default();
        if extension == "c" || extension == "cpp" {
            if should_overwrite_file(&path) {
                write_c_cpp_file(&path, &relative_header_path, &database, source_files)?;
            } else {
                println!("Skipping {}", path.display());
            }
            if should_overwrite_file(&header_path) {
                write_h_file(&header_path, &relative_header_path, &database, source_files)?;
            } else {
                println!("Skipping {}", header_path.display());
            }
        } else {
            println!("Skipping assembly file {}", path.display());
        }
    }

    // Types that can't be mapped to a single source file go to a lost+found
    // file, if one is needed.
    if needs_lost_and_found_file(&database) {
        write_lost_and_found_file(&cli.output_directory.join("lost+found.h"), &database)?;
    }

    Ok(())
}

fn parse_sources_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .map_err(|_| Error::Fatal(format!("failed to open file '{}'", path.display())))?;
    Ok(contents
        .split_whitespace()
        .map(|path| path.to_string())
        .collect())
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn should_overwrite_file(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(contents) => contents.is_empty() || contents.starts_with("// STATUS: NOT STARTED"),
        Err(_) => true,
    }
}

fn write_c_cpp_file(
    path: &Path,
    header_path: &Path,
    database: &SymbolDatabase,
    source_files: &[SourceFileHandle],
) -> Result<()> {
    println!("Writing {}", path.display());
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "// STATUS: NOT STARTED")?;
    writeln!(out)?;

    let config = CppPrinterConfig {
        print_offsets_and_sizes: false,
        print_storage_information: false,
        print_variable_data: true,
        omit_this_parameter: true,
        substitute_parameter_lists: true,
        ..Default::default()
    };
    let mut printer = CppPrinter::new(&mut out, config);

    let header_name = header_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    printer.include_directive(&header_name)?;

    for &source_file in source_files {
        for data_type in &database.data_types {
            if data_type.probably_defined_in_cpp_file
                && data_type.files.len() == 1
                && data_type.files[0] == source_file
            {
                printer.data_type(data_type, database)?;
            }
        }
    }

    for &source_file in source_files {
        let Some(file) = database.source_files.symbol_from_handle(source_file) else {
            continue;
        };
        for global in database.global_variables.span(file.global_variables) {
            printer.global_variable(global, database)?;
        }
    }

    for &source_file in source_files {
        let Some(file) = database.source_files.symbol_from_handle(source_file) else {
            continue;
        };
        for function in database.functions.span(file.functions) {
            printer.function(function, database)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn write_h_file(
    path: &Path,
    relative_path: &Path,
    database: &SymbolDatabase,
    source_files: &[SourceFileHandle],
) -> Result<()> {
    println!("Writing {}", path.display());
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "// STATUS: NOT STARTED")?;
    writeln!(out)?;

    let config = CppPrinterConfig {
        make_globals_extern: true,
        skip_statics: true,
        print_offsets_and_sizes: false,
        print_function_bodies: false,
        print_storage_information: false,
        omit_this_parameter: true,
        substitute_parameter_lists: true,
        skip_member_functions_outside_types: true,
        ..Default::default()
    };
    let mut printer = CppPrinter::new(&mut out, config);

    let guard: String = relative_path
        .to_string_lossy()
        .chars()
        .map(|c| {
            let c = c.to_ascii_uppercase();
            if c.is_ascii_alphanumeric() {
                c
            } else {
                '_'
            }
        })
        .collect();
    printer.begin_include_guard(&guard)?;

    for &source_file in source_files {
        for data_type in &database.data_types {
            if !data_type.probably_defined_in_cpp_file
                && data_type.files.len() == 1
                && data_type.files[0] == source_file
            {
                printer.data_type(data_type, database)?;
            }
        }
    }

    for &source_file in source_files {
        let Some(file) = database.source_files.symbol_from_handle(source_file) else {
            continue;
        };
        for global in database.global_variables.span(file.global_variables) {
            printer.global_variable(global, database)?;
        }
    }

    for &source_file in source_files {
        let Some(file) = database.source_files.symbol_from_handle(source_file) else {
            continue;
        };
        for function in database.functions.span(file.functions) {
            printer.function(function, database)?;
        }
    }

    printer.end_include_guard(&guard)?;

    out.flush()?;
    Ok(())
}

fn needs_lost_and_found_file(database: &SymbolDatabase) -> bool {
    database
        .data_types
        .iter()
        .any(|data_type| data_type.files.len() != 1)
}

fn write_lost_and_found_file(path: &Path, database: &SymbolDatabase) -> Result<()> {
    println!("Writing {}", path.display());
    let mut out = BufWriter::new(fs::File::create(path)?);

    let config = CppPrinterConfig {
        print_offsets_and_sizes: false,
        omit_this_parameter: true,
        substitute_parameter_lists: true,
        ..Default::default()
    };
    let mut printer = CppPrinter::new(&mut out, config);

    let mut nodes_printed = 0;
    for data_type in &database.data_types {
        if data_type.files.len() != 1 && printer.data_type(data_type, database)? {
            nodes_printed += 1;
        }
    }
    println!("{nodes_printed} types printed to lost and found file");

    out.flush()?;
    Ok(())
}
