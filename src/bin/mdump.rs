//! Symbol table dumper: prints the recovered functions, globals and types
//! as C++, JSON, or raw symbol listings.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use object::{Object, ObjectSection};

use mdebug_recover::database::SymbolDatabase;
use mdebug_recover::demangle::demangle;
use mdebug_recover::dependency::{build_type_dependency_graph, print_type_dependency_graph};
use mdebug_recover::elf::{
    select_symbol_table, symbol_table_format_from_name, SymbolTableFormat, SYMBOL_TABLE_FORMATS,
};
use mdebug_recover::error::{Error, Result};
use mdebug_recover::flags::{
    DONT_DEDUPLICATE_TYPES, NO_IMPORTER_FLAGS, STRICT_PARSING, STRIP_ACCESS_SPECIFIERS,
    STRIP_GENERATED_FUNCTIONS, STRIP_MEMBER_FUNCTIONS,
};
use mdebug_recover::json::write_json;
use mdebug_recover::mdebug::{
    storage_type_to_string, symbol_class_to_string, SymbolTableReader,
};
use mdebug_recover::print_cpp::{CppPrinter, CppPrinterConfig};
use mdebug_recover::{elf, importer};

#[derive(Parser)]
#[command(
    name = "mdump",
    about = "MDebug/STABS symbol table parser and dumper",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write the output to the file specified instead of to the standard
    /// output.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Choose which symbol table you want to read from. Common section names
    /// are: .symtab, .mdebug, .stab, .debug, .sndata.
    #[arg(long, global = true)]
    section: Option<String>,

    /// Explicitly specify the symbol table format. Possible options are:
    /// symtab, mdebug, stab, dwarf, sndll.
    #[arg(long, global = true)]
    format: Option<String>,

    /// Print mangled names.
    #[arg(long, global = true)]
    mangled: bool,

    /// Fail on recoverable parse errors instead of warning.
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Identify the symbol tables present in the input file(s). If the input
    /// path is a directory, it will be walked recursively.
    Identify { input: PathBuf },
    /// Print all the functions recovered from the STABS symbols as C++.
    Functions { input: PathBuf },
    /// Print all the global variables recovered from the STABS symbols as
    /// C++.
    Globals { input: PathBuf },
    /// Print all the types recovered from the STABS symbols as C++.
    Types {
        input: PathBuf,
        /// Do not deduplicate types from files.
        #[arg(long)]
        per_file: bool,
        /// Do not print access specifiers.
        #[arg(long)]
        omit_access_specifiers: bool,
        /// Do not print member functions.
        #[arg(long)]
        omit_member_functions: bool,
        /// Include member functions that are likely auto-generated.
        #[arg(long)]
        include_generated_functions: bool,
    },
    /// Print out a dependency graph of all the types in graphviz DOT format.
    #[command(name = "type_graph")]
    TypeGraph { input: PathBuf },
    /// Print all the labels.
    Labels { input: PathBuf },
    /// Print all of the above as JSON.
    Json {
        input: PathBuf,
        /// Do not deduplicate types from files.
        #[arg(long)]
        per_file: bool,
    },
    /// Print all of the symbols in the symbol table.
    Symbols {
        input: PathBuf,
        /// Only print local .mdebug symbols.
        #[arg(long)]
        locals: bool,
        /// Only print external .mdebug symbols.
        #[arg(long)]
        externals: bool,
    },
    /// Print out the contents of the file headers.
    Headers { input: PathBuf },
    /// Print a list of all the source files.
    Files { input: PathBuf },
    /// List the names of the source files associated with each ELF section.
    Sections { input: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
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
    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(io::BufWriter::new(fs::File::create(path)?)),
        None => Box::new(io::BufWriter::new(io::stdout())),
    };
    let out = &mut out;

    if let Command::Identify { input } = &cli.command {
        return identify(out, input);
    }

    let input = input_path(&cli.command);
    let image = read_input(input)?;
    let object = object::File::parse(&*image)
        .map_err(|error| Error::Fatal(format!("failed to parse ELF file: {error}")))?;

    match &cli.command {
        Command::Identify { .. } => unreachable!(),
        Command::Functions { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            print_functions(out, &database, &cli)?;
        }
        Command::Globals { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            print_globals(out, &database, &cli)?;
        }
        Command::Types {
            per_file,
            omit_access_specifiers,
            omit_member_functions,
            include_generated_functions,
            ..
        } => {
            let mut flags = NO_IMPORTER_FLAGS;
            if *per_file {
                flags |= DONT_DEDUPLICATE_TYPES;
            }
            if *omit_access_specifiers {
                flags |= STRIP_ACCESS_SPECIFIERS;
            }
            if *omit_member_functions {
                flags |= STRIP_MEMBER_FUNCTIONS;
            }
            if !*include_generated_functions {
                flags |= STRIP_GENERATED_FUNCTIONS;
            }
            let database = read_symbol_table(&image, &object, &cli, flags)?;
            if *per_file {
                print_types_per_file(out, &database, input, &cli)?;
            } else {
                print_types_deduplicated(out, &database, input, &cli)?;
            }
        }
        Command::TypeGraph { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            let graph = build_type_dependency_graph(&database);
            print_type_dependency_graph(out, &database, &graph)?;
        }
        Command::Labels { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            for label in &database.labels {
                writeln!(out, "{:08x} {}", label.address.unwrap_or(0), label.name)?;
            }
        }
        Command::Json { per_file, .. } => {
            let mut flags = STRIP_GENERATED_FUNCTIONS;
            if *per_file {
                flags |= DONT_DEDUPLICATE_TYPES;
            }
            let database = read_symbol_table(&image, &object, &cli, flags)?;
            let value = write_json(&database);
            serde_json::to_writer_pretty(&mut *out, &value)
                .map_err(|error| Error::Fatal(error.to_string()))?;
            writeln!(out)?;
        }
        Command::Symbols {
            locals, externals, ..
        } => {
            print_raw_symbols(out, &image, &object, &cli, *locals, *externals)?;
        }
        Command::Headers { .. } => {
            print_headers(out, &image, &object, &cli)?;
        }
        Command::Files { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            for source_file in &database.source_files {
                writeln!(out, "{}", source_file.full_path())?;
            }
        }
        Command::Sections { .. } => {
            let database = read_symbol_table(&image, &object, &cli, NO_IMPORTER_FLAGS)?;
            print_sections(out, &database)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn input_path(command: &Command) -> &Path {
    match command {
        Command::Identify { input }
        | Command::Functions { input }
        | Command::Globals { input }
        | Command::Types { input, .. }
        | Command::TypeGraph { input }
        | Command::Labels { input }
        | Command::Json { input, .. }
        | Command::Symbols { input, .. }
        | Command::Headers { input }
        | Command::Files { input }
        | Command::Sections { input } => input,
    }
}

fn read_input(path: &Path) -> Result<memmap2::Mmap> {
    let file = fs::File::open(path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(mmap)
}

fn requested_format(cli: &Cli) -> Result<Option<SymbolTableFormat>> {
    match &cli.format {
        Some(name) => {
            let info = symbol_table_format_from_name(name)
                .ok_or_else(|| Error::Fatal(format!("invalid symbol table format '{name}'")))?;
            Ok(Some(info.format))
        }
        None => Ok(None),
    }
}

fn read_symbol_table(
    image: &[u8],
    object: &object::File,
    cli: &Cli,
    mut flags: u32,
) -> Result<SymbolDatabase> {
    if cli.strict {
        flags |= STRICT_PARSING;
    }

    let mut database = SymbolDatabase::new();
    elf::import_section_headers(&mut database, object)?;

    let (section, format) = select_symbol_table(object, cli.section.as_deref(), requested_format(cli)?)?;
    match format {
        SymbolTableFormat::Mdebug => {
            let (offset, _) = section.file_range().ok_or(Error::MissingSection(
                ".mdebug".to_string(),
            ))?;
            let reader = SymbolTableReader::new(image, offset as usize)?;
            importer::import_symbol_table(&mut database, &reader, flags, Some(demangle))?;
        }
        SymbolTableFormat::Symtab => {
            elf::import_symbol_table(&mut database, object, false)?;
        }
        _ => {
            return Err(Error::Fatal(
                "the selected symbol table format isn't supported".to_string(),
            ));
        }
    }

    // Labels only live in the regular symbol table.
    if format != SymbolTableFormat::Symtab && object.section_by_name(".symtab").is_some() {
        elf::import_symbol_table(&mut database, object, true)?;
    }

    Ok(database)
}

fn printer_config(cli: &Cli) -> CppPrinterConfig {
    CppPrinterConfig {
        use_mangled_names: cli.mangled,
        ..Default::default()
    }
}

fn identify<W: Write>(out: &mut W, input: &Path) -> Result<()> {
    if input.is_file() {
        identify_file(out, None, input)?;
    } else if input.is_dir() {
        let mut totals = [0u32; SYMBOL_TABLE_FORMATS.len() + 1];
        identify_directory(out, &mut totals, input)?;

        writeln!(out)?;
        writeln!(out, "Totals:")?;
        for (info, total) in SYMBOL_TABLE_FORMATS.iter().zip(totals.iter()) {
            writeln!(out, "  {:4} {} sections", total, info.section_name)?;
        }
        writeln!(out, "  {:4} unknown", totals[SYMBOL_TABLE_FORMATS.len()])?;
    } else {
        return Err(Error::Fatal(format!(
            "input path '{}' is neither a regular file nor a directory",
            input.display()
        )));
    }
    Ok(())
}

fn identify_directory<W: Write>(out: &mut W, totals: &mut [u32], directory: &Path) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            identify_directory(out, totals, &path)?;
        } else if path.is_file() {
            identify_file(out, Some(&mut *totals), &path)?;
        }
    }
    Ok(())
}

fn identify_file<W: Write>(out: &mut W, mut totals: Option<&mut [u32]>, path: &Path) -> Result<()> {
    write!(out, "{}:", path.display())?;

    let image = read_input(path)?;
    if image.len() < 4 {
        writeln!(out, " file too small")?;
        return Ok(());
    }

    let sndll_index = SYMBOL_TABLE_FORMATS.len() - 1;
    let unknown_index = SYMBOL_TABLE_FORMATS.len();

    match &image[0..4] {
        [0x7f, b'E', b'L', b'F'] => {
            let object = object::File::parse(&*image)
                .map_err(|error| Error::Fatal(format!("failed to parse ELF file: {error}")))?;
            let mut print_none = true;
            for (index, info) in SYMBOL_TABLE_FORMATS.iter().enumerate() {
                if object.section_by_name(info.section_name).is_some() {
                    write!(out, " {}", info.section_name)?;
                    if let Some(totals) = totals.as_deref_mut() {
                        totals[index] += 1;
                    }
                    print_none = false;
                }
            }
            if print_none {
                write!(out, " none")?;
            }
            writeln!(out)?;
        }
        [b'S', b'N', b'R', b'1'] | [b'S', b'N', b'R', b'2'] => {
            if let Some(totals) = totals.as_deref_mut() {
                totals[sndll_index] += 1;
            }
            writeln!(out, " sndll")?;
        }
        _ => {
            if let Some(totals) = totals.as_deref_mut() {
                totals[unknown_index] += 1;
            }
            writeln!(out, " unknown format")?;
        }
    }

    Ok(())
}

fn print_functions<W: Write>(out: &mut W, database: &SymbolDatabase, cli: &Cli) -> Result<()> {
    let mut printer = CppPrinter::new(out, printer_config(cli));
    let mut current_source_file = None;
    for function in &database.functions {
        if function.source_file.is_none() && function.ty.is_none() {
            // Leave out symbols that only came from the ELF symbol table.
            continue;
        }
        if current_source_file != Some(function.source_file) {
            match function
                .source_file
                .and_then(|handle| database.source_files.symbol_from_handle(handle))
            {
                Some(source_file) => printer.comment_block_file(source_file.full_path())?,
                None => printer.comment_block_file("(unknown)")?,
            }
            current_source_file = Some(function.source_file);
        }
        printer.function(function, database)?;
    }
    Ok(())
}

fn print_globals<W: Write>(out: &mut W, database: &SymbolDatabase, cli: &Cli) -> Result<()> {
    let mut printer = CppPrinter::new(out, printer_config(cli));
    let mut current_source_file = None;
    for global in &database.global_variables {
        if global.source_file.is_none() && global.ty.is_none() {
            continue;
        }
        if current_source_file != Some(global.source_file) {
            match global
                .source_file
                .and_then(|handle| database.source_files.symbol_from_handle(handle))
            {
                Some(source_file) => printer.comment_block_file(source_file.full_path())?,
                None => printer.comment_block_file("(unknown)")?,
            }
            current_source_file = Some(global.source_file);
        }
        printer.global_variable(global, database)?;
    }
    Ok(())
}

fn print_types_deduplicated<W: Write>(
    out: &mut W,
    database: &SymbolDatabase,
    input: &Path,
    cli: &Cli,
) -> Result<()> {
    let mut printer = CppPrinter::new(out, printer_config(cli));
    printer.comment_block_beginning(
        &input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    )?;
    printer.comment_block_toolchain_version_info(database)?;
    printer.comment_block_builtin_types(database)?;
    for data_type in &database.data_types {
        printer.data_type(data_type, database)?;
    }
    Ok(())
}

fn print_types_per_file<W: Write>(
    out: &mut W,
    database: &SymbolDatabase,
    input: &Path,
    cli: &Cli,
) -> Result<()> {
    let mut printer = CppPrinter::new(out, printer_config(cli));
    printer.comment_block_beginning(
        &input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    )?;
    for source_file in &database.source_files {
        printer.comment_block_file(source_file.full_path())?;
        for data_type in &database.data_types {
            if data_type.source_file == Some(source_file.handle) {
                printer.data_type(data_type, database)?;
            }
        }
    }
    Ok(())
}

fn print_raw_symbols<W: Write>(
    out: &mut W,
    image: &[u8],
    object: &object::File,
    cli: &Cli,
    locals: bool,
    externals: bool,
) -> Result<()> {
    let (print_locals, print_externals) = if !locals && !externals {
        (true, true)
    } else {
        (locals, externals)
    };

    let (section, format) = select_symbol_table(object, cli.section.as_deref(), requested_format(cli)?)?;
    if format != SymbolTableFormat::Mdebug {
        return Err(Error::Fatal(
            "raw symbol printing is only supported for .mdebug symbol tables".to_string(),
        ));
    }
    let (offset, _) = section
        .file_range()
        .ok_or(Error::MissingSection(".mdebug".to_string()))?;
    let reader = SymbolTableReader::new(image, offset as usize)?;

    if print_locals {
        for file_index in 0..reader.file_count() {
            let file = reader.parse_file(file_index)?;
            writeln!(out, "FILE {}:", file.full_path)?;
            for symbol in &file.symbols {
                print_raw_symbol(out, symbol)?;
            }
        }
    }

    if print_externals {
        writeln!(out, "EXTERNAL SYMBOLS:")?;
        for symbol in reader.parse_external_symbols()? {
            print_raw_symbol(out, &symbol)?;
        }
    }

    Ok(())
}

fn print_raw_symbol<W: Write>(out: &mut W, symbol: &mdebug_recover::mdebug::Symbol) -> Result<()> {
    write!(
        out,
        "{:08x} {:11} {:10} ",
        symbol.value,
        storage_type_to_string(symbol.storage_type),
        symbol_class_to_string(symbol.storage_class),
    )?;
    if symbol.is_stabs() {
        write!(
            out,
            "N_{:8} ",
            mdebug_recover::mdebug::stabs_code_to_string(symbol.code())
        )?;
    } else {
        write!(out, "{:10} ", symbol.index)?;
    }
    writeln!(out, "{}", symbol.string)?;
    Ok(())
}

fn print_headers<W: Write>(
    out: &mut W,
    image: &[u8],
    object: &object::File,
    cli: &Cli,
) -> Result<()> {
    let (section, format) = select_symbol_table(object, cli.section.as_deref(), requested_format(cli)?)?;
    if format != SymbolTableFormat::Mdebug {
        return Err(Error::Fatal(
            "header printing is only supported for .mdebug symbol tables".to_string(),
        ));
    }
    let (offset, _) = section
        .file_range()
        .ok_or(Error::MissingSection(".mdebug".to_string()))?;
    let reader = SymbolTableReader::new(image, offset as usize)?;
    let header = reader.header();

    writeln!(out, "Symbolic header, magic = {:x}, vstamp = {:x}:", header.magic, header.version_stamp)?;
    writeln!(out)?;
    writeln!(out, "                              Offset              Size (Bytes)        Count")?;
    writeln!(out, "                              ------              ------------        -----")?;
    writeln!(
        out,
        "  Line Numbers              0x{:08x}          0x{:08x}          {}",
        header.line_numbers_offset, header.line_numbers_size, header.line_number_count
    )?;
    writeln!(
        out,
        "  Dense Numbers             0x{:08x}          -                   {}",
        header.dense_numbers_offset, header.dense_numbers_count
    )?;
    writeln!(
        out,
        "  Procedure Descriptors     0x{:08x}          -                   {}",
        header.procedure_descriptors_offset, header.procedure_descriptor_count
    )?;
    writeln!(
        out,
        "  Local Symbols             0x{:08x}          -                   {}",
        header.local_symbols_offset, header.local_symbol_count
    )?;
    writeln!(
        out,
        "  Optimization Symbols      0x{:08x}          -                   {}",
        header.optimization_symbols_offset, header.optimization_symbol_count
    )?;
    writeln!(
        out,
        "  Auxiliary Symbols         0x{:08x}          -                   {}",
        header.auxiliary_symbols_offset, header.auxiliary_symbol_count
    )?;
    writeln!(
        out,
        "  Local Strings             0x{:08x}          0x{:08x}          -",
        header.local_strings_offset, header.local_strings_size
    )?;
    writeln!(
        out,
        "  External Strings          0x{:08x}          0x{:08x}          -",
        header.external_strings_offset, header.external_strings_size
    )?;
    writeln!(
        out,
        "  File Descriptors          0x{:08x}          -                   {}",
        header.file_descriptors_offset, header.file_descriptor_count
    )?;
    writeln!(
        out,
        "  Relative File Descriptors 0x{:08x}          -                   {}",
        header.relative_file_descriptors_offset, header.relative_file_descriptor_count
    )?;
    writeln!(
        out,
        "  External Symbols          0x{:08x}          -                   {}",
        header.external_symbols_offset, header.external_symbol_count
    )?;

    Ok(())
}

fn print_sections<W: Write>(out: &mut W, database: &SymbolDatabase) -> Result<()> {
    for section in &database.sections {
        let Some(address) = section.address else {
            continue;
        };
        let section_start = address;
        let section_end = address + section.size;

        writeln!(out, "{}:", section.name)?;

        for source_file in &database.source_files {
            if let Some(text_address) = source_file.text_address {
                if text_address >= section_start && text_address < section_end {
                    writeln!(out, "\t{}", source_file.full_path())?;
                }
            }
        }
    }
    Ok(())
}
