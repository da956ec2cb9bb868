mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::level_filters::LevelFilter;

use boostbook::PostProcessOptions;
use quickbook::{Compilation, CompileOptions, Compiler};

const SUBCOMMANDS: &[&str] = &["build", "test", "help"];

#[derive(Parser)]
#[command(name = "quickbook", version, about = "Convert quickbook markup to BoostBook XML")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a quickbook file to BoostBook XML
    Build(BuildArgs),

    /// Run .test.qbk fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Quickbook source file
    input_file: PathBuf,

    /// Output file (defaults to the input with an .xml extension)
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Extra directory searched by include, import and xinclude. Repeatable.
    #[arg(short = 'I', long = "include-path")]
    include_path: Vec<PathBuf>,

    /// Indent spaces
    #[arg(long)]
    indent: Option<usize>,

    /// Line width
    #[arg(long)]
    linewidth: Option<usize>,

    /// Disable XML pretty printing
    #[arg(long)]
    no_pretty_print: bool,

    /// Debug mode: fixed timestamps and verbose logging
    #[arg(long)]
    debug: bool,

    /// Use Microsoft Visual Studio style error & warning message format
    #[arg(long)]
    ms_errors: bool,

    /// Treat an unmatched '[' as a syntax error
    #[arg(long)]
    strict: bool,

    /// Dump the event stream instead of writing XML
    #[arg(long)]
    events: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.qbk file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `quickbook file.qbk` means `quickbook build file.qbk`.
    let mut args: Vec<String> = std::env::args().collect();
    let implicit_build = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with('-'))
        .is_some_and(|first| !SUBCOMMANDS.contains(&first.as_str()));
    if implicit_build {
        args.insert(1, "build".to_string());
    }

    let cli = Cli::parse_from(&args);

    match cli.command {
        Command::Build(build_args) => {
            init_logging(build_args.debug, cli.no_color);
            process::exit(do_build(build_args, cli.no_color));
        }
        Command::Test(test_args) => {
            init_logging(false, cli.no_color);
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(debug: bool, no_color: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

fn do_build(args: BuildArgs, no_color: bool) -> i32 {
    let options = CompileOptions {
        include_paths: args.include_path.clone(),
        lenient: !args.strict,
        debug: args.debug,
        ..CompileOptions::default()
    };

    let compilation = match Compiler::new(options).compile_file(&args.input_file) {
        Ok(compilation) => compilation,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.input_file.display(), e);
            return 1;
        }
    };

    if args.ms_errors {
        emit_ms_diagnostics(&compilation);
    } else {
        emit_diagnostics(&compilation, no_color);
    }

    let mut status = 0;
    if args.events {
        for event in &compilation.events {
            println!("{event:?}");
        }
    } else {
        let output = args
            .output_file
            .clone()
            .unwrap_or_else(|| args.input_file.with_extension("xml"));
        println!("Generating Output File: {}", output.display());
        if let Err(message) = write_output(&compilation, &output, &args) {
            eprintln!("error: {message}");
            status = 1;
        }
    }

    if compilation.has_errors() {
        eprintln!(
            "{}: Error count: {}.",
            args.input_file.display(),
            compilation.error_count
        );
        status = 1;
    }
    status
}

/// Encode, pretty print when the document compiled cleanly, and write.
fn write_output(compilation: &Compilation, output: &Path, args: &BuildArgs) -> Result<(), String> {
    let xml = boostbook::to_boostbook(compilation).map_err(|e| e.to_string())?;

    let xml = if args.no_pretty_print || compilation.has_errors() {
        xml
    } else {
        let defaults = PostProcessOptions::default();
        let options = PostProcessOptions {
            indent: args.indent.unwrap_or(defaults.indent),
            linewidth: args.linewidth.unwrap_or(defaults.linewidth),
        };
        boostbook::post_process(&xml, &options)
            .map_err(|e| format!("post processing failed: {e}"))?
    };

    std::fs::write(output, xml).map_err(|e| format!("cannot write '{}': {}", output.display(), e))
}

fn emit_diagnostics(compilation: &Compilation, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let files = compilation.sources.files();
    for diagnostic in &compilation.diagnostics {
        let _ = term::emit_to_write_style(
            &mut writer.lock(),
            &config,
            files,
            &diagnostic.to_diagnostic(),
        );
    }
}

/// `file(line): error: message`
fn emit_ms_diagnostics(compilation: &Compilation) {
    for diagnostic in &compilation.diagnostics {
        let sources = &compilation.sources;
        let file = sources.name(diagnostic.file_id).unwrap_or("<unknown>");
        let line = sources
            .position(diagnostic.file_id, diagnostic.span.start)
            .map_or(0, |p| p.line);
        let severity = if diagnostic.is_error() {
            "error"
        } else {
            "warning"
        };
        eprintln!("{file}({line}): {severity}: {}", diagnostic.message());
    }
}
