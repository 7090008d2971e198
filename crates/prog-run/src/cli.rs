use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use miette::{IntoDiagnostic, miette};
use prog_lang::{BoxedValue, Declarations, Engine, ProgType, Value};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing_subscriber::EnvFilter;

use crate::definition::ProgFile;

#[derive(Parser, Debug)]
#[command(name = "prog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To evaluate an expression:\n\
    prog eval '@level > 5 and @name == \"bob\"' --var level:number=7 --var name:text=Bob\n\n\
    ## To check the programs in a file:\n\
    prog check progs.toml\n\n\
    ## To run a program:\n\
    prog run progs.toml fib 10\n\n\
    ## To list the standard functions:\n\
    prog docs round")]
#[command(about = "prog compiles and runs typed game-logic expressions and programs.", long_about = None)]
pub struct Cli {
    /// Log more detail to stderr (-v for debug, -vv for trace). RUST_LOG overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile and evaluate one expression
    Eval {
        /// The expression to evaluate
        expression: String,
        /// Bind a variable, written as NAME:TYPE=VALUE. VALUE is itself an expression;
        /// text values may be given without quotes
        #[arg(long = "var", value_name = "NAME:TYPE=VALUE")]
        vars: Vec<String>,
        /// Make the programs defined in this file callable
        #[arg(short, long, value_name = "FILE")]
        progs: Option<PathBuf>,
        /// Print the static type next to the value
        #[arg(short = 't', long)]
        show_type: bool,
    },
    /// Compile every program in the given files and report failures
    Check {
        /// Program definition files (TOML)
        files: Vec<PathBuf>,
    },
    /// Run one program from a definition file
    Run {
        /// Program definition file (TOML)
        file: PathBuf,
        /// Name of the program to run
        name: String,
        /// Arguments, each an expression matching the parameter type
        args: Vec<String>,
    },
    /// Show the built-in functions, collection extensions and properties
    Docs {
        /// Only show entries whose name contains this text
        filter: Option<String>,
    },
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        self.init_tracing();

        match &self.commands {
            Commands::Eval {
                expression,
                vars,
                progs,
                show_type,
            } => {
                let engine = match progs {
                    Some(path) => load_compiled(path)?,
                    None => Engine::default(),
                };

                let variables = vars
                    .iter()
                    .map(|var| parse_variable(&engine, var))
                    .collect::<miette::Result<Vec<_>>>()?;

                let result = engine
                    .eval(expression, variables.iter().map(|(name, boxed)| (name.as_str(), boxed.clone())))
                    .map_err(miette::Report::new)?;

                if *show_type {
                    print_line(&format!("{result} ({})", result.ty))
                } else {
                    print_line(&result.to_string())
                }
            }
            Commands::Check { files } => {
                let stdout = io::stdout();
                let mut handle = BufWriter::new(stdout.lock());
                let mut failed = 0;

                for file in files {
                    if !file.exists() {
                        return Err(miette!("File not found: {}", file.display()));
                    }

                    let engine = ProgFile::load(file)?.into_engine();
                    let failures = engine.compile_progs();
                    writeln!(handle, "Checking: {}", file.display()).into_diagnostic()?;

                    for (name, error) in failures {
                        failed += 1;
                        writeln!(handle, "  Error in @{name}: {error}").into_diagnostic()?;
                        eprintln!("{:?}", miette::Report::new(error));
                    }
                }

                handle.flush().into_diagnostic()?;

                if failed > 0 {
                    Err(miette!("{failed} program(s) failed to compile"))
                } else {
                    Ok(())
                }
            }
            Commands::Run { file, name, args } => {
                let engine = load_compiled(file)?;
                let prog = engine
                    .prog(name)
                    .ok_or_else(|| miette!("There is no program @{name} in {}", file.display()))?;

                if args.len() != prog.parameters().len() {
                    return Err(miette!(
                        "Program @{name} expects {} arguments ({}), got {}",
                        prog.parameters().len(),
                        prog.parameters().iter().map(|(n, ty)| format!("{ty} {n}")).join(", "),
                        args.len()
                    ));
                }

                let values = prog
                    .parameters()
                    .iter()
                    .zip(args)
                    .map(|((param, ty), arg)| parse_value(&engine, param, *ty, arg))
                    .collect::<miette::Result<Vec<_>>>()?;

                let result = engine.run_prog(name, values).map_err(miette::Report::new)?;
                if result.ty == ProgType::VOID {
                    Ok(())
                } else {
                    print_line(&result.to_string())
                }
            }
            Commands::Docs { filter } => {
                let engine = Engine::default();
                let registry = engine.registry();
                let matches = |name: &str| {
                    filter
                        .as_ref()
                        .is_none_or(|f| name.to_lowercase().contains(&f.to_lowercase()))
                };

                let mut builder = Builder::default();
                builder.push_record(["Kind", "Signature", "Description"]);

                registry
                    .builtins()
                    .filter(|f| matches(f.name.as_str()))
                    .map(|f| ["function".to_string(), f.signature(), f.doc.description.to_string()])
                    .chain(
                        registry
                            .extensions()
                            .filter(|e| matches(e.name.as_str()))
                            .map(|e| ["extension".to_string(), e.signature(), e.doc.description.to_string()]),
                    )
                    .chain(
                        registry
                            .properties()
                            .filter(|p| matches(p.name.as_str()))
                            .map(|p| ["property".to_string(), p.signature(), p.doc.description.to_string()]),
                    )
                    .sorted_by(|a, b| a[0].cmp(&b[0]).then_with(|| a[1].to_lowercase().cmp(&b[1].to_lowercase())))
                    .dedup()
                    .for_each(|record| builder.push_record(record));

                let mut table = builder.build();
                table.with(Style::markdown());
                print_line(&table.to_string())
            }
        }
    }

    fn init_tracing(&self) {
        let default = match self.verbose {
            0 => "warn",
            1 => "prog_lang=debug,prog_run=debug",
            _ => "prog_lang=trace,prog_run=trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

        // A subscriber may already be installed when the CLI is driven from tests.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }
}

fn print_line(text: &str) -> miette::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{text}").into_diagnostic()
}

/// Loads a definition file and compiles its programs, failing on the first broken one.
fn load_compiled(path: &Path) -> miette::Result<Engine> {
    let engine = ProgFile::load(path)?.into_engine();

    match engine.compile_progs().into_iter().next() {
        Some((name, error)) => {
            tracing::debug!(%name, "program failed to compile");
            Err(miette::Report::new(error).wrap_err(format!("Program @{name} failed to compile")))
        }
        None => Ok(engine),
    }
}

/// Parses `NAME:TYPE=VALUE`.
fn parse_variable(engine: &Engine, var: &str) -> miette::Result<(String, BoxedValue)> {
    let (name, rest) = var
        .split_once(':')
        .ok_or_else(|| miette!("Variable `{var}` must be written as NAME:TYPE=VALUE"))?;
    let (ty, value) = rest
        .split_once('=')
        .ok_or_else(|| miette!("Variable `{var}` must be written as NAME:TYPE=VALUE"))?;

    let name = name.trim().trim_start_matches('@');
    let ty = ty.parse::<ProgType>().map_err(|e| miette!("Variable `{name}`: {e}"))?;
    let value = parse_value(engine, name, ty, value)?;

    Ok((name.to_string(), BoxedValue::new(ty, value)))
}

/// Evaluates `text` as an expression of type `ty`. Unquoted text values are taken as-is.
fn parse_value(engine: &Engine, name: &str, ty: ProgType, text: &str) -> miette::Result<Value> {
    if ty == ProgType::TEXT && !text.trim_start().starts_with('"') {
        return Ok(Value::from(text));
    }

    let compiled = engine
        .compile(text, &Declarations::new())
        .map_err(|e| miette::Report::new(e).wrap_err(format!("Invalid value for @{name}")))?;

    if !compiled.return_type().compatible(&ty) {
        return Err(miette!(
            "Invalid value for @{name}: expected {ty}, found {}",
            compiled.return_type()
        ));
    }

    compiled
        .execute(&mut prog_lang::VariableScope::new())
        .map_err(|e| miette::Report::new(e).wrap_err(format!("Invalid value for @{name}")))
}
