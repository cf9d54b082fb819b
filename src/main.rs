use clap::{Parser as ClapParser, Subcommand};
use sprig_lang::cli::{self, CheckOptions, CheckResult, CliError};
use std::fs;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "sprig")]
#[command(about = "Sprig - compile YAML expression configs into Polars expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print its canonical forms
    Check {
        /// Configuration file (reads from stdin if omitted or '-')
        config: Option<String>,

        /// YAML schema file mapping column names to types
        #[arg(short, long)]
        schema: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate, don't print parsed forms
        #[arg(long)]
        syntax_only: bool,
    },

    /// Lower a configuration and print the backend expressions
    Compile {
        /// Configuration file (reads from stdin if omitted or '-')
        config: Option<String>,

        /// YAML schema file mapping column names to types
        #[arg(short, long)]
        schema: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            config,
            schema,
            pretty,
            syntax_only,
        } => run_check(config, schema, pretty, syntax_only),
        Commands::Compile { config, schema } => run_compile(config, schema),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_config(path: Option<String>) -> Result<String, CliError> {
    match path.as_deref() {
        Some("-") | None => {
            if path.is_none() && atty::is(atty::Stream::Stdin) {
                return Err(CliError::NoInput);
            }
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        Some(path) => Ok(fs::read_to_string(path)?),
    }
}

fn run_check(
    config: Option<String>,
    schema: Option<String>,
    pretty: bool,
    syntax_only: bool,
) -> Result<(), CliError> {
    let options = CheckOptions {
        config: read_config(config)?,
        schema: schema.map(fs::read_to_string).transpose()?,
        syntax_only,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Configuration is valid"),
        CheckResult::Parsed(forms) => {
            let json = if pretty {
                serde_json::to_string_pretty(&forms)
            } else {
                serde_json::to_string(&forms)
            }
            .unwrap_or_else(|_| "null".to_string());
            println!("{}", json);
        }
    }
    Ok(())
}

fn run_compile(config: Option<String>, schema: Option<String>) -> Result<(), CliError> {
    let config = read_config(config)?;
    let schema = schema.map(fs::read_to_string).transpose()?;

    for (name, expr, columns) in cli::execute_compile(&config, schema.as_deref())? {
        println!("{}: {}", name, expr);
        println!("  columns: [{}]", columns.join(", "));
    }
    Ok(())
}
