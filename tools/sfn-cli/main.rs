use clap::{Parser, Subcommand};
use serde_json::Value;
use sfn_builder::prelude::*;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Compile, trace and locally run state machine definitions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the full-schema JSON of a list-notation or full-form definition
    Compile {
        /// Path to the definition JSON file
        path: String,
    },
    /// Print the dry-run trace of a definition
    Trace {
        /// Path to the definition JSON file
        path: String,
    },
    /// Run a definition locally with stubbed resources
    Run {
        /// Path to the definition JSON file
        path: String,

        /// Input document as JSON
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Stub a resource with a constant JSON result, e.g. `--stub arn:hello='"hi"'`
        #[arg(short, long = "stub", value_name = "RESOURCE=JSON")]
        stubs: Vec<String>,

        /// Path to a runner configuration JSON file
        #[arg(long)]
        config: Option<String>,

        /// Overrides the configured timeout
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile { path } => {
            let machine = load_machine(&path);
            let json = machine
                .to_json()
                .unwrap_or_else(|e| exit_with_error(&format!("Failed to render JSON: {}", e)));
            println!("{}", json);
        }
        Command::Trace { path } => {
            let machine = load_machine(&path);
            println!("{}", machine.dry_run());
        }
        Command::Run {
            path,
            input,
            stubs,
            config,
            timeout_ms,
        } => run(&path, &input, &stubs, config.as_deref(), timeout_ms),
    }
}

fn run(path: &str, input: &str, stubs: &[String], config: Option<&str>, timeout_ms: Option<u64>) {
    let machine = load_machine(path);
    let input: Value = serde_json::from_str(input)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse input JSON: {}", e)));

    let mut config = match config {
        Some(config_path) => {
            let raw = read_file(config_path);
            RunnerConfig::from_json(&raw).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to parse config '{}': {}", config_path, e))
            })
        }
        None => RunnerConfig::default(),
    };
    if let Some(timeout_ms) = timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let mut resources = ResourceManager::new();
    for stub in stubs {
        let (resource, result) = parse_stub(stub);
        resources.register(resource, move |_| Ok(result.clone()));
    }

    let runner = Runner::builder().resources(resources).config(config).build();
    let start = Instant::now();
    match runner.run(&machine, input) {
        Ok((last, output)) => {
            let last = last.map(|state| state.name.as_str()).unwrap_or("<none>");
            eprintln!("Finished at '{}' in {:?}", last, start.elapsed());
            println!("{}", output);
        }
        Err(e) => exit_with_error(&error_chain(&e)),
    }
}

fn parse_stub(stub: &str) -> (String, Value) {
    let (resource, json) = stub
        .split_once('=')
        .unwrap_or_else(|| exit_with_error(&format!("Invalid stub '{}', expected RESOURCE=JSON", stub)));
    let result = serde_json::from_str(json)
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid JSON in stub '{}': {}", stub, e)));
    (resource.to_string(), result)
}

fn load_machine(path: &str) -> Machine {
    let raw = read_file(path);
    Machine::from_json(&raw).unwrap_or_else(|e| exit_with_error(&error_chain(&e)))
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read '{}': {}", path, e)))
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {}", cause));
        source = cause.source();
    }
    message
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
