use clap::{Parser, Subcommand};
use eodag_script::{Error, GeneratorOptions, Result, ScriptGenerator, ScriptRequest, TemplateKind, Templates};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eodag-script")]
#[command(about = "Generate EODAG download scripts from catalog requests")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a script from a JSON request
    Render {
        /// Path to the request file
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read the request from stdin
        #[arg(long)]
        stdin: bool,

        /// Template kind, overriding the one implied by the request
        #[arg(long)]
        kind: Option<TemplateKind>,

        /// Directory of templates replacing the built-in ones
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Write the script to a file (a directory gets the suggested filename)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print {"filename", "code"} as JSON
        #[arg(long)]
        json: bool,

        /// Skip the Python syntax check
        #[arg(long)]
        no_verify: bool,

        /// Indentation for JSON values without an explicit indent
        #[arg(long)]
        json_indent: Option<usize>,
    },

    /// Validate a template directory
    Check {
        /// Directory containing <kind>.py.tmpl files
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Render { file, stdin, kind, templates, output, json, no_verify, json_indent } => {
            let options = GeneratorOptions { verify_syntax: !no_verify, json_indent };
            render(file.as_deref(), stdin, kind, templates.as_deref(), output.as_deref(), json, options)
        }
        Commands::Check { dir } => check(&dir),
    };

    if let Err(err) = result {
        eprint!("{}", err.report(io::stderr().is_terminal()));
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        };
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .try_init();
}

fn load_templates(dir: Option<&Path>) -> Result<Templates> {
    match dir {
        Some(dir) => Templates::from_dir(dir),
        None => Templates::builtin(),
    }
}

fn read_request(file: Option<&Path>, stdin: bool) -> Result<ScriptRequest> {
    let source = if stdin {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|source| Error::Io { path: PathBuf::from("<stdin>"), source })?;
        source
    } else {
        let path = file.unwrap_or(Path::new("-"));
        fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?
    };
    Ok(serde_json::from_str(&source)?)
}

fn render(
    file: Option<&Path>,
    stdin: bool,
    kind: Option<TemplateKind>,
    templates: Option<&Path>,
    output: Option<&Path>,
    json: bool,
    options: GeneratorOptions,
) -> Result<()> {
    let start = Instant::now();
    let request = read_request(file, stdin)?;
    let generator = ScriptGenerator::new(load_templates(templates)?, options);

    let kind = kind.unwrap_or_else(|| request.kind());
    let script = generator.generate_as(kind, &request)?;

    let text = if json {
        let mut text = serde_json::to_string_pretty(&script)?;
        text.push('\n');
        text
    } else {
        script.code.clone()
    };

    match output {
        Some(path) => {
            let path = if path.is_dir() { path.join(&script.filename) } else { path.to_path_buf() };
            fs::write(&path, text).map_err(|source| Error::Io { path: path.clone(), source })?;
            print_generated(&path.display().to_string());
        }
        None => print!("{}", text),
    }

    info!(kind = %kind, elapsed = %format_duration(start.elapsed()), "rendered {}", script.filename);
    Ok(())
}

fn check(dir: &Path) -> Result<()> {
    let start = Instant::now();
    let templates = Templates::from_dir(dir)?;
    for kind in TemplateKind::ALL {
        templates.select(kind)?;
    }
    print_generated(&dir.display().to_string());

    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(start.elapsed());
    if is_tty {
        eprintln!("\n\x1b[1m✨ Templates valid in {}\x1b[0m", time_str);
    } else {
        eprintln!("\n✨ Templates valid in {}", time_str);
    }
    Ok(())
}

fn print_generated(path: &str) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
