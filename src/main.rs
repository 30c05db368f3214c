// memstep: step-by-step interpreter with stack/heap visualization

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use memstep::interpreter::{Interpreter, SessionConfig};
use memstep::parser::Parser;
use memstep::ui::App;

static TRACE_INIT: Once = Once::new();

/// Install a stderr subscriber when `MEMSTEP_LOG` holds a filter such as `memstep=debug`
fn maybe_init_tracing() {
    let Ok(filter) = std::env::var("MEMSTEP_LOG") else {
        return;
    };

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::fmt;
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("memstep=debug"));
        let _ = fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init();
    });
}

fn usage(program_name: &str) -> ! {
    eprintln!("Usage: {} <file.rs> [--seed N] [--snapshot-limit BYTES]", program_name);
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} demos/vec_growth.rs        # Watch a Vec reallocate", program_name);
    eprintln!("  {} demos/fibonacci.rs --seed 7", program_name);
    eprintln!();
    eprintln!("Set MEMSTEP_LOG=memstep=debug to trace execution on stderr.");
    std::process::exit(1);
}

/// Parse `<file> [--seed N] [--snapshot-limit BYTES]`
fn parse_args(args: &[String]) -> (String, SessionConfig) {
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("memstep");
    let mut file = None;
    let mut config = SessionConfig::default();

    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--seed" => match rest.next().and_then(|v| v.parse().ok()) {
                Some(seed) => config.seed = Some(seed),
                None => {
                    eprintln!("Error: --seed expects an unsigned integer");
                    usage(program_name);
                }
            },
            "--snapshot-limit" => match rest.next().and_then(|v| v.parse().ok()) {
                Some(limit) => config.snapshot_limit = limit,
                None => {
                    eprintln!("Error: --snapshot-limit expects a byte count");
                    usage(program_name);
                }
            },
            flag if flag.starts_with("--") => {
                eprintln!("Error: unknown option '{}'", flag);
                usage(program_name);
            }
            path if file.is_none() => file = Some(path.to_string()),
            extra => {
                eprintln!("Error: unexpected argument '{}'", extra);
                usage(program_name);
            }
        }
    }

    match file {
        Some(file) => (file, config),
        None => {
            eprintln!("Error: No input file provided");
            eprintln!();
            usage(program_name)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    maybe_init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let (source_file, config) = parse_args(&args);

    if !Path::new(&source_file).exists() {
        eprintln!("Error: File '{}' not found", source_file);
        std::process::exit(1);
    }

    let source = fs::read_to_string(&source_file)?;

    eprintln!("Parsing {}...", source_file);
    let program = match Parser::new(&source).and_then(|mut parser| parser.parse_program()) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    eprintln!("Parsed successfully. Found {} functions.", program.len());

    let mut interpreter = match Interpreter::new(program, config) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            std::process::exit(1);
        }
    };

    // Run execution to build history
    eprintln!("Executing program...");
    match interpreter.run() {
        Ok(()) => {
            eprintln!("Execution completed successfully.");
            eprintln!("Total snapshots: {}", interpreter.total_snapshots());
        }
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            eprintln!("Entering TUI with partial execution history...");
        }
    }

    if let Err(e) = interpreter.rewind_to_start() {
        eprintln!("Warning: Failed to rewind to start: {}", e);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(interpreter);
    let res = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {}", err);
    }

    Ok(())
}
