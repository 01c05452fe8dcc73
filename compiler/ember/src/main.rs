//! Main module: command-line handling and compile orchestration.

mod demo;
mod driver;

use std::time::{Duration, Instant};

use clap::Parser;
use log::log_enabled;

/// CompilerOptions is a structural representation of what arguments the
/// compiler can take when running.
#[derive(Parser)]
#[command(
    name = "ember",
    version,
    author = "Ember Language Authors",
    about = "Compile programs for retro 8/16-bit CPUs into bank images"
)]
struct CompilerOptions {
    /// Target system to compile for.
    #[arg(short, long, default_value = "mos6502")]
    system: String,

    /// Compile-time defines, as KEY or KEY=VALUE pairs, consulted by
    /// `has_def`/`get_def`.
    #[arg(short, long = "define")]
    defines: Vec<String>,

    /// Write the stored bank images to this path, one file per bank named
    /// `<path>.<bank>.bin`.
    #[arg(short, long)]
    output: Option<String>,

    /// Compile the built-in demo program instead of reading input.
    #[arg(long)]
    demo: bool,
}

fn main() {
    pretty_env_logger::init();

    let options = CompilerOptions::parse();
    let code = run(options);
    std::process::exit(code);
}

fn run(options: CompilerOptions) -> i32 {
    if !options.demo {
        // The front end is wired in separately; only the demo program is
        // available from this binary today.
        eprintln!("error: no input; pass --demo to compile the built-in demo program");
        return 2;
    }

    if options.system != "mos6502" {
        eprintln!("error: unknown system `{}`", options.system);
        return 2;
    }

    let (sources, program) = demo::build();
    let result = timed(
        || driver::compile(sources, &program, &options.defines),
        log::Level::Debug,
        |elapsed| log::debug!("total compile time: {elapsed:?}"),
    );

    match result {
        Ok(banks) => {
            for (name, data) in &banks {
                log::info!("bank `{name}`: {} byte(s)", data.len());
            }
            if let Some(output) = &options.output {
                for (name, data) in &banks {
                    let path = format!("{output}.{name}.bin");
                    if let Err(error) = std::fs::write(&path, data) {
                        eprintln!("error: could not write `{path}`: {error}");
                        return 1;
                    }
                    println!("wrote {path}");
                }
            } else {
                for (name, data) in &banks {
                    println!("bank `{name}`:");
                    for chunk in data.chunks(16) {
                        let hex: Vec<String> =
                            chunk.iter().map(|byte| format!("{byte:02X}")).collect();
                        println!("  {}", hex.join(" "));
                    }
                }
            }
            0
        }
        Err(()) => 1,
    }
}

#[inline(always)]
fn timed<T>(op: impl FnOnce() -> T, level: log::Level, on_elapsed: impl FnOnce(Duration)) -> T {
    if log_enabled!(level) {
        let begin = Instant::now();
        let result = op();
        on_elapsed(begin.elapsed());
        result
    } else {
        op()
    }
}
