use clap::{ArgAction, Parser, Subcommand};
use drill_core::*;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BANNER_WIDTH: usize = 70;

#[derive(Parser)]
#[command(name = "drill")]
#[command(about = "Timed exercise routines with sound cues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More output; repeat for more detail
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a routine
    Run {
        /// Routine file to run
        routine: PathBuf,

        /// Extra guide file (may be repeated; later guides take precedence)
        #[arg(short, long = "guide")]
        guides: Vec<PathBuf>,

        /// Don't play any sounds
        #[arg(long)]
        no_sound: bool,

        /// Length of one time unit in milliseconds (for testing)
        #[arg(long, hide = true)]
        interval_ms: Option<u64>,
    },

    /// Show a routine's exercises and timings without running it
    Show {
        /// Routine file to show
        routine: PathBuf,

        /// Extra guide file (may be repeated; later guides take precedence)
        #[arg(short, long = "guide")]
        guides: Vec<PathBuf>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a guide file parses
    Check {
        /// Guide file to check
        guide: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    drill_core::logging::init_with_level(drill_core::logging::level_for(cli.verbose, cli.quiet));

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            routine,
            guides,
            no_sound,
            interval_ms,
        } => cmd_run(&config, &routine, &guides, no_sound, interval_ms),
        Commands::Show {
            routine,
            guides,
            json,
        } => cmd_show(&config, &routine, &guides, json),
        Commands::Check { guide } => cmd_check(&guide, cli.verbose),
    }
}

/// Configured guides first, then the ones named on the command line
fn load_guidebook(config: &Config, extra: &[PathBuf]) -> Result<GuideBook> {
    let mut guidebook = GuideBook::new();
    for path in config.guides.paths.iter().chain(extra) {
        let guide = Guide::load_file(path)?;
        if let Some(warning) = guidebook.add_guide(guide) {
            eprintln!("Warning: {}", warning);
        }
    }
    Ok(guidebook)
}

fn cmd_run(
    config: &Config,
    routine_path: &Path,
    guides: &[PathBuf],
    no_sound: bool,
    interval_ms: Option<u64>,
) -> Result<()> {
    let guidebook = load_guidebook(config, guides)?;
    let mut routine = RoutineFile::new().load_file(routine_path, &guidebook)?;
    if let Some(ms) = interval_ms {
        routine.set_interval(Duration::from_millis(ms));
    }

    print_banner(&routine);

    let sounder: Box<dyn Sounder> = if no_sound {
        Box::new(QuietSounder)
    } else {
        SounderRegistry::with_defaults().sounder(&config.sound)
    };
    let cues = CueSounds::from(&config.sound);
    let observer = ConsoleObserver;
    let ctx = RunContext::new(sounder.as_ref(), &observer, &cues);

    routine.start(&ctx)?;
    println!("Routine complete!");
    Ok(())
}

fn cmd_show(config: &Config, routine_path: &Path, guides: &[PathBuf], json: bool) -> Result<()> {
    let guidebook = load_guidebook(config, guides)?;
    let routine = RoutineFile::new().load_file(routine_path, &guidebook)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&routine.summary())?);
        return Ok(());
    }

    print_banner(&routine);
    for (i, exercise) in routine.summary().exercises.iter().enumerate() {
        println!(
            "{:>3}. {} ({}): read {}, exercise {}, rest {}",
            i + 1,
            exercise.name,
            exercise.id,
            exercise.timing.read_delay,
            exercise.timing.duration,
            exercise.timing.rest
        );
    }
    Ok(())
}

fn cmd_check(path: &Path, verbose: u8) -> Result<()> {
    let guide = Guide::load_file(path)?;
    println!("Parsed {} exercises OK", guide.len());

    if verbose > 0 {
        for definition in guide.definitions() {
            println!();
            println!("{}: {}", definition.id, definition.name);
            if !definition.description.is_empty() {
                println!("  {}", definition.description);
            }
            if verbose > 1 {
                for tip in &definition.tips {
                    println!("  - {}", tip);
                }
            } else if !definition.tips.is_empty() {
                println!("  ({} tips)", definition.tips.len());
            }
        }
    }
    Ok(())
}

fn print_banner(routine: &Routine<'_>) {
    let rule = "*".repeat(BANNER_WIDTH);
    println!("{}", rule);
    if let Some(name) = routine.name() {
        println!("{}", name);
    }
    if let Some(description) = routine.description() {
        println!();
        println!("{}", description);
    }
    println!();
    println!(
        "{} exercises, total time {}",
        routine.len(),
        format_duration(routine.total_time())
    );
    println!("{}", rule);
}

/// Prints exercise progress to stdout
struct ConsoleObserver;

impl ExerciseObserver for ConsoleObserver {
    fn on_phase(&self, exercise: &ExerciseDefinition, phase: Phase, units: u64) {
        match phase {
            Phase::ReadDelay => {
                println!();
                println!("{}", exercise.name);
                if !exercise.description.is_empty() {
                    println!("{}", exercise.description);
                }
                for tip in &exercise.tips {
                    println!("  - {}", tip);
                }
                println!("Get ready... ({}s)", units);
            }
            Phase::Active => print!("Go! ({}s) ", units),
            Phase::Resting => {
                println!();
                println!("Rest ({}s)", units);
            }
            Phase::Done => println!("Done: {}", exercise.name),
            Phase::Unprepared | Phase::Prepared => {}
        }
        let _ = io::stdout().flush();
    }

    fn on_tick(&self, _exercise: &ExerciseDefinition, _elapsed: u64, _remaining: u64) -> ControlFlow<()> {
        print!(".");
        let _ = io::stdout().flush();
        ControlFlow::Continue(())
    }
}
