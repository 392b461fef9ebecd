use clap::{Args, Parser, Subcommand};
use hiit_core::history::{find_workout, group_by_day, history_path};
use hiit_core::presets::{presets_path, resolve_preset};
use hiit_core::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "hiit")]
#[command(about = "Interval training timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store history and presets under this user
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workout (default)
    Run {
        /// Start from a saved preset (name or id)
        #[arg(long, conflicts_with = "from_history")]
        preset: Option<String>,

        /// Repeat a workout from history (id)
        #[arg(long)]
        from_history: Option<Uuid>,

        #[command(flatten)]
        overrides: WorkoutArgs,

        /// Do not record the workout in history
        #[arg(long)]
        no_save: bool,

        /// Only print phase changes, not the running countdown
        #[arg(long)]
        quiet: bool,
    },

    /// Manage saved presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Show completed workouts
    History {
        /// Also export the history to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// View or change the default workout
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    /// List presets, newest first
    List,
    /// Show one preset
    Show { preset: String },
    /// Save a new preset from the default workout plus overrides
    Save {
        name: String,
        #[command(flatten)]
        overrides: WorkoutArgs,
    },
    /// Rename or change a preset
    Update {
        preset: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        overrides: WorkoutArgs,
    },
    /// Delete a preset
    Delete { preset: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the default workout
    Show,
    /// Change the default workout
    Set {
        #[command(flatten)]
        overrides: WorkoutArgs,
    },
}

/// Per-field overrides of a workout config
#[derive(Args, Default)]
struct WorkoutArgs {
    /// Work phase length in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3600))]
    work: Option<u32>,

    /// Rest phase length in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=3600))]
    rest: Option<u32>,

    /// Exercises per round
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=50))]
    exercises: Option<u32>,

    /// Number of rounds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    rounds: Option<u32>,

    /// Break between rounds in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=3600))]
    round_reset: Option<u32>,

    /// Warm-up length in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=3600))]
    warm_up: Option<u32>,
}

impl WorkoutArgs {
    fn apply(&self, base: WorkoutConfig) -> WorkoutConfig {
        WorkoutConfig {
            work_time: self.work.unwrap_or(base.work_time),
            rest_time: self.rest.unwrap_or(base.rest_time),
            exercises: self.exercises.unwrap_or(base.exercises),
            rounds: self.rounds.unwrap_or(base.rounds),
            round_reset: self.round_reset.unwrap_or(base.round_reset),
            warm_up_time: self.warm_up.unwrap_or(base.warm_up_time),
        }
    }
}

/// Resolved settings shared by every command
struct Context {
    config: Config,
    config_path: PathBuf,
    data_dir: PathBuf,
    user: String,
}

fn main() -> Result<()> {
    // Initialize logging
    hiit_core::logging::init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::load_or_default(&config_path)?;
    let ctx = Context {
        data_dir: cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone()),
        user: cli.user.unwrap_or_else(|| config.user.id.clone()),
        config,
        config_path,
    };

    match cli.command {
        Some(Commands::Run {
            preset,
            from_history,
            overrides,
            no_save,
            quiet,
        }) => cmd_run(&ctx, preset, from_history, &overrides, no_save, quiet),
        Some(Commands::Presets { action }) => cmd_presets(&ctx, action),
        Some(Commands::History { csv }) => cmd_history(&ctx, csv),
        Some(Commands::Settings { action }) => cmd_settings(ctx, action),
        None => cmd_run(&ctx, None, None, &WorkoutArgs::default(), false, false),
    }
}

fn cmd_run(
    ctx: &Context,
    preset: Option<String>,
    from_history: Option<Uuid>,
    overrides: &WorkoutArgs,
    no_save: bool,
    quiet: bool,
) -> Result<()> {
    let base = if let Some(preset) = preset {
        let store = JsonPresetStore::new(presets_path(&ctx.data_dir));
        let found = resolve_preset(&store, &ctx.user, &preset)?
            .ok_or_else(|| Error::Other(format!("No preset named {:?}", preset)))?;
        println!("Preset: {}", found.name);
        found.config
    } else if let Some(id) = from_history {
        find_workout(&history_path(&ctx.data_dir), &ctx.user, id)?
            .ok_or_else(|| Error::Other(format!("No workout {} in history", id)))?
            .replay_config()
    } else {
        ctx.config.timer
    };
    let workout = overrides.apply(base);
    workout.validate()?;

    display_config(&workout);
    println!("Enter or 'p' to pause/resume, 's' to stop.");
    println!();

    let (tx, rx) = mpsc::channel();
    spawn_input_reader(tx);

    let mut runner = WorkoutRunner::new(MonotonicClock::new());
    let mut display = LiveDisplay::new(quiet);
    let outcome = run_session(
        &mut runner,
        workout,
        &rx,
        ctx.config.runner.tick_interval(),
        |event| display.show(event),
    )?;

    match outcome {
        SessionOutcome::Completed(summary) => {
            println!();
            println!("✓ Workout complete!");
            println!("  Total time: {}", format_time(u64::from(summary.total_time)));
            println!(
                "  {} exercises x {} rounds ({}s work / {}s rest)",
                summary.exercises, summary.rounds, summary.work_time, summary.rest_time
            );

            if !no_save {
                // A failed save is reported but does not undo the completed run
                let path = history_path(&ctx.data_dir);
                let mut sink = JsonlSink::new(&path);
                match sink.record(&ctx.user, &summary) {
                    Ok(_) => {
                        println!("✓ Saved to history");
                        match load_workouts(&path, &ctx.user) {
                            Ok(workouts) => println!("  Workouts completed: {}", workouts.len()),
                            Err(e) => tracing::warn!("Could not count workouts: {}", e),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to save workout: {}", e);
                        eprintln!("Failed to save workout: {}", e);
                    }
                }
            }
        }
        SessionOutcome::Stopped => {
            println!();
            println!("Workout stopped.");
        }
    }

    Ok(())
}

/// Forward stdin lines as session commands until EOF
fn spawn_input_reader(tx: Sender<Command>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim().to_lowercase().as_str() {
                "" | "p" => Command::TogglePause,
                "s" | "q" => Command::Stop,
                other => {
                    eprintln!("Unknown input {:?}: Enter/'p' pauses, 's' stops", other);
                    continue;
                }
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
}

/// Renders session events, printing the countdown only when it changes
struct LiveDisplay {
    quiet: bool,
    last_line: Option<(Phase, u32, bool)>,
}

impl LiveDisplay {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            last_line: None,
        }
    }

    fn show(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::PhaseEntered(state) => {
                if self.last_line.take().is_some() && !self.quiet {
                    println!();
                }
                match state.phase {
                    Phase::WarmUp => println!("▶ {}", state.phase),
                    _ => println!(
                        "▶ {}  exercise {}, round {}",
                        state.phase, state.current_exercise, state.current_round
                    ),
                }
            }
            SessionEvent::Tick(snapshot) => {
                let key = (snapshot.phase, snapshot.time_remaining, snapshot.is_paused);
                if self.quiet || self.last_line == Some(key) {
                    return;
                }
                self.last_line = Some(key);
                print!(
                    "\r  {:<10} {}  | Exercise {} | Round {} | Left ~{}{}   ",
                    snapshot.phase.label(),
                    format_time(u64::from(snapshot.time_remaining)),
                    snapshot.current_exercise,
                    snapshot.current_round,
                    format_time(snapshot.estimated_time_remaining),
                    if snapshot.is_paused { "  [PAUSED]" } else { "" }
                );
                // A status line that fails to flush is redrawn on the next tick
                io::stdout().flush().ok();
            }
            SessionEvent::Completed(_) | SessionEvent::Stopped => {}
        }
    }
}

fn cmd_presets(ctx: &Context, action: PresetAction) -> Result<()> {
    let mut store = JsonPresetStore::new(presets_path(&ctx.data_dir));

    match action {
        PresetAction::List => {
            let presets = store.list(&ctx.user)?;
            if presets.is_empty() {
                println!("No saved workouts yet.");
            }
            for preset in presets {
                println!("{}  {}", preset.id, preset.name);
                println!("    {}", describe(&preset.config));
            }
        }
        PresetAction::Show { preset } => {
            let found = require_preset(&store, ctx, &preset)?;
            println!("{} ({})", found.name, found.id);
            display_config(&found.config);
        }
        PresetAction::Save { name, overrides } => {
            let config = overrides.apply(ctx.config.timer);
            let created = store.create(&ctx.user, &name, config)?;
            println!("✓ Saved preset {} ({})", created.name, created.id);
        }
        PresetAction::Update {
            preset,
            name,
            overrides,
        } => {
            let found = require_preset(&store, ctx, &preset)?;
            let name = name.unwrap_or_else(|| found.name.clone());
            let updated = store.update(&ctx.user, found.id, &name, overrides.apply(found.config))?;
            println!("✓ Updated preset {} ({})", updated.name, updated.id);
        }
        PresetAction::Delete { preset } => {
            let found = require_preset(&store, ctx, &preset)?;
            store.delete(&ctx.user, found.id)?;
            println!("✓ Deleted preset {}", found.name);
        }
    }

    Ok(())
}

fn require_preset(store: &JsonPresetStore, ctx: &Context, preset: &str) -> Result<WorkoutPreset> {
    resolve_preset(store, &ctx.user, preset)?
        .ok_or_else(|| Error::Other(format!("No preset named {:?}", preset)))
}

fn cmd_history(ctx: &Context, csv: Option<PathBuf>) -> Result<()> {
    let workouts = load_workouts(&history_path(&ctx.data_dir), &ctx.user)?;

    if workouts.is_empty() {
        println!("No workout history yet.");
    }

    let today = chrono::Local::now().date_naive();
    for (day, group) in group_by_day(&workouts) {
        if day == today {
            println!("Today");
        } else {
            println!("{}", day.format("%a %d %b %Y"));
        }
        for workout in group {
            println!(
                "  {}  {}s / {}s  {} x {}  {}",
                workout.id,
                workout.work_time,
                workout.rest_time,
                workout.exercises,
                workout.rounds,
                format_time(u64::from(workout.total_time))
            );
        }
    }

    if let Some(path) = csv {
        let count = export_csv(&workouts, &path)?;
        println!("✓ Exported {} workouts to {}", count, path.display());
    }

    Ok(())
}

fn cmd_settings(ctx: Context, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            display_config(&ctx.config.timer);
        }
        SettingsAction::Set { overrides } => {
            let mut config = ctx.config;
            config.timer = overrides.apply(config.timer);
            config.timer.validate()?;
            config.save_to(&ctx.config_path)?;
            println!("✓ Settings saved to {}", ctx.config_path.display());
            display_config(&config.timer);
        }
    }
    Ok(())
}

fn display_config(config: &WorkoutConfig) {
    println!("  Work:        {}s", config.work_time);
    println!("  Rest:        {}s", config.rest_time);
    println!("  Exercises:   {}", config.exercises);
    println!("  Rounds:      {}X", config.rounds);
    println!("  Round Reset: {}s", config.round_reset);
    println!("  Warm-up:     {}s", config.warm_up_time);
    println!(
        "  Total Workout Time: {}",
        format_time(config.planned_total_seconds())
    );
}

fn describe(config: &WorkoutConfig) -> String {
    format!(
        "{}s work / {}s rest, {} exercises x {} rounds, {}s round reset, {}s warm-up",
        config.work_time,
        config.rest_time,
        config.exercises,
        config.rounds,
        config.round_reset,
        config.warm_up_time
    )
}

/// `mm:ss`
fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
