//! Play-call prediction CLI
//!
//! Imports a season of NFL play-by-play data, builds the causal feature
//! matrix, and searches baseline classifiers for run/pass prediction.

use clap::{Parser, Subcommand, ValueEnum};
use playcall::{Config, Result};

#[derive(Parser)]
#[command(name = "playcall")]
#[command(about = "Run/pass play-call prediction from NFL play-by-play data", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "playcall.toml")]
    config: String,

    /// Override the configured season
    #[arg(long)]
    season: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Build the feature matrix and selection for the season
    Features,
    /// Search hyperparameters of the baseline classifiers
    Tune {
        /// Override the trial budget per family
        #[arg(long)]
        budget: Option<usize>,
        /// Override the worker count
        #[arg(long)]
        workers: Option<usize>,
        /// Discard earlier trial results
        #[arg(long)]
        overwrite: bool,
        /// Model family to search
        #[arg(long, value_enum, default_value = "all")]
        family: FamilyChoice,
    },
    /// Show logged trials and the test accuracy of each family's best
    Report {
        /// Trials listed per family
        #[arg(long, default_value = "5")]
        top: usize,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Download the season extract
    Fetch {
        /// Use only a file already on disk (no network requests)
        #[arg(long)]
        offline: bool,
        /// Download even if the file exists
        #[arg(long)]
        refresh: bool,
    },
    /// Parse an extract and store its plays
    Import {
        /// Extract to read (defaults to the fetched season file)
        #[arg(long)]
        file: Option<String>,
        /// Remove the season's stored plays first
        #[arg(long)]
        replace: bool,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FamilyChoice {
    All,
    Logistic,
    Gbdt,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let mut config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };
    if let Some(season) = cli.season {
        config.run.season = season;
    }

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Data { action } => match action {
            DataCommands::Fetch { offline, refresh } => {
                commands::data_fetch(&config, offline, refresh)
            }
            DataCommands::Import { file, replace } => {
                commands::data_import(&config, file, replace)
            }
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Features => commands::features(&config),
        Commands::Tune {
            budget,
            workers,
            overwrite,
            family,
        } => commands::tune(&config, budget, workers, overwrite, family),
        Commands::Report { top } => commands::report(&config, top),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use playcall::data::{read_extract_file, Database, ModelMatrix, SeasonSource};
    use playcall::features::FeatureSelection;
    use playcall::pipeline::FeaturePipeline;
    use playcall::training::search::{evaluate, rank_trials};
    use playcall::training::{
        FamilyReport, GbdtFamily, LogisticFamily, ModelFamily, ModelSearch, TrialLog,
    };

    type SearchBackend = Autodiff<NdArray<f32>>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        let paths = config.paths();
        std::fs::create_dir_all(&paths.data_dir)?;
        std::fs::create_dir_all(&paths.output_dir)?;
        println!(
            "Created {}/ and {}/ directories",
            paths.data_dir, paths.output_dir
        );

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'playcall data fetch' and 'playcall data import'");
        println!("  3. Run 'playcall features' to build the feature matrix");
        println!("  4. Run 'playcall tune' to search the classifiers");

        Ok(())
    }

    pub fn data_fetch(config: &Config, offline: bool, refresh: bool) -> Result<()> {
        let source = SeasonSource::new(&config.paths().data_dir)?
            .offline_only(offline)
            .refresh(refresh);

        if offline {
            println!("Offline mode: using files on disk only");
        }
        let path = source.fetch_season(config.run.season)?;
        println!("Season {} extract at {}", config.run.season, path.display());
        Ok(())
    }

    pub fn data_import(config: &Config, file: Option<String>, replace: bool) -> Result<()> {
        let path = file
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|| config.extract_path());
        let db = Database::open(&config.paths().database_path)?;

        println!("Reading {}...", path.display());
        let plays = read_extract_file(&path)?;
        println!("Parsed {} plays", plays.len());

        if replace {
            let mut seasons: Vec<u16> = plays.iter().map(|p| p.season).collect();
            seasons.sort_unstable();
            seasons.dedup();
            for season in seasons {
                let removed = db.clear_season(season)?;
                println!("Removed {} stored plays of season {}", removed, season);
            }
        }

        let count = db.upsert_plays(&plays)?;
        println!("Stored {} plays in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.paths().database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.paths().database_path);
        println!("  Plays:    {}", stats.play_count);
        println!("  Games:    {}", stats.game_count);
        let seasons: Vec<String> = stats.seasons.iter().map(|s| s.to_string()).collect();
        println!("  Seasons:  {}", seasons.join(", "));
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:    {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn features(config: &Config) -> Result<()> {
        let db = Database::open(&config.paths().database_path)?;
        let raw = db.require_season(config.run.season)?;
        println!("Loaded {} plays of season {}", raw.len(), config.run.season);

        let output = FeaturePipeline::new(config).run(raw)?;
        output.save(config)?;

        let summary = &output.summary;
        println!("\n=== Feature Pipeline ===\n");
        println!(
            "  Filter:     kept {} of {} plays",
            summary.filter.kept, summary.filter.input
        );
        println!("  Weather:    {} indoor plays given defaults", summary.weather_filled);
        println!("  Columns:    {} engineered", summary.encoded_columns);
        println!("  Lag window: {} rows dropped", summary.lag_dropped);
        println!(
            "  Folds:      train {}, validation {}, test {}",
            summary.train_rows, summary.validation_rows, summary.test_rows
        );
        println!(
            "  Selected:   {} of {} features",
            output.selection.names.len(),
            output.selection.candidates
        );
        for (name, score) in output.selection.names.iter().zip(&output.selection.scores) {
            println!("    {:<32} {:.4}", name, score);
        }
        println!("\nWrote {}", config.matrix_path().display());
        println!("Wrote {}", config.selection_path().display());
        Ok(())
    }

    fn load_matrix(config: &Config) -> Result<ModelMatrix> {
        let selection = FeatureSelection::load(&config.selection_path())?;
        ModelMatrix::read_csv(&config.matrix_path(), &selection)
    }

    fn families(config: &Config, choice: FamilyChoice) -> Vec<Box<dyn ModelFamily>> {
        let mut families: Vec<Box<dyn ModelFamily>> = Vec::new();
        if matches!(choice, FamilyChoice::All | FamilyChoice::Logistic) {
            families.push(Box::new(LogisticFamily::<SearchBackend>::new(
                Default::default(),
            )));
        }
        if matches!(choice, FamilyChoice::All | FamilyChoice::Gbdt) {
            families.push(Box::new(GbdtFamily::new(config.run.seed)));
        }
        families
    }

    pub fn tune(
        config: &Config,
        budget: Option<usize>,
        workers: Option<usize>,
        overwrite: bool,
        family: FamilyChoice,
    ) -> Result<()> {
        let mut search_config = config.search.clone();
        if let Some(b) = budget {
            search_config.budget = b;
        }
        if let Some(w) = workers {
            search_config.workers = w;
        }
        search_config.overwrite |= overwrite;

        let matrix = load_matrix(config)?;
        let data = matrix.partitions()?;
        println!(
            "Loaded matrix: {} features, train {}, validation {}, test {}",
            data.n_features(),
            data.train.len(),
            data.validation.len(),
            data.test.len()
        );

        let log = TrialLog::open(&config.trials_path(), search_config.overwrite)?;
        let search = ModelSearch::new(&search_config, config.run.seed, log)?;

        let mut reports: Vec<FamilyReport> = Vec::new();
        for family in families(config, family) {
            reports.push(search.run(family.as_ref(), &data)?);
        }

        println!("\n=== Search Results ===\n");
        println!(
            "{:<10} {:>5} {:>8} {:>10} {:>10}  {}",
            "Family", "Run", "Skipped", "Val%", "Test%", "Best"
        );
        println!("{}", "-".repeat(80));
        for report in &reports {
            if let Some(best) = report.best() {
                println!(
                    "{:<10} {:>5} {:>8} {:>9.2}% {:>9.2}%  {}",
                    report.family,
                    report.trials_run,
                    report.trials_skipped,
                    best.validation_accuracy * 100.0,
                    report.test.accuracy() * 100.0,
                    best.params
                );
            }
        }
        println!(
            "\nMajority-class test baseline: {:.2}%",
            reports
                .first()
                .map(|r| r.test.majority_baseline() * 100.0)
                .unwrap_or_default()
        );
        println!("Trials logged to {}", search.log().path().display());
        Ok(())
    }

    pub fn report(config: &Config, top: usize) -> Result<()> {
        let path = config.trials_path();
        if !path.exists() {
            println!("No trial log at {}. Run 'playcall tune' first.", path.display());
            return Ok(());
        }
        let log = TrialLog::open(&path, false)?;
        let matrix = load_matrix(config)?;
        let data = matrix.partitions()?;
        let fingerprint = data.fingerprint();

        for family in families(config, FamilyChoice::All) {
            let mut records = log.records_for(family.name());
            let logged = records.len();
            records.retain(|r| r.matrix == fingerprint);
            if records.len() < logged {
                log::warn!(
                    "Ignoring {} {} trials scored on an earlier feature matrix",
                    logged - records.len(),
                    family.name()
                );
            }
            if records.is_empty() {
                continue;
            }
            rank_trials(&mut records);

            println!("\n=== {} ({} trials) ===\n", family.name(), records.len());
            println!(
                "{:>6} {:>10} {:>10} {:>10}  {}",
                "Trial", "Train%", "Val%", "ValLoss", "Hyperparameters"
            );
            println!("{}", "-".repeat(80));
            for r in records.iter().take(top) {
                println!(
                    "{:>6} {:>9.2}% {:>9.2}% {:>10.4}  {}",
                    r.trial,
                    r.train_accuracy * 100.0,
                    r.validation_accuracy * 100.0,
                    r.validation_log_loss,
                    r.params
                );
            }

            let best = &records[0];
            let model = family.fit(&best.params, &data.train)?;
            println!("\nBest refit on train -> test: {}", evaluate(model.as_ref(), &data.test));
        }
        Ok(())
    }
}
