use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use forecast_desk::calendar::rolling_window;
use forecast_desk::export::write_csv;
use forecast_desk::{
    DeskConfig, ForecastEngine, ForecastType, JsonFileRepository, Method, MethodChange, MonthKey,
    RecordDraft, ReviewExit, Weight,
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "forecast-desk", version, about = "Monthly budget forecasts with AI forecast acknowledgment")]
struct Cli {
    /// Project to operate on
    #[arg(long, env = "FORECAST_DESK_PROJECT", default_value = "default")]
    project: String,

    /// Override the data directory from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a distribution without touching any project
    Distribute {
        #[arg(long)]
        budget: f64,
        #[arg(long, default_value = "LINEAR")]
        method: Method,
        #[arg(long, default_value = "5")]
        weight: String,
        /// Record id used to seed the AI forecast curve
        #[arg(long, default_value = "preview")]
        seed_id: String,
    },
    /// Add a MANUAL forecast line
    Add {
        #[arg(long)]
        id: String,
        #[arg(long = "type")]
        forecast_type: ForecastType,
        #[arg(long)]
        cost_code: String,
        #[arg(long)]
        budget: f64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "5")]
        weight: String,
    },
    /// List forecast lines and their review state
    List,
    /// Change a line's distribution method
    SetMethod {
        #[arg(long)]
        id: String,
        #[arg(long)]
        method: Method,
    },
    /// Change a line's weight (1-10)
    SetWeight {
        #[arg(long)]
        id: String,
        #[arg(long)]
        weight: String,
    },
    /// Overwrite a single month
    EditMonth {
        #[arg(long)]
        id: String,
        #[arg(long)]
        month: MonthKey,
        #[arg(long)]
        amount: f64,
    },
    /// Accept the AI forecast of a line
    Acknowledge {
        #[arg(long)]
        id: String,
    },
    /// Reject the AI forecast of a line and restore its previous method
    Reject {
        #[arg(long)]
        id: String,
    },
    /// Try to leave the review of a line
    CloseReview {
        #[arg(long)]
        id: String,
    },
    /// Save current distributions as the previous forecast
    Commit {
        /// Commit a single line instead of all of them
        #[arg(long)]
        id: Option<String>,
    },
    /// Print portfolio totals
    Totals {
        #[arg(long = "type")]
        forecast_type: Option<ForecastType>,
    },
    /// Export records and totals as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = DeskConfig::from_env().context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Command::Distribute {
            budget,
            method,
            weight,
            seed_id,
        } => preview(&config, budget, method, Weight::parse(&weight), &seed_id),
        command => run(&cli.project, config, command),
    }
}

fn run(project: &str, config: DeskConfig, command: Command) -> anyhow::Result<()> {
    let repository = JsonFileRepository::new(&config.data_dir);
    let mut engine = ForecastEngine::open(project, config, repository)
        .with_context(|| format!("failed to open project {}", project))?;

    match command {
        Command::Distribute { .. } => bail!("distribute does not open a project"),
        Command::Add {
            id,
            forecast_type,
            cost_code,
            budget,
            description,
            weight,
        } => {
            let draft = RecordDraft::new(id, forecast_type, cost_code, budget)
                .with_description(description)
                .with_weight(Weight::parse(&weight));
            let record = engine.create_record(draft)?;
            println!("Added {} ({:.2})", record.id(), record.budget());
        }
        Command::List => {
            for record in engine.records().records() {
                println!(
                    "{:<12} {:<6} {:<10} {:<12} w={:<2} budget={:>14.2} review={}",
                    record.id(),
                    record.forecast_type(),
                    record.cost_code(),
                    record.method(),
                    record.weight(),
                    record.budget(),
                    engine.review_state(record.id())
                );
            }
        }
        Command::SetMethod { id, method } => match engine.set_method(&id, method)? {
            MethodChange::ReviewOpened => {
                let rationale = engine.rationale_for(&id)?;
                println!("{} switched to {}; review required.", id, method);
                println!("  {}", rationale.reasoning);
                for factor in rationale.factors {
                    println!("  - {}", factor);
                }
                println!("Run `acknowledge` or `reject` for {}.", id);
            }
            change => println!("{}: {:?}", id, change),
        },
        Command::SetWeight { id, weight } => {
            engine.set_weight(&id, Weight::parse(&weight))?;
            println!("{} weight set to {}", id, engine.record(&id)?.weight());
        }
        Command::EditMonth { id, month, amount } => {
            engine.edit_month(&id, month, amount)?;
            println!("{} {} set to {:.2}", id, month, amount);
        }
        Command::Acknowledge { id } => {
            let entry = engine.acknowledge(&id)?;
            println!("{} acknowledged by {} at {}", id, entry.user_id, entry.timestamp);
        }
        Command::Reject { id } => {
            let entry = engine.reject(&id)?;
            println!("{} rejected; method restored to {}", id, entry.previous_method);
        }
        Command::CloseReview { id } => match engine.request_close(&id) {
            ReviewExit::Closed => println!("{}: review closed", id),
            ReviewExit::ConfirmationRequired { record_id } => {
                bail!("{} has a pending AI forecast review; acknowledge or reject it first", record_id)
            }
        },
        Command::Commit { id } => {
            match id {
                Some(id) => engine.commit(&id)?,
                None => engine.commit_all(),
            }
            println!("Committed");
        }
        Command::Totals { forecast_type } => {
            let totals = engine.totals(forecast_type);
            println!("Records:                 {}", totals.record_count);
            println!("Budget:                  {:.2}", totals.budget);
            println!("Cost to complete:        {:.2}", totals.cost_to_complete);
            println!("Estimated at completion: {:.2}", totals.estimated_at_completion);
            println!("Variance:                {:.2}", totals.variance);
            for (month, amount) in &totals.monthly {
                let delta = totals.monthly_variance.get(month).copied().unwrap_or(0.0);
                println!("  {}  {:>14.2}  ({:+.2})", month, amount, delta);
            }
        }
        Command::Export { output } => {
            let totals = engine.totals(None);
            let records = engine.records().records();
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    write_csv(records, &totals, BufWriter::new(file))?;
                }
                None => write_csv(records, &totals, io::stdout().lock())?,
            }
        }
    }

    if engine.is_out_of_sync() {
        engine
            .resync()
            .context("changes were applied but could not be saved")?;
    }

    Ok(())
}

fn preview(
    config: &DeskConfig,
    budget: f64,
    method: Method,
    weight: Weight,
    seed_id: &str,
) -> anyhow::Result<()> {
    let calculator = config.calculator()?;
    let amounts = calculator.calculate(budget, method, weight, curve_math::seed_for(seed_id))?;
    let start = config
        .start_month
        .unwrap_or_else(forecast_desk::calendar::current_month);

    for (month, amount) in rolling_window(start, amounts.len()).iter().zip(&amounts) {
        println!("{}  {:>14.2}", month, amount);
    }
    println!("total    {:>14.2}", amounts.iter().sum::<f64>());
    Ok(())
}
