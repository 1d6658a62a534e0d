use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tallyshade::datasets::pluto::{self, DensityView};
use tallyshade::datasets::Dashboard;
use tallyshade::loader::load_path;
use tallyshade::runtime::{self, BinsChart, Export};
use tallyshade::{parser, Config};

#[derive(Parser, Debug)]
#[command(name = "tallyshade")]
#[command(about = "Bin, count and density-shade tabular records, and drive filter dashboards from the command line", long_about = None)]
struct Args {
    /// JSON file with render and density options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count PLUTO lots by build year, decade or floor range
    Bins {
        /// PLUTO CSV file, or - for stdin
        input: PathBuf,
        /// year, decade, floors or floors-low
        #[arg(long, default_value = "decade")]
        chart: BinsChart,
        /// Custom floor ranges for the floors chart, e.g. '[0, 10, 20, inf) -> low, mid, high'
        #[arg(long)]
        breaks: Option<String>,
        /// png, svg or json
        #[arg(long, default_value = "png")]
        format: Export,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Render a PLUTO pixel-density image to PNG
    Density {
        /// PLUTO CSV file, or - for stdin
        input: PathBuf,
        /// year-floors, lots or bivariate
        #[arg(long, default_value = "lots")]
        view: DensityView,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Apply a selection to a dashboard (trees or anxiety)
    Select {
        /// trees or anxiety
        dataset: String,
        /// CSV or JSON file, or - for stdin
        input: PathBuf,
        /// Selection, e.g. 'borough=Bronx, species="American beech"'; dimensions left out keep their default
        #[arg(long)]
        select: Option<String>,
        /// Dashboard view (trees: health, steward; anxiety: group, state, region)
        #[arg(long)]
        view: Option<String>,
        /// Print the payload as JSON instead of drawing a chart
        #[arg(long)]
        json: bool,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn write_output(bytes: &[u8], out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => Config::default(),
    };

    let (bytes, out) = match args.command {
        Command::Bins { input, chart, breaks, format, out } => {
            let breaks = breaks
                .as_deref()
                .map(parser::parse_breakpoints)
                .transpose()
                .context("Failed to parse --breaks")?;
            let lots = load_path(&input, None, &pluto::schema())
                .with_context(|| format!("Failed to load {}", input.display()))?;
            (runtime::run_bins(&lots, chart, breaks.as_ref(), format, &config.render)?, out)
        }
        Command::Density { input, view, out } => {
            let lots = load_path(&input, None, &pluto::schema())
                .with_context(|| format!("Failed to load {}", input.display()))?;
            (runtime::run_density(&lots, view, &config.density)?, out)
        }
        Command::Select { dataset, input, select, view, json, out } => {
            let dashboard = Dashboard::lookup(&dataset, view.as_deref())?;
            let selection = select
                .as_deref()
                .map(parser::parse_selection)
                .transpose()
                .context("Failed to parse --select")?;
            let format = (input == Path::new("-")).then(|| dashboard.source_format());
            let table = load_path(&input, format, &dashboard.schema())
                .with_context(|| format!("Failed to load {}", input.display()))?;
            let export = if json {
                Export::Json
            } else {
                Export::Chart(config.render.format)
            };
            (runtime::run_select(&table, dashboard, selection, export, &config.render)?, out)
        }
    };

    write_output(&bytes, out.as_deref())
}
