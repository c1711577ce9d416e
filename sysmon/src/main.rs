use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::io::Write;
use std::path::PathBuf;
use sysmon::ui::{Dashboard, Input};
use sysmon::{Collection, Collector, Config, HostSampler, MonitorService, SortKey, collect_blocking};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(clap::Parser, Debug)]
#[command(version, about = "Terminal host monitor with threshold alerts")]
struct Args {
    /// Path to the config file (default: $SYSMON_CONFIG, then ~/.config/sysmon/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// CPU alert threshold in percent
    #[arg(long, default_value_t = 0.0)]
    cpu: f64,

    /// Memory alert threshold in percent
    #[arg(long, default_value_t = 0.0)]
    mem: f64,

    /// Disk alert threshold in percent
    #[arg(long, default_value_t = 0.0)]
    disk: f64,

    /// Swap alert threshold in percent
    #[arg(long, default_value_t = 0.0)]
    swap: f64,

    /// Refresh interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Initial process ordering (cpu, memory, pid, name)
    #[arg(long)]
    sort: Option<String>,

    /// Collect once, print and exit
    #[arg(long)]
    once: bool,

    /// With --once, print the snapshot as JSON
    #[arg(long)]
    json: bool,

    /// Disable colorized output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, load_error) = load_config(args.config.clone());
    config.apply_env();
    apply_args(&mut config, &args);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    if let Some(e) = load_error {
        warn!("[config] {e:#}, using defaults");
    }
    config.validate().context("invalid configuration")?;
    if args.no_color {
        colored::control::set_override(false);
    }

    let collector = Collector::new(Box::new(HostSampler::new()), &config.collector_config());
    let dashboard = Dashboard::new(config.display.max_processes);

    if args.once {
        return run_once(collector, &config, &dashboard, args.json).await;
    }
    run_live(collector, &config, dashboard).await
}

/// The logger is not up yet, so a load failure is handed back for reporting.
fn load_config(path: Option<PathBuf>) -> (Config, Option<anyhow::Error>) {
    let path = match path.map(Ok).unwrap_or_else(Config::default_path) {
        Ok(path) => path,
        Err(e) => return (Config::default(), Some(e.into())),
    };
    match Config::load(&path) {
        Ok(config) => (config, None),
        Err(e) => {
            let context = format!("failed to load {}", path.display());
            (Config::default(), Some(anyhow::Error::new(e).context(context)))
        }
    }
}

fn apply_args(config: &mut Config, args: &Args) {
    // zero means "not given" for the threshold flags
    if args.cpu > 0.0 {
        config.thresholds.cpu = args.cpu;
    }
    if args.mem > 0.0 {
        config.thresholds.memory = args.mem;
    }
    if args.disk > 0.0 {
        config.thresholds.disk = args.disk;
    }
    if args.swap > 0.0 {
        config.thresholds.swap = args.swap;
    }
    if let Some(ms) = args.interval_ms {
        config.runtime.refresh_interval_ms = ms;
    }
    if let Some(sort) = &args.sort {
        config.display.default_sort = sort.clone();
    }
}

/// Two cycles one interval apart so rates and CPU usage have a baseline.
async fn run_once(
    collector: Collector,
    config: &Config,
    dashboard: &Dashboard,
    json: bool,
) -> Result<()> {
    let (collector, first) = collect_blocking(collector).await?;
    first?;
    tokio::time::sleep(config.refresh_interval()).await;
    let (_, collection) = collect_blocking(collector).await?;
    let collection = collection?;

    if json {
        let out = serde_json::json!({
            "snapshot": &*collection.snapshot,
            "failures": collection.failures,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", dashboard.render(&collection));
    }
    Ok(())
}

async fn run_live(collector: Collector, config: &Config, mut dashboard: Dashboard) -> Result<()> {
    let mut handle = MonitorService::spawn(collector, config.refresh_interval()).await?;
    let mut latest = handle.latest();
    draw(&dashboard, &latest).context("failed to write to stdout")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            update = handle.changed() => match update {
                Ok(collection) => {
                    latest = collection;
                    if let Err(e) = draw(&dashboard, &latest) {
                        warn!("[main] failed to write to stdout: {e}");
                        break;
                    }
                }
                Err(e) => {
                    warn!("[main] {e}");
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("[main] stdin closed");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!("[main] failed to read stdin: {e}");
                        stdin_open = false;
                        continue;
                    }
                };
                match Input::parse(&line) {
                    Some(Input::Quit) => break,
                    Some(Input::Sort(key)) => set_sort(&handle, key).await?,
                    Some(Input::Refresh) => handle.trigger_refresh().await?,
                    Some(Input::Show(view)) => dashboard.show(view),
                    Some(Input::NextView) => dashboard.next_view(),
                    Some(Input::PrevView) => dashboard.prev_view(),
                    None => {}
                }
                if let Err(e) = draw(&dashboard, &latest) {
                    warn!("[main] failed to write to stdout: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("[main] interrupted");
                break;
            }
        }
    }

    handle.shutdown().await
}

async fn set_sort(handle: &sysmon::MonitorHandle, key: SortKey) -> Result<()> {
    debug!("[main] sort by {key}");
    handle.set_sort_key(key).await
}

fn draw(dashboard: &Dashboard, collection: &Collection) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "\x1b[2J\x1b[H{}", dashboard.render(collection))?;
    stdout.flush()
}
