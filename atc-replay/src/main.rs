//! atc-replay: CLI for replaying perception snapshots through the world model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use atc_core::{load_config, AirportTopology, PerceptionSnapshot, WorldEvent, WorldModel};

/// Snapshots buffered between the reader and the world-model task.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Parser)]
#[command(name = "atc-replay", version, about = "Airspace world model replay tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay JSON-lines perception snapshots and print the resulting world
    Replay {
        /// File with one snapshot per line, or "-" for stdin
        file: PathBuf,

        /// Airport and rules configuration (JSON)
        #[arg(long, env = "ATC_AIRPORT")]
        airport: PathBuf,

        /// Print the final world state as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Validate an airport layout and query runways and taxi routes
    Topology {
        /// Airport and rules configuration (JSON)
        #[arg(long, env = "ATC_AIRPORT")]
        airport: PathBuf,

        /// Wind direction (degrees) for runway ranking
        #[arg(long)]
        wind_dir: Option<f64>,

        /// Wind speed (knots)
        #[arg(long, default_value = "0")]
        wind_speed: f64,

        /// Taxi route start node
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Taxi route end node
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so tables and JSON on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            airport,
            json,
        } => cmd_replay(file, airport, json).await,
        Commands::Topology {
            airport,
            wind_dir,
            wind_speed,
            from,
            to,
        } => cmd_topology(airport, wind_dir, wind_speed, from, to),
    }
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ReplayStats {
    snapshots: u64,
    entered: u64,
    exited: u64,
    completed: u64,
    conflicts: u64,
}

impl ReplayStats {
    fn record(&mut self, event: &WorldEvent) {
        match event {
            WorldEvent::AircraftEntered { .. } => self.entered += 1,
            WorldEvent::AircraftExited { successful, .. } => {
                self.exited += 1;
                if *successful {
                    self.completed += 1;
                }
            }
            WorldEvent::ConflictAppeared(_) => self.conflicts += 1,
            WorldEvent::StatusChanged { .. } | WorldEvent::ConflictResolved(_) => {}
        }
    }
}

async fn cmd_replay(file: PathBuf, airport: PathBuf, json: bool) -> Result<()> {
    let config = load_config(&airport)
        .with_context(|| format!("loading airport config {}", airport.display()))?;
    let mut world = WorldModel::from_config(&config)?;

    let input = open_input(&file).await?;
    let (tx, mut rx) = mpsc::channel::<PerceptionSnapshot>(CHANNEL_CAPACITY);
    let reader = tokio::spawn(read_snapshots(input, tx));

    // Single writer: only this loop touches the world model
    let mut stats = ReplayStats::default();
    while let Some(snapshot) = rx.recv().await {
        stats.snapshots += 1;
        for event in world.update_from_perception(&snapshot) {
            stats.record(&event);
            if !json {
                println!("[{:>5}] {event}", world.update_count());
            }
        }
    }

    let skipped = reader.await.context("snapshot reader task failed")??;
    info!(
        "replayed {} snapshots from {} ({skipped} skipped)",
        stats.snapshots,
        file.display()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&world.get_state())?);
        return Ok(());
    }

    println!();
    println!("Replay complete: {}", file.display());
    println!(
        "  Snapshots: {} applied, {skipped} skipped",
        stats.snapshots
    );
    println!(
        "  Aircraft: {} entered, {} exited ({} completed)",
        stats.entered, stats.exited, stats.completed
    );
    println!("  Conflicts raised: {}", stats.conflicts);
    println!();

    print_aircraft_table(&world);
    println!("{}", world.situation_summary());
    println!();
    println!("{}", world.conflict_summary());
    Ok(())
}

async fn open_input(file: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if file.to_str() == Some("-") {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let f = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    Ok(Box::new(BufReader::new(f)))
}

/// Parse one snapshot per line and hand each to the world-model task.
/// Returns the number of malformed lines skipped.
async fn read_snapshots(
    input: Box<dyn AsyncBufRead + Unpin + Send>,
    tx: mpsc::Sender<PerceptionSnapshot>,
) -> Result<u64> {
    let mut lines = input.lines();
    let mut line_no = 0u64;
    let mut skipped = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<PerceptionSnapshot>(text) {
            Ok(snapshot) => {
                if tx.send(snapshot).await.is_err() {
                    // Receiver gone; nothing left to feed
                    break;
                }
            }
            Err(e) => {
                warn!("line {line_no}: skipping malformed snapshot: {e}");
                skipped += 1;
            }
        }
    }
    Ok(skipped)
}

fn print_aircraft_table(world: &WorldModel) {
    if world.aircraft_count() == 0 {
        println!("No aircraft tracked");
        println!();
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Callsign", "Type", "Weight", "Status", "Runway", "Lat", "Lon", "Alt (ft)",
        "Speed (kts)", "Hdg", "Conf", "Conflicts",
    ]);

    for ac in world.all_aircraft() {
        let pos = ac.current_position();
        table.add_row(vec![
            Cell::new(&ac.callsign),
            Cell::new(ac.aircraft_type.as_deref().unwrap_or("-")),
            Cell::new(ac.weight_class),
            Cell::new(ac.status),
            Cell::new(ac.assigned_runway.as_deref().unwrap_or("-")),
            Cell::new(pos.map(|p| format!("{:.4}", p.lat)).unwrap_or("-".into())),
            Cell::new(pos.map(|p| format!("{:.4}", p.lon)).unwrap_or("-".into())),
            Cell::new(
                ac.altitude_ft()
                    .map(|a| format!("{a:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                ac.speed_knots
                    .or_else(|| ac.velocity_vector().map(|(s, _)| s))
                    .map(|s| format!("{s:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                ac.heading
                    .map(|h| format!("{h:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(format!("{:.2}", ac.confidence)),
            Cell::new(world.conflicts_for_aircraft(&ac.callsign).len()),
        ]);
    }

    println!("{table}");
    println!();
}

// ---------------------------------------------------------------------------
// topology
// ---------------------------------------------------------------------------

fn cmd_topology(
    airport: PathBuf,
    wind_dir: Option<f64>,
    wind_speed: f64,
    from: Option<String>,
    to: Option<String>,
) -> Result<()> {
    let config = load_config(&airport)
        .with_context(|| format!("loading airport config {}", airport.display()))?;
    let topo = AirportTopology::from_config(&config.airport)?;

    println!();
    println!(
        "Airport {}: {} runways, {} nodes, {} edges",
        topo.airport_code,
        topo.runways().len(),
        topo.node_count(),
        topo.edge_count()
    );

    let issues = topo.validate_topology();
    if issues.is_empty() {
        println!("  Validation: OK");
    } else {
        println!("  Validation: {} issues", issues.len());
        for issue in &issues {
            println!("    - {issue}");
        }
    }
    println!();

    let mut table = Table::new();
    table.set_header(vec![
        "Runway", "Heading", "Length (ft)", "ILS", "Headwind (kts)", "Crosses",
    ]);
    for rwy in topo.runways() {
        let crossing = topo.get_intersecting_runways(&rwy.name);
        table.add_row(vec![
            Cell::new(&rwy.name),
            Cell::new(format!("{:03.0}", rwy.magnetic_heading)),
            Cell::new(format!("{:.0}", rwy.length_feet)),
            Cell::new(if rwy.ils_available { "yes" } else { "no" }),
            Cell::new(
                wind_dir
                    .map(|d| format!("{:+.1}", rwy.headwind_component(d, wind_speed)))
                    .unwrap_or("-".into()),
            ),
            Cell::new(if crossing.is_empty() {
                "-".to_string()
            } else {
                crossing.join(", ")
            }),
        ]);
    }
    println!("{table}");

    if let Some(dir) = wind_dir {
        let ranked: Vec<&str> = topo
            .get_active_runways(dir, wind_speed, true)
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        println!();
        println!(
            "Preferred runways for wind {dir:03.0}/{wind_speed:.0}: {}",
            if ranked.is_empty() {
                "none".to_string()
            } else {
                ranked.join(", ")
            }
        );
    }

    if let (Some(from), Some(to)) = (from, to) {
        println!();
        match topo.find_route(&from, &to) {
            Some(route) => {
                println!("Route {from} -> {to}: {:.0} m", route.distance_meters);
                println!("  Nodes:    {}", route.nodes.join(" -> "));
                println!("  Taxiways: {}", route.taxiways.join(", "));
            }
            None => println!("No route from {from} to {to}"),
        }
    }
    println!();
    Ok(())
}
