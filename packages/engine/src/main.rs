// packages/engine/src/main.rs
//! Car Dashboard
//!
//! Runs the Events API, drives an interactive dashboard session against it,
//! replays recorded sessions and prints the filtered event history.

use anyhow::{Context, Result};
use car_dashboard_engine::api::{ApiServer, EventsClient, SearchParams};
use car_dashboard_engine::history::render_page;
use car_dashboard_engine::observability::{init_metrics, init_tracing};
use car_dashboard_engine::simulation::{DashboardSession, DashboardSnapshot, KeyEvent};
use car_dashboard_engine::store::EventStore;
use car_dashboard_engine::utils::config::EngineConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "car-dashboard", version)]
#[command(about = "Car dashboard simulation and driving events API", long_about = None)]
struct Cli {
    /// Config file (defaults to ./dashboard.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Events API
    Serve,

    /// Drop and recreate the schema, then seed the default cars
    InitDb,

    /// Drive a car interactively, reading key tokens from stdin
    ///
    /// Tokens: space, ctrl, ^ctrl (release), 0-9, start, stop, replay,
    /// stop-replay, status, quit
    Drive {
        /// Car id (defaults to the first car)
        #[arg(long)]
        car: Option<i64>,
    },

    /// Replay the recorded events of a car
    Replay {
        #[arg(long)]
        car: i64,
    },

    /// Print one page of the filtered event history
    History(HistoryArgs),
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    car: Option<String>,

    /// acceleration or braking
    #[arg(long)]
    event_type: Option<String>,

    /// Events starting at or after this date
    #[arg(long)]
    start_date: Option<String>,

    /// Events ending at or before this date
    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    min_speed: Option<String>,

    #[arg(long)]
    max_speed: Option<String>,

    #[arg(long)]
    min_fuel: Option<String>,

    #[arg(long)]
    max_fuel: Option<String>,

    #[arg(long)]
    page: Option<u32>,

    #[arg(long)]
    limit: Option<u32>,
}

impl From<HistoryArgs> for SearchParams {
    fn from(args: HistoryArgs) -> Self {
        SearchParams {
            car_id: args.car,
            event_type: args.event_type,
            start_date: args.start_date,
            end_date: args.end_date,
            min_speed: args.min_speed,
            max_speed: args.max_speed,
            min_fuel: args.min_fuel,
            max_fuel: args.max_fuel,
            page: args.page.map(|p| p.to_string()),
            limit: args.limit.map(|l| l.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load_from(cli.config.as_deref())?;

    init_tracing(&config.observability)?;
    init_metrics(&config.observability)?;

    match cli.command {
        Commands::Serve => serve(&config).await,
        Commands::InitDb => init_db(&config).await,
        Commands::Drive { car } => drive(&config, car).await,
        Commands::Replay { car } => replay(&config, car).await,
        Commands::History(args) => history(&config, args.into()).await,
    }
}

async fn serve(config: &EngineConfig) -> Result<()> {
    info!("Starting Car Dashboard Events API v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(EventStore::open(&config.database).await?);
    let stats = store.stats().await?;
    info!(
        "Database {} ready: {} cars, {} events",
        config.database.path.display(),
        stats.cars,
        stats.events
    );

    let server = ApiServer::bind(config, store).await?;
    server.serve().await?;

    info!("Server stopped gracefully");
    Ok(())
}

async fn init_db(config: &EngineConfig) -> Result<()> {
    let store = EventStore::open(&config.database).await?;
    store.reset_schema().await?;
    let seeded = store.seed_default_cars().await?;

    println!(
        "Initialized {} with {} cars",
        config.database.path.display(),
        seeded
    );
    Ok(())
}

async fn connect(config: &EngineConfig, car: Option<i64>) -> Result<DashboardSession<EventsClient>> {
    let client = Arc::new(EventsClient::new(config.simulation.api_base_url.clone())?);
    let session = DashboardSession::connect(client, &config.simulation)
        .await
        .with_context(|| format!("Could not reach the Events API at {}", config.simulation.api_base_url))?;

    if let Some(car) = car {
        session.select_car(car).await?;
    }

    let car = session.car().context("No cars available")?;
    println!("Car: {} {} (max {} km/h)", car.name, car.model, car.max_speed);
    Ok(session)
}

fn describe(snapshot: &DashboardSnapshot) -> String {
    format!(
        "[{}] speed {:.1} km/h | fuel {:.1}% | distance {:.4} km | fuel used {:.2} | throttle {}%",
        snapshot.status.label(),
        snapshot.displayed_speed,
        snapshot.fuel_level,
        snapshot.total_distance,
        snapshot.fuel_used,
        snapshot.acceleration_percentage
    )
}

async fn drive(config: &EngineConfig, car: Option<i64>) -> Result<()> {
    let session = connect(config, car).await?;

    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            println!("{}", describe(&snapshot));
        }
    });

    println!("Type start, then space+digit to accelerate or ctrl+digit to brake; quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    'input: while let Some(line) = lines.next_line().await? {
        for token in line.split_whitespace() {
            let outcome = match token {
                "quit" | "exit" => break 'input,
                "start" => session.start().await,
                "stop" => {
                    session.stop().await;
                    Ok(())
                }
                "replay" => session.start_replay().await.map(|count| {
                    if count == 0 {
                        println!("No events to replay");
                    }
                }),
                "stop-replay" => {
                    session.stop_replay().await;
                    Ok(())
                }
                "status" => {
                    println!("{}", describe(&session.snapshot()));
                    Ok(())
                }
                key => match key.parse::<KeyEvent>() {
                    Ok(event) => session.handle_key(event).map(|_| ()),
                    Err(e) => {
                        println!("{}", e);
                        Ok(())
                    }
                },
            };

            if let Err(e) = outcome {
                warn!("{}", e);
            }
        }
    }

    session.stop().await;
    printer.abort();
    Ok(())
}

async fn replay(config: &EngineConfig, car: i64) -> Result<()> {
    let session = connect(config, Some(car)).await?;

    let mut updates = session.subscribe();
    let count = session.start_replay().await?;
    if count == 0 {
        println!("No events recorded for car {}", car);
        return Ok(());
    }
    println!("Replaying {} events", count);

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        println!("{}", describe(&snapshot));
        if !snapshot.is_replaying {
            break;
        }
    }

    Ok(())
}

async fn history(config: &EngineConfig, params: SearchParams) -> Result<()> {
    let client = EventsClient::new(config.simulation.api_base_url.clone())?;
    let cars = client.list_cars().await?;
    let page = client.search_events(&params).await?;

    println!("{}", render_page(&cars, &page));
    Ok(())
}
