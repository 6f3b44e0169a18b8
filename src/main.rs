mod app;
mod errors;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use app::App;
use errors::IntoAppError;
use skycast_core::{AppError, Config, GeocodingError, LocationError};
use skycast_weather::{DisplayUnit, GradientRegistry, PlaceLocation};

/// Current weather for where you are, with a condition-aware theme.
#[derive(Parser, Debug)]
#[command(name = "skycast", version, about)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Show the current location and its weather (default)
    Locate,
    /// Forget the cached location and detect again
    Refresh,
    /// Keep showing the location, refreshing on the configured interval
    Watch,
    /// Search places by name
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// List saved cities
    Cities,
    /// Save the best match for a search
    Save {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Remove a saved city by name
    Forget {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Show or set the temperature unit
    Unit {
        #[arg(value_enum)]
        unit: Option<UnitArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum UnitArg {
    #[value(name = "C", alias = "c")]
    Celsius,
    #[value(name = "F", alias = "f")]
    Fahrenheit,
}

impl From<UnitArg> for DisplayUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Celsius => DisplayUnit::Celsius,
            UnitArg::Fahrenheit => DisplayUnit::Fahrenheit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    skycast_core::init()?;

    if let Err(e) = start(cli).await {
        tracing::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn start(cli: Cli) -> Result<(), AppError> {
    let (config, _) = match &cli.config {
        Some(path) => Config::load_validated_from(path)?,
        None => Config::load_validated()?,
    };
    let app = App::build(&config)?;
    run(&app, cli.command.unwrap_or(Command::Locate)).await
}

async fn run(app: &App, command: Command) -> Result<(), AppError> {
    match command {
        Command::Locate => locate_once(app).await,
        Command::Refresh => {
            let place = app
                .manager
                .refresh_location()
                .await
                .map_err(IntoAppError::into_app_error)?;
            show_location(app, place).await
        }
        Command::Watch => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
            };
            watch_until(app.refresh_interval, shutdown, || locate_once(app)).await;
            Ok(())
        }
        Command::Search { query } => {
            let places = search(app, &query.join(" ")).await?;
            for (i, place) in places.iter().enumerate() {
                println!("{:>2}. {}", i + 1, describe(place));
            }
            Ok(())
        }
        Command::Cities => {
            let cities = app.manager.storage().saved_cities();
            if cities.is_empty() {
                println!("No saved cities");
            }
            for place in &cities {
                println!("{}", describe(place));
            }
            Ok(())
        }
        Command::Save { query } => {
            let query = query.join(" ");
            let places = search(app, &query).await?;
            let Some(place) = places.first() else {
                return Err(GeocodingError::NoResults(query).into());
            };
            if app.manager.storage().add_saved_city(place) {
                println!("Saved {}", describe(place));
            } else {
                println!("{} is already saved", place.name);
            }
            Ok(())
        }
        Command::Forget { name } => {
            let name = name.join(" ");
            let storage = app.manager.storage();
            let matched: Vec<PlaceLocation> = storage
                .saved_cities()
                .into_iter()
                .filter(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .collect();
            if matched.is_empty() {
                println!("No saved city named {}", name.trim());
            }
            for place in &matched {
                let removed = storage.remove_saved_city(place);
                tracing::debug!("Removed {} entries for {}", removed, place.name);
                println!("Forgot {}", describe(place));
            }
            Ok(())
        }
        Command::Unit { unit } => {
            let storage = app.manager.storage();
            if let Some(unit) = unit {
                storage.set_unit(unit.into());
            }
            let stored = storage.unit();
            println!("Unit: {}", stored.symbol());
            if let Some(forced) = app.configured_unit.filter(|u| *u != stored) {
                println!("Overridden by weather.temperature_unit: {}", forced.symbol());
            }
            Ok(())
        }
    }
}

/// Run `update` on every tick of `period` until `shutdown` resolves.
///
/// Failed updates are reported and the loop carries on. Shutdown is observed
/// while an update is still in flight.
async fn watch_until<S, F, Fut>(period: Duration, shutdown: S, mut update: F)
where
    S: Future<Output = ()>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let mut ticker = tokio::time::interval(period);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Stopping watch");
                return;
            }
            result = async {
                ticker.tick().await;
                update().await
            } => {
                if let Err(e) = result {
                    tracing::warn!("Watch update failed: {}", e);
                    eprintln!("{}", e.user_message());
                }
            }
        }
    }
}

async fn locate_once(app: &App) -> Result<(), AppError> {
    let place = app
        .manager
        .user_location()
        .await
        .map_err(IntoAppError::into_app_error)?;
    show_location(app, place).await
}

async fn search(app: &App, query: &str) -> Result<Vec<PlaceLocation>, AppError> {
    let places = app
        .geocoder
        .search(query)
        .await
        .map_err(IntoAppError::into_app_error)?;
    if places.is_empty() {
        return Err(GeocodingError::NoResults(query.to_string()).into());
    }
    Ok(places)
}

async fn show_location(app: &App, place: Option<PlaceLocation>) -> Result<(), AppError> {
    let Some(place) = place else {
        return Err(LocationError::Unavailable("no position detected".to_string()).into());
    };
    println!("{}", describe(&place));

    let conditions = app
        .conditions
        .conditions(place.coordinates())
        .await
        .map_err(IntoAppError::into_app_error)?;
    let key = conditions.theme_key(Utc::now());
    let stops = GradientRegistry::builtin().gradient_or_default(&key);

    if let Some(celsius) = conditions.temperature {
        let unit = app.display_unit();
        println!("Temperature: {:.1}{}", unit.convert_celsius(celsius), unit.symbol());
    }
    println!("Theme: {}", key);
    println!("Gradient: {}", stops.join(" -> "));
    Ok(())
}

fn describe(place: &PlaceLocation) -> String {
    let mut line = format!(
        "{}, {} ({:.4}, {:.4})",
        place.name, place.country, place.latitude, place.longitude
    );
    if let Some(tz) = &place.timezone {
        line.push_str(&format!(" [{}]", tz));
    }
    line
}
