#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal client for the mozzi map.
//!
//! ```text
//! mozzi locations
//! mozzi show <id>
//! mozzi search <query>
//! mozzi recommend [--selected <id>]
//! mozzi report <id> <level> [--dimension parking] --email <e> --password <p>
//! mozzi add [name] (--lat <lat> --lng <lng> | --address <address>)
//! mozzi geocode <address>
//! mozzi map --out markers.geojson
//! mozzi watch [--count <n>]
//! mozzi serve
//! ```
//!
//! Running `mozzi` with no subcommand enters the interactive session.
//! Connection settings come from `SUPABASE_URL`, `SUPABASE_ANON_KEY` and
//! the optional TOML file named by `MOZZI_CONFIG`.

mod card;
mod interactive;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mozzi_app::App;
use mozzi_app::config::Config;
use mozzi_app::places::NewPlaceForm;
use mozzi_app::view::ViewState;
use mozzi_geocoder::{FallbackGeocoder, GeocodeService};
use mozzi_location_models::{Dimension, Level, LocationId};
use mozzi_map::{GeoJsonRenderer, MapRenderer, MapView, markers};

#[derive(Parser)]
#[command(
    name = "mozzi",
    about = "Browse and report congestion on the mozzi map"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every location with its scores
    Locations,
    /// Show the card for one location
    Show {
        /// Location id
        id: String,
    },
    /// Find locations whose name contains a query
    Search {
        /// Text to look for (case-sensitive)
        query: String,
    },
    /// Suggest quieter places
    Recommend {
        /// Location on the home card; defaults to the first one
        #[arg(long)]
        selected: Option<String>,
    },
    /// Report congestion or parking for a location
    Report {
        /// Location id
        id: String,
        /// Rating from 1 (empty) to 5 (packed)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        level: u8,
        /// `congestion` or `parking`
        #[arg(long, default_value = "congestion")]
        dimension: Dimension,
        /// Free-text comment (congestion only)
        #[arg(long)]
        comment: Option<String>,
        /// Account email
        #[arg(long)]
        email: Option<String>,
        /// Account password
        #[arg(long)]
        password: Option<String>,
    },
    /// Add a new place
    Add {
        /// Place name; taken from the address lookup when omitted
        name: Option<String>,
        /// Latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        /// Longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<String>,
        /// Fill name and coordinates from this address
        #[arg(long)]
        address: Option<String>,
    },
    /// Look up coordinates for an address
    Geocode {
        /// Free-text address
        address: String,
    },
    /// Write the map markers as `GeoJSON`
    Map {
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Location to centre on; defaults to the first one
        #[arg(long)]
        selected: Option<String>,
    },
    /// Print the location list every time it changes
    Watch {
        /// Stop after this many updates
        #[arg(long)]
        count: Option<usize>,
    },
    /// Serve the read-only map feed over HTTP
    Serve,
}

/// Connects and loads the location list once.
async fn connect() -> Result<App, Box<dyn std::error::Error>> {
    let app = App::connect(Config::from_env()?)?;
    if !app.sync().refresh().await {
        return Err("Failed to load locations".into());
    }
    Ok(app)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run().await;
    };

    match command {
        Commands::Locations => {
            let snapshot = connect().await?.sync().snapshot();
            for scored in snapshot.locations.iter() {
                println!("{}", card::summary_line(scored));
            }
            println!("\n{} location(s)", snapshot.locations.len());
        }
        Commands::Show { id } => {
            let snapshot = connect().await?.sync().snapshot();
            let id = LocationId::new(id);
            let Some(scored) = snapshot.find(&id) else {
                eprintln!("Location not found: {id}");
                std::process::exit(1);
            };
            let recommendations =
                mozzi_app::recommend::recommendations(&snapshot.locations, Some(&id));
            for line in card::home_card(scored, &recommendations) {
                println!("{line}");
            }
        }
        Commands::Search { query } => {
            let snapshot = connect().await?.sync().snapshot();
            let results = mozzi_app::recommend::search(&snapshot.locations, &query);
            if results.is_empty() {
                println!("No matches for '{query}'.");
            }
            for scored in results {
                println!("{}", card::summary_line(scored));
            }
        }
        Commands::Recommend { selected } => {
            let snapshot = connect().await?.sync().snapshot();
            let mut view = ViewState::new();
            if let Some(id) = selected {
                view.select(LocationId::new(id));
            }
            let recommendations = view.recommendations(&snapshot.locations);
            if recommendations.is_empty() {
                println!("No quieter places right now.");
            }
            for scored in recommendations {
                println!("{}", card::summary_line(scored));
            }
        }
        Commands::Report {
            id,
            level,
            dimension,
            comment,
            email,
            password,
        } => {
            let app = connect().await?;
            let mut view = ViewState::new();
            view.browse();

            if let (Some(email), Some(password)) = (email, password) {
                if app.sign_in(&mut view, &email, &password).await.is_err() {
                    eprintln!("{}", view.auth_message().unwrap_or_default());
                    std::process::exit(1);
                }
            } else if let Some(session) = app.auth().current_session().await? {
                view.on_session(Some(&session));
            }

            let id = LocationId::new(id);
            if app.sync().snapshot().find(&id).is_none() {
                eprintln!("Location not found: {id}");
                std::process::exit(1);
            }
            view.select(id);

            match app
                .report_selected(&mut view, dimension, Level::from_value(level)?, comment)
                .await
            {
                Ok(Some(outcome)) => println!("{}", card::outcome_message(&outcome)),
                Ok(None) => println!("No location to report on."),
                Err(rejection) => {
                    eprintln!("{rejection}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Add {
            name,
            lat,
            lng,
            address,
        } => {
            let app = connect().await?;
            let mut form = NewPlaceForm::new(
                name.clone().unwrap_or_default(),
                lat.unwrap_or_default(),
                lng.unwrap_or_default(),
            );

            if let Some(address) = address {
                if let Err(e) = app.places().fill_from_address(&address, &mut form).await {
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
                if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
                    form.name = name;
                }
            }

            let mut view = ViewState::new();
            match app.add_place(&mut view, &mut form).await {
                Ok(row) => println!(
                    "Added {} ({}, {}) as {}",
                    row.name, row.latitude, row.longitude, row.id
                ),
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Geocode { address } => {
            let config = Config::from_env()?;
            let geocoder = FallbackGeocoder::from_registry(|var| {
                if var == "KAKAO_REST_API_KEY" {
                    config.kakao_api_key.clone()
                } else {
                    std::env::var(var).ok()
                }
            })?;

            match geocoder.geocode(&address).await {
                Ok(Some(place)) => {
                    println!("{}", place.name);
                    println!("  {}", place.address);
                    println!(
                        "  {}, {} ({:?})",
                        place.latitude, place.longitude, place.provider
                    );
                }
                Ok(None) | Err(_) => {
                    eprintln!("{}", mozzi_geocoder::FAILURE_MESSAGE);
                    std::process::exit(1);
                }
            }
        }
        Commands::Map { out, selected } => {
            let snapshot = connect().await?.sync().snapshot();
            let mut view = ViewState::new();
            if let Some(id) = selected {
                view.select(LocationId::new(id));
            }
            let map_view = MapView::centered_on(view.selected(&snapshot.locations));
            let markers = markers(&snapshot.locations);
            let collection = GeoJsonRenderer.render(&map_view, &markers);

            std::fs::write(&out, serde_json::to_string_pretty(&collection)?)?;
            println!("Wrote {} marker(s) to {}", markers.len(), out.display());
        }
        Commands::Watch { count } => {
            let app = App::connect(Config::from_env()?)?;
            let handle = app.start().await?;
            let mut rx = app.sync().subscribe();
            let mut seen = 0usize;

            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    println!(
                        "-- version {} ({} locations)",
                        snapshot.version,
                        snapshot.locations.len()
                    );
                    for scored in snapshot.locations.iter() {
                        println!("{}", card::summary_line(scored));
                    }
                }
                seen += 1;
                if count.is_some_and(|n| seen >= n) {
                    break;
                }

                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            handle.stop().await;
        }
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(mozzi_server::interactive::run())
            })
            .await??;
        }
    }

    Ok(())
}
