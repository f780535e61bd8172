//! pawmap - find stray and lost dog sightings near you.
//!
//! A thin command-line front end over `pawmap-core`. Nearby queries are
//! served from the retrieval cache when possible and fall back through the
//! query strategy chain otherwise; notices raised along the way are printed
//! after the command output.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pawmap_core::auth::{Session, SessionData};
use pawmap_core::cache::{CacheMirror, RetrievalCache};
use pawmap_core::geo::{is_valid_radius, MAX_NEIGHBOR_RADIUS_METERS};
use pawmap_core::models::NewMarker;
use pawmap_core::utils::{format_distance, format_expiry, truncate_string};
use pawmap_core::{
    ApiClient, Config, GridIndexer, Marker, MarkerApi, MarkerService, NearbyQuery, Notice,
};

// ============================================================================
// Constants
// ============================================================================

const USAGE: &str = "\
Usage: pawmap <command> [args]

Commands:
  nearby <lon> <lat> [radius_m] [--json]   Markers around a point
  cells <lon> <lat> [radius_m]             Grid cells covering a point's neighborhood
  show <id>                                One marker
  mine                                     Markers posted by the signed-in user
  create <file.json>                       Post a marker from a JSON file
  resolve <id>                             Mark one of your markers as resolved
  delete <id>                              Delete one of your markers
  report <id> <reason...>                  Flag a marker for moderation
  login <user_id> <token>                  Store credentials for write calls
  logout                                   Forget stored credentials";

/// Log file name prefix inside `<cache_dir>/logs`
const LOG_FILE_PREFIX: &str = "pawmap.log";

/// Title column width in marker listings
const TITLE_WIDTH: usize = 36;

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "help" | "-h" | "--help") {
        println!("{}", USAGE);
        return Ok(());
    }
    let rest = &args[1..];

    let config = Config::load()
        .unwrap_or_else(|e| {
            eprintln!("Warning: using default config ({:#})", e);
            Config::default()
        })
        .with_env_overrides();
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let _log_guard = init_tracing(&cache_dir.join("logs"));
    info!(command, api = %config.api_base_url, "pawmap starting");

    let mut session = Session::new(cache_dir.clone());
    if let Err(e) = session.load() {
        warn!(error = %e, "Ignoring unreadable session");
    }

    // Commands that never touch the network
    match command {
        "login" => return login(&mut session, rest),
        "logout" => {
            session.clear()?;
            println!("Signed out");
            return Ok(());
        }
        "cells" => return cells(&config, rest),
        _ => {}
    }

    let mut client = ApiClient::new(&config)?;
    if let Some(token) = session.token() {
        client.set_token(token.to_string());
    }
    let api: Arc<dyn MarkerApi> = Arc::new(client);
    let cache = RetrievalCache::restore(CacheMirror::new(&cache_dir)).await;
    let service = MarkerService::new(api, cache, session.user_id().map(str::to_string));
    let notices = service.subscribe();

    let result = match command {
        "nearby" => nearby(&service, &config, rest).await,
        "show" => show(&service, rest).await,
        "mine" => mine(&service).await,
        "create" => create(&service, rest).await,
        "resolve" => {
            let id = required(rest, 0, "marker id")?;
            let marker = service.resolve(id).await?;
            println!("Resolved {} ({})", marker.id, marker.title);
            Ok(())
        }
        "delete" => {
            let id = required(rest, 0, "marker id")?;
            service.delete(id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        "report" => {
            let id = required(rest, 0, "marker id")?;
            let reason = rest[1..].join(" ");
            let report = service.report(id, &reason).await?;
            println!("Reported {} (report {})", id, report.id);
            Ok(())
        }
        other => Err(anyhow!("Unknown command '{}'\n\n{}", other, USAGE)),
    };

    service.cache().flush().await;
    print_notices(notices);
    result
}

fn required<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing {}\n\n{}", what, USAGE))
}

fn parse_f64(args: &[String], index: usize, what: &str) -> Result<f64> {
    let raw = required(args, index, what)?;
    raw.parse()
        .with_context(|| format!("Invalid {}: '{}'", what, raw))
}

/// `<lon> <lat> [radius]` with the radius defaulting to the config value.
fn parse_query(config: &Config, args: &[String]) -> Result<NearbyQuery> {
    let longitude = parse_f64(args, 0, "longitude")?;
    let latitude = parse_f64(args, 1, "latitude")?;
    let radius = match args.get(2).filter(|a| !a.starts_with("--")) {
        Some(_) => parse_f64(args, 2, "radius")?,
        None => config.default_radius_m,
    };
    if radius <= 0.0 || !is_valid_radius(radius) {
        bail!(
            "Radius must be positive and at most {}",
            format_distance(MAX_NEIGHBOR_RADIUS_METERS)
        );
    }
    let query = NearbyQuery::new(longitude, latitude, radius);
    if !query.location().is_valid() {
        bail!("Coordinates out of range: {}, {}", longitude, latitude);
    }
    Ok(query)
}

async fn nearby(service: &MarkerService, config: &Config, args: &[String]) -> Result<()> {
    let query = parse_query(config, args)?;
    let as_json = args.iter().any(|a| a == "--json");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let markers = service.nearby_with_cancel(&query, &cancel).await;
    if cancel.is_cancelled() {
        eprintln!("Cancelled");
        return Ok(());
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&markers)?);
        return Ok(());
    }
    if markers.is_empty() {
        println!("No markers within {}", format_distance(query.radius));
        return Ok(());
    }
    for marker in &markers {
        print_marker_row(service, marker);
    }
    println!("{} markers within {}", markers.len(), format_distance(query.radius));
    Ok(())
}

fn cells(config: &Config, args: &[String]) -> Result<()> {
    let query = parse_query(config, args)?;
    let grid = GridIndexer::default();
    let home = grid.cell_id(query.longitude, query.latitude);
    let bounds = grid.cell_bounds(home);
    println!(
        "Cell {}: N {:.6} S {:.6} E {:.6} W {:.6}",
        home, bounds.north, bounds.south, bounds.east, bounds.west
    );

    let neighbors = grid.neighbor_cell_ids(query.longitude, query.latitude, query.radius);
    println!(
        "{} cells within {}:",
        neighbors.len(),
        format_distance(query.radius)
    );
    for cell in neighbors {
        let center = grid.cell_bounds(cell).center;
        println!(
            "  {:<16} {:>10}",
            cell.to_string(),
            format_distance(center.distance_to(&query.location()))
        );
    }
    Ok(())
}

async fn show(service: &MarkerService, args: &[String]) -> Result<()> {
    let id = required(args, 0, "marker id")?;
    let marker = service.marker(id).await?;

    println!("{} [{}]", marker.title, marker.marker_type);
    println!("  id:       {}", marker.id);
    println!("  status:   {}", marker.status);
    println!("  area:     {}", marker.area_id);
    if let Some(point) = marker.coordinates() {
        println!("  location: {:.6}, {:.6}", point.latitude, point.longitude);
    }
    if let Some(address) = &marker.location_detail.address {
        println!("  address:  {}", address);
    }
    println!("  posted:   {}", marker.created_at.format("%Y-%m-%d %H:%M"));
    println!("  {}", format_expiry(marker.expires_at, Utc::now()));
    if !marker.contact_info.is_empty() {
        println!("  contact:  {}", marker.contact_display());
    }
    if marker.report_count > 0 {
        println!("  reports:  {}", marker.report_count);
    }
    if !marker.description.is_empty() {
        println!("\n{}", marker.description);
    }
    if service.can_edit(&marker) {
        println!("\n(you posted this marker)");
    }
    Ok(())
}

async fn mine(service: &MarkerService) -> Result<()> {
    let markers = service
        .my_markers()
        .await
        .context("Sign in with `pawmap login` first")?;
    if markers.is_empty() {
        println!("You have not posted any markers");
    }
    for marker in &markers {
        print_marker_row(service, marker);
    }
    Ok(())
}

async fn create(service: &MarkerService, args: &[String]) -> Result<()> {
    let path = required(args, 0, "marker file")?;
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let marker: NewMarker =
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;

    let created = service.create(&marker).await?;
    println!("Created {} in area {}", created.id, created.area_id);
    Ok(())
}

fn login(session: &mut Session, args: &[String]) -> Result<()> {
    let user_id = required(args, 0, "user id")?;
    let token = required(args, 1, "token")?;
    session.update(SessionData::new(user_id.to_string(), token.to_string()));
    session.save()?;
    println!("Signed in as {}", user_id);
    Ok(())
}

fn print_marker_row(service: &MarkerService, marker: &Marker) {
    let distance = marker
        .distance
        .map(format_distance)
        .unwrap_or_else(|| "-".to_string());
    let owner = if service.can_edit(marker) { "*" } else { " " };
    println!(
        "{}{:<26} {:<10} {:<width$} {:>9}  {}",
        owner,
        marker.id,
        marker.marker_type.to_string(),
        truncate_string(&marker.title, TITLE_WIDTH),
        distance,
        format_expiry(marker.expires_at, Utc::now()),
        width = TITLE_WIDTH
    );
}

fn print_notices(mut notices: broadcast::Receiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        if notice != Notice::MarkersUpdated {
            eprintln!("{}", notice);
        }
    }
}
