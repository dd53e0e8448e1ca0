// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
mod export;
mod fetch;
mod requests;
mod session;
mod store;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use skyview_core::coords::{degrees_to_dms, degrees_to_hms, format_separation};
use skyview_core::lookup as links;
use skyview_core::stacks::decode_stack_name;
use skyview_core::{
    classify_target, format_position, parse_dec, parse_position, parse_ra, Bookmark, CatalogKind,
    Command, MemoryRenderer, MemoryStore, Renderer, SelectionMode, Target, Viewer,
};

use config::AppConfig;
use fetch::DataClient;
use requests::Fetcher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "cscview", version, about = "Explore the Chandra Source Catalog")]
struct Cli {
    /// Base URL or local directory holding the data files
    #[arg(long, global = true)]
    data_url: Option<String>,

    /// Number of source-property chunks
    #[arg(long, global = true)]
    chunks: Option<usize>,

    /// Do not use the on-disk download cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a right ascension to decimal degrees
    ParseRa { text: String },

    /// Convert a declination to decimal degrees
    ParseDec { text: String },

    /// Decode the center of a stack identifier
    DecodeStack { id: String },

    /// Find the stack nearest a position
    NearestStack {
        #[arg(long, value_parser = ra_arg)]
        ra: f64,

        #[arg(long, value_parser = dec_arg, allow_hyphen_values = true)]
        dec: f64,

        /// Search radius in degrees
        #[arg(long, default_value = "5.0")]
        fov: f64,
    },

    /// List the catalog sources in a field of view
    Sources {
        #[arg(long, value_parser = ra_arg)]
        ra: f64,

        #[arg(long, value_parser = dec_arg, allow_hyphen_values = true)]
        dec: f64,

        #[arg(long, default_value = "0.5")]
        fov: f64,

        /// Write the sources to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Locate a position, 2CXO source name, stack id, or named object
    Find {
        #[arg(num_args = 1.., required = true, allow_hyphen_values = true)]
        target: Vec<String>,
    },

    /// Validate a bookmark query string
    Bookmark { query: String },

    /// Open a target in NED or SIMBAD
    Open {
        #[arg(value_enum)]
        service: Service,

        #[arg(num_args = 1.., required = true, allow_hyphen_values = true)]
        target: Vec<String>,
    },

    /// Start an interactive session
    Session {
        /// Bookmark query applied on start, e.g. "ra=84.6&dec=-69.1&zoom=2"
        #[arg(long)]
        bookmark: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Service {
    Ned,
    Simbad,
}

fn ra_arg(text: &str) -> Result<f64, String> {
    parse_ra(text).ok_or_else(|| format!("invalid right ascension: {text}"))
}

fn dec_arg(text: &str) -> Result<f64, String> {
    parse_dec(text).ok_or_else(|| format!("invalid declination: {text}"))
}

fn load_config(cli: &Cli) -> AppConfig {
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });

    if let Some(url) = &cli.data_url {
        config.data_url.clone_from(url);
    }
    if let Some(chunks) = cli.chunks {
        config.chunk_count = chunks;
    }
    if cli.no_cache {
        config.cache_downloads = false;
    }
    config
}

/// A viewer with the stack data loaded and nothing persisted.
async fn headless_viewer(
    config: &AppConfig,
    client: &DataClient,
) -> Result<Viewer<MemoryRenderer>, BoxError> {
    let mut viewer = session::prepare_viewer(config, client, MemoryStore::new()).await?;
    viewer.start(Instant::now());
    viewer.renderer_ready();
    viewer.take_notices();
    Ok(viewer)
}

/// Run a command and service every fetch it causes.
async fn dispatch_and_settle(
    viewer: &mut Viewer<MemoryRenderer>,
    fetcher: &mut Fetcher,
    rx: &mut tokio::sync::mpsc::Receiver<requests::Completion>,
    command: Command,
) {
    viewer.dispatch(command);
    fetcher.settle(viewer, rx).await;
    session::print_notices(viewer);
}

fn print_angle(degrees: f64, sexagesimal: &str) {
    println!("{degrees:.6}");
    println!("{sexagesimal}");
}

async fn nearest_stack(
    config: &AppConfig,
    client: &DataClient,
    ra: f64,
    dec: f64,
    fov: f64,
) -> Result<(), BoxError> {
    let mut viewer = headless_viewer(config, client).await?;
    viewer.dispatch(Command::Goto { ra, dec, fov });
    viewer.dispatch(Command::SetMode(SelectionMode::Stack));
    viewer.dispatch(Command::Click { ra, dec });
    session::print_notices(&mut viewer);

    let Some(selected) = viewer.selected_stack() else {
        println!("No stack within {fov} degrees of {}", format_position(ra, dec));
        return Ok(());
    };

    println!("{}  {}", selected.id, format_separation(selected.separation));
    if let Some(stack) = viewer.stacks().get(&selected.id) {
        println!("status: {:?}", stack.status);
        for obsid in stack.obsids() {
            println!("obsid {obsid}: {}", links::chaser_obsid_url(obsid));
        }
    }
    for neighbor in &selected.nearby {
        println!("nearby: {}  {}", neighbor.item, format_separation(neighbor.separation));
    }
    Ok(())
}

async fn list_sources(
    config: Arc<AppConfig>,
    client: DataClient,
    ra: f64,
    dec: f64,
    fov: f64,
    csv: Option<PathBuf>,
) -> Result<(), BoxError> {
    let mut viewer = headless_viewer(&config, &client).await?;
    let (mut fetcher, mut rx) = Fetcher::new(client, config);

    viewer.dispatch(Command::Goto { ra, dec, fov });
    dispatch_and_settle(
        &mut viewer,
        &mut fetcher,
        &mut rx,
        Command::ShowCatalog(CatalogKind::Csc20),
    )
    .await;

    let sources: Vec<_> = viewer.shown_sources().into_iter().map(|(_, s)| s).collect();
    match csv {
        Some(path) => {
            export::write_csv(BufWriter::new(File::create(&path)?), &sources)?;
            info!("Wrote {} sources to {}", sources.len(), path.display());
        }
        None => {
            for source in &sources {
                println!("{}", export::summary_line(source, (ra, dec)));
            }
        }
    }
    Ok(())
}

async fn find(config: Arc<AppConfig>, client: DataClient, text: &str) -> Result<(), BoxError> {
    let mut viewer = headless_viewer(&config, &client).await?;
    let (mut fetcher, mut rx) = Fetcher::new(client, config);

    if matches!(classify_target(text), Some(Target::SourceName(_))) {
        dispatch_and_settle(
            &mut viewer,
            &mut fetcher,
            &mut rx,
            Command::ShowCatalog(CatalogKind::Csc20),
        )
        .await;
    }
    dispatch_and_settle(
        &mut viewer,
        &mut fetcher,
        &mut rx,
        Command::FindTarget(text.to_owned()),
    )
    .await;

    let view = viewer.renderer().view();
    if let Some(label) = viewer.target_label() {
        println!("{label}");
    }
    println!("{}  fov {}", format_position(view.ra, view.dec), view.fov);
    println!("?{}", viewer.bookmark().to_query());
    Ok(())
}

fn open_link(service: Service, text: &str) -> Result<(), BoxError> {
    let url = match (service, parse_position(text)) {
        (Service::Ned, Some((ra, dec))) => links::ned_coord_url(ra, dec),
        (Service::Ned, None) => links::ned_name_url(text),
        (Service::Simbad, Some((ra, dec))) => links::simbad_coord_url(ra, dec),
        (Service::Simbad, None) => links::simbad_name_url(text),
    };
    println!("{url}");
    webbrowser::open(&url)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli));

    match cli.command {
        Commands::ParseRa { text } => {
            let ra = ra_arg(&text)?;
            print_angle(ra, &degrees_to_hms(ra).to_string());
        }
        Commands::ParseDec { text } => {
            let dec = dec_arg(&text)?;
            print_angle(dec, &degrees_to_dms(dec).to_string());
        }
        Commands::DecodeStack { id } => {
            let (ra, dec) = decode_stack_name(&id)?;
            println!("{ra:.6} {dec:.6}");
            println!("{}", format_position(ra, dec));
        }
        Commands::NearestStack { ra, dec, fov } => {
            let client = DataClient::new(&config)?;
            nearest_stack(&config, &client, ra, dec, fov).await?;
        }
        Commands::Sources { ra, dec, fov, csv } => {
            let client = DataClient::new(&config)?;
            list_sources(config, client, ra, dec, fov, csv).await?;
        }
        Commands::Find { target } => {
            let client = DataClient::new(&config)?;
            find(config, client, &target.join(" ")).await?;
        }
        Commands::Bookmark { query } => {
            let bookmark = Bookmark::parse(&query);
            let view = bookmark.apply_to(config.start_view());
            println!("?{}", bookmark.to_query());
            println!("{}  fov {}", format_position(view.ra, view.dec), view.fov);
            if let Some(display) = &bookmark.display {
                println!("display: {display}");
            }
            if let Some(stack_id) = &bookmark.stack_id {
                println!("stack: {stack_id}");
            }
        }
        Commands::Open { service, target } => open_link(service, &target.join(" "))?,
        Commands::Session { bookmark } => {
            let client = DataClient::new(&config)?;
            session::run(config, client, bookmark.as_deref().map(Bookmark::parse)).await?;
        }
    }

    Ok(())
}
