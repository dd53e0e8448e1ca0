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

//! Interactive line-oriented session.
//!
//! Reads commands from stdin and drives a headless viewer. Fetch results,
//! periodic view persistence, and Ctrl-C are all handled in one
//! `tokio::select!` loop.

use std::sync::Arc;
use std::time::Instant;

use log::info;
use skyview_core::coords::{format_position, format_separation};
use skyview_core::{
    CatalogKind, Command, ConeColumns, KeyValueStore, MemoryRenderer, NullBus, Renderer,
    SelectionMode, StyleChange, Viewer, ZoomAction,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::{parse_color, AppConfig};
use crate::export::summary_line;
use crate::fetch::DataClient;
use crate::requests::{load_stack_data, Fetcher};
use crate::store::FileStore;

const HELP: &str = "\
commands:
  show|hide|toggle|refresh <csc20|csc11|xmm|chs>
  stacks | mw                     toggle stack outlines / Milky Way
  mode <stack|source|region|point|none>
  click <ra> <dec>
  color <catalog> <color> | size <catalog> <arcsec>
  goto <ra> <dec> [fov] | zoom <in|out|fov> | reset
  nearby-stacks <on|off> | nearby-sources <on|off>
  finish | clear-polygon | clear-stack | clear-source | nearest
  zoom-stack <id> | zoom-source <name>
  find <target> | image <name>
  send-sources [summary] | send-props <name> | send-events <stackid>
  status | sources | bookmark | help | quit";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    Status,
    Sources,
    Bookmark,
    Help,
    Quit,
}

fn catalog(arg: Option<&str>) -> Result<CatalogKind, String> {
    arg.ok_or_else(|| "missing catalog name".to_owned())?
        .parse()
        .map_err(|e| format!("{e}"))
}

fn number(arg: Option<&str>, what: &str) -> Result<f64, String> {
    let text = arg.ok_or_else(|| format!("missing {what}"))?;
    text.parse()
        .map_err(|e| format!("invalid {what} {text}: {e}"))
}

fn switch(arg: Option<&str>) -> Result<bool, String> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => Err("expected on or off".to_owned()),
    }
}

fn rest(line: &str, word: &str) -> Result<String, String> {
    let text = line.trim_start()[word.len()..].trim();
    if text.is_empty() {
        Err(format!("{word} needs an argument"))
    } else {
        Ok(text.to_owned())
    }
}

/// Parse one input line. A blank line is an error with an empty message.
pub fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Err(String::new());
    };
    let arg = words.next();

    let command = match word {
        "quit" | "exit" => return Ok(Input::Quit),
        "help" => return Ok(Input::Help),
        "status" => return Ok(Input::Status),
        "sources" => return Ok(Input::Sources),
        "bookmark" => return Ok(Input::Bookmark),
        "show" => Command::ShowCatalog(catalog(arg)?),
        "hide" => Command::HideCatalog(catalog(arg)?),
        "toggle" => Command::ToggleCatalog(catalog(arg)?),
        "refresh" => Command::RefreshCatalog(catalog(arg)?),
        "stacks" => Command::ToggleStacks,
        "mw" => Command::ToggleMilkyWay,
        "mode" => Command::SetMode(arg.unwrap_or_default().parse::<SelectionMode>()?),
        "click" => Command::Click {
            ra: number(arg, "ra")?,
            dec: number(words.next(), "dec")?,
        },
        "color" => {
            let kind = catalog(arg)?;
            let name = words.next().ok_or("missing color")?;
            let color = skyview_core::Color::parse(name)
                .ok_or_else(|| format!("unknown color: {name}"))?;
            Command::SetStyle {
                kind,
                change: StyleChange::Color(color),
            }
        }
        "size" => Command::SetStyle {
            kind: catalog(arg)?,
            change: StyleChange::Size(number(words.next(), "size")?),
        },
        "goto" => Command::Goto {
            ra: number(arg, "ra")?,
            dec: number(words.next(), "dec")?,
            fov: match words.next() {
                Some(fov) => number(Some(fov), "fov")?,
                None => skyview_core::viewer::TARGET_FOV,
            },
        },
        "zoom" => Command::Zoom(match arg {
            Some("in") => ZoomAction::In,
            Some("out") => ZoomAction::Out,
            other => ZoomAction::To(number(other, "field of view")?),
        }),
        "reset" => Command::ResetLocation,
        "nearby-stacks" => Command::SetNearbyStacks(switch(arg)?),
        "nearby-sources" => Command::SetNearbySources(switch(arg)?),
        "finish" => Command::FinishPolygon,
        "clear-polygon" => Command::ClearPolygon,
        "clear-stack" => Command::ClearNearestStack,
        "clear-source" => Command::ClearNearestSource,
        "nearest" => Command::FindNearestStack,
        "zoom-stack" => Command::ZoomToStack(rest(line, word)?),
        "zoom-source" => Command::ZoomToSource(rest(line, word)?),
        "find" => Command::FindTarget(rest(line, word)?),
        "image" => Command::SetImage(rest(line, word)?),
        "send-sources" => Command::SendSources(match arg {
            Some("summary") => ConeColumns::Summary,
            _ => ConeColumns::Basic,
        }),
        "send-props" => Command::SendSourceProperties(rest(line, word)?),
        "send-events" => Command::SendStackEvents(rest(line, word)?),
        other => return Err(format!("unknown command: {other} (try help)")),
    };
    Ok(Input::Command(command))
}

/// Apply the per-catalog style overrides from the configuration.
pub fn apply_style_overrides<R: Renderer>(viewer: &mut Viewer<R>, config: &AppConfig) {
    for kind in CatalogKind::ALL {
        let Some(style) = config.style_override(kind) else {
            continue;
        };
        if let Some(color) = style.color.as_deref().and_then(parse_color) {
            viewer.dispatch(Command::SetStyle {
                kind,
                change: StyleChange::Color(color),
            });
        }
        if let Some(size) = style.size_arcsec {
            viewer.dispatch(Command::SetStyle {
                kind,
                change: StyleChange::Size(size),
            });
        }
    }
}

pub fn print_notices<R: Renderer>(viewer: &mut Viewer<R>) {
    let notices = viewer.take_notices();
    if notices.is_empty() {
        return;
    }
    let stamp = chrono::Local::now().format("%H:%M:%S");
    for notice in notices {
        println!("[{stamp}] {notice}");
    }
}

fn print_status<R: Renderer>(viewer: &Viewer<R>) {
    let view = viewer.renderer().view();
    println!(
        "view: {} fov {:.4}\u{b0}  mode: {}{}",
        format_position(view.ra, view.dec),
        view.fov,
        viewer.mode(),
        if viewer.is_busy() { "  (busy)" } else { "" }
    );
    if let Some(label) = viewer.target_label() {
        println!("target: {label}");
    }

    let shown: Vec<_> = CatalogKind::ALL
        .into_iter()
        .filter(|k| viewer.is_shown(*k))
        .map(|k| viewer.catalog(k).label().to_owned())
        .collect();
    println!(
        "shown: {}{}{}",
        if shown.is_empty() { "-".to_owned() } else { shown.join(", ") },
        if viewer.stacks_shown() { ", stacks" } else { "" },
        if viewer.milky_way_shown() { ", Milky Way" } else { "" }
    );

    if let Some(selected) = viewer.selected_stack() {
        println!(
            "stack: {} at {}",
            selected.id,
            format_separation(selected.separation)
        );
        if let Some(stack) = viewer.stacks().get(&selected.id) {
            println!("  status: {:?}  observations: {:?}", stack.status, stack.obsids());
        }
        for neighbor in &selected.nearby {
            println!("  nearby: {} at {}", neighbor.item, format_separation(neighbor.separation));
        }
    }

    if let Some(selected) = viewer.selected_source() {
        println!(
            "source: {} at {}",
            selected.properties.name.as_deref().unwrap_or("?"),
            format_separation(selected.separation)
        );
        for neighbor in &selected.nearby {
            println!("  nearby row {} at {}", neighbor.item, format_separation(neighbor.separation));
        }
    }

    if let Some(vertices) = viewer.finished_polygon() {
        println!("region: {} vertices", vertices.len());
    } else if viewer.polygon_vertices() > 0 {
        println!("region: {} vertices (unfinished)", viewer.polygon_vertices());
    }
}

fn print_sources<R: Renderer>(viewer: &Viewer<R>) {
    let view = viewer.renderer().view();
    let sources = viewer.shown_sources();
    if sources.is_empty() {
        println!("no sources shown");
        return;
    }
    for (_, source) in &sources {
        println!("{}", summary_line(source, (view.ra, view.dec)));
    }
    if let Some(plot) = viewer.plot_data() {
        if let Some(hardness) = &plot.hardness {
            println!("{} sources with hardness ratios", hardness.hm.len());
        }
    }
}

/// Build a headless viewer around `store`, load the stack data, and run
/// the ready routine.
pub async fn prepare_viewer<S>(
    config: &AppConfig,
    client: &DataClient,
    store: S,
) -> Result<Viewer<MemoryRenderer>, Box<dyn std::error::Error + Send + Sync>>
where
    S: KeyValueStore + Send + 'static,
{
    let settings = config.viewer_settings();
    let renderer = MemoryRenderer::new(settings.start);
    let mut viewer = Viewer::new(renderer, store, NullBus, settings);
    load_stack_data(&mut viewer, client, config).await?;
    apply_style_overrides(&mut viewer, config);
    Ok(viewer)
}

pub async fn run(
    config: Arc<AppConfig>,
    client: DataClient,
    bookmark: Option<skyview_core::Bookmark>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store_path = FileStore::default_path().ok_or("Could not determine config directory")?;
    let store = FileStore::open(&store_path);
    let mut viewer = prepare_viewer(&config, &client, store).await?;
    if let Some(bookmark) = bookmark {
        viewer.set_bookmark(bookmark);
    }

    // The headless renderer has nothing to wait for.
    viewer.start(Instant::now());
    viewer.renderer_ready();
    print_notices(&mut viewer);

    let (mut fetcher, mut rx) = Fetcher::new(client, Arc::clone(&config));

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut persist_interval = tokio::time::interval(config.persist_interval());
    persist_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    println!("Type help for a list of commands.");

    loop {
        tokio::select! {
            line_result = lines.next_line() => {
                match line_result {
                    Ok(Some(line)) => match parse_input(&line) {
                        Ok(Input::Quit) => break,
                        Ok(Input::Help) => println!("{HELP}"),
                        Ok(Input::Status) => print_status(&viewer),
                        Ok(Input::Sources) => print_sources(&viewer),
                        Ok(Input::Bookmark) => println!("?{}", viewer.bookmark().to_query()),
                        Ok(Input::Command(command)) => viewer.dispatch(command),
                        Err(msg) if msg.is_empty() => {}
                        Err(msg) => println!("{msg}"),
                    },
                    Ok(None) => {
                        info!("End of input");
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Some(completion) = rx.recv() => {
                fetcher.deliver(&mut viewer, completion);
            }

            _ = persist_interval.tick() => {
                viewer.tick(Instant::now());
            }

            () = cancel_token.cancelled() => {
                info!("Session cancelled");
                break;
            }
        }

        fetcher.submit(&mut viewer);
        print_notices(&mut viewer);
    }

    viewer.persist_view();
    Ok(())
}
