//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a store from an optional JSON config path (in memory otherwise).
//! - Run the favorites scenario end to end and print the resulting sets.
//!
//! Usage: `contentdb_cli [config.json]`

use contentdb_core::{
    core_version, favorite_repository, favorites_contract, init_logging_from_config,
    FavoriteService, FavoriteSummary, Gateway, MainLoop, StoreConfig, StoreContext,
};
use log::{error, info};
use std::error::Error;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::time::Duration;

const UPSTREAM_BATCH: &str = r#"[
    {"id": 1, "imageUrl": "https://img.example/1.png", "title": "Pilot"},
    {"imageUrl": "https://img.example/3.png", "title": "Finale"}
]"#;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("contentdb_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::in_memory(),
    };
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("contentdb_cli: logging disabled: {err}");
    }
    println!("contentdb_core version={}", core_version());

    let gateway = Gateway::open(&config, vec![favorites_contract()])?;
    let ctx: StoreContext = Arc::new(gateway);
    let service = FavoriteService::new(Arc::clone(&ctx), favorite_repository());
    let main_loop = Arc::new(MainLoop::start()?);

    let (sender, receiver) = mpsc::sync_channel::<Vec<FavoriteSummary>>(16);
    let subscription = service.observe_recent(
        move |recent| {
            let _ = sender.send(recent);
        },
        main_loop.clone(),
    );

    let first = service.add_favorite("https://img.example/1.png", "Episode 1")?;
    let second = service.add_favorite("https://img.example/2.png", "Episode 2")?;
    for locator in [first, second].into_iter().flatten() {
        println!("inserted {locator}");
    }

    let changed = service.replace_from_json(UPSTREAM_BATCH)?;
    println!("sync changed={changed}");
    for favorite in service.fetch_favorites()? {
        println!("stored title={} image_url={}", favorite.title, favorite.image_url);
    }

    let mut latest = None;
    while let Ok(recent) = receiver.recv_timeout(Duration::from_millis(250)) {
        latest = Some(recent);
    }
    if let Some(recent) = latest {
        println!("recent count={}", recent.len());
    }

    service.stop_observation(&subscription);
    main_loop.shutdown();
    info!("event=cli_run module=cli status=ok");
    Ok(())
}
