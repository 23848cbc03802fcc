use clap::Parser;
use client::actor::WorldBounds;
use client::game::{ClientConfig, ClientGame};
use client::identity::{generate_id, IdentityStore};
use client::input::InputManager;
use client::network::NetworkStore;
use client::rendering::Renderer;
use log::{info, warn};
use macroquad::window::{next_frame, Conf};
use shared::{timestamp_ms, ACTOR_RADIUS};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Arena client", long_about = None)]
struct Args {
    /// Shared store address
    #[arg(short = 's', long, default_value = "127.0.0.1:9000")]
    server: String,

    /// Display name shown above your actor
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Where the persistent identity is kept
    #[arg(short = 'i', long)]
    identity_file: Option<PathBuf>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: u32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: format!("Arena - {}", args.name),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let identity_path = args
        .identity_file
        .clone()
        .unwrap_or_else(IdentityStore::default_path);
    let actor_id = match IdentityStore::new(identity_path).load_or_create() {
        Ok(id) => id,
        Err(e) => {
            let id = generate_id();
            warn!("Could not persist identity ({}), using {} for this run", e, id);
            id
        }
    };

    info!("Starting client as {} ({})", args.name, actor_id);
    info!("Connecting to: {}", args.server);
    info!("Controls: WASD to move, mouse to aim, click to slash, E to charge, Enter to chat");

    let mut store = match NetworkStore::connect(&args.server, actor_id.clone()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to start network: {}", e);
            return;
        }
    };

    let config = ClientConfig {
        username: args.name.clone(),
        world: WorldBounds::new(args.width as f32, args.height as f32),
        ..ClientConfig::default()
    };
    let mut game = ClientGame::new(actor_id, config);
    let mut input = InputManager::new();
    let renderer = Renderer::new(ACTOR_RADIUS);

    loop {
        let state = input.update();
        if state.quit {
            break;
        }

        let now_ms = timestamp_ms();
        game.tick(&mut store, &state, now_ms);
        renderer.render(&game, input.chat_draft(), now_ms);

        next_frame().await;
    }

    game.leave(&mut store);
    store.shutdown();
    info!("Client exited");
}
