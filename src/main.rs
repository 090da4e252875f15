use std::path::PathBuf;
use std::thread;

use log::{error, info};
use tokio::sync::broadcast;

use resin::audio_player::AudioPlayer;
use resin::config::{self, Config};
use resin::download_manager::DownloadManager;
use resin::playlist::Playlist;
use resin::playlist_manager::PlaylistManager;
use resin::protocol::{ConfigMessage, Message};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("resin");
    std::fs::create_dir_all(&config_dir)?;
    let config_file = config_dir.join("config.txt");

    if !config_file.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            config_file.display()
        );
        config::save(&config_file, &Config::default())?;
    }

    let config = match config::load(&config_file) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            Config::default()
        }
    };

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel(1024);

    // Setup audio player; its run loop is also the application tick that
    // drives end-of-media detection and progress updates.
    let player_bus_sender = bus_sender.clone();
    let player_bus_receiver = bus_sender.subscribe();
    thread::Builder::new()
        .name("audio-player".to_string())
        .spawn(move || {
            let mut audio_player = AudioPlayer::new(player_bus_receiver, player_bus_sender);
            audio_player.run();
        })?;

    // Setup download manager
    let download_bus_sender = bus_sender.clone();
    let download_bus_receiver = bus_sender.subscribe();
    let download_config_path = config_file.clone();
    thread::Builder::new()
        .name("download-manager".to_string())
        .spawn(move || {
            let mut download_manager = DownloadManager::new(
                download_bus_receiver,
                download_bus_sender,
                download_config_path,
            );
            download_manager.run();
        })?;

    let _ = bus_sender.send(Message::Config(ConfigMessage::ConfigChanged(config.clone())));

    // The playlist manager runs on the main thread: it is the single
    // mutation thread for all playlist and session state. The windowed
    // display layer attaches to the same bus.
    let playlist_bus_receiver = bus_sender.subscribe();
    let mut playlist_manager = PlaylistManager::new(
        Playlist::new(),
        playlist_bus_receiver,
        bus_sender,
        config,
        config_file,
    );
    playlist_manager.run();

    info!("Application exiting");
    Ok(())
}
