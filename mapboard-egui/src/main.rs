#[cfg(not(target_arch = "wasm32"))]
fn main() {
    // galileo-egui initializes env_logger from RUST_LOG when the app starts
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    let config_path = std::env::var_os("MAPBOARD_CONFIG").or_else(|| std::env::args_os().nth(1));
    let config = match config_path {
        Some(path) => match mapboard::MapboardConfig::from_path(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Failed to load configuration {}: {err}", path.to_string_lossy());
                std::process::exit(1);
            }
        },
        None => mapboard::MapboardConfig::default(),
    };

    if let Err(err) = mapboard_egui::run(config) {
        eprintln!("Failed to start the application: {err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
