//! File reload example with all three watch kinds.
//!
//! # Running
//!
//! ```bash
//! cargo run --example reload_files --features watch
//!
//! # In another terminal, edit the printed file, e.g.
//! echo '{"server": {"port": 9090}, "pools": {"a": 1, "b": 2}}' > /tmp/confwatch_example.json
//! ```

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use confwatch::{ConfigStore, ReloadBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::temp_dir().join("confwatch_example.json");
    fs::write(
        &config_path,
        r#"{"server": {"host": "localhost", "port": 8080}, "pools": {"a": 1}}"#,
    )?;

    println!("Config file: {}", config_path.display());
    println!("Modify this file to see the watches fire!\n");

    let store = Arc::new(ConfigStore::new());
    let handle = ReloadBuilder::new(Arc::clone(&store))
        .file(&config_path)
        .debounce(Duration::from_millis(100))
        .on_error(|err| {
            eprintln!("\n[ERROR] {err}");
            eprintln!("  Previous configuration is still active");
        })
        .build()?;

    let port_store = Arc::clone(&store);
    store.on_key_change("server.port", move || {
        println!("[KEY] server.port is now {:?}", port_store.get("server.port"));
    })?;

    store.on_map_key_change("pools", |event| {
        println!("[MAP] pools: {} {}", event.op, event.sub_key);
    })?;

    store.on_match_key_change(r"^server\.", |event| {
        println!("[MATCH] {} {}", event.op, event.full_path);
    })?;

    println!("Initial port: {:?}", store.get("server.port"));
    println!("Watching for changes (press Ctrl+C to exit)...\n");

    let mut last_epoch = handle.epoch();
    while handle.is_running() {
        thread::sleep(Duration::from_secs(2));
        if store.has_changed_since(last_epoch) {
            last_epoch = store.epoch();
            println!("[POLL] snapshot epoch {last_epoch}");
        }
    }

    let _ = fs::remove_file(&config_path);
    Ok(())
}
