//! `config`: show the effective configuration.

use crate::app_config::LoadedConfig;
use crate::settings::Settings;

pub fn run_config_show_command(loaded: &LoadedConfig, settings: &Settings) {
    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!("base_url = {}", settings.base_url);
    println!(
        "block_size = {}",
        settings
            .block_size
            .map_or_else(|| "whole range".to_string(), |size| size.to_string())
    );
    println!("trials = {}", settings.trials);
    println!("concurrency = {}", settings.concurrency);
    println!("preamble_pages = {}", settings.preamble_pages);
    println!("connect_timeout_secs = {}", settings.connect_timeout.as_secs());
    println!("read_timeout_secs = {}", settings.read_timeout.as_secs());
    println!("request_spacing_ms = {}", settings.request_spacing.as_millis());
    println!(
        "contact = {}",
        settings.contact.as_deref().unwrap_or("<none>")
    );
}
