//! `wattlog config`: print or save the effective configuration.

use super::ConfigArgs;

pub fn run(args: &ConfigArgs, output: Option<&str>) {
    let config = super::resolve_or_exit(args);
    match output {
        Some(path) => super::write_json(&config, path, "Configuration"),
        None => match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing configuration: {e}");
                std::process::exit(1);
            }
        },
    }
}
