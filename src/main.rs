use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use field_monitor::api::ApiClient;
use field_monitor::app::FieldMonitor;
use field_monitor::config::{self, Config, ProgressMode, API_URL_ENV};
use field_monitor::error::ConfigError;

/// Native dashboard for NDVI field monitoring
#[derive(Parser, Debug)]
#[command(name = "field-monitor", version, about)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Use timer-driven upload progress instead of byte counts
    #[arg(long)]
    simulated_progress: bool,
}

/// Apply one override layer, rolling it back if it leaves the config invalid
fn apply_layer(config: &mut Config, problems: &mut Vec<ConfigError>, layer: impl FnOnce(&mut Config)) {
    let previous = config.clone();
    layer(config);
    if let Err(e) = config.validate() {
        *config = previous;
        problems.push(e);
    }
}

/// CLI flags over environment over file over defaults
///
/// A layer that fails is skipped; the layers below it still apply.
fn resolve_config(args: &Args) -> (Config, Vec<ConfigError>) {
    let mut problems = Vec::new();
    let loaded = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load_default(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        problems.push(e);
        Config::default()
    });

    apply_layer(&mut config, &mut problems, Config::apply_env);
    if let Some(url) = &args.api_url {
        apply_layer(&mut config, &mut problems, |c| c.api_base_url = url.clone());
    }
    if args.simulated_progress {
        config.progress_mode = ProgressMode::Simulated;
    }
    (config, problems)
}

fn main() -> iced::Result {
    let args = Args::parse();

    let (config, config_problems) = resolve_config(&args);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Logged only now that the subscriber exists
    for e in &config_problems {
        tracing::error!("❌ {}; ignoring that setting", e);
    }
    if !config_problems.is_empty() {
        if let Some(path) = args.config.clone().or_else(config::default_config_path) {
            tracing::error!("   Config file: {}", path.display());
        }
    }

    let api = match ApiClient::new(&config.api_base_url, config.request_timeout()) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!("Cannot start: {}", e);
            std::process::exit(1);
        }
    };

    iced::application("Field Monitor", FieldMonitor::update, FieldMonitor::view)
        .subscription(FieldMonitor::subscription)
        .theme(FieldMonitor::theme)
        .centered()
        .run_with(move || FieldMonitor::new(config, api))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[test]
    fn test_cli_flags_override_file() {
        let file = write_config("api_base_url = \"http://file.example:8000\"\nprogress_mode = \"real\"\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            api_url: Some("http://cli.example:9000".to_string()),
            simulated_progress: true,
        };

        let (config, problems) = resolve_config(&args);
        assert!(problems.is_empty());
        assert_eq!(config.api_base_url, "http://cli.example:9000");
        assert_eq!(config.progress_mode, ProgressMode::Simulated);
    }

    #[test]
    fn test_invalid_cli_url_keeps_file_settings() {
        let file = write_config("api_base_url = \"http://file.example:8000\"\nthumbnail_size = 96\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            api_url: Some("ftp://nope".to_string()),
            simulated_progress: false,
        };

        let (config, problems) = resolve_config(&args);
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], ConfigError::Invalid { field: "api_base_url", .. }));
        assert_eq!(config.api_base_url, "http://file.example:8000");
        assert_eq!(config.thumbnail_size, 96);
    }

    #[test]
    fn test_unreadable_file_falls_back_to_defaults() {
        let file = write_config("chart_width = \"wide\"\n");
        let args = Args {
            config: Some(file.path().to_path_buf()),
            api_url: None,
            simulated_progress: true,
        };

        let (config, problems) = resolve_config(&args);
        assert_eq!(problems.len(), 1);
        assert_eq!(config.api_base_url, Config::default().api_base_url);
        assert_eq!(config.progress_mode, ProgressMode::Simulated);
    }
}
