/// Command dispatch: wires the configuration, the Linux volume controller
/// and the privilege channel into a `SortEngine`, runs one request, and
/// prints the result.
use crate::args::{Cli, Command, OutputFormat};
use crate::tree_view;
use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use drivesort_core::listing;
use drivesort_core::model::{FileNode, OperationRequest, Volume};
use drivesort_core::operation::{OperationEvent, OperationReport};
use drivesort_core::platform::{self, start_watcher, UdisksController, VolumeController, VolumeEvent};
use drivesort_core::privilege::{Elevation, PrivilegeChannel};
use drivesort_core::{Config, SortEngine};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Run the parsed command line to completion.
pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let controller: Arc<dyn VolumeController> = Arc::new(
        UdisksController::new(config.udisksctl_path.clone())
            .context("failed to start the volume arbitration thread")?,
    );
    let output = cli.output();

    match &cli.command {
        Command::Volumes => print_volumes(controller.as_ref(), output),
        Command::List { volume } => {
            let volume = select_volume(controller.as_ref(), volume)?;
            execute(&config, controller, OperationRequest::list(volume), output)
        }
        Command::Sort(args) => {
            let volume = select_volume(controller.as_ref(), &args.volume)?;
            let mut request = OperationRequest::sort(volume, args.options(config.default_order));
            if let Some(dir) = &args.dir {
                request = request.with_scope(dir);
            }
            execute(&config, controller, request, output)
        }
        Command::Watch => watch(controller, &config, output),
    }
}

/// Configuration file plus command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if let Some(tool) = &cli.tool {
        config.tool_path = tool.clone();
    }
    if let Some(elevation) = cli.elevation {
        config.elevation = elevation.into();
    }
    debug!("Effective config: {:?}", config);
    Ok(config)
}

fn select_volume(controller: &dyn VolumeController, query: &str) -> Result<Volume> {
    platform::find_volume(controller, query)
        .with_context(|| format!("cannot use volume {query:?}; run `drivesort volumes` to see eligible ones"))
}

fn execute(
    config: &Config,
    controller: Arc<dyn VolumeController>,
    request: OperationRequest,
    output: OutputFormat,
) -> Result<()> {
    let tool = config
        .resolve_tool()
        .context("cannot locate the sorting tool; set `tool_path` or pass --tool")?;
    let channel = Arc::new(PrivilegeChannel::new(Elevation::resolve(config.elevation)));
    info!(
        "Using {} with {} elevation",
        tool.display(),
        channel.elevation().label()
    );

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let engine = SortEngine::with_observer(controller, channel, tool, events_tx)
        .context("failed to start the operation engine")?;
    thread::Builder::new()
        .name("drivesort-progress".into())
        .spawn(move || log_progress(events_rx))
        .context("failed to start the progress logger")?;

    let report = engine.run(request)?;
    finish(report, output)
}

fn log_progress(events: Receiver<OperationEvent>) {
    for event in events {
        match event {
            OperationEvent::PhaseChanged(phase) => info!("{}", capitalize(phase.label())),
            OperationEvent::Finished { succeeded } => debug!("Operation finished (succeeded: {succeeded})"),
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

fn finish(report: OperationReport, output: OutputFormat) -> Result<()> {
    for warning in &report.warnings {
        warn!("{warning}");
    }
    let millis = report.duration().num_milliseconds();
    let sorted = report.sorted();
    let device = report.request.volume.device.display().to_string();

    match report.outcome {
        Ok(tree) => {
            if sorted {
                info!("Sorted {device} in {millis} ms");
            }
            print_tree(&tree, output)
        }
        Err(err) => {
            let denied = err.is_authorization_denied();
            let err = anyhow::Error::new(err);
            Err(if denied {
                err.context("elevated rights were not granted")
            } else if sorted {
                err.context(format!("{device} was sorted, but listing it afterwards failed"))
            } else {
                err.context(format!("operation on {device} failed"))
            })
        }
    }
}

fn print_tree(tree: &FileNode, output: OutputFormat) -> Result<()> {
    let text = match output {
        OutputFormat::Tree => {
            info!("{}", tree_view::summary(tree));
            tree_view::format_tree(tree)
        }
        OutputFormat::Raw => listing::render(tree),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(tree).context("failed to encode tree")?;
            json.push('\n');
            json
        }
    };
    io::stdout()
        .lock()
        .write_all(text.as_bytes())
        .context("failed to write to stdout")
}

fn print_volumes(controller: &dyn VolumeController, output: OutputFormat) -> Result<()> {
    let volumes = controller
        .list_eligible_volumes()
        .context("failed to enumerate volumes")?;
    let mut out = io::stdout().lock();

    if output == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut out, &volumes).context("failed to encode volumes")?;
        writeln!(out)?;
        return Ok(());
    }
    if volumes.is_empty() {
        info!("No eligible removable volumes are mounted");
    }
    for volume in &volumes {
        writeln!(out, "{}", volume_line(volume))?;
    }
    Ok(())
}

fn volume_line(volume: &Volume) -> String {
    format!(
        "{:<20} {:<12} {}",
        volume.name,
        volume.device.display(),
        volume.mount_path.display()
    )
}

fn watch(controller: Arc<dyn VolumeController>, config: &Config, output: OutputFormat) -> Result<()> {
    let handle = start_watcher(controller, config.watch_interval())
        .context("failed to start the volume watcher")?;
    info!("Watching for removable volumes, press Ctrl-C to stop");

    let mut out = io::stdout().lock();
    for event in handle.receiver.iter() {
        let line = match (&event, output) {
            (VolumeEvent::Added(v), OutputFormat::Json) => {
                serde_json::json!({ "event": "added", "volume": v }).to_string()
            }
            (VolumeEvent::Removed(v), OutputFormat::Json) => {
                serde_json::json!({ "event": "removed", "volume": v }).to_string()
            }
            (VolumeEvent::Added(v), _) => format!("+ {}", volume_line(v)),
            (VolumeEvent::Removed(v), _) => format!("- {}", volume_line(v)),
        };
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    handle.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use drivesort_core::privilege::ElevationPreference;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "tool_path = \"/opt/fatsort\"\nelevation = \"pkexec\"\n").unwrap();
        let path_arg = path.to_str().unwrap();

        let cli = Cli::parse_from(["drivesort", "volumes", "--config", path_arg]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.tool_path, PathBuf::from("/opt/fatsort"));
        assert_eq!(config.elevation, ElevationPreference::Pkexec);

        let cli = Cli::parse_from([
            "drivesort",
            "volumes",
            "--config",
            path_arg,
            "--tool",
            "/usr/sbin/fatsort",
            "--elevation",
            "direct",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.tool_path, PathBuf::from("/usr/sbin/fatsort"));
        assert_eq!(config.elevation, ElevationPreference::Direct);
    }

    #[test]
    fn test_broken_config_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "watch_interval_ms = \"soon\"\n").unwrap();
        let path_arg = path.to_str().unwrap();

        let cli = Cli::parse_from(["drivesort", "watch", "--config", path_arg]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("failed to load configuration"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("unmounting"), "Unmounting");
        assert_eq!(capitalize(""), "");
    }
}
