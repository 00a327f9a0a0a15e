use clap::Parser;
use anyhow::{Context, Result};

use pairwatch::{
    cli::{Cli, OutputFormat},
    MonitorEvent, Session, Snapshot, SnapshotSink,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let config = cli.resolve_config().context("Invalid configuration")?;
    let watch_path = cli.get_watch_path();
    tracing::info!("Starting pairwatch on: {}", watch_path.display());

    let session = Session::open(&watch_path, &config).context("Failed to start session")?;
    let mut renderer = Renderer::new(cli.output, cli.no_color);

    if cli.once {
        session.initial_scan().context("Initial scan failed")?;
        renderer.on_record_set_changed(&session.snapshot()?);
        return Ok(());
    }

    // Subscribe before scanning so changes made during the walk queue up.
    let monitor = session.subscribe().context("Failed to create file watcher")?;
    let stop = monitor.stop_handle();
    ctrlc::set_handler(move || {
        let _ = stop.send(MonitorEvent::Stop);
    })
    .context("Failed to install Ctrl+C handler")?;

    session.initial_scan().context("Initial scan failed")?;
    renderer.on_record_set_changed(&session.snapshot()?);
    session
        .run(&monitor, &mut renderer)
        .context("Monitoring failed")?;

    Ok(())
}

/// Terminal stand-in for the display collaborator.
struct Renderer {
    format: OutputFormat,
    no_color: bool,
}

impl Renderer {
    fn new(format: OutputFormat, no_color: bool) -> Self {
        Self { format, no_color }
    }

    fn print_text(&self, snapshot: &Snapshot) {
        println!(
            "{:<32} {:<20} {:<19} {:<12} {}",
            "Filename", "Parent Folder", "Last Modified", "Created By", "Path"
        );
        for row in &snapshot.rows {
            let line = format!(
                "{:<32} {:<20} {:<19} {:<12} {}",
                row.filename,
                row.parent_folder,
                row.last_modified.format("%Y-%m-%d %H:%M:%S"),
                row.created_by,
                row.path.display()
            );
            if row.is_highlighted() && !self.no_color {
                println!("\x1b[32m{}\x1b[0m", line); // Green
            } else if row.is_highlighted() {
                println!("{} *", line);
            } else {
                println!("{}", line);
            }
        }
        println!(
            "--- {} files, {} highlighted",
            snapshot.len(),
            snapshot.highlighted.len()
        );
        println!();
    }

    fn print_json(&self, snapshot: &Snapshot) {
        match serde_json::to_string(&snapshot.rows) {
            Ok(json) => println!("{}", json),
            Err(err) => tracing::error!("Failed to serialize snapshot: {}", err),
        }
    }

    fn print_compact(&self, snapshot: &Snapshot) {
        for row in &snapshot.rows {
            let tags: Vec<&str> = row.tags.iter().map(|t| t.as_str()).collect();
            println!("{} {}", tags.join(","), row.path.display());
        }
        println!();
    }
}

impl SnapshotSink for Renderer {
    fn on_record_set_changed(&mut self, snapshot: &Snapshot) {
        match self.format {
            OutputFormat::Text => self.print_text(snapshot),
            OutputFormat::Json => self.print_json(snapshot),
            OutputFormat::Compact => self.print_compact(snapshot),
        }
    }
}
