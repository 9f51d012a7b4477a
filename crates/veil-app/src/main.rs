// Veil: stacked overlay panels with screen-capture concealment.
// Wires the crates together: settings store, headless embedding host, native
// capture exclusion, and a stdin command loop paced by animation deadlines.

mod command;
mod compositor;
mod settings;

use std::io::BufRead;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use veil_core::{CaptureExclusion, EmbeddingHost, Size};
use veil_motion::SystemClock;
use veil_platform::HeadlessHost;

use command::Command;
use compositor::Compositor;
use settings::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "Stacked overlay panels with screen-capture concealment")]
struct Cli {
    /// Settings file (defaults to <config dir>/veil/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Viewport width in logical pixels
    #[arg(long, default_value_t = 420.0)]
    width: f32,

    /// Viewport height in logical pixels
    #[arg(long, default_value_t = 800.0)]
    height: f32,

    /// Skip concealing windows at startup
    #[arg(long)]
    no_conceal: bool,

    /// Root directory for relative `file://` panel sources
    #[arg(long)]
    assets: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if !(cli.width > 0.0 && cli.height > 0.0) {
        anyhow::bail!("viewport must be positive, got {}x{}", cli.width, cli.height);
    }

    let store = match cli.settings {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::default_location()?,
    };
    log::info!("Settings: {}", store.path().display());

    let asset_root = match cli.assets {
        Some(dir) => dir,
        None => std::env::current_dir().context("cannot resolve the working directory")?,
    };

    let mut compositor = Compositor::new(
        HeadlessHost::new(asset_root),
        veil_platform::capture_exclusion(),
        Box::new(store),
        Rc::new(SystemClock),
        Size::new(cli.width, cli.height),
    );
    compositor.bootstrap(!cli.no_conceal);

    let (tx, rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stdin closed: {}", e);
                        break;
                    }
                }
            }
        })
        .context("cannot spawn the stdin reader")?;

    println!("{}", compositor.status_line());
    run(&mut compositor, &rx);
    compositor.teardown();
    Ok(())
}

/// Single consumer: wait for a command or the next animation deadline,
/// whichever comes first.
fn run<H: EmbeddingHost, P: CaptureExclusion>(compositor: &mut Compositor<H, P>, rx: &Receiver<String>) {
    loop {
        let received = match compositor.next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                rx.recv_timeout(wait)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match command::parse(&line) {
                    Ok(Command::Quit) => return,
                    Ok(cmd) => println!("{}", compositor.execute(cmd)),
                    Err(e) => println!("error: {}", e),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Input closed; shutting down");
                return;
            }
        }

        compositor.tick();
    }
}
