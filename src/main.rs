mod app;
mod ui;

use anyhow::{Context, Result};
use app::{App, RenderJob};
use choromap::RenderConfig;
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "choromap")]
#[command(about = "Render choropleth maps with insets and labels", version, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a map to SVG or PNG
    Render(RenderArgs),
    /// Load and validate a config file
    CheckConfig {
        /// Config JSON
        config: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Level-1 region polygons (GeoJSON)
    #[arg(long)]
    level1: PathBuf,

    /// Value table (JSON rows or a key/value object)
    #[arg(long)]
    values: PathBuf,

    /// Render config (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Lake and water-body polygons (GeoJSON)
    #[arg(long)]
    lakes: Option<PathBuf>,

    /// Country polygons for neighboring-country context (GeoJSON)
    #[arg(long)]
    countries: Option<PathBuf>,

    /// Output file path
    #[arg(long, short)]
    output: PathBuf,

    /// Output format: svg or png (auto-detected from the extension if not specified)
    #[arg(long)]
    format: Option<String>,

    /// Figure title, overriding the config
    #[arg(long)]
    title: Option<String>,

    /// Show the map in the terminal after writing it
    #[arg(long)]
    preview: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::CheckConfig { config } => check_config(config),
        Command::Render(args) => render(args),
    }
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = RenderConfig::from_path(&path).with_context(|| format!("loading config {}", path.display()))?;
    println!(
        "{}: ok ({} inset(s), colormap {})",
        path.display(),
        config.inset_level1_regions.len(),
        config.styling.cmap.name()
    );
    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    let job = RenderJob {
        level1: args.level1,
        values: args.values,
        config: args.config,
        lakes: args.lakes,
        countries: args.countries,
        title: args.title,
    };
    let output = job.run()?;
    let format = app::write_output(&output.scene, &args.output, args.format.as_deref())?;
    println!("wrote {} ({format})", args.output.display());

    if args.preview {
        let mut terminal = ratatui::init();
        terminal.clear()?;
        let result = preview(&mut terminal, output);
        ratatui::restore();
        result?;
    }
    Ok(())
}

fn preview(terminal: &mut DefaultTerminal, output: choromap::RenderOutput) -> Result<()> {
    let size = terminal.size()?;
    let (width, height) = ui::canvas_size(Rect::new(0, 0, size.width, size.height));
    let mut app = App::new(output, width, height);

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    // Only handle key press events (not release)
                    if key.kind == KeyEventKind::Press {
                        if let KeyCode::Char('q') | KeyCode::Esc = key.code {
                            app.quit();
                        }
                    }
                }
                Event::Resize(width, height) => {
                    let (cols, rows) = ui::canvas_size(Rect::new(0, 0, width, height));
                    app.resize(cols, rows);
                }
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
