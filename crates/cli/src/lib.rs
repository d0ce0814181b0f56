use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf_engine::{default_engine, LopdfEngine, Rotation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use viewer_core::{
    FileInput, PasswordList, PasswordPrompt, PasswordRequest, ViewerConfig, ViewerController,
};

mod view;

pub use view::Session;

/// How long a one-shot command waits for its render to finish.
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "pageview-cli")]
#[command(about = "Terminal PDF page viewer")]
pub struct Cli {
    /// Log filter directive, e.g. `debug` or `viewer_core=trace`.
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    /// JSON viewer configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct DocumentArgs {
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Password for protected documents. Prompted on stdin when omitted.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// Render one page to a PNG.
    Render {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Zoom factor, clamped to the configured bounds.
        #[arg(long)]
        zoom: Option<f32>,
        /// Clockwise rotation in degrees (0, 90, 180 or 270).
        #[arg(long, default_value_t = 0)]
        rotate: u16,
        /// Invert colours.
        #[arg(long)]
        night: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a thumbnail PNG for every page.
    Thumbs {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Search one page for a term.
    Search {
        #[command(flatten)]
        document: DocumentArgs,
        #[arg(value_name = "QUERY")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Treat the query as a regular expression.
        #[arg(long)]
        regex: bool,
    },
    /// Open an interactive viewing session on stdin.
    View {
        #[command(flatten)]
        document: DocumentArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    file: String,
    page_count: u32,
    first_page_size_pt: PageSizeOutput,
    metadata: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = load_config(cli.config.as_deref())?;
    init_tracing(cli.log_level.as_deref(), &config.log_level);

    match cli.command {
        Commands::Info { document } => run_info(&document, config),
        Commands::Render { document, page, zoom, rotate, night, output } => {
            let options = RenderOptions { page, zoom, rotate, night };
            run_render(&document, config, options, output.as_deref())
        }
        Commands::Thumbs { document, output_dir } => {
            run_thumbs(&document, config, output_dir.as_deref())
        }
        Commands::Search { document, query, page, regex } => {
            run_search(&document, config, &query, page, regex)
        }
        Commands::View { document } => run_view(&document, config),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let config = match path {
        Some(path) => ViewerConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ViewerConfig::default(),
    };

    config.with_env_overrides().context("invalid environment override")
}

/// `--log-level` wins over `RUST_LOG`, which wins over the config file.
fn init_tracing(explicit: Option<&str>, configured: &str) {
    let directive = explicit
        .map(ToOwned::to_owned)
        .or_else(|| std::env::var("RUST_LOG").ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| configured.to_owned());
    let filter =
        EnvFilter::builder().parse(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .try_init();
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

/// Asks for passwords on a line-oriented reader. A blank line or end of
/// input gives up.
pub struct LinePrompt<'a, R> {
    input: &'a mut R,
}

impl<'a, R: BufRead> LinePrompt<'a, R> {
    pub fn new(input: &'a mut R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> PasswordPrompt for LinePrompt<'_, R> {
    fn request_password(&mut self, request: PasswordRequest<'_>) -> Option<String> {
        if request.previous_rejected {
            eprintln!("Incorrect password.");
        }
        eprint!("Password for {}: ", request.file_name);
        let _ = io::stderr().flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let password = line.trim_end_matches(['\r', '\n']);
                (!password.is_empty()).then(|| password.to_owned())
            }
        }
    }
}

/// Opens `args.file` in a fresh viewer, prompting for a password through
/// `input` when none was given on the command line.
fn open_viewer<R: BufRead>(
    args: &DocumentArgs,
    config: ViewerConfig,
    input: &mut R,
) -> Result<ViewerController<LopdfEngine>> {
    ensure_pdf_exists(&args.file)?;
    tracing::debug!(file = %args.file.display(), "opening document");

    let file = FileInput::from_path(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let mut viewer = ViewerController::new(default_engine(), config)?;

    let loaded = match &args.password {
        Some(password) => viewer.open_file(file, &mut PasswordList::new([password.clone()])),
        None => viewer.open_file(file, &mut LinePrompt::new(input)),
    };
    loaded.with_context(|| format!("failed to open {}", args.file.display()))?;

    Ok(viewer)
}

fn open_from_stdin(
    args: &DocumentArgs,
    config: ViewerConfig,
) -> Result<ViewerController<LopdfEngine>> {
    open_viewer(args, config, &mut io::stdin().lock())
}

fn run_info(args: &DocumentArgs, config: ViewerConfig) -> Result<()> {
    let viewer = open_from_stdin(args, config)?;

    let page_count = viewer.page_count().unwrap_or_default();
    let size = viewer.page_size(1)?;
    let metadata: BTreeMap<&'static str, String> = viewer
        .metadata()
        .map(|metadata| {
            metadata.entries().into_iter().map(|(key, value)| (key, value.to_owned())).collect()
        })
        .unwrap_or_default();

    let payload = InfoOutput {
        file: args.file.display().to_string(),
        page_count,
        first_page_size_pt: PageSizeOutput { width: size.width_pt, height: size.height_pt },
        metadata,
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

struct RenderOptions {
    page: u32,
    zoom: Option<f32>,
    rotate: u16,
    night: bool,
}

fn run_render(
    args: &DocumentArgs,
    config: ViewerConfig,
    options: RenderOptions,
    output: Option<&Path>,
) -> Result<()> {
    let rotation = Rotation::from_degrees(options.rotate).with_context(|| {
        format!("--rotate must be 0, 90, 180 or 270 (got {})", options.rotate)
    })?;

    let mut viewer = open_from_stdin(args, config)?;
    viewer.go_to_page(options.page)?;
    if let Some(zoom) = options.zoom {
        viewer.set_zoom(zoom)?;
    }
    while viewer.view().map(|view| view.rotation()) != Some(rotation) {
        viewer.rotate()?;
    }
    if options.night {
        viewer.toggle_night_mode();
    }

    viewer.wait_idle(RENDER_TIMEOUT)?;
    if !viewer.frame_is_current() {
        let reason = viewer.last_error().unwrap_or("no frame was rendered");
        anyhow::bail!("failed to render page {}: {reason}", options.page);
    }
    let image = viewer.presented_frame().context("no frame was rendered")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| {
        args.file.with_file_name(output_name(&args.file, &format!("page-{}", options.page)))
    });
    save_png(&image, &output)?;

    println!("{}", output.display());
    Ok(())
}

fn run_thumbs(args: &DocumentArgs, config: ViewerConfig, output_dir: Option<&Path>) -> Result<()> {
    let viewer = open_from_stdin(args, config)?;

    for thumbnail in viewer.thumbnails() {
        let Some(image) = &thumbnail.image else {
            tracing::warn!(page = thumbnail.page, "skipping page without a thumbnail");
            continue;
        };

        let name = output_name(&args.file, &format!("thumb-{}", thumbnail.page));
        let output = match output_dir {
            Some(dir) => dir.join(name),
            None => args.file.with_file_name(name),
        };
        save_png(image, &output)?;
        println!("{}", output.display());
    }

    Ok(())
}

fn run_search(
    args: &DocumentArgs,
    config: ViewerConfig,
    query: &str,
    page: u32,
    regex: bool,
) -> Result<()> {
    let mut viewer = open_from_stdin(args, config)?;
    viewer.go_to_page(page)?;

    let outcome = if regex { viewer.search_pattern(query)? } else { viewer.search(query)? };
    if outcome.found {
        println!("found \"{}\" on page {}", outcome.query, outcome.page);
    } else {
        println!("\"{}\" not found on page {}", outcome.query, outcome.page);
    }

    Ok(())
}

fn run_view(args: &DocumentArgs, config: ViewerConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let viewer = open_viewer(args, config, &mut input)?;

    let mut session = Session::new(viewer, io::stdout().lock());
    session.run(input)
}

pub(crate) fn save_png(image: &image::RgbaImage, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save_with_format(output, image::ImageFormat::Png)
        .with_context(|| format!("failed to write image to {}", output.display()))
}

fn output_name(file: &Path, suffix: &str) -> String {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    format!("{stem}-{suffix}.png")
}
