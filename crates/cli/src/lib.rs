use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pagemark_core::{read_sidecar, shared_engine, CancellationToken, Editor, ExportedPage};
use pdf_engine::{default_engine, OpenSource, PdfEngine, ThumbnailSize};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub mod script;

#[derive(Debug, Parser)]
#[command(name = "pagemark")]
#[command(about = "Annotate PDF pages and export them as flattened images")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a thumbnail PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 320)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Flatten annotated pages into PNG files.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Export a single 1-based page.
        #[arg(long, conflicts_with = "all")]
        page: Option<u32>,
        /// Export every page (the default).
        #[arg(long)]
        all: bool,
        /// Annotation sidecar to use instead of the one next to FILE.
        #[arg(long, value_name = "JSON")]
        annotations: Option<PathBuf>,
        #[arg(long)]
        scale: Option<f32>,
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Replay a recorded editing script and export the annotated pages.
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        script: PathBuf,
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
        /// Write the resulting annotations to FILE's sidecar.
        #[arg(long)]
        save: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    page_count: u32,
    pages: Vec<PageSizeOutput>,
    path: String,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    height: f32,
    width: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::RenderThumb { file, page, width, height, output } => {
            run_render_thumb(&file, page, width, height, output.as_deref())
        }
        Commands::Export { file, page, all: _, annotations, scale, out_dir } => {
            run_export(&file, page, annotations.as_deref(), scale, out_dir.as_deref())
        }
        Commands::Replay { file, script, out_dir, save } => {
            run_replay(&file, &script, out_dir.as_deref(), save)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|index| {
            let size = engine.page_size(handle, index)?;
            Ok(PageSizeOutput { height: size.height_pt, width: size.width_pt })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { page_count, pages, path: file.display().to_string() };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    width: u32,
    height: u32,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let image = engine
        .render_thumbnail(handle, page - 1, ThumbnailSize { width_px: width, height_px: height })
        .context("failed to render thumbnail")?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| file.with_file_name(format!("{}-thumb-{page}.png", file_stem(file))));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_export(
    file: &Path,
    page: Option<u32>,
    annotations: Option<&Path>,
    scale: Option<f32>,
    out_dir: Option<&Path>,
) -> Result<()> {
    let mut editor = open_editor(file, scale)?;

    match annotations {
        Some(path) => {
            let pages = read_sidecar(path)
                .with_context(|| format!("failed to read annotations from {}", path.display()))?;
            editor.import_annotations(pages)?;
        }
        None => {
            editor.load_sidecar().context("failed to read annotation sidecar")?;
        }
    }

    let scale = editor.settings().export_scale;
    let pages = match page {
        Some(page) => vec![editor.export_page_at(page, scale)?],
        None => editor.export_document(&CancellationToken::new())?,
    };

    write_pages(&pages, &output_dir(file, out_dir))?;
    editor.close();
    Ok(())
}

fn run_replay(file: &Path, script_path: &Path, out_dir: Option<&Path>, save: bool) -> Result<()> {
    let events = script::load_script(script_path)?;
    let mut editor = open_editor(file, None)?;
    editor.load_sidecar().context("failed to read annotation sidecar")?;

    script::replay(&mut editor, &events)?;
    editor.settle_input();

    let scale = editor.settings().export_scale;
    let annotated: Vec<u32> = editor.store().pages().map(|(page, _)| page).collect();
    let pages = annotated
        .into_iter()
        .map(|page| editor.export_page_at(page, scale))
        .collect::<Result<Vec<_>, _>>()?;
    write_pages(&pages, &output_dir(file, out_dir))?;

    if save {
        let sidecar = editor.save_sidecar().context("failed to save annotations")?;
        println!("{}", sidecar.display());
    }

    editor.close();
    Ok(())
}

fn open_editor(file: &Path, scale: Option<f32>) -> Result<Editor> {
    ensure_pdf_exists(file)?;

    let mut preferences =
        storage::load_effective_preferences().context("failed to load preferences")?;
    if let Some(scale) = scale {
        if !(scale.is_finite() && scale > 0.0) {
            anyhow::bail!("--scale must be a positive number");
        }
        preferences.export_scale = scale;
    }

    let mut editor = Editor::new(shared_engine(default_engine()), &preferences)?;
    editor.load_path(file)?;
    Ok(editor)
}

fn write_pages(pages: &[ExportedPage], out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for page in pages {
        let path = page.write_to_dir(out_dir)?;
        println!("{}", path.display());
    }
    Ok(())
}

fn output_dir(file: &Path, out_dir: Option<&Path>) -> PathBuf {
    match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => file.parent().map(Path::to_path_buf).unwrap_or_default(),
    }
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

fn file_stem(file: &Path) -> &str {
    file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail")
}
