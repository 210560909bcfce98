use clap::{Parser, Subcommand};
use galley::config::Settings;
use galley::engine::Engine;
use galley::modules::{FrontMatter, Markdown, ReadFiles, WriteFiles};
use galley::output;
use galley::pipeline::{Pipeline, PipelineCollection};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "galley")]
#[command(about = "Content pipeline engine for static sites")]
#[command(long_about = "\
Content pipeline engine for static sites

Markdown files under the content directory flow through the content
pipeline: TOML front matter becomes metadata, Markdown becomes HTML, and
each file lands in the output directory with its extension swapped.
Stylesheets, scripts and images are copied through by the assets pipeline.

Content structure:

  content/
  ├── index.md                     # +++ TOML front matter +++, then Markdown
  ├── posts/
  │   ├── first-light.md           # Written to dist/posts/first-light.html
  │   └── second-thoughts.md
  └── style.css                    # Copied to dist/style.css

galley.toml (optional) supplies settings every document can read as
metadata fallback, plus:

  link_root    prefix for links built through the context
  workers      thread pool size (default: one per core)")]
#[command(version)]
struct Cli {
    /// Content directory
    #[arg(long, default_value = "content", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Settings file
    #[arg(long, default_value = "galley.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every pipeline and write the site to the output directory
    Build,
    /// Read and transform content without writing anything
    Check,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load_or_default(&cli.config)?;
    init_thread_pool(&settings);

    match cli.command {
        Command::Build => {
            println!("==> Building {}", cli.source.display());
            let pipelines = site_pipelines(&cli.source, &cli.output)?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event);
                }
            });
            let mut engine = Engine::new(pipelines, settings).with_events(tx);
            let report = engine.execute()?;
            drop(engine);
            printer.join().unwrap();

            let report_path = cli.output.join("galley-report.json");
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(&report_path, json)?;
            output::print_generation_report(&report);
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let mut pipelines = PipelineCollection::new();
            pipelines.add(
                Pipeline::new("check")
                    .add(ReadFiles::with_extensions(&cli.source, &["md"]))
                    .add(FrontMatter::new())
                    .add(Markdown),
            )?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event);
                }
            });
            let mut engine = Engine::new(pipelines, settings).with_events(tx);
            let report = engine.execute()?;
            drop(engine);
            printer.join().unwrap();

            println!("==> {} documents are valid", report.documents);
        }
    }

    Ok(())
}

/// The stock site build: a content pipeline rendering Markdown to HTML,
/// and an assets pipeline copying everything a page links to.
fn site_pipelines(
    source: &Path,
    output_dir: &Path,
) -> Result<PipelineCollection, Box<dyn std::error::Error>> {
    let mut pipelines = PipelineCollection::new();
    pipelines.add(
        Pipeline::new("content")
            .add(ReadFiles::with_extensions(source, &["md"]))
            .add(FrontMatter::new())
            .add(Markdown)
            .add(WriteFiles::with_extension(output_dir, "html")),
    )?;
    pipelines.add(
        Pipeline::new("assets")
            .add(ReadFiles::with_extensions(
                source,
                &["css", "js", "svg", "txt"],
            ))
            .add(WriteFiles::new(output_dir)),
    )?;
    Ok(pipelines)
}

/// Initialize the rayon thread pool from the `workers` setting.
///
/// Unset or zero keeps rayon's default of one thread per core.
fn init_thread_pool(settings: &Settings) {
    let workers = settings.get_as::<usize>("workers").unwrap_or(0);
    if workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .ok();
    }
}
