use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use manuals_application::{
    Catalog, LearningStore, Reconciler, ResetConfirmation, SaveRequest, load_metadata, locate,
};
use manuals_core::{
    MetadataForm, ScanScope, Settings, SuggestionField, Suggestions, file_name_of, parse_tags,
    sidecar_path,
};
use manuals_engine::{Engine, LopdfCodec, PdfCodec, PdfViewer};
use manuals_storage::{CollisionPolicy, Storage, rename_file, scan, scan_roots};
use tracing::{Level, info, subscriber::set_global_default, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let opts = Opts::parse();
    init_tracing(opts.verbose);
    if let Err(err) = run(opts) {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();
    let _ = set_global_default(subscriber);
}

#[derive(Parser)]
#[command(version, about = "Catalogue PDF manuals with sidecar metadata")]
struct Opts {
    /// Increase log verbosity (-v, -vv).
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List manuals under DIR, or under the configured library roots.
    Scan { dir: Option<PathBuf> },
    /// Find a PDF that may have been renamed since it was last seen.
    Locate { pdf: PathBuf },
    /// Suggest brand, model and type for a filename.
    Suggest { filename: String },
    /// Save metadata for a PDF, renaming it to match the title.
    Save(SaveArgs),
    /// Rename a file, adding a numeric suffix if the name is taken.
    Rename { old: PathBuf, new: PathBuf },
    /// Drop one learned brand, model or type.
    Forget { field: SuggestionField, value: String },
    /// Erase everything learned. Requires --yes.
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Show learning statistics.
    Stats,
    /// Show the PDF info dictionary and sidecar metadata.
    Info { pdf: PathBuf },
    /// Print the text of one page.
    View {
        pdf: PathBuf,
        /// One-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Manage library roots.
    Roots {
        #[command(subcommand)]
        action: RootsAction,
    },
    /// Show or change settings.
    Config(ConfigArgs),
}

#[derive(clap::Args)]
struct SaveArgs {
    pdf: PathBuf,
    #[arg(long)]
    title: String,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    year_range: Option<String>,
    #[arg(long = "type")]
    manual_type: Option<String>,
    #[arg(long)]
    bike_type: Vec<String>,
    #[arg(long)]
    language: Option<String>,
    /// Comma-separated.
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Subcommand)]
enum RootsAction {
    Add { dir: String },
    Remove { dir: String },
    List,
}

#[derive(clap::Args)]
struct ConfigArgs {
    #[arg(long)]
    scope: Option<ScanScope>,
    #[arg(long)]
    signature: Option<String>,
    /// Cap for learned word counters; 0 removes the cap.
    #[arg(long)]
    word_weight_cap: Option<u32>,
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let project_dirs =
        ProjectDirs::from("com", "moto-manual", "manual-library").context("resolve project dirs")?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;

    let db_path = config_dir.join("manuals.db");
    let storage = Storage::open(&db_path)?;
    let mut settings = storage.load_settings()?;
    let cwd = std::env::current_dir().context("get cwd")?;

    match opts.command {
        Command::Scan { dir } => {
            let manuals = match dir {
                Some(dir) => scan(&dir, settings.scan_scope),
                None => {
                    if settings.library_roots.is_empty() {
                        settings.add_root(&cwd.to_string_lossy());
                        storage.save_settings(&settings)?;
                    }
                    scan_roots(&settings, &cwd)
                }
            };
            let mut catalog = Catalog::from_scan(manuals);
            catalog.hydrate();
            for manual in catalog.manuals() {
                let summary = manual
                    .metadata
                    .as_ref()
                    .map(|m| m.summary())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", manual.display_title(), summary, manual.path.display());
            }
            println!("{} manual(s)", catalog.len());
        }
        Command::Locate { pdf } => {
            let located = locate(&pdf)?;
            if located.was_renamed {
                println!(
                    "{} -> {}",
                    located.original_name.unwrap_or_default(),
                    located.found_path.display()
                );
            } else {
                println!("{}", located.found_path.display());
            }
        }
        Command::Suggest { filename } => {
            let learning = LearningStore::open(&storage)?;
            print_suggestions(&learning.suggest(&filename));
        }
        Command::Save(args) => save(&storage, &settings, args)?,
        Command::Rename { old, new } => {
            let renamed = rename_file(&old, &new, CollisionPolicy::Suffix)?;
            let old_sidecar = sidecar_path(&old);
            if old_sidecar.exists()
                && let Err(err) =
                    rename_file(&old_sidecar, &sidecar_path(&renamed), CollisionPolicy::Fail)
            {
                warn!("could not move sidecar {}: {err}", old_sidecar.display());
            }
            println!("{}", renamed.display());
        }
        Command::Forget { field, value } => {
            let mut learning = LearningStore::open(&storage)?;
            if learning.forget(field, &value)? {
                println!("forgot {field} \"{value}\"");
            } else {
                println!("no learned {field} \"{value}\"");
            }
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("reset erases every learned suggestion; rerun with --yes to confirm");
            }
            let mut learning = LearningStore::open(&storage)?;
            learning.reset_all(ResetConfirmation::confirmed_by_user())?;
            println!("learning data reset");
        }
        Command::Stats => {
            let learning = LearningStore::open(&storage)?;
            let state = learning.state();
            let stats = learning.completion_stats();
            println!("saved manuals: {}", stats.total_saved);
            if let Some(last) = stats.last_saved {
                println!("last saved:    {}", last.to_rfc3339());
            }
            for field in SuggestionField::ALL {
                println!("{field} patterns: {}", state.patterns(field).len());
            }
            println!("filename associations: {}", state.filename_associations.len());
        }
        Command::Info { pdf } => {
            let info = LopdfCodec::new().read_metadata(&pdf)?;
            println!("title:    {}", info.title.unwrap_or_default());
            println!("author:   {}", info.author.unwrap_or_default());
            println!("subject:  {}", info.subject.unwrap_or_default());
            println!("producer: {}", info.producer.unwrap_or_default());
            println!("creator:  {}", info.creator.unwrap_or_default());
            if !info.keywords.is_empty() {
                println!("keywords: {}", info.keywords.join(", "));
            }
            let (metadata, from_sidecar) = load_metadata(&pdf);
            let source = if from_sidecar { "sidecar" } else { "filename" };
            println!("metadata ({source}): {}", metadata_line(&metadata));
        }
        Command::View { pdf, page } => {
            let engine = Engine::new();
            let doc = engine.open(&pdf)?;
            let index = page.saturating_sub(1);
            println!("page {}/{}", index + 1, doc.num_pages);
            println!("{}", engine.render_page(&pdf, index)?);
        }
        Command::Roots { action } => match action {
            RootsAction::Add { dir } => {
                let dir = absolute_root(&cwd, &dir);
                if settings.add_root(&dir) {
                    storage.save_settings(&settings)?;
                    info!("added library root {dir}");
                }
            }
            RootsAction::Remove { dir } => {
                if settings.remove_root(&dir) || settings.remove_root(&absolute_root(&cwd, &dir)) {
                    storage.save_settings(&settings)?;
                } else {
                    println!("{dir} is not a library root");
                }
            }
            RootsAction::List => {
                for root in &settings.library_roots {
                    println!("{root}");
                }
            }
        },
        Command::Config(args) => {
            if let Some(scope) = args.scope {
                settings.scan_scope = scope;
            }
            if let Some(signature) = args.signature {
                settings.signature = signature;
            }
            if let Some(cap) = args.word_weight_cap {
                settings.word_weight_cap = Some(cap);
            }
            settings.normalize();
            storage.save_settings(&settings)?;
            print_settings(&settings);
        }
    }

    Ok(())
}

fn save(storage: &Storage, settings: &Settings, args: SaveArgs) -> anyhow::Result<()> {
    let (mut catalog, index) = Catalog::around(&args.pdf);
    let selection = catalog
        .select(index)?
        .with_context(|| format!("{} is not in its directory listing", args.pdf.display()))?;
    if let Some(located) = &selection.relocated {
        println!(
            "{} was renamed to {}",
            located.original_name.as_deref().unwrap_or_default(),
            file_name_of(&located.found_path)
        );
    }

    let mut form = MetadataForm::from_record(&selection.metadata);
    form.title = args.title;
    if let Some(brand) = args.brand {
        form.brand = brand;
    }
    if let Some(model) = args.model {
        form.model = model;
    }
    if args.year.is_some() {
        form.year = args.year;
    }
    if args.year_range.is_some() {
        form.year_range = args.year_range;
    }
    if let Some(manual_type) = args.manual_type {
        form.manual_type = manual_type;
    }
    if !args.bike_type.is_empty() {
        form.bike_type = args.bike_type;
    }
    if let Some(language) = args.language {
        form.language = language;
    }
    if let Some(tags) = args.tags {
        form.tags = parse_tags(&tags);
    }
    if let Some(description) = args.description {
        form.description = description;
    }

    let codec = LopdfCodec::new();
    let mut learning =
        LearningStore::open(storage)?.with_word_weight_cap(settings.word_weight_cap);
    let outcome = Reconciler::new(&codec, &mut learning)
        .with_signature(&settings.signature)
        .save(SaveRequest {
            pdf_path: selection.path.clone(),
            previous: selection.from_sidecar.then_some(selection.metadata),
            form,
        })?;
    catalog.apply_save(selection.index, &outcome);

    if let Some(from) = &outcome.renamed_from {
        println!("renamed {} -> {}", file_name_of(from), file_name_of(&outcome.pdf_path));
    }
    println!("{}", outcome.message());
    if let Some(next) = catalog.next() {
        println!("next: {}", catalog.manuals()[next].path.display());
    }
    Ok(())
}

fn print_suggestions(suggestions: &Suggestions) {
    if suggestions.is_empty() {
        println!("no suggestions");
        return;
    }
    for field in SuggestionField::ALL {
        for candidate in suggestions.candidates(field) {
            println!(
                "{field}\t{}\t{:.2}\t{}",
                candidate.value, candidate.confidence, candidate.reason
            );
        }
    }
    println!("confidence {:.1}", suggestions.confidence);
}

fn print_settings(settings: &Settings) {
    println!("scan scope:      {}", settings.scan_scope);
    println!("signature:       {}", settings.signature);
    match settings.word_weight_cap {
        Some(cap) => println!("word weight cap: {cap}"),
        None => println!("word weight cap: none"),
    }
}

fn metadata_line(metadata: &manuals_core::MetadataRecord) -> String {
    let mut parts = vec![format!("\"{}\"", metadata.title)];
    let summary = metadata.summary();
    if !summary.is_empty() {
        parts.push(summary);
    }
    if !metadata.manual_type.is_empty() {
        parts.push(metadata.manual_type.clone());
    }
    if !metadata.tags.is_empty() {
        parts.push(format!("tags: {}", metadata.tags.join(", ")));
    }
    if metadata.is_signed() {
        parts.push("signed".to_string());
    }
    parts.join(" | ")
}

fn absolute_root(cwd: &Path, dir: &str) -> String {
    let path = PathBuf::from(dir.trim());
    let path = if path.is_absolute() { path } else { cwd.join(path) };
    path.to_string_lossy().to_string()
}
