// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use facility_map::{
    category_counts, coordinate_coverage, load_catalog, logging, map_unavailable_notice, preview,
    render_map, AppConfig, Dataset, DomainDescriptor, Field, FilterSpec, FilterValue,
    MarkerTemplate,
};

const PREVIEW_ROWS: usize = 10;

#[derive(Parser)]
#[command(name = "facility-map", version, about = "Facility datasets on a Map4D map")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List the configured domains
    Domains,
    /// Load report, coordinate coverage and category counts for a domain
    Summary { domain: String },
    /// Render the filtered markers of a domain into the map template
    Render {
        domain: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        region: Option<String>,
        /// Case-insensitive substring of the name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "map.html")]
        out: PathBuf,
    },
    /// Interactive terminal UI (default)
    Ui,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Command::Ui) {
        Command::Domains => run_domains(&config),
        Command::Summary { domain } => run_summary(&config, &domain),
        Command::Render {
            domain,
            category,
            subcategory,
            region,
            name,
            out,
        } => {
            let spec = FilterSpec::match_all()
                .with(Field::Category, FilterValue::from_option(category))
                .with(Field::Subcategory, FilterValue::from_option(subcategory))
                .with(Field::Region, FilterValue::from_option(region))
                .with(Field::Name, FilterValue::from_option(name));
            run_render(&config, &domain, &spec, &out)
        }
        Command::Ui => run_ui_mode(config),
    }
}

fn run_domains(config: &AppConfig) -> Result<()> {
    let catalog = load_catalog(config).context("Failed to load domain catalog")?;

    println!("🗂️  {} domains", catalog.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for descriptor in catalog.iter() {
        println!(
            "  {:<14} {:<28} {}",
            descriptor.name,
            descriptor.title,
            config.data_dir.join(&descriptor.file).display()
        );
    }

    Ok(())
}

fn load_dataset(config: &AppConfig, domain: &str) -> Result<(DomainDescriptor, Dataset)> {
    let catalog = load_catalog(config).context("Failed to load domain catalog")?;
    let descriptor = catalog.get(domain)?.clone();

    println!("📂 Loading {}...", descriptor.title);
    let dataset = Dataset::load(&descriptor, &config.data_dir)
        .with_context(|| format!("Failed to load domain '{}'", domain))?;
    println!("✓ Loaded {} entities from {}", dataset.len(), dataset.source.display());

    Ok((descriptor, dataset))
}

fn run_summary(config: &AppConfig, domain: &str) -> Result<()> {
    let (descriptor, dataset) = load_dataset(config, domain)?;
    let report = &dataset.report;

    println!("\n📊 Load report");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Rows:                {}", report.rows);
    println!("  Located:             {}", report.located);
    println!("  Missing location:    {}", report.missing_location);
    println!("  Coordinate errors:   {}", report.coordinate_errors);
    println!("  Synthesized names:   {}", report.synthesized_names);

    let view = dataset.view(&FilterSpec::match_all());
    let coverage = coordinate_coverage(&view);

    println!("\n📍 Coordinate coverage");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  {}", coverage.summary());
    for (region, count) in &coverage.missing_by_region {
        println!("    {:<30} {:>5}", region, count);
    }

    println!("\n🏷️  By category");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (category, count) in category_counts(&view) {
        println!("  {:<30} {:>5}", category, count);
    }

    let columns = &descriptor.display_columns;

    println!("\n🔎 Preview");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  {}", columns.join(" | "));
    for row in preview(&view, columns, PREVIEW_ROWS) {
        println!("  {}", row.join(" | "));
    }

    Ok(())
}

fn run_render(config: &AppConfig, domain: &str, spec: &FilterSpec, out: &Path) -> Result<()> {
    let Some(credentials) = config.credentials.as_ref() else {
        println!("⚠ {}", map_unavailable_notice());
        println!("  No map written to {}", out.display());
        return Ok(());
    };

    let (_, dataset) = load_dataset(config, domain)?;
    let template = MarkerTemplate::from_file(&config.template_path)?;

    let view = dataset.view(spec);
    let located = view.iter().filter(|e| e.has_location()).count();
    println!("🔍 {} entities match, {} with coordinates", view.len(), located);

    let html = render_map(&template, view, credentials);
    fs::write(out, html).with_context(|| format!("Failed to write {}", out.display()))?;

    println!("✅ Map written to {}", out.display());
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: AppConfig) -> Result<()> {
    println!("🖥️  Loading Facility Map UI...\n");

    let catalog = load_catalog(&config).context("Failed to load domain catalog")?;
    let cache = facility_map::DatasetCache::new(catalog, config.data_dir.clone());

    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(&cache, config);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the HTTP API: cargo run --bin facility-server --features server");
    std::process::exit(1);
}
