//! footnote-paginate
//!
//! Paginates a plain text file together with a set of footnotes and prints
//! the resulting pages, either as a table or as JSON.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use doc_model::{Document, InMemoryFootnoteStore, RenumberingNotifier, RevisionId};
use layout_engine::{
    PageConfig, PageLayout, PaginationEngine, PaginationRequest, PaginationScheduler,
    PaginationSettings, ReflowOutcome,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Paginate a text document with footnotes")]
struct Args {
    /// Plain text document; form feed characters force page breaks
    input: PathBuf,

    /// JSON array of footnotes: [{"position": 120, "content": "..."}]
    #[arg(short, long)]
    footnotes: Option<PathBuf>,

    /// Pagination settings as JSON; missing fields take defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = PageSizeArg::Letter)]
    page_size: PageSizeArg,

    /// Margin on all four sides, in points
    #[arg(short, long, default_value_t = 72.0)]
    margin: f32,

    /// Print the full layout as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageSizeArg {
    Letter,
    A4,
    Legal,
}

impl PageSizeArg {
    fn page_config(self, margin: f32) -> PageConfig {
        let config = match self {
            PageSizeArg::Letter => PageConfig::letter(),
            PageSizeArg::A4 => PageConfig::a4(),
            PageSizeArg::Legal => PageConfig::legal(),
        };
        config.with_margins(margin)
    }
}

/// One footnote of the input file
#[derive(Debug, Clone, Deserialize)]
struct FootnoteInput {
    /// Character offset of the reference marker
    position: usize,
    content: String,
    /// Load the footnote in the trashed state
    #[serde(default)]
    deleted: bool,
}

fn parse_footnotes(json: &str) -> Result<Vec<FootnoteInput>> {
    serde_json::from_str(json).context("footnote file must be a JSON array of {position, content}")
}

fn read_footnotes(path: &Path) -> Result<Vec<FootnoteInput>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read footnotes from {}", path.display()))?;
    parse_footnotes(&json)
}

/// Load footnotes into a fresh revision, numbering them as they go in
fn load_footnotes(
    notifier: &RenumberingNotifier<InMemoryFootnoteStore>,
    revision: RevisionId,
    inputs: &[FootnoteInput],
) -> Result<()> {
    for input in inputs {
        let id = notifier.insert_footnote(revision, input.position, input.content.clone())?;
        if input.deleted {
            notifier.trash(revision, id)?;
        }
    }
    Ok(())
}

fn render_table(layout: &PageLayout) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} page(s), container {:.1} x {:.1} pt",
        layout.page_count(),
        layout.container.width,
        layout.container.height
    );
    for page in &layout.pages {
        let _ = writeln!(
            out,
            "page {:>3}  chars {:>7}..{:<7}  reserve {:>7.1} pt  footnotes {}",
            page.index + 1,
            page.start(),
            page.end(),
            page.footnote_reserve,
            page.footnotes.len()
        );
        for placement in &page.placements {
            let text = placement.text.chars().take(48).collect::<String>().replace('\n', " ");
            let prefix = if placement.is_continuation { "..." } else { "" };
            let suffix = if placement.continues_to_next { "..." } else { "" };
            let _ = writeln!(out, "    [{}] {prefix}{text}{suffix}", placement.mark);
        }
        if let Some(notice) = &page.notice {
            let _ = writeln!(out, "    {}", notice.text);
        }
    }
    out
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => PaginationSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => PaginationSettings::default(),
    };
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let document = Document::from_plain_text(text);

    let notifier = RenumberingNotifier::new(InMemoryFootnoteStore::new());
    let revision = RevisionId::new();
    notifier.on_renumber(revision, |event| {
        tracing::debug!(changes = event.changes.len(), "Footnotes renumbered");
    })?;
    if let Some(path) = &args.footnotes {
        load_footnotes(&notifier, revision, &read_footnotes(path)?)?;
    }

    let container = args.page_size.page_config(args.margin).container_size();
    tracing::info!(
        chars = document.len(),
        footnotes = notifier.active_footnotes(revision)?.len(),
        width = container.width,
        height = container.height,
        "Paginating"
    );

    let scheduler = PaginationScheduler::new(PaginationEngine::with_default_measurer(settings));
    let request = PaginationRequest::new(document, notifier.footnotes(revision)?, container);
    let layout = match scheduler.compute_now(request).await? {
        ReflowOutcome::Published(layout) => layout,
        ReflowOutcome::Superseded => anyhow::bail!("pagination result was superseded"),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(layout.as_ref())?);
    } else {
        print!("{}", render_table(&layout));
    }
    Ok(())
}
