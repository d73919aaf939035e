use std::fs;
use std::path::Path;

use anyhow::Context;
use bsondiff_codec::{decode_document, document_from_extended_json, encode_document};
use bsondiff_core::{diff_documents, DiffOptions, PatchDocument};
use bsondiff_types::{Document, ExtJsonMode};
use colored::Colorize;
use serde_json::Value as Json;
use tracing::debug;

use crate::cli::{ApplyArgs, Cli, Command, DiffArgs, OutputFormat};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Diff(args) => cmd_diff(args, &cli.format),
        Command::Apply(args) => cmd_apply(args, &cli.format),
    }
}

fn cmd_diff(args: DiffArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let options = resolve_options(&args)?;
    let left = read_document(&args.left)?;
    let right = read_document(&args.right)?;
    let patch = diff_documents(&left, &right, &options);
    match format {
        OutputFormat::Json => println!("{}", to_json(patch.as_document(), mode(args.canonical))?),
        OutputFormat::Text => print!("{}", render_patch(&patch)),
    }
    Ok(())
}

fn cmd_apply(args: ApplyArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let doc = read_document(&args.doc)?;
    let patch = PatchDocument::try_from(read_document(&args.patch)?)
        .with_context(|| format!("{} is not a patch", args.patch.display()))?;
    let updated = patch.apply_to(&doc);

    if let Some(out) = &args.output {
        write_document(out, &updated, mode(args.canonical))?;
        let stats = patch.stats();
        println!(
            "{} Applied {} set, {} unset to {}",
            "✓".green(),
            stats.sets,
            stats.unsets,
            out.display().to_string().bold()
        );
        return Ok(());
    }
    match format {
        OutputFormat::Json => println!("{}", to_json(&updated, mode(args.canonical))?),
        OutputFormat::Text => println!("{updated}"),
    }
    Ok(())
}

/// Config file first, then command-line flags on top.
fn resolve_options(args: &DiffArgs) -> anyhow::Result<DiffOptions> {
    let mut options = match &args.config {
        Some(path) => DiffOptions::load(path)?,
        None => DiffOptions::default(),
    };
    options.ignore.extend(args.ignore.iter().cloned());
    if let Some(mode) = args.ignore_mode {
        options.ignore_mode = mode.into();
    }
    debug!(?options, "resolved diff options");
    Ok(options)
}

fn mode(canonical: bool) -> ExtJsonMode {
    if canonical {
        ExtJsonMode::Canonical
    } else {
        ExtJsonMode::Relaxed
    }
}

fn is_bson(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("bson"))
}

/// Read a document from a `.bson` file or an Extended JSON file.
fn read_document(path: &Path) -> anyhow::Result<Document> {
    let doc = if is_bson(path) {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        decode_document(&bytes).with_context(|| format!("invalid BSON in {}", path.display()))?
    } else {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let json: Json = serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        document_from_extended_json(&json)
            .with_context(|| format!("invalid Extended JSON in {}", path.display()))?
    };
    debug!(path = %path.display(), fields = doc.len(), "read document");
    Ok(doc)
}

fn write_document(path: &Path, doc: &Document, mode: ExtJsonMode) -> anyhow::Result<()> {
    let bytes = if is_bson(path) {
        encode_document(doc)?
    } else {
        let mut text = to_json(doc, mode)?;
        text.push('\n');
        text.into_bytes()
    };
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn to_json(doc: &Document, mode: ExtJsonMode) -> anyhow::Result<String> {
    let json = Json::Object(bsondiff_codec::document_to_extended_json(doc, mode));
    Ok(serde_json::to_string_pretty(&json)?)
}

/// One line per operation: `- path` for unsets, `+ path = value` for sets.
fn render_patch(patch: &PatchDocument) -> String {
    if patch.is_empty() {
        return "No changes.\n".to_string();
    }
    let mut out = String::new();
    for path in patch.unset_paths() {
        out.push_str(&format!("{} {}\n", "-".red().bold(), path.red()));
    }
    for path in patch.set_paths() {
        if let Some(value) = patch.get_set(path) {
            out.push_str(&format!("{} {} = {}\n", "+".green().bold(), path.green(), value));
        }
    }
    let stats = patch.stats();
    out.push_str(&format!(
        "{} set, {} unset\n",
        stats.sets.to_string().bold(),
        stats.unsets.to_string().bold()
    ));
    out
}
