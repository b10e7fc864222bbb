use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rootcause::Report;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gmatool::data::wrappers::mmap::{MappedPair, with_suffix, write_pair};
use gmatool::error::{ArchiveError, IResult};
use gmatool::export::{extract_model, merge_archives};
use gmatool::models::ArchivePair;
use gmatool::recognized::Recognized;
use gmatool::select::{ModelKind, Selection, select_models};

/// Extract goals, switches or specific models from a GMA/TPL pair, or merge
/// two pairs into one.
///
/// Every archive argument is a path stem: `stage` refers to `stage.gma` and
/// `stage.tpl`. Input files are never modified.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log every archive operation
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all models in <NAME>.gma
    List {
        name: PathBuf,
        /// Print the model list as JSON
        #[clap(long)]
        json: bool,
    },
    /// Extract every goal into <NAME>_GOAL_<colour>.gma/.tpl
    Goals { name: PathBuf },
    /// Extract every switch (including switch bases) into <NAME>_<MODEL>.gma/.tpl
    Switches { name: PathBuf },
    /// Extract the model called <MODEL> into <NAME>_<MODEL>.gma/.tpl
    Extract { name: PathBuf, model: String },
    /// Combine two pairs into <NAME1>+<NAME2>.gma/.tpl, the second placed after the first
    Merge { first: PathBuf, second: PathBuf },
}

#[derive(Debug, serde::Serialize)]
struct ListedModel {
    index: usize,
    name: String,
    kind: ModelKind,
}

fn stem_with(stem: &Path, joiner: &str, tail: &str) -> PathBuf {
    let mut name: OsString = stem.as_os_str().to_owned();
    name.push(joiner);
    name.push(tail);
    PathBuf::from(name)
}

fn list(name: &Path, json: bool) -> Result<(), Report<ArchiveError>> {
    let files = MappedPair::open(name)?;
    let pair = ArchivePair::parse(&files.gma, &files.tpl)?;

    let models = pair
        .gma
        .names()
        .enumerate()
        .map(|(index, name)| -> IResult<ListedModel> {
            let name = name?.to_string();
            Ok(ListedModel {
                index,
                kind: ModelKind::classify(&name),
                name,
            })
        })
        .collect::<IResult<Vec<_>>>()?;

    if json {
        serde_json::to_writer_pretty(io::stdout().lock(), &models)
            .map_err(|e| ArchiveError::SinkUnwritable(e.into()))?;
        println!();
    } else {
        println!("{} models:", files.gma.path().display());
        for model in &models {
            println!("{}", model.name);
        }
    }

    Ok(())
}

fn extract(name: &Path, selection: Selection) -> Result<(), Report<ArchiveError>> {
    let files = MappedPair::open(name)?;
    let pair = ArchivePair::parse(&files.gma, &files.tpl)?;

    for model in select_models(&pair.gma, &selection)? {
        let mut gma = Vec::new();
        let mut tpl = Vec::new();
        let summary = extract_model(
            &pair,
            model.logical,
            model.stored_name,
            &mut gma,
            &mut tpl,
        )?;

        let out = stem_with(name, "_", &model.suffix);
        write_pair(&out, &gma, &tpl)?;

        match &model.kind {
            ModelKind::Goal(Recognized::Known(color)) => {
                println!("{} ({color}) saved to {}", model.name, out.display())
            }
            _ => println!("{} saved to {}", model.name, out.display()),
        }
        info!(
            model = %summary.model_name,
            textures = summary.texture_count,
            "extracted"
        );
    }

    Ok(())
}

fn merge(first: &Path, second: &Path) -> Result<(), Report<ArchiveError>> {
    let files_a = MappedPair::open(first)?;
    let files_b = MappedPair::open(second)?;
    let a = ArchivePair::parse(&files_a.gma, &files_a.tpl)?;
    let b = ArchivePair::parse(&files_b.gma, &files_b.tpl)?;

    println!(
        "Merging GMAs and TPLs {} and {}...",
        first.display(),
        second.display()
    );

    let mut gma = Vec::new();
    let mut tpl = Vec::new();
    let summary = merge_archives(&a, &b, &mut gma, &mut tpl)?;

    let second_name = second
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let out = stem_with(first, "+", &second_name);
    write_pair(&out, &gma, &tpl)?;

    println!("Writing to {}", with_suffix(&out, "gma").display());
    info!(
        models = summary.model_slot_count,
        textures = summary.texture_count,
        "merged"
    );

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let result = match args.command {
        Command::List { name, json } => list(&name, json),
        Command::Goals { name } => extract(&name, Selection::Goals),
        Command::Switches { name } => extract(&name, Selection::Switches),
        Command::Extract { name, model } => extract(&name, Selection::Model(model)),
        Command::Merge { first, second } => merge(&first, &second),
    };

    match result {
        Ok(()) => {
            println!("Done!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
