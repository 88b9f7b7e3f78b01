//! Command-line front-end for the search core.
//!
//! Thin wiring only: stdin/stdout and files on one side, library calls
//! on the other. Exit code 0 on success, non-zero on fatal errors.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

use openaleph_search::entity::Entity;
use openaleph_search::index::{format_entity, IndexAction, Indexer};
use openaleph_search::names::{
    index_name_keys, index_name_parts, name_symbols, phonetic_names, SymbolTable,
};
use openaleph_search::parse::{QueryParams, SearchQueryParser};
use openaleph_search::query::{EntitiesQuery, QueryBuilder};
use openaleph_search::schema::SchemaCatalog;
use openaleph_search::search::Executor;
use openaleph_search::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "openaleph-search", version, about = "Search tooling for FtM entities")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run searches against the cluster.
    Search {
        #[command(subcommand)]
        command: SearchCommand,
    },
    /// Transform entities into index actions and print them.
    FormatEntities {
        /// Dataset the entities belong to.
        #[arg(short = 'd', long)]
        dataset: String,
        /// Input file with one entity JSON per line, `-` for stdin.
        #[arg(short = 'i', long, default_value = "-")]
        input: String,
    },
    /// Index entities into the given dataset.
    IndexEntities {
        /// Dataset the entities belong to.
        #[arg(short = 'd', long)]
        dataset: String,
        /// Input file with one entity JSON per line, `-` for stdin.
        #[arg(short = 'i', long, default_value = "-")]
        input: String,
    },
    /// Index pre-built actions.
    IndexActions {
        /// Input file with one action JSON per line, `-` for stdin.
        #[arg(short = 'i', long, default_value = "-")]
        input: String,
    },
    /// Print the raw `_bulk` payload for entities without sending it.
    DumpActions {
        /// Dataset the entities belong to.
        #[arg(short = 'd', long)]
        dataset: String,
        /// Input file with one entity JSON per line, `-` for stdin.
        #[arg(short = 'i', long, default_value = "-")]
        input: String,
    },
    /// Print the derived name representations for raw names.
    Analyze {
        /// Representation to compute: name_keys, name_parts,
        /// name_phonetic or name_symbols.
        #[arg(long)]
        field: String,
        /// Schema driving the tokenizer rewrites.
        #[arg(long, default_value = "LegalEntity")]
        schema: String,
    },
}

#[derive(Debug, Subcommand)]
enum SearchCommand {
    /// Search with a `query_string` plus optional parser args.
    QueryString {
        /// The query text.
        q: String,
        /// Extra parser args in URL query-string form.
        #[arg(long)]
        args: Option<String>,
    },
    /// Build a request body from parser args and print it, or send a raw
    /// body from a file.
    Body {
        /// Input file with a complete request body, `-` for stdin.
        #[arg(short = 'i', long)]
        input: Option<String>,
        /// Parser args in URL query-string form; used when no body file
        /// is given, printing the built body instead of searching.
        #[arg(long)]
        args: Option<String>,
    },
}

fn open_input(path: &str) -> anyhow::Result<Box<dyn BufRead>> {
    if path == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(path).with_context(|| format!("cannot open {}", path))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_entities(path: &str) -> anyhow::Result<Vec<Entity>> {
    let mut entities = Vec::new();
    for line in open_input(path)?.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entities.push(Entity::from_json(&line).context("invalid entity JSON")?);
    }
    Ok(entities)
}

/// The wire form of an index action line.
#[derive(Debug, Deserialize)]
struct ActionLine {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    routing: String,
    #[serde(rename = "_source")]
    source: Value,
}

fn read_actions(path: &str) -> anyhow::Result<Vec<IndexAction>> {
    let mut actions = Vec::new();
    for line in open_input(path)?.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ActionLine =
            serde_json::from_str(&line).context("invalid action JSON")?;
        actions.push(IndexAction {
            index: parsed.index,
            id: parsed.id,
            routing: parsed.routing,
            source: parsed.source,
        });
    }
    Ok(actions)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();
    let catalog = SchemaCatalog::default_model();
    let symbols = SymbolTable::new();

    match cli.command {
        Command::Search { command } => match command {
            SearchCommand::QueryString { q, args } => {
                let executor = Executor::connect(settings)?;
                let response = executor
                    .search_query_string(&catalog, &q, args.as_deref(), None)
                    .await?;
                print_json(&response)?;
            }
            SearchCommand::Body { input, args } => match input {
                Some(path) => {
                    let mut raw = String::new();
                    open_input(&path)?.read_to_string(&mut raw)?;
                    let body: Value = serde_json::from_str(&raw).context("invalid body JSON")?;
                    let executor = Executor::connect(settings.clone())?;
                    let params =
                        QueryParams::from_query_string(args.as_deref().unwrap_or(""));
                    let parser = SearchQueryParser::parse(&params, None)?;
                    let query = EntitiesQuery::new(&settings, &catalog, &parser);
                    let response = executor
                        .transport()
                        .search(&query.index()?, None, &body)
                        .await?;
                    print_json(&response)?;
                }
                None => {
                    let params =
                        QueryParams::from_query_string(args.as_deref().unwrap_or(""));
                    let parser = SearchQueryParser::parse(&params, None)?;
                    let query = EntitiesQuery::new(&settings, &catalog, &parser);
                    print_json(&query.body()?)?;
                }
            },
        },
        Command::FormatEntities { dataset, input } => {
            for entity in read_entities(&input)? {
                if let Some(action) =
                    format_entity(&settings, &catalog, &symbols, &dataset, &entity)?
                {
                    print_json(&serde_json::json!({
                        "_index": action.index,
                        "_id": action.id,
                        "routing": action.routing,
                        "_source": action.source,
                    }))?;
                }
            }
        }
        Command::IndexEntities { dataset, input } => {
            let entities = read_entities(&input)?;
            let executor = Executor::connect(settings.clone())?;
            let indexer = Indexer::new(settings, executor.transport().clone());
            let stats = indexer
                .index_entities(&catalog, &symbols, &dataset, entities)
                .await?;
            tracing::info!(
                indexed = stats.indexed,
                conflicts = stats.conflicts,
                failed = stats.failures.len(),
                "done"
            );
            if !stats.failures.is_empty() {
                bail!("{} document(s) failed to index", stats.failures.len());
            }
        }
        Command::IndexActions { input } => {
            let actions = read_actions(&input)?;
            let executor = Executor::connect(settings.clone())?;
            let indexer = Indexer::new(settings, executor.transport().clone());
            let stats = indexer.index_actions(actions).await?;
            if !stats.failures.is_empty() {
                bail!("{} document(s) failed to index", stats.failures.len());
            }
        }
        Command::DumpActions { dataset, input } => {
            for entity in read_entities(&input)? {
                if let Some(action) =
                    format_entity(&settings, &catalog, &symbols, &dataset, &entity)?
                {
                    print_json(&action.meta())?;
                    print_json(&action.source)?;
                }
            }
        }
        Command::Analyze { field, schema } => {
            let schema = catalog.require(&schema)?;
            let stdin = io::stdin().lock();
            for line in stdin.lines() {
                let name = line?;
                if name.trim().is_empty() {
                    continue;
                }
                let values: Vec<String> = match field.as_str() {
                    "name_keys" => index_name_keys(schema, [name.as_str()])
                        .into_iter()
                        .collect(),
                    "name_parts" => index_name_parts(schema, [name.as_str()])
                        .into_iter()
                        .collect(),
                    "name_phonetic" => phonetic_names(schema, [name.as_str()])
                        .into_iter()
                        .collect(),
                    "name_symbols" => name_symbols(&symbols, schema, [name.as_str()])
                        .into_iter()
                        .collect(),
                    other => bail!("unknown field: {}", other),
                };
                println!("{}\t{}", name, values.join(" "));
            }
        }
    }
    Ok(())
}
