use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tripod::compose;
use tripod::core::error::Result;
use tripod::core::types::{TriplePattern, TriplePosition};
use tripod::rdf::ntriples::{self, DEFAULT_BASE_IRI};
use tripod::store::Store;

#[derive(Parser)]
#[command(name = "tripod", version, about = "Compact, updatable on-disk index for RDF triple sets")]
struct Cli {
    /// Show progress and diagnostics on stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a text triple dump (.nt/.nq) into a store directory
    Build {
        input: PathBuf,
        output: PathBuf,
        /// Base IRI for resolving relative IRIs
        #[arg(long, default_value = DEFAULT_BASE_IRI)]
        base_iri: String,
    },
    /// Combine sources: multiset union of additions minus subtractions
    Compose {
        /// Source to add (store directory or .nt/.nq file); repeatable
        #[arg(short = 'a', long = "add")]
        additions: Vec<PathBuf>,
        /// Source to subtract; repeatable
        #[arg(short = 's', long = "subtract")]
        subtractions: Vec<PathBuf>,
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_BASE_IRI)]
        base_iri: String,
    },
    /// Query a store
    #[command(subcommand)]
    Query(QueryCommands),
}

#[derive(Subcommand)]
enum QueryCommands {
    /// Triples matching a pattern; absent positions are wildcards
    Triples {
        store: PathBuf,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        predicate: Option<String>,
        #[arg(long)]
        object: Option<String>,
    },
    /// Stored terms with a given prefix
    Terms {
        store: PathBuf,
        #[arg(long, default_value = "")]
        prefix: String,
        /// Search the subject dictionary
        #[arg(long)]
        subjects: bool,
        /// Search the predicate dictionary
        #[arg(long)]
        predicates: bool,
        /// Search the object dictionary
        #[arg(long)]
        objects: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { input, output, base_iri } => {
            compose::build_from_text(&input, &output, &base_iri)
        }
        Commands::Compose { additions, subtractions, output, base_iri } => {
            compose::compose(&additions, &subtractions, &output, &base_iri)
        }
        Commands::Query(query) => match query {
            QueryCommands::Triples { store, subject, predicate, object } => {
                query_triples(&store, subject, predicate, object)
            }
            QueryCommands::Terms { store, prefix, subjects, predicates, objects } => {
                query_terms(&store, &prefix, subjects, predicates, objects)
            }
        },
    }
}

fn query_triples(
    dir: &PathBuf,
    subject: Option<String>,
    predicate: Option<String>,
    object: Option<String>,
) -> Result<()> {
    let mut store = Store::open(dir)?;
    store.ensure_all_dicts()?;

    // a bound term absent from its dictionary cannot match anything
    let mut pattern = TriplePattern::default();
    let bound = [
        (TriplePosition::Subject, subject),
        (TriplePosition::Predicate, predicate),
        (TriplePosition::Object, object),
    ];
    for (position, term) in bound {
        if let Some(term) = term {
            match store.dict(position)?.string_to_id(&term) {
                Ok(id) => pattern = with_term(pattern, position, id),
                Err(_) => return Ok(()),
            }
        }
    }

    let mut cursor = store.query(&pattern)?;
    let out = std::io::stdout();
    let mut lock = out.lock();
    use std::io::Write;
    while cursor.has_next() {
        let triple = cursor.read();
        cursor.proceed();
        let s = store.dict(TriplePosition::Subject)?.id_to_string(triple.subject)?;
        let p = store.dict(TriplePosition::Predicate)?.id_to_string(triple.predicate)?;
        let o = store.dict(TriplePosition::Object)?.id_to_string(triple.object)?;
        writeln!(
            lock,
            "{} {} {} .",
            ntriples::render_term(&s),
            ntriples::render_term(&p),
            ntriples::render_term(&o)
        )?;
    }
    Ok(())
}

fn with_term(mut pattern: TriplePattern, position: TriplePosition, id: u64) -> TriplePattern {
    match position {
        TriplePosition::Subject => pattern.subject = id,
        TriplePosition::Predicate => pattern.predicate = id,
        TriplePosition::Object => pattern.object = id,
    }
    pattern
}

fn query_terms(
    dir: &PathBuf,
    prefix: &str,
    subjects: bool,
    predicates: bool,
    objects: bool,
) -> Result<()> {
    let mut store = Store::open(dir)?;

    // no flags means all positions
    let all = !(subjects || predicates || objects);
    let mut positions = Vec::new();
    if subjects || all {
        positions.push(TriplePosition::Subject);
    }
    if predicates || all {
        positions.push(TriplePosition::Predicate);
    }
    if objects || all {
        positions.push(TriplePosition::Object);
    }
    for &position in &positions {
        store.ensure_dict(position)?;
    }

    let out = std::io::stdout();
    let mut lock = out.lock();
    use std::io::Write;
    for term in store.terms_any(prefix, &positions)? {
        writeln!(lock, "{}", term)?;
    }
    Ok(())
}
