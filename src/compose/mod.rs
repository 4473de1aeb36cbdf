pub mod merge;

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::info;

use crate::core::error::{Error, ErrorKind, Result};
use crate::dict::DictSet;
use crate::rdf::ntriples::{self, TextFormat};
use crate::store::Store;
use crate::triples::TripleLog;

/// What a source path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A store directory.
    Store,
    /// A text triple dump, format decided by extension.
    Text(TextFormat),
}

pub fn classify(path: &Path) -> Result<SourceKind> {
    if path.is_dir() {
        Ok(SourceKind::Store)
    } else if path.is_file() {
        Ok(SourceKind::Text(TextFormat::from_extension(path)?))
    } else {
        Err(Error::new(
            ErrorKind::NotFound,
            format!("source {} does not exist", path.display()),
        ))
    }
}

/// Convert a text triple dump into a fresh store: intern every term,
/// log the id triples, then emit the five orders and the dictionaries.
pub fn build_from_text(input: &Path, output: &Path, base_iri: &str) -> Result<()> {
    let format = TextFormat::from_extension(input)?;
    let mut dicts = DictSet::new();
    let mut log = TripleLog::new();
    ntriples::parse_file(input, format, base_iri, |s, p, o| {
        let si = dicts.subjects.add(s, 1)?;
        let pi = dicts.predicates.add(p, 1)?;
        let oi = dicts.objects.add(o, 1)?;
        log.add(si, pi, oi);
        Ok(())
    })?;
    info!(
        input = %input.display(),
        triples = log.len(),
        subjects = dicts.subjects.len(),
        predicates = dicts.predicates.len(),
        objects = dicts.objects.len(),
        "building store"
    );
    fs::create_dir_all(output)?;
    log.save(output, &dicts)?;
    dicts.save_all(output)?;
    Ok(())
}

/// Multiset compose: union of the additions minus the subtractions,
/// written to a fresh directory. All-or-nothing: the output directory
/// must not pre-exist and is removed again if the merge fails.
pub fn compose(
    additions: &[PathBuf],
    subtractions: &[PathBuf],
    output: &Path,
    base_iri: &str,
) -> Result<()> {
    if additions.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "compose needs at least one addition".to_string(),
        ));
    }
    if output.exists() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("output {} already exists", output.display()),
        ));
    }

    let add_kinds: Vec<SourceKind> = additions
        .iter()
        .map(|p| classify(p))
        .collect::<Result<_>>()?;
    let sub_kinds: Vec<SourceKind> = subtractions
        .iter()
        .map(|p| classify(p))
        .collect::<Result<_>>()?;

    if additions.len() == 1 && subtractions.is_empty() {
        return match add_kinds[0] {
            SourceKind::Text(_) => build_from_text(&additions[0], output, base_iri),
            SourceKind::Store => Err(Error::new(
                ErrorKind::InvalidInput,
                "composing a single store is a plain copy; nothing to do".to_string(),
            )),
        };
    }

    // Text sources become tempdir-backed intermediate stores first.
    let staging = TempDir::new()?;
    let add_dirs = stage(additions, &add_kinds, staging.path(), "add", base_iri)?;
    let sub_dirs = stage(subtractions, &sub_kinds, staging.path(), "sub", base_iri)?;

    let mut add_stores = Vec::with_capacity(add_dirs.len());
    for dir in &add_dirs {
        add_stores.push(Store::open(dir)?);
    }
    let mut sub_stores = Vec::with_capacity(sub_dirs.len());
    for dir in &sub_dirs {
        sub_stores.push(Store::open(dir)?);
    }

    fs::create_dir_all(output)?;
    info!(
        additions = add_stores.len(),
        subtractions = sub_stores.len(),
        output = %output.display(),
        "composing"
    );
    let merged = merge::merge_stores(add_stores, sub_stores, output);
    if merged.is_err() {
        let _ = fs::remove_dir_all(output);
    }
    merged
}

fn stage(
    sources: &[PathBuf],
    kinds: &[SourceKind],
    staging: &Path,
    tag: &str,
    base_iri: &str,
) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::with_capacity(sources.len());
    for (i, (path, kind)) in sources.iter().zip(kinds.iter()).enumerate() {
        match kind {
            SourceKind::Store => dirs.push(path.clone()),
            SourceKind::Text(_) => {
                let dir = staging.join(format!("{}-{}", tag, i));
                build_from_text(path, &dir, base_iri)?;
                dirs.push(dir);
            }
        }
    }
    Ok(dirs)
}
