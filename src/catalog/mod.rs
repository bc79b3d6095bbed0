//! Catalog feed parsing and product-ID selection

use std::collections::{BTreeSet, HashSet};

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::io::AsyncBufRead;

use crate::http::FetchError;

/// Where the candidate product IDs come from for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Every code in the catalog feed, optionally sampled down to `limit`
    Catalog { limit: Option<usize> },
    /// A configured list; any limit is ignored
    Explicit(Vec<String>),
}

/// Namespace-qualified XML element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTag {
    pub namespace: String,
    pub local: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("sample larger than population: requested {requested}, catalog has {available}")]
    SampleTooLarge { requested: usize, available: usize },

    #[error("failed to fetch catalog feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("malformed catalog feed: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Collects the text of every element matching `tag`, reading the feed as
/// it streams in.
pub async fn read_catalog_codes<R>(feed: R, tag: &QualifiedTag) -> Result<HashSet<String>, ResolveError>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = NsReader::from_reader(feed);
    let mut buf = Vec::new();
    let mut codes = HashSet::new();
    let mut current: Option<String> = None;

    loop {
        let (ns, event) = reader.read_resolved_event_into_async(&mut buf).await?;
        match event {
            Event::Start(start) => {
                let in_namespace = matches!(
                    ns,
                    ResolveResult::Bound(Namespace(uri)) if uri == tag.namespace.as_bytes()
                );
                if in_namespace && start.local_name().as_ref() == tag.local.as_bytes() {
                    current = Some(String::new());
                }
            }
            Event::Text(text) => {
                if let Some(code) = current.as_mut() {
                    code.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(code) = current.as_mut() {
                    code.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if let Some(code) = current.take() {
                    let code = code.trim();
                    if !code.is_empty() {
                        codes.insert(code.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(codes)
}

/// Draws `limit` distinct codes uniformly at random.
pub fn sample_codes<R: Rng + ?Sized>(
    codes: &HashSet<String>,
    limit: usize,
    rng: &mut R,
) -> Result<HashSet<String>, ResolveError> {
    if limit > codes.len() {
        return Err(ResolveError::SampleTooLarge {
            requested: limit,
            available: codes.len(),
        });
    }

    // Sorted first so a seeded rng gives the same sample on every platform
    let mut population: Vec<&String> = codes.iter().collect();
    population.sort();

    Ok(population
        .choose_multiple(rng, limit)
        .map(|code| (*code).clone())
        .collect())
}

/// [`sample_codes`] with the thread-local generator.
pub fn sample_codes_randomly(
    codes: &HashSet<String>,
    limit: usize,
) -> Result<HashSet<String>, ResolveError> {
    sample_codes(codes, limit, &mut rand::thread_rng())
}

/// Candidates minus already-processed IDs, deduplicated and sorted.
pub fn remaining_ids<I>(candidates: I, processed: Option<&HashSet<String>>) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    candidates
        .into_iter()
        .filter(|id| processed.is_none_or(|done| !done.contains(id)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
