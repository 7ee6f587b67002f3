//! Duplicate review removal for CSV output
//!
//! Appending crawls can write the same review more than once. Records are
//! grouped by [`ReviewRecord::fingerprint`] and one record per group is kept.

use crate::extract::ReviewRecord;
use crate::storage::SinkResult;
use std::collections::HashMap;
use std::path::Path;

/// Which record of a duplicate group survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DedupeStrategy {
    /// Earliest occurrence
    #[default]
    First,
    /// Latest occurrence
    Last,
    /// Highest star rating, earliest on ties
    HighestRating,
    /// Most helpful votes, earliest on ties
    MostHelpful,
}

impl DedupeStrategy {
    fn prefers(self, candidate: &ReviewRecord, kept: &ReviewRecord) -> bool {
        match self {
            DedupeStrategy::First => false,
            DedupeStrategy::Last => true,
            DedupeStrategy::HighestRating => candidate.rating > kept.rating,
            DedupeStrategy::MostHelpful => {
                candidate.helpful_votes_count() > kept.helpful_votes_count()
            }
        }
    }
}

/// Keeps one record per fingerprint
///
/// Output order follows the first appearance of each fingerprint.
pub fn dedupe_records(records: Vec<ReviewRecord>, strategy: DedupeStrategy) -> Vec<ReviewRecord> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<ReviewRecord> = Vec::new();

    for record in records {
        let key = record.fingerprint();
        match slots.get(&key) {
            Some(&slot) => {
                if strategy.prefers(&record, &kept[slot]) {
                    kept[slot] = record;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

/// Duplicate counts for a record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateAnalysis {
    pub total: usize,
    pub unique: usize,
    pub duplicates: usize,

    /// Most repeated groups as (reviewer, occurrences), largest first
    pub top: Vec<(String, usize)>,
}

/// Counts duplicates, reporting at most `top_n` of the most repeated groups
pub fn analyze_duplicates(records: &[ReviewRecord], top_n: usize) -> DuplicateAnalysis {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        counts
            .entry(record.fingerprint())
            .or_insert((index, 0))
            .1 += 1;
    }

    let unique = counts.len();
    let mut repeated: Vec<(usize, usize)> = counts
        .into_values()
        .filter(|(_, count)| *count > 1)
        .collect();
    repeated.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let top = repeated
        .into_iter()
        .take(top_n)
        .map(|(index, count)| (records[index].reviewer.clone(), count))
        .collect();

    DuplicateAnalysis {
        total: records.len(),
        unique,
        duplicates: records.len() - unique,
        top,
    }
}

/// Reads `input`, removes duplicates and writes the survivors to `output`
///
/// `input` and `output` may be the same file.
pub fn dedupe_csv(
    input: &Path,
    output: &Path,
    strategy: DedupeStrategy,
) -> SinkResult<DuplicateAnalysis> {
    let mut reader = csv::Reader::from_path(input)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<ReviewRecord>, _>>()?;
    drop(reader);

    let analysis = analyze_duplicates(&records, 5);
    let kept = dedupe_records(records, strategy);

    let mut writer = csv::Writer::from_path(output)?;
    for record in &kept {
        writer.serialize(record)?;
    }
    writer.flush()?;

    tracing::info!(
        "Kept {} of {} reviews ({} duplicates removed)",
        kept.len(),
        analysis.total,
        analysis.duplicates
    );

    Ok(analysis)
}
