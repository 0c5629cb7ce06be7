//! Best-hit reduction.
//!
//! Collapses all alignment records of a read into a single assignment. The
//! winner is the record with the highest bit score; ties go to the lower
//! e-value, then the higher identity, then whichever was seen first.

use crate::config::InputOrder;
use crate::io::alignment::AlignmentRecord;
use crate::pipeline::PipelineError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// The single best alignment chosen for one read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadAssignment {
    pub read_id: String,
    pub best: AlignmentRecord,
    /// Number of records seen for this read, the winner included
    pub candidates: usize,
}

impl ReadAssignment {
    fn new(record: AlignmentRecord) -> Self {
        ReadAssignment {
            read_id: record.read_id.clone(),
            best: record,
            candidates: 1,
        }
    }

    /// Offers another record of the same read; it replaces the current best
    /// only if it is strictly better.
    fn offer(&mut self, record: AlignmentRecord) {
        self.candidates += 1;
        if compare_hits(&record, &self.best) == Ordering::Greater {
            self.best = record;
        }
    }
}

/// Orders two hits of the same read; `Greater` means `a` is the better hit.
pub fn compare_hits(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    a.bit_score
        .total_cmp(&b.bit_score)
        .then_with(|| b.e_value.total_cmp(&a.e_value))
        .then_with(|| a.identity.total_cmp(&b.identity))
}

/// Streaming reducer for tables sorted by read id.
///
/// Holds only the group of the current read. Sorting makes every read's
/// records contiguous, so a read id smaller than the one before it means the
/// table is not sorted and is reported instead of being counted twice.
pub struct SortedBestHits<I> {
    records: I,
    source: PathBuf,
    current: Option<ReadAssignment>,
    finished: bool,
}

impl<I> SortedBestHits<I> {
    pub fn new(records: I, source: &Path) -> Self {
        SortedBestHits {
            records,
            source: source.to_path_buf(),
            current: None,
            finished: false,
        }
    }
}

impl<I> Iterator for SortedBestHits<I>
where
    I: Iterator<Item = Result<AlignmentRecord, PipelineError>>,
{
    type Item = Result<ReadAssignment, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.records.next() {
                None => {
                    self.finished = true;
                    return self.current.take().map(Ok);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(record)) => {
                    match self.current.as_mut() {
                        Some(group) if group.read_id == record.read_id => {
                            group.offer(record);
                            continue;
                        }
                        Some(group) if record.read_id < group.read_id => {
                            self.finished = true;
                            return Some(Err(PipelineError::parse(
                                &self.source,
                                format!(
                                    "read '{}' follows read '{}' but the table is not sorted by read id; \
                                     use unsorted input order",
                                    record.read_id, group.read_id
                                ),
                            )));
                        }
                        _ => {}
                    }
                    if let Some(done) = self.current.replace(ReadAssignment::new(record)) {
                        return Some(Ok(done));
                    }
                }
            }
        }
    }
}

/// Reducer for tables without ordering guarantees.
///
/// Drains its input on the first call to `next`, keeping one candidate per
/// read, then yields assignments in first-seen order.
pub struct BufferedBestHits<I> {
    records: Option<I>,
    assignments: Option<indexmap::map::IntoValues<String, ReadAssignment>>,
}

impl<I> BufferedBestHits<I> {
    pub fn new(records: I) -> Self {
        BufferedBestHits {
            records: Some(records),
            assignments: None,
        }
    }
}

impl<I> Iterator for BufferedBestHits<I>
where
    I: Iterator<Item = Result<AlignmentRecord, PipelineError>>,
{
    type Item = Result<ReadAssignment, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(records) = self.records.take() {
            let mut by_read: IndexMap<String, ReadAssignment> = IndexMap::new();
            for record in records {
                let record = match record {
                    Ok(record) => record,
                    Err(e) => return Some(Err(e)),
                };
                match by_read.get_mut(&record.read_id) {
                    Some(group) => group.offer(record),
                    None => {
                        by_read.insert(record.read_id.clone(), ReadAssignment::new(record));
                    }
                }
            }
            self.assignments = Some(by_read.into_values());
        }
        self.assignments.as_mut()?.next().map(Ok)
    }
}

/// Either reduction strategy, chosen by [`InputOrder`].
pub enum BestHits<I> {
    Sorted(SortedBestHits<I>),
    Buffered(BufferedBestHits<I>),
}

impl<I> Iterator for BestHits<I>
where
    I: Iterator<Item = Result<AlignmentRecord, PipelineError>>,
{
    type Item = Result<ReadAssignment, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BestHits::Sorted(inner) => inner.next(),
            BestHits::Buffered(inner) => inner.next(),
        }
    }
}

/// Reduces a record stream read from `source` to one [`ReadAssignment`] per
/// distinct read.
pub fn best_hits<I>(records: I, order: InputOrder, source: &Path) -> BestHits<I::IntoIter>
where
    I: IntoIterator<Item = Result<AlignmentRecord, PipelineError>>,
{
    match order {
        InputOrder::Sorted => BestHits::Sorted(SortedBestHits::new(records.into_iter(), source)),
        InputOrder::Unsorted => BestHits::Buffered(BufferedBestHits::new(records.into_iter())),
    }
}
