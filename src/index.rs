use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::audio::StereoAudio;
use crate::config::AnalysisParams;
use crate::fingerprint::Fingerprinter;
use crate::hashing::FingerprintRecord;

pub type TrackId = Arc<str>;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub offset: f64,
    pub track: TrackId,
}

/// Accumulates entries while a library is being fingerprinted.
#[derive(Debug)]
pub struct IndexBuilder {
    params: AnalysisParams,
    buckets: HashMap<u64, Vec<IndexEntry>>,
    tracks: BTreeSet<TrackId>,
    entries: usize,
}

impl IndexBuilder {
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            params,
            buckets: HashMap::new(),
            tracks: BTreeSet::new(),
            entries: 0,
        }
    }

    /// Tracks with no records are still listed by the finished index.
    pub fn add_records(&mut self, track: &str, records: &[FingerprintRecord]) {
        let track: TrackId = match self.tracks.get(track) {
            Some(existing) => Arc::clone(existing),
            None => {
                let track: TrackId = Arc::from(track);
                self.tracks.insert(Arc::clone(&track));
                track
            }
        };
        for record in records {
            self.buckets.entry(record.hash).or_default().push(IndexEntry {
                offset: record.offset,
                track: Arc::clone(&track),
            });
        }
        self.entries += records.len();
        debug!(track = %track, records = records.len(), "added to index");
    }

    /// Fingerprints both channels with `fingerprinter` and adds the result.
    /// The fingerprinter must run with this builder's parameters.
    pub fn add_audio(&mut self, track: &str, audio: &StereoAudio, fingerprinter: &Fingerprinter) {
        debug_assert_eq!(fingerprinter.params(), &self.params);
        let records = fingerprinter.fingerprint_audio(audio);
        self.add_records(track, &records);
    }

    pub fn finish(self) -> FingerprintIndex {
        FingerprintIndex {
            params: self.params,
            buckets: self.buckets,
            tracks: self.tracks.into_iter().collect(),
            entries: self.entries,
        }
    }
}

/// Read-only hash -> [(offset, track)] map. Entries under one hash keep
/// insertion order and duplicates are kept.
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    params: AnalysisParams,
    buckets: HashMap<u64, Vec<IndexEntry>>,
    tracks: Vec<TrackId>,
    entries: usize,
}

impl FingerprintIndex {
    pub fn lookup(&self, hash: u64) -> &[IndexEntry] {
        self.buckets.get(&hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    pub fn hash_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Track ids in ascending order.
    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = (u64, &[IndexEntry])> {
        self.buckets.iter().map(|(&hash, entries)| (hash, entries.as_slice()))
    }
}
