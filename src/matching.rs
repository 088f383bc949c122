use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::audio::StereoAudio;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprinter;
use crate::hashing::FingerprintRecord;
use crate::index::{FingerprintIndex, TrackId};

/// How a query that produces the same hash more than once votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateHashPolicy {
    /// Only the last offset seen for a hash votes.
    #[default]
    LastWins,
    /// Every occurrence votes on its own.
    RetainAll,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub duplicates: DuplicateHashPolicy,
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub best_track: Option<TrackId>,
    pub votes: u32,
    /// Where in the best track the query starts, in seconds.
    pub offset: Option<f64>,
    /// Number of (query hash, index entry) pairs that voted.
    pub candidates: usize,
    pub elapsed: Duration,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.best_track.is_some()
    }
}

/// votes[track][relative offset in frames]
#[derive(Debug, Default)]
struct VoteHistogram {
    votes: BTreeMap<TrackId, BTreeMap<i64, u32>>,
    candidates: usize,
}

impl VoteHistogram {
    fn add(&mut self, track: &TrackId, relative_frames: i64) {
        *self
            .votes
            .entry(TrackId::clone(track))
            .or_default()
            .entry(relative_frames)
            .or_default() += 1;
        self.candidates += 1;
    }

    fn merge(mut self, other: VoteHistogram) -> VoteHistogram {
        for (track, offsets) in other.votes {
            let per_track = self.votes.entry(track).or_default();
            for (offset, count) in offsets {
                *per_track.entry(offset).or_default() += count;
            }
        }
        self.candidates += other.candidates;
        self
    }

    /// Strictly highest bucket. Tracks and offsets are visited in ascending order and
    /// the first bucket reaching the maximum keeps it, so ties go to the lowest track
    /// id and then the lowest offset.
    fn best(&self) -> Option<(&TrackId, i64, u32)> {
        let mut best: Option<(&TrackId, i64, u32)> = None;
        for (track, offsets) in &self.votes {
            for (&offset, &count) in offsets {
                if best.is_none_or(|(_, _, top)| count > top) {
                    best = Some((track, offset, count));
                }
            }
        }
        best
    }
}

/// Resolves queries against one immutable index.
pub struct Matcher<'a> {
    index: &'a FingerprintIndex,
    fingerprinter: Fingerprinter,
    options: MatchOptions,
}

impl<'a> Matcher<'a> {
    pub fn new(
        index: &'a FingerprintIndex,
        fingerprinter: Fingerprinter,
        options: MatchOptions,
    ) -> Result<Self> {
        if fingerprinter.params() != index.params() {
            return Err(Error::ParamsMismatch {
                stored: index.params().encode(),
                expected: fingerprinter.params().encode(),
            });
        }
        Ok(Self {
            index,
            fingerprinter,
            options,
        })
    }

    pub fn identify(&self, audio: &StereoAudio) -> Result<MatchResult> {
        let start = Instant::now();
        let records = self.fingerprinter.fingerprint_audio(audio);
        info!(
            hashes = records.len(),
            seconds = audio.duration_secs(),
            "fingerprinted query"
        );
        let mut result = self.match_records(&records)?;
        result.elapsed = start.elapsed();
        Ok(result)
    }

    pub fn match_records(&self, records: &[FingerprintRecord]) -> Result<MatchResult> {
        let start = Instant::now();
        let query = self.query_lookup(records);
        let frame_duration = self.index.params().frame_duration();
        let deadline = self.options.deadline;

        let histogram = query
            .par_iter()
            .try_fold(VoteHistogram::default, |mut histogram, &(hash, query_offset)| {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(Error::DeadlineExceeded);
                }
                for entry in self.index.lookup(hash) {
                    let relative = entry.offset - query_offset;
                    let relative_frames = (relative / frame_duration).round() as i64;
                    histogram.add(&entry.track, relative_frames);
                }
                Ok(histogram)
            })
            .try_reduce(VoteHistogram::default, |a, b| Ok(a.merge(b)))?;

        debug!(candidates = histogram.candidates, "possible hash matches");

        let (best_track, votes, offset) = match histogram.best() {
            Some((track, frames, count)) => (
                Some(TrackId::clone(track)),
                count,
                Some(frames as f64 * frame_duration),
            ),
            None => (None, 0, None),
        };

        Ok(MatchResult {
            best_track,
            votes,
            offset,
            candidates: histogram.candidates,
            elapsed: start.elapsed(),
        })
    }

    /// Fresh per call; never shared between queries.
    fn query_lookup(&self, records: &[FingerprintRecord]) -> Vec<(u64, f64)> {
        match self.options.duplicates {
            DuplicateHashPolicy::LastWins => {
                let mut last: HashMap<u64, f64> = HashMap::with_capacity(records.len());
                for record in records {
                    last.insert(record.hash, record.offset);
                }
                last.into_iter().collect()
            }
            DuplicateHashPolicy::RetainAll => {
                records.iter().map(|r| (r.hash, r.offset)).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisParams;
    use crate::fingerprint::test_signals::{excerpt, melody, silence};
    use crate::index::IndexBuilder;
    use std::collections::HashSet;

    fn frames(k: i64) -> f64 {
        k as f64 * AnalysisParams::default().frame_duration()
    }

    fn record(hash: u64, frame: i64) -> FingerprintRecord {
        FingerprintRecord {
            hash,
            offset: frames(frame),
        }
    }

    fn fingerprinter() -> Fingerprinter {
        Fingerprinter::new(AnalysisParams::default()).unwrap()
    }

    fn index_of(tracks: &[(&str, &[FingerprintRecord])]) -> FingerprintIndex {
        let mut builder = IndexBuilder::new(AnalysisParams::default());
        for (name, records) in tracks {
            builder.add_records(name, records);
        }
        builder.finish()
    }

    fn matcher(index: &FingerprintIndex, duplicates: DuplicateHashPolicy) -> Matcher<'_> {
        let options = MatchOptions {
            duplicates,
            deadline: None,
        };
        Matcher::new(index, fingerprinter(), options).unwrap()
    }

    #[test]
    fn aligned_hashes_pick_the_track() {
        let index = index_of(&[
            ("song", &[record(1, 10), record(2, 12), record(3, 15)]),
            ("other", &[record(1, 40), record(2, 3), record(9, 1)]),
        ]);
        let query = [record(1, 0), record(2, 2), record(3, 5)];

        let result = matcher(&index, DuplicateHashPolicy::LastWins)
            .match_records(&query)
            .unwrap();
        assert_eq!(result.best_track.as_deref(), Some("song"));
        assert_eq!(result.votes, 3);
        assert!((result.offset.unwrap() - frames(10)).abs() < 1e-9);
        assert_eq!(result.candidates, 5);
    }

    #[test]
    fn no_shared_hashes_is_no_match() {
        let index = index_of(&[("song", &[record(1, 0)])]);
        let result = matcher(&index, DuplicateHashPolicy::LastWins)
            .match_records(&[record(2, 0)])
            .unwrap();
        assert!(!result.is_match());
        assert_eq!(result.votes, 0);
        assert_eq!(result.offset, None);
        assert_eq!(result.candidates, 0);
    }

    #[test]
    fn ties_go_to_the_lowest_track_then_lowest_offset() {
        // both tracks get exactly two votes; "alpha" has two tied offsets
        let index = index_of(&[
            ("zeta", &[record(1, 5), record(2, 6)]),
            ("alpha", &[record(1, 9), record(2, 10), record(3, 4), record(4, 5)]),
        ]);
        let query = [record(1, 0), record(2, 1), record(3, 0), record(4, 1)];

        for _ in 0..20 {
            let result = matcher(&index, DuplicateHashPolicy::LastWins)
                .match_records(&query)
                .unwrap();
            assert_eq!(result.best_track.as_deref(), Some("alpha"));
            assert_eq!(result.votes, 2);
            assert!((result.offset.unwrap() - frames(4)).abs() < 1e-9);
        }
    }

    #[test]
    fn duplicate_query_hashes_follow_policy() {
        let index = index_of(&[("song", &[record(7, 5), record(7, 6)])]);
        let query = [record(7, 1), record(7, 2)];

        // only offset 2 votes: relative offsets 3 and 4, one vote each
        let last = matcher(&index, DuplicateHashPolicy::LastWins)
            .match_records(&query)
            .unwrap();
        assert_eq!(last.votes, 1);
        assert_eq!(last.candidates, 2);
        assert!((last.offset.unwrap() - frames(3)).abs() < 1e-9);

        // both vote: relative offset 4 is reached from (5, 1) and (6, 2)
        let all = matcher(&index, DuplicateHashPolicy::RetainAll)
            .match_records(&query)
            .unwrap();
        assert_eq!(all.votes, 2);
        assert_eq!(all.candidates, 4);
        assert!((all.offset.unwrap() - frames(4)).abs() < 1e-9);
    }

    #[test]
    fn passed_deadline_aborts() {
        let index = index_of(&[("song", &[record(1, 0)])]);
        let options = MatchOptions {
            duplicates: DuplicateHashPolicy::LastWins,
            deadline: Some(Instant::now()),
        };
        let matcher = Matcher::new(&index, fingerprinter(), options).unwrap();
        let err = matcher.match_records(&[record(1, 0)]).unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[test]
    fn mismatched_params_are_rejected() {
        let index = index_of(&[]);
        let params = AnalysisParams {
            peak_block_size: 20,
            ..AnalysisParams::default()
        };
        let result = Matcher::new(
            &index,
            Fingerprinter::new(params).unwrap(),
            MatchOptions::default(),
        );
        assert!(matches!(result, Err(Error::ParamsMismatch { .. })));
    }

    fn audio_index(tracks: &[(&str, &StereoAudio)]) -> FingerprintIndex {
        let fingerprinter = fingerprinter();
        let mut builder = IndexBuilder::new(AnalysisParams::default());
        for (name, audio) in tracks {
            builder.add_audio(name, audio, &fingerprinter);
        }
        builder.finish()
    }

    #[test]
    fn clean_excerpt_is_recovered() {
        let params = AnalysisParams::default();
        let a = melody(1, 20.0);
        let b = melody(2, 20.0);
        let c = melody(3, 20.0);
        let index = audio_index(&[("a", &a), ("b", &b), ("c", &c)]);

        // start on a peak-block boundary so the excerpt's blocks line up with the track's
        let block_samples = params.peak_block_size * params.hop_size;
        let start_block = 3;
        let clip = excerpt(&b, start_block * block_samples, 5 * block_samples);

        let result = matcher(&index, DuplicateHashPolicy::LastWins)
            .identify(&clip)
            .unwrap();
        assert_eq!(result.best_track.as_deref(), Some("b"));

        let expected_offset =
            (start_block * params.peak_block_size) as f64 * params.frame_duration();
        assert!((result.offset.unwrap() - expected_offset).abs() < 1e-6);

        // most of the clip's distinct hashes line up on the winning offset
        let query_hashes = fingerprinter().fingerprint_audio(&clip);
        let distinct: HashSet<u64> = query_hashes.iter().map(|r| r.hash).collect();
        assert!(result.votes as usize * 2 > distinct.len());
    }

    #[test]
    fn silence_matches_nothing() {
        let a = melody(4, 8.0);
        let index = audio_index(&[("a", &a)]);
        let result = matcher(&index, DuplicateHashPolicy::LastWins)
            .identify(&silence(4.0))
            .unwrap();
        assert_eq!(result.best_track, None);
        assert_eq!(result.votes, 0);

        let empty = index_of(&[]);
        let result = matcher(&empty, DuplicateHashPolicy::RetainAll)
            .identify(&a)
            .unwrap();
        assert!(!result.is_match());
        assert_eq!(result.votes, 0);
    }

    #[test]
    fn silence_does_not_match_a_silent_lead_in() {
        let quiet = silence(3.0);
        let song = melody(9, 6.0);
        let lead_in = StereoAudio::new(
            quiet.sample_rate,
            [quiet.left.as_slice(), song.left.as_slice()].concat(),
            [quiet.right.as_slice(), song.right.as_slice()].concat(),
        );
        let index = audio_index(&[("leadin", &lead_in), ("other", &melody(10, 6.0))]);
        assert!(!index.is_empty());

        let result = matcher(&index, DuplicateHashPolicy::RetainAll)
            .identify(&silence(4.0))
            .unwrap();
        assert_eq!(result.best_track, None);
        assert_eq!(result.votes, 0);
        assert_eq!(result.candidates, 0);
    }

    #[test]
    fn build_order_does_not_change_the_result() {
        let a = melody(5, 10.0);
        let b = melody(6, 10.0);
        let forward = audio_index(&[("a", &a), ("b", &b)]);
        let backward = audio_index(&[("b", &b), ("a", &a)]);

        let params = AnalysisParams::default();
        let block_samples = params.peak_block_size * params.hop_size;
        let clip = excerpt(&a, block_samples, 4 * block_samples);

        for policy in [DuplicateHashPolicy::LastWins, DuplicateHashPolicy::RetainAll] {
            let x = matcher(&forward, policy).identify(&clip).unwrap();
            let y = matcher(&backward, policy).identify(&clip).unwrap();
            assert_eq!(x.best_track, y.best_track);
            assert_eq!(x.votes, y.votes);
            assert_eq!(x.offset, y.offset);
            assert_eq!(x.candidates, y.candidates);
        }
    }
}
