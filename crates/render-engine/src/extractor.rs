//! Bounded parallel audio extraction.
//!
//! Each segment's byte range is copied by its own task on a pool of at most
//! `min(max_workers, cores)` threads. Results land in a slot addressed by
//! submission index, so the joined buffer follows the segment order no
//! matter which task finishes first.

use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use autocut_common::error::{AutocutError, AutocutResult};
use autocut_common::memory::{ensure_memory_floor, MemoryProbe};
use autocut_timeline::Segment;

use crate::pcm::{PcmFormat, PcmSource};

/// Read-only PCM data addressable by byte range.
pub trait RangeSource: Send + Sync {
    fn format(&self) -> PcmFormat;

    /// Length of the sample data in bytes.
    fn data_len(&self) -> u64;

    fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>>;
}

impl RangeSource for PcmSource {
    fn format(&self) -> PcmFormat {
        PcmSource::format(self)
    }

    fn data_len(&self) -> u64 {
        PcmSource::data_len(self)
    }

    fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        PcmSource::read_range(self, range)
    }
}

/// Extracts segment audio from a shared source.
pub struct AudioExtractor<S: RangeSource> {
    source: Arc<S>,
    clip_origin: f64,
    max_workers: usize,
    memory: Arc<dyn MemoryProbe>,
    memory_floor_bytes: u64,
}

impl<S: RangeSource> Clone for AudioExtractor<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            clip_origin: self.clip_origin,
            max_workers: self.max_workers,
            memory: Arc::clone(&self.memory),
            memory_floor_bytes: self.memory_floor_bytes,
        }
    }
}

impl<S: RangeSource> AudioExtractor<S> {
    /// `clip_origin` is the absolute time of the source's first sample.
    pub fn new(
        source: Arc<S>,
        clip_origin: f64,
        max_workers: usize,
        memory: Arc<dyn MemoryProbe>,
        memory_floor_bytes: u64,
    ) -> Self {
        Self {
            source,
            clip_origin,
            max_workers,
            memory,
            memory_floor_bytes,
        }
    }

    pub fn format(&self) -> PcmFormat {
        self.source.format()
    }

    /// Threads used per batch.
    pub fn worker_count(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.max_workers.min(cores).max(1)
    }

    /// Byte ranges of `segments`, in order.
    pub fn byte_ranges(&self, segments: &[Segment]) -> Vec<Range<u64>> {
        let format = self.source.format();
        let data_len = self.source.data_len();
        segments
            .iter()
            .map(|segment| format.byte_range(segment, self.clip_origin, data_len))
            .collect()
    }

    /// Copy every segment and join the results in segment order.
    ///
    /// Memory is checked before any buffer is allocated.
    pub fn extract(&self, segments: &[Segment]) -> AutocutResult<Vec<u8>> {
        ensure_memory_floor(self.memory.as_ref(), self.memory_floor_bytes)?;

        let ranges = self.byte_ranges(segments);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count())
            .thread_name(|i| format!("autocut-extract-{i}"))
            .build()
            .map_err(|e| {
                AutocutError::Other(anyhow::anyhow!("failed to build worker pool: {e}"))
            })?;

        let mut slots: Vec<Option<io::Result<Vec<u8>>>> =
            (0..ranges.len()).map(|_| None).collect();
        let source = self.source.as_ref();
        pool.install(|| {
            slots
                .par_iter_mut()
                .zip(ranges.par_iter())
                .for_each(|(slot, range)| {
                    *slot = Some(source.read_range(range.clone()));
                });
        });

        let total: u64 = ranges.iter().map(|r| r.end - r.start).sum();
        let mut joined = Vec::with_capacity(total as usize);
        for slot in slots {
            match slot {
                Some(Ok(bytes)) => joined.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(AutocutError::Other(anyhow::anyhow!(
                        "extraction task produced no result"
                    )))
                }
            }
        }
        Ok(joined)
    }

    /// Extract `segments` into a 16-bit WAV at `path`. Returns the sample bytes written.
    pub fn write_batch(&self, segments: &[Segment], path: &Path) -> AutocutResult<u64> {
        let pcm = self.extract(segments)?;
        write_pcm_wav(path, self.source.format(), &pcm)?;
        tracing::debug!(
            path = %path.display(),
            segments = segments.len(),
            bytes = pcm.len(),
            "Wrote batch audio"
        );
        Ok(pcm.len() as u64)
    }
}

/// Write little-endian 16-bit samples as a WAV file.
pub fn write_pcm_wav(path: &Path, format: PcmFormat, pcm: &[u8]) -> AutocutResult<()> {
    let mut writer = hound::WavWriter::create(path, format.wav_spec()).map_err(hound_error)?;
    for sample in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
            .map_err(hound_error)?;
    }
    writer.finalize().map_err(hound_error)?;
    Ok(())
}

pub(crate) fn hound_error(e: hound::Error) -> AutocutError {
    match e {
        hound::Error::IoError(io) => AutocutError::Io(io),
        other => AutocutError::unsupported(format!("WAV: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autocut_common::memory::FixedMemory;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Each byte carries its frame index; ranges further in answer sooner.
    struct CountingSource {
        frames: u64,
        delay: bool,
    }

    impl RangeSource for CountingSource {
        fn format(&self) -> PcmFormat {
            PcmFormat {
                sample_rate: 10,
                channels: 1,
            }
        }

        fn data_len(&self) -> u64 {
            self.frames * 2
        }

        fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
            if self.delay {
                let wait = 200u64.saturating_sub(range.start) % 7;
                std::thread::sleep(Duration::from_millis(wait));
            }
            Ok((range.start..range.end).map(|b| (b / 2) as u8).collect())
        }
    }

    fn plenty() -> Arc<dyn MemoryProbe> {
        Arc::new(FixedMemory {
            available: Some(u64::MAX),
            total: None,
        })
    }

    fn extractor(workers: usize, delay: bool) -> AudioExtractor<CountingSource> {
        AudioExtractor::new(
            Arc::new(CountingSource { frames: 200, delay }),
            0.0,
            workers,
            plenty(),
            1,
        )
    }

    #[test]
    fn test_extract_in_submission_order() {
        let segments = vec![Segment::new(5.0, 5.2), Segment::new(0.0, 0.1), Segment::new(2.0, 2.1)];
        let bytes = extractor(4, true).extract(&segments).unwrap();
        assert_eq!(bytes, vec![50, 50, 51, 51, 0, 0, 20, 20]);
    }

    #[test]
    fn test_memory_floor_checked_first() {
        let low: Arc<dyn MemoryProbe> = Arc::new(FixedMemory {
            available: Some(10),
            total: None,
        });
        let extractor = AudioExtractor::new(
            Arc::new(CountingSource {
                frames: 10,
                delay: false,
            }),
            0.0,
            2,
            low,
            1024,
        );
        assert!(matches!(
            extractor.extract(&[Segment::new(0.0, 0.5)]),
            Err(AutocutError::InsufficientMemory { .. })
        ));
    }

    #[test]
    fn test_write_batch_round_trips_through_pcm_source() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        let format = PcmFormat {
            sample_rate: 10,
            channels: 2,
        };
        let samples: Vec<u8> = (0..40i16).flat_map(|s| s.to_le_bytes()).collect();
        write_pcm_wav(&clip, format, &samples).unwrap();

        let source = Arc::new(PcmSource::open(&clip).unwrap());
        let extractor = AudioExtractor::new(source, 100.0, 2, plenty(), 1);
        let batch = dir.path().join("batch_0000.wav");
        let written = extractor
            .write_batch(&[Segment::new(101.5, 101.7), Segment::new(100.0, 100.1)], &batch)
            .unwrap();
        assert_eq!(written, 12);

        let reader = hound::WavReader::open(&batch).unwrap();
        let out: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(out, vec![30, 31, 32, 33, 0, 1]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_order_independent_of_pool_size(
            spans in proptest::collection::vec((0u32..190, 0u32..10), 1..40),
            workers in 1usize..9,
        ) {
            let segments: Vec<Segment> = spans
                .iter()
                .map(|(start, len)| {
                    let s = *start as f64 / 10.0;
                    Segment::new(s, s + *len as f64 / 10.0)
                })
                .collect();

            let sequential: Vec<u8> = {
                let single = extractor(1, false);
                single
                    .byte_ranges(&segments)
                    .into_iter()
                    .flat_map(|r| (r.start..r.end).map(|b| (b / 2) as u8))
                    .collect()
            };
            let parallel = extractor(workers, true).extract(&segments).unwrap();
            prop_assert_eq!(parallel, sequential);
        }
    }
}
