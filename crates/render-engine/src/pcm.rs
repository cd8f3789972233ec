//! Random-access reads from a decoded PCM WAV file.
//!
//! The file is never loaded whole. Each read copies one byte range with a
//! positional read, so any number of threads can share one `PcmSource`.

use std::fs::File;
use std::io::{self, Read};
use std::ops::Range;
use std::path::{Path, PathBuf};

use autocut_common::error::{AutocutError, AutocutResult};
use autocut_timeline::Segment;

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Layout of interleaved signed 16-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const BYTES_PER_SAMPLE: u64 = 2;

    pub fn bytes_per_frame(&self) -> u64 {
        self.channels as u64 * Self::BYTES_PER_SAMPLE
    }

    /// Byte offset of `secs` relative to `origin`, clamped to `data_len`.
    ///
    /// Offsets land on frame boundaries:
    /// `round((secs - origin) * rate) * channels * 2`.
    pub fn byte_offset(&self, secs: f64, origin: f64, data_len: u64) -> u64 {
        let relative = (secs - origin).max(0.0);
        let frame = (relative * self.sample_rate as f64).round() as u64;
        (frame * self.bytes_per_frame()).min(data_len - data_len % self.bytes_per_frame())
    }

    /// Byte range covering `segment`, never inverted.
    pub fn byte_range(&self, segment: &Segment, origin: f64, data_len: u64) -> Range<u64> {
        let start = self.byte_offset(segment.start, origin, data_len);
        let end = self.byte_offset(segment.end, origin, data_len).max(start);
        start..end
    }

    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

/// Positional reader over the data chunk of a 16-bit PCM WAV file.
#[derive(Debug)]
pub struct PcmSource {
    path: PathBuf,
    file: File,
    format: PcmFormat,
    data_offset: u64,
    data_len: u64,
}

impl PcmSource {
    /// Open a WAV file and locate its sample data.
    pub fn open(path: &Path) -> AutocutResult<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let header = read_header(&mut file, file_len).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                AutocutError::unsupported(format!("{}: {e}", path.display()))
            }
            _ => AutocutError::Io(e),
        })?;

        if header.bits_per_sample != 16
            || !matches!(header.audio_format, WAVE_FORMAT_PCM | WAVE_FORMAT_EXTENSIBLE)
        {
            return Err(AutocutError::unsupported(format!(
                "{}: only 16-bit PCM is supported (format {}, {} bits)",
                path.display(),
                header.audio_format,
                header.bits_per_sample
            )));
        }
        if header.channels == 0 || header.sample_rate == 0 {
            return Err(AutocutError::unsupported(format!(
                "{}: empty channel layout or sample rate",
                path.display()
            )));
        }

        let source = Self {
            path: path.to_path_buf(),
            file,
            format: PcmFormat {
                sample_rate: header.sample_rate,
                channels: header.channels,
            },
            data_offset: header.data_offset,
            data_len: header.data_len,
        };
        tracing::debug!(
            path = %source.path.display(),
            sample_rate = source.format.sample_rate,
            channels = source.format.channels,
            data_bytes = source.data_len,
            "Opened PCM source"
        );
        Ok(source)
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duration of the sample data in seconds.
    pub fn duration_secs(&self) -> f64 {
        let frames = self.data_len / self.format.bytes_per_frame();
        frames as f64 / self.format.sample_rate as f64
    }

    /// Copy `range` (relative to the data chunk) out of the file.
    pub fn read_range(&self, range: Range<u64>) -> io::Result<Vec<u8>> {
        let end = range.end.min(self.data_len);
        let start = range.start.min(end);
        let mut buf = vec![0u8; (end - start) as usize];
        read_exact_at(&self.file, &mut buf, self.data_offset + start)?;
        Ok(buf)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            n => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

struct WavHeader {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: u64,
    data_len: u64,
}

/// Walk the RIFF chunks up to `data`.
fn read_header(file: &mut File, file_len: u64) -> io::Result<WavHeader> {
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());

    let mut riff = [0u8; 12];
    file.read_exact(&mut riff)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(invalid("not a RIFF/WAVE file"));
    }

    let mut pos = 12u64;
    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    loop {
        let mut chunk = [0u8; 8];
        file.read_exact(&mut chunk)?;
        pos += 8;
        let id = &chunk[0..4];
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as u64;

        if id == b"fmt " {
            if size < 16 {
                return Err(invalid("fmt chunk too short"));
            }
            let mut body = vec![0u8; size as usize];
            file.read_exact(&mut body)?;
            let u16_at = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
            let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
            fmt = Some((u16_at(0), u16_at(2), sample_rate, u16_at(14)));
            pos += size;
            if size % 2 == 1 {
                file.read_exact(&mut [0u8; 1])?;
                pos += 1;
            }
        } else if id == b"data" {
            let (audio_format, channels, sample_rate, bits_per_sample) =
                fmt.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
            // Streamed writers leave the size as a placeholder.
            let available = file_len.saturating_sub(pos);
            let data_len = if size == 0 || size == u32::MAX as u64 || size > available {
                available
            } else {
                size
            };
            return Ok(WavHeader {
                audio_format,
                channels,
                sample_rate,
                bits_per_sample,
                data_offset: pos,
                data_len,
            });
        } else {
            let skip = size + size % 2;
            io::copy(&mut file.by_ref().take(skip), &mut io::sink())?;
            pos += skip;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, format: PcmFormat, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, format.wav_spec()).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_byte_range_alignment_and_clamp() {
        let format = PcmFormat {
            sample_rate: 100,
            channels: 2,
        };
        let range = format.byte_range(&Segment::new(10.5, 10.75), 10.0, 1_000);
        assert_eq!(range, 200..300);

        let clamped = format.byte_range(&Segment::new(10.0, 99.0), 10.0, 1_002);
        assert_eq!(clamped, 0..1_000);

        let before_origin = format.byte_range(&Segment::new(9.0, 9.5), 10.0, 1_000);
        assert_eq!(before_origin, 0..0);
    }

    #[test]
    fn test_open_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let format = PcmFormat {
            sample_rate: 8,
            channels: 1,
        };
        let samples: Vec<i16> = (0..16).collect();
        write_wav(&path, format, &samples);

        let source = PcmSource::open(&path).unwrap();
        assert_eq!(source.format(), format);
        assert_eq!(source.data_len(), 32);
        assert!((source.duration_secs() - 2.0).abs() < 1e-12);

        let range = source.format().byte_range(&Segment::new(0.5, 1.0), 0.0, source.data_len());
        let bytes = source.read_range(range).unwrap();
        let decoded: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, vec![4, 5, 6, 7]);
    }

    #[test]
    fn test_rejects_non_16_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            PcmSource::open(&path),
            Err(AutocutError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();
        assert!(matches!(
            PcmSource::open(&path),
            Err(AutocutError::Unsupported { .. })
        ));
    }
}
