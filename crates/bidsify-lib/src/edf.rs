use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use edf_reader::file_reader::SyncFileReader;
use edf_reader::sync_reader::SyncEDFReader;
use std::fs;
use std::io::{Error, ErrorKind};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Label EDF+ reserves for the annotation signal.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

const MAIN_HEADER_LEN: usize = 256;
const START_DATE: Range<usize> = 168..176;
const START_TIME: Range<usize> = 176..184;
const HEADER_BYTES: Range<usize> = 184..192;
const RECORD_COUNT: Range<usize> = 236..244;
const RECORD_DURATION: Range<usize> = 244..252;
const SIGNAL_COUNT: Range<usize> = 252..256;
const TAL_DURATION: u8 = 0x15;
const TAL_SEPARATOR: u8 = 0x14;

/// EDF reader backend over a recording already loaded into memory.
struct MemoryFileReader {
    bytes: Arc<[u8]>,
}

impl SyncFileReader for MemoryFileReader {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, std::io::Error> {
        let start = usize::try_from(offset).map_err(|_| Error::from(ErrorKind::InvalidInput))?;
        let end = usize::try_from(length)
            .ok()
            .and_then(|len| start.checked_add(len))
            .ok_or_else(|| Error::from(ErrorKind::InvalidInput))?;
        self.bytes
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::new(ErrorKind::UnexpectedEof, "read past end of EDF data"))
    }
}

/// One signal described by the EDF header.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub label: String,
    /// Physical dimension as written in the header (e.g. `uV`).
    pub unit: String,
    pub prefilter: String,
    pub samples_per_record: u64,
}

impl ChannelInfo {
    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }
}

/// EDF+ annotation taken from a time-stamped annotation list.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Seconds relative to the recording start.
    pub onset: f64,
    pub duration: Option<f64>,
    pub description: String,
}

/// An EDF/EDF+ recording held fully in memory with its decoded header.
#[derive(Debug, Clone)]
pub struct Recording {
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
    pub channels: Vec<ChannelInfo>,
    pub record_count: u64,
    pub record_duration_s: f64,
    pub start: Option<NaiveDateTime>,
    pub annotations: Vec<Annotation>,
}

impl Recording {
    /// Read a recording from disk and decode its header.
    pub fn read(path: &Path) -> Result<Self> {
        let bytes: Arc<[u8]> = fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .into();
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(path: &Path, bytes: Arc<[u8]>) -> Result<Self> {
        let invalid = |reason: String| PipelineError::InvalidRecording {
            path: path.to_path_buf(),
            reason,
        };
        let layout = HeaderLayout::check(&bytes).map_err(invalid)?;
        // edf-reader needs whole-second records and a placeable date; both come from `layout`.
        let reader = SyncEDFReader::init_with_file_reader(MemoryFileReader {
            bytes: layout.normalized_header(&bytes).into(),
        })
        .map_err(|err| invalid(err.to_string()))?;
        let channels: Vec<ChannelInfo> = reader
            .edf_header
            .channels
            .iter()
            .map(|channel| ChannelInfo {
                label: channel.label.trim().to_string(),
                unit: channel.physical_dimension.trim().to_string(),
                prefilter: channel.prefiltering.trim().to_string(),
                samples_per_record: channel.number_of_samples_in_data_record,
            })
            .collect();
        let start = parse_start(
            &header_text(&bytes, START_DATE),
            &header_text(&bytes, START_TIME),
        );
        let annotations = read_annotations(&bytes, &channels, layout.record_count);
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            channels,
            record_count: layout.record_count,
            record_duration_s: layout.record_duration_s,
            start,
            annotations,
        })
    }

    /// Signals carrying samples, i.e. everything except the EDF+ annotation channel.
    pub fn data_channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.iter().filter(|channel| !channel.is_annotation())
    }

    pub fn channel_sfreq(&self, channel: &ChannelInfo) -> f64 {
        channel.samples_per_record as f64 / self.record_duration_s
    }

    /// Highest sampling rate among the data channels.
    pub fn sampling_frequency(&self) -> f64 {
        self.data_channels()
            .map(|channel| self.channel_sfreq(channel))
            .fold(0.0, f64::max)
    }

    pub fn duration_s(&self) -> f64 {
        self.record_count as f64 * self.record_duration_s
    }
}

/// Fixed header fields, validated so the header can be decoded without panicking.
#[derive(Debug, Clone, PartialEq)]
struct HeaderLayout {
    header_len: usize,
    record_count: u64,
    record_duration_s: f64,
    signal_count: usize,
}

impl HeaderLayout {
    fn check(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < MAIN_HEADER_LEN {
            return Err(format!(
                "file holds {} bytes, shorter than the {}-byte header",
                bytes.len(),
                MAIN_HEADER_LEN
            ));
        }
        number::<u64>(bytes, HEADER_BYTES, "header size")?;
        let record_count = number::<u64>(bytes, RECORD_COUNT, "number of data records")?;
        let record_duration_s = number::<f64>(bytes, RECORD_DURATION, "data record duration")?;
        if !(record_duration_s.is_finite() && record_duration_s > 0.0) {
            return Err(format!(
                "data record duration must be positive, found {}",
                record_duration_s
            ));
        }
        let signal_count = number::<usize>(bytes, SIGNAL_COUNT, "number of signals")?;
        if signal_count == 0 {
            return Err("header declares no signals".into());
        }
        let header_len = signal_count
            .checked_add(1)
            .and_then(|blocks| blocks.checked_mul(MAIN_HEADER_LEN))
            .filter(|len| *len <= bytes.len())
            .ok_or_else(|| {
                format!(
                    "header declares {} signals but the file holds {} bytes",
                    signal_count,
                    bytes.len()
                )
            })?;
        if !bytes[..header_len].is_ascii() {
            return Err("header contains non-ASCII characters".into());
        }
        let layout = Self {
            header_len,
            record_count,
            record_duration_s,
            signal_count,
        };
        layout.check_signals(bytes)?;
        Ok(layout)
    }

    /// Per-signal numeric fields, in header order after label, transducer and unit.
    fn check_signals(&self, bytes: &[u8]) -> Result<(), String> {
        let ns = self.signal_count;
        let mut offset = MAIN_HEADER_LEN + ns * (16 + 80 + 8);
        for name in ["physical minimum", "physical maximum"] {
            self.each_field(offset, |range| number::<f32>(bytes, range, name).map(drop))?;
            offset += ns * 8;
        }
        for name in ["digital minimum", "digital maximum"] {
            self.each_field(offset, |range| number::<i32>(bytes, range, name).map(drop))?;
            offset += ns * 8;
        }
        offset += ns * 80;
        self.each_field(offset, |range| {
            number::<u64>(bytes, range, "samples per data record").map(drop)
        })
    }

    fn each_field(
        &self,
        offset: usize,
        mut check: impl FnMut(Range<usize>) -> Result<(), String>,
    ) -> Result<(), String> {
        (0..self.signal_count).try_for_each(|idx| {
            let start = offset + idx * 8;
            check(start..start + 8)
        })
    }

    /// Header copy with a one-second record duration and no start date/time.
    fn normalized_header(&self, bytes: &[u8]) -> Vec<u8> {
        let mut header = bytes[..self.header_len].to_vec();
        header[START_DATE.start..START_TIME.end].fill(b' ');
        let mut duration = b"1".to_vec();
        duration.resize(RECORD_DURATION.len(), b' ');
        header[RECORD_DURATION].copy_from_slice(&duration);
        header
    }
}

fn number<T: FromStr>(bytes: &[u8], range: Range<usize>, name: &str) -> Result<T, String> {
    let text = header_text(bytes, range);
    text.parse()
        .map_err(|_| format!("invalid {} {:?} in header", name, text))
}

fn header_text(bytes: &[u8], range: Range<usize>) -> String {
    bytes
        .get(range)
        .map(|field| String::from_utf8_lossy(field).trim().to_string())
        .unwrap_or_default()
}

/// Parse the `dd.mm.yy` / `hh.mm.ss` header pair, applying the EDF 1985 clipping year.
pub fn parse_start(date: &str, time: &str) -> Option<NaiveDateTime> {
    let numbers = |text: &str| -> Option<Vec<u32>> {
        let parts: Vec<u32> = text
            .split('.')
            .map(|part| part.trim().parse().ok())
            .collect::<Option<_>>()?;
        (parts.len() == 3).then_some(parts)
    };
    let d = numbers(date)?;
    let t = numbers(time)?;
    let year = if d[2] > 84 { 1900 + d[2] } else { 2000 + d[2] };
    let date = NaiveDate::from_ymd_opt(year as i32, d[1], d[0])?;
    let time = NaiveTime::from_hms_opt(t[0], t[1], t[2])?;
    Some(NaiveDateTime::new(date, time))
}

fn read_annotations(bytes: &[u8], channels: &[ChannelInfo], record_count: u64) -> Vec<Annotation> {
    if !channels.iter().any(ChannelInfo::is_annotation) {
        return Vec::new();
    }
    let header_len = MAIN_HEADER_LEN * (channels.len() + 1);
    let record_len: usize = channels
        .iter()
        .map(|channel| channel.samples_per_record as usize * 2)
        .sum();
    if record_len == 0 {
        return Vec::new();
    }
    let available = bytes.len().saturating_sub(header_len) / record_len;
    let records = available.min(record_count as usize);
    let mut out = Vec::new();
    for record in 0..records {
        let mut offset = header_len + record * record_len;
        for channel in channels {
            let len = channel.samples_per_record as usize * 2;
            if channel.is_annotation() {
                out.extend(parse_tal_block(&bytes[offset..offset + len]));
            }
            offset += len;
        }
    }
    out
}

/// Decode one annotation-signal block into its annotations.
///
/// The leading timekeeping TAL of each data record carries no text and is skipped.
pub fn parse_tal_block(block: &[u8]) -> Vec<Annotation> {
    let mut out = Vec::new();
    for tal in block.split(|&byte| byte == 0).filter(|tal| !tal.is_empty()) {
        let mut parts = tal.split(|&byte| byte == TAL_SEPARATOR);
        let Some(timing) = parts.next() else {
            continue;
        };
        let mut timing = timing.splitn(2, |&byte| byte == TAL_DURATION);
        let Some(onset) = timing.next().and_then(parse_seconds) else {
            continue;
        };
        let duration = timing.next().and_then(parse_seconds);
        for text in parts.filter(|text| !text.is_empty()) {
            out.push(Annotation {
                onset,
                duration,
                description: String::from_utf8_lossy(text).trim().to_string(),
            });
        }
    }
    out
}

fn parse_seconds(raw: &[u8]) -> Option<f64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}
