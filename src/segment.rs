use chrono::{serde::ts_seconds, DateTime, Utc};
use log::{debug, warn};
use memmap::Mmap;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{
    encode::{decode_points, encode_points, EncodeStrategy},
    metric::{DataPoint, SeriesId},
};

pub const DATA_FILE_NAME: &str = "data";
pub const META_FILE_NAME: &str = "meta.json";

const SEGMENT_PREFIX: &str = "seg-";
const TMP_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum Error {
    #[error("error accessing segment file")]
    FileError(#[from] io::Error),
    #[error("error unmarshaling meta.json")]
    UnmarshalMetaFileError(#[from] serde_json::Error),
    #[error("chunk {start}..{end} is outside of the {len} byte data file")]
    ChunkOutOfBounds { start: usize, end: usize, len: usize },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub name: String,
    pub key: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub num_data_points: usize,
    pub encode_strategy: EncodeStrategy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub sequence: u64,
    pub num_data_points: usize,
    pub chunks: Vec<ChunkMetadata>,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
}

// Immutable set of data points flushed together. The `data` file holds one
// chunk per series, `meta.json` describes where each chunk lives.
pub struct Segment {
    metadata: SegmentMetadata,
    mapped_file: Option<Mmap>,
}

impl Segment {
    pub fn sequence(&self) -> u64 {
        self.metadata.sequence
    }

    pub fn num_data_points(&self) -> usize {
        self.metadata.num_data_points
    }

    /// Decodes every chunk in the order it was written.
    pub fn read_chunks(&self) -> Result<Vec<(SeriesId, Vec<DataPoint>)>, Error> {
        self.metadata
            .chunks
            .iter()
            .map(|chunk| {
                let points = self.read_chunk(chunk)?;
                Ok((SeriesId::new(&chunk.name, &chunk.key), points))
            })
            .collect()
    }

    fn read_chunk(&self, chunk: &ChunkMetadata) -> Result<Vec<DataPoint>, Error> {
        if chunk.num_data_points == 0 {
            return Ok(vec![]);
        }
        let data: &[u8] = match &self.mapped_file {
            Some(mmap) => &mmap[..],
            None => &[],
        };
        if chunk.start_offset > chunk.end_offset || chunk.end_offset > data.len() {
            return Err(Error::ChunkOutOfBounds {
                start: chunk.start_offset,
                end: chunk.end_offset,
                len: data.len(),
            });
        }
        let points = decode_points(
            &data[chunk.start_offset..chunk.end_offset],
            chunk.num_data_points,
            chunk.encode_strategy,
        )?;
        Ok(points)
    }
}

pub fn get_dir_path(data_path: &Path, sequence: u64) -> PathBuf {
    data_path.join(format!("{}{}", SEGMENT_PREFIX, sequence))
}

fn parse_sequence(file_name: &str) -> Option<u64> {
    file_name.strip_prefix(SEGMENT_PREFIX)?.parse().ok()
}

pub fn open(dir_path: &Path) -> Result<Segment, Error> {
    let meta_file = File::open(dir_path.join(META_FILE_NAME))?;
    let metadata: SegmentMetadata = serde_json::from_reader(BufReader::new(meta_file))?;

    let data = File::open(dir_path.join(DATA_FILE_NAME))?;
    let mapped_file = match data.metadata()?.len() {
        // Zero-length files can't be mapped.
        0 => None,
        // N.B. has to be unsafe because the memory mapped file contents can change
        // underneath the running program. Segments are never rewritten once renamed
        // into place.
        _ => Some(unsafe { Mmap::map(&data)? }),
    };

    Ok(Segment {
        metadata,
        mapped_file,
    })
}

/// Opens every segment under `data_path`, ordered by sequence number.
/// Leftovers of interrupted flushes are removed.
pub fn open_all(data_path: &Path) -> Result<Vec<Segment>, Error> {
    fs::create_dir_all(data_path)?;

    let mut dirs: Vec<(u64, PathBuf)> = vec![];
    for entry in fs::read_dir(data_path)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(SEGMENT_PREFIX) && file_name.ends_with(TMP_SUFFIX) {
            warn!("removing incomplete segment {:?}", entry.path());
            fs::remove_dir_all(entry.path())?;
            continue;
        }
        if let Some(sequence) = parse_sequence(&file_name) {
            dirs.push((sequence, entry.path()));
        }
    }
    dirs.sort_by_key(|(sequence, _)| *sequence);

    dirs.iter()
        .map(|(_, path)| {
            let segment = open(path)?;
            debug!(
                "opened segment {:?} with {} data points",
                path,
                segment.num_data_points()
            );
            Ok(segment)
        })
        .collect()
}

/// Writes `chunks` as segment `sequence`. The segment is assembled in a
/// temporary directory and renamed into place once complete.
pub fn write(
    data_path: &Path,
    sequence: u64,
    chunks: &[(SeriesId, Vec<DataPoint>)],
    encode_strategy: EncodeStrategy,
) -> Result<PathBuf, Error> {
    let dir_path = get_dir_path(data_path, sequence);
    let tmp_path =
        dir_path.with_file_name(format!("{}{}{}", SEGMENT_PREFIX, sequence, TMP_SUFFIX));
    if tmp_path.exists() {
        fs::remove_dir_all(&tmp_path)?;
    }
    fs::create_dir_all(&tmp_path)?;

    let data = File::create(tmp_path.join(DATA_FILE_NAME))?;
    let mut writer = BufWriter::new(data);
    let mut offset = 0;
    let mut num_data_points = 0;
    let mut chunk_metadata = Vec::with_capacity(chunks.len());
    let mut buf = Vec::new();
    for (id, data_points) in chunks {
        let strategy = encode_strategy.for_points(data_points);
        buf.clear();
        encode_points(&mut buf, data_points, strategy)?;
        writer.write_all(&buf)?;

        chunk_metadata.push(ChunkMetadata {
            name: id.name.clone(),
            key: id.key.clone(),
            start_offset: offset,
            end_offset: offset + buf.len(),
            num_data_points: data_points.len(),
            encode_strategy: strategy,
        });
        offset += buf.len();
        num_data_points += data_points.len();
    }
    let data = writer.into_inner().map_err(|e| e.into_error())?;
    data.sync_all()?;

    let metadata = SegmentMetadata {
        sequence,
        num_data_points,
        chunks: chunk_metadata,
        created_at: Utc::now(),
    };
    let mut meta = File::create(tmp_path.join(META_FILE_NAME))?;
    meta.write_all(serde_json::to_string(&metadata)?.as_bytes())?;
    meta.sync_all()?;

    fs::rename(&tmp_path, &dir_path)?;
    sync_dir(data_path)?;
    Ok(dir_path)
}

// The rename is only durable once the parent directory entry is synced.
#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
