use crate::{
    encode::EncodeStrategy,
    metric::{DataPoint, Row, SeriesId},
    segment,
    series::Series,
};
use dashmap::DashMap;
use log::{error, info};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct Config {
    // Persist data points under this directory. Without it the storage is
    // purely in memory.
    pub disk: Option<DiskConfig>,
    // Seconds between background flushes to disk.
    pub flush_interval: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct DiskConfig {
    // Path to where segments are stored.
    pub data_path: PathBuf,
    // Type of encoder for data point encoding when flushing to disk.
    pub encode_strategy: EncodeStrategy,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("disk config required when flush_interval is set")]
    DiskConfigError,
    #[error("data_path must not be empty")]
    EmptyDataPath,
    #[error("flush_interval must be greater than zero")]
    FlushIntervalError,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(disk) = &self.disk {
            if disk.data_path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyDataPath);
            }
        }
        if let Some(interval) = self.flush_interval {
            if self.disk.is_none() {
                return Err(ConfigError::DiskConfigError);
            }
            if interval == 0 {
                return Err(ConfigError::FlushIntervalError);
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("error validating config")]
    InvalidConfig(#[from] ConfigError),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("failed to open segments")]
    FailedOpen(#[source] segment::Error),
    #[error("failed to flush data points")]
    FailedFlush(#[source] segment::Error),
    #[error("failed to get series lock")]
    LockFailure,
}

pub struct Storage {
    inner: Arc<StorageInner>,
    shutdown: Arc<AtomicBool>,
}

impl Storage {
    pub fn new(config: Config) -> Result<Self, StorageError> {
        let oflush_interval = config.flush_interval;

        let storage = StorageInner::new(config)?;
        let inner = Arc::new(storage);
        let shutdown = Arc::new(AtomicBool::new(false));

        if let Some(flush_interval) = oflush_interval {
            let inner_clone = inner.clone();
            let shutdown_clone = shutdown.clone();
            std::thread::spawn(move || loop {
                std::thread::sleep(Duration::from_secs(flush_interval));
                if shutdown_clone.load(Ordering::SeqCst) {
                    break;
                }
                // Failed flushes leave the points pending for the next tick.
                if let Err(e) = inner_clone.flush() {
                    error!("error flushing data points: {}", e);
                }
            });
        }

        Ok(Self { inner, shutdown })
    }

    /// Appends a data point to the series identified by `row.name` and
    /// `row.key`, creating the series on first use.
    pub fn ingest(&self, row: &Row) -> Result<(), StorageError> {
        self.inner.ingest(row)
    }

    /// Returns every data point of the series in insertion order, or an
    /// empty vector when nothing was ever ingested under `(name, key)`.
    pub fn query(&self, name: &str, key: &str) -> Result<Vec<DataPoint>, StorageError> {
        self.inner.query(name, key)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.inner.flush()
    }

    pub fn series_count(&self) -> usize {
        self.inner.series.len()
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        self.inner.len()
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    pub fn close(&self) -> Result<(), StorageError> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.inner.flush()
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

type SeriesHandle = Arc<RwLock<Series>>;

struct StorageInner {
    series: DashMap<SeriesId, SeriesHandle>,
    disk_config: Option<DiskConfig>,
    next_sequence: AtomicU64,
    // Serializes flushes so two of them never write the same pending points.
    flush_lock: Mutex<()>,
}

impl StorageInner {
    pub fn new(config: Config) -> Result<Self, StorageError> {
        config.validate()?;

        let storage = Self {
            series: DashMap::new(),
            disk_config: config.disk,
            next_sequence: AtomicU64::new(1),
            flush_lock: Mutex::new(()),
        };
        if let Some(disk_config) = &storage.disk_config {
            storage.replay(disk_config)?;
        }
        Ok(storage)
    }

    fn replay(&self, disk_config: &DiskConfig) -> Result<(), StorageError> {
        let segments =
            segment::open_all(&disk_config.data_path).map_err(StorageError::FailedOpen)?;

        let mut num_data_points = 0;
        for segment in segments.iter() {
            for (id, data_points) in segment.read_chunks().map_err(StorageError::FailedOpen)? {
                num_data_points += data_points.len();
                self.series_handle(id)
                    .write()
                    .map_err(|_| StorageError::LockFailure)?
                    .extend_flushed(&data_points);
            }
        }

        if let Some(last) = segments.last() {
            self.next_sequence.store(last.sequence() + 1, Ordering::SeqCst);
        }
        info!(
            "replayed {} data points from {} segments in {:?}",
            num_data_points,
            segments.len(),
            disk_config.data_path
        );
        Ok(())
    }

    fn series_handle(&self, id: SeriesId) -> SeriesHandle {
        // The shard lock is released before the series lock is taken.
        if let Some(series) = self.series.get(&id) {
            return series.value().clone();
        }
        self.series
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(Series::new())))
            .value()
            .clone()
    }

    pub fn ingest(&self, row: &Row) -> Result<(), StorageError> {
        if row.name.is_empty() {
            return Err(StorageError::InvalidInput("name must not be empty"));
        }
        if row.key.is_empty() {
            return Err(StorageError::InvalidInput("key must not be empty"));
        }

        let series = self.series_handle(SeriesId::new(row.name, row.key));
        let mut series = series.write().map_err(|_| StorageError::LockFailure)?;
        series.append(row.data_point);
        Ok(())
    }

    pub fn query(&self, name: &str, key: &str) -> Result<Vec<DataPoint>, StorageError> {
        let series = match self.series.get(&SeriesId::new(name, key)) {
            Some(series) => series.value().clone(),
            None => return Ok(vec![]),
        };
        let series = series.read().map_err(|_| StorageError::LockFailure)?;
        Ok(series.select())
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        let handles: Vec<SeriesHandle> = self.series.iter().map(|e| e.value().clone()).collect();
        handles.iter().try_fold(0, |acc, series| {
            let series = series.read().map_err(|_| StorageError::LockFailure)?;
            Ok(acc + series.len())
        })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        let disk_config = match &self.disk_config {
            Some(disk_config) => disk_config,
            None => return Ok(()),
        };
        let _flush_guard = self
            .flush_lock
            .lock()
            .map_err(|_| StorageError::LockFailure)?;

        // Snapshot the pending tail of every series. Points ingested after the
        // snapshot stay pending for the next flush.
        let handles: Vec<(SeriesId, SeriesHandle)> = self
            .series
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let mut chunks = vec![];
        let mut flushed_upto = vec![];
        for (id, handle) in handles {
            let series = handle.read().map_err(|_| StorageError::LockFailure)?;
            if series.pending().is_empty() {
                continue;
            }
            chunks.push((id, series.pending().to_vec()));
            flushed_upto.push((handle.clone(), series.len()));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let dir_path = segment::write(
            &disk_config.data_path,
            sequence,
            &chunks,
            disk_config.encode_strategy,
        )
        .map_err(StorageError::FailedFlush)?;

        // Only mark points as flushed once the segment is in place.
        for (handle, upto) in flushed_upto {
            handle
                .write()
                .map_err(|_| StorageError::LockFailure)?
                .mark_flushed(upto);
        }

        info!(
            "flushed {} data points from {} series to {:?}",
            chunks.iter().map(|(_, points)| points.len()).sum::<usize>(),
            chunks.len(),
            dir_path
        );
        Ok(())
    }
}
