use std::{fs, path::PathBuf, time::Duration};

use metrical::{
    storage::{Config, DiskConfig, Storage, StorageError},
    DataPoint, EncodeStrategy, Row,
};

fn main() -> Result<(), StorageError> {
    let data_path = PathBuf::from("./demos/simple-data");
    let config = Config {
        disk: Some(DiskConfig {
            data_path: data_path.clone(),
            encode_strategy: EncodeStrategy::Gorilla,
        }),
        flush_interval: Some(1),
    };
    let storage = Storage::new(config.clone())?;

    let batch_size = 500;
    let batches = 5;
    let sleep_time_secs = 1;
    let ts = 1600000000000;

    for i in 0..batches {
        for j in 0..batch_size {
            let timestamp = ts + (i * batch_size + j);
            if let Err(e) = storage.ingest(&Row {
                name: "my_metric",
                key: "demo",
                data_point: DataPoint {
                    timestamp,
                    value: 0.1,
                },
            }) {
                println!(
                    "error ingesting data point at timestamp {}: error: {}",
                    timestamp, e
                );
            }
        }

        println!("ingested {} data points", batch_size);
        std::thread::sleep(Duration::from_secs(sleep_time_secs));
    }

    storage.close()?;
    drop(storage);

    // Everything flushed above is replayed from disk.
    let reopened = Storage::new(config)?;
    println!(
        "reopened with {} data points",
        reopened.query("my_metric", "demo")?.len()
    );
    reopened.close()?;

    // Comment this line out to see the generated segments on disk.
    fs::remove_dir_all(data_path).unwrap();
    Ok(())
}
