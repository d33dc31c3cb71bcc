//! Flower persistence collaborator.
//!
//! Stores never report failure to the relay: a flower handed to
//! `create_flower` always comes back with an id and timestamp. When the
//! backing file cannot be read or written the store keeps working from its
//! in-memory copy and logs the problem.

use log::{debug, info, warn};
use shared::{get_timestamp, Flower, FlowerRecord, NewFlower};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

pub const DEFAULT_MAX_FLOWERS: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("flower file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("flower file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

pub trait FlowerStore: Send {
    fn list_flowers(&self) -> Vec<Flower>;
    fn create_flower(&mut self, new_flower: NewFlower) -> Flower;
}

/// Transient storage with a retention cap; the oldest flowers go first.
#[derive(Debug)]
pub struct MemoryStore {
    flowers: VecDeque<Flower>,
    max_flowers: usize,
}

impl MemoryStore {
    pub fn new(max_flowers: usize) -> Self {
        Self {
            flowers: VecDeque::new(),
            max_flowers: max_flowers.max(1),
        }
    }

    fn with_flowers(flowers: Vec<Flower>, max_flowers: usize) -> Self {
        let mut store = Self::new(max_flowers);
        for flower in flowers {
            store.push(flower);
        }
        store
    }

    fn push(&mut self, flower: Flower) {
        self.flowers.push_back(flower);
        while self.flowers.len() > self.max_flowers {
            self.flowers.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.flowers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flowers.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FLOWERS)
    }
}

impl FlowerStore for MemoryStore {
    fn list_flowers(&self) -> Vec<Flower> {
        self.flowers.iter().cloned().collect()
    }

    fn create_flower(&mut self, new_flower: NewFlower) -> Flower {
        let flower = new_flower.into_flower(Uuid::new_v4().to_string(), get_timestamp());
        self.push(flower.clone());
        flower
    }
}

/// Persists flowers as a JSON Lines file of snake_case rows.
///
/// The relay only touches the in-memory copy. Each new row is queued to a
/// writer task that appends it to the file, so a placement never waits on
/// disk. The writer rewrites the file down to the newest `max_flowers` rows
/// once it holds twice that many.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    writer: Option<mpsc::UnboundedSender<WriteRequest>>,
}

#[derive(Debug)]
enum WriteRequest {
    Append(FlowerRecord),
    Flush(oneshot::Sender<()>),
}

impl JsonFileStore {
    /// Loads existing rows from `path` and starts the writer task on the
    /// current Tokio runtime. A missing file starts empty; unreadable rows
    /// are logged and skipped. Without a runtime the store is memory only.
    pub fn open(path: impl Into<PathBuf>, max_flowers: usize) -> Self {
        let path = path.into();
        let max_flowers = max_flowers.max(1);
        let (flowers, rows) = match Self::load(&path) {
            Ok(loaded) => {
                info!("Loaded {} flowers from {}", loaded.0.len(), path.display());
                loaded
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No flower file at {}, starting empty", path.display());
                (Vec::new(), 0)
            }
            Err(e) => {
                warn!(
                    "Could not load flowers from {}: {}. Starting empty",
                    path.display(),
                    e
                );
                (Vec::new(), 0)
            }
        };

        let writer = match Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let file_writer = FileWriter {
                    path: path.clone(),
                    max_flowers,
                    rows,
                };
                handle.spawn(file_writer.run(rx));
                Some(tx)
            }
            Err(_) => {
                warn!(
                    "No async runtime, flowers will not be written to {}",
                    path.display()
                );
                None
            }
        };

        Self {
            path,
            memory: MemoryStore::with_flowers(flowers, max_flowers),
            writer,
        }
    }

    /// Returns the flowers in file order and the number of rows read.
    fn load(path: &Path) -> Result<(Vec<Flower>, usize), StoreError> {
        let text = fs::read_to_string(path)?;
        let mut flowers = Vec::new();
        let mut rows = 0;
        for (number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            rows += 1;
            match serde_json::from_str::<FlowerRecord>(line) {
                Ok(record) => flowers.push(Flower::from(record)),
                Err(e) => warn!(
                    "Skipping row {} of {}: {}",
                    number + 1,
                    path.display(),
                    e
                ),
            }
        }
        Ok((flowers, rows))
    }

    /// Resolves once every row queued so far has been handed to the file.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if writer.send(WriteRequest::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl FlowerStore for JsonFileStore {
    fn list_flowers(&self) -> Vec<Flower> {
        self.memory.list_flowers()
    }

    fn create_flower(&mut self, new_flower: NewFlower) -> Flower {
        let flower = self.memory.create_flower(new_flower);
        let queued = self.writer.as_ref().is_some_and(|writer| {
            writer
                .send(WriteRequest::Append(FlowerRecord::from(&flower)))
                .is_ok()
        });
        if !queued {
            warn!(
                "Flower {} not queued for {}. Keeping it in memory",
                flower.id,
                self.path.display()
            );
        }
        flower
    }
}

/// Owns the flower file; runs as its own task.
struct FileWriter {
    path: PathBuf,
    max_flowers: usize,
    rows: usize,
}

impl FileWriter {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<WriteRequest>) {
        while let Some(request) = requests.recv().await {
            match request {
                WriteRequest::Append(record) => {
                    if let Err(e) = self.append(&record).await {
                        warn!(
                            "Failed to persist flower {} to {}: {}. Keeping it in memory",
                            record.id,
                            self.path.display(),
                            e
                        );
                    }
                }
                WriteRequest::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Flower writer for {} stopped", self.path.display());
    }

    async fn append(&mut self, record: &FlowerRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        self.rows += 1;

        if self.rows > self.max_flowers * 2 {
            self.compact().await?;
        }
        Ok(())
    }

    /// Rewrites the file with only the newest `max_flowers` rows.
    async fn compact(&mut self) -> Result<(), StoreError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
        let kept = &lines[lines.len().saturating_sub(self.max_flowers)..];

        let mut out = kept.join("\n");
        out.push('\n');

        // Write beside the target and rename so readers never see half a file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, out).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            "Compacted {} from {} to {} rows",
            self.path.display(),
            self.rows,
            kept.len()
        );
        self.rows = kept.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_flower(x: f32, by: &str) -> NewFlower {
        NewFlower {
            x,
            y: 5.0,
            image_data: "data:image/png;base64,AAAA".to_string(),
            created_by: by.to_string(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("garden-{}-{}.json", name, Uuid::new_v4()))
    }

    #[test]
    fn test_memory_store_assigns_unique_ids() {
        let mut store = MemoryStore::default();
        let first = store.create_flower(new_flower(1.0, "a"));
        let second = store.create_flower(new_flower(2.0, "b"));

        assert_ne!(first.id, second.id);
        assert!(first.created_at > 0);
        assert_eq!(store.list_flowers().len(), 2);
    }

    #[test]
    fn test_memory_store_evicts_oldest() {
        let mut store = MemoryStore::new(3);
        for i in 0..5 {
            store.create_flower(new_flower(i as f32, "a"));
        }

        let xs: Vec<f32> = store.list_flowers().iter().map(|f| f.x).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let path = temp_path("persist");
        {
            let mut store = JsonFileStore::open(&path, 10);
            store.create_flower(new_flower(7.0, "rose"));
            store.flush().await;
        }

        let reopened = JsonFileStore::open(&path, 10);
        let flowers = reopened.list_flowers();
        assert_eq!(flowers.len(), 1);
        assert_eq!(flowers[0].x, 7.0);
        assert_eq!(flowers[0].created_by, "rose");

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.contains("\"created_by\""));
        assert!(raw.contains("\"image_data\""));

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_file_store_returns_before_writing() {
        let path = temp_path("deferred");
        let mut store = JsonFileStore::open(&path, 10);

        // The writer task cannot run until this test yields.
        let flower = store.create_flower(new_flower(4.0, "a"));
        assert_eq!(store.list_flowers(), vec![flower.clone()]);
        assert!(!path.exists());

        store.flush().await;
        let reopened = JsonFileStore::open(&path, 10);
        assert_eq!(reopened.list_flowers(), vec![flower]);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_file_store_compacts_to_newest_rows() {
        let path = temp_path("compact");
        let mut store = JsonFileStore::open(&path, 2);
        for i in 0..5 {
            store.create_flower(new_flower(i as f32, "a"));
        }
        store.flush().await;

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.lines().count() <= 4);

        let xs: Vec<f32> = JsonFileStore::open(&path, 2)
            .list_flowers()
            .iter()
            .map(|f| f.x)
            .collect();
        assert_eq!(xs, vec![3.0, 4.0]);

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_file_store_falls_back_to_memory() {
        // A directory that does not exist makes every write fail.
        let path = std::env::temp_dir()
            .join(format!("garden-missing-{}", Uuid::new_v4()))
            .join("flowers.json");
        let mut store = JsonFileStore::open(&path, 10);

        let flower = store.create_flower(new_flower(1.0, "a"));
        store.flush().await;
        assert!(!flower.id.is_empty());
        assert_eq!(store.list_flowers(), vec![flower]);
    }

    #[test]
    fn test_file_store_without_runtime_is_memory_only() {
        let path = temp_path("no-runtime");
        let mut store = JsonFileStore::open(&path, 10);

        store.create_flower(new_flower(1.0, "a"));
        assert_eq!(store.list_flowers().len(), 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_store_skips_corrupt_rows() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not json\n").unwrap();

        let mut store = JsonFileStore::open(&path, 10);
        assert!(store.list_flowers().is_empty());

        store.create_flower(new_flower(3.0, "a"));
        store.flush().await;
        let reopened = JsonFileStore::open(&path, 10);
        assert_eq!(reopened.list_flowers().len(), 1);

        let _ = fs::remove_file(&path);
    }
}
