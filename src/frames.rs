use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::player::FrameSequence;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, Error)]
pub enum FrameStoreError {
    #[error("invalid event id: {0:?}")]
    InvalidEvent(String),

    #[error("event {0} not found")]
    EventNotFound(String),

    #[error("event {event} has no frame {index}")]
    FrameNotFound { event: String, index: usize },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type FrameStoreResult<T> = Result<T, FrameStoreError>;

/// Frames recorded for one event, in playback order
#[derive(Debug, Clone)]
pub struct EventFrames {
    pub event: String,
    pub files: Vec<PathBuf>,
}

impl EventFrames {
    /// URLs the console serves each frame under
    pub fn sequence(&self) -> FrameSequence<String> {
        (0..self.files.len())
            .map(|index| frame_url(&self.event, index))
            .collect::<Vec<_>>()
            .into()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Reads frame `index` of this list, returning its bytes and content type
    pub async fn read(&self, index: usize) -> FrameStoreResult<(Vec<u8>, &'static str)> {
        let path = self.files.get(index).ok_or_else(|| FrameStoreError::FrameNotFound {
            event: self.event.clone(),
            index,
        })?;

        let bytes = tokio::fs::read(path).await.map_err(|source| FrameStoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok((bytes, content_type(path)))
    }
}

pub fn frame_url(event: &str, index: usize) -> String {
    format!("/frames/{}/{}", event, index)
}

/// Event ids become directory names, so only a plain charset is accepted.
pub fn validate_event_id(event: &str) -> FrameStoreResult<()> {
    let valid = !event.is_empty()
        && event
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FrameStoreError::InvalidEvent(event.to_string()))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Directory-backed store of event frames: `<root>/<event>/<frame files>`
#[derive(Debug, Clone)]
pub struct FrameStore {
    root: PathBuf,
}

impl FrameStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Event directories present under the root, sorted
    pub async fn list_events(&self) -> FrameStoreResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(FrameStoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut events = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| FrameStoreError::Io {
            path: self.root.clone(),
            source,
        })? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if let Some(name) = entry.file_name().to_str() {
                if is_dir && validate_event_id(name).is_ok() {
                    events.push(name.to_string());
                }
            }
        }
        events.sort();
        Ok(events)
    }

    pub async fn load(&self, event: &str) -> FrameStoreResult<EventFrames> {
        validate_event_id(event)?;
        let dir = self.root.join(event);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FrameStoreError::EventNotFound(event.to_string()))
            }
            Err(source) => return Err(FrameStoreError::Io { path: dir, source }),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| FrameStoreError::Io {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            if is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        debug!("🖼️ Loaded {} frames for event {}", files.len(), event);
        Ok(EventFrames {
            event: event.to_string(),
            files,
        })
    }

    /// Reads one frame from a fresh listing of the event directory
    pub async fn read_frame(&self, event: &str, index: usize) -> FrameStoreResult<(Vec<u8>, &'static str)> {
        self.load(event).await?.read(index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(event: &str, files: &[&str]) -> (tempfile::TempDir, FrameStore) {
        let dir = tempfile::tempdir().unwrap();
        let event_dir = dir.path().join(event);
        fs::create_dir_all(&event_dir).unwrap();
        for name in files {
            fs::write(event_dir.join(name), name.as_bytes()).unwrap();
        }
        let store = FrameStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_event_id_validation() {
        assert!(validate_event_id("evt_2010-06-01").is_ok());
        assert!(validate_event_id("").is_err());
        assert!(validate_event_id("../etc").is_err());
        assert!(validate_event_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_load_orders_images_by_name() {
        let (_dir, store) = store_with("evt1", &["0003.jpg", "0001.jpg", "notes.txt", "0002.PNG"]);

        let frames = store.load("evt1").await.unwrap();
        let names: Vec<_> = frames
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["0001.jpg", "0002.PNG", "0003.jpg"]);

        let sequence = frames.sequence();
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.get(2), Some(&"/frames/evt1/2".to_string()));
    }

    #[tokio::test]
    async fn test_empty_event_is_valid() {
        let (_dir, store) = store_with("quiet", &[]);
        let frames = store.load("quiet").await.unwrap();
        assert!(frames.sequence().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event() {
        let (_dir, store) = store_with("evt1", &["a.jpg"]);
        let err = store.load("evt2").await.unwrap_err();
        assert!(matches!(err, FrameStoreError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn test_read_frame() {
        let (_dir, store) = store_with("evt1", &["b.png", "a.jpg"]);

        let (bytes, mime) = store.read_frame("evt1", 1).await.unwrap();
        assert_eq!(bytes, b"b.png");
        assert_eq!(mime, "image/png");

        let err = store.read_frame("evt1", 2).await.unwrap_err();
        assert!(matches!(err, FrameStoreError::FrameNotFound { index: 2, .. }));
    }

    #[tokio::test]
    async fn test_loaded_list_ignores_later_files() {
        let (dir, store) = store_with("evt1", &["0001.jpg", "0002.jpg"]);
        let frames = store.load("evt1").await.unwrap();
        fs::write(dir.path().join("evt1").join("0000.jpg"), b"late").unwrap();

        let (bytes, _) = frames.read(0).await.unwrap();
        assert_eq!(bytes, b"0001.jpg");
        assert!(matches!(
            frames.read(2).await.unwrap_err(),
            FrameStoreError::FrameNotFound { index: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_events() {
        let (dir, store) = store_with("evt2", &["a.jpg"]);
        fs::create_dir_all(dir.path().join("evt1")).unwrap();
        fs::write(dir.path().join("stray.jpg"), b"x").unwrap();

        assert_eq!(store.list_events().await.unwrap(), vec!["evt1", "evt2"]);
    }
}
