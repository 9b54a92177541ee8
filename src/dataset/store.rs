use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{IMAGE_EXTENSIONS, LandmarkRecord, SampleRepository, SampleSource};
use crate::error::{GestureError, Result};
use crate::landmarks::LandmarkSet;
use crate::models::{Family, Label};
use crate::payload;

const IMAGE_DIR_NAME: &str = "images";
const LANDMARK_DIR_NAME: &str = "landmarks";
const LANDMARK_FILE_EXT: &str = "jsonl";

/// Filesystem sample store.
///
/// ```text
/// <root>/images/<LABEL>/<LABEL>_00000.jpg
/// <root>/landmarks/<LABEL>.jsonl
/// ```
#[derive(Debug, Clone)]
pub struct FsSampleStore {
    root: PathBuf,
}

impl FsSampleStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn image_dir(&self, label: &Label) -> PathBuf {
        self.root.join(IMAGE_DIR_NAME).join(label.as_str())
    }

    fn landmark_file(&self, label: &Label) -> PathBuf {
        self.root
            .join(LANDMARK_DIR_NAME)
            .join(format!("{}.{}", label.as_str(), LANDMARK_FILE_EXT))
    }

    /// Next free sequence number after the highest `<LABEL>_<n>` file name.
    fn next_index(dir: &Path, label: &Label) -> Result<u32> {
        let prefix = format!("{}_", label.as_str());
        let entries = fs::read_dir(dir).map_err(|e| GestureError::storage(dir, e))?;

        let highest = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let stem = name.strip_prefix(&prefix)?.split('.').next()?.to_string();
                stem.parse::<u32>().ok()
            })
            .max();
        Ok(highest.map_or(0, |n| n + 1))
    }

    fn list_images(&self, label: &Label) -> Result<Vec<SampleSource>> {
        let dir = self.image_dir(label);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GestureError::storage(&dir, e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        paths.sort();

        Ok(paths.into_iter().map(SampleSource::ImageFile).collect())
    }

    fn list_landmarks(&self, label: &Label) -> Result<Vec<SampleSource>> {
        let path = self.landmark_file(label);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GestureError::storage(&path, e)),
        };

        // Lines are split as bytes so one bad line cannot hide the others
        Ok(bytes
            .split(|&b| b == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
            .map(|(idx, line)| SampleSource::LandmarkLine {
                path: path.clone(),
                line: idx + 1,
                bytes: line.to_vec(),
            })
            .collect())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

impl SampleRepository for FsSampleStore {
    fn store_image(&self, label: &Label, bytes: &[u8]) -> Result<PathBuf> {
        let (data, ext) = payload::normalize_for_storage(bytes)?;

        let dir = self.image_dir(label);
        fs::create_dir_all(&dir).map_err(|e| GestureError::storage(&dir, e))?;

        // create_new refuses to clobber a file written concurrently
        let mut index = Self::next_index(&dir, label)?;
        loop {
            let path = dir.join(format!("{}_{:05}.{}", label.as_str(), index, ext));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&data)
                        .map_err(|e| GestureError::storage(&path, e))?;
                    tracing::info!("Stored image sample for {} at {}", label, path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => index += 1,
                Err(e) => return Err(GestureError::storage(&path, e)),
            }
        }
    }

    fn store_landmarks(&self, label: &Label, landmarks: &LandmarkSet) -> Result<PathBuf> {
        let path = self.landmark_file(label);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| GestureError::storage(parent, e))?;
        }

        let recorded_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| GestureError::storage(&path, std::io::Error::other(e)))?;
        let record = LandmarkRecord {
            label: label.clone(),
            points: landmarks.to_triples(),
            recorded_at,
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GestureError::storage(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| GestureError::storage(&path, e))?;

        tracing::info!("Appended landmark sample for {} to {}", label, path.display());
        Ok(path)
    }

    fn list_samples(&self, label: &Label, family: Family) -> Result<Vec<SampleSource>> {
        match family {
            Family::Pixel => self.list_images(label),
            Family::Landmark => self.list_landmarks(label),
        }
    }

    fn location(&self, label: &Label, family: Family) -> PathBuf {
        match family {
            Family::Pixel => self.image_dir(label),
            Family::Landmark => self.landmark_file(label),
        }
    }

    fn root(&self) -> PathBuf {
        self.root.clone()
    }
}
