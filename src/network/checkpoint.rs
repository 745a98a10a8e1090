use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Error;
use crate::network::cnn::Cnn;

/// Current checkpoint format version. Bumped on any layout change; load
/// rejects versions it does not know.
pub const CHECKPOINT_VERSION: u32 = 1;

/// The single persisted artifact: network weights (with enough shape
/// information to reconstruct every layer), the ordered label list, the
/// per-epoch loss history, and the output width the head was built with.
///
/// Loading replaces engine state wholesale; it is never a merge.
#[derive(Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub size_output: usize,
    pub labels: Vec<String>,
    pub history: Vec<[f64; 2]>,
    pub network: Cnn,
}

impl Checkpoint {
    /// Serializes the checkpoint as JSON. Fails with `Error::Io` when the
    /// path cannot be created or written.
    pub fn save_json(&self, path: &Path) -> Result<(), Error> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    /// Reads and fully validates a checkpoint. `Error::Io` for a missing or
    /// unreadable file, `Error::CorruptCheckpoint` for anything that parses
    /// wrong or fails shape validation. Nothing is applied until validation
    /// has passed, so callers can swap state in atomically.
    pub fn load_json(path: &Path) -> Result<Checkpoint, Error> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let checkpoint: Checkpoint = serde_json::from_reader(reader)
            .map_err(|e| Error::CorruptCheckpoint(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.version != CHECKPOINT_VERSION {
            return Err(Error::CorruptCheckpoint(format!(
                "unsupported checkpoint version {} (expected {})",
                self.version, CHECKPOINT_VERSION
            )));
        }
        if self.network.size_output() != self.size_output {
            return Err(Error::CorruptCheckpoint(format!(
                "network output width {} disagrees with declared width {}",
                self.network.size_output(),
                self.size_output
            )));
        }
        self.network
            .validate_shapes()
            .map_err(Error::CorruptCheckpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("doodle-brain-ckpt-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Checkpoint::load_json(Path::new("/nonexistent/brain.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let path = temp_path("malformed.json");
        fs::write(&path, b"{ not json").unwrap();
        let err = Checkpoint::load_json(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn declared_width_must_match_the_network() {
        let path = temp_path("width-mismatch.json");
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            size_output: 5, // network below was built with 2
            labels: vec!["a".into(), "b".into()],
            history: vec![],
            network: Cnn::new(2),
        };
        checkpoint.save_json(&path).unwrap();
        let err = Checkpoint::load_json(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let path = temp_path("bad-version.json");
        let checkpoint = Checkpoint {
            version: 99,
            size_output: 2,
            labels: vec![],
            history: vec![],
            network: Cnn::new(2),
        };
        checkpoint.save_json(&path).unwrap();
        let err = Checkpoint::load_json(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptCheckpoint(_)));
        let _ = fs::remove_file(&path);
    }
}
