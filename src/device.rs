use std::fmt;
use std::num::NonZeroUsize;

/// Compute device the engine runs on, chosen once per engine construction.
/// This implementation is CPU-only; the variant records the parallelism the
/// host reports so a UI can display what the program is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu { threads: usize },
}

impl Device {
    pub fn detect() -> Device {
        let threads = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Device::Cpu { threads }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu { threads } => write!(f, "cpu ({} threads)", threads),
        }
    }
}
