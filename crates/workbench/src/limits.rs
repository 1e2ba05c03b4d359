//! Resource limits for sandboxed execution

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Upper bound on any single execution's wall-clock budget.
pub const MAX_TIME_BUDGET: Duration = Duration::from_secs(300);

const TRUNCATION_MARKER: &[u8] = b"\n... [output truncated] ...\n";

/// Per-context caps on CPU, memory, captured output and wall time.
///
/// Serialized with the timeout in milliseconds; missing fields fall back to
/// [`ResourceLimits::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// CPU quota in millicores (1000 = one full core)
    pub max_cpu_millicores: u32,
    /// Memory ceiling for the context
    pub max_memory_bytes: u64,
    /// Combined stdout and stderr kept per execution
    pub max_output_bytes: u64,
    /// Budget used when a request does not name its own
    #[serde(serialize_with = "millis_out", deserialize_with = "millis_in")]
    pub timeout: Duration,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        const MIB: u64 = 1 << 20;
        Self {
            max_cpu_millicores: 1000,
            max_memory_bytes: 256 * MIB,
            max_output_bytes: MIB,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ResourceLimits {
    /// The wall-clock budget for one execution.
    ///
    /// An explicit request budget wins over the configured default; either
    /// way the result never exceeds [`MAX_TIME_BUDGET`].
    pub fn time_budget(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.timeout).min(MAX_TIME_BUDGET)
    }

    /// CPU quota formatted for a container runtime's `--cpus` flag.
    pub fn cpus(&self) -> String {
        format!("{:.3}", f64::from(self.max_cpu_millicores) / 1000.0)
    }

    /// Output cap as a `usize`, saturating on narrow targets.
    pub fn output_cap(&self) -> usize {
        usize::try_from(self.max_output_bytes).unwrap_or(usize::MAX)
    }
}

fn millis_out<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
    serializer.serialize_u64(ms)
}

fn millis_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Accumulates process output up to a fixed byte cap.
///
/// The first write that overflows keeps whatever still fits, then appends a
/// single truncation marker. Everything after that is counted and dropped.
#[derive(Debug, Clone)]
pub struct OutputCap {
    kept: Vec<u8>,
    cap: usize,
    dropped: usize,
    marked: bool,
}

impl OutputCap {
    /// An empty buffer holding at most `cap` bytes of payload.
    pub fn new(cap: usize) -> Self {
        Self {
            kept: Vec::with_capacity(cap.min(64 * 1024)),
            cap,
            dropped: 0,
            marked: false,
        }
    }

    /// Append a chunk and return how many of its bytes were kept.
    pub fn push(&mut self, chunk: &[u8]) -> usize {
        if self.marked {
            self.dropped += chunk.len();
            return 0;
        }

        let room = self.cap.saturating_sub(self.kept.len());
        let (fits, rest) = chunk.split_at(chunk.len().min(room));
        self.kept.extend_from_slice(fits);
        if !rest.is_empty() {
            self.dropped = rest.len();
            self.mark_truncated();
        }
        fits.len()
    }

    /// Record that output was lost before reaching this buffer.
    ///
    /// Appends the marker unless it is already there; later pushes are
    /// dropped.
    pub fn mark_truncated(&mut self) {
        if !self.marked {
            self.marked = true;
            self.kept.extend_from_slice(TRUNCATION_MARKER);
        }
    }

    /// True once any output has been lost.
    pub fn overflowed(&self) -> bool {
        self.marked
    }

    /// Number of bytes discarded by [`push`](Self::push).
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Decode the kept bytes, replacing invalid UTF-8.
    pub fn into_string(self) -> String {
        String::from_utf8(self.kept)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
    }
}
