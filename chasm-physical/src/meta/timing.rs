//! Code for timing blocks of code

use std::{
    cmp::Reverse,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use ascii_tree::{write_tree, Tree};
use linked_hash_map::LinkedHashMap;
use once_cell::sync::Lazy;

/// Global instance of the [TimedCode]
static TIMECODE_INSTANCE: Lazy<Mutex<TimedCode>> = Lazy::new(|| Mutex::new(TimedCode::new()));

/// How to sort the children of a block when displaying a [TimedCode] tree
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TimedSorting {
    /// The order the blocks were first entered in
    #[default]
    Default,
    /// Alphabetical by the title of the block
    Alphabetical,
    /// Show the blocks which took longest first
    LongestTime,
}

/// Measurements of a block of code
#[derive(Default, Copy, Clone)]
struct TimedCodeInfo {
    total: Duration,
    started: Option<Instant>,
    runs: u64,
}

impl fmt::Debug for TimedCodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimedCodeInfo [{}ms, {} runs, {}]",
            self.total.as_millis(),
            self.runs,
            if self.started.is_some() {
                "running"
            } else {
                "stopped"
            }
        )
    }
}

/// Hierarchy of timed blocks of code.
///
/// Blocks are addressed by slash-separated paths, e.g. `"Reasoning/Rules/Rule 3"`.
#[derive(Debug, Default, Clone)]
pub struct TimedCode {
    info: TimedCodeInfo,
    subblocks: LinkedHashMap<String, TimedCode>,
}

impl TimedCode {
    /// Create new [TimedCode] object
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the global instance
    pub fn instance() -> MutexGuard<'static, TimedCode> {
        TIMECODE_INSTANCE
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Navigate to a subblock, creating it if necessary
    pub fn sub(&mut self, path: &str) -> &mut TimedCode {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self, |block, part| {
                block.subblocks.entry(part.to_owned()).or_default()
            })
    }

    /// Start a measurement; starting a running block has no effect
    pub fn start(&mut self) {
        if self.info.started.is_none() {
            self.info.started = Some(Instant::now());
        }
    }

    /// Stop the current measurement and return its duration
    pub fn stop(&mut self) -> Duration {
        let Some(started) = self.info.started.take() else {
            return Duration::ZERO;
        };

        let elapsed = started.elapsed();
        self.info.total += elapsed;
        self.info.runs += 1;

        elapsed
    }

    /// Return the total time spent in this block
    pub fn total_system_time(&self) -> Duration {
        self.info.total
    }

    /// Return how often this block has been measured
    pub fn runs(&self) -> u64 {
        self.info.runs
    }

    fn tree(&self, title: &str, parent_total: Duration, sorting: TimedSorting) -> Tree {
        let percentage = if parent_total.is_zero() {
            100.0
        } else {
            100.0 * self.info.total.as_secs_f64() / parent_total.as_secs_f64()
        };
        let label = format!(
            "{title} [{percentage:.1}%, {}ms, {}x]",
            self.info.total.as_millis(),
            self.info.runs
        );

        if self.subblocks.is_empty() {
            return Tree::Leaf(vec![label]);
        }

        let mut children = self.subblocks.iter().collect::<Vec<_>>();
        match sorting {
            TimedSorting::Default => {}
            TimedSorting::Alphabetical => children.sort_by_key(|(name, _)| *name),
            TimedSorting::LongestTime => {
                children.sort_by_key(|(_, block)| Reverse(block.info.total))
            }
        }

        Tree::Node(
            label,
            children
                .into_iter()
                .map(|(name, block)| block.tree(name, self.info.total, sorting))
                .collect(),
        )
    }

    /// Render the measurements as an ASCII tree
    pub fn create_tree_string(&self, title: &str, sorting: TimedSorting) -> String {
        let mut result = String::new();
        // Writing into a String cannot fail.
        let _ = write_tree(&mut result, &self.tree(title, self.info.total, sorting));

        result
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use test_log::test;

    use super::{TimedCode, TimedSorting};

    #[test]
    fn nested_blocks() {
        let mut code = TimedCode::new();

        code.start();
        code.sub("Reasoning/Rules").start();
        std::thread::sleep(Duration::from_millis(2));
        code.sub("Reasoning/Rules").stop();
        code.stop();

        assert_eq!(code.sub("Reasoning/Rules").runs(), 1);
        assert!(code.sub("Reasoning/Rules").total_system_time() >= Duration::from_millis(2));
        assert_eq!(code.sub("Reasoning").runs(), 0);

        let tree = code.create_tree_string("chasm", TimedSorting::Alphabetical);
        assert!(tree.contains("Rules"));
    }

    #[test]
    fn stop_without_start() {
        let mut code = TimedCode::new();
        assert_eq!(code.stop(), Duration::ZERO);
        assert_eq!(code.runs(), 0);
    }
}
