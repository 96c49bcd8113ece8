//! Thread pool management for running independent extractions concurrently
//!
//! A single extraction walks the grid layer by layer and is not split across
//! threads; parallelism comes from extracting several isovalues at once.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{Arc, Mutex, OnceLock};
use voxie_core::{Error, Result};

static GLOBAL_THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static THREAD_POOL_CONFIG: Mutex<ThreadPoolConfig> = Mutex::new(ThreadPoolConfig::new());

/// Thread pool configuration for parallel extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = one per logical CPU)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Inputs shorter than this are processed on the calling thread
    pub min_parallel_len: usize,
}

impl ThreadPoolConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: String::new(),
            enabled: true,
            min_parallel_len: 2,
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_parallel_len(mut self, len: usize) -> Self {
        self.min_parallel_len = len;
        self
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "voxie-surface".to_string(),
            ..Self::new()
        }
    }
}

fn build_pool(config: &ThreadPoolConfig) -> Result<ThreadPool> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(num_threads) = config.num_threads {
        builder = builder.num_threads(num_threads);
    }
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }
    if !config.thread_name_prefix.is_empty() {
        let prefix = config.thread_name_prefix.clone();
        builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
    }
    builder
        .build()
        .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))
}

/// Initialize the global thread pool. Fails if it already exists.
pub fn init_thread_pool(config: ThreadPoolConfig) -> Result<()> {
    if GLOBAL_THREAD_POOL.get().is_some() {
        return Err(Error::Algorithm("Thread pool already initialized".to_string()));
    }
    let pool = build_pool(&config)?;
    GLOBAL_THREAD_POOL
        .set(Arc::new(pool))
        .map_err(|_| Error::Algorithm("Thread pool already initialized".to_string()))?;
    if let Ok(mut global_config) = THREAD_POOL_CONFIG.lock() {
        *global_config = config;
    }
    Ok(())
}

/// Get the global thread pool, initializing it with defaults if needed
pub fn get_thread_pool() -> Result<Arc<ThreadPool>> {
    if let Some(pool) = GLOBAL_THREAD_POOL.get() {
        return Ok(pool.clone());
    }
    let pool = Arc::new(build_pool(&ThreadPoolConfig::default())?);
    // Another thread may have won the race; either pool is fine
    Ok(GLOBAL_THREAD_POOL.get_or_init(|| pool).clone())
}

/// Current thread pool configuration
pub fn get_config() -> ThreadPoolConfig {
    THREAD_POOL_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// Enable or disable parallel processing at runtime
pub fn set_parallel_enabled(enabled: bool) {
    if let Ok(mut config) = THREAD_POOL_CONFIG.lock() {
        config.enabled = enabled;
    }
}

pub fn is_parallel_enabled() -> bool {
    get_config().enabled
}

/// Run `op` inside the global thread pool, or on the calling thread if
/// parallelism is disabled or the pool cannot be created
pub fn execute_parallel<F, R>(op: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    if !is_parallel_enabled() {
        return op();
    }
    match get_thread_pool() {
        Ok(pool) => pool.install(op),
        Err(e) => {
            log::warn!("{}; running on the calling thread", e);
            op()
        }
    }
}

/// Map `f` over `data`, preserving order
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    let config = get_config();
    if !config.enabled || data.len() < config.min_parallel_len {
        return data.iter().map(f).collect();
    }
    execute_parallel(|| data.par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ThreadPoolConfig::default()
            .with_threads(3)
            .with_stack_size(1 << 20)
            .with_enabled(false)
            .with_min_parallel_len(8);
        assert_eq!(config.num_threads, Some(3));
        assert_eq!(config.stack_size, Some(1 << 20));
        assert!(!config.enabled);
        assert_eq!(config.min_parallel_len, 8);
        assert_eq!(config.thread_name_prefix, "voxie-surface");
    }

    #[test]
    fn test_parallel_map_preserves_order() {
        let data: Vec<u32> = (0..100).collect();
        let squares = parallel_map(&data, |&x| x * x);
        assert_eq!(squares.len(), 100);
        assert!(squares.iter().enumerate().all(|(i, &s)| s == (i * i) as u32));
    }

    #[test]
    fn test_thread_pool_available() {
        let pool = get_thread_pool().unwrap();
        assert!(pool.current_num_threads() >= 1);
        assert_eq!(execute_parallel(|| 7), 7);
    }
}
