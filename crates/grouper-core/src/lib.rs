pub mod config;
pub mod datatypes;
mod engine;
pub mod group_by;
pub mod hashing;
pub mod prelude;
pub mod sort;
pub mod testing;
#[cfg(test)]
mod tests;

use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub static POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let thread_name =
        std::env::var("GROUPER_THREAD_NAME").unwrap_or_else(|_| "grouper".to_string());
    ThreadPoolBuilder::new()
        .num_threads(
            std::env::var("GROUPER_MAX_THREADS")
                .map(|s| s.parse::<usize>().expect("integer"))
                .unwrap_or_else(|_| {
                    std::thread::available_parallelism()
                        .map(|v| v.get())
                        .unwrap_or(1)
                }),
        )
        .thread_name(move |i| format!("{thread_name}-{i}"))
        .build()
        .expect("could not spawn threads")
});
