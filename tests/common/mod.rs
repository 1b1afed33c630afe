//! Shared harness running one thread per rank on a private fabric.

use std::sync::Arc;
use std::thread;

use commlink::transport::LocalFabric;
use commlink::{Rank, Universe};

/// Runs `body` once per rank, each on its own thread with its own universe,
/// all attached to one fabric of `size` endpoints. Panics from any rank
/// propagate to the caller.
pub fn run_ranks<F>(size: usize, body: F)
where
    F: Fn(&Universe, Rank) + Send + Sync + 'static,
{
    let fabric = LocalFabric::new(size);
    let body = Arc::new(body);
    let workers: Vec<_> = (0..size)
        .map(|rank| {
            let endpoint = fabric.endpoint(rank);
            let body = Arc::clone(&body);
            thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn(move || {
                    let universe = Universe::new(endpoint);
                    body(&universe, rank as Rank);
                })
                .unwrap()
        })
        .collect();
    for worker in workers {
        if let Err(panic) = worker.join() {
            std::panic::resume_unwind(panic);
        }
    }
}
