#![deny(warnings)]
#![allow(clippy::float_cmp)]
//! Immediate-mode transfers: test loops, waiting, and cancellation.

use std::thread;

use commlink::traits::*;
use commlink::transport::{LocalEndpoint, LocalFabric};
use commlink::{Rank, Universe};

fn main() {
    let fabric = LocalFabric::new(2);
    let workers: Vec<_> = (0..2)
        .map(|rank| {
            let endpoint = fabric.endpoint(rank);
            thread::spawn(move || run(rank as Rank, endpoint))
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

fn run(rank: Rank, endpoint: LocalEndpoint) {
    let universe = Universe::new(endpoint);
    let world = universe.world().unwrap();

    let xs = [std::f32::consts::PI];
    if rank == 0 {
        // Overlap: the send is posted, then driven to completion by testing.
        let mut sreq = world
            .process_at_rank(1)
            .immediate_send(&xs[..], 0)
            .unwrap();
        while !sreq.test() {
            thread::yield_now();
        }
        println!("rank 0: send resolved");
    } else {
        let mut ys = [0.0f32; 1];
        let mut rreq = world
            .process_at_rank(0)
            .immediate_receive_into(&mut ys[..], 0)
            .unwrap();
        rreq.wait();
        assert!(rreq.is_resolved());
        drop(rreq);
        assert_eq!(xs, ys);
        println!("rank 1: received {}", ys[0]);
    }

    // A receive that nothing will match can be abandoned.
    let mut inbox = [0u64; 1];
    let mut stale = world
        .any_process()
        .immediate_receive_into(&mut inbox[..], 99)
        .unwrap();
    stale.cancel();
    stale.wait();
    assert!(stale.is_resolved());
}
