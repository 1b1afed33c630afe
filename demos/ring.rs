#![deny(warnings)]
//! Counts hops by passing a token once around a ring of processes.

use std::thread;

use commlink::traits::*;
use commlink::transport::{LocalEndpoint, LocalFabric};
use commlink::{Rank, Tag, Universe};

const SIZE: usize = 4;
const TAG: Tag = 1;

fn main() {
    let fabric = LocalFabric::new(SIZE);
    let workers: Vec<_> = (0..SIZE)
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
    let size = world.size();
    let next = world.process_at_rank((rank + 1) % size);
    let previous = world.process_at_rank((rank + size - 1) % size);

    let mut token = [0u64; 1];
    if rank == 0 {
        token[0] = 1;
        next.send(&token[..], TAG).unwrap();
        previous.receive_into(&mut token[..], TAG).unwrap();
        assert_eq!(token[0], size as u64);
        println!("the token came home after {} hops", token[0]);
    } else {
        previous.receive_into(&mut token[..], TAG).unwrap();
        token[0] += 1;
        next.send(&token[..], TAG).unwrap();
    }
}
