//! Blocking transfers through the world communicator.

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use commlink::traits::*;
use commlink::CommError;

use common::run_ranks;

#[test]
fn every_element_kind_round_trips() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let peer = world.process_at_rank(1);
            peer.send(&[-8i8, 3][..], 0).unwrap();
            peer.send(&[-16i16, 300][..], 1).unwrap();
            peer.send(&[-32i32, 70_000][..], 2).unwrap();
            peer.send(&[-64i64, 1 << 40][..], 3).unwrap();
            peer.send(&[8u8, 200][..], 4).unwrap();
            peer.send(&[16u16, 60_000][..], 5).unwrap();
            peer.send(&[32u32, 4_000_000_000][..], 6).unwrap();
            peer.send(&[64u64, 1 << 60][..], 7).unwrap();
            peer.send(&[0.5f32, -1.25][..], 8).unwrap();
            peer.send(&[0.1f64, -2.5][..], 9).unwrap();
            peer.send(&[usize::MAX, 7][..], 10).unwrap();
            peer.send(&[isize::MIN, -7][..], 11).unwrap();
        } else {
            let peer = world.process_at_rank(0);

            let mut i8s = [0i8; 2];
            peer.receive_into(&mut i8s[..], 0).unwrap();
            assert_eq!(i8s, [-8, 3]);
            let mut i16s = [0i16; 2];
            peer.receive_into(&mut i16s[..], 1).unwrap();
            assert_eq!(i16s, [-16, 300]);
            let mut i32s = [0i32; 2];
            peer.receive_into(&mut i32s[..], 2).unwrap();
            assert_eq!(i32s, [-32, 70_000]);
            let mut i64s = [0i64; 2];
            peer.receive_into(&mut i64s[..], 3).unwrap();
            assert_eq!(i64s, [-64, 1 << 40]);
            let mut u8s = [0u8; 2];
            peer.receive_into(&mut u8s[..], 4).unwrap();
            assert_eq!(u8s, [8, 200]);
            let mut u16s = [0u16; 2];
            peer.receive_into(&mut u16s[..], 5).unwrap();
            assert_eq!(u16s, [16, 60_000]);
            let mut u32s = [0u32; 2];
            peer.receive_into(&mut u32s[..], 6).unwrap();
            assert_eq!(u32s, [32, 4_000_000_000]);
            let mut u64s = [0u64; 2];
            peer.receive_into(&mut u64s[..], 7).unwrap();
            assert_eq!(u64s, [64, 1 << 60]);
            let mut f32s = [0.0f32; 2];
            peer.receive_into(&mut f32s[..], 8).unwrap();
            assert_eq!(f32s, [0.5, -1.25]);
            let mut f64s = [0.0f64; 2];
            peer.receive_into(&mut f64s[..], 9).unwrap();
            assert_eq!(f64s, [0.1, -2.5]);
            let mut usizes = [0usize; 2];
            peer.receive_into(&mut usizes[..], 10).unwrap();
            assert_eq!(usizes, [usize::MAX, 7]);
            let mut isizes = [0isize; 2];
            peer.receive_into(&mut isizes[..], 11).unwrap();
            assert_eq!(isizes, [isize::MIN, -7]);
        }
    });
}

#[test]
fn zero_length_messages_round_trip() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            world.process_at_rank(1).send(&[0u8; 0][..], 1).unwrap();
        } else {
            let mut empty = [0u8; 0];
            world.process_at_rank(0).receive_into(&mut empty[..], 1).unwrap();
        }
    });
}

#[test]
fn a_large_random_message_survives_an_echo() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let mut rng = StdRng::from_seed([21; 32]);
            let outbox: Vec<u64> = (0..4096).map(|_| rng.gen()).collect();
            world.process_at_rank(1).send(&outbox, 0).unwrap();
            let mut echoed = vec![0u64; 4096];
            world.process_at_rank(1).receive_into(&mut echoed, 0).unwrap();
            assert_eq!(echoed, outbox);
        } else {
            let mut inbox = vec![0u64; 4096];
            world.process_at_rank(0).receive_into(&mut inbox, 0).unwrap();
            world.process_at_rank(0).send(&inbox, 0).unwrap();
        }
    });
}

#[test]
fn the_wildcard_source_collects_from_every_peer() {
    run_ranks(3, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let mut seen = [false; 3];
            for _ in 0..2 {
                let mut senders = [0i32; 1];
                world.any_process().receive_into(&mut senders[..], 2).unwrap();
                seen[senders[0] as usize] = true;
            }
            assert_eq!(seen, [false, true, true]);
        } else {
            world.process_at_rank(0).send(&[rank][..], 2).unwrap();
        }
    });
}

#[test]
fn tags_keep_message_streams_apart() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let peer = world.process_at_rank(1);
            peer.send(&[111u32][..], 5).unwrap();
            peer.send(&[222u32][..], 6).unwrap();
        } else {
            let peer = world.process_at_rank(0);
            // Claim the later message first by asking for its tag.
            let mut second = [0u32; 1];
            peer.receive_into(&mut second[..], 6).unwrap();
            assert_eq!(second, [222]);
            let mut first = [0u32; 1];
            peer.receive_into(&mut first[..], 5).unwrap();
            assert_eq!(first, [111]);
        }
    });
}

#[test]
fn a_process_can_message_itself() {
    run_ranks(1, |universe, _| {
        let world = universe.world().unwrap();
        world.process_at_rank(0).send(&[13u16, 17][..], 4).unwrap();
        let mut inbox = [0u16; 2];
        world.process_at_rank(0).receive_into(&mut inbox[..], 4).unwrap();
        assert_eq!(inbox, [13, 17]);
    });
}

#[test]
fn a_short_message_fills_only_the_buffer_prefix() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            world.process_at_rank(1).send(&[1u64, 2][..], 0).unwrap();
        } else {
            let mut inbox = [9u64; 4];
            world.process_at_rank(0).receive_into(&mut inbox[..], 0).unwrap();
            assert_eq!(inbox, [1, 2, 9, 9]);
        }
    });
}

#[test]
fn mismatched_element_kinds_fail_the_receive() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            world.process_at_rank(1).send(&[1u32, 2][..], 0).unwrap();
        } else {
            let mut inbox = [0.0f32; 2];
            let error = world
                .process_at_rank(0)
                .receive_into(&mut inbox[..], 0)
                .unwrap_err();
            assert!(matches!(error, CommError::Transport { .. }));
            assert_eq!(inbox, [0.0, 0.0]);
        }
    });
}

#[test]
fn an_oversized_message_fails_the_receive() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            world.process_at_rank(1).send(&[0u64; 4][..], 0).unwrap();
        } else {
            let mut inbox = [0u64; 2];
            let error = world
                .process_at_rank(0)
                .receive_into(&mut inbox[..], 0)
                .unwrap_err();
            assert!(matches!(error, CommError::Transport { .. }));
        }
    });
}
