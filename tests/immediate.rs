//! Immediate-mode transfers and their requests.

mod common;

use std::thread;

use commlink::traits::*;

use common::run_ranks;

#[test]
fn a_test_loop_drives_a_send_to_completion() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let outbox = [2.5f64, 3.5, 4.5];
            let mut request = world
                .process_at_rank(1)
                .immediate_send(&outbox[..], 0)
                .unwrap();
            while !request.test() {
                thread::yield_now();
            }
            assert!(request.is_resolved());
        } else {
            let mut inbox = [0.0f64; 3];
            world.process_at_rank(0).receive_into(&mut inbox[..], 0).unwrap();
            assert_eq!(inbox, [2.5, 3.5, 4.5]);
        }
    });
}

#[test]
fn waiting_on_a_receive_delivers_the_payload() {
    run_ranks(2, |universe, rank| {
        let world = universe.world().unwrap();
        if rank == 0 {
            let mut inbox = [0u32; 2];
            let mut request = world
                .any_process()
                .immediate_receive_into(&mut inbox[..], 9)
                .unwrap();
            request.wait();
            assert!(request.is_resolved());
            drop(request);
            assert_eq!(inbox, [600, 601]);
        } else {
            world.process_at_rank(0).send(&[600u32, 601][..], 9).unwrap();
        }
    });
}

#[test]
fn an_unmatched_receive_can_be_cancelled() {
    run_ranks(1, |universe, _| {
        let world = universe.world().unwrap();
        let mut inbox = [5u8; 2];
        let mut request = world
            .any_process()
            .immediate_receive_into(&mut inbox[..], 0)
            .unwrap();
        assert!(!request.test());
        request.cancel();
        request.wait();
        assert!(request.is_resolved());
        drop(request);
        // Nothing was delivered.
        assert_eq!(inbox, [5, 5]);
    });
}

#[test]
fn cancelling_a_matched_receive_keeps_its_payload() {
    run_ranks(1, |universe, _| {
        let world = universe.world().unwrap();
        world.process_at_rank(0).send(&[33u8][..], 0).unwrap();

        let mut inbox = [0u8; 1];
        let mut request = world
            .process_at_rank(0)
            .immediate_receive_into(&mut inbox[..], 0)
            .unwrap();
        // The message was already queued, so the receive matched on posting
        // and the cancel arrives too late.
        request.cancel();
        request.wait();
        assert!(request.is_resolved());
        drop(request);
        assert_eq!(inbox, [33]);
    });
}

#[test]
fn posted_receives_match_in_order() {
    run_ranks(1, |universe, _| {
        let world = universe.world().unwrap();
        let me = world.process_at_rank(0);
        me.send(&[1u64][..], 7).unwrap();
        me.send(&[2u64][..], 7).unwrap();

        let mut first = [0u64; 1];
        let mut second = [0u64; 1];
        let mut one = me.immediate_receive_into(&mut first[..], 7).unwrap();
        let mut two = me.immediate_receive_into(&mut second[..], 7).unwrap();
        one.wait();
        two.wait();
        assert!(one.is_resolved() && two.is_resolved());
        drop(one);
        drop(two);
        assert_eq!(first, [1]);
        assert_eq!(second, [2]);
    });
}

#[test]
fn dropping_an_in_flight_request_is_safe() {
    run_ranks(1, |universe, _| {
        let world = universe.world().unwrap();
        let mut inbox = [0u8; 1];
        let request = world
            .any_process()
            .immediate_receive_into(&mut inbox[..], 1)
            .unwrap();
        drop(request);

        // The endpoint keeps working afterwards.
        world.process_at_rank(0).send(&[4u8][..], 2).unwrap();
        let mut next = [0u8; 1];
        world.process_at_rank(0).receive_into(&mut next[..], 2).unwrap();
        assert_eq!(next, [4]);
    });
}
