use std::sync::Arc;
use std::thread;

use mesh_couple::prelude::*;

#[test]
fn no_comm_sends_nowhere_and_cannot_receive() {
    let comm = NoComm;
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.size(), 1);
    assert!(comm.send(0, CommTag::new(0x0100), &[1, 2, 3]).is_ok());
    assert!(comm.recv(0, CommTag::new(0x0100), 3).is_err());
}

#[test]
fn thread_comm_round_trip() {
    let c0 = ThreadComm::new(0, 2);
    let c1 = ThreadComm::new(1, 2);

    let msg = b"coupling";
    c0.send(1, CommTag::new(0x0200), msg).unwrap();
    assert_eq!(c1.recv(0, CommTag::new(0x0200), msg.len()).unwrap(), msg.to_vec());
}

#[test]
fn thread_comm_fifo_order() {
    let c0 = ThreadComm::new(0, 2);
    let c1 = ThreadComm::new(1, 2);

    for i in 0..10u8 {
        c0.send(1, CommTag::new(0x0300), &[i]).unwrap();
    }
    for i in 0..10u8 {
        assert_eq!(c1.recv(0, CommTag::new(0x0300), 1).unwrap(), vec![i]);
    }
}

#[test]
fn messages_arrive_whole_regardless_of_expected_length() {
    let c0 = ThreadComm::new(0, 2);
    let c1 = ThreadComm::new(1, 2);

    // Length enforcement is the typed layer's job; the transport hands the
    // message over as sent.
    c0.send(1, CommTag::new(0x0400), &[1, 2, 3, 4, 5, 6]).unwrap();
    assert_eq!(
        c1.recv(0, CommTag::new(0x0400), 4).unwrap(),
        vec![1, 2, 3, 4, 5, 6]
    );
}

#[test]
fn tag_streams_are_isolated() {
    let c0 = ThreadComm::new(0, 2);
    let c1 = ThreadComm::new(1, 2);

    c0.send(1, CommTag::new(0x0501), &[0xB0, 0xB1]).unwrap();
    c0.send(1, CommTag::new(0x0500), &[0xA0, 0xA1]).unwrap();

    assert_eq!(c1.recv(0, CommTag::new(0x0500), 2).unwrap(), vec![0xA0, 0xA1]);
    assert_eq!(c1.recv(0, CommTag::new(0x0501), 2).unwrap(), vec![0xB0, 0xB1]);
}

#[test]
fn receives_block_until_the_message_lands() {
    let receiver = thread::spawn(|| {
        let comm = ThreadComm::new(1, 2);
        comm.recv(0, CommTag::new(0x0600), 1).unwrap()
    });
    let comm = ThreadComm::new(0, 2);
    comm.send(1, CommTag::new(0x0600), &[42]).unwrap();
    assert_eq!(receiver.join().unwrap(), vec![42]);
}

#[test]
fn typed_exchange_across_threads() {
    let sender = thread::spawn(|| {
        let link = PeerChannel::new(Arc::new(ThreadComm::new(0, 2)), 1, CommTag::new(0x0700));
        link.send_count(3).unwrap();
        link.send_ids(&[4, -1, 9]).unwrap();
    });
    let receiver = thread::spawn(|| {
        let link = PeerChannel::new(Arc::new(ThreadComm::new(1, 2)), 0, CommTag::new(0x0700));
        let n = link.recv_count().unwrap();
        (n, link.recv_ids(n).unwrap())
    });
    sender.join().unwrap();
    let (n, ids) = receiver.join().unwrap();
    assert_eq!(n, 3);
    assert_eq!(ids, vec![4, -1, 9]);
}
