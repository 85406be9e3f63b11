//! Exercises the framer, shadow diff compressor, and transition engine
//! together without any real hardware: a byte stream in, a write plan and
//! an interpolated frame out.

use std::time::Duration;

use cfa635_dash::framer::Framer;
use cfa635_dash::packet::{Packet, PacketType};
use cfa635_dash::shadow::{diff_cells, diff_leds, Shadow};
use cfa635_dash::transition::{registry, Endpoints};

#[test]
fn framer_recovers_a_packet_from_a_noisy_byte_stream() {
    let packet = Packet::new(PacketType::Request, 0x05, b"hello");
    let mut stream = vec![0x00]; // one garbage byte before the real frame
    stream.extend(packet.to_bytes());

    let mut framer = Framer::new();
    framer.push_bytes(&stream);

    let recovered = framer.next_packet().expect("should recover the packet past garbage");
    assert_eq!(recovered.command(), 0x05);
    assert_eq!(recovered.data(), b"hello");
    assert!(framer.next_packet().is_none(), "buffer should be drained");
}

#[test]
fn shadow_diff_plan_reproduces_the_target_once_applied() {
    let mut sent = Shadow::new(20, 4, 4);
    let mut target = Shadow::new(20, 4, 4);
    sent.write_text_at(0, 0, "FoxDen Industries   ").unwrap();
    target.write_text_at(0, 0, "FoxDen Industries   ").unwrap();
    target.write_text_at(0, 2, "ID 5").unwrap();
    target.set_led(1, 100, 0).unwrap();

    let cell_plan = diff_cells(sent.cells(), target.cells());
    assert!(!cell_plan.is_empty());
    let led_plan = diff_leds(sent.leds(), target.leds());
    assert_eq!(led_plan, vec![(1, 100, 0)]);

    let mut applied = sent.cells().to_vec();
    for range in &cell_plan {
        applied[range.start..range.end].copy_from_slice(&target.cells()[range.start..range.end]);
    }
    assert_eq!(applied, target.cells());
}

#[test]
fn curtain_transition_ends_on_the_target_frame() {
    let from = Endpoints {
        cells: vec![b' '; 80],
        leds: vec![(0, 0); 4],
        width: 20,
        height: 4,
    };
    let mut to_cells = vec![b' '; 80];
    to_cells[0] = b'A';
    let to = Endpoints {
        cells: to_cells.clone(),
        leds: vec![(100, 0); 4],
        width: 20,
        height: 4,
    };

    let ctor = registry()["curtain"];
    let mut transition = ctor(Duration::from_millis(1));
    transition.start(from, to);

    std::thread::sleep(Duration::from_millis(10));
    assert!(transition.render().is_none(), "should have completed by now");
    assert!(!transition.is_running());
}
