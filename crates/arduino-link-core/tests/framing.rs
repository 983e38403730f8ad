use arduino_link_core::decoder::{DecoderSettings, Instruction, InstructionDecoder, OverflowPolicy};
use arduino_link_core::link::{ByteBuffer, ByteSource};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn drain(decoder: &InstructionDecoder) -> Vec<Instruction> {
    std::iter::from_fn(|| decoder.next_instruction()).collect()
}

fn unbounded() -> InstructionDecoder {
    InstructionDecoder::new(&DecoderSettings {
        queue_capacity: None,
        ..DecoderSettings::default()
    })
}

#[test]
fn test_two_cycle_scenario() {
    let buf = ByteBuffer::new();
    let mut decoder = unbounded();

    buf.extend(b"J1");
    decoder.poll_and_decode(&buf);
    let first = decoder.next_instruction();

    buf.extend(b"W9");
    decoder.poll_and_decode(&buf);
    let second = decoder.next_instruction();

    assert_eq!(first.map(String::from).as_deref(), Some("J1"));
    assert_eq!(second.map(String::from).as_deref(), Some("W9"));
    assert_eq!(decoder.next_instruction(), None);
}

#[test]
fn test_all_bytes_in_one_cycle_then_drained_over_two_ticks() {
    let buf = ByteBuffer::new();
    let mut decoder = unbounded();
    for b in [b'J', b'1', b'W', b'9'] {
        buf.extend(&[b]);
    }

    assert_eq!(decoder.poll_and_decode(&buf), 2);
    assert_eq!(decoder.next_instruction().unwrap(), "J1");
    assert_eq!(decoder.poll_and_decode(&buf), 0);
    assert_eq!(decoder.next_instruction().unwrap(), "W9");
    assert_eq!(decoder.next_instruction(), None);
}

#[test]
fn test_take_next_byte_on_empty_buffer() {
    let buf = ByteBuffer::new();
    assert_eq!(buf.take_next_byte(), None);
    assert_eq!(buf.take_next_byte(), None);
}

#[test]
fn test_next_instruction_on_empty_queue() {
    let mut decoder = unbounded();
    assert_eq!(decoder.next_instruction(), None);
    decoder.poll_and_decode(&ByteBuffer::new());
    assert_eq!(decoder.next_instruction(), None);
}

#[test]
fn test_trailing_byte_withheld_until_partner_arrives() {
    let buf = ByteBuffer::new();
    let mut decoder = unbounded();

    buf.extend(b"J1W");
    decoder.poll_and_decode(&buf);
    assert_eq!(drain(&decoder), vec![Instruction::new(b'J', b'1')]);
    assert_eq!(decoder.pending_byte(), Some(b'W'));

    // Nothing new: the odd byte is neither emitted alone nor dropped
    decoder.poll_and_decode(&buf);
    assert!(drain(&decoder).is_empty());

    buf.extend(b"9");
    decoder.poll_and_decode(&buf);
    assert_eq!(drain(&decoder), vec![Instruction::new(b'W', b'9')]);
    assert_eq!(decoder.pending_byte(), None);
}

#[test]
fn test_byte_at_a_time_delivery() {
    let buf = ByteBuffer::new();
    let mut decoder = unbounded();
    let mut out = Vec::new();
    for &b in b"U0D01x2y" {
        buf.extend(&[b]);
        decoder.poll_and_decode(&buf);
        out.extend(drain(&decoder).into_iter().map(String::from));
    }
    assert_eq!(out, vec!["U0", "D0", "1x", "2y"]);
}

#[test]
fn test_drop_oldest_keeps_most_recent() {
    let buf = ByteBuffer::new();
    buf.extend(b"A1A2A3A4A5");
    let mut decoder = InstructionDecoder::new(&DecoderSettings {
        queue_capacity: Some(2),
        overflow: OverflowPolicy::DropOldest,
        stale_after_ms: None,
    });
    decoder.poll_and_decode(&buf);
    let got: Vec<String> = drain(&decoder).into_iter().map(String::from).collect();
    assert_eq!(got, vec!["A4", "A5"]);
    assert_eq!(decoder.dropped_count(), 3);
}

proptest! {
    #[test]
    fn prop_even_input_yields_consecutive_pairs(pairs in proptest::collection::vec(any::<[u8; 2]>(), 0..200)) {
        let bytes: Vec<u8> = pairs.iter().flatten().copied().collect();
        let buf = ByteBuffer::new();
        buf.extend(&bytes);

        let mut decoder = unbounded();
        decoder.poll_and_decode(&buf);
        let tokens = drain(&decoder);

        prop_assert_eq!(tokens.len(), bytes.len() / 2);
        for (token, pair) in tokens.iter().zip(&pairs) {
            prop_assert_eq!(token.bytes(), *pair);
        }
        prop_assert_eq!(decoder.pending_byte(), None);
    }

    #[test]
    fn prop_odd_input_withholds_exactly_last_byte(
        bytes in proptest::collection::vec(any::<u8>(), 1..200).prop_filter("odd", |b| b.len() % 2 == 1),
        partner in any::<u8>(),
    ) {
        let buf = ByteBuffer::new();
        buf.extend(&bytes);
        let mut decoder = unbounded();
        decoder.poll_and_decode(&buf);

        prop_assert_eq!(decoder.queued(), bytes.len() / 2);
        prop_assert_eq!(decoder.pending_byte(), bytes.last().copied());

        let _ = drain(&decoder);
        buf.extend(&[partner]);
        decoder.poll_and_decode(&buf);
        let tokens = drain(&decoder);
        prop_assert_eq!(tokens, vec![Instruction::new(*bytes.last().unwrap(), partner)]);
    }
}
