use super::*;

use alloy_primitives::Address;

/// Reads the 32-byte word at `byte_offset` within the argument block
/// (after the 4-byte selector).
fn arg_word(data: &[u8], byte_offset: usize) -> u64 {
    let word = U256::from_be_slice(&data[4 + byte_offset..4 + byte_offset + 32]);
    u64::try_from(word).expect("word fits u64")
}

#[test]
fn selector_is_the_signature_hash_prefix() {
    let hash = keccak256(ASK_QUESTION_SIGNATURE.as_bytes());
    assert_eq!(&*ASK_QUESTION_SELECTOR, &hash[..4]);
    assert_eq!(
        *RESPONSE_RECEIVED_TOPIC,
        keccak256(RESPONSE_RECEIVED_SIGNATURE.as_bytes())
    );
}

#[test]
fn encodes_question_with_empty_args() {
    let data = encode_ask_question("q", &[]);
    // selector + 2 head words + encoded question (2 words) + array length
    assert_eq!(data.len(), 4 + 32 * 5);
    assert_eq!(arg_word(&data, 0), 0x40, "question offset");
    assert_eq!(arg_word(&data, 0x20), 0x80, "args offset");
    assert_eq!(arg_word(&data, 0x40), 1, "question length");
    assert_eq!(data[4 + 0x60], b'q');
    assert_eq!(arg_word(&data, 0x80), 0, "array length");
}

#[test]
fn encodes_question_with_two_args() {
    let data = encode_ask_question("hi", &["a".to_string(), "bc".to_string()]);
    assert_eq!(data.len(), 4 + 32 * 11);

    assert_eq!(arg_word(&data, 0), 0x40, "question offset");
    assert_eq!(arg_word(&data, 0x20), 0x80, "args offset");
    assert_eq!(arg_word(&data, 0x40), 2, "question length");
    assert_eq!(&data[4 + 0x60..4 + 0x62], b"hi");

    // array block starts at 0x80: length, then element offsets relative to
    // the element area at 0xa0
    assert_eq!(arg_word(&data, 0x80), 2, "array length");
    assert_eq!(arg_word(&data, 0xa0), 0x40, "first element offset");
    assert_eq!(arg_word(&data, 0xc0), 0x80, "second element offset");
    assert_eq!(arg_word(&data, 0xe0), 1, "first element length");
    assert_eq!(data[4 + 0x100], b'a');
    assert_eq!(arg_word(&data, 0x120), 2, "second element length");
    assert_eq!(&data[4 + 0x140..4 + 0x142], b"bc");
}

#[test]
fn question_bytes_are_zero_padded_to_a_word() {
    let data = encode_ask_question("abc", &[]);
    let padding = &data[4 + 0x60 + 3..4 + 0x80];
    assert!(padding.iter().all(|byte| *byte == 0));
}

fn encoded_bytes_data(payload: &[u8]) -> Bytes {
    let mut data = Vec::new();
    data.extend_from_slice(&U256::from(0x20u64).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(payload.len()).to_be_bytes::<32>());
    let mut padded = payload.to_vec();
    padded.resize(payload.len().div_ceil(32) * 32, 0);
    data.extend_from_slice(&padded);
    Bytes::from(data)
}

fn response_log(topics: Vec<B256>, data: Bytes) -> LogEntry {
    LogEntry {
        address: Address::repeat_byte(0x42),
        topics,
        data,
        block_number: Some(1000),
        transaction_hash: Some(B256::repeat_byte(0x99)),
        removed: false,
    }
}

#[test]
fn decodes_a_response_log() {
    let log = response_log(
        vec![*RESPONSE_RECEIVED_TOPIC, B256::repeat_byte(7)],
        encoded_bytes_data(b"Yes, 62% probability"),
    );
    let event = decode_response_log(&log).expect("decoded");
    assert_eq!(event.request_id, RequestId(B256::repeat_byte(7)));
    assert_eq!(event.payload.as_ref(), b"Yes, 62% probability");
    assert_eq!(event.block_number, Some(1000));
    assert_eq!(event.tx_hash, Some(TxHash(B256::repeat_byte(0x99))));
}

#[test]
fn ignores_other_events() {
    let log = response_log(
        vec![keccak256(b"SomethingElse(bytes32)"), B256::repeat_byte(7)],
        encoded_bytes_data(b"x"),
    );
    assert!(decode_response_log(&log).is_none());
}

#[test]
fn ignores_logs_missing_the_request_id_topic() {
    let log = response_log(vec![*RESPONSE_RECEIVED_TOPIC], encoded_bytes_data(b"x"));
    assert!(decode_response_log(&log).is_none());
}

#[test]
fn ignores_reorged_out_logs() {
    let mut log = response_log(
        vec![*RESPONSE_RECEIVED_TOPIC, B256::repeat_byte(7)],
        encoded_bytes_data(b"x"),
    );
    log.removed = true;
    assert!(decode_response_log(&log).is_none());
}

#[test]
fn rejects_truncated_data() {
    let full = encoded_bytes_data(b"a payload that spans more than one abi word");
    let truncated = Bytes::from(full[..72].to_vec());
    let log = response_log(
        vec![*RESPONSE_RECEIVED_TOPIC, B256::repeat_byte(7)],
        truncated,
    );
    assert!(decode_response_log(&log).is_none());
}

#[test]
fn rejects_an_out_of_range_offset() {
    let mut data = Vec::new();
    data.extend_from_slice(&U256::MAX.to_be_bytes::<32>());
    let log = response_log(
        vec![*RESPONSE_RECEIVED_TOPIC, B256::repeat_byte(7)],
        Bytes::from(data),
    );
    assert!(decode_response_log(&log).is_none());
}
