//! Hand-rolled ABI support for the two orchestrator contract operations:
//! the `askQuestion(string,string[])` write and the
//! `ResponseReceived(bytes32,bytes)` event.

use std::sync::LazyLock;

use alloy_primitives::{keccak256, Bytes, B256, U256};

use shared::{
    domain::{RequestId, ResponseEvent, TxHash},
    protocol::LogEntry,
};

pub const ASK_QUESTION_SIGNATURE: &str = "askQuestion(string,string[])";
pub const RESPONSE_RECEIVED_SIGNATURE: &str = "ResponseReceived(bytes32,bytes)";

pub static ASK_QUESTION_SELECTOR: LazyLock<[u8; 4]> = LazyLock::new(|| {
    let hash = keccak256(ASK_QUESTION_SIGNATURE.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
});

pub static RESPONSE_RECEIVED_TOPIC: LazyLock<B256> =
    LazyLock::new(|| keccak256(RESPONSE_RECEIVED_SIGNATURE.as_bytes()));

const WORD: usize = 32;

/// Calldata for `askQuestion(question, args)`.
pub fn encode_ask_question(question: &str, args: &[String]) -> Bytes {
    let mut out = Vec::with_capacity(4 + WORD * (4 + 2 * args.len()));
    out.extend_from_slice(&*ASK_QUESTION_SELECTOR);

    // two dynamic arguments: offsets first, tails after
    let question_offset = 2 * WORD;
    let args_offset = question_offset + encoded_string_len(question);
    push_word(&mut out, question_offset);
    push_word(&mut out, args_offset);
    push_string(&mut out, question);

    // string[]: length, per-element offsets relative to the element area,
    // then the element tails
    push_word(&mut out, args.len());
    let mut element_offset = args.len() * WORD;
    for arg in args {
        push_word(&mut out, element_offset);
        element_offset += encoded_string_len(arg);
    }
    for arg in args {
        push_string(&mut out, arg);
    }

    Bytes::from(out)
}

/// Decodes a `ResponseReceived` log. `None` when the log is some other
/// event, was removed in a reorg, or carries malformed data.
pub fn decode_response_log(log: &LogEntry) -> Option<ResponseEvent> {
    if log.removed {
        return None;
    }
    if log.topics.first() != Some(&*RESPONSE_RECEIVED_TOPIC) {
        return None;
    }
    let request_id = RequestId(*log.topics.get(1)?);
    let payload = decode_bytes_argument(&log.data)?;
    Some(ResponseEvent {
        request_id,
        payload,
        block_number: log.block_number,
        tx_hash: log.transaction_hash.map(TxHash),
    })
}

fn encoded_string_len(s: &str) -> usize {
    WORD + padded_len(s.len())
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

fn push_word(out: &mut Vec<u8>, value: usize) {
    out.extend_from_slice(&U256::from(value).to_be_bytes::<WORD>());
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    push_word(out, s.len());
    out.extend_from_slice(s.as_bytes());
    out.resize(out.len() + padded_len(s.len()) - s.len(), 0);
}

fn word_as_usize(data: &[u8], byte_offset: usize) -> Option<usize> {
    let word = data.get(byte_offset..byte_offset.checked_add(WORD)?)?;
    let value = U256::from_be_slice(word);
    usize::try_from(value).ok()
}

/// A single ABI-encoded dynamic `bytes` value: offset word, length word,
/// payload.
fn decode_bytes_argument(data: &[u8]) -> Option<Bytes> {
    let offset = word_as_usize(data, 0)?;
    let len = word_as_usize(data, offset)?;
    let start = offset.checked_add(WORD)?;
    let payload = data.get(start..start.checked_add(len)?)?;
    Some(Bytes::from(payload.to_vec()))
}

#[cfg(test)]
#[path = "tests/abi_tests.rs"]
mod tests;
