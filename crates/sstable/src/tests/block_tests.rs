use crate::block::{Block, RecordReader};
use crate::format::{separator_between, shared_prefix_len};

// --------------------- Key helpers ---------------------

#[test]
fn shared_prefix_lengths() {
    assert_eq!(shared_prefix_len(b"ab", b"abc"), 2);
    assert_eq!(shared_prefix_len(b"ab", b"c"), 0);
    assert_eq!(shared_prefix_len(b"", b"abc"), 0);
    assert_eq!(shared_prefix_len(b"same", b"same"), 4);
}

#[test]
fn separator_with_empty_left_bound() {
    assert_eq!(separator_between(b"", b"b"), b"a".to_vec());
    assert_eq!(separator_between(b"", b"hello"), b"helln".to_vec());
}

#[test]
fn separator_with_nonempty_left_bound_is_the_bound() {
    assert_eq!(separator_between(b"abcd", b"abce"), b"abcd".to_vec());
    assert_eq!(separator_between(b"a", b"z"), b"a".to_vec());
}

#[test]
fn separator_drops_undecrementable_trailing_zero() {
    let sep = separator_between(b"", &[b'a', 0x00]);
    assert_eq!(sep, b"a".to_vec());
    assert!(sep.as_slice() < &[b'a', 0x00][..]);
}

// --------------------- Encode / decode ---------------------

#[test]
fn roundtrip_with_prefix_chain() {
    let mut block = Block::new();
    let records = [
        (&b"apple"[..], &b"1"[..]),
        (b"applesauce", b"2"),
        (b"apricot", b"3"),
        (b"banana", b""),
        (b"bandana", b"5"),
    ];
    for (k, v) in records {
        block.append(k, v);
    }
    assert_eq!(block.entries_cnt(), 5);

    let mut buf = Vec::new();
    let n = block.flush_to(&mut buf);
    assert_eq!(n as usize, buf.len());

    let decoded = RecordReader::new(&buf).read_all().unwrap();
    assert_eq!(decoded.len(), 5);
    for (i, (k, v)) in records.iter().enumerate() {
        assert_eq!(decoded[i].key, k.to_vec());
        assert_eq!(decoded[i].value, v.to_vec());
    }
}

#[test]
fn decoded_keys_are_strictly_increasing() {
    let mut block = Block::new();
    for i in 0..200u32 {
        block.append(format!("key{:05}", i).as_bytes(), &i.to_be_bytes());
    }
    let mut buf = Vec::new();
    block.flush_to(&mut buf);

    let decoded = RecordReader::new(&buf).read_all().unwrap();
    for window in decoded.windows(2) {
        assert!(window[0].key < window[1].key);
    }
}

#[test]
fn prefix_compression_shrinks_shared_keys() {
    let mut verbose = Block::new();
    let mut compressed = Block::new();

    verbose.append(b"aaaaaaaaaa0", b"v");
    compressed.append(b"aaaaaaaaaa0", b"v");
    let lone = verbose.size();

    verbose.flush_to(&mut Vec::new()); // reset the prefix chain
    verbose.append(b"zzzzzzzzzz1", b"v");
    compressed.append(b"aaaaaaaaaa1", b"v");

    // The second record shares 10 bytes with its predecessor.
    assert_eq!(compressed.size(), lone + lone - 10);
    assert_eq!(verbose.size(), lone);
}

#[test]
fn flush_resets_prefix_state() {
    let mut block = Block::new();
    block.append(b"shared-prefix-a", b"1");
    let mut buf = Vec::new();
    block.flush_to(&mut buf);

    // After a flush the next record must not reference the old prev_key.
    block.append(b"shared-prefix-b", b"2");
    let mut buf2 = Vec::new();
    block.flush_to(&mut buf2);

    // First varint of the fresh block is shared_prefix_len == 0.
    assert_eq!(buf2[0], 0);
    let decoded = RecordReader::new(&buf2).read_all().unwrap();
    assert_eq!(decoded[0].key, b"shared-prefix-b".to_vec());
}

#[test]
fn concatenated_blocks_decode_as_one_stream() {
    let mut stream = Vec::new();
    let mut block = Block::new();
    block.append(b"alpha", b"1");
    block.append(b"alpine", b"2");
    block.flush_to(&mut stream);
    block.append(b"beta", b"3");
    block.append(b"betamax", b"4");
    block.flush_to(&mut stream);

    let decoded = RecordReader::new(&stream).read_all().unwrap();
    let keys: Vec<_> = decoded.iter().map(|kv| kv.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            b"alpha".to_vec(),
            b"alpine".to_vec(),
            b"beta".to_vec(),
            b"betamax".to_vec()
        ]
    );
}

// --------------------- Corruption ---------------------

#[test]
fn truncated_payload_is_an_error() {
    let mut block = Block::new();
    block.append(b"key", b"a long enough value");
    let mut buf = Vec::new();
    block.flush_to(&mut buf);

    let cut = &buf[..buf.len() - 4];
    assert!(RecordReader::new(cut).read_all().is_err());
}

#[test]
fn impossible_shared_prefix_is_an_error() {
    // First record claims to share 3 bytes with a nonexistent predecessor.
    let mut buf = Vec::new();
    varint::put_uvarint(&mut buf, 3);
    varint::put_uvarint(&mut buf, 1);
    varint::put_uvarint(&mut buf, 0);
    buf.push(b'x');

    assert!(RecordReader::new(&buf).read_all().is_err());
}

#[test]
fn empty_buffer_is_clean_eof() {
    assert!(RecordReader::new(&[]).read_all().unwrap().is_empty());
}
