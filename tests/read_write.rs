use nfc_type2::ndef::{NdefMessage, NdefRecord, TNF_EXTERNAL};
use nfc_type2::sim::MemoryTag;
use nfc_type2::{
    ReaderConfig, TagWriter, TraceEvent, WriteError, read_tag, read_tag_traced,
};

fn decode(tag: &mut MemoryTag) -> Option<Vec<u8>> {
    read_tag(tag, vec![0x04, 0xA1, 0xB2, 0xC3], &ReaderConfig::default()).message
}

#[test]
fn written_message_reads_back() {
    let mut tag = MemoryTag::new(45);
    let message = NdefMessage::new(vec![
        NdefRecord::text("hello", "en"),
        NdefRecord::uri("https://www.example.com"),
    ]);

    let pages = TagWriter::new(&mut tag).write_message(&message).unwrap();
    assert_eq!(pages, 8);

    let decoded = read_tag(&mut tag, vec![], &ReaderConfig::default());
    assert_eq!(decoded.message, Some(message.encode().unwrap()));
    let parsed = decoded.ndef().unwrap().unwrap();
    assert_eq!(parsed, message);
    assert_eq!(parsed.text().as_deref(), Some("hello"));
    assert_eq!(
        parsed.records[1].uri_content().as_deref(),
        Some("https://www.example.com")
    );
}

#[test]
fn every_short_length_round_trips() {
    for len in 1..200usize {
        let mut tag = MemoryTag::new(256);
        let bytes: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
        TagWriter::new(&mut tag).write_bytes(&bytes).unwrap();

        let decoded = read_tag(&mut tag, vec![], &ReaderConfig::default());
        assert_eq!(decoded.message.as_deref(), Some(&bytes[..]), "length {}", len);
    }
}

#[test]
fn rewriting_the_same_message_changes_nothing() {
    let mut tag = MemoryTag::new(45);
    let message = NdefMessage::new(vec![NdefRecord::android_app("com.example.app")]);

    TagWriter::new(&mut tag).write_message(&message).unwrap();
    let first_memory = tag.data().to_vec();
    let first_read = decode(&mut tag);

    TagWriter::new(&mut tag).write_message(&message).unwrap();
    assert_eq!(tag.data(), &first_memory[..]);
    assert_eq!(decode(&mut tag), first_read);
    assert_eq!(first_read, Some(message.encode().unwrap()));
}

#[test]
fn extended_length_round_trip() {
    let mut tag = MemoryTag::new(256);
    let payload: Vec<u8> = (0..293u16).map(|i| i as u8).collect();
    let message = NdefMessage::new(vec![NdefRecord::external(b"a", payload)]);
    let encoded = message.encode().unwrap();
    assert_eq!(encoded.len(), 300);

    TagWriter::new(&mut tag).write_bytes(&encoded).unwrap();
    assert_eq!(&tag.data()[..4], &[0x03, 0xFF, 0x01, 0x2C]);

    let decoded = read_tag(&mut tag, vec![], &ReaderConfig::default());
    assert_eq!(decoded.message, Some(encoded));
    let parsed = decoded.ndef().unwrap().unwrap();
    assert_eq!(parsed.records[0].tnf, TNF_EXTERNAL);
    assert_eq!(parsed.records[0].payload.len(), 293);
}

#[test]
fn oversized_message_is_rejected_before_writing() {
    // 12 data pages, capacity 48
    let mut tag = MemoryTag::new(16);
    let err = TagWriter::new(&mut tag).write_bytes(&[0x11; 60]).unwrap_err();
    assert!(matches!(
        err,
        WriteError::Capacity {
            required: 64,
            capacity: 48
        }
    ));
    assert!(tag.writes().is_empty());
}

#[test]
fn failed_page_stops_the_write() {
    let mut tag = MemoryTag::new(45).fail_write_at(6);
    let err = TagWriter::new(&mut tag).write_bytes(&[0x11; 10]).unwrap_err();
    assert!(matches!(err, WriteError::Page { page: 6, .. }));
    assert_eq!(tag.writes(), &[4, 5, 6]);
}

#[test]
fn erased_tag_has_no_message() {
    let mut tag = MemoryTag::new(45);
    let message = NdefMessage::new(vec![NdefRecord::text("gone", "en")]);
    TagWriter::new(&mut tag).write_message(&message).unwrap();

    let pages = TagWriter::new(&mut tag).erase().unwrap();
    // CC says 160 bytes
    assert_eq!(pages, 40);
    assert!(tag.data()[..160].iter().all(|&b| b == 0));
    assert_eq!(decode(&mut tag), None);
}

#[test]
fn unformatted_tag_reads_as_none() {
    let mut tag = MemoryTag::with_data(&[0xFF; 16]);
    assert_eq!(decode(&mut tag), None);
}

#[test]
fn adjacent_tlv_is_taken_over_length_escape() {
    // 03 FF 03 06 -> inner TLV, 6 bytes from offset 4
    let record = [0xD1, 0x01, 0x02, b'U', 0x01, b'a'];
    let mut data = vec![0x03, 0xFF, 0x03, 0x06];
    data.extend_from_slice(&record);
    data.push(0xFE);
    let mut tag = MemoryTag::with_data(&data);

    let decoded = read_tag(&mut tag, vec![], &ReaderConfig::default());
    assert_eq!(decoded.message.as_deref(), Some(&record[..]));
    let parsed = decoded.ndef().unwrap().unwrap();
    assert_eq!(
        parsed.records[0].uri_content().as_deref(),
        Some("http://www.a")
    );
}

#[test]
fn message_behind_lock_control_tlv() {
    let record = [0xD1, 0x01, 0x02, b'U', 0x01, b'a'];
    let mut data = vec![0x01, 0x03, 0xA0, 0x0C, 0x34, 0x03, 0x06];
    data.extend_from_slice(&record);
    data.push(0xFE);
    let mut tag = MemoryTag::with_data(&data);

    assert_eq!(decode(&mut tag).as_deref(), Some(&record[..]));
}

#[test]
fn understated_length_behind_lock_control_tlv() {
    // lock TLV value byte 0x34 followed by 03 04 looks like a record header
    let record = [0xD1, 0x01, 0x02, b'U', 0x01, b'a'];
    let mut data = vec![0x01, 0x03, 0xA0, 0x0C, 0x34, 0x03, 0x04];
    data.extend_from_slice(&record);
    data.push(0xFE);
    let mut tag = MemoryTag::with_data(&data);

    assert_eq!(decode(&mut tag).as_deref(), Some(&record[..]));
}

#[test]
fn understated_length_recovers_whole_record() {
    // TLV claims 4 bytes, the text record is 13
    let mut data = vec![0x03, 0x04, 0xD1, 0x01, 0x09, b'T', 0x02, b'e', b'n'];
    data.extend_from_slice(b"hello!");
    data.push(0xFE);
    let mut tag = MemoryTag::with_data(&data);

    let decoded = read_tag(&mut tag, vec![], &ReaderConfig::default());
    assert_eq!(decoded.message.as_deref(), Some(&data[2..15]));
    let parsed = decoded.ndef().unwrap().unwrap();
    assert_eq!(parsed.text().as_deref(), Some("hello!"));
}

#[test]
fn declared_length_past_readable_memory_is_truncated() {
    // 50 declared, only pages 4..12 readable: 30 payload bytes
    let mut data = vec![0x03, 50];
    data.extend_from_slice(&[0x41; 30]);
    let mut tag = MemoryTag::with_data(&data).readable_pages(12);

    let mut events = Vec::new();
    let decoded = read_tag_traced(&mut tag, vec![], &ReaderConfig::default(), &mut events);
    assert_eq!(decoded.message, Some(vec![0x41; 30]));
    assert!(events.contains(&TraceEvent::Truncated {
        declared: 50,
        available: 30
    }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, TraceEvent::BulkReadFailed { page: 8, .. }))
    );
}

#[test]
fn split_envelopes_are_merged() {
    // 03 FF 03 78 has an implausible inner length, so 0xFF is literal 255
    // and the payload lives in two `03 LL` envelopes.
    let mut data = vec![0x03, 0xFF, 0x03, 0x78];
    data.extend_from_slice(&[b'a'; 120]);
    data.extend_from_slice(&[0x03, 0x50]);
    data.extend_from_slice(&[b'b'; 80]);
    data.push(0xFE);
    let mut tag = MemoryTag::with_data(&data);

    let mut events = Vec::new();
    let decoded = read_tag_traced(&mut tag, vec![], &ReaderConfig::default(), &mut events);

    let mut expected = vec![b'a'; 120];
    expected.extend_from_slice(&[b'b'; 80]);
    assert_eq!(decoded.message, Some(expected));
    assert!(events.contains(&TraceEvent::FragmentsMerged {
        count: 2,
        length: 200
    }));
}
