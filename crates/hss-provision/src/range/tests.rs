use super::*;

fn imsi(raw: &str) -> Imsi {
    raw.parse().unwrap()
}

fn strings<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn leading_zeros_survive_expansion() {
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(3), None).unwrap();
    assert_eq!(
        strings(&range.imsis()),
        ["001010000000001", "001010000000002", "001010000000003"]
    );
}

#[test]
fn count_identifiers_strictly_increasing() {
    for (start, count) in [
        ("001010000000001", 1),
        ("000000000000000", 17),
        ("310150123456789", 250),
        ("999999999999000", 1000),
    ] {
        let start = imsi(start);
        let range = expand_range(start, RangeBound::Count(count), None).unwrap();
        let imsis = range.imsis();

        assert_eq!(imsis.len() as i64, count);
        assert_eq!(imsis[0], start);
        assert_eq!(
            imsis.last().unwrap().to_string(),
            format!("{:015}", start.value() + count as u64 - 1)
        );
        assert!(imsis.windows(2).all(|w| w[0] < w[1]));
        assert!(imsis.iter().all(|i| i.to_string().len() == 15));
    }
}

#[test]
fn count_bounds() {
    let start = imsi("001010000000001");
    assert_eq!(
        expand_range(start, RangeBound::Count(1000), None).unwrap().total(),
        1000
    );
    for count in [1001, 0, -5] {
        let err = expand_range(start, RangeBound::Count(count), None).unwrap_err();
        assert_eq!(err.field(), Some("count"), "count {count}");
    }
}

#[test]
fn count_may_not_overflow_fifteen_digits() {
    let err = expand_range(imsi("999999999999999"), RangeBound::Count(2), None).unwrap_err();
    assert_eq!(err.field(), Some("count"));
    expand_range(imsi("999999999999999"), RangeBound::Count(1), None).unwrap();
}

#[test]
fn end_must_follow_start() {
    let start = imsi("001010000000005");
    for end in ["001010000000005", "001010000000004"] {
        let err = expand_range(start, RangeBound::End(imsi(end)), None).unwrap_err();
        assert_eq!(err.field(), Some("imsi_end"));
    }
}

#[test]
fn end_is_inclusive() {
    let range = expand_range(
        imsi("001010000000001"),
        RangeBound::End(imsi("001010000000010")),
        None,
    )
    .unwrap();
    assert_eq!(range.total(), 10);
    assert_eq!(range.end(), imsi("001010000000010"));
}

#[test]
fn end_range_respects_ceiling() {
    let start = imsi("001010000000001");
    let ok = RangeBound::End(imsi("001010000001000"));
    let too_far = RangeBound::End(imsi("001010000001001"));
    assert_eq!(expand_range(start, ok, None).unwrap().total(), 1000);
    assert_eq!(
        expand_range(start, too_far, None).unwrap_err().field(),
        Some("imsi_end")
    );
}

#[test]
fn msisdn_pairs_by_offset() {
    let msisdn: Msisdn = "1000000000".parse().unwrap();
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(3), Some(&msisdn)).unwrap();
    let entries = range.collect_all();

    assert_eq!(
        strings(&range.msisdns().unwrap()),
        ["1000000000", "1000000001", "1000000002"]
    );
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.offset, i as u64);
        assert_eq!(entry.imsi.value(), 1_010_000_000_001 + i as u64);
    }
}

#[test]
fn msisdn_keeps_start_width() {
    let msisdn: Msisdn = "0049170000099".parse().unwrap();
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(2), Some(&msisdn)).unwrap();
    assert_eq!(
        strings(&range.msisdns().unwrap()),
        ["0049170000099", "0049170000100"]
    );
}

#[test]
fn msisdn_too_long_is_rejected() {
    let msisdn: Msisdn = "1".repeat(39).parse().unwrap();
    let err = expand_range(imsi("001010000000001"), RangeBound::Count(2), Some(&msisdn)).unwrap_err();
    assert_eq!(err.field(), Some("msisdn_start"));
}

#[test]
fn unpaired_range_has_no_msisdns() {
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(2), None).unwrap();
    assert!(range.msisdns().is_none());
    assert!(range.collect_all().iter().all(|e| e.msisdn.is_none()));
}

#[test]
fn iteration_is_lazy_and_restartable() {
    let mut range = expand_range(imsi("001010000000001"), RangeBound::Count(5), None).unwrap();
    assert_eq!(range.len(), 5);
    assert_eq!(range.next().unwrap().imsi, imsi("001010000000001"));
    assert_eq!(range.next().unwrap().imsi, imsi("001010000000002"));
    assert_eq!(range.len(), 3);

    let again = range.restart();
    assert_eq!(again.len(), 5);
    assert_eq!(range.by_ref().count(), 3);
    assert!(range.next().is_none());
    assert_eq!(range.collect_all().len(), 5);
}

#[test]
fn preview_materializes_at_most_ten() {
    let msisdn: Msisdn = "4912300".parse().unwrap();
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(1000), Some(&msisdn)).unwrap();
    let preview = range.preview();
    assert_eq!(preview.count, 1000);
    assert_eq!(preview.imsis.len(), PREVIEW_LEN);
    assert_eq!(preview.msisdns.as_ref().unwrap().len(), PREVIEW_LEN);
    assert_eq!(preview.imsi_end, imsi("001010000001000"));

    let small = expand_range(imsi("001010000000001"), RangeBound::Count(3), None).unwrap();
    let preview = small.preview();
    assert_eq!(preview.imsis.len(), 3);
    assert!(preview.msisdns.is_none());
}

#[test]
fn preview_serializes_camel_case() {
    let range = expand_range(imsi("001010000000001"), RangeBound::Count(2), None).unwrap();
    let json = serde_json::to_value(range.preview()).unwrap();
    assert_eq!(json["imsiStart"], "001010000000001");
    assert_eq!(json["imsiEnd"], "001010000000002");
    assert_eq!(json["count"], 2);
}

#[test]
fn request_names_offending_field() {
    let cases = [
        (RangeRequest::with_count("00101000000001", 3), "imsi_start"),
        (RangeRequest::with_count("00101000000000x", 3), "imsi_start"),
        (RangeRequest::with_end("001010000000001", "1"), "imsi_end"),
        (
            RangeRequest::with_count("001010000000001", 3).msisdn_start("12ab"),
            "msisdn_start",
        ),
        (
            RangeRequest {
                imsi_start: "001010000000001".to_string(),
                ..Default::default()
            },
            "count",
        ),
        (
            RangeRequest {
                imsi_start: "001010000000001".to_string(),
                count: Some(2),
                imsi_end: Some("001010000000002".to_string()),
                msisdn_start: None,
            },
            "count",
        ),
    ];
    for (request, field) in cases {
        let err = request.expand().unwrap_err();
        assert_eq!(err.field(), Some(field), "{request:?}");
    }
}

#[test]
fn request_expands_end_form() {
    let range = RangeRequest::with_end("001010000000001", "001010000000004")
        .msisdn_start("700")
        .expand()
        .unwrap();
    assert_eq!(range.total(), 4);
    assert_eq!(strings(&range.msisdns().unwrap()), ["700", "701", "702", "703"]);
}
