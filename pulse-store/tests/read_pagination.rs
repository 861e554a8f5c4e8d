//! End-to-end paging over an in-memory row set: records are encoded through
//! the steps table definition, paged with the tie-preserving cursor, and
//! decoded back: the same path the Postgres store drives, minus the pool.

use chrono::DateTime;
use pulse_core::{PageToken, Record, RecordCommon, RecordTime, RecordingMethod};
use pulse_store::pagination::paginate;
use pulse_store::sql::RowValues;
use pulse_store::table::{IdentityNames, RecordTableDef};
use pulse_store::tables::StepsTable;
use std::collections::HashMap;
use uuid::Uuid;

const APP_ID: i64 = 11;
const DEVICE_ID: i64 = 21;

fn steps_record(start_millis: i64, count: i64) -> Record {
    Record::Steps {
        common: RecordCommon {
            uuid: Uuid::new_v4(),
            package_name: "com.example.tracker".to_string(),
            device_id: "watch-1".to_string(),
            last_modified: DateTime::from_timestamp_millis(start_millis + 10).unwrap(),
            client_record_id: None,
            client_record_version: None,
            recording_method: RecordingMethod::AutomaticallyRecorded,
        },
        time: RecordTime::Interval {
            start: DateTime::from_timestamp_millis(start_millis).unwrap(),
            end: DateTime::from_timestamp_millis(start_millis + 60_000).unwrap(),
            start_zone_offset_secs: 0,
            end_zone_offset_secs: 0,
        },
        count,
    }
}

/// Encode records into stored rows, as the upsert path would.
fn stored_rows(records: &[Record]) -> Vec<(i64, RowValues)> {
    records
        .iter()
        .map(|record| {
            let request = StepsTable
                .upsert_request(record, APP_ID, DEVICE_ID)
                .expect("upsert request");
            (record.time().start_millis(), request.row().clone())
        })
        .collect()
}

fn identity_maps() -> (HashMap<i64, String>, HashMap<i64, String>) {
    let mut apps = HashMap::new();
    apps.insert(APP_ID, "com.example.tracker".to_string());
    let mut devices = HashMap::new();
    devices.insert(DEVICE_ID, "watch-1".to_string());
    (apps, devices)
}

/// One simulated page read: filter by token anchor, sort, paginate, decode.
fn read_page(
    rows: &[(i64, RowValues)],
    page_size: usize,
    token: Option<PageToken>,
) -> (Vec<Record>, Option<PageToken>) {
    let mut visible: Vec<(i64, RowValues)> = match token {
        Some(token) => rows
            .iter()
            .filter(|(t, _)| *t >= token.time_millis)
            .cloned()
            .collect(),
        None => rows.to_vec(),
    };
    visible.sort_by_key(|(t, _)| *t);

    let page = paginate(visible, page_size, true);
    let (apps, devices) = identity_maps();
    let identities = IdentityNames {
        apps: &apps,
        devices: &devices,
    };
    let records = page
        .items
        .iter()
        .map(|row| StepsTable.decode_row(row, &identities).expect("decode"))
        .collect();
    (records, page.next_token)
}

#[test]
fn paged_reads_match_an_unpaged_read() {
    // Duplicate timestamps at 2000 and 4000 force tie handling.
    let starts = [1_000, 2_000, 2_000, 2_000, 3_000, 4_000, 4_000, 5_000];
    let records: Vec<Record> = starts
        .iter()
        .enumerate()
        .map(|(i, start)| steps_record(*start, i as i64 * 100))
        .collect();
    let rows = stored_rows(&records);

    for page_size in 1..=starts.len() {
        let mut collected: Vec<Record> = Vec::new();
        let mut token: Option<PageToken> = None;
        let mut pages = 0;
        loop {
            let (records, next) = read_page(&rows, page_size, token);
            assert!(
                !records.is_empty() || next.is_none(),
                "a page with rows remaining must never be empty"
            );
            collected.extend(records);
            pages += 1;
            assert!(pages < 50, "no forward progress at page_size {page_size}");
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        let uuids: Vec<Uuid> = collected.iter().map(|r| r.common().uuid).collect();
        let expected: Vec<Uuid> = records.iter().map(|r| r.common().uuid).collect();
        assert_eq!(uuids, expected, "page_size {page_size}");
    }
}

#[test]
fn a_page_never_tears_a_timestamp_group() {
    let starts = [1_000, 2_000, 2_000, 2_000, 3_000];
    let records: Vec<Record> = starts.iter().map(|s| steps_record(*s, 1)).collect();
    let rows = stored_rows(&records);

    // Page size 2 cannot hold the three-record group at 2000: the page
    // stops after the first record and anchors at 2000.
    let (page, token) = read_page(&rows, 2, None);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].time().start_millis(), 1_000);
    let token = token.expect("more rows remain");
    assert_eq!(token.time_millis, 2_000);

    // The next page returns the whole group, oversized or not.
    let (page, token) = read_page(&rows, 2, Some(token));
    assert_eq!(page.len(), 3);
    assert!(page.iter().all(|r| r.time().start_millis() == 2_000));
    let token = token.expect("one more row remains");

    let (page, token) = read_page(&rows, 2, Some(token));
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].time().start_millis(), 3_000);
    assert!(token.is_none());
}

#[test]
fn tokens_survive_the_opaque_round_trip() {
    let starts = [1_000, 2_000, 3_000];
    let records: Vec<Record> = starts.iter().map(|s| steps_record(*s, 1)).collect();
    let rows = stored_rows(&records);

    let (_, token) = read_page(&rows, 1, None);
    let raw = token.expect("token").encode();

    // A caller hands the raw value back; decoding restores the anchor.
    let decoded = PageToken::decode(raw).expect("valid token");
    let (page, _) = read_page(&rows, 1, Some(decoded));
    assert_eq!(page[0].time().start_millis(), 2_000);
}
