//! Persistent cache contract: round-trip, versioning, expiry and row
//! template boundaries.

mod common;

use std::rc::Rc;
use std::time::Duration;

use cmdtree::cache::{Cache, CacheError, OpenOptions, Row, TableOptions};
use cmdtree::cells;
use cmdtree::clock::ManualClock;
use tempfile::TempDir;

fn sorted(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort();
    rows
}

#[test]
fn round_trip_upserts_by_key_prefix() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path())
        .version("2.0")
        .create(true)
        .open("c1")
        .unwrap();
    let t1 = cache
        .table("t1", TableOptions::new().columns(3).keys(2).timeout(3600))
        .unwrap();
    t1.add_rows(&[
        cells!["abc", "b", 1i64],
        cells!["abc", "b", 2i64],
        cells!["abc", "a", 3i64],
    ])
    .unwrap();
    t1.validate().unwrap();
    cache.close(true).unwrap();

    let cache = OpenOptions::new(tmp.path())
        .version("2.0")
        .open("c1")
        .unwrap();
    let t1 = cache.table("t1", TableOptions::new()).unwrap();
    let rows = t1.select(Some(&cells!["abc", "*"])).unwrap();
    assert_eq!(
        sorted(rows),
        vec![cells!["abc", "a", 3i64], cells!["abc", "b", 2i64]]
    );
    assert_eq!(cache.select(None).unwrap(), ["t1"]);
    cache.close(false).unwrap();
}

#[test]
fn reopening_with_another_version_names_both() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path())
        .version("2.0")
        .open("c1")
        .unwrap();
    cache.table("t1", TableOptions::new()).unwrap();
    cache.close(true).unwrap();

    let err = OpenOptions::new(tmp.path())
        .version("1.0")
        .open("c1")
        .err()
        .expect("version mismatch");
    match &err {
        CacheError::VersionMismatch {
            found, requested, ..
        } => {
            assert_eq!(found, "2.0");
            assert_eq!(requested, "1.0");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.to_string().contains("[2.0] does not match [1.0]"));
}

#[test]
fn missing_cache_without_create_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = OpenOptions::new(tmp.path())
        .create(false)
        .open("absent")
        .err()
        .expect("not found");
    assert!(matches!(err, CacheError::NotFound { .. }));
    assert!(err.to_string().starts_with("Persistent cache ["));
}

#[test]
fn cache_names_with_separators_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let err = OpenOptions::new(tmp.path()).open("a/b").err().expect("invalid");
    assert!(matches!(err, CacheError::NameInvalid { .. }));
}

#[test]
fn committed_enumeration_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let open = || OpenOptions::new(tmp.path()).version("1").open("c").unwrap();

    let cache = open();
    for name in ["zones", "instances", "disks"] {
        cache.table(name, TableOptions::new()).unwrap();
    }
    cache
        .table("hidden", TableOptions::new().restricted(true))
        .unwrap();
    let before = cache.select(None).unwrap();
    cache.close(true).unwrap();

    let cache = open();
    assert_eq!(cache.select(None).unwrap(), before);
    assert_eq!(cache.select(Some("*s")).unwrap(), before);
    cache.close(false).unwrap();
}

#[test]
fn expiry_follows_timeout_and_validate() {
    let tmp = TempDir::new().unwrap();
    let clock = Rc::new(ManualClock::new(10_000));
    let cache = OpenOptions::new(tmp.path())
        .clock(clock.clone())
        .open("c")
        .unwrap();
    let t = cache
        .table("t", TableOptions::new().columns(1).keys(1).timeout(60))
        .unwrap();
    assert!(t.select(None).unwrap_err().is_expired());

    t.add_rows(&[cells!["x"]]).unwrap();
    t.validate().unwrap();
    clock.advance(59);
    assert_eq!(t.select(None).unwrap(), vec![cells!["x"]]);

    clock.advance(1);
    assert!(t.select(None).unwrap_err().is_expired());

    t.validate().unwrap();
    assert_eq!(t.select(None).unwrap(), vec![cells!["x"]]);

    t.invalidate().unwrap();
    assert_eq!(t.modified().unwrap(), 0);
    assert!(t.select(None).unwrap_err().is_expired());
    cache.close(false).unwrap();
}

#[test]
fn zero_timeout_never_expires_once_valid() {
    let tmp = TempDir::new().unwrap();
    let clock = Rc::new(ManualClock::new(0));
    let cache = OpenOptions::new(tmp.path())
        .clock(clock.clone())
        .open("c")
        .unwrap();
    let t = cache.table("t", TableOptions::new().timeout(0)).unwrap();
    t.validate().unwrap();
    clock.advance(1_000_000);
    assert!(t.select(None).unwrap().is_empty());
    cache.close(false).unwrap();
}

#[test]
fn delete_rows_templates() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    let t = cache
        .table("t", TableOptions::new().columns(2).keys(1).timeout(0))
        .unwrap();
    let rows = vec![cells!["a", "1"], cells!["b", "2"], cells!["c", "3"]];
    t.add_rows(&rows).unwrap();
    t.validate().unwrap();

    t.delete_rows(Some(&[])).unwrap();
    assert_eq!(t.select(None).unwrap(), rows);

    t.delete_rows(Some(&[cells!["b"]])).unwrap();
    assert_eq!(t.select(None).unwrap(), vec![cells!["a", "1"], cells!["c", "3"]]);

    t.delete_rows(Some(&[cells![None::<&str>, None::<&str>]]))
        .unwrap();
    assert!(t.select(None).unwrap().is_empty());

    t.add_rows(&rows).unwrap();
    t.delete_rows(None).unwrap();
    assert!(t.select(None).unwrap().is_empty());
    cache.close(false).unwrap();
}

#[test]
fn template_lengths_are_bounded_by_columns() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();

    let single = cache
        .table("single", TableOptions::new().columns(1).keys(1).timeout(0))
        .unwrap();
    single.validate().unwrap();
    assert!(single.select(Some(&cells!["x"])).is_ok());
    let err = single.select(Some(&cells!["x", "y"])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cache table [single] row size [2] is invalid. Must be 1."
    );

    let wide = cache
        .table("wide", TableOptions::new().columns(3).keys(1).timeout(0))
        .unwrap();
    wide.validate().unwrap();
    for len in 1..=3 {
        let template: Row = (0..len).map(|_| "*".into()).collect();
        assert!(wide.select(Some(&template)).is_ok(), "length {len}");
    }
    assert!(matches!(
        wide.select(Some(&[])),
        Err(CacheError::TableRowSizeInvalid { size: 0, .. })
    ));
    assert!(matches!(
        wide.delete_rows(Some(&[cells!["a", "b", "c", "d"]])),
        Err(CacheError::TableRowSizeInvalid { size: 4, .. })
    ));
    cache.close(false).unwrap();
}

#[test]
fn delete_removes_the_whole_cache() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    cache.table("t", TableOptions::new()).unwrap();
    cache.close(true).unwrap();

    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    let path = cache.path();
    cache.delete().unwrap();
    assert!(!path.exists());
    assert!(matches!(
        Cache::delete_in(tmp.path(), "c"),
        Err(CacheError::NotFound { .. })
    ));
}

#[test]
fn real_clock_expiry() {
    if !common::longrunning() {
        eprintln!("skipping: set {} to run", common::ENV_LONGRUNNING);
        return;
    }
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    let t = cache.table("t", TableOptions::new().timeout(1)).unwrap();
    t.validate().unwrap();
    std::thread::sleep(Duration::from_millis(2_100));
    assert!(t.select(None).unwrap_err().is_expired());
    cache.close(false).unwrap();
}

#[test]
fn reserved_table_names_are_restricted() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    for name in ["__metadata__", "__lock__"] {
        let err = cache.table(name, TableOptions::new()).unwrap_err();
        assert!(
            matches!(&err, CacheError::TableRestricted { table, .. } if table == name),
            "{err:?}"
        );
    }
    cache.close(false).unwrap();
}

#[test]
fn restricted_table_reopens_only_when_restricted() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    cache
        .table("secret", TableOptions::new().restricted(true))
        .unwrap();
    cache.close(true).unwrap();

    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    assert!(matches!(
        cache.table("secret", TableOptions::new()),
        Err(CacheError::TableRestricted { .. })
    ));
    let table = cache
        .table("secret", TableOptions::new().restricted(true))
        .unwrap();
    assert!(table.restricted().unwrap());
    cache.close(false).unwrap();
}

#[test]
fn reopening_with_other_keys_is_invalid() {
    let tmp = TempDir::new().unwrap();
    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    cache
        .table("t", TableOptions::new().columns(3).keys(2))
        .unwrap();
    cache.close(true).unwrap();

    let cache = OpenOptions::new(tmp.path()).open("c").unwrap();
    let err = cache
        .table("t", TableOptions::new().keys(1))
        .unwrap_err();
    assert!(matches!(err, CacheError::TableKeysInvalid { .. }), "{err:?}");
    assert!(
        err.to_string()
            .ends_with("cache table [t] keys [1] does not match existing 2.")
    );
    cache.close(false).unwrap();
}
