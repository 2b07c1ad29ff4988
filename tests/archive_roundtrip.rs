use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;

use QuiverDump::archive::{category_of_file, list_archive_files, ArchiveReader};
use QuiverDump::error::find_export_error;
use QuiverDump::import::import_archive;
use QuiverDump::{
    export_all, open_sink, ArchiveSink, ExportConfig, ExportError, OutputFormat, PrefixRegistry,
    Sink, Store, StoreSink,
};

mod common;
use common::{unique_root, FakeNode};

fn sample_node() -> FakeNode {
    let mut node = FakeNode::new()
        .with_records(0x00, 13)
        .with_records(0x11, 5)
        .with_records(0x33, 2);
    // бинарные значения и пустое значение - байты должны пройти как есть
    node.insert(&[0x50, 0xff, 0x00], &[0x00, 0x01, 0xfe, 0xff]);
    node.insert(&[0x50, 0xff, 0x01], b"");
    node
}

fn read_archive(dir: &std::path::Path) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut out = BTreeMap::new();
    for f in list_archive_files(dir)? {
        for rec in ArchiveReader::open(&f)? {
            let rec = rec?;
            out.insert(rec.key, rec.value);
        }
    }
    Ok(out)
}

#[test]
fn json_export_writes_one_shard_per_nonempty_category() -> Result<()> {
    let out = unique_root("arch");
    let registry = PrefixRegistry::standard();
    let cfg = ExportConfig::default().with_page_limit(4);
    let mut node = sample_node();

    let mut sink = open_sink(OutputFormat::Json, false, &out, &registry, &cfg)?;
    let s = export_all(&mut node, sink.as_mut(), &registry.select(&["all"])?, &cfg, false)?;
    drop(sink);

    assert_eq!(s.total, 22);

    let names: Vec<String> = list_archive_files(&out)?
        .iter()
        .filter_map(|p| category_of_file(p))
        .collect();
    assert_eq!(
        names,
        vec![
            "block-account-sequenceidbyaddress",
            "block-hash",
            "block-transaction-source",
            "internal",
        ]
    );

    // ровно то, что лежало на ноде
    assert_eq!(read_archive(&out)?, node.data);

    fs::remove_dir_all(&out).ok();
    Ok(())
}

#[test]
fn existing_archive_dir_is_a_precondition_failure_before_any_call() -> Result<()> {
    let out = unique_root("arch-exists");
    fs::create_dir_all(&out)?;
    let registry = PrefixRegistry::standard();

    let err = match ArchiveSink::create(&out, registry, 1) {
        Ok(_) => panic!("existing directory must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(find_export_error(&err), Some(ExportError::Precondition(_))));

    fs::remove_dir_all(&out).ok();
    Ok(())
}

#[test]
fn archive_dir_is_created_exactly_once() -> Result<()> {
    let base = unique_root("arch-nested");
    let out = base.join("a").join("b");
    let sink = ArchiveSink::create(&out, PrefixRegistry::standard(), 1)?;
    assert!(out.is_dir());
    drop(sink);

    // второй create на том же пути, и путь, занятый файлом
    let err = match ArchiveSink::create(&out, PrefixRegistry::standard(), 1) {
        Ok(_) => panic!("second create must fail"),
        Err(e) => e,
    };
    assert!(matches!(find_export_error(&err), Some(ExportError::Precondition(_))));

    let file = base.join("plain");
    fs::write(&file, b"x")?;
    let err = match ArchiveSink::create(&file, PrefixRegistry::standard(), 1) {
        Ok(_) => panic!("a file in place of the directory must be rejected"),
        Err(e) => e,
    };
    assert!(matches!(find_export_error(&err), Some(ExportError::Precondition(_))));

    fs::remove_dir_all(&base).ok();
    Ok(())
}

#[test]
fn unregistered_prefix_cannot_be_routed() -> Result<()> {
    let out = unique_root("arch-route");
    let mut sink = ArchiveSink::create(&out, PrefixRegistry::standard(), 1)?;

    sink.put(&[0x00, 1], b"ok")?;
    let err = sink.put(&[0x7f, 1], b"nope").unwrap_err();
    assert!(matches!(find_export_error(&err), Some(ExportError::Invariant(_))));
    let err = sink.put(b"", b"empty key").unwrap_err();
    assert!(matches!(find_export_error(&err), Some(ExportError::Invariant(_))));

    sink.close()?;
    sink.close()?; // идемпотентно
    assert_eq!(sink.shard_counts(), vec![("block-hash", 1)]);
    assert_eq!(list_archive_files(&out)?.len(), 1);

    fs::remove_dir_all(&out).ok();
    Ok(())
}

#[test]
fn dropped_sink_leaves_readable_shards() -> Result<()> {
    let out = unique_root("arch-drop");
    {
        let mut sink = ArchiveSink::create(&out, PrefixRegistry::standard(), 6)?;
        for i in 0..100u32 {
            sink.put(&common::key(0x12, i), &i.to_le_bytes())?;
        }
        // без close(): Drop должен дописать gzip-трейлер
    }
    let got = read_archive(&out)?;
    assert_eq!(got.len(), 100);
    assert_eq!(got[&common::key(0x12, 42)], 42u32.to_le_bytes().to_vec());

    fs::remove_dir_all(&out).ok();
    Ok(())
}

#[test]
fn archive_import_scan_reproduces_every_record() -> Result<()> {
    let arch = unique_root("rt-arch");
    let store_dir = unique_root("rt-store");
    let registry = PrefixRegistry::standard();
    let cfg = ExportConfig::default().with_page_limit(3).with_store_fsync(false);
    let mut node = sample_node();

    let mut sink = ArchiveSink::create(&arch, registry.clone(), cfg.gzip_level)?;
    export_all(&mut node, &mut sink, &registry.select(&["all"])?, &cfg, false)?;

    let mut store = StoreSink::create(&store_dir, false)?;
    let imp = import_archive(&arch, &mut store, &registry)?;
    assert_eq!(imp.total, node.data.len() as u64);
    assert_eq!(imp.files.len(), 4);
    assert_eq!(store.store().records(), imp.total);
    drop(store);

    let reader = Store::open_ro(&store_dir)?;
    assert_eq!(reader.meta().record_count, imp.total);
    assert!(reader.meta().clean_shutdown);
    let mut got = BTreeMap::new();
    reader.scan_stream(None, |k, v| {
        got.insert(k.to_vec(), v.to_vec());
    })?;
    assert_eq!(got, node.data);

    let mut internal = 0;
    reader.scan_stream(Some(&[0x50][..]), |_, _| internal += 1)?;
    assert_eq!(internal, 2);

    fs::remove_dir_all(&arch).ok();
    fs::remove_dir_all(&store_dir).ok();
    Ok(())
}

#[test]
fn import_rejects_missing_or_empty_dirs_and_foreign_keys() -> Result<()> {
    let registry = PrefixRegistry::standard();

    let missing = unique_root("imp-missing");
    let mut sink = QuiverDump::NoopSink::default();
    let err = import_archive(&missing, &mut sink, &registry).unwrap_err();
    assert!(matches!(find_export_error(&err), Some(ExportError::Config(_))));

    let empty = unique_root("imp-empty");
    fs::create_dir_all(&empty)?;
    let err = import_archive(&empty, &mut sink, &registry).unwrap_err();
    assert!(matches!(find_export_error(&err), Some(ExportError::Config(_))));

    // шард block-hash с ключом чужой категории
    let bad = unique_root("imp-bad");
    fs::create_dir_all(&bad)?;
    fs::write(
        bad.join("block-hash.json"),
        QuiverDump::archive::encode_line(&[0x10, 1], b"x")?,
    )?;
    let err = import_archive(&bad, &mut sink, &registry).unwrap_err();
    assert!(matches!(find_export_error(&err), Some(ExportError::Invariant(_))));
    assert!(sink.is_closed());

    fs::remove_dir_all(&empty).ok();
    fs::remove_dir_all(&bad).ok();
    Ok(())
}

#[test]
fn dry_run_factory_never_touches_the_output() -> Result<()> {
    let registry = PrefixRegistry::standard();
    let cfg = ExportConfig::default().with_page_limit(4);

    for format in [OutputFormat::Json, OutputFormat::Native] {
        let out = unique_root("dry-run");
        let mut node = sample_node();

        let mut sink = open_sink(format, true, &out, &registry, &cfg)?;
        assert_eq!(sink.kind(), "dry-run");
        let s = export_all(&mut node, sink.as_mut(), &registry.select(&["all"])?, &cfg, true)?;
        sink.close()?;
        drop(sink);

        assert!(s.dry_run);
        assert_eq!(s.total, node.data.len() as u64);
        assert!(!out.exists(), "{} must not be created for {}", out.display(), format);
    }
    Ok(())
}
