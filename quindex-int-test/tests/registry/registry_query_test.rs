use quindex::{ErrorKind, MemoryRangeFile, MemoryRangeReader, QueryOptions, SignalRow};
use quindex_int_test::test_util::{cleanup, create_test_context, random_signal_file, run_test};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn two_file_reader() -> MemoryRangeReader {
    MemoryRangeReader::new()
        .with_file("a.bw", random_signal_file(1, "chr2", 250_000, 3_000, 16))
        .with_file("b.bw", random_signal_file(2, "chr2", 250_000, 2_000, 8))
}

#[test]
fn test_single_record_scenario() {
    run_test(
        create_test_context,
        |ctx| {
            let mut file = MemoryRangeFile::new(1);
            file.add_row(SignalRow::new("chr1", 10, 20, 3.0));
            let mut index = ctx.index(MemoryRangeReader::new().with_file("one.bw", file), 256)?;
            index.add_to_index("one.bw")?;

            let records = index.query_records("chr1", 0, 50, &QueryOptions::default())?;
            assert_eq!(records.len(), 1);
            assert_eq!((records[0].start, records[0].end), (10, 20));
            assert_eq!((records[0].data_offset, records[0].data_size), (0, 1));

            assert!(index.query("chr1", 5000, 6000, &QueryOptions::default())?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_query_has_no_false_negatives_or_positives() {
    run_test(
        create_test_context,
        |ctx| {
            let reader = two_file_reader();
            let mut index = ctx.index(reader.clone(), 32)?;
            index.add_to_index("a.bw")?;
            index.add_to_index("b.bw")?;

            // every record of both files, as the brute force reference
            let mut all = Vec::new();
            for file in ["a.bw", "b.bw"] {
                let handle = quindex::RangeFileReader::open(&reader, file)?;
                let chrom_id = quindex::RangeFileReader::chromosome_ids(&reader, &handle)?["chr2"];
                for record in quindex::RangeFileReader::interval_records(&reader, &handle, chrom_id)? {
                    all.push((index.file_id(file).unwrap_or(u32::MAX), record));
                }
            }

            let mut rng = StdRng::seed_from_u64(77);
            for _ in 0..80 {
                let start = rng.random_range(0..250_000u64);
                let end = start + rng.random_range(0..20_000u64);

                let mut expected: Vec<(u32, u64, u64)> = all
                    .iter()
                    .filter(|(_, r)| r.start <= end && r.end >= start)
                    .map(|(id, r)| (*id, r.start, r.data_offset))
                    .collect();
                expected.sort();

                let mut found: Vec<(u32, u64, u64)> = index
                    .query_records("chr2", start, end, &QueryOptions::default())?
                    .iter()
                    .map(|r| (r.file_id, r.start, r.data_offset))
                    .collect();
                found.sort();
                assert_eq!(found, expected, "range {}-{}", start, end);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_query_rows_are_ordered_and_filtered() {
    run_test(
        create_test_context,
        |ctx| {
            let mut index = ctx.index(two_file_reader(), 64)?;
            index.add_to_index("a.bw")?;
            index.add_to_index("b.bw")?;

            let rows = index.query("chr2", 100_000, 140_000, &QueryOptions::default())?;
            assert!(!rows.is_empty());
            for pair in rows.windows(2) {
                assert!((pair[0].file_id, pair[0].row.start) <= (pair[1].file_id, pair[1].row.start));
            }
            for row in &rows {
                assert!(row.row.start <= 140_000 && row.row.end >= 100_000);
                assert_eq!(index.files()[row.file_id as usize], row.file);
            }

            let only_b = index.query("chr2", 100_000, 140_000, &QueryOptions::new().file("b.bw"))?;
            assert!(!only_b.is_empty());
            assert!(only_b.iter().all(|r| r.file == "b.bw"));
            assert_eq!(
                only_b.len(),
                rows.iter().filter(|r| r.file == "b.bw").count()
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_lookup_failures() {
    run_test(
        create_test_context,
        |ctx| {
            let mut index = ctx.index(two_file_reader(), 64)?;
            index.add_to_index("a.bw")?;

            let options = QueryOptions::default();
            assert_eq!(
                index.query_records("chr7", 0, 10, &options).unwrap_err().kind(),
                &ErrorKind::LookupError
            );
            assert_eq!(
                index.query_records("chrX", 0, 10, &options).unwrap_err().kind(),
                &ErrorKind::LookupError
            );
            assert_eq!(
                index
                    .query_records("chr2", 0, 10, &QueryOptions::new().file("b.bw"))
                    .unwrap_err()
                    .kind(),
                &ErrorKind::LookupError
            );
            assert_eq!(
                index.add_to_index("a.bw").unwrap_err().kind(),
                &ErrorKind::InvalidOperation
            );
            assert_eq!(
                index.add_to_index("missing.bw").unwrap_err().kind(),
                &ErrorKind::FileNotFound
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_foreign_chromosome_is_rejected_atomically() {
    run_test(
        create_test_context,
        |ctx| {
            let mut file = MemoryRangeFile::new(4);
            file.add_row(SignalRow::new("chr2", 0, 100, 1.0))
                .add_row(SignalRow::new("chr22", 0, 100, 1.0));
            let reader = two_file_reader().with_file("foreign.bw", file);
            let mut index = ctx.index(reader, 64)?;

            let err = index.add_to_index("foreign.bw").unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::LookupError);
            assert!(index.files().is_empty());
            assert!(index.tree("chr2").is_none());

            assert_eq!(index.add_to_index("a.bw")?, 0);
            Ok(())
        },
        cleanup,
    )
}
