use quindex::genome::GenomeSource;
use quindex::registry::{tree_file_name, CHROMOSOMES_FILE, FILES_FILE};
use quindex::{ChromSizesDir, ErrorKind, MemoryRangeReader, QueryOptions, Quindex};
use quindex_int_test::test_util::{cleanup, create_test_context, random_signal_file, run_test};
use std::fs;

fn reader() -> MemoryRangeReader {
    MemoryRangeReader::new()
        .with_file("a.bw", random_signal_file(21, "chr2", 250_000, 1_500, 10))
        .with_file("b.bw", random_signal_file(22, "chrX", 60_000, 800, 10))
        .with_file("c.bw", random_signal_file(23, "chr2", 250_000, 900, 4))
}

const RANGES: [(&str, u64, u64); 5] = [
    ("chr2", 0, 249_999),
    ("chr2", 10_000, 12_000),
    ("chr2", 123_456, 130_000),
    ("chrX", 5_000, 25_000),
    ("chrX", 59_000, 70_000),
];

#[test]
fn test_persist_and_reopen_eager_and_lazy() {
    run_test(
        create_test_context,
        |ctx| {
            let mut index = ctx.index(reader(), 16)?;
            for file in ["a.bw", "b.bw", "c.bw"] {
                index.add_to_index(file)?;
            }
            index.to_disk()?;

            for name in [CHROMOSOMES_FILE, FILES_FILE] {
                assert!(ctx.path().join(name).exists());
            }
            assert!(ctx.path().join(tree_file_name("chr2")).exists());
            assert!(ctx.path().join(tree_file_name("chrX")).exists());
            assert!(!ctx.path().join(tree_file_name("chr1")).exists());

            for eager in [true, false] {
                let reopened = ctx.reopen(reader(), eager)?;
                assert_eq!(reopened.files(), index.files());
                assert_eq!(
                    reopened.chromosomes().collect::<Vec<_>>(),
                    index.chromosomes().collect::<Vec<_>>()
                );
                assert_eq!(reopened.tree("chr2").map(|t| t.is_lazy()), Some(!eager));

                for (chrom, start, end) in RANGES {
                    let mut expected = index.query_records(chrom, start, end, &QueryOptions::default())?;
                    let mut in_memory = reopened.query_records(chrom, start, end, &QueryOptions::default())?;
                    let mut on_disk = reopened.query_records(chrom, start, end, &QueryOptions::on_disk())?;
                    expected.sort();
                    in_memory.sort();
                    on_disk.sort();
                    assert_eq!(in_memory, expected);
                    assert_eq!(on_disk, expected);

                    let rows = reopened.query(chrom, start, end, &QueryOptions::default())?;
                    assert_eq!(rows, index.query(chrom, start, end, &QueryOptions::default())?);
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_file_ids_survive_reopen() {
    run_test(
        create_test_context,
        |ctx| {
            let mut index = ctx.index(reader(), 16)?;
            index.add_to_index("c.bw")?;
            index.add_to_index("a.bw")?;
            index.to_disk()?;

            let reopened = ctx.reopen(reader(), false)?;
            assert_eq!(reopened.file_id("c.bw"), Some(0));
            assert_eq!(reopened.file_id("a.bw"), Some(1));
            assert_eq!(reopened.file_id("b.bw"), None);

            let only_a = reopened.query_records("chr2", 0, 249_999, &QueryOptions::new().file("a.bw"))?;
            assert!(!only_a.is_empty());
            assert!(only_a.iter().all(|r| r.file_id == 1));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_reopen_without_index_files() {
    run_test(
        create_test_context,
        |ctx| {
            let err = ctx.reopen(reader(), true).err().map(|e| e.kind().clone());
            assert_eq!(err, Some(ErrorKind::FileNotFound));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_corrupt_sidecar() {
    run_test(
        create_test_context,
        |ctx| {
            let mut index = ctx.index(reader(), 16)?;
            index.add_to_index("a.bw")?;
            index.to_disk()?;
            fs::write(ctx.path().join(FILES_FILE), [0xffu8; 3])?;

            let err = ctx.reopen(reader(), true).err().map(|e| e.kind().clone());
            assert_eq!(err, Some(ErrorKind::EncodingError));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_genome_from_chrom_sizes_dir() {
    run_test(
        create_test_context,
        |ctx| {
            fs::write(
                ctx.path().join("toy.chrom.sizes"),
                "chr2\t250000\nchrX\t60000\nchrUn_random\t500\n",
            )?;
            let source = ChromSizesDir::new(ctx.path());
            assert_eq!(source.chromosome_lengths("toy")?.len(), 2);

            let mut index = Quindex::builder()
                .genome_from(&source, "toy")
                .base_path(ctx.path().join("index"))
                .build(reader())?;
            index.add_to_index("b.bw")?;
            index.to_disk()?;
            assert!(ctx.path().join("index").join(tree_file_name("chrX")).exists());
            Ok(())
        },
        cleanup,
    )
}
