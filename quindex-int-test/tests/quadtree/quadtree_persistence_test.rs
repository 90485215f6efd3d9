use quindex::quadtree::IndexHeader;
use quindex::schema::Value;
use quindex::{ErrorKind, IntervalRecord, Item, QuadTree, Rect, SearchMode};
use quindex_int_test::test_util::{cleanup, create_test_context, run_test};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};

fn interval_tree(count: u64, seed: u64) -> QuadTree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = QuadTree::builder()
        .bbox(Rect::new(0.0, 0.0, 2048.0, 2048.0))
        .max_items(10)
        .max_depth(7)
        .build()
        .unwrap();
    for i in 0..count {
        let x = rng.random_range(0.0..2040.0);
        let y = rng.random_range(0.0..2040.0);
        let record = IntervalRecord::new(i, i + 10, i * 64, 64, (i % 3) as u32);
        tree.insert(record.to_item().unwrap(), Rect::new(x, y, x + 4.0, y + 4.0))
            .unwrap();
    }
    tree
}

fn random_queries(seed: u64, count: usize) -> Vec<Rect> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = rng.random_range(-10.0..2060.0);
            let y = rng.random_range(-10.0..2060.0);
            Rect::new(x, y, x + rng.random_range(0.0..700.0), y + rng.random_range(0.0..700.0))
        })
        .collect()
}

fn starts(items: &[Item]) -> Vec<i64> {
    let mut starts: Vec<i64> = items
        .iter()
        .filter_map(|item| item.get(0).and_then(Value::as_i64))
        .collect();
    starts.sort();
    starts
}

#[test]
fn test_roundtrip_eager_and_lazy() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("roundtrip.index");
            let mut tree = interval_tree(1_500, 10);
            tree.to_disk(&path)?;

            let loaded = QuadTree::load(&path)?;
            let lazy = QuadTree::open(&path)?;
            assert_eq!(loaded.len(), tree.len());
            assert_eq!(lazy.len(), tree.len());
            assert_eq!(loaded.bbox(), tree.bbox());
            assert_eq!(lazy.config(), tree.config());
            assert_eq!(loaded.schema(), &IntervalRecord::schema());
            assert_eq!(lazy.stats(), tree.stats());

            for query in random_queries(11, 60) {
                let expected = starts(&tree.intersect(&query, SearchMode::Memory)?);
                assert_eq!(starts(&tree.intersect(&query, SearchMode::Disk)?), expected);
                assert_eq!(starts(&loaded.intersect(&query, SearchMode::Memory)?), expected);
                assert_eq!(starts(&lazy.intersect(&query, SearchMode::Disk)?), expected);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_modes_agree_on_inexact_bbox() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("inexact.index");
            let mut tree = QuadTree::builder()
                .bbox(Rect::new(0.1, 0.0, 0.7, 1.0))
                .max_items(1)
                .build()?;
            for (id, (x, y)) in [(0.1, 0.1), (0.6, 0.9)].into_iter().enumerate() {
                let record = IntervalRecord::new(id as u64, id as u64, 0, 0, 0);
                tree.insert(record.to_item()?, Rect::point(x, y))?;
            }
            tree.to_disk(&path)?;
            let loaded = QuadTree::load(&path)?;
            let lazy = QuadTree::open(&path)?;

            // min_x one ulp above the bbox edge excludes the first point
            let query = Rect::new(f64::from_bits(0.1f64.to_bits() + 1), 0.0, 0.7, 1.0);
            assert_eq!(starts(&tree.intersect(&query, SearchMode::Memory)?), vec![1]);
            assert_eq!(starts(&tree.intersect(&query, SearchMode::Disk)?), vec![1]);
            assert_eq!(starts(&loaded.intersect(&query, SearchMode::Memory)?), vec![1]);
            assert_eq!(starts(&lazy.intersect(&query, SearchMode::Disk)?), vec![1]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_modes_agree_on_random_bboxes() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = StdRng::seed_from_u64(16);
            for round in 0..20 {
                let min_x = rng.random_range(-3.7..3.7);
                let min_y = rng.random_range(-3.7..3.7);
                let width = rng.random_range(0.01..9.3);
                let height = rng.random_range(0.01..9.3);
                let bbox = Rect::new(min_x, min_y, min_x + width, min_y + height);
                let mut tree = QuadTree::builder().bbox(bbox).max_items(2).max_depth(8).build()?;

                let mut corners = Vec::new();
                for i in 0..120u64 {
                    let x = min_x + width * rng.random_range(0.0..1.0);
                    let y = min_y + height * rng.random_range(0.0..1.0);
                    corners.push((x, y));
                    tree.insert(IntervalRecord::new(i, i, 0, 0, 0).to_item()?, Rect::point(x, y))?;
                }

                let path = ctx.path().join(format!("random-{}.index", round));
                tree.to_disk(&path)?;
                let loaded = QuadTree::load(&path)?;
                let lazy = QuadTree::open(&path)?;

                let mut queries = vec![bbox];
                for (x, y) in corners.iter().take(30) {
                    // queries whose edges sit exactly on item coordinates
                    queries.push(Rect::new(*x, *y, min_x + width, min_y + height));
                    queries.push(Rect::new(min_x, min_y, *x, *y));
                }
                for query in queries {
                    let expected = starts(&tree.intersect(&query, SearchMode::Memory)?);
                    assert_eq!(starts(&tree.intersect(&query, SearchMode::Disk)?), expected, "{} in {}", query, bbox);
                    assert_eq!(starts(&loaded.intersect(&query, SearchMode::Memory)?), expected);
                    assert_eq!(starts(&lazy.intersect(&query, SearchMode::Disk)?), expected);
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_roundtrip_preserves_items() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("items.index");
            let mut tree = interval_tree(300, 12);
            tree.to_disk(&path)?;
            let loaded = QuadTree::load(&path)?;

            let mut original: Vec<IntervalRecord> = tree
                .entries()?
                .iter()
                .map(|e| IntervalRecord::from_item(&e.item))
                .collect::<Result<_, _>>()?;
            let mut restored: Vec<IntervalRecord> = loaded
                .entries()?
                .iter()
                .map(|e| IntervalRecord::from_item(&e.item))
                .collect::<Result<_, _>>()?;
            original.sort();
            restored.sort();
            assert_eq!(original, restored);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_max_depth_overflow_roundtrip() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("overflow.index");
            let mut tree = QuadTree::builder()
                .bbox(Rect::new(0.0, 0.0, 64.0, 64.0))
                .max_items(2)
                .max_depth(2)
                .build()?;
            for i in 0..50u64 {
                let record = IntervalRecord::new(i, i, 0, 0, 0);
                tree.insert(record.to_item()?, Rect::point(3.0, 3.0))?;
            }
            tree.to_disk(&path)?;

            let lazy = QuadTree::open(&path)?;
            assert_eq!(lazy.len(), 50);
            assert_eq!(lazy.stats().depth, 2);
            let found = lazy.intersect(&Rect::new(0.0, 0.0, 4.0, 4.0), SearchMode::Disk)?;
            assert_eq!(found.len(), 50);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_bad_child_offset_is_format_error() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("corrupt.index");
            let mut tree = interval_tree(200, 13);
            assert!(tree.stats().split);
            tree.to_disk(&path)?;

            let file_len = fs::metadata(&path)?.len();
            let header = IndexHeader::read_from(&mut BufReader::new(File::open(&path)?), file_len)?;

            let mut file = OpenOptions::new().write(true).open(&path)?;
            // child offsets follow the 41 byte node prefix
            file.seek(SeekFrom::Start(header.root_offset + 41))?;
            for _ in 0..4 {
                file.write_all(&((file_len + 100) as i64).to_le_bytes())?;
            }
            file.flush()?;

            assert_eq!(QuadTree::open(&path).unwrap_err().kind(), &ErrorKind::FormatError);
            assert_eq!(QuadTree::load(&path).unwrap_err().kind(), &ErrorKind::FormatError);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_truncated_file_is_format_error() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("truncated.index");
            interval_tree(100, 14).to_disk(&path)?;
            let len = fs::metadata(&path)?.len();
            OpenOptions::new().write(true).open(&path)?.set_len(len / 2)?;

            assert_eq!(QuadTree::open(&path).unwrap_err().kind(), &ErrorKind::FormatError);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stale_file_after_insert() {
    run_test(
        create_test_context,
        |ctx| {
            let path = ctx.path().join("stale.index");
            let mut tree = interval_tree(50, 15);
            tree.to_disk(&path)?;
            tree.insert(IntervalRecord::new(9_999, 10_000, 0, 0, 0).to_item()?, Rect::point(1.0, 1.0))?;

            let err = tree.intersect(&Rect::point(1.0, 1.0), SearchMode::Disk).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

            // the file on disk still holds the earlier state
            assert_eq!(QuadTree::open(&path)?.len(), 50);
            Ok(())
        },
        cleanup,
    )
}
