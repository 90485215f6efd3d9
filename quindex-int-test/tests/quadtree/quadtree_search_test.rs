use quindex::schema::{Field, Value};
use quindex::{Item, ItemSchema, QuadTree, Rect, SearchMode};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn id_tree(max_items: usize) -> QuadTree {
    QuadTree::builder()
        .bbox(Rect::new(0.0, 0.0, 1024.0, 1024.0))
        .max_items(max_items)
        .schema(ItemSchema::new(vec![Field::int64("id"), Field::float64("weight")]).unwrap())
        .build()
        .unwrap()
}

fn item(id: i64) -> Item {
    Item::new([Value::Int(id), Value::Float(id as f64 * 0.25)])
}

fn ids(items: &[Item]) -> HashSet<i64> {
    items
        .iter()
        .filter_map(|item| item.get(0).and_then(Value::as_i64))
        .collect()
}

fn random_rects(seed: u64, count: usize) -> Vec<(i64, Rect)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count as i64)
        .map(|id| {
            let x = rng.random_range(0.0..1000.0);
            let y = rng.random_range(0.0..1000.0);
            let w = rng.random_range(0.0..40.0);
            let h = rng.random_range(0.0..40.0);
            (id, Rect::new(x, y, x + w, y + h))
        })
        .collect()
}

#[test]
fn test_split_scenario() {
    let mut tree = id_tree(4);
    let points = [
        (10.0, 10.0),
        (20.0, 900.0),
        (900.0, 20.0),
        (900.0, 900.0),
        (500.0, 500.0),
        (300.0, 700.0),
    ];
    for (i, (x, y)) in points.iter().enumerate() {
        tree.insert(item(i as i64), Rect::new(*x, *y, x + 5.0, y + 5.0))
            .unwrap();
    }

    assert_eq!(tree.len(), 6);
    let stats = tree.stats();
    assert!(stats.split);
    assert_eq!(stats.items, 6);

    let all = tree
        .intersect(&Rect::new(0.0, 0.0, 1024.0, 1024.0), SearchMode::Memory)
        .unwrap();
    assert_eq!(all.len(), 6);

    let none = tree
        .intersect(&Rect::new(600.0, 600.0, 700.0, 700.0), SearchMode::Memory)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_search_matches_brute_force() {
    let rects = random_rects(1, 2_000);
    let mut tree = id_tree(16);
    for (id, rect) in &rects {
        tree.insert(item(*id), *rect).unwrap();
    }

    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..100 {
        let x = rng.random_range(-50.0..1050.0);
        let y = rng.random_range(-50.0..1050.0);
        let query = Rect::new(x, y, x + rng.random_range(0.0..300.0), y + rng.random_range(0.0..300.0));

        let expected: HashSet<i64> = rects
            .iter()
            .filter(|(_, rect)| rect.intersects(&query))
            .map(|(id, _)| *id)
            .collect();
        let found = tree.intersect(&query, SearchMode::Memory).unwrap();
        assert_eq!(found.len(), expected.len(), "duplicates or misses for {}", query);
        assert_eq!(ids(&found), expected);
    }
}

#[test]
fn test_insertion_order_independence() {
    let mut rects = random_rects(3, 800);
    let build = |rects: &[(i64, Rect)]| {
        let mut tree = id_tree(6);
        for (id, rect) in rects {
            tree.insert(item(*id), *rect).unwrap();
        }
        tree
    };

    let ordered = build(&rects);
    let mut rng = StdRng::seed_from_u64(4);
    rects.shuffle(&mut rng);
    let shuffled = build(&rects);

    for _ in 0..50 {
        let x = rng.random_range(0.0..1024.0);
        let y = rng.random_range(0.0..1024.0);
        let query = Rect::new(x, y, x + 200.0, y + 120.0);
        assert_eq!(
            ids(&ordered.intersect(&query, SearchMode::Memory).unwrap()),
            ids(&shuffled.intersect(&query, SearchMode::Memory).unwrap())
        );
    }
}

#[test]
fn test_intersect_debug_reports_item_rects() {
    let rects = random_rects(5, 100);
    let mut tree = id_tree(4);
    for (id, rect) in &rects {
        tree.insert(item(*id), *rect).unwrap();
    }

    let query = Rect::new(200.0, 200.0, 600.0, 600.0);
    for entry in tree.intersect_debug(&query, SearchMode::Memory).unwrap() {
        let id = entry.item.get(0).and_then(Value::as_i64).unwrap();
        assert_eq!(entry.rect, rects[id as usize].1);
        assert!(entry.rect.intersects(&query));
    }
}
