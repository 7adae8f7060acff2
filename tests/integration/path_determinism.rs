use pagediff::store::Record;
use pagediff::tree::PathBuilder;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Random tree shape: entry `i` is the parent index (< i) of node `i + 1`
fn shapes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(any::<prop::sample::Index>(), 0..40).prop_map(|picks| {
        picks
            .iter()
            .enumerate()
            .map(|(i, pick)| pick.index(i + 1))
            .collect()
    })
}

fn build(shape: &[usize], id_offset: i64) -> Vec<Record> {
    let mut records = vec![Record::new(id_offset, None, "/")];
    for (i, &parent) in shape.iter().enumerate() {
        records.push(Record::new(
            id_offset + i as i64 + 1,
            Some(id_offset + parent as i64),
            format!("node-{}", i + 1),
        ));
    }
    records
}

#[test]
fn nested_paths_follow_the_name_chain() {
    let records = vec![
        Record::new(1, None, "/"),
        Record::new(2, Some(1), "a"),
        Record::new(3, Some(2), "b"),
    ];
    let paths = PathBuilder::new().build(&records).unwrap();
    assert_eq!(paths.paths(), vec!["/", "/a", "/a/b"]);
    assert_eq!(paths.path_of(3), Some("/a/b"));
}

proptest! {
    #[test]
    fn disjoint_ids_give_identical_paths(shape in shapes()) {
        let left = PathBuilder::new().build(&build(&shape, 1)).unwrap();
        let right = PathBuilder::new().build(&build(&shape, 100_000)).unwrap();
        prop_assert_eq!(left.paths(), right.paths());
        prop_assert_eq!(left.len(), shape.len() + 1);
    }

    #[test]
    fn input_order_does_not_change_the_path_set(shape in shapes()) {
        let records = build(&shape, 1);
        let mut reversed = records.clone();
        reversed.reverse();

        let forward: BTreeSet<String> = PathBuilder::new()
            .build(&records)
            .unwrap()
            .paths()
            .into_iter()
            .map(str::to_string)
            .collect();
        let backward: BTreeSet<String> = PathBuilder::new()
            .build(&reversed)
            .unwrap()
            .paths()
            .into_iter()
            .map(str::to_string)
            .collect();
        prop_assert_eq!(forward, backward);
    }
}
