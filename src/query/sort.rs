use crate::query::record::{compare_fields, Record};
use crate::types::{SortDir, SortSpec};

/// Stable sort of `items` by `field`. Descending reverses the ascending
/// comparator, so records with equal keys keep their input order either way.
/// The input slice is left untouched.
pub fn basic_sort<T: Record + Clone>(items: &[T], field: &str, dir: SortDir) -> Vec<T> {
    let mut keyed: Vec<_> = items.iter().map(|item| (item.field(field), item)).collect();
    keyed.sort_by(|(a, _), (b, _)| {
        let ord = compare_fields(a.as_ref(), b.as_ref());
        match dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}

/// Sort by an optional `SortSpec`; `None` keeps insertion order.
pub fn sort_by_spec<T: Record + Clone>(items: &[T], spec: Option<&SortSpec>) -> Vec<T> {
    match spec {
        Some(spec) => basic_sort(items, &spec.field, spec.dir),
        None => items.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::record::FieldValue;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: &'static str,
        score: f64,
    }

    impl Record for Row {
        fn field(&self, key: &str) -> Option<FieldValue> {
            match key {
                "id" => Some(FieldValue::Text(self.id.to_string())),
                "score" => Some(FieldValue::Num(self.score)),
                _ => None,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: "a", score: 50.0 },
            Row { id: "b", score: 90.0 },
            Row { id: "c", score: 70.0 },
        ]
    }

    fn ids(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn sorts_ascending_and_descending() {
        assert_eq!(ids(&basic_sort(&rows(), "score", SortDir::Asc)), ["a", "c", "b"]);
        assert_eq!(ids(&basic_sort(&rows(), "score", SortDir::Desc)), ["b", "c", "a"]);
    }

    #[test]
    fn descending_is_exact_reverse_for_distinct_keys() {
        let asc = basic_sort(&rows(), "score", SortDir::Asc);
        let mut desc = basic_sort(&asc, "score", SortDir::Desc);
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn ties_keep_input_order_in_both_directions() {
        let tied = vec![
            Row { id: "x", score: 1.0 },
            Row { id: "y", score: 1.0 },
            Row { id: "z", score: 2.0 },
        ];
        assert_eq!(ids(&basic_sort(&tied, "score", SortDir::Asc)), ["x", "y", "z"]);
        assert_eq!(ids(&basic_sort(&tied, "score", SortDir::Desc)), ["z", "x", "y"]);
    }

    #[test]
    fn input_is_not_mutated() {
        let input = rows();
        let _ = basic_sort(&input, "score", SortDir::Desc);
        assert_eq!(ids(&input), ["a", "b", "c"]);
    }

    #[test]
    fn unknown_field_keeps_order() {
        assert_eq!(ids(&basic_sort(&rows(), "nope", SortDir::Desc)), ["a", "b", "c"]);
        assert_eq!(ids(&sort_by_spec(&rows(), None)), ["a", "b", "c"]);
    }
}
