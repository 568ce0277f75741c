use pipeline_dashboard::aggregate::{compute_aggregate, AggregateOp, GroupOrder};
use pipeline_dashboard::metrics::column_bounds;
use pipeline_dashboard::table::ROW_INDEX_COLUMN;
use pipeline_dashboard::{apply_filters, CellValue, Constraint, FilterSpec, Table};
use polars::prelude::*;
use proptest::prelude::*;

const STAGES: [&str; 3] = ["Appointment", "Negotiation", "Closed won"];

#[derive(Debug, Clone)]
struct Row {
    score: f64,
    stage: usize,
    new: i64,
    renewal: i64,
}

fn build_table(rows: &[Row]) -> Table {
    let frame = DataFrame::new(vec![
        Series::new("Deal Score", rows.iter().map(|r| r.score).collect::<Vec<f64>>()),
        Series::new(
            "Deal Stage",
            rows.iter()
                .map(|r| STAGES[r.stage].to_string())
                .collect::<Vec<String>>(),
        ),
        Series::new("Deal Type_New", rows.iter().map(|r| r.new).collect::<Vec<i64>>()),
        Series::new(
            "Deal Type_Renewal",
            rows.iter().map(|r| r.renewal).collect::<Vec<i64>>(),
        ),
    ])
    .unwrap();
    Table::new(frame).unwrap()
}

fn row_ids(table: &Table) -> Vec<Option<f64>> {
    table.numeric_values(ROW_INDEX_COLUMN).unwrap()
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (0u32..=100, 0usize..3, 0i64..=1, 0i64..=1).prop_map(|(score, stage, new, renewal)| Row {
        score: score as f64,
        stage,
        new,
        renewal,
    })
}

fn spec_strategy() -> impl Strategy<Value = FilterSpec> {
    (
        0u32..=100,
        0u32..=100,
        proptest::sample::subsequence(STAGES.to_vec(), 0..=3),
        proptest::sample::subsequence(vec!["Deal Type_New", "Deal Type_Renewal"], 0..=2),
        any::<bool>(),
    )
        .prop_map(|(a, b, stages, flags, gate)| {
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            let mut spec = FilterSpec::new()
                .range("Deal Score", min as f64, max as f64)
                .include("Deal Stage", stages)
                .any_flag(flags);
            if gate {
                spec = spec.flag_set("Deal Type_New");
            }
            spec
        })
}

proptest! {
    #[test]
    fn filtered_rows_are_a_subset(rows in prop::collection::vec(row_strategy(), 0..40), spec in spec_strategy()) {
        let table = build_table(&rows);
        let filtered = apply_filters(&table, &spec).unwrap();
        prop_assert!(filtered.height() <= table.height());
        let all = row_ids(&table);
        for id in row_ids(&filtered) {
            prop_assert!(all.contains(&id));
        }
    }

    #[test]
    fn filtering_is_idempotent(rows in prop::collection::vec(row_strategy(), 0..40), spec in spec_strategy()) {
        let table = build_table(&rows);
        let once = apply_filters(&table, &spec).unwrap();
        let twice = apply_filters(&once, &spec).unwrap();
        prop_assert_eq!(row_ids(&once), row_ids(&twice));
    }

    #[test]
    fn constraint_order_does_not_matter(rows in prop::collection::vec(row_strategy(), 0..40), spec in spec_strategy()) {
        let table = build_table(&rows);
        let mut reversed = spec.clone();
        reversed.constraints.reverse();
        prop_assert_eq!(
            row_ids(&apply_filters(&table, &spec).unwrap()),
            row_ids(&apply_filters(&table, &reversed).unwrap())
        );
    }

    #[test]
    fn empty_selections_add_no_restriction(rows in prop::collection::vec(row_strategy(), 0..40), spec in spec_strategy()) {
        let table = build_table(&rows);
        let widened = spec
            .clone()
            .include("Deal Stage", Vec::<CellValue>::new())
            .any_flag(Vec::<String>::new());
        prop_assert_eq!(
            row_ids(&apply_filters(&table, &spec).unwrap()),
            row_ids(&apply_filters(&table, &widened).unwrap())
        );
    }

    #[test]
    fn observed_bounds_exclude_nothing(rows in prop::collection::vec(row_strategy(), 1..40)) {
        let table = build_table(&rows);
        let bounds = column_bounds(&table, "Deal Score").unwrap().unwrap();
        let spec = FilterSpec::new().range("Deal Score", bounds.min, bounds.max);
        prop_assert_eq!(apply_filters(&table, &spec).unwrap().height(), table.height());
    }

    #[test]
    fn group_counts_sum_to_filtered_rows(rows in prop::collection::vec(row_strategy(), 0..40), spec in spec_strategy()) {
        let table = build_table(&rows);
        let filtered = apply_filters(&table, &spec).unwrap();
        let by_stage = compute_aggregate(
            &filtered,
            &["Deal Stage"],
            &AggregateOp::Count,
            GroupOrder::all_descending(),
        )
        .unwrap();
        prop_assert_eq!(by_stage.total() as usize, filtered.height());

        let by_pair = compute_aggregate(
            &filtered,
            &["Deal Stage", "Deal Type_New"],
            &AggregateOp::Count,
            GroupOrder::Natural,
        )
        .unwrap();
        prop_assert_eq!(by_pair.total() as usize, filtered.height());
    }
}

#[test]
fn dropping_an_empty_constraint_keeps_the_result() {
    let rows = vec![
        Row { score: 10.0, stage: 0, new: 1, renewal: 0 },
        Row { score: 60.0, stage: 1, new: 0, renewal: 1 },
        Row { score: 90.0, stage: 2, new: 0, renewal: 0 },
    ];
    let table = build_table(&rows);
    let base = FilterSpec::new().range("Deal Score", 0.0, 100.0);
    let mut with_empty = base.clone();
    with_empty.push(Constraint::AnyFlag { columns: vec![] });

    assert_eq!(
        row_ids(&apply_filters(&table, &base).unwrap()),
        row_ids(&apply_filters(&table, &with_empty).unwrap())
    );
}
