use pipeline_dashboard::dashboards::{default_filters, evaluate};
use pipeline_dashboard::metrics::with_flag_count;
use pipeline_dashboard::observability::PipelineLogger;
use pipeline_dashboard::recommend::{companies_ladder, deals_ladder, tickets_ladder};
use pipeline_dashboard::schema::companies;
use pipeline_dashboard::{
    apply_filters, compute_metrics, recommend, CellValue, Dashboard, DashboardConfig, Dataset,
    FilterSpec, MetricSpec, RecordKey, Table, TableStore,
};
use polars::prelude::*;
use std::fs;

fn five_deals() -> Table {
    let frame = df![
        "Record ID" => [1i64, 2, 3, 4, 5],
        "Deal Score" => [10.0, 40.0, 60.0, 80.0, 95.0],
        "Deal probability" => [0.1, 0.2, 0.5, 0.7, 0.9],
        "Days to close" => [90i64, 20, 70, 10, 30],
        "Amount" => [1000.0, 2000.0, 3000.0, 4000.0, 5000.0],
        "Weighted amount" => [100.0, 400.0, 1500.0, 2800.0, 4500.0],
        "Deal Stage" => ["Lost", "Open", "Open", "Won", "Won"],
        "Forecast category_Closed won" => [0i64, 0, 0, 1, 1],
        "Forecast category_Commit" => [0i64, 0, 1, 0, 0],
        "Forecast category_Not forecasted" => [1i64, 0, 0, 0, 0],
        "Forecast category_Pipeline" => [0i64, 1, 0, 0, 0],
        "Deal Type_New" => [1i64, 0, 1, 0, 0],
        "Deal Type_PS" => [0i64, 1, 0, 0, 0],
        "Deal Type_Renewal" => [0i64, 0, 0, 1, 1],
    ]
    .unwrap();
    Table::new(frame).unwrap()
}

#[test]
fn scenario_deal_score_range_and_average() {
    let table = five_deals();
    let spec = FilterSpec::new().range("Deal Score", 50.0, 100.0);
    let filtered = apply_filters(&table, &spec).unwrap();

    assert_eq!(
        filtered.numeric_values("Deal Score").unwrap(),
        vec![Some(60.0), Some(80.0), Some(95.0)]
    );
    let metrics =
        compute_metrics(&filtered, &[MetricSpec::mean("Avg Deal Score", "Deal Score")]).unwrap();
    let avg = metrics.value("Avg Deal Score").unwrap();
    assert!((avg - 78.33).abs() < 0.01);
}

#[test]
fn scenario_low_score_beats_long_cycle() {
    let frame = df![
        "Record ID" => [7i64],
        "Deal Score" => [30.0],
        "Days to close" => [90.0],
    ]
    .unwrap();
    let table = Table::new(frame).unwrap();
    let rec = recommend(Dataset::Deals, &table, &RecordKey::id("Record ID", 7i64)).unwrap();
    assert_eq!(rec.advice, deals_ladder().rules()[0].outcome);
    assert_ne!(rec.advice, deals_ladder().rules()[1].outcome);
}

#[test]
fn scenario_ticket_response_time_first() {
    let frame = df![
        "Ticket ID" => [11i64],
        "Response time hours" => [50.0],
        "Implementation Duration Days" => [5.0],
    ]
    .unwrap();
    let table = Table::new(frame).unwrap();
    let rec = recommend(Dataset::Tickets, &table, &RecordKey::id("Ticket ID", 11i64)).unwrap();
    assert_eq!(rec.advice, tickets_ladder().rules()[0].outcome);
}

#[test]
fn scenario_company_tech_count_tier() {
    let frame = df![
        "Web Technologies_React" => [1i64],
        "Web Technologies_Stripe" => [1i64],
        "Web Technologies_Segment" => [0i64],
        "Web Technologies_Hotjar" => [1i64],
        "Web Technologies_Drift" => [0i64],
    ]
    .unwrap();
    let table = Table::new(frame).unwrap();
    let flags = table.columns_with_prefix(companies::WEB_TECHNOLOGY_PREFIX);
    let derived = with_flag_count(&table, &flags, companies::TECH_COUNT).unwrap();
    assert_eq!(derived.numeric_values(companies::TECH_COUNT).unwrap(), vec![Some(3.0)]);

    let rec = recommend(Dataset::Companies, &derived, &RecordKey::Row(0)).unwrap();
    assert_eq!(rec.advice, companies_ladder().rules()[0].outcome);
    assert!(rec.advice.recommendation.contains("limited set"));
}

#[test]
fn deals_dashboard_with_default_panel() {
    let table = five_deals();
    let spec = default_filters(Dataset::Deals, &table).unwrap();
    let view = evaluate(Dataset::Deals, &table, &spec).unwrap();

    assert_eq!(view.filtered_rows, 5);
    assert_eq!(view.kpi("Total Revenue").unwrap().display, "$15,000");
    assert_eq!(view.kpi("Avg Deal Score").unwrap().display, "57.00");
    assert_eq!(view.kpi("Avg Days to Close").unwrap().display, "44.0");

    let revenue = view.aggregate("Revenue by Deal Stage").unwrap();
    let stages: Vec<String> = revenue.rows.iter().map(|r| r.keys[0].to_string()).collect();
    assert_eq!(stages, vec!["Won", "Open", "Lost"]);
    assert_eq!(revenue.get(&[CellValue::from("Won")]), Some(9000.0));

    assert_eq!(view.histogram("Days to close").unwrap().total(), 5);
    assert_eq!(view.scatter.as_ref().unwrap().width(), 5);
}

#[test]
fn empty_filter_result_is_not_an_error() {
    let table = five_deals();
    let spec = FilterSpec::new()
        .range("Deal Score", 0.0, 100.0)
        .include("Deal Stage", ["Archived"]);
    let view = evaluate(Dataset::Deals, &table, &spec).unwrap();

    assert!(view.is_empty());
    assert_eq!(view.kpi("Total Revenue").unwrap().value, Some(0.0));
    assert_eq!(view.kpi("Avg Deal Score").unwrap().display, "N/A");
    assert!(view.aggregate("Revenue by Deal Stage").unwrap().is_empty());
    assert!(view.selectable_records().unwrap().is_empty());
}

#[test]
fn tickets_dashboard_with_requirement_gate() {
    let frame = df![
        "Ticket ID" => ["T-1", "T-2", "T-3", "T-3"],
        "Response time hours" => [10.0, 60.0, 20.0, 20.0],
        "Implementation Duration Days" => [40.0, 5.0, 10.0, 10.0],
        "Training Completion Count" => [1i64, 2, 3, 3],
        "Ticket status" => ["Open", "Closed", "Open", "Open"],
        "Create date_Year" => [2023i64, 2023, 2024, 2024],
        "Create date_Month" => [3i64, 1, 2, 2],
        "Requirements for the Trial_Onboarding" => [1i64, 1, 0, 0],
        "Requirements for the Trial_Coaching" => [0i64, 1, 1, 1],
        "Requirements for the Trial_Assessment" => [0i64, 0, 0, 0],
    ]
    .unwrap();
    let table = Table::new(frame).unwrap();

    let all = evaluate(
        Dataset::Tickets,
        &table,
        &default_filters(Dataset::Tickets, &table).unwrap(),
    )
    .unwrap();
    assert_eq!(all.filtered_rows, 4);
    assert_eq!(all.kpi("Total Tickets").unwrap().value, Some(3.0));
    let trend = all.aggregate("Ticket Creation Trends").unwrap();
    let months: Vec<String> = trend
        .rows
        .iter()
        .map(|r| format!("{}-{}", r.keys[0], r.keys[1]))
        .collect();
    assert_eq!(months, vec!["2023-1", "2023-3", "2024-2"]);

    let spec = default_filters(Dataset::Tickets, &table)
        .unwrap()
        .flag_set("Requirements for the Trial_Onboarding");
    let gated = evaluate(Dataset::Tickets, &table, &spec).unwrap();
    assert_eq!(gated.filtered_rows, 2);

    let rec = gated.recommend(&RecordKey::id("Ticket ID", "T-1")).unwrap();
    assert!(rec.advice.recommendation.starts_with("Long implementation"));
    assert!(gated
        .recommend(&RecordKey::id("Ticket ID", "T-3"))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn dashboard_loads_once_and_logs_runs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("deals.csv"),
        "Record ID,Deal Score,Deal probability,Days to close,Amount,Weighted amount,Deal Stage,\
         Forecast category_Closed won,Forecast category_Commit,Forecast category_Not forecasted,\
         Forecast category_Pipeline,Deal Type_New,Deal Type_PS,Deal Type_Renewal\n\
         1,10,0.1,90,1000,100,Lost,0,0,1,0,1,0,0\n\
         2,70,0.6,75,2000,1200,Open,0,1,0,0,0,0,1\n",
    )
    .unwrap();
    let log_path = dir.path().join("runs.log");
    let config = DashboardConfig {
        data_dir: dir.path().to_path_buf(),
        pipeline_log: Some(log_path.clone()),
        ..DashboardConfig::default()
    };
    let dashboard = Dashboard::with_store(
        TableStore::new(config.clone()),
        PipelineLogger::new(config.pipeline_log.clone(), 10),
    );

    let spec = dashboard.default_filters(Dataset::Deals).unwrap();
    let view = dashboard.evaluate(Dataset::Deals, &spec).unwrap();
    assert_eq!(view.filtered_rows, 2);

    let narrowed = spec.clone().range("Deal Score", 50.0, 100.0);
    let view = dashboard.evaluate(Dataset::Deals, &narrowed).unwrap();
    assert_eq!(view.filtered_rows, 1);
    assert_eq!(dashboard.store().load_count(), 1);

    let stale = dashboard
        .recommend(&view, &RecordKey::id("Record ID", 1i64))
        .unwrap();
    assert!(stale.is_none());
    let rec = dashboard
        .recommend(&view, &RecordKey::id("Record ID", 2i64))
        .unwrap()
        .unwrap();
    assert!(rec.advice.recommendation.contains("lengthy"));
    assert!(rec.message.unwrap().contains("renewal"));

    let runs = dashboard.logger().recent_runs(10);
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].rows_out, 1);
    assert_eq!(fs::read_to_string(&log_path).unwrap().lines().count(), 2);
}

#[test]
fn injected_table_skips_the_loader() {
    let store = TableStore::new(DashboardConfig {
        data_dir: "does-not-exist".into(),
        ..DashboardConfig::default()
    });
    store.insert(Dataset::Deals, five_deals()).unwrap();
    let dashboard = Dashboard::with_store(store, PipelineLogger::default());

    let view = dashboard.evaluate(Dataset::Deals, &FilterSpec::new()).unwrap();
    assert_eq!(view.filtered_rows, 5);
    assert_eq!(dashboard.store().load_count(), 0);

    let rec = dashboard
        .recommend(&view, &RecordKey::id("Record ID", 4i64))
        .unwrap()
        .unwrap();
    assert_eq!(&rec.advice, deals_ladder().default_outcome());
    assert!(dashboard.table(Dataset::Tickets).unwrap_err().to_string().contains("does-not-exist"));
}

#[test]
fn default_panel_drops_rows_with_null_ranged_values() {
    let frame = df![
        "Ticket ID" => ["T-1", "T-2"],
        "Response time hours" => [Some(10.0), None],
        "Implementation Duration Days" => [4.0, 6.0],
        "Training Completion Count" => [1i64, 2],
        "Ticket status" => ["Open", "Open"],
        "Create date_Year" => [2024i64, 2024],
        "Create date_Month" => [1i64, 1],
    ]
    .unwrap();
    let table = Table::new(frame).unwrap();
    let spec = default_filters(Dataset::Tickets, &table).unwrap();
    let view = evaluate(Dataset::Tickets, &table, &spec).unwrap();

    assert_eq!(view.total_rows, 2);
    assert_eq!(view.filtered_rows, 1);
    assert_eq!(
        view.selectable_records().unwrap(),
        vec![RecordKey::id("Ticket ID", "T-1")]
    );
}

#[test]
fn user_ranges_are_clamped_before_evaluation() {
    let dashboard = Dashboard::with_store(
        TableStore::new(DashboardConfig::default()),
        PipelineLogger::default(),
    );
    dashboard.store().insert(Dataset::Deals, five_deals()).unwrap();

    let spec = FilterSpec::new()
        .range("Deal Score", 50.0, 1000.0)
        .range("Amount", 9000.0, 10000.0);
    let clamped = dashboard.clamp_filters(Dataset::Deals, &spec).unwrap();
    assert_eq!(clamped, FilterSpec::new().range("Deal Score", 50.0, 95.0).range("Amount", 9000.0, 10000.0));
    assert!(dashboard.evaluate(Dataset::Deals, &clamped).unwrap().is_empty());

    let text_range = FilterSpec::new().range("Deal Stage", 0.0, 1.0);
    assert!(dashboard
        .clamp_filters(Dataset::Deals, &text_range)
        .unwrap_err()
        .is_configuration());
}

#[test]
fn unknown_column_fails_the_evaluation() {
    let table = five_deals();
    let spec = FilterSpec::new().any_flag(["Deal Type_Upsell"]);
    let err = evaluate(Dataset::Deals, &table, &spec).unwrap_err();
    assert!(err.is_configuration());
}
