use approx::assert_relative_eq;
use forecast_desk::{
    DeskConfig, DeskError, ForecastEngine, ForecastType, InMemoryRepository, Method, MethodChange,
    MonthKey, RecordDraft, ReviewState, Weight,
};
use rstest::rstest;

fn create_engine() -> ForecastEngine<InMemoryRepository> {
    let config = DeskConfig {
        start_month: Some(MonthKey::new(2025, 6).unwrap()),
        ..DeskConfig::default()
    };
    ForecastEngine::open("tower-b", config, InMemoryRepository::new()).unwrap()
}

fn month(key: &str) -> MonthKey {
    key.parse().unwrap()
}

#[test]
fn test_new_record_has_rolling_window() {
    let mut engine = create_engine();
    let record = engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 120_000.0))
        .unwrap();

    assert_eq!(record.method(), Method::Manual);
    let months = record.months();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0], month("2025-06"));
    assert_eq!(months[11], month("2026-05"));
    assert_eq!(record.months(), record.previous_monthly_distribution().keys().copied().collect::<Vec<_>>());
    assert_relative_eq!(record.distributed_total(), 120_000.0, epsilon = 0.01);
}

#[test]
fn test_duplicate_record_is_rejected() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 1.0))
        .unwrap();
    let result = engine.create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 2.0));
    assert!(matches!(result, Err(DeskError::DataError(_))));
}

#[test]
fn test_totals_for_two_records() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("a", ForecastType::Draw, "03-3000", 500_000.0))
        .unwrap();
    engine
        .create_record(RecordDraft::new("b", ForecastType::Draw, "05-1200", 300_000.0))
        .unwrap();
    engine.set_method("b", Method::BellCurve).unwrap();
    engine
        .create_record(RecordDraft::new("gc", ForecastType::GcGr, "01-5000", 75_000.0))
        .unwrap();

    let totals = engine.totals(Some(ForecastType::Draw));
    assert_eq!(totals.record_count, 2);
    assert_relative_eq!(totals.budget, 800_000.0);

    let a = engine.record("a").unwrap().monthly_distribution().clone();
    let b = engine.record("b").unwrap().monthly_distribution().clone();
    assert_eq!(totals.monthly.len(), 12);
    for (key, total) in &totals.monthly {
        assert_relative_eq!(*total, a[key] + b[key], epsilon = 1e-9);
    }

    let everything = engine.totals(None);
    assert_eq!(everything.record_count, 3);
    assert_relative_eq!(everything.budget, 875_000.0);
    assert_eq!(engine.records().by_type(ForecastType::GcGr).count(), 1);
}

#[test]
fn test_totals_track_variance_and_summary_fields() {
    let mut engine = create_engine();
    engine
        .create_record(
            RecordDraft::new("a", ForecastType::Draw, "03-3000", 100_000.0).with_summary(40_000.0, 110_000.0),
        )
        .unwrap();
    engine
        .create_record(
            RecordDraft::new("b", ForecastType::Draw, "09-2900", 50_000.0).with_summary(50_000.0, 45_000.0),
        )
        .unwrap();

    engine.edit_month("a", month("2025-08"), 20_000.0).unwrap();

    let totals = engine.totals(Some(ForecastType::Draw));
    assert_relative_eq!(totals.cost_to_complete, 90_000.0);
    assert_relative_eq!(totals.estimated_at_completion, 155_000.0);
    assert_relative_eq!(totals.variance, 5_000.0);

    let a = engine.record("a").unwrap();
    let expected_delta = 20_000.0 - a.previous_monthly_distribution()[&month("2025-08")];
    assert_relative_eq!(totals.monthly_variance[&month("2025-08")], expected_delta, epsilon = 1e-9);
    assert_relative_eq!(totals.monthly_variance[&month("2025-09")], 0.0);

    engine.commit("a").unwrap();
    let totals = engine.totals(Some(ForecastType::Draw));
    assert!(totals.monthly_variance.values().all(|v| v.abs() < 1e-9));
}

#[rstest]
#[case(Method::Linear)]
#[case(Method::SCurve)]
#[case(Method::BellCurve)]
#[case(Method::AiForecast)]
fn test_every_method_keeps_budget(#[case] method: Method) {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("line", ForecastType::Draw, "26-0500", 437_250.0))
        .unwrap();
    engine.set_method("line", method).unwrap();

    for weight in 1..=10 {
        engine.set_weight("line", Weight::new(weight)).unwrap();
        let record = engine.record("line").unwrap();
        assert_eq!(record.method(), method);
        assert!((record.distributed_total() - 437_250.0).abs() < 0.01);
    }
}

#[test]
fn test_negative_budget_is_clamped_to_zero() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("credit", ForecastType::Draw, "02-4100", -9_000.0))
        .unwrap();
    let record = engine.record("credit").unwrap();
    assert_eq!(record.budget(), 0.0);
    assert!(record.amounts().iter().all(|v| *v == 0.0));
}

#[test]
fn test_upsert_inserts_and_moves_to_requested_method() {
    let mut source = create_engine();
    source
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 240_000.0))
        .unwrap();
    let incoming = source.record("conc").unwrap().clone().with_method(Method::AiForecast);

    let mut engine = create_engine();
    let outcome = engine.upsert(incoming).unwrap();
    assert!(outcome.inserted);
    assert_eq!(outcome.method_change, Some(MethodChange::ReviewOpened));
    assert_eq!(engine.review_state("conc"), ReviewState::Pending);
    assert_eq!(
        engine.acknowledgments().previous_method_or_manual("conc"),
        Method::Manual
    );
}

#[test]
fn test_upsert_recomputes_on_weight_change() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 240_000.0))
        .unwrap();
    engine.set_method("conc", Method::SCurve).unwrap();

    let incoming = engine.record("conc").unwrap().clone().with_weight(Weight::MAX);
    let outcome = engine.upsert(incoming).unwrap();
    assert!(outcome.recomputed);
    assert!(outcome.edited_months.is_empty());

    let expected = engine
        .distribution_for("conc", 240_000.0, Method::SCurve, Weight::MAX)
        .unwrap();
    assert_eq!(engine.record("conc").unwrap().amounts(), expected);
}

#[test]
fn test_upsert_applies_raw_edit_to_touched_month_only() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 240_000.0))
        .unwrap();
    engine.set_method("conc", Method::BellCurve).unwrap();
    let before = engine.record("conc").unwrap().clone();

    let incoming = before.clone().with_month(month("2025-10"), 1_234.5).unwrap();
    let outcome = engine.upsert(incoming).unwrap();
    assert!(!outcome.recomputed);
    assert_eq!(outcome.edited_months, vec![month("2025-10")]);

    let after = engine.record("conc").unwrap();
    assert_eq!(after.method(), Method::BellCurve);
    for (key, amount) in after.monthly_distribution() {
        if *key == month("2025-10") {
            assert_eq!(*amount, 1_234.5);
        } else {
            assert_eq!(*amount, before.monthly_distribution()[key]);
        }
    }
}

#[test]
fn test_upsert_refuses_method_change_while_pending() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 240_000.0))
        .unwrap();
    engine.set_method("conc", Method::AiForecast).unwrap();

    let incoming = engine
        .record("conc")
        .unwrap()
        .clone()
        .with_method(Method::Linear)
        .with_budget(1.0);
    assert!(matches!(engine.upsert(incoming), Err(DeskError::ReviewPending(_))));
    assert_eq!(engine.record("conc").unwrap().budget(), 240_000.0);
}

#[test]
fn test_edit_outside_window_is_rejected() {
    let mut engine = create_engine();
    engine
        .create_record(RecordDraft::new("conc", ForecastType::Draw, "03-3000", 1_000.0))
        .unwrap();
    let result = engine.edit_month("conc", month("2030-01"), 5.0);
    assert!(matches!(result, Err(DeskError::ValidationError(_))));
}
