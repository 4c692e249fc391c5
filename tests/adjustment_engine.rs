//! Integration specifications for the regression adjustment engine: coefficient
//! resolution, per-factor sign behavior, time trending, and failure modes, all
//! exercised through the public service facade over in-memory stores.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;

    use valuation_core::valuation::adjustment::FeaturePayload;
    use valuation_core::valuation::store::memory::{
        InMemoryCoefficientStore, InMemoryPropertyStore,
    };
    use valuation_core::valuation::store::{CoefficientRow, RunId};
    use valuation_core::valuation::ValuationService;

    pub(super) const SEGMENT: &str = "ANACORTES";

    pub(super) fn coefficient_rows(run: &str, day: u32, betas: &[(&str, f64)]) -> Vec<CoefficientRow> {
        betas
            .iter()
            .map(|(term, beta)| CoefficientRow {
                market_segment: SEGMENT.to_string(),
                term: (*term).to_string(),
                beta: *beta,
                standard_error: Some(0.01),
                run_id: RunId(run.to_string()),
                created_at: NaiveDate::from_ymd_opt(2024, 7, day)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .expect("valid timestamp"),
            })
            .collect()
    }

    pub(super) fn full_model(run: &str, day: u32) -> Vec<CoefficientRow> {
        coefficient_rows(
            run,
            day,
            &[
                ("const", 5.0),
                ("log_area", 0.35),
                ("log_lot", 0.08),
                ("log_age", -0.04),
                ("t", 0.004),
                ("quality_score", 0.05),
                ("condition_score", 0.04),
                ("has_garage", 0.06),
                ("has_basement", 0.03),
                ("is_view", 0.07),
                ("missing_quality", -0.02),
                ("missing_condition", -0.015),
                ("pt_11.0", 0.10),
                ("area_time", 0.0002),
            ],
        )
    }

    pub(super) fn service(
        rows: Vec<CoefficientRow>,
    ) -> ValuationService<InMemoryPropertyStore, InMemoryCoefficientStore> {
        ValuationService::new(
            Arc::new(InMemoryPropertyStore::default()),
            Arc::new(InMemoryCoefficientStore::new(rows)),
        )
    }

    pub(super) fn subject() -> FeaturePayload {
        FeaturePayload::from_value(&json!({
            "comp_id": "SUBJECT",
            "living_area": 2000,
            "lot_acres": 0.25,
            "age": 20,
            "quality_score": 4,
            "condition_score": 3,
            "has_garage": true,
            "has_basement": true,
            "is_view": false,
            "sale_date": "2024-01-01",
            "market_segment": SEGMENT,
        }))
        .expect("subject payload coerces")
    }

    /// A comparable identical to the subject except where the test overrides.
    pub(super) fn twin_comp(id: &str, price: f64) -> FeaturePayload {
        let mut payload = subject();
        payload.comp_id = Some(id.to_string());
        payload.sale_price = Some(price);
        payload
    }
}

use common::{coefficient_rows, full_model, service, subject, twin_comp, SEGMENT};
use valuation_core::valuation::adjustment::{
    AdjustmentError, AdjustmentFactor, CoefficientError, FeaturePayload,
};
use valuation_core::valuation::store::RunId;
use valuation_core::ValuationError;

#[test]
fn identical_comparable_needs_no_adjustment() {
    let service = service(full_model("run-1", 1));
    let report = service
        .compute_adjustments(&subject(), &[twin_comp("C1", 380_000.0)], 400_000.0, None, None)
        .expect("adjustments compute");

    assert_eq!(report.market_segment, SEGMENT);
    assert_eq!(report.run_id, RunId("run-1".to_string()));
    assert_eq!(report.comparables.len(), 1);
    let comp = &report.comparables[0];
    assert_eq!(comp.total_adjustment, 0.0);
    assert_eq!(comp.adjusted_value, 380_000.0);
    assert!(comp.adjustments.values().all(|amount| *amount == 0.0));
    assert_eq!(comp.adjustments.len(), 9);
    assert_eq!(comp.adjustment_details.len(), 9);
}

#[test]
fn smaller_comparable_is_adjusted_upward() {
    // Subject 2000 sqft vs comp 1800 sqft, beta(log_area)=0.35,
    // predicted price $400k: the documented worked example.
    let service = service(full_model("run-1", 1));
    let mut comp = twin_comp("C1", 380_000.0);
    comp.living_area = Some(1800.0);

    let report = service
        .compute_adjustments(&subject(), &[comp], 400_000.0, None, None)
        .expect("adjustments compute");
    let comp = &report.comparables[0];
    let area = comp.adjustments[&AdjustmentFactor::Area];

    let delta = 2000f64.ln() - 1800f64.ln();
    let expected = 400_000.0 * ((0.35 * delta).exp() - 1.0);
    assert!((area - 15_025.82).abs() < 0.01);
    assert!((area - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    assert_eq!(comp.total_adjustment, area);
    assert_eq!(comp.adjusted_value, 380_000.0 + area);

    let detail = &comp.adjustment_details[&AdjustmentFactor::Area];
    assert!((detail.delta.expect("delta present") - delta).abs() < 1e-12);
}

#[test]
fn sign_convention_holds_for_every_structural_factor() {
    let service = service(full_model("run-1", 1));
    let base = subject();

    let mut inferior_area = twin_comp("C", 380_000.0);
    inferior_area.living_area = Some(1500.0);
    let mut superior_area = twin_comp("C", 380_000.0);
    superior_area.living_area = Some(2500.0);

    let mut inferior_lot = twin_comp("C", 380_000.0);
    inferior_lot.lot_acres = Some(0.10);
    let mut inferior_quality = twin_comp("C", 380_000.0);
    inferior_quality.quality_score = Some(2.0);
    let mut inferior_condition = twin_comp("C", 380_000.0);
    inferior_condition.condition_score = Some(1.0);
    let mut no_garage = twin_comp("C", 380_000.0);
    no_garage.has_garage = Some(false);
    let mut no_basement = twin_comp("C", 380_000.0);
    no_basement.has_basement = Some(false);
    let mut view_comp = twin_comp("C", 380_000.0);
    view_comp.is_view = Some(true);
    // log_age carries a negative beta: an older comparable is inferior and
    // must still be adjusted upward.
    let mut older = twin_comp("C", 380_000.0);
    older.age = Some(45.0);

    let positive: Vec<(AdjustmentFactor, &FeaturePayload)> = vec![
        (AdjustmentFactor::Area, &inferior_area),
        (AdjustmentFactor::Lot, &inferior_lot),
        (AdjustmentFactor::Quality, &inferior_quality),
        (AdjustmentFactor::Condition, &inferior_condition),
        (AdjustmentFactor::Garage, &no_garage),
        (AdjustmentFactor::Basement, &no_basement),
        (AdjustmentFactor::Age, &older),
    ];
    for (factor, comp) in positive {
        let report = service
            .compute_adjustments(&base, std::slice::from_ref(comp), 400_000.0, None, None)
            .expect("adjustments compute");
        let amount = report.comparables[0].adjustments[&factor];
        assert!(amount > 0.0, "{factor:?} expected positive, got {amount}");
    }

    // Superior comparables adjust downward.
    for (factor, comp) in [
        (AdjustmentFactor::Area, &superior_area),
        (AdjustmentFactor::View, &view_comp),
    ] {
        let report = service
            .compute_adjustments(&base, std::slice::from_ref(comp), 400_000.0, None, None)
            .expect("adjustments compute");
        let amount = report.comparables[0].adjustments[&factor];
        assert!(amount < 0.0, "{factor:?} expected negative, got {amount}");
    }
}

#[test]
fn time_adjustment_trends_the_comparables_own_price() {
    // Model without the interaction term so the effective beta is beta_t.
    let mut betas = full_model("run-1", 1);
    betas.retain(|row| row.term != "area_time");
    let service = service(betas);

    let mut comp = twin_comp("C1", 300_000.0);
    comp.sale_date = chrono::NaiveDate::from_ymd_opt(2023, 1, 1);

    let report = service
        .compute_adjustments(&subject(), &[comp], 400_000.0, None, None)
        .expect("adjustments compute");
    let comp = &report.comparables[0];
    let time = comp.adjustments[&AdjustmentFactor::Time];

    // 365 days / 30.4375 = 11.9918 months against the comp's own $300k price.
    assert!((time - 14_740.86).abs() < 0.01);
    let detail = &comp.adjustment_details[&AdjustmentFactor::Time];
    assert!((detail.delta.expect("months present") - 11.991786447638603).abs() < 1e-9);
}

#[test]
fn time_months_never_exceed_the_cap() {
    let mut betas = full_model("run-1", 1);
    betas.retain(|row| row.term != "area_time");
    let service = service(betas);

    // Comp sold ~108 months before the valuation date.
    let mut comp = twin_comp("C1", 300_000.0);
    comp.sale_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 1);

    let report = service
        .compute_adjustments(&subject(), &[comp], 400_000.0, None, None)
        .expect("adjustments compute");
    let comp = &report.comparables[0];
    let detail = &comp.adjustment_details[&AdjustmentFactor::Time];
    assert_eq!(detail.delta, Some(60.0));
    assert!((comp.adjustments[&AdjustmentFactor::Time] - 81_374.75).abs() < 0.01);
}

#[test]
fn missing_dates_zero_the_time_adjustment() {
    let service = service(full_model("run-1", 1));
    let mut comp = twin_comp("C1", 300_000.0);
    comp.sale_date = None;

    let report = service
        .compute_adjustments(&subject(), &[comp], 400_000.0, None, None)
        .expect("adjustments compute");
    let comp = &report.comparables[0];
    assert_eq!(comp.adjustments[&AdjustmentFactor::Time], 0.0);
    assert_eq!(comp.adjustment_details[&AdjustmentFactor::Time].delta, None);
}

#[test]
fn unpriced_comparables_are_skipped_silently() {
    let service = service(full_model("run-1", 1));
    let mut unpriced = twin_comp("C1", 1.0);
    unpriced.sale_price = None;
    let mut zero_priced = twin_comp("C2", 1.0);
    zero_priced.sale_price = Some(0.0);
    let good = twin_comp("C3", 350_000.0);

    let report = service
        .compute_adjustments(
            &subject(),
            &[unpriced, zero_priced, good],
            400_000.0,
            None,
            None,
        )
        .expect("adjustments compute");
    assert_eq!(report.comparables.len(), 1);
    assert_eq!(report.comparables[0].comp_id, "C3");
}

#[test]
fn invalid_predicted_price_is_a_client_error() {
    let service = service(full_model("run-1", 1));
    for bad in [0.0, -5.0, f64::NAN] {
        let result =
            service.compute_adjustments(&subject(), &[twin_comp("C1", 1.0)], bad, None, None);
        assert!(matches!(
            result,
            Err(ValuationError::Adjustment(AdjustmentError::InvalidInput(_)))
        ));
    }
}

#[test]
fn segment_resolves_from_subject_when_not_explicit() {
    let service = service(full_model("run-1", 1));
    let mut anonymous = subject();
    anonymous.market_segment = None;

    let err = service
        .compute_adjustments(&anonymous, &[], 400_000.0, None, None)
        .expect_err("segment unresolvable");
    assert!(matches!(
        err,
        ValuationError::Adjustment(AdjustmentError::InvalidInput(_))
    ));

    let report = service
        .compute_adjustments(&anonymous, &[], 400_000.0, Some(SEGMENT), None)
        .expect("explicit segment works");
    assert_eq!(report.market_segment, SEGMENT);
}

#[test]
fn missing_required_term_is_reported_by_name() {
    // The segment's only stored run lacks is_view.
    let betas: Vec<_> = full_model("run-1", 1)
        .into_iter()
        .filter(|row| row.term != "is_view")
        .collect();
    let service = service(betas);

    let err = service
        .compute_adjustments(&subject(), &[twin_comp("C1", 1.0)], 400_000.0, None, None)
        .expect_err("incomplete model");
    match err {
        ValuationError::Adjustment(AdjustmentError::Coefficient(
            CoefficientError::MissingTerms {
                missing_terms,
                market_segment,
                run_id,
            },
        )) => {
            assert_eq!(missing_terms, vec!["is_view".to_string()]);
            assert_eq!(market_segment, SEGMENT);
            assert_eq!(run_id, RunId("run-1".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn segment_without_any_run_is_an_error() {
    let service = service(Vec::new());
    let err = service
        .compute_adjustments(&subject(), &[], 400_000.0, None, None)
        .expect_err("no runs");
    assert!(matches!(
        err,
        ValuationError::Adjustment(AdjustmentError::Coefficient(CoefficientError::NoRuns { .. }))
    ));
}

#[test]
fn latest_run_wins_unless_pinned() {
    let mut rows = full_model("run-old", 1);
    rows.extend(coefficient_rows("run-new", 20, &[("log_area", 0.40)]));
    // run-new is newer but incomplete; pinning it must fail completeness,
    // while the default resolution picks it as latest.
    let service = service(rows);

    let err = service
        .compute_adjustments(&subject(), &[], 400_000.0, None, None)
        .expect_err("latest run is incomplete");
    assert!(matches!(
        err,
        ValuationError::Adjustment(AdjustmentError::Coefficient(
            CoefficientError::MissingTerms { .. }
        ))
    ));

    let report = service
        .compute_adjustments(
            &subject(),
            &[],
            400_000.0,
            None,
            Some(&RunId("run-old".to_string())),
        )
        .expect("pinned complete run works");
    assert_eq!(report.run_id, RunId("run-old".to_string()));
}

#[test]
fn identical_inputs_yield_byte_identical_reports() {
    let service = service(full_model("run-1", 1));
    let mut comp = twin_comp("C1", 380_000.0);
    comp.living_area = Some(1750.0);
    comp.sale_date = chrono::NaiveDate::from_ymd_opt(2023, 6, 15);
    let comps = vec![comp];

    let first = service
        .compute_adjustments(&subject(), &comps, 400_000.0, None, None)
        .expect("first run");
    let second = service
        .compute_adjustments(&subject(), &comps, 400_000.0, None, None)
        .expect("second run");

    let a = serde_json::to_string(&first).expect("serializes");
    let b = serde_json::to_string(&second).expect("serializes");
    assert_eq!(a, b);
}

#[test]
fn monetary_outputs_are_rounded_to_cents() {
    let service = service(full_model("run-1", 1));
    let mut comp = twin_comp("C1", 380_000.559);
    comp.living_area = Some(1777.0);

    let report = service
        .compute_adjustments(&subject(), &[comp], 400_000.0, None, None)
        .expect("adjustments compute");
    let comp = &report.comparables[0];
    for value in [comp.base_sale_price, comp.total_adjustment, comp.adjusted_value]
        .into_iter()
        .chain(comp.adjustments.values().copied())
    {
        assert_eq!((value * 100.0).round() / 100.0, value);
    }
    assert_eq!(comp.base_sale_price, 380_000.56);
}
