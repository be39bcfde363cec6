use std::sync::Arc;

use rust_decimal::Decimal;

use super::common::*;
use crate::moderation::memory::InMemoryMediaStore;
use crate::moderation::orchestrator::{ReviewStage, NO_ANALYZABLE_IMAGERY};

#[test]
fn listing_without_assets_has_no_analyzable_imagery() {
    let store = Arc::new(InMemoryMediaStore::default());
    let probe = ProbeDetector::new("marked", 0.95);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let verdict = orchestrator.review(&phone_listing(), &[]);
    assert!(!verdict.approved);
    assert_eq!(verdict.stage, ReviewStage::Imagery);
    assert_eq!(verdict.reason, NO_ANALYZABLE_IMAGERY);
    assert_eq!(verdict.confidence, 1.0);
    assert!(verdict.scores.is_empty());
    assert_eq!(probe.calls(), 0);
}

#[test]
fn dangling_references_do_not_count_as_imagery() {
    let store = Arc::new(InMemoryMediaStore::default());
    let orchestrator = probe_orchestrator(store, ProbeDetector::new("marked", 0.95));
    let listing = phone_listing();
    let assets = vec![asset(&listing, 0, "uploads/front.jpg")];

    let verdict = orchestrator.review(&listing, &assets);
    assert_eq!(verdict.stage, ReviewStage::Imagery);
    assert_eq!(verdict.reason, NO_ANALYZABLE_IMAGERY);
}

#[test]
fn filename_screen_runs_before_category_rules() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert("uploads/front.jpg", clean_image());
    let probe = ProbeDetector::new("marked", 0.95);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let mut listing = phone_listing();
    listing.price = Decimal::from(99_000_000);
    let assets = vec![
        asset(&listing, 0, "uploads/front.jpg"),
        asset(&listing, 1, "uploads/Gun_For_Sale.JPG"),
    ];

    let verdict = orchestrator.review(&listing, &assets);
    assert!(!verdict.approved);
    assert_eq!(verdict.stage, ReviewStage::Filename);
    assert_eq!(
        verdict.reason,
        "image file 'Gun_For_Sale.JPG' contains a disallowed term: 'gun' (weapons)"
    );
    assert_eq!(probe.calls(), 0);
}

#[test]
fn rule_failures_skip_image_analysis() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert("uploads/front.jpg", clean_image());
    let probe = ProbeDetector::new("marked", 0.95);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let mut listing = phone_listing();
    listing.price = Decimal::from(3_000_001);
    let assets = vec![asset(&listing, 0, "uploads/front.jpg")];

    let verdict = orchestrator.review(&listing, &assets);
    assert_eq!(verdict.stage, ReviewStage::CategoryRules);
    assert!(verdict.reason.starts_with("[Tecnología] price"));
    assert_eq!(probe.calls(), 0);
}

#[test]
fn any_inappropriate_image_rejects_the_listing() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert("uploads/front.jpg", clean_image());
    store.insert("uploads/marked_back.jpg", clean_image());
    store.insert("uploads/side.jpg", clean_image());
    let probe = ProbeDetector::new("marked", 0.95);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let listing = phone_listing();
    let assets = vec![
        asset(&listing, 0, "uploads/front.jpg"),
        asset(&listing, 1, "uploads/marked_back.jpg"),
        asset(&listing, 2, "uploads/side.jpg"),
    ];

    let verdict = orchestrator.review(&listing, &assets);
    assert!(!verdict.approved);
    assert_eq!(verdict.stage, ReviewStage::ImageAnalysis);
    assert!(verdict
        .reason
        .starts_with("image 'marked_back.jpg' was judged inappropriate"));
    assert!((verdict.confidence - 0.95).abs() < 1e-6);
    assert_eq!(verdict.scores.get("probe"), Some(&0.95));
}

#[test]
fn clean_images_are_approved_with_peak_scores() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert("uploads/front.jpg", clean_image());
    store.insert("uploads/side.jpg", clean_image());
    let probe = ProbeDetector::new("side", 0.4);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let listing = phone_listing();
    let assets = vec![
        asset(&listing, 0, "uploads/front.jpg"),
        asset(&listing, 1, "uploads/side.jpg"),
    ];

    let verdict = orchestrator.review(&listing, &assets);
    assert!(verdict.approved, "unexpected rejection: {}", verdict.reason);
    assert_eq!(verdict.stage, ReviewStage::Passed);
    assert_eq!(verdict.reason, "approved after analysing 2 image(s)");
    assert_eq!(verdict.scores.get("probe"), Some(&0.4));
    assert!((verdict.confidence - 0.4).abs() < 1e-6);
    assert_eq!(probe.calls(), 2);
}

#[test]
fn undecodable_assets_are_skipped() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert("uploads/front.jpg", clean_image());
    store.insert_corrupt("uploads/broken.jpg");
    let probe = ProbeDetector::new("marked", 0.95);
    let orchestrator = probe_orchestrator(store, probe.clone());

    let listing = phone_listing();
    let assets = vec![
        asset(&listing, 0, "uploads/broken.jpg"),
        asset(&listing, 1, "uploads/front.jpg"),
    ];

    let verdict = orchestrator.review(&listing, &assets);
    assert!(verdict.approved);
    assert_eq!(verdict.reason, "approved after analysing 1 image(s)");
    assert_eq!(probe.calls(), 1);
}

#[test]
fn only_undecodable_assets_leave_nothing_to_analyse() {
    let store = Arc::new(InMemoryMediaStore::default());
    store.insert_corrupt("uploads/broken.jpg");
    let orchestrator = probe_orchestrator(store, ProbeDetector::new("marked", 0.95));

    let listing = phone_listing();
    let assets = vec![asset(&listing, 0, "uploads/broken.jpg")];

    let verdict = orchestrator.review(&listing, &assets);
    assert!(!verdict.approved);
    assert_eq!(verdict.stage, ReviewStage::Imagery);
    assert_eq!(verdict.reason, NO_ANALYZABLE_IMAGERY);
}
