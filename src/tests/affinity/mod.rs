use crate::{
    ErrorDetail,
    affinity::{AffinityEngine, TargetLocator},
    catalogue::{Value, store::Client as _},
    indexer::Indexer,
    tests::{local_catalogue, ramp, workspace, write_curves, write_idvd},
};

#[tokio::test]
async fn scores_are_written_back() {
    let ws = workspace();
    let exact = ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv");
    let steep = ws.data_file("IDVD_Vgf_1_Es_1.0_Em_0.5.csv");
    write_idvd(&exact, 1.0);
    write_idvd(&steep, 1.5);
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5_v2.csv"), 4.0);
    let db = local_catalogue().await;
    Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();

    let locator = TargetLocator::new(&ws.targets);
    let sheet = AffinityEngine::new(&ws.schemas, &locator, &db)
        .calculate_affinities("IDVD", &[])
        .await
        .unwrap();
    let exact_row = sheet.row(&exact).unwrap();
    assert_eq!(exact_row["aff_ID"], Some(Value::Number(1.0)));
    assert_eq!(exact_row["aff_IG"], Some(Value::Number(1.0)));
    assert_eq!(exact_row["aff_tot"], Some(Value::Number(1.0)));
    let steep_row = sheet.row(&steep).unwrap();
    assert_eq!(steep_row["aff_ID"], Some(Value::Number(0.5)));
    assert_eq!(steep_row["aff_tot"], Some(Value::Number(0.75)));

    let persisted = db
        .load(ws.schemas.get("IDVD").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.rows, sheet.rows);

    // a later reindex keeps the scores
    let report = Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();
    assert_eq!(report.catalogues["IDVD"].rows, sheet.rows);
}

#[test]
fn lexicographically_first_target_wins() {
    let ws = workspace();
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5_v2.csv"), 4.0);
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.targets.join("CV_Es_1.0_Em_0.5.csv"), 1.0);
    let record = crate::feature::extract(
        &ws.schemas,
        &ws.data_file("IDVD_Vgf_3_Es_1.0_Em_0.5.csv"),
    )
    .unwrap();
    let found = TargetLocator::new(&ws.targets)
        .find_target(&ws.schemas, "IDVD", &record.attributes)
        .unwrap();
    assert_eq!(found, ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"));
}

#[test]
fn tokens_match_whole_values_only() {
    let ws = workspace();
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.targets.join("IDVD_Es_1.05_Em_0.5.csv"), 2.0);
    let locator = TargetLocator::new(&ws.targets);
    for (name, target) in [
        ("IDVD_Vgf_3_Es_1.0_Em_0.5.csv", "IDVD_Es_1.0_Em_0.5.csv"),
        ("IDVD_Vgf_3_Es_1.05_Em_0.5.csv", "IDVD_Es_1.05_Em_0.5.csv"),
    ] {
        let record = crate::feature::extract(&ws.schemas, &ws.data_file(name)).unwrap();
        let found = locator
            .find_target(&ws.schemas, "IDVD", &record.attributes)
            .unwrap();
        assert_eq!(found, ws.targets.join(target));
    }

    std::fs::remove_file(ws.targets.join("IDVD_Es_1.0_Em_0.5.csv")).unwrap();
    let record =
        crate::feature::extract(&ws.schemas, &ws.data_file("IDVD_Vgf_3_Es_1.0_Em_0.5.csv"))
            .unwrap();
    let error = locator
        .find_target(&ws.schemas, "IDVD", &record.attributes)
        .unwrap_err();
    assert!(matches!(error.detail(), ErrorDetail::NoMatchingTarget { .. }));
}

#[tokio::test]
async fn unmatched_record_fails_the_batch() {
    let ws = workspace();
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_3.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"), 1.0);
    let db = local_catalogue().await;
    Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();

    let locator = TargetLocator::new(&ws.targets);
    let error = AffinityEngine::new(&ws.schemas, &locator, &db)
        .calculate_affinities("IDVD", &[])
        .await
        .unwrap_err();
    assert!(matches!(
        error.detail(),
        ErrorDetail::NoMatchingTarget { tokens } if tokens == &["Es_3.0", "Em_0.5"]
    ));
    let persisted = db
        .load(ws.schemas.get("IDVD").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(persisted.rows.iter().all(|row| row["aff_tot"].is_none()));
}

#[tokio::test]
async fn zero_integral_target_is_degenerate() {
    let ws = workspace();
    let path = ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv");
    write_idvd(&path, 1.0);
    write_curves(
        &ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"),
        &[("ID", ramp(0.0)), ("IG", ramp(0.1))],
    );
    let db = local_catalogue().await;
    Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();

    let locator = TargetLocator::new(&ws.targets);
    let error = AffinityEngine::new(&ws.schemas, &locator, &db)
        .calculate_affinities("IDVD", &[path])
        .await
        .unwrap_err();
    assert!(matches!(
        error.detail(),
        ErrorDetail::DegenerateTarget { curve } if curve == "ID"
    ));
}

#[tokio::test]
async fn types_without_targets_are_rejected() {
    let ws = workspace();
    let db = local_catalogue().await;
    let locator = TargetLocator::new(&ws.targets);
    let engine = AffinityEngine::new(&ws.schemas, &locator, &db);
    let error = engine.calculate_affinities("CV", &[]).await.unwrap_err();
    assert!(matches!(error.detail(), ErrorDetail::TargetsUnsupported));
    let error = engine.calculate_affinities("IDVD", &[]).await.unwrap_err();
    assert!(matches!(error.detail(), ErrorDetail::MissingCatalogue));
}

#[tokio::test]
async fn files_outside_the_catalogue_are_not_indexed() {
    let ws = workspace();
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.targets.join("IDVD_Es_1.0_Em_0.5.csv"), 1.0);
    let db = local_catalogue().await;
    Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();

    let locator = TargetLocator::new(&ws.targets);
    let error = AffinityEngine::new(&ws.schemas, &locator, &db)
        .calculate_affinities("IDVD", &[ws.data_file("IDVD_Vgf_9_Es_1.0_Em_0.5.csv")])
        .await
        .unwrap_err();
    assert!(matches!(error.detail(), ErrorDetail::NotIndexed));
    let persisted = db
        .load(ws.schemas.get("IDVD").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(persisted.rows.iter().all(|row| row["aff_tot"].is_none()));
}
