use sqlx::prelude::FromRow;

use crate::{
    ErrorDetail,
    catalogue::{LocalCatalogue, Value, store::Client as _},
    grouping,
    indexer::{Indexer, SheetSummary},
    schema::FILE_PATH,
    tests::{local_catalogue, workspace, write_idvd},
};

#[derive(FromRow, PartialEq, Debug)]
struct IdvdRow {
    file_path: String,
    #[sqlx(rename = "Vgf")]
    vgf: Option<f64>,
    aff_tot: Option<f64>,
}

#[tokio::test]
async fn reindex_is_idempotent() {
    let ws = workspace();
    write_idvd(&ws.data_file("IDVD_Vgf_1_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.data_file("NOTES_2024.csv"), 1.0);
    std::fs::write(ws.data_file("README.txt"), "not data").unwrap();
    let db = local_catalogue().await;
    let indexer = Indexer::new(&ws.schemas, &db);

    let first = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(
        first.summaries["IDVD"],
        SheetSummary {
            added: 2,
            ..Default::default()
        }
    );
    assert_eq!(first.skipped, [ws.data_file("NOTES_2024.csv")]);

    let second = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(
        second.summaries["IDVD"],
        SheetSummary {
            kept: 2,
            ..Default::default()
        }
    );
    assert_eq!(
        first.catalogues["IDVD"].rows,
        second.catalogues["IDVD"].rows
    );

    let rows = sqlx::query_as::<_, IdvdRow>(
        "SELECT file_path, Vgf, aff_tot FROM \"IDVD\" ORDER BY rowid",
    )
    .fetch_all(&db.pool())
    .await
    .unwrap();
    assert_eq!(
        rows,
        [
            IdvdRow {
                file_path: ws
                    .data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv")
                    .display()
                    .to_string(),
                vgf: Some(0.0),
                aff_tot: None,
            },
            IdvdRow {
                file_path: ws
                    .data_file("IDVD_Vgf_1_Es_1.0_Em_0.5.csv")
                    .display()
                    .to_string(),
                vgf: Some(1.0),
                aff_tot: None,
            },
        ]
    );
}

#[tokio::test]
async fn deleted_files_leave_the_catalogue() {
    let ws = workspace();
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv"), 1.0);
    write_idvd(&ws.data_file("IDVD_Vgf_1_Es_1.0_Em_0.5.csv"), 1.0);
    crate::tests::write_curves(
        &ws.data_file("CV_f_1000_device_n.csv"),
        &[("C", crate::tests::ramp(2.0))],
    );
    let db = local_catalogue().await;
    let indexer = Indexer::new(&ws.schemas, &db);
    let report = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(report.catalogues["CV"].len(), 1);
    assert_eq!(
        report.catalogues["CV"].rows[0]["device"],
        Some(Value::Text("n".into()))
    );

    std::fs::remove_file(ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv")).unwrap();
    std::fs::remove_file(ws.data_file("CV_f_1000_device_n.csv")).unwrap();
    write_idvd(&ws.data_file("IDVD_Vgf_2_Es_1.0_Em_0.5.csv"), 1.0);

    let report = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(
        report.summaries["IDVD"],
        SheetSummary {
            kept: 1,
            added: 1,
            removed: 1,
            rebuilt: false,
        }
    );
    assert!(report.catalogues["CV"].is_empty());
    for path in report.catalogues["IDVD"].paths() {
        assert!(path.exists(), "{}", path.display());
    }
    let persisted = db
        .load(ws.schemas.get("CV").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(persisted.is_empty());
}

#[tokio::test]
async fn drifted_sheet_is_rebuilt() {
    let ws = workspace();
    crate::tests::write_curves(
        &ws.data_file("CV_f_10.csv"),
        &[("C", crate::tests::ramp(2.0))],
    );
    let db = local_catalogue().await;
    sqlx::query("CREATE TABLE \"CV\" (\"f\" REAL, \"file_path\" TEXT)")
        .execute(&db.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO \"CV\" VALUES (99.0, 'gone.csv')")
        .execute(&db.pool())
        .await
        .unwrap();

    let report = Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();
    assert_eq!(
        report.summaries["CV"],
        SheetSummary {
            added: 1,
            rebuilt: true,
            ..Default::default()
        }
    );
    assert_eq!(report.catalogues["CV"].columns(), ["f", "device", "file_path"]);
    assert_eq!(
        report.catalogues["CV"].rows[0]["f"],
        Some(Value::Number(10.0))
    );
}

#[tokio::test]
async fn undecodable_sheet_is_rebuilt() {
    let ws = workspace();
    crate::tests::write_curves(
        &ws.data_file("CV_f_10.csv"),
        &[("C", crate::tests::ramp(2.0))],
    );
    let db = local_catalogue().await;
    sqlx::query(
        "CREATE TABLE \"CV\" (\"f\" REAL, \"device\" TEXT, \"file_path\" TEXT NOT NULL PRIMARY KEY)",
    )
    .execute(&db.pool())
    .await
    .unwrap();
    sqlx::query("INSERT INTO \"CV\" VALUES ('abc', NULL, 'x.csv')")
        .execute(&db.pool())
        .await
        .unwrap();

    let report = Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();
    assert_eq!(
        report.summaries["CV"],
        SheetSummary {
            added: 1,
            rebuilt: true,
            ..Default::default()
        }
    );
    assert_eq!(
        report.catalogues["CV"].paths().collect::<Vec<_>>(),
        [ws.data_file("CV_f_10.csv")]
    );
}

#[tokio::test]
async fn unreadable_catalogue_file_is_rebuilt() {
    let ws = workspace();
    write_idvd(&ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv"), 1.0);
    let store = tempfile::tempdir().unwrap();
    let path = store.path().join("catalogue.db");
    std::fs::write(&path, vec![0x42; 8192]).unwrap();
    let db = LocalCatalogue::open(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    let indexer = Indexer::new(&ws.schemas, &db);

    let first = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(
        first.summaries["IDVD"],
        SheetSummary {
            added: 1,
            rebuilt: true,
            ..Default::default()
        }
    );
    let second = indexer.reindex(&ws.data).await.unwrap();
    assert_eq!(
        second.summaries["IDVD"],
        SheetSummary {
            kept: 1,
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let ws = workspace();
    let db = local_catalogue().await;
    let error = Indexer::new(&ws.schemas, &db)
        .reindex(ws.data.join("absent"))
        .await
        .unwrap_err();
    assert!(matches!(error.detail(), ErrorDetail::MissingDirectory));
}

#[tokio::test]
async fn indexed_pair_groups_over_vgf() {
    let ws = workspace();
    let path0 = ws.data_file("IDVD_Vgf_0_Es_1.0_Em_0.5.csv");
    let path1 = ws.data_file("IDVD_Vgf_1_Es_1.0_Em_0.5.csv");
    write_idvd(&path0, 1.0);
    write_idvd(&path1, 1.0);
    let db = local_catalogue().await;
    let report = Indexer::new(&ws.schemas, &db)
        .reindex(&ws.data)
        .await
        .unwrap();

    let grouped = grouping::group(&report.catalogues["IDVD"], "Vgf").unwrap();
    assert_eq!(grouped.catalogue.len(), 1);
    assert_eq!(
        grouped.catalogue.rows[0][FILE_PATH],
        Some(Value::Path(
            format!("{}#{}", path0.display(), path1.display()).into()
        ))
    );
    assert!(grouped.groups[0].contains_group);
    assert_eq!(grouped.groups[0].members, [path0, path1]);
}
