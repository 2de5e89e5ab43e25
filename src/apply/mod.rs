// src/apply/mod.rs

pub mod plan;
pub mod report;

use std::path::Path;
use tracing::{info, instrument, warn};

use crate::client::SchemaClient;
use crate::descriptor::{list_descriptor_files, read_descriptor};
use crate::error::Result;
use crate::export::save_table_configs;
pub use plan::{ColumnStep, TablePlan, TableStep};
pub use report::{ApplyReport, ColumnError, FileError, TableError};

/// Plans for every loadable descriptor in a folder, plus the files that
/// failed to load.
#[derive(Debug, Default)]
pub struct LoadedPlans {
    pub plans: Vec<TablePlan>,
    pub file_errors: Vec<FileError>,
}

/// Read every `*.json` descriptor in `folder` (sorted by table name) and plan
/// its patches. A bad file is recorded and the rest still load.
pub fn load_plans<P: AsRef<Path>>(folder: P) -> Result<LoadedPlans> {
    let mut loaded = LoadedPlans::default();
    for file in list_descriptor_files(folder)? {
        match read_descriptor(&file.path) {
            Ok(descriptor) => loaded.plans.push(TablePlan::build(&file.table, &descriptor)),
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "skipping descriptor");
                loaded.file_errors.push(FileError {
                    path: file.path,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok(loaded)
}

/// Carry out one table's plan. Failures are returned in the report, never raised.
pub async fn apply_plan(
    client: &SchemaClient,
    connection_id: &str,
    schema_name: &str,
    plan: &TablePlan,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let table = plan.table.as_str();

    match &plan.table_step {
        TableStep::Skip => {}
        TableStep::Patch(patch) => {
            match client
                .patch_table_config(connection_id, schema_name, table, patch)
                .await
            {
                Ok(()) => {
                    info!(table, "updated table");
                    report.tables_patched += 1;
                }
                Err(failure) => {
                    warn!(table, error = %failure, "table update failed");
                    report.table_errors.push(TableError {
                        table: table.to_string(),
                        status: failure.status,
                        error: failure.body,
                    });
                }
            }
        }
        TableStep::Invalid(message) => {
            warn!(table, error = %message, "table update not attempted");
            report.table_errors.push(TableError {
                table: table.to_string(),
                status: None,
                error: message.clone(),
            });
        }
    }

    if plan.columns_unsupported {
        warn!(table, "descriptor lists columns but the table does not support column config");
    }

    for step in &plan.column_steps {
        match step {
            ColumnStep::Denied { column } => {
                info!(table, column = %column, "skipping column (update not allowed)");
                report.columns_skipped += 1;
            }
            ColumnStep::Patch { column, patch } => {
                info!(table, column = %column, enabled = patch.enabled, hashed = patch.hashed, "updating column");
                match client
                    .patch_column_config(connection_id, schema_name, table, column, patch)
                    .await
                {
                    Ok(()) => {
                        info!(table, column = %column, "updated column");
                        report.columns_patched += 1;
                    }
                    Err(failure) => {
                        warn!(table, column = %column, error = %failure, "column update failed");
                        report.column_errors.push(ColumnError {
                            table: table.to_string(),
                            column: column.clone(),
                            status: failure.status,
                            error: failure.body,
                        });
                    }
                }
            }
            ColumnStep::Invalid { column, message } => {
                warn!(table, column = %column, error = %message, "column update not attempted");
                report.column_errors.push(ColumnError {
                    table: table.to_string(),
                    column: column.clone(),
                    status: None,
                    error: message.clone(),
                });
            }
        }
    }

    report
}

/// Push every descriptor in `folder` to the connection, then re-export the
/// folder from the updated remote state.
///
/// Schema resolution and the closing export are fatal on failure; individual
/// table and column patches are not.
#[instrument(level = "info", skip(client, folder), fields(folder = %folder.as_ref().display()))]
pub async fn apply_table_configs<P: AsRef<Path>>(
    client: &SchemaClient,
    connection_id: &str,
    folder: P,
) -> Result<ApplyReport> {
    let folder = folder.as_ref();
    let schema_name = client.get_schema_name(connection_id).await?;
    info!(schema_name = %schema_name, "resolved schema");

    let loaded = load_plans(folder)?;
    let mut report = ApplyReport {
        file_errors: loaded.file_errors,
        ..Default::default()
    };
    for plan in &loaded.plans {
        report.merge(apply_plan(client, connection_id, &schema_name, plan).await);
    }

    info!(
        tables_patched = report.tables_patched,
        columns_patched = report.columns_patched,
        columns_skipped = report.columns_skipped,
        table_errors = report.table_errors.len(),
        column_errors = report.column_errors.len(),
        file_errors = report.file_errors.len(),
        "patches applied, re-exporting"
    );
    save_table_configs(client, connection_id, folder).await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{client_for, client_with_timeout};
    use crate::error::SyncError;
    use serde_json::{json, Value};
    use std::{fs, time::Duration};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_schema(server: &MockServer, tables: Value) {
        Mock::given(method("POST"))
            .and(path("/connections/conn_1/schemas/reload"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/connections/conn_1/schemas"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"schemas": {"public": {"name_in_destination": "public", "tables": tables}}}
            })))
            .mount(server)
            .await;
    }

    async fn accept_patches(server: &MockServer) {
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "Success"})))
            .mount(server)
            .await;
    }

    /// `(path, body)` of every PATCH the server saw, in arrival order.
    async fn patches(server: &MockServer) -> Vec<(String, Value)> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.method.as_str() == "PATCH")
            .map(|r| (r.url.path().to_string(), serde_json::from_slice(&r.body).unwrap()))
            .collect()
    }

    fn write_json(dir: &Path, name: &str, value: Value) {
        fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn orders_descriptor_issues_one_table_and_one_column_patch() {
        let server = MockServer::start().await;
        mount_schema(&server, json!({})).await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({
                "table": "orders",
                "enabled": true,
                "sync_mode": "SOFT_DELETE",
                "enabled_patch_settings": true,
                "columns": {"id": {"enabled": true, "hashed": false, "enabled_patch_settings": {"allowed": true}}}
            }),
        );

        let report = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(
            patches(&server).await,
            vec![
                (
                    "/connections/conn_1/schemas/public/tables/orders".to_string(),
                    json!({"enabled": true, "sync_mode": "SOFT_DELETE"})
                ),
                (
                    "/connections/conn_1/schemas/public/tables/orders/columns/id".to_string(),
                    json!({"enabled": true, "hashed": false})
                ),
            ]
        );
    }

    #[tokio::test]
    async fn gated_table_and_columns_issue_no_patches() {
        let server = MockServer::start().await;
        mount_schema(&server, json!({})).await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "users.json",
            json!({
                "table": "users",
                "enabled": true,
                "enabled_patch_settings": false,
                "supports_columns_config": true,
                "columns": {"id": {"enabled": true, "enabled_patch_settings": {"allowed": false}}}
            }),
        );
        write_json(
            dir.path(),
            "events.json",
            json!({"table": "events", "enabled": true, "supports_columns_config": false, "columns": {}}),
        );

        let report = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap();

        assert!(patches(&server).await.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.columns_skipped, 1);
    }

    #[tokio::test]
    async fn failing_table_is_reported_and_others_still_apply() {
        let server = MockServer::start().await;
        mount_schema(
            &server,
            json!({
                "t1": {"enabled": false, "enabled_patch_settings": {"allowed": true}},
                "t2": {"enabled": true, "enabled_patch_settings": {"allowed": true}},
                "t3": {"enabled": false, "enabled_patch_settings": {"allowed": true}}
            }),
        )
        .await;
        Mock::given(method("PATCH"))
            .and(path("/connections/conn_1/schemas/public/tables/t2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("{\"code\":\"InternalError\"}"))
            .mount(&server)
            .await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        for t in ["t1", "t2", "t3"] {
            write_json(
                dir.path(),
                &format!("{t}.json"),
                json!({"table": t, "enabled": false, "enabled_patch_settings": true}),
            );
        }

        let report = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap();

        assert_eq!(
            report.table_errors,
            vec![TableError {
                table: "t2".into(),
                status: Some(500),
                error: "{\"code\":\"InternalError\"}".into(),
            }]
        );
        assert_eq!(report.tables_patched, 2);
        let paths: Vec<_> = patches(&server).await.into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths.len(), 3);
        assert!(paths.iter().any(|p| p.ends_with("/tables/t1")));
        assert!(paths.iter().any(|p| p.ends_with("/tables/t3")));
    }

    #[tokio::test]
    async fn failed_column_does_not_stop_later_columns_or_report_denied_ones() {
        let server = MockServer::start().await;
        mount_schema(&server, json!({})).await;
        Mock::given(method("PATCH"))
            .and(path_regex(r"/columns/bad$"))
            .respond_with(ResponseTemplate::new(400).set_body_string("nope"))
            .mount(&server)
            .await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({
                "table": "orders",
                "enabled": true,
                "enabled_patch_settings": false,
                "columns": {
                    "bad": {"enabled": true},
                    "locked": {"enabled": true, "enabled_patch_settings": {"allowed": false}},
                    "good": {"enabled": false, "hashed": true}
                }
            }),
        );

        let report = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap();

        assert_eq!(
            report.column_errors,
            vec![ColumnError {
                table: "orders".into(),
                column: "bad".into(),
                status: Some(400),
                error: "nope".into(),
            }]
        );
        assert!(report.table_errors.is_empty());
        assert_eq!(report.columns_patched, 1);
        assert_eq!(report.columns_skipped, 1);
        let bodies = patches(&server).await;
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1].1, json!({"enabled": false, "hashed": true}));
    }

    #[tokio::test]
    async fn malformed_file_is_isolated() {
        let server = MockServer::start().await;
        mount_schema(&server, json!({})).await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{\"enabled\": tru").unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({"table": "orders", "enabled": true, "enabled_patch_settings": true}),
        );

        let report = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap();

        assert_eq!(report.file_errors.len(), 1);
        assert_eq!(report.file_errors[0].path, dir.path().join("broken.json"));
        assert_eq!(report.tables_patched, 1);
        // stale files are never pruned by the re-export
        assert!(dir.path().join("broken.json").exists());
    }

    #[tokio::test]
    async fn schema_resolution_failure_is_fatal_and_patches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/connections/conn_1/schemas"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({"enabled": true, "enabled_patch_settings": true}),
        );

        let err = apply_table_configs(&client_for(&server), "conn_1", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote { status: 500, .. }));
        assert!(patches(&server).await.is_empty());
    }

    #[tokio::test]
    async fn timed_out_table_patch_is_reported_and_folder_still_re_exported() {
        let server = MockServer::start().await;
        mount_schema(
            &server,
            json!({"orders": {"enabled": false, "enabled_patch_settings": {"allowed": true}}}),
        )
        .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({"table": "orders", "enabled": true, "enabled_patch_settings": true}),
        );

        let client = client_with_timeout(&server, Duration::from_millis(300));
        let report = apply_table_configs(&client, "conn_1", dir.path()).await.unwrap();

        assert_eq!(report.table_errors.len(), 1);
        assert_eq!(report.table_errors[0].table, "orders");
        assert_eq!(report.table_errors[0].status, None);
        assert_eq!(report.tables_patched, 0);
        // the closing export overwrote the edit with the remote state
        let orders = read_descriptor(dir.path().join("orders.json")).unwrap();
        assert_eq!(orders.enabled, Some(false));
    }

    #[tokio::test]
    async fn timed_out_schema_read_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/connections/conn_1/schemas"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"schemas": {"public": {"tables": {}}}}}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        accept_patches(&server).await;

        let dir = tempdir().unwrap();
        write_json(
            dir.path(),
            "orders.json",
            json!({"enabled": true, "enabled_patch_settings": true}),
        );

        let client = client_with_timeout(&server, Duration::from_millis(300));
        let err = apply_table_configs(&client, "conn_1", dir.path()).await.unwrap_err();
        match err {
            SyncError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(patches(&server).await.is_empty());
    }

    #[tokio::test]
    async fn export_apply_export_round_trip_is_stable() {
        let server = MockServer::start().await;
        mount_schema(
            &server,
            json!({
                "orders": {
                    "enabled": true,
                    "sync_mode": "SOFT_DELETE",
                    "enabled_patch_settings": {"allowed": true},
                    "supports_columns_config": true
                },
                "audit": {
                    "enabled": false,
                    "enabled_patch_settings": {"allowed": false},
                    "supports_columns_config": false
                }
            }),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/connections/conn_1/schemas/public/tables/orders/columns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"columns": {
                "a": {"name_in_destination": "a", "enabled": true, "hashed": false, "is_primary_key": true,
                      "enabled_patch_settings": {"allowed": false, "reason_code": "SYSTEM_COLUMN"}},
                "b": {"name_in_destination": "b", "enabled": false, "hashed": true, "is_primary_key": false,
                      "enabled_patch_settings": {"allowed": true}}
            }}})))
            .mount(&server)
            .await;
        accept_patches(&server).await;

        let client = client_for(&server);
        let dir = tempdir().unwrap();
        save_table_configs(&client, "conn_1", dir.path()).await.unwrap();
        let snapshot = |name: &str| fs::read(dir.path().join(name)).unwrap();
        let before = (snapshot("orders.json"), snapshot("audit.json"));

        let orders = read_descriptor(dir.path().join("orders.json")).unwrap();
        assert_eq!(orders.columns["a"].is_primary_key, Some(true));
        assert!(!orders.columns["a"].patch_allowed());
        assert_eq!(orders.columns["b"].hashed, Some(true));
        assert_eq!(orders.columns["b"].enabled, Some(false));

        let first = apply_table_configs(&client, "conn_1", dir.path()).await.unwrap();
        let first_patches = patches(&server).await;
        let second = apply_table_configs(&client, "conn_1", dir.path()).await.unwrap();
        let all_patches = patches(&server).await;

        assert_eq!(first, second);
        assert_eq!(first_patches.len(), 2);
        assert_eq!(&all_patches[2..], &first_patches[..]);
        assert_eq!(
            first_patches,
            vec![
                (
                    "/connections/conn_1/schemas/public/tables/orders".to_string(),
                    json!({"enabled": true, "sync_mode": "SOFT_DELETE"})
                ),
                (
                    "/connections/conn_1/schemas/public/tables/orders/columns/b".to_string(),
                    json!({"enabled": false, "hashed": true})
                ),
            ]
        );
        assert_eq!((snapshot("orders.json"), snapshot("audit.json")), before);
    }

    #[test]
    fn load_plans_sorts_by_table_and_collects_bad_files() {
        let dir = tempdir().unwrap();
        write_json(dir.path(), "b.json", json!({"enabled": true}));
        write_json(dir.path(), "a.json", json!({"enabled": true, "enabled_patch_settings": true}));
        fs::write(dir.path().join("c.json"), "42").unwrap();

        let loaded = load_plans(dir.path()).unwrap();
        let tables: Vec<_> = loaded.plans.iter().map(|p| p.table.as_str()).collect();
        assert_eq!(tables, vec!["a", "b"]);
        assert_eq!(loaded.file_errors.len(), 1);
    }
}
