//! Projection, export and rehydration.

use std::collections::HashMap;

use conductor_core::NoSecrets;
use conductor_model::{
    EndpointSpec, GraphHandle, IconVariant, ProbeSpec, REDACTED, Snapshot, View,
};
use pretty_assertions::assert_eq;

fn application() -> GraphHandle {
    let graph = GraphHandle::new();
    let password = graph.add_parameter("db-password", "s3cr3t!").unwrap().secret();
    let region = graph
        .add_parameter("region", "eu")
        .unwrap()
        .publish_value_as_default();
    let db = graph
        .add_container("db", "postgres:16")
        .unwrap()
        .with_endpoint(EndpointSpec::new(conductor_model::Scheme::Tcp).port(5432).target_port(5432))
        .unwrap()
        .with_environment("POSTGRES_PASSWORD", &password)
        .with_volume(Some("pgdata"), "/var/lib/postgresql/data", false);
    let conn = graph
        .add_connection_string("catalog-db")
        .unwrap()
        .with_connection_string_value("Host=localhost;Port=5432")
        .with_connection_string_env("DATABASE_URL");
    let migrate = graph
        .add_executable("migrate", "migrate", "./tools")
        .unwrap()
        .with_reference(&conn)
        .unwrap()
        .wait_for_start(&db)
        .unwrap();
    graph
        .add_project("api", "src/api/api.proj")
        .unwrap()
        .with_http_endpoint(Some(8080))
        .unwrap()
        .with_http_health_check("/health", None, None)
        .with_http_probe(ProbeSpec::liveness("/alive"))
        .with_reference(&conn)
        .unwrap()
        .with_environment("REGION", &region)
        .with_environment("DB_PASSWORD", &password)
        .wait_for(&db)
        .unwrap()
        .wait_for_completion(&migrate, 0)
        .unwrap()
        .with_icon("Globe", IconVariant::Regular)
        .with_url_display("http://localhost:8080/swagger", "Swagger");
    graph
}

#[test]
fn export_then_rehydrate_is_isomorphic() {
    let original = application();
    let exported = original.export_snapshot().unwrap();

    let rehydrated = GraphHandle::from_snapshot(&exported).unwrap();
    let again = rehydrated.export_snapshot().unwrap();
    assert_eq!(again, exported);

    let names = |g: &GraphHandle| -> Vec<String> {
        g.resources().iter().map(|r| r.name.to_string()).collect()
    };
    assert_eq!(names(&rehydrated), names(&original));
    assert_eq!(rehydrated.relationships(), original.relationships());
    assert_eq!(rehydrated.topo_order().unwrap(), original.topo_order().unwrap());
}

#[test]
fn runtime_view_round_trip_keeps_non_secret_values() {
    let original = application();
    let snapshot = original.project(View::Runtime, &NoSecrets).unwrap();
    let rehydrated = GraphHandle::from_snapshot(&snapshot).unwrap();
    assert_eq!(rehydrated.project(View::Runtime, &NoSecrets).unwrap(), snapshot);

    let api = snapshot.resource("api").unwrap();
    assert_eq!(api.environment["REGION"], "eu");
    assert_eq!(api.environment["DATABASE_URL"], "Host=localhost;Port=5432");
    assert_eq!(api.environment["DB_PASSWORD"], REDACTED);
}

#[test]
fn secrets_cannot_be_recovered_from_any_projection() {
    let original = application();
    for view in [View::Runtime, View::Publish, View::ControlSurface] {
        let json = original.project(view, &NoSecrets).unwrap().to_json().unwrap();
        assert!(!json.contains("s3cr3t!"));

        let parsed = Snapshot::from_json(&json).unwrap();
        let rehydrated = GraphHandle::from_snapshot(&parsed).unwrap();
        assert!(
            rehydrated
                .resources()
                .iter()
                .all(|r| !format!("{r:?}").contains("s3cr3t!"))
        );
    }
}

#[test]
fn configuration_values_show_up_in_runtime_views() {
    let graph = GraphHandle::new();
    let key = graph
        .add_parameter_from_configuration("api-key", "Parameters:api-key")
        .unwrap();
    graph
        .add_executable("worker", "worker", ".")
        .unwrap()
        .with_environment("API_KEY", &key);

    let mut store = HashMap::new();
    store.insert("Parameters:api-key".to_string(), "k-123".to_string());
    let snapshot = graph.project(View::Runtime, &store).unwrap();
    assert_eq!(snapshot.resource("worker").unwrap().environment["API_KEY"], "k-123");

    let published = graph.export_snapshot().unwrap();
    assert_eq!(
        published.resource("worker").unwrap().environment["API_KEY"],
        "{api-key.value}"
    );
}

#[test]
fn edges_to_excluded_resources_are_dropped() {
    let graph = GraphHandle::new();
    let tool = graph
        .add_executable("seed", "seed", ".")
        .unwrap()
        .exclude_from_manifest();
    graph
        .add_executable("api", "api", ".")
        .unwrap()
        .wait_for_completion(&tool, 0)
        .unwrap();

    let published = graph.project(View::Publish, &NoSecrets).unwrap();
    assert!(published.resource("seed").is_none());
    assert!(published.relationships.is_empty());

    let runtime = graph.project(View::Runtime, &NoSecrets).unwrap();
    assert_eq!(runtime.relationships.len(), 1);
}
