//! Dashboard store operations against a mock dashboard server.

mod common;

use std::time::Duration;

use serde_json::json;
use wgdash_core::api::endpoints;
use wgdash_core::models::{PeerRateLimit, SchedulerType};
use wgdash_core::{Config, Dashboard, Route};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::{ok_response, Harness};

fn configurations_body() -> serde_json::Value {
    json!([
        {"Name": "wg0", "Status": true, "ConnectedPeers": 1, "TotalPeers": 3, "Protocol": "wg"},
        {"Name": "awg0", "Status": false, "Protocol": "awg"}
    ])
}

#[tokio::test]
async fn test_get_configurations_replaces_list() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::CONFIGURATIONS))
        .respond_with(ok_response(configurations_body()))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let configurations = dashboard.get_configurations().await.expect("fetch configurations");
    assert_eq!(configurations.len(), 2);

    let state = dashboard.state();
    let stored = state.configurations.expect("stored list");
    assert_eq!(stored[0].name, "wg0");
    assert_eq!(stored[1].protocol.display_name(), "AmneziaWG");
}

#[tokio::test]
async fn test_get_configuration_keeps_previous_state_on_failure() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::DASHBOARD_CONFIGURATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": false, "message": "nope"})))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let err = dashboard.get_configuration().await.unwrap_err();
    assert!(format!("{:#}", err).contains("nope"));
    assert!(dashboard.state().dashboard_configuration.is_none());
}

#[tokio::test]
async fn test_configuration_polling_stops_on_session_expiry() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::CONFIGURATIONS))
        .respond_with(ok_response(configurations_body()))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let id = dashboard.start_configuration_polling(Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(180)).await;
    assert!(h.request_count(endpoints::CONFIGURATIONS).await >= 2);
    assert!(dashboard.state().configurations.is_some());

    h.session.handle_session_expiration();
    assert!(!h.session.intervals().contains(id));
    // Cleanup hook already forgot the poll
    assert!(!dashboard.stop_configuration_polling());

    let polled = h.request_count(endpoints::CONFIGURATIONS).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.request_count(endpoints::CONFIGURATIONS).await, polled);
}

#[tokio::test]
async fn test_polling_after_expiry_is_cancelled_immediately() {
    let h = Harness::start().await;
    let dashboard = Dashboard::new(h.client.clone());
    h.session.handle_session_expiration();

    let id = dashboard.start_configuration_polling(Duration::from_millis(10));
    assert!(!h.session.intervals().contains(id));
    assert!(!dashboard.stop_configuration_polling());
}

#[tokio::test]
async fn test_get_peer_settings() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::GET_PEER_SETTINGS))
        .and(query_param("interface", "wg0"))
        .and(query_param("peer_key", "peer-a"))
        .respond_with(ok_response(json!({"DNS": "1.1.1.1", "keepalive": 21})))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::GET_PEER_SETTINGS))
        .and(query_param("peer_key", "ghost"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": false, "message": "Peer does not exist"})),
        )
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let settings = dashboard
        .get_peer_settings("wg0", "peer-a")
        .await
        .expect("fetch peer settings");
    assert_eq!(settings["keepalive"], 21);

    let err = dashboard.get_peer_settings("wg0", "ghost").await.unwrap_err();
    assert_eq!(err.to_string(), "Peer does not exist");
}

#[tokio::test]
async fn test_fetch_peer_rate_limit() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::GET_PEER_RATE_LIMIT))
        .and(query_param("interface", "wg0"))
        .and(query_param("peer_key", "peer-a"))
        .respond_with(ok_response(json!({"upload_rate": 500, "download_rate": 1000, "scheduler_type": "hfsc"})))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let limit = dashboard.fetch_peer_rate_limit("wg0", "peer-a").await;
    assert_eq!(limit.upload_rate, 500.0);
    assert_eq!(limit.scheduler_type, SchedulerType::Hfsc);

    let state = dashboard.state();
    assert_eq!(state.peer_rate_limits["peer-a"], limit);
    assert!(!state.fetching_rate_limit);
    assert!(state.rate_limit_error.is_none());
}

#[tokio::test]
async fn test_fetch_peer_rate_limit_failure_falls_back() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::GET_PEER_RATE_LIMIT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": false, "message": "Peer not found"})))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let limit = dashboard.fetch_peer_rate_limit("wg0", "ghost").await;
    assert_eq!(limit, PeerRateLimit::default());

    let state = dashboard.state();
    assert_eq!(state.rate_limit_error.as_deref(), Some("Request rejected: Peer not found"));
    assert_eq!(state.peer_rate_limits["ghost"].scheduler_type, SchedulerType::Htb);
}

#[tokio::test]
async fn test_set_and_remove_peer_rate_limit() {
    let h = Harness::start().await;
    h.mount_csrf_token("tok").await;
    Mock::given(method("POST"))
        .and(path(endpoints::SET_PEER_RATE_LIMIT))
        .and(body_json(json!({
            "interface": "wg0",
            "peer_key": "peer-a",
            "upload_rate": 100.0,
            "download_rate": 200.0,
            "scheduler_type": "cake"
        })))
        .respond_with(ok_response(json!(null)))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoints::REMOVE_PEER_RATE_LIMIT))
        .and(body_json(json!({"interface": "wg0", "peer_key": "peer-a"})))
        .respond_with(ok_response(json!(null)))
        .expect(1)
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    dashboard
        .set_peer_rate_limit("wg0", "peer-a", 100.0, 200.0, SchedulerType::Cake)
        .await
        .expect("set rate limit");
    assert!(dashboard.state().peer_rate_limits["peer-a"].is_limited());

    dashboard
        .remove_peer_rate_limit("wg0", "peer-a")
        .await
        .expect("remove rate limit");
    assert!(!dashboard.state().peer_rate_limits["peer-a"].is_limited());
}

#[tokio::test]
async fn test_set_peer_rate_limit_reports_server_message() {
    let h = Harness::start().await;
    h.mount_csrf_token("tok").await;
    Mock::given(method("POST"))
        .and(path(endpoints::SET_PEER_RATE_LIMIT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": false, "message": "Scheduler locked"})))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let err = dashboard
        .set_peer_rate_limit("wg0", "peer-a", 1.0, 1.0, SchedulerType::Htb)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Scheduler locked");
    assert!(dashboard.state().peer_rate_limits.is_empty());
}

#[tokio::test]
async fn test_get_interface_scheduler_defaults() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::INTERFACE_SCHEDULER))
        .respond_with(ok_response(json!({"scheduler_type": null})))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let scheduler = dashboard.get_interface_scheduler("wg0").await.expect("fetch scheduler");
    assert_eq!(scheduler.scheduler_type, SchedulerType::Htb);
    assert!(!scheduler.locked);
    assert_eq!(dashboard.state().interface_schedulers["wg0"], scheduler);
}

#[tokio::test]
async fn test_sign_out_tears_down_session() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::SIGN_OUT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": true})))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoints::CONFIGURATIONS))
        .respond_with(ok_response(json!([])))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let mut config = Config::default();
    let key = config.add_cross_server();
    config.set_active_cross_server(&key).expect("activate server");
    h.session.set_token("tok".to_string());
    let id = dashboard.start_configuration_polling(Duration::from_secs(60));

    dashboard.sign_out(&mut config).await;

    assert_eq!(h.session.token(), None);
    assert!(!h.session.intervals().contains(id));
    assert!(config.active_cross_server().is_none());
    assert!(h.client.remote().is_none());
    assert_eq!(h.navigator.current(), Some(Route::SignIn));
}

#[tokio::test]
async fn test_status_stream_replaces_snapshot() {
    let h = Harness::start().await;
    let body = "data: {\"wg0\": true}\n\n: keepalive\n\ndata: {\"wg0\": false, \"wg1\": true}\n\n";
    Mock::given(method("GET"))
        .and(path(endpoints::CONFIG_STATUS_STREAM))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    let id = dashboard.start_status_stream();
    assert!(h.session.intervals().contains(id));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let statuses = dashboard.state().config_statuses;
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses.get("wg0"), Some(&false));
    assert_eq!(statuses.get("wg1"), Some(&true));

    assert!(dashboard.stop_status_stream());
    assert!(!h.session.intervals().contains(id));
}

#[tokio::test]
async fn test_status_stream_unauthorized_expires_session() {
    let h = Harness::start().await;
    Mock::given(method("GET"))
        .and(path(endpoints::CONFIG_STATUS_STREAM))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    let dashboard = Dashboard::new(h.client.clone());

    dashboard.start_status_stream();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(h.session.is_expired());
    assert_eq!(h.navigator.current(), Some(Route::SignIn));
    assert!(h.session.intervals().is_empty());
}
