//! Tests for operations on existing servers.

use rstest::rstest;

use super::connector;
use crate::cloudstack::CloudstackError;
use crate::model::{Nic, Server};
use crate::test_support::ScriptedApi;

fn existing(state: &str) -> ScriptedApi {
    let api = ScriptedApi::default();
    api.insert_server(Server {
        id: "vm-7".into(),
        name: String::from("app"),
        state: state.to_owned(),
        nics: vec![Nic {
            ip_address: Some(String::from("192.0.2.10")),
            ..Nic::default()
        }],
        ..Server::default()
    });
    api
}

fn actions(api: &ScriptedApi) -> Vec<String> {
    api.calls()
        .into_iter()
        .filter(|call| !call.starts_with("find_server"))
        .collect()
}

#[rstest]
#[case("Paused", "unpause:vm-7")]
#[case("paused", "unpause:vm-7")]
#[case(" PAUSED ", "unpause:vm-7")]
#[case("running", "resume:vm-7")]
#[case("Stopped", "resume:vm-7")]
#[tokio::test]
async fn start_unpauses_only_paused_servers(#[case] state: &str, #[case] expected: &str) {
    let api = existing(state);
    connector(api.clone())
        .start("vm-7")
        .await
        .expect("start should succeed");
    assert_eq!(actions(&api), [expected]);
}

#[tokio::test]
async fn stop_pause_and_reset_map_to_actions() {
    let api = existing("Running");
    let cloud = connector(api.clone());
    cloud.stop("vm-7").await.expect("stop");
    cloud.pause("vm-7").await.expect("pause");
    cloud.reset("vm-7").await.expect("reset");
    assert_eq!(
        actions(&api),
        ["suspend:vm-7", "pause:vm-7", "hard reboot:vm-7"]
    );
}

#[rstest]
#[case("start")]
#[case("stop")]
#[case("pause")]
#[case("reset")]
#[case("console")]
#[tokio::test]
async fn operations_on_unknown_servers_are_not_found(#[case] operation: &str) {
    let cloud = connector(ScriptedApi::default());
    let result = match operation {
        "start" => cloud.start("ghost").await,
        "stop" => cloud.stop("ghost").await,
        "pause" => cloud.pause("ghost").await,
        "reset" => cloud.reset("ghost").await,
        _ => cloud.console("ghost").await.map(drop),
    };
    assert_eq!(
        result,
        Err(CloudstackError::NotFound {
            resource: String::from("server"),
            id: String::from("ghost"),
        })
    );
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let api = existing("Running");
    let cloud = connector(api.clone());

    cloud.destroy("vm-7").await.expect("first destroy");
    cloud.destroy("vm-7").await.expect("second destroy");

    assert!(api.server_ids().is_empty());
    assert_eq!(actions(&api), ["destroy_server:vm-7"]);
}

#[tokio::test]
async fn destroy_treats_vanished_server_as_success() {
    let api = existing("Running");
    api.fail("destroy_server", CloudstackError::NotFound {
        resource: String::from("server"),
        id: String::from("vm-7"),
    });
    connector(api)
        .destroy("vm-7")
        .await
        .expect("not found on delete counts as destroyed");
}

#[tokio::test]
async fn destroy_surfaces_other_provider_errors() {
    let api = existing("Running");
    let refusal = CloudstackError::Provider {
        message: String::from("server is locked"),
    };
    api.fail("destroy_server", refusal.clone());
    let err = connector(api)
        .destroy("vm-7")
        .await
        .expect_err("provider refusal should surface");
    assert_eq!(err, refusal);
}

#[tokio::test]
async fn console_is_stamped_with_utc_time() {
    let cloud = connector(existing("Running"));
    let session = cloud.console("vm-7").await.expect("console should open");

    assert_eq!(
        session.get("url").and_then(|value| value.as_str()),
        Some("https://console.example.test/vm-7")
    );
    let stamp = session
        .get("timestamp")
        .and_then(|value| value.as_str())
        .expect("timestamp should be present");
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
}

#[tokio::test]
async fn ip_address_reads_first_nic() {
    let cloud = connector(existing("Running"));
    assert_eq!(
        cloud.ip_address("vm-7").await.expect("lookup"),
        Some(String::from("192.0.2.10"))
    );
}
