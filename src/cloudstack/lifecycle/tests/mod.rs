//! Unit tests for server creation and the polling wait.

mod power;

use std::time::Duration;

use rstest::{fixture, rstest};

use super::{CreateArgs, derive_host_name};
use crate::cloudstack::{Cloudstack, CloudstackError};
use crate::connection::ConnectionRecord;
use crate::provider::LaunchDefaults;
use crate::test_support::{ScriptedApi, ScriptedFactory};

pub(super) fn connector(api: ScriptedApi) -> Cloudstack<ScriptedFactory> {
    let mut record = ConnectionRecord::new(1, "http://cloud:8080/client/api", "key", "secret");
    record.set_zone(Some("zone-1"));
    Cloudstack::new(record, ScriptedFactory::new(api))
        .with_poll_interval(Duration::from_millis(1))
        .with_wait_timeout(Duration::from_millis(50))
}

#[fixture]
fn args() -> CreateArgs {
    CreateArgs::new("web01.example.com", "tmpl-1", "small")
}

#[rstest]
#[case("web01.example.com", "web01")]
#[case("web01", "web01")]
#[case("  db.internal  ", "db")]
#[case("trailing.", "trailing.")]
#[case("a..b", "a.")]
#[case("node_1.-x.y", "node_1.-x")]
fn host_name_is_cut_at_first_dotted_word(#[case] display: &str, #[case] expected: &str) {
    assert_eq!(derive_host_name(display), expected);
}

#[rstest]
#[tokio::test]
async fn create_submits_derived_request(args: CreateArgs) {
    let api = ScriptedApi::default();
    let cloud = connector(api.clone());
    let defaults = LaunchDefaults::with_key_pair("cirrus-1abc");

    let server = cloud.create(args, &defaults).await.expect("create should succeed");

    assert_eq!(server.id.as_str(), "vm-1");
    assert_eq!(server.ip_address(), Some("10.1.1.1"));
    let requests = api.created_requests();
    let request = requests.first().expect("one request submitted");
    assert_eq!(request.name, "web01");
    assert_eq!(request.display_name, "web01");
    assert_eq!(request.zone_id, "zone-1");
    assert_eq!(request.key_pair.as_deref(), Some("cirrus-1abc"));
    assert!(request.network_ids.is_empty());
    assert!(request.security_group_ids.is_empty());
}

#[rstest]
#[tokio::test]
async fn create_prefers_network_then_subnet_and_drops_security_groups(mut args: CreateArgs) {
    let api = ScriptedApi::default();
    let cloud = connector(api.clone());
    args.subnet_id = Some(String::from("subnet-9"));
    args.security_group_ids = vec![String::from("sg-1")];

    cloud
        .create(args.clone(), &LaunchDefaults::default())
        .await
        .expect("create with subnet");
    args.network_id = Some(String::from("net-2"));
    cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect("create with network");

    let networks: Vec<Vec<String>> = api
        .created_requests()
        .into_iter()
        .map(|request| request.network_ids)
        .collect();
    assert_eq!(networks, [vec![String::from("subnet-9")], vec![String::from("net-2")]]);
    assert!(
        api.created_requests()
            .iter()
            .all(|request| request.security_group_ids.is_empty())
    );
}

#[rstest]
#[tokio::test]
async fn caller_options_override_defaults(mut args: CreateArgs) {
    let api = ScriptedApi::default();
    let mut cloud = connector(api.clone());
    cloud.record_mut().set_hypervisor(Some("KVM"));
    let mut defaults = LaunchDefaults::with_key_pair("cirrus-1default");
    defaults
        .extra
        .insert(String::from("rootdisksize"), String::from("20"));
    defaults
        .extra
        .insert(String::from("userdata"), String::from("ZGVmYXVsdA=="));
    args.key_pair = Some(String::from("operator-key"));
    args.extra
        .insert(String::from("rootdisksize"), String::from("40"));

    cloud.create(args, &defaults).await.expect("create should succeed");

    let request = api.created_requests().pop().expect("request submitted");
    assert_eq!(request.key_pair.as_deref(), Some("operator-key"));
    assert_eq!(request.hypervisor.as_deref(), Some("KVM"));
    assert_eq!(request.extra.get("rootdisksize").map(String::as_str), Some("40"));
    assert_eq!(
        request.extra.get("userdata").map(String::as_str),
        Some("ZGVmYXVsdA==")
    );
}

#[rstest]
#[tokio::test]
async fn missing_zone_fails_before_any_remote_call(args: CreateArgs) {
    let api = ScriptedApi::default();
    let mut cloud = connector(api.clone());
    cloud.record_mut().set_zone(None::<String>);

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create without zone should fail");

    assert!(matches!(err, CloudstackError::Configuration(_)));
    assert!(api.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn unrepresentable_wait_timeout_fails_before_allocation(args: CreateArgs) {
    let api = ScriptedApi::default();
    let cloud = connector(api.clone()).with_wait_timeout(Duration::MAX);

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create with an endless wait should fail");

    assert!(matches!(err, CloudstackError::Configuration(_)), "{err:?}");
    assert!(api.calls().is_empty());
    assert!(api.server_ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn failure_before_allocation_is_returned_unchanged(args: CreateArgs) {
    let api = ScriptedApi::default();
    let provider_error = CloudstackError::Provider {
        message: String::from("Insufficient capacity"),
    };
    api.fail("create_server", provider_error.clone());
    let cloud = connector(api.clone());

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create should fail");

    assert_eq!(err, provider_error);
    assert!(!api.calls().iter().any(|call| call.starts_with("destroy_server")));
}

#[rstest]
#[tokio::test]
async fn waits_for_nic_across_polls(args: CreateArgs) {
    let api = ScriptedApi::default().with_nic_delay(3);
    let cloud = connector(api.clone());

    let server = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect("create should succeed once a nic appears");

    assert_eq!(server.nics.len(), 1);
    let polls = api
        .calls()
        .iter()
        .filter(|call| call.as_str() == "find_server:vm-1")
        .count();
    assert_eq!(polls, 3);
}

#[rstest]
#[tokio::test]
async fn timeout_rolls_back_allocated_server(args: CreateArgs) {
    let api = ScriptedApi::default().without_nics();
    let cloud = connector(api.clone());

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create should time out");

    let CloudstackError::PartialProvisioning { server_id, message } = err else {
        panic!("expected PartialProvisioning, got {err:?}");
    };
    assert_eq!(server_id, "vm-1");
    assert!(message.contains("wait_for_nics"), "message: {message}");
    assert!(api.calls().contains(&String::from("destroy_server:vm-1")));
    assert!(api.server_ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn provider_failure_while_polling_carries_its_message(args: CreateArgs) {
    let api = ScriptedApi::default().without_nics();
    api.fail("find_server", CloudstackError::Provider {
        message: String::from("Job failed: no route to host"),
    });
    let cloud = connector(api.clone());

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create should fail");

    assert_eq!(
        err,
        CloudstackError::PartialProvisioning {
            server_id: String::from("vm-1"),
            message: String::from("Job failed: no route to host"),
        }
    );
    assert!(api.server_ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn rollback_failure_is_not_escalated(args: CreateArgs) {
    let api = ScriptedApi::default().without_nics();
    api.fail("destroy_server", CloudstackError::Provider {
        message: String::from("destroy refused"),
    });
    let cloud = connector(api.clone());

    let err = cloud
        .create(args, &LaunchDefaults::default())
        .await
        .expect_err("create should fail");

    assert!(matches!(err, CloudstackError::PartialProvisioning { .. }));
    assert_eq!(api.server_ids(), ["vm-1"]);
}

#[rstest]
#[tokio::test]
async fn concurrent_create_is_rejected(args: CreateArgs) {
    let api = ScriptedApi::default().with_nic_delay(5);
    let cloud = connector(api.clone()).with_poll_interval(Duration::from_millis(5));
    let defaults = LaunchDefaults::default();

    let (first, second) = tokio::join!(
        cloud.create(args.clone(), &defaults),
        cloud.create(args, &defaults)
    );

    assert!(first.is_ok(), "first create: {first:?}");
    assert_eq!(second, Err(CloudstackError::CreateInProgress));
    assert_eq!(api.created_requests().len(), 1);

    let third = cloud
        .create(CreateArgs::new("web02", "tmpl-1", "small"), &defaults)
        .await;
    assert!(third.is_ok(), "guard should be released: {third:?}");
}
