//! The cluster step vocabulary run against in-memory and mocked gateways.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mockall::mock;
use rstest::rstest;
use scenarist::config::EngineConfig;
use scenarist::dispatch::{FailureKind, RunReport, ScenarioResult};
use scenarist::engine::Engine;
use scenarist::platform::{
    self, CommandOutput, Convergence, Deployment, ExecTarget, GatewayError, PlatformGateway, Pod,
    Service, SharedGateway, StatefulSet,
};
use scenarist::step::Scenario;
use test_support::FakeCluster;

mock! {
    Gateway {}
    impl PlatformGateway for Gateway {
        fn ping(&self) -> Result<(), GatewayError>;
        fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, GatewayError>;
        fn scale_up_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;
        fn scale_down_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;
        fn set_deployment_replicas(&self, name: &str, namespace: &str, replicas: u32) -> Result<(), GatewayError>;
        fn deployment_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError>;
        fn active_deployment_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError>;
        fn deployment_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError>;
        fn get_stateful_set(&self, name: &str, namespace: &str) -> Result<StatefulSet, GatewayError>;
        fn set_stateful_set_replicas(&self, name: &str, namespace: &str, replicas: u32) -> Result<(), GatewayError>;
        fn stateful_set_names_for_service(&self, service: &str, namespace: &str) -> Result<Vec<String>, GatewayError>;
        fn scale_down_stateful_sets_for_service(&self, service: &str, namespace: &str, convergence: Convergence) -> Result<(), GatewayError>;
        fn stateful_set_pod_names(&self, name: &str, namespace: &str) -> Result<Vec<String>, GatewayError>;
        fn get_service(&self, name: &str, namespace: &str) -> Result<Service, GatewayError>;
        fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, GatewayError>;
        fn pods_for_service(&self, service: &str, namespace: &str) -> Result<Vec<Pod>, GatewayError>;
        fn ready_pod_count_for_service(&self, service: &str, namespace: &str) -> Result<usize, GatewayError>;
        fn exec_in_pod(&self, target: &ExecTarget, command: &str) -> Result<CommandOutput, GatewayError>;
        fn pod_name_by_ip(&self, ip: &str, namespace: &str) -> Result<Option<String>, GatewayError>;
        fn delete_pod(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;
    }
}

fn engine_with(config: EngineConfig, gateway: SharedGateway) -> Engine {
    let mut builder = Engine::builder(config);
    platform::steps::register(builder.steps()).expect("vocabulary");
    platform::declare_gateway(builder.fixtures(), move |_| Ok(Arc::clone(&gateway)))
        .expect("gateway fixture");
    builder.build().expect("engine")
}

fn engine(gateway: SharedGateway) -> Engine {
    engine_with(EngineConfig::default(), gateway)
}

fn scenario(lines: &[&str]) -> Scenario {
    Scenario::from_lines("cluster", lines).expect("scenario")
}

fn only(report: &RunReport) -> &ScenarioResult {
    report.scenarios.first().expect("one scenario")
}

const SET_REPLICAS: [&str; 3] = [
    r#"Given deployment "c" exists in namespace "shop""#,
    r#"When I set replicas to 3 for deployment "c" in namespace "shop""#,
    r#"Then deployment "c" should have 3 replicas"#,
];

#[rstest]
fn setting_replicas_is_verified() {
    let cluster = FakeCluster::new()
        .deployment("shop", "c", 1, None)
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&SET_REPLICAS)]);
    assert!(report.is_success(), "{report}");
    assert_eq!(cluster.deployment_replicas("shop", "c"), Some(3));
}

#[rstest]
fn gateway_failure_skips_verification_and_keeps_the_message() {
    let cluster = FakeCluster::new()
        .deployment("shop", "c", 1, None)
        .fail(
            "set_deployment_replicas",
            GatewayError::api("admission webhook \"quota\" denied the request"),
        )
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&SET_REPLICAS)]);
    let result = only(&report);
    let tail = result.steps.get(1..).expect("when and then");
    assert_eq!(tail.iter().filter(|s| s.outcome.is_passed()).count(), 0);
    assert_eq!(tail.iter().filter(|s| s.outcome.is_skipped()).count(), 1);
    let failure = result.failure().expect("failure");
    assert_eq!(failure.kind, FailureKind::Gateway);
    assert_eq!(failure.message, "admission webhook \"quota\" denied the request");
    assert_eq!(cluster.call_count("get_deployment"), 1);
}

#[rstest]
fn missing_deployment_fails_the_background() {
    let cluster = FakeCluster::new().into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&SET_REPLICAS)]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.step_index, 0);
    assert_eq!(failure.message, "deployment 'c' not found in namespace 'shop'");
}

#[rstest]
#[case("up", 2, "more")]
#[case("down", 0, "fewer")]
fn scaling_by_one_is_compared_with_before(
    #[case] direction: &str,
    #[case] expected: u32,
    #[case] comparison: &str,
) {
    let cluster = FakeCluster::new().deployment("shop", "web", 1, None).into_shared();
    let when = format!(r#"When I scale {direction} deployment "web" in namespace "shop""#);
    let then = format!("Then deployment should have {comparison} replicas than before");
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[&when, &then])]);
    assert!(report.is_success(), "{report}");
    assert_eq!(cluster.deployment_replicas("shop", "web"), Some(expected));
}

#[rstest]
fn gateway_is_connected_once_per_run() {
    let cluster = FakeCluster::new().into_shared();
    let connects = Arc::new(AtomicUsize::new(0));
    let mut builder = Engine::builder(EngineConfig::default());
    platform::steps::register(builder.steps()).expect("vocabulary");
    let counter = Arc::clone(&connects);
    let shared = FakeCluster::gateway(&cluster);
    platform::declare_gateway(builder.fixtures(), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&shared))
    })
    .expect("gateway fixture");
    let engine = builder.build().expect("engine");
    let scenarios: Vec<Scenario> = (0..10)
        .map(|_| scenario(&["Given Kubernetes cluster is available"]))
        .collect();
    let report = engine.run(&scenarios);
    assert!(report.is_success(), "{report}");
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(cluster.call_count("ping"), 10);
}

#[rstest]
fn unreachable_cluster_fails_with_platform_message() {
    let cluster = FakeCluster::new().unreachable().into_shared();
    let report = engine(FakeCluster::gateway(&cluster))
        .run(&[scenario(&["Given Kubernetes cluster is available"])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.kind, FailureKind::Gateway);
    assert_eq!(failure.message, "connection refused");
}

#[rstest]
fn connection_failure_is_a_setup_failure() {
    let mut builder = Engine::builder(EngineConfig::default());
    platform::steps::register(builder.steps()).expect("vocabulary");
    platform::declare_gateway(builder.fixtures(), |config| {
        anyhow::bail!("no kubeconfig at {:?}", config.kubeconfig_file)
    })
    .expect("gateway fixture");
    let report = builder
        .build()
        .expect("engine")
        .run(&[scenario(&["Given Kubernetes cluster is available"])]);
    let result = only(&report);
    let failure = result.setup_failure.as_ref().expect("setup failure");
    assert_eq!(failure.kind, FailureKind::FixtureSetup);
    assert_eq!(
        failure.message,
        "fixture 'platform' failed to set up: no kubeconfig at None"
    );
}

#[rstest]
#[case(EngineConfig::default(), 300)]
#[case(EngineConfig { convergence_timeout_secs: 30, ..EngineConfig::default() }, 30)]
fn stateful_set_scale_down_waits_for_convergence(#[case] config: EngineConfig, #[case] secs: u64) {
    let cluster = FakeCluster::new()
        .stateful_set("db", "cassandra", 3, 3, Some("cassandra-svc"))
        .stateful_set("db", "cassandra-reaper", 1, 1, Some("cassandra-svc"))
        .stateful_set("db", "unrelated", 2, 2, Some("other"))
        .into_shared();
    let report = engine_with(config, FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I scale down statefulsets by service name "cassandra-svc" in namespace "db" with check"#,
        "Then all related statefulsets should be scaled down",
        r#"When I check statefulset "unrelated" ready replicas in namespace "db""#,
        "Then all replicas should be ready",
    ])]);
    assert!(report.is_success(), "{report}");
    assert_eq!(
        cluster.last_convergence(),
        Some(Convergence::within(Duration::from_secs(secs)))
    );
}

#[rstest]
fn stateful_set_pods_follow_ordinal_names() {
    let cluster = FakeCluster::new()
        .stateful_set("db", "cassandra", 3, 3, None)
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I get pod names for statefulset "cassandra" in namespace "db""#,
        r#"Then I should receive a list of pod names with pattern "cassandra-N""#,
    ])]);
    assert!(report.is_success(), "{report}");
}

#[rstest]
fn partially_ready_stateful_set_is_reported() {
    let cluster = FakeCluster::new()
        .stateful_set("db", "cassandra", 3, 1, None)
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I check statefulset "cassandra" ready replicas in namespace "db""#,
        "Then all replicas should be ready",
    ])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.kind, FailureKind::Assertion);
    assert_eq!(failure.message, "StatefulSet cassandra: only 1 of 3 replicas are ready");
}

#[rstest]
fn service_type_and_ports_are_checked() {
    let cluster = FakeCluster::new()
        .service("search", "elasticsearch", "ClusterIP", &[9200, 9300])
        .into_shared();
    let gateway = FakeCluster::gateway(&cluster);
    let report = engine(gateway).run(&[
        scenario(&[
            r#"When I get service "elasticsearch" in namespace "search""#,
            "Then service should be available",
            "And I log the service details",
            r#"And service type should be "ClusterIP""#,
            "And service should have port 9200",
        ]),
        scenario(&[
            r#"When I get service "elasticsearch" in namespace "search""#,
            "Then service should have port 443",
        ]),
    ]);
    assert_eq!(report.passed(), 1, "{report}");
    let (_, failure) = report.failures().next().expect("failure");
    assert_eq!(
        failure.message,
        "Expected port 443 not found in service ports: [9200, 9300]"
    );
}

#[rstest]
fn verification_without_retrieval_fails_cleanly() {
    let cluster = FakeCluster::new().into_shared();
    let report =
        engine(FakeCluster::gateway(&cluster)).run(&[scenario(&["Then service should be available"])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.message, "Service was not retrieved");
    assert!(cluster.calls().is_empty());
}

#[rstest]
fn pods_are_found_by_ip_and_deleted() {
    let cluster = FakeCluster::new()
        .pod(
            Pod {
                name: "test-pod-12345".into(),
                namespace: "apps".into(),
                ip: Some("10.129.2.61".into()),
                ready: true,
            },
            Some("api"),
        )
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"Given I have pod IP "10.129.2.61""#,
        r#"When I look up pod name by IP "10.129.2.61" in namespace "apps""#,
        "Then I should receive the pod name",
        r#"When I delete pod "test-pod-12345" in namespace "apps""#,
        "Then pod should be deleted",
    ])]);
    assert!(report.is_success(), "{report}");
    assert!(!cluster.has_pod("apps", "test-pod-12345"));
}

#[rstest]
fn unknown_ip_is_an_assertion_failure() {
    let cluster = FakeCluster::new().into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I look up pod name by IP "10.0.0.9" in namespace "apps""#,
        "Then I should receive the pod name",
    ])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.message, "No pod found with IP 10.0.0.9");
}

#[rstest]
fn ready_pod_count_must_match_total() {
    let cluster = FakeCluster::new()
        .deployment_with_ready("apps", "api", 2, 1, Some("api"))
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I count pods in ready status for service "api" in namespace "apps""#,
        "Then ready pods count should match expected count",
    ])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.message, "Only 1 of 2 pods are ready");
}

#[rstest]
fn active_deployments_are_counted_per_service() {
    let cluster = FakeCluster::new()
        .deployment("apps", "api", 2, Some("api"))
        .deployment("apps", "api-worker", 1, Some("api"))
        .deployment_with_ready("apps", "api-canary", 1, 0, Some("api"))
        .into_shared();
    let report = engine(FakeCluster::gateway(&cluster)).run(&[scenario(&[
        r#"When I get active deployments count for service "api" in namespace "apps""#,
        "Then all deployments should be active",
    ])]);
    let failure = only(&report).failure().expect("failure");
    assert_eq!(failure.message, "Only 2 of 3 deployments are active");
}

#[rstest]
fn command_runs_in_the_named_container() {
    let mut mock = MockGateway::new();
    mock.expect_exec_in_pod()
        .withf(|target, command| {
            target.pod == "multi-container"
                && target.namespace == "apps"
                && target.container.as_deref() == Some("app")
                && command == "cat /etc/hosts"
        })
        .times(1)
        .returning(|_, _| {
            Ok(CommandOutput {
                stdout: "127.0.0.1 localhost\n".into(),
                stderr: String::new(),
            })
        });
    let report = engine(Arc::new(mock)).run(&[scenario(&[
        r#"When I execute command "cat /etc/hosts" in pod "multi-container" container "app" namespace "apps""#,
        "Then command should execute successfully",
        "And I should receive command output",
    ])]);
    assert!(report.is_success(), "{report}");
}

#[rstest]
fn command_without_container_uses_the_default() {
    let mut mock = MockGateway::new();
    mock.expect_exec_in_pod()
        .withf(|target, _| target.container.is_none() && target.pod == "elasticsearch-0")
        .times(1)
        .returning(|_, _| Ok(CommandOutput::default()));
    let report = engine(Arc::new(mock)).run(&[scenario(&[
        r#"When I execute command "ls -la" in pod "elasticsearch-0" namespace "search""#,
        "Then command should execute successfully",
    ])]);
    assert!(report.is_success(), "{report}");
}

#[rstest]
fn timeout_from_the_gateway_is_reported_verbatim() {
    let mut mock = MockGateway::new();
    mock.expect_stateful_set_names_for_service()
        .returning(|_, _| Ok(vec!["cassandra".to_owned()]));
    mock.expect_scale_down_stateful_sets_for_service()
        .withf(|service, namespace, convergence| {
            service == "cassandra-svc" && namespace == "db" && convergence.wait
        })
        .returning(|_, _, convergence| {
            Err(GatewayError::Timeout {
                operation: "scale down statefulsets".into(),
                timeout: convergence.timeout,
            })
        });
    let report = engine(Arc::new(mock)).run(&[scenario(&[
        r#"When I scale down statefulsets by service name "cassandra-svc" in namespace "db" with check"#,
        "Then all related statefulsets should be scaled down",
    ])]);
    let result = only(&report);
    let failure = result.failure().expect("failure");
    assert_eq!(failure.message, "scale down statefulsets did not converge within 300s");
    assert_eq!(result.skipped(), 1);
}
