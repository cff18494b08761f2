// system-tests/tests/suites/local_echo.rs
// ============================================================================
// Module: Local Echo Tests
// Description: Full harness flow against the in-process echo sample.
// Purpose: Validate templating, deployment wiring, probing and teardown locally.
// Dependencies: system-tests helpers, endpoints-deploy, endpoints-echo
// ============================================================================

//! Local echo deployment tests. Settings are explicit, so these run in any
//! environment.

use endpoints_deploy::Deployer;
use endpoints_deploy::DeploymentHarness;
use endpoints_deploy::DeploymentSettings;
use endpoints_deploy::NoopEventSink;
use endpoints_deploy::SkipReason;
use endpoints_deploy::SuiteState;
use endpoints_deploy::template::CLIENT_ID_PLACEHOLDER;
use endpoints_deploy::template::PROJECT_ID_PLACEHOLDER;
use endpoints_deploy::template::SERVICE_ACCOUNT_EMAIL_PLACEHOLDER;
use helpers::artifacts::EVENTS_FILE;
use helpers::artifacts::TestReporter;
use helpers::local_deployer::LocalEchoDeployer;
use serde_json::Value;

use crate::helpers;

/// Message sent through the echo endpoint.
const SONG: &str = "So if you're lost and on your own\nYou can never surrender\nAnd if your path won't lead you home\nYou can never surrender";

fn local_settings() -> DeploymentSettings {
    DeploymentSettings {
        run_deployment_tests: true,
        api_key: Some("local-key".to_string()),
        project_id: Some("local-project".to_string()),
        client_id: Some("local-client.apps.googleusercontent.com".to_string()),
        service_account_email: Some("deployer@local-project.iam.gserviceaccount.com".to_string()),
        version_id: Some("local-v1".to_string()),
        ..DeploymentSettings::default()
    }
}

fn artifact_list() -> Vec<String> {
    vec!["summary.json".to_string(), "summary.md".to_string(), EVENTS_FILE.to_string()]
}

fn has_placeholder(doc: &str) -> bool {
    [PROJECT_ID_PLACEHOLDER, CLIENT_ID_PLACEHOLDER, SERVICE_ACCOUNT_EMAIL_PLACEHOLDER]
        .iter()
        .any(|placeholder| doc.contains(placeholder))
}

#[tokio::test(flavor = "multi_thread")]
async fn local_echo_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("local_echo_round_trip")?;
    let app_dir = reporter.config().app_dir.clone();
    let deployer = LocalEchoDeployer::default();
    let harness = DeploymentHarness::new(local_settings(), deployer.clone(), app_dir.clone())?
        .with_sink(reporter.artifacts().event_sink()?)
        .with_documents(["openapi.yaml", "app.yaml"]);

    let SuiteState::Running(suite) = harness.set_up_before_all().await? else {
        return Err("complete settings must not skip".into());
    };

    let uploaded = deployer.uploaded().ok_or("deployer saw no upload")?;
    if has_placeholder(&uploaded.openapi) || has_placeholder(&uploaded.app_yaml) {
        return Err("placeholders left in uploaded config".into());
    }
    if !uploaded.openapi.contains("host: \"local-project.appspot.com\"")
        || !uploaded.app_yaml.contains("name: local-project.appspot.com")
    {
        return Err("project id missing from uploaded config".into());
    }
    let source_openapi = std::fs::read_to_string(app_dir.join("openapi.yaml"))?;
    if !source_openapi.contains(PROJECT_ID_PLACEHOLDER) {
        return Err("checked-in openapi.yaml was modified".into());
    }

    suite.assert_echo(SONG).await?;

    let auth_url = suite.probe().base_url().join("/auth/info/googlejwt")?;
    let auth_body = reqwest::get(auth_url).await?.text().await?;
    let auth: Value = serde_json::from_str(&auth_body)?;
    if auth.get("id").and_then(Value::as_str) != Some("anonymous") {
        return Err(format!("unexpected auth info: {auth_body}").into());
    }

    if !suite.tear_down().await? {
        return Err("teardown should run when deployments are not kept".into());
    }
    if deployer.is_serving() {
        return Err("local server still running after teardown".into());
    }

    reporter.finish(
        "pass",
        vec![
            "templated config carried live values".to_string(),
            "echo round trip and anonymous auth info verified".to_string(),
        ],
        artifact_list(),
    )?;
    drop(reporter);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn local_keep_deployment_leaves_server_running() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("local_keep_deployment_leaves_server_running")?;
    let deployer = LocalEchoDeployer::default();
    let settings = DeploymentSettings {
        keep_deployment: true,
        ..local_settings()
    };
    let harness =
        DeploymentHarness::new(settings, deployer.clone(), reporter.config().app_dir.clone())?
            .with_sink(reporter.artifacts().event_sink()?);

    let SuiteState::Running(suite) = harness.set_up_before_all().await? else {
        return Err("complete settings must not skip".into());
    };
    suite.assert_echo("kept").await?;
    if suite.tear_down().await? {
        return Err("teardown must be skipped when keeping the deployment".into());
    }
    if !deployer.is_serving() {
        return Err("kept deployment was stopped".into());
    }

    reporter.finish("pass", vec!["kept deployment survived".to_string()], artifact_list())?;
    drop(reporter);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn local_unconfigured_run_skips() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("local_unconfigured_run_skips")?;
    let deployer = LocalEchoDeployer::default();
    let harness = DeploymentHarness::new(
        DeploymentSettings::default(),
        deployer.clone(),
        reporter.config().app_dir.clone(),
    )?
    .with_sink(reporter.artifacts().event_sink()?);

    let SuiteState::Skipped(reason) = harness.set_up_before_all().await? else {
        return Err("unset gate must skip".into());
    };
    if reason != SkipReason::DeploymentTestsDisabled {
        return Err(format!("unexpected skip reason: {reason}").into());
    }
    if deployer.uploaded().is_some() {
        return Err("skipped run must not deploy".into());
    }

    reporter.finish("skipped", vec![reason.to_string()], artifact_list())?;
    drop(reporter);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn local_echo_failure_is_summarized_before_propagating()
-> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("local_echo_failure_is_summarized_before_propagating")?;
    let deployer = LocalEchoDeployer::default();
    let harness =
        DeploymentHarness::new(local_settings(), deployer.clone(), reporter.config().app_dir.clone())?
            .with_sink(reporter.artifacts().event_sink()?);

    let SuiteState::Running(suite) = harness.set_up_before_all().await? else {
        return Err("complete settings must not skip".into());
    };
    deployer.teardown(suite.target(), &NoopEventSink).await?;

    let echoed = suite.assert_echo(SONG).await;
    let torn_down = suite.tear_down().await;
    let Err(err) = echoed else {
        return Err("echo against a stopped server must fail".into());
    };
    let message = reporter.fail(err, artifact_list()).to_string();
    torn_down?;

    let summary: Value =
        serde_json::from_slice(&std::fs::read(reporter.artifacts().root().join("summary.json"))?)?;
    if summary["status"] != "fail" {
        return Err(format!("summary status not recorded as fail: {summary}").into());
    }
    if summary["notes"][0].as_str() != Some(message.as_str())
        || !message.contains("echo endpoint unreachable")
    {
        return Err(format!("summary does not carry the echo error: {summary}").into());
    }

    reporter.finish(
        "pass",
        vec!["failed echo recorded a fail summary".to_string()],
        artifact_list(),
    )?;
    drop(reporter);
    Ok(())
}
