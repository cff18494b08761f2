// system-tests/tests/suites/echo_deploy.rs
// ============================================================================
// Module: Echo Deployment Tests
// Description: Deploys the echo sample to App Engine and probes it.
// Purpose: Validate the deployed Endpoints proxy and echo route end to end.
// Dependencies: system-tests helpers, endpoints-deploy
// ============================================================================

//! Live deployment test for the echo sample. Gated by `RUN_DEPLOYMENT_TESTS`.

use endpoints_deploy::DeploymentHarness;
use endpoints_deploy::GcloudDeployer;
use endpoints_deploy::SuiteState;
use helpers::artifacts::EVENTS_FILE;
use helpers::artifacts::TestReporter;

use crate::helpers;

/// Message sent through the deployed echo endpoint.
const SONG: &str = "So if you're lost and on your own\nYou can never surrender\nAnd if your path won't lead you home\nYou can never surrender";

fn artifact_list() -> Vec<String> {
    vec!["summary.json".to_string(), "summary.md".to_string(), EVENTS_FILE.to_string()]
}

#[tokio::test(flavor = "multi_thread")]
async fn echo_deployment_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("echo_deployment_round_trip")?;
    let sink = reporter.artifacts().event_sink()?;
    let harness =
        DeploymentHarness::from_env(GcloudDeployer::new(), reporter.config().app_dir.clone())?
            .with_sink(sink)
            .with_documents(["openapi.yaml", "app.yaml"]);

    let state = match harness.set_up_before_all().await {
        Ok(state) => state,
        Err(err) => return Err(reporter.fail(err, artifact_list()).into()),
    };
    let suite = match state {
        SuiteState::Skipped(reason) => {
            reporter.finish("skipped", vec![reason.to_string()], artifact_list())?;
            return Ok(());
        }
        SuiteState::Running(suite) => suite,
    };
    let base_url = suite.probe().base_url().to_string();
    let version = suite.target().version_id.clone();

    let probed = suite.assert_echo(SONG).await;
    let torn_down = suite.tear_down().await;
    if let Err(err) = probed {
        return Err(reporter.fail(err, artifact_list()).into());
    }
    let removed = torn_down.map_err(|err| reporter.fail(err, artifact_list()))?;

    reporter.finish(
        "pass",
        vec![
            format!("echo round trip against {base_url}"),
            if removed {
                format!("version {version} deleted")
            } else {
                format!("version {version} kept")
            },
        ],
        artifact_list(),
    )?;
    drop(reporter);
    Ok(())
}
