use adhocsim_core::{run_sweep, RunParameters, ScenarioRunner};
use engine_impls::IdealEngine;

#[test]
fn only_the_client_addressing_the_sink_is_delivered() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut runner = ScenarioRunner::builder()
        .engine(IdealEngine::default())
        .artifact_dir(dir.path())
        .build();
    let reports = run_sweep(&mut runner, 4..=4, RunParameters::default())?;
    let report = &reports[0];
    let summary = report
        .flows
        .iter()
        .map(|f| (f.flow_id.inner(), f.tx_packets, f.rx_packets, f.metrics.loss_ratio))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            (2, 10, 0, Some(100.0)),
            (3, 10, 10, Some(0.0)),
            (4, 10, 0, Some(100.0)),
        ]
    );
    let delivered = &report.flows[1];
    assert!(delivered.metrics.mean_delay.is_some());
    assert_eq!(delivered.metrics.tx_bitrate, delivered.metrics.rx_bitrate);
    assert_eq!(report.flows[0].metrics.rx_bitrate, None);
    Ok(())
}

#[test]
fn sweep_writes_artifacts_per_run() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut runner = ScenarioRunner::builder()
        .engine(IdealEngine::default())
        .artifact_dir(dir.path().join("out"))
        .build();
    let reports = run_sweep(&mut runner, 2..=3, RunParameters::default())?;
    assert_eq!(reports.len(), 2);
    for n in 2..=3 {
        let flow_report = dir.path().join("out").join(format!("flowmonitor-{n}-nodes.xml"));
        let anim = dir.path().join("out").join(format!("anim-{n}-nodes.xml"));
        assert!(std::fs::read_to_string(flow_report)?.contains("<FlowMonitor>"));
        let anim = std::fs::read_to_string(anim)?;
        assert_eq!(anim.matches("<node ").count(), n);
    }
    // With two nodes, flow 2 belongs to node 1, which addresses node 0. Node 0 runs no sink.
    let two = &reports[0];
    assert_eq!(two.flows.len(), 1);
    assert_eq!(two.flows[0].rx_packets, 0);
    Ok(())
}

#[test]
fn console_output_ends_with_node_count() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut runner = ScenarioRunner::builder()
        .engine(IdealEngine::default())
        .artifact_dir(dir.path())
        .build();
    let reports = run_sweep(&mut runner, 3..=3, RunParameters::default())?;
    let text = reports[0].to_string();
    assert!(text.starts_with("======= FlowID: 2 ======="));
    assert!(text.ends_with("Simulation for 3 nodes\n"));
    Ok(())
}
