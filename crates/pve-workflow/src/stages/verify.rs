use pve_core::Severity;

use super::StageContext;

/// Post-deployment health checks. Findings are logged, never returned as errors.
pub async fn run(ctx: &StageContext<'_>) -> String {
    let mut warnings = 0;
    let client = ctx.client();

    match client.get_cluster_status().await {
        Ok(status) => {
            if !status.quorate {
                tracing::warn!("cluster lost quorum after deployment");
                warnings += 1;
            }
            for node in &status.nodes {
                if !node.online {
                    tracing::warn!(node = %node.name, "node offline");
                    warnings += 1;
                    continue;
                }
                match client.get_node_status(&node.name).await {
                    Ok(usage) => {
                        let limit = ctx.config.utilization_warn_ratio;
                        if usage.cpu > limit || usage.memory_ratio() > limit {
                            tracing::warn!(
                                node = %usage.node,
                                cpu = usage.cpu,
                                memory = usage.memory_ratio(),
                                limit,
                                "node utilization above threshold"
                            );
                            warnings += 1;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(node = %node.name, error = %e, "node status unavailable");
                        warnings += 1;
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cluster health check failed");
            warnings += 1;
        }
    }

    let records = ctx.detector.detect_all_drift().await;
    if !records.is_empty() {
        let critical = records
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();
        tracing::warn!(drift = records.len(), critical, "drift present after deployment");
        if let Err(e) = ctx.detector.generate_drift_report(&records) {
            tracing::warn!(error = %e, "failed to write post-deployment drift report");
        }
        warnings += 1;
    }

    format!("completed ({warnings} warnings)")
}
