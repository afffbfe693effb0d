use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_supervisor_options(&config.supervisor)?;
    validate_gateway_config(&config.gateway)?;
    validate_monitoring_config(&config.monitoring)?;
    validate_recovery_config(&config.recovery)?;
    validate_logs_config(&config.logs)?;

    Ok(())
}

fn validate_supervisor_options(options: &SupervisorOptions) -> Result<()> {
    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

fn validate_gateway_config(gateway: &GatewayConfig) -> Result<()> {
    if gateway.command.trim().is_empty() {
        return Err(anyhow!("Gateway command cannot be empty"));
    }

    if gateway.port == Some(0) {
        return Err(anyhow!("Gateway port must be between 1 and 65535, got: 0"));
    }

    if gateway.graceful_timeout.is_zero() {
        return Err(anyhow!("Graceful timeout must be greater than 0"));
    }

    if gateway.wait_for_port && gateway.port.is_some() && gateway.startup_timeout.is_zero() {
        return Err(anyhow!("Startup timeout must be greater than 0 when waiting for the port"));
    }

    if let Some(ref wd) = gateway.working_directory {
        if !wd.exists() {
            return Err(anyhow!("Working directory does not exist: {}", wd.display()));
        }
    }

    for key in gateway.environment.keys() {
        if key.is_empty() || key.contains('=') {
            return Err(anyhow!("Invalid environment variable name: {:?}", key));
        }
    }

    Ok(())
}

fn validate_monitoring_config(monitoring: &MonitoringConfig) -> Result<()> {
    if monitoring.interval < Duration::from_millis(10) {
        return Err(anyhow!(
            "Monitoring interval too short (min 10ms): {:?}",
            monitoring.interval
        ));
    }

    if monitoring.sample_timeout.is_zero() {
        return Err(anyhow!("Sample timeout must be greater than 0"));
    }

    if monitoring.sample_timeout > monitoring.interval {
        return Err(anyhow!(
            "Sample timeout ({:?}) must not exceed the monitoring interval ({:?})",
            monitoring.sample_timeout,
            monitoring.interval
        ));
    }

    Ok(())
}

fn validate_recovery_config(recovery: &RecoveryConfig) -> Result<()> {
    if !recovery.backoff_multiplier.is_finite() || recovery.backoff_multiplier < 1.0 {
        return Err(anyhow!(
            "Backoff multiplier must be at least 1.0, got: {}",
            recovery.backoff_multiplier
        ));
    }

    if recovery.max_delay < recovery.initial_delay {
        return Err(anyhow!(
            "Max delay ({:?}) must not be less than initial delay ({:?})",
            recovery.max_delay,
            recovery.initial_delay
        ));
    }

    if recovery.window.is_zero() {
        return Err(anyhow!("Recovery window must be greater than 0"));
    }

    Ok(())
}

fn validate_logs_config(logs: &LogsConfig) -> Result<()> {
    if !logs.capture {
        return Ok(());
    }

    if logs.file.as_os_str().is_empty() {
        return Err(anyhow!("Log file path cannot be empty"));
    }

    if logs.max_file_bytes == 0 {
        return Err(anyhow!("Log file size limit must be greater than 0"));
    }

    Ok(())
}
