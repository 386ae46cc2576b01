use quoteflow_core::config::{AppConfig, LoadOptions};
use quoteflow_db::connect_with_settings;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_crm_readiness(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "crm_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_failing =
        checks.iter().filter(|check| check.status == CheckStatus::Fail).count();
    let overall_status = if all_failing == 0 { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_failing == 0 {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_crm_readiness(config: &AppConfig) -> DoctorCheck {
    if !config.crm.enabled {
        return DoctorCheck {
            name: "crm_readiness",
            status: CheckStatus::Skipped,
            details: "crm disabled; billing defaults will be empty on conversion".to_string(),
        };
    }

    // base_url presence is enforced by config validation, so only the key
    // remains to be checked here.
    if config.crm.api_key.is_none() {
        return DoctorCheck {
            name: "crm_readiness",
            status: CheckStatus::Fail,
            details: "crm.enabled = true but crm.api_key is unset".to_string(),
        };
    }

    DoctorCheck {
        name: "crm_readiness",
        status: CheckStatus::Pass,
        details: "crm base URL and API key are configured".to_string(),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use quoteflow_core::config::AppConfig;
    use secrecy::SecretString;

    use super::{check_crm_readiness, CheckStatus};

    #[test]
    fn disabled_crm_is_skipped_not_failed() {
        let config = AppConfig::default();

        let check = check_crm_readiness(&config);

        assert_eq!(check.status, CheckStatus::Skipped);
    }

    #[test]
    fn enabled_crm_without_key_fails() {
        let mut config = AppConfig::default();
        config.crm.enabled = true;
        config.crm.base_url = Some("https://crm.example.com".to_string());

        let check = check_crm_readiness(&config);

        assert_eq!(check.status, CheckStatus::Fail);
    }

    #[test]
    fn enabled_crm_with_key_passes() {
        let mut config = AppConfig::default();
        config.crm.enabled = true;
        config.crm.base_url = Some("https://crm.example.com".to_string());
        config.crm.api_key = Some(SecretString::from("key"));

        let check = check_crm_readiness(&config);

        assert_eq!(check.status, CheckStatus::Pass);
    }
}
