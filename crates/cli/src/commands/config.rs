use quoteflow_core::config::{AppConfig, LoadOptions};

/// Render the effective configuration, one `key = value` per line.
/// Secrets are already redacted by `AppConfig::redacted_summary`.
pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config),
        Err(error) => format!("config: failed to load configuration: {error}"),
    }
}

fn render(config: &AppConfig) -> String {
    config
        .redacted_summary()
        .into_iter()
        .map(|(key, value)| format!("{key} = {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use quoteflow_core::config::AppConfig;
    use secrecy::SecretString;

    use super::render;

    #[test]
    fn rendered_summary_never_exposes_api_key() {
        let mut config = AppConfig::default();
        config.crm.api_key = Some(SecretString::from("crm-secret-token"));

        let rendered = render(&config);

        assert!(rendered.contains("crm.api_key = ***redacted***"));
        assert!(!rendered.contains("crm-secret-token"));
    }

    #[test]
    fn rendered_summary_lists_database_url() {
        let rendered = render(&AppConfig::default());

        assert!(rendered.contains("database.url = sqlite://quoteflow.db"));
    }
}
