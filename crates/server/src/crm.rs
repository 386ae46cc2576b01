//! HTTP-backed customer directory. When the CRM integration is disabled the
//! conversion service falls back to an empty in-memory directory, so orders
//! are still created, just without billing defaults.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quoteflow_core::collab::{
    BillingDefaults, CollaboratorError, CustomerDirectory, StaticCustomerDirectory,
};
use quoteflow_core::config::CrmConfig;
use quoteflow_core::domain::quote::CustomerId;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;

pub struct HttpCustomerDirectory {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCustomerDirectory {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self { client, base_url: base_url.into(), api_key }
    }
}

#[async_trait]
impl CustomerDirectory for HttpCustomerDirectory {
    async fn billing_defaults(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<BillingDefaults>, CollaboratorError> {
        let url = format!(
            "{}/customers/{}/billing",
            self.base_url.trim_end_matches('/'),
            customer_id.0,
        );

        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| CollaboratorError::Unavailable(error.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let defaults = response
                    .json::<BillingDefaults>()
                    .await
                    .map_err(|error| CollaboratorError::Rejected(error.to_string()))?;
                Ok(Some(defaults))
            }
            status => Err(CollaboratorError::Unavailable(format!(
                "crm returned {status} for {url}"
            ))),
        }
    }
}

pub fn customer_directory(config: &CrmConfig) -> Arc<dyn CustomerDirectory> {
    match (&config.base_url, config.enabled) {
        (Some(base_url), true) => Arc::new(HttpCustomerDirectory::new(
            base_url.clone(),
            config.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            config.timeout_secs,
        )),
        _ => Arc::new(StaticCustomerDirectory::default()),
    }
}
