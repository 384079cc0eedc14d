use crate::rpc::{get_client, get_url};
use async_trait::async_trait;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::{NodeSubmitter, RejectionReason, SubmitOutcome};
use log::info;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::io::Error;
use std::time::Duration;

/// Secondary broadcast through a merchant API endpoint.
pub struct MapiBroadcaster {
    client: Client,
    pub url: String,
    api_key: Option<String>,
}
impl MapiBroadcaster {
    pub fn new(url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, Error> {
        Ok(MapiBroadcaster {
            client: get_client(timeout)?,
            url: url.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl NodeSubmitter for MapiBroadcaster {
    fn name(&self) -> &str {
        "mapi"
    }
    async fn submit(&self, raw: &[u8]) -> Result<SubmitOutcome, LedgerError> {
        let mut builder = self
            .client
            .post(get_url(&self.url, "api/v1/broadcast"))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(raw.to_vec());
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| LedgerError::remote("mapi", format!("{:?}", e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LedgerError::remote("mapi", e))?;
        info!("MAPI Response: {status} {body}");
        if status.is_success() {
            Ok(SubmitOutcome::Accepted)
        } else {
            Ok(SubmitOutcome::Rejected(RejectionReason::new(
                Some(i64::from(status.as_u16())),
                body,
            )))
        }
    }
}
