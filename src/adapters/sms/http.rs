use crate::adapters::sms::wire::{
    BalanceResponse, ErrorResponse, ReportsResponse, SendRequest, SendResponse, map_reports_response,
    map_send_response,
};
use crate::config::ProviderConfig;
use crate::core::transport::{Balance, SendOutcome, SmsTransport, StatusOutcome, TransportError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const SEND_PATH: &str = "/sms/2/text/advanced";
const REPORTS_PATH: &str = "/sms/1/reports";
const BALANCE_PATH: &str = "/account/1/balance";

#[derive(Clone)]
struct Credentials {
    base_url: String,
    api_key: String,
    sender: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("sender", &self.sender)
            .finish()
    }
}

/// Provider integration over its JSON HTTP API.
#[derive(Debug)]
pub struct HttpSmsTransport {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpSmsTransport {
    /// Builds the transport. Missing settings are tolerated here and reported by every call.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let credentials = match (&config.base_url, &config.api_key, &config.sender) {
            (Some(base_url), Some(api_key), Some(sender))
                if !base_url.is_empty() && !api_key.is_empty() && !sender.is_empty() =>
            {
                Some(Credentials {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    api_key: api_key.clone(),
                    sender: sender.clone(),
                })
            }
            _ => {
                tracing::warn!("SMS provider configuration is incomplete; sends will fail until it is set");
                None
            }
        };

        Ok(Self { client: builder.build()?, credentials })
    }

    /// Builds the transport and, inside a Tokio runtime, queries the account balance in the
    /// background purely for diagnostics. Trial accounts may fail this probe and still send.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_startup_probe(config: &ProviderConfig) -> anyhow::Result<Arc<Self>> {
        let transport = Arc::new(Self::new(config)?);

        if config.startup_probe
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let probe = Arc::clone(&transport);
            handle.spawn(async move {
                match probe.get_balance().await {
                    Ok(balance) => tracing::info!(
                        balance = balance.balance,
                        currency = balance.currency.as_deref().unwrap_or_default(),
                        "SMS provider account verified"
                    ),
                    Err(e) => tracing::warn!(error = %e, "SMS provider account check failed"),
                }
            });
        }

        Ok(transport)
    }

    fn credentials(&self) -> Result<&Credentials, TransportError> {
        self.credentials.as_ref().ok_or(TransportError::ConfigurationIncomplete)
    }

    fn authorized(request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        request
            .header(header::AUTHORIZATION, format!("App {}", credentials.api_key))
            .header(header::ACCEPT, "application/json")
    }

    /// Sends `request` and decodes a successful JSON body, mapping every failure mode to a
    /// `TransportError`.
    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, TransportError> {
        let response = request.send().await.map_err(|e| TransportError::Http(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| TransportError::Decode(e.to_string()));
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
            StatusCode::FORBIDDEN => Err(TransportError::Forbidden),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(TransportError::Http(ErrorResponse::text(&body).unwrap_or_else(|| format!("HTTP {status}"))))
            }
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    #[tracing::instrument(level = "debug", skip_all)]
    async fn send(&self, to: &str, body: &str) -> SendOutcome {
        let credentials = match self.credentials() {
            Ok(c) => c,
            Err(e) => return SendOutcome::failed(e),
        };

        let to = if to.starts_with('+') { to.to_string() } else { format!("+{to}") };
        let payload = SendRequest::single(&to, &credentials.sender, body);
        let request = self.client.post(format!("{}{SEND_PATH}", credentials.base_url)).json(&payload);

        match Self::execute::<SendResponse>(Self::authorized(request, credentials)).await {
            Ok(response) => {
                let outcome = map_send_response(response);
                if let Some(e) = &outcome.error {
                    tracing::warn!(error = %e, "Provider did not accept message");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "Provider send request failed");
                SendOutcome::failed(e)
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn check_status(&self, message_id: &str) -> StatusOutcome {
        let credentials = match self.credentials() {
            Ok(c) => c,
            Err(e) => return StatusOutcome::failed(e),
        };

        let url = match Url::parse_with_params(
            &format!("{}{REPORTS_PATH}", credentials.base_url),
            &[("messageId", message_id)],
        ) {
            Ok(url) => url,
            Err(e) => return StatusOutcome::failed(TransportError::Http(e.to_string())),
        };
        let request = self.client.get(url);

        match Self::execute::<ReportsResponse>(Self::authorized(request, credentials)).await {
            Ok(response) => map_reports_response(response),
            Err(e) => StatusOutcome::failed(e),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn get_balance(&self) -> Result<Balance, TransportError> {
        let credentials = self.credentials()?;
        let request = self.client.get(format!("{}{BALANCE_PATH}", credentials.base_url));

        let response = Self::execute::<BalanceResponse>(Self::authorized(request, credentials)).await?;
        Ok(Balance { balance: response.balance, currency: response.currency })
    }
}
