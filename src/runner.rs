#![allow(clippy::enum_variant_names)]

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use flume::SendError;
use flume::Sender;
use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::asserter::CheckFailure;
use crate::asserter::FailureKind;
use crate::asserter::assert_response;
use crate::validator::EndpointSpec;
use crate::validator::Method;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("channel error")]
    ChannelError(#[from] SendError<CheckOutcome>),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed")]
    Request(#[from] reqwest::Error),
}

/// Settings shared by every check in a run.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub ok_statuses: Vec<StatusCode>,
    pub timeout: Duration,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            ok_statuses: vec![StatusCode::OK],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub status: StatusCode,
    /// A body that failed to download keeps the error text, it only matters
    /// when fields have to be inspected.
    pub body: Result<String, String>,
}

impl CapturedResponse {
    pub async fn from_response(resp: Response) -> Self {
        let status = resp.status();

        // Consume the body exactly once
        let body = resp.text().await.map_err(|err| describe(&err));

        Self { status, body }
    }
}

/// Performs the HTTP request of a check.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        method: Method,
        url: &str,
    ) -> impl Future<Output = Result<CapturedResponse, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, timeout })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, method: Method, url: &str) -> Result<CapturedResponse, TransportError> {
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url).body(""),
        };

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Request(err)
            }
        })?;

        Ok(CapturedResponse::from_response(response).await)
    }
}

#[derive(Debug)]
pub struct CheckOutcome {
    pub url: String,
    pub result: Result<(), CheckFailure>,
}

/// Requests the endpoint and validates what came back.
///
/// A transport error short-circuits everything else. Otherwise the status
/// is checked against `settings.ok_statuses` and, only when the endpoint has
/// fields, the JSON body is inspected.
pub async fn check<T: Transport>(
    spec: &EndpointSpec,
    settings: &CheckSettings,
    transport: &T,
) -> Result<(), CheckFailure> {
    debug!(url = %spec.url, method = %spec.method, "checking endpoint");

    let response = transport
        .send(spec.method, &spec.url)
        .await
        .map_err(|err| CheckFailure::new(&spec.url, FailureKind::Request, describe(&err)))?;

    debug!(url = %spec.url, status = response.status.as_u16(), "response received");

    assert_response(spec, &response, &settings.ok_statuses)
}

/// Checks every spec one after the other and sends the outcomes in input order.
pub async fn run_checks<T: Transport>(
    specs: Vec<EndpointSpec>,
    settings: CheckSettings,
    transport: T,
    tx: Sender<CheckOutcome>,
) -> Result<(), RunnerError> {
    for spec in &specs {
        let result = check(spec, &settings, &transport).await;

        tx.send_async(CheckOutcome {
            url: spec.url.clone(),
            result,
        })
        .await?;
    }

    Ok(())
}

/// The error and all of its sources on one line.
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
