//! Tower middleware enforcing payment on protected routes.
//!
//! The service drives the gate's state machine around the wrapped handler:
//! no proof ⇒ a priced 402 challenge; a proof ⇒ request-blocking
//! verification, then the handler; successful responses enqueue a
//! settlement job consumed by a detached worker, so the client never waits
//! on-chain.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::{HeaderValue, StatusCode, header};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use tollgate::config::PaymentConfig;
use tollgate::gate::{Challenge, SettlementHandle, SettlementJob, Verify};
use tollgate::proto::{Base64Bytes, InvalidReason, PaymentRequirements};
use tollgate::requirements::ConfigurationError;

use crate::headers::{ACCEPT_PAYMENT_HEADER, REQUIRE_PAYMENT_HEADER, extract_proof};

/// The `x402Headers` object of a 402 challenge body.
#[derive(Debug, Serialize)]
pub struct X402Headers {
    /// Base64-encoded JSON of the payment requirements.
    #[serde(rename = "X-Require-Payment")]
    pub require_payment: String,
    /// Accepted scheme and network, space-separated.
    #[serde(rename = "X-Accept-Payment")]
    pub accept_payment: String,
}

/// JSON body of a 402 Payment Required response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    /// What went wrong: `"payment required"` or `"invalid payment"`.
    pub error: String,
    /// Rejection reason when a submitted proof was refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    /// Required amount in token base units.
    pub price: u64,
    /// Required amount in whole tokens (USD for dollar-pegged assets).
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
    /// Token symbol.
    pub token: String,
    /// Recipient account.
    pub recipient: String,
    /// Headers a paying client should mirror.
    pub x402_headers: X402Headers,
}

/// Shared pieces of the payment middleware.
///
/// Create one per application, then derive per-route layers with
/// [`PaymentGateway::with_price`].
#[derive(Debug)]
pub struct PaymentGateway<V, C> {
    verifier: Arc<V>,
    challenger: Arc<C>,
    settlements: SettlementHandle,
    config: Arc<PaymentConfig>,
}

impl<V, C> Clone for PaymentGateway<V, C> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            challenger: Arc::clone(&self.challenger),
            settlements: self.settlements.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<V, C> PaymentGateway<V, C> {
    /// Wires the gateway from its collaborators.
    pub fn new(
        verifier: Arc<V>,
        challenger: Arc<C>,
        settlements: SettlementHandle,
        config: Arc<PaymentConfig>,
    ) -> Self {
        Self {
            verifier,
            challenger,
            settlements,
            config,
        }
    }

    /// Starts a per-route layer charging `price` base units.
    #[must_use]
    pub fn with_price(&self, price: u64) -> GateLayer<V, C> {
        GateLayer {
            gateway: self.clone(),
            price,
            description: Arc::from(""),
        }
    }
}

/// Per-route payment layer.
#[derive(Debug)]
pub struct GateLayer<V, C> {
    gateway: PaymentGateway<V, C>,
    price: u64,
    description: Arc<str>,
}

impl<V, C> Clone for GateLayer<V, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            price: self.price,
            description: Arc::clone(&self.description),
        }
    }
}

impl<V, C> GateLayer<V, C> {
    /// Describes what the payment buys; included in challenges.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Arc::from(description.into());
        self
    }
}

impl<S, V, C> Layer<S> for GateLayer<V, C>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    V: Verify + 'static,
    C: Challenge + 'static,
{
    type Service = GateService<V, C>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            gateway: self.gateway.clone(),
            price: self.price,
            description: Arc::clone(&self.description),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service produced by [`GateLayer`].
#[allow(missing_debug_implementations)] // BoxCloneSyncService is not Debug
pub struct GateService<V, C> {
    gateway: PaymentGateway<V, C>,
    price: u64,
    description: Arc<str>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<V, C> Clone for GateService<V, C> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            price: self.price,
            description: Arc::clone(&self.description),
            inner: self.inner.clone(),
        }
    }
}

impl<V, C> Service<Request> for GateService<V, C>
where
    V: Verify + 'static,
    C: Challenge + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gateway = self.gateway.clone();
        let price = self.price;
        let description = Arc::clone(&self.description);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let resource = req.uri().path().to_owned();
            let requirements = match gateway
                .challenger
                .challenge(price, &resource, &description)
                .await
            {
                Ok(requirements) => requirements,
                Err(err) => {
                    tracing::error!(%err, %resource, "challenge construction failed");
                    return Ok(configuration_error_response(&err));
                }
            };

            let Some(proof) = extract_proof(req.headers()) else {
                return Ok(payment_required_response(
                    &gateway.config,
                    &requirements,
                    "payment required",
                    None,
                ));
            };

            let outcome = gateway.verifier.verify(&proof, &requirements).await;
            if !outcome.is_valid {
                tracing::debug!(
                    proof = %proof.key(),
                    reason = ?outcome.invalid_reason,
                    %resource,
                    "payment proof rejected"
                );
                return Ok(payment_required_response(
                    &gateway.config,
                    &requirements,
                    "invalid payment",
                    outcome.invalid_reason,
                ));
            }

            let response = inner.call(req).await?;

            // Failed handlers settle nothing; the payer keeps their funds.
            if response.status().is_client_error() || response.status().is_server_error() {
                return Ok(response);
            }

            gateway.settlements.submit(SettlementJob {
                key: proof.key(),
                proof,
                requirements,
            });
            Ok(response)
        })
    }
}

/// Renders a 402 with the machine-readable challenge body and headers.
fn payment_required_response(
    config: &PaymentConfig,
    requirements: &PaymentRequirements,
    error: &str,
    reason: Option<InvalidReason>,
) -> Response {
    let require_payment =
        Base64Bytes::encode_json(requirements).expect("requirements always serialize");
    let accept_payment = format!("{} {}", requirements.scheme, requirements.network);
    let body = PaymentRequiredBody {
        error: error.to_owned(),
        reason,
        price: requirements.max_amount_required,
        price_usd: config
            .display_price(requirements.max_amount_required)
            .to_f64()
            .unwrap_or_default(),
        token: config.asset.symbol.clone(),
        recipient: requirements.pay_to.clone(),
        x402_headers: X402Headers {
            require_payment: require_payment.to_string(),
            accept_payment: accept_payment.clone(),
        },
    };
    Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            REQUIRE_PAYMENT_HEADER,
            HeaderValue::from_bytes(require_payment.as_ref()).expect("base64 is a valid header"),
        )
        .header(
            ACCEPT_PAYMENT_HEADER,
            HeaderValue::from_str(&accept_payment).expect("scheme and network are ASCII"),
        )
        .body(Body::from(
            serde_json::to_vec(&body).expect("challenge body always serializes"),
        ))
        .expect("response construction cannot fail")
}

/// Renders a misconfigured route as a server error, not a challenge.
fn configuration_error_response(err: &ConfigurationError) -> Response {
    let body = serde_json::json!({ "error": err.to_string() });
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("response construction cannot fail")
}
