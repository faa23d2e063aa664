use axum::{
    async_trait,
    body::{Bytes, HttpBody},
    extract::{FromRequest, Query, State},
    http::{header, Request},
    BoxError, Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{DataFormat, TransactionRequest, TransactionResponse, TransactionType};
use crate::error::AppError;
use crate::AppState;

/// Transaction request decoded according to its `Content-Type`: JSON, or XML
/// for `text/xml` and `application/xml`. Anything else is rejected.
#[derive(Debug, Clone)]
pub struct TransactionPayload(pub TransactionRequest);

#[async_trait]
impl<S, B> FromRequest<S, B> for TransactionPayload
where
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(media_type)
            .unwrap_or_default();

        let format = DataFormat::from_content_type(&content_type)
            .ok_or(AppError::UnsupportedContentType(content_type))?;

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        decode(format, &body).map(TransactionPayload)
    }
}

/// `application/json; charset=utf-8` → `application/json`
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn decode(format: DataFormat, body: &[u8]) -> Result<TransactionRequest, AppError> {
    match format {
        DataFormat::Json => {
            serde_json::from_slice(body).map_err(|e| AppError::InvalidRequest(e.to_string()))
        }
        DataFormat::Xml => {
            let text = std::str::from_utf8(body).map_err(|e| AppError::InvalidRequest(e.to_string()))?;
            quick_xml::de::from_str(text).map_err(|e| AppError::InvalidRequest(e.to_string()))
        }
    }
}

/// Handles deposit requests.
///
/// Sample request (POST /deposit):
///
/// ```json
/// { "amount": 100.00, "user_id": 1, "country_id": 840, "currency": "USD" }
/// ```
///
/// or, with `Content-Type: application/xml`:
///
/// ```xml
/// <transaction><amount>100.00</amount><user_id>1</user_id><country_id>840</country_id><currency>USD</currency></transaction>
/// ```
pub async fn deposit(
    State(state): State<AppState>,
    TransactionPayload(request): TransactionPayload,
) -> Result<Json<TransactionResponse>, AppError> {
    process(state, request, TransactionType::Deposit).await
}

/// Handles withdrawal requests. Same bodies as [`deposit`].
pub async fn withdrawal(
    State(state): State<AppState>,
    TransactionPayload(request): TransactionPayload,
) -> Result<Json<TransactionResponse>, AppError> {
    process(state, request, TransactionType::Withdrawal).await
}

async fn process(
    state: AppState,
    request: TransactionRequest,
    transaction_type: TransactionType,
) -> Result<Json<TransactionResponse>, AppError> {
    let response = state
        .orchestrator
        .process_transaction(&request, state.selector.as_ref(), transaction_type)
        .await?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub tx_id: i64,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CallbackAck {
    pub transaction_id: i64,
    pub status: String,
}

/// Applies a gateway's out-of-band status report.
///
/// Sample request: `GET /call_back?tx_id=101&status=completed`
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackAck>, AppError> {
    state
        .orchestrator
        .process_callback(params.tx_id, &params.status)
        .await?;

    Ok(Json(CallbackAck {
        transaction_id: params.tx_id,
        status: params.status,
    }))
}
