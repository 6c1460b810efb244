//! Payouts: `/v1/payouts`.
//!
//! Create calls carry an `x-idempotency-key`. The key is fixed before the
//! first attempt so retries of one call can never pay twice.

use http::{HeaderName, HeaderValue};
use payos::Error;
use payos::pagination::{BoxFuture, Cursor, Page, PageIterator};
use payos::proto::Pagination;
use payos::signature::{RequestSignature, ResponseSignature};
use serde::{Deserialize, Serialize};

use super::{Handle, path_segment};
use crate::constants::IDEMPOTENCY_KEY_HEADER;
use crate::request::{RequestOptions, Signatures};

/// Page size of [`Payouts::list`] when none is given.
const DEFAULT_LIST_LIMIT: u64 = 10;

/// Page size of [`Payouts::list_auto_paging`] when none is given.
const DEFAULT_AUTO_PAGING_LIMIT: u64 = 20;

/// One page of payouts.
pub type PayoutPage = Page<Payout, ListPayoutsParams>;

/// Item-by-item cursor over all payouts.
pub type PayoutsIterator = PageIterator<Payout, ListPayoutsParams>;

/// State of a single payout transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PayoutTransactionState {
    Received,
    Processing,
    Cancelled,
    Succeeded,
    OnHold,
    Reversed,
    Failed,
}

/// Approval state of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PayoutApprovalState {
    Drafting,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
    Scheduled,
    Processing,
    Failed,
    PartialCompleted,
    Completed,
}

impl PayoutApprovalState {
    /// Wire name, as used in list filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafting => "DRAFTING",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Scheduled => "SCHEDULED",
            Self::Processing => "PROCESSING",
            Self::Failed => "FAILED",
            Self::PartialCompleted => "PARTIAL_COMPLETED",
            Self::Completed => "COMPLETED",
        }
    }
}

/// A transfer to one bank account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PayoutRequest {
    pub reference_id: String,
    pub amount: i64,
    pub description: String,
    pub to_bin: String,
    pub to_account_number: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<String>,
}

/// One transfer inside a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PayoutTransaction {
    pub id: String,
    pub reference_id: String,
    pub amount: i64,
    pub description: String,
    pub to_bin: String,
    pub to_account_number: String,
    #[serde(default)]
    pub to_account_name: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub transaction_datetime: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    pub state: PayoutTransactionState,
}

/// A payout with its transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Payout {
    pub id: String,
    pub reference_id: String,
    #[serde(default)]
    pub transactions: Vec<PayoutTransaction>,
    #[serde(default)]
    pub category: Vec<String>,
    pub approval_state: PayoutApprovalState,
    pub created_at: String,
}

/// Credit needed to execute a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateCredit {
    /// Estimated credit.
    pub estimate_credit: i64,
}

/// A page of the payout listing as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutList {
    /// Page metadata.
    pub pagination: Pagination,
    /// Payouts in this page.
    #[serde(default)]
    pub payouts: Vec<Payout>,
}

/// One transfer of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PayoutBatchItem {
    pub reference_id: String,
    pub amount: i64,
    pub description: String,
    pub to_bin: String,
    pub to_account_number: String,
}

/// Several transfers submitted as one payout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PayoutBatchRequest {
    pub reference_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_destination: Option<bool>,
    #[serde(default)]
    pub category: Vec<String>,
    pub payouts: Vec<PayoutBatchItem>,
}

/// Filters and window of a payout listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ListPayoutsParams {
    pub reference_id: Option<String>,
    pub approval_state: Option<PayoutApprovalState>,
    pub category: Vec<String>,
    /// ISO 8601 date.
    pub from_date: Option<String>,
    /// ISO 8601 date.
    pub to_date: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListPayoutsParams {
    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filters, moved to `offset`.
    #[must_use]
    pub const fn at_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn window(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(0),
            ..Self::default()
        }
    }

    fn to_request(&self) -> RequestOptions {
        let mut options =
            RequestOptions::get("/v1/payouts").with_response_signature(ResponseSignature::Header);
        if let Some(reference_id) = &self.reference_id {
            options = options.with_query("referenceId", reference_id.as_str());
        }
        if let Some(state) = self.approval_state {
            options = options.with_query("approvalState", state.as_str());
        }
        if !self.category.is_empty() {
            options = options.with_query("category", self.category.join(","));
        }
        if let Some(from_date) = &self.from_date {
            options = options.with_query("fromDate", from_date.as_str());
        }
        if let Some(to_date) = &self.to_date {
            options = options.with_query("toDate", to_date.as_str());
        }
        if let Some(limit) = self.limit {
            options = options.with_query("limit", limit);
        }
        if let Some(offset) = self.offset {
            options = options.with_query("offset", offset);
        }
        options
    }
}

/// Payout operations.
#[derive(Debug, Clone)]
pub struct Payouts {
    handle: Handle,
}

impl Payouts {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Batch payouts.
    #[must_use]
    pub fn batch(&self) -> PayoutBatch {
        PayoutBatch {
            handle: self.handle.clone(),
        }
    }

    /// Creates a payout. A UUID v4 idempotency key is generated when
    /// `idempotency_key` is `None`.
    ///
    /// # Errors
    ///
    /// Any error of the engine.
    pub async fn create(
        &self,
        request: &PayoutRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Payout, Error> {
        let options = idempotent(RequestOptions::post("/v1/payouts/"), idempotency_key)?
            .with_json(request)?
            .with_signatures(Signatures::new(
                RequestSignature::Header,
                ResponseSignature::Header,
            ));
        self.handle.call(options).await
    }

    /// Fetches a payout.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for an empty or dot-only id, otherwise any
    /// error of the engine.
    pub async fn get(&self, payout_id: &str) -> Result<Payout, Error> {
        let path = format!("/v1/payouts/{}", path_segment("payout id", payout_id)?);
        let options = RequestOptions::get(path).with_response_signature(ResponseSignature::Header);
        self.handle.call(options).await
    }

    /// Estimates the credit a [`PayoutRequest`] or [`PayoutBatchRequest`]
    /// needs.
    ///
    /// # Errors
    ///
    /// Any error of the engine.
    pub async fn estimate_credit<B>(&self, request: &B) -> Result<EstimateCredit, Error>
    where
        B: Serialize + ?Sized,
    {
        let options = RequestOptions::post("/v1/payouts/estimate-credit")
            .with_json(request)?
            .with_request_signature(RequestSignature::Header);
        self.handle.call(options).await
    }

    /// Fetches one page. Defaults to the first 10 payouts.
    ///
    /// # Errors
    ///
    /// Any error of the engine.
    pub async fn list(&self, params: Option<ListPayoutsParams>) -> Result<PayoutPage, Error> {
        let params = params.unwrap_or_else(|| ListPayoutsParams::window(DEFAULT_LIST_LIMIT));
        fetch_page(self.handle.clone(), params).await
    }

    /// Lazily walks every payout, 20 per page by default. Nothing is fetched
    /// until the iterator is first advanced.
    #[must_use]
    pub fn list_auto_paging(&self, params: Option<ListPayoutsParams>) -> PayoutsIterator {
        let params =
            params.unwrap_or_else(|| ListPayoutsParams::window(DEFAULT_AUTO_PAGING_LIMIT));
        PageIterator::new(cursor(self.handle.clone(), params))
    }
}

/// Batch payout operations.
#[derive(Debug, Clone)]
pub struct PayoutBatch {
    handle: Handle,
}

impl PayoutBatch {
    /// Creates a batch payout. A UUID v4 idempotency key is generated when
    /// `idempotency_key` is `None`.
    ///
    /// # Errors
    ///
    /// Any error of the engine.
    pub async fn create(
        &self,
        request: &PayoutBatchRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Payout, Error> {
        let options = idempotent(RequestOptions::post("/v1/payouts/batch"), idempotency_key)?
            .with_json(request)?
            .with_signatures(Signatures::new(
                RequestSignature::Header,
                ResponseSignature::Header,
            ));
        self.handle.call(options).await
    }
}

fn idempotent(options: RequestOptions, key: Option<&str>) -> Result<RequestOptions, Error> {
    let key = key
        .filter(|k| !k.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned);
    let value = HeaderValue::from_str(&key)
        .map_err(|e| Error::InvalidRequest(format!("invalid idempotency key: {e}")))?;
    Ok(options.with_header(HeaderName::from_static(IDEMPOTENCY_KEY_HEADER), value))
}

fn cursor(handle: Handle, params: ListPayoutsParams) -> Cursor<Payout, ListPayoutsParams> {
    Cursor::new(
        params,
        move |params| fetch_page(handle.clone(), params),
        ListPayoutsParams::at_offset,
    )
}

fn fetch_page(
    handle: Handle,
    params: ListPayoutsParams,
) -> BoxFuture<'static, Result<PayoutPage, Error>> {
    Box::pin(async move {
        let list: PayoutList = handle.call(params.to_request()).await?;
        Ok(Page::new(list.payouts, list.pagination, cursor(handle, params)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{header_signed, payos};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn payout(id: &str) -> Value {
        json!({
            "id": id,
            "referenceId": format!("ref-{id}"),
            "transactions": [],
            "category": ["salary"],
            "approvalState": "APPROVED",
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    fn request() -> PayoutRequest {
        PayoutRequest {
            reference_id: "ref-1".into(),
            amount: 2000,
            description: "salary".into(),
            to_bin: "970422".into(),
            to_account_number: "0123456789".into(),
            category: vec!["salary".into()],
        }
    }

    #[test]
    fn test_list_query() {
        let params = ListPayoutsParams {
            reference_id: Some("ref".into()),
            approval_state: Some(PayoutApprovalState::PartialCompleted),
            category: vec!["a".into(), "b".into()],
            ..ListPayoutsParams::default()
        }
        .with_limit(5)
        .at_offset(15);
        let query = crate::request::encode_query(&params.to_request().query);
        assert_eq!(
            query,
            vec![
                ("referenceId".to_owned(), "ref".to_owned()),
                ("approvalState".to_owned(), "PARTIAL_COMPLETED".to_owned()),
                ("category".to_owned(), "a,b".to_owned()),
                ("limit".to_owned(), "5".to_owned()),
                ("offset".to_owned(), "15".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_generates_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payouts/"))
            .and(header_exists("x-idempotency-key"))
            .and(header_exists("x-signature"))
            .respond_with(header_signed(&payout("p1")))
            .expect(1)
            .mount(&server)
            .await;

        let created = payos(&server)
            .payouts()
            .create(&request(), None)
            .await
            .unwrap();
        assert_eq!(created.id, "p1");
        assert_eq!(created.approval_state, PayoutApprovalState::Approved);
    }

    /// Fails the first call, then succeeds, recording every idempotency key.
    struct FlakyRecorder {
        keys: Arc<Mutex<Vec<String>>>,
        body: Value,
    }

    impl Respond for FlakyRecorder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let mut keys = self.keys.lock().unwrap();
            if let Some(key) = request.headers.get("x-idempotency-key") {
                keys.push(key.to_str().unwrap().to_owned());
            }
            if keys.len() == 1 {
                ResponseTemplate::new(503)
            } else {
                header_signed(&self.body)
            }
        }
    }

    #[tokio::test]
    async fn test_retries_reuse_idempotency_key() {
        let server = MockServer::start().await;
        let keys: Arc<Mutex<Vec<String>>> = Arc::default();
        Mock::given(method("POST"))
            .and(path("/v1/payouts/batch"))
            .respond_with(FlakyRecorder {
                keys: Arc::clone(&keys),
                body: payout("b1"),
            })
            .expect(2)
            .mount(&server)
            .await;

        let batch = PayoutBatchRequest {
            reference_id: "batch-1".into(),
            category: vec!["salary".into()],
            payouts: vec![PayoutBatchItem {
                reference_id: "batch-1-0".into(),
                amount: 1000,
                description: "salary".into(),
                to_bin: "970422".into(),
                to_account_number: "0123".into(),
            }],
            ..PayoutBatchRequest::default()
        };
        let created = payos(&server)
            .payouts()
            .batch()
            .create(&batch, None)
            .await
            .unwrap();
        assert_eq!(created.id, "b1");

        let keys = keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
        assert!(uuid::Uuid::parse_str(&keys[0]).is_ok());
    }

    #[tokio::test]
    async fn test_create_uses_caller_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-idempotency-key", "my-key"))
            .respond_with(header_signed(&payout("p2")))
            .expect(1)
            .mount(&server)
            .await;

        payos(&server)
            .payouts()
            .create(&request(), Some("my-key"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_rejects_dot_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(header_signed(&payout("p1")))
            .expect(0)
            .mount(&server)
            .await;

        let err = payos(&server).payouts().get("..").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_estimate_credit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payouts/estimate-credit"))
            .and(header_exists("x-signature"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({"code": "00", "desc": "success", "data": {"estimateCredit": 2200}}),
                ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let estimate = payos(&server)
            .payouts()
            .estimate_credit(&request())
            .await
            .unwrap();
        assert_eq!(estimate.estimate_credit, 2200);
    }

    fn page(ids: &[&str], offset: u64, has_more: bool) -> ResponseTemplate {
        let payouts: Vec<Value> = ids.iter().map(|id| payout(id)).collect();
        header_signed(&json!({
            "pagination": {
                "limit": 2,
                "offset": offset,
                "total": 5,
                "count": ids.len(),
                "hasMore": has_more
            },
            "payouts": payouts
        }))
    }

    #[tokio::test]
    async fn test_auto_paging_advances_by_count() {
        let server = MockServer::start().await;
        for (offset, ids, more) in [
            ("0", &["a", "b"][..], true),
            ("2", &["c", "d"][..], true),
            ("4", &["e"][..], false),
        ] {
            Mock::given(method("GET"))
                .and(path("/v1/payouts"))
                .and(query_param("limit", "2"))
                .and(query_param("offset", offset))
                .respond_with(page(ids, offset.parse().unwrap(), more))
                .expect(1)
                .mount(&server)
                .await;
        }

        let iter = payos(&server)
            .payouts()
            .list_auto_paging(Some(ListPayoutsParams::default().with_limit(2).at_offset(0)));
        let ids: Vec<String> = iter
            .collect_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_list_and_next_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payouts"))
            .and(query_param("offset", "0"))
            .respond_with(page(&["a", "b"], 0, true))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/payouts"))
            .and(query_param("offset", "2"))
            .respond_with(page(&["c"], 2, false))
            .expect(1)
            .mount(&server)
            .await;

        let payouts = payos(&server).payouts();
        let first = payouts
            .list(Some(ListPayoutsParams::default().with_limit(2).at_offset(0)))
            .await
            .unwrap();
        assert_eq!(first.data.len(), 2);
        assert_eq!(first.params().offset, Some(0));

        let second = first.next_page().await.unwrap().unwrap();
        assert_eq!(second.data[0].id, "c");
        assert!(!second.has_next_page());
        assert!(second.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auto_paging_stops_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payouts"))
            .and(query_param("offset", "0"))
            .respond_with(page(&["a"], 0, true))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/payouts"))
            .and(query_param("offset", "1"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"code": "401", "desc": "unauthorized"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut iter = payos(&server).payouts().list_auto_paging(None);
        assert_eq!(iter.advance().await.map(|p| p.id).as_deref(), Some("a"));
        assert!(iter.advance().await.is_none());
        assert!(matches!(iter.err(), Some(Error::Api(api)) if api.status.as_u16() == 401));
        assert!(iter.advance().await.is_none());
    }
}
