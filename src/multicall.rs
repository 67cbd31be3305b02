use crate::error::BatchError;
use crate::metrics;
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::prelude::*;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Multicall3 `aggregate3((address,bool,bytes)[])` selector.
const AGGREGATE3_SELECTOR: [u8; 4] = [0x82, 0xad, 0x56, 0xcb];

/// Hard ceiling for calls per `eth_call`; larger batches get rejected by most providers.
pub const MAX_BATCH_SIZE: usize = 500;

/// A single read-only contract call to be batched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    /// Target contract address
    pub target: Address,
    /// Encoded function call data
    pub call_data: Bytes,
}

impl Call {
    pub fn new(target: Address, call_data: Bytes) -> Self {
        Self { target, call_data }
    }
}

/// Result of one call inside a batch. A reverted call is `success == false`; it does
/// not fail the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallOutcome {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self {
            success: true,
            return_data: return_data.into(),
        }
    }

    pub fn reverted() -> Self {
        Self {
            success: false,
            return_data: Bytes::default(),
        }
    }

    /// Return data of a successful call, `None` for reverts.
    pub fn data(&self) -> Option<&[u8]> {
        self.success.then(|| self.return_data.as_ref())
    }
}

/// Executes independent read-only calls in one round trip.
///
/// Implementations must return exactly one outcome per call, in input order; callers
/// de-multiplex positionally.
#[async_trait]
pub trait BatchCaller: Send + Sync {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallOutcome>, BatchError>;
}

/// Multicall3 batch executor.
///
/// ## Features
///
/// - **Batching**: one `eth_call` per chunk of up to `batch_size` calls
/// - **Coalescing**: identical `(target, calldata)` pairs are sent once and fanned back out
/// - **Timeout Management**: per-chunk timeout; no retries (retry policy belongs to the caller)
///
/// ## Example
///
/// ```rust,ignore
/// let multicall = Multicall::new(provider, multicall_address, 200);
/// let calls = vec![
///     Call::new(pair_address, contracts::i_uniswap_v2_pair::get_reserves()),
///     // ... more calls
/// ];
/// let outcomes = multicall.execute(calls).await?;
/// ```
#[derive(Clone)]
pub struct Multicall<M: Middleware> {
    pub provider: Arc<M>,
    multicall_address: Address,
    batch_size: usize,
    timeout_seconds: u64,
}

impl<M: Middleware + 'static> Multicall<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address, batch_size: usize) -> Self {
        let validated_batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);

        if batch_size > MAX_BATCH_SIZE {
            warn!("Batch size {} exceeds maximum ({}), capping", batch_size, MAX_BATCH_SIZE);
        }

        Self {
            provider,
            multicall_address,
            batch_size: validated_batch_size,
            timeout_seconds: 10,
        }
    }

    /// Set custom timeout for each multicall chunk
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    async fn execute_chunk(&self, calls: &[Call]) -> Result<Vec<CallOutcome>, BatchError> {
        let calldata = encode_aggregate3(calls);
        let tx_request = TransactionRequest::new()
            .to(self.multicall_address)
            .data(calldata);
        let typed_tx: ethers::types::transaction::eip2718::TypedTransaction = tx_request.into();

        let limit = Duration::from_secs(self.timeout_seconds);
        let response = tokio::time::timeout(limit, self.provider.call(&typed_tx, None))
            .await
            .map_err(|_| BatchError::Timeout(limit))?
            .map_err(|e| BatchError::Transport(e.to_string()))?;

        let outcomes = decode_aggregate3(&response)?;
        if outcomes.len() != calls.len() {
            return Err(BatchError::MalformedResponse(format!(
                "{} results for {} calls",
                outcomes.len(),
                calls.len()
            )));
        }
        Ok(outcomes)
    }
}

#[async_trait]
impl<M: Middleware + 'static> BatchCaller for Multicall<M> {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallOutcome>, BatchError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        // Coalesce identical calls to reduce load
        let mut unique_calls = indexmap::IndexSet::new();
        let mut original_indices = Vec::with_capacity(calls.len());
        for call in &calls {
            let (index, _) = unique_calls.insert_full(call.clone());
            original_indices.push(index);
        }
        let unique_calls: Vec<Call> = unique_calls.into_iter().collect();
        debug!("Multicall coalesced {} calls into {}", calls.len(), unique_calls.len());

        let mut unique_outcomes = Vec::with_capacity(unique_calls.len());
        for chunk in unique_calls.chunks(self.batch_size) {
            metrics::record_multicall_batch_size(chunk.len() as f64);
            unique_outcomes.extend(self.execute_chunk(chunk).await?);
        }

        // Reconstruct the full result set in the original order
        Ok(original_indices
            .into_iter()
            .map(|index| unique_outcomes[index].clone())
            .collect())
    }
}

/// ABI-encodes an `aggregate3` call with `allowFailure = true` on every sub-call.
pub fn encode_aggregate3(calls: &[Call]) -> Bytes {
    let call_tokens: Vec<Token> = calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(call.target),
                Token::Bool(true),
                Token::Bytes(call.call_data.to_vec()),
            ])
        })
        .collect();

    let mut data = Vec::with_capacity(4 + 64 + calls.len() * 160);
    data.extend_from_slice(&AGGREGATE3_SELECTOR);
    data.extend_from_slice(&abi::encode(&[Token::Array(call_tokens)]));
    Bytes::from(data)
}

/// Decodes the `(bool success, bytes returnData)[]` payload of `aggregate3`.
pub fn decode_aggregate3(response: &[u8]) -> Result<Vec<CallOutcome>, BatchError> {
    let decoded = abi::decode(
        &[ParamType::Array(Box::new(ParamType::Tuple(vec![
            ParamType::Bool,
            ParamType::Bytes,
        ])))],
        response,
    )
    .map_err(|e| BatchError::MalformedResponse(e.to_string()))?;

    let results = decoded
        .into_iter()
        .next()
        .and_then(|t| t.into_array())
        .ok_or_else(|| BatchError::MalformedResponse("expected result array".into()))?;

    results
        .into_iter()
        .map(|token| match token {
            Token::Tuple(mut fields) if fields.len() == 2 => {
                let return_data = fields.pop().and_then(|t| t.into_bytes());
                let success = fields.pop().and_then(|t| t.into_bool());
                match (success, return_data) {
                    (Some(success), Some(data)) => Ok(CallOutcome {
                        success,
                        return_data: Bytes::from(data),
                    }),
                    _ => Err(BatchError::MalformedResponse(
                        "unexpected result tuple types".into(),
                    )),
                }
            }
            _ => Err(BatchError::MalformedResponse(
                "unexpected token in result array".into(),
            )),
        })
        .collect()
}
