//! Scripted chain used by the integration tests.
//!
//! `FakeChain` answers `(target, calldata)` lookups from a table and reverts
//! anything it does not know, which is exactly how an unclassifiable token
//! looks through `aggregate3`.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};
use mig_yield_sdk::contracts::{erc20, i_master_chef, i_uniswap_v2_pair};
use mig_yield_sdk::error::BatchError;
use mig_yield_sdk::multicall::{BatchCaller, Call, CallOutcome};
use mig_yield_sdk::settings::{PoolInfoLayout, StakingContractConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const E18: u128 = 1_000_000_000_000_000_000;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

#[derive(Default)]
pub struct FakeChain {
    answers: Mutex<HashMap<(Address, Bytes), CallOutcome>>,
    /// `execute` invocations, i.e. round trips.
    pub batches: AtomicUsize,
    /// Sub-calls across all round trips.
    pub calls: AtomicUsize,
    /// Size of every batch, in order.
    pub batch_sizes: Mutex<Vec<usize>>,
    pub offline: AtomicBool,
    /// Drop the last outcome of any batch larger than this.
    pub truncate_above: Mutex<Option<usize>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, target: Address, call_data: Bytes, outcome: CallOutcome) {
        self.answers
            .lock()
            .unwrap()
            .insert((target, call_data), outcome);
    }

    pub fn answer_uint(&self, target: Address, call_data: Bytes, value: u128) {
        self.answer(target, call_data, CallOutcome::ok(abi::encode(&[Token::Uint(U256::from(value))])));
    }

    pub fn answer_address(&self, target: Address, call_data: Bytes, value: Address) {
        self.answer(target, call_data, CallOutcome::ok(abi::encode(&[Token::Address(value)])));
    }

    pub fn answer_name(&self, target: Address, name: &str) {
        self.answer(
            target,
            erc20::name(),
            CallOutcome::ok(abi::encode(&[Token::String(name.to_string())])),
        );
    }

    /// A MasterChef with `pools` as `(lp, alloc_point)` and a `booPerSecond` accessor.
    pub fn chef(&self, chef: Address, pools: &[(Address, u64)], total_alloc: u128, rate_per_second: u128) {
        self.answer_uint(chef, i_master_chef::pool_length(), pools.len() as u128);
        self.answer_uint(chef, i_master_chef::total_alloc_point(), total_alloc);
        self.answer_uint(chef, i_master_chef::reward_rate("booPerSecond").unwrap(), rate_per_second);
        for (pid, (lp, alloc)) in pools.iter().enumerate() {
            self.answer(
                chef,
                i_master_chef::pool_info(pid as u64),
                CallOutcome::ok(abi::encode(&[
                    Token::Address(*lp),
                    Token::Uint(U256::from(*alloc)),
                    Token::Uint(U256::from(1_650_000_000u64)),
                    Token::Uint(U256::zero()),
                ])),
            );
        }
    }

    /// Plain ERC20 staked in `chef`.
    pub fn single(&self, chef: Address, token: Address, supply: u128, decimals: u128, staked: u128) {
        self.answer_name(token, "Single");
        self.answer_uint(token, erc20::total_supply(), supply);
        self.answer_uint(token, erc20::decimals(), decimals);
        self.answer_uint(token, erc20::balance_of(chef), staked);
    }

    /// Two-asset pair staked in `chef`; the member tokens get their own `decimals()`.
    pub fn pair(
        &self,
        chef: Address,
        lp: Address,
        (token0, decimals0, reserve0): (Address, u128, u128),
        (token1, decimals1, reserve1): (Address, u128, u128),
        supply: u128,
        staked: u128,
    ) {
        self.answer_address(lp, i_uniswap_v2_pair::token0(), token0);
        self.answer_address(lp, i_uniswap_v2_pair::token1(), token1);
        self.answer_uint(lp, erc20::total_supply(), supply);
        self.answer_uint(lp, erc20::decimals(), 18);
        self.answer_uint(lp, erc20::balance_of(chef), staked);
        self.answer(
            lp,
            i_uniswap_v2_pair::get_reserves(),
            CallOutcome::ok(abi::encode(&[
                Token::Uint(U256::from(reserve0)),
                Token::Uint(U256::from(reserve1)),
                Token::Uint(U256::from(1_650_000_000u64)),
            ])),
        );
        self.answer_uint(token0, erc20::decimals(), decimals0);
        self.answer_uint(token1, erc20::decimals(), decimals1);
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchCaller for FakeChain {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallOutcome>, BatchError> {
        // Give concurrent callers a chance to interleave.
        tokio::task::yield_now().await;

        self.batches.fetch_add(1, Ordering::SeqCst);
        self.calls.fetch_add(calls.len(), Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(calls.len());
        if self.offline.load(Ordering::SeqCst) {
            return Err(BatchError::Transport("connection refused".into()));
        }

        let answers = self.answers.lock().unwrap();
        let mut outcomes: Vec<CallOutcome> = calls
            .into_iter()
            .map(|call| {
                answers
                    .get(&(call.target, call.call_data))
                    .cloned()
                    .unwrap_or_else(CallOutcome::reverted)
            })
            .collect();
        if let Some(limit) = *self.truncate_above.lock().unwrap() {
            if outcomes.len() > limit {
                outcomes.pop();
            }
        }
        Ok(outcomes)
    }
}

/// Holds the first batch until `release`, so a test can act while a population is in flight.
pub struct GatedChain {
    inner: Arc<FakeChain>,
    /// Notified once the first batch reaches the gate.
    pub entered: Notify,
    release: Notify,
    held: AtomicBool,
}

impl GatedChain {
    pub fn new(inner: Arc<FakeChain>) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
            held: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl BatchCaller for GatedChain {
    async fn execute(&self, calls: Vec<Call>) -> Result<Vec<CallOutcome>, BatchError> {
        if !self.held.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.execute(calls).await
    }
}

pub fn chef_config(name: &str, chef: Address, reward_token: Address) -> StakingContractConfig {
    StakingContractConfig {
        name: name.to_string(),
        address: chef,
        reward_token,
        reward_rate_accessor: "booPerSecond".to_string(),
        pool_info: PoolInfoLayout::default(),
    }
}
