use crate::{block_env::BlockEnvironment, errors::TraceError, transaction::TransactionBuilder};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use txtrace_common::{
    Address, U256,
    tracing::CallTraceFrame,
    types::{Account, Transaction},
};
use txtrace_levm::{
    db::{InMemoryDatabase, WorldState},
    environment::{ChainRuleset, Environment},
    errors::{ExecutionReport, VMError},
    tracing::LevmCallTracer,
    vm::VM,
};

/// Everything a traced transaction produced.
pub struct TracedTransaction {
    pub report: ExecutionReport,
    pub calls: CallTraceFrame,
    /// The state after the transaction, with the pre-image of every account it loaded.
    pub db: WorldState,
}

/// Glue between trace requests and the interpreter.
#[derive(Debug)]
pub struct LEVM;

impl LEVM {
    /// Builds the execution environment for a transaction in the given block.
    ///
    /// The gas price is left at zero: the VM derives the effective price from the fee caps once
    /// they have been validated.
    pub fn setup_env(
        tx: &Transaction,
        block: &BlockEnvironment,
        ruleset: ChainRuleset,
    ) -> Environment {
        Environment {
            origin: tx.sender,
            gas_limit: tx.gas_limit,
            ruleset,
            block_number: block.number,
            coinbase: block.coinbase,
            timestamp: block.timestamp,
            prev_randao: block.prevrandao,
            difficulty: block.difficulty,
            chain_id: U256::from(tx.chain_id),
            base_fee_per_gas: block.base_fee,
            base_blob_fee_per_gas: block.blob_base_fee,
            gas_price: U256::zero(),
            tx_max_priority_fee_per_gas: U256::from(tx.max_priority_fee_per_gas),
            tx_max_fee_per_gas: U256::from(tx.max_fee_per_gas),
            tx_nonce: tx.nonce,
            block_gas_limit: block.gas_limit,
            is_privileged: TransactionBuilder::is_system_deposit(tx, &ruleset.vm_type),
            l1_fee_overrides: block.l1_fee,
        }
    }

    /// Runs a single transaction over `accounts` with the call tracer enabled.
    ///
    /// A transaction rejected by validation returns an error and its world state is dropped.
    pub fn trace_tx(
        accounts: FxHashMap<Address, Account>,
        tx: &Transaction,
        env: Environment,
        with_log: bool,
    ) -> Result<TracedTransaction, TraceError> {
        let mut db = WorldState::new(InMemoryDatabase::new(accounts));

        let (report, tracer) = {
            let mut vm = VM::new(env, &mut db, tx, LevmCallTracer::new(with_log));
            let report = vm.execute().map_err(|error| {
                if let VMError::TxValidation(validation) = &error {
                    debug!(%validation, "Transaction rejected");
                }
                TraceError::from(error)
            })?;
            trace!(
                gas_used = report.gas_used,
                gas_refunded = report.gas_refunded,
                l1_fee = ?report.l1_fee,
                "Transaction executed"
            );
            (report, std::mem::take(&mut vm.tracer))
        };

        let calls = tracer
            .into_root()
            .ok_or_else(|| TraceError::Internal("call tracer produced no root frame".to_string()))?;

        Ok(TracedTransaction { report, calls, db })
    }
}
