//! Transaction service: drives the transaction lifecycle and attaches the
//! contract's fees once a sale is authorised.

use chrono::Utc;
use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::contract::Contract;
use crate::error::DomainError;
use crate::fees::FeeCalculationEngine;
use crate::merchant::Merchant;
use crate::repository::AggregateRepository;

use super::{
    AddProductDetails, CompleteTransaction, StartTransaction, Transaction, TransactionError,
    TransactionHasStartedData,
};

pub struct TransactionService<S: EventStore> {
    handler: CommandHandler<S, Transaction>,
    repository: AggregateRepository<S>,
    engine: FeeCalculationEngine,
}

impl<S: EventStore + Clone> TransactionService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            repository: AggregateRepository::new(store),
            engine: FeeCalculationEngine::new(),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Transaction> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(transaction_id = %cmd.transaction_id))]
    pub async fn start_transaction(
        &self,
        cmd: StartTransaction,
    ) -> Result<CommandResult<Transaction>, DomainError> {
        let data = TransactionHasStartedData {
            transaction_id: cmd.transaction_id,
            estate_id: cmd.estate_id,
            merchant_id: cmd.merchant_id,
            transaction_type: cmd.transaction_type,
            transaction_reference: cmd.transaction_reference.clone(),
            transaction_date_time: cmd.transaction_date_time,
            amount: cmd.amount,
        };

        self.handler
            .execute(cmd.aggregate_id(), |transaction| transaction.start(data))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_product_details(
        &self,
        cmd: AddProductDetails,
    ) -> Result<CommandResult<Transaction>, DomainError> {
        self.handler
            .execute_with_retry(cmd.aggregate_id(), |transaction| {
                transaction.add_product_details(cmd.contract_id, cmd.product_id)
            })
            .await
    }

    /// Completes the transaction and, for authorised sales with product
    /// details, calculates and attaches the contract's enabled fees.
    #[tracing::instrument(skip(self))]
    pub async fn complete_transaction(
        &self,
        cmd: CompleteTransaction,
    ) -> Result<CommandResult<Transaction>, DomainError> {
        let completed_at = Utc::now();
        let result = self
            .handler
            .execute_with_retry(cmd.aggregate_id(), |transaction| {
                transaction.complete(
                    cmd.is_authorised,
                    cmd.response_code.clone(),
                    cmd.response_message.clone(),
                    cmd.amount,
                    completed_at,
                )
            })
            .await?;

        let eligible = result.aggregate.details().is_some_and(|d| {
            d.is_settleable_sale() && d.product_id.is_some() && d.amount.is_some()
        });
        if !eligible {
            return Ok(result);
        }

        self.add_fees(cmd.transaction_id).await
    }

    /// Calculates fees from the current contract definition and attaches the
    /// ones the transaction does not carry yet.
    #[tracing::instrument(skip(self))]
    pub async fn add_fees(
        &self,
        transaction_id: AggregateId,
    ) -> Result<CommandResult<Transaction>, DomainError> {
        let transaction: Transaction = self.repository.get_latest_version(transaction_id).await?;
        let details = transaction
            .details()
            .ok_or_else(|| DomainError::not_found::<Transaction>(transaction_id))?;

        let (Some(contract_id), Some(product_id)) = (details.contract_id, details.product_id)
        else {
            return Err(TransactionError::NoProductDetails.into());
        };
        let amount = details.amount.ok_or(TransactionError::NoAmount)?;

        let contract: Contract = self.repository.get_latest_version(contract_id).await?;
        let fees = contract.fees_for_product(product_id).unwrap_or_default();
        let merchant: Merchant = self.repository.get_latest_version(details.merchant_id).await?;
        let due_date = merchant
            .settlement_schedule()
            .settlement_date_for(details.transaction_date());

        let calculated = self.engine.calculate_fees(&fees, amount, Some(Utc::now()));
        tracing::debug!(fees = calculated.len(), %due_date, "fees calculated");

        self.handler
            .execute_with_retry(transaction_id, |transaction| {
                transaction.add_fees(calculated.clone(), due_date)
            })
            .await
    }

    /// Returns None if the transaction was never started.
    pub async fn get_transaction(
        &self,
        transaction_id: AggregateId,
    ) -> Result<Option<Transaction>, DomainError> {
        self.handler.load_existing(transaction_id).await
    }
}
