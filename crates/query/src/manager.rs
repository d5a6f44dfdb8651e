//! Query façade over aggregates and read models.

use chrono::NaiveDate;
use common::AggregateId;
use domain::contract::ContractDetails;
use domain::operator::OperatorDetails;
use domain::voucher::VoucherDetails;
use domain::{Aggregate, AggregateRepository, Contract, Estate, Merchant, Operator, Voucher};
use event_store::EventStore;
use projections::{
    ContractSummary, EstateSummary, MerchantBalanceChangedEntry, MerchantBalanceProjectionState,
    MerchantSummary, OperatorSummary, ReadModels, SettlementSummary, TransactionSummary,
};
use rust_decimal::Decimal;

use crate::error::{QueryError, Result};
use crate::models::{EstateOperatorResponse, EstateResponse, MerchantResponse, SettlementResponse};

/// Answers queries for the settlement core.
///
/// Single-entity reads load the entity's own stream and are always current.
/// List reads come from the projections and may trail the latest append.
pub struct QueryManager<S> {
    repository: AggregateRepository<S>,
    read_models: ReadModels,
}

impl<S: EventStore> QueryManager<S> {
    pub fn new(store: S, read_models: ReadModels) -> Self {
        Self {
            repository: AggregateRepository::new(store),
            read_models,
        }
    }

    /// Loads an aggregate and clones out its created state.
    async fn load_details<A, D, F>(&self, aggregate_id: AggregateId, details: F) -> Result<D>
    where
        A: Aggregate,
        D: Clone,
        F: FnOnce(&A) -> Option<&D>,
    {
        let aggregate: A = self.repository.get_latest_version(aggregate_id).await?;
        details(&aggregate)
            .cloned()
            .ok_or_else(|| QueryError::not_found(A::aggregate_type(), aggregate_id))
    }

    /// The estate with each assigned operator resolved from its own stream.
    #[tracing::instrument(skip(self))]
    pub async fn get_estate(&self, estate_id: AggregateId) -> Result<EstateResponse> {
        let estate = self.load_details(estate_id, Estate::details).await?;

        let mut operators = Vec::with_capacity(estate.operators.len());
        for assigned in &estate.operators {
            let operator: Operator = self
                .repository
                .get_latest_version(assigned.operator_id)
                .await?;
            let (name, custom_merchant, custom_terminal) = match operator.details() {
                Some(d) => (
                    d.name.clone(),
                    d.require_custom_merchant_number,
                    d.require_custom_terminal_number,
                ),
                None => (assigned.name.clone(), false, false),
            };
            operators.push(EstateOperatorResponse {
                operator_id: assigned.operator_id,
                name,
                is_deleted: assigned.is_deleted,
                require_custom_merchant_number: custom_merchant,
                require_custom_terminal_number: custom_terminal,
            });
        }

        Ok(EstateResponse {
            estate_id: estate.estate_id,
            name: estate.name,
            reference: estate.reference,
            operators,
            security_users: estate.security_users,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_estates(&self) -> Result<Vec<EstateSummary>> {
        let estates = self.read_models.catalog.estates().await;
        non_empty(estates, "estates", "the platform")
    }

    /// The merchant from its own stream, with balances mirrored from the
    /// balance read model.
    #[tracing::instrument(skip(self))]
    pub async fn get_merchant(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Result<MerchantResponse> {
        let merchant = self.load_details(merchant_id, Merchant::details).await?;
        if merchant.estate_id != estate_id {
            return Err(QueryError::not_found("Merchant", merchant_id));
        }

        let (balance, available_balance) = self
            .read_models
            .balances
            .balance(estate_id, merchant_id)
            .await
            .map(|b| (b.balance, b.available_balance))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        Ok(MerchantResponse {
            merchant,
            balance,
            available_balance,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_merchants(&self, estate_id: AggregateId) -> Result<Vec<MerchantSummary>> {
        let merchants = self.read_models.catalog.merchants(estate_id).await;
        non_empty(merchants, "merchants", format!("estate {estate_id}"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_merchant_contracts(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Result<Vec<ContractSummary>> {
        let contracts = self
            .read_models
            .catalog
            .merchant_contracts(estate_id, merchant_id)
            .await;
        non_empty(contracts, "contracts", format!("merchant {merchant_id}"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_contract(
        &self,
        estate_id: AggregateId,
        contract_id: AggregateId,
    ) -> Result<ContractDetails> {
        let contract = self.load_details(contract_id, Contract::details).await?;
        if contract.estate_id != estate_id {
            return Err(QueryError::not_found("Contract", contract_id));
        }
        Ok(contract)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_contracts(&self, estate_id: AggregateId) -> Result<Vec<ContractSummary>> {
        let contracts = self.read_models.catalog.contracts(estate_id).await;
        non_empty(contracts, "contracts", format!("estate {estate_id}"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_operator(
        &self,
        estate_id: AggregateId,
        operator_id: AggregateId,
    ) -> Result<OperatorDetails> {
        let operator = self.load_details(operator_id, Operator::details).await?;
        if operator.estate_id != estate_id {
            return Err(QueryError::not_found("Operator", operator_id));
        }
        Ok(operator)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_operators(&self, estate_id: AggregateId) -> Result<Vec<OperatorSummary>> {
        let operators = self.read_models.catalog.operators(estate_id).await;
        non_empty(operators, "operators", format!("estate {estate_id}"))
    }

    /// Resolves the code through the catalog's index, then reads the
    /// voucher's own stream.
    #[tracing::instrument(skip(self))]
    pub async fn get_voucher_by_code(
        &self,
        estate_id: AggregateId,
        voucher_code: &str,
    ) -> Result<VoucherDetails> {
        let voucher_id = self
            .read_models
            .catalog
            .voucher_id_by_code(estate_id, voucher_code)
            .await
            .ok_or_else(|| QueryError::not_found("Voucher", voucher_code))?;
        self.load_details(voucher_id, Voucher::details).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_merchant_balance(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Result<MerchantBalanceProjectionState> {
        self.read_models
            .balances
            .balance(estate_id, merchant_id)
            .await
            .ok_or_else(|| QueryError::not_found("MerchantBalance", merchant_id))
    }

    /// Balance changes dated in `from..=to`, oldest first. An empty history
    /// is a valid answer.
    #[tracing::instrument(skip(self))]
    pub async fn get_merchant_balance_history(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MerchantBalanceChangedEntry>> {
        Ok(self
            .read_models
            .balances
            .history(estate_id, merchant_id, from, to)
            .await)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_settlement(
        &self,
        estate_id: AggregateId,
        settlement_id: AggregateId,
    ) -> Result<SettlementResponse> {
        let settlement = self
            .read_models
            .settlements
            .settlement(settlement_id)
            .await
            .filter(|s| s.estate_id == estate_id)
            .ok_or_else(|| QueryError::not_found("Settlement", settlement_id))?;
        let fees = self.read_models.settlements.fees(settlement_id).await;
        Ok(SettlementResponse { settlement, fees })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_settlements(
        &self,
        estate_id: AggregateId,
        merchant_id: Option<AggregateId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SettlementSummary>> {
        Ok(self
            .read_models
            .settlements
            .settlements(estate_id, merchant_id, from, to)
            .await)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_transactions(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TransactionSummary>> {
        Ok(self
            .read_models
            .transactions
            .transactions(estate_id, merchant_id, from, to)
            .await)
    }
}

fn non_empty<T>(items: Vec<T>, what: &'static str, scope: impl ToString) -> Result<Vec<T>> {
    if items.is_empty() {
        return Err(QueryError::none_found(what, scope));
    }
    Ok(items)
}
