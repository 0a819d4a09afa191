//! Indexed Query Client (Component A, §4.A): paginated, optionally
//! block-pinned reads of accrual/epoch entities from the indexed read model.

mod client;
mod queries;
mod types;

pub use client::{GraphQlClient, QueryClient};
pub use queries::{
    health_check, query_account_subsidies_at_block, query_account_subsidies_for_vault,
    query_accounts, query_current_active_epoch, query_epoch_by_number,
    query_epoch_with_block_info, query_latest_merkle_distribution_for_vault,
    query_merkle_distribution_for_epoch, MerkleDistributionRecord,
};
pub use types::{BlockPin, GraphQlRequest, GraphQlResponse, PAGE_SIZE};
