pub mod alerts;
pub mod approvals;
pub mod issuance;
pub mod movements;
pub mod parts_used_store;
pub(crate) mod rollup;
pub mod stock_levels;
pub mod transfers;

pub use alerts::AlertService;
pub use approvals::ApprovalService;
pub use issuance::IssuanceService;
pub use movements::MovementService;
pub use stock_levels::StockService;
pub use transfers::TransferService;
