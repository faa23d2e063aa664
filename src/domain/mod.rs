pub mod gateway;
pub mod transaction;

pub use gateway::{DataFormat, FormatRoute, Gateway, CONTENT_TYPE_JSON, FORMAT_ROUTES};
pub use transaction::{
    NewTransaction, Transaction, TransactionReceipt, TransactionRequest, TransactionResponse,
    TransactionType, PROCESSING_MESSAGE, STATUS_FAILED, STATUS_PENDING,
};
