// Re-export shared types from sqlbatch_core to keep engine paths stable
pub use sqlbatch_core::{
    BatchFailure,
    BatchRunner,
    BatchSuccess,
    Connector,
    Database,
    DbError,
    ErrorCode,
    ResultSet,
    Row,
    RowList,
    StatementFailure,
    StatementHandle,
    StatementSuccess,
    TxError,
    Value,
};
