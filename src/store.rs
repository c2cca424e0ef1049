/// Error enumeration shared by the storage collaborators. The engine only
/// sees CRUD semantics; persistence details stay behind the traits.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
