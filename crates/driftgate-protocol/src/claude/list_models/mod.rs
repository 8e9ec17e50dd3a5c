pub mod request;
pub mod response;
pub mod types;

pub use request::{ListModelsHeaders, ListModelsQuery, ListModelsRequest};
pub use response::ListModelsResponse;
pub use types::{BetaModelInfo, ModelType};
