//! API request, response and error types

pub mod error;
pub mod extract;
pub mod poi;

pub use error::{ApiError, ApiErrorResponse};
pub use extract::{Json, ValidQuery};
pub use poi::{
    BboxParams, BulkCreateRequest, BulkCreateResponse, CategoriesResponse, DeleteResponse,
    NearbyParams,
};
