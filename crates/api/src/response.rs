//! Response envelope shared by all API handlers.

use serde::Serialize;

/// `{ "data": T }` envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: analyses }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
