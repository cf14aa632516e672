use serde::Serialize;

/// Envelope for every JSON response:
///
/// ```json
/// { "success": true, "data": { ... }, "message": "Attendance taken" }
/// ```
///
/// Error responses carry `T::default()` as `data`.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_uses_default_data() {
        let body = serde_json::to_value(ApiResponse::<Vec<i64>>::error("nope")).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"], serde_json::json!([]));
        assert_eq!(body["message"], "nope");
    }
}
